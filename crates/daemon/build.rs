// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;

fn main() {
    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("cargo:warning=OUT_DIR not set: {e}");
            std::process::exit(1);
        }
    };
    let dest_path = Path::new(&out_dir).join("env_names.rs");

    let mut file = match fs::File::create(&dest_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("cargo:warning=failed to create env_names.rs: {e}");
            std::process::exit(1);
        }
    };

    let contents = r#"/// Environment variable: override the daemon state directory.
pub const BEADS_STATE_DIR: &str = "BEADS_STATE_DIR";

/// Environment variable: XDG base directory for state data.
pub const XDG_STATE_HOME: &str = "XDG_STATE_HOME";

/// Environment variable: controls log level filtering (used by tracing-subscriber).
pub const RUST_LOG: &str = "RUST_LOG";

/// Environment variable: max concurrent RPC connections (default 100).
pub const BEADS_DAEMON_MAX_CONNS: &str = "BEADS_DAEMON_MAX_CONNS";

/// Environment variable: per-connection request timeout in seconds (default 30).
pub const BEADS_DAEMON_REQUEST_TIMEOUT: &str = "BEADS_DAEMON_REQUEST_TIMEOUT";

/// Environment variable: bounded mutation event channel capacity (default 512).
pub const BEADS_MUTATION_BUFFER: &str = "BEADS_MUTATION_BUFFER";

/// Environment variable: API key for the summarisation/compaction collaborator.
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

/// Environment variable: optional orchestrator root for molecule templates.
pub const GT_ROOT: &str = "GT_ROOT";

/// Environment variable: 0/1 switch for verbose RPC request/response logging.
pub const BD_RPC_DEBUG: &str = "BD_RPC_DEBUG";
"#;

    if let Err(e) = file.write_all(contents.as_bytes()) {
        eprintln!("cargo:warning=failed to write env_names.rs: {e}");
        std::process::exit(1);
    }
}
