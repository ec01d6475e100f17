// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `wkrs`: the library half of the `bd` CLI — workspace resolution, the
//! daemon client, and the standalone merge driver invoked by version
//! control without a daemon. The binary (`src/main.rs`) is a thin clap
//! front end over these.

pub mod client;
pub mod merge_driver;
pub mod registry;
pub mod workspace;
