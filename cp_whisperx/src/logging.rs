// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Tracing subscriber initialization (C0 ambient concern). The domain
//! crate only calls the `tracing` facade macros; this crate's bootstrap
//! caller owns the one-time subscriber install.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `tracing` subscriber. `RUST_LOG` overrides
/// `default_level` when set; otherwise every target logs at
/// `default_level` (e.g. `"info"`).
///
/// Safe to call at most once per process; a second call returns an error
/// which callers should treat as non-fatal (tests that run many cases in
/// one process commonly hit this).
pub fn init_subscriber(default_level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(true).try_init()
}
