// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # cp-whisperx domain layer
//!
//! Pure, reusable business logic for the staged media-processing pipeline:
//! value objects, the error taxonomy, the stage registry and order
//! resolver, glossary priority-cascade resolution, online-media string
//! parsing, and the collaborator port traits that keep all ML work,
//! `ffmpeg`, and third-party API clients out of this crate's dependency
//! graph.
//!
//! Following the layering discipline this crate's ancestor project
//! documents: no `tokio` runtime, no concrete serialization format choice
//! beyond the `serde`-derived shapes themselves, no logging subscriber
//! configuration. Infrastructure (file I/O, atomic writes, the async
//! runtime) lives one layer up.

pub mod entities;
pub mod error;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use error::{PipelineError, PipelineResult};
