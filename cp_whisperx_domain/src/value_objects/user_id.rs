// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `UserId` — a monotonically issued positive integer, never reused.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    /// Wraps a raw value. Returns `None` for zero, since ids are positive.
    pub fn new(value: u64) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for UserId {
    type Error = crate::error::PipelineError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| crate::error::PipelineError::validation("userId must be a positive integer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_rejected() {
        assert!(UserId::new(0).is_none());
    }

    #[test]
    fn positive_roundtrips() {
        let id = UserId::new(7).unwrap();
        assert_eq!(id.get(), 7);
        assert_eq!(id.to_string(), "7");
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(UserId::new(1).unwrap() < UserId::new(2).unwrap());
    }
}
