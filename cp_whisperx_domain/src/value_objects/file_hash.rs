// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `FileHash` — a 64-character lowercase hex SHA-256 digest.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHash(String);

impl FileHash {
    pub fn from_hex(hex: impl Into<String>) -> Result<Self, PipelineError> {
        let hex = hex.into();
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PipelineError::validation(format!(
                "not a 64-char hex SHA-256 digest: {hex}"
            )));
        }
        Ok(Self(hex.to_lowercase()))
    }

    pub fn from_bytes(digest: &[u8]) -> Self {
        Self(hex_encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn placeholder() -> Self {
        Self("0".repeat(64))
    }

    pub fn is_placeholder(&self) -> bool {
        self.0.chars().all(|c| c == '0')
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("writing to a String cannot fail");
    }
    s
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_64_zeros() {
        assert_eq!(FileHash::placeholder().as_str(), "0".repeat(64));
        assert!(FileHash::placeholder().is_placeholder());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(FileHash::from_hex("abc").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(FileHash::from_hex("g".repeat(64)).is_err());
    }

    #[test]
    fn from_bytes_encodes_lowercase_hex() {
        let h = FileHash::from_bytes(&[0xab, 0xcd]);
        assert_eq!(h.as_str(), "abcd");
    }
}
