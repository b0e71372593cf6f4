// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Device Token
//!
//! Opaque device identifier: canonical form is a lower-case hex string of
//! even length, binary form is the decoded bytes.

use std::fmt;
use std::str::FromStr;

use crate::error::PushError;

/// A validated device token in its binary form.
///
/// Tokens key the blacklist map, so the type is hashable and comparison is
/// on the binary form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceToken {
    bytes: Vec<u8>,
}

impl DeviceToken {
    /// Parses a hex string. Embedded whitespace is tolerated and stripped
    /// before decoding; anything else non-hex fails.
    pub fn from_hex(input: &str) -> Result<Self, PushError> {
        let stripped: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        if stripped.is_empty() {
            return Err(PushError::InvalidToken("empty token".into()));
        }
        let bytes =
            hex::decode(&stripped).map_err(|e| PushError::InvalidToken(e.to_string()))?;
        Ok(DeviceToken { bytes })
    }

    /// Wraps raw token bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PushError> {
        if bytes.is_empty() {
            return Err(PushError::InvalidToken("empty token".into()));
        }
        Ok(DeviceToken { bytes })
    }

    /// Binary form, as written into outbound frames.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the binary form in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Canonical lower-case hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for DeviceToken {
    type Err = PushError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceToken::from_hex(s)
    }
}
