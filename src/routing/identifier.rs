//! Inbound identifier validation.
//!
//! # Responsibilities
//! - Extract the second path segment (`/vidproxy/<id>`, `/p/<id>`)
//! - Accept only `tt` followed by 7-9 ASCII digits, prefix case-insensitive
//!
//! # Design Decisions
//! - The identifier is interpolated into the upstream URL without escaping,
//!   so this check is the injection boundary: `Identifier` has no other
//!   constructor
//! - Byte-level check, no regex

use std::fmt;
use std::str::FromStr;

use crate::error::ProxyError;

/// Body returned with every 400.
pub const USAGE: &str = "Usage: /vidproxy/tt0118884";

const PREFIX: &[u8] = b"tt";
const MIN_DIGITS: usize = 7;
const MAX_DIGITS: usize = 9;

/// A validated external content identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Validate a candidate identifier.
    pub fn parse(candidate: &str) -> Result<Self, ProxyError> {
        if is_valid(candidate) {
            Ok(Self(candidate.to_owned()))
        } else {
            Err(ProxyError::InvalidIdentifier)
        }
    }

    /// Extract and validate the identifier from a request path.
    pub fn from_path(path: &str) -> Result<Self, ProxyError> {
        let segment = path
            .split('/')
            .nth(2)
            .filter(|s| !s.is_empty())
            .ok_or(ProxyError::InvalidIdentifier)?;
        Self::parse(segment)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Identifier {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid(candidate: &str) -> bool {
    let bytes = candidate.as_bytes();
    let digits = bytes.len().saturating_sub(PREFIX.len());
    (MIN_DIGITS..=MAX_DIGITS).contains(&digits)
        && bytes[..PREFIX.len()].eq_ignore_ascii_case(PREFIX)
        && bytes[PREFIX.len()..].iter().all(u8::is_ascii_digit)
}
