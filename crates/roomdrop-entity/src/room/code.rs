//! Canonical room codes.
//!
//! A room code is the 8-character identifier peers type or paste to join a
//! room. Codes are case-insensitive; the canonical form is uppercase. The
//! generation alphabet excludes the visually ambiguous characters
//! `0`, `O`, `1`, and `I`.

use std::fmt;
use std::str::FromStr;

use rand::RngExt;
use serde::{Deserialize, Serialize};

use roomdrop_core::AppError;

/// Characters used when generating new codes.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of every room code.
pub const CODE_LENGTH: usize = 8;

/// A canonical (uppercase) 8-character room code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Generate a new random room code.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code: String = (0..CODE_LENGTH)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Parse a user-supplied code, normalizing case.
    ///
    /// Accepts any 8-character alphanumeric string; lookups are always
    /// performed against the canonical uppercase form.
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let trimmed = input.trim();
        if trimmed.len() != CODE_LENGTH {
            return Err(AppError::validation(format!(
                "Room code must be exactly {CODE_LENGTH} characters"
            )));
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::validation(
                "Room code may contain only letters and digits",
            ));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Return the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoomCode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
