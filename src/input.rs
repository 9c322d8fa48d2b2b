//! Validation for what the user types before a room command is sent.
//!
//! The server is the authority on room codes; these checks only reject input
//! that could never be valid so the UI can say so without a round trip.

use crate::error::{Result, RoomError};

/// Longest display name accepted, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 20;

/// Room codes are exactly this many characters.
pub const ROOM_CODE_LEN: usize = 4;

/// A trimmed, non-empty display name of at most [`MAX_DISPLAY_NAME_LEN`]
/// characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName(String);

impl DisplayName {
    /// # Errors
    ///
    /// [`RoomError::InvalidDisplayName`] if the trimmed name is empty or too long.
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(RoomError::InvalidDisplayName("name is empty"));
        }
        if name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(RoomError::InvalidDisplayName("name is longer than 20 characters"));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for DisplayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<DisplayName> for String {
    fn from(name: DisplayName) -> Self {
        name.0
    }
}

/// A room code as typed by a joiner, normalized to uppercase ASCII
/// alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomCodeInput(String);

impl RoomCodeInput {
    /// Drop anything that is not an ASCII letter or digit, uppercase the
    /// rest and require exactly [`ROOM_CODE_LEN`] characters.
    ///
    /// # Errors
    ///
    /// [`RoomError::InvalidRoomCode`] if the normalized code has the wrong length.
    pub fn parse(raw: &str) -> Result<Self> {
        let code: String = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if code.len() != ROOM_CODE_LEN {
            return Err(RoomError::InvalidRoomCode("room code must be 4 letters or digits"));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCodeInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RoomCodeInput> for String {
    fn from(code: RoomCodeInput) -> Self {
        code.0
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn display_name_is_trimmed() {
        let name = DisplayName::parse("  Alice \n").unwrap();
        assert_eq!(name.as_str(), "Alice");
        assert_eq!(String::from(name), "Alice");
    }

    #[test]
    fn display_name_rejects_blank() {
        for raw in ["", "   ", "\t\n"] {
            assert!(
                matches!(DisplayName::parse(raw), Err(RoomError::InvalidDisplayName(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn display_name_length_counts_characters() {
        assert!(DisplayName::parse(&"a".repeat(20)).is_ok());
        assert!(DisplayName::parse(&"a".repeat(21)).is_err());
        // 20 multibyte characters are still 20 characters.
        assert!(DisplayName::parse(&"é".repeat(20)).is_ok());
    }

    #[test]
    fn room_code_is_normalized() {
        assert_eq!(RoomCodeInput::parse("ab12").unwrap().as_str(), "AB12");
        assert_eq!(RoomCodeInput::parse(" 5-6 7 8 ").unwrap().as_str(), "5678");
    }

    #[test]
    fn room_code_requires_four_characters() {
        for raw in ["", "ABC", "ABCDE", "!!!!", "ÄBCD"] {
            assert!(
                matches!(RoomCodeInput::parse(raw), Err(RoomError::InvalidRoomCode(_))),
                "{raw:?} should be rejected"
            );
        }
    }
}
