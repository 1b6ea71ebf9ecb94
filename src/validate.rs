//! Argument checks applied at every public entry point before any routing.

use crate::error::ApiError;
use crate::model::PlayerId;

/// Fails with an invalid-argument error if the value is absent.
pub fn not_null<T>(value: Option<T>, name: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::InvalidArgument(format!("{} cannot be null.", name)))
}

/// Fails with an invalid-argument error if the text is empty.
pub fn not_empty<'a>(text: &'a str, name: &str) -> Result<&'a str, ApiError> {
    if text.is_empty() {
        Err(ApiError::InvalidArgument(format!("{} cannot be empty.", name)))
    } else {
        Ok(text)
    }
}

/// A nil player id counts as absent.
pub fn require_player(player: PlayerId) -> Result<PlayerId, ApiError> {
    not_null(player.non_nil(), "Player")
}
