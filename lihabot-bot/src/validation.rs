/// Input validation for values typed into slash commands
use thiserror::Error;

/// Discord caps display names at 32 characters; tank names follow suit.
pub const MAX_TANK_NAME_CHARS: usize = 32;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Tank name cannot be empty")]
    TankNameEmpty,

    #[error("Tank name too long (max 32 characters, got {0})")]
    TankNameTooLong(usize),

    #[error("Tank name cannot contain control characters or markdown backticks")]
    TankNameInvalidChars,
}

/// Validates a tank name and returns it trimmed
///
/// Rules:
/// - Cannot be empty after trimming
/// - Max 32 characters
/// - No control characters or backticks (they break embed rendering)
pub fn validate_tank_name(name: &str) -> Result<&str, ValidationError> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::TankNameEmpty);
    }

    let chars = name.chars().count();
    if chars > MAX_TANK_NAME_CHARS {
        return Err(ValidationError::TankNameTooLong(chars));
    }

    if name.chars().any(|c| c.is_control() || c == '`') {
        return Err(ValidationError::TankNameInvalidChars);
    }

    Ok(name)
}
