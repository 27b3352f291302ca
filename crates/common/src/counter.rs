// Parsing for the plain-text `version.v` counter.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CounterError {
    #[error("version counter is empty")]
    Empty,

    #[error("version counter `{0}` is not a non-negative integer")]
    NotANumber(String),

    #[error("version counter {0} cannot be incremented")]
    Overflow(u64),
}

/// Parse the persisted counter. Surrounding whitespace is ignored.
pub fn parse_counter(text: &str) -> Result<u64, CounterError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CounterError::Empty);
    }
    trimmed.parse::<u64>().map_err(|_| CounterError::NotANumber(trimmed.to_string()))
}

/// The value the next run persists. A missing counter counts as 0.
pub fn next_counter(current: Option<u64>) -> Result<u64, CounterError> {
    let current = current.unwrap_or(0);
    current.checked_add(1).ok_or(CounterError::Overflow(current))
}
