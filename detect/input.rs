//! Validation of user-supplied transaction inputs.

use thiserror::Error;

/// Number of values the raw-vector variant accepts.
pub const RAW_FEATURE_COUNT: usize = 29;

/// Largest accepted transaction hour.
pub const MAX_HOUR: u32 = 23;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Transaction hour must be between 0 and 23, got {0}.")]
    HourOutOfRange(u32),
    #[error("Transaction amount must be a finite, non-negative number, got {0}.")]
    InvalidAmount(f64),
    #[error("Expected exactly {expected} comma-separated values, but found {found}.")]
    WrongArity { expected: usize, found: usize },
    #[error("Value #{position} ('{token}') is not a finite number.")]
    NotNumeric { position: usize, token: String },
    #[error("'{token}' is not a valid {what}.")]
    Malformed { what: &'static str, token: String },
}

pub fn validate_hour(hour: u32) -> Result<u32, InputError> {
    if hour > MAX_HOUR {
        return Err(InputError::HourOutOfRange(hour));
    }
    Ok(hour)
}

pub fn validate_amount(amount: f64) -> Result<f64, InputError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(InputError::InvalidAmount(amount));
    }
    Ok(amount)
}

/// Splits a comma-separated string into exactly [`RAW_FEATURE_COUNT`] finite values.
///
/// The arity is checked before any token is parsed, and the first token that
/// fails to parse rejects the whole input. An empty string is a single empty
/// token.
pub fn parse_raw_values(input: &str) -> Result<Vec<f64>, InputError> {
    let tokens: Vec<&str> = input.split(',').map(str::trim).collect();
    if tokens.len() != RAW_FEATURE_COUNT {
        return Err(InputError::WrongArity {
            expected: RAW_FEATURE_COUNT,
            found: tokens.len(),
        });
    }

    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| match token.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(InputError::NotNumeric {
                position: i + 1,
                token: (*token).to_string(),
            }),
        })
        .collect()
}
