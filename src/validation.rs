//! Field-level validation that reports every problem at once.
//!
//! Validators push `FieldError`s into a `FieldErrors` accumulator and finish
//! with [`FieldErrors::finish`], which yields either the validated value or an
//! `AppError::Validation` carrying all collected pairs.

use uuid::Uuid;

use crate::error::{AppError, AppResult, FieldError};

#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish<T>(self, value: T) -> Result<T, AppError> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(AppError::Validation(self.0))
        }
    }

    /// Records `message` for `field` when `value` is `None`, passing the value through.
    pub fn require<T>(&mut self, field: &str, value: Option<T>, message: &str) -> Option<T> {
        if value.is_none() {
            self.push(field, message);
        }
        value
    }

    pub fn min_chars(&mut self, field: &str, value: &str, min: usize) -> bool {
        if value.trim().chars().count() < min {
            self.push(field, format!("must contain at least {min} characters"));
            false
        } else {
            true
        }
    }

    pub fn uuid(&mut self, field: &str, raw: &str) -> Option<Uuid> {
        match Uuid::parse_str(raw.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                self.push(field, "must be a valid UUID");
                None
            }
        }
    }
}

/// Parses an identifier supplied outside a form, such as a path segment.
pub fn parse_uuid(field: &str, raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::validation(field, "must be a valid UUID"))
}
