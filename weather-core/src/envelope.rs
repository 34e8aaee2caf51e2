use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Uniform success/failure wrapper returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { status: true, message: "OK".to_string(), data: Some(data) }
    }

    pub fn failure(err: &Error) -> Self {
        Self { status: false, message: err.user_message(), data: None }
    }

    pub fn from_result(result: &Result<T, Error>) -> Self
    where
        T: Clone,
    {
        match result {
            Ok(data) => Self::ok(data.clone()),
            Err(e) => Self::failure(e),
        }
    }
}
