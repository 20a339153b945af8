//! Unified application error model and mapping helpers.
//! This module provides a common error enum raised by the filesystem index,
//! along with the mapping the HTTP adapter uses to turn failures into status
//! codes. The index itself never encodes HTTP concepts.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Malformed or disallowed input, e.g. an invalid path or root deletion.
    InvalidArgument { code: String, message: String },
    /// The target path is absent.
    NotFound { code: String, message: String },
    /// The target path is already occupied where uniqueness is required.
    Conflict { code: String, message: String },
    /// The operation expected a Folder/File but found the other kind.
    TypeConflict { code: String, message: String },
    /// Unexpected failure, e.g. an upload stream error.
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::InvalidArgument { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::TypeConflict { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::InvalidArgument { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::TypeConflict { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn invalid<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::InvalidArgument { code: code.into(), message: msg.into() } }
    pub fn not_found<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn type_conflict<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::TypeConflict { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::InvalidArgument { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::TypeConflict { .. } => 409,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::invalid("bad_path", "oops").http_status(), 400);
        assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
        assert_eq!(AppError::conflict("conflict", "dup").http_status(), 409);
        assert_eq!(AppError::type_conflict("type_conflict", "kind").http_status(), 409);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn code_and_message_accessors() {
        let e = AppError::conflict("path_exists", "/a already exists");
        assert_eq!(e.code_str(), "path_exists");
        assert_eq!(e.message(), "/a already exists");
        assert_eq!(format!("{}", e), "path_exists: /a already exists");
    }
}
