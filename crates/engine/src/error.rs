//! The module contains the error the engine can throw.
//!
//! The errors mirror the failure taxonomy of the core:
//!
//! - [`Validation`] blocks a write locally, before it reaches the store.
//! - [`NotFound`] is thrown when an item is no longer present.
//! - [`ConstraintViolation`] is thrown when a write would break referential
//!   integrity (e.g. an entry insert racing a budget delete).
//! - [`Sync`] wraps a recoverable reconciliation failure.
//! - [`Collaboration`] is thrown for an invalid or expired collaboration code.
//!
//! [`Validation`]: EngineError::Validation
//! [`NotFound`]: EngineError::NotFound
//! [`ConstraintViolation`]: EngineError::ConstraintViolation
//! [`Sync`]: EngineError::Sync
//! [`Collaboration`]: EngineError::Collaboration
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("sync failed: {0}")]
    Sync(String),
    #[error("collaboration failed: {0}")]
    Collaboration(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::ConstraintViolation(a), Self::ConstraintViolation(b)) => a == b,
            (Self::Sync(a), Self::Sync(b)) => a == b,
            (Self::Collaboration(a), Self::Collaboration(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
