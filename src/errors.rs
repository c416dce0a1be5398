//! Error types for the crate.
//!
//! This module defines the low-level statuses an [`Engine`](crate::engine::Engine)
//! reports for a single entry point, as well as the high-level `Error` type
//! returned by every context, value and dispatcher operation.
//!
//! The errors are implemented with `thiserror` so they are easy to convert
//! and debug in higher-level code.
//!
//! # Examples
//!
//! ```rust
//! use pairing_arena::errors::{EngineError, Error};
//!
//! let err: Error = EngineError::NotInitialized.into();
//! assert!(matches!(err, Error::Engine(EngineError::NotInitialized)));
//! ```

use thiserror::Error;

use crate::value::Kind;

/// Statuses reported by an engine entry point.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum EngineError {
    #[error("engine used before curve initialization")]
    NotInitialized,
    #[error("engine curve already initialized")]
    AlreadyInitialized,
    #[error("unsupported curve: {0}")]
    UnsupportedCurve(&'static str),
    #[error("entry point {entry} is not defined for {kind}")]
    UnsupportedEntry { entry: &'static str, kind: Kind },
    #[error("pointer range outside engine memory")]
    OutOfBounds,
    #[error("invalid encoding: {0}")]
    InvalidEncoding(&'static str),
    #[error("output buffer too small: need {needed}, have {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },
    #[error("hash to curve failed")]
    HashToCurve,
}

/// High-level errors returned by the crate API.
#[derive(Debug, Error)]
pub enum Error {
    #[error("marshaling failure: {0}")]
    Marshal(String),
    #[error("type mismatch: {op} is not defined for ({lhs}, {rhs})")]
    TypeMismatch {
        op: &'static str,
        lhs: Kind,
        rhs: Kind,
    },
    #[error("deserialization failure: {0}")]
    Deserialize(&'static str),
    #[error("sharing length mismatch: {ids} ids, {shares} shares")]
    SharingLength { ids: usize, shares: usize },
    #[error("{capability} is not supported for {kind}")]
    Unsupported {
        capability: &'static str,
        kind: Kind,
    },
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("empty input: {0}")]
    EmptyInput(&'static str),
    #[error("hex decoding failure: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("context is busy with another operation")]
    Busy,
    #[error("precomputed table belongs to a different context")]
    ForeignTable,
}

impl Error {
    /// Maps a decoding status of the engine onto [`Error::Deserialize`],
    /// leaving every other error untouched.
    pub(crate) fn into_deserialize(self, what: &'static str) -> Self {
        match self {
            Error::Engine(EngineError::InvalidEncoding(_)) => Error::Deserialize(what),
            other => other,
        }
    }
}
