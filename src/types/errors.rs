// consensus/types/errors.rs
use thiserror::Error;

use crate::math::MathError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store read failed: {0}")]
    Read(String),
    #[error("store write failed: {0}")]
    Write(String),
}

/// Failure modes of a scoring call. Any error aborts the whole call with no
/// partial persistence; the surrounding state transition discards the writes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoringError {
    #[error("invalid address {address:?} in {context}")]
    InvalidAddress {
        context: &'static str,
        address: String,
    },
    #[error("arithmetic failure in {context}: {source}")]
    Arithmetic {
        context: &'static str,
        #[source]
        source: MathError,
    },
    #[error("store failure in {context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("bundle shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("sender {0} is not in the reputer whitelist")]
    NotInReputerWhitelist(String),
    #[error("empty payload: {0}")]
    EmptyPayload(&'static str),
}

impl ScoringError {
    pub fn arithmetic(context: &'static str, source: MathError) -> Self {
        ScoringError::Arithmetic { context, source }
    }

    pub fn store(context: &'static str, source: StoreError) -> Self {
        ScoringError::Store { context, source }
    }
}
