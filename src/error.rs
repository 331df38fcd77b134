use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuretyErrorKind {
    Unauthorized,
    SystemPaused,
    SponsorNotActive,
    InsufficientFunds,
    DuplicateVote,
    DuplicateResponse,
    DuplicatePurchase,
    AlreadyFinalized,
    IndexMismatch,
    NoCredit,
    InvalidAmount,
    NotFound,
    AlreadyExists,
    InvalidState,
    InvalidRequest,
    Arithmetic,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuretyError {
    pub kind: SuretyErrorKind,
    pub message: String,
}

impl SuretyError {
    pub fn new(kind: SuretyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SuretyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SuretyError {}

pub fn unauthorized(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::Unauthorized, message)
}

pub fn system_paused() -> SuretyError {
    SuretyError::new(
        SuretyErrorKind::SystemPaused,
        "flight surety is not operational",
    )
}

pub fn sponsor_not_active(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::SponsorNotActive, message)
}

pub fn insufficient_funds(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::InsufficientFunds, message)
}

pub fn duplicate_vote(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::DuplicateVote, message)
}

pub fn duplicate_response(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::DuplicateResponse, message)
}

pub fn duplicate_purchase(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::DuplicatePurchase, message)
}

pub fn already_finalized(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::AlreadyFinalized, message)
}

pub fn index_mismatch(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::IndexMismatch, message)
}

pub fn no_credit(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::NoCredit, message)
}

pub fn invalid_amount(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::InvalidAmount, message)
}

pub fn not_found(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::NotFound, message)
}

pub fn already_exists(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::AlreadyExists, message)
}

pub fn invalid_state(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::InvalidState, message)
}

pub fn invalid_request(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::InvalidRequest, message)
}

pub fn arithmetic_error(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::Arithmetic, message)
}

pub fn internal_error(message: impl Into<String>) -> SuretyError {
    SuretyError::new(SuretyErrorKind::Internal, message)
}
