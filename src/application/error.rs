use thiserror::Error;

use crate::domain::{Cents, LedgerError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Username already registered: {0}")]
    UsernameTaken(String),

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Category already exists: {0}")]
    CategoryAlreadyExists(String),

    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Cents, required: Cents },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("No fields to update")]
    NothingToUpdate,

    #[error("Account '{username}' is not allowed to {action}")]
    PermissionDenied { username: String, action: String },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds { balance, required } => {
                AppError::InsufficientFunds { balance, required }
            }
            LedgerError::NonPositiveAmount(amount) => {
                AppError::InvalidAmount(format!("amount must be positive, got {} cents", amount))
            }
        }
    }
}
