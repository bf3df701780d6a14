pub mod models;
pub mod service;

pub use models::{
    CloneTransactionDto, CreateTransactionDto, Transaction, TransactionType, UpdateTransactionDto,
};
pub use service::{TransactionService, DAILY_TRANSACTION_LIMIT};
