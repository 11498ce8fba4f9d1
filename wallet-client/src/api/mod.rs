pub mod decode;
pub mod service;
pub mod types;

pub use service::{ApiService, SendRequest, TransactionQuery, DEFAULT_TRANSACTION_PAGE};
