use gamekey_engine::{
    traits::{NotifierError, PaymentProviderError},
    ReconcileError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Could not initialize the worker. {0}")]
    InitializeError(String),
    #[error("Invalid worker configuration. {0}")]
    ConfigurationError(String),
    #[error("Database error. {0}")]
    DatabaseError(String),
    #[error("Payment provider error. {0}")]
    ProviderError(#[from] PaymentProviderError),
    #[error("Notification error. {0}")]
    NotifierError(#[from] NotifierError),
    #[error("Reconciliation error. {0}")]
    ReconcileError(#[from] ReconcileError),
    #[error("An I/O error happened in the worker. {0}")]
    IOError(#[from] std::io::Error),
}
