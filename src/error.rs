use std::io;
use thiserror::Error;

/// Errors raised by connectors.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Authentication or network setup failed while opening a session.
    #[error("connection failed: {0}")]
    Connection(String),

    /// An operation was issued before `open_connection` or after `close_connection`.
    #[error("connector is not connected")]
    NotConnected,

    /// The remote entry already exists.
    #[error("remote entry already exists: {0}")]
    AlreadyExists(String),

    /// The remote side rejected an operation.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O: {0}")]
    Io(#[from] io::Error),
}

impl ConnectorError {
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;
