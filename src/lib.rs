#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

//! A uniform file-operation contract over remote storage backends (FTP and
//! SMB/CIFS). Every backend implements [`Connector`]; protocol quirks stay
//! inside the backend.

pub mod config;
pub mod connector;
pub mod error;
pub mod utils;

pub use config::{Config, FtpConfig, SmbConfig};
pub use connector::ftp::{FtpConnector, FtpFile, FtpSession, SuppaFtpSession};
pub use connector::smb::{SmbConnector, SmbEntry, SmbFile, SmbOptions, SmbSession};
pub use connector::smbclient::SmbClientSession;
pub use connector::{Connected, ConnectionParams, Connector, FetchedFile, FileDescriptor};
pub use error::{ConnectorError, ConnectorResult};
