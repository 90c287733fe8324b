pub mod ftp;
pub mod scope;
pub mod smb;
pub mod smbclient;

use crate::error::ConnectorResult;
use std::io::Read;

pub use scope::{Connected, FetchedFile};

/// Host, port and credentials shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ConnectionParams {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Normalized metadata describing one remote directory entry.
pub trait FileDescriptor {
    fn name(&self) -> &str;
}

/// The operation set every remote storage backend supports.
///
/// A connector must be opened before any file operation and is unusable
/// after it has been closed; operations in either state fail with
/// [`ConnectorError::NotConnected`](crate::ConnectorError::NotConnected).
pub trait Connector {
    /// Descriptor type produced by [`Connector::get_all_files`].
    type File: FileDescriptor;
    /// Success indicator returned by [`Connector::upload_file`].
    type Upload;

    fn open_connection(&mut self) -> ConnectorResult<()>;

    fn close_connection(&mut self) -> ConnectorResult<()>;

    /// Lists the entries under `dirname`; an empty `dirname` means the
    /// connector's root. Ordering is whatever the backend returns.
    fn get_all_files(&mut self, dirname: &str) -> ConnectorResult<Vec<Self::File>>;

    /// Fetches `filename` into a temporary local store. The store is
    /// removed when the returned handle is dropped.
    fn get_file(&mut self, filename: &str) -> ConnectorResult<FetchedFile>;

    fn upload_file(&mut self, path: &str, source: &mut dyn Read) -> ConnectorResult<Self::Upload>;

    fn delete_file(&mut self, filename: &str) -> ConnectorResult<()>;

    /// Deletes every entry in `dirname` whose name ends with `extension`.
    /// Not atomic: the first failing delete aborts the rest.
    fn delete_files_by_extension(&mut self, extension: &str, dirname: &str) -> ConnectorResult<()>;

    /// Opens the connection, runs `f`, then closes the connection whether
    /// or not `f` succeeded. An error from `f` takes precedence over an
    /// error from closing.
    fn with_connection<T, F>(&mut self, f: F) -> ConnectorResult<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> ConnectorResult<T>,
    {
        self.open_connection()?;
        let result = f(self);
        let closed = self.close_connection();
        match (result, closed) {
            (Err(err), _) => Err(err),
            (Ok(_), Err(err)) => Err(err),
            (Ok(value), Ok(())) => Ok(value),
        }
    }
}
