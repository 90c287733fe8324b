use super::smbclient::SmbClientSession;
use super::{ConnectionParams, Connector, FetchedFile, FileDescriptor};
use crate::error::{ConnectorError, ConnectorResult};
use crate::utils::{join_remote, path_segments};
use std::io::{self, Read};
use std::path::Path;
use tempfile::NamedTempFile;

pub const DEFAULT_REMOTE_NAME: &str = "SHARE2";
pub const DEFAULT_MY_NAME: &str = "guest";

/// An SMB listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmbFile {
    pub name: String,
    pub is_dir: bool,
    pub read_only: bool,
}

impl FileDescriptor for SmbFile {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A raw directory entry as reported by the SMB session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmbEntry {
    pub filename: String,
    pub is_directory: bool,
    pub is_read_only: bool,
}

/// SMB share operations the connector relies on. Paths are relative to
/// the share root and `/`-separated.
#[cfg_attr(test, mockall::automock)]
pub trait SmbSession {
    fn connect(&mut self) -> ConnectorResult<()>;
    fn close(&mut self) -> ConnectorResult<()>;
    fn list_path(&mut self, path: &str) -> ConnectorResult<Vec<SmbEntry>>;
    /// Copies the remote file at `path` into the local file `local`.
    fn retrieve_file(&mut self, path: &str, local: &Path) -> ConnectorResult<u64>;
    /// Copies the local file `local` to `path`, returning the bytes written.
    fn store_file(&mut self, path: &str, local: &Path) -> ConnectorResult<u64>;
    /// Deletes the entries matching the wildcard `pattern`. Directories are
    /// only removed when `delete_folders` is set.
    fn delete_files(&mut self, pattern: &str, delete_folders: bool) -> ConnectorResult<()>;
    fn create_directory(&mut self, path: &str) -> ConnectorResult<()>;
    fn delete_directory(&mut self, path: &str) -> ConnectorResult<()>;
}

/// Share addressing for an [`SmbConnector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmbOptions {
    /// NetBIOS name of the remote machine.
    pub remote_name: String,
    /// NetBIOS name this client announces.
    pub my_name: String,
    pub shared_folder: String,
    /// Prefix applied to every path passed to the connector.
    pub work_dir: String,
}

impl SmbOptions {
    pub fn new(shared_folder: impl Into<String>, work_dir: impl Into<String>) -> Self {
        Self {
            remote_name: DEFAULT_REMOTE_NAME.to_string(),
            my_name: DEFAULT_MY_NAME.to_string(),
            shared_folder: shared_folder.into(),
            work_dir: work_dir.into(),
        }
    }
}

/// Connector over an SMB/CIFS share, rooted at a working directory.
pub struct SmbConnector<S: SmbSession = SmbClientSession> {
    params: ConnectionParams,
    options: SmbOptions,
    session: S,
    connected: bool,
}

impl SmbConnector {
    pub fn new(params: ConnectionParams, options: SmbOptions) -> Self {
        let session = SmbClientSession::new(&params, &options);
        Self::with_session(params, options, session)
    }
}

impl<S: SmbSession> SmbConnector<S> {
    pub fn with_session(params: ConnectionParams, options: SmbOptions, session: S) -> Self {
        Self {
            params,
            options,
            session,
            connected: false,
        }
    }

    pub const fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub const fn options(&self) -> &SmbOptions {
        &self.options
    }

    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    fn session(&mut self) -> ConnectorResult<&mut S> {
        if self.connected {
            Ok(&mut self.session)
        } else {
            Err(ConnectorError::NotConnected)
        }
    }

    fn full_path(&self, path: &str) -> String {
        join_remote(&self.options.work_dir, path)
    }

    /// Same as [`Connector::open_connection`].
    pub fn create_connection(&mut self) -> ConnectorResult<()> {
        self.open_connection()
    }

    /// Deletes every entry under the working directory matching
    /// `file_pattern`, including directories when `delete_folders` is set.
    pub fn delete_files(&mut self, file_pattern: &str, delete_folders: bool) -> ConnectorResult<()> {
        let pattern = self.full_path(file_pattern);
        log::debug!("delete {} (folders: {})", pattern, delete_folders);
        self.session()?.delete_files(&pattern, delete_folders)
    }

    /// Deletes `*.<extension>` directly under the working directory. A
    /// leading dot on `extension` is ignored.
    ///
    /// `_dirname` is accepted for parity with [`Connector`] but is not
    /// applied: the mask is always rooted at `work_dir`.
    pub fn delete_by_extension(
        &mut self,
        extension: &str,
        _dirname: &str,
        delete_folders: bool,
    ) -> ConnectorResult<()> {
        let mask = format!("*.{}", extension.trim_start_matches('.'));
        self.delete_files(&mask, delete_folders)
    }

    /// Creates every missing component of `work_dir/path`. Components that
    /// already exist are skipped; any other failure is returned.
    pub fn create_dir(&mut self, path: &str) -> ConnectorResult<()> {
        let full_path = self.full_path(path);
        let session = self.session()?;
        let mut current = String::new();
        for segment in path_segments(&full_path) {
            current = join_remote(&current, segment);
            match session.create_directory(&current) {
                Ok(()) => log::debug!("created directory {}", current),
                Err(e) if e.is_already_exists() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn delete_dir(&mut self, path: &str) -> ConnectorResult<()> {
        let full_path = self.full_path(path);
        log::debug!("rmdir {}", full_path);
        self.session()?.delete_directory(&full_path)
    }

    pub fn copy_file(&mut self, old_path: &str, new_path: &str) -> ConnectorResult<()> {
        let full_old_path = self.full_path(old_path);
        let full_new_path = self.full_path(new_path);
        let session = self.session()?;

        let staging = NamedTempFile::new()?;
        session.retrieve_file(&full_old_path, staging.path())?;
        let size = session.store_file(&full_new_path, staging.path())?;
        log::debug!("copied {} to {} ({} bytes)", full_old_path, full_new_path, size);
        Ok(())
    }

    /// Copies `old_path` to `new_path`, then deletes `old_path`. If the
    /// delete fails the content is left at both paths.
    pub fn move_file(&mut self, old_path: &str, new_path: &str) -> ConnectorResult<()> {
        self.copy_file(old_path, new_path)?;
        let full_old_path = self.full_path(old_path);
        self.session()?.delete_files(&full_old_path, false)
    }
}

impl<S: SmbSession> Connector for SmbConnector<S> {
    type File = SmbFile;
    type Upload = bool;

    fn open_connection(&mut self) -> ConnectorResult<()> {
        log::info!(
            "connecting to //{}/{} at {}:{}",
            self.options.remote_name,
            self.options.shared_folder,
            self.params.host,
            self.params.port
        );
        self.session.connect()?;
        self.connected = true;
        Ok(())
    }

    fn close_connection(&mut self) -> ConnectorResult<()> {
        self.session()?;
        self.connected = false;
        log::info!("closing //{}/{}", self.options.remote_name, self.options.shared_folder);
        self.session.close()
    }

    fn get_all_files(&mut self, dirname: &str) -> ConnectorResult<Vec<SmbFile>> {
        let full_path = self.full_path(dirname);
        let entries = self.session()?.list_path(&full_path)?;
        Ok(entries
            .into_iter()
            .filter(|entry| !(entry.is_directory && matches!(entry.filename.as_str(), "." | "..")))
            .map(|entry| SmbFile {
                name: entry.filename,
                is_dir: entry.is_directory,
                read_only: entry.is_read_only,
            })
            .collect())
    }

    fn get_file(&mut self, path: &str) -> ConnectorResult<FetchedFile> {
        let full_path = self.full_path(path);
        let session = self.session()?;
        let mut fetched = FetchedFile::new()?;
        let size = session.retrieve_file(&full_path, fetched.path())?;
        fetched.rewind()?;
        log::debug!("retrieved {}: {} bytes", full_path, size);
        Ok(fetched)
    }

    /// Returns `true` when a non-zero byte count was written. An empty
    /// source therefore reports `false` as well.
    fn upload_file(&mut self, path: &str, source: &mut dyn Read) -> ConnectorResult<bool> {
        let full_path = self.full_path(path);
        let session = self.session()?;

        let mut staging = NamedTempFile::new()?;
        io::copy(source, staging.as_file_mut())?;
        let size = session.store_file(&full_path, staging.path())?;
        log::debug!("stored {}: {} bytes", full_path, size);
        Ok(size > 0)
    }

    fn delete_file(&mut self, filename: &str) -> ConnectorResult<()> {
        self.delete_files(filename, false)
    }

    fn delete_files_by_extension(&mut self, extension: &str, dirname: &str) -> ConnectorResult<()> {
        self.delete_by_extension(extension, dirname, false)
    }
}
