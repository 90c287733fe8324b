use super::{ConnectionParams, Connector, FetchedFile, FileDescriptor};
use crate::error::{ConnectorError, ConnectorResult};
use crate::utils::join_remote;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// An FTP listing entry. NLST only reports names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpFile {
    pub name: String,
}

impl FileDescriptor for FtpFile {
    fn name(&self) -> &str {
        &self.name
    }
}

/// The FTP control-connection operations the connector relies on.
pub trait FtpSession {
    fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> ConnectorResult<()>;
    fn login(&mut self, username: &str, password: &str) -> ConnectorResult<()>;
    /// RETR `path`, streaming the data connection into `sink`.
    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> ConnectorResult<u64>;
    /// STOR `path` from `source`, returning the bytes sent.
    fn store(&mut self, path: &str, source: &mut dyn Read) -> ConnectorResult<u64>;
    /// NLST `dir`, or the current directory when `dir` is `None`.
    fn name_list(&mut self, dir: Option<&str>) -> ConnectorResult<Vec<String>>;
    fn delete(&mut self, path: &str) -> ConnectorResult<()>;
    fn quit(&mut self) -> ConnectorResult<()>;
}

impl From<FtpError> for ConnectorError {
    fn from(err: FtpError) -> Self {
        match err {
            FtpError::ConnectionError(e) => Self::Io(e),
            other => Self::Protocol(other.to_string()),
        }
    }
}

/// [`FtpSession`] backed by a blocking `suppaftp` stream.
#[derive(Default)]
pub struct SuppaFtpSession {
    stream: Option<FtpStream>,
}

impl SuppaFtpSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn stream(&mut self) -> ConnectorResult<&mut FtpStream> {
        self.stream.as_mut().ok_or(ConnectorError::NotConnected)
    }

    fn resolve(host: &str, port: u16) -> ConnectorResult<SocketAddr> {
        (host, port)
            .to_socket_addrs()
            .map_err(|e| ConnectorError::Connection(format!("{}:{}: {}", host, port, e)))?
            .next()
            .ok_or_else(|| ConnectorError::Connection(format!("{}:{}: no address", host, port)))
    }
}

impl FtpSession for SuppaFtpSession {
    fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> ConnectorResult<()> {
        let addr = Self::resolve(host, port)?;
        let stream = FtpStream::connect_timeout(addr, timeout)
            .map_err(|e| ConnectorError::Connection(format!("{}: {}", addr, e)))?;
        stream.get_ref().set_read_timeout(Some(timeout))?;
        stream.get_ref().set_write_timeout(Some(timeout))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn login(&mut self, username: &str, password: &str) -> ConnectorResult<()> {
        let stream = self.stream()?;
        stream
            .login(username, password)
            .map_err(|e| ConnectorError::Connection(e.to_string()))?;
        stream.transfer_type(FileType::Binary)?;
        Ok(())
    }

    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> ConnectorResult<u64> {
        let written = self.stream()?.retr(path, |reader| {
            io::copy(reader, &mut *sink).map_err(FtpError::ConnectionError)
        })?;
        Ok(written)
    }

    fn store(&mut self, path: &str, mut source: &mut dyn Read) -> ConnectorResult<u64> {
        Ok(self.stream()?.put_file(path, &mut source)?)
    }

    fn name_list(&mut self, dir: Option<&str>) -> ConnectorResult<Vec<String>> {
        Ok(self.stream()?.nlst(dir)?)
    }

    fn delete(&mut self, path: &str) -> ConnectorResult<()> {
        Ok(self.stream()?.rm(path)?)
    }

    fn quit(&mut self) -> ConnectorResult<()> {
        let mut stream = self.stream.take().ok_or(ConnectorError::NotConnected)?;
        Ok(stream.quit()?)
    }
}

/// Connector over a stateful FTP control connection.
///
/// NLST replies are decoded as UTF-8 lossily, so names containing non-ASCII
/// Latin-1 bytes come back with U+FFFD in place of those bytes. A later
/// `get_file` or `delete_file` on such a name fails with a 550.
pub struct FtpConnector<S: FtpSession = SuppaFtpSession> {
    params: ConnectionParams,
    timeout: Duration,
    session: S,
    connected: bool,
}

impl FtpConnector {
    pub fn new(params: ConnectionParams) -> Self {
        Self::with_session(params, SuppaFtpSession::new())
    }
}

impl<S: FtpSession> FtpConnector<S> {
    pub fn with_session(params: ConnectionParams, session: S) -> Self {
        Self {
            params,
            timeout: DEFAULT_TIMEOUT,
            session,
            connected: false,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn params(&self) -> &ConnectionParams {
        &self.params
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
}

impl<S: FtpSession> Connector for FtpConnector<S> {
    type File = FtpFile;
    type Upload = u64;

    fn open_connection(&mut self) -> ConnectorResult<()> {
        let ConnectionParams {
            host,
            port,
            username,
            password,
        } = &self.params;
        log::info!("connecting to ftp://{}:{}", host, port);
        self.session.connect(host, *port, self.timeout)?;
        if let Err(err) = self.session.login(username, password) {
            if let Err(quit_err) = self.session.quit() {
                log::warn!("failed to quit ftp://{}:{} after login error: {}", host, port, quit_err);
            }
            return Err(err);
        }
        self.connected = true;
        Ok(())
    }

    fn close_connection(&mut self) -> ConnectorResult<()> {
        self.session()?;
        self.connected = false;
        log::info!("closing ftp://{}:{}", self.params.host, self.params.port);
        self.session.quit()
    }

    fn get_all_files(&mut self, dirname: &str) -> ConnectorResult<Vec<FtpFile>> {
        let dir = (!dirname.is_empty()).then_some(dirname);
        let names = self.session()?.name_list(dir)?;
        log::debug!("NLST {:?}: {} entries", dirname, names.len());
        Ok(names.into_iter().map(|name| FtpFile { name }).collect())
    }

    fn get_file(&mut self, filename: &str) -> ConnectorResult<FetchedFile> {
        let session = self.session()?;
        let mut fetched = FetchedFile::new()?;
        let size = session.retrieve(filename, fetched.writer())?;
        fetched.rewind()?;
        log::debug!("RETR {}: {} bytes", filename, size);
        Ok(fetched)
    }

    fn upload_file(&mut self, path: &str, source: &mut dyn Read) -> ConnectorResult<u64> {
        let size = self.session()?.store(path, source)?;
        log::debug!("STOR {}: {} bytes", path, size);
        Ok(size)
    }

    fn delete_file(&mut self, filename: &str) -> ConnectorResult<()> {
        log::debug!("DELE {}", filename);
        self.session()?.delete(filename)
    }

    fn delete_files_by_extension(&mut self, extension: &str, dirname: &str) -> ConnectorResult<()> {
        let targets: Vec<String> = self
            .get_all_files(dirname)?
            .into_iter()
            .filter(|file| file.name.ends_with(extension))
            .map(|file| {
                // Some servers answer NLST with bare names, others with the directory prefix.
                if file.name.contains('/') {
                    file.name
                } else {
                    join_remote(dirname, &file.name)
                }
            })
            .collect();

        for target in targets {
            self.delete_file(&target)?;
        }
        Ok(())
    }
}
