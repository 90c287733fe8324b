use super::Connector;
use crate::error::ConnectorResult;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use tempfile::NamedTempFile;

/// An open connector that closes itself when dropped.
pub struct Connected<C: Connector> {
    connector: C,
    closed: bool,
}

impl<C: Connector> Connected<C> {
    pub fn open(mut connector: C) -> ConnectorResult<Self> {
        connector.open_connection()?;
        Ok(Self {
            connector,
            closed: false,
        })
    }

    /// Closes the connection now, surfacing any error instead of logging it.
    pub fn close(mut self) -> ConnectorResult<()> {
        self.closed = true;
        self.connector.close_connection()
    }
}

impl<C: Connector> Deref for Connected<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.connector
    }
}

impl<C: Connector> DerefMut for Connected<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.connector
    }
}

impl<C: Connector> Drop for Connected<C> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.connector.close_connection() {
            log::warn!("failed to close connection on drop: {}", e);
        }
    }
}

/// A remote file copied into a local temporary store.
///
/// Reads start at the beginning of the content. The temporary store is
/// deleted when the handle is dropped.
#[derive(Debug)]
pub struct FetchedFile {
    file: NamedTempFile,
}

impl FetchedFile {
    pub(crate) fn new() -> io::Result<Self> {
        Ok(Self {
            file: NamedTempFile::new()?,
        })
    }

    /// Location of the temporary store; valid only while the handle lives.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub(crate) fn writer(&mut self) -> &mut dyn Write {
        self.file.as_file_mut()
    }

    /// Positions the handle at the start of the content.
    pub(crate) fn rewind(&mut self) -> io::Result<()> {
        self.file.as_file_mut().seek(SeekFrom::Start(0)).map(|_| ())
    }

    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.as_file().metadata()?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        self.file.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl Read for FetchedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for FetchedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}
