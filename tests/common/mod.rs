#![allow(dead_code)]

use remote_connectors::utils::{glob_match, split_parent};
use remote_connectors::{
    ConnectionParams, ConnectorError, ConnectorResult, FtpConnector, FtpSession, SmbConnector, SmbEntry,
    SmbOptions, SmbSession,
};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// In-memory FTP server state shared between a test and its session.
#[derive(Debug, Default)]
pub struct FtpState {
    pub files: BTreeMap<String, Vec<u8>>,
    pub refuse_connections: bool,
    pub fail_delete: HashSet<String>,
    pub deleted: Vec<String>,
    pub connected: bool,
    pub password: String,
}

#[derive(Clone, Default)]
pub struct MemoryFtp {
    state: Arc<Mutex<FtpState>>,
}

impl MemoryFtp {
    pub fn new() -> Self {
        let ftp = Self::default();
        ftp.state().password = "secret".to_string();
        ftp
    }

    pub fn state(&self) -> MutexGuard<'_, FtpState> {
        self.state.lock().unwrap()
    }

    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.state().files.insert(path.to_string(), data.to_vec());
        self
    }

    pub fn connector(&self) -> FtpConnector<Self> {
        FtpConnector::with_session(
            ConnectionParams::new("127.0.0.1", 21, "user", "secret"),
            self.clone(),
        )
    }
}

fn ftp_unavailable(path: &str) -> ConnectorError {
    ConnectorError::Protocol(format!("Invalid response: [550] {}: No such file or directory", path))
}

impl FtpSession for MemoryFtp {
    fn connect(&mut self, host: &str, port: u16, _timeout: Duration) -> ConnectorResult<()> {
        let mut state = self.state();
        if state.refuse_connections {
            return Err(ConnectorError::Connection(format!("{}:{}: connection refused", host, port)));
        }
        state.connected = true;
        Ok(())
    }

    fn login(&mut self, _username: &str, password: &str) -> ConnectorResult<()> {
        if self.state().password != password {
            return Err(ConnectorError::Connection("530 Login incorrect".to_string()));
        }
        Ok(())
    }

    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> ConnectorResult<u64> {
        let data = self.state().files.get(path).cloned().ok_or_else(|| ftp_unavailable(path))?;
        // Deliver in small chunks the way a data connection would
        for chunk in data.chunks(4) {
            sink.write_all(chunk)?;
        }
        Ok(data.len() as u64)
    }

    fn store(&mut self, path: &str, source: &mut dyn Read) -> ConnectorResult<u64> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        let size = data.len() as u64;
        self.state().files.insert(path.to_string(), data);
        Ok(size)
    }

    fn name_list(&mut self, dir: Option<&str>) -> ConnectorResult<Vec<String>> {
        let dir = dir.unwrap_or("").trim_end_matches('/');
        Ok(self
            .state()
            .files
            .keys()
            .filter_map(|path| {
                let (parent, name) = split_parent(path);
                (parent == dir).then(|| name.to_string())
            })
            .collect())
    }

    fn delete(&mut self, path: &str) -> ConnectorResult<()> {
        let mut state = self.state();
        if state.fail_delete.contains(path) {
            return Err(ConnectorError::Protocol(format!("Invalid response: [550] {}: Permission denied", path)));
        }
        state.files.remove(path).ok_or_else(|| ftp_unavailable(path))?;
        state.deleted.push(path.to_string());
        Ok(())
    }

    fn quit(&mut self) -> ConnectorResult<()> {
        self.state().connected = false;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Dir,
    File { data: Vec<u8>, read_only: bool },
}

/// In-memory SMB share state shared between a test and its session.
#[derive(Debug, Default)]
pub struct ShareState {
    pub entries: BTreeMap<String, Node>,
    pub fail_delete: HashSet<String>,
    pub connected: bool,
    pub closed: bool,
}

impl ShareState {
    fn is_dir(&self, path: &str) -> bool {
        path.is_empty() || self.entries.get(path) == Some(&Node::Dir)
    }

    fn children(&self, dir: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter(|path| split_parent(path).0 == dir)
            .cloned()
            .collect()
    }

    fn remove_tree(&mut self, path: &str) {
        let prefix = format!("{}/", path);
        self.entries.retain(|key, _| key != path && !key.starts_with(&prefix));
    }
}

fn nt_status(code: &str, path: &str) -> ConnectorError {
    ConnectorError::Protocol(format!("{}: {}", path, code))
}

#[derive(Clone, Default)]
pub struct MemoryShare {
    state: Arc<Mutex<ShareState>>,
}

impl MemoryShare {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, ShareState> {
        self.state.lock().unwrap()
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.state().entries.insert(path.to_string(), Node::Dir);
        self
    }

    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.state().entries.insert(
            path.to_string(),
            Node::File {
                data: data.to_vec(),
                read_only: false,
            },
        );
        self
    }

    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        match self.state().entries.get(path) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state().entries.contains_key(path)
    }

    pub fn connector(&self, work_dir: &str) -> SmbConnector<Self> {
        SmbConnector::with_session(
            ConnectionParams::new("127.0.0.1", 445, "user", "secret"),
            SmbOptions::new("share", work_dir),
            self.clone(),
        )
    }
}

impl SmbSession for MemoryShare {
    fn connect(&mut self) -> ConnectorResult<()> {
        self.state().connected = true;
        Ok(())
    }

    fn close(&mut self) -> ConnectorResult<()> {
        let mut state = self.state();
        state.connected = false;
        state.closed = true;
        Ok(())
    }

    fn list_path(&mut self, path: &str) -> ConnectorResult<Vec<SmbEntry>> {
        let state = self.state();
        if !state.is_dir(path) {
            return Err(nt_status("NT_STATUS_OBJECT_NAME_NOT_FOUND", path));
        }
        let dots = [".", ".."].into_iter().map(|name| SmbEntry {
            filename: name.to_string(),
            is_directory: true,
            is_read_only: false,
        });
        let children = state.children(path).into_iter().map(|child| {
            let node = &state.entries[&child];
            SmbEntry {
                filename: split_parent(&child).1.to_string(),
                is_directory: *node == Node::Dir,
                is_read_only: matches!(node, Node::File { read_only: true, .. }),
            }
        });
        Ok(dots.chain(children).collect())
    }

    fn retrieve_file(&mut self, path: &str, local: &Path) -> ConnectorResult<u64> {
        let data = match self.state().entries.get(path) {
            Some(Node::File { data, .. }) => data.clone(),
            _ => return Err(nt_status("NT_STATUS_OBJECT_NAME_NOT_FOUND", path)),
        };
        fs::write(local, &data)?;
        Ok(data.len() as u64)
    }

    fn store_file(&mut self, path: &str, local: &Path) -> ConnectorResult<u64> {
        let data = fs::read(local)?;
        let mut state = self.state();
        if !state.is_dir(split_parent(path).0) {
            return Err(nt_status("NT_STATUS_OBJECT_PATH_NOT_FOUND", path));
        }
        if let Some(Node::File { read_only: true, .. }) = state.entries.get(path) {
            return Err(nt_status("NT_STATUS_ACCESS_DENIED", path));
        }
        let size = data.len() as u64;
        state.entries.insert(
            path.to_string(),
            Node::File {
                data,
                read_only: false,
            },
        );
        Ok(size)
    }

    fn delete_files(&mut self, pattern: &str, delete_folders: bool) -> ConnectorResult<()> {
        let mut state = self.state();
        if state.fail_delete.contains(pattern) {
            return Err(nt_status("NT_STATUS_SHARING_VIOLATION", pattern));
        }
        let (parent, mask) = split_parent(pattern);
        let matched: Vec<String> = state
            .children(parent)
            .into_iter()
            .filter(|child| glob_match(split_parent(child).1, mask))
            .filter(|child| delete_folders || state.entries[child] != Node::Dir)
            .collect();
        if matched.is_empty() {
            return Err(nt_status("NT_STATUS_NO_SUCH_FILE", pattern));
        }
        for path in matched {
            state.remove_tree(&path);
        }
        Ok(())
    }

    fn create_directory(&mut self, path: &str) -> ConnectorResult<()> {
        let mut state = self.state();
        if state.entries.contains_key(path) {
            return Err(ConnectorError::AlreadyExists(path.to_string()));
        }
        if !state.is_dir(split_parent(path).0) {
            return Err(nt_status("NT_STATUS_OBJECT_PATH_NOT_FOUND", path));
        }
        state.entries.insert(path.to_string(), Node::Dir);
        Ok(())
    }

    fn delete_directory(&mut self, path: &str) -> ConnectorResult<()> {
        let mut state = self.state();
        if path.is_empty() || !state.is_dir(path) {
            return Err(nt_status("NT_STATUS_OBJECT_NAME_NOT_FOUND", path));
        }
        if !state.children(path).is_empty() {
            return Err(nt_status("NT_STATUS_DIRECTORY_NOT_EMPTY", path));
        }
        state.entries.remove(path);
        Ok(())
    }
}
