use super::smb::{SmbEntry, SmbOptions, SmbSession};
use super::ConnectionParams;
use crate::error::{ConnectorError, ConnectorResult};
use std::fs;
use std::path::Path;
use std::process::Command;

// NT status codes that mean the session itself could not be established
const CONNECTION_STATUSES: &[&str] = &[
    "NT_STATUS_LOGON_FAILURE",
    "NT_STATUS_ACCOUNT_DISABLED",
    "NT_STATUS_BAD_NETWORK_NAME",
    "NT_STATUS_CONNECTION_REFUSED",
    "NT_STATUS_HOST_UNREACHABLE",
    "NT_STATUS_IO_TIMEOUT",
    "NT_STATUS_NETWORK_UNREACHABLE",
];

const ALREADY_EXISTS_STATUS: &str = "NT_STATUS_OBJECT_NAME_COLLISION";

/// [`SmbSession`] that runs one `smbclient` process per operation against
/// `//<remote_name>/<share>` at the configured host and port.
pub struct SmbClientSession {
    host: String,
    port: u16,
    username: String,
    password: String,
    remote_name: String,
    my_name: String,
    share: String,
}

impl SmbClientSession {
    pub fn new(params: &ConnectionParams, options: &SmbOptions) -> Self {
        Self {
            host: params.host.clone(),
            port: params.port,
            username: params.username.clone(),
            password: params.password.clone(),
            remote_name: options.remote_name.clone(),
            my_name: options.my_name.clone(),
            share: options.shared_folder.clone(),
        }
    }

    fn service(&self) -> String {
        format!("//{}/{}", self.remote_name, self.share)
    }

    fn command(&self, script: &str) -> Command {
        let mut cmd = Command::new("smbclient");
        cmd.arg(self.service())
            .arg("-I")
            .arg(&self.host)
            .arg("-p")
            .arg(self.port.to_string())
            .arg("-n")
            .arg(&self.my_name)
            .arg("-U")
            .arg(&self.username)
            .arg("-c")
            .arg(script);
        // Keeps the password off the process command line.
        cmd.env("PASSWD", &self.password);
        cmd
    }

    fn run(&self, script: &str) -> ConnectorResult<String> {
        log::debug!("smbclient {} -c '{}'", self.service(), script);
        let output = self.command(script).output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);

        if reports_failure(output.status.success(), &stdout, &stderr) {
            return Err(classify_failure(&format!("{}{}", stderr, stdout), script));
        }
        Ok(stdout)
    }

    fn check_smbclient_available() -> ConnectorResult<()> {
        let output = Command::new("smbclient").arg("--version").output();

        match output {
            Ok(output) if output.status.success() => Ok(()),
            _ => Err(ConnectorError::Connection(
                "smbclient not found. Please install samba-client package".to_string(),
            )),
        }
    }
}

impl SmbSession for SmbClientSession {
    fn connect(&mut self) -> ConnectorResult<()> {
        Self::check_smbclient_available()?;

        // Test the credentials and share by listing the root directory
        self.run("ls").map_err(|e| match e {
            e @ ConnectorError::Connection(_) => e,
            other => ConnectorError::Connection(other.to_string()),
        })?;
        Ok(())
    }

    fn close(&mut self) -> ConnectorResult<()> {
        // Nothing to tear down - each operation is its own smbclient session
        Ok(())
    }

    fn list_path(&mut self, path: &str) -> ConnectorResult<Vec<SmbEntry>> {
        let mask = if path.is_empty() {
            "*".to_string()
        } else {
            format!("{}/*", path.trim_end_matches('/'))
        };
        let output = self.run(&format!("ls {}", quote(&mask)?))?;
        Ok(parse_listing(&output))
    }

    fn retrieve_file(&mut self, path: &str, local: &Path) -> ConnectorResult<u64> {
        let target = quote(&local.to_string_lossy())?;
        self.run(&format!("get {} {}", quote(path)?, target))?;
        Ok(fs::metadata(local)?.len())
    }

    fn store_file(&mut self, path: &str, local: &Path) -> ConnectorResult<u64> {
        let size = fs::metadata(local)?.len();
        let source = quote(&local.to_string_lossy())?;
        self.run(&format!("put {} {}", source, quote(path)?))?;
        Ok(size)
    }

    fn delete_files(&mut self, pattern: &str, delete_folders: bool) -> ConnectorResult<()> {
        let verb = if delete_folders { "deltree" } else { "del" };
        self.run(&format!("{} {}", verb, quote(pattern)?))?;
        Ok(())
    }

    fn create_directory(&mut self, path: &str) -> ConnectorResult<()> {
        self.run(&format!("mkdir {}", quote(path)?))?;
        Ok(())
    }

    fn delete_directory(&mut self, path: &str) -> ConnectorResult<()> {
        self.run(&format!("rmdir {}", quote(path)?))?;
        Ok(())
    }
}

/// Quotes one argument of an smbclient command script.
fn quote(arg: &str) -> ConnectorResult<String> {
    if arg.contains('"') || arg.contains(';') {
        return Err(ConnectorError::Protocol(format!(
            "unsupported character in smbclient argument: {}",
            arg
        )));
    }
    Ok(format!("\"{}\"", arg))
}

/// smbclient exits 0 on some failed commands and reports them on a stdout
/// line of their own. Listed names may contain `NT_STATUS_` anywhere.
fn reports_failure(success: bool, stdout: &str, stderr: &str) -> bool {
    !success
        || stderr.contains("NT_STATUS_")
        || stdout.lines().any(|line| line.trim_start().starts_with("NT_STATUS_"))
}

fn classify_failure(output: &str, script: &str) -> ConnectorError {
    let status = output
        .split_whitespace()
        .find(|word| word.starts_with("NT_STATUS_"))
        .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_'));

    match status {
        Some(ALREADY_EXISTS_STATUS) => ConnectorError::AlreadyExists(script.to_string()),
        Some(code) if CONNECTION_STATUSES.contains(&code) => {
            ConnectorError::Connection(format!("{}: {}", script, code))
        }
        Some(code) => ConnectorError::Protocol(format!("{}: {}", script, code)),
        None => ConnectorError::Protocol(format!("{}: {}", script, output.trim())),
    }
}

fn parse_listing(output: &str) -> Vec<SmbEntry> {
    output.lines().filter_map(parse_list_line).collect()
}

/// Splits a line into whitespace-separated tokens with their byte offsets.
fn tokens(line: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, c) in line.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                tokens.push((s, &line[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push((s, &line[s..]));
    }
    tokens
}

fn is_attribute_token(token: &str) -> bool {
    token.chars().all(|c| "DAHSRNVI".contains(c))
}

/// Parses one line of `smbclient ls` output:
///
/// ```text
///   Documents                           D        0  Wed Dec 25 10:30:45 2024
///   report.pdf                          A     1024  Wed Dec 25 10:30:45 2024
/// ```
///
/// Columns are read from the right so names may contain spaces.
fn parse_list_line(line: &str) -> Option<SmbEntry> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.contains("blocks of size") {
        return None;
    }

    // name, attributes, size, then a five-token date
    let tokens = tokens(line);
    if tokens.len() < 7 {
        return None;
    }
    let size_index = tokens.len() - 6;
    tokens[size_index].1.parse::<u64>().ok()?;

    let (name_end, attributes) = match tokens[size_index - 1] {
        (offset, attrs) if size_index >= 2 && is_attribute_token(attrs) => (offset, attrs),
        (offset, name) => (offset + name.len(), ""),
    };
    let name = line[..name_end].trim();
    if name.is_empty() {
        return None;
    }

    Some(SmbEntry {
        filename: name.to_string(),
        is_directory: attributes.contains('D'),
        is_read_only: attributes.contains('R'),
    })
}
