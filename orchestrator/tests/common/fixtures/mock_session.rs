//! Scripted remote sessions for testing
//!
//! `MockConnector` hands out sessions that answer commands from per-host rules
//! (substring match, first rule wins) and otherwise interpret the handful of
//! shell commands the deploy pipeline issues against a simulated web root.
//! Nothing here opens a socket.

use async_trait::async_trait;
use orchestrator::errors::SessionError;
use orchestrator::remote::{CommandOutput, Credentials, RemoteSession, SessionConnector};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const LIVE_GLOB: &str = "/usr/local/nginx/html/*";
const BACKUP_DIR: &str = "/usr/local/nginx/backup/";

#[derive(Debug, Clone)]
pub enum MockReply {
    Output {
        stdout: String,
        stderr: String,
        exit_code: u32,
    },
    /// Never answers; the caller's timeout has to fire
    Hang,
    Error(SessionError),
}

impl MockReply {
    pub fn ok(stdout: &str) -> Self {
        MockReply::Output {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub fn fail(exit_code: u32, stderr: &str) -> Self {
        MockReply::Output {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code,
        }
    }
}

/// Simulated remote filesystem: file names in the live tree and per backup
#[derive(Debug, Clone, Default)]
pub struct RemoteFs {
    pub live: Vec<String>,
    pub backups: BTreeMap<String, Vec<String>>,
    pub staged: Vec<String>,
    pub uploaded: bool,
}

#[derive(Default)]
struct HostState {
    rules: Vec<(String, MockReply)>,
    connect_error: Option<SessionError>,
    connect_hangs: bool,
    fs: RemoteFs,
    commands: Vec<String>,
}

#[derive(Clone, Default)]
pub struct MockConnector {
    hosts: Arc<Mutex<HashMap<String, HostState>>>,
    package: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_host<R>(&self, host: &str, f: impl FnOnce(&mut HostState) -> R) -> R {
        let mut hosts = self.hosts.lock().unwrap();
        f(hosts.entry(host.to_string()).or_default())
    }

    /// Answer commands containing `pattern` with `reply`
    pub fn on_command(&self, host: &str, pattern: &str, reply: MockReply) -> &Self {
        self.with_host(host, |state| state.rules.push((pattern.to_string(), reply)));
        self
    }

    pub fn refuse_connections(&self, host: &str, error: SessionError) -> &Self {
        self.with_host(host, |state| state.connect_error = Some(error));
        self
    }

    pub fn hang_on_connect(&self, host: &str) -> &Self {
        self.with_host(host, |state| state.connect_hangs = true);
        self
    }

    /// Seed the live web root of `host`
    pub fn set_live_files(&self, host: &str, files: &[&str]) -> &Self {
        self.with_host(host, |state| {
            state.fs.live = files.iter().map(|f| f.to_string()).collect();
        });
        self
    }

    pub fn add_backup(&self, host: &str, name: &str, files: &[&str]) -> &Self {
        self.with_host(host, |state| {
            state
                .fs
                .backups
                .insert(name.to_string(), files.iter().map(|f| f.to_string()).collect());
        });
        self
    }

    /// Files any uploaded package will unpack to
    pub fn set_package_files(&self, files: &[&str]) -> &Self {
        *self.package.lock().unwrap() = files.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn fs(&self, host: &str) -> RemoteFs {
        self.with_host(host, |state| state.fs.clone())
    }

    pub fn commands(&self, host: &str) -> Vec<String> {
        self.with_host(host, |state| state.commands.clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RemoteSession>, SessionError> {
        self.connections.fetch_add(1, Ordering::SeqCst);

        let (error, hangs) = self.with_host(&credentials.host, |state| {
            (state.connect_error.clone(), state.connect_hangs)
        });
        if hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some(error) = error {
            return Err(error);
        }

        Ok(Box::new(MockSession {
            host: credentials.host.clone(),
            connector: self.clone(),
        }))
    }
}

struct MockSession {
    host: String,
    connector: MockConnector,
}

fn output(stdout: &str, stderr: &str, exit_code: u32) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        exit_code,
        truncated: false,
    }
}

fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Strips the privilege wrapper added for non-root logins
fn unwrap_sudo(command: &str) -> String {
    let Some(rest) = command.strip_prefix("sudo ") else {
        return command.to_string();
    };
    match rest
        .strip_prefix("sh -c '")
        .and_then(|inner| inner.strip_suffix('\''))
    {
        Some(inner) => inner.replace(r"'\''", "'"),
        None => rest.to_string(),
    }
}

/// Applies one simple command to the simulated filesystem
fn interpret(fs: &mut RemoteFs, package: &[String], command: &str) -> CommandOutput {
    let tokens: Vec<&str> = command.split_whitespace().collect();
    let arg = |i: usize| tokens.get(i).copied().unwrap_or_default();

    if command.starts_with("tar -czf ") {
        fs.backups.insert(file_name(arg(2)), fs.live.clone());
        return output("", "", 0);
    }
    if command.starts_with("rm -rf ") && command.ends_with(LIVE_GLOB) {
        fs.live.clear();
        return output("", "", 0);
    }
    if command.starts_with("tar -xzf ") || command.starts_with("unzip -o ") {
        let archive = arg(2);
        if archive.starts_with(BACKUP_DIR) {
            return match fs.backups.get(&file_name(archive)) {
                Some(files) => {
                    fs.live = files.clone();
                    output("", "", 0)
                }
                None => output("", "tar: cannot open: No such file or directory", 2),
            };
        }
        fs.staged = package.to_vec();
        return output("", "", 0);
    }
    if command.starts_with("test -f ") {
        let exists = arg(2)
            .strip_prefix(BACKUP_DIR)
            .map(|name| fs.backups.contains_key(name))
            .unwrap_or(false);
        return output("", "", if exists { 0 } else { 1 });
    }
    if command.starts_with("if [ -f ") {
        return output("root\n", "", 0);
    }
    if command.starts_with("cp -a ") {
        fs.live = fs.staged.clone();
        return output("", "", 0);
    }
    if command.starts_with("find ") && command.contains("xargs -r stat") {
        let listing: String = fs
            .backups
            .keys()
            .map(|name| format!("{}{} 1024 1700000000\n", BACKUP_DIR, name))
            .collect();
        return output(&listing, "", 0);
    }

    output("", "", 0)
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, SessionError> {
        let package = self.connector.package.lock().unwrap().clone();

        let rule = self.connector.with_host(&self.host, |state| {
            state.commands.push(command.to_string());
            state
                .rules
                .iter()
                .find(|(pattern, _)| command.contains(pattern.as_str()))
                .map(|(_, reply)| reply.clone())
        });

        match rule {
            Some(MockReply::Output {
                stdout,
                stderr,
                exit_code,
            }) => return Ok(output(&stdout, &stderr, exit_code)),
            Some(MockReply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Ok(output("", "", 0));
            }
            Some(MockReply::Error(error)) => return Err(error),
            None => {}
        }

        let command = unwrap_sudo(command);
        Ok(self.connector.with_host(&self.host, |state| {
            let mut last = output("", "", 0);
            for part in command.split(" && ") {
                last = interpret(&mut state.fs, &package, part.trim());
                if last.exit_code != 0 {
                    break;
                }
            }
            last
        }))
    }

    async fn upload(&mut self, _local: &Path, remote: &str) -> Result<(), SessionError> {
        self.connector.with_host(&self.host, |state| {
            state.commands.push(format!("upload {}", remote));
            state.fs.uploaded = true;
        });
        Ok(())
    }

    async fn close(&mut self) {
        self.connector.closed.fetch_add(1, Ordering::SeqCst);
    }
}
