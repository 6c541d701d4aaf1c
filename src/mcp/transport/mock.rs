//! Scripted in-memory transport for tests.
//!
//! [`MockRemote`] interprets a tiny POSIX-like shell language, one command per
//! ` && ` segment, against a fixed directory tree:
//!
//! | Segment        | Effect                                              |
//! |----------------|-----------------------------------------------------|
//! | `cd X`         | move to X (normalised), exit 1 if it does not exist |
//! | `pwd`          | print the current directory                         |
//! | `echo ...`     | print the rest of the line                          |
//! | `warn ...`     | print the rest of the line on stderr                |
//! | `sleep N`      | wait N seconds (fractions allowed)                  |
//! | `exit N`       | stop with status N                                  |
//! | `true`/`false` | status 0 / stop with status 1                       |
//! | `explode`      | stream error                                        |
//! | `vanish`       | stream closes without an exit status                |
//!
//! The same tree backs an in-memory file-transfer channel.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;

use crate::mcp::error::{ShellError, TransportStage};

use super::{
    ConnectParams, EntryKind, ExecEvent, ExecStream, FileTransferChannel, RemoteEntry,
    RemoteHandle, Transport,
};

pub(crate) const MOCK_HOME: &str = "/home/tester";

const INITIAL_DIRS: &[&str] = &[
    "/",
    "/home",
    MOCK_HOME,
    "/srv",
    "/srv/app",
    "/tmp",
    "/var",
    "/var/log",
];

/// Fixed modification time reported for every mock entry.
pub(crate) const MOCK_MTIME: i64 = 1_700_000_000;

#[derive(Default)]
pub(crate) struct MockTransport {
    pub connect_calls: AtomicU32,
    /// Number of upcoming attempts that fail with a transient refusal.
    pub transient_failures: AtomicU32,
    /// Every attempt fails authentication.
    pub reject_auth: AtomicBool,
    pub connect_delay: Mutex<Option<Duration>>,
    pub remotes: Mutex<Vec<Arc<MockRemote>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// The remote created by the n-th successful connect.
    pub fn remote(&self, index: usize) -> Arc<MockRemote> {
        self.remotes.lock().unwrap()[index].clone()
    }

    pub fn last_remote(&self) -> Arc<MockRemote> {
        self.remotes.lock().unwrap().last().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, _params: &ConnectParams) -> Result<Arc<dyn RemoteHandle>, ShellError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.reject_auth.load(Ordering::SeqCst) {
            return Err(ShellError::transport(
                TransportStage::Authentication,
                "Authentication failed: key rejected by server",
            ));
        }

        let refused = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ShellError::transport(
                TransportStage::Handshake,
                "Failed to connect: Connection refused",
            ));
        }

        let remote = Arc::new(MockRemote::new());
        self.remotes.lock().unwrap().push(remote.clone());
        Ok(remote)
    }
}

#[derive(Default)]
pub(crate) struct RemoteState {
    pub closed: AtomicBool,
    pub close_calls: AtomicU32,
    pub fail_dispatch: AtomicBool,
    pub fail_channel_open: AtomicBool,
    pub streams_closed: AtomicU32,
    pub channels_opened: AtomicU32,
    pub channels_closed: AtomicU32,
    pub commands: Mutex<Vec<String>>,
    pub dirs: Mutex<BTreeSet<String>>,
    pub files: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Wait applied before every file-transfer operation.
    pub transfer_delay: Mutex<Option<Duration>>,
}

pub(crate) struct MockRemote {
    pub state: Arc<RemoteState>,
}

impl MockRemote {
    pub fn new() -> Self {
        let state = RemoteState::default();
        {
            let mut dirs = state.dirs.lock().unwrap();
            for dir in INITIAL_DIRS {
                dirs.insert((*dir).to_string());
            }
        }
        Self {
            state: Arc::new(state),
        }
    }

    /// Simulate the peer dropping the transport.
    pub fn kill(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }

    pub fn dispatched(&self) -> Vec<String> {
        self.state.commands.lock().unwrap().clone()
    }

    pub fn last_command(&self) -> String {
        self.state.commands.lock().unwrap().last().cloned().unwrap_or_default()
    }

    pub fn close_calls(&self) -> u32 {
        self.state.close_calls.load(Ordering::SeqCst)
    }

    pub fn add_file(&self, path: &str, content: &[u8]) {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.files.lock().unwrap().get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.state.dirs.lock().unwrap().contains(path)
    }
}

#[async_trait]
impl RemoteHandle for MockRemote {
    async fn exec(&self, command: &str) -> Result<Box<dyn ExecStream>, ShellError> {
        self.state.commands.lock().unwrap().push(command.to_string());

        if self.state.closed.load(Ordering::SeqCst) {
            return Err(ShellError::transport(
                TransportStage::Dispatch,
                "Failed to open channel: connection closed",
            ));
        }
        if self.state.fail_dispatch.load(Ordering::SeqCst) {
            return Err(ShellError::transport(
                TransportStage::Dispatch,
                "Failed to open channel: administratively prohibited",
            ));
        }

        let dirs = self.state.dirs.lock().unwrap().clone();
        Ok(Box::new(MockExecStream {
            steps: interpret(command, &dirs),
            state: self.state.clone(),
        }))
    }

    async fn open_file_transfer(&self) -> Result<Box<dyn FileTransferChannel>, ShellError> {
        if self.state.closed.load(Ordering::SeqCst)
            || self.state.fail_channel_open.load(Ordering::SeqCst)
        {
            return Err(ShellError::transport(
                TransportStage::ChannelOpen,
                "Failed to request SFTP subsystem: channel refused",
            ));
        }
        self.state.channels_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSftp {
            state: self.state.clone(),
        }))
    }

    fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        if !self.state.closed.swap(true, Ordering::SeqCst) {
            self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        }
    }
}

enum Step {
    Emit(ExecEvent),
    Sleep(Duration),
    Fail(ShellError),
}

fn resolve(cwd: &str, target: &str) -> String {
    let target = target.trim_matches('\'');
    let joined = if target == "~" {
        MOCK_HOME.to_string()
    } else if let Some(rest) = target.strip_prefix("~/") {
        format!("{}/{}", MOCK_HOME, rest)
    } else if target.starts_with('/') {
        target.to_string()
    } else {
        format!("{}/{}", cwd, target)
    };

    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

fn line(text: &str) -> Vec<u8> {
    format!("{}\n", text).into_bytes()
}

fn interpret(command: &str, dirs: &BTreeSet<String>) -> VecDeque<Step> {
    let mut steps = VecDeque::new();
    let mut cwd = MOCK_HOME.to_string();

    for segment in command.split(" && ").map(str::trim) {
        let (word, rest) = segment.split_once(' ').unwrap_or((segment, ""));
        match word {
            "cd" => {
                let target = resolve(&cwd, rest.trim());
                if dirs.contains(&target) {
                    cwd = target;
                } else {
                    steps.push_back(Step::Emit(ExecEvent::Stderr(line(&format!(
                        "cd: {}: No such file or directory",
                        rest.trim()
                    )))));
                    steps.push_back(Step::Emit(ExecEvent::Exit(1)));
                    return steps;
                }
            }
            "pwd" => steps.push_back(Step::Emit(ExecEvent::Stdout(line(&cwd)))),
            "echo" => steps.push_back(Step::Emit(ExecEvent::Stdout(line(rest)))),
            "warn" => steps.push_back(Step::Emit(ExecEvent::Stderr(line(rest)))),
            "sleep" => {
                let secs = rest.trim().parse::<f64>().unwrap_or(0.0);
                steps.push_back(Step::Sleep(Duration::from_secs_f64(secs)));
            }
            "exit" => {
                let code = rest.trim().parse::<i32>().unwrap_or(0);
                steps.push_back(Step::Emit(ExecEvent::Exit(code)));
                return steps;
            }
            "true" => {}
            "false" => {
                steps.push_back(Step::Emit(ExecEvent::Exit(1)));
                return steps;
            }
            "explode" => {
                steps.push_back(Step::Fail(ShellError::transport(
                    TransportStage::Stream,
                    "channel reset by peer",
                )));
                return steps;
            }
            "vanish" => return steps,
            other => {
                steps.push_back(Step::Emit(ExecEvent::Stderr(line(&format!(
                    "sh: {}: command not found",
                    other
                )))));
                steps.push_back(Step::Emit(ExecEvent::Exit(127)));
                return steps;
            }
        }
    }

    steps.push_back(Step::Emit(ExecEvent::Exit(0)));
    steps
}

struct MockExecStream {
    steps: VecDeque<Step>,
    state: Arc<RemoteState>,
}

#[async_trait]
impl ExecStream for MockExecStream {
    async fn next_event(&mut self) -> Option<Result<ExecEvent, ShellError>> {
        loop {
            match self.steps.pop_front()? {
                Step::Emit(event) => return Some(Ok(event)),
                Step::Sleep(duration) => tokio::time::sleep(duration).await,
                Step::Fail(err) => return Some(Err(err)),
            }
        }
    }

    async fn close(&mut self) {
        self.state.streams_closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockSftp {
    state: Arc<RemoteState>,
}

impl MockSftp {
    async fn stall(&self) {
        let delay = *self.state.transfer_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn parent_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
        None => "/".to_string(),
    }
}

fn missing(path: &str) -> ShellError {
    ShellError::transport(
        TransportStage::Transfer,
        format!("{}: No such file", path),
    )
}

#[async_trait]
impl FileTransferChannel for MockSftp {
    async fn read_file(&mut self, path: &str) -> Result<Vec<u8>, ShellError> {
        self.stall().await;
        self.state
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| missing(path))
    }

    async fn write_file(&mut self, path: &str, data: &[u8]) -> Result<(), ShellError> {
        self.stall().await;
        if !self.state.dirs.lock().unwrap().contains(&parent_of(path)) {
            return Err(missing(&parent_of(path)));
        }
        self.state
            .files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn list_dir(&mut self, path: &str) -> Result<Vec<RemoteEntry>, ShellError> {
        self.stall().await;
        let path = path.trim_end_matches('/');
        let path = if path.is_empty() { "/" } else { path };
        let dirs = self.state.dirs.lock().unwrap();
        if !dirs.contains(path) {
            return Err(missing(path));
        }
        let modified = DateTime::from_timestamp(MOCK_MTIME, 0);
        let name_of = |p: &str| p.rsplit('/').next().unwrap_or_default().to_string();

        let mut entries: Vec<RemoteEntry> = dirs
            .iter()
            .filter(|d| d.as_str() != "/" && parent_of(d) == path)
            .map(|d| RemoteEntry {
                name: name_of(d),
                kind: EntryKind::Directory,
                size: 4096,
                modified,
            })
            .collect();
        entries.extend(
            self.state
                .files
                .lock()
                .unwrap()
                .iter()
                .filter(|(f, _)| parent_of(f) == path)
                .map(|(f, content)| RemoteEntry {
                    name: name_of(f),
                    kind: EntryKind::File,
                    size: content.len() as u64,
                    modified,
                }),
        );
        Ok(entries)
    }

    async fn remove_file(&mut self, path: &str) -> Result<(), ShellError> {
        self.stall().await;
        self.state
            .files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| missing(path))
    }

    async fn make_dir(&mut self, path: &str) -> Result<(), ShellError> {
        self.stall().await;
        let mut dirs = self.state.dirs.lock().unwrap();
        if dirs.contains(path) {
            return Err(ShellError::transport(
                TransportStage::Transfer,
                format!("{}: File exists", path),
            ));
        }
        if !dirs.contains(&parent_of(path)) {
            return Err(missing(&parent_of(path)));
        }
        dirs.insert(path.to_string());
        Ok(())
    }

    async fn remove_dir(&mut self, path: &str) -> Result<(), ShellError> {
        self.stall().await;
        let mut dirs = self.state.dirs.lock().unwrap();
        if !dirs.contains(path) {
            return Err(missing(path));
        }
        let has_children = dirs.iter().any(|d| d != "/" && parent_of(d) == path)
            || self
                .state
                .files
                .lock()
                .unwrap()
                .keys()
                .any(|f| parent_of(f) == path);
        if has_children {
            return Err(ShellError::transport(
                TransportStage::Transfer,
                format!("{}: Directory not empty", path),
            ));
        }
        dirs.remove(path);
        Ok(())
    }

    async fn close(&mut self) {
        self.state.channels_closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(remote: &MockRemote, command: &str) -> (String, Option<i32>) {
        let mut stream = remote.exec(command).await.unwrap();
        let mut stdout = Vec::new();
        let mut exit = None;
        while let Some(event) = stream.next_event().await {
            match event.unwrap() {
                ExecEvent::Stdout(b) => stdout.extend(b),
                ExecEvent::Exit(code) => exit = Some(code),
                ExecEvent::Stderr(_) => {}
            }
        }
        (String::from_utf8(stdout).unwrap(), exit)
    }

    #[tokio::test]
    async fn test_pwd_starts_at_home() {
        let remote = MockRemote::new();
        assert_eq!(run(&remote, "pwd").await, (format!("{}\n", MOCK_HOME), Some(0)));
    }

    #[tokio::test]
    async fn test_cd_normalises_and_fails_on_missing() {
        let remote = MockRemote::new();
        assert_eq!(run(&remote, "cd /srv/app/.. && pwd").await.0, "/srv\n");
        assert_eq!(run(&remote, "cd /nope && pwd").await, (String::new(), Some(1)));
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("/tmp/a.txt"), "/tmp");
        assert_eq!(parent_of("/tmp"), "/");
    }
}
