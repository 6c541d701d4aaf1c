//! Builder patterns for constructing MCP response messages.
//!
//! Messages repeat the identifiers a caller needs for follow-up tool calls
//! and point at the tools that use them.

/// Builder for connection success messages.
///
/// # Example
///
/// ```ignore
/// let message = ConnectMessageBuilder::new("conn-123", "deploy", "host:22")
///     .with_name(Some("production-db"))
///     .with_retry_attempts(2)
///     .build();
/// ```
pub struct ConnectMessageBuilder {
    connection_id: String,
    username: String,
    host: String,
    name: Option<String>,
    retry_attempts: u32,
}

impl ConnectMessageBuilder {
    pub fn new(
        connection_id: impl Into<String>,
        username: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            username: username.into(),
            host: host.into(),
            name: None,
            retry_attempts: 0,
        }
    }

    /// Set the display name. Omitted from the message when it equals the ID.
    pub fn with_name(mut self, name: Option<impl Into<String>>) -> Self {
        self.name = name.map(Into::into);
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn build(&self) -> String {
        let mut lines = vec![
            "CONNECTION ESTABLISHED. REMEMBER THESE IDENTIFIERS:".to_string(),
            format!("• connection_id: '{}'", self.connection_id),
        ];

        if let Some(ref n) = self.name.as_ref().filter(|n| **n != self.connection_id) {
            lines.push(format!("• name: '{}'", n));
        }
        lines.push(format!("• host: {}@{}", self.username, self.host));
        if self.retry_attempts > 0 {
            lines.push(format!("• retry_attempts: {}", self.retry_attempts));
        }

        lines.push(String::new());
        lines.push(format!(
            "Use ssh_execute with connection_id '{}' to run commands.",
            self.connection_id
        ));
        lines.push(format!(
            "Use ssh_session_start with connection_id '{}' for an independent working directory.",
            self.connection_id
        ));

        lines.join("\n")
    }
}

/// Builder for command completion messages.
///
/// # Example
///
/// ```ignore
/// let message = CommandMessageBuilder::new("ls -la", 0)
///     .with_session_id(Some("sess-456"))
///     .with_working_directory("/srv/app")
///     .build();
/// ```
pub struct CommandMessageBuilder {
    command: String,
    exit_status: i32,
    session_id: Option<String>,
    working_directory: Option<String>,
    directory_changed: bool,
}

impl CommandMessageBuilder {
    pub fn new(command: impl Into<String>, exit_status: i32) -> Self {
        Self {
            command: command.into(),
            exit_status,
            session_id: None,
            working_directory: None,
            directory_changed: false,
        }
    }

    pub fn with_session_id(mut self, session_id: Option<impl Into<String>>) -> Self {
        self.session_id = session_id.map(Into::into);
        self
    }

    pub fn with_working_directory(mut self, directory: impl Into<String>) -> Self {
        self.working_directory = Some(directory.into());
        self
    }

    pub fn directory_changed(mut self, changed: bool) -> Self {
        self.directory_changed = changed;
        self
    }

    pub fn build(&self) -> String {
        let mut lines = vec![if self.exit_status == 0 {
            "COMMAND SUCCEEDED.".to_string()
        } else {
            format!("COMMAND EXITED WITH STATUS {}.", self.exit_status)
        }];

        lines.push(format!("• command: '{}'", truncate_command(&self.command, 50)));
        if let Some(ref sid) = self.session_id {
            lines.push(format!("• session_id: '{}'", sid));
        }
        if let Some(ref dir) = self.working_directory {
            let label = if self.directory_changed {
                "working_directory (changed)"
            } else {
                "working_directory"
            };
            lines.push(format!("• {}: {}", label, dir));
        }

        lines.join("\n")
    }
}

/// Builder for session start messages.
///
/// # Example
///
/// ```ignore
/// let message = SessionStartMessageBuilder::new("sess-1", "conn-1", "/srv")
///     .with_name(Some("build"))
///     .directory_verified(true)
///     .build();
/// ```
pub struct SessionStartMessageBuilder {
    session_id: String,
    connection_id: String,
    working_directory: String,
    name: Option<String>,
    requested_directory: Option<String>,
    directory_verified: bool,
}

impl SessionStartMessageBuilder {
    pub fn new(
        session_id: impl Into<String>,
        connection_id: impl Into<String>,
        working_directory: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            connection_id: connection_id.into(),
            working_directory: working_directory.into(),
            name: None,
            requested_directory: None,
            directory_verified: true,
        }
    }

    pub fn with_name(mut self, name: Option<impl Into<String>>) -> Self {
        self.name = name.map(Into::into);
        self
    }

    /// The initial directory the caller asked for, if any.
    pub fn with_requested_directory(mut self, directory: Option<impl Into<String>>) -> Self {
        self.requested_directory = directory.map(Into::into);
        self
    }

    pub fn directory_verified(mut self, verified: bool) -> Self {
        self.directory_verified = verified;
        self
    }

    pub fn build(&self) -> String {
        let mut lines = vec![
            "SESSION STARTED. REMEMBER THESE IDENTIFIERS:".to_string(),
            format!("• session_id: '{}'", self.session_id),
            format!("• connection_id: '{}'", self.connection_id),
        ];
        if let Some(ref n) = self.name.as_ref().filter(|n| **n != self.session_id) {
            lines.push(format!("• name: '{}'", n));
        }
        lines.push(format!("• working_directory: {}", self.working_directory));

        if !self.directory_verified {
            if let Some(ref requested) = self.requested_directory {
                lines.push(format!(
                    "• warning: '{}' could not be entered; starting in the home directory",
                    requested
                ));
            }
        }

        lines.push(String::new());
        lines.push(format!(
            "Use ssh_session_execute with session_id '{}' to run commands.",
            self.session_id
        ));
        lines.push(format!(
            "Use ssh_session_close with session_id '{}' when done.",
            self.session_id
        ));

        lines.join("\n")
    }
}

/// Builder for disconnect messages.
///
/// # Example
///
/// ```ignore
/// let message = DisconnectMessageBuilder::new("conn-1")
///     .with_sessions_closed(3)
///     .with_command_count(12)
///     .build();
/// ```
pub struct DisconnectMessageBuilder {
    connection_id: String,
    name: Option<String>,
    sessions_closed: usize,
    command_count: u64,
}

impl DisconnectMessageBuilder {
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            name: None,
            sessions_closed: 0,
            command_count: 0,
        }
    }

    pub fn with_name(mut self, name: Option<impl Into<String>>) -> Self {
        self.name = name.map(Into::into);
        self
    }

    pub fn with_sessions_closed(mut self, count: usize) -> Self {
        self.sessions_closed = count;
        self
    }

    pub fn with_command_count(mut self, count: u64) -> Self {
        self.command_count = count;
        self
    }

    pub fn build(&self) -> String {
        let mut lines = vec![
            "CONNECTION CLOSED. SUMMARY:".to_string(),
            format!("• connection_id: '{}'", self.connection_id),
        ];
        if let Some(ref n) = self.name.as_ref().filter(|n| **n != self.connection_id) {
            lines.push(format!("• name: '{}'", n));
        }
        lines.push(format!("• commands_executed: {}", self.command_count));
        lines.push(format!("• sessions_closed: {}", self.sessions_closed));

        if self.sessions_closed > 0 {
            lines.push(String::new());
            lines.push("Session IDs bound to this connection are no longer valid.".to_string());
        }

        lines.join("\n")
    }
}

/// Truncate a command string for display, on a character boundary.
fn truncate_command(command: &str, max_len: usize) -> String {
    if command.chars().count() > max_len {
        let kept: String = command.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        command.to_string()
    }
}
