//! Simulated peer connection driven by the demo panel.
//!
//! The session walks through the connection states one step per tick and,
//! once completed, sends a numbered data-channel message every
//! `send_interval` ticks. Everything is in-process; nothing touches the
//! network.

use std::fmt;

use weft::prelude::{MemberTable, Reflect};

pub const DEFAULT_URL: &str = "https://";
pub const SIGNALING_PATH: &str = "/whip/00/00/00";

/// Lines kept in the visible log.
const LOG_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerState {
    #[default]
    Closed,
    New,
    Checking,
    Connected,
    Completed,
    Failed,
}

impl PeerState {
    /// State reached on the next tick of an active connection.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::New => Self::Checking,
            Self::Checking => Self::Connected,
            Self::Connected => Self::Completed,
            other => other,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "Closed",
            Self::New => "New",
            Self::Checking => "Checking",
            Self::Connected => "Connected",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Please enter signaling URL")]
    MissingUrl,
    #[error("already connected")]
    AlreadyConnected,
}

#[derive(Debug)]
pub struct PeerSession {
    url: String,
    state: PeerState,
    connected: bool,
    send_interval: u32,
    ticks_since_send: u32,
    sent: u32,
    log: Vec<String>,
}

impl Default for PeerSession {
    fn default() -> Self {
        Self::new(DEFAULT_URL, 1)
    }
}

impl PeerSession {
    #[must_use]
    pub fn new(url: &str, send_interval: u32) -> Self {
        let mut session = Self {
            url: url.to_string(),
            state: PeerState::Closed,
            connected: false,
            send_interval: send_interval.max(1),
            ticks_since_send: 0,
            sent: 0,
            log: Vec::new(),
        };
        session.push_log("LibPeer Sample Ready");
        session.push_log("Enter cloudflared tunnel URL and click Connect");
        session
    }

    #[must_use]
    pub fn state(&self) -> PeerState {
        self.state
    }

    #[must_use]
    pub fn has_connection(&self) -> bool {
        self.connected
    }

    #[must_use]
    pub fn sent(&self) -> u32 {
        self.sent
    }

    #[must_use]
    pub fn status(&self) -> String {
        format!("State: {}", self.state)
    }

    #[must_use]
    pub fn log_text(&self) -> String {
        self.log.join("\n")
    }

    fn push_log(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(target: "weft_demo::session", "{line}");
        self.log.push(line);
        if self.log.len() > LOG_CAPACITY {
            let excess = self.log.len() - LOG_CAPACITY;
            self.log.drain(..excess);
        }
    }

    /// Start connecting to the configured URL.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        if self.connected {
            return Err(SessionError::AlreadyConnected);
        }
        let base = self.url.trim().to_string();
        if base.is_empty() || base == DEFAULT_URL {
            self.push_log(SessionError::MissingUrl.to_string());
            return Err(SessionError::MissingUrl);
        }
        let full_url = format!("{}{SIGNALING_PATH}", base.trim_end_matches('/'));
        self.push_log("Initializing...");
        self.push_log("Creating peer connection...");
        self.push_log(format!("Connecting to: {full_url}"));
        self.connected = true;
        self.ticks_since_send = 0;
        if !base.contains("://") {
            self.state = PeerState::Failed;
            self.push_log("State: Failed");
            return Ok(());
        }
        self.state = PeerState::New;
        self.push_log("Signaling connected");
        Ok(())
    }

    /// Advance the simulated connection by one step.
    pub fn advance(&mut self) {
        if !self.connected {
            return;
        }
        if self.state != PeerState::Completed {
            let next = self.state.next();
            if next != self.state {
                self.state = next;
                self.push_log(format!("State: {next}"));
            }
            return;
        }
        self.ticks_since_send += 1;
        if self.ticks_since_send >= self.send_interval {
            self.ticks_since_send = 0;
            self.sent += 1;
            self.push_log(format!("Sent: datachannel message : {:05}", self.sent));
        }
    }

    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.push_log("Disconnecting...");
        self.connected = false;
        self.state = PeerState::Closed;
        self.push_log("Disconnected");
    }
}

impl Reflect for PeerSession {
    fn members() -> MemberTable<Self> {
        MemberTable::<Self>::new()
            .field("url", |s| &s.url, |s| &mut s.url)
            .readonly_field("state", |s| &s.state)
            .readonly_field("sent", |s| &s.sent)
            .property("status", PeerSession::status)
            .property("has_connection", PeerSession::has_connection)
            .property("log_text", PeerSession::log_text)
    }
}
