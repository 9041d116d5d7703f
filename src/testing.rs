//! In-memory stand-ins for the network collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::{LookupError, TransportError};
use crate::irc::{ChatSession, Command, Connector, Event};
use crate::youtube::MetadataLookup;

enum Canned {
    Title(String),
    Failure,
}

/// Lookup that answers from a fixed table and records every request.
/// Unknown ids are "not found".
#[derive(Default)]
pub struct FakeLookup {
    answers: HashMap<String, Canned>,
    requested: Mutex<Vec<String>>,
}

impl FakeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, video_id: &str, title: &str) -> Self {
        self.answers
            .insert(video_id.to_string(), Canned::Title(title.to_string()));
        self
    }

    pub fn with_failure(mut self, video_id: &str) -> Self {
        self.answers.insert(video_id.to_string(), Canned::Failure);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataLookup for FakeLookup {
    async fn fetch_title(&self, video_id: &str) -> Result<Option<String>, LookupError> {
        self.requested.lock().unwrap().push(video_id.to_string());
        match self.answers.get(video_id) {
            Some(Canned::Title(title)) => Ok(Some(title.clone())),
            Some(Canned::Failure) => Err(LookupError::Status {
                status: StatusCode::FORBIDDEN,
                body: "quotaExceeded".to_string(),
            }),
            None => Ok(None),
        }
    }
}

/// What the scripted session does once its script runs out.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum AfterScript {
    /// Report the connection as closed by the server
    Close,
    /// Never produce another event
    Hang,
}

/// Replays a fixed list of inbound events and records outbound commands.
pub struct ScriptedSession {
    events: VecDeque<Result<Option<Event>, TransportError>>,
    after: AfterScript,
    sent: Arc<Mutex<Vec<Command>>>,
}

#[async_trait]
impl ChatSession for ScriptedSession {
    async fn send(&mut self, command: Command) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(command);
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<Event>, TransportError> {
        match self.events.pop_front() {
            Some(event) => event,
            None if self.after == AfterScript::Hang => std::future::pending().await,
            None => Ok(None),
        }
    }
}

/// Hands out one scripted session per connect; runs out into refusals.
pub struct ScriptedConnector {
    scripts: Mutex<VecDeque<Vec<Result<Option<Event>, TransportError>>>>,
    after: AfterScript,
    sent: Arc<Mutex<Vec<Command>>>,
    connects: Mutex<u32>,
}

impl ScriptedConnector {
    pub fn new(after: AfterScript) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            after,
            sent: Arc::new(Mutex::new(Vec::new())),
            connects: Mutex::new(0),
        }
    }

    /// Queue a session whose inbound events are all successful.
    pub fn session(self, events: Vec<Event>) -> Self {
        let script = events.into_iter().map(|e| Ok(Some(e))).collect();
        self.raw_session(script)
    }

    pub fn raw_session(self, script: Vec<Result<Option<Event>, TransportError>>) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    pub fn sent(&self) -> Vec<Command> {
        self.sent.lock().unwrap().clone()
    }

    pub fn connects(&self) -> u32 {
        *self.connects.lock().unwrap()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Session = ScriptedSession;

    async fn connect(&self, _server: &str, _port: u16) -> Result<ScriptedSession, TransportError> {
        *self.connects.lock().unwrap() += 1;
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(events) => Ok(ScriptedSession {
                events: events.into(),
                after: self.after,
                sent: self.sent.clone(),
            }),
            None => Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
        }
    }
}

pub fn channel_message(channel: &str, text: &str) -> Event {
    Event::ChannelMessage {
        channel: channel.to_string(),
        sender: Some("alice".to_string()),
        text: text.to_string(),
    }
}
