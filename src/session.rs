//! Connection lifecycle for one bot session.
//!
//! ```text
//! Connecting -> Registering -> Joined -> Monitoring -> Terminating -> Ended
//!      \______________\____________\__________\______________\-> Faulted
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::time::{self, MissedTickBehavior};

use crate::config::Settings;
use crate::error::{Result, SessionError, TransportError};
use crate::handler::MessageHandler;
use crate::irc::{ChatSession, Command, Connector, Event};
use crate::youtube::MetadataLookup;

/// Appended to the nickname each time the server reports it taken
pub const NICK_FALLBACK: char = '_';

/// How long to wait for the server to close the link after QUIT
const DISCONNECT_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Registering,
    Joined,
    Monitoring,
    Terminating,
    Ended,
    Faulted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Registering => "registering",
            SessionState::Joined => "joined",
            SessionState::Monitoring => "monitoring",
            SessionState::Terminating => "terminating",
            SessionState::Ended => "ended",
            SessionState::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// Mutable record of one connected lifetime on the server
#[derive(Debug, Clone)]
pub struct Session {
    server: String,
    port: u16,
    channel: String,
    nickname: String,
    nick_retries: u32,
    remaining_messages: u32,
}

impl Session {
    pub fn new(settings: &Settings) -> Self {
        Self {
            server: settings.server.clone(),
            port: settings.port,
            channel: settings.channel.clone(),
            nickname: settings.nickname.clone(),
            nick_retries: 0,
            remaining_messages: settings.message_budget,
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn remaining_messages(&self) -> u32 {
        self.remaining_messages
    }

    pub fn budget_exhausted(&self) -> bool {
        self.remaining_messages == 0
    }

    /// Charge one channel message against the budget
    pub fn record_message(&mut self) {
        self.remaining_messages = self.remaining_messages.saturating_sub(1);
    }

    /// Switch to the next fallback nickname, or fail once `max_retries` are used up.
    pub fn fallback_nickname(&mut self, max_retries: u32) -> Result<&str> {
        if self.nick_retries >= max_retries {
            return Err(SessionError::NicknameExhausted {
                nickname: self.nickname.clone(),
                attempts: self.nick_retries,
            });
        }
        self.nick_retries += 1;
        self.nickname.push(NICK_FALLBACK);
        Ok(&self.nickname)
    }
}

pub struct SessionController {
    settings: Settings,
    session: Session,
    handler: MessageHandler,
    state: SessionState,
    reached_monitoring: bool,
}

impl SessionController {
    pub fn new(settings: Settings, lookup: Arc<dyn MetadataLookup>) -> Self {
        let session = Session::new(&settings);
        Self {
            settings,
            session,
            handler: MessageHandler::new(lookup),
            state: SessionState::Connecting,
            reached_monitoring: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether this session got as far as joining its channel
    pub fn reached_monitoring(&self) -> bool {
        self.reached_monitoring
    }

    /// Run the session to completion.
    ///
    /// `Ok` means the message budget ran out and the bot left on its own.
    /// Any error leaves the controller in [`SessionState::Faulted`].
    pub async fn run<C: Connector>(&mut self, connector: &C) -> Result<()> {
        let result = self.drive(connector).await;
        if result.is_err() {
            self.transition(SessionState::Faulted);
        }
        result
    }

    async fn drive<C: Connector>(&mut self, connector: &C) -> Result<()> {
        self.transition(SessionState::Connecting);
        info!("Connecting to {}:{}", self.session.server(), self.session.port());
        let mut chat = connector.connect(self.session.server(), self.session.port()).await?;

        self.transition(SessionState::Registering);
        self.register(&mut chat).await?;
        info!("Welcome!");

        self.transition(SessionState::Joined);
        chat.send(Command::Join(self.session.channel().to_string())).await?;

        self.transition(SessionState::Monitoring);
        self.reached_monitoring = true;
        self.monitor(&mut chat).await?;

        self.transition(SessionState::Terminating);
        info!("Message budget spent, leaving");
        chat.send(Command::Quit(self.settings.farewell.clone())).await?;
        await_disconnect(&mut chat).await;

        self.transition(SessionState::Ended);
        Ok(())
    }

    async fn register<S: ChatSession>(&mut self, chat: &mut S) -> Result<()> {
        let nickname = self.session.nickname().to_string();
        chat.send(Command::Nick(nickname.clone())).await?;
        chat.send(Command::User {
            username: nickname.clone(),
            realname: nickname,
        })
        .await?;

        loop {
            match chat.next_event().await? {
                Some(Event::Welcome) => return Ok(()),
                Some(Event::NicknameInUse) => {
                    let nickname = self.session.fallback_nickname(self.settings.max_nick_retries)?;
                    info!("Nickname in use, trying {nickname}");
                    chat.send(Command::Nick(nickname.to_string())).await?;
                }
                Some(Event::ServerError(reason)) => return Err(SessionError::Server(reason)),
                Some(other) => debug!("Ignoring {other:?} before registration"),
                None => return Err(TransportError::Closed.into()),
            }
        }
    }

    /// Route channel traffic until the message budget is spent.
    async fn monitor<S: ChatSession>(&mut self, chat: &mut S) -> Result<()> {
        let channel = self.session.channel().to_string();
        let mut names = time::interval(self.settings.names_interval);
        names.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                biased;
                _ = names.tick() => None,
                event = chat.next_event() => Some(event?),
            };

            let Some(event) = event else {
                info!("Checking names.");
                chat.send(Command::Names(channel.clone())).await?;
                continue;
            };

            match event {
                Some(Event::ChannelMessage { channel: source, text, .. }) => {
                    if !source.eq_ignore_ascii_case(&channel) {
                        debug!("Ignoring message in {source}");
                        continue;
                    }
                    if let Some(title) = self.handler.on_message(&mut self.session, &text).await {
                        info!("Sending title: {title}");
                        chat.send(Command::Privmsg {
                            target: channel.clone(),
                            text: title,
                        })
                        .await?;
                    }
                    if self.session.budget_exhausted() {
                        return Ok(());
                    }
                }
                Some(Event::ServerError(reason)) => return Err(SessionError::Server(reason)),
                Some(other) => debug!("Ignoring {other:?}"),
                None => return Err(TransportError::Closed.into()),
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Drain the connection until the server acknowledges QUIT by closing it.
async fn await_disconnect<S: ChatSession>(chat: &mut S) {
    let drain = async {
        loop {
            match chat.next_event().await {
                Ok(Some(Event::ServerError(reason))) => {
                    debug!("Server closed link: {reason}");
                    break;
                }
                Ok(Some(other)) => debug!("Ignoring {other:?} while leaving"),
                Ok(None) => break,
                Err(e) => {
                    debug!("Transport error while leaving: {e}");
                    break;
                }
            }
        }
    };
    if time::timeout(DISCONNECT_GRACE, drain).await.is_err() {
        debug!("No disconnect acknowledgement after {DISCONNECT_GRACE:?}");
    }
}
