//! Minimal IRC client transport.
//!
//! Covers just enough of RFC 2812 to register, join one channel, read channel
//! messages and talk back. Keepalive `PING`s are answered here and never reach
//! the session controller.

use std::fmt;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use futures_util::{SinkExt, StreamExt};
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::error::TransportError;

/// Longest inbound line accepted before the connection is considered broken.
/// Twice the RFC limit, to leave room for IRCv3 tags.
pub const MAX_LINE_LEN: usize = 1024;

/// Outbound commands the bot issues
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Nick(String),
    User { username: String, realname: String },
    Join(String),
    Names(String),
    Privmsg { target: String, text: String },
    Quit(String),
    Pong(String),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Nick(nick) => write!(f, "NICK {nick}"),
            Command::User { username, realname } => write!(f, "USER {username} 0 * :{}", single_line(realname)),
            Command::Join(channel) => write!(f, "JOIN {channel}"),
            Command::Names(channel) => write!(f, "NAMES {channel}"),
            Command::Privmsg { target, text } => write!(f, "PRIVMSG {target} :{}", single_line(text)),
            Command::Quit(reason) => write!(f, "QUIT :{}", single_line(reason)),
            Command::Pong(token) => write!(f, "PONG :{}", single_line(token)),
        }
    }
}

/// Drop line breaks so a parameter can never smuggle in a second command.
fn single_line(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
}

/// A parsed inbound line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    /// Parse one raw line. Returns `None` for blank or structurally broken lines.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        // IRCv3 tags carry nothing the bot needs
        if rest.starts_with('@') {
            rest = rest.split_once(' ')?.1.trim_start_matches(' ');
        }

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, remainder) = stripped.split_once(' ')?;
                rest = remainder.trim_start_matches(' ');
                Some(prefix.to_string())
            }
            None => None,
        };

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((param, remainder)) => {
                    params.push(param.to_string());
                    rest = remainder;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Nickname part of a `nick!user@host` prefix
    pub fn source_nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        prefix.split('!').next()
    }
}

/// Inbound events the session controller reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `001`: registration accepted
    Welcome,
    /// `433`: requested nickname is taken
    NicknameInUse,
    ChannelMessage {
        channel: String,
        sender: Option<String>,
        text: String,
    },
    /// `ERROR`: the server is closing the link
    ServerError(String),
    Other(String),
}

impl From<Message> for Event {
    fn from(message: Message) -> Self {
        let sender = message.source_nick().map(str::to_string);
        let Message { command, mut params, .. } = message;

        match command.as_str() {
            "001" => Event::Welcome,
            "433" => Event::NicknameInUse,
            "ERROR" => Event::ServerError(params.pop().unwrap_or_default()),
            "PRIVMSG" if params.len() >= 2 && is_channel(&params[0]) => {
                let text = params.pop().unwrap_or_default();
                // CTCP (ACTION, VERSION, ...) is not channel chatter
                if text.starts_with('\u{1}') {
                    return Event::Other("CTCP".to_string());
                }
                let channel = params.swap_remove(0);
                Event::ChannelMessage { channel, sender, text }
            }
            _ => Event::Other(command),
        }
    }
}

pub fn is_channel(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}

/// Newline-delimited codec. Invalid UTF-8 is replaced rather than rejected so
/// one stray byte from another client cannot tear down the session.
#[derive(Debug)]
pub struct LineCodec {
    next_index: usize,
    max_len: usize,
}

impl LineCodec {
    pub fn new(max_len: usize) -> Self {
        Self { next_index: 0, max_len }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(MAX_LINE_LEN)
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, TransportError> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;
            let text = String::from_utf8_lossy(&line);
            return Ok(Some(text.trim_end_matches(['\r', '\n']).to_string()));
        }

        if src.len() > self.max_len {
            return Err(TransportError::LineTooLong { limit: self.max_len });
        }
        self.next_index = src.len();
        Ok(None)
    }
}

impl Encoder<Command> for LineCodec {
    type Error = TransportError;

    fn encode(&mut self, command: Command, dst: &mut BytesMut) -> Result<(), TransportError> {
        let line = command.to_string();
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// The command/event surface a session drives.
#[async_trait]
pub trait ChatSession: Send {
    async fn send(&mut self, command: Command) -> Result<(), TransportError>;

    /// Next event, or `None` once the server has closed the connection.
    async fn next_event(&mut self) -> Result<Option<Event>, TransportError>;
}

/// Opens a fresh [`ChatSession`] for each session attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: ChatSession;

    async fn connect(&self, server: &str, port: u16) -> Result<Self::Session, TransportError>;
}

pub struct IrcConnection<S = TcpStream> {
    framed: Framed<S, LineCodec>,
}

impl<S> IrcConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, LineCodec::default()),
        }
    }
}

#[async_trait]
impl<S> ChatSession for IrcConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, command: Command) -> Result<(), TransportError> {
        trace!(">> {command}");
        self.framed.send(command).await
    }

    async fn next_event(&mut self) -> Result<Option<Event>, TransportError> {
        while let Some(line) = self.framed.next().await {
            let line = line?;
            trace!("<< {line}");

            let Some(message) = Message::parse(&line) else {
                debug!("Skipping unparsable line: {line:?}");
                continue;
            };

            if message.command == "PING" {
                let token = message.params.into_iter().next().unwrap_or_default();
                self.send(Command::Pong(token)).await?;
                continue;
            }

            return Ok(Some(Event::from(message)));
        }
        Ok(None)
    }
}

/// Plain-TCP connector
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Session = IrcConnection<TcpStream>;

    async fn connect(&self, server: &str, port: u16) -> Result<Self::Session, TransportError> {
        let stream = TcpStream::connect((server, port)).await?;
        debug!("Connected to {server}:{port}");
        Ok(IrcConnection::new(stream))
    }
}
