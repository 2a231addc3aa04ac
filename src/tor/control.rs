//! Tor Control Port client
//!
//! Communicates with the local Tor daemon via the control protocol. One
//! short-lived connection is opened per rotation cycle.

use crate::config::TorConfig;
use crate::error::ControlChannelError;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Per-reply read timeout
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the control port
#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl From<&TorConfig> for ControlConfig {
    fn from(config: &TorConfig) -> Self {
        Self {
            host: config.control_host.clone(),
            port: config.control_port,
            password: config.control_password.clone(),
        }
    }
}

impl ControlConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Final reply to a control command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    /// Text of every reply line, status code stripped
    pub lines: Vec<String>,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        self.code == 250
    }

    pub fn message(&self) -> String {
        self.lines.join(" ")
    }
}

/// Authenticated connection to Tor control port
pub struct ControlChannel {
    reader: BufReader<TcpStream>,
    authenticated: bool,
}

impl ControlChannel {
    /// Connect and authenticate
    pub async fn connect(config: &ControlConfig) -> Result<Self, ControlChannelError> {
        let addr = config.addr();
        debug!("Connecting to Tor control port: {}", addr);

        let stream = match tokio::time::timeout(REPLY_TIMEOUT, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ControlChannelError::Connect { addr, source }),
            Err(_) => return Err(ControlChannelError::Timeout),
        };

        let mut channel = Self {
            reader: BufReader::new(stream),
            authenticated: false,
        };

        channel.authenticate(config.password.as_deref()).await?;
        Ok(channel)
    }

    /// Authenticate with password (hex-encoded) or null auth
    async fn authenticate(&mut self, password: Option<&str>) -> Result<(), ControlChannelError> {
        let cmd = match password {
            Some(password) => {
                let password_hex = data_encoding::HEXLOWER.encode(password.as_bytes());
                format!("AUTHENTICATE {}\r\n", password_hex)
            },
            None => "AUTHENTICATE\r\n".to_string(),
        };

        let reply = self.send_raw(&cmd).await?;
        if !reply.is_ok() {
            return Err(ControlChannelError::AuthRejected(format!(
                "{} {}",
                reply.code,
                reply.message()
            )));
        }

        self.authenticated = true;
        debug!("Authenticated to Tor control port");
        Ok(())
    }

    /// Send a command and require a 250 reply
    pub async fn send_command(&mut self, cmd: &str) -> Result<Reply, ControlChannelError> {
        if !self.authenticated {
            return Err(ControlChannelError::Protocol(
                "command sent before authentication".to_string(),
            ));
        }

        let reply = self.send_raw(cmd).await?;
        if !reply.is_ok() {
            warn!("Tor control error: {} {}", reply.code, reply.message());
            return Err(ControlChannelError::Rejected {
                code: reply.code,
                message: reply.message(),
            });
        }
        Ok(reply)
    }

    /// Ask Tor to switch to clean circuits
    pub async fn signal_newnym(&mut self) -> Result<(), ControlChannelError> {
        self.send_command("SIGNAL NEWNYM\r\n").await?;
        info!("Sent NEWNYM to Tor");
        Ok(())
    }

    /// Query a GETINFO keyword
    pub async fn get_info(&mut self, keyword: &str) -> Result<String, ControlChannelError> {
        let reply = self.send_command(&format!("GETINFO {}\r\n", keyword)).await?;
        let prefix = format!("{}=", keyword);
        Ok(reply
            .lines
            .iter()
            .find_map(|line| line.strip_prefix(&prefix))
            .unwrap_or_default()
            .to_string())
    }

    /// Close the session politely
    pub async fn quit(mut self) -> Result<(), ControlChannelError> {
        // Tor answers QUIT with "250 closing connection" and hangs up
        let reply = self.send_raw("QUIT\r\n").await?;
        if !reply.is_ok() {
            debug!("QUIT answered with {}", reply.code);
        }
        let _ = self.reader.get_mut().shutdown().await;
        Ok(())
    }

    async fn send_raw(&mut self, cmd: &str) -> Result<Reply, ControlChannelError> {
        // Never log the AUTHENTICATE secret
        let verb = cmd.split_whitespace().next().unwrap_or_default();
        debug!("Sending Tor command: {}", verb);

        let stream = self.reader.get_mut();
        stream.write_all(cmd.as_bytes()).await?;
        stream.flush().await?;

        match tokio::time::timeout(REPLY_TIMEOUT, read_reply(&mut self.reader)).await {
            Ok(result) => result,
            Err(_) => Err(ControlChannelError::Timeout),
        }
    }
}

/// Read one complete reply
///
/// Lines look like `250-key=value` (more follows), `250+key=` (data block
/// ending in a lone "."), or `250 OK` (final line).
async fn read_reply(reader: &mut BufReader<TcpStream>) -> Result<Reply, ControlChannelError> {
    let mut lines = Vec::new();
    let mut in_data_block = false;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Err(ControlChannelError::Protocol(
                "connection closed mid-reply".to_string(),
            ));
        }
        let line = line.trim_end_matches(['\r', '\n']);

        if in_data_block {
            if line == "." {
                in_data_block = false;
            } else {
                lines.push(line.to_string());
            }
            continue;
        }

        let (code, sep, text) = parse_reply_line(line)?;
        lines.push(text.to_string());
        match sep {
            ' ' => return Ok(Reply { code, lines }),
            '+' => in_data_block = true,
            _ => {},
        }
    }
}

fn parse_reply_line(line: &str) -> Result<(u16, char, &str), ControlChannelError> {
    let malformed = || ControlChannelError::Protocol(format!("malformed reply line: {:?}", line));

    if line.len() < 4 || !line.is_char_boundary(3) || !line.is_char_boundary(4) {
        return Err(malformed());
    }
    let code: u16 = line[..3].parse().map_err(|_| malformed())?;
    let sep = line[3..4].chars().next().ok_or_else(malformed)?;
    if !matches!(sep, ' ' | '-' | '+') {
        return Err(malformed());
    }
    Ok((code, sep, &line[4..]))
}
