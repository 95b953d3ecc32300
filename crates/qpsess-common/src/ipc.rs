//! Line-delimited JSON framing for the host transport.
//!
//! Each request and each reply is one JSON document on its own line:
//!
//! ```text
//! {"command":"new","args":[]}
//! {"ok":[{"int64":4294967296}]}
//! {"command":"get_settings","args":[{"int64":4294967296}]}
//! {"error":{"kind":"settings_not_initialized","message":"settings not initialized"}}
//! ```
//!
//! `args` excludes the command name, so a session handle is always `args[0]`.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::value::HostValue;

/// One command from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub command: String,
    #[serde(default)]
    pub args: Vec<HostValue>,
}

/// Error payload of a failed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    /// Stable snake_case error name.
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

/// Reply to one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    /// Output values of the command, in positional order.
    Ok(Vec<HostValue>),
    Error(ErrorReply),
}

impl Reply {
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Reply::Error(ErrorReply {
            kind: kind.into(),
            message: message.into(),
        })
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Ok(_))
    }
}

/// Parse one request line.
pub fn parse_request(line: &str) -> serde_json::Result<Request> {
    serde_json::from_str(line)
}

/// Parse one reply line.
pub fn parse_reply(line: &str) -> serde_json::Result<Reply> {
    serde_json::from_str(line)
}

/// Write a reply as a single line.
pub fn write_reply<W: Write>(reply: &Reply, mut writer: W) -> io::Result<()> {
    serde_json::to_writer(&mut writer, reply).map_err(io::Error::from)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
