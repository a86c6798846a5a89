//! Response classification
//!
//! Every line the printer sends is one of three things: an acknowledgment
//! that releases the next command, a fault report, or console chatter
//! (temperatures, `echo:` lines, start-up banners).

use serde::{Deserialize, Serialize};

/// How acknowledgments are recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMatch {
    /// The line starts with the word `ok`
    #[default]
    Prefix,
    /// The word `ok` appears anywhere in the line
    Contains,
}

/// A classified response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceResponse {
    /// Acknowledgment of the last command
    Ack(String),
    /// Device-reported fault
    Fault(String),
    /// Informational output
    Info(String),
}

impl DeviceResponse {
    /// The trimmed response text
    pub fn text(&self) -> &str {
        match self {
            DeviceResponse::Ack(text) | DeviceResponse::Fault(text) | DeviceResponse::Info(text) => {
                text
            }
        }
    }

    /// Check if this is an acknowledgment
    pub fn is_ack(&self) -> bool {
        matches!(self, DeviceResponse::Ack(_))
    }
}

/// Response parser
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser {
    ack_match: AckMatch,
}

impl ResponseParser {
    /// Create a parser with the given acknowledgment rule
    pub fn new(ack_match: AckMatch) -> Self {
        Self { ack_match }
    }

    /// The active acknowledgment rule
    pub fn ack_match(&self) -> AckMatch {
        self.ack_match
    }

    /// Classify one response line; blank lines yield `None`
    pub fn parse(&self, line: &str) -> Option<DeviceResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = if self.is_ack(line) {
            DeviceResponse::Ack(line.to_string())
        } else if line.to_ascii_lowercase().contains("error") {
            DeviceResponse::Fault(line.to_string())
        } else {
            DeviceResponse::Info(line.to_string())
        };
        Some(response)
    }

    fn is_ack(&self, line: &str) -> bool {
        match self.ack_match {
            AckMatch::Prefix => line.starts_with("ok") && !continues_word(&line[2..]),
            AckMatch::Contains => line.match_indices("ok").any(|(at, _)| {
                let before_ok = line[..at].chars().next_back().map_or(true, |c| !is_word_char(c));
                before_ok && !continues_word(&line[at + 2..])
            }),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn continues_word(rest: &str) -> bool {
    rest.chars().next().is_some_and(is_word_char)
}
