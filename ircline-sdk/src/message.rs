//! Inbound line parsing.
//!
//! Only the prefix and command are pulled apart here. Parameter structure
//! depends on the command (`target :trailing`, `me #chan :topic`, ...) and is
//! interpreted by the dispatcher.

use crate::error::ParseError;

/// One parsed protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The line exactly as received, terminator included.
    pub raw: String,
    /// Sender identity without the leading `:`; empty when the line had none.
    pub prefix: String,
    /// Verb or numeric reply, upper-cased. Never empty.
    pub command: String,
    /// Everything after the command token, minus the line terminator.
    pub params: String,
}

impl Message {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        if raw.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut rest = raw;
        let mut prefix = "";

        if let Some(after_marker) = rest.strip_prefix(':') {
            match after_marker.find([' ', '\r', '\n']) {
                Some(end) if end > 0 && after_marker.as_bytes()[end] == b' ' => {
                    prefix = &after_marker[..end];
                    rest = &after_marker[end + 1..];
                }
                _ => return Err(ParseError::MalformedPrefix),
            }
        }

        let Some(end) = rest.find([' ', '\r', '\n']) else {
            return Err(ParseError::Unterminated);
        };
        if end == 0 {
            return Err(ParseError::MissingCommand);
        }
        let command = rest[..end].to_uppercase();

        // A space separator is skipped; a terminator right after the command
        // means there are no params at all.
        let params = if rest.as_bytes()[end] == b' ' {
            strip_terminator(&rest[end + 1..])
        } else {
            ""
        };

        Ok(Self {
            raw: raw.to_string(),
            prefix: prefix.to_string(),
            command,
            params: params.to_string(),
        })
    }

    /// Nickname part of the prefix (`nick!user@host` → `nick`).
    pub fn nick(&self) -> &str {
        self.prefix.split('!').next().unwrap_or_default()
    }

    /// Three-digit numeric reply such as `332`.
    pub fn is_numeric(&self) -> bool {
        self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit())
    }
}

fn strip_terminator(s: &str) -> &str {
    s.strip_suffix('\n')
        .map(|s| s.strip_suffix('\r').unwrap_or(s))
        .unwrap_or(s)
}
