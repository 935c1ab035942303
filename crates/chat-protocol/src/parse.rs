//! Classification of lines received from clients.

use crate::{ADDRESS_CHAR, FAREWELL_PREFIX, QUIT_COMMAND};

/// A line received from an active (named) client, classified by intent.
///
/// Borrowed from the input line, so classification never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientLine<'a> {
    /// The quit command.
    Quit,

    /// The line imitates the server's farewell message.
    ReservedPhrase,

    /// A message addressed to a single user.
    Directed {
        /// Name after the `@`, up to the first whitespace run
        target: &'a str,
        /// Remaining text, trimmed and never empty
        body: &'a str,
    },

    /// A directed message without a target or without a body.
    /// Dropped without telling the client.
    MalformedDirected,

    /// Regular chat text for everyone.
    Chat(&'a str),
}

impl<'a> ClientLine<'a> {
    /// Classifies a line with its line ending already removed.
    ///
    /// Rules are checked in priority order: quit, reserved phrase,
    /// directed message, chat.
    pub fn parse(line: &'a str) -> Self {
        if line == QUIT_COMMAND {
            return Self::Quit;
        }

        if line.starts_with(FAREWELL_PREFIX) {
            return Self::ReservedPhrase;
        }

        if let Some(rest) = line.strip_prefix(ADDRESS_CHAR) {
            return Self::parse_directed(rest);
        }

        Self::Chat(line)
    }

    fn parse_directed(rest: &'a str) -> Self {
        let Some((target, body)) = rest.split_once(char::is_whitespace) else {
            return Self::MalformedDirected;
        };

        let body = body.trim();
        if target.is_empty() || body.is_empty() {
            return Self::MalformedDirected;
        }

        Self::Directed { target, body }
    }
}

/// Removes a trailing `\n` or `\r\n` from a line read off the wire.
pub fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
