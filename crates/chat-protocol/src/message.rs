//! Lines sent from the server to clients.

use std::fmt;

use chat_core::DomainError;

use crate::{FAREWELL_PREFIX, QUIT_COMMAND};

/// Every line the server can send, rendered through `Display`.
///
/// Names and bodies are borrowed so a notice can be built for each
/// delivery without cloning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerNotice<'a> {
    /// Asks for a display name.
    NamePrompt,

    /// The proposed name was rejected by validation.
    InvalidName(&'a DomainError),

    /// The proposed name belongs to another active session.
    NameTaken(&'a str),

    /// Private greeting after the name was accepted (two lines).
    Welcome(&'a str),

    /// Announcement to everybody else that a user joined.
    Joined(&'a str),

    /// Announcement to everybody else that a user left.
    Left(&'a str),

    /// Private goodbye to the user who is leaving.
    Farewell(&'a str),

    /// The client tried to send a line starting with the farewell prefix.
    ReservedPhrase,

    /// The client addressed a directed message to itself.
    SelfMessage,

    /// No directed-message recipient with that name is online.
    UnknownTarget(&'a str),

    /// The registry has no free slot.
    ServerFull,

    /// Chat or directed message as seen by the recipient: `<from> body`.
    Chat { from: &'a str, body: &'a str },

    /// Copy of a directed message returned to its sender: `>from> body`.
    DirectedEcho { from: &'a str, body: &'a str },
}

impl fmt::Display for ServerNotice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamePrompt => f.write_str("Please enter a nickname:"),
            Self::InvalidName(DomainError::ReservedCharacter { ch }) => {
                write!(f, "The name must not contain the '{ch}' character.")
            }
            Self::InvalidName(DomainError::EmptyName) => {
                f.write_str("The name must not be empty.")
            }
            Self::InvalidName(DomainError::InnerWhitespace) => {
                f.write_str("The name must not contain spaces.")
            }
            Self::InvalidName(other) => write!(f, "Invalid name: {other}"),
            Self::NameTaken(name) => write!(
                f,
                "The nickname '{name}' is already in use, please choose another one."
            ),
            Self::Welcome(name) => {
                writeln!(f, "Welcome {name} to our chat room.")?;
                write!(f, "To leave, enter \"{QUIT_COMMAND}\" in a new line.")
            }
            Self::Joined(name) => write!(f, "*** A new user {name} entered the chat room !!! ***"),
            Self::Left(name) => write!(f, "*** {name} has left ***"),
            Self::Farewell(name) => write!(f, "{FAREWELL_PREFIX} {name} ***"),
            Self::ReservedPhrase => f.write_str("*** WARNING: String not allowed ***"),
            Self::SelfMessage => f.write_str("You can't send a private message to yourself"),
            Self::UnknownTarget(name) => write!(f, "*** No user named {name} is online ***"),
            Self::ServerFull => f.write_str("Server too busy. Try later."),
            Self::Chat { from, body } => write!(f, "<{from}> {body}"),
            Self::DirectedEcho { from, body } => write!(f, ">{from}> {body}"),
        }
    }
}
