// Typed errors for session setup and join validation.
//
// Everything here is user-displayable: the menu layer shows these messages
// verbatim when hosting or joining fails, and all of them are retryable —
// none indicate a crashed process. Steady-state transport failures never
// surface as errors at all; they are uniformly treated as a disconnect for
// the affected participant.

use std::io;

use thiserror::Error;

/// Failures while creating or joining a session.
#[derive(Debug, Error)]
pub enum SessionSetupError {
    #[error("could not listen on port {port}: {source}")]
    Bind { port: u16, source: io::Error },
    #[error("could not reach {addr}: {source}")]
    Connect { addr: String, source: io::Error },
    #[error("connection failed during handshake: {0}")]
    Handshake(#[from] io::Error),
    #[error("malformed session bootstrap: {0}")]
    Bootstrap(String),
    #[error("unknown map '{0}'")]
    UnknownMap(String),
}

/// Pre-join validation failures, produced before any socket is opened for
/// the real join (the menu probes the session first).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinValidationError {
    #[error("the name '{name}' is already taken in this session")]
    NameTaken { name: String },
    #[error("'{team}' is not one of this session's teams ({teams})")]
    UnknownTeam { team: String, teams: String },
}
