//! Error taxonomy of the arena.
//!
//! Protocol and initialization failures never escape a game: they become its
//! [`Outcome::Errored`](crate::game::Outcome::Errored). Tournament errors are returned to the
//! caller of [`TournamentScheduler::start`](crate::tournament_scheduler::TournamentScheduler::start).

use std::{io, time::Duration};

use thiserror::Error;

/// A participant broke the wire protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The participant answered something that is not an integer in `[1, k]`.
    #[error("'{literal}' is no valid output")]
    InvalidOutput {
        /// The offending line, trimmed.
        literal: String,
    },
    /// The output stream was closed and the process is gone.
    #[error("process exited with code {}.\nStderr:\n{stderr}", display_code(.code))]
    Exited {
        /// Exit code, `None` if the process was killed by a signal.
        code: Option<i32>,
        /// Everything the process wrote on its error stream.
        stderr: String,
    },
    /// The output stream was closed but the process is still running.
    #[error("no output received from process")]
    NoOutput,
    /// The participant did not answer before the configured deadline.
    #[error("no output received within {0:?}")]
    Timeout(Duration),
    /// Reading the output stream failed.
    #[error("could not read output: {0}")]
    Read(#[source] io::Error),
    /// Writing to the participant failed, usually because it already exited.
    #[error("could not write to process: {0}")]
    BrokenPipe(#[source] io::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (killed by signal)".to_owned(),
    }
}

/// Why a game ended in error. Always attributed to a seat by the caller.
#[derive(Debug, Error)]
pub enum GameError {
    /// The participant process could not be created or the handshake could not be sent.
    #[error("Initialisation error: {0:#}")]
    Initialization(anyhow::Error),
    /// The participant's pick could not be read.
    #[error("Error reading output of the program: {0}")]
    Read(#[source] ProtocolError),
    /// The round's picks could not be passed to the participant.
    #[error("Error passing the input to program: {0}")]
    Write(#[source] ProtocolError),
}

impl GameError {
    /// The protocol error behind this failure, if any.
    pub fn protocol(&self) -> Option<&ProtocolError> {
        match self {
            GameError::Initialization(_) => None,
            GameError::Read(e) | GameError::Write(e) => Some(e),
        }
    }
}

/// A tournament could not be started.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TournamentError {
    /// The previous tournament still has matches to play.
    #[error("Tournament is still running ({completed}/{total} matches played)")]
    InProgress {
        /// Matches already played.
        completed: usize,
        /// Matches scheduled.
        total: usize,
    },
    /// Less than two programs are available.
    #[error("Too few players ({0} program(s) available, at least 2 needed)")]
    TooFewPlayers(usize),
}
