//! # Pick Arena
//!
//! A judge for the unique-pick number game, played between untrusted programs.
//!
//! It provides:
//! - Sandboxed participants talking a line protocol over their standard streams ([`sandbox`])
//! - Lazy, round-by-round games with error attribution to the faulty seat ([`game`])
//! - Validation of new submissions against a reference program ([`validator`])
//! - Concurrent round-robin tournaments with shared standings ([`tournament_scheduler`])
//!
//! Each participant runs as a separate OS process, either directly, inside a network-less
//! container with its artifact mounted read-only, or inside a Linux cgroup.
//!
//! # The game
//!
//! `n` programs play at most 1000 rounds. At launch, each program receives one line
//! `"<n> <k> <w> <seat>"`. Then, every round:
//!  * Program -> Arena : one integer in `[1, k]`
//!  * Arena -> Program : the `n` picks of the round, space separated, in seat order
//!
//! A pick chosen by no other seat is added to its seat's score. The first seat whose score is a
//! positive multiple of `w` wins. Anything else than an integer in `[1, k]`, a closed stream or a
//! crash ends the game in error, blamed on the faulty seat.
//!
//! # Usage Example
//!
//! ```no_run
//! use pick_arena::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::from_env();
//!     config.validate()?;
//!
//!     // exhibition game
//!     let programs = vec![
//!         Program::from_path("./python-submissions/alice.py"),
//!         Program::from_path("./executable-submissions/bob"),
//!     ];
//!     let record = run_game(programs, 3, 10, &config);
//!     println!("{} rounds, {}", record.rounds.len(), record.outcome);
//!
//!     // tournament over every accepted submission
//!     let store = ProgramStore::from_env();
//!     let scheduler = TournamentScheduler::new(config);
//!     scheduler.start(store.collect_programs()?)?;
//!     for (name, standing) in scheduler.wait().standings {
//!         println!("{name}: {standing}");
//!     }
//!     Ok(())
//! }
//! ```

mod cgroup_manager;
pub mod configuration;
pub mod error;
pub mod game;
mod launcher;
pub mod logger;
pub mod match_generator;
pub mod program;
pub mod program_collector;
pub mod sandbox;
pub mod tournament_scheduler;
pub mod validator;

pub use anyhow;
pub use launcher::Launcher;

/// Commonly used types and functions for quick access.
///
/// ```rust
/// use pick_arena::prelude::*;
/// ```
pub mod prelude {
    pub use crate::configuration::{Configuration, IsolationMode, ParamRange};
    pub use crate::error::{GameError, ProtocolError, TournamentError};
    pub use crate::game::{
        random_exhibition, run_game, spawn_game, GameEvent, GameParams, GameRecord, GameSession,
        Outcome, OutcomeKind, RoundSnapshot,
    };
    pub use crate::match_generator::MatchUp;
    pub use crate::program::{Program, ProgramKind};
    pub use crate::program_collector::ProgramStore;
    pub use crate::tournament_scheduler::{Standing, TournamentScheduler, TournamentStatus};
    pub use crate::validator::{SubmissionValidator, ValidationEvent, ValidationFailure};
}
