//! One game of the unique-pick number game.
//!
//! Every round, each seat picks an integer in `[1, k]`. Then every seat is told every pick. A
//! seat whose pick was chosen by no other seat adds the pick to its score. The first seat (in
//! seat order) whose score becomes a positive multiple of `w` wins. After the configured number
//! of rounds (1000 by default) without winner, the game is a draw.
//!
//! A [`GameSession`] is a lazy sequence of [`GameEvent`]s: one [`RoundSnapshot`] per completed
//! round, then exactly one [`Outcome`]. Participants are torn down as soon as the outcome is
//! known, or when the session is dropped.

use std::{collections::HashMap, fmt, mem, sync::mpsc, time::Duration};

use anyhow::{bail, Context};
use rand::{seq::IndexedRandom, Rng};
use tracing::{debug, info, warn};

use crate::{
    configuration::Configuration, error::GameError, launcher::Launcher, program::Program,
    sandbox::ProcessSandbox,
};

/// Parameters sent to every participant at launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameParams {
    /// Number of participants.
    pub n: u32,
    /// Upper bound of a pick.
    pub k: u32,
    /// Win modulus.
    pub w: u32,
}

impl fmt::Display for GameParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={} k={} w={}", self.n, self.k, self.w)
    }
}

/// State after a completed round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSnapshot {
    /// 1-based round number.
    pub round: usize,
    /// Cumulative scores, in seat order.
    pub scores: Vec<u64>,
    /// Picks of this round, in seat order.
    pub picks: Vec<u32>,
}

/// How a game ended, without the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Win,
    Draw,
    Error,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutcomeKind::Win => "win",
            OutcomeKind::Draw => "draw",
            OutcomeKind::Error => "error",
        })
    }
}

/// Terminal state of a game.
#[derive(Debug)]
pub enum Outcome {
    /// `seat` reached a positive multiple of `w` first.
    Won { seat: usize },
    /// No winner after the maximum number of rounds.
    Drawn,
    /// `seat` failed to launch or broke the protocol.
    Errored { seat: usize, error: GameError },
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Won { .. } => OutcomeKind::Win,
            Outcome::Drawn => OutcomeKind::Draw,
            Outcome::Errored { .. } => OutcomeKind::Error,
        }
    }

    /// Winning or failing seat.
    pub fn seat(&self) -> Option<usize> {
        match self {
            Outcome::Won { seat } | Outcome::Errored { seat, .. } => Some(*seat),
            Outcome::Drawn => None,
        }
    }

    /// Human readable message: `Win`, `Draw` or the error cause.
    pub fn message(&self) -> String {
        match self {
            Outcome::Won { .. } => "Win".to_owned(),
            Outcome::Drawn => "Draw".to_owned(),
            Outcome::Errored { error, .. } => error.to_string(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Won { seat } => write!(f, "seat {seat} won"),
            Outcome::Drawn => write!(f, "draw"),
            Outcome::Errored { seat, error } => write!(f, "seat {seat} failed: {error}"),
        }
    }
}

/// Something observable happening in a game.
#[derive(Debug)]
pub enum GameEvent {
    Round(RoundSnapshot),
    Finished(Outcome),
}

/// Scores and picks of a running game, index-aligned to seats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub scores: Vec<u64>,
    pub submissions: Vec<u32>,
}

impl GameState {
    pub fn new(n: usize) -> Self {
        Self {
            scores: vec![0; n],
            submissions: vec![0; n],
        }
    }
}

/// Add each unique pick to its seat's score. Picks shared by several seats score nothing.
pub fn score_round(picks: &[u32], scores: &mut [u64]) {
    debug_assert_eq!(picks.len(), scores.len());
    let mut counts: HashMap<u32, usize> = HashMap::with_capacity(picks.len());
    for pick in picks {
        *counts.entry(*pick).or_default() += 1;
    }
    for (score, pick) in scores.iter_mut().zip(picks) {
        if counts[pick] == 1 {
            *score += u64::from(*pick);
        }
    }
}

/// Lowest seat whose score is a positive multiple of `w`.
pub fn find_winner(scores: &[u64], w: u32) -> Option<usize> {
    let w = u64::from(w);
    if w == 0 {
        return None;
    }
    scores.iter().position(|score| *score > 0 && score % w == 0)
}

enum Phase {
    Initializing(Vec<Program>),
    Running {
        sandboxes: Vec<ProcessSandbox>,
        state: GameState,
        round: usize,
    },
    Ending(Outcome),
    Done,
}

/// A game between programs, played lazily as it is iterated.
pub struct GameSession {
    params: GameParams,
    launcher: Launcher,
    read_timeout: Option<Duration>,
    max_rounds: usize,
    phase: Phase,
}

impl GameSession {
    /// Prepare a game. Seat `i` is `programs[i]`; nothing is launched before the first `next()`.
    pub fn new(programs: Vec<Program>, k: u32, w: u32, config: &Configuration) -> GameSession {
        let params = GameParams {
            n: programs.len() as u32,
            k,
            w,
        };
        GameSession {
            params,
            launcher: Launcher::from_config(config),
            read_timeout: config.read_timeout,
            max_rounds: config.max_rounds,
            phase: Phase::Initializing(programs),
        }
    }

    pub fn params(&self) -> GameParams {
        self.params
    }

    /// Drain the game and return its outcome only.
    pub fn outcome(self) -> Outcome {
        let mut outcome = None;
        for event in self {
            if let GameEvent::Finished(o) = event {
                outcome = Some(o);
            }
        }
        // a session always finishes with an outcome
        outcome.unwrap_or(Outcome::Drawn)
    }

    fn launch(&self, programs: &[Program]) -> Result<Vec<ProcessSandbox>, Outcome> {
        info!(
            params = %self.params,
            programs = ?programs.iter().map(|p| &p.name).collect::<Vec<_>>(),
            "launching game"
        );
        let mut sandboxes = Vec::with_capacity(programs.len());
        for (seat, program) in programs.iter().enumerate() {
            match ProcessSandbox::init(program, self.params, seat, &self.launcher, self.read_timeout)
            {
                Ok(sandbox) => sandboxes.push(sandbox),
                Err(e) => {
                    warn!(seat, program = %program, "initialization failed: {e:#}");
                    // already launched sandboxes are torn down when dropped here
                    return Err(Outcome::Errored {
                        seat,
                        error: GameError::Initialization(e),
                    });
                }
            }
        }
        Ok(sandboxes)
    }

    fn play_round(sandboxes: &mut [ProcessSandbox], state: &mut GameState) -> Result<(), Outcome> {
        for (seat, sandbox) in sandboxes.iter_mut().enumerate() {
            match sandbox.read_pick() {
                Ok(pick) => state.submissions[seat] = pick,
                Err(e) => {
                    warn!(seat, program = sandbox.program(), "read failed: {e}");
                    return Err(Outcome::Errored {
                        seat,
                        error: GameError::Read(e),
                    });
                }
            }
        }

        for (seat, sandbox) in sandboxes.iter_mut().enumerate() {
            if let Err(e) = sandbox.write_broadcast(&state.submissions) {
                warn!(seat, program = sandbox.program(), "write failed: {e}");
                return Err(Outcome::Errored {
                    seat,
                    error: GameError::Write(e),
                });
            }
        }

        score_round(&state.submissions, &mut state.scores);
        Ok(())
    }
}

impl Iterator for GameSession {
    type Item = GameEvent;

    fn next(&mut self) -> Option<GameEvent> {
        loop {
            match mem::replace(&mut self.phase, Phase::Done) {
                Phase::Initializing(programs) => match self.launch(&programs) {
                    Ok(sandboxes) => {
                        self.phase = Phase::Running {
                            state: GameState::new(sandboxes.len()),
                            sandboxes,
                            round: 0,
                        };
                    }
                    Err(outcome) => return Some(GameEvent::Finished(outcome)),
                },
                Phase::Running {
                    mut sandboxes,
                    mut state,
                    round,
                } => {
                    if round >= self.max_rounds {
                        drop(sandboxes);
                        debug!(params = %self.params, scores = ?state.scores, "draw");
                        return Some(GameEvent::Finished(Outcome::Drawn));
                    }

                    if let Err(outcome) = Self::play_round(&mut sandboxes, &mut state) {
                        drop(sandboxes);
                        return Some(GameEvent::Finished(outcome));
                    }

                    let snapshot = RoundSnapshot {
                        round: round + 1,
                        scores: state.scores.clone(),
                        picks: state.submissions.clone(),
                    };

                    match find_winner(&state.scores, self.params.w) {
                        Some(seat) => {
                            drop(sandboxes);
                            debug!(params = %self.params, seat, round = round + 1, "win");
                            self.phase = Phase::Ending(Outcome::Won { seat });
                        }
                        None => {
                            self.phase = Phase::Running {
                                sandboxes,
                                state,
                                round: round + 1,
                            };
                        }
                    }
                    return Some(GameEvent::Round(snapshot));
                }
                Phase::Ending(outcome) => return Some(GameEvent::Finished(outcome)),
                Phase::Done => return None,
            }
        }
    }
}

/// Full trace of an exhibition game.
#[derive(Debug)]
pub struct GameRecord {
    pub params: GameParams,
    /// Program names, in seat order.
    pub names: Vec<String>,
    pub rounds: Vec<RoundSnapshot>,
    pub outcome: Outcome,
}

/// Play a whole game and keep every round.
pub fn run_game(programs: Vec<Program>, k: u32, w: u32, config: &Configuration) -> GameRecord {
    let names = programs.iter().map(|p| p.name.clone()).collect();
    let session = GameSession::new(programs, k, w, config);
    let params = session.params();

    let mut rounds = vec![];
    let mut outcome = None;
    for event in session {
        match event {
            GameEvent::Round(snapshot) => rounds.push(snapshot),
            GameEvent::Finished(o) => outcome = Some(o),
        }
    }

    GameRecord {
        params,
        names,
        rounds,
        outcome: outcome.unwrap_or(Outcome::Drawn),
    }
}

/// Play a game on its own thread, streaming its events.
pub fn spawn_game(
    programs: Vec<Program>,
    k: u32,
    w: u32,
    config: &Configuration,
) -> anyhow::Result<mpsc::Receiver<GameEvent>> {
    let session = GameSession::new(programs, k, w, config);
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("game".to_owned())
        .spawn(move || {
            for event in session {
                if tx.send(event).is_err() {
                    // receiver gone, dropping the session tears the game down
                    break;
                }
            }
        })
        .context("could not spawn game thread")?;
    Ok(rx)
}

/// Play a game between random programs of `pool` with random parameters.
///
/// The player count is drawn from the configured range capped at the pool size.
pub fn random_exhibition<R: Rng + ?Sized>(
    pool: &[Program],
    config: &Configuration,
    rng: &mut R,
) -> anyhow::Result<GameRecord> {
    if pool.len() < config.players.min as usize {
        bail!(
            "at least {} programs are needed, {} available",
            config.players.min,
            pool.len()
        );
    }
    let n = config.players.capped(pool.len() as u32).sample(rng);
    let k = config.k.sample(rng);
    let w = config.w.sample(rng);
    let programs = pool
        .choose_multiple(rng, n as usize)
        .cloned()
        .collect::<Vec<_>>();
    Ok(run_game(programs, k, w, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_picks_score_their_value() {
        let mut scores = vec![0, 0];
        score_round(&[1, 2], &mut scores);
        assert_eq!(scores, vec![1, 2]);
        score_round(&[1, 2], &mut scores);
        assert_eq!(scores, vec![2, 4]);
        assert_eq!(find_winner(&scores, 4), Some(1));
    }

    #[test]
    fn shared_picks_score_nothing() {
        let mut scores = vec![5, 5, 5, 5];
        score_round(&[3, 3, 2, 1], &mut scores);
        assert_eq!(scores, vec![5, 5, 7, 6]);

        let mut scores = vec![0, 0, 0];
        for _ in 0..10 {
            score_round(&[4, 4, 4], &mut scores);
        }
        assert_eq!(scores, vec![0, 0, 0]);
    }

    #[test]
    fn lowest_seat_wins_ties() {
        assert_eq!(find_winner(&[10, 20, 0], 10), Some(0));
        assert_eq!(find_winner(&[3, 20, 10], 10), Some(1));
        assert_eq!(find_winner(&[0, 0, 0], 10), None);
        assert_eq!(find_winner(&[9, 11, 19], 10), None);
        assert_eq!(find_winner(&[4], 0), None);
    }

    #[test]
    fn outcome_reports_kind_seat_and_message() {
        let won = Outcome::Won { seat: 2 };
        assert_eq!(won.kind(), OutcomeKind::Win);
        assert_eq!(won.seat(), Some(2));
        assert_eq!(won.message(), "Win");

        let drawn = Outcome::Drawn;
        assert_eq!((drawn.kind(), drawn.seat()), (OutcomeKind::Draw, None));

        let errored = Outcome::Errored {
            seat: 1,
            error: GameError::Initialization(anyhow::anyhow!("no binary")),
        };
        assert_eq!(errored.kind(), OutcomeKind::Error);
        assert_eq!(errored.seat(), Some(1));
        assert!(errored.message().contains("no binary"));
    }

    #[test]
    fn missing_program_errors_its_seat() {
        let config = Configuration::new().with_verbose(false);
        let programs = vec![Program::from_path("/no/such/bot")];
        let mut session = GameSession::new(programs, 3, 4, &config);
        match session.next() {
            Some(GameEvent::Finished(Outcome::Errored { seat: 0, error })) => {
                assert!(matches!(error, GameError::Initialization(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(session.next().is_none());
    }
}
