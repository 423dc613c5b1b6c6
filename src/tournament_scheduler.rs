//! Round-robin tournaments over the program pool.
//!
//! [`TournamentScheduler::start`] enumerates every match-up, shuffles them, and hands them to a
//! bounded pool of worker threads. Workers only play games; a single aggregator thread applies
//! each result to the shared standings, under one mutex, so the standings and the completed
//! counter always move together. `start` returns as soon as the tournament is launched.

use std::{
    any::Any,
    cmp::Reverse,
    collections::{HashMap, VecDeque},
    panic::{self, AssertUnwindSafe},
    sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

use rand::seq::SliceRandom;
use tracing::{debug, info, instrument, warn};

use crate::{
    configuration::Configuration,
    error::TournamentError,
    game::{GameSession, Outcome},
    match_generator::{enumerate_all, MatchUp},
    program::Program,
};

/// Tournament record of one program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Standing {
    /// Ranking score: one point per win.
    pub points: u64,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    /// Matches that ended in error because of this program.
    pub errors: u32,
}

impl std::fmt::Display for Standing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} pts (win: {}, draw: {}, loose: {}, error: {})",
            self.points, self.wins, self.draws, self.losses, self.errors
        )
    }
}

/// Snapshot of the current (or last) tournament.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TournamentStatus {
    /// Program labels and standings, best first, ties by label. A label is the program name,
    /// followed by its path and arguments when several programs share that name.
    pub standings: Vec<(String, Standing)>,
    pub completed: usize,
    pub total: usize,
}

impl TournamentStatus {
    pub fn is_running(&self) -> bool {
        self.completed < self.total
    }
}

#[derive(Debug, Default)]
struct TournamentState {
    standings: HashMap<Program, Standing>,
    completed: usize,
    total: usize,
}

impl TournamentState {
    fn apply(&mut self, report: MatchReport) {
        let MatchReport { matchup, result } = report;
        match result {
            Ok(Outcome::Won { seat }) => {
                for (i, program) in matchup.programs.iter().enumerate() {
                    let standing = self.standings.entry(program.clone()).or_default();
                    if i == seat {
                        standing.points += 1;
                        standing.wins += 1;
                    } else {
                        standing.losses += 1;
                    }
                }
            }
            Ok(Outcome::Drawn) => {
                for program in &matchup.programs {
                    self.standings.entry(program.clone()).or_default().draws += 1;
                }
            }
            Ok(Outcome::Errored { seat, error }) => {
                debug!(%matchup, seat, "match errored: {error}");
                if let Some(program) = matchup.programs.get(seat) {
                    self.standings.entry(program.clone()).or_default().errors += 1;
                }
            }
            Err(panic_message) => {
                warn!(%matchup, "match runner panicked: {panic_message}");
            }
        }
        self.completed += 1;
    }

    /// Standings labelled for display, best first, ties by label.
    ///
    /// Programs are labelled by name. Programs sharing a name are told apart by their path and
    /// arguments.
    fn table(&self) -> Vec<(String, Standing)> {
        let mut name_count = HashMap::<&str, usize>::new();
        for program in self.standings.keys() {
            *name_count.entry(program.name.as_str()).or_default() += 1;
        }
        let mut table = self
            .standings
            .iter()
            .map(|(program, standing)| {
                let label = if name_count[program.name.as_str()] > 1 {
                    qualified_label(program)
                } else {
                    program.name.clone()
                };
                (label, *standing)
            })
            .collect::<Vec<_>>();
        table.sort_by(|a, b| {
            Reverse(a.1.points)
                .cmp(&Reverse(b.1.points))
                .then_with(|| a.0.cmp(&b.0))
        });
        table
    }
}

fn qualified_label(program: &Program) -> String {
    let mut label = format!("{} ({}", program.name, program.path.display());
    for arg in &program.args {
        label.push(' ');
        label.push_str(arg);
    }
    label.push(')');
    label
}

struct MatchReport {
    matchup: MatchUp,
    /// `Err` holds the panic message of a crashed runner.
    result: Result<Outcome, String>,
}

type SharedState = Arc<(Mutex<TournamentState>, Condvar)>;

/// Starts tournaments and exposes their standings. Cheap to clone; clones share the tournament.
#[derive(Clone)]
pub struct TournamentScheduler {
    config: Configuration,
    state: SharedState,
}

impl TournamentScheduler {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            state: Arc::new((Mutex::new(TournamentState::default()), Condvar::new())),
        }
    }

    /// Launch a tournament between `programs` and return the number of scheduled matches.
    ///
    /// # Errors
    /// [`TournamentError::InProgress`] while the previous tournament has matches left, and
    /// [`TournamentError::TooFewPlayers`] with less than two programs.
    #[instrument(skip_all, fields(programs = programs.len()))]
    pub fn start(&self, programs: Vec<Program>) -> Result<usize, TournamentError> {
        let mut state = lock(&self.state);
        if state.completed < state.total {
            return Err(TournamentError::InProgress {
                completed: state.completed,
                total: state.total,
            });
        }
        let min_players = (self.config.players.min as usize).max(2);
        if programs.len() < min_players {
            return Err(TournamentError::TooFewPlayers(programs.len()));
        }

        let mut rng = rand::rng();
        let mut matchups = enumerate_all(&programs, &self.config).collect::<Vec<_>>();
        matchups.shuffle(&mut rng);
        for matchup in &mut matchups {
            matchup.programs.shuffle(&mut rng);
        }

        state.standings = programs
            .iter()
            .map(|program| (program.clone(), Standing::default()))
            .collect();
        state.total = matchups.len();
        state.completed = 0;
        let total = state.total;
        drop(state);

        info!(total, "starting tournament");
        self.launch(matchups);
        Ok(total)
    }

    /// Standings, completed and total matches. Safe to call at any time.
    pub fn status(&self) -> TournamentStatus {
        let state = lock(&self.state);
        TournamentStatus {
            standings: state.table(),
            completed: state.completed,
            total: state.total,
        }
    }

    /// Block until every match of the current tournament is played.
    pub fn wait(&self) -> TournamentStatus {
        let (mutex, condvar) = &*self.state;
        let guard = mutex.lock().unwrap_or_else(PoisonError::into_inner);
        let guard = condvar
            .wait_while(guard, |state| state.completed < state.total)
            .unwrap_or_else(PoisonError::into_inner);
        drop(guard);
        self.status()
    }

    fn launch(&self, matchups: Vec<MatchUp>) {
        if matchups.is_empty() {
            return;
        }
        let workers = self.config.parallel_matches.clamp(1, matchups.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(matchups)));
        let (tx_report, rx_report) = mpsc::channel::<MatchReport>();

        for _ in 0..workers {
            let queue = queue.clone();
            let tx_report = tx_report.clone();
            let config = self.config.clone();
            std::thread::spawn(move || loop {
                let next = queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pop_front();
                let Some(matchup) = next else {
                    break;
                };
                let result = run_match(&matchup, &config);
                if tx_report.send(MatchReport { matchup, result }).is_err() {
                    break;
                }
            });
        }
        drop(tx_report);

        let state = self.state.clone();
        std::thread::spawn(move || {
            // ends once every worker dropped its sender
            for report in rx_report {
                let (mutex, condvar) = &*state;
                let mut guard = mutex.lock().unwrap_or_else(PoisonError::into_inner);
                debug!(matchup = %report.matchup, outcome = ?report.result.as_ref().map(Outcome::kind));
                guard.apply(report);
                if guard.completed == guard.total {
                    info!(total = guard.total, "tournament finished");
                }
                drop(guard);
                condvar.notify_all();
            }
        });
    }
}

fn lock(state: &SharedState) -> MutexGuard<'_, TournamentState> {
    state.0.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Play one match, turning a panic of the runner into an error report.
fn run_match(matchup: &MatchUp, config: &Configuration) -> Result<Outcome, String> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        GameSession::new(
            matchup.programs.clone(),
            matchup.params.k,
            matchup.params.w,
            config,
        )
        .outcome()
    }))
    .map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::GameError, game::GameParams};

    fn program(name: &str) -> Program {
        Program::from_path(format!("/bots/{name}"))
    }

    fn matchup(names: &[&str]) -> MatchUp {
        MatchUp {
            programs: names.iter().map(|name| program(name)).collect(),
            params: GameParams {
                n: names.len() as u32,
                k: 3,
                w: 10,
            },
        }
    }

    #[test]
    fn outcomes_update_standings_once() {
        let mut state = TournamentState {
            total: 4,
            ..Default::default()
        };

        state.apply(MatchReport {
            matchup: matchup(&["a", "b", "c"]),
            result: Ok(Outcome::Won { seat: 1 }),
        });
        state.apply(MatchReport {
            matchup: matchup(&["a", "b"]),
            result: Ok(Outcome::Drawn),
        });
        state.apply(MatchReport {
            matchup: matchup(&["c", "a"]),
            result: Ok(Outcome::Errored {
                seat: 0,
                error: GameError::Initialization(anyhow::anyhow!("gone")),
            }),
        });
        state.apply(MatchReport {
            matchup: matchup(&["a", "c"]),
            result: Err("boom".to_owned()),
        });

        assert_eq!(state.completed, 4);
        assert_eq!(
            state.standings[&program("b")],
            Standing {
                points: 1,
                wins: 1,
                draws: 1,
                ..Default::default()
            }
        );
        assert_eq!(
            state.standings[&program("a")],
            Standing {
                losses: 1,
                draws: 1,
                ..Default::default()
            }
        );
        assert_eq!(
            state.standings[&program("c")],
            Standing {
                losses: 1,
                errors: 1,
                ..Default::default()
            }
        );
    }

    #[test]
    fn programs_sharing_a_name_keep_their_own_standing() {
        let script = Program::from_path("/python-submissions/alice.py");
        let native = Program::from_path("/executable-submissions/alice");
        let mut state = TournamentState {
            standings: [script.clone(), native.clone()]
                .into_iter()
                .map(|program| (program, Standing::default()))
                .collect(),
            total: 1,
            ..Default::default()
        };
        state.apply(MatchReport {
            matchup: MatchUp {
                programs: vec![native.clone(), script.clone()],
                params: GameParams { n: 2, k: 3, w: 10 },
            },
            result: Ok(Outcome::Won { seat: 1 }),
        });

        assert_eq!(state.standings[&script].wins, 1);
        assert_eq!(state.standings[&native].losses, 1);

        let table = state.table();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].0, "alice (/python-submissions/alice.py)");
        assert_eq!(table[0].1.points, 1);
        assert_eq!(table[1].0, "alice (/executable-submissions/alice)");
    }

    #[test]
    fn too_few_players_is_rejected() {
        let scheduler = TournamentScheduler::new(Configuration::new().with_verbose(false));
        assert_eq!(
            scheduler.start(vec![Program::from_path("/bots/alone")]),
            Err(TournamentError::TooFewPlayers(1))
        );
        assert!(!scheduler.status().is_running());
    }

    #[test]
    fn panic_messages_are_kept() {
        let payload = panic::catch_unwind(|| panic!("bad {}", 1)).unwrap_err();
        assert_eq!(panic_message(payload), "bad 1");
    }
}
