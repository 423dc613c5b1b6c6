//! Pre-acceptance check of new submissions.
//!
//! A candidate plays a number of random games against copies of a trusted reference program.
//! Winning, losing and drawing are all fine; any game ending in error rejects the candidate.

use rand::{rngs::StdRng, Rng, SeedableRng};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::{
    configuration::Configuration,
    error::GameError,
    game::{GameParams, GameSession, Outcome, OutcomeKind},
    program::Program,
};

/// One passed trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialReport {
    /// 0-based trial index.
    pub trial: usize,
    pub total: usize,
    pub params: GameParams,
    pub candidate_seat: usize,
    pub outcome: OutcomeKind,
    /// Share of trials done, in percent.
    pub percent: u32,
}

/// A trial game ended in error.
#[derive(Debug, Error)]
#[error("trial {} ({params}, candidate in seat {candidate_seat}): seat {seat} failed: {error}", .trial + 1)]
pub struct ValidationFailure {
    /// 0-based trial index.
    pub trial: usize,
    pub params: GameParams,
    pub candidate_seat: usize,
    /// Seat the error is attributed to.
    pub seat: usize,
    pub error: GameError,
}

/// Progress of a validation run.
#[derive(Debug)]
pub enum ValidationEvent {
    Progress(TrialReport),
    Passed,
    Failed(ValidationFailure),
}

/// Plays candidates against a reference program.
#[derive(Debug, Clone)]
pub struct SubmissionValidator {
    config: Configuration,
    reference: Program,
}

impl SubmissionValidator {
    pub fn new(config: Configuration, reference: Program) -> Self {
        Self { config, reference }
    }

    /// Validate `candidate` with OS-seeded randomness.
    pub fn validate(&self, candidate: Program) -> ValidationRun<StdRng> {
        self.validate_with_rng(candidate, StdRng::from_os_rng())
    }

    /// Validate `candidate`, drawing game parameters and seats from `rng`.
    #[instrument(skip_all, fields(candidate = %candidate.name))]
    pub fn validate_with_rng<R: Rng>(&self, candidate: Program, rng: R) -> ValidationRun<R> {
        info!(trials = self.config.validation_trials, "validating");
        ValidationRun {
            config: self.config.clone(),
            reference: self.reference.clone(),
            candidate,
            rng,
            trial: 0,
            finished: false,
        }
    }
}

/// Lazy validation: each `next()` plays one trial. Ends with [`ValidationEvent::Passed`] or
/// [`ValidationEvent::Failed`].
pub struct ValidationRun<R> {
    config: Configuration,
    reference: Program,
    candidate: Program,
    rng: R,
    trial: usize,
    finished: bool,
}

impl<R: Rng> ValidationRun<R> {
    /// Play the remaining trials and return the verdict.
    pub fn verdict(self) -> Result<(), ValidationFailure> {
        for event in self {
            if let ValidationEvent::Failed(failure) = event {
                return Err(failure);
            }
        }
        Ok(())
    }

    fn play_trial(&mut self) -> ValidationEvent {
        let total = self.config.validation_trials;
        let n = self.config.players.sample(&mut self.rng);
        let k = self.config.k.sample(&mut self.rng);
        let w = self.config.w.sample(&mut self.rng);
        let candidate_seat = self.rng.random_range(0..n as usize);

        let programs = (0..n as usize)
            .map(|seat| {
                if seat == candidate_seat {
                    self.candidate.clone()
                } else {
                    self.reference.clone()
                }
            })
            .collect();
        let session = GameSession::new(programs, k, w, &self.config);
        let params = session.params();
        let outcome = session.outcome();

        let trial = self.trial;
        self.trial += 1;
        match outcome {
            Outcome::Errored { seat, error } => {
                warn!(trial, %params, candidate_seat, seat, "validation failed: {error}");
                self.finished = true;
                ValidationEvent::Failed(ValidationFailure {
                    trial,
                    params,
                    candidate_seat,
                    seat,
                    error,
                })
            }
            outcome => ValidationEvent::Progress(TrialReport {
                trial,
                total,
                params,
                candidate_seat,
                outcome: outcome.kind(),
                percent: ((trial + 1) * 100 / total) as u32,
            }),
        }
    }
}

impl<R: Rng> Iterator for ValidationRun<R> {
    type Item = ValidationEvent;

    fn next(&mut self) -> Option<ValidationEvent> {
        if self.finished {
            return None;
        }
        if self.trial >= self.config.validation_trials {
            self.finished = true;
            info!(candidate = %self.candidate, "validation passed");
            return Some(ValidationEvent::Passed);
        }
        Some(self.play_trial())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlaunchable_candidate_fails_first_trial() {
        let config = Configuration::new()
            .with_players(2, 2)
            .with_validation_trials(3);
        let validator = SubmissionValidator::new(config, Program::from_path("/no/reference"));
        let mut run =
            validator.validate_with_rng(Program::from_path("/no/candidate"), StdRng::seed_from_u64(1));

        match run.next() {
            Some(ValidationEvent::Failed(failure)) => {
                assert_eq!(failure.trial, 0);
                assert_eq!(failure.params.n, 2);
                assert!(matches!(failure.error, GameError::Initialization(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(run.next().is_none());
    }
}
