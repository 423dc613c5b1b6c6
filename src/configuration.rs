//! Config for the arena behaviors
//!
//! This module provides configuration options for controlling games, submission validation and
//! tournaments.
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! The following environment variables can be used to override configuration values. All
//! values are optional. Flags are case-insensitive; set the value to `"true"` to enable one.
//! Numeric values that do not parse are ignored and the default is kept.
//!
//! - `ARENA_MIN_PLAYERS` / `ARENA_MAX_PLAYERS`: participant count range (default: `2..=6`)
//! - `ARENA_MIN_K` / `ARENA_MAX_K`: choice upper bound range (default: `3..=10`)
//! - `ARENA_MIN_W` / `ARENA_MAX_W`: win modulus range (default: `10..=20`)
//! - `ARENA_MAX_ROUNDS`: rounds before a game is a draw (default: `1000`)
//! - `ARENA_VALIDATION_TRIALS`: games played to validate a submission (default: `25`)
//! - `ARENA_ISOLATION`: `none`, `docker` or `cgroup` (default: `none`)
//! - `ARENA_PYTHON`: interpreter for scripts when not in a container (default: `python3`)
//! - `ARENA_SCRIPT_IMAGE` / `ARENA_NATIVE_IMAGE`: container images (default: `python:3.13-slim` / `ubuntu:latest`)
//! - `ARENA_MEMORY_LIMIT_MB`: per participant memory limit in cgroup mode (default: unlimited)
//! - `ARENA_READ_TIMEOUT_MS`: deadline for each participant answer (default: none)
//! - `ARENA_PARALLEL_MATCHES`: matches played at the same time in a tournament (default: number of CPUs)
//! - `ARENA_VERBOSE`: print progress to stdout (default: `true`)
//! - `ARENA_LOG`: enable logging to a file (default: `false`)

use std::{fmt, ops::RangeInclusive, time::Duration};

use anyhow::{bail, ensure};
use rand::Rng;

/// Inclusive range of a game parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamRange {
    /// Smallest allowed value.
    pub min: u32,
    /// Largest allowed value.
    pub max: u32,
}

impl ParamRange {
    /// Create a range. `min > max` is only detected by [`Configuration::validate`].
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// True if `value` is inside the range.
    pub fn contains(&self, value: u32) -> bool {
        self.min <= value && value <= self.max
    }

    /// Uniformly sample a value of the range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        rng.random_range(self.min..=self.max)
    }

    /// Same range with its upper bound lowered to `cap` (never below `min`).
    pub fn capped(&self, cap: u32) -> Self {
        Self {
            min: self.min,
            max: self.max.min(cap).max(self.min),
        }
    }

    /// Every value of the range.
    pub fn values(&self) -> RangeInclusive<u32> {
        self.min..=self.max
    }
}

impl fmt::Display for ParamRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// How participant processes are launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationMode {
    /// Run the program directly on the host.
    #[default]
    None,
    /// Run the program inside a network-less container with the artifact mounted read-only.
    Docker,
    /// Run the program inside a fresh cgroup (Linux only).
    Cgroup,
}

impl std::str::FromStr for IsolationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(IsolationMode::None),
            "docker" | "container" => Ok(IsolationMode::Docker),
            "cgroup" => Ok(IsolationMode::Cgroup),
            other => bail!("unknown isolation mode '{other}'"),
        }
    }
}

/// Configuration for arena behaviors.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) players: ParamRange,
    pub(crate) k: ParamRange,
    pub(crate) w: ParamRange,
    pub(crate) max_rounds: usize,
    pub(crate) validation_trials: usize,
    pub(crate) isolation: IsolationMode,
    pub(crate) python: String,
    pub(crate) script_image: String,
    pub(crate) native_image: String,
    pub(crate) memory_limit_mb: Option<u64>,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) parallel_matches: usize,
    pub(crate) verbose: bool,
    pub(crate) log: bool,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Games have 2 to 6 players, `k` in `3..=10` and `w` in `10..=20`.
    /// - A game is a draw after 1000 rounds.
    /// - A submission is validated with 25 games.
    /// - Programs run directly on the host, scripts through `python3`.
    /// - Reads from participants have no deadline.
    /// - Tournaments play as many matches at once as there are CPUs.
    /// - Progress is printed to stdout, logging to file is disabled.
    pub fn new() -> Self {
        Self {
            players: ParamRange::new(2, 6),
            k: ParamRange::new(3, 10),
            w: ParamRange::new(10, 20),
            max_rounds: 1000,
            validation_trials: 25,
            isolation: IsolationMode::None,
            python: "python3".to_owned(),
            script_image: "python:3.13-slim".to_owned(),
            native_image: "ubuntu:latest".to_owned(),
            memory_limit_mb: None,
            read_timeout: None,
            parallel_matches: num_cpus::get().max(1),
            verbose: true,
            log: false,
        }
    }

    /// Create configuration from environment variables (see module documentation).
    ///
    /// Any unset or unparsable variable keeps its default value.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn get_env<T: std::str::FromStr>(var: &str) -> Option<T> {
            std::env::var(var).ok()?.trim().parse().ok()
        }

        let default = Self::new();
        Self {
            players: ParamRange::new(
                get_env("ARENA_MIN_PLAYERS").unwrap_or(default.players.min),
                get_env("ARENA_MAX_PLAYERS").unwrap_or(default.players.max),
            ),
            k: ParamRange::new(
                get_env("ARENA_MIN_K").unwrap_or(default.k.min),
                get_env("ARENA_MAX_K").unwrap_or(default.k.max),
            ),
            w: ParamRange::new(
                get_env("ARENA_MIN_W").unwrap_or(default.w.min),
                get_env("ARENA_MAX_W").unwrap_or(default.w.max),
            ),
            max_rounds: get_env("ARENA_MAX_ROUNDS").unwrap_or(default.max_rounds),
            validation_trials: get_env("ARENA_VALIDATION_TRIALS")
                .unwrap_or(default.validation_trials),
            isolation: get_env("ARENA_ISOLATION").unwrap_or(default.isolation),
            python: std::env::var("ARENA_PYTHON").unwrap_or(default.python),
            script_image: std::env::var("ARENA_SCRIPT_IMAGE").unwrap_or(default.script_image),
            native_image: std::env::var("ARENA_NATIVE_IMAGE").unwrap_or(default.native_image),
            memory_limit_mb: get_env("ARENA_MEMORY_LIMIT_MB").or(default.memory_limit_mb),
            read_timeout: get_env("ARENA_READ_TIMEOUT_MS")
                .map(Duration::from_millis)
                .or(default.read_timeout),
            parallel_matches: get_env("ARENA_PARALLEL_MATCHES")
                .unwrap_or(default.parallel_matches),
            verbose: get_env_flag("ARENA_VERBOSE", default.verbose),
            log: get_env_flag("ARENA_LOG", default.log),
        }
    }

    /// Check that every range is usable.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.players.min >= 2,
            "a game needs at least 2 players (got {})",
            self.players
        );
        ensure!(self.players.min <= self.players.max, "empty player range {}", self.players);
        ensure!(self.k.min >= 1, "k must be at least 1 (got {})", self.k);
        ensure!(self.k.min <= self.k.max, "empty k range {}", self.k);
        ensure!(self.w.min >= 1, "w must be at least 1 (got {})", self.w);
        ensure!(self.w.min <= self.w.max, "empty w range {}", self.w);
        ensure!(self.max_rounds > 0, "games need at least one round");
        ensure!(self.validation_trials > 0, "validation needs at least one trial");
        ensure!(self.parallel_matches > 0, "tournaments need at least one worker");
        if let Some(mb) = self.memory_limit_mb {
            ensure!(
                memory_limit_bytes(mb).is_some(),
                "memory limit of {mb} MB is too large"
            );
        }
        Ok(())
    }

    /// Set the participant count range.
    pub fn with_players(mut self, min: u32, max: u32) -> Self {
        self.players = ParamRange::new(min, max);
        self
    }

    /// Set the choice upper bound range.
    pub fn with_k(mut self, min: u32, max: u32) -> Self {
        self.k = ParamRange::new(min, max);
        self
    }

    /// Set the win modulus range.
    pub fn with_w(mut self, min: u32, max: u32) -> Self {
        self.w = ParamRange::new(min, max);
        self
    }

    /// Set the number of rounds after which a game is a draw.
    pub fn with_max_rounds(mut self, value: usize) -> Self {
        self.max_rounds = value;
        self
    }

    /// Set the number of games played to validate a submission.
    pub fn with_validation_trials(mut self, value: usize) -> Self {
        self.validation_trials = value;
        self
    }

    /// Choose how participant processes are launched.
    pub fn with_isolation(mut self, value: IsolationMode) -> Self {
        self.isolation = value;
        self
    }

    /// Interpreter used for scripts outside containers.
    pub fn with_python(mut self, value: impl Into<String>) -> Self {
        self.python = value.into();
        self
    }

    /// Container images used for scripts and native executables.
    pub fn with_images(mut self, script: impl Into<String>, native: impl Into<String>) -> Self {
        self.script_image = script.into();
        self.native_image = native.into();
        self
    }

    /// Memory limit per participant, in megabytes (cgroup mode only).
    pub fn with_memory_limit_mb(mut self, value: Option<u64>) -> Self {
        self.memory_limit_mb = value;
        self
    }

    /// Deadline for each participant answer. `None` blocks until the participant answers.
    pub fn with_read_timeout(mut self, value: Option<Duration>) -> Self {
        self.read_timeout = value;
        self
    }

    /// Number of tournament matches played at the same time.
    pub fn with_parallel_matches(mut self, value: usize) -> Self {
        self.parallel_matches = value;
        self
    }

    /// Enable or disable progress printing.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Participant count range.
    pub fn players(&self) -> ParamRange {
        self.players
    }

    /// Choice upper bound range.
    pub fn k(&self) -> ParamRange {
        self.k
    }

    /// Win modulus range.
    pub fn w(&self) -> ParamRange {
        self.w
    }

    /// Rounds after which a game is a draw.
    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// True if progress should be printed.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// True if logs should be written to a file.
    pub fn log(&self) -> bool {
        self.log
    }
}

/// Megabytes to bytes, `None` if it does not fit a cgroup limit.
pub(crate) fn memory_limit_bytes(mb: u64) -> Option<i64> {
    mb.checked_mul(1_000_000).and_then(|bytes| i64::try_from(bytes).ok())
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn default_is_valid() {
        let config = Configuration::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.players(), ParamRange::new(2, 6));
        assert_eq!(config.max_rounds(), 1000);
        assert_eq!(config.validation_trials, 25);
    }

    #[test]
    fn rejects_bad_ranges() {
        assert!(Configuration::new().with_players(1, 4).validate().is_err());
        assert!(Configuration::new().with_k(5, 4).validate().is_err());
        assert!(Configuration::new().with_w(0, 4).validate().is_err());
        assert!(Configuration::new().with_max_rounds(0).validate().is_err());
        assert!(Configuration::new().with_parallel_matches(0).validate().is_err());
    }

    #[test]
    fn memory_limit_must_fit_in_bytes() {
        assert_eq!(memory_limit_bytes(512), Some(512_000_000));
        assert_eq!(memory_limit_bytes(u64::MAX), None);
        assert_eq!(memory_limit_bytes(i64::MAX as u64 / 1_000_000 + 1), None);

        let config = Configuration::new().with_memory_limit_mb(Some(u64::MAX));
        assert!(config.validate().is_err());
        let config = Configuration::new().with_memory_limit_mb(Some(512));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn range_sampling_stays_inside() {
        let range = ParamRange::new(3, 5);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            assert!(range.contains(range.sample(&mut rng)));
        }
        assert_eq!(range.capped(4), ParamRange::new(3, 4));
        assert_eq!(range.capped(1), ParamRange::new(3, 3));
        assert_eq!(range.values().count(), 3);
    }

    #[test]
    fn isolation_from_str() {
        assert_eq!("Docker".parse::<IsolationMode>().unwrap(), IsolationMode::Docker);
        assert_eq!("none".parse::<IsolationMode>().unwrap(), IsolationMode::None);
        assert_eq!("cgroup".parse::<IsolationMode>().unwrap(), IsolationMode::Cgroup);
        assert!("vm".parse::<IsolationMode>().is_err());
    }
}
