//! Enumeration of tournament match-ups.
//!
//! A match-up is a set of distinct programs plus the parameters of the game they play. Sets are
//! combinations: two match-ups never hold the same programs in a different order for the same
//! parameters.

use std::fmt;

use crate::{configuration::Configuration, game::GameParams, program::Program};

/// Programs (in seat order) and the parameters of their game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchUp {
    pub programs: Vec<Program>,
    pub params: GameParams,
}

impl fmt::Display for MatchUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self
            .programs
            .iter()
            .map(|program| program.name.as_str())
            .collect::<Vec<_>>()
            .join(" VS ");
        write!(f, "[{s}] k={} w={}", self.params.k, self.params.w)
    }
}

/// Lazy lexicographic iterator over the `size`-combinations of a slice.
#[derive(Debug, Clone)]
pub struct Combinations<'a, T> {
    pool: &'a [T],
    indices: Vec<usize>,
    started: bool,
    done: bool,
}

impl<'a, T> Combinations<'a, T> {
    pub fn new(pool: &'a [T], size: usize) -> Self {
        Self {
            pool,
            indices: (0..size).collect(),
            started: false,
            done: size > pool.len(),
        }
    }

    fn current(&self) -> Vec<&'a T> {
        self.indices.iter().map(|&i| &self.pool[i]).collect()
    }
}

impl<'a, T> Iterator for Combinations<'a, T> {
    type Item = Vec<&'a T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.current());
        }

        // rightmost index that can still move right
        let size = self.indices.len();
        let n = self.pool.len();
        let Some(i) = (0..size).rev().find(|&i| self.indices[i] != i + n - size) else {
            self.done = true;
            return None;
        };
        self.indices[i] += 1;
        for j in i + 1..size {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        Some(self.current())
    }
}

/// Every combination of `size` distinct programs, each playing a game with parameters `k` and `w`.
pub fn enumerate(
    programs: &[Program],
    size: usize,
    k: u32,
    w: u32,
) -> impl Iterator<Item = MatchUp> + '_ {
    Combinations::new(programs, size).map(move |chosen| MatchUp {
        programs: chosen.into_iter().cloned().collect(),
        params: GameParams {
            n: size as u32,
            k,
            w,
        },
    })
}

/// Every match-up of a tournament.
///
/// The size ranges over the configured player range (capped at the pool size), `w` over the
/// configured win modulus range, and `k` is the lower bound of the configured `k` range.
pub fn enumerate_all<'a>(
    programs: &'a [Program],
    config: &Configuration,
) -> impl Iterator<Item = MatchUp> + 'a {
    let k = config.k.min;
    let w_range = config.w;
    config
        .players
        .capped(programs.len() as u32)
        .values()
        .flat_map(move |n| {
            Combinations::new(programs, n as usize).flat_map(move |chosen| {
                w_range.values().map(move |w| MatchUp {
                    programs: chosen.iter().map(|&p| p.clone()).collect(),
                    params: GameParams { n, k, w },
                })
            })
        })
}

/// Number of `size`-combinations of `pool` elements.
pub fn binomial(pool: usize, size: usize) -> usize {
    if size > pool {
        return 0;
    }
    let size = size.min(pool - size);
    (0..size).fold(1, |acu, i| acu * (pool - i) / (i + 1))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn pool(size: usize) -> Vec<Program> {
        (0..size)
            .map(|i| Program::from_path(format!("/bots/bot_{i}")))
            .collect()
    }

    #[test]
    fn combinations_are_distinct_sets() {
        let items = (0..7).collect::<Vec<u32>>();
        for size in 0..=8 {
            let combos = Combinations::new(&items, size).collect::<Vec<_>>();
            assert_eq!(combos.len(), binomial(7, size), "size {size}");

            let mut seen = HashSet::new();
            for combo in combos {
                assert_eq!(combo.len(), size);
                let set = combo.iter().copied().copied().collect::<Vec<_>>();
                let unique = set.iter().collect::<HashSet<_>>();
                assert_eq!(unique.len(), size, "repeated element in {set:?}");
                let mut sorted = set.clone();
                sorted.sort();
                assert!(seen.insert(sorted), "duplicate combination {set:?}");
            }
        }
    }

    #[test]
    fn enumerate_fixes_parameters() {
        let programs = pool(4);
        let matchups = enumerate(&programs, 3, 5, 12).collect::<Vec<_>>();
        assert_eq!(matchups.len(), 4);
        for matchup in matchups {
            assert_eq!(matchup.programs.len(), 3);
            assert_eq!(matchup.params, GameParams { n: 3, k: 5, w: 12 });
        }
    }

    #[test]
    fn enumerate_all_covers_sizes_and_moduli() {
        let programs = pool(4);
        let config = Configuration::new().with_players(2, 6).with_k(3, 10).with_w(10, 12);
        let matchups = enumerate_all(&programs, &config).collect::<Vec<_>>();
        // sizes 2..=4 over 4 programs, 3 values of w
        assert_eq!(matchups.len(), (6 + 4 + 1) * 3);
        assert!(matchups.iter().all(|m| m.params.k == 3));
        assert!(matchups
            .iter()
            .all(|m| m.programs.len() == m.params.n as usize));
    }

    #[test]
    fn too_small_pool_has_no_matchups() {
        let programs = pool(1);
        let config = Configuration::new();
        assert_eq!(enumerate_all(&programs, &config).count(), 0);
    }

    #[test]
    fn binomial_values() {
        assert_eq!(binomial(5, 2), 10);
        assert_eq!(binomial(6, 6), 1);
        assert_eq!(binomial(6, 0), 1);
        assert_eq!(binomial(3, 4), 0);
    }
}
