use std::time::Duration;

use pick_arena::prelude::*;

mod common;
use common::{bot, init_test_logger, quiet_config};

fn config() -> Configuration {
    quiet_config()
        .with_players(2, 3)
        .with_k(3, 3)
        .with_w(4, 4)
        .with_parallel_matches(2)
        .with_read_timeout(Some(Duration::from_millis(300)))
}

#[test]
fn tournament_runs_every_combination_once() {
    init_test_logger();
    let scheduler = TournamentScheduler::new(config());
    let pool = vec![bot(&["fixed", "1"]), bot(&["fixed", "2"]), bot(&["silent"])];

    // {1,2}, {1,s}, {2,s}, {1,2,s}
    assert_eq!(scheduler.start(pool.clone()), Ok(4));

    // every match with the silent bot lasts at least the read timeout
    match scheduler.start(pool.clone()) {
        Err(TournamentError::InProgress { total, .. }) => assert_eq!(total, 4),
        other => panic!("second start should be rejected, got {other:?}"),
    }
    assert_eq!(scheduler.status().total, 4);

    let status = scheduler.wait();
    assert_eq!(status.completed, 4);
    assert_eq!(status.total, 4);
    assert!(!status.is_running());

    let standing = |name: &str| {
        status
            .standings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| *s)
            .unwrap()
    };
    assert_eq!(
        standing("fixed-2"),
        Standing {
            points: 1,
            wins: 1,
            ..Default::default()
        }
    );
    assert_eq!(
        standing("fixed-1"),
        Standing {
            losses: 1,
            ..Default::default()
        }
    );
    assert_eq!(standing("silent").errors, 3);
    assert_eq!(status.standings[0].0, "fixed-2");

    // a finished tournament can be replaced
    assert_eq!(scheduler.start(pool), Ok(4));
    assert_eq!(scheduler.wait().completed, 4);
}

#[test]
fn programs_sharing_a_name_are_ranked_apart() {
    let scheduler = TournamentScheduler::new(config().with_players(2, 2));
    let pool = vec![
        bot(&["fixed", "1"]).with_name("twin"),
        bot(&["fixed", "2"]).with_name("twin"),
    ];

    assert_eq!(scheduler.start(pool), Ok(1));
    let status = scheduler.wait();

    assert_eq!(status.standings.len(), 2);
    let (winner, won) = &status.standings[0];
    let (loser, lost) = &status.standings[1];
    assert!(winner.starts_with("twin (") && winner.ends_with(" fixed 2)"), "{winner}");
    assert!(loser.starts_with("twin (") && loser.ends_with(" fixed 1)"), "{loser}");
    assert_eq!((won.points, won.wins), (1, 1));
    assert_eq!((lost.points, lost.losses), (0, 1));
}

#[test]
fn status_is_readable_before_any_tournament() {
    let scheduler = TournamentScheduler::new(config());
    let status = scheduler.status();
    assert_eq!(status, TournamentStatus::default());
    assert!(scheduler.start(vec![]).is_err());
}
