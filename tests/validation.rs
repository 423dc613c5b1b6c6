use pick_arena::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

mod common;
use common::{bot, init_test_logger, quiet_config};

fn validator(trials: usize) -> SubmissionValidator {
    let config = quiet_config()
        .with_players(2, 4)
        .with_k(3, 6)
        .with_w(10, 12)
        .with_validation_trials(trials);
    SubmissionValidator::new(config, bot(&["random"]).with_name("reference"))
}

#[test]
fn well_behaved_candidate_passes() {
    init_test_logger();
    let events = validator(5)
        .validate_with_rng(bot(&["high"]), StdRng::seed_from_u64(42))
        .collect::<Vec<_>>();

    assert_eq!(events.len(), 6);
    for (i, event) in events[..5].iter().enumerate() {
        match event {
            ValidationEvent::Progress(report) => {
                assert_eq!(report.trial, i);
                assert_eq!(report.total, 5);
                assert!((2..=4).contains(&report.params.n));
                assert!((3..=6).contains(&report.params.k));
                assert!((10..=12).contains(&report.params.w));
                assert!(report.candidate_seat < report.params.n as usize);
                assert_ne!(report.outcome, OutcomeKind::Error);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    match &events[4] {
        ValidationEvent::Progress(report) => assert_eq!(report.percent, 100),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(events[5], ValidationEvent::Passed));
}

#[test]
fn intermittent_out_of_range_fails_on_first_faulty_trial() {
    let run = validator(25).validate_with_rng(bot(&["out-of-range", "2"]), StdRng::seed_from_u64(7));

    let mut progress = 0;
    let mut failure = None;
    for event in run {
        match event {
            ValidationEvent::Progress(_) => progress += 1,
            ValidationEvent::Failed(f) => failure = Some(f),
            ValidationEvent::Passed => panic!("faulty candidate passed"),
        }
    }

    let failure = failure.expect("validation should fail");
    assert_eq!(failure.trial, progress);
    assert_eq!(failure.seat, failure.candidate_seat);
    assert!(matches!(
        failure.error,
        GameError::Read(ProtocolError::InvalidOutput { .. })
    ));
    assert!(failure.to_string().contains("is no valid output"));
}

#[test]
fn crashing_candidate_fails_immediately() {
    let verdict = validator(25)
        .validate_with_rng(bot(&["crash"]), StdRng::seed_from_u64(1))
        .verdict();
    let failure = verdict.unwrap_err();
    assert_eq!(failure.trial, 0);
    match failure.error {
        GameError::Read(ProtocolError::Exited { code, stderr }) => {
            assert_eq!(code, Some(3));
            assert!(stderr.contains("crashing on purpose"));
        }
        other => panic!("unexpected {other:?}"),
    }
}
