use std::{env, io::Write, thread, time::Duration};

use anyhow::{bail, Context};
use pick_arena::{logger::init_logger, prelude::*};

const USAGE: &str = "usage:
  pick-arena game [--k K] [--w W] <program>...   play one exhibition game
  pick-arena random                             play a random game between accepted programs
  pick-arena validate <program>                 validate a submission against the reference bot
  pick-arena tournament                         run a tournament between accepted programs";

fn main() -> anyhow::Result<()> {
    let config = Configuration::from_env();
    config.validate().context("invalid configuration")?;
    if config.log() {
        init_logger()?;
    }

    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        bail!("{USAGE}");
    };
    let args = args.collect::<Vec<_>>();

    match command.as_str() {
        "game" => game(&args, &config),
        "random" => random(&config),
        "validate" => validate(&args, &config),
        "tournament" => tournament(&config),
        _ => bail!("unknown command '{command}'\n{USAGE}"),
    }
}

fn game(args: &[String], config: &Configuration) -> anyhow::Result<()> {
    let mut rng = rand::rng();
    let mut k = config.k().sample(&mut rng);
    let mut w = config.w().sample(&mut rng);
    let mut programs = vec![];

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--k" => k = iter.next().context("--k needs a value")?.parse()?,
            "--w" => w = iter.next().context("--w needs a value")?.parse()?,
            path => programs.push(Program::from_path(path)),
        }
    }
    if programs.is_empty() {
        bail!("no program given\n{USAGE}");
    }

    let names = programs.iter().map(|p| p.name.clone()).collect::<Vec<_>>();
    println!("{} (n={} k={k} w={w})", names.join(" VS "), names.len());
    for event in spawn_game(programs, k, w, config)? {
        match event {
            GameEvent::Round(snapshot) => print_round(&snapshot),
            GameEvent::Finished(outcome) => print_outcome(&outcome, &names),
        }
    }
    Ok(())
}

fn random(config: &Configuration) -> anyhow::Result<()> {
    let pool = ProgramStore::from_env().collect_programs()?;
    let record = random_exhibition(&pool, config, &mut rand::rng())?;
    println!("{} ({})", record.names.join(" VS "), record.params);
    for snapshot in &record.rounds {
        print_round(snapshot);
    }
    print_outcome(&record.outcome, &record.names);
    Ok(())
}

fn validate(args: &[String], config: &Configuration) -> anyhow::Result<()> {
    let [path] = args else {
        bail!("validate needs exactly one program\n{USAGE}");
    };
    let validator = SubmissionValidator::new(config.clone(), reference_program()?);

    for event in validator.validate(Program::from_path(path)) {
        match event {
            ValidationEvent::Progress(report) => {
                if config.verbose() {
                    // clear line, green progress, start of line
                    print!(
                        "\x1b[2K\x1b[32mTesting...\x1b[39m {:>3}% (trial {}/{}: {} {})\x1b[0G",
                        report.percent,
                        report.trial + 1,
                        report.total,
                        report.params,
                        report.outcome
                    );
                    let _ = std::io::stdout().flush();
                }
            }
            ValidationEvent::Passed => println!("\x1b[2KAll tests successful."),
            ValidationEvent::Failed(failure) => {
                println!("\x1b[2K\x1b[31mValidation failed\x1b[39m");
                return Err(failure.into());
            }
        }
    }
    Ok(())
}

fn tournament(config: &Configuration) -> anyhow::Result<()> {
    let programs = ProgramStore::from_env().collect_programs()?;
    let scheduler = TournamentScheduler::new(config.clone());
    let total = scheduler.start(programs)?;
    println!("Tournament started: {total} matches");

    let status = if config.verbose() {
        loop {
            let status = scheduler.status();
            print!(
                "\x1b[2K\x1b[32mRunning...:\x1b[39m {}/{}\x1b[0G",
                status.completed, status.total
            );
            let _ = std::io::stdout().flush();
            if !status.is_running() {
                break status;
            }
            thread::sleep(Duration::from_millis(500));
        }
    } else {
        scheduler.wait()
    };

    println!();
    let longest_name = status
        .standings
        .iter()
        .fold(0, |acu, (name, _)| acu.max(name.len()))
        + 3; // at least 3 dots
    for (name, standing) in &status.standings {
        println!("{name:·<longest_name$} {standing}");
    }
    Ok(())
}

/// The reference opponent: `ARENA_REFERENCE` if set, else the bundled `arena-bot random`.
fn reference_program() -> anyhow::Result<Program> {
    if let Ok(path) = env::var("ARENA_REFERENCE") {
        return Ok(Program::from_path(path));
    }
    let exe = env::current_exe().context("could not locate the arena executable")?;
    let bot = exe.with_file_name(format!("arena-bot{}", env::consts::EXE_SUFFIX));
    Ok(Program::from_path(bot)
        .with_name("reference")
        .with_args(["random"]))
}

fn print_round(snapshot: &RoundSnapshot) {
    println!(
        "round {:>4}: picks {:?} scores {:?}",
        snapshot.round, snapshot.picks, snapshot.scores
    );
}

fn print_outcome(outcome: &Outcome, names: &[String]) {
    let name = outcome
        .seat()
        .and_then(|seat| names.get(seat))
        .map(String::as_str)
        .unwrap_or("-");
    match outcome.kind() {
        OutcomeKind::Win => println!("\x1b[32m{name} wins\x1b[39m"),
        OutcomeKind::Draw => println!("Draw"),
        OutcomeKind::Error => println!("\x1b[31m{name}: {}\x1b[39m", outcome.message()),
    }
}
