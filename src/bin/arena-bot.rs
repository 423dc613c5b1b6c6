//! Participant speaking the arena protocol, with a strategy chosen on the command line.
//!
//! ```text
//! arena-bot random            uniform pick in [1, k]
//! arena-bot fixed <v>         always <v>
//! arena-bot high              always k
//! arena-bot garbage <text>    answers <text>
//! arena-bot out-of-range [m]  answers k + 1 every m-th round (default: every round)
//! arena-bot crash             writes to stderr and exits with code 3
//! arena-bot exit              exits silently
//! arena-bot answer-exit       answers 1 once, then exits without reading the round
//! arena-bot flood [bytes]     answers one line of <bytes> digits (default: 10 MB)
//! arena-bot silent            never answers
//! ```

use std::{
    env,
    io::{self, BufRead, Write},
};

use anyhow::{bail, Context};
use rand::Rng;

enum Strategy {
    Random,
    Fixed(u32),
    High,
    Garbage(String),
    OutOfRange(usize),
    Crash,
    Exit,
    AnswerExit,
    Flood(usize),
    Silent,
}

fn parse_strategy() -> anyhow::Result<Strategy> {
    let mut args = env::args();
    let _ = args.next(); // Skip binary name
    let name = args.next().unwrap_or_else(|| "random".to_owned());
    let value = args.next();
    Ok(match name.as_str() {
        "random" => Strategy::Random,
        "fixed" => Strategy::Fixed(value.context("missing value")?.parse()?),
        "high" => Strategy::High,
        "garbage" => Strategy::Garbage(value.unwrap_or_else(|| "banana".to_owned())),
        "out-of-range" => {
            let every = value.map(|v| v.parse::<usize>()).transpose()?;
            Strategy::OutOfRange(every.unwrap_or(1).max(1))
        }
        "crash" => Strategy::Crash,
        "exit" => Strategy::Exit,
        "answer-exit" => Strategy::AnswerExit,
        "flood" => {
            let bytes = value.map(|v| v.parse::<usize>()).transpose()?;
            Strategy::Flood(bytes.unwrap_or(10_000_000))
        }
        "silent" => Strategy::Silent,
        other => bail!("unknown strategy '{other}'"),
    })
}

fn main() -> anyhow::Result<()> {
    let strategy = parse_strategy()?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let header = lines.next().context("no initial input")??;
    let params = header
        .split_whitespace()
        .map(str::parse::<u32>)
        .collect::<Result<Vec<_>, _>>()
        .context("invalid initial input")?;
    let [_n, k, _w, _seat] = params[..] else {
        bail!("expected 4 integers, got '{header}'");
    };

    let mut rng = rand::rng();
    let mut stdout = io::stdout();
    let mut round = 0usize;
    loop {
        round += 1;
        let answer = match &strategy {
            Strategy::Random => rng.random_range(1..=k).to_string(),
            Strategy::Fixed(v) => v.to_string(),
            Strategy::High => k.to_string(),
            Strategy::Garbage(text) => text.clone(),
            Strategy::OutOfRange(every) if round % every == 0 => (k + 1).to_string(),
            Strategy::OutOfRange(_) => rng.random_range(1..=k).to_string(),
            Strategy::Crash => {
                eprintln!("crashing on purpose in round {round}");
                std::process::exit(3);
            }
            Strategy::Exit => return Ok(()),
            Strategy::AnswerExit => {
                writeln!(stdout, "1")?;
                stdout.flush()?;
                return Ok(());
            }
            Strategy::Flood(bytes) => {
                let chunk = [b'1'; 8192];
                let mut left = *bytes;
                while left > 0 {
                    let n = left.min(chunk.len());
                    // the arena stops reading long before the end
                    if stdout.write_all(&chunk[..n]).is_err() {
                        return Ok(());
                    }
                    left -= n;
                }
                "".to_owned()
            }
            Strategy::Silent => {
                // keep reading until the arena gives up
                for _ in lines.by_ref() {}
                return Ok(());
            }
        };
        writeln!(stdout, "{answer}")?;
        stdout.flush()?;

        // every pick of the round, ignored
        match lines.next() {
            Some(line) => drop(line?),
            None => return Ok(()),
        }
    }
}
