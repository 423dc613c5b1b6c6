//! Participant processes and the line protocol spoken with them.

use std::{
    io::{self, BufRead, BufReader, Read, Write},
    process::ChildStdin,
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::Context;
use tracing::{debug, instrument, trace};

use crate::{
    cgroup_manager::LimitedProcess, error::ProtocolError, game::GameParams, launcher::Launcher,
    program::Program,
};

/// How long a process whose output closed may take to be seen as exited.
const EXIT_GRACE: Duration = Duration::from_millis(100);

/// How long to wait for the rest of the error stream of an exited process.
const STDERR_GRACE: Duration = Duration::from_millis(200);

/// Longest accepted output line, newline excluded. A pick needs a few bytes.
const MAX_LINE: usize = 1024;

/// Longest part of an invalid line kept in the error.
const MAX_LITERAL: usize = 32;

/// One participant of one game, talking the line protocol over its standard streams.
///
/// The process is killed when the sandbox is dropped.
#[derive(Debug)]
pub struct ProcessSandbox {
    program: String,
    seat: usize,
    k: u32,
    read_timeout: Option<Duration>,
    process: LimitedProcess,
    stdin: ChildStdin,
    lines: Receiver<Result<String, ProtocolError>>,
    stderr: Arc<Mutex<String>>,
    stderr_reader: JoinHandle<()>,
}

impl ProcessSandbox {
    /// Launch `program` for `seat` and send it the `"<n> <k> <w> <seat>"` handshake.
    #[instrument(skip_all, fields(program = %program.name, seat))]
    pub fn init(
        program: &Program,
        params: GameParams,
        seat: usize,
        launcher: &Launcher,
        read_timeout: Option<Duration>,
    ) -> anyhow::Result<ProcessSandbox> {
        let mut process = launcher.launch(program)?;

        let stdin = process.child.stdin.take().context("process has no stdin")?;
        let stdout = process.child.stdout.take().context("process has no stdout")?;
        let stderr = process.child.stderr.take().context("process has no stderr")?;

        let (tx, lines) = mpsc::channel();
        thread::Builder::new()
            .name(format!("seat-{seat}-stdout"))
            .spawn(move || {
                let mut reader = BufReader::new(stdout);
                loop {
                    let mut buf = vec![];
                    let limit = (MAX_LINE + 1) as u64;
                    match reader.by_ref().take(limit).read_until(b'\n', &mut buf) {
                        Ok(0) => break,
                        Ok(_) if buf.len() > MAX_LINE && buf.last() != Some(&b'\n') => {
                            // the rest of the line is never read, the participant is done
                            let literal = truncate_literal(&String::from_utf8_lossy(&buf));
                            let _ = tx.send(Err(ProtocolError::InvalidOutput { literal }));
                            break;
                        }
                        Ok(_) => {
                            let line = String::from_utf8_lossy(&buf).into_owned();
                            if tx.send(Ok(line)).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(ProtocolError::Read(e)));
                            break;
                        }
                    }
                }
            })
            .context("could not spawn output reader")?;

        let captured = Arc::new(Mutex::new(String::new()));
        let sink = captured.clone();
        let stderr_reader = thread::Builder::new()
            .name(format!("seat-{seat}-stderr"))
            .spawn(move || {
                let mut stderr = stderr;
                let mut buf = [0u8; 4096];
                while let Ok(n) = stderr.read(&mut buf) {
                    if n == 0 {
                        break;
                    }
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push_str(&String::from_utf8_lossy(&buf[..n]));
                }
            })
            .context("could not spawn error stream reader")?;

        let mut sandbox = ProcessSandbox {
            program: program.name.clone(),
            seat,
            k: params.k,
            read_timeout,
            process,
            stdin,
            lines,
            stderr: captured,
            stderr_reader,
        };

        let handshake = format!("{} {} {} {}", params.n, params.k, params.w, seat);
        sandbox
            .send_line(&handshake)
            .context("could not send initial input")?;
        trace!(handshake);
        Ok(sandbox)
    }

    pub fn seat(&self) -> usize {
        self.seat
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Read the participant's pick for this round.
    pub fn read_pick(&mut self) -> Result<u32, ProtocolError> {
        let received = match self.read_timeout {
            Some(timeout) => match self.lines.recv_timeout(timeout) {
                Ok(line) => Some(line),
                Err(RecvTimeoutError::Timeout) => return Err(ProtocolError::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => None,
            },
            None => self.lines.recv().ok(),
        };

        match received {
            Some(Ok(line)) => parse_pick(&line, self.k),
            Some(Err(e)) => Err(e),
            None => Err(self.closed_output()),
        }
    }

    /// Send every pick of the round, in seat order, as one line.
    pub fn write_broadcast(&mut self, picks: &[u32]) -> Result<(), ProtocolError> {
        let line = picks
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        self.send_line(&line).map_err(ProtocolError::BrokenPipe)
    }

    /// Kill the participant. Errors are logged and dropped; calling it twice is harmless.
    pub fn teardown(&mut self) {
        if let Err(e) = self.process.try_kill() {
            debug!(seat = self.seat, "teardown failed: {e:#}");
        }
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()
    }

    /// The output stream is closed: tell an exited process from a silent one.
    fn closed_output(&mut self) -> ProtocolError {
        let deadline = Instant::now() + EXIT_GRACE;
        let status = loop {
            if let Some(status) = self.process.try_wait() {
                break Some(status);
            }
            if Instant::now() >= deadline {
                break None;
            }
            thread::sleep(Duration::from_millis(5));
        };

        let Some(status) = status else {
            return ProtocolError::NoOutput;
        };

        let deadline = Instant::now() + STDERR_GRACE;
        while !self.stderr_reader.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let stderr = self
            .stderr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        ProtocolError::Exited {
            code: status.code(),
            stderr,
        }
    }
}

impl Drop for ProcessSandbox {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Parse one line of participant output as a pick in `[1, k]`.
///
/// The literal of an invalid line is kept in the error, shortened to a few dozen characters.
pub fn parse_pick(line: &str, k: u32) -> Result<u32, ProtocolError> {
    let literal = line.trim();
    match literal.parse::<i64>() {
        Ok(value) if (1..=i64::from(k)).contains(&value) => Ok(value as u32),
        _ => Err(ProtocolError::InvalidOutput {
            literal: truncate_literal(literal),
        }),
    }
}

fn truncate_literal(literal: &str) -> String {
    let literal = literal.trim();
    match literal.char_indices().nth(MAX_LITERAL) {
        Some((end, _)) => format!("{}...", &literal[..end]),
        None => literal.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_in_range_are_accepted() {
        assert_eq!(parse_pick("3\n", 3).unwrap(), 3);
        assert_eq!(parse_pick(" 1 \r\n", 3).unwrap(), 1);
    }

    #[test]
    fn long_literals_are_shortened() {
        let line = format!("{}\n", "7".repeat(500));
        match parse_pick(&line, 3) {
            Err(ProtocolError::InvalidOutput { literal }) => {
                assert_eq!(literal, format!("{}...", "7".repeat(MAX_LITERAL)));
            }
            other => panic!("unexpected {other:?}"),
        }

        let accents = "é".repeat(MAX_LITERAL + 1);
        assert_eq!(truncate_literal(&accents), format!("{}...", "é".repeat(MAX_LITERAL)));
        assert_eq!(truncate_literal(" 12 "), "12");
    }

    #[test]
    fn invalid_literals_are_named() {
        let cases = [
            ("banana\n", "banana"),
            ("0\n", "0"),
            ("4\n", "4"),
            ("-1", "-1"),
            ("", ""),
        ];
        for (line, literal) in cases {
            match parse_pick(line, 3) {
                Err(ProtocolError::InvalidOutput { literal: got }) => assert_eq!(got, literal),
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
