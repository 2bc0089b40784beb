//! Interactive Session Driver
//!
//! Reads commands line by line from an input [`ChanPipe`], runs them and
//! sends their output to an output pipe:
//!
//! ```text
//!   AwaitCommand ──"$ "──▶ read line ──▶ parse ──complete──▶ Executing ──┐
//!        ▲                                 │                             │
//!        │                             incomplete                        │
//!        │                                 ▼                             │
//!        │                        AwaitContinuation ──"> "──▶ read line  │
//!        └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The driver writes nothing but the two prompts and syntax error reports;
//! everything else comes from executed commands. Input closing ends the
//! session normally, also in the middle of a continuation.

use std::io;
use std::sync::Arc;

use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::Runner;
use crate::interpreter::stdio::{OutStream, Stdio};
use crate::parser::{parse_incremental, ParseOutcome};
use crate::pipe::ChanPipe;

/// Printed before reading a new command.
pub const PRIMARY_PROMPT: &str = "$ ";
/// Printed while a statement is incomplete.
pub const CONTINUATION_PROMPT: &str = "> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    AwaitCommand,
    AwaitContinuation,
    Executing,
}

/// One interactive session over a pair of pipes.
pub struct Session<'a> {
    runner: &'a mut Runner,
    input: Arc<ChanPipe>,
    output: Arc<ChanPipe>,
    /// Bytes read past the last complete line
    pending: Vec<u8>,
    state: SessionState,
}

impl<'a> Session<'a> {
    pub fn new(runner: &'a mut Runner, input: Arc<ChanPipe>, output: Arc<ChanPipe>) -> Self {
        Self {
            runner,
            input,
            output,
            pending: Vec::new(),
            state: SessionState::AwaitCommand,
        }
    }

    /// Drive the session until input closes or `exit` runs. The output pipe
    /// is closed when the session ends.
    ///
    /// Errors are fatal I/O failures, including a write to an output pipe
    /// that was closed from outside.
    pub fn run(mut self) -> Result<(), InterpreterError> {
        let out = OutStream::new(self.output.writer());
        self.runner.set_stdio(Stdio::new(None, out.clone(), out));

        let result = self.drive();
        self.output.close();
        result
    }

    fn drive(&mut self) -> Result<(), InterpreterError> {
        let mut source = String::new();

        loop {
            self.prompt()?;
            let Some(line) = self.read_line()? else {
                if self.state == SessionState::AwaitContinuation {
                    self.write("treesh: syntax error: unexpected end of file\n")?;
                }
                tracing::debug!("input closed, ending session");
                return Ok(());
            };
            source.push_str(&line);

            match parse_incremental(&source) {
                ParseOutcome::Incomplete => {
                    tracing::debug!("statement incomplete, awaiting continuation");
                    self.state = SessionState::AwaitContinuation;
                }
                ParseOutcome::Error(e) => {
                    source.clear();
                    self.state = SessionState::AwaitCommand;
                    self.write(&format!("treesh: syntax error: {}\n", e.message))?;
                }
                ParseOutcome::Complete(prog) => {
                    source.clear();
                    self.state = SessionState::Executing;
                    tracing::debug!(command = %prog, "executing");

                    let result = self.runner.run(&prog);
                    self.runner.reset();
                    match result {
                        Ok(()) => {}
                        Err(InterpreterError::Exit(code)) => {
                            tracing::debug!(code, "exit requested, ending session");
                            return Ok(());
                        }
                        Err(e @ InterpreterError::ExecutionLimit { .. }) => {
                            self.write(&format!("treesh: {}\n", e))?;
                        }
                        Err(e) => return Err(e),
                    }
                    self.state = SessionState::AwaitCommand;
                }
            }
        }
    }

    fn prompt(&self) -> Result<(), InterpreterError> {
        match self.state {
            SessionState::AwaitContinuation => self.write(CONTINUATION_PROMPT),
            SessionState::AwaitCommand | SessionState::Executing => self.write(PRIMARY_PROMPT),
        }
    }

    fn write(&self, text: &str) -> Result<(), InterpreterError> {
        self.output.write_str(text).map_err(io::Error::from)?;
        Ok(())
    }

    /// Next line including its newline. A final line without one is
    /// returned as if it had one; `None` once input is closed and drained.
    fn read_line(&mut self) -> Result<Option<String>, InterpreterError> {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=end).collect();
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            let n = self.input.read(&mut buf).map_err(io::Error::from)?;
            if n == 0 {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                let mut rest = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                rest.push('\n');
                return Ok(Some(rest));
            }
            self.pending.extend_from_slice(&buf[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use crate::interpreter::execution_engine::RUNNER_STACK_SIZE;

    fn drive(input: &str) -> String {
        let input_pipe = ChanPipe::shared(64);
        let output_pipe = ChanPipe::shared(64);
        input_pipe.write_str(input).unwrap();
        input_pipe.close();

        let (inp, out) = (Arc::clone(&input_pipe), Arc::clone(&output_pipe));
        let driver = thread::Builder::new()
            .stack_size(RUNNER_STACK_SIZE)
            .spawn(move || {
                let mut runner = Runner::new();
                Session::new(&mut runner, inp, out).run()
            })
            .unwrap();

        let mut transcript = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let n = output_pipe.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            transcript.extend_from_slice(&buf[..n]);
        }
        driver.join().unwrap().unwrap();
        String::from_utf8(transcript).unwrap()
    }

    #[test]
    fn test_transcript() {
        assert_eq!(drive("echo foo\n"), "$ foo\n$ ");
        assert_eq!(drive("if true\nthen echo bar; fi\n"), "$ > bar\n$ ");
        assert_eq!(drive("echo 'foo\nbar'\n"), "$ > foo\nbar\n$ ");
        assert_eq!(drive("echo foo; echo bar\n"), "$ foo\nbar\n$ ");
        assert_eq!(drive("echo foo; echo 'bar\nbaz'\n"), "$ > foo\nbar\nbaz\n$ ");
    }

    #[test]
    fn test_state_persists_between_commands() {
        assert_eq!(drive("x=1\necho $x\n"), "$ $ 1\n$ ");
    }

    #[test]
    fn test_syntax_error_recovers() {
        let out = drive("fi\necho ok\n");
        assert!(out.starts_with("$ treesh: syntax error: "));
        assert!(out.ends_with("$ ok\n$ "));
    }

    #[test]
    fn test_unterminated_input_reported_once() {
        assert_eq!(
            drive("if true\n"),
            "$ > treesh: syntax error: unexpected end of file\n"
        );
    }

    #[test]
    fn test_final_line_without_newline() {
        assert_eq!(drive("echo last"), "$ last\n$ ");
    }

    #[test]
    fn test_exit_ends_session() {
        assert_eq!(drive("echo a\nexit 3\necho b\n"), "$ a\n$ ");
    }
}
