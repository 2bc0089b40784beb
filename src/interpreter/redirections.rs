//! Redirection Handling
//!
//! Handles redirections attached to a simple command:
//! - > : Write fd (default stdout) to file, truncating
//! - >> : Append fd (default stdout) to file
//! - < : Read fd 0 from file
//! - N>&M, N<&M : Make fd N a copy of fd M
//! - N>&- : Close fd N (output is discarded)
//!
//! Redirections are applied in order to a copy of the runner's streams; the
//! copy is installed for the duration of the command and dropped afterwards.

use std::fs::{File, OpenOptions};
use std::io;

use crate::ast::types::{Redirect, Token};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::Runner;
use crate::interpreter::stdio::{InStream, OutStream, Stdio};

/// Strip the " (os error N)" suffix from an I/O error message.
pub(crate) fn io_error_message(err: &io::Error) -> String {
    let message = err.to_string();
    match message.find(" (os error") {
        Some(idx) => message[..idx].to_string(),
        None => message,
    }
}

fn bad_fd(fd: impl std::fmt::Display) -> InterpreterError {
    InterpreterError::Expansion(format!("{}: bad file descriptor", fd))
}

/// Install `stream` as output fd `fd`.
fn set_output(stdio: &mut Stdio, fd: u32, stream: OutStream) -> Result<(), InterpreterError> {
    match fd {
        1 => stdio.stdout = stream,
        2 => stdio.stderr = stream,
        _ => return Err(bad_fd(fd)),
    }
    Ok(())
}

fn open_output(path: &str, append: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.open(path)
}

impl Runner {
    /// Resolve a path relative to the runner's cwd.
    pub(crate) fn resolve_path(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{}", self.state.cwd.trim_end_matches('/'), path)
        }
    }

    /// Build the streams a command runs with after its redirections.
    pub(crate) fn apply_redirects(&mut self, redirects: &[&Redirect]) -> Result<Stdio, InterpreterError> {
        let mut stdio = self.stdio.clone();

        for redirect in redirects {
            let target = self.expand_word_single(&redirect.obj)?;
            let file_error = |e: io::Error| {
                InterpreterError::Expansion(format!("{}: {}", target, io_error_message(&e)))
            };

            match redirect.op {
                Token::Great | Token::DGreat => {
                    let file = open_output(&self.resolve_path(&target), redirect.op == Token::DGreat)
                        .map_err(file_error)?;
                    set_output(&mut stdio, redirect.fd.unwrap_or(1), OutStream::new(file))?;
                }
                Token::Less => {
                    let fd = redirect.fd.unwrap_or(0);
                    if fd != 0 {
                        return Err(bad_fd(fd));
                    }
                    let file = File::open(self.resolve_path(&target)).map_err(file_error)?;
                    stdio.stdin = Some(InStream::new(file));
                }
                Token::GreatAnd | Token::LessAnd => {
                    let default_fd = if redirect.op == Token::LessAnd { 0 } else { 1 };
                    let fd = redirect.fd.unwrap_or(default_fd);
                    self.duplicate_fd(&mut stdio, fd, &target)?;
                }
                other => {
                    return Err(InterpreterError::Expansion(format!(
                        "unsupported redirection `{}'",
                        other
                    )))
                }
            }
        }

        Ok(stdio)
    }

    fn duplicate_fd(&self, stdio: &mut Stdio, fd: u32, target: &str) -> Result<(), InterpreterError> {
        if target == "-" {
            return match fd {
                0 => {
                    stdio.stdin = None;
                    Ok(())
                }
                _ => set_output(stdio, fd, OutStream::sink()),
            };
        }

        let source: u32 = target.parse().map_err(|_| {
            InterpreterError::Expansion(format!("{}: ambiguous redirect", target))
        })?;
        let stream = match (fd, source) {
            (0, 0) => return Ok(()),
            (0, _) => return Err(bad_fd(source)),
            (_, 1) => stdio.stdout.clone(),
            (_, 2) => stdio.stderr.clone(),
            _ => return Err(bad_fd(source)),
        };
        set_output(stdio, fd, stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::execution_engine::testing::{run_in, run_script};

    #[test]
    fn test_io_error_message() {
        let err = io::Error::from_raw_os_error(2);
        assert_eq!(io_error_message(&err), "No such file or directory");
    }

    #[test]
    fn test_truncate_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().to_string_lossy().into_owned();

        let (stdout, _, status) = run_in(&cwd, "echo one > out; echo two >> out; echo three >>out");
        assert_eq!((stdout.as_str(), status), ("", 0));
        let content = std::fs::read_to_string(dir.path().join("out")).unwrap();
        assert_eq!(content, "one\ntwo\nthree\n");

        run_in(&cwd, "echo fresh >out");
        let content = std::fs::read_to_string(dir.path().join("out")).unwrap();
        assert_eq!(content, "fresh\n");
    }

    #[test]
    fn test_redirect_is_scoped_to_command() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().to_string_lossy().into_owned();
        let (stdout, _, _) = run_in(&cwd, "echo hidden >f; echo shown");
        assert_eq!(stdout, "shown\n");
    }

    #[test]
    fn test_stderr_duplication() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().to_string_lossy().into_owned();

        let (stdout, stderr, _) = run_in(&cwd, "cd missing 2>&1");
        assert_eq!(stdout, "treesh: cd: missing: No such file or directory\n");
        assert_eq!(stderr, "");

        run_in(&cwd, "cd missing >log 2>&1");
        let content = std::fs::read_to_string(dir.path().join("log")).unwrap();
        assert!(content.contains("No such file or directory"));

        let (_, stderr, _) = run_in(&cwd, "echo to-err 1>&2");
        assert_eq!(stderr, "to-err\n");
    }

    #[test]
    fn test_input_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().to_string_lossy().into_owned();
        std::fs::write(dir.path().join("in"), "x").unwrap();

        let (_, stderr, status) = run_in(&cwd, "true < in");
        assert_eq!((stderr.as_str(), status), ("", 0));

        let (_, stderr, status) = run_in(&cwd, "true < nope");
        assert_eq!(stderr, "treesh: nope: No such file or directory\n");
        assert_eq!(status, 1);
    }

    #[test]
    fn test_bad_descriptor() {
        let (_, stderr, status) = run_script("echo x >&7");
        assert_eq!(stderr, "treesh: 7: bad file descriptor\n");
        assert_eq!(status, 1);
    }
}
