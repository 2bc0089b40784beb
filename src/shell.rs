//! Shell Environment
//!
//! Main entry point for embedding the shell: builds a configured [`Runner`]
//! and runs scripts with their output captured, or drives an interactive
//! session over a pair of pipes.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use serde::Deserialize;
use thiserror::Error;

use crate::interactive::Session;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::{Runner, RUNNER_STACK_SIZE};
use crate::interpreter::redirections::io_error_message;
use crate::interpreter::stdio::{CaptureBuffer, OutStream, Stdio};
use crate::interpreter::types::{ExecResult, ExecutionLimits};
use crate::parser::parse;
use crate::pipe::ChanPipe;

/// Status of a script that failed to parse.
pub const SYNTAX_ERROR_EXIT_CODE: i32 = 2;

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Contents of a TOML configuration file.
///
/// ```toml
/// cwd = "/tmp"
///
/// [env]
/// GREETING = "hello"
///
/// [limits]
/// max_iterations = 10000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    /// Initial variables, all exported
    pub env: BTreeMap<String, String>,
    /// Initial working directory
    pub cwd: Option<String>,
    pub limits: ExecutionLimits,
}

impl ShellConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }
}

/// Options for creating a [`Shell`].
#[derive(Debug, Clone, Default)]
pub struct ShellOptions {
    /// Variables set (and exported) on top of the process environment
    pub env: BTreeMap<String, String>,
    /// Working directory
    pub cwd: Option<String>,
    /// Execution limits
    pub limits: Option<ExecutionLimits>,
}

impl From<ShellConfig> for ShellOptions {
    fn from(config: ShellConfig) -> Self {
        Self {
            env: config.env,
            cwd: config.cwd,
            limits: Some(config.limits),
        }
    }
}

/// A shell environment whose state persists across `exec` calls.
#[derive(Debug)]
pub struct Shell {
    runner: Runner,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new(ShellOptions::default())
    }
}

impl Shell {
    pub fn new(options: ShellOptions) -> Self {
        let mut runner = Runner::new()
            .with_process_env()
            .with_limits(options.limits.unwrap_or_default());

        let state = runner.state_mut();
        for (name, value) in options.env {
            state.set_var(name.clone(), value);
            state.export_var(name);
        }
        if let Some(cwd) = options.cwd {
            state.previous_dir = cwd.clone();
            state.cwd = cwd;
        }
        let cwd = state.cwd.clone();
        state.set_var("PWD", cwd);
        state.export_var("PWD");

        Self { runner }
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut Runner {
        &mut self.runner
    }

    /// Execute a script and capture its output.
    pub fn exec(&mut self, script: &str) -> ExecResult {
        let prog = match parse(script) {
            Ok(prog) => prog,
            Err(e) => {
                return ExecResult::failure_with_code(
                    format!("treesh: syntax error: {}\n", e),
                    SYNTAX_ERROR_EXIT_CODE,
                )
            }
        };

        let stdout = CaptureBuffer::default();
        let stderr = CaptureBuffer::default();
        self.runner.set_stdio(Stdio::new(
            None,
            OutStream::new(stdout.clone()),
            OutStream::new(stderr.clone()),
        ));
        self.runner.reset();

        let runner = &mut self.runner;
        let result = thread::scope(|s| {
            thread::Builder::new()
                .stack_size(RUNNER_STACK_SIZE)
                .spawn_scoped(s, || runner.run(&prog))
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(std::io::Error::other("runner panicked").into()))
                })
        });

        let exit_code = match result {
            Ok(Ok(())) => self.runner.exit_status(),
            Ok(Err(InterpreterError::Exit(code))) => code,
            Ok(Err(e @ InterpreterError::ExecutionLimit { .. })) => {
                let _ = self.runner.stdio.stderr.write_str(&format!("treesh: {}\n", e));
                InterpreterError::LIMIT_EXIT_CODE
            }
            Ok(Err(InterpreterError::Io(e))) | Err(e) => {
                tracing::warn!(error = %e, "execution failed");
                let _ = self
                    .runner
                    .stdio
                    .stderr
                    .write_str(&format!("treesh: {}\n", io_error_message(&e)));
                1
            }
            Ok(Err(e)) => {
                let _ = self.runner.stdio.stderr.write_str(&format!("treesh: {}\n", e));
                1
            }
        };
        self.runner.state.last_exit_code = exit_code;
        self.runner.set_stdio(Stdio::default());

        ExecResult::new(stdout.contents(), stderr.contents(), exit_code)
    }

    /// Run an interactive session reading from `input` and writing to
    /// `output`. Blocks until the session ends; see [`Session::run`].
    pub fn interact(&mut self, input: Arc<ChanPipe>, output: Arc<ChanPipe>) -> Result<(), InterpreterError> {
        Session::new(&mut self.runner, input, output).run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_captures_output() {
        let mut shell = Shell::default();
        let result = shell.exec("echo out; echo err 1>&2; false");
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn test_state_persists_across_exec() {
        let mut shell = Shell::default();
        shell.exec("x=41; inc() { x=$((x + 1)); }");
        shell.exec("inc");
        assert_eq!(shell.exec("echo $x").stdout, "42\n");
    }

    #[test]
    fn test_exec_exit_and_syntax_error() {
        let mut shell = Shell::default();
        assert_eq!(shell.exec("exit 4; echo no").exit_code, 4);

        let result = shell.exec("if true; then");
        assert_eq!(result.exit_code, SYNTAX_ERROR_EXIT_CODE);
        assert!(result.stderr.starts_with("treesh: syntax error: "));
    }

    #[test]
    fn test_case_inside_command_substitution() {
        let mut shell = Shell::default();
        let result = shell.exec("echo $(case x in x) echo y;; esac)");
        assert_eq!(result.stdout, "y\n");
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn test_external_command_leaves_unread_input() {
        let mut shell = Shell::default();
        let result = shell.exec("echo abc | { /bin/true; /bin/cat; }");
        assert_eq!(result.stdout, "abc\n");
    }

    #[test]
    fn test_limit_reported() {
        let mut shell = Shell::new(ShellOptions {
            limits: Some(ExecutionLimits {
                max_iterations: 3,
                ..Default::default()
            }),
            ..Default::default()
        });
        let result = shell.exec("while true; do :; done");
        assert_eq!(result.exit_code, InterpreterError::LIMIT_EXIT_CODE);
        assert!(result.stderr.contains("too many iterations"));
    }

    #[test]
    fn test_options_env_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().to_string_lossy().into_owned();
        let mut shell = Shell::new(ShellOptions {
            env: BTreeMap::from([("GREETING".to_string(), "hi".to_string())]),
            cwd: Some(cwd.clone()),
            limits: None,
        });
        let result = shell.exec("echo $GREETING; pwd; echo $PWD");
        assert_eq!(result.stdout, format!("hi\n{}\n{}\n", cwd, cwd));
        assert!(shell.runner().state().exported.contains("GREETING"));
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("treesh.toml");
        std::fs::write(&path, "cwd = \"/\"\n[env]\nA = \"1\"\n[limits]\nmax_command_count = 7\n").unwrap();

        let config = ShellConfig::load(&path).unwrap();
        assert_eq!(config.cwd.as_deref(), Some("/"));
        assert_eq!(config.env.get("A").map(String::as_str), Some("1"));
        assert_eq!(config.limits.max_command_count, 7);
        assert_eq!(config.limits.max_iterations, ExecutionLimits::default().max_iterations);

        std::fs::write(&path, "unknown = 1\n").unwrap();
        assert!(matches!(ShellConfig::load(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            ShellConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
