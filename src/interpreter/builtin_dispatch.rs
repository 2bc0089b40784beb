//! Builtin Command Dispatch
//!
//! Resolution order for a command name:
//! 1. special builtins (`break`, `exit`, `export`, ...), which functions cannot shadow
//! 2. user-defined functions
//! 3. regular builtins (`echo`, `cd`, `jobs`, ...)
//! 4. external commands
//!
//! Handlers return the output they produce; it is written here, so a closed
//! stdout surfaces as an `Io` error from the command that wrote to it.

use crate::interpreter::builtins::{
    handle_break, handle_cd, handle_continue, handle_exit, handle_export, handle_return,
    handle_shift, handle_unset,
};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::Runner;
use crate::interpreter::types::ExecResult;

/// Builtins that take precedence over functions of the same name.
pub const SPECIAL_BUILTINS: &[&str] = &[":", "break", "continue", "exit", "export", "return", "shift", "unset"];

/// Builtins that functions may override.
pub const REGULAR_BUILTINS: &[&str] = &["cd", "echo", "false", "jobs", "pwd", "true", "wait"];

pub fn is_special_builtin(name: &str) -> bool {
    SPECIAL_BUILTINS.contains(&name)
}

pub fn is_builtin(name: &str) -> bool {
    is_special_builtin(name) || REGULAR_BUILTINS.contains(&name)
}

/// echo [-n] args...
fn builtin_echo(args: &[String]) -> ExecResult {
    let flags = args.iter().take_while(|a| a.as_str() == "-n").count();
    let mut out = args[flags..].join(" ");
    if flags == 0 {
        out.push('\n');
    }
    ExecResult::success(out)
}

impl Runner {
    /// Run `argv` as a function, builtin or external command.
    pub(crate) fn invoke(&mut self, argv: &[String]) -> Result<i32, InterpreterError> {
        let Some(name) = argv.first() else {
            return Ok(0);
        };

        if !is_special_builtin(name) {
            if let Some(body) = self.state.functions.get(name).cloned() {
                return self.call_function(name, &body, &argv[1..]);
            }
        }
        if is_builtin(name) {
            return self.run_builtin(name, &argv[1..]);
        }
        self.run_external(argv)
    }

    fn run_builtin(&mut self, name: &str, args: &[String]) -> Result<i32, InterpreterError> {
        let result = match name {
            ":" | "true" => ExecResult::ok(),
            "false" => ExecResult::new(String::new(), String::new(), 1),
            "echo" => builtin_echo(args),
            "pwd" => ExecResult::success(format!("{}\n", self.state.cwd)),
            "cd" => handle_cd(&mut self.state, args),
            "export" => handle_export(&mut self.state, args),
            "unset" => handle_unset(&mut self.state, args),
            "shift" => handle_shift(&mut self.state, args),
            "break" => handle_break(&self.state, args)?,
            "continue" => handle_continue(&self.state, args)?,
            "return" => handle_return(&self.state, args)?,
            "exit" => {
                let (code, message) = handle_exit(&self.state, args);
                self.stdio.stderr.write_str(&message)?;
                self.state.last_exit_code = code;
                return Err(InterpreterError::Exit(code));
            }
            "jobs" => self.builtin_jobs(),
            "wait" => self.builtin_wait(args),
            _ => ExecResult::failure_with_code(format!("treesh: {}: not a builtin\n", name), 2),
        };
        self.emit(&result)?;
        Ok(result.exit_code)
    }

    /// Write a builtin's output to the current streams.
    pub(crate) fn emit(&self, result: &ExecResult) -> Result<(), InterpreterError> {
        if !result.stdout.is_empty() {
            self.stdio.stdout.write_str(&result.stdout)?;
        }
        if !result.stderr.is_empty() {
            self.stdio.stderr.write_str(&result.stderr)?;
        }
        Ok(())
    }

    /// jobs: list background jobs, then forget the finished ones.
    fn builtin_jobs(&mut self) -> ExecResult {
        let listing: String = self
            .jobs
            .iter()
            .map(|job| {
                let status = if job.is_finished() { "Done" } else { "Running" };
                format!("[{}]  {:<8}{}\n", job.id, status, job.command)
            })
            .collect();
        self.jobs.reap();
        ExecResult::success(listing)
    }

    /// wait [id...]: join background jobs; the status is that of the last one.
    fn builtin_wait(&mut self, args: &[String]) -> ExecResult {
        if args.is_empty() {
            self.jobs.wait_all();
            return ExecResult::ok();
        }

        let mut status = 0;
        let mut stderr = String::new();
        for arg in args {
            let id = arg.trim_start_matches('%').parse::<u32>().ok();
            match id.and_then(|id| self.jobs.wait(id)) {
                Some(code) => status = code,
                None => {
                    stderr.push_str(&format!("treesh: wait: {}: no such job\n", arg));
                    status = 127;
                }
            }
        }
        ExecResult::new(String::new(), stderr, status)
    }
}
