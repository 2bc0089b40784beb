//! Execution Engine
//!
//! The [`Runner`] walks a parsed [`Prog`] and owns all execution state:
//! variables, functions, cwd, last status, the streams commands write to and
//! the background job table.
//!
//! run -> execute_stmts -> execute_node -> execute_command -> invoke
//!
//! Command-local failures (expansion errors, failed redirections, missing
//! commands) become a status; only `exit`, execution limits and I/O failures
//! on the runner's own streams leave `run`.

use std::sync::Arc;

use crate::ast::types::{Command, Lit, Node, Prog, Word};
use crate::interpreter::command_resolution::{CommandExecutor, ExternalCommand, OsExecutor};
use crate::interpreter::errors::{is_scope_exit_error, InterpreterError, LimitType};
use crate::interpreter::jobs::JobTable;
use crate::interpreter::stdio::Stdio;
use crate::interpreter::types::{ExecutionLimits, InterpreterState};
use crate::parser::is_valid_name;

/// Stack size for every thread a runner executes on (pipeline stages,
/// background jobs, the interactive driver). Deep function recursion is
/// bounded by `max_recursion_depth`, not by the thread stack.
pub const RUNNER_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Tree-walking interpreter for one shell session.
pub struct Runner {
    pub(crate) state: InterpreterState,
    pub(crate) limits: ExecutionLimits,
    pub(crate) stdio: Stdio,
    pub(crate) executor: Arc<dyn CommandExecutor>,
    pub(crate) jobs: JobTable,
    /// Status of the last command substitution in the current command
    pub(crate) last_subst_status: Option<i32>,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("cwd", &self.state.cwd)
            .field("last_exit_code", &self.state.last_exit_code)
            .field("jobs", &self.jobs.len())
            .finish_non_exhaustive()
    }
}

/// A leading `NAME=value` word, split into the name and the value word.
fn split_assignment(word: &Node) -> Option<(String, Node)> {
    let Node::Word(word) = word else {
        return None;
    };
    let (Node::Lit(first), rest) = word.parts.split_first()? else {
        return None;
    };
    let (name, value) = first.val.split_once('=')?;
    if !is_valid_name(name) {
        return None;
    }

    let mut parts = Vec::with_capacity(word.parts.len());
    if !value.is_empty() {
        parts.push(Node::Lit(Lit::new(value)));
    }
    parts.extend(rest.iter().cloned());
    Some((name.to_string(), Node::Word(Word { parts })))
}

impl Runner {
    /// A runner with default state: no variables, the process cwd, status 0,
    /// process stdout/stderr and the OS command executor.
    pub fn new() -> Self {
        Self {
            state: InterpreterState::default(),
            limits: ExecutionLimits::default(),
            stdio: Stdio::default(),
            executor: Arc::new(OsExecutor),
            jobs: JobTable::new(),
            last_subst_status: None,
        }
    }

    /// Import the process environment as exported variables.
    pub fn with_process_env(mut self) -> Self {
        for (name, value) in std::env::vars() {
            if is_valid_name(&name) {
                self.state.set_var(name.clone(), value);
                self.state.export_var(name);
            }
        }
        self
    }

    pub fn with_stdio(mut self, stdio: Stdio) -> Self {
        self.stdio = stdio;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn set_stdio(&mut self, stdio: Stdio) {
        self.stdio = stdio;
    }

    pub fn state(&self) -> &InterpreterState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut InterpreterState {
        &mut self.state
    }

    /// Status of the last executed command.
    pub fn exit_status(&self) -> i32 {
        self.state.last_exit_code
    }

    /// Execute every top-level statement in order.
    ///
    /// A non-zero status never stops the program. `Err` means `exit` was
    /// called (`Exit`), a limit was hit, or the runner's streams failed.
    pub fn run(&mut self, prog: &Prog) -> Result<(), InterpreterError> {
        for stmt in &prog.stmts {
            match self.execute_node(stmt) {
                Ok(_) => {}
                // break/continue outside a loop are no-ops
                Err(e) if is_scope_exit_error(&e) => {}
                Err(InterpreterError::Exit(code)) => {
                    self.state.last_exit_code = code;
                    return Err(InterpreterError::Exit(code));
                }
                Err(e) => {
                    tracing::debug!(error = %e, "run aborted");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Clear per-command transient state. Variables, functions, cwd and
    /// running jobs are kept.
    pub fn reset(&mut self) {
        self.state.loop_depth = 0;
        self.state.call_depth = 0;
        self.state.command_count = 0;
        self.last_subst_status = None;
        for (id, status) in self.jobs.reap() {
            tracing::debug!(id, status, "job finished");
        }
    }

    /// An isolated copy for a subshell, pipeline stage, substitution or
    /// background job. Streams and the executor are shared; jobs are not.
    pub(crate) fn fork(&self) -> Runner {
        Runner {
            state: self.state.clone(),
            limits: self.limits.clone(),
            stdio: self.stdio.clone(),
            executor: Arc::clone(&self.executor),
            jobs: JobTable::new(),
            last_subst_status: None,
        }
    }

    /// Status a forked runner ends with when `err` unwinds out of it.
    /// Limits and I/O failures still propagate.
    pub(crate) fn subshell_status(&mut self, err: InterpreterError) -> Result<i32, InterpreterError> {
        match err {
            InterpreterError::Exit(code) | InterpreterError::Return(code) => Ok(code),
            InterpreterError::Break(_) | InterpreterError::Continue(_) => Ok(self.state.last_exit_code),
            e if e.is_expansion_error() => self.report(&e),
            e => Err(e),
        }
    }

    /// Print `err` on stderr; the failing command's status is 1.
    pub(crate) fn report(&mut self, err: &InterpreterError) -> Result<i32, InterpreterError> {
        self.stdio.stderr.write_str(&format!("treesh: {}\n", err))?;
        Ok(1)
    }

    /// Run a forked runner to completion on its own thread.
    fn run_detached(&mut self, node: &Node) -> i32 {
        let result = self.execute_node(node).or_else(|e| self.subshell_status(e));
        match result {
            Ok(status) => status,
            Err(InterpreterError::ExecutionLimit { message, .. }) => {
                let _ = self.stdio.stderr.write_str(&format!("treesh: {}\n", message));
                InterpreterError::LIMIT_EXIT_CODE
            }
            Err(e) => {
                tracing::warn!(error = %e, "background job failed");
                1
            }
        }
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    /// Execute statements in order; the status is the last one's.
    pub(crate) fn execute_stmts(&mut self, stmts: &[Node]) -> Result<i32, InterpreterError> {
        let mut status = 0;
        for stmt in stmts {
            status = self.execute_node(stmt)?;
        }
        Ok(status)
    }

    /// Execute one statement and record its status in `$?`.
    pub(crate) fn execute_node(&mut self, node: &Node) -> Result<i32, InterpreterError> {
        let result = match node {
            Node::Command(cmd) => self.execute_command(cmd),
            Node::Subshell(sub) => self.execute_subshell(sub),
            Node::Block(block) => self.execute_block(block),
            Node::IfStmt(stmt) => self.execute_if(stmt),
            Node::WhileStmt(stmt) => self.execute_while(stmt),
            Node::ForStmt(stmt) => self.execute_for(stmt),
            Node::CaseStmt(stmt) => self.execute_case(stmt),
            Node::BinaryExpr(expr) => self.execute_binary(expr),
            Node::FuncDecl(decl) => Ok(self.declare_function(decl)),
            other => Err(InterpreterError::Expansion(format!("cannot execute `{}'", other))),
        };

        let status = match result {
            Err(e) if e.is_expansion_error() => self.report(&e)?,
            other => other?,
        };
        self.state.last_exit_code = status;
        Ok(status)
    }

    // ------------------------------------------------------------------------
    // Simple commands
    // ------------------------------------------------------------------------

    fn count_command(&mut self) -> Result<(), InterpreterError> {
        self.state.command_count += 1;
        if self.state.command_count > self.limits.max_command_count {
            return Err(InterpreterError::limit(
                format!(
                    "maximum command count ({}) exceeded (possible infinite loop)",
                    self.limits.max_command_count
                ),
                LimitType::Commands,
            ));
        }
        Ok(())
    }

    fn execute_command(&mut self, cmd: &Command) -> Result<i32, InterpreterError> {
        self.count_command()?;
        if cmd.background {
            return self.spawn_background(cmd);
        }

        let mut assignments = Vec::new();
        let mut words = Vec::new();
        let mut redirects = Vec::new();
        for arg in &cmd.args {
            match arg {
                Node::Redirect(redirect) => redirects.push(redirect),
                word if words.is_empty() => match split_assignment(word) {
                    Some(assignment) => assignments.push(assignment),
                    None => words.push(word),
                },
                word => words.push(word),
            }
        }

        self.last_subst_status = None;
        let argv = self.expand_words(words)?;

        if argv.is_empty() {
            for (name, value) in &assignments {
                let value = self.expand_word_single(value)?;
                self.state.set_var(name.clone(), value);
            }
            // Redirections still open (and create) their files.
            self.apply_redirects(&redirects)?;
            return Ok(self.last_subst_status.unwrap_or(0));
        }

        let mut values = Vec::with_capacity(assignments.len());
        for (name, value) in &assignments {
            values.push((name.clone(), self.expand_word_single(value)?));
        }
        let stdio = self.apply_redirects(&redirects)?;

        let saved_stdio = std::mem::replace(&mut self.stdio, stdio);
        let saved_vars = self.push_temp_assignments(values);
        let result = self.invoke(&argv);
        self.pop_temp_assignments(saved_vars);
        self.stdio = saved_stdio;
        result
    }

    /// Apply `NAME=value` prefixes for the duration of one command. They are
    /// exported so external commands see them.
    fn push_temp_assignments(&mut self, values: Vec<(String, String)>) -> Vec<(String, Option<String>, bool)> {
        values
            .into_iter()
            .map(|(name, value)| {
                let was_exported = self.state.exported.contains(&name);
                let previous = self.state.vars.insert(name.clone(), value);
                self.state.export_var(name.clone());
                (name, previous, was_exported)
            })
            .collect()
    }

    fn pop_temp_assignments(&mut self, saved: Vec<(String, Option<String>, bool)>) {
        for (name, previous, was_exported) in saved.into_iter().rev() {
            match previous {
                Some(value) => {
                    self.state.vars.insert(name.clone(), value);
                }
                None => {
                    self.state.vars.remove(&name);
                }
            }
            if !was_exported {
                self.state.exported.remove(&name);
            }
        }
    }

    /// `cmd &`: run the command on a job thread against a copy of the state.
    fn spawn_background(&mut self, cmd: &Command) -> Result<i32, InterpreterError> {
        let node = Node::Command(Command {
            args: cmd.args.clone(),
            background: false,
        });
        let mut job = self.fork();
        let id = self
            .jobs
            .spawn(node.to_string(), move || job.run_detached(&node))?;
        self.state.last_background_job = Some(id);
        Ok(0)
    }

    /// Hand `argv` to the command executor.
    pub(crate) fn run_external(&mut self, argv: &[String]) -> Result<i32, InterpreterError> {
        let env = self.state.exported_env();
        let cmd = ExternalCommand {
            argv,
            env: &env,
            cwd: &self.state.cwd,
            path: self.state.get_var("PATH"),
        };
        Ok(self.executor.execute(&cmd, &self.stdio)?)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{run_script, run_with};
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_status_does_not_stop_the_program() {
        let (stdout, _, status) = run_script("false; echo after; nope_cmd_treesh 2>/dev/null");
        assert_eq!(stdout, "after\n");
        assert_eq!(status, 127);
    }

    #[test]
    fn test_assignments_persist_without_command() {
        let (stdout, _, _) = run_script("a=1 b=$a; echo $a$b; c=x echo $c; echo ${c-unset}");
        assert_eq!(stdout, "11\n\nunset\n");
    }

    #[test]
    fn test_prefix_assignment_is_scoped() {
        let (stdout, _, _) = run_script("show() { echo $v; }; v=outer; v=inner show; show");
        assert_eq!(stdout, "inner\nouter\n");
    }

    #[test]
    fn test_assignment_status_from_substitution() {
        let (stdout, _, _) = run_script("x=$(false); echo $?; y=$(true); echo $?");
        assert_eq!(stdout, "1\n0\n");
    }

    #[test]
    fn test_split_assignment() {
        let prog = parse("a=b 'c'=d =e").unwrap();
        let Node::Command(cmd) = &prog.stmts[0] else {
            panic!("not a command");
        };
        let (name, value) = split_assignment(&cmd.args[0]).unwrap();
        assert_eq!((name.as_str(), value.to_string().as_str()), ("a", "b"));
        assert!(split_assignment(&cmd.args[1]).is_none());
        assert!(split_assignment(&cmd.args[2]).is_none());
    }

    #[test]
    fn test_run_surfaces_exit() {
        let mut runner = Runner::new().with_stdio(Stdio::null());
        let prog = parse("exit 7").unwrap();
        assert!(matches!(runner.run(&prog), Err(InterpreterError::Exit(7))));
        assert_eq!(runner.exit_status(), 7);
    }

    #[test]
    fn test_reset_keeps_bindings() {
        let mut runner = Runner::new().with_stdio(Stdio::null());
        runner.run(&parse("x=1; f() { :; }; cd /").unwrap()).unwrap();
        runner.state.loop_depth = 3;
        runner.reset();
        assert_eq!(runner.state().get_var("x"), Some("1"));
        assert!(runner.state().functions.contains_key("f"));
        assert_eq!(runner.state().cwd, "/");
        assert_eq!(runner.state().loop_depth, 0);
        assert_eq!(runner.state().command_count, 0);
    }

    #[test]
    fn test_command_limit() {
        let limits = ExecutionLimits {
            max_command_count: 5,
            ..Default::default()
        };
        let runner = Runner::new().with_limits(limits);
        let (stdout, _, _) = run_with(runner, "echo 1; echo 2; echo 3; echo 4; echo 5; echo 6");
        assert_eq!(stdout, "1\n2\n3\n4\n5\n");
    }

    #[test]
    fn test_subshell_isolation() {
        let (stdout, _, status) = run_script("x=1; (x=2; cd /; exit 3); echo $? $x");
        assert_eq!(stdout, "3 1\n");
        assert_eq!(status, 0);
    }
}
