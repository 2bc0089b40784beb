//! Interpreter Types
//!
//! Type definitions for the interpreter state and execution results.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ast::types::Node;

// ============================================================================
// Interpreter State
// ============================================================================

/// Everything a script can observe or mutate. Cloning it yields the isolated
/// copy a subshell, pipeline stage or background job runs against.
#[derive(Debug, Clone)]
pub struct InterpreterState {
    // ---- Core Environment ----
    /// Shell variables
    pub vars: HashMap<String, String>,
    /// Names of variables passed to external commands
    pub exported: HashSet<String>,
    /// Function definitions (name -> body)
    pub functions: HashMap<String, Node>,
    /// Positional parameters $1..$N
    pub positional: Vec<String>,
    /// Value of $0
    pub script_name: String,
    /// Current working directory
    pub cwd: String,
    /// Previous directory (for `cd -`)
    pub previous_dir: String,

    // ---- Execution Tracking ----
    /// Exit code of last executed command
    pub last_exit_code: i32,
    /// Id of the most recent background job (for $!)
    pub last_background_job: Option<u32>,
    /// Value of $$
    pub shell_pid: u32,

    // ---- Control Flow ----
    /// Current loop nesting depth (for break/continue)
    pub loop_depth: u32,
    /// Current function call depth (for recursion limits)
    pub call_depth: u32,

    // ---- Process ----
    /// Total commands executed (for execution limits)
    pub command_count: u64,
}

impl Default for InterpreterState {
    fn default() -> Self {
        let cwd = std::env::current_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| String::from("/"));
        Self {
            vars: HashMap::new(),
            exported: HashSet::new(),
            functions: HashMap::new(),
            positional: Vec::new(),
            script_name: String::from("treesh"),
            previous_dir: cwd.clone(),
            cwd,
            last_exit_code: 0,
            last_background_job: None,
            shell_pid: std::process::id(),
            loop_depth: 0,
            call_depth: 0,
            command_count: 0,
        }
    }
}

impl InterpreterState {
    pub fn get_var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(|s| s.as_str())
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn export_var(&mut self, name: impl Into<String>) {
        self.exported.insert(name.into());
    }

    /// Remove a variable and its export flag.
    pub fn unset_var(&mut self, name: &str) -> bool {
        self.exported.remove(name);
        self.vars.remove(name).is_some()
    }

    /// Snapshot of exported variables, as handed to external commands.
    pub fn exported_env(&self) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = self
            .exported
            .iter()
            .filter_map(|name| self.vars.get(name).map(|v| (name.clone(), v.clone())))
            .collect();
        env.sort();
        env
    }
}

// ============================================================================
// Results and Limits
// ============================================================================

/// Captured result of running a script to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecResult {
    pub fn new(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self { stdout, stderr, exit_code }
    }

    /// Success result with no output
    pub fn ok() -> Self {
        Self::new(String::new(), String::new(), 0)
    }

    /// Success result with stdout
    pub fn success(stdout: impl Into<String>) -> Self {
        Self::new(stdout.into(), String::new(), 0)
    }

    /// Failure result with stderr message
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self::new(String::new(), stderr.into(), 1)
    }

    /// Failure result with stderr message and custom exit code
    pub fn failure_with_code(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self::new(String::new(), stderr.into(), exit_code)
    }
}

impl Default for ExecResult {
    fn default() -> Self {
        Self::ok()
    }
}

/// Execution limits configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    /// Maximum recursion depth for function calls
    pub max_recursion_depth: u32,
    /// Maximum number of commands to execute per run
    pub max_command_count: u64,
    /// Maximum number of iterations of a single loop
    pub max_iterations: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_recursion_depth: 1000,
            max_command_count: 100_000,
            max_iterations: 1_000_000,
        }
    }
}
