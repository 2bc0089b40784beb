//! export - Set environment variables builtin
//!
//! Usage:
//!   export              - List all exported variables
//!   export -p           - List all exported variables (same as no args)
//!   export NAME=value   - Set and export variable
//!   export NAME         - Export existing variable (or mark it for later)
//!   export -n NAME      - Un-export variable, keeping its value

use crate::interpreter::types::{ExecResult, InterpreterState};
use crate::parser::is_valid_name;

/// Handle the export builtin command.
pub fn handle_export(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    let mut unexport = false;
    let mut names: Vec<&str> = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-n" => unexport = true,
            "-p" | "--" => {}
            _ => names.push(arg),
        }
    }

    if names.is_empty() {
        let stdout: String = state
            .exported_env()
            .into_iter()
            .map(|(name, value)| {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                format!("export {}=\"{}\"\n", name, escaped)
            })
            .collect();
        return ExecResult::success(stdout);
    }

    let mut stderr = String::new();
    for arg in names {
        let (name, value) = match arg.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (arg, None),
        };
        if !is_valid_name(name) {
            stderr.push_str(&format!("treesh: export: `{}': not a valid identifier\n", arg));
            continue;
        }
        if let Some(value) = value {
            state.set_var(name, value);
        }
        if unexport {
            state.exported.remove(name);
        } else {
            state.export_var(name);
        }
    }

    if stderr.is_empty() {
        ExecResult::ok()
    } else {
        ExecResult::failure(stderr)
    }
}
