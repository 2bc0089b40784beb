//! cd - Change directory builtin
//!
//! Supports:
//! - cd [dir] - change to directory (relative to the runner cwd)
//! - cd - change to $HOME
//! - cd - - change to previous directory, printing it
//! - cd -P dir - resolve symlinks

use std::path::Path;

use crate::interpreter::types::{ExecResult, InterpreterState};

/// Handle the cd builtin command
pub fn handle_cd(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    let mut physical = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--" => {
                i += 1;
                break;
            }
            "-P" => physical = true,
            "-L" => physical = false,
            _ => break,
        }
        i += 1;
    }

    let mut print_path = false;
    let target = match args.get(i).map(String::as_str) {
        None | Some("~") => match state.get_var("HOME") {
            Some(home) => home.to_string(),
            None => return ExecResult::failure("treesh: cd: HOME not set\n"),
        },
        Some("-") => {
            print_path = true;
            state.previous_dir.clone()
        }
        Some(dir) => dir.to_string(),
    };

    let joined = if target.starts_with('/') {
        target.clone()
    } else {
        format!("{}/{}", state.cwd, target)
    };
    let mut new_dir = normalize_path(&joined);

    let path = Path::new(&new_dir);
    if !path.exists() {
        return ExecResult::failure(format!("treesh: cd: {}: No such file or directory\n", target));
    }
    if !path.is_dir() {
        return ExecResult::failure(format!("treesh: cd: {}: Not a directory\n", target));
    }
    if physical {
        if let Ok(canonical) = std::fs::canonicalize(&new_dir) {
            new_dir = canonical.to_string_lossy().into_owned();
        }
    }

    state.previous_dir = std::mem::replace(&mut state.cwd, new_dir.clone());
    let old = state.previous_dir.clone();
    state.set_var("PWD", new_dir.clone());
    state.set_var("OLDPWD", old);

    if print_path {
        ExecResult::success(format!("{}\n", new_dir))
    } else {
        ExecResult::ok()
    }
}

/// Normalize a path by resolving . and .. components
pub(crate) fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/').filter(|p| !p.is_empty() && *p != ".") {
        if part == ".." {
            parts.pop();
        } else {
            parts.push(part);
        }
    }
    format!("/{}", parts.join("/"))
}
