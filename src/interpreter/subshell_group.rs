//! Subshell and Group Execution
//!
//! `( ... )` runs against a copy of the runner, so variable, function and
//! cwd changes stay inside. `{ ...; }` runs against the runner itself.

use crate::ast::types::{Block, Subshell};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::Runner;

impl Runner {
    /// Execute a subshell. `exit` inside it only ends the subshell.
    pub(crate) fn execute_subshell(&mut self, sub: &Subshell) -> Result<i32, InterpreterError> {
        let mut child = self.fork();
        match child.execute_stmts(&sub.stmts) {
            Ok(status) => Ok(status),
            Err(e) => child.subshell_status(e),
        }
    }

    /// Execute a group in the current environment.
    pub(crate) fn execute_block(&mut self, block: &Block) -> Result<i32, InterpreterError> {
        self.execute_stmts(&block.stmts)
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::execution_engine::testing::run_script;

    #[test]
    fn test_subshell_changes_do_not_escape() {
        let (stdout, _, _) = run_script("x=1; (x=2; f() { :; }; echo $x); echo $x; f");
        assert_eq!(stdout, "2\n1\n");
    }

    #[test]
    fn test_block_changes_persist() {
        let (stdout, _, _) = run_script("x=1; { x=2; echo $x; }; echo $x");
        assert_eq!(stdout, "2\n2\n");
    }

    #[test]
    fn test_exit_in_subshell_and_block() {
        let (stdout, _, status) = run_script("(exit 5); echo $?; { echo in; exit 6; }; echo never");
        assert_eq!(stdout, "5\nin\n");
        assert_eq!(status, 6);
    }

    #[test]
    fn test_return_inside_subshell_ends_subshell() {
        let (stdout, _, _) = run_script("f() { (return 2; echo no); echo $?; }; f");
        assert_eq!(stdout, "2\n");
    }

    #[test]
    fn test_subshell_cwd() {
        let (stdout, _, _) = run_script("cd /; (cd /tmp; pwd); pwd");
        assert_eq!(stdout, "/tmp\n/\n");
    }
}
