//! Control Flow Execution
//!
//! Handles control flow constructs:
//! - if/elif/else
//! - while loops
//! - for loops
//! - case statements
//!
//! `break N` and `continue N` unwind as errors; each loop consumes one level
//! and passes the rest outwards.

use crate::ast::types::{CaseStmt, ForStmt, IfStmt, WhileStmt};
use crate::interpreter::errors::{InterpreterError, LimitType};
use crate::interpreter::execution_engine::Runner;
use crate::interpreter::pattern::pattern_matches;
use crate::parser::is_valid_name;

/// Action to take after the loop body unwound.
#[derive(Debug)]
enum LoopAction {
    /// Leave this loop
    Break,
    /// Start the next iteration of this loop
    Continue,
    /// Not ours: pass to the enclosing construct
    Propagate(InterpreterError),
}

fn loop_action(err: InterpreterError) -> LoopAction {
    match err {
        InterpreterError::Break(n) if n <= 1 => LoopAction::Break,
        InterpreterError::Break(n) => LoopAction::Propagate(InterpreterError::Break(n - 1)),
        InterpreterError::Continue(n) if n <= 1 => LoopAction::Continue,
        // continue N: leave this loop and continue an outer one
        InterpreterError::Continue(n) => LoopAction::Propagate(InterpreterError::Continue(n - 1)),
        other => LoopAction::Propagate(other),
    }
}

impl Runner {
    /// if/elif/else. With no branch taken the status is the last condition's.
    pub(crate) fn execute_if(&mut self, stmt: &IfStmt) -> Result<i32, InterpreterError> {
        let mut status = self.execute_node(&stmt.cond)?;
        if status == 0 {
            return self.execute_stmts(&stmt.then_stmts);
        }

        for elif in &stmt.elifs {
            status = self.execute_node(&elif.cond)?;
            if status == 0 {
                return self.execute_stmts(&elif.then_stmts);
            }
        }

        if !stmt.else_stmts.is_empty() {
            return self.execute_stmts(&stmt.else_stmts);
        }
        Ok(status)
    }

    fn enter_loop<F>(&mut self, body: F) -> Result<i32, InterpreterError>
    where
        F: FnOnce(&mut Self) -> Result<i32, InterpreterError>,
    {
        self.state.loop_depth += 1;
        let result = body(self);
        self.state.loop_depth -= 1;
        result
    }

    fn check_iterations(&self, iterations: u64, construct: &str) -> Result<(), InterpreterError> {
        if iterations > self.limits.max_iterations {
            return Err(InterpreterError::limit(
                format!(
                    "{}: too many iterations ({}), increase max_iterations",
                    construct, self.limits.max_iterations
                ),
                LimitType::Iterations,
            ));
        }
        Ok(())
    }

    /// while loop. Ends with the condition's final (non-zero) status, or 0
    /// after `break`.
    pub(crate) fn execute_while(&mut self, stmt: &WhileStmt) -> Result<i32, InterpreterError> {
        self.enter_loop(|runner| {
            let mut iterations = 0u64;
            loop {
                let cond = runner.execute_node(&stmt.cond)?;
                if cond != 0 {
                    return Ok(cond);
                }
                iterations += 1;
                runner.check_iterations(iterations, "while")?;

                if let Err(e) = runner.execute_stmts(&stmt.do_stmts) {
                    match loop_action(e) {
                        LoopAction::Break => return Ok(0),
                        LoopAction::Continue => continue,
                        LoopAction::Propagate(e) => return Err(e),
                    }
                }
            }
        })
    }

    /// for loop. The word list is expanded once, up front.
    pub(crate) fn execute_for(&mut self, stmt: &ForStmt) -> Result<i32, InterpreterError> {
        if !is_valid_name(&stmt.name.val) {
            return Err(InterpreterError::Expansion(format!(
                "`{}': not a valid identifier",
                stmt.name.val
            )));
        }
        let values = self.expand_words(&stmt.word_list)?;

        self.enter_loop(|runner| {
            let mut status = 0;
            for (i, value) in values.into_iter().enumerate() {
                runner.check_iterations(i as u64 + 1, "for")?;
                runner.state.set_var(stmt.name.val.clone(), value);

                match runner.execute_stmts(&stmt.do_stmts) {
                    Ok(s) => status = s,
                    Err(e) => match loop_action(e) {
                        LoopAction::Break => return Ok(0),
                        LoopAction::Continue => status = runner.state.last_exit_code,
                        LoopAction::Propagate(e) => return Err(e),
                    },
                }
            }
            Ok(status)
        })
    }

    /// case statement: the first matching arm runs, no fallthrough.
    pub(crate) fn execute_case(&mut self, stmt: &CaseStmt) -> Result<i32, InterpreterError> {
        let subject = self.expand_word_single(&stmt.name)?;

        for arm in &stmt.patterns {
            for part in &arm.parts {
                let pattern = self.expand_case_pattern(part)?;
                if pattern_matches(&pattern, &subject) {
                    return self.execute_stmts(&arm.stmts);
                }
            }
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{CasePattern, Elif, AST};
    use crate::interpreter::execution_engine::testing::{run_script, run_with};
    use crate::interpreter::stdio::{CaptureBuffer, OutStream, Stdio};
    use crate::interpreter::types::ExecutionLimits;

    fn capture(runner: &mut Runner) -> CaptureBuffer {
        let out = CaptureBuffer::default();
        runner.set_stdio(Stdio::new(None, OutStream::new(out.clone()), OutStream::sink()));
        out
    }

    #[test]
    fn test_if_selects_first_true_elif() {
        let mut runner = Runner::new();
        let out = capture(&mut runner);
        let stmt = IfStmt {
            cond: Box::new(AST::command(&["false"])),
            then_stmts: vec![AST::command(&["echo", "then"])],
            elifs: vec![
                Elif {
                    cond: Box::new(AST::command(&["false"])),
                    then_stmts: vec![AST::command(&["echo", "elif1"])],
                },
                Elif {
                    cond: Box::new(AST::command(&["true"])),
                    then_stmts: vec![AST::command(&["echo", "elif2"])],
                },
            ],
            else_stmts: vec![AST::command(&["echo", "else"])],
        };
        assert_eq!(runner.execute_if(&stmt).unwrap(), 0);
        assert_eq!(out.contents(), "elif2\n");
    }

    #[test]
    fn test_if_without_match_keeps_condition_status() {
        let (stdout, _, _) = run_script("f() { return 4; }; if f; then echo no; fi; echo $?");
        assert_eq!(stdout, "4\n");

        let (stdout, _, _) = run_script("if false; then echo a; else echo b; fi");
        assert_eq!(stdout, "b\n");
    }

    #[test]
    fn test_while_runs_until_condition_fails() {
        let (stdout, _, _) = run_script(
            "n=0; cond() { n=$((n + 1)); case $n in 1 | 2) return 0;; esac; return 3; }; \
             while cond; do echo body; done; echo $?",
        );
        assert_eq!(stdout, "body\nbody\n3\n");
    }

    #[test]
    fn test_while_iteration_limit() {
        let limits = ExecutionLimits {
            max_iterations: 10,
            ..Default::default()
        };
        let runner = Runner::new().with_limits(limits);
        let (stdout, _, _) = run_with(runner, "while true; do :; done; echo unreachable");
        assert_eq!(stdout, "");
    }

    #[test]
    fn test_for_loop() {
        let (stdout, _, _) = run_script("for i in a 'b c' $(echo d e); do echo $i; done; echo $i");
        assert_eq!(stdout, "a\nb c\nd\ne\ne\n");

        let (stdout, _, status) = run_script("for i in $empty; do echo never; done");
        assert_eq!(stdout, "");
        assert_eq!(status, 0);
    }

    #[test]
    fn test_break_and_continue() {
        let (stdout, _, _) = run_script(
            "for i in 1 2 3 4; do case $i in 2) continue;; 4) break;; esac; echo $i; done",
        );
        assert_eq!(stdout, "1\n3\n");

        let (stdout, _, _) = run_script(
            "for i in 1 2; do for j in a b; do echo $i$j; continue 2; done; echo skipped; done",
        );
        assert_eq!(stdout, "1a\n2a\n");

        let (stdout, _, _) = run_script(
            "for i in 1 2; do while true; do break 5; done; echo never; done; echo out",
        );
        assert_eq!(stdout, "out\n");
    }

    #[test]
    fn test_break_from_function_leaves_callers_loop() {
        let (stdout, _, _) = run_script("stop() { break; }; for i in 1 2 3; do echo $i; stop; done");
        assert_eq!(stdout, "1\n");
    }

    #[test]
    fn test_case_first_match_wins() {
        let mut runner = Runner::new();
        let out = capture(&mut runner);
        let stmt = CaseStmt {
            name: Box::new(AST::lit_word("a")),
            patterns: vec![
                CasePattern {
                    parts: vec![AST::lit_word("a")],
                    stmts: vec![AST::command(&["echo", "first"])],
                },
                CasePattern {
                    parts: vec![AST::lit_word("a"), AST::lit_word("b")],
                    stmts: vec![AST::command(&["echo", "second"])],
                },
                CasePattern {
                    parts: vec![AST::lit_word("*")],
                    stmts: vec![AST::command(&["echo", "third"])],
                },
            ],
        };
        runner.execute_case(&stmt).unwrap();
        assert_eq!(out.contents(), "first\n");
    }

    #[test]
    fn test_case_patterns() {
        let (stdout, _, _) = run_script(
            "for w in foo.txt bar x '*'; do case $w in *.txt) echo txt;; b?r) echo bar;; '*') echo star;; *) echo other;; esac; done",
        );
        assert_eq!(stdout, "txt\nbar\nother\nstar\n");

        let (stdout, _, status) = run_script("case z in a) echo a;; esac");
        assert_eq!((stdout.as_str(), status), ("", 0));
    }

    #[test]
    fn test_loop_action_levels() {
        assert!(matches!(loop_action(InterpreterError::Break(1)), LoopAction::Break));
        assert!(matches!(
            loop_action(InterpreterError::Break(3)),
            LoopAction::Propagate(InterpreterError::Break(2))
        ));
        assert!(matches!(loop_action(InterpreterError::Continue(1)), LoopAction::Continue));
        assert!(matches!(
            loop_action(InterpreterError::Exit(0)),
            LoopAction::Propagate(InterpreterError::Exit(0))
        ));
    }
}
