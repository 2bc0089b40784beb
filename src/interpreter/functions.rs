//! Function Handling
//!
//! Handles shell function definition and invocation:
//! - Function definition (adding to function table)
//! - Function calls (with positional parameters scoped to the call)

use crate::ast::types::{FuncDecl, Node};
use crate::interpreter::errors::{InterpreterError, LimitType};
use crate::interpreter::execution_engine::Runner;

impl Runner {
    /// Register a function body; it runs only when called.
    pub(crate) fn declare_function(&mut self, decl: &FuncDecl) -> i32 {
        self.state
            .functions
            .insert(decl.name.val.clone(), (*decl.body).clone());
        0
    }

    /// Call a function with `args` as `$1..$N`. `return` ends the call with
    /// its status; anything else unwinds to the caller.
    pub(crate) fn call_function(
        &mut self,
        name: &str,
        body: &Node,
        args: &[String],
    ) -> Result<i32, InterpreterError> {
        if self.state.call_depth >= self.limits.max_recursion_depth {
            return Err(InterpreterError::limit(
                format!(
                    "{}: maximum recursion depth ({}) exceeded",
                    name, self.limits.max_recursion_depth
                ),
                LimitType::Recursion,
            ));
        }

        let saved_positional = std::mem::replace(&mut self.state.positional, args.to_vec());
        self.state.call_depth += 1;
        let result = self.execute_node(body);
        self.state.call_depth -= 1;
        self.state.positional = saved_positional;

        match result {
            Err(InterpreterError::Return(code)) => Ok(code),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::execution_engine::testing::{run_script, run_with};
    use crate::interpreter::execution_engine::Runner;
    use crate::interpreter::types::ExecutionLimits;

    #[test]
    fn test_declaration_does_not_run_body() {
        let (stdout, _, status) = run_script("f() { echo called; }");
        assert_eq!(stdout, "");
        assert_eq!(status, 0);
    }

    #[test]
    fn test_positional_params_are_scoped() {
        let (stdout, _, _) = run_script(
            "f() { echo $# $1 $2; shift; echo $1; }; set_args() { f x y; echo $# $1; }; set_args outer",
        );
        assert_eq!(stdout, "2 x y\ny\n1 outer\n");
    }

    #[test]
    fn test_return_status() {
        let (stdout, _, status) = run_script("f() { echo in; return 3; echo never; }; f; echo $?");
        assert_eq!(stdout, "in\n3\n");
        assert_eq!(status, 0);

        let (_, stderr, status) = run_script("return 1");
        assert_eq!(stderr, "treesh: return: can only `return' from a function\n");
        assert_eq!(status, 1);
    }

    #[test]
    fn test_function_sees_and_sets_globals() {
        let (stdout, _, _) = run_script("g=1; f() { echo $g; g=2; }; f; echo $g");
        assert_eq!(stdout, "1\n2\n");
    }

    #[test]
    fn test_recursion_limit() {
        let limits = ExecutionLimits {
            max_recursion_depth: 20,
            ..Default::default()
        };
        let runner = Runner::new().with_limits(limits);
        let (stdout, stderr, _) = run_with(runner, "f() { f; }; echo start; f; echo unreachable");
        assert_eq!(stdout, "start\n");
        assert_eq!(stderr, "");
    }

    #[test]
    fn test_bounded_recursion() {
        let (stdout, _, _) = run_script(
            "count() { n=$(($1 - 1)); case $n in 0) echo done;; *) count $n;; esac; }; count 200",
        );
        assert_eq!(stdout, "done\n");
    }
}
