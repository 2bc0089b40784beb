//! Pipeline and List Execution
//!
//! - `a && b`, `a || b`: short-circuit on the left status
//! - `a | b`: both stages run concurrently on copies of the runner, joined
//!   by a private [`ChanPipe`]. The pipeline's status is the right stage's.
//!
//! The pipe is closed when either side finishes: the reader then sees EOF,
//! or a producer still writing gets a broken pipe and stops.

use std::io;
use std::thread;

use crate::ast::types::{BinaryExpr, Node, Token};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::{Runner, RUNNER_STACK_SIZE};
use crate::interpreter::stdio::{InStream, OutStream};
use crate::pipe::{ChanPipe, DEFAULT_SLOTS};

impl Runner {
    pub(crate) fn execute_binary(&mut self, expr: &BinaryExpr) -> Result<i32, InterpreterError> {
        match expr.op {
            Token::AndAnd => {
                let status = self.execute_node(&expr.x)?;
                if status != 0 {
                    return Ok(status);
                }
                self.execute_node(&expr.y)
            }
            Token::OrOr => {
                let status = self.execute_node(&expr.x)?;
                if status == 0 {
                    return Ok(status);
                }
                self.execute_node(&expr.y)
            }
            Token::Pipe => self.execute_pipe(&expr.x, &expr.y),
            other => Err(InterpreterError::Expansion(format!(
                "unsupported operator `{}'",
                other
            ))),
        }
    }

    fn execute_pipe(&mut self, left: &Node, right: &Node) -> Result<i32, InterpreterError> {
        let pipe = ChanPipe::shared(DEFAULT_SLOTS);

        let mut producer = self.fork();
        producer.stdio.stdout = OutStream::new(pipe.writer());
        let mut consumer = self.fork();
        consumer.stdio.stdin = Some(InStream::new(pipe.reader()));

        let (left_result, right_result) = thread::scope(|s| -> io::Result<_> {
            let stage = thread::Builder::new()
                .name("pipeline".to_string())
                .stack_size(RUNNER_STACK_SIZE)
                .spawn_scoped(s, || {
                    let result = producer.execute_node(left);
                    pipe.close();
                    result
                })?;

            let right_result = consumer.execute_node(right);
            pipe.close();
            let left_result = stage
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("pipeline stage panicked").into()));
            Ok((left_result, right_result))
        })?;

        let status = match right_result {
            Ok(status) => status,
            Err(e) => consumer.subshell_status(e)?,
        };
        match left_result {
            Err(e) if e.is_broken_pipe() => {
                tracing::trace!("pipeline producer stopped by closed pipe");
            }
            Err(e) => {
                producer.subshell_status(e)?;
            }
            Ok(_) => {}
        }
        Ok(status)
    }
}
