//! Builtin Commands
//!
//! Builtins that need more than a line or two of logic. Each handler works on
//! the interpreter state and returns the output it wants written; the
//! dispatcher owns the actual streams.

pub mod break_cmd;
pub mod cd_cmd;
pub mod continue_cmd;
pub mod exit_cmd;
pub mod export_cmd;
pub mod return_cmd;
pub mod shift_cmd;
pub mod unset_cmd;

pub use break_cmd::handle_break;
pub use cd_cmd::handle_cd;
pub use continue_cmd::handle_continue;
pub use exit_cmd::handle_exit;
pub use export_cmd::handle_export;
pub use return_cmd::handle_return;
pub use shift_cmd::handle_shift;
pub use unset_cmd::handle_unset;
