//! Command dispatch and shell completion.
//!
//! This crate models a CLI as a tree of commands and answers two kinds of
//! requests against it:
//!
//! - **Execution** ([`CommandTree::execute`]): resolve the command a line
//!   addresses, parse its flags, check positional validators, required
//!   flags and flag groups, then call its run function.
//! - **Completion** ([`CommandTree::complete`]): given the words typed so
//!   far and a partial token, produce [`Completion`] candidates and a
//!   [`ShellCompDirective`] for the shell scripts in [`shells`].
//!
//! Trees are declared with the [`Command`] builder and frozen into a
//! [`CommandTree`], which adds the implicit `help` and `completion`
//! commands and the `--help`/`--version` flags.
//!
//! # Example
//!
//! ```
//! use std::io::Write;
//!
//! use command_dispatch_core::*;
//!
//! let root = Command::new("kubectl")
//!     .persistent_flag(Flag::string("namespace", "default", "Namespace").shorthand('n'))
//!     .subcommand(
//!         Command::new("get")
//!             .short("Display resources")
//!             .valid_args(["pods\tRunning pods", "nodes"])
//!             .args(Args::MatchAll(vec![Args::Exact(1), Args::OnlyValid]))
//!             .run(|inv| {
//!                 let arg = inv.args()[0].clone();
//!                 writeln!(inv.out(), "getting {arg}")?;
//!                 Ok(())
//!             }),
//!     );
//! let tree = CommandTree::new(root).unwrap();
//!
//! let outcome = tree.complete(&["get", "p"]);
//! assert_eq!(outcome.values(), vec!["pods"]);
//! assert_eq!(outcome.directive, ShellCompDirective::NO_FILE_COMP);
//!
//! let mut out = Vec::new();
//! tree.execute(&["get", "pods"], &mut out).unwrap();
//! assert_eq!(out, b"getting pods\n");
//! ```

pub mod args;
pub mod command;
pub mod completion;
pub mod engine;
pub mod env;
pub mod error;
mod execute;
pub mod flag;
pub mod flag_groups;
pub mod help;
pub mod parse;
pub mod protocol;
pub mod shells;
pub mod tree;

pub use args::{Args, ArgsFn};
pub use command::{Command, Invocation, RunError, RunFn};
pub use completion::{
    Completion, CompletionContext, CompletionFn, CompletionResult, ShellCompDirective,
    append_active_help, fixed_completions, no_file_completions,
};
pub use engine::CompletionOutcome;
pub use env::{EnvSource, ProcessEnv};
pub use error::{ArgsError, DispatchError, FlagError, FlagGroupError, ProtocolError, Result};
pub use flag::{Flag, FlagAnnotation, FlagKind, FlagValue};
pub use parse::{FlagSet, ParsedFlags, VisibleFlag};
pub use shells::Shell;
pub use tree::{CommandId, CommandNode, CommandTree, CompletionOptions, TreeSettings};
