//! Positional-argument validators.
//!
//! # Examples
//!
//! ```
//! use command_dispatch_core::Args;
//!
//! assert_eq!(Args::Exact(2).max_args(), Some(2));
//! assert_eq!(Args::Minimum(1).max_args(), None);
//! assert_eq!(Args::None.max_args(), Some(0));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::completion::Completion;
use crate::error::ArgsError;
use crate::tree::{CommandId, CommandTree};

/// Custom validator signature.
pub type ArgsFn =
    Arc<dyn Fn(&CommandTree, CommandId, &[String]) -> Result<(), ArgsError> + Send + Sync>;

/// Constraint on the positional arguments a command accepts.
#[derive(Clone)]
pub enum Args {
    /// Any number of arguments.
    Arbitrary,
    /// No arguments at all.
    None,
    /// Every argument must be a valid arg or an arg alias.
    OnlyValid,
    Minimum(usize),
    Maximum(usize),
    Exact(usize),
    /// Inclusive bounds.
    Range(usize, usize),
    /// Exactly `n` arguments, each of them valid.
    ExactValid(usize),
    /// All validators must pass.
    MatchAll(Vec<Args>),
    Custom(ArgsFn),
}

impl Args {
    /// Wraps a closure as a validator.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&CommandTree, CommandId, &[String]) -> Result<(), ArgsError> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Validates `args` for command `id`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ArgsError`] raised.
    pub fn validate(&self, tree: &CommandTree, id: CommandId, args: &[String]) -> Result<(), ArgsError> {
        let received = args.len();
        match self {
            Self::Arbitrary => Ok(()),
            Self::None => match args.first() {
                Some(arg) => Err(ArgsError::NoArgs {
                    arg: arg.clone(),
                    path: tree.command_path(id),
                }),
                None => Ok(()),
            },
            Self::OnlyValid => only_valid(tree, id, args),
            Self::Minimum(min) if received < *min => Err(ArgsError::TooFew {
                min: *min,
                received,
            }),
            Self::Maximum(max) if received > *max => Err(ArgsError::TooMany {
                max: *max,
                received,
            }),
            Self::Exact(n) if received != *n => Err(ArgsError::WrongCount {
                expected: *n,
                received,
            }),
            Self::Range(min, max) if received < *min || received > *max => {
                Err(ArgsError::OutOfRange {
                    min: *min,
                    max: *max,
                    received,
                })
            }
            Self::ExactValid(n) => {
                if received != *n {
                    return Err(ArgsError::WrongCount {
                        expected: *n,
                        received,
                    });
                }
                only_valid(tree, id, args)
            }
            Self::MatchAll(all) => all.iter().try_for_each(|v| v.validate(tree, id, args)),
            Self::Custom(f) => f(tree, id, args),
            Self::Minimum(_) | Self::Maximum(_) | Self::Exact(_) | Self::Range(..) => Ok(()),
        }
    }

    /// Largest number of positionals this validator can accept, if bounded.
    ///
    /// Completion stops suggesting positionals once this many are present.
    pub fn max_args(&self) -> Option<usize> {
        match self {
            Self::None => Some(0),
            Self::Maximum(n) | Self::Exact(n) | Self::ExactValid(n) | Self::Range(_, n) => Some(*n),
            Self::MatchAll(all) => all.iter().filter_map(Args::max_args).min(),
            Self::Arbitrary | Self::OnlyValid | Self::Minimum(_) | Self::Custom(_) => None,
        }
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arbitrary => f.write_str("Arbitrary"),
            Self::None => f.write_str("None"),
            Self::OnlyValid => f.write_str("OnlyValid"),
            Self::Minimum(n) => write!(f, "Minimum({n})"),
            Self::Maximum(n) => write!(f, "Maximum({n})"),
            Self::Exact(n) => write!(f, "Exact({n})"),
            Self::Range(min, max) => write!(f, "Range({min}, {max})"),
            Self::ExactValid(n) => write!(f, "ExactValid({n})"),
            Self::MatchAll(all) => f.debug_tuple("MatchAll").field(all).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn only_valid(tree: &CommandTree, id: CommandId, args: &[String]) -> Result<(), ArgsError> {
    let node = tree.command(id);
    if node.valid_args().is_empty() {
        return Ok(());
    }
    let accepted: Vec<String> = node
        .valid_args()
        .iter()
        .map(|entry| Completion::parse(entry).value().to_string())
        .chain(node.arg_aliases().iter().cloned())
        .collect();
    match args.iter().find(|arg| !accepted.contains(arg)) {
        Some(arg) => Err(ArgsError::NotValid {
            arg: arg.clone(),
            path: tree.command_path(id),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    fn tree() -> CommandTree {
        CommandTree::new(
            Command::new("app")
                .valid_args(["pod\tA pod", "node"])
                .arg_aliases(["po"]),
        )
        .unwrap()
    }

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_counts() {
        let t = tree();
        let root = t.root();
        assert!(Args::Exact(1).validate(&t, root, &argv(&["a"])).is_ok());
        assert_eq!(
            Args::Exact(2).validate(&t, root, &argv(&["a"])).unwrap_err().to_string(),
            "accepts 2 arg(s), received 1"
        );
        assert_eq!(
            Args::Minimum(2).validate(&t, root, &argv(&["a"])).unwrap_err().to_string(),
            "requires at least 2 arg(s), only received 1"
        );
        assert_eq!(
            Args::Range(1, 2)
                .validate(&t, root, &argv(&["a", "b", "c"]))
                .unwrap_err()
                .to_string(),
            "accepts between 1 and 2 arg(s), received 3"
        );
    }

    #[test]
    fn test_no_args_names_the_command() {
        let t = tree();
        let err = Args::None.validate(&t, t.root(), &argv(&["x"])).unwrap_err();
        assert_eq!(err.to_string(), "unknown command \"x\" for \"app\"");
    }

    #[test]
    fn test_only_valid_accepts_aliases_and_strips_descriptions() {
        let t = tree();
        assert!(Args::OnlyValid.validate(&t, t.root(), &argv(&["pod", "po"])).is_ok());
        assert!(Args::OnlyValid.validate(&t, t.root(), &argv(&["svc"])).is_err());
    }

    #[test]
    fn test_match_all_takes_smallest_bound() {
        let v = Args::MatchAll(vec![Args::Maximum(3), Args::Exact(1), Args::OnlyValid]);
        assert_eq!(v.max_args(), Some(1));
    }
}
