//! Completion results and shell directives.
//!
//! A completion source returns a list of [`Completion`]s together with a
//! [`ShellCompDirective`] telling the consuming shell how to treat them.
//! Dynamic sources implement [`CompletionFn`]; any closure with the right
//! signature does.
//!
//! # Examples
//!
//! ```
//! use command_dispatch_core::{Completion, ShellCompDirective};
//!
//! let c = Completion::parse("prod\tProduction cluster");
//! assert_eq!(c.value(), "prod");
//! assert_eq!(c.description(), Some("Production cluster"));
//!
//! let d = ShellCompDirective::NO_SPACE | ShellCompDirective::NO_FILE_COMP;
//! assert_eq!(d.bits(), 6);
//! assert!(d.contains(ShellCompDirective::NO_SPACE));
//! ```

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::env::{self, EnvSource};
use crate::parse::ParsedFlags;
use crate::tree::{CommandId, CommandTree};

/// Bitmask telling the shell how to treat a completion result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShellCompDirective(u32);

impl ShellCompDirective {
    /// Let the shell fall back to its normal (file) completion.
    pub const DEFAULT: Self = Self(0);
    /// Completion failed; the candidate list must be ignored.
    pub const ERROR: Self = Self(1 << 0);
    /// Do not add a space after the completion.
    pub const NO_SPACE: Self = Self(1 << 1);
    /// Do not fall back to file completion when there are no candidates.
    pub const NO_FILE_COMP: Self = Self(1 << 2);
    /// Candidates are file extensions to filter file completion by.
    pub const FILTER_FILE_EXT: Self = Self(1 << 3);
    /// Complete directory names only; a single candidate names the
    /// directory to complete within.
    pub const FILTER_DIRS: Self = Self(1 << 4);
    /// Preserve the order of the candidates.
    pub const KEEP_ORDER: Self = Self(1 << 5);

    const ALL: u32 = (1 << 6) - 1;
    const NAMES: [(Self, &'static str); 6] = [
        (Self::ERROR, "Error"),
        (Self::NO_SPACE, "NoSpace"),
        (Self::NO_FILE_COMP, "NoFileComp"),
        (Self::FILTER_FILE_EXT, "FilterFileExt"),
        (Self::FILTER_DIRS, "FilterDirs"),
        (Self::KEEP_ORDER, "KeepOrder"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `None` if `bits` contains an unknown bit.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::ALL == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_default(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ShellCompDirective {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ShellCompDirective {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ShellCompDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            return f.write_str("Default");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join(", "))
    }
}

/// One completion entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A value the shell may insert, with an optional description.
    Candidate {
        value: String,
        description: Option<String>,
    },
    /// An advisory message shown to the user instead of inserted.
    ActiveHelp(String),
}

impl Completion {
    pub fn new(value: impl Into<String>) -> Self {
        Self::Candidate {
            value: value.into(),
            description: None,
        }
    }

    pub fn with_description(value: impl Into<String>, description: impl Into<String>) -> Self {
        let description = description.into();
        Self::Candidate {
            value: value.into(),
            description: (!description.is_empty()).then_some(description),
        }
    }

    pub fn active_help(message: impl Into<String>) -> Self {
        Self::ActiveHelp(message.into())
    }

    /// Parses the `value\tdescription` convention used by static lists.
    pub fn parse(entry: &str) -> Self {
        match entry.split_once('\t') {
            Some((value, description)) => Self::with_description(value, description),
            None => Self::new(entry),
        }
    }

    /// Candidate value; empty for active help.
    pub fn value(&self) -> &str {
        match self {
            Self::Candidate { value, .. } => value,
            Self::ActiveHelp(_) => "",
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Candidate { description, .. } => description.as_deref(),
            Self::ActiveHelp(_) => None,
        }
    }

    pub fn is_active_help(&self) -> bool {
        matches!(self, Self::ActiveHelp(_))
    }
}

impl From<&str> for Completion {
    fn from(entry: &str) -> Self {
        Self::parse(entry)
    }
}

/// Appends an active-help message to a completion list.
pub fn append_active_help(completions: &mut Vec<Completion>, message: &str) {
    completions.push(Completion::active_help(message));
}

/// What a completion callback can see about the current request.
pub struct CompletionContext<'a> {
    tree: &'a CommandTree,
    command: CommandId,
    flags: &'a ParsedFlags,
    env: &'a dyn EnvSource,
}

impl<'a> CompletionContext<'a> {
    pub(crate) fn new(
        tree: &'a CommandTree,
        command: CommandId,
        flags: &'a ParsedFlags,
        env: &'a dyn EnvSource,
    ) -> Self {
        Self {
            tree,
            command,
            flags,
            env,
        }
    }

    pub fn tree(&self) -> &'a CommandTree {
        self.tree
    }

    /// The command completion was resolved to.
    pub fn command(&self) -> CommandId {
        self.command
    }

    /// Flags parsed from the already-typed part of the line.
    pub fn flags(&self) -> &'a ParsedFlags {
        self.flags
    }

    pub fn env(&self) -> &'a dyn EnvSource {
        self.env
    }

    /// Active-help configuration value for this program (`"0"` = disabled).
    pub fn active_help_config(&self) -> String {
        env::active_help_config(self.env, self.tree.root_name())
    }
}

/// Candidates plus the directive for the shell.
pub type CompletionResult = (Vec<Completion>, ShellCompDirective);

/// A dynamic completion source: valid-args functions and per-flag value
/// completions.
///
/// Receives the resolved context, the positional arguments already typed,
/// and the partial token being completed.
pub trait CompletionFn: Send + Sync {
    fn complete(
        &self,
        ctx: &CompletionContext<'_>,
        args: &[String],
        to_complete: &str,
    ) -> CompletionResult;
}

impl<F> CompletionFn for F
where
    F: Fn(&CompletionContext<'_>, &[String], &str) -> CompletionResult + Send + Sync,
{
    fn complete(
        &self,
        ctx: &CompletionContext<'_>,
        args: &[String],
        to_complete: &str,
    ) -> CompletionResult {
        self(ctx, args, to_complete)
    }
}

/// Completion source that offers nothing and disables file completion.
pub fn no_file_completions(
    _ctx: &CompletionContext<'_>,
    _args: &[String],
    _to_complete: &str,
) -> CompletionResult {
    (Vec::new(), ShellCompDirective::NO_FILE_COMP)
}

/// Completion source returning `choices` that start with the typed prefix.
///
/// Entries may use the `value\tdescription` form.
pub fn fixed_completions(
    choices: Vec<String>,
    directive: ShellCompDirective,
) -> impl Fn(&CompletionContext<'_>, &[String], &str) -> CompletionResult + Send + Sync + 'static {
    move |_ctx: &CompletionContext<'_>, _args: &[String], to_complete: &str| {
        let completions: Vec<Completion> = choices
            .iter()
            .map(|choice| Completion::parse(choice))
            .filter(|c| c.value().starts_with(to_complete))
            .collect();
        (completions, directive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_display() {
        assert_eq!(ShellCompDirective::DEFAULT.to_string(), "Default");
        let d = ShellCompDirective::NO_SPACE | ShellCompDirective::KEEP_ORDER;
        assert_eq!(d.to_string(), "NoSpace, KeepOrder");
    }

    #[test]
    fn test_from_bits_rejects_unknown_bits() {
        assert_eq!(
            ShellCompDirective::from_bits(6),
            Some(ShellCompDirective::NO_SPACE | ShellCompDirective::NO_FILE_COMP)
        );
        assert_eq!(ShellCompDirective::from_bits(64), None);
    }

    #[test]
    fn test_empty_description_is_dropped() {
        let c = Completion::parse("alpha\t");
        assert_eq!(c.value(), "alpha");
        assert_eq!(c.description(), None);
    }
}
