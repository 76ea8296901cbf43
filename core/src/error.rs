//! Error types for command dispatch.
//!
//! Execution-path failures (flag parsing, positional validation, required
//! flags, flag groups, run functions) surface as [`DispatchError`]. The
//! completion path never returns these: it converts them to the `Error`
//! directive bit instead.

use thiserror::Error;

/// Flag parsing failures.
///
/// Messages follow the conventional `unknown flag: --x` wording so that
/// scripted callers can match on them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    /// A `--name` that no visible flag declares.
    #[error("unknown flag: --{0}")]
    UnknownFlag(String),
    /// A shorthand character that no visible flag declares.
    #[error("unknown shorthand flag: '{shorthand}' in -{group}")]
    UnknownShorthand { shorthand: char, group: String },
    /// A long flag that requires a value appeared last.
    #[error("flag needs an argument: {0}")]
    MissingArgument(String),
    /// A shorthand flag that requires a value appeared last.
    #[error("flag needs an argument: '{shorthand}' in -{group}")]
    MissingShorthandArgument { shorthand: char, group: String },
    /// Malformed flag token such as `---x` or `--=x`.
    #[error("bad flag syntax: {0}")]
    BadSyntax(String),
    /// The value could not be converted to the flag's declared type.
    #[error("invalid argument {value:?} for \"{flag}\" flag: {reason}")]
    InvalidValue {
        flag: String,
        value: String,
        reason: String,
    },
}

/// Flag group constraint violations.
///
/// Member lists are sorted before the error is built so the text is stable
/// across runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagGroupError {
    #[error(
        "if any flags in the group [{group}] are set they must all be set; missing [{}]",
        .missing.join(" ")
    )]
    RequiredTogether { group: String, missing: Vec<String> },
    #[error("at least one of the flags in the group [{group}] is required")]
    OneRequired { group: String },
    #[error(
        "if any flags in the group [{group}] are set none of the others can be; [{}] were all set",
        .set.join(" ")
    )]
    MutuallyExclusive { group: String, set: Vec<String> },
    #[error(
        "flag [{special}] must be set when any of [{}] are set; set: [{}]",
        .others.join(" "),
        .set.join(" ")
    )]
    DependsOn {
        special: String,
        others: Vec<String>,
        set: Vec<String>,
    },
    #[error(
        "flag [{special}] requires at least one of the flags in the group [{}] to be set",
        .others.join(" ")
    )]
    DependsOnAny { special: String, others: Vec<String> },
}

/// Positional-argument validator failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    #[error("unknown command {arg:?} for {path:?}")]
    NoArgs { arg: String, path: String },
    #[error("invalid argument {arg:?} for {path:?}")]
    NotValid { arg: String, path: String },
    #[error("requires at least {min} arg(s), only received {received}")]
    TooFew { min: usize, received: usize },
    #[error("accepts at most {max} arg(s), received {received}")]
    TooMany { max: usize, received: usize },
    #[error("accepts {expected} arg(s), received {received}")]
    WrongCount { expected: usize, received: usize },
    #[error("accepts between {min} and {max} arg(s), received {received}")]
    OutOfRange {
        min: usize,
        max: usize,
        received: usize,
    },
    /// Failure reported by a custom validator.
    #[error("{0}")]
    Custom(String),
}

/// Errors raised while building or executing a command tree.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The first positional token did not name a subcommand of the root.
    #[error("unknown command {name:?} for {path:?}{}", format_suggestions(.suggestions))]
    UnknownCommand {
        name: String,
        path: String,
        suggestions: Vec<String>,
    },

    #[error(transparent)]
    Flag(#[from] FlagError),

    #[error(transparent)]
    FlagGroup(#[from] FlagGroupError),

    #[error(transparent)]
    Args(#[from] ArgsError),

    /// Flags annotated as required were not supplied.
    #[error("required flag(s) {} not set", quote_list(.0))]
    RequiredFlagsNotSet(Vec<String>),

    /// A registration referenced a flag the command cannot see.
    #[error("flag {flag:?} is not defined on command {command:?}")]
    UnknownFlag { command: String, flag: String },

    /// A usage line without a command name.
    #[error("command usage line {0:?} does not start with a name")]
    EmptyCommandName(String),

    /// Two siblings share a name or alias.
    #[error("duplicate command {name:?} under {parent:?}")]
    DuplicateCommand { name: String, parent: String },

    /// The same flag name is declared twice on one command.
    #[error("flag {flag:?} redefined on command {command:?}")]
    DuplicateFlag { command: String, flag: String },

    /// Two visible flags share a shorthand.
    #[error("unable to redefine shorthand '{shorthand}' for flag {flag:?} on command {command:?}: already used by {existing:?}")]
    DuplicateShorthand {
        command: String,
        flag: String,
        shorthand: char,
        existing: String,
    },

    /// `help <topic>` named no command.
    #[error("unknown help topic {0:?}")]
    UnknownHelpTopic(String),

    /// No completion script exists for the named shell.
    #[error("unsupported shell {0:?}; expected one of bash, zsh, fish, powershell")]
    UnsupportedShell(String),

    /// The command's run function failed.
    #[error("{0}")]
    Run(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Writing to the output sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed completion protocol output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("completion output has no directive line")]
    MissingDirective,
    #[error("invalid directive line {0:?}")]
    InvalidDirective(String),
}

/// Convenience alias for results with [`DispatchError`].
pub type Result<T> = std::result::Result<T, DispatchError>;

fn quote_list(names: &[String]) -> String {
    format!("\"{}\"", names.join("\", \""))
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\nDid you mean this?\n");
    for suggestion in suggestions {
        out.push('\t');
        out.push_str(suggestion);
        out.push('\n');
    }
    out
}
