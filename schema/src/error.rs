//! Error types for loading and compiling tree definitions.

use std::path::PathBuf;

use command_dispatch_core::{DispatchError, FlagError};
use thiserror::Error;

/// A structural problem found in a definition before it is compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// A usage line whose first word is not a valid command name.
    #[error("invalid command name {0:?}")]
    InvalidCommandName(String),
    #[error("invalid flag name {flag:?} on command {command:?}")]
    InvalidFlagName { command: String, flag: String },
    #[error("invalid shorthand '{shorthand}' for flag {flag:?} on command {command:?}")]
    InvalidShorthand {
        command: String,
        flag: String,
        shorthand: char,
    },
    #[error("duplicate subcommand {name:?} under {parent:?}")]
    DuplicateSubcommand { parent: String, name: String },
    /// A group names a flag the command cannot see.
    #[error("group on command {command:?} names unknown flag {flag:?}")]
    UnknownGroupFlag { command: String, flag: String },
    #[error("group on command {command:?} needs at least two flags")]
    GroupTooSmall { command: String },
    /// Choices were given for a flag that takes no value.
    #[error("flag {flag:?} on command {command:?} takes no value but declares choices")]
    ChoicesWithoutValue { command: String, flag: String },
}

/// Errors raised while loading or compiling a definition.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// The file extension is neither JSON nor YAML.
    #[error("unsupported definition format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Validation found problems; all of them are listed.
    #[error("invalid definition: {}", join(.0))]
    Invalid(Vec<DefinitionError>),

    /// A flag default could not be parsed with the flag's kind.
    #[error("flag {flag:?} on command {command:?}: {source}")]
    FlagDefault {
        command: String,
        flag: String,
        #[source]
        source: FlagError,
    },

    /// The compiled tree was rejected.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Convenience alias for results with [`SchemaError`].
pub type Result<T> = std::result::Result<T, SchemaError>;

fn join(errors: &[DefinitionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
