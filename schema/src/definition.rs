//! Serializable command tree definitions.
//!
//! A definition file describes a whole command tree: matching settings,
//! options of the implicit `completion` command, and the root command with
//! its flags, flag groups and subcommands. Every field except the root's
//! `use` line has a default, so definitions stay short.
//!
//! # Example YAML
//!
//! ```yaml
//! settings:
//!   prefix_matching: true
//! root:
//!   use: kubectl
//!   persistent_flags:
//!     - name: namespace
//!       shorthand: n
//!       usage: Namespace scope
//!   subcommands:
//!     - use: get [resource]
//!       short: Display resources
//!       args: { kind: exact_valid, n: 1 }
//!       valid_args: ["pods\tRunning pods", nodes]
//!       flags:
//!         - name: output
//!           shorthand: o
//!           choices: [json, yaml, wide]
//!         - name: json
//!           kind: bool
//!         - name: yaml
//!           kind: bool
//!       groups:
//!         - mutually_exclusive: [json, yaml]
//! ```

use command_dispatch_core::{Args, CompletionOptions, FlagKind, TreeSettings};
use serde::{Deserialize, Serialize};

/// A complete tree definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeDefinition {
    pub settings: SettingsDefinition,
    pub completion: CompletionDefinition,
    pub root: CommandDefinition,
}

impl TreeDefinition {
    /// Name of the root command (the program name).
    pub fn program(&self) -> &str {
        self.root.name()
    }
}

/// Resolution behavior; mirrors [`TreeSettings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsDefinition {
    pub prefix_matching: bool,
    pub case_insensitive: bool,
    pub traverse_children: bool,
    pub sort_commands: bool,
}

impl Default for SettingsDefinition {
    fn default() -> Self {
        Self {
            prefix_matching: false,
            case_insensitive: false,
            traverse_children: false,
            sort_commands: true,
        }
    }
}

/// Options of the implicit `completion` command; mirrors
/// [`CompletionOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletionDefinition {
    pub disable_default_cmd: bool,
    pub hidden_default_cmd: bool,
    pub disable_no_desc_flag: bool,
    pub disable_descriptions: bool,
}

impl SettingsDefinition {
    pub(crate) fn to_settings(&self, completion: &CompletionDefinition) -> TreeSettings {
        TreeSettings {
            prefix_matching: self.prefix_matching,
            case_insensitive: self.case_insensitive,
            traverse_children: self.traverse_children,
            sort_commands: self.sort_commands,
            completion: CompletionOptions {
                disable_default_cmd: completion.disable_default_cmd,
                hidden_default_cmd: completion.hidden_default_cmd,
                disable_no_desc_flag: completion.disable_no_desc_flag,
                disable_descriptions: completion.disable_descriptions,
            },
        }
    }
}

/// One command and its subtree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandDefinition {
    /// Usage line; the first word is the command name.
    #[serde(rename = "use")]
    pub use_line: String,
    pub aliases: Vec<String>,
    pub short: String,
    pub long: String,
    pub example: String,
    pub hidden: bool,
    /// Deprecation message; marks the command deprecated when present.
    pub deprecated: Option<String>,
    pub version: Option<String>,
    pub args: Option<ArgsDefinition>,
    /// Static positional completions, `value` or `value\tdescription`.
    pub valid_args: Vec<String>,
    pub arg_aliases: Vec<String>,
    pub flags: Vec<FlagDefinition>,
    pub persistent_flags: Vec<FlagDefinition>,
    pub groups: Vec<GroupDefinition>,
    pub disable_flag_parsing: bool,
    pub subcommands: Vec<CommandDefinition>,
}

impl CommandDefinition {
    pub fn name(&self) -> &str {
        self.use_line.split_whitespace().next().unwrap_or_default()
    }
}

/// Positional-argument validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ArgsDefinition {
    Arbitrary,
    None,
    OnlyValid,
    Minimum { n: usize },
    Maximum { n: usize },
    Exact { n: usize },
    Range { min: usize, max: usize },
    ExactValid { n: usize },
    MatchAll { all: Vec<ArgsDefinition> },
}

impl ArgsDefinition {
    pub(crate) fn to_args(&self) -> Args {
        match self {
            Self::Arbitrary => Args::Arbitrary,
            Self::None => Args::None,
            Self::OnlyValid => Args::OnlyValid,
            Self::Minimum { n } => Args::Minimum(*n),
            Self::Maximum { n } => Args::Maximum(*n),
            Self::Exact { n } => Args::Exact(*n),
            Self::Range { min, max } => Args::Range(*min, *max),
            Self::ExactValid { n } => Args::ExactValid(*n),
            Self::MatchAll { all } => Args::MatchAll(all.iter().map(Self::to_args).collect()),
        }
    }
}

/// A flag declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlagDefinition {
    pub name: String,
    pub shorthand: Option<char>,
    pub kind: KindDefinition,
    /// Default in command-line syntax; parsed with the flag's kind.
    pub default: Option<String>,
    pub usage: String,
    pub required: bool,
    pub hidden: bool,
    pub deprecated: Option<String>,
    /// Value used when the flag appears without one.
    pub no_opt_default: Option<String>,
    /// Fixed value completions, `value` or `value\tdescription`.
    pub choices: Vec<String>,
    /// File extensions the shell should filter on.
    pub extensions: Vec<String>,
    /// Directory completion: empty for any directory, otherwise the
    /// directory whose subdirectories are offered.
    pub dirs: Option<String>,
}

/// Value type of a flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindDefinition {
    Bool,
    Count,
    #[default]
    String,
    Int,
    Float,
    StringSlice,
    StringArray,
    IntSlice,
}

impl KindDefinition {
    pub fn to_kind(self) -> FlagKind {
        match self {
            Self::Bool => FlagKind::Bool,
            Self::Count => FlagKind::Count,
            Self::String => FlagKind::String,
            Self::Int => FlagKind::Int,
            Self::Float => FlagKind::Float,
            Self::StringSlice => FlagKind::StringSlice,
            Self::StringArray => FlagKind::StringArray,
            Self::IntSlice => FlagKind::IntSlice,
        }
    }
}

/// A constraint over flags of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum GroupDefinition {
    RequiredTogether(Vec<String>),
    OneRequired(Vec<String>),
    MutuallyExclusive(Vec<String>),
    /// `others` may only be set when `special` is.
    DependsOn { special: String, others: Vec<String> },
    /// Setting `special` requires at least one of `others`.
    DependsOnAny { special: String, others: Vec<String> },
}

impl GroupDefinition {
    /// Every flag the group names.
    pub fn members(&self) -> Vec<&str> {
        match self {
            Self::RequiredTogether(flags) | Self::OneRequired(flags) | Self::MutuallyExclusive(flags) => {
                flags.iter().map(String::as_str).collect()
            }
            Self::DependsOn { special, others } | Self::DependsOnAny { special, others } => {
                std::iter::once(special.as_str())
                    .chain(others.iter().map(String::as_str))
                    .collect()
            }
        }
    }
}
