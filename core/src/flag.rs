//! Flag declarations and their typed annotations.
//!
//! A [`Flag`] belongs to exactly one command, either as a local flag or as a
//! persistent flag that descendants inherit. Annotations record flag-group
//! membership and completion filters as tagged variants; [`Flag::annotation_map`]
//! serializes them to the string keys shell tooling understands.
//!
//! # Examples
//!
//! ```
//! use command_dispatch_core::{Flag, FlagKind};
//!
//! let output = Flag::string("output", "", "Write results to FILE").shorthand('o');
//! assert_eq!(output.name(), "output");
//! assert_eq!(output.shorthand_char(), Some('o'));
//! assert_eq!(output.kind(), FlagKind::String);
//! assert!(output.no_opt_default().is_none());
//!
//! let verbose = Flag::bool("verbose", "Enable verbose output");
//! assert_eq!(verbose.no_opt_default(), Some("true"));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::error::FlagError;

/// Annotation key marking a flag as required.
pub const ANNOTATION_ONE_REQUIRED_FLAG: &str = "dispatch_annotation_one_required_flag";
/// Annotation key for required-together groups.
pub const ANNOTATION_REQUIRED_TOGETHER: &str = "dispatch_annotation_required_together";
/// Annotation key for one-required groups.
pub const ANNOTATION_ONE_REQUIRED: &str = "dispatch_annotation_one_required";
/// Annotation key for mutually-exclusive groups.
pub const ANNOTATION_MUTUALLY_EXCLUSIVE: &str = "dispatch_annotation_mutually_exclusive";
/// Annotation key for depends-on groups.
pub const ANNOTATION_DEPENDS_ON: &str = "dispatch_annotation_depends_on";
/// Annotation key for depends-on-any groups.
pub const ANNOTATION_DEPENDS_ON_ANY: &str = "dispatch_annotation_depends_on_any";
/// Annotation key for filename extension filters.
pub const ANNOTATION_FILENAME_EXTENSIONS: &str = "dispatch_annotation_filename_extensions";
/// Annotation key for directory filters.
pub const ANNOTATION_SUBDIRS_IN_DIR: &str = "dispatch_annotation_subdirs_in_dir";
/// Annotation key for flags the framework adds (`--help`, `--version`).
pub const ANNOTATION_SET_BY_FRAMEWORK: &str = "dispatch_annotation_flag_set_by_framework";

/// Declared value type of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagKind {
    Bool,
    /// Incremented on each occurrence (`-vvv`).
    Count,
    String,
    Int,
    Float,
    /// Comma-separated values, accumulated across occurrences.
    StringSlice,
    /// Values accumulated across occurrences without comma splitting.
    StringArray,
    IntSlice,
}

impl FlagKind {
    /// Type name shown in usage text.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Count => "count",
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::StringSlice => "strings",
            Self::StringArray => "stringArray",
            Self::IntSlice => "ints",
        }
    }

    /// Returns `true` for collection kinds that may be given several times.
    pub fn is_repeatable(self) -> bool {
        matches!(self, Self::StringSlice | Self::StringArray | Self::IntSlice)
    }

    fn default_no_opt(self) -> Option<&'static str> {
        match self {
            Self::Bool => Some("true"),
            Self::Count => Some("+1"),
            _ => None,
        }
    }

    fn zero(self) -> FlagValue {
        match self {
            Self::Bool => FlagValue::Bool(false),
            Self::Count => FlagValue::Count(0),
            Self::String => FlagValue::String(String::new()),
            Self::Int => FlagValue::Int(0),
            Self::Float => FlagValue::Float(0.0),
            Self::StringSlice | Self::StringArray => FlagValue::Strings(Vec::new()),
            Self::IntSlice => FlagValue::Ints(Vec::new()),
        }
    }
}

/// Current or default value of a flag.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    Bool(bool),
    Count(u64),
    String(String),
    Int(i64),
    Float(f64),
    Strings(Vec<String>),
    Ints(Vec<i64>),
}

impl FlagValue {
    /// Returns `true` for the kind's zero value, which usage text omits.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Bool(b) => !b,
            Self::Count(n) => *n == 0,
            Self::String(s) => s.is_empty(),
            Self::Int(n) => *n == 0,
            Self::Float(f) => *f == 0.0,
            Self::Strings(v) => v.is_empty(),
            Self::Ints(v) => v.is_empty(),
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Count(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Strings(v) => write!(f, "[{}]", v.join(",")),
            Self::Ints(v) => {
                let parts: Vec<String> = v.iter().map(i64::to_string).collect();
                write!(f, "[{}]", parts.join(","))
            }
        }
    }
}

/// Typed flag annotation.
///
/// Group variants carry the group key: member names joined by a single
/// space, in the order they were registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagAnnotation {
    /// The flag must be supplied.
    Required,
    RequiredTogether(String),
    OneRequired(String),
    MutuallyExclusive(String),
    /// `others` may only be set when `special` is set.
    DependsOn { special: String, others: Vec<String> },
    /// When `special` is set at least one of `others` must be set.
    DependsOnAny { special: String, others: Vec<String> },
    /// Complete values as files with these extensions.
    FilenameExtensions(Vec<String>),
    /// Complete values as directories, optionally below one subdirectory.
    SubdirsInDir(Vec<String>),
    /// Added by the framework itself.
    SetByFramework,
}

impl FlagAnnotation {
    /// String key used when the annotation is serialized.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Required => ANNOTATION_ONE_REQUIRED_FLAG,
            Self::RequiredTogether(_) => ANNOTATION_REQUIRED_TOGETHER,
            Self::OneRequired(_) => ANNOTATION_ONE_REQUIRED,
            Self::MutuallyExclusive(_) => ANNOTATION_MUTUALLY_EXCLUSIVE,
            Self::DependsOn { .. } => ANNOTATION_DEPENDS_ON,
            Self::DependsOnAny { .. } => ANNOTATION_DEPENDS_ON_ANY,
            Self::FilenameExtensions(_) => ANNOTATION_FILENAME_EXTENSIONS,
            Self::SubdirsInDir(_) => ANNOTATION_SUBDIRS_IN_DIR,
            Self::SetByFramework => ANNOTATION_SET_BY_FRAMEWORK,
        }
    }

    /// String values used when the annotation is serialized.
    pub fn values(&self) -> Vec<String> {
        match self {
            Self::Required | Self::SetByFramework => vec!["true".to_string()],
            Self::RequiredTogether(group)
            | Self::OneRequired(group)
            | Self::MutuallyExclusive(group) => vec![group.clone()],
            Self::DependsOn { special, others } | Self::DependsOnAny { special, others } => {
                vec![depends_key(special, others)]
            }
            Self::FilenameExtensions(values) | Self::SubdirsInDir(values) => values.clone(),
        }
    }
}

pub(crate) fn depends_key(special: &str, others: &[String]) -> String {
    let mut key = special.to_string();
    for other in others {
        key.push(' ');
        key.push_str(other);
    }
    key
}

/// A declared flag.
#[derive(Debug, Clone)]
pub struct Flag {
    name: String,
    shorthand: Option<char>,
    kind: FlagKind,
    default: FlagValue,
    no_opt_default: Option<String>,
    usage: String,
    hidden: bool,
    deprecated: Option<String>,
    annotations: Vec<FlagAnnotation>,
}

impl Flag {
    /// Creates a flag of `kind` with the kind's zero value as default.
    pub fn new(name: &str, kind: FlagKind, usage: &str) -> Self {
        Self {
            name: name.to_string(),
            shorthand: None,
            kind,
            default: kind.zero(),
            no_opt_default: kind.default_no_opt().map(String::from),
            usage: usage.to_string(),
            hidden: false,
            deprecated: None,
            annotations: Vec::new(),
        }
    }

    pub fn bool(name: &str, usage: &str) -> Self {
        Self::new(name, FlagKind::Bool, usage)
    }

    pub fn count(name: &str, usage: &str) -> Self {
        Self::new(name, FlagKind::Count, usage)
    }

    pub fn string(name: &str, default: &str, usage: &str) -> Self {
        let mut flag = Self::new(name, FlagKind::String, usage);
        flag.default = FlagValue::String(default.to_string());
        flag
    }

    pub fn int(name: &str, default: i64, usage: &str) -> Self {
        let mut flag = Self::new(name, FlagKind::Int, usage);
        flag.default = FlagValue::Int(default);
        flag
    }

    pub fn float(name: &str, default: f64, usage: &str) -> Self {
        let mut flag = Self::new(name, FlagKind::Float, usage);
        flag.default = FlagValue::Float(default);
        flag
    }

    pub fn string_slice(name: &str, default: &[&str], usage: &str) -> Self {
        let mut flag = Self::new(name, FlagKind::StringSlice, usage);
        flag.default = FlagValue::Strings(default.iter().map(|s| s.to_string()).collect());
        flag
    }

    pub fn string_array(name: &str, default: &[&str], usage: &str) -> Self {
        let mut flag = Self::new(name, FlagKind::StringArray, usage);
        flag.default = FlagValue::Strings(default.iter().map(|s| s.to_string()).collect());
        flag
    }

    pub fn int_slice(name: &str, default: &[i64], usage: &str) -> Self {
        let mut flag = Self::new(name, FlagKind::IntSlice, usage);
        flag.default = FlagValue::Ints(default.to_vec());
        flag
    }

    /// Replaces the default with `raw` parsed according to the flag's kind.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::InvalidValue`] when `raw` does not parse.
    pub fn try_default(mut self, raw: &str) -> Result<Self, FlagError> {
        self.default = self.parse_value(raw, None)?;
        Ok(self)
    }

    /// Sets the single-character shorthand (`-o`).
    pub fn shorthand(mut self, shorthand: char) -> Self {
        self.shorthand = Some(shorthand);
        self
    }

    /// Value assigned when the flag appears without one.
    pub fn no_opt_default(&self) -> Option<&str> {
        self.no_opt_default.as_deref()
    }

    /// Makes the value optional: a bare `--name` assigns `value`.
    pub fn with_no_opt_default(mut self, value: &str) -> Self {
        self.no_opt_default = Some(value.to_string());
        self
    }

    /// Hides the flag from help and completion.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Marks the flag deprecated; it keeps working but is no longer offered.
    pub fn deprecated(mut self, message: &str) -> Self {
        self.deprecated = Some(message.to_string());
        self
    }

    /// Attaches an annotation.
    pub fn annotate(mut self, annotation: FlagAnnotation) -> Self {
        self.push_annotation(annotation);
        self
    }

    pub(crate) fn push_annotation(&mut self, annotation: FlagAnnotation) {
        if !self.annotations.contains(&annotation) {
            self.annotations.push(annotation);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shorthand_char(&self) -> Option<char> {
        self.shorthand
    }

    pub fn kind(&self) -> FlagKind {
        self.kind
    }

    pub fn default_value(&self) -> &FlagValue {
        &self.default
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn deprecation(&self) -> Option<&str> {
        self.deprecated.as_deref()
    }

    pub fn annotations(&self) -> &[FlagAnnotation] {
        &self.annotations
    }

    /// Returns `true` when the flag carries the `Required` annotation.
    pub fn is_required(&self) -> bool {
        self.annotations.contains(&FlagAnnotation::Required)
    }

    /// Returns `true` for the framework's own `--help` / `--version` flags.
    pub fn is_set_by_framework(&self) -> bool {
        self.annotations.contains(&FlagAnnotation::SetByFramework)
    }

    /// Returns `true` when completion must not offer the flag name.
    pub fn is_non_completable(&self) -> bool {
        self.hidden || self.deprecated.is_some()
    }

    /// Serializes annotations to their string-keyed form.
    ///
    /// Several group annotations of the same family merge into one key
    /// holding one group string each.
    pub fn annotation_map(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut map: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for annotation in &self.annotations {
            map.entry(annotation.key())
                .or_default()
                .extend(annotation.values());
        }
        map
    }

    /// `-o, --output` or `--output`, as used in error messages.
    pub fn display_name(&self) -> String {
        match self.shorthand {
            Some(c) => format!("-{c}, --{}", self.name),
            None => format!("--{}", self.name),
        }
    }

    /// Parses `raw` into a value of this flag's kind.
    ///
    /// `previous` is the value from an earlier occurrence on the same
    /// command line: counts increment from it and collections append to it.
    pub fn parse_value(&self, raw: &str, previous: Option<&FlagValue>) -> Result<FlagValue, FlagError> {
        let invalid = |reason: String| FlagError::InvalidValue {
            flag: self.display_name(),
            value: raw.to_string(),
            reason,
        };
        match self.kind {
            FlagKind::Bool => parse_bool(raw)
                .map(FlagValue::Bool)
                .ok_or_else(|| invalid("expected a boolean".to_string())),
            FlagKind::Count => {
                let current = match previous {
                    Some(FlagValue::Count(n)) => *n,
                    _ => 0,
                };
                if raw == "+1" {
                    current
                        .checked_add(1)
                        .map(FlagValue::Count)
                        .ok_or_else(|| invalid("count overflows".to_string()))
                } else {
                    raw.parse::<u64>()
                        .map(FlagValue::Count)
                        .map_err(|e| invalid(e.to_string()))
                }
            }
            FlagKind::String => Ok(FlagValue::String(raw.to_string())),
            FlagKind::Int => raw
                .parse::<i64>()
                .map(FlagValue::Int)
                .map_err(|e| invalid(e.to_string())),
            FlagKind::Float => raw
                .parse::<f64>()
                .map(FlagValue::Float)
                .map_err(|e| invalid(e.to_string())),
            FlagKind::StringSlice | FlagKind::StringArray => {
                let mut values = match previous {
                    Some(FlagValue::Strings(v)) => v.clone(),
                    _ => Vec::new(),
                };
                if self.kind == FlagKind::StringSlice {
                    values.extend(raw.split(',').map(|s| s.trim().to_string()));
                } else {
                    values.push(raw.to_string());
                }
                Ok(FlagValue::Strings(values))
            }
            FlagKind::IntSlice => {
                let mut values = match previous {
                    Some(FlagValue::Ints(v)) => v.clone(),
                    _ => Vec::new(),
                };
                for part in raw.split(',') {
                    let parsed = part
                        .trim()
                        .parse::<i64>()
                        .map_err(|e| invalid(e.to_string()))?;
                    values.push(parsed);
                }
                Ok(FlagValue::Ints(values))
            }
        }
    }
}

/// Parses the boolean spellings accepted on command lines and in
/// environment variables.
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_flag_has_no_opt_default() {
        let flag = Flag::bool("verbose", "be loud");
        assert_eq!(flag.no_opt_default(), Some("true"));
        assert_eq!(flag.default_value(), &FlagValue::Bool(false));
    }

    #[test]
    fn test_count_increments_from_previous() {
        let flag = Flag::count("verbose", "");
        let first = flag.parse_value("+1", None).unwrap();
        let second = flag.parse_value("+1", Some(&first)).unwrap();
        assert_eq!(second, FlagValue::Count(2));
    }

    #[test]
    fn test_count_increment_overflow_is_an_error() {
        let flag = Flag::count("verbose", "");
        let max = flag.parse_value("18446744073709551615", None).unwrap();
        let err = flag.parse_value("+1", Some(&max)).unwrap_err();
        assert!(matches!(err, FlagError::InvalidValue { ref value, .. } if value == "+1"));
    }

    #[test]
    fn test_string_slice_splits_and_accumulates() {
        let flag = Flag::string_slice("tag", &[], "");
        let first = flag.parse_value("a,b", None).unwrap();
        let second = flag.parse_value("c", Some(&first)).unwrap();
        assert_eq!(
            second,
            FlagValue::Strings(vec!["a".into(), "b".into(), "c".into()])
        );
    }

    #[test]
    fn test_string_array_keeps_commas() {
        let flag = Flag::string_array("expr", &[], "");
        let value = flag.parse_value("a,b", None).unwrap();
        assert_eq!(value, FlagValue::Strings(vec!["a,b".into()]));
    }

    #[test]
    fn test_invalid_int_names_the_flag() {
        let flag = Flag::int("count", 0, "").shorthand('c');
        let err = flag.parse_value("abc", None).unwrap_err();
        assert!(matches!(err, FlagError::InvalidValue { ref flag, .. } if flag == "-c, --count"));
    }

    #[test]
    fn test_annotation_map_merges_groups() {
        let flag = Flag::string("a", "", "")
            .annotate(FlagAnnotation::RequiredTogether("a b".into()))
            .annotate(FlagAnnotation::RequiredTogether("a c".into()))
            .annotate(FlagAnnotation::Required);
        let map = flag.annotation_map();
        assert_eq!(
            map[ANNOTATION_REQUIRED_TOGETHER],
            vec!["a b".to_string(), "a c".to_string()]
        );
        assert_eq!(map[ANNOTATION_ONE_REQUIRED_FLAG], vec!["true".to_string()]);
    }

    #[test]
    fn test_repeatable_kinds() {
        assert!(FlagKind::StringSlice.is_repeatable());
        assert!(FlagKind::IntSlice.is_repeatable());
        assert!(!FlagKind::Count.is_repeatable());
        assert!(!FlagKind::String.is_repeatable());
    }

    #[test]
    fn test_parse_bool_spellings() {
        assert_eq!(parse_bool("T"), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }
}
