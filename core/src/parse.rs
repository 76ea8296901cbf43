//! Flag parsing over the set of flags visible to one command.
//!
//! [`FlagSet`] is the view of local, persistent and inherited flags that a
//! command can see. [`parse_flags`] walks an argument vector against it and
//! produces [`ParsedFlags`]: the positional arguments, the current value of
//! every visible flag, and which flags were "changed" by the command line.
//!
//! Parsing state lives in `ParsedFlags`, never in the tree, so the same
//! argument vector always parses to the same result.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::error::FlagError;
use crate::flag::{Flag, FlagValue};
use crate::tree::CommandId;

/// A flag as seen from one command.
#[derive(Debug, Clone, Copy)]
pub struct VisibleFlag<'a> {
    pub flag: &'a Flag,
    /// Command that declared the flag.
    pub owner: CommandId,
    /// Declared as a persistent flag.
    pub persistent: bool,
    /// Declared on an ancestor and inherited.
    pub inherited: bool,
}

impl VisibleFlag<'_> {
    pub fn name(&self) -> &str {
        self.flag.name()
    }
}

/// Flags visible to one command: its local flags, its own persistent flags,
/// and the persistent flags of its ancestors (nearest declaration wins).
#[derive(Debug, Clone, Default)]
pub struct FlagSet<'a> {
    entries: Vec<VisibleFlag<'a>>,
}

impl<'a> FlagSet<'a> {
    pub(crate) fn from_entries(entries: Vec<VisibleFlag<'a>>) -> Self {
        Self { entries }
    }

    pub fn lookup(&self, name: &str) -> Option<VisibleFlag<'a>> {
        self.entries.iter().find(|e| e.flag.name() == name).copied()
    }

    pub fn lookup_shorthand(&self, shorthand: char) -> Option<VisibleFlag<'a>> {
        self.entries
            .iter()
            .find(|e| e.flag.shorthand_char() == Some(shorthand))
            .copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = VisibleFlag<'a>> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inherited flags, sorted by name.
    pub fn inherited(&self) -> Vec<VisibleFlag<'a>> {
        self.sorted_where(|e| e.inherited)
    }

    /// Flags declared on the command itself (local and persistent), sorted
    /// by name.
    pub fn non_inherited(&self) -> Vec<VisibleFlag<'a>> {
        self.sorted_where(|e| !e.inherited)
    }

    /// Local flags that descendants do not inherit, sorted by name.
    pub fn local_non_persistent(&self) -> Vec<VisibleFlag<'a>> {
        self.sorted_where(|e| !e.inherited && !e.persistent)
    }

    /// All visible flags, sorted by name.
    pub fn sorted(&self) -> Vec<VisibleFlag<'a>> {
        self.sorted_where(|_| true)
    }

    fn sorted_where(&self, keep: impl Fn(&VisibleFlag<'a>) -> bool) -> Vec<VisibleFlag<'a>> {
        let mut out: Vec<VisibleFlag<'a>> = self.entries.iter().filter(|e| keep(e)).copied().collect();
        out.sort_by(|a, b| a.flag.name().cmp(b.flag.name()));
        out
    }

    /// `true` when `--name` is declared and takes no value. Unknown names
    /// are assumed to take one.
    pub(crate) fn has_no_opt_default(&self, name: &str) -> bool {
        self.lookup(name)
            .is_some_and(|e| e.flag.no_opt_default().is_some())
    }

    /// Same as [`has_no_opt_default`](Self::has_no_opt_default) for the
    /// first character of a shorthand group.
    pub(crate) fn short_has_no_opt_default(&self, shorthands: &str) -> bool {
        shorthands
            .chars()
            .next()
            .and_then(|c| self.lookup_shorthand(c))
            .is_some_and(|e| e.flag.no_opt_default().is_some())
    }
}

/// Result of parsing an argument vector against a [`FlagSet`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFlags {
    values: BTreeMap<String, FlagValue>,
    changed: BTreeSet<String>,
    args: Vec<String>,
    dash_at: Option<usize>,
}

impl ParsedFlags {
    /// Every visible flag at its default, with `args` taken verbatim as
    /// positionals. Used for commands that disable flag parsing.
    pub fn unparsed(set: &FlagSet<'_>, args: Vec<String>) -> Self {
        let values = set
            .iter()
            .map(|e| (e.flag.name().to_string(), e.flag.default_value().clone()))
            .collect();
        Self {
            values,
            changed: BTreeSet::new(),
            args,
            dash_at: None,
        }
    }

    /// Positional arguments left after flag parsing.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn into_args(self) -> Vec<String> {
        self.args
    }

    /// Number of positionals before a bare `--`, if one was seen.
    pub fn dash_at(&self) -> Option<usize> {
        self.dash_at
    }

    /// Returns `true` if the command line assigned a value to `name`.
    pub fn changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    /// Names of changed flags in sorted order.
    pub fn changed_names(&self) -> impl Iterator<Item = &str> {
        self.changed.iter().map(String::as_str)
    }

    pub fn value(&self, name: &str) -> Option<&FlagValue> {
        self.values.get(name)
    }

    /// All visible flag values in name order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &FlagValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(FlagValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_count(&self, name: &str) -> Option<u64> {
        match self.values.get(name) {
            Some(FlagValue::Count(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(FlagValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(FlagValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(FlagValue::Float(x)) => Some(*x),
            _ => None,
        }
    }

    pub fn get_strings(&self, name: &str) -> Option<&[String]> {
        match self.values.get(name) {
            Some(FlagValue::Strings(v)) => Some(v),
            _ => None,
        }
    }

    pub fn get_ints(&self, name: &str) -> Option<&[i64]> {
        match self.values.get(name) {
            Some(FlagValue::Ints(v)) => Some(v),
            _ => None,
        }
    }

    fn assign(&mut self, flag: &Flag, raw: &str) -> Result<(), FlagError> {
        let previous = if self.changed.contains(flag.name()) {
            self.values.get(flag.name())
        } else {
            None
        };
        let value = flag.parse_value(raw, previous)?;
        if let Some(message) = flag.deprecation() {
            warn!(flag = flag.name(), "flag --{} has been deprecated, {message}", flag.name());
        }
        self.values.insert(flag.name().to_string(), value);
        self.changed.insert(flag.name().to_string());
        Ok(())
    }
}

/// Parses `args` against `set`.
///
/// Supports `--name=value`, `--name value`, bare `--name` for flags with a
/// no-option default, combined shorthands (`-abc`), `-ovalue`, `-o=value`
/// and `-o value`. A bare `--` ends flag parsing; everything after it is
/// positional. With `interspersed` off, the first positional also ends flag
/// parsing.
///
/// # Errors
///
/// Returns the first [`FlagError`] encountered.
pub fn parse_flags(
    set: &FlagSet<'_>,
    args: &[String],
    interspersed: bool,
) -> Result<ParsedFlags, FlagError> {
    let mut parsed = ParsedFlags::unparsed(set, Vec::new());
    let mut i = 0;

    while i < args.len() {
        let s = &args[i];
        i += 1;

        if s.len() < 2 || !s.starts_with('-') {
            parsed.args.push(s.clone());
            if !interspersed {
                parsed.args.extend(args[i..].iter().cloned());
                return Ok(parsed);
            }
            continue;
        }

        if let Some(body) = s.strip_prefix("--") {
            if body.is_empty() {
                parsed.dash_at = Some(parsed.args.len());
                parsed.args.extend(args[i..].iter().cloned());
                break;
            }
            i = parse_long(set, &mut parsed, s, body, args, i)?;
        } else {
            i = parse_shorthands(set, &mut parsed, &s[1..], args, i)?;
        }
    }

    Ok(parsed)
}

fn parse_long(
    set: &FlagSet<'_>,
    parsed: &mut ParsedFlags,
    token: &str,
    body: &str,
    args: &[String],
    mut next: usize,
) -> Result<usize, FlagError> {
    if body.starts_with('-') || body.starts_with('=') {
        return Err(FlagError::BadSyntax(token.to_string()));
    }

    let (name, inline) = match body.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (body, None),
    };
    let entry = set
        .lookup(name)
        .ok_or_else(|| FlagError::UnknownFlag(name.to_string()))?;

    let value = if let Some(value) = inline {
        value.to_string()
    } else if let Some(default) = entry.flag.no_opt_default() {
        default.to_string()
    } else if next < args.len() {
        next += 1;
        args[next - 1].clone()
    } else {
        return Err(FlagError::MissingArgument(token.to_string()));
    };

    parsed.assign(entry.flag, &value)?;
    Ok(next)
}

fn parse_shorthands(
    set: &FlagSet<'_>,
    parsed: &mut ParsedFlags,
    group: &str,
    args: &[String],
    mut next: usize,
) -> Result<usize, FlagError> {
    let mut shorthands = group;

    while let Some(c) = shorthands.chars().next() {
        let rest = &shorthands[c.len_utf8()..];
        let entry = set
            .lookup_shorthand(c)
            .ok_or_else(|| FlagError::UnknownShorthand {
                shorthand: c,
                group: group.to_string(),
            })?;

        let value;
        if rest.len() > 1 && rest.starts_with('=') {
            // -f=value
            value = rest[1..].to_string();
            shorthands = "";
        } else if let Some(default) = entry.flag.no_opt_default() {
            value = default.to_string();
            shorthands = rest;
        } else if !rest.is_empty() {
            // -fvalue
            value = rest.to_string();
            shorthands = "";
        } else if next < args.len() {
            value = args[next].clone();
            next += 1;
            shorthands = "";
        } else {
            return Err(FlagError::MissingShorthandArgument {
                shorthand: c,
                group: group.to_string(),
            });
        }

        parsed.assign(entry.flag, &value)?;
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::Flag;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn with_set<R>(flags: &[Flag], f: impl FnOnce(&FlagSet<'_>) -> R) -> R {
        let entries = flags
            .iter()
            .map(|flag| VisibleFlag {
                flag,
                owner: CommandId::ROOT,
                persistent: false,
                inherited: false,
            })
            .collect();
        f(&FlagSet::from_entries(entries))
    }

    fn sample_flags() -> Vec<Flag> {
        vec![
            Flag::bool("verbose", "").shorthand('v'),
            Flag::string("output", "", "").shorthand('o'),
            Flag::int("count", 1, "").shorthand('c'),
            Flag::string_slice("tag", &[], "").shorthand('t'),
        ]
    }

    #[test]
    fn test_long_forms() {
        let flags = sample_flags();
        let parsed = with_set(&flags, |set| {
            parse_flags(set, &argv(&["--output=x", "--count", "3", "--verbose", "file"]), true)
        })
        .unwrap();
        assert_eq!(parsed.get_string("output"), Some("x"));
        assert_eq!(parsed.get_int("count"), Some(3));
        assert_eq!(parsed.get_bool("verbose"), Some(true));
        assert_eq!(parsed.args(), &["file".to_string()]);
        assert!(parsed.changed("output"));
    }

    #[test]
    fn test_combined_shorthands_with_trailing_value() {
        let flags = sample_flags();
        let parsed =
            with_set(&flags, |set| parse_flags(set, &argv(&["-vofile.txt"]), true)).unwrap();
        assert_eq!(parsed.get_bool("verbose"), Some(true));
        assert_eq!(parsed.get_string("output"), Some("file.txt"));
    }

    #[test]
    fn test_shorthand_with_equals_and_separate_value() {
        let flags = sample_flags();
        let parsed =
            with_set(&flags, |set| parse_flags(set, &argv(&["-o=a", "-c", "7"]), true)).unwrap();
        assert_eq!(parsed.get_string("output"), Some("a"));
        assert_eq!(parsed.get_int("count"), Some(7));
    }

    #[test]
    fn test_defaults_are_present_but_not_changed() {
        let flags = sample_flags();
        let parsed = with_set(&flags, |set| parse_flags(set, &[], true)).unwrap();
        assert_eq!(parsed.get_int("count"), Some(1));
        assert!(!parsed.changed("count"));
    }

    #[test]
    fn test_double_dash_stops_parsing() {
        let flags = sample_flags();
        let parsed = with_set(&flags, |set| {
            parse_flags(set, &argv(&["a", "--", "--verbose", "b"]), true)
        })
        .unwrap();
        assert_eq!(parsed.args(), &argv(&["a", "--verbose", "b"])[..]);
        assert_eq!(parsed.dash_at(), Some(1));
        assert!(!parsed.changed("verbose"));
    }

    #[test]
    fn test_non_interspersed_stops_at_first_positional() {
        let flags = sample_flags();
        let parsed = with_set(&flags, |set| {
            parse_flags(set, &argv(&["-v", "run", "--output", "x"]), false)
        })
        .unwrap();
        assert_eq!(parsed.args(), &argv(&["run", "--output", "x"])[..]);
        assert!(!parsed.changed("output"));
    }

    #[test]
    fn test_slice_accumulates_across_occurrences() {
        let flags = sample_flags();
        let parsed = with_set(&flags, |set| {
            parse_flags(set, &argv(&["-t", "a,b", "--tag", "c"]), true)
        })
        .unwrap();
        assert_eq!(
            parsed.get_strings("tag"),
            Some(&argv(&["a", "b", "c"])[..])
        );
    }

    #[test]
    fn test_errors() {
        let flags = sample_flags();
        let unknown = with_set(&flags, |set| parse_flags(set, &argv(&["--nope"]), true));
        assert_eq!(unknown.unwrap_err().to_string(), "unknown flag: --nope");

        let short = with_set(&flags, |set| parse_flags(set, &argv(&["-vx"]), true));
        assert_eq!(
            short.unwrap_err().to_string(),
            "unknown shorthand flag: 'x' in -vx"
        );

        let missing = with_set(&flags, |set| parse_flags(set, &argv(&["--output"]), true));
        assert_eq!(
            missing.unwrap_err().to_string(),
            "flag needs an argument: --output"
        );

        let bad = with_set(&flags, |set| parse_flags(set, &argv(&["---x"]), true));
        assert_eq!(bad.unwrap_err().to_string(), "bad flag syntax: ---x");
    }

    #[test]
    fn test_single_dash_is_positional() {
        let flags = sample_flags();
        let parsed = with_set(&flags, |set| parse_flags(set, &argv(&["-"]), true)).unwrap();
        assert_eq!(parsed.args(), &argv(&["-"])[..]);
    }
}
