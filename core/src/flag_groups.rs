//! Flag group validation.
//!
//! Groups are not stored anywhere: they are derived on demand from the
//! annotations of the flags a command can see. A group only applies when
//! every one of its members is visible to the command; otherwise it is
//! skipped entirely.
//!
//! Execution calls [`validate_required_flags`] and [`validate_flag_groups`].
//! Completion calls [`completion_adjustments`] to learn which flags to
//! promote into the suggestion list and which to hide.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{DispatchError, FlagGroupError};
use crate::flag::{FlagAnnotation, depends_key};
use crate::parse::{FlagSet, ParsedFlags};
use crate::tree::{CommandId, CommandTree};

/// Flags completion should surface without a `-` prefix, and flags it must
/// not suggest at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupAdjustments {
    pub promoted: BTreeSet<String>,
    pub hidden: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Dependency {
    special: String,
    others: Vec<String>,
}

/// Applicable groups of one command, keyed by group key so that iteration
/// is in sorted key order.
#[derive(Debug, Default)]
struct Groups {
    required_together: BTreeMap<String, Vec<String>>,
    one_required: BTreeMap<String, Vec<String>>,
    mutually_exclusive: BTreeMap<String, Vec<String>>,
    depends_on: BTreeMap<String, Dependency>,
    depends_on_any: BTreeMap<String, Dependency>,
}

impl Groups {
    fn collect(set: &FlagSet<'_>) -> Self {
        let mut groups = Self::default();
        for entry in set.iter() {
            for annotation in entry.flag.annotations() {
                match annotation {
                    FlagAnnotation::RequiredTogether(key) => {
                        insert_members(&mut groups.required_together, set, key);
                    }
                    FlagAnnotation::OneRequired(key) => {
                        insert_members(&mut groups.one_required, set, key);
                    }
                    FlagAnnotation::MutuallyExclusive(key) => {
                        insert_members(&mut groups.mutually_exclusive, set, key);
                    }
                    FlagAnnotation::DependsOn { special, others } => {
                        insert_dependency(&mut groups.depends_on, set, special, others);
                    }
                    FlagAnnotation::DependsOnAny { special, others } => {
                        insert_dependency(&mut groups.depends_on_any, set, special, others);
                    }
                    _ => {}
                }
            }
        }
        groups
    }
}

fn all_visible<'s>(set: &FlagSet<'_>, mut names: impl Iterator<Item = &'s str>) -> bool {
    names.all(|name| set.lookup(name).is_some())
}

fn insert_members(map: &mut BTreeMap<String, Vec<String>>, set: &FlagSet<'_>, key: &str) {
    if map.contains_key(key) {
        return;
    }
    let members: Vec<String> = key.split(' ').map(str::to_string).collect();
    if all_visible(set, members.iter().map(String::as_str)) {
        map.insert(key.to_string(), members);
    }
}

fn insert_dependency(
    map: &mut BTreeMap<String, Dependency>,
    set: &FlagSet<'_>,
    special: &str,
    others: &[String],
) {
    let key = depends_key(special, others);
    if map.contains_key(&key) {
        return;
    }
    let names = std::iter::once(special).chain(others.iter().map(String::as_str));
    if all_visible(set, names) {
        map.insert(
            key,
            Dependency {
                special: special.to_string(),
                others: others.to_vec(),
            },
        );
    }
}

fn partition<'m>(members: &'m [String], parsed: &ParsedFlags) -> (Vec<&'m str>, Vec<&'m str>) {
    let (set, unset): (Vec<&str>, Vec<&str>) = members
        .iter()
        .map(String::as_str)
        .partition(|name| parsed.changed(name));
    (set, unset)
}

fn sorted(names: Vec<&str>) -> Vec<String> {
    let mut out: Vec<String> = names.into_iter().map(str::to_string).collect();
    out.sort();
    out
}

/// Checks every flag group applicable to `id`.
///
/// Families are checked in order: required-together, one-required,
/// mutually-exclusive, depends-on, depends-on-any. Within a family groups
/// are scanned by sorted key and the first violation is returned.
///
/// # Errors
///
/// Returns the first violated group as a [`FlagGroupError`].
pub fn validate_flag_groups(
    tree: &CommandTree,
    id: CommandId,
    parsed: &ParsedFlags,
) -> Result<(), FlagGroupError> {
    if tree.command(id).disables_flag_parsing() {
        return Ok(());
    }
    let groups = Groups::collect(&tree.visible_flags(id));

    for (key, members) in &groups.required_together {
        let (set, unset) = partition(members, parsed);
        if !set.is_empty() && !unset.is_empty() {
            return Err(FlagGroupError::RequiredTogether {
                group: key.clone(),
                missing: sorted(unset),
            });
        }
    }

    for (key, members) in &groups.one_required {
        let (set, _) = partition(members, parsed);
        if set.is_empty() {
            return Err(FlagGroupError::OneRequired { group: key.clone() });
        }
    }

    for (key, members) in &groups.mutually_exclusive {
        let (set, _) = partition(members, parsed);
        if set.len() > 1 {
            return Err(FlagGroupError::MutuallyExclusive {
                group: key.clone(),
                set: sorted(set),
            });
        }
    }

    for dependency in groups.depends_on.values() {
        if parsed.changed(&dependency.special) {
            continue;
        }
        let (set, _) = partition(&dependency.others, parsed);
        if !set.is_empty() {
            return Err(FlagGroupError::DependsOn {
                special: dependency.special.clone(),
                others: dependency.others.clone(),
                set: sorted(set),
            });
        }
    }

    for dependency in groups.depends_on_any.values() {
        if !parsed.changed(&dependency.special) {
            continue;
        }
        let (set, _) = partition(&dependency.others, parsed);
        if set.is_empty() {
            return Err(FlagGroupError::DependsOnAny {
                special: dependency.special.clone(),
                others: dependency.others.clone(),
            });
        }
    }

    Ok(())
}

/// Checks that every flag marked required was supplied.
///
/// # Errors
///
/// Returns [`DispatchError::RequiredFlagsNotSet`] naming the missing flags
/// in sorted order.
pub fn validate_required_flags(
    tree: &CommandTree,
    id: CommandId,
    parsed: &ParsedFlags,
) -> Result<(), DispatchError> {
    if tree.command(id).disables_flag_parsing() {
        return Ok(());
    }
    let missing: Vec<String> = tree
        .visible_flags(id)
        .sorted()
        .into_iter()
        .filter(|entry| entry.flag.is_required() && !parsed.changed(entry.name()))
        .map(|entry| entry.name().to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DispatchError::RequiredFlagsNotSet(missing))
    }
}

/// Promotions and suppressions completion applies for the flags already on
/// the command line.
pub fn completion_adjustments(
    tree: &CommandTree,
    id: CommandId,
    parsed: &ParsedFlags,
) -> GroupAdjustments {
    let set = tree.visible_flags(id);
    let groups = Groups::collect(&set);
    let mut adjustments = GroupAdjustments::default();

    for members in groups.required_together.values() {
        let (set_members, unset) = partition(members, parsed);
        if !set_members.is_empty() {
            adjustments
                .promoted
                .extend(unset.into_iter().map(str::to_string));
        }
    }

    for members in groups.one_required.values() {
        let (set_members, _) = partition(members, parsed);
        if set_members.is_empty() {
            adjustments.promoted.extend(members.iter().cloned());
        }
    }

    for members in groups.mutually_exclusive.values() {
        let (set_members, _) = partition(members, parsed);
        if set_members.is_empty() {
            continue;
        }
        for name in members {
            if set_members.contains(&name.as_str()) {
                continue;
            }
            let repeatable = set
                .lookup(name)
                .is_some_and(|entry| entry.flag.kind().is_repeatable());
            if !repeatable {
                adjustments.hidden.insert(name.clone());
            }
        }
    }

    adjustments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::flag::Flag;
    use crate::parse::parse_flags;

    fn tree() -> CommandTree {
        let root = Command::new("app")
            .flag(Flag::bool("a", ""))
            .flag(Flag::bool("b", ""))
            .flag(Flag::bool("c", ""))
            .flag(Flag::string("json", "", ""))
            .flag(Flag::string("yaml", "", ""))
            .flag(Flag::string_slice("tag", &[], ""))
            .flag(Flag::bool("tls", ""))
            .flag(Flag::string("cert", "", ""))
            .flag(Flag::string("key", "", ""))
            .mark_flags_required_together(&["c", "a", "b"])
            .mark_flags_mutually_exclusive(&["json", "yaml", "tag"])
            .mark_flags_depend_on("tls", &["cert", "key"]);
        CommandTree::new(root).unwrap()
    }

    fn parse(tree: &CommandTree, args: &[&str]) -> ParsedFlags {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        parse_flags(&tree.visible_flags(tree.root()), &args, true).unwrap()
    }

    #[test]
    fn test_required_together_reports_sorted_missing() {
        let t = tree();
        let err = validate_flag_groups(&t, t.root(), &parse(&t, &["--c"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "if any flags in the group [c a b] are set they must all be set; missing [a b]"
        );
        assert!(validate_flag_groups(&t, t.root(), &parse(&t, &["--a", "--b", "--c"])).is_ok());
        assert!(validate_flag_groups(&t, t.root(), &parse(&t, &[])).is_ok());
    }

    #[test]
    fn test_mutually_exclusive_reports_sorted_set() {
        let t = tree();
        let err = validate_flag_groups(&t, t.root(), &parse(&t, &["--yaml=y", "--json=j"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "if any flags in the group [json yaml tag] are set none of the others can be; [json yaml] were all set"
        );
    }

    #[test]
    fn test_depends_on() {
        let t = tree();
        let err = validate_flag_groups(&t, t.root(), &parse(&t, &["--key=k"])).unwrap_err();
        assert!(matches!(err, FlagGroupError::DependsOn { ref set, .. } if set == &["key"]));
        assert!(validate_flag_groups(&t, t.root(), &parse(&t, &["--tls", "--key=k"])).is_ok());
        assert!(validate_flag_groups(&t, t.root(), &parse(&t, &["--tls"])).is_ok());
    }

    #[test]
    fn test_depends_on_any_and_one_required() {
        let root = Command::new("app")
            .flag(Flag::bool("export", ""))
            .flag(Flag::string("to-file", "", ""))
            .flag(Flag::string("to-url", "", ""))
            .mark_flag_depends_on_any("export", &["to-file", "to-url"])
            .mark_flags_one_required(&["to-file", "to-url"]);
        let t = CommandTree::new(root).unwrap();

        let err = validate_flag_groups(&t, t.root(), &parse(&t, &[])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "at least one of the flags in the group [to-file to-url] is required"
        );
        let err = validate_flag_groups(&t, t.root(), &parse(&t, &["--export"]))
            .unwrap_err();
        assert!(matches!(err, FlagGroupError::OneRequired { .. }));
        assert!(validate_flag_groups(&t, t.root(), &parse(&t, &["--export", "--to-url=u"])).is_ok());
    }

    #[test]
    fn test_depends_on_any_alone() {
        let root = Command::new("app")
            .flag(Flag::bool("export", ""))
            .flag(Flag::string("to-file", "", ""))
            .flag(Flag::string("to-url", "", ""))
            .mark_flag_depends_on_any("export", &["to-file", "to-url"]);
        let t = CommandTree::new(root).unwrap();

        assert!(validate_flag_groups(&t, t.root(), &parse(&t, &[])).is_ok());
        assert!(validate_flag_groups(&t, t.root(), &parse(&t, &["--to-file=f"])).is_ok());
        let err = validate_flag_groups(&t, t.root(), &parse(&t, &["--export"])).unwrap_err();
        assert_eq!(
            err,
            FlagGroupError::DependsOnAny {
                special: "export".into(),
                others: vec!["to-file".into(), "to-url".into()],
            }
        );
        assert_eq!(
            err.to_string(),
            "flag [export] requires at least one of the flags in the group [to-file to-url] to be set"
        );
        assert!(validate_flag_groups(&t, t.root(), &parse(&t, &["--export", "--to-file=f"])).is_ok());
    }

    #[test]
    fn test_group_skipped_unless_all_members_visible() {
        let root = Command::new("app")
            .persistent_flag(Flag::bool("a", ""))
            .subcommand(
                Command::new("sub")
                    .flag(Flag::bool("b", ""))
                    .mark_flags_required_together(&["a", "b"]),
            );
        let t = CommandTree::new(root).unwrap();
        // root sees "a" with the group annotation but not "b"
        let parsed = parse(&t, &["--a"]);
        assert!(validate_flag_groups(&t, t.root(), &parsed).is_ok());

        let sub = t.lookup_path(&["sub"]).unwrap();
        let args = vec!["--a".to_string()];
        let parsed = parse_flags(&t.visible_flags(sub), &args, true).unwrap();
        assert!(validate_flag_groups(&t, sub, &parsed).is_err());
    }

    #[test]
    fn test_required_flags() {
        let root = Command::new("app")
            .flag(Flag::string("zone", "", ""))
            .flag(Flag::string("token", "", ""))
            .mark_flag_required("zone")
            .mark_flag_required("token");
        let t = CommandTree::new(root).unwrap();
        let err = validate_required_flags(&t, t.root(), &parse(&t, &[])).unwrap_err();
        assert_eq!(err.to_string(), r#"required flag(s) "token", "zone" not set"#);
        assert!(validate_required_flags(&t, t.root(), &parse(&t, &["--zone=z", "--token=t"])).is_ok());
    }

    #[test]
    fn test_completion_adjustments() {
        let t = tree();
        let adj = completion_adjustments(&t, t.root(), &parse(&t, &["--a", "--json=x", "--cert=c"]));
        let promoted: Vec<&str> = adj.promoted.iter().map(String::as_str).collect();
        // depends-on groups never promote
        assert_eq!(promoted, vec!["b", "c"]);
        // tag is a slice and stays suggested
        let hidden: Vec<&str> = adj.hidden.iter().map(String::as_str).collect();
        assert_eq!(hidden, vec!["yaml"]);

        let none = completion_adjustments(&t, t.root(), &parse(&t, &[]));
        assert_eq!(none, GroupAdjustments::default());
    }
}
