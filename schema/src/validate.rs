//! Structural validation of tree definitions.
//!
//! Catches naming mistakes and dangling group members up front so they are
//! reported together, with the command they belong to, instead of one at a
//! time from the tree builder.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::definition::{CommandDefinition, FlagDefinition, KindDefinition, TreeDefinition};
use crate::error::DefinitionError;

static COMMAND_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:-]*$").expect("static regex must compile")
});
static FLAG_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("static regex must compile"));

/// Validates a whole definition.
///
/// # Examples
///
/// ```
/// use command_dispatch_schema::{DefinitionError, from_yaml_str, validate_definition};
///
/// let def = from_yaml_str("root:\n  use: app\n  flags:\n    - name: \"--bad\"\n").unwrap();
/// let errors = validate_definition(&def);
/// assert!(matches!(errors[0], DefinitionError::InvalidFlagName { .. }));
/// ```
pub fn validate_definition(definition: &TreeDefinition) -> Vec<DefinitionError> {
    let mut errors = Vec::new();
    validate_command(&definition.root, "", &[], &mut errors);
    errors
}

fn validate_command<'a>(
    cmd: &'a CommandDefinition,
    parent_path: &str,
    inherited: &[&'a str],
    errors: &mut Vec<DefinitionError>,
) {
    let name = cmd.name();
    if !COMMAND_NAME_RE.is_match(name) {
        errors.push(DefinitionError::InvalidCommandName(cmd.use_line.clone()));
    }
    let path = if parent_path.is_empty() {
        name.to_string()
    } else {
        format!("{parent_path} {name}")
    };

    for flag in cmd.flags.iter().chain(&cmd.persistent_flags) {
        validate_flag(flag, &path, errors);
    }

    let mut visible: HashSet<&str> = inherited.iter().copied().collect();
    visible.extend(cmd.flags.iter().map(|f| f.name.as_str()));
    visible.extend(cmd.persistent_flags.iter().map(|f| f.name.as_str()));

    for group in &cmd.groups {
        let members = group.members();
        if members.len() < 2 {
            errors.push(DefinitionError::GroupTooSmall {
                command: path.clone(),
            });
        }
        for member in members {
            if !visible.contains(member) {
                errors.push(DefinitionError::UnknownGroupFlag {
                    command: path.clone(),
                    flag: member.to_string(),
                });
            }
        }
    }

    let mut passed_down: Vec<&str> = inherited.to_vec();
    passed_down.extend(cmd.persistent_flags.iter().map(|f| f.name.as_str()));

    let mut seen = HashSet::new();
    for sub in &cmd.subcommands {
        for key in std::iter::once(sub.name()).chain(sub.aliases.iter().map(String::as_str)) {
            if !seen.insert(key) {
                errors.push(DefinitionError::DuplicateSubcommand {
                    parent: path.clone(),
                    name: key.to_string(),
                });
            }
        }
        validate_command(sub, &path, &passed_down, errors);
    }
}

fn validate_flag(flag: &FlagDefinition, command: &str, errors: &mut Vec<DefinitionError>) {
    if !FLAG_NAME_RE.is_match(&flag.name) {
        errors.push(DefinitionError::InvalidFlagName {
            command: command.to_string(),
            flag: flag.name.clone(),
        });
    }
    if let Some(shorthand) = flag.shorthand {
        if !shorthand.is_ascii_alphanumeric() {
            errors.push(DefinitionError::InvalidShorthand {
                command: command.to_string(),
                flag: flag.name.clone(),
                shorthand,
            });
        }
    }
    let takes_value = !matches!(flag.kind, KindDefinition::Bool | KindDefinition::Count);
    if !flag.choices.is_empty() && !takes_value {
        errors.push(DefinitionError::ChoicesWithoutValue {
            command: command.to_string(),
            flag: flag.name.clone(),
        });
    }
}
