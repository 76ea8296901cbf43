//! Compiling definitions into command trees.

use std::collections::BTreeMap;

use command_dispatch_core::{
    Command, CommandTree, Flag, FlagError, FlagValue, Invocation, RunError, ShellCompDirective,
    fixed_completions,
};
use rayon::prelude::*;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::definition::{CommandDefinition, FlagDefinition, GroupDefinition, TreeDefinition};
use crate::error::{DefinitionError, Result, SchemaError};
use crate::validate::validate_definition;

/// Fixed choices of one flag, registered once the tree exists.
struct ChoiceRegistration {
    /// Command names below the root.
    path: Vec<String>,
    flag: String,
    choices: Vec<String>,
}

impl TreeDefinition {
    /// Validates the definition and compiles it into a [`CommandTree`].
    ///
    /// Leaf commands get a run function that prints the invocation as one
    /// line of JSON: the command path, the positional arguments, and the
    /// flags that were set. Flag choices become value completions with the
    /// `NoFileComp` directive.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] listing every validation problem,
    /// [`SchemaError::FlagDefault`] for an unparsable default, or
    /// [`SchemaError::Dispatch`] if the tree builder rejects the result.
    ///
    /// # Examples
    ///
    /// ```
    /// use command_dispatch_schema::from_yaml_str;
    ///
    /// let def = from_yaml_str(
    ///     "root:\n  use: app\n  subcommands:\n    - use: run\n      flags:\n        - name: mode\n          choices: [fast, safe]\n",
    /// )
    /// .unwrap();
    /// let tree = def.build().unwrap();
    /// assert_eq!(tree.complete(&["run", "--mode", "f"]).values(), vec!["fast"]);
    /// ```
    pub fn build(&self) -> Result<CommandTree> {
        let errors: Vec<DefinitionError> = validate_definition(self);
        if !errors.is_empty() {
            return Err(SchemaError::Invalid(errors));
        }

        let mut registrations = Vec::new();
        let mut path = vec![self.program().to_string()];
        let root = compile_command(&self.root, &mut path, &mut registrations)?;
        let tree = CommandTree::with_settings(root, self.settings.to_settings(&self.completion))?;

        register_choices(&tree, &registrations)?;

        debug!(
            program = self.program(),
            commands = tree.len(),
            choice_flags = registrations.len(),
            "compiled tree definition"
        );
        Ok(tree)
    }
}

/// Registers every choice list on the compiled tree, in parallel.
///
/// A registration whose command cannot be found is skipped with a warning.
/// Returns how many were registered.
fn register_choices(tree: &CommandTree, registrations: &[ChoiceRegistration]) -> Result<usize> {
    registrations
        .par_iter()
        .map(|registration| -> Result<usize> {
            let path: Vec<&str> = registration.path.iter().map(String::as_str).collect();
            let Some(id) = tree.lookup_path(&path) else {
                warn!(
                    command = %path.join(" "),
                    flag = %registration.flag,
                    "no command for flag choices; completion not registered"
                );
                return Ok(0);
            };
            tree.register_flag_completion(
                id,
                &registration.flag,
                fixed_completions(registration.choices.clone(), ShellCompDirective::NO_FILE_COMP),
            )?;
            Ok(1)
        })
        .try_reduce(|| 0, |a, b| Ok(a + b))
}

/// `path` holds the names from the root down to `def`.
fn compile_command(
    def: &CommandDefinition,
    path: &mut Vec<String>,
    registrations: &mut Vec<ChoiceRegistration>,
) -> Result<Command> {
    let mut cmd = Command::new(&def.use_line)
        .short(&def.short)
        .long(&def.long)
        .example(&def.example);
    for alias in &def.aliases {
        cmd = cmd.alias(alias);
    }
    if def.hidden {
        cmd = cmd.hidden();
    }
    if let Some(message) = &def.deprecated {
        cmd = cmd.deprecated(message);
    }
    if let Some(version) = &def.version {
        cmd = cmd.version(version);
    }
    if let Some(args) = &def.args {
        cmd = cmd.args(args.to_args());
    }
    if !def.valid_args.is_empty() {
        cmd = cmd.valid_args(def.valid_args.iter().map(String::as_str));
    }
    if !def.arg_aliases.is_empty() {
        cmd = cmd.arg_aliases(def.arg_aliases.iter().map(String::as_str));
    }
    if def.disable_flag_parsing {
        cmd = cmd.disable_flag_parsing();
    }

    for (flag_def, persistent) in def
        .flags
        .iter()
        .map(|f| (f, false))
        .chain(def.persistent_flags.iter().map(|f| (f, true)))
    {
        let flag = compile_flag(flag_def).map_err(|source| SchemaError::FlagDefault {
            command: path.join(" "),
            flag: flag_def.name.clone(),
            source,
        })?;
        cmd = if persistent {
            cmd.persistent_flag(flag)
        } else {
            cmd.flag(flag)
        };
        cmd = mark_flag(cmd, flag_def);
        if !flag_def.choices.is_empty() {
            registrations.push(ChoiceRegistration {
                path: path[1..].to_vec(),
                flag: flag_def.name.clone(),
                choices: flag_def.choices.clone(),
            });
        }
    }

    for group in &def.groups {
        cmd = mark_group(cmd, group);
    }

    if def.subcommands.is_empty() {
        cmd = cmd.run(print_invocation);
    }
    for sub in &def.subcommands {
        path.push(sub.name().to_string());
        let child = compile_command(sub, path, registrations);
        path.pop();
        cmd = cmd.subcommand(child?);
    }
    Ok(cmd)
}

fn compile_flag(def: &FlagDefinition) -> std::result::Result<Flag, FlagError> {
    let mut flag = Flag::new(&def.name, def.kind.to_kind(), &def.usage);
    if let Some(default) = &def.default {
        flag = flag.try_default(default)?;
    }
    if let Some(c) = def.shorthand {
        flag = flag.shorthand(c);
    }
    if let Some(value) = &def.no_opt_default {
        flag = flag.with_no_opt_default(value);
    }
    if def.hidden {
        flag = flag.hidden();
    }
    if let Some(message) = &def.deprecated {
        flag = flag.deprecated(message);
    }
    Ok(flag)
}

fn mark_flag(mut cmd: Command, def: &FlagDefinition) -> Command {
    if def.required {
        cmd = cmd.mark_flag_required(&def.name);
    }
    if !def.extensions.is_empty() {
        let extensions: Vec<&str> = def.extensions.iter().map(String::as_str).collect();
        cmd = cmd.mark_flag_filename(&def.name, &extensions);
    }
    match def.dirs.as_deref() {
        Some("") => cmd.mark_flag_dirname(&def.name),
        Some(dir) => cmd.mark_flag_subdir(&def.name, dir),
        None => cmd,
    }
}

fn mark_group(cmd: Command, group: &GroupDefinition) -> Command {
    fn refs(flags: &[String]) -> Vec<&str> {
        flags.iter().map(String::as_str).collect()
    }
    match group {
        GroupDefinition::RequiredTogether(flags) => cmd.mark_flags_required_together(&refs(flags)),
        GroupDefinition::OneRequired(flags) => cmd.mark_flags_one_required(&refs(flags)),
        GroupDefinition::MutuallyExclusive(flags) => cmd.mark_flags_mutually_exclusive(&refs(flags)),
        GroupDefinition::DependsOn { special, others } => {
            cmd.mark_flags_depend_on(special, &refs(others))
        }
        GroupDefinition::DependsOnAny { special, others } => {
            cmd.mark_flag_depends_on_any(special, &refs(others))
        }
    }
}

fn print_invocation(inv: &mut Invocation<'_>) -> std::result::Result<(), RunError> {
    let line = serde_json::to_string(&invocation_json(inv))?;
    writeln!(inv.out(), "{line}")?;
    Ok(())
}

/// `{"command": ..., "args": [...], "flags": {...}}` with changed flags only.
fn invocation_json(inv: &Invocation<'_>) -> Value {
    let parsed = inv.flags();
    let flags: BTreeMap<&str, Value> = parsed
        .changed_names()
        .filter_map(|name| parsed.value(name).map(|value| (name, flag_value_json(value))))
        .collect();
    json!({
        "command": inv.tree().command_path(inv.command()),
        "args": inv.args(),
        "flags": flags,
    })
}

fn flag_value_json(value: &FlagValue) -> Value {
    match value {
        FlagValue::Bool(b) => Value::from(*b),
        FlagValue::Count(n) => Value::from(*n),
        FlagValue::String(s) => Value::from(s.as_str()),
        FlagValue::Int(n) => Value::from(*n),
        FlagValue::Float(f) => Value::from(*f),
        FlagValue::Strings(v) => Value::from(v.clone()),
        FlagValue::Ints(v) => Value::from(v.clone()),
    }
}
