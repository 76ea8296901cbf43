//! Completion engine.
//!
//! One request is one call to [`CommandTree::complete_with_env`]: the last
//! argument is the token being completed, everything before it has been
//! typed already. The engine resolves the target command, classifies the
//! token as a flag name, a flag value or a positional, and asks the matching
//! source for candidates. Failures never escape: they become the
//! [`ShellCompDirective::ERROR`] bit with an empty list.

use std::collections::HashSet;

use tracing::debug;

use crate::completion::{Completion, CompletionContext, ShellCompDirective};
use crate::env::{EnvSource, ProcessEnv};
use crate::flag::FlagAnnotation;
use crate::flag_groups::{GroupAdjustments, completion_adjustments};
use crate::parse::{FlagSet, ParsedFlags, VisibleFlag, parse_flags};
use crate::tree::{CommandId, CommandNode, CommandTree, is_flag_arg};

/// Result of one completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// Command completion resolved to, if resolution succeeded.
    pub command: Option<CommandId>,
    pub completions: Vec<Completion>,
    pub directive: ShellCompDirective,
}

impl CompletionOutcome {
    fn error(command: Option<CommandId>) -> Self {
        Self {
            command,
            completions: Vec::new(),
            directive: ShellCompDirective::ERROR,
        }
    }

    /// Candidate values, without descriptions or active help.
    pub fn values(&self) -> Vec<&str> {
        self.completions
            .iter()
            .filter(|c| !c.is_active_help())
            .map(Completion::value)
            .collect()
    }
}

/// The token under completion, once a possible flag-value context has been
/// split off.
struct Target<'a> {
    /// Flag whose value is being completed.
    flag: Option<VisibleFlag<'a>>,
    args: Vec<String>,
    to_complete: String,
    /// Name of a flag in value position that the command does not know.
    unknown_flag: Option<String>,
}

impl CommandTree {
    /// Completes `args` reading configuration from the process environment.
    pub fn complete<S: AsRef<str>>(&self, args: &[S]) -> CompletionOutcome {
        self.complete_with_env(args, &ProcessEnv)
    }

    /// Completes the last element of `args`; an empty `args` completes an
    /// empty token at the root.
    pub fn complete_with_env<S: AsRef<str>>(&self, args: &[S], env: &dyn EnvSource) -> CompletionOutcome {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        let (to_complete, typed) = match args.split_last() {
            Some((last, typed)) => (last.clone(), typed.to_vec()),
            None => (String::new(), Vec::new()),
        };

        let (id, resolved_args) = match self.resolve(&typed) {
            Ok(found) => found,
            Err(err) => {
                debug!(%err, ?typed, "unable to find a command for completion");
                return CompletionOutcome::error(None);
            }
        };

        let outcome = self.complete_command(id, resolved_args, to_complete, env);
        debug!(
            command = %self.command_path(id),
            candidates = outcome.completions.len(),
            directive = %outcome.directive,
            "completed"
        );
        outcome
    }

    fn complete_command(
        &self,
        id: CommandId,
        args: Vec<String>,
        to_complete: String,
        env: &dyn EnvSource,
    ) -> CompletionOutcome {
        let node = self.command(id);
        let set = self.visible_flags(id);
        let target = classify(&set, node, args, to_complete);
        let to_complete = target.to_complete.as_str();

        let parsed = if node.disables_flag_parsing() {
            ParsedFlags::unparsed(&set, target.args.clone())
        } else {
            match parse_flags(&set, &target.args, node.is_interspersed()) {
                Ok(parsed) => parsed,
                Err(err) => {
                    debug!(%err, "error while parsing flags for completion");
                    return CompletionOutcome::error(Some(id));
                }
            }
        };

        // After `--`, or past the first positional of a non-interspersed
        // command, every token is a positional.
        let flag_completion = node.disables_flag_parsing()
            || !(parsed.dash_at().is_some() || (!node.is_interspersed() && !parsed.args().is_empty()));

        if let Some(name) = &target.unknown_flag {
            if flag_completion {
                debug!(flag = %name, "subcommand does not support flag");
                return CompletionOutcome::error(Some(id));
            }
        }

        if terminal_flag_present(&set, &parsed) {
            return finish(id, Vec::new(), ShellCompDirective::NO_FILE_COMP);
        }

        let final_args = if node.disables_flag_parsing() {
            target.args.clone()
        } else {
            parsed.args().to_vec()
        };

        let value_flag = target.flag.filter(|_| flag_completion);
        if let Some(entry) = value_flag {
            if let Some(outcome) = annotation_completion(id, entry) {
                return outcome;
            }
        }

        let adjustments = completion_adjustments(self, id, &parsed);
        let mut completions = Vec::new();
        let mut directive = ShellCompDirective::DEFAULT;
        let mut closed_set = false;

        if target.flag.is_none()
            && to_complete.starts_with('-')
            && !to_complete.contains('=')
            && flag_completion
        {
            completions = required_flag_completions(&set, &parsed, &adjustments, to_complete);
            if completions.is_empty() {
                for entry in set.inherited().into_iter().chain(set.non_inherited()) {
                    if !parsed.changed(entry.name()) || entry.flag.kind().is_repeatable() {
                        completions.extend(flag_name_completions(entry, &adjustments, to_complete));
                    }
                }
            }

            directive = ShellCompDirective::NO_FILE_COMP;
            if completions.len() == 1 && completions[0].value().ends_with('=') {
                directive = ShellCompDirective::NO_SPACE;
            }

            // A command that parses its own flags may still complete them
            // through its valid-args function.
            if !node.disables_flag_parsing() {
                return finish(id, completions, directive);
            }
        } else if target.flag.is_none() {
            let local_flag_set = !self.settings().traverse_children
                && set
                    .local_non_persistent()
                    .iter()
                    .any(|entry| parsed.changed(entry.name()));

            if final_args.is_empty() && !local_flag_set {
                for child in self.children(id) {
                    if !self.is_available(child) && self.help_command() != Some(child) {
                        continue;
                    }
                    if let Some(candidate) = subcommand_completion(self.command(child), to_complete) {
                        completions.push(candidate);
                    }
                    directive = ShellCompDirective::NO_FILE_COMP;
                    closed_set = true;
                }
            }

            completions.extend(required_flag_completions(&set, &parsed, &adjustments, to_complete));

            if !node.valid_args().is_empty() {
                if final_args.is_empty() && !saturated(node, &final_args) {
                    completions.extend(
                        node.valid_args()
                            .iter()
                            .map(|entry| Completion::parse(entry))
                            .filter(|c| c.value().starts_with(to_complete)),
                    );
                    directive = ShellCompDirective::NO_FILE_COMP;

                    if completions.is_empty() {
                        completions.extend(
                            node.arg_aliases()
                                .iter()
                                .filter(|alias| alias.starts_with(to_complete))
                                .map(Completion::new),
                        );
                    }
                }
                if saturated(node, &final_args) {
                    directive |= ShellCompDirective::NO_FILE_COMP;
                }
                return finish(id, completions, directive);
            }
        }

        let ctx = CompletionContext::new(self, id, &parsed, env);
        match value_flag {
            Some(entry) => {
                if let Some(f) = self.command(entry.owner).flag_completion(entry.name()) {
                    let (found, returned) = f.complete(&ctx, &final_args, to_complete);
                    completions.extend(found);
                    directive = returned;
                }
            }
            None if saturated(node, &final_args) => {
                directive |= ShellCompDirective::NO_FILE_COMP;
            }
            None => {
                if let Some(f) = node.valid_args_function() {
                    let (found, returned) = f.complete(&ctx, &final_args, to_complete);
                    completions.extend(found);
                    directive = if closed_set {
                        returned | ShellCompDirective::NO_FILE_COMP
                    } else {
                        returned
                    };
                }
            }
        }

        finish(id, completions, directive)
    }
}

/// Splits a flag-value context off the token under completion.
///
/// `--flag=val` and `-f=val` complete `val` for the flag (the last
/// shorthand of a combined group); a previous token `--flag` or `-f`
/// without `=` completes the current token as its value, unless the flag
/// takes no value.
fn classify<'a>(
    set: &FlagSet<'a>,
    node: &CommandNode,
    args: Vec<String>,
    to_complete: String,
) -> Target<'a> {
    let plain = |args: Vec<String>, to_complete: String| Target {
        flag: None,
        args,
        to_complete,
        unknown_flag: None,
    };

    if node.disables_flag_parsing() {
        return plain(args, to_complete);
    }

    let original = to_complete.clone();
    let mut to_complete = to_complete;
    let mut trimmed = args.clone();
    let mut flag_name = String::new();
    let mut with_equal = false;

    if to_complete.starts_with('-') {
        let Some(index) = to_complete.find('=') else {
            return plain(args, to_complete);
        };
        let head = &to_complete[..index];
        flag_name = match head.strip_prefix("--") {
            Some(long) => long.to_string(),
            None => head.chars().last().map(String::from).unwrap_or_default(),
        };
        to_complete = to_complete[index + 1..].to_string();
        with_equal = true;
    }

    if flag_name.is_empty() {
        if let Some(prev) = args.last().filter(|p| is_flag_arg(p) && !p.contains('=')) {
            flag_name = match prev.strip_prefix("--") {
                Some(long) => long.to_string(),
                None => prev.chars().last().map(String::from).unwrap_or_default(),
            };
            trimmed.pop();
        }
    }

    if flag_name.is_empty() {
        return plain(trimmed, to_complete);
    }

    let Some(entry) = lookup_flag(set, &flag_name) else {
        return Target {
            flag: None,
            args,
            to_complete: original,
            unknown_flag: Some(flag_name),
        };
    };

    if !with_equal && entry.flag.no_opt_default().is_some() {
        return plain(args, to_complete);
    }

    Target {
        flag: Some(entry),
        args: trimmed,
        to_complete,
        unknown_flag: None,
    }
}

/// A one-character name is tried as a shorthand first.
fn lookup_flag<'a>(set: &FlagSet<'a>, name: &str) -> Option<VisibleFlag<'a>> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if let Some(entry) = set.lookup_shorthand(c) {
            return Some(entry);
        }
    }
    set.lookup(name)
}

/// `--help` or `--version` added by the framework and present on the line.
fn terminal_flag_present(set: &FlagSet<'_>, parsed: &ParsedFlags) -> bool {
    ["version", "help"].iter().any(|name| {
        set.lookup(name)
            .is_some_and(|entry| entry.flag.is_set_by_framework() && parsed.changed(name))
    })
}

fn annotation_completion(id: CommandId, entry: VisibleFlag<'_>) -> Option<CompletionOutcome> {
    let annotations = entry.flag.annotations();

    let extensions = annotations.iter().find_map(|a| match a {
        FlagAnnotation::FilenameExtensions(exts) if !exts.is_empty() => Some(exts),
        _ => None,
    });
    if let Some(exts) = extensions {
        let completions = exts.iter().map(Completion::new).collect();
        return Some(finish(id, completions, ShellCompDirective::FILTER_FILE_EXT));
    }

    let dirs = annotations.iter().find_map(|a| match a {
        FlagAnnotation::SubdirsInDir(dirs) => Some(dirs),
        _ => None,
    })?;
    let completions = match dirs.as_slice() {
        [dir] => vec![Completion::new(dir)],
        _ => Vec::new(),
    };
    Some(finish(id, completions, ShellCompDirective::FILTER_DIRS))
}

/// `--name` and `-n` forms of one flag that start with `prefix`.
fn flag_name_completions(
    entry: VisibleFlag<'_>,
    adjustments: &GroupAdjustments,
    prefix: &str,
) -> Vec<Completion> {
    let flag = entry.flag;
    if flag.is_non_completable() || adjustments.hidden.contains(flag.name()) {
        return Vec::new();
    }

    let mut out = Vec::new();
    let long = format!("--{}", flag.name());
    if long.starts_with(prefix) {
        out.push(Completion::with_description(long, flag.usage()));
    }
    if let Some(c) = flag.shorthand_char() {
        let short = format!("-{c}");
        if short.starts_with(prefix) {
            out.push(Completion::with_description(short, flag.usage()));
        }
    }
    out
}

/// Unset flags that are required or promoted by a flag group.
fn required_flag_completions(
    set: &FlagSet<'_>,
    parsed: &ParsedFlags,
    adjustments: &GroupAdjustments,
    prefix: &str,
) -> Vec<Completion> {
    set.inherited()
        .into_iter()
        .chain(set.non_inherited())
        .filter(|entry| {
            (entry.flag.is_required() || adjustments.promoted.contains(entry.name()))
                && !parsed.changed(entry.name())
        })
        .flat_map(|entry| flag_name_completions(entry, adjustments, prefix))
        .collect()
}

/// The child's name, or its first alias, when it starts with `prefix`.
fn subcommand_completion(child: &CommandNode, prefix: &str) -> Option<Completion> {
    if child.name().starts_with(prefix) {
        return Some(Completion::with_description(child.name(), child.short()));
    }
    child
        .aliases()
        .iter()
        .find(|alias| alias.starts_with(prefix))
        .map(|alias| Completion::with_description(alias.as_str(), child.short()))
}

/// `true` once the positional validator cannot accept another argument.
fn saturated(node: &CommandNode, args: &[String]) -> bool {
    node.args()
        .and_then(|validator| validator.max_args())
        .is_some_and(|max| args.len() >= max)
}

fn finish(id: CommandId, completions: Vec<Completion>, directive: ShellCompDirective) -> CompletionOutcome {
    let mut seen = HashSet::new();
    let completions = completions
        .into_iter()
        .filter(|c| c.is_active_help() || seen.insert(c.value().to_string()))
        .collect();
    CompletionOutcome {
        command: Some(id),
        completions,
        directive,
    }
}
