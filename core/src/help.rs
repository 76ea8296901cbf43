//! Help text and the implicit `help` command.

use std::fmt::Write as _;

use crate::command::{Command, Invocation, RunError};
use crate::completion::{Completion, CompletionContext, CompletionResult, ShellCompDirective};
use crate::error::DispatchError;
use crate::flag::FlagKind;
use crate::parse::VisibleFlag;
use crate::tree::{CommandId, CommandTree};

/// Name of the implicit help command.
pub const HELP_COMMAND: &str = "help";

/// Narrowest name column in the command listing.
const MIN_NAME_PADDING: usize = 11;

pub(crate) fn help_command() -> Command {
    Command::new("help [command]")
        .short("Help about any command")
        .long(
            "Help provides help for any command in the application.\n\
             Simply type the program name followed by help [path to command] for full details.",
        )
        .valid_args_function(complete_help_topics)
        .run(run_help)
}

fn run_help(inv: &mut Invocation<'_>) -> Result<(), RunError> {
    let tree = inv.tree();
    let (target, _) = tree
        .find(inv.args())
        .map_err(|_| DispatchError::UnknownHelpTopic(inv.args().join(" ")))?;
    let text = render_help(tree, target);
    inv.out().write_all(text.as_bytes())?;
    Ok(())
}

fn complete_help_topics(
    ctx: &CompletionContext<'_>,
    args: &[String],
    to_complete: &str,
) -> CompletionResult {
    let tree = ctx.tree();
    let Ok((parent, _)) = tree.find(args) else {
        return (Vec::new(), ShellCompDirective::NO_FILE_COMP);
    };
    let completions = listed_children(tree, parent)
        .into_iter()
        .map(|child| tree.command(child))
        .filter(|node| node.name().starts_with(to_complete))
        .map(|node| Completion::with_description(node.name(), node.short()))
        .collect();
    (completions, ShellCompDirective::NO_FILE_COMP)
}

/// Children shown in help listings: available ones plus the help command.
fn listed_children(tree: &CommandTree, id: CommandId) -> Vec<CommandId> {
    tree.children(id)
        .into_iter()
        .filter(|&child| tree.is_available(child) || tree.help_command() == Some(child))
        .collect()
}

/// Full help for a command: its long (or short) text followed by usage.
pub fn render_help(tree: &CommandTree, id: CommandId) -> String {
    let node = tree.command(id);
    let mut out = String::new();
    let summary = if node.long().is_empty() {
        node.short()
    } else {
        node.long()
    };
    if !summary.is_empty() {
        out.push_str(summary.trim_end());
        out.push_str("\n\n");
    }
    if node.is_runnable() || tree.has_subcommands(id) {
        out.push_str(&render_usage(tree, id));
    }
    out
}

/// The `Usage:` block of a command.
pub fn render_usage(tree: &CommandTree, id: CommandId) -> String {
    let node = tree.command(id);
    let path = tree.command_path(id);
    let with_subcommands = tree.has_available_subcommands(id);
    let mut out = String::from("Usage:");

    if node.is_runnable() {
        let _ = write!(out, "\n  {}", use_line(tree, id));
    }
    if with_subcommands {
        let _ = write!(out, "\n  {path} [command]");
    }
    if !node.aliases().is_empty() {
        let _ = write!(out, "\n\nAliases:\n  {}, {}", node.name(), node.aliases().join(", "));
    }
    if !node.example().is_empty() {
        let _ = write!(out, "\n\nExamples:\n{}", node.example());
    }
    if with_subcommands {
        let listed = listed_children(tree, id);
        let padding = listed
            .iter()
            .map(|&c| tree.command(c).name().len())
            .max()
            .unwrap_or(0)
            .max(MIN_NAME_PADDING);
        out.push_str("\n\nAvailable Commands:");
        for child in listed {
            let child = tree.command(child);
            let _ = write!(out, "\n  {:<padding$} {}", child.name(), child.short());
        }
    }

    let set = tree.visible_flags(id);
    let local: Vec<VisibleFlag<'_>> = set.non_inherited().into_iter().filter(shown).collect();
    if !local.is_empty() {
        let _ = write!(out, "\n\nFlags:\n{}", flag_usages(&local).trim_end());
    }
    let inherited: Vec<VisibleFlag<'_>> = set.inherited().into_iter().filter(shown).collect();
    if !inherited.is_empty() {
        let _ = write!(out, "\n\nGlobal Flags:\n{}", flag_usages(&inherited).trim_end());
    }

    if with_subcommands {
        let _ = write!(
            out,
            "\n\nUse \"{path} [command] --help\" for more information about a command."
        );
    }
    out.push('\n');
    out
}

/// `<parent path> <use line> [flags]`.
fn use_line(tree: &CommandTree, id: CommandId) -> String {
    let node = tree.command(id);
    let mut line = match node.parent() {
        Some(parent) => format!("{} {}", tree.command_path(parent), node.use_line()),
        None => node.use_line().to_string(),
    };
    let has_flags = tree.visible_flags(id).iter().any(|entry| shown(&entry));
    if has_flags && !line.contains("[flags]") {
        line.push_str(" [flags]");
    }
    line
}

fn shown(entry: &VisibleFlag<'_>) -> bool {
    !entry.flag.is_hidden() && entry.flag.deprecation().is_none()
}

/// Renders flags as an aligned two-column table.
///
/// A name in backquotes inside the usage text replaces the type name as
/// the value placeholder.
pub fn flag_usages(flags: &[VisibleFlag<'_>]) -> String {
    let mut rows = Vec::with_capacity(flags.len());
    let mut width = 0;

    for entry in flags {
        let flag = entry.flag;
        let mut head = match flag.shorthand_char() {
            Some(c) => format!("  -{c}, --{}", flag.name()),
            None => format!("      --{}", flag.name()),
        };
        let (placeholder, mut usage) = unquote_usage(flag.usage(), flag.kind());
        if !placeholder.is_empty() {
            head.push(' ');
            head.push_str(&placeholder);
        }
        if let Some(no_opt) = flag.no_opt_default() {
            match flag.kind() {
                FlagKind::String => {
                    let _ = write!(head, "[=\"{no_opt}\"]");
                }
                FlagKind::Bool if no_opt == "true" => {}
                FlagKind::Count if no_opt == "+1" => {}
                _ => {
                    let _ = write!(head, "[={no_opt}]");
                }
            }
        }
        // Column width counts one separator past the head.
        width = width.max(head.len() + 1);

        let default = flag.default_value();
        if !default.is_zero() {
            match flag.kind() {
                FlagKind::String => {
                    let _ = write!(usage, " (default {:?})", default.to_string());
                }
                _ => {
                    let _ = write!(usage, " (default {default})");
                }
            }
        }
        rows.push((head, usage));
    }

    let mut out = String::new();
    for (head, usage) in rows {
        let spacing = " ".repeat(width - head.len());
        let continuation = format!("\n{}", " ".repeat(width + 2));
        let _ = writeln!(out, "{head} {spacing} {}", usage.replace('\n', &continuation));
    }
    out
}

/// Splits a backquoted placeholder out of `usage`.
fn unquote_usage(usage: &str, kind: FlagKind) -> (String, String) {
    if let Some(start) = usage.find('`') {
        if let Some(len) = usage[start + 1..].find('`') {
            let name = &usage[start + 1..start + 1 + len];
            let plain = format!("{}{}{}", &usage[..start], name, &usage[start + 2 + len..]);
            return (name.to_string(), plain);
        }
    }
    let placeholder = match kind {
        FlagKind::Bool => "",
        other => other.type_name(),
    };
    (placeholder.to_string(), usage.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::Flag;

    fn noop(_: &mut Invocation<'_>) -> Result<(), RunError> {
        Ok(())
    }

    fn tree() -> CommandTree {
        let root = Command::new("app")
            .short("Demo app")
            .persistent_flag(Flag::string("config", "", "config `file`"))
            .subcommand(
                Command::new("get [name]")
                    .short("Get things")
                    .alias("g")
                    .flag(Flag::string("output", "json", "output format").shorthand('o'))
                    .flag(Flag::bool("secret", "hidden").hidden())
                    .run(noop),
            )
            .subcommand(Command::new("old").short("Old").deprecated("gone").run(noop));
        CommandTree::new(root).unwrap()
    }

    #[test]
    fn test_root_help_lists_available_commands() {
        let t = tree();
        let expected = "\
Demo app

Usage:
  app [command]

Available Commands:
  completion  Generate the autocompletion script for the specified shell
  get         Get things
  help        Help about any command

Flags:
      --config file   config file
  -h, --help          help for app

Use \"app [command] --help\" for more information about a command.
";
        assert_eq!(render_help(&t, t.root()), expected);
    }

    #[test]
    fn test_leaf_help_shows_use_line_aliases_and_inherited_flags() {
        let t = tree();
        let get = t.lookup_path(&["get"]).unwrap();
        let expected = "\
Get things

Usage:
  app get [name] [flags]

Aliases:
  get, g

Flags:
  -h, --help            help for get
  -o, --output string   output format (default \"json\")

Global Flags:
      --config file   config file
";
        assert_eq!(render_help(&t, get), expected);
    }

    #[test]
    fn test_unquote_usage_falls_back_to_type_name() {
        assert_eq!(
            unquote_usage("number of `n` items", FlagKind::Int),
            ("n".to_string(), "number of n items".to_string())
        );
        assert_eq!(
            unquote_usage("plain", FlagKind::Int),
            ("int".to_string(), "plain".to_string())
        );
        assert_eq!(unquote_usage("on", FlagKind::Bool).0, "");
    }

    #[test]
    fn test_help_command_renders_target() {
        let t = tree();
        let mut out = Vec::new();
        t.execute(&["help", "get"], &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("Get things\n\nUsage:\n  app get"));
    }

    #[test]
    fn test_help_command_rejects_unknown_topic() {
        let t = tree();
        let err = t.execute(&["help", "nope"], &mut Vec::new()).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownHelpTopic(topic) if topic == "nope"));
    }
}
