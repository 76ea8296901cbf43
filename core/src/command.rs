//! Command builder.
//!
//! A [`Command`] is plain data assembled with builder methods and handed to
//! [`CommandTree::new`](crate::CommandTree::new), which flattens it into an
//! arena, adds the framework's implicit commands and flags, and validates
//! every registration.
//!
//! # Examples
//!
//! ```
//! use std::io::Write;
//!
//! use command_dispatch_core::{Args, Command, CommandTree, Flag};
//!
//! let root = Command::new("app")
//!     .short("Example application")
//!     .persistent_flag(Flag::bool("verbose", "Verbose output").shorthand('V'))
//!     .subcommand(
//!         Command::new("get <resource>")
//!             .args(Args::Exact(1))
//!             .valid_args(["pods\tRunning pods", "nodes"])
//!             .flag(Flag::string("output", "", "Output format").shorthand('o'))
//!             .run(|inv| {
//!                 let arg = inv.args()[0].clone();
//!                 writeln!(inv.out(), "get {arg}")?;
//!                 Ok(())
//!             }),
//!     );
//!
//! let tree = CommandTree::new(root).unwrap();
//! let mut out = Vec::new();
//! tree.execute(&["get", "pods"], &mut out).unwrap();
//! assert_eq!(String::from_utf8(out).unwrap(), "get pods\n");
//! ```

use std::error::Error;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::args::Args;
use crate::completion::{CompletionContext, CompletionFn, CompletionResult};
use crate::flag::{Flag, FlagAnnotation, depends_key};
use crate::parse::ParsedFlags;
use crate::tree::{CommandId, CommandTree};

/// Error type returned by run functions.
pub type RunError = Box<dyn Error + Send + Sync>;

/// A command's action.
pub type RunFn = Arc<dyn Fn(&mut Invocation<'_>) -> Result<(), RunError> + Send + Sync>;

/// Everything a run function receives.
pub struct Invocation<'a> {
    tree: &'a CommandTree,
    command: CommandId,
    flags: ParsedFlags,
    out: &'a mut dyn Write,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        tree: &'a CommandTree,
        command: CommandId,
        flags: ParsedFlags,
        out: &'a mut dyn Write,
    ) -> Self {
        Self {
            tree,
            command,
            flags,
            out,
        }
    }

    pub fn tree(&self) -> &'a CommandTree {
        self.tree
    }

    pub fn command(&self) -> CommandId {
        self.command
    }

    /// Positional arguments left after flag parsing.
    pub fn args(&self) -> &[String] {
        self.flags.args()
    }

    pub fn flags(&self) -> &ParsedFlags {
        &self.flags
    }

    /// Output sink the command writes to.
    pub fn out(&mut self) -> &mut dyn Write {
        &mut *self.out
    }
}

/// Builder for one command and its subtree.
#[derive(Clone)]
pub struct Command {
    pub(crate) use_line: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) suggest_for: Vec<String>,
    pub(crate) short: String,
    pub(crate) long: String,
    pub(crate) example: String,
    pub(crate) version: Option<String>,
    pub(crate) hidden: bool,
    pub(crate) deprecated: Option<String>,
    pub(crate) group_id: Option<String>,
    pub(crate) args: Option<Args>,
    pub(crate) valid_args: Vec<String>,
    pub(crate) arg_aliases: Vec<String>,
    pub(crate) valid_args_function: Option<Arc<dyn CompletionFn>>,
    pub(crate) flag_completions: Vec<(String, Arc<dyn CompletionFn>)>,
    pub(crate) local_flags: Vec<Flag>,
    pub(crate) persistent_flags: Vec<Flag>,
    pub(crate) marks: Vec<(String, FlagAnnotation)>,
    pub(crate) disable_flag_parsing: bool,
    pub(crate) interspersed: bool,
    pub(crate) run: Option<RunFn>,
    pub(crate) children: Vec<Command>,
}

impl Command {
    /// Starts a command from its usage line; the first word is the name.
    pub fn new(use_line: &str) -> Self {
        Self {
            use_line: use_line.to_string(),
            aliases: Vec::new(),
            suggest_for: Vec::new(),
            short: String::new(),
            long: String::new(),
            example: String::new(),
            version: None,
            hidden: false,
            deprecated: None,
            group_id: None,
            args: None,
            valid_args: Vec::new(),
            arg_aliases: Vec::new(),
            valid_args_function: None,
            flag_completions: Vec::new(),
            local_flags: Vec::new(),
            persistent_flags: Vec::new(),
            marks: Vec::new(),
            disable_flag_parsing: false,
            interspersed: true,
            run: None,
            children: Vec::new(),
        }
    }

    /// Name taken from the usage line.
    pub fn name(&self) -> &str {
        self.use_line.split_whitespace().next().unwrap_or("")
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Extra words that suggest this command when mistyped.
    pub fn suggest_for(mut self, word: &str) -> Self {
        self.suggest_for.push(word.to_string());
        self
    }

    pub fn short(mut self, text: &str) -> Self {
        self.short = text.to_string();
        self
    }

    pub fn long(mut self, text: &str) -> Self {
        self.long = text.to_string();
        self
    }

    pub fn example(mut self, text: &str) -> Self {
        self.example = text.to_string();
        self
    }

    /// Adds a `--version` flag printing `<name> version <version>`.
    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn deprecated(mut self, message: &str) -> Self {
        self.deprecated = Some(message.to_string());
        self
    }

    pub fn group_id(mut self, id: &str) -> Self {
        self.group_id = Some(id.to_string());
        self
    }

    pub fn args(mut self, args: Args) -> Self {
        self.args = Some(args);
        self
    }

    /// Static positional values; entries may use `value\tdescription`.
    pub fn valid_args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Accepted but not suggested unless nothing in `valid_args` matches.
    pub fn arg_aliases<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arg_aliases.extend(values.into_iter().map(Into::into));
        self
    }

    /// Dynamic positional completion, used when `valid_args` is empty.
    pub fn valid_args_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&CompletionContext<'_>, &[String], &str) -> CompletionResult + Send + Sync + 'static,
    {
        self.valid_args_function = Some(Arc::new(f));
        self
    }

    pub fn flag(mut self, flag: Flag) -> Self {
        self.local_flags.push(flag);
        self
    }

    /// Declares a flag that every descendant inherits.
    pub fn persistent_flag(mut self, flag: Flag) -> Self {
        self.persistent_flags.push(flag);
        self
    }

    /// Value completion for a flag visible to this command.
    pub fn flag_completion<F>(mut self, flag: &str, f: F) -> Self
    where
        F: Fn(&CompletionContext<'_>, &[String], &str) -> CompletionResult + Send + Sync + 'static,
    {
        self.flag_completions.push((flag.to_string(), Arc::new(f)));
        self
    }

    pub fn mark_flag_required(self, flag: &str) -> Self {
        self.mark(flag, FlagAnnotation::Required)
    }

    /// If any of `flags` is set, all of them must be.
    pub fn mark_flags_required_together(mut self, flags: &[&str]) -> Self {
        let key = flags.join(" ");
        for flag in flags {
            self = self.mark(flag, FlagAnnotation::RequiredTogether(key.clone()));
        }
        self
    }

    /// At least one of `flags` must be set.
    pub fn mark_flags_one_required(mut self, flags: &[&str]) -> Self {
        let key = flags.join(" ");
        for flag in flags {
            self = self.mark(flag, FlagAnnotation::OneRequired(key.clone()));
        }
        self
    }

    /// At most one of `flags` may be set.
    pub fn mark_flags_mutually_exclusive(mut self, flags: &[&str]) -> Self {
        let key = flags.join(" ");
        for flag in flags {
            self = self.mark(flag, FlagAnnotation::MutuallyExclusive(key.clone()));
        }
        self
    }

    /// `others` may only be set when `special` is.
    pub fn mark_flags_depend_on(mut self, special: &str, others: &[&str]) -> Self {
        let others: Vec<String> = others.iter().map(|o| o.to_string()).collect();
        let annotation = FlagAnnotation::DependsOn {
            special: special.to_string(),
            others: others.clone(),
        };
        self = self.mark(special, annotation.clone());
        for other in &others {
            self = self.mark(other, annotation.clone());
        }
        self
    }

    /// When `special` is set, at least one of `others` must be.
    pub fn mark_flag_depends_on_any(mut self, special: &str, others: &[&str]) -> Self {
        let others: Vec<String> = others.iter().map(|o| o.to_string()).collect();
        let annotation = FlagAnnotation::DependsOnAny {
            special: special.to_string(),
            others: others.clone(),
        };
        self = self.mark(special, annotation.clone());
        for other in &others {
            self = self.mark(other, annotation.clone());
        }
        self
    }

    /// Completes the flag's value as a file with one of `extensions`.
    pub fn mark_flag_filename(self, flag: &str, extensions: &[&str]) -> Self {
        let exts = extensions.iter().map(|e| e.to_string()).collect();
        self.mark(flag, FlagAnnotation::FilenameExtensions(exts))
    }

    /// Completes the flag's value as a directory.
    pub fn mark_flag_dirname(self, flag: &str) -> Self {
        self.mark(flag, FlagAnnotation::SubdirsInDir(Vec::new()))
    }

    /// Completes the flag's value as a directory below `dir`.
    pub fn mark_flag_subdir(self, flag: &str, dir: &str) -> Self {
        self.mark(flag, FlagAnnotation::SubdirsInDir(vec![dir.to_string()]))
    }

    /// Passes every argument through as a positional.
    pub fn disable_flag_parsing(mut self) -> Self {
        self.disable_flag_parsing = true;
        self
    }

    /// Stops flag parsing at the first positional.
    pub fn disable_interspersed(mut self) -> Self {
        self.interspersed = false;
        self
    }

    pub fn run<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Invocation<'_>) -> Result<(), RunError> + Send + Sync + 'static,
    {
        self.run = Some(Arc::new(f));
        self
    }

    pub fn subcommand(mut self, child: Command) -> Self {
        self.children.push(child);
        self
    }

    fn mark(mut self, flag: &str, annotation: FlagAnnotation) -> Self {
        self.marks.push((flag.to_string(), annotation));
        self
    }

    /// Key shared by every member of a depends-on group.
    pub fn depends_group_key(special: &str, others: &[&str]) -> String {
        let others: Vec<String> = others.iter().map(|o| o.to_string()).collect();
        depends_key(special, &others)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("use_line", &self.use_line)
            .field("aliases", &self.aliases)
            .field("local_flags", &self.local_flags.len())
            .field("persistent_flags", &self.persistent_flags.len())
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}
