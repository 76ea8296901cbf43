//! Command tree navigator.
//!
//! [`CommandTree`] owns every command in an arena addressed by
//! [`CommandId`]. Parents are plain indices, children are owned by the arena
//! in insertion order, so the tree has no reference cycles. After
//! construction the tree is immutable except for completion callbacks, which
//! may be registered concurrently through `&self`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use crate::args::Args;
use crate::command::{Command, RunFn};
use crate::completion::{CompletionContext, CompletionFn, CompletionResult};
use crate::error::{DispatchError, Result};
use crate::flag::{Flag, FlagAnnotation};
use crate::help;
use crate::parse::{FlagSet, VisibleFlag, parse_flags};
use crate::shells;

/// Maximum edit distance for "Did you mean this?" suggestions.
const SUGGESTIONS_MINIMUM_DISTANCE: usize = 2;

/// Index of a command inside its [`CommandTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(usize);

impl CommandId {
    pub const ROOT: Self = Self(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Options of the implicit `completion` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionOptions {
    /// Do not add the `completion` command.
    pub disable_default_cmd: bool,
    /// Add it, but hidden.
    pub hidden_default_cmd: bool,
    /// Do not give the shell subcommands a `--no-descriptions` flag.
    pub disable_no_desc_flag: bool,
    /// Never emit descriptions.
    pub disable_descriptions: bool,
}

/// Matching and resolution behavior of one tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSettings {
    /// Resolve a subcommand from a unique prefix of its name or alias.
    pub prefix_matching: bool,
    /// Compare command names ignoring case.
    pub case_insensitive: bool,
    /// Parse and validate flags of every parent while resolving.
    pub traverse_children: bool,
    /// List children sorted by name.
    pub sort_commands: bool,
    pub completion: CompletionOptions,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            prefix_matching: false,
            case_insensitive: false,
            traverse_children: false,
            sort_commands: true,
            completion: CompletionOptions::default(),
        }
    }
}

/// One command in the arena.
pub struct CommandNode {
    name: String,
    use_line: String,
    aliases: Vec<String>,
    suggest_for: Vec<String>,
    short: String,
    long: String,
    example: String,
    version: Option<String>,
    hidden: bool,
    deprecated: Option<String>,
    group_id: Option<String>,
    args: Option<Args>,
    valid_args: Vec<String>,
    arg_aliases: Vec<String>,
    valid_args_function: RwLock<Option<Arc<dyn CompletionFn>>>,
    flag_completions: Mutex<HashMap<String, Arc<dyn CompletionFn>>>,
    local_flags: Vec<Flag>,
    persistent_flags: Vec<Flag>,
    disable_flag_parsing: bool,
    interspersed: bool,
    run: Option<RunFn>,
    parent: Option<CommandId>,
    children: Vec<CommandId>,
}

impl CommandNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn use_line(&self) -> &str {
        &self.use_line
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn short(&self) -> &str {
        &self.short
    }

    pub fn long(&self) -> &str {
        &self.long
    }

    pub fn example(&self) -> &str {
        &self.example
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn deprecation(&self) -> Option<&str> {
        self.deprecated.as_deref()
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    pub fn args(&self) -> Option<&Args> {
        self.args.as_ref()
    }

    pub fn valid_args(&self) -> &[String] {
        &self.valid_args
    }

    pub fn arg_aliases(&self) -> &[String] {
        &self.arg_aliases
    }

    pub fn local_flags(&self) -> &[Flag] {
        &self.local_flags
    }

    pub fn persistent_flags(&self) -> &[Flag] {
        &self.persistent_flags
    }

    pub fn disables_flag_parsing(&self) -> bool {
        self.disable_flag_parsing
    }

    pub fn is_interspersed(&self) -> bool {
        self.interspersed
    }

    pub fn is_runnable(&self) -> bool {
        self.run.is_some()
    }

    pub fn parent(&self) -> Option<CommandId> {
        self.parent
    }

    pub(crate) fn run_fn(&self) -> Option<RunFn> {
        self.run.clone()
    }

    pub(crate) fn valid_args_function(&self) -> Option<Arc<dyn CompletionFn>> {
        self.valid_args_function
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn flag_completion(&self, flag: &str) -> Option<Arc<dyn CompletionFn>> {
        self.flag_completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(flag)
            .cloned()
    }

    fn has_name_or_alias_prefix(&self, prefix: &str) -> bool {
        self.name.starts_with(prefix) || self.aliases.iter().any(|a| a.starts_with(prefix))
    }
}

impl fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandNode")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Registrations recorded on a builder that need the whole tree to resolve.
struct Pending {
    id: CommandId,
    marks: Vec<(String, FlagAnnotation)>,
    flag_completions: Vec<(String, Arc<dyn CompletionFn>)>,
}

/// An immutable, validated command tree.
pub struct CommandTree {
    nodes: Vec<CommandNode>,
    settings: TreeSettings,
    help_command: Option<CommandId>,
}

impl CommandTree {
    /// Builds a tree with default settings.
    ///
    /// # Errors
    ///
    /// See [`with_settings`](Self::with_settings).
    pub fn new(root: Command) -> Result<Self> {
        Self::with_settings(root, TreeSettings::default())
    }

    /// Builds a tree, adding the framework's implicit commands and flags.
    ///
    /// # Errors
    ///
    /// Fails on an empty command name, duplicate sibling names or aliases,
    /// a flag declared twice on one command, a shorthand used twice among
    /// the flags one command can see, or a mark or flag completion naming
    /// a flag the command cannot see.
    pub fn with_settings(mut root: Command, settings: TreeSettings) -> Result<Self> {
        let mut help_added = false;
        if !root.children.is_empty() {
            if !root.children.iter().any(|c| c.name() == help::HELP_COMMAND) {
                root.children.push(help::help_command());
                help_added = true;
            }
            let has_completion = root.children.iter().any(|c| {
                c.name() == shells::COMPLETION_COMMAND
                    || c.aliases.iter().any(|a| a == shells::COMPLETION_COMMAND)
            });
            if !settings.completion.disable_default_cmd && !has_completion {
                root.children.push(shells::completion_command(&settings.completion));
            }
        }

        let mut tree = Self {
            nodes: Vec::new(),
            settings,
            help_command: None,
        };
        let mut pending = Vec::new();
        tree.flatten(root, None, &mut pending)?;
        if help_added {
            tree.help_command = tree.nodes[0]
                .children
                .iter()
                .copied()
                .find(|&c| tree.nodes[c.0].name == help::HELP_COMMAND);
        }

        tree.check_flags()?;
        tree.add_framework_flags();

        for Pending {
            id,
            marks,
            flag_completions,
        } in pending
        {
            for (name, annotation) in marks {
                tree.annotate_flag(id, &name, annotation)?;
            }
            for (name, f) in flag_completions {
                tree.insert_flag_completion(id, &name, f)?;
            }
        }

        debug!(commands = tree.nodes.len(), "built command tree");
        Ok(tree)
    }

    fn flatten(
        &mut self,
        cmd: Command,
        parent: Option<CommandId>,
        pending: &mut Vec<Pending>,
    ) -> Result<CommandId> {
        let name = cmd.name().to_string();
        if name.is_empty() {
            return Err(DispatchError::EmptyCommandName(cmd.use_line));
        }

        let Command {
            use_line,
            aliases,
            suggest_for,
            short,
            long,
            example,
            version,
            hidden,
            deprecated,
            group_id,
            args,
            valid_args,
            arg_aliases,
            valid_args_function,
            flag_completions,
            local_flags,
            persistent_flags,
            marks,
            disable_flag_parsing,
            interspersed,
            run,
            children,
        } = cmd;

        let id = CommandId(self.nodes.len());
        self.nodes.push(CommandNode {
            name,
            use_line,
            aliases,
            suggest_for,
            short,
            long,
            example,
            version,
            hidden,
            deprecated,
            group_id,
            args,
            valid_args,
            arg_aliases,
            valid_args_function: RwLock::new(valid_args_function),
            flag_completions: Mutex::new(HashMap::new()),
            local_flags,
            persistent_flags,
            disable_flag_parsing,
            interspersed,
            run,
            parent,
            children: Vec::new(),
        });
        pending.push(Pending {
            id,
            marks,
            flag_completions,
        });

        let mut taken: HashSet<String> = HashSet::new();
        for child in children {
            let words: Vec<String> = std::iter::once(child.name().to_string())
                .chain(child.aliases.iter().cloned())
                .collect();
            for word in words {
                if !taken.insert(word.clone()) {
                    return Err(DispatchError::DuplicateCommand {
                        name: word,
                        parent: self.command_path(id),
                    });
                }
            }
            let child_id = self.flatten(child, Some(id), pending)?;
            self.nodes[id.0].children.push(child_id);
        }

        Ok(id)
    }

    fn check_flags(&self) -> Result<()> {
        for id in self.ids() {
            let node = &self.nodes[id.0];
            let mut names = HashSet::new();
            for flag in node.local_flags.iter().chain(&node.persistent_flags) {
                if !names.insert(flag.name()) {
                    return Err(DispatchError::DuplicateFlag {
                        command: self.command_path(id),
                        flag: flag.name().to_string(),
                    });
                }
            }

            let mut shorthands: HashMap<char, &str> = HashMap::new();
            for entry in self.visible_flags(id).iter() {
                let Some(c) = entry.flag.shorthand_char() else {
                    continue;
                };
                if let Some(existing) = shorthands.insert(c, entry.flag.name()) {
                    return Err(DispatchError::DuplicateShorthand {
                        command: self.command_path(id),
                        flag: entry.flag.name().to_string(),
                        shorthand: c,
                        existing: existing.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Adds `-h/--help` everywhere and `-v/--version` where a version is
    /// set, unless the command can already see a flag of that name. The
    /// shorthand is only taken when free.
    fn add_framework_flags(&mut self) {
        for id in self.ids() {
            let (has_help, has_version, h_taken, v_taken) = {
                let set = self.visible_flags(id);
                (
                    set.lookup("help").is_some(),
                    set.lookup("version").is_some(),
                    set.lookup_shorthand('h').is_some(),
                    set.lookup_shorthand('v').is_some(),
                )
            };

            let node = &mut self.nodes[id.0];
            if !has_help {
                let mut flag = Flag::bool("help", &format!("help for {}", node.name))
                    .annotate(FlagAnnotation::SetByFramework);
                if !h_taken {
                    flag = flag.shorthand('h');
                }
                node.local_flags.push(flag);
            }
            if node.version.is_some() && !has_version {
                let mut flag = Flag::bool("version", &format!("version for {}", node.name))
                    .annotate(FlagAnnotation::SetByFramework);
                if !v_taken {
                    flag = flag.shorthand('v');
                }
                node.local_flags.push(flag);
            }
        }
    }

    /// Finds the command declaring the flag `name` as seen from `id`.
    fn locate_flag(&self, id: CommandId, name: &str) -> Result<(CommandId, bool)> {
        self.visible_flags(id)
            .lookup(name)
            .map(|entry| (entry.owner, entry.persistent))
            .ok_or_else(|| DispatchError::UnknownFlag {
                command: self.command_path(id),
                flag: name.to_string(),
            })
    }

    fn annotate_flag(&mut self, id: CommandId, name: &str, annotation: FlagAnnotation) -> Result<()> {
        let (owner, persistent) = self.locate_flag(id, name)?;
        let node = &mut self.nodes[owner.0];
        let flags = if persistent {
            &mut node.persistent_flags
        } else {
            &mut node.local_flags
        };
        if let Some(flag) = flags.iter_mut().find(|f| f.name() == name) {
            flag.push_annotation(annotation);
        }
        Ok(())
    }

    fn insert_flag_completion(&self, id: CommandId, name: &str, f: Arc<dyn CompletionFn>) -> Result<()> {
        let (owner, _) = self.locate_flag(id, name)?;
        let mut map = self.nodes[owner.0]
            .flag_completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if map.insert(name.to_string(), f).is_some() {
            debug!(flag = name, command = %self.command_path(owner), "replaced flag completion");
        }
        Ok(())
    }

    /// Registers value completion for a flag visible to `id`.
    ///
    /// The callback is stored on the command that declares the flag, so it
    /// applies wherever the flag is inherited. Registering again replaces
    /// the previous callback. Safe to call from several threads.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownFlag`] if `id` cannot see `flag`.
    pub fn register_flag_completion<F>(&self, id: CommandId, flag: &str, f: F) -> Result<()>
    where
        F: Fn(&CompletionContext<'_>, &[String], &str) -> CompletionResult + Send + Sync + 'static,
    {
        self.insert_flag_completion(id, flag, Arc::new(f))
    }

    /// Replaces the dynamic positional completion of `id`.
    pub fn set_valid_args_function<F>(&self, id: CommandId, f: F)
    where
        F: Fn(&CompletionContext<'_>, &[String], &str) -> CompletionResult + Send + Sync + 'static,
    {
        let mut slot = self.nodes[id.0]
            .valid_args_function
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(f));
    }

    pub fn settings(&self) -> &TreeSettings {
        &self.settings
    }

    pub fn root(&self) -> CommandId {
        CommandId::ROOT
    }

    pub fn root_name(&self) -> &str {
        &self.nodes[0].name
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    pub fn command(&self, id: CommandId) -> &CommandNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every command id, parents before children.
    pub fn ids(&self) -> impl Iterator<Item = CommandId> + use<> {
        (0..self.nodes.len()).map(CommandId)
    }

    pub fn parent(&self, id: CommandId) -> Option<CommandId> {
        self.nodes[id.0].parent
    }

    /// Children of `id`, sorted by name unless sorting is disabled.
    pub fn children(&self, id: CommandId) -> Vec<CommandId> {
        let mut children = self.nodes[id.0].children.clone();
        if self.settings.sort_commands {
            children.sort_by(|a, b| self.nodes[a.0].name.cmp(&self.nodes[b.0].name));
        }
        children
    }

    /// The implicit `help` command, if one was added.
    pub fn help_command(&self) -> Option<CommandId> {
        self.help_command
    }

    /// Looks a command up by its exact names below the root.
    pub fn lookup_path(&self, names: &[&str]) -> Option<CommandId> {
        names.iter().try_fold(CommandId::ROOT, |id, name| {
            self.nodes[id.0]
                .children
                .iter()
                .copied()
                .find(|&c| self.nodes[c.0].name == *name)
        })
    }

    /// Space-separated names from the root down to `id`.
    pub fn command_path(&self, id: CommandId) -> String {
        let mut names = vec![self.nodes[id.0].name.as_str()];
        let mut current = self.nodes[id.0].parent;
        while let Some(parent) = current {
            names.push(&self.nodes[parent.0].name);
            current = self.nodes[parent.0].parent;
        }
        names.reverse();
        names.join(" ")
    }

    pub fn has_subcommands(&self, id: CommandId) -> bool {
        !self.nodes[id.0].children.is_empty()
    }

    /// Shown in listings and completion: not hidden, not deprecated, not the
    /// help command, and either runnable or a parent of such commands.
    pub fn is_available(&self, id: CommandId) -> bool {
        let node = &self.nodes[id.0];
        if node.hidden || node.deprecated.is_some() || self.help_command == Some(id) {
            return false;
        }
        node.is_runnable() || self.has_available_subcommands(id)
    }

    pub fn has_available_subcommands(&self, id: CommandId) -> bool {
        self.nodes[id.0]
            .children
            .iter()
            .any(|&c| self.is_available(c))
    }

    /// Local flags, own persistent flags, then the persistent flags of each
    /// ancestor, nearest first. A name already seen shadows later ones.
    pub fn visible_flags(&self, id: CommandId) -> FlagSet<'_> {
        let node = &self.nodes[id.0];
        let mut seen: HashSet<&str> = HashSet::new();
        let mut entries = Vec::new();

        for flag in &node.local_flags {
            if seen.insert(flag.name()) {
                entries.push(VisibleFlag {
                    flag,
                    owner: id,
                    persistent: false,
                    inherited: false,
                });
            }
        }
        for flag in &node.persistent_flags {
            if seen.insert(flag.name()) {
                entries.push(VisibleFlag {
                    flag,
                    owner: id,
                    persistent: true,
                    inherited: false,
                });
            }
        }

        let mut current = node.parent;
        while let Some(ancestor) = current {
            let ancestor_node = &self.nodes[ancestor.0];
            for flag in &ancestor_node.persistent_flags {
                if seen.insert(flag.name()) {
                    entries.push(VisibleFlag {
                        flag,
                        owner: ancestor,
                        persistent: true,
                        inherited: true,
                    });
                }
            }
            current = ancestor_node.parent;
        }

        FlagSet::from_entries(entries)
    }

    pub fn inherited_flags(&self, id: CommandId) -> Vec<VisibleFlag<'_>> {
        self.visible_flags(id).inherited()
    }

    pub fn local_non_persistent_flags(&self, id: CommandId) -> Vec<VisibleFlag<'_>> {
        self.visible_flags(id).local_non_persistent()
    }

    /// Resolves `args` with [`traverse`](Self::traverse) or
    /// [`find`](Self::find) depending on the tree settings.
    pub fn resolve<S: AsRef<str>>(&self, args: &[S]) -> Result<(CommandId, Vec<String>)> {
        if self.settings.traverse_children {
            self.traverse(args)
        } else {
            self.find(args)
        }
    }

    /// Finds the command `args` address and returns it with the arguments
    /// left once the subcommand names are removed.
    ///
    /// Flags are skipped without being parsed. A value-taking flag written
    /// as `--name value` or `-n value` also skips the token after it.
    ///
    /// # Errors
    ///
    /// When the resolved command has no positional validator and is a root
    /// with subcommands, a leftover positional is reported as
    /// [`DispatchError::UnknownCommand`] with suggestions.
    pub fn find<S: AsRef<str>>(&self, args: &[S]) -> Result<(CommandId, Vec<String>)> {
        let mut id = CommandId::ROOT;
        let mut rest: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();

        loop {
            let positionals = self.strip_flags(&rest, id);
            let Some(next) = positionals.first() else {
                break;
            };
            let Some(child) = self.find_next(id, next) else {
                break;
            };
            rest = self.args_minus_first(&rest, next, id);
            id = child;
        }

        if self.nodes[id.0].args.is_none() {
            let positionals = self.strip_flags(&rest, id);
            self.legacy_args(id, &positionals)?;
        }
        Ok((id, rest))
    }

    /// Like [`find`](Self::find), but parses the flags seen before each
    /// subcommand name against the parent that owns them. Parent flag
    /// values are validated and then discarded.
    ///
    /// # Errors
    ///
    /// Returns the first flag parse error of a parent.
    pub fn traverse<S: AsRef<str>>(&self, args: &[S]) -> Result<(CommandId, Vec<String>)> {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        let mut id = CommandId::ROOT;
        let mut start = 0;

        'levels: loop {
            let set = self.visible_flags(id);
            let rest = &args[start..];
            let mut flags: Vec<String> = Vec::new();
            let mut in_flag = false;

            for (i, arg) in rest.iter().enumerate() {
                if let Some(name) = arg.strip_prefix("--").filter(|_| !arg.contains('=')) {
                    in_flag = !set.has_no_opt_default(name);
                    flags.push(arg.clone());
                    continue;
                }
                if arg.starts_with('-')
                    && !arg.contains('=')
                    && arg.len() == 2
                    && !set.short_has_no_opt_default(&arg[1..])
                {
                    in_flag = true;
                    flags.push(arg.clone());
                    continue;
                }
                if in_flag {
                    in_flag = false;
                    flags.push(arg.clone());
                    continue;
                }
                if is_flag_arg(arg) {
                    flags.push(arg.clone());
                    continue;
                }

                let Some(child) = self.find_next(id, arg) else {
                    return Ok((id, rest.to_vec()));
                };
                let node = &self.nodes[id.0];
                if !node.disable_flag_parsing {
                    parse_flags(&set, &flags, node.interspersed)?;
                }
                id = child;
                start += i + 1;
                continue 'levels;
            }

            return Ok((id, rest.to_vec()));
        }
    }

    /// Positional tokens of `args`, skipping flags and the values of
    /// value-taking flags. Stops at `--`, and also at a value-taking flag
    /// that has at most one token after it.
    fn strip_flags(&self, args: &[String], id: CommandId) -> Vec<String> {
        let set = self.visible_flags(id);
        let mut commands = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let s = args[i].as_str();
            i += 1;
            if s == "--" {
                break;
            }
            if takes_separate_value(&set, s) {
                if args.len() - i <= 1 {
                    break;
                }
                i += 1;
                continue;
            }
            if !s.is_empty() && !s.starts_with('-') {
                commands.push(s.to_string());
            }
        }
        commands
    }

    /// `args` without the first positional occurrence of `name`.
    fn args_minus_first(&self, args: &[String], name: &str, id: CommandId) -> Vec<String> {
        let set = self.visible_flags(id);
        let mut pos = 0;

        while pos < args.len() {
            let s = args[pos].as_str();
            if s == "--" {
                break;
            }
            if takes_separate_value(&set, s) {
                pos += 2;
                continue;
            }
            if !s.starts_with('-') && s == name {
                let mut out = args.to_vec();
                out.remove(pos);
                return out;
            }
            pos += 1;
        }
        args.to_vec()
    }

    /// Child of `id` named `next`. An exact name or alias match wins; with
    /// prefix matching on, exactly one prefix match also resolves.
    pub(crate) fn find_next(&self, id: CommandId, next: &str) -> Option<CommandId> {
        let mut matches = Vec::new();
        for &child in &self.nodes[id.0].children {
            let node = &self.nodes[child.0];
            if self.name_matches(&node.name, next)
                || node.aliases.iter().any(|a| self.name_matches(a, next))
            {
                return Some(child);
            }
            if self.settings.prefix_matching && node.has_name_or_alias_prefix(next) {
                matches.push(child);
            }
        }
        if matches.len() == 1 {
            matches.first().copied()
        } else {
            None
        }
    }

    fn name_matches(&self, name: &str, typed: &str) -> bool {
        if self.settings.case_insensitive {
            name.eq_ignore_ascii_case(typed)
        } else {
            name == typed
        }
    }

    fn legacy_args(&self, id: CommandId, positionals: &[String]) -> Result<()> {
        if !self.has_subcommands(id) || self.nodes[id.0].parent.is_some() {
            return Ok(());
        }
        match positionals.first() {
            Some(first) => Err(DispatchError::UnknownCommand {
                name: first.clone(),
                path: self.command_path(id),
                suggestions: self.suggestions_for(id, first),
            }),
            None => Ok(()),
        }
    }

    /// Names of available children of `id` close to `typed`.
    pub fn suggestions_for(&self, id: CommandId, typed: &str) -> Vec<String> {
        let typed_lower = typed.to_lowercase();
        let mut suggestions = Vec::new();
        for &child in &self.nodes[id.0].children {
            if !self.is_available(child) {
                continue;
            }
            let node = &self.nodes[child.0];
            let close = levenshtein(&typed_lower, &node.name.to_lowercase())
                <= SUGGESTIONS_MINIMUM_DISTANCE;
            if close || node.name.to_lowercase().starts_with(&typed_lower) {
                suggestions.push(node.name.clone());
            }
            if node.suggest_for.iter().any(|s| s.eq_ignore_ascii_case(typed)) {
                suggestions.push(node.name.clone());
            }
        }
        suggestions
    }
}

impl fmt::Debug for CommandTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTree")
            .field("root", &self.root_name())
            .field("commands", &self.nodes.len())
            .field("settings", &self.settings)
            .finish()
    }
}

/// `--name` or `-n` without `=` whose flag needs a value.
fn takes_separate_value(set: &FlagSet<'_>, s: &str) -> bool {
    if s.contains('=') {
        return false;
    }
    if let Some(name) = s.strip_prefix("--") {
        if !set.has_no_opt_default(name) {
            return true;
        }
    }
    s.starts_with('-') && s.len() == 2 && !set.short_has_no_opt_default(&s[1..])
}

/// `--x...` or `-x...`: a token that looks like a complete flag.
pub(crate) fn is_flag_arg(arg: &str) -> bool {
    let bytes = arg.as_bytes();
    (bytes.len() >= 3 && arg.starts_with("--"))
        || (bytes.len() >= 2 && bytes[0] == b'-' && bytes[1] != b'-')
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            current[j + 1] = (previous[j] + cost)
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlagError;

    fn noop(_: &mut crate::Invocation<'_>) -> std::result::Result<(), crate::RunError> {
        Ok(())
    }

    fn sample() -> Command {
        Command::new("app")
            .persistent_flag(Flag::string("config", "", "Config file").shorthand('c'))
            .persistent_flag(Flag::bool("debug", "Debug output"))
            .subcommand(
                Command::new("get")
                    .alias("g")
                    .flag(Flag::string("output", "", "Format").shorthand('o'))
                    .subcommand(Command::new("pods").run(noop))
                    .run(noop),
            )
            .subcommand(Command::new("go").run(noop))
            .subcommand(Command::new("secret").hidden().run(noop))
    }

    fn tree_with(settings: TreeSettings) -> CommandTree {
        CommandTree::with_settings(sample(), settings).unwrap()
    }

    fn path_of(tree: &CommandTree, args: &[&str]) -> String {
        let (id, _) = tree.find(args).unwrap();
        tree.command_path(id)
    }

    #[test]
    fn test_implicit_commands_are_added() {
        let tree = CommandTree::new(sample()).unwrap();
        let names: Vec<&str> = tree
            .children(tree.root())
            .into_iter()
            .map(|c| tree.command(c).name())
            .collect();
        assert_eq!(names, vec!["completion", "get", "go", "help", "secret"]);
        assert_eq!(tree.help_command(), tree.lookup_path(&["help"]));
        assert!(tree.lookup_path(&["completion", "zsh"]).is_some());
    }

    #[test]
    fn test_leaf_root_gets_no_implicit_commands() {
        let tree = CommandTree::new(Command::new("solo").run(noop)).unwrap();
        assert!(!tree.has_subcommands(tree.root()));
        assert!(tree.help_command().is_none());
    }

    #[test]
    fn test_disable_default_completion_command() {
        let mut settings = TreeSettings::default();
        settings.completion.disable_default_cmd = true;
        let tree = tree_with(settings);
        assert!(tree.lookup_path(&["completion"]).is_none());
    }

    #[test]
    fn test_find_follows_names_and_aliases() {
        let tree = CommandTree::new(sample()).unwrap();
        assert_eq!(path_of(&tree, &["get", "pods"]), "app get pods");
        assert_eq!(path_of(&tree, &["g", "pods"]), "app get pods");
        let (_, rest) = tree.find(&["get", "-o", "json", "pods", "x"]).unwrap();
        assert_eq!(rest, vec!["-o", "json", "x"]);
    }

    #[test]
    fn test_find_skips_flag_values() {
        let tree = CommandTree::new(sample()).unwrap();
        // "get" is the value of --config, not a subcommand
        assert_eq!(path_of(&tree, &["--config", "get", "go"]), "app go");
        assert_eq!(path_of(&tree, &["--debug", "get"]), "app get");
        assert_eq!(path_of(&tree, &["--config=x", "get"]), "app get");
    }

    #[test]
    fn test_value_flag_at_end_stops_stripping() {
        let tree = CommandTree::new(sample()).unwrap();
        assert_eq!(path_of(&tree, &["--config", "get"]), "app");
    }

    #[test]
    fn test_unknown_command_suggests() {
        let tree = CommandTree::new(sample()).unwrap();
        let err = tree.find(&["gte"]).unwrap_err();
        let DispatchError::UnknownCommand { suggestions, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(suggestions, &vec!["get".to_string(), "go".to_string()]);
        assert!(err.to_string().contains("Did you mean this?"));
    }

    #[test]
    fn test_prefix_matching_requires_unique_prefix() {
        let tree = tree_with(TreeSettings {
            prefix_matching: true,
            ..TreeSettings::default()
        });
        assert_eq!(path_of(&tree, &["ge"]), "app get");
        // "g" is an exact alias of get, which wins over prefixes
        assert_eq!(path_of(&tree, &["g"]), "app get");
        assert!(tree.find(&["s"]).is_ok());
        assert!(tree.find(&["c"]).is_ok());
        assert_eq!(path_of(&tree, &["co"]), "app completion");
    }

    #[test]
    fn test_case_insensitive_names() {
        let tree = tree_with(TreeSettings {
            case_insensitive: true,
            ..TreeSettings::default()
        });
        assert_eq!(path_of(&tree, &["GET", "Pods"]), "app get pods");
    }

    #[test]
    fn test_traverse_parses_parent_flags() {
        let tree = tree_with(TreeSettings {
            traverse_children: true,
            ..TreeSettings::default()
        });
        let (id, rest) = tree.traverse(&["--config", "x", "get", "pods", "a"]).unwrap();
        assert_eq!(tree.command_path(id), "app get pods");
        assert_eq!(rest, vec!["a"]);

        let err = tree.traverse(&["--nope=1", "get"]).unwrap_err();
        assert!(matches!(err, DispatchError::Flag(FlagError::UnknownFlag(_))));
    }

    #[test]
    fn test_framework_flags() {
        let root = Command::new("app")
            .version("1.2.3")
            .flag(Flag::bool("hold", "").shorthand('h'))
            .run(noop);
        let tree = CommandTree::new(root).unwrap();
        let set = tree.visible_flags(tree.root());
        let help = set.lookup("help").unwrap();
        assert_eq!(help.flag.shorthand_char(), None);
        assert!(help.flag.is_set_by_framework());
        assert_eq!(help.flag.usage(), "help for app");
        assert_eq!(set.lookup("version").unwrap().flag.shorthand_char(), Some('v'));
    }

    #[test]
    fn test_visible_flags_inherit_nearest_first() {
        let tree = CommandTree::new(sample()).unwrap();
        let pods = tree.lookup_path(&["get", "pods"]).unwrap();
        let inherited_flags = tree.inherited_flags(pods);
        let inherited: Vec<&str> = inherited_flags.iter().map(|f| f.name()).collect();
        assert_eq!(inherited, vec!["config", "debug"]);
        let get = tree.lookup_path(&["get"]).unwrap();
        let local_flags = tree.local_non_persistent_flags(get);
        let local: Vec<&str> = local_flags
            .iter()
            .map(|f| f.name())
            .collect();
        assert_eq!(local, vec!["help", "output"]);
    }

    #[test]
    fn test_duplicate_sibling_is_rejected() {
        let root = Command::new("app")
            .subcommand(Command::new("a").alias("x"))
            .subcommand(Command::new("x"));
        let err = CommandTree::new(root).unwrap_err();
        assert!(matches!(err, DispatchError::DuplicateCommand { ref name, .. } if name == "x"));
    }

    #[test]
    fn test_shorthand_collision_with_inherited_flag() {
        let root = Command::new("app")
            .persistent_flag(Flag::bool("all", "").shorthand('a'))
            .subcommand(Command::new("sub").flag(Flag::bool("append", "").shorthand('a')));
        let err = CommandTree::new(root).unwrap_err();
        assert!(matches!(err, DispatchError::DuplicateShorthand { shorthand: 'a', .. }));
    }

    #[test]
    fn test_marks_on_unknown_flag_fail_fast() {
        let root = Command::new("app")
            .flag(Flag::bool("a", ""))
            .mark_flags_required_together(&["a", "missing"]);
        let err = CommandTree::new(root).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownFlag { ref flag, .. } if flag == "missing"));
    }

    #[test]
    fn test_mark_on_inherited_flag_annotates_owner() {
        let root = Command::new("app")
            .persistent_flag(Flag::string("config", "", ""))
            .subcommand(Command::new("sub").mark_flag_required("config").run(noop));
        let tree = CommandTree::new(root).unwrap();
        let config = tree.visible_flags(tree.root()).lookup("config").unwrap();
        assert!(config.flag.is_required());
    }

    #[test]
    fn test_register_flag_completion_unknown_flag() {
        let tree = CommandTree::new(sample()).unwrap();
        let err = tree
            .register_flag_completion(tree.root(), "nope", crate::completion::no_file_completions)
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownFlag { .. }));
    }

    #[test]
    fn test_availability() {
        let tree = CommandTree::new(sample()).unwrap();
        assert!(tree.is_available(tree.lookup_path(&["get"]).unwrap()));
        assert!(!tree.is_available(tree.lookup_path(&["secret"]).unwrap()));
        assert!(!tree.is_available(tree.lookup_path(&["help"]).unwrap()));
        assert!(tree.is_available(tree.lookup_path(&["completion"]).unwrap()));
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("gte", "get"), 2);
    }
}
