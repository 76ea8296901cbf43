use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use command_dispatch_core::shells::{COMPLETE_NO_DESC_REQUEST, COMPLETE_REQUEST};
use command_dispatch_core::{CommandTree, Shell};
use command_dispatch_schema::{CommandDefinition, TreeDefinition, load};
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding `tracing` filter directives.
const LOG_ENV: &str = "DISPATCH_LOG";

#[derive(Debug, Parser)]
#[command(name = "dispatch-tree")]
#[command(about = "Run completion requests and executions against a declarative command tree")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print completions for a partial command line in the wire protocol.
    Complete(CompleteArgs),
    /// Execute a command line against the tree.
    Exec(ExecArgs),
    /// Validate a tree definition and print a summary.
    Check(TreeArgs),
    /// Print the completion script for a shell.
    Script(ScriptArgs),
}

#[derive(Debug, Args)]
struct TreeArgs {
    /// Tree definition file (.json, .yaml or .yml).
    #[arg(long)]
    tree: PathBuf,
}

#[derive(Debug, Args)]
struct CompleteArgs {
    #[command(flatten)]
    tree: TreeArgs,
    /// Omit completion descriptions.
    #[arg(long)]
    no_descriptions: bool,
    /// Words typed so far; the last one is the partial word.
    #[arg(last = true, allow_hyphen_values = true)]
    words: Vec<String>,
}

#[derive(Debug, Args)]
struct ExecArgs {
    #[command(flatten)]
    tree: TreeArgs,
    /// Command line to execute, without the program name.
    #[arg(last = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Debug, Args)]
struct ScriptArgs {
    #[command(flatten)]
    tree: TreeArgs,
    /// Target shell: bash, zsh, fish or powershell.
    shell: String,
    /// Generate a script that requests completions without descriptions.
    #[arg(long)]
    no_descriptions: bool,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Complete(args) => run_complete(args),
        Command::Exec(args) => run_exec(args),
        Command::Check(args) => run_check(args),
        Command::Script(args) => run_script(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// Installs a stderr subscriber when `DISPATCH_LOG` is set; stdout carries
/// the completion protocol and must stay clean.
fn init_logging() {
    let Ok(directives) = std::env::var(LOG_ENV) else {
        return;
    };
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directives);
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_definition(args: &TreeArgs) -> Result<TreeDefinition, String> {
    load(&args.tree).map_err(|err| format!("Failed to load '{}': {err}", args.tree.display()))
}

fn load_tree(args: &TreeArgs) -> Result<CommandTree, String> {
    let tree = load_definition(args)?
        .build()
        .map_err(|err| format!("Failed to build '{}': {err}", args.tree.display()))?;
    debug!(path = %args.tree.display(), commands = tree.len(), "tree ready");
    Ok(tree)
}

fn execute(tree: &CommandTree, args: &[String]) -> Result<(), String> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    tree.execute(args, &mut out).map_err(|err| err.to_string())?;
    out.flush()
        .map_err(|err| format!("Failed to write output: {err}"))
}

fn run_complete(args: CompleteArgs) -> Result<(), String> {
    let tree = load_tree(&args.tree)?;
    let request = if args.no_descriptions {
        COMPLETE_NO_DESC_REQUEST
    } else {
        COMPLETE_REQUEST
    };

    let mut line = Vec::with_capacity(args.words.len() + 2);
    line.push(request.to_string());
    line.extend(args.words);
    if line.len() == 1 {
        line.push(String::new());
    }
    execute(&tree, &line)
}

fn run_exec(args: ExecArgs) -> Result<(), String> {
    let tree = load_tree(&args.tree)?;
    execute(&tree, &args.args)
}

fn run_check(args: TreeArgs) -> Result<(), String> {
    let definition = load_definition(&args)?;
    definition
        .build()
        .map_err(|err| format!("Invalid definition '{}': {err}", args.tree.display()))?;

    let summary = Summary::collect(&definition.root);
    println!(
        "Definition for '{}' is valid: {} command(s), {} flag(s), {} flag group(s).",
        definition.program(),
        summary.commands,
        summary.flags,
        summary.groups
    );
    Ok(())
}

fn run_script(args: ScriptArgs) -> Result<(), String> {
    let shell: Shell = args.shell.parse().map_err(|err| format!("{err}"))?;
    let definition = load_definition(&args.tree)?;
    let script = shell.script(definition.program(), !args.no_descriptions);
    print!("{script}");
    Ok(())
}

/// Declared commands, flags and groups of a definition.
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    commands: usize,
    flags: usize,
    groups: usize,
}

impl Summary {
    fn collect(root: &CommandDefinition) -> Self {
        let mut summary = Self::default();
        let mut stack = vec![root];
        while let Some(cmd) = stack.pop() {
            summary.commands += 1;
            summary.flags += cmd.flags.len() + cmd.persistent_flags.len();
            summary.groups += cmd.groups.len();
            stack.extend(&cmd.subcommands);
        }
        summary
    }
}
