//! Execution path.
//!
//! [`CommandTree::execute`] answers the hidden completion requests itself
//! and otherwise resolves the target command, parses its flags, runs the
//! validators and finally the command's run function.

use std::io::Write;

use tracing::debug;

use crate::command::Invocation;
use crate::env::{EnvSource, ProcessEnv, active_help_enabled, descriptions_override};
use crate::error::{DispatchError, Result};
use crate::flag_groups::{validate_flag_groups, validate_required_flags};
use crate::help::render_help;
use crate::parse::{ParsedFlags, parse_flags};
use crate::protocol::{self, EncodeOptions};
use crate::shells::{COMPLETE_NO_DESC_REQUEST, COMPLETE_REQUEST};
use crate::tree::{CommandId, CommandTree};

impl CommandTree {
    /// Executes a command line (without the program name), reading
    /// completion configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`execute_with_env`](Self::execute_with_env).
    pub fn execute<S: AsRef<str>>(&self, args: &[S], out: &mut dyn Write) -> Result<()> {
        self.execute_with_env(args, out, &ProcessEnv)
    }

    /// Executes a command line, writing all output to `out`.
    ///
    /// A first argument of `__complete` or `__complete_no_desc` is a
    /// completion request: the rest of the line is completed and the result
    /// written in protocol form.
    ///
    /// # Errors
    ///
    /// Resolution, flag parsing, positional validation, required flags and
    /// flag groups fail with the matching [`DispatchError`]. Errors returned
    /// by a run function are passed through when they are a
    /// `DispatchError` and wrapped in [`DispatchError::Run`] otherwise.
    pub fn execute_with_env<S: AsRef<str>>(
        &self,
        args: &[S],
        out: &mut dyn Write,
        env: &dyn EnvSource,
    ) -> Result<()> {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        if let Some((first, rest)) = args.split_first() {
            if first == COMPLETE_REQUEST || first == COMPLETE_NO_DESC_REQUEST {
                return self.serve_completion(rest, first == COMPLETE_NO_DESC_REQUEST, out, env);
            }
        }

        let (id, rest) = self.resolve(&args)?;
        self.execute_command(id, rest, out)
    }

    fn serve_completion(
        &self,
        args: &[String],
        no_descriptions: bool,
        out: &mut dyn Write,
        env: &dyn EnvSource,
    ) -> Result<()> {
        let outcome = self.complete_with_env(args, env);
        let program = self.root_name();

        let mut descriptions = !no_descriptions && !self.settings().completion.disable_descriptions;
        if descriptions {
            descriptions = descriptions_override(env, program).unwrap_or(true);
        }
        let options = EncodeOptions {
            descriptions,
            active_help: active_help_enabled(env, program),
        };
        debug!(
            directive = %outcome.directive,
            count = outcome.completions.len(),
            "answering completion request"
        );
        protocol::write_to(out, &outcome.completions, outcome.directive, options)?;
        Ok(())
    }

    fn execute_command(&self, id: CommandId, args: Vec<String>, out: &mut dyn Write) -> Result<()> {
        let node = self.command(id);
        if let Some(message) = node.deprecation() {
            writeln!(out, "Command {:?} is deprecated, {message}", node.name())?;
        }

        let set = self.visible_flags(id);
        let parsed = if node.disables_flag_parsing() {
            ParsedFlags::unparsed(&set, args)
        } else {
            parse_flags(&set, &args, node.is_interspersed())?
        };

        if parsed.get_bool("help") == Some(true) {
            out.write_all(render_help(self, id).as_bytes())?;
            return Ok(());
        }
        if let Some(version) = node.version() {
            if parsed.get_bool("version") == Some(true) {
                writeln!(out, "{} version {version}", node.name())?;
                return Ok(());
            }
        }

        let Some(run) = node.run_fn() else {
            out.write_all(render_help(self, id).as_bytes())?;
            return Ok(());
        };

        if let Some(validator) = node.args() {
            validator.validate(self, id, parsed.args())?;
        }
        validate_required_flags(self, id, &parsed)?;
        validate_flag_groups(self, id, &parsed)?;

        debug!(command = %self.command_path(id), args = ?parsed.args(), "running command");
        let mut invocation = Invocation::new(self, id, parsed, out);
        run(&mut invocation).map_err(|err| match err.downcast::<DispatchError>() {
            Ok(dispatch) => *dispatch,
            Err(other) => DispatchError::Run(other),
        })
    }
}
