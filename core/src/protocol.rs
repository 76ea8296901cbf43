//! Line protocol spoken between shell scripts and the `__complete` request.
//!
//! The output is one completion per line, each optionally followed by a tab
//! and a description, then a final `:<directive>` line carrying the
//! directive bits in decimal:
//!
//! ```text
//! get\tDisplay resources
//! go
//! :4
//! ```
//!
//! Active-help messages travel as ordinary lines prefixed with
//! [`ACTIVE_HELP_MARKER`].

use std::io::{self, Write};

use crate::completion::{Completion, ShellCompDirective};
use crate::error::ProtocolError;

/// Prefix that marks a line as an active-help message.
pub const ACTIVE_HELP_MARKER: &str = "_activeHelp_ ";

/// What the encoder keeps from each completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Keep `\t<description>` suffixes.
    pub descriptions: bool,
    /// Keep active-help lines.
    pub active_help: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            descriptions: true,
            active_help: true,
        }
    }
}

/// Encodes completions and the directive into protocol text.
///
/// Only the first line of each entry is kept and surrounding whitespace is
/// trimmed, so a multi-line description cannot leak extra candidates.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::{Completion, ShellCompDirective};
/// use command_dispatch_core::protocol::{EncodeOptions, encode};
///
/// let text = encode(
///     &[Completion::with_description("get", "Display resources"), Completion::new("go")],
///     ShellCompDirective::NO_FILE_COMP,
///     EncodeOptions::default(),
/// );
/// assert_eq!(text, "get\tDisplay resources\ngo\n:4\n");
/// ```
pub fn encode(
    completions: &[Completion],
    directive: ShellCompDirective,
    options: EncodeOptions,
) -> String {
    let mut out = String::new();
    for completion in completions {
        if let Some(line) = encode_line(completion, options) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out.push(':');
    out.push_str(&directive.bits().to_string());
    out.push('\n');
    out
}

/// Writes the encoded form of `completions` to `sink`.
///
/// # Errors
///
/// Returns any error raised by the sink.
pub fn write_to(
    sink: &mut dyn Write,
    completions: &[Completion],
    directive: ShellCompDirective,
    options: EncodeOptions,
) -> io::Result<()> {
    sink.write_all(encode(completions, directive, options).as_bytes())?;
    sink.flush()
}

fn encode_line(completion: &Completion, options: EncodeOptions) -> Option<String> {
    let raw = match completion {
        Completion::ActiveHelp(message) => {
            if !options.active_help {
                return None;
            }
            format!("{ACTIVE_HELP_MARKER}{message}")
        }
        Completion::Candidate { value, description } => match description {
            Some(description) if options.descriptions => format!("{value}\t{description}"),
            _ => value.clone(),
        },
    };
    let first = raw.split('\n').next().unwrap_or_default();
    Some(first.trim().to_string())
}

/// Decodes protocol text back into completions and a directive.
///
/// Trailing blank lines are ignored. Lines starting with
/// [`ACTIVE_HELP_MARKER`] become [`Completion::ActiveHelp`].
///
/// # Errors
///
/// Returns [`ProtocolError::MissingDirective`] when the text has no lines and
/// [`ProtocolError::InvalidDirective`] when the last line is not `:<bits>`.
pub fn decode(text: &str) -> Result<(Vec<Completion>, ShellCompDirective), ProtocolError> {
    let mut lines: Vec<&str> = text.lines().collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    let last = lines.pop().ok_or(ProtocolError::MissingDirective)?;
    let directive = decode_directive(last)?;
    let completions = lines
        .into_iter()
        .map(|line| match line.strip_prefix(ACTIVE_HELP_MARKER) {
            Some(message) => Completion::active_help(message),
            None => Completion::parse(line),
        })
        .collect();
    Ok((completions, directive))
}

/// Parses a single `:<bits>` directive line.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidDirective`] for anything else, including
/// unknown bits.
pub fn decode_directive(line: &str) -> Result<ShellCompDirective, ProtocolError> {
    let invalid = || ProtocolError::InvalidDirective(line.to_string());
    let digits = line.trim().strip_prefix(':').ok_or_else(invalid)?;
    let bits: u32 = digits.parse().map_err(|_| invalid())?;
    ShellCompDirective::from_bits(bits).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_strips_descriptions_when_disabled() {
        let text = encode(
            &[Completion::with_description("pod", "A pod")],
            ShellCompDirective::DEFAULT,
            EncodeOptions {
                descriptions: false,
                active_help: true,
            },
        );
        assert_eq!(text, "pod\n:0\n");
    }

    #[test]
    fn test_encode_keeps_first_line_only() {
        let text = encode(
            &[Completion::with_description("a", "line one\nline two")],
            ShellCompDirective::NO_SPACE,
            EncodeOptions::default(),
        );
        assert_eq!(text, "a\tline one\n:2\n");
    }

    #[test]
    fn test_active_help_lines_are_marked_and_can_be_dropped() {
        let completions = vec![Completion::new("x"), Completion::active_help("pick one")];
        assert_eq!(
            encode(&completions, ShellCompDirective::DEFAULT, EncodeOptions::default()),
            "x\n_activeHelp_ pick one\n:0\n"
        );
        let quiet = EncodeOptions {
            descriptions: true,
            active_help: false,
        };
        assert_eq!(encode(&completions, ShellCompDirective::DEFAULT, quiet), "x\n:0\n");
    }

    #[test]
    fn test_decode_reads_entries_and_directive() {
        let (completions, directive) = decode("get\tDisplay\n_activeHelp_ hint\n:36\n").unwrap();
        assert_eq!(
            completions,
            vec![
                Completion::with_description("get", "Display"),
                Completion::active_help("hint"),
            ]
        );
        assert_eq!(
            directive,
            ShellCompDirective::NO_FILE_COMP | ShellCompDirective::KEEP_ORDER
        );
    }

    #[test]
    fn test_decode_rejects_bad_directive() {
        assert_eq!(decode(""), Err(ProtocolError::MissingDirective));
        assert_eq!(
            decode("get\n"),
            Err(ProtocolError::InvalidDirective("get".into()))
        );
        assert_eq!(
            decode_directive(":4096"),
            Err(ProtocolError::InvalidDirective(":4096".into()))
        );
    }

    #[test]
    fn test_write_to_matches_encode() {
        let mut sink = Vec::new();
        write_to(
            &mut sink,
            &[Completion::new("a")],
            ShellCompDirective::ERROR,
            EncodeOptions::default(),
        )
        .unwrap();
        assert_eq!(String::from_utf8(sink).unwrap(), "a\n:1\n");
    }
}
