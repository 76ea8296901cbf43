//! Shell completion scripts and the implicit `completion` command.
//!
//! Every script does the same thing: call the program back with the hidden
//! `__complete` request and the words typed so far, split the reply into
//! candidate lines and the trailing `:<directive>` line, and act on the
//! directive bits. The scripts are templates with `__PROG__` (program name),
//! `__FUNC__` (shell function name) and `__REQUEST__` placeholders.

use std::fmt;
use std::str::FromStr;

use crate::args::Args;
use crate::command::{Command, Invocation, RunError};
use crate::completion::no_file_completions;
use crate::error::DispatchError;
use crate::flag::Flag;
use crate::tree::CompletionOptions;

/// Name of the implicit completion command.
pub const COMPLETION_COMMAND: &str = "completion";

/// Hidden request the scripts send, answered with descriptions.
pub const COMPLETE_REQUEST: &str = "__complete";

/// Hidden request the scripts send when descriptions are unwanted.
pub const COMPLETE_NO_DESC_REQUEST: &str = "__complete_no_desc";

const NO_DESCRIPTIONS_FLAG: &str = "no-descriptions";

/// Shells with a generated completion script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

impl Shell {
    pub const ALL: [Shell; 4] = [Shell::Bash, Shell::Zsh, Shell::Fish, Shell::PowerShell];

    pub fn name(self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
            Self::Fish => "fish",
            Self::PowerShell => "powershell",
        }
    }

    /// Completion script for `program`.
    ///
    /// With `descriptions` off the script sends [`COMPLETE_NO_DESC_REQUEST`].
    ///
    /// # Examples
    ///
    /// ```
    /// use command_dispatch_core::shells::Shell;
    ///
    /// let script = Shell::Bash.script("kube-ctl", false);
    /// assert!(script.contains("__complete_no_desc"));
    /// assert!(script.contains("complete -F __kube_ctl_complete kube-ctl"));
    /// ```
    pub fn script(self, program: &str, descriptions: bool) -> String {
        let template = match self {
            Self::Bash => BASH_TEMPLATE,
            Self::Zsh => ZSH_TEMPLATE,
            Self::Fish => FISH_TEMPLATE,
            Self::PowerShell => POWERSHELL_TEMPLATE,
        };
        let request = if descriptions {
            COMPLETE_REQUEST
        } else {
            COMPLETE_NO_DESC_REQUEST
        };
        template
            .replace("__FUNC__", &function_name(program))
            .replace("__REQUEST__", request)
            .replace("__PROG__", program)
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Shell {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|shell| shell.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DispatchError::UnsupportedShell(s.to_string()))
    }
}

/// `__<program>_complete`, with every non-alphanumeric mapped to `_`.
fn function_name(program: &str) -> String {
    let sanitized: String = program
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("__{sanitized}_complete")
}

pub(crate) fn completion_command(options: &CompletionOptions) -> Command {
    let mut cmd = Command::new(COMPLETION_COMMAND)
        .short("Generate the autocompletion script for the specified shell")
        .long(
            "Generate the autocompletion script for the specified shell.\n\
             See each sub-command's help for details on how to use the generated script.",
        )
        .args(Args::None)
        .valid_args_function(no_file_completions);
    if options.hidden_default_cmd {
        cmd = cmd.hidden();
    }

    let with_flag = !options.disable_no_desc_flag && !options.disable_descriptions;
    for shell in Shell::ALL {
        let disable_descriptions = options.disable_descriptions;
        let mut sub = Command::new(shell.name())
            .short(&format!("Generate the autocompletion script for {shell}"))
            .args(Args::None)
            .valid_args_function(no_file_completions)
            .run(move |inv: &mut Invocation<'_>| -> Result<(), RunError> {
                let suppressed = inv.flags().get_bool(NO_DESCRIPTIONS_FLAG).unwrap_or(false);
                let script = shell.script(
                    inv.tree().root_name(),
                    !suppressed && !disable_descriptions,
                );
                inv.out().write_all(script.as_bytes())?;
                Ok(())
            });
        if with_flag {
            sub = sub.flag(Flag::bool(NO_DESCRIPTIONS_FLAG, "disable completion descriptions"));
        }
        cmd = cmd.subcommand(sub);
    }
    cmd
}

const BASH_TEMPLATE: &str = r##"# bash completion for __PROG__

__FUNC__()
{
    local cur="${COMP_WORDS[COMP_CWORD]}"
    local out directive
    out=$("${COMP_WORDS[0]}" __REQUEST__ "${COMP_WORDS[@]:1:COMP_CWORD-1}" "${cur}" 2>/dev/null)
    directive=${out##*:}
    out=${out%:*}
    [[ "${directive}" =~ ^[0-9]+$ ]] || directive=0

    # Error
    if (( (directive & 1) != 0 )); then
        return
    fi

    local IFS=$'\n'
    local line
    COMPREPLY=()

    # FilterFileExt
    if (( (directive & 8) != 0 )); then
        for line in ${out}; do
            COMPREPLY+=($(compgen -f -X "!*.${line}" -- "${cur}"))
        done
        COMPREPLY+=($(compgen -d -- "${cur}"))
        return
    fi

    # FilterDirs
    if (( (directive & 16) != 0 )); then
        local dir="${out%%$'\n'*}"
        if [[ -n "${dir}" ]]; then
            COMPREPLY=($(cd "${dir}" 2>/dev/null && compgen -d -- "${cur}"))
        else
            COMPREPLY=($(compgen -d -- "${cur}"))
        fi
        return
    fi

    local values=()
    for line in ${out}; do
        [[ "${line}" == _activeHelp_* ]] && continue
        values+=("${line%%$'\t'*}")
    done
    COMPREPLY=($(compgen -W "${values[*]}" -- "${cur}"))

    (( (directive & 2) != 0 )) && compopt -o nospace 2>/dev/null
    (( (directive & 32) != 0 )) && compopt -o nosort 2>/dev/null
    if (( ${#COMPREPLY[@]} == 0 && (directive & 4) == 0 )); then
        COMPREPLY=($(compgen -f -- "${cur}"))
    fi
}

complete -F __FUNC__ __PROG__
"##;

const ZSH_TEMPLATE: &str = r##"#compdef __PROG__
compdef __FUNC__ __PROG__

# zsh completion for __PROG__

__FUNC__()
{
    local -a completions
    local out directive line value
    local cur="${words[CURRENT]}"
    out=$("${words[1]}" __REQUEST__ "${(@)words[2,CURRENT-1]}" "${cur}" 2>/dev/null)
    directive=${out##*:}
    out=${out%:*}
    [[ "${directive}" == <-> ]] || directive=0

    # Error
    if (( directive & 1 )); then
        return 1
    fi

    # FilterFileExt
    if (( directive & 8 )); then
        local -a globs
        for line in ${(f)out}; do
            globs+=(-g "*.${line}")
        done
        _files "${globs[@]}"
        return
    fi

    # FilterDirs
    if (( directive & 16 )); then
        local dir="${${(f)out}[1]}"
        if [[ -n "${dir}" ]]; then
            _files -W "${dir}" -/
        else
            _files -/
        fi
        return
    fi

    for line in ${(f)out}; do
        [[ "${line}" == _activeHelp_* ]] && continue
        value="${line%%$'\t'*}"
        value="${value//:/\\:}"
        if [[ "${line}" == *$'\t'* ]]; then
            completions+=("${value}:${line#*$'\t'}")
        else
            completions+=("${value}")
        fi
    done

    local -a describe=(_describe)
    local -a opts
    (( directive & 32 )) && describe+=(-V)
    (( directive & 2 )) && opts+=(-S '')
    if (( ${#completions} )); then
        "${describe[@]}" "completions" completions "${opts[@]}" && return
    fi
    (( directive & 4 )) || _files
}

if [ "$funcstack[1]" = "__FUNC__" ]; then
    __FUNC__ "$@"
fi
"##;

const FISH_TEMPLATE: &str = r##"# fish completion for __PROG__

function __FUNC__
    set -l args (commandline -opc)
    set -l cur (commandline -ct)
    set -l out ($args[1] __REQUEST__ $args[2..-1] "$cur" 2>/dev/null)
    test (count $out) -gt 0; or return
    set -l directive (string replace -r '^:' '' -- $out[-1])
    set -e out[-1]
    string match -qr '^[0-9]+$' -- $directive; or set directive 0

    # Error
    if test (math "bitand($directive, 1)") -ne 0
        return
    end

    # FilterFileExt
    if test (math "bitand($directive, 8)") -ne 0
        for ext in $out
            __fish_complete_suffix ".$ext"
        end
        return
    end

    # FilterDirs
    if test (math "bitand($directive, 16)") -ne 0
        if test -n "$out[1]"
            pushd $out[1] >/dev/null; and __fish_complete_directories "$cur"; popd >/dev/null
        else
            __fish_complete_directories "$cur"
        end
        return
    end

    set -l shown 0
    for line in $out
        string match -q -- '_activeHelp_*' $line; and continue
        echo $line
        set shown 1
    end
    if test $shown -eq 0; and test (math "bitand($directive, 4)") -eq 0
        __fish_complete_path "$cur"
    end
end

complete -c __PROG__ -e
complete -c __PROG__ -f -a '(__FUNC__)'
"##;

const POWERSHELL_TEMPLATE: &str = r##"# powershell completion for __PROG__

Register-ArgumentCompleter -CommandName '__PROG__' -ScriptBlock {
    param($WordToComplete, $CommandAst, $CursorPosition)

    $elements = @($CommandAst.CommandElements | ForEach-Object { $_.ToString() })
    $program = $elements[0]
    $typed = @($elements | Select-Object -Skip 1)
    if ($WordToComplete -ne '') { $typed = @($typed | Select-Object -SkipLast 1) }
    $out = @(& $program __REQUEST__ @typed "$WordToComplete" 2>$null)
    if ($out.Count -eq 0) { return }

    $directive = 0
    [void][int]::TryParse($out[-1].TrimStart(':'), [ref]$directive)
    $lines = if ($out.Count -gt 1) { $out[0..($out.Count - 2)] } else { @() }

    # Error
    if (($directive -band 1) -ne 0) { return }
    # FilterFileExt and FilterDirs fall back to the default provider.
    if (($directive -band 24) -ne 0) { return }

    $results = foreach ($line in $lines) {
        if ($line.StartsWith('_activeHelp_')) { continue }
        $value, $desc = $line -split "`t", 2
        if (-not $desc) { $desc = $value }
        $text = if (($directive -band 2) -ne 0) { $value } else { "$value " }
        [System.Management.Automation.CompletionResult]::new($text, $value, 'ParameterValue', $desc)
    }
    if (($directive -band 32) -eq 0) { $results = $results | Sort-Object ListItemText }
    $results
}
"##;
