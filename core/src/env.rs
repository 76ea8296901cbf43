//! Environment-variable configuration.
//!
//! Two settings are read from the environment, each from a per-program
//! variable derived from the root command name and from a global variable:
//!
//! | setting | per-program | global |
//! |---------|-------------|--------|
//! | active help | `<PROGRAM>_ACTIVE_HELP` | `DISPATCH_ACTIVE_HELP` |
//! | descriptions | `<PROGRAM>_COMPLETION_DESCRIPTIONS` | `DISPATCH_COMPLETION_DESCRIPTIONS` |
//!
//! `<PROGRAM>` is the root name upper-cased with every non-alphanumeric
//! character replaced by `_`.
//!
//! # Examples
//!
//! ```
//! use std::collections::HashMap;
//! use command_dispatch_core::env::{active_help_enabled, config_env_var};
//!
//! assert_eq!(config_env_var("my-app", "ACTIVE_HELP"), "MY_APP_ACTIVE_HELP");
//!
//! let mut env = HashMap::new();
//! env.insert("DISPATCH_ACTIVE_HELP".to_string(), "0".to_string());
//! env.insert("MY_APP_ACTIVE_HELP".to_string(), "1".to_string());
//! assert!(!active_help_enabled(&env, "my-app"));
//! ```

use std::collections::HashMap;

use crate::flag::parse_bool;

/// Prefix of the global variables.
pub const GLOBAL_PROGRAM: &str = "dispatch";
pub const ACTIVE_HELP_SUFFIX: &str = "ACTIVE_HELP";
pub const DESCRIPTIONS_SUFFIX: &str = "COMPLETION_DESCRIPTIONS";
/// Value that disables active help.
pub const ACTIVE_HELP_DISABLE: &str = "0";

/// Source of environment variables.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Name of the variable holding `suffix` for `program`.
pub fn config_env_var(program: &str, suffix: &str) -> String {
    let name: String = format!("{program}_{suffix}")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    name
}

/// Reads `suffix` for `program`, falling back to the global variable when
/// the per-program one is unset or empty.
pub fn env_config(env: &dyn EnvSource, program: &str, suffix: &str) -> Option<String> {
    env.var(&config_env_var(program, suffix))
        .filter(|v| !v.is_empty())
        .or_else(|| {
            env.var(&config_env_var(GLOBAL_PROGRAM, suffix))
                .filter(|v| !v.is_empty())
        })
}

/// Active-help configuration for `program`.
///
/// A global value of `"0"` wins over everything; otherwise the per-program
/// value (possibly empty) is returned.
pub fn active_help_config(env: &dyn EnvSource, program: &str) -> String {
    let global = env
        .var(&config_env_var(GLOBAL_PROGRAM, ACTIVE_HELP_SUFFIX))
        .unwrap_or_default();
    if global == ACTIVE_HELP_DISABLE {
        return global;
    }
    env.var(&config_env_var(program, ACTIVE_HELP_SUFFIX))
        .unwrap_or_default()
}

pub fn active_help_enabled(env: &dyn EnvSource, program: &str) -> bool {
    active_help_config(env, program) != ACTIVE_HELP_DISABLE
}

/// Whether the environment asks for descriptions; `None` when it does not
/// say (unset or unparsable).
pub fn descriptions_override(env: &dyn EnvSource, program: &str) -> Option<bool> {
    env_config(env, program, DESCRIPTIONS_SUFFIX).and_then(|v| parse_bool(&v))
}
