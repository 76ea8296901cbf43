//! Declarative command tree definitions.
//!
//! Describes a [`CommandTree`](command_dispatch_core::CommandTree) in JSON or
//! YAML instead of builder code:
//!
//! - [`load`], [`from_json_str`] and [`from_yaml_str`] read a
//!   [`TreeDefinition`].
//! - [`validate_definition`] reports every naming and group problem at once.
//! - [`TreeDefinition::build`] compiles a definition into a tree whose leaf
//!   commands echo their invocation as JSON, and whose flag `choices`
//!   become value completions.
//!
//! # Example
//!
//! ```
//! use command_dispatch_schema::from_json_str;
//!
//! let def = from_json_str(r#"{
//!     "root": {
//!         "use": "app",
//!         "subcommands": [{ "use": "status", "short": "Show status" }]
//!     }
//! }"#).unwrap();
//!
//! let tree = def.build().unwrap();
//! let mut out = Vec::new();
//! tree.execute(&["status"], &mut out).unwrap();
//! assert_eq!(
//!     String::from_utf8(out).unwrap(),
//!     "{\"args\":[],\"command\":\"app status\",\"flags\":{}}\n"
//! );
//! ```

pub mod compile;
pub mod definition;
pub mod error;
pub mod loader;
pub mod validate;

pub use definition::{
    ArgsDefinition, CommandDefinition, CompletionDefinition, FlagDefinition, GroupDefinition,
    KindDefinition, SettingsDefinition, TreeDefinition,
};
pub use error::{DefinitionError, Result, SchemaError};
pub use loader::{from_json_str, from_yaml_str, load};
pub use validate::validate_definition;
