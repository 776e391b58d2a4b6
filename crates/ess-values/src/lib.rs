//! Dotted-path access over nested YAML configuration trees
//!
//! Configuration documents are plain [`serde_yaml::Value`] trees. This crate
//! addresses locations inside them with dotted paths such as
//! `database.args.host` or `listeners.0.port`, and provides the read, write
//! and remove primitives every migration step is built on.
//!
//! # Example
//!
//! ```
//! use ess_values::{get, set, remove};
//! use serde_yaml::Value;
//!
//! let mut doc = Value::Null;
//! set(&mut doc, "synapse.postgres.host", "db".into()).unwrap();
//! assert_eq!(get(&doc, "synapse.postgres.host").and_then(Value::as_str), Some("db"));
//! assert!(remove(&mut doc, "synapse.postgres.host").is_some());
//! assert!(get(&doc, "synapse.postgres.host").is_none());
//! ```

pub mod nested;
pub mod path;
pub mod render;

pub use nested::{
    get, get_mut, is_empty_document, kind_of, remove, set, set_with, string_leaves,
    ConflictPolicy, PathConflict,
};
pub use path::{resolve_index, PathError, ValuePath};
pub use render::to_yaml;

pub use serde_yaml::{Mapping, Value};
