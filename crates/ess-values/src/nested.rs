//! Nested value access by dotted path
//!
//! [`get`], [`set`] and [`remove`] are the only primitives that touch the
//! structure of a configuration tree. A segment addresses a key when the
//! container is a mapping and an index when it is a sequence.
//!
//! Absence is never an error: `get` returns `None` and `remove` is a no-op
//! when any segment does not resolve. `set` creates intermediate mappings and
//! reports a [`PathConflict`] when an existing value is in the way, unless
//! the caller opts into [`ConflictPolicy::Overwrite`].

use serde_yaml::{Mapping, Value};

use crate::path::{resolve_index, split, ValuePath};

/// How [`set_with`] treats an intermediate value that is not a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Report a [`PathConflict`] and leave the document unchanged at that point
    #[default]
    Strict,
    /// Replace the value with a fresh mapping (legacy behavior, destructive)
    Overwrite,
}

/// A write that could not be performed without destroying existing data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathConflict {
    /// Writing to the document root is not supported
    #[error("cannot set a value at an empty path")]
    EmptyPath,

    /// A scalar sits where a mapping is needed
    #[error("'{path}' holds a {found} where a mapping is required")]
    NotAMapping {
        /// Path of the blocking value (empty for the root)
        path: String,
        /// Kind of value found
        found: &'static str,
    },

    /// Sequences are never grown by `set`
    #[error("segment '{segment}' does not address an existing item of '{path}' (length {len})")]
    IndexOutOfRange {
        /// Path of the sequence
        path: String,
        /// Offending segment
        segment: String,
        /// Sequence length
        len: usize,
    },
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Mapping(map) => map.get(segment),
        Value::Sequence(seq) => resolve_index(segment, seq.len()).and_then(|i| seq.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Mapping(map) => map.get_mut(segment),
        Value::Sequence(seq) => {
            let index = resolve_index(segment, seq.len())?;
            seq.get_mut(index)
        }
        _ => None,
    }
}

/// Human-readable name of a value's kind
#[must_use]
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Get the value at `path`
///
/// An empty path returns the whole document. Callers should not rely on
/// that: it is a convenience, not an addressable location.
#[must_use]
pub fn get<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    split(path).try_fold(doc, |current, segment| child(current, segment))
}

/// Get a mutable reference to the value at `path`
#[must_use]
pub fn get_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    split(path).try_fold(doc, |current, segment| child_mut(current, segment))
}

/// Set `value` at `path`, creating intermediate mappings
///
/// # Errors
/// Returns [`PathConflict`] when a scalar blocks the path, when a sequence
/// index is out of range, or when `path` is empty.
pub fn set(doc: &mut Value, path: &str, value: Value) -> Result<(), PathConflict> {
    set_with(doc, path, value, ConflictPolicy::Strict)
}

/// Set `value` at `path` with an explicit conflict policy
///
/// Missing and `null` intermediates always become mappings. Under
/// [`ConflictPolicy::Overwrite`] scalars do too, discarding their value.
///
/// # Errors
/// See [`set`]. Out-of-range sequence indices fail under both policies.
pub fn set_with(
    doc: &mut Value,
    path: &str,
    value: Value,
    policy: ConflictPolicy,
) -> Result<(), PathConflict> {
    let segments: Vec<&str> = split(path).collect();
    if segments.is_empty() {
        return Err(PathConflict::EmptyPath);
    }

    let mut current = doc;
    for (position, segment) in segments.iter().enumerate() {
        let location = segments[..position].join(".");
        ensure_container(current, policy, &location)?;
        let is_last = position + 1 == segments.len();

        current = match current {
            Value::Mapping(map) => {
                let key = Value::String((*segment).to_string());
                if is_last {
                    map.insert(key, value);
                    return Ok(());
                }
                map.entry(key).or_insert(Value::Null)
            }
            Value::Sequence(seq) => {
                let len = seq.len();
                let Some(index) = resolve_index(segment, len) else {
                    return Err(PathConflict::IndexOutOfRange {
                        path: location,
                        segment: (*segment).to_string(),
                        len,
                    });
                };
                if is_last {
                    seq[index] = value;
                    return Ok(());
                }
                &mut seq[index]
            }
            other => {
                return Err(PathConflict::NotAMapping {
                    path: location,
                    found: kind_of(other),
                })
            }
        };
    }

    Ok(())
}

fn ensure_container(
    current: &mut Value,
    policy: ConflictPolicy,
    location: &str,
) -> Result<(), PathConflict> {
    if current.is_mapping() || current.is_sequence() {
        return Ok(());
    }
    if current.is_null() || policy == ConflictPolicy::Overwrite {
        *current = Value::Mapping(Mapping::new());
        return Ok(());
    }
    Err(PathConflict::NotAMapping {
        path: location.to_string(),
        found: kind_of(current),
    })
}

/// Remove the value at `path`, returning it
///
/// No-op when the path does not fully resolve. Removing a sequence item
/// shifts the following items down by one. Sibling keys keep their order.
pub fn remove(doc: &mut Value, path: &str) -> Option<Value> {
    let segments: Vec<&str> = split(path).collect();
    let (last, parents) = segments.split_last()?;
    let parent = parents
        .iter()
        .try_fold(doc, |current, segment| child_mut(current, segment))?;

    match parent {
        Value::Mapping(map) => map.shift_remove(*last),
        Value::Sequence(seq) => {
            let index = resolve_index(last, seq.len())?;
            Some(seq.remove(index))
        }
        _ => None,
    }
}

/// Check whether a document carries no configuration at all
///
/// `null` and the empty mapping are empty. Mappings that only contain empty
/// mappings are not: their keys are still present.
#[inline]
#[must_use]
pub fn is_empty_document(doc: &Value) -> bool {
    match doc {
        Value::Null => true,
        Value::Mapping(map) => map.is_empty(),
        _ => false,
    }
}

/// Collect every string leaf with the path that reaches it
///
/// Mapping keys that are not strings are skipped. Order follows the
/// document: mapping insertion order, then sequence order.
#[must_use]
pub fn string_leaves(doc: &Value) -> Vec<(ValuePath, &str)> {
    let mut leaves = Vec::new();
    collect_leaves(doc, &ValuePath::root(), &mut leaves);
    leaves
}

fn collect_leaves<'a>(value: &'a Value, at: &ValuePath, leaves: &mut Vec<(ValuePath, &'a str)>) {
    match value {
        Value::String(s) => leaves.push((at.clone(), s.as_str())),
        Value::Mapping(map) => {
            for (key, nested) in map {
                if let Value::String(key) = key {
                    collect_leaves(nested, &at.child(key), leaves);
                }
            }
        }
        Value::Sequence(seq) => {
            for (index, nested) in seq.iter().enumerate() {
                collect_leaves(nested, &at.child(index), leaves);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn sample() -> Value {
        doc(r"
server_name: example.com
database:
  args:
    host: postgres
    port: 5432
listeners:
  - port: 8008
    type: http
  - port: 9000
    type: metrics
")
    }

    #[test]
    fn get_nested_key() {
        let config = sample();
        assert_eq!(
            get(&config, "database.args.host"),
            Some(&Value::String("postgres".into()))
        );
        assert_eq!(get(&config, "server_name").and_then(Value::as_str), Some("example.com"));
    }

    #[test]
    fn get_sequence_index() {
        let config = sample();
        assert_eq!(get(&config, "listeners.1.type").and_then(Value::as_str), Some("metrics"));
        assert_eq!(get(&config, "listeners.-1.port").and_then(Value::as_u64), Some(9000));
        assert_eq!(get(&config, "listeners.-2.port").and_then(Value::as_u64), Some(8008));
        assert_eq!(get(&config, "listeners.-0.port").and_then(Value::as_u64), Some(8008));
    }

    #[test]
    fn get_absent_is_none() {
        let config = sample();
        assert_eq!(get(&config, "database.args.password"), None);
        assert_eq!(get(&config, "server_name.nested"), None);
        assert_eq!(get(&config, "listeners.2.port"), None);
        assert_eq!(get(&config, "listeners.first.port"), None);
    }

    #[test]
    fn get_empty_path_returns_document() {
        // Convenience only; no caller addresses the root this way.
        let config = sample();
        assert_eq!(get(&config, ""), Some(&config));
    }

    #[test]
    fn set_creates_intermediate_mappings() {
        let mut target = Value::Mapping(Mapping::new());
        set(&mut target, "synapse.postgres.host", "postgres".into()).unwrap();
        assert_eq!(target, doc("synapse: {postgres: {host: postgres}}"));
    }

    #[test]
    fn set_on_null_document() {
        let mut target = Value::Null;
        set(&mut target, "serverName", "example.com".into()).unwrap();
        assert_eq!(target, doc("serverName: example.com"));
    }

    #[test]
    fn set_existing_sequence_index() {
        let mut config = sample();
        set(&mut config, "listeners.0.port", 8448.into()).unwrap();
        assert_eq!(get(&config, "listeners.0.port").and_then(Value::as_u64), Some(8448));
    }

    #[test]
    fn set_does_not_grow_sequences() {
        let mut config = sample();
        let err = set(&mut config, "listeners.5.port", 1.into()).unwrap_err();
        assert!(matches!(err, PathConflict::IndexOutOfRange { len: 2, .. }));
        assert_eq!(config, sample());
    }

    #[test]
    fn set_strict_reports_scalar_conflict() {
        let mut config = sample();
        let err = set(&mut config, "server_name.host", "x".into()).unwrap_err();
        assert_eq!(
            err,
            PathConflict::NotAMapping {
                path: "server_name".into(),
                found: "string"
            }
        );
        assert_eq!(config, sample());
    }

    #[test]
    fn set_overwrite_replaces_scalar_with_mapping() {
        let mut config = sample();
        set_with(&mut config, "server_name.host", "x".into(), ConflictPolicy::Overwrite).unwrap();
        assert_eq!(get(&config, "server_name"), Some(&doc("host: x")));
    }

    #[test]
    fn set_empty_path_is_rejected() {
        let mut config = sample();
        assert_eq!(set(&mut config, "", 1.into()), Err(PathConflict::EmptyPath));
    }

    #[test]
    fn remove_nested_key_keeps_siblings_in_order() {
        let mut config = doc("a: 1\nb: 2\nc: 3\n");
        assert_eq!(remove(&mut config, "b"), Some(Value::from(2)));
        let keys: Vec<_> = config
            .as_mapping()
            .unwrap()
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn remove_sequence_item_shifts_indices() {
        let mut config = sample();
        remove(&mut config, "listeners.0");
        assert_eq!(get(&config, "listeners.0.type").and_then(Value::as_str), Some("metrics"));
        assert_eq!(get(&config, "listeners.1"), None);
    }

    #[test]
    fn remove_unresolved_path_is_noop() {
        let mut config = sample();
        assert_eq!(remove(&mut config, "database.nope.host"), None);
        assert_eq!(remove(&mut config, "server_name.host"), None);
        assert_eq!(remove(&mut config, ""), None);
        assert_eq!(config, sample());
    }

    #[test]
    fn empty_document_detection() {
        assert!(is_empty_document(&Value::Null));
        assert!(is_empty_document(&doc("{}")));
        assert!(!is_empty_document(&doc("database: {args: {}}")));
    }

    #[test]
    fn string_leaves_reports_paths() {
        let config = doc(r"
templates:
  custom_template_directory: /data/templates
federation_custom_ca_list:
  - /data/ca1.pem
  - /data/ca2.pem
port: 8008
");
        let leaves: Vec<_> = string_leaves(&config)
            .into_iter()
            .map(|(path, value)| (String::from(path), value))
            .collect();
        assert_eq!(
            leaves,
            vec![
                ("templates.custom_template_directory".to_string(), "/data/templates"),
                ("federation_custom_ca_list.0".to_string(), "/data/ca1.pem"),
                ("federation_custom_ca_list.1".to_string(), "/data/ca2.pem"),
            ]
        );
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z_][a-z0-9_]{0,7}"
    }

    proptest! {
        #[test]
        fn set_then_get_round_trips(
            segments in prop::collection::vec(segment(), 1..6),
            n in any::<i64>(),
        ) {
            let path = segments.join(".");
            let mut target = Value::Mapping(Mapping::new());
            set(&mut target, &path, Value::from(n)).unwrap();
            prop_assert_eq!(get(&target, &path), Some(&Value::from(n)));
        }

        #[test]
        fn remove_then_get_is_absent(segments in prop::collection::vec(segment(), 1..6)) {
            let path = segments.join(".");
            let mut target = Value::Mapping(Mapping::new());
            set(&mut target, &path, Value::Bool(true)).unwrap();
            prop_assert!(remove(&mut target, &path).is_some());
            prop_assert_eq!(get(&target, &path), None);
        }
    }
}
