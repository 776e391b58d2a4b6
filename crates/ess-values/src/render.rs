//! YAML rendering
//!
//! Multi-line strings are emitted as literal blocks (`|`) so embedded
//! configuration stays readable in Helm values.

use serde::Serialize;

/// Render a value as a YAML document without the leading `---`
///
/// # Errors
/// Returns the serializer error for values YAML cannot represent.
pub fn to_yaml<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(value)
}
