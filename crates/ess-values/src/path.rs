//! Dotted locations inside configuration trees
//!
//! Paths travel through the migration as the same dotted text users see in
//! their configuration files and in warnings. [`ValuePath`] keeps that text
//! as-is and splits it on demand.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

const SEPARATOR: char = '.';

/// Split dotted text into segments; the empty string has none
pub(crate) fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(move |_| !path.is_empty())
}

/// Location of a value, stored as dotted text (`database.args.host`)
///
/// Index segments are plain decimal text (`federation_custom_ca_list.0`).
/// Whether a segment is a key or an index depends on the container it is
/// applied to, so the path itself does not distinguish them.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValuePath(String);

impl ValuePath {
    /// The document itself
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Dotted text of this path
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Segments from the root down
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        split(&self.0)
    }

    /// Number of segments; zero for the root
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// True for the document itself
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Path one level further down
    #[must_use]
    pub fn child(&self, segment: impl fmt::Display) -> Self {
        if self.is_root() {
            Self(segment.to_string())
        } else {
            Self(format!("{}{SEPARATOR}{segment}", self.0))
        }
    }

    /// Path of the enclosing container, `None` at the root
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind(SEPARATOR) {
            Some(at) => Self(self.0[..at].to_string()),
            None => Self::root(),
        })
    }

    /// True when `self` is `ancestor` or lies underneath it
    ///
    /// Comparison is per segment: `log_config` does not contain
    /// `log_config_path`.
    #[must_use]
    pub fn is_within(&self, ancestor: &str) -> bool {
        ancestor.is_empty()
            || self.0 == ancestor
            || self
                .0
                .strip_prefix(ancestor)
                .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ValuePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if split(s).any(str::is_empty) {
            return Err(PathError::EmptySegment(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for ValuePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ValuePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ValuePath {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ValuePath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<ValuePath> for String {
    fn from(path: ValuePath) -> Self {
        path.0
    }
}

/// Malformed dotted path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// `a..b`, a leading or a trailing dot
    #[error("path '{0}' contains an empty segment")]
    EmptySegment(String),
}

/// Index addressed by `segment` in a sequence of `len` items
///
/// `-1` is the last item and `-0` is the first, as with signed integer
/// indexing. Non-numeric and out-of-range segments give `None`.
#[must_use]
pub fn resolve_index(segment: &str, len: usize) -> Option<usize> {
    let index = match segment.strip_prefix('-') {
        Some(from_end) => match from_end.parse::<usize>().ok()? {
            0 => 0,
            back => len.checked_sub(back)?,
        },
        None => segment.parse().ok()?,
    };
    (index < len).then_some(index)
}
