//! Identity and policy types consumed by the partitioners.
//!
//! A [`Principal`] is an opaque identity over which access control reasons; a
//! [`BucketLabel`] groups principals for co-compression. Both the
//! `access_control` and `partition` policies are pure, total functions
//! supplied by the embedding application.

use std::collections::BTreeMap;

/// A single named attribute value on a [`Principal`].
///
/// Stored as a tagged variant rather than a dynamic attribute bag so that
/// equality and hashing are well-defined without runtime type reflection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeValue {
    /// A UTF-8 string attribute.
    Text(String),
    /// A signed integer attribute.
    Int(i64),
    /// A boolean attribute.
    Bool(bool),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// An opaque identity over which access control reasons.
///
/// Equality and hashing are derived from the sorted attribute set plus the
/// `null` flag, so two principals built with the same attributes in a
/// different insertion order compare equal. A `Principal` is never mutated
/// after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    attributes: BTreeMap<String, AttributeValue>,
    null: bool,
}

impl Principal {
    /// Builds a principal from a set of named attributes.
    pub fn new(attributes: impl IntoIterator<Item = (String, AttributeValue)>) -> Self {
        Self {
            attributes: attributes.into_iter().collect(),
            null: false,
        }
    }

    /// The sentinel "no-view" principal, used for bytes that belong to no
    /// one: format headers, schema rows, index pages, structural padding.
    pub fn null() -> Self {
        Self {
            attributes: BTreeMap::new(),
            null: true,
        }
    }

    /// Whether this is the null (no-view) principal.
    pub fn is_null(&self) -> bool {
        self.null
    }

    /// Look up a single attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Iterate attributes in sorted-by-name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A string grouping one or more principals for the purpose of
/// co-compression.
pub type BucketLabel = String;

/// Maps a data unit to the principal that owns it. Must be pure and total,
/// and must return [`Principal::null`] for structural/metadata units.
pub type AccessControlPolicy<'a, D> = dyn Fn(&D) -> Principal + 'a;

/// Maps a principal to the bucket it co-compresses with. Must be pure and
/// total; `Principal::null()` must map to a stable sentinel bucket.
pub type PartitionPolicy<'a> = dyn Fn(&Principal) -> BucketLabel + 'a;

/// The default bucket label the null principal is expected to map to by
/// partition policies built with [`attribute_partition_policy`].
pub const NULL_BUCKET: &str = "null";

/// A partition policy that groups principals by a single named attribute,
/// e.g. `attribute_partition_policy("gid")` groups by the `gid` attribute's
/// textual representation. The null principal always maps to [`NULL_BUCKET`].
pub fn attribute_partition_policy(attr: &str) -> impl Fn(&Principal) -> BucketLabel + '_ {
    move |p: &Principal| {
        if p.is_null() {
            return NULL_BUCKET.to_string();
        }
        match p.attribute(attr) {
            Some(AttributeValue::Text(s)) => s.clone(),
            Some(AttributeValue::Int(i)) => i.to_string(),
            Some(AttributeValue::Bool(b)) => b.to_string(),
            None => NULL_BUCKET.to_string(),
        }
    }
}
