//! PropertyMap: the key-value store on entities and relationships.

use std::collections::HashMap;
use super::Value;

/// A map of property names to values. Insertion order is irrelevant.
pub type PropertyMap = HashMap<String, Value>;

/// Build a [`PropertyMap`] from `(key, value)` pairs.
pub fn properties<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> PropertyMap
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
