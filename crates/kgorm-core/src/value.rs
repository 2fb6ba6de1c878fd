//! # Field Values
//!
//! The dynamic value held by one property of a `KgObject` or `EmbeddedMetadata`.

use crate::object::{EmbeddedMetadata, KgObject};
use crate::proxy::{KgProxy, KgQuery};
use chrono::{DateTime, FixedOffset, NaiveDate};

/// A property value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    #[default]
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Iri(String),
    Embedded(EmbeddedMetadata),
    Object(Box<KgObject>),
    Proxy(KgProxy),
    Query(KgQuery),
    List(Vec<FieldValue>),
}

impl FieldValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Short description of the variant, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Str(_) => "string",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "boolean",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Iri(_) => "iri",
            Self::Embedded(_) => "embedded metadata",
            Self::Object(_) => "object",
            Self::Proxy(_) => "proxy",
            Self::Query(_) => "query",
            Self::List(_) => "list",
        }
    }

    /// The elements of a list, the value itself otherwise; nothing for null.
    #[must_use]
    pub fn items(&self) -> Vec<&FieldValue> {
        match self {
            Self::Null => Vec::new(),
            Self::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// Mutable counterpart of [`FieldValue::items`].
    pub fn items_mut(&mut self) -> Vec<&mut FieldValue> {
        match self {
            Self::Null => Vec::new(),
            Self::List(items) => items.iter_mut().collect(),
            other => vec![other],
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Iri(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&KgObject> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_proxy(&self) -> Option<&KgProxy> {
        match self {
            Self::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_embedded(&self) -> Option<&EmbeddedMetadata> {
        match self {
            Self::Embedded(e) => Some(e),
            _ => None,
        }
    }

    /// Instance URI of a linked object or proxy.
    #[must_use]
    pub fn link_id(&self) -> Option<&str> {
        match self {
            Self::Object(obj) => obj.id.as_deref(),
            Self::Proxy(proxy) => Some(&proxy.id),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<DateTime<FixedOffset>> for FieldValue {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<EmbeddedMetadata> for FieldValue {
    fn from(e: EmbeddedMetadata) -> Self {
        Self::Embedded(e)
    }
}

impl From<KgObject> for FieldValue {
    fn from(obj: KgObject) -> Self {
        Self::Object(Box::new(obj))
    }
}

impl From<KgProxy> for FieldValue {
    fn from(proxy: KgProxy) -> Self {
        Self::Proxy(proxy)
    }
}

impl From<KgQuery> for FieldValue {
    fn from(query: KgQuery) -> Self {
        Self::Query(query)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_empty_list_are_null() {
        assert!(FieldValue::Null.is_null());
        assert!(FieldValue::List(Vec::new()).is_null());
        assert!(!FieldValue::from("x").is_null());
    }

    #[test]
    fn items_flatten_single_values() {
        let single = FieldValue::from(3_i64);
        assert_eq!(single.items().len(), 1);
        let list = FieldValue::from(vec!["a", "b"]);
        assert_eq!(list.items().len(), 2);
        assert!(FieldValue::Null.items().is_empty());
    }

    #[test]
    fn option_conversion() {
        assert_eq!(FieldValue::from(None::<String>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some(true)), FieldValue::Bool(true));
    }
}
