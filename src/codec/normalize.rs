//! Normalization between engine values and the transfer tree
//!
//! The transfer tree is plain `serde_json::Value`: maps, sequences, strings
//! and small numbers, with every big integer encoded as a decimal string.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::amount::Amount;
use crate::error::AirgapError;

/// Top-level fields consumers rely on; kept whenever any strategy can supply them
pub const REQUIRED_EXPORT_FIELDS: [&str; 4] = ["id", "inputs", "outputs", "addresses"];

/// Nesting depth past which normalization emits a placeholder
const MAX_DEPTH: usize = 64;

/// A value as produced by (or handed to) the cryptographic engine
#[derive(Clone)]
pub enum EngineValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    BigInt(Amount),
    Text(String),
    List(Vec<EngineValue>),
    Map(BTreeMap<String, EngineValue>),
    Opaque(Arc<dyn StructuredExportable>),
}

impl EngineValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn big(value: impl Into<Amount>) -> Self {
        Self::BigInt(value.into())
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, EngineValue)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn get(&self, key: &str) -> Option<&EngineValue> {
        match self {
            Self::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_big(&self) -> Option<Amount> {
        match self {
            Self::BigInt(a) => Some(*a),
            _ => None,
        }
    }
}

impl fmt::Debug for EngineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(b) => write!(f, "Bool({})", b),
            Self::Number(n) => write!(f, "Number({})", n),
            Self::BigInt(a) => write!(f, "BigInt({})", a),
            Self::Text(s) => write!(f, "Text({:?})", s),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Map(map) => f.debug_map().entries(map).finish(),
            Self::Opaque(obj) => write!(f, "Opaque({})", obj.type_name()),
        }
    }
}

impl PartialEq for EngineValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Which extraction strategy produced an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStrategy {
    /// The object's own structured export
    Structured,
    /// Enumeration of the object's readable fields
    ReadableFields,
    /// Minimal placeholder; nothing could be extracted
    Placeholder,
}

#[derive(Debug, Clone)]
pub struct Exported {
    pub strategy: ExportStrategy,
    pub value: EngineValue,
}

/// Capability exposed by every opaque engine object
///
/// Implementors override whichever hooks they support. Callers only ever use
/// [`StructuredExportable::export`], which walks the hooks in a fixed order.
pub trait StructuredExportable: Send + Sync {
    /// Short type label, used in placeholders and logs
    fn type_name(&self) -> &str;

    /// The object's own structured export; `None` when unsupported
    fn structured_export(&self) -> Option<Result<EngineValue, String>> {
        None
    }

    /// Readable fields enumerated from the object
    fn readable_fields(&self) -> Vec<(String, EngineValue)> {
        Vec::new()
    }

    /// Identifier for the object, if known without a full export
    fn identifier(&self) -> Option<String> {
        None
    }

    /// Best-effort export: own export, then readable fields, then a placeholder
    fn export(&self) -> Exported {
        let fields = self.readable_fields();

        match self.structured_export() {
            Some(Ok(value)) => {
                return Exported {
                    strategy: ExportStrategy::Structured,
                    value: fill_required_fields(value, &fields),
                };
            }
            Some(Err(e)) => {
                log::debug!("{} structured export failed: {}", self.type_name(), e);
            }
            None => {}
        }

        if !fields.is_empty() {
            return Exported {
                strategy: ExportStrategy::ReadableFields,
                value: EngineValue::Map(fields.into_iter().collect()),
            };
        }

        log::warn!(
            "Nothing extractable from {}, emitting placeholder",
            self.type_name()
        );
        Exported {
            strategy: ExportStrategy::Placeholder,
            value: placeholder(self.type_name(), self.identifier()),
        }
    }
}

/// Copy required top-level fields missing from a structured export
fn fill_required_fields(value: EngineValue, fields: &[(String, EngineValue)]) -> EngineValue {
    match value {
        EngineValue::Map(mut map) => {
            for (name, field) in fields {
                if REQUIRED_EXPORT_FIELDS.contains(&name.as_str()) && !map.contains_key(name) {
                    map.insert(name.clone(), field.clone());
                }
            }
            EngineValue::Map(map)
        }
        other => other,
    }
}

fn placeholder(type_name: &str, id: Option<String>) -> EngineValue {
    EngineValue::map([
        ("type", EngineValue::text(type_name)),
        ("id", id.map(EngineValue::Text).unwrap_or(EngineValue::Null)),
        ("inputs", EngineValue::List(Vec::new())),
        ("outputs", EngineValue::List(Vec::new())),
        ("partial", EngineValue::Bool(true)),
    ])
}

/// Convert an engine value into a transfer tree
///
/// Never fails: unreadable objects degrade to placeholders.
pub fn normalize_for_transfer(value: &EngineValue) -> Value {
    normalize_at(value, 0)
}

fn normalize_at(value: &EngineValue, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String("<max depth exceeded>".to_string());
    }

    match value {
        EngineValue::Null => Value::Null,
        EngineValue::Bool(b) => Value::Bool(*b),
        EngineValue::Number(n) => Value::Number(n.clone()),
        EngineValue::BigInt(a) => Value::String(a.to_string()),
        EngineValue::Text(s) => Value::String(s.clone()),
        EngineValue::List(items) => {
            Value::Array(items.iter().map(|v| normalize_at(v, depth + 1)).collect())
        }
        EngineValue::Map(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), normalize_at(v, depth + 1));
            }
            Value::Object(out)
        }
        EngineValue::Opaque(obj) => {
            let exported = obj.export();
            log::debug!(
                "Exported {} via {:?} strategy",
                obj.type_name(),
                exported.strategy
            );
            normalize_at(&exported.value, depth + 1)
        }
    }
}

/// Convert a transfer tree back into engine values
///
/// Fields named in `integer_fields` are parsed into big integers at any
/// depth; all other fields are carried over unchanged.
pub fn denormalize_for_engine(
    tree: &Value,
    integer_fields: &[&str],
) -> Result<EngineValue, AirgapError> {
    let fields: HashSet<&str> = integer_fields.iter().copied().collect();
    denormalize_at(tree, &fields)
}

fn denormalize_at(tree: &Value, fields: &HashSet<&str>) -> Result<EngineValue, AirgapError> {
    Ok(match tree {
        Value::Null => EngineValue::Null,
        Value::Bool(b) => EngineValue::Bool(*b),
        Value::Number(n) => EngineValue::Number(n.clone()),
        Value::String(s) => EngineValue::Text(s.clone()),
        Value::Array(items) => EngineValue::List(
            items
                .iter()
                .map(|v| denormalize_at(v, fields))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => {
            let mut out = BTreeMap::new();
            for (key, value) in map {
                let converted = if fields.contains(key.as_str()) {
                    EngineValue::BigInt(parse_integer_field(key, value)?)
                } else {
                    denormalize_at(value, fields)?
                };
                out.insert(key.clone(), converted);
            }
            EngineValue::Map(out)
        }
    })
}

fn parse_integer_field(key: &str, value: &Value) -> Result<Amount, AirgapError> {
    match value {
        Value::String(s) => Amount::parse_decimal(s)
            .map_err(|_| AirgapError::malformed(format!("field '{}' holds '{}', not a decimal integer", key, s))),
        Value::Number(n) => n
            .as_u64()
            .map(Amount::from)
            .ok_or_else(|| AirgapError::malformed(format!("field '{}' holds non-integer {}", key, n))),
        other => Err(AirgapError::malformed(format!(
            "field '{}' holds {}, not a decimal integer",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Exporting;

    impl StructuredExportable for Exporting {
        fn type_name(&self) -> &str {
            "Transaction"
        }

        fn structured_export(&self) -> Option<Result<EngineValue, String>> {
            Some(Ok(EngineValue::map([
                ("outputs", EngineValue::List(vec![EngineValue::big(5u64)])),
                ("fee", EngineValue::big(1u64)),
            ])))
        }

        fn readable_fields(&self) -> Vec<(String, EngineValue)> {
            vec![
                ("id".to_string(), EngineValue::text("abc")),
                ("mass".to_string(), EngineValue::big(9u64)),
            ]
        }
    }

    struct FieldsOnly;

    impl StructuredExportable for FieldsOnly {
        fn type_name(&self) -> &str {
            "PendingTransaction"
        }

        fn structured_export(&self) -> Option<Result<EngineValue, String>> {
            Some(Err("handle already consumed".to_string()))
        }

        fn readable_fields(&self) -> Vec<(String, EngineValue)> {
            vec![("id".to_string(), EngineValue::text("def"))]
        }
    }

    struct Sealed;

    impl StructuredExportable for Sealed {
        fn type_name(&self) -> &str {
            "SealedHandle"
        }

        fn identifier(&self) -> Option<String> {
            Some("sealed-1".to_string())
        }
    }

    #[test]
    fn test_big_integers_become_strings() {
        let value = EngineValue::map([
            ("amount", EngineValue::big(u128::MAX)),
            ("memo", EngineValue::text("hi")),
        ]);
        let tree = normalize_for_transfer(&value);
        assert_eq!(
            tree,
            json!({"amount": "340282366920938463463374607431768211455", "memo": "hi"})
        );
    }

    #[test]
    fn test_structured_export_keeps_required_fields() {
        let value = EngineValue::Opaque(Arc::new(Exporting));
        let tree = normalize_for_transfer(&value);
        assert_eq!(tree["id"], "abc");
        assert_eq!(tree["outputs"], json!(["5"]));
        assert_eq!(tree["fee"], "1");
        // non-required readable fields are not merged into a structured export
        assert!(tree.get("mass").is_none());
    }

    #[test]
    fn test_failed_export_falls_back_to_fields() {
        let exported = FieldsOnly.export();
        assert_eq!(exported.strategy, ExportStrategy::ReadableFields);
        let tree = normalize_for_transfer(&exported.value);
        assert_eq!(tree, json!({"id": "def"}));
    }

    #[test]
    fn test_placeholder_for_unreadable_object() {
        let tree = normalize_for_transfer(&EngineValue::Opaque(Arc::new(Sealed)));
        assert_eq!(tree["id"], "sealed-1");
        assert_eq!(tree["inputs"], json!([]));
        assert_eq!(tree["partial"], true);
    }

    #[test]
    fn test_denormalize_declared_fields_only() {
        let tree = json!({
            "amount": "1000",
            "outputs": [{"value": "7", "address": "tb1q"}],
            "label": "12",
        });
        let value = denormalize_for_engine(&tree, &["amount", "value"]).unwrap();
        assert_eq!(value.get("amount").and_then(|v| v.as_big()), Some(Amount::new(1000)));
        assert_eq!(value.get("label"), Some(&EngineValue::text("12")));
        match value.get("outputs") {
            Some(EngineValue::List(items)) => {
                assert_eq!(items[0].get("value").and_then(|v| v.as_big()), Some(Amount::new(7)));
            }
            other => panic!("unexpected outputs: {:?}", other),
        }
    }

    #[test]
    fn test_denormalize_rejects_negative_amount() {
        let err = denormalize_for_engine(&json!({"amount": "-3"}), &["amount"]).unwrap_err();
        assert!(matches!(err, AirgapError::MalformedPayload(_)));
    }
}
