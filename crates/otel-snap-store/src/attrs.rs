//! Attribute value projection shared by ingest and the query engine.
//!
//! OTLP attribute values are a tagged union (`AnyValue`); queries compare
//! against a lossy string projection so a filter like `attribute_equals`
//! can treat ints, doubles, and bools uniformly. Arrays and kvlists are
//! stringified recursively rather than rejected.

use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value::Value};

#[must_use]
pub fn value_to_string(value: &AnyValue) -> String {
    match &value.value {
        Some(Value::StringValue(s)) => s.clone(),
        Some(Value::BoolValue(b)) => b.to_string(),
        Some(Value::IntValue(i)) => i.to_string(),
        Some(Value::DoubleValue(d)) => d.to_string(),
        Some(Value::ArrayValue(arr)) => {
            let parts: Vec<String> = arr.values.iter().map(value_to_string).collect();
            format!("[{}]", parts.join(", "))
        }
        Some(Value::KvlistValue(kv)) => {
            let parts: Vec<String> = kv
                .values
                .iter()
                .map(|entry| {
                    let v = entry.value.as_ref().map(value_to_string).unwrap_or_default();
                    format!("{}={v}", entry.key)
                })
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        Some(Value::BytesValue(bytes)) => format!("bytes({})", bytes.len()),
        None => String::new(),
    }
}

/// Extract `service.name` from a resource's attributes, defaulting to `"unknown"`.
#[must_use]
pub fn extract_service_name(attributes: &[KeyValue]) -> String {
    find_attribute(attributes, "service.name")
        .map(|v| value_to_string(&v))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[must_use]
pub fn find_attribute(attributes: &[KeyValue], key: &str) -> Option<AnyValue> {
    attributes
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| kv.value.clone())
}

#[must_use]
pub fn has_attribute(attributes: &[KeyValue], key: &str) -> bool {
    attributes.iter().any(|kv| kv.key == key)
}

/// Every entry in `expected` must match an attribute projected to that string.
#[must_use]
pub fn attributes_equal(attributes: &[KeyValue], expected: &std::collections::HashMap<String, String>) -> bool {
    expected.iter().all(|(key, want)| {
        find_attribute(attributes, key)
            .map(|v| value_to_string(&v))
            .is_some_and(|got| &got == want)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::common::v1::any_value::Value;

    fn kv(key: &str, value: Value) -> KeyValue {
        KeyValue {
            key: key.to_string(),
            value: Some(AnyValue { value: Some(value) }),
        }
    }

    #[test]
    fn service_name_defaults_to_unknown() {
        assert_eq!(extract_service_name(&[]), "unknown");
    }

    #[test]
    fn service_name_reads_string_attribute() {
        let attrs = vec![kv("service.name", Value::StringValue("checkout".into()))];
        assert_eq!(extract_service_name(&attrs), "checkout");
    }

    #[test]
    fn value_to_string_handles_array_and_kvlist() {
        use opentelemetry_proto::tonic::common::v1::{ArrayValue, KeyValueList};
        let arr = AnyValue {
            value: Some(Value::ArrayValue(ArrayValue {
                values: vec![
                    AnyValue { value: Some(Value::IntValue(1)) },
                    AnyValue { value: Some(Value::IntValue(2)) },
                ],
            })),
        };
        assert_eq!(value_to_string(&arr), "[1, 2]");

        let kv_list = AnyValue {
            value: Some(Value::KvlistValue(KeyValueList {
                values: vec![kv("a", Value::BoolValue(true))],
            })),
        };
        assert_eq!(value_to_string(&kv_list), "{a=true}");
    }
}
