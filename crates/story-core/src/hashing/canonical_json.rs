//! JSON canónico mínimo: claves de objeto ordenadas, arrays en su orden.
//!
//! Dos payloads estructuralmente iguales producen exactamente el mismo
//! string y por lo tanto el mismo hash. No usar NaN/Inf en payloads del
//! pipeline (serde_json tampoco los representa).

use serde_json::Value;
use std::collections::BTreeMap;

pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s).unwrap(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(to_canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        Value::Object(map) => {
            let ordered: BTreeMap<&String, String> =
                map.iter().map(|(k, v)| (k, to_canonical_json(v))).collect();
            let parts: Vec<String> = ordered.into_iter()
                                            .map(|(k, v)| format!("{}:{}", serde_json::to_string(k).unwrap(), v))
                                            .collect();
            format!("{{{}}}", parts.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_are_sorted() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(to_canonical_json(&a), to_canonical_json(&b));
        assert_eq!(to_canonical_json(&a), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn arrays_keep_their_order() {
        let v = json!([3, 1, 2]);
        assert_eq!(to_canonical_json(&v), "[3,1,2]");
    }
}
