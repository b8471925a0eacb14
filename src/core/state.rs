//! Strategy state: read-only status and writable params
//!
//! `StateStore` has no synchronization of its own. The controller shares it
//! as `SharedStateStore` and is the only holder of the status mutator.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::warn;

use super::value::{Value, ValueMap};

/// Type alias for shared state access across async tasks
pub type SharedStateStore = Arc<RwLock<StateStore>>;

/// One row of the params table sent to the frontend: `[key, value, kind]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamEntry(pub String, pub Value, pub &'static str);

/// Point-in-time read of status and transformed params
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub status: ValueMap,
    pub params: Vec<ParamEntry>,
}

/// Outcome of merging a request into params
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Keys written, in request order
    pub updated: Vec<String>,
    /// Keys whose value could not be tagged
    pub rejected: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StateStore {
    status: ValueMap,
    params: ValueMap,
}

impl StateStore {
    pub(crate) fn new(status: ValueMap, params: ValueMap) -> Self {
        Self { status, params }
    }

    pub(crate) fn into_shared(self) -> SharedStateStore {
        Arc::new(RwLock::new(self))
    }

    pub fn status(&self) -> &ValueMap {
        &self.status
    }

    pub fn params(&self) -> &ValueMap {
        &self.params
    }

    pub(crate) fn set_status(&mut self, key: &str, value: impl Into<Value>) {
        self.status.insert(key, value);
    }

    /// Merge a JSON request into params.
    ///
    /// Later keys overwrite earlier ones. An integral number written over a
    /// float param stays a float; any other kind change is taken as given.
    /// Null, array and object values are skipped.
    pub fn merge_params(&mut self, request: &serde_json::Map<String, serde_json::Value>) -> MergeReport {
        let mut report = MergeReport::default();

        for (key, raw) in request {
            let Some(value) = Value::from_json(raw) else {
                warn!(key = %key, value = %raw, "Param value is not a primitive, skipping");
                report.rejected.push(key.clone());
                continue;
            };

            let value = match self.params.get(key) {
                Some(previous) => value.preserving_kind(previous.kind()),
                None => value,
            };

            self.params.insert(key.as_str(), value);
            report.updated.push(key.clone());
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Kind;

    fn demo_store() -> StateStore {
        let status: ValueMap = vec![("trade_allow", Value::from(true))].into_iter().collect();
        let params: ValueMap = vec![
            ("binance_on", Value::from(true)),
            ("okx_leverage", Value::from(1.5)),
            ("max_positon", Value::from(10000)),
            ("trade_direction", Value::from("OPEN")),
        ]
        .into_iter()
        .collect();
        StateStore::new(status, params)
    }

    fn request(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("request must be an object"),
        }
    }

    #[test]
    fn test_merge_updates_existing_param() {
        let mut store = demo_store();
        let report = store.merge_params(&request(serde_json::json!({"max_positon": 500})));

        assert_eq!(report.updated, vec!["max_positon".to_string()]);
        assert!(report.rejected.is_empty());
        assert_eq!(store.params().get("max_positon"), Some(&Value::Int(500)));
    }

    #[test]
    fn test_merge_keeps_float_kind_for_integral_number() {
        let mut store = demo_store();
        store.merge_params(&request(serde_json::json!({"okx_leverage": 2})));

        let value = store.params().get("okx_leverage").unwrap();
        assert_eq!(value.kind(), Kind::Float);
        assert_eq!(value, &Value::Float(2.0));
    }

    #[test]
    fn test_merge_explicit_kind_change() {
        let mut store = demo_store();
        store.merge_params(&request(serde_json::json!({"binance_on": "maybe"})));
        assert_eq!(store.params().get("binance_on").unwrap().kind(), Kind::Str);
    }

    #[test]
    fn test_merge_appends_new_keys_in_order() {
        let mut store = demo_store();
        store.merge_params(&request(serde_json::json!({"zeta": 1, "alpha": 2})));

        let keys: Vec<_> = store.params().keys().collect();
        assert_eq!(
            keys,
            vec!["binance_on", "okx_leverage", "max_positon", "trade_direction", "zeta", "alpha"]
        );
    }

    #[test]
    fn test_merge_skips_compound_values() {
        let mut store = demo_store();
        let report = store.merge_params(&request(serde_json::json!({
            "nested": {"a": 1},
            "huobi_on": false,
            "nothing": null,
        })));

        assert_eq!(report.updated, vec!["huobi_on".to_string()]);
        assert_eq!(report.rejected, vec!["nested".to_string(), "nothing".to_string()]);
        assert!(!store.params().contains_key("nested"));
        assert_eq!(store.params().get("huobi_on"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_set_status_overwrites_in_place() {
        let mut store = demo_store();
        store.set_status("updated_at", 1);
        store.set_status("trade_allow", false);

        let keys: Vec<_> = store.status().keys().collect();
        assert_eq!(keys, vec!["trade_allow", "updated_at"]);
        assert_eq!(store.status().get("trade_allow"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_param_entry_serializes_as_array() {
        let entry = ParamEntry("max_positon".to_string(), Value::Int(500), "int");
        assert_eq!(serde_json::to_string(&entry).unwrap(), r#"["max_positon",500,"int"]"#);
    }
}
