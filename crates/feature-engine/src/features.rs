//! Canonical Feature Vector Assembly

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered feature names fixed at training time.
///
/// Every vector handed to the scaler and classifier is built through
/// [`FeatureSchema::build`], so prediction and explanation can never
/// disagree on ordering or defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Arc<[String]>,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names: names.into(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Map an arbitrary feature dictionary onto the schema.
    ///
    /// Names are matched exactly (case-sensitive). Missing features become
    /// 0.0 and keys outside the schema are dropped.
    pub fn build(&self, input: &HashMap<String, f64>) -> FeatureVector {
        let values = self
            .names
            .iter()
            .map(|name| input.get(name).copied().unwrap_or(0.0))
            .collect();

        FeatureVector {
            names: Arc::clone(&self.names),
            values,
        }
    }
}

impl From<Vec<String>> for FeatureSchema {
    fn from(names: Vec<String>) -> Self {
        Self::new(names)
    }
}

/// Named numeric values in canonical order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Serializes as a JSON object whose keys keep the canonical order
impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn schema(names: &[&str]) -> FeatureSchema {
        FeatureSchema::new(names.iter().map(|n| n.to_string()).collect())
    }

    fn input(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_missing_feature_defaults_to_zero() {
        let schema = schema(&["sensor_1", "sensor_2"]);
        let vector = schema.build(&input(&[("sensor_1", 12.3)]));
        assert_eq!(vector.values(), &[12.3, 0.0]);
    }

    #[test]
    fn test_extra_keys_dropped_and_order_fixed() {
        let schema = schema(&["cycle", "sensor_2", "sensor_1"]);
        let vector = schema.build(&input(&[
            ("sensor_1", 1.0),
            ("unknown", 99.0),
            ("sensor_2", 2.0),
            ("cycle", 80.0),
        ]));
        assert_eq!(vector.values(), &[80.0, 2.0, 1.0]);
        assert_eq!(vector.get("unknown"), None);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let schema = schema(&["sensor_1"]);
        let vector = schema.build(&input(&[("Sensor_1", 5.0)]));
        assert_eq!(vector.values(), &[0.0]);
    }

    #[test]
    fn test_serializes_in_schema_order() {
        let schema = schema(&["z", "a", "m"]);
        let vector = schema.build(&input(&[("a", 1.5), ("m", -2.0)]));
        let json = serde_json::to_string(&vector).unwrap();
        assert_eq!(json, r#"{"z":0.0,"a":1.5,"m":-2.0}"#);
    }

    #[test]
    fn test_empty_schema() {
        let schema = schema(&[]);
        let vector = schema.build(&input(&[("a", 1.0)]));
        assert!(vector.is_empty());
    }

    proptest! {
        #[test]
        fn prop_build_is_total_and_order_preserving(
            names in prop::collection::btree_set("[a-z_]{1,8}", 0..12),
            extra in prop::collection::hash_map("[A-Za-z_]{1,8}", -1e6f64..1e6, 0..12),
        ) {
            let names: Vec<String> = names.into_iter().collect();
            let schema = FeatureSchema::new(names.clone());
            let vector = schema.build(&extra);

            prop_assert_eq!(vector.len(), names.len());
            prop_assert_eq!(vector.names(), names.as_slice());
            for (name, value) in vector.iter() {
                prop_assert_eq!(value, extra.get(name).copied().unwrap_or(0.0));
            }
        }
    }
}
