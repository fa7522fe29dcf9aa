use serde_json::{Map, Value};
use std::fmt;

/// Stand-in for null or absent quota fields, so no column is ever dropped.
pub const NONE_SENTINEL: &str = "None";

#[derive(Debug, Clone, PartialEq)]
pub enum QuotaValue {
    Number(f64),
    Text(String),
}

impl QuotaValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            QuotaValue::Text(s) => Some(s),
            QuotaValue::Number(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            QuotaValue::Number(n) => Some(*n),
            QuotaValue::Text(_) => None,
        }
    }

    pub fn is_none_sentinel(&self) -> bool {
        self.as_text() == Some(NONE_SENTINEL)
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => QuotaValue::Text(NONE_SENTINEL.to_string()),
            Value::Number(n) => n
                .as_f64()
                .map(QuotaValue::Number)
                .unwrap_or_else(|| QuotaValue::Text(n.to_string())),
            Value::String(s) => QuotaValue::Text(s.clone()),
            Value::Bool(b) => QuotaValue::Text(b.to_string()),
            other => QuotaValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for QuotaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // 500.0 reads better as 500
            QuotaValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            QuotaValue::Number(n) => write!(f, "{}", n),
            QuotaValue::Text(s) => f.write_str(s),
        }
    }
}

/// Flat account status record, without any time dimension.
///
/// Entries keep the order the server sent them in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuotaRecord {
    entries: Vec<(String, QuotaValue)>,
}

impl QuotaRecord {
    /// Builds the record from the server object; `expected` fields missing
    /// from it are filled with the sentinel.
    pub(crate) fn from_object(object: &Map<String, Value>, expected: &[&str]) -> Self {
        let mut entries: Vec<(String, QuotaValue)> = object
            .iter()
            .map(|(k, v)| (k.clone(), QuotaValue::from_json(v)))
            .collect();
        for field in expected {
            if !object.contains_key(*field) {
                entries.push((field.to_string(), QuotaValue::Text(NONE_SENTINEL.to_string())));
            }
        }
        Self { entries }
    }

    pub fn get(&self, field: &str) -> Option<&QuotaValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v)
    }

    pub fn entries(&self) -> &[(String, QuotaValue)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn display(&self, field: &str) -> String {
        self.get(field)
            .map(|v| v.to_string())
            .unwrap_or_else(|| NONE_SENTINEL.to_string())
    }

    fn linkage(&self) -> String {
        match self.get("Cloud Project ID") {
            Some(v) if !v.is_none_sentinel() && !v.to_string().trim().is_empty() => {
                format!("linked ({})", v)
            }
            _ => "not linked".to_string(),
        }
    }

    /// Human-readable usage summary in a fixed order.
    pub fn summary(&self) -> String {
        let lines = [
            ("Tier", self.display("Tier")),
            ("Monthly Requests", self.display("Monthly Requests")),
            ("Max Field IDs", self.display("Max Field IDs")),
            ("Compute Units Used", self.display("Compute Units Used")),
            ("Max Acres", self.display("Max Acres")),
            ("Max Polygons", self.display("Max Polygons")),
            ("Cloud Storage", self.linkage()),
        ];
        let width = lines.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        lines
            .iter()
            .map(|(label, value)| format!("{:<width$}  {}", format!("{}:", label), value, width = width + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for QuotaRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const EXPECTED: &[&str] = &["Tier", "Monthly Requests", "Max Acres", "Cloud Project ID"];

    fn record(value: Value) -> QuotaRecord {
        QuotaRecord::from_object(value.as_object().unwrap(), EXPECTED)
    }

    #[test]
    fn null_and_absent_fields_become_sentinel() {
        let r = record(json!({"Tier": "Basic", "Monthly Requests": 500, "Cloud Project ID": null}));

        assert_eq!(r.get("Tier"), Some(&QuotaValue::Text("Basic".into())));
        assert_eq!(r.get("Monthly Requests").and_then(|v| v.as_f64()), Some(500.0));
        assert!(r.get("Cloud Project ID").unwrap().is_none_sentinel());
        assert!(r.get("Max Acres").unwrap().is_none_sentinel());
        assert_eq!(r.len(), 4);
    }

    #[test]
    fn entries_keep_server_order() {
        let object: Map<String, Value> =
            serde_json::from_str(r#"{"Tier":"Basic","Monthly Requests":500,"Cloud Project ID":"p","Max Acres":10}"#)
                .unwrap();
        let r = QuotaRecord::from_object(&object, EXPECTED);
        let keys: Vec<&str> = r.entries().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["Tier", "Monthly Requests", "Cloud Project ID", "Max Acres"]);
    }

    #[test]
    fn unexpected_fields_are_kept() {
        let r = record(json!({"Tier": "Pro", "Region": "us-west"}));
        assert_eq!(r.get("Region").and_then(|v| v.as_text()), Some("us-west"));
    }

    #[test]
    fn summary_is_in_fixed_order() {
        let r = record(json!({
            "Max Polygons": 100,
            "Tier": "Basic",
            "Monthly Requests": 500,
            "Compute Units Used": 12.5,
            "Cloud Project ID": "my-project"
        }));
        let summary = r.summary();
        let labels: Vec<&str> = summary
            .lines()
            .map(|l| l.split(':').next().unwrap())
            .collect();
        assert_eq!(
            labels,
            vec![
                "Tier",
                "Monthly Requests",
                "Max Field IDs",
                "Compute Units Used",
                "Max Acres",
                "Max Polygons",
                "Cloud Storage"
            ]
        );
        assert!(summary.contains("500\n"));
        assert!(summary.contains("12.5"));
        assert!(summary.contains("linked (my-project)"));
        assert!(summary.lines().nth(2).unwrap().ends_with("None"));
    }

    #[test]
    fn unlinked_account() {
        let r = record(json!({"Tier": "Basic", "Cloud Project ID": null}));
        assert!(r.summary().ends_with("not linked"));
    }
}
