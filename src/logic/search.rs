use serde_json::Value;

/// Records that can be matched against a free-text search term
pub trait Searchable {
    fn matches(&self, term: &str) -> bool;
}

impl Searchable for Value {
    /// Matches when any scalar field, rendered as text, contains the term.
    fn matches(&self, term: &str) -> bool {
        if term.is_empty() {
            return true;
        }
        match self {
            Value::Object(map) => map.values().any(|v| !v.is_object() && !v.is_array() && v.matches(term)),
            Value::Array(_) => false,
            Value::String(s) => s.contains(term),
            other => other.to_string().contains(term),
        }
    }
}

/// Records of `items` matching `term`, in their original order.
pub fn filter_records<R: Searchable + Clone>(items: &[R], term: &str) -> Vec<R> {
    let term = term.trim();
    items.iter().filter(|r| r.matches(term)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_matches_scalars() {
        let record = json!({"height": 840000, "hash": "00000abc", "nested": {"x": "840000"}});
        assert!(record.matches("8400"));
        assert!(record.matches("abc"));
        assert!(!record.matches("zzz"));
        assert!(record.matches(""));
    }

    #[test]
    fn test_filter_keeps_order() {
        let items = vec![json!({"h": 10}), json!({"h": 21}), json!({"h": 31}), json!({"h": 41})];
        let filtered = filter_records(&items, " 1 ");
        assert_eq!(filtered, vec![json!({"h": 10}), json!({"h": 21}), json!({"h": 31}), json!({"h": 41})]);
        assert_eq!(filter_records(&items, "21"), vec![json!({"h": 21})]);
    }
}
