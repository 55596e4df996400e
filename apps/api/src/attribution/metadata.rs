/// Flattens the raw attribution cookie JSON into `cookie_`-prefixed
/// string pairs for provider metadata.
///
/// Provider metadata values must be flat strings: null/missing fields are
/// omitted, strings pass through bare, everything else is JSON-stringified.
pub fn flatten_for_metadata(cookie: &serde_json::Value) -> Vec<(String, String)> {
    let Some(object) = cookie.as_object() else {
        return Vec::new();
    };
    object
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let flat = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (format!("cookie_{key}"), flat)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_prefixes_and_stringifies() {
        let cookie = json!({
            "last_utm_source": "facebook",
            "visit_count": 3,
            "fbclid": null,
        });
        let flat = flatten_for_metadata(&cookie);
        assert!(flat.contains(&("cookie_last_utm_source".to_string(), "facebook".to_string())));
        assert!(flat.contains(&("cookie_visit_count".to_string(), "3".to_string())));
        assert!(flat.iter().all(|(k, _)| k != "cookie_fbclid"));
    }

    #[test]
    fn test_flatten_non_object_is_empty() {
        assert!(flatten_for_metadata(&json!("not an object")).is_empty());
        assert!(flatten_for_metadata(&json!(null)).is_empty());
    }
}
