use serde_json::Value;

const BODY_PREVIEW_LIMIT: usize = 256;
const LIST_WRAPPER_KEYS: [&str; 3] = ["items", "alerts", "data"];

/// Extract a record list from a listing response.
///
/// Accepts a bare array or an object holding the array under `items`,
/// `alerts` or `data` (first match wins). Returns `None` for any other shape.
pub fn unwrap_list(body: Value) -> Option<Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => LIST_WRAPPER_KEYS.iter().find_map(|key| {
            match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            }
        }),
        _ => None,
    }
}

pub(super) fn body_preview(body: &[u8]) -> String {
    if body.is_empty() {
        return "<empty>".to_string();
    }
    let end = body.len().min(BODY_PREVIEW_LIMIT);
    let mut preview = String::from_utf8_lossy(&body[..end]).to_string();
    if body.len() > BODY_PREVIEW_LIMIT {
        preview.push_str("...");
    }
    preview.replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::{body_preview, unwrap_list};
    use serde_json::json;

    #[test]
    fn bare_arrays_and_known_wrappers_are_unwrapped() {
        assert_eq!(unwrap_list(json!([1, 2])), Some(vec![json!(1), json!(2)]));
        assert_eq!(unwrap_list(json!({"items": [1]})), Some(vec![json!(1)]));
        assert_eq!(unwrap_list(json!({"alerts": [2]})), Some(vec![json!(2)]));
        assert_eq!(unwrap_list(json!({"data": [3]})), Some(vec![json!(3)]));
    }

    #[test]
    fn items_wins_over_other_wrappers() {
        let body = json!({"data": [3], "items": [1], "alerts": [2]});
        assert_eq!(unwrap_list(body), Some(vec![json!(1)]));
    }

    #[test]
    fn non_array_wrappers_are_skipped() {
        assert_eq!(
            unwrap_list(json!({"items": "nope", "data": [4]})),
            Some(vec![json!(4)])
        );
        assert_eq!(unwrap_list(json!({"results": []})), None);
        assert_eq!(unwrap_list(json!("text")), None);
    }

    #[test]
    fn preview_is_bounded() {
        assert_eq!(body_preview(b""), "<empty>");
        let long = vec![b'a'; 300];
        let preview = body_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.len(), 259);
    }
}
