//! Request Value Extractor: four independent value buckets per request.
//!
//! | Bucket | Source                                                      |
//! |--------|-------------------------------------------------------------|
//! | path   | captures handed over by the routing layer                   |
//! | query  | the query string                                            |
//! | body   | url-encoded or multipart form fields, then JSON object keys |
//! | files  | multipart parts that carry a filename                       |
//!
//! Multi-valued keys become lists. With bracket expansion enabled,
//! `name[]` appends to a list and `name[key]` nests a map, recursively.

use super::multipart::{boundary_from_content_type, parse_multipart, UploadedFile};
use super::request::{HandlerRequest, ParamVec};
use crate::schema::{ErrorDetail, LocSegment};
use http::Method;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Ordered multi-map: every value seen for a key, in arrival order.
pub type MultiMap<V> = IndexMap<String, Vec<V>>;

/// An extracted value: single, repeated, or bracket-nested.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted<V> {
    One(V),
    Many(Vec<V>),
    Nested(IndexMap<String, Extracted<V>>),
}

impl<V> Extracted<V> {
    /// First leaf value, depth-first.
    #[must_use]
    pub fn first(&self) -> Option<&V> {
        match self {
            Extracted::One(v) => Some(v),
            Extracted::Many(vs) => vs.first(),
            Extracted::Nested(map) => map.values().find_map(Extracted::first),
        }
    }

    /// Every leaf value, depth-first.
    #[must_use]
    pub fn all(&self) -> Vec<&V> {
        match self {
            Extracted::One(v) => vec![v],
            Extracted::Many(vs) => vs.iter().collect(),
            Extracted::Nested(map) => map.values().flat_map(Extracted::all).collect(),
        }
    }
}

impl Extracted<String> {
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            Extracted::One(s) => Value::String(s),
            Extracted::Many(vs) => Value::Array(vs.into_iter().map(Value::String).collect()),
            Extracted::Nested(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect(),
            ),
        }
    }
}

/// Group `(key, value)` pairs into a multi-map.
pub fn multi_map<V, I>(pairs: I) -> MultiMap<V>
where
    I: IntoIterator<Item = (String, V)>,
{
    let mut map: MultiMap<V> = IndexMap::new();
    for (key, value) in pairs {
        map.entry(key).or_default().push(value);
    }
    map
}

fn insert_bracketed<V>(
    target: &mut IndexMap<String, Extracted<V>>,
    key: &str,
    segments: &[&str],
    value: Extracted<V>,
) -> bool {
    let Some((segment, rest)) = segments.split_first() else {
        target.insert(key.to_string(), value);
        return true;
    };
    if segment.is_empty() {
        // `[]` only ever terminates a key
        if !rest.is_empty() {
            return false;
        }
        let entry = target
            .entry(key.to_string())
            .or_insert_with(|| Extracted::Many(Vec::new()));
        return match (entry, value) {
            (Extracted::Many(list), Extracted::One(v)) => {
                list.push(v);
                true
            }
            (Extracted::Many(list), Extracted::Many(vs)) => {
                list.extend(vs);
                true
            }
            _ => false,
        };
    }
    let entry = target
        .entry(key.to_string())
        .or_insert_with(|| Extracted::Nested(IndexMap::new()));
    match entry {
        Extracted::Nested(inner) => insert_bracketed(inner, segment, rest, value),
        _ => false,
    }
}

/// Flatten a multi-map: repeated keys become lists, bracket keys nest.
///
/// Malformed bracket keys (`a[][x]`, or a path colliding with a value of a
/// different shape) are skipped.
pub fn get_values<V>(data: MultiMap<V>, use_square_brackets: bool) -> IndexMap<String, Extracted<V>> {
    let mut result: IndexMap<String, Extracted<V>> = IndexMap::new();
    for (key, mut values) in data {
        let value = if values.len() > 1 {
            Extracted::Many(values)
        } else {
            match values.pop() {
                Some(v) => Extracted::One(v),
                None => continue,
            }
        };
        if use_square_brackets && key.contains('[') {
            let mut parts = key.split('[');
            let head = parts.next().unwrap_or_default();
            let segments: Vec<&str> = parts.map(|p| p.trim_end_matches(']')).collect();
            if !insert_bracketed(&mut result, head, &segments, value) {
                warn!(key = %key, "Skipping malformed bracket key");
            }
        } else {
            result.insert(key, value);
        }
    }
    result
}

/// The four buckets for one request.
#[derive(Debug, Default)]
pub struct ExtractedValues {
    pub path: Map<String, Value>,
    pub query: Map<String, Value>,
    pub body: Map<String, Value>,
    pub files: IndexMap<String, Extracted<UploadedFile>>,
}

fn decode_pairs(raw: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn to_json_map(values: IndexMap<String, Extracted<String>>) -> Map<String, Value> {
    values.into_iter().map(|(k, v)| (k, v.into_json())).collect()
}

fn body_error(msg: impl Into<String>) -> ErrorDetail {
    ErrorDetail::new(vec![LocSegment::from("body")], msg)
}

/// Extract every bucket from `request`.
///
/// Form bodies are read for POST, PUT and PATCH; a JSON object body is read
/// for any method and overrides same-named form keys. A JSON body that does
/// not parse, or is not an object, fails with a `["body"]`-located error.
pub fn extract(
    request: &HandlerRequest,
    path_params: &ParamVec,
    use_square_brackets: bool,
) -> Result<ExtractedValues, ErrorDetail> {
    let path = path_params
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
        .collect();

    let query = to_json_map(get_values(
        multi_map(decode_pairs(request.query_string.as_bytes())),
        use_square_brackets,
    ));

    let mut body = Map::new();
    let mut files = IndexMap::new();
    let content_type = request.content_type();
    let form_method = matches!(request.method, Method::POST | Method::PUT | Method::PATCH);

    match content_type.as_deref() {
        Some("application/x-www-form-urlencoded") if form_method => {
            body = to_json_map(get_values(multi_map(decode_pairs(&request.body)), use_square_brackets));
        }
        Some("multipart/form-data") if form_method => {
            let boundary = request
                .get_header("content-type")
                .and_then(boundary_from_content_type)
                .unwrap_or_default();
            let form = parse_multipart(request.body.clone(), &boundary)
                .map_err(|e| body_error(e.to_string()))?;
            debug!(
                request_id = %request.request_id,
                fields = form.fields.len(),
                files = form.files.len(),
                "Parsed multipart body"
            );
            body = to_json_map(get_values(multi_map(form.fields), use_square_brackets));
            files = get_values(multi_map(form.files), use_square_brackets);
        }
        Some("application/json") if !request.body.iter().all(u8::is_ascii_whitespace) => {
            match serde_json::from_slice::<Value>(&request.body) {
                Ok(Value::Object(object)) => body.extend(object),
                Ok(_) => return Err(body_error("Expected `object` JSON body")),
                Err(e) => return Err(body_error(format!("Invalid JSON body: {e}"))),
            }
        }
        _ => {}
    }

    Ok(ExtractedValues {
        path,
        query,
        body,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flatten(query: &str, brackets: bool) -> Value {
        Value::Object(to_json_map(get_values(
            multi_map(decode_pairs(query.as_bytes())),
            brackets,
        )))
    }

    #[test]
    fn test_repeated_keys_become_lists() {
        assert_eq!(flatten("tags=a&tags=b&q=x", true), json!({"tags": ["a", "b"], "q": "x"}));
    }

    #[test]
    fn test_bracket_map_and_list() {
        assert_eq!(
            flatten("filters[title]=X&filters[author_id]=1&ids[]=1&ids[]=2", true),
            json!({"filters": {"title": "X", "author_id": "1"}, "ids": ["1", "2"]})
        );
        assert_eq!(
            flatten("a[b][]=1&a[b][]=2&a[c][d]=3", true),
            json!({"a": {"b": ["1", "2"], "c": {"d": "3"}}})
        );
    }

    #[test]
    fn test_brackets_disabled_keeps_raw_keys() {
        assert_eq!(flatten("ids[]=1", false), json!({"ids[]": "1"}));
    }

    #[test]
    fn test_malformed_bracket_keys_skipped() {
        assert_eq!(flatten("a[][x]=1&b=2", true), json!({"b": "2"}));
        assert_eq!(flatten("c=1&c[x]=2", true), json!({"c": "1"}));
        assert_eq!(flatten("d[x]=1&d[]=2", true), json!({"d": {"x": "1"}}));
    }

    #[test]
    fn test_json_body_merged_for_any_method() {
        let req = HandlerRequest::new(Method::DELETE, "/x").json(&json!({"reason": "spam"}));
        let values = extract(&req, &ParamVec::new(), true).unwrap();
        assert_eq!(values.body.get("reason"), Some(&json!("spam")));
    }

    #[test]
    fn test_form_body_ignored_for_get() {
        let req = HandlerRequest::get("/x").form(&[("a", "1")]);
        let values = extract(&req, &ParamVec::new(), true).unwrap();
        assert!(values.body.is_empty());
    }

    #[test]
    fn test_invalid_json_is_located_at_body() {
        let req = HandlerRequest::post("/x")
            .header("content-type", "application/json")
            .body("{nope");
        let err = extract(&req, &ParamVec::new(), true).unwrap_err();
        assert_eq!(err.loc, vec![LocSegment::from("body")]);

        let req = HandlerRequest::post("/x").json(&json!([1, 2]));
        assert!(extract(&req, &ParamVec::new(), true).is_err());
    }

    #[test]
    fn test_blank_json_body_is_empty() {
        let req = HandlerRequest::post("/x")
            .header("content-type", "application/json")
            .body("  \n");
        assert!(extract(&req, &ParamVec::new(), true).unwrap().body.is_empty());
    }
}
