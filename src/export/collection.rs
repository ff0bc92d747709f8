//! Postman v2.1 collection documents

use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::ExportError;
use crate::models::{CompletedRequest, HeaderEntry};

pub const COLLECTION_NAME: &str = "Recorded XHR Requests";
pub const COLLECTION_SCHEMA: &str =
    "https://schema.getpostman.com/json/collection/v2.1.0/collection.json";

#[derive(Debug, Serialize)]
struct Collection {
    info: CollectionInfo,
    item: Vec<CollectionItem>,
}

#[derive(Debug, Serialize)]
struct CollectionInfo {
    name: &'static str,
    schema: &'static str,
}

#[derive(Debug, Serialize)]
struct CollectionItem {
    name: String,
    request: ItemRequest,
}

#[derive(Debug, Serialize)]
struct ItemRequest {
    method: String,
    header: Vec<KeyValue>,
    url: ItemUrl,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<ItemBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyValue {
    key: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct ItemUrl {
    raw: String,
    host: Vec<String>,
    path: Vec<String>,
    query: Vec<KeyValue>,
}

#[derive(Debug, Serialize)]
struct ItemBody {
    mode: &'static str,
    raw: String,
}

impl From<&CompletedRequest> for CollectionItem {
    fn from(req: &CompletedRequest) -> Self {
        let url = match Url::parse(&req.url) {
            Ok(parsed) => ItemUrl {
                raw: req.url.clone(),
                host: parsed.host_str().map(str::to_string).into_iter().collect(),
                path: parsed
                    .path()
                    .split('/')
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
                    .collect(),
                query: parsed
                    .query_pairs()
                    .map(|(key, value)| KeyValue {
                        key: key.into_owned(),
                        value: value.into_owned(),
                    })
                    .collect(),
            },
            Err(err) => {
                tracing::debug!("Collection item for unparsable URL {}: {}", req.url, err);
                ItemUrl {
                    raw: req.url.clone(),
                    host: Vec::new(),
                    path: Vec::new(),
                    query: Vec::new(),
                }
            }
        };

        let body = match req.body_text() {
            Some(raw) if !req.is_get() => Some(ItemBody {
                mode: "raw",
                raw: raw.to_string(),
            }),
            _ => None,
        };

        CollectionItem {
            name: format!("{} {}", req.method, super::display_path(&req.url)),
            request: ItemRequest {
                method: req.method.clone(),
                header: req
                    .headers
                    .iter()
                    .map(|h| KeyValue {
                        key: h.name.clone(),
                        value: h.value.clone(),
                    })
                    .collect(),
                url,
                body,
            },
        }
    }
}

fn build_collection(requests: &[CompletedRequest]) -> Collection {
    Collection {
        info: CollectionInfo {
            name: COLLECTION_NAME,
            schema: COLLECTION_SCHEMA,
        },
        item: requests.iter().map(CollectionItem::from).collect(),
    }
}

/// Build the collection document for the given requests
pub fn requests_to_collection(requests: &[CompletedRequest]) -> serde_json::Value {
    serde_json::to_value(build_collection(requests)).unwrap_or(serde_json::Value::Null)
}

/// Pretty-printed collection JSON
pub fn to_collection_json(requests: &[CompletedRequest]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&build_collection(requests))?)
}

#[derive(Deserialize)]
struct RawCollection {
    #[serde(default)]
    item: Vec<RawItem>,
}

#[derive(Deserialize)]
struct RawItem {
    request: Option<RawRequest>,
}

#[derive(Deserialize)]
struct RawRequest {
    method: Option<String>,
    #[serde(default)]
    header: Vec<KeyValue>,
    url: Option<RawUrl>,
    body: Option<RawBody>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUrl {
    Text(String),
    Structured { raw: String },
}

#[derive(Deserialize)]
struct RawBody {
    raw: Option<String>,
}

/// Read a collection document back into request records.
///
/// Items without a request or URL are skipped. Imported records get
/// sequential `imported-N` identifiers.
pub fn collection_to_requests(contents: &str) -> Result<Vec<CompletedRequest>, ExportError> {
    let raw: RawCollection = serde_json::from_str(contents)
        .map_err(|err| ExportError::InvalidCollection(err.to_string()))?;

    let mut requests = Vec::new();
    for item in raw.item {
        let Some(request) = item.request else {
            continue;
        };
        let url = match request.url {
            Some(RawUrl::Text(url)) | Some(RawUrl::Structured { raw: url }) => url,
            None => continue,
        };
        let mut record = CompletedRequest::new(
            format!("imported-{}", requests.len() + 1),
            request.method.unwrap_or_else(|| "GET".to_string()),
            url,
            request
                .header
                .into_iter()
                .map(|kv| HeaderEntry::new(kv.key, kv.value))
                .collect(),
        );
        record.request_body = request
            .body
            .and_then(|body| body.raw)
            .filter(|raw| !raw.is_empty());
        requests.push(record);
    }

    if requests.is_empty() {
        return Err(ExportError::InvalidCollection(
            "collection contains no requests".to_string(),
        ));
    }
    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<CompletedRequest> {
        let get = CompletedRequest::new(
            "1",
            "GET",
            "https://api.example.com/v1/users?page=2&q=a%20b",
            vec![HeaderEntry::new("Accept", "application/json")],
        );
        let mut post = CompletedRequest::new(
            "2",
            "POST",
            "https://api.example.com/v1/users",
            vec![HeaderEntry::new("Content-Type", "application/json")],
        );
        post.request_body = Some("{\"name\":\"x\"}".into());
        vec![get, post]
    }

    #[test]
    fn builds_postman_document() {
        let doc = requests_to_collection(&sample());

        assert_eq!(doc["info"]["name"], COLLECTION_NAME);
        assert_eq!(doc["info"]["schema"], COLLECTION_SCHEMA);

        let first = &doc["item"][0];
        assert_eq!(first["name"], "GET /v1/users");
        assert_eq!(first["request"]["header"][0]["key"], "Accept");
        assert_eq!(first["request"]["url"]["host"][0], "api.example.com");
        assert_eq!(first["request"]["url"]["path"][0], "v1");
        assert_eq!(first["request"]["url"]["path"][1], "users");
        assert_eq!(first["request"]["url"]["query"][1]["value"], "a b");
        assert!(first["request"].get("body").is_none());

        let second = &doc["item"][1];
        assert_eq!(second["request"]["body"]["mode"], "raw");
        assert_eq!(second["request"]["body"]["raw"], "{\"name\":\"x\"}");
    }

    #[test]
    fn get_body_is_never_exported() {
        let mut get = CompletedRequest::new("1", "GET", "https://example.com/", Vec::new());
        get.request_body = Some("ignored".into());
        let doc = requests_to_collection(&[get]);
        assert!(doc["item"][0]["request"].get("body").is_none());
        assert!(doc["item"][0]["request"]["url"]["path"]
            .as_array()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn empty_capture_gives_empty_item_list() {
        let json = to_collection_json(&[]).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(doc["item"].as_array().unwrap().is_empty());
    }

    #[test]
    fn import_reads_back_method_url_headers_and_body() {
        let original = sample();
        let json = to_collection_json(&original).unwrap();
        let imported = collection_to_requests(&json).unwrap();

        assert_eq!(imported.len(), 2);
        for (orig, back) in original.iter().zip(&imported) {
            assert_eq!(orig.method, back.method);
            assert_eq!(orig.url, back.url);
            assert_eq!(orig.headers, back.headers);
        }
        assert_eq!(imported[1].request_body, original[1].request_body);
        assert_eq!(imported[0].request_id, "imported-1");
    }

    #[test]
    fn import_accepts_plain_string_urls_and_rejects_garbage() {
        let doc = r#"{"item":[{"request":{"method":"DELETE","url":"https://example.com/x"}}]}"#;
        let imported = collection_to_requests(doc).unwrap();
        assert_eq!(imported[0].method, "DELETE");

        assert!(matches!(
            collection_to_requests("not json"),
            Err(ExportError::InvalidCollection(_))
        ));
        assert!(collection_to_requests(r#"{"item":[]}"#).is_err());
    }
}
