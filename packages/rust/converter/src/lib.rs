//! Bruno → OpenCollection conversion.
//!
//! A pure transformation: the packed Bruno collection (parsed JSON) goes in,
//! an [`OpenCollection`] document comes out. No I/O happens here; reading
//! the intermediate file and writing the canonical one is the batch
//! coordinator's job.
//!
//! Every http and graphql request in the input appears in the output; an
//! input the converter cannot represent is rejected with
//! [`OcHubError::Conversion`] rather than partially converted.

pub mod bruno;
pub mod opencollection;

use serde_json::Value;
use tracing::{debug, instrument};

use ochub_shared::{OcHubError, Result};

use crate::bruno::{
    BrunoAuth, BrunoBody, BrunoCollection, BrunoItem, BrunoKeyValue, BrunoRequest, BrunoRoot,
    ITEM_FOLDER, ITEM_GRAPHQL, ITEM_HTTP, ITEM_JS,
};
use crate::opencollection::{
    Assertion, Auth, Body, BodyFile, Config, Environment, EnvironmentVariable, Folder, FormField,
    GraphqlItem, GraphqlRequest, HttpItem, HttpRequest, Info, Item, ItemInfo, ItemKind, KeyValue,
    OPENCOLLECTION_VERSION, OpenCollection, Param, ParamKind, Phase, RequestDefaults, Runtime,
    RuntimeVariable, Script, ScriptItem,
};

/// Parse a packed Bruno document and convert it.
pub fn convert_value(value: Value) -> Result<OpenCollection> {
    let collection: BrunoCollection = serde_json::from_value(value)
        .map_err(|e| OcHubError::conversion(format!("not a packed Bruno collection: {e}")))?;
    convert(&collection)
}

/// Convert a parsed Bruno collection to an OpenCollection document.
#[instrument(skip_all, fields(collection = %collection.name))]
pub fn convert(collection: &BrunoCollection) -> Result<OpenCollection> {
    let root = collection.root.clone().unwrap_or_default();

    let doc = OpenCollection {
        opencollection: OPENCOLLECTION_VERSION.to_string(),
        info: Info {
            name: collection.name.clone(),
            version: collection.version.as_ref().and_then(version_string),
        },
        config: Config {
            environments: collection
                .environments
                .iter()
                .map(|env| Environment {
                    name: env.name.clone(),
                    variables: env
                        .variables
                        .iter()
                        .map(|var| EnvironmentVariable {
                            name: var.name.clone(),
                            value: var.value.clone(),
                            secret: var.secret,
                            disabled: !var.enabled,
                        })
                        .collect(),
                })
                .collect(),
        },
        request: root_defaults(&root),
        items: convert_items(&collection.items)?,
        docs: non_empty(root.docs.as_deref()),
    };

    let expected = collection.request_count();
    let converted = doc.request_names().len();
    if expected != converted {
        return Err(OcHubError::conversion(format!(
            "converted {converted} of {expected} requests"
        )));
    }

    debug!(requests = converted, "collection converted");
    Ok(doc)
}

/// Serialize a document the way it is published: two-space indent, fixed
/// key order, trailing newline.
pub fn to_canonical_json(doc: &OpenCollection) -> Result<String> {
    let mut json = serde_json::to_string_pretty(doc)
        .map_err(|e| OcHubError::conversion(format!("serialization failed: {e}")))?;
    json.push('\n');
    Ok(json)
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

fn convert_items(items: &[BrunoItem]) -> Result<Vec<Item>> {
    let mut ordered: Vec<&BrunoItem> = items.iter().collect();
    // Stable: items without a seq keep their relative order after sequenced ones.
    ordered.sort_by_key(|item| item.seq.unwrap_or(u32::MAX));
    ordered.into_iter().map(convert_item).collect()
}

fn convert_item(item: &BrunoItem) -> Result<Item> {
    match item.kind.as_str() {
        ITEM_FOLDER => {
            let root = item.root.clone().unwrap_or_default();
            Ok(Item::Folder(Folder {
                info: info(item, ItemKind::Folder),
                request: root_defaults(&root),
                docs: non_empty(root.docs.as_deref()),
                items: convert_items(&item.items)?,
            }))
        }
        ITEM_HTTP => {
            let request = require_request(item)?;
            Ok(Item::Http(HttpItem {
                info: info(item, ItemKind::Http),
                http: HttpRequest {
                    method: method(request),
                    url: request.url.clone(),
                    headers: key_values(&request.headers),
                    params: params(request),
                    body: request.body.as_ref().map(body).transpose()?.flatten(),
                    auth: request.auth.as_ref().and_then(auth),
                },
                runtime: runtime(request),
                docs: non_empty(request.docs.as_deref()),
            }))
        }
        ITEM_GRAPHQL => {
            let request = require_request(item)?;
            let graphql = request
                .body
                .as_ref()
                .and_then(|b| b.graphql.clone())
                .unwrap_or_default();
            Ok(Item::Graphql(GraphqlItem {
                info: info(item, ItemKind::Graphql),
                graphql: GraphqlRequest {
                    method: method(request),
                    url: request.url.clone(),
                    headers: key_values(&request.headers),
                    params: params(request),
                    query: graphql.query,
                    variables: non_empty(graphql.variables.as_deref()),
                    auth: request.auth.as_ref().and_then(auth),
                },
                runtime: runtime(request),
                docs: non_empty(request.docs.as_deref()),
            }))
        }
        ITEM_JS => Ok(Item::Script(ScriptItem {
            info: info(item, ItemKind::Script),
            script: item.file_content.clone().unwrap_or_default(),
        })),
        other => Err(OcHubError::conversion(format!(
            "item '{}' has unsupported type '{other}'",
            item.name
        ))),
    }
}

fn info(item: &BrunoItem, kind: ItemKind) -> ItemInfo {
    ItemInfo {
        name: item.name.clone(),
        kind,
        seq: item.seq,
    }
}

fn require_request(item: &BrunoItem) -> Result<&BrunoRequest> {
    item.request.as_ref().ok_or_else(|| {
        OcHubError::conversion(format!("request '{}' has no request block", item.name))
    })
}

fn root_defaults(root: &BrunoRoot) -> Option<RequestDefaults> {
    let request = root.request.as_ref()?;
    let defaults = RequestDefaults {
        headers: key_values(&request.headers),
        auth: request.auth.as_ref().and_then(auth),
        runtime: runtime(request),
    };
    (!defaults.is_empty()).then_some(defaults)
}

// ---------------------------------------------------------------------------
// Request parts
// ---------------------------------------------------------------------------

fn method(request: &BrunoRequest) -> String {
    if request.method.trim().is_empty() {
        "GET".to_string()
    } else {
        request.method.trim().to_ascii_uppercase()
    }
}

fn key_values(pairs: &[BrunoKeyValue]) -> Vec<KeyValue> {
    pairs
        .iter()
        .map(|kv| KeyValue {
            name: kv.name.clone(),
            value: kv.value.clone(),
            disabled: !kv.enabled,
        })
        .collect()
}

fn params(request: &BrunoRequest) -> Vec<Param> {
    request
        .params
        .iter()
        .map(|p| Param {
            name: p.name.clone(),
            value: p.value.clone(),
            kind: match p.kind.as_deref() {
                Some("path") => ParamKind::Path,
                _ => ParamKind::Query,
            },
            disabled: !p.enabled,
        })
        .collect()
}

/// `Ok(None)` for `mode: none` (or a missing mode).
fn body(body: &BrunoBody) -> Result<Option<Body>> {
    let text = |raw: &Option<String>| raw.clone().unwrap_or_default();

    let converted = match body.mode.as_str() {
        "" | "none" => return Ok(None),
        "json" => Body::Json(text(&body.json)),
        "text" => Body::Text(text(&body.text)),
        "xml" => Body::Xml(text(&body.xml)),
        "sparql" => Body::Sparql(text(&body.sparql)),
        "formUrlEncoded" => Body::FormUrlencoded(key_values(&body.form_url_encoded)),
        "multipartForm" => Body::MultipartForm(
            body.multipart_form
                .iter()
                .map(|field| FormField {
                    name: field.name.clone(),
                    kind: field.kind.clone().unwrap_or_else(|| "text".into()),
                    value: field.value.clone(),
                    content_type: non_empty(field.content_type.as_deref()),
                    disabled: !field.enabled,
                })
                .collect(),
        ),
        "file" => Body::File(
            body.file
                .iter()
                .map(|file| BodyFile {
                    file_path: file.file_path.clone(),
                    content_type: non_empty(file.content_type.as_deref()),
                    selected: file.selected,
                })
                .collect(),
        ),
        // GraphQL bodies live on the graphql item itself.
        "graphql" => return Ok(None),
        other => {
            return Err(OcHubError::conversion(format!(
                "unsupported body mode '{other}'"
            )));
        }
    };
    Ok(Some(converted))
}

/// `None` for `mode: none`; otherwise the scheme plus its own settings object.
fn auth(auth: &BrunoAuth) -> Option<Auth> {
    match auth.mode.as_str() {
        "" | "none" => None,
        mode => {
            let settings = match auth.settings.get(mode) {
                Some(Value::Object(map)) => map
                    .iter()
                    .filter(|(key, _)| key.as_str() != "type")
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
                _ => Default::default(),
            };
            Some(Auth {
                kind: mode.to_string(),
                settings,
            })
        }
    }
}

fn runtime(request: &BrunoRequest) -> Runtime {
    let mut scripts = Vec::new();
    if let Some(script) = &request.script {
        if let Some(code) = non_empty(script.req.as_deref()) {
            scripts.push(Script {
                phase: Phase::BeforeRequest,
                code,
            });
        }
        if let Some(code) = non_empty(script.res.as_deref()) {
            scripts.push(Script {
                phase: Phase::AfterResponse,
                code,
            });
        }
    }

    let mut variables = Vec::new();
    if let Some(vars) = &request.vars {
        let phased = vars
            .req
            .iter()
            .map(|v| (v, Phase::BeforeRequest))
            .chain(vars.res.iter().map(|v| (v, Phase::AfterResponse)));
        for (var, phase) in phased {
            variables.push(RuntimeVariable {
                name: var.name.clone(),
                value: var.value.clone(),
                phase,
                disabled: !var.enabled,
            });
        }
    }

    Runtime {
        scripts,
        variables,
        assertions: request.assertions.iter().map(assertion).collect(),
        tests: non_empty(request.tests.as_deref()),
    }
}

/// Bruno stores `res.status: eq 200` as name `res.status`, value `eq 200`.
fn assertion(kv: &BrunoKeyValue) -> Assertion {
    let raw = kv.value.trim();
    let (operator, value) = match raw.split_once(char::is_whitespace) {
        Some((op, rest)) => (op.to_string(), Some(rest.trim().to_string())),
        None => (raw.to_string(), None),
    };
    Assertion {
        expression: kv.name.clone(),
        operator,
        value,
        disabled: !kv.enabled,
    }
}

fn version_string(version: &Value) -> Option<String> {
    match version {
        Value::String(s) => non_empty(Some(s.as_str())),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn petstore() -> Value {
        json!({
            "version": "1",
            "name": "Petstore",
            "items": [
                {
                    "type": "folder",
                    "name": "pets",
                    "seq": 2,
                    "root": { "docs": "Pet operations" },
                    "items": [
                        {
                            "type": "http-request",
                            "name": "Create pet",
                            "seq": 2,
                            "request": {
                                "url": "{{baseUrl}}/pets",
                                "method": "post",
                                "headers": [
                                    { "name": "Content-Type", "value": "application/json", "enabled": true },
                                    { "name": "X-Debug", "value": "1", "enabled": false }
                                ],
                                "body": { "mode": "json", "json": "{\"name\":\"rex\"}" },
                                "auth": { "mode": "bearer", "bearer": { "token": "{{token}}" }, "basic": { "username": "", "password": "" } },
                                "assertions": [ { "name": "res.status", "value": "eq 201", "enabled": true } ]
                            }
                        },
                        {
                            "type": "http-request",
                            "name": "List pets",
                            "seq": 1,
                            "request": {
                                "url": "{{baseUrl}}/pets?limit=10",
                                "method": "GET",
                                "params": [
                                    { "name": "limit", "value": "10", "type": "query", "enabled": true }
                                ],
                                "script": { "req": "", "res": "bru.setVar('first', res.body[0].id);" },
                                "vars": { "req": [ { "name": "page", "value": "1", "enabled": true } ], "res": null },
                                "tests": "test('ok', () => expect(res.status).to.equal(200));"
                            }
                        }
                    ]
                },
                {
                    "type": "graphql-request",
                    "name": "Pet by id",
                    "seq": 1,
                    "request": {
                        "url": "{{baseUrl}}/graphql",
                        "method": "POST",
                        "body": { "mode": "graphql", "graphql": { "query": "{ pet(id: 1) { name } }", "variables": "" } },
                        "auth": { "mode": "none" }
                    }
                }
            ],
            "environments": [
                {
                    "name": "local",
                    "variables": [
                        { "name": "baseUrl", "value": "http://localhost:8080", "enabled": true, "secret": false },
                        { "name": "token", "value": "", "enabled": true, "secret": true }
                    ]
                }
            ],
            "root": {
                "request": {
                    "headers": [ { "name": "Accept", "value": "application/json", "enabled": true } ],
                    "auth": { "mode": "inherit" }
                },
                "docs": "Sample store"
            }
        })
    }

    #[test]
    fn every_request_survives_conversion() {
        let doc = convert_value(petstore()).unwrap();
        let mut names = doc.request_names();
        names.sort_unstable();
        assert_eq!(names, vec!["Create pet", "List pets", "Pet by id"]);
    }

    #[test]
    fn items_follow_seq_order() {
        let doc = convert_value(petstore()).unwrap();
        assert!(matches!(&doc.items[0], Item::Graphql(g) if g.info.name == "Pet by id"));
        let Item::Folder(folder) = &doc.items[1] else {
            panic!("expected folder second");
        };
        assert_eq!(folder.docs.as_deref(), Some("Pet operations"));
        assert_eq!(
            folder
                .items
                .iter()
                .map(|i| match i {
                    Item::Http(h) => h.info.name.as_str(),
                    _ => "",
                })
                .collect::<Vec<_>>(),
            vec!["List pets", "Create pet"]
        );
    }

    #[test]
    fn http_request_details_are_mapped() {
        let doc = convert_value(petstore()).unwrap();
        let Item::Folder(folder) = &doc.items[1] else {
            panic!("expected folder");
        };
        let Item::Http(create) = &folder.items[1] else {
            panic!("expected http item");
        };

        assert_eq!(create.http.method, "POST");
        assert_eq!(create.http.url, "{{baseUrl}}/pets");
        assert_eq!(create.http.headers.len(), 2);
        assert!(create.http.headers[1].disabled);
        assert_eq!(
            create.http.body,
            Some(Body::Json("{\"name\":\"rex\"}".into()))
        );

        let auth = create.http.auth.as_ref().unwrap();
        assert_eq!(auth.kind, "bearer");
        assert_eq!(auth.settings["token"], "{{token}}");

        assert_eq!(create.runtime.assertions[0].expression, "res.status");
        assert_eq!(create.runtime.assertions[0].operator, "eq");
        assert_eq!(create.runtime.assertions[0].value.as_deref(), Some("201"));
    }

    #[test]
    fn runtime_parts_are_mapped() {
        let doc = convert_value(petstore()).unwrap();
        let Item::Folder(folder) = &doc.items[1] else {
            panic!("expected folder");
        };
        let Item::Http(list) = &folder.items[0] else {
            panic!("expected http item");
        };

        assert_eq!(list.http.params[0].kind, ParamKind::Query);
        assert_eq!(list.runtime.scripts.len(), 1);
        assert_eq!(list.runtime.scripts[0].phase, Phase::AfterResponse);
        assert_eq!(list.runtime.variables[0].phase, Phase::BeforeRequest);
        assert!(list.runtime.tests.as_deref().unwrap().contains("expect"));
        assert!(list.http.body.is_none());
    }

    #[test]
    fn collection_level_parts_are_mapped() {
        let doc = convert_value(petstore()).unwrap();
        assert_eq!(doc.opencollection, OPENCOLLECTION_VERSION);
        assert_eq!(doc.info.name, "Petstore");
        assert_eq!(doc.info.version.as_deref(), Some("1"));
        assert_eq!(doc.docs.as_deref(), Some("Sample store"));

        let env = &doc.config.environments[0];
        assert_eq!(env.name, "local");
        assert!(env.variables[1].secret);

        let defaults = doc.request.as_ref().unwrap();
        assert_eq!(defaults.headers[0].name, "Accept");
        assert_eq!(defaults.auth.as_ref().unwrap().kind, "inherit");
    }

    #[test]
    fn graphql_query_is_carried() {
        let doc = convert_value(petstore()).unwrap();
        let Item::Graphql(pet) = &doc.items[0] else {
            panic!("expected graphql item");
        };
        assert!(pet.graphql.query.contains("pet(id: 1)"));
        assert!(pet.graphql.variables.is_none());
        assert!(pet.graphql.auth.is_none());
    }

    #[test]
    fn empty_collection_converts_to_empty_document() {
        let doc = convert_value(json!({ "name": "demo", "items": [] })).unwrap();
        assert!(doc.items.is_empty());
        assert!(doc.request.is_none());

        let json = to_canonical_json(&doc).unwrap();
        assert_eq!(
            json,
            "{\n  \"opencollection\": \"1.0.0\",\n  \"info\": {\n    \"name\": \"demo\"\n  },\n  \"items\": []\n}\n"
        );
    }

    #[test]
    fn canonical_json_is_stable() {
        let first = to_canonical_json(&convert_value(petstore()).unwrap()).unwrap();
        let second = to_canonical_json(&convert_value(petstore()).unwrap()).unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with("}\n"));

        let reparsed: OpenCollection = serde_json::from_str(&first).unwrap();
        assert_eq!(reparsed, convert_value(petstore()).unwrap());
    }

    #[test]
    fn malformed_shapes_are_conversion_errors() {
        for bad in [
            json!({ "items": [] }),
            json!({ "name": "x", "items": {} }),
            json!({ "name": "x", "items": [ { "name": "no type" } ] }),
            json!([1, 2, 3]),
        ] {
            let err = convert_value(bad).unwrap_err();
            assert!(matches!(err, OcHubError::Conversion(_)));
        }
    }

    #[test]
    fn unsupported_item_type_is_rejected() {
        let err = convert_value(json!({
            "name": "x",
            "items": [ { "type": "websocket-request", "name": "ws" } ]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("unsupported type 'websocket-request'"));
    }

    #[test]
    fn request_without_request_block_is_rejected() {
        let err = convert_value(json!({
            "name": "x",
            "items": [ { "type": "http-request", "name": "bare" } ]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("no request block"));
    }

    #[test]
    fn form_bodies_keep_disabled_fields() {
        let doc = convert_value(json!({
            "name": "forms",
            "items": [{
                "type": "http-request",
                "name": "Upload",
                "request": {
                    "url": "/upload",
                    "method": "POST",
                    "body": {
                        "mode": "multipartForm",
                        "multipartForm": [
                            { "name": "file", "type": "file", "value": ["./a.png"], "enabled": true },
                            { "name": "note", "type": "text", "value": "hi", "enabled": false }
                        ]
                    }
                }
            }]
        }))
        .unwrap();

        let Item::Http(upload) = &doc.items[0] else {
            panic!("expected http item");
        };
        let Some(Body::MultipartForm(fields)) = &upload.http.body else {
            panic!("expected multipart body");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].kind, "file");
        assert!(fields[1].disabled);
    }
}
