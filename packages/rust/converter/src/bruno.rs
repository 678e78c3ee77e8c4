//! Input model: a Bruno collection as serialized by the packer.
//!
//! Every field the packer may omit or emit as `null` is defaulted, so the
//! only hard requirements are a collection `name`, array-typed `items`, and
//! a `type` + `name` on each item.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const ITEM_FOLDER: &str = "folder";
pub const ITEM_HTTP: &str = "http-request";
pub const ITEM_GRAPHQL: &str = "graphql-request";
pub const ITEM_JS: &str = "js";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrunoCollection {
    pub name: String,
    #[serde(default)]
    pub version: Option<Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<BrunoItem>,
    #[serde(default, deserialize_with = "nullable")]
    pub environments: Vec<BrunoEnvironment>,
    #[serde(default)]
    pub root: Option<BrunoRoot>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrunoItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub seq: Option<u32>,
    #[serde(default)]
    pub request: Option<BrunoRequest>,
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<BrunoItem>,
    #[serde(default)]
    pub root: Option<BrunoRoot>,
    #[serde(default)]
    pub file_content: Option<String>,
}

/// Collection- or folder-level defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrunoRoot {
    #[serde(default)]
    pub request: Option<BrunoRequest>,
    #[serde(default)]
    pub docs: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrunoRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub method: String,
    #[serde(default, deserialize_with = "nullable")]
    pub headers: Vec<BrunoKeyValue>,
    #[serde(default, deserialize_with = "nullable")]
    pub params: Vec<BrunoParam>,
    #[serde(default)]
    pub body: Option<BrunoBody>,
    #[serde(default)]
    pub auth: Option<BrunoAuth>,
    #[serde(default)]
    pub script: Option<BrunoScript>,
    #[serde(default)]
    pub vars: Option<BrunoVars>,
    #[serde(default, deserialize_with = "nullable")]
    pub assertions: Vec<BrunoKeyValue>,
    #[serde(default)]
    pub tests: Option<String>,
    #[serde(default)]
    pub docs: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrunoKeyValue {
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub value: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrunoParam {
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub value: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrunoBody {
    #[serde(default, deserialize_with = "nullable")]
    pub mode: String,
    #[serde(default)]
    pub json: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub xml: Option<String>,
    #[serde(default)]
    pub sparql: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub form_url_encoded: Vec<BrunoKeyValue>,
    #[serde(default, deserialize_with = "nullable")]
    pub multipart_form: Vec<BrunoMultipartField>,
    #[serde(default)]
    pub graphql: Option<BrunoGraphql>,
    #[serde(default, deserialize_with = "nullable")]
    pub file: Vec<BrunoBodyFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrunoGraphql {
    #[serde(default, deserialize_with = "nullable")]
    pub query: String,
    #[serde(default)]
    pub variables: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrunoMultipartField {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrunoBodyFile {
    pub file_path: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub selected: bool,
}

/// `{ "mode": "bearer", "bearer": { "token": "…" }, "basic": { … }, … }`
///
/// Only the settings object named by `mode` is meaningful.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrunoAuth {
    #[serde(default, deserialize_with = "nullable")]
    pub mode: String,
    #[serde(flatten)]
    pub settings: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrunoScript {
    #[serde(default)]
    pub req: Option<String>,
    #[serde(default)]
    pub res: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrunoVars {
    #[serde(default, deserialize_with = "nullable")]
    pub req: Vec<BrunoKeyValue>,
    #[serde(default, deserialize_with = "nullable")]
    pub res: Vec<BrunoKeyValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrunoEnvironment {
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub variables: Vec<BrunoEnvVariable>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrunoEnvVariable {
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub value: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub secret: bool,
}

impl BrunoCollection {
    /// Number of http and graphql requests anywhere in the tree.
    pub fn request_count(&self) -> usize {
        count_requests(&self.items)
    }
}

fn count_requests(items: &[BrunoItem]) -> usize {
    items
        .iter()
        .map(|item| match item.kind.as_str() {
            ITEM_HTTP | ITEM_GRAPHQL => 1,
            ITEM_FOLDER => count_requests(&item.items),
            _ => 0,
        })
        .sum()
}

fn enabled() -> bool {
    true
}

/// Treat an explicit `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
