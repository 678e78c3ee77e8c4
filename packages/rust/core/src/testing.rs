//! Fakes shared by the coordinator and pipeline tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use ochub_fetch::SourceFetcher;
use ochub_packer::Packer;
use ochub_shared::{OcHubError, Result};

/// File a fake source tree keeps its packed form in.
pub const SOURCE_FILE: &str = "bruno.json";

/// Packs a source tree by copying its `bruno.json`.
///
/// Sentinel contents: `PACK_FAIL` fails without output, `PACK_FAIL_AFTER_WRITE`
/// writes partial output and then fails. A tree without `bruno.json` packs to
/// an empty collection unless built with [`FakePacker::rejecting_empty`].
#[derive(Default)]
pub struct FakePacker {
    reject_empty: bool,
    calls: Mutex<Vec<PathBuf>>,
}

impl FakePacker {
    pub fn rejecting_empty() -> Self {
        Self {
            reject_empty: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Packer for FakePacker {
    async fn pack(&self, source_dir: &Path, dest_file: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(source_dir.to_path_buf());

        let source = source_dir.join(SOURCE_FILE);
        let Ok(content) = std::fs::read_to_string(&source) else {
            if self.reject_empty {
                return Err(OcHubError::packing("no bruno.json found"));
            }
            let name = source_dir.file_name().unwrap().to_string_lossy();
            let empty = json!({ "name": name, "items": [] });
            std::fs::write(dest_file, empty.to_string()).unwrap();
            return Ok(());
        };

        match content.as_str() {
            "PACK_FAIL" => Err(OcHubError::packing("exit status: 1: invalid collection")),
            "PACK_FAIL_AFTER_WRITE" => {
                std::fs::write(dest_file, "{\"name\":").unwrap();
                Err(OcHubError::packing("exit status: 2: interrupted"))
            }
            _ => {
                std::fs::write(dest_file, content).unwrap();
                Ok(())
            }
        }
    }
}

/// Clones `ok:<payload>` sources by writing `<payload>` as the tree's
/// `bruno.json` (`ok:` alone yields an empty tree); anything else fails.
#[derive(Default)]
pub struct FakeFetcher {
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(&self, source: &str, dest: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(source.to_string());
        match source.strip_prefix("ok:") {
            Some(payload) => {
                std::fs::create_dir_all(dest).unwrap();
                if !payload.is_empty() {
                    std::fs::write(dest.join(SOURCE_FILE), payload).unwrap();
                }
                Ok(())
            }
            None => Err(OcHubError::Fetch {
                location: source.to_string(),
                message: "could not resolve host".into(),
            }),
        }
    }
}

/// Write a fake source tree at `<root>/<collection>/<version>/bruno.json`.
pub fn write_source(root: &Path, collection: &str, version: &str, content: &str) {
    let dir = root.join(collection).join(version);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(SOURCE_FILE), content).unwrap();
}

/// A packed Bruno collection with one GET request per name.
pub fn collection_json(name: &str, requests: &[&str]) -> String {
    let items: Vec<_> = requests
        .iter()
        .enumerate()
        .map(|(i, request)| {
            json!({
                "type": "http-request",
                "name": request,
                "seq": i + 1,
                "request": { "url": format!("{{{{baseUrl}}}}/{i}"), "method": "GET" }
            })
        })
        .collect();
    json!({ "name": name, "version": "1", "items": items }).to_string()
}
