//! Multi-document YAML manifests.

use std::path::Path;

use anyhow::{bail, Context, Result};
use aro_core::Document;
use serde::Deserialize;

pub const DEFAULT_MAX_BYTES: usize = 8 * 1024 * 1024;

/// Upper bound on one manifest file, from `ARO_MAX_YAML_BYTES`.
pub fn max_bytes() -> usize {
    std::env::var("ARO_MAX_YAML_BYTES").ok().and_then(|s| s.parse::<usize>().ok()).unwrap_or(DEFAULT_MAX_BYTES)
}

/// Decode every `---` separated document. Empty documents are skipped and a
/// `kind: List` contributes its items.
pub fn decode(text: &str, max_bytes: usize) -> Result<Vec<Document>> {
    if text.len() > max_bytes {
        bail!("manifest is {} bytes; limit is {} (ARO_MAX_YAML_BYTES)", text.len(), max_bytes);
    }
    let mut out = Vec::new();
    for (i, de) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let doc = Document::deserialize(de).with_context(|| format!("document {}", i + 1))?;
        match doc {
            Document::Null => {}
            Document::Object(_) if is_list(&doc) => {
                if let Some(Document::Array(items)) = doc.get("items") {
                    out.extend(items.iter().filter(|d| !d.is_null()).cloned());
                }
            }
            Document::Object(_) => out.push(doc),
            _ => bail!("document {}: expected a mapping", i + 1),
        }
    }
    Ok(out)
}

fn is_list(doc: &Document) -> bool {
    doc.get("kind").and_then(|k| k.as_str()) == Some("List") && doc.get("items").is_some()
}

pub fn read_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Document>> {
    let limit = max_bytes();
    let mut out = Vec::new();
    for p in paths {
        let p = p.as_ref();
        let text = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        out.extend(decode(&text, limit).with_context(|| format!("decoding {}", p.display()))?);
    }
    Ok(out)
}
