// Project descriptor written once at the versioning-branch root.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, info};
use versioner_common::types::ProjectDescriptor;

use crate::ledger::write_json;

pub const DESCRIPTOR_FILE: &str = "gsd_metadata.json";

/// Write `gsd_metadata.json` unless it already exists. Returns whether it was created.
pub fn ensure_descriptor(root: &Path, descriptor: &ProjectDescriptor) -> Result<bool> {
    let path = root.join(DESCRIPTOR_FILE);
    if path.exists() {
        debug!(path = %path.display(), "project descriptor already present");
        return Ok(false);
    }
    write_json(&path, descriptor)?;
    info!(repository = %descriptor.repository, "wrote project descriptor");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn descriptor(name: &str) -> ProjectDescriptor {
        ProjectDescriptor {
            name: name.into(),
            description: "Widgets".into(),
            readme_url: format!("https://github.com/acme/{name}/blob/main/README.md"),
            author: "acme".into(),
            license: "MIT".into(),
            branch: "versioning-main".into(),
            repository: format!("acme/{name}"),
        }
    }

    #[test]
    fn created_when_absent() {
        let dir = TempDir::new().unwrap();
        assert!(ensure_descriptor(dir.path(), &descriptor("widget")).unwrap());

        let text = std::fs::read_to_string(dir.path().join(DESCRIPTOR_FILE)).unwrap();
        let parsed: ProjectDescriptor = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, descriptor("widget"));
    }

    #[test]
    fn existing_descriptor_is_never_rewritten() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(DESCRIPTOR_FILE), "{\"name\":\"hand-edited\"}").unwrap();

        assert!(!ensure_descriptor(dir.path(), &descriptor("widget")).unwrap());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(DESCRIPTOR_FILE)).unwrap(),
            "{\"name\":\"hand-edited\"}"
        );
    }
}
