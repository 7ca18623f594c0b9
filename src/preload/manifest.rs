use crate::preload::Resource;
use anyhow::{Context as AnyhowContext, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Resource list plus optional host settings, as written in YAML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub framerate: Option<u32>,
    #[serde(default)]
    pub max_ticks: Option<u64>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Manifest {
    /// Rejects empty names or urls and names used twice for the same kind.
    pub fn validate(&self) -> Result<()> {
        if self.framerate == Some(0) {
            return Err(anyhow!("framerate must be positive"));
        }
        let mut seen = HashSet::new();
        for resource in &self.resources {
            if resource.name.is_empty() {
                return Err(anyhow!("Resource with url {} has no name", resource.url));
            }
            if resource.url.is_empty() {
                return Err(anyhow!("Resource {} has no url", resource.name));
            }
            if !seen.insert((resource.kind, resource.name.as_str())) {
                return Err(anyhow!("Duplicate {} resource: {}", resource.kind, resource.name));
            }
        }
        Ok(())
    }
}

pub fn load_manifest_from_yaml(file_path: impl AsRef<Path>) -> Result<Manifest> {
    let file_path = file_path.as_ref();
    let yaml_content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read YAML file from {}", file_path.display()))?;

    let manifest: Manifest = serde_yaml::from_str(&yaml_content)
        .with_context(|| format!("Failed to deserialize YAML content from {}", file_path.display()))?;

    Ok(manifest)
}
