//! JSON file persistence for the node set.

use crate::error::NetworkError;
use crate::types::StoredNode;
use crate::world::NodeStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

#[derive(Debug, Default, Serialize, Deserialize)]
struct NodeFile {
    #[serde(default)]
    nodes: Vec<StoredNode>,
}

/// Stores every node in a single JSON document.
///
/// Writes go to a sibling `.tmp` file which is then renamed over the target,
/// so a crash mid-save leaves the previous file intact.
#[derive(Debug, Clone)]
pub struct JsonNodeStore {
    path: PathBuf,
}

impl JsonNodeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl NodeStore for JsonNodeStore {
    /// A missing file is an empty network.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load_nodes(&self) -> Result<Vec<StoredNode>, NetworkError> {
        if !fs::try_exists(&self.path).await? {
            debug!("No saved network, starting empty");
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).await?;
        let file: NodeFile = serde_json::from_str(&content)?;
        info!(count = file.nodes.len(), "Loaded saved sensors");
        Ok(file.nodes)
    }

    #[instrument(skip(self, nodes), fields(path = %self.path.display(), count = nodes.len()))]
    async fn save_nodes(&self, nodes: &[StoredNode]) -> Result<(), NetworkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(&NodeFile {
            nodes: nodes.to_vec(),
        })?;
        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        info!("Saved sensors");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeOwner, NodePosition};
    use tempfile::TempDir;

    fn stored(x: i32) -> StoredNode {
        StoredNode {
            position: NodePosition::new("world", x, 64, -x),
            owner: NodeOwner::new(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonNodeStore::new(dir.path().join("network.json"));
        assert!(store.load_nodes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonNodeStore::new(dir.path().join("data").join("network.json"));
        let nodes = vec![stored(1), stored(-20), stored(300)];

        store.save_nodes(&nodes).await.unwrap();
        assert!(store.path().exists());
        assert!(!store.path().with_extension("tmp").exists());
        assert_eq!(store.load_nodes().await.unwrap(), nodes);

        store.save_nodes(&nodes[..1]).await.unwrap();
        assert_eq!(store.load_nodes().await.unwrap(), nodes[..1].to_vec());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("network.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = JsonNodeStore::new(path).load_nodes().await.unwrap_err();
        assert!(matches!(err, NetworkError::Storage(_)));
    }
}
