//! Detector model files on local storage.
//!
//! The face detector ships as an ONNX graph plus an external weights blob.
//! ONNX Runtime resolves the blob relative to the graph, so both must sit in
//! the same directory with the blob named `<graph>.data` before a session
//! can be built.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MODEL_FILE: &str = "blazeface.onnx";
const WEIGHTS_SUFFIX: &str = ".data";

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("model asset not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to materialize {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Located, co-resident model graph and weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAssets {
    pub graph: PathBuf,
    pub weights: PathBuf,
}

impl ModelAssets {
    /// Locate the graph in `model_dir` and ensure its weights blob sits next
    /// to it, copying from `weights_source` when missing.
    pub fn materialize(
        model_dir: &Path,
        file_name: &str,
        weights_source: Option<&Path>,
    ) -> Result<Self, AssetError> {
        let graph = model_dir.join(file_name);
        if !graph.is_file() {
            return Err(AssetError::NotFound(graph));
        }

        let weights = weights_path_for(&graph);
        if !weights.is_file() {
            let source = weights_source
                .filter(|src| src.is_file())
                .ok_or_else(|| AssetError::NotFound(weights.clone()))?;

            fs::copy(source, &weights).map_err(|e| AssetError::Io {
                path: weights.clone(),
                source: e,
            })?;
            tracing::info!(
                from = %source.display(),
                to = %weights.display(),
                "copied model weights next to graph"
            );
        }

        Ok(Self { graph, weights })
    }
}

/// `<graph file name>.data` in the graph's directory.
pub fn weights_path_for(graph: &Path) -> PathBuf {
    let mut name = graph
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(WEIGHTS_SUFFIX);
    graph.with_file_name(name)
}
