use anyhow::Context;
use flate2::{write::GzEncoder, Compression};
use std::{fs::File, path::Path};
use tract_onnx::prelude::TypedModel;

use crate::config::ExportConfig;

/// Serializes the typed graph as a gzipped NNEF tar archive at `path`,
/// replacing any previous file.
pub fn export_graph(model: &TypedModel, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let gz = GzEncoder::new(file, Compression::default());
    let gz = tract_nnef::nnef()
        .with_tract_core()
        .write_to_tar(model, gz)
        .with_context(|| format!("Failed to serialize model graph to {:?}", path))?;
    gz.finish()
        .with_context(|| format!("Failed to flush {:?}", path))?;

    Ok(())
}

/// Runs the startup export according to the export settings.
pub fn export_on_startup(model: &TypedModel, config: &ExportConfig) -> anyhow::Result<()> {
    if !config.enabled {
        tracing::debug!("Graph export disabled");
        return Ok(());
    }

    match export_graph(model, &config.path) {
        Ok(()) => {
            tracing::info!(path = %config.path.display(), "Exported model graph");
            Ok(())
        }
        Err(e) if config.fatal => Err(e),
        Err(e) => {
            tracing::warn!("Graph export failed, serving anyway: {:#}", e);
            Ok(())
        }
    }
}
