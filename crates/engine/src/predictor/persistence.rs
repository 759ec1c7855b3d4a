//! Saving and loading fitted models
//!
//! A model file is a JSON envelope holding the serialized model payload and
//! its SHA256 checksum. Loading validates the checksum, the format version,
//! the feature names, the scaler and the trees before the model is usable.

use crate::error::{EngineError, ModelLoadError, Result};
use crate::training::{expected_feature_names, TrainedModel};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Current on-disk format version
pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ModelEnvelope {
    format_version: u32,
    checksum: String,
    payload: String,
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Write a model to `path` through a temp file and rename
pub fn save_model(model: &TrainedModel, path: &Path) -> Result<()> {
    let io_err = |source: std::io::Error| EngineError::ModelSave {
        path: path.to_path_buf(),
        source,
    };

    let payload = serde_json::to_string(model)
        .map_err(|e| io_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    let envelope = ModelEnvelope {
        format_version: MODEL_FORMAT_VERSION,
        checksum: compute_checksum(payload.as_bytes()),
        payload,
    };
    let bytes = serde_json::to_vec(&envelope)
        .map_err(|e| io_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path).map_err(io_err)?;
    file.write_all(&bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    fs::rename(&temp_path, path).map_err(io_err)?;

    debug!(
        path = %path.display(),
        size = bytes.len(),
        checksum = %envelope.checksum,
        "Model saved"
    );
    Ok(())
}

/// Read and validate a model written by [`save_model`]
pub fn load_model(path: &Path) -> Result<TrainedModel> {
    read_model(path).map_err(|source| EngineError::ModelLoad {
        path: path.to_path_buf(),
        source,
    })
}

fn read_model(path: &Path) -> std::result::Result<TrainedModel, ModelLoadError> {
    let bytes = fs::read(path)?;
    let envelope: ModelEnvelope = serde_json::from_slice(&bytes)?;

    if envelope.format_version != MODEL_FORMAT_VERSION {
        return Err(ModelLoadError::IncompatibleVersion {
            found: envelope.format_version,
            expected: MODEL_FORMAT_VERSION,
        });
    }

    let computed = compute_checksum(envelope.payload.as_bytes());
    if computed != envelope.checksum {
        return Err(ModelLoadError::ChecksumMismatch {
            expected: envelope.checksum,
            computed,
        });
    }

    let model: TrainedModel = serde_json::from_str(&envelope.payload)?;

    let expected = expected_feature_names();
    if model.feature_names() != expected.as_slice() {
        return Err(ModelLoadError::FeatureMismatch {
            found: model.feature_names().to_vec(),
            expected,
        });
    }

    model
        .scaler()
        .validate()
        .map_err(ModelLoadError::InvalidStructure)?;
    model
        .forest()
        .validate()
        .map_err(ModelLoadError::InvalidStructure)?;

    debug!(path = %path.display(), checksum = %computed, "Model checksum validated");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::ForestConfig;
    use crate::models::FeatureVector;
    use crate::training::{TrainingConfig, TrainingPipeline};
    use tempfile::TempDir;

    fn small_model() -> TrainedModel {
        TrainingPipeline::new(TrainingConfig {
            samples: 200,
            forest: ForestConfig {
                n_trees: 5,
                ..ForestConfig::default()
            },
            ..TrainingConfig::default()
        })
        .run()
        .unwrap()
    }

    fn rewrite_envelope(path: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        edit(&mut value);
        fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
    }

    #[test]
    fn test_compute_checksum() {
        let checksum = compute_checksum(b"model payload");
        assert_eq!(checksum.len(), 64); // SHA256 hex is 64 chars
        assert_eq!(checksum, compute_checksum(b"model payload"));
        assert_ne!(checksum, compute_checksum(b"other payload"));
    }

    #[test]
    fn test_save_load_preserves_predictions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("models").join("irrigation.json");
        let model = small_model();

        save_model(&model, &path).unwrap();
        assert!(!path.with_extension("tmp").exists());

        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded, model);

        let reading = FeatureVector::new(33.0, 6.1, 18.0, 130.0);
        assert_eq!(
            loaded.predict_proba(&reading),
            model.predict_proba(&reading)
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_model(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_rejects_tampered_payload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        save_model(&small_model(), &path).unwrap();

        rewrite_envelope(&path, |v| {
            let payload = v["payload"].as_str().unwrap().replacen("0.", "1.", 1);
            v["payload"] = serde_json::Value::String(payload);
        });

        let err = load_model(&path).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ModelLoad {
                source: ModelLoadError::ChecksumMismatch { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        save_model(&small_model(), &path).unwrap();

        rewrite_envelope(&path, |v| v["format_version"] = serde_json::json!(99));

        let err = load_model(&path).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ModelLoad {
                source: ModelLoadError::IncompatibleVersion { found: 99, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, b"not a model").unwrap();

        let err = load_model(&path).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ModelLoad {
                source: ModelLoadError::Malformed(_),
                ..
            }
        ));
    }

    #[test]
    fn test_load_rejects_feature_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let mut model = small_model();
        model.feature_names.reverse();
        save_model(&model, &path).unwrap();

        let err = load_model(&path).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ModelLoad {
                source: ModelLoadError::FeatureMismatch { .. },
                ..
            }
        ));
    }

    fn rewrite_payload(path: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
        rewrite_envelope(path, |v| {
            let mut payload: serde_json::Value =
                serde_json::from_str(v["payload"].as_str().unwrap()).unwrap();
            edit(&mut payload);
            let payload = serde_json::to_string(&payload).unwrap();
            v["checksum"] = serde_json::Value::String(compute_checksum(payload.as_bytes()));
            v["payload"] = serde_json::Value::String(payload);
        });
    }

    fn assert_invalid_structure(path: &Path) {
        let err = load_model(path).unwrap_err();
        assert!(
            matches!(
                err,
                EngineError::ModelLoad {
                    source: ModelLoadError::InvalidStructure(_),
                    ..
                }
            ),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn test_load_rejects_zero_scale() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        save_model(&small_model(), &path).unwrap();

        rewrite_payload(&path, |p| p["scaler"]["scale"] = serde_json::json!([0.0, 1.0, 1.0, 1.0]));

        assert_invalid_structure(&path);
    }

    #[test]
    fn test_load_rejects_negative_impurity_decrease() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        save_model(&small_model(), &path).unwrap();

        rewrite_payload(&path, |p| {
            p["forest"]["trees"][0]["impurity_decrease"] = serde_json::json!([3.0, -2.0, 0.0, 0.0]);
        });

        assert_invalid_structure(&path);
    }

    #[test]
    fn test_load_accepts_recomputed_checksum_on_valid_payload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let model = small_model();
        save_model(&model, &path).unwrap();

        rewrite_payload(&path, |_| {});

        assert_eq!(load_model(&path).unwrap(), model);
    }
}
