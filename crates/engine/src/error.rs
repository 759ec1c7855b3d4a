//! Error taxonomy for the decision engine

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced to callers of the engine
///
/// A caller running a monitoring cycle treats any of these as a cycle
/// failure and keeps the previous actuator state.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Inference requested before a model was fitted or loaded
    #[error("model has not been trained")]
    ModelNotTrained,

    /// The training set cannot be stratified
    #[error(
        "insufficient training data: minority label has {found} samples, need at least {required}"
    )]
    InsufficientData { found: usize, required: usize },

    /// A saved model could not be read back
    #[error("failed to load model from {}: {source}", path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: ModelLoadError,
    },

    /// A model could not be written
    #[error("failed to save model to {}: {source}", path.display())]
    ModelSave {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A feature field is missing or not finite
    #[error("invalid feature vector: {0}")]
    InvalidFeature(String),

    /// A manual toggle was requested while the controller runs in AUTO mode
    #[error("manual pump control is disabled in auto mode")]
    ManualControlDisabled,

    /// A configuration value is out of its valid domain
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Causes of a failed model load
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("file not found")]
    NotFound,

    #[error(transparent)]
    Io(std::io::Error),

    #[error("malformed model file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("checksum mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch { expected: String, computed: String },

    #[error("unsupported format version {found}, expected {expected}")]
    IncompatibleVersion { found: u32, expected: u32 },

    #[error("feature names {found:?} do not match {expected:?}")]
    FeatureMismatch {
        found: Vec<String>,
        expected: Vec<String>,
    },

    #[error("invalid model structure: {0}")]
    InvalidStructure(String),
}

impl From<std::io::Error> for ModelLoadError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            ModelLoadError::NotFound
        } else {
            ModelLoadError::Io(err)
        }
    }
}

impl EngineError {
    /// Short label for metrics and API payloads
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::ModelNotTrained => "model_not_trained",
            EngineError::InsufficientData { .. } => "insufficient_data",
            EngineError::ModelLoad { .. } => "model_load",
            EngineError::ModelSave { .. } => "model_save",
            EngineError::InvalidFeature(_) => "invalid_feature",
            EngineError::ManualControlDisabled => "manual_control_disabled",
            EngineError::InvalidConfig(_) => "invalid_config",
        }
    }

    /// Returns true when the error names a missing model file
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::ModelLoad {
                source: ModelLoadError::NotFound,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: ModelLoadError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(matches!(err, ModelLoadError::NotFound));

        let err: ModelLoadError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert!(matches!(err, ModelLoadError::Io(_)));
    }

    #[test]
    fn test_is_not_found() {
        let err = EngineError::ModelLoad {
            path: PathBuf::from("/missing/model.json"),
            source: ModelLoadError::NotFound,
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("/missing/model.json"));
        assert!(!EngineError::ModelNotTrained.is_not_found());
        assert_eq!(err.kind(), "model_load");
    }
}
