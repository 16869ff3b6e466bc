//! Trained Artifact Bundle
//!
//! A training run produces three files that are only meaningful together:
//! the classifier, the fitted scaler and the ordered feature names. Each
//! file is stamped with the run id so a half-replaced directory is
//! rejected at load time instead of silently mis-scoring.

use crate::classifier::Classifier;
use crate::forest::RandomForest;
use crate::scaler::StandardScaler;
use crate::ArtifactError;
use chrono::{DateTime, Utc};
use feature_engine::FeatureSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

pub const MODEL_FILE: &str = "model.bin";
pub const SCALER_FILE: &str = "scaler.bin";
pub const FEATURES_FILE: &str = "feature_names.json";

/// Locations of the three bundle files inside a models directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub features: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join(MODEL_FILE),
            scaler: dir.join(SCALER_FILE),
            features: dir.join(FEATURES_FILE),
        }
    }

    fn all(&self) -> [&Path; 3] {
        [&self.model, &self.scaler, &self.features]
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    run_id: Uuid,
    trained_at: DateTime<Utc>,
    payload: T,
}

/// Classifier, scaler and feature order from one training run
#[derive(Debug, Clone)]
pub struct ArtifactBundle<C = RandomForest> {
    run_id: Uuid,
    trained_at: DateTime<Utc>,
    model: C,
    scaler: StandardScaler,
    schema: FeatureSchema,
}

impl<C: Classifier> ArtifactBundle<C> {
    /// Assemble a bundle from freshly trained parts
    pub fn new(
        model: C,
        scaler: StandardScaler,
        feature_names: Vec<String>,
    ) -> Result<Self, ArtifactError> {
        let bundle = Self {
            run_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            model,
            scaler,
            schema: FeatureSchema::new(feature_names),
        };
        bundle.check_consistency()?;
        Ok(bundle)
    }

    pub fn model(&self) -> &C {
        &self.model
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn feature_names(&self) -> &[String] {
        self.schema.names()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    fn check_consistency(&self) -> Result<(), ArtifactError> {
        let features = self.schema.len();
        let scaler = self.scaler.n_features();
        let model = self.model.n_features();

        if features == 0 {
            return Err(ArtifactError::Inconsistent(
                "feature list is empty".to_string(),
            ));
        }
        if features != scaler || features != model {
            return Err(ArtifactError::Inconsistent(format!(
                "features={features}, scaler={scaler}, model={model}"
            )));
        }
        Ok(())
    }
}

impl<C> ArtifactBundle<C>
where
    C: Classifier + Serialize + DeserializeOwned,
{
    /// Write the bundle into `dir`.
    ///
    /// All three files are encoded first and staged as temporaries; they
    /// only replace existing artifacts once every write has succeeded.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<ArtifactPaths, ArtifactError> {
        let dir = dir.as_ref();
        let paths = ArtifactPaths::in_dir(dir);

        let model = encode_postcard(&paths.model, &self.envelope(&self.model))?;
        let scaler = encode_postcard(&paths.scaler, &self.envelope(&self.scaler))?;
        let features = serde_json::to_vec_pretty(&self.envelope(self.schema.names()))
            .map_err(|e| ArtifactError::Encode {
                path: paths.features.clone(),
                reason: e.to_string(),
            })?;

        fs::create_dir_all(dir).map_err(|source| ArtifactError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let staged = [
            (&paths.model, model),
            (&paths.scaler, scaler),
            (&paths.features, features),
        ];
        let mut temporaries = Vec::with_capacity(staged.len());
        for (path, bytes) in &staged {
            let tmp = temporary_path(path);
            if let Err(source) = fs::write(&tmp, bytes) {
                let _ = fs::remove_file(&tmp);
                discard(&temporaries);
                return Err(ArtifactError::Io { path: tmp, source });
            }
            temporaries.push((tmp, (*path).clone()));
        }

        for (tmp, path) in &temporaries {
            fs::rename(tmp, path).map_err(|source| ArtifactError::Io {
                path: path.clone(),
                source,
            })?;
            debug!("Wrote {}", path.display());
        }

        info!(
            "Saved artifact bundle {} to {} ({} features)",
            self.run_id,
            dir.display(),
            self.schema.len()
        );
        Ok(paths)
    }

    /// Load and cross-check a bundle from `dir`
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let paths = ArtifactPaths::in_dir(dir);
        if let Some(missing) = paths.all().into_iter().find(|p| !p.exists()) {
            return Err(ArtifactError::Missing(missing.to_path_buf()));
        }

        let model: Envelope<C> = decode_postcard(&paths.model)?;
        let scaler: Envelope<StandardScaler> = decode_postcard(&paths.scaler)?;
        let features: Envelope<Vec<String>> = decode_json(&paths.features)?;

        if model.run_id != scaler.run_id || model.run_id != features.run_id {
            return Err(ArtifactError::Mismatch(format!(
                "model={}, scaler={}, features={}",
                model.run_id, scaler.run_id, features.run_id
            )));
        }

        model
            .payload
            .validate()
            .map_err(|e| ArtifactError::Decode {
                path: paths.model.clone(),
                reason: e.to_string(),
            })?;
        scaler
            .payload
            .validate()
            .map_err(|e| ArtifactError::Decode {
                path: paths.scaler.clone(),
                reason: e.to_string(),
            })?;

        let bundle = Self {
            run_id: model.run_id,
            trained_at: model.trained_at,
            model: model.payload,
            scaler: scaler.payload,
            schema: FeatureSchema::new(features.payload),
        };
        bundle.check_consistency()?;

        info!(
            "Loaded artifact bundle {} trained at {} ({} features)",
            bundle.run_id,
            bundle.trained_at.to_rfc3339(),
            bundle.schema.len()
        );
        Ok(bundle)
    }

    fn envelope<'a, T: ?Sized>(&self, payload: &'a T) -> Envelope<&'a T> {
        Envelope {
            run_id: self.run_id,
            trained_at: self.trained_at,
            payload,
        }
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn discard(temporaries: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in temporaries {
        let _ = fs::remove_file(tmp);
    }
}

fn encode_postcard<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>, ArtifactError> {
    postcard::to_allocvec(value).map_err(|e| ArtifactError::Encode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn read(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn decode_postcard<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = read(path)?;
    postcard::from_bytes(&bytes).map_err(|e| ArtifactError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn decode_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
