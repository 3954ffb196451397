use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    error::{AppError, AppResult},
    services::{
        forest::{Classifier, RandomForest},
        label_encoder::LabelEncoder,
        vocabulary::Vocabulary,
    },
};

pub const MODEL_FILE: &str = "rf_model.json";
pub const FEATURE_COLUMNS_FILE: &str = "feature_columns.json";
pub const RATING_ENCODER_FILE: &str = "rating_encoder.json";
pub const TARGET_ENCODER_FILE: &str = "target_encoder.json";
pub const GENRES_FILE: &str = "top_genres.json";
pub const COUNTRIES_FILE: &str = "top_countries.json";

/// Everything the training job produces and the web service needs
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub model: RandomForest,
    pub feature_columns: Vec<String>,
    pub rating_encoder: LabelEncoder,
    pub target_encoder: LabelEncoder,
    pub top_genres: Vocabulary,
    pub top_countries: Vocabulary,
}

impl Artifacts {
    /// Writes each artifact to `dir`, creating it if needed
    pub fn save(&self, dir: &Path) -> AppResult<()> {
        self.validate()?;
        fs::create_dir_all(dir)?;

        write_json(dir, MODEL_FILE, &self.model)?;
        write_json(dir, FEATURE_COLUMNS_FILE, &self.feature_columns)?;
        write_json(dir, RATING_ENCODER_FILE, &self.rating_encoder)?;
        write_json(dir, TARGET_ENCODER_FILE, &self.target_encoder)?;
        write_json(dir, GENRES_FILE, &self.top_genres)?;
        write_json(dir, COUNTRIES_FILE, &self.top_countries)?;

        tracing::info!(dir = %dir.display(), "Artifacts saved");
        Ok(())
    }

    /// Writes the artifacts next to `dir` without touching `dir` itself
    ///
    /// Nothing becomes visible at `dir` until [`StagedArtifacts::commit`];
    /// dropping the staged set removes it.
    pub fn stage(&self, dir: &Path) -> AppResult<StagedArtifacts> {
        let staging = sibling(dir, "staging")?;
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }

        let staged = StagedArtifacts {
            staging,
            target: dir.to_path_buf(),
            committed: false,
        };
        self.save(&staged.staging)?;
        Ok(staged)
    }

    /// Reads all six artifacts from `dir` and checks they fit together
    pub fn load(dir: &Path) -> AppResult<Self> {
        let artifacts = Self {
            model: read_json(dir, MODEL_FILE)?,
            feature_columns: read_json(dir, FEATURE_COLUMNS_FILE)?,
            rating_encoder: read_json(dir, RATING_ENCODER_FILE)?,
            target_encoder: read_json(dir, TARGET_ENCODER_FILE)?,
            top_genres: read_json(dir, GENRES_FILE)?,
            top_countries: read_json(dir, COUNTRIES_FILE)?,
        };
        artifacts.validate()?;

        tracing::info!(
            dir = %dir.display(),
            trees = artifacts.model.n_trees(),
            features = artifacts.feature_columns.len(),
            "Artifacts loaded"
        );
        Ok(artifacts)
    }

    fn validate(&self) -> AppResult<()> {
        if self.model.n_features() != self.feature_columns.len() {
            return Err(AppError::Artifact(format!(
                "Model expects {} features but {} columns are recorded",
                self.model.n_features(),
                self.feature_columns.len()
            )));
        }
        if self.model.n_classes() != self.target_encoder.len() {
            return Err(AppError::Artifact(format!(
                "Model predicts {} classes but the target encoder knows {}",
                self.model.n_classes(),
                self.target_encoder.len()
            )));
        }
        Ok(())
    }
}

/// A complete artifact set waiting in its staging directory
#[must_use = "staged artifacts are removed unless committed"]
#[derive(Debug)]
pub struct StagedArtifacts {
    staging: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedArtifacts {
    pub fn path(&self) -> &Path {
        &self.staging
    }

    /// Moves the staged set into place, replacing any previous set
    pub fn commit(mut self) -> AppResult<()> {
        let retired = sibling(&self.target, "old")?;
        if retired.exists() {
            fs::remove_dir_all(&retired)?;
        }
        if self.target.exists() {
            fs::rename(&self.target, &retired)?;
        }

        if let Err(e) = fs::rename(&self.staging, &self.target) {
            if retired.exists() {
                // Put the previous set back
                fs::rename(&retired, &self.target)?;
            }
            return Err(e.into());
        }
        self.committed = true;

        if retired.exists() {
            if let Err(e) = fs::remove_dir_all(&retired) {
                tracing::warn!(dir = %retired.display(), error = %e, "Could not remove previous artifacts");
            }
        }

        tracing::info!(dir = %self.target.display(), "Artifacts committed");
        Ok(())
    }
}

impl Drop for StagedArtifacts {
    fn drop(&mut self) {
        if self.committed || !self.staging.exists() {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.staging) {
            tracing::warn!(dir = %self.staging.display(), error = %e, "Could not remove staged artifacts");
        }
    }
}

/// `dir` with `.suffix` appended to its last component
fn sibling(dir: &Path, suffix: &str) -> AppResult<PathBuf> {
    let name = dir.file_name().ok_or_else(|| {
        AppError::Artifact(format!("Artifact directory {} has no name", dir.display()))
    })?;
    let mut name = name.to_os_string();
    name.push(format!(".{suffix}"));
    Ok(dir.with_file_name(name))
}

/// Serializes to `<name>.tmp` and renames over `name`
fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> AppResult<()> {
    let path = dir.join(name);
    let tmp = dir.join(format!("{name}.tmp"));

    let mut writer = BufWriter::new(File::create(&tmp)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    drop(writer);

    fs::rename(&tmp, &path)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(dir: &Path, name: &str) -> AppResult<T> {
    let path = dir.join(name);
    let file = File::open(&path)
        .map_err(|e| AppError::Artifact(format!("Cannot open {}: {}", path.display(), e)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::Artifact(format!("Cannot parse {}: {}", path.display(), e)))
}
