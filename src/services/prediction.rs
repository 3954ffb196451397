use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{CatalogMetadata, Prediction, TitleInput},
    services::{
        artifacts::Artifacts,
        encoder::FeatureEncoder,
        forest::{argmax, Classifier},
        label_encoder::LabelEncoder,
    },
};

/// Trained state used to answer prediction requests
///
/// Built once at startup and never mutated, so it can be shared freely
/// between request handlers.
pub struct Predictor {
    model: Arc<dyn Classifier>,
    encoder: FeatureEncoder,
    target: LabelEncoder,
}

impl Predictor {
    pub fn new(model: Arc<dyn Classifier>, encoder: FeatureEncoder, target: LabelEncoder) -> Self {
        Self {
            model,
            encoder,
            target,
        }
    }

    pub fn from_artifacts(artifacts: Artifacts) -> Self {
        let Artifacts {
            model,
            feature_columns,
            rating_encoder,
            target_encoder,
            top_genres,
            top_countries,
        } = artifacts;

        let encoder = FeatureEncoder::new(feature_columns, rating_encoder, top_genres, top_countries);
        Self::new(Arc::new(model), encoder, target_encoder)
    }

    /// Classifies one title from raw form fields
    pub fn predict(&self, input: &TitleInput) -> AppResult<Prediction> {
        let features = self.encoder.encode(input)?;
        if features.len() != self.model.n_features() {
            return Err(AppError::Internal(format!(
                "Encoded {} features, model expects {}",
                features.len(),
                self.model.n_features()
            )));
        }

        let proba = self.model.predict_proba(features.values());
        let (code, confidence) = argmax(&proba);
        let label = self.target.inverse_transform(code)?.to_string();

        tracing::debug!(label = %label, confidence, "Prediction made");

        Ok(Prediction { label, confidence })
    }

    /// Categories known to the encoders, for form suggestions
    pub fn metadata(&self) -> CatalogMetadata {
        CatalogMetadata {
            ratings: self.encoder.rating_encoder().classes().to_vec(),
            genres: self.encoder.genres().entries().to_vec(),
            countries: self.encoder.countries().entries().to_vec(),
        }
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }
}
