use std::path::Path;
use std::sync::Arc;

use crate::error::AppResult;
use crate::services::{Artifacts, Predictor};

use super::page::PageRenderer;

/// Shared application state
///
/// Holds only read-only trained state, so handlers share it without locks.
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<Predictor>,
    pub page: Arc<PageRenderer>,
}

impl AppState {
    pub fn new(predictor: Predictor) -> AppResult<Self> {
        Ok(Self {
            predictor: Arc::new(predictor),
            page: Arc::new(PageRenderer::new()?),
        })
    }

    /// Loads every artifact from `dir`; any failure stops startup
    pub fn load(dir: &Path) -> AppResult<Self> {
        let artifacts = Artifacts::load(dir)?;
        Self::new(Predictor::from_artifacts(artifacts))
    }
}
