use serde::Serialize;

mod title;

pub use title::{CleanRecord, RawRecord, TitleInput, REQUIRED_COLUMNS};

/// Outcome of classifying one title
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Prediction {
    /// Human-readable class, e.g. "Movie" or "TV Show"
    pub label: String,
    /// Probability of `label`, in `[0, 1]`
    pub confidence: f64,
}

/// Response body for the JSON prediction endpoint
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub label: String,
    pub confidence: f64,
    /// Echo of the submitted fields
    pub input: TitleInput,
}

/// Known categories exposed to the form for suggestions
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogMetadata {
    pub ratings: Vec<String>,
    pub genres: Vec<String>,
    pub countries: Vec<String>,
}
