use serde::{Deserialize, Serialize};

/// Columns the training job requires in the catalog CSV header
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "type",
    "title",
    "country",
    "release_year",
    "rating",
    "duration",
    "listed_in",
];

/// One row of the catalog CSV as read from disk
///
/// Empty cells deserialize to `None`; other columns in the file are ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawRecord {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub country: Option<String>,
    pub release_year: Option<String>,
    pub rating: Option<String>,
    pub duration: Option<String>,
    pub listed_in: Option<String>,
}

/// A catalog row after cleaning, ready for feature encoding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    /// First listed country, or "Unknown"
    pub country: String,
    pub release_year: i64,
    /// Rating, or "UNKNOWN"
    pub rating: String,
    pub duration: Option<String>,
    /// Comma-separated genres, or "Unknown"
    pub listed_in: String,
    /// Digits pulled from `duration`; `None` until imputed in the feature table
    pub duration_num: Option<f64>,
}

/// The six fields a user submits for a single prediction
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TitleInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub release_year: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub listed_in: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_input_missing_fields_default_to_empty() {
        let input: TitleInput = serde_json::from_str(r#"{"title": "Roma"}"#).unwrap();
        assert_eq!(input.title, "Roma");
        assert_eq!(input.country, "");
        assert_eq!(input.release_year, "");
    }

    #[test]
    fn test_clean_record_serializes_type_column() {
        let record = CleanRecord {
            kind: "Movie".to_string(),
            title: Some("Roma".to_string()),
            country: "Mexico".to_string(),
            release_year: 2018,
            rating: "R".to_string(),
            duration: Some("135 min".to_string()),
            listed_in: "Dramas".to_string(),
            duration_num: Some(135.0),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "Movie");
        assert_eq!(json["duration_num"], 135.0);
    }
}
