use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::{
    config::Config,
    db::{self, FeatureTable},
    error::{AppError, AppResult},
    models::{CleanRecord, RawRecord, REQUIRED_COLUMNS},
    services::{
        artifacts::Artifacts,
        encoder::{extract_duration, feature_columns, FeatureEncoder, FeatureVector},
        forest::{ForestParams, RandomForest},
        label_encoder::LabelEncoder,
        metrics::ClassificationReport,
        split::stratified_split,
        vocabulary::{Vocabulary, TOP_K},
    },
};

/// Where the training job reads from and writes to, plus its hyperparameters
#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub dataset_path: PathBuf,
    pub artifacts_dir: PathBuf,
    pub database_url: String,
    pub test_size: f64,
    pub forest: ForestParams,
}

impl From<&Config> for TrainingOptions {
    fn from(config: &Config) -> Self {
        Self {
            dataset_path: config.dataset_path.clone(),
            artifacts_dir: config.artifacts_dir.clone(),
            database_url: config.database_url(),
            test_size: config.test_size,
            forest: ForestParams {
                n_trees: config.n_trees,
                seed: config.random_seed,
                ..Default::default()
            },
        }
    }
}

/// Summary of a finished training run
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub report: ClassificationReport,
}

/// Cleaned table with everything fitted from it
pub struct PreparedData {
    pub records: Vec<CleanRecord>,
    pub encoder: FeatureEncoder,
    pub target_encoder: LabelEncoder,
    pub features: Vec<FeatureVector>,
    pub targets: Vec<usize>,
}

/// Reads catalog rows from CSV, ignoring columns the job does not use
///
/// Fails if any required column is missing from the header.
pub fn read_records<R: Read>(reader: R) -> AppResult<Vec<RawRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(false)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Training(format!(
            "Dataset is missing columns: {}",
            missing.join(", ")
        )));
    }

    let records = csv_reader
        .deserialize::<RawRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

pub fn load_records(path: &Path) -> AppResult<Vec<RawRecord>> {
    let file = fs::File::open(path).map_err(|e| {
        AppError::Training(format!("Cannot open dataset {}: {}", path.display(), e))
    })?;
    read_records(file)
}

/// Absent values and the literal text "nan" both count as missing
fn normalize(value: Option<String>) -> Option<String> {
    value.filter(|v| v != "nan")
}

/// Cleans raw rows into training records
///
/// Rows without a type or an integer release year are dropped. Country is
/// reduced to its first listed entry; missing countries and genres become
/// "Unknown" and missing ratings "UNKNOWN".
pub fn clean_records(raw: Vec<RawRecord>) -> AppResult<Vec<CleanRecord>> {
    let total = raw.len();
    let records: Vec<CleanRecord> = raw
        .into_iter()
        .filter_map(|row| {
            let kind = row.kind.filter(|k| !k.trim().is_empty())?;
            let release_year = row
                .release_year
                .and_then(|year| year.trim().parse::<i64>().ok())?;

            let duration = normalize(row.duration);
            let duration_num = duration.as_deref().and_then(extract_duration);
            let country = normalize(row.country)
                .map(|c| c.split(',').next().unwrap_or_default().trim().to_string())
                .unwrap_or_else(|| "Unknown".to_string());

            Some(CleanRecord {
                kind,
                title: row.title,
                country,
                release_year,
                rating: normalize(row.rating).unwrap_or_else(|| "UNKNOWN".to_string()),
                duration,
                listed_in: normalize(row.listed_in).unwrap_or_else(|| "Unknown".to_string()),
                duration_num,
            })
        })
        .collect();

    if records.is_empty() {
        return Err(AppError::Training(
            "No rows left after dropping rows without type or release_year".to_string(),
        ));
    }

    tracing::info!(
        kept = records.len(),
        dropped = total - records.len(),
        "Dataset cleaned"
    );
    Ok(records)
}

/// Median of the values, averaging the middle pair for even counts
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Fits vocabularies and encoders, then encodes every record
pub fn prepare(records: Vec<CleanRecord>) -> AppResult<PreparedData> {
    let genres = Vocabulary::top_k(
        records
            .iter()
            .flat_map(|r| r.listed_in.split(',').map(str::trim)),
        TOP_K,
    );
    let countries = Vocabulary::top_k(records.iter().map(|r| r.country.as_str()), TOP_K);
    if genres.is_empty() || countries.is_empty() {
        return Err(AppError::Training("Empty genre or country vocabulary".to_string()));
    }

    let rating_encoder = LabelEncoder::fit("rating", records.iter().map(|r| r.rating.as_str()))?;
    let target_encoder = LabelEncoder::fit("type", records.iter().map(|r| r.kind.as_str()))?;
    if target_encoder.len() < 2 {
        return Err(AppError::Training(format!(
            "Need at least two target classes, found {:?}",
            target_encoder.classes()
        )));
    }

    let known_durations: Vec<f64> = records.iter().filter_map(|r| r.duration_num).collect();
    let duration_median = median(&known_durations)
        .ok_or_else(|| AppError::Training("No row has a numeric duration".to_string()))?;

    tracing::info!(
        genres = ?genres.entries(),
        countries = ?countries.entries(),
        ratings = rating_encoder.len(),
        duration_median,
        "Vocabularies fitted"
    );

    let encoder = FeatureEncoder::new(
        feature_columns(&genres, &countries),
        rating_encoder,
        genres,
        countries,
    );

    let features = records
        .iter()
        .map(|r| encoder.encode_record(r, r.duration_num.unwrap_or(duration_median)))
        .collect::<AppResult<Vec<_>>>()?;
    let targets = records
        .iter()
        .map(|r| target_encoder.transform(&r.kind))
        .collect::<AppResult<Vec<_>>>()?;

    Ok(PreparedData {
        records,
        encoder,
        target_encoder,
        features,
        targets,
    })
}

/// Runs the whole batch job: clean, fit, evaluate, persist
///
/// Artifacts are staged once the model is fitted and replace the previous
/// set only after the snapshot has committed.
pub async fn run(options: &TrainingOptions) -> AppResult<TrainingSummary> {
    let start = Instant::now();
    tracing::info!(
        dataset = %options.dataset_path.display(),
        artifacts = %options.artifacts_dir.display(),
        database = %options.database_url,
        "Starting training"
    );

    let raw = load_records(&options.dataset_path)?;
    let records = clean_records(raw)?;
    let data = prepare(records)?;

    let split = stratified_split(&data.targets, options.test_size, options.forest.seed)?;
    let select = |rows: &[usize]| -> (Vec<Vec<f64>>, Vec<usize>) {
        rows.iter()
            .map(|&i| (data.features[i].values().to_vec(), data.targets[i]))
            .unzip()
    };
    let (x_train, y_train) = select(&split.train);
    let (x_test, y_test) = select(&split.test);

    tracing::info!(
        train = x_train.len(),
        test = x_test.len(),
        trees = options.forest.n_trees,
        "Fitting forest"
    );
    let model = RandomForest::fit(&x_train, &y_train, data.target_encoder.len(), &options.forest)?;

    let predicted: Vec<usize> = x_test.iter().map(|row| model.predict(row).0).collect();
    let report = ClassificationReport::new(&y_test, &predicted, data.target_encoder.classes());

    let artifacts = Artifacts {
        model,
        feature_columns: data.encoder.columns().to_vec(),
        rating_encoder: data.encoder.rating_encoder().clone(),
        target_encoder: data.target_encoder.clone(),
        top_genres: data.encoder.genres().clone(),
        top_countries: data.encoder.countries().clone(),
    };
    let staged = artifacts.stage(&options.artifacts_dir)?;

    if let Some(parent) = database_parent(&options.database_url) {
        fs::create_dir_all(parent)?;
    }
    let pool = db::open_pool(&options.database_url).await?;
    let labels: Vec<String> = data.records.iter().map(|r| r.kind.clone()).collect();
    db::write_snapshot(
        &pool,
        &data.records,
        &FeatureTable {
            columns: data.encoder.columns(),
            rows: &data.features,
            targets: &labels,
        },
    )
    .await?;
    pool.close().await;

    staged.commit()?;

    tracing::info!(
        accuracy = report.accuracy,
        elapsed_ms = start.elapsed().as_millis(),
        "Training completed"
    );

    Ok(TrainingSummary {
        rows: data.records.len(),
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        report,
    })
}

/// Directory holding a file-backed SQLite database, if any
fn database_parent(database_url: &str) -> Option<&Path> {
    let path = database_url.strip_prefix("sqlite://")?;
    if path.contains(":memory:") {
        return None;
    }
    Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
show_id,type,title,director,country,date_added,release_year,rating,duration,listed_in
s1,Movie,Alpha,,\"United States, India\",,2015,PG-13,90 min,\"Dramas, Comedies\"
s2,TV Show,Beta,,India,,2019,TV-MA,2 Seasons,\"International TV Shows, TV Dramas\"
s3,Movie,Gamma,,nan,,2001,,,Dramas
s4,,Delta,,Japan,,2010,R,100 min,Dramas
s5,TV Show,Epsilon,,Japan,,,TV-14,1 Season,Anime Series
s6,TV Show,Zeta,,,,2020,TV-14,1 Season,
";

    fn raw() -> Vec<RawRecord> {
        read_records(CSV.as_bytes()).unwrap()
    }

    #[test]
    fn test_read_ignores_extra_columns() {
        let rows = raw();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].kind.as_deref(), Some("Movie"));
        assert_eq!(rows[0].country.as_deref(), Some("United States, India"));
        assert_eq!(rows[2].rating, None);
    }

    #[test]
    fn test_missing_header_column_fails() {
        let csv = "type,title,country,release_year,rating,duration\nMovie,A,India,2000,R,90 min\n";
        let err = read_records(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("listed_in"));
    }

    #[test]
    fn test_padded_header_names_are_matched() {
        let csv = " type , title,country ,release_year,rating,duration, listed_in\n\
                   Movie,A,India,2000,R,90 min,Dramas\n";
        let rows = read_records(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].kind.as_deref(), Some("Movie"));
        assert_eq!(rows[0].country.as_deref(), Some("India"));
        assert_eq!(rows[0].listed_in.as_deref(), Some("Dramas"));

        let records = clean_records(rows).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_clean_drops_rows_without_type_or_year() {
        let records = clean_records(raw()).unwrap();
        let titles: Vec<_> = records.iter().filter_map(|r| r.title.as_deref()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta", "Gamma", "Zeta"]);
    }

    #[test]
    fn test_clean_fills_defaults() {
        let records = clean_records(raw()).unwrap();
        let alpha = &records[0];
        assert_eq!(alpha.country, "United States");
        assert_eq!(alpha.duration_num, Some(90.0));

        let gamma = &records[2];
        assert_eq!(gamma.country, "Unknown");
        assert_eq!(gamma.rating, "UNKNOWN");
        assert_eq!(gamma.duration_num, None);

        let zeta = &records[3];
        assert_eq!(zeta.listed_in, "Unknown");
        assert_eq!(zeta.country, "Unknown");
    }

    #[test]
    fn test_clean_rejects_empty_table() {
        let rows = vec![RawRecord {
            kind: Some("Movie".to_string()),
            ..Default::default()
        }];
        assert!(clean_records(rows).is_err());
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 90.0]), Some(3.0));
    }

    #[test]
    fn test_prepare_builds_full_schema() {
        let data = prepare(clean_records(raw()).unwrap()).unwrap();

        assert_eq!(data.target_encoder.classes(), &["Movie", "TV Show"]);
        assert_eq!(data.targets, vec![0, 1, 0, 1]);
        assert_eq!(data.encoder.genres().entries()[0], "Dramas");
        assert!(data.encoder.rating_encoder().transform("UNKNOWN").is_ok());

        let width = data.encoder.columns().len();
        assert!(data.features.iter().all(|f| f.len() == width));

        // Gamma has no duration and gets the median of 90, 2 and 1
        assert_eq!(data.features[2].get("duration_num"), Some(2.0));
        assert_eq!(data.features[0].get("country__United States"), Some(1.0));
    }

    #[test]
    fn test_prepare_needs_two_classes() {
        let records: Vec<CleanRecord> = clean_records(raw())
            .unwrap()
            .into_iter()
            .filter(|r| r.kind == "Movie")
            .collect();
        assert!(prepare(records).is_err());
    }

    #[test]
    fn test_database_parent() {
        assert_eq!(
            database_parent("sqlite://Data/netflix.db"),
            Some(Path::new("Data"))
        );
        assert_eq!(database_parent("sqlite://netflix.db"), None);
        assert_eq!(database_parent("sqlite::memory:"), None);
    }
}
