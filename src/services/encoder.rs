use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::{
    error::{AppError, AppResult},
    models::{CleanRecord, TitleInput},
    services::{label_encoder::LabelEncoder, vocabulary::Vocabulary},
};

pub const DURATION_COLUMN: &str = "duration_num";
pub const RELEASE_YEAR_COLUMN: &str = "release_year";
pub const RATING_COLUMN: &str = "rating";
pub const GENRE_PREFIX: &str = "genre__";
pub const COUNTRY_PREFIX: &str = "country__";

/// Runs of Unicode decimal digits (general category Nd)
static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit run regex"));

/// A single Unicode decimal digit
static DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d$").expect("digit regex"));

fn is_decimal_digit(c: char) -> bool {
    let mut buf = [0u8; 4];
    DIGIT.is_match(c.encode_utf8(&mut buf))
}

/// Value of a decimal digit in any script
///
/// Unicode encodes every decimal digit set as ten consecutive code points
/// from zero to nine, so the value is the offset into that run.
fn digit_value(c: char) -> u32 {
    if let Some(d) = c.to_digit(10) {
        return d;
    }
    let mut offset = 0;
    let mut code = c as u32;
    while let Some(prev) = code.checked_sub(1).and_then(char::from_u32) {
        if !is_decimal_digit(prev) {
            break;
        }
        offset += 1;
        code -= 1;
    }
    offset % 10
}

/// First run of decimal digits in `raw`, if any
///
/// "90 min" gives 90 and "3 Seasons" gives 3. Digits from any script count,
/// so "٣ Seasons" gives 3. Runs too long for an `f64` saturate at
/// `f64::MAX`, so the result is always finite.
pub fn extract_duration(raw: &str) -> Option<f64> {
    let run = DIGIT_RUN.find(raw)?;
    let value = run
        .as_str()
        .chars()
        .fold(0.0_f64, |acc, c| acc * 10.0 + f64::from(digit_value(c)));
    Some(value.min(f64::MAX))
}

/// Column names in model order for the given vocabularies
pub fn feature_columns(genres: &Vocabulary, countries: &Vocabulary) -> Vec<String> {
    [DURATION_COLUMN, RELEASE_YEAR_COLUMN, RATING_COLUMN]
        .into_iter()
        .map(str::to_string)
        .chain(genres.iter().map(|g| format!("{GENRE_PREFIX}{g}")))
        .chain(countries.iter().map(|c| format!("{COUNTRY_PREFIX}{c}")))
        .collect()
}

/// Numeric row laid out in the persisted column order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    columns: Arc<[String]>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Value of a named column, `None` if the schema has no such column
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Turns catalog fields into feature vectors matching the trained schema
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    columns: Arc<[String]>,
    rating: LabelEncoder,
    genres: Vocabulary,
    countries: Vocabulary,
}

impl FeatureEncoder {
    pub fn new(
        columns: Vec<String>,
        rating: LabelEncoder,
        genres: Vocabulary,
        countries: Vocabulary,
    ) -> Self {
        Self {
            columns: columns.into(),
            rating,
            genres,
            countries,
        }
    }

    /// Encodes raw form input
    ///
    /// Fails if `release_year` is not an integer or `rating` was never seen
    /// during training. Unknown genres and countries are ignored.
    pub fn encode(&self, input: &TitleInput) -> AppResult<FeatureVector> {
        let release_year: i64 = input.release_year.trim().parse().map_err(|_| {
            AppError::InvalidInput(format!(
                "release_year must be an integer, got {:?}",
                input.release_year
            ))
        })?;
        let rating = self.rating.transform(&input.rating)?;
        let duration = extract_duration(&input.duration).unwrap_or(0.0);

        Ok(self.assemble(
            duration,
            release_year,
            rating,
            &input.listed_in,
            &input.country,
        ))
    }

    /// Encodes a cleaned training row with its imputed duration
    pub fn encode_record(&self, record: &CleanRecord, duration: f64) -> AppResult<FeatureVector> {
        let rating = self.rating.transform(&record.rating)?;
        Ok(self.assemble(
            duration,
            record.release_year,
            rating,
            &record.listed_in,
            &record.country,
        ))
    }

    fn assemble(
        &self,
        duration: f64,
        release_year: i64,
        rating: usize,
        listed_in: &str,
        country: &str,
    ) -> FeatureVector {
        let mut row: HashMap<String, f64> = HashMap::new();
        row.insert(DURATION_COLUMN.to_string(), duration);
        row.insert(RELEASE_YEAR_COLUMN.to_string(), release_year as f64);
        row.insert(RATING_COLUMN.to_string(), rating as f64);
        row.extend(self.genres_multi_hot(listed_in));
        row.extend(self.country_one_hot(country));

        let values = self
            .columns
            .iter()
            .map(|column| row.get(column).copied().unwrap_or(0.0))
            .collect();

        FeatureVector {
            columns: Arc::clone(&self.columns),
            values,
        }
    }

    fn genres_multi_hot(&self, listed_in: &str) -> HashMap<String, f64> {
        let mut out: HashMap<String, f64> = self
            .genres
            .iter()
            .map(|g| (format!("{GENRE_PREFIX}{g}"), 0.0))
            .collect();
        for genre in listed_in.split(',').map(str::trim) {
            if self.genres.contains(genre) {
                out.insert(format!("{GENRE_PREFIX}{genre}"), 1.0);
            }
        }
        out
    }

    fn country_one_hot(&self, country: &str) -> HashMap<String, f64> {
        let mut out: HashMap<String, f64> = self
            .countries
            .iter()
            .map(|c| (format!("{COUNTRY_PREFIX}{c}"), 0.0))
            .collect();
        if self.countries.contains(country) {
            out.insert(format!("{COUNTRY_PREFIX}{country}"), 1.0);
        }
        out
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rating_encoder(&self) -> &LabelEncoder {
        &self.rating
    }

    pub fn genres(&self) -> &Vocabulary {
        &self.genres
    }

    pub fn countries(&self) -> &Vocabulary {
        &self.countries
    }
}
