use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Bijective mapping between string categories and integer codes
///
/// Classes are kept sorted, so a category's code is its position in the
/// sorted list of everything observed at fit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    /// Name used in lookup errors, e.g. "rating"
    name: String,
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fits an encoder over every observed value
    pub fn fit<I, S>(name: &str, values: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = values.into_iter().map(Into::into).collect();
        classes.sort();
        classes.dedup();

        if classes.is_empty() {
            return Err(AppError::Training(format!(
                "Cannot fit {} encoder on an empty column",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            classes,
        })
    }

    /// Code for a category seen at fit time
    pub fn transform(&self, value: &str) -> AppResult<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .map_err(|_| AppError::UnknownCategory {
                encoder: self.name.clone(),
                value: value.to_string(),
            })
    }

    /// Category for a code produced by `transform`
    pub fn inverse_transform(&self, code: usize) -> AppResult<&str> {
        self.classes
            .get(code)
            .map(String::as_str)
            .ok_or_else(|| AppError::Internal(format!("{} code {} out of range", self.name, code)))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
