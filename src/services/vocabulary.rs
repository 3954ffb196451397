use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Number of categories kept per vocabulary
pub const TOP_K: usize = 10;

/// Closed set of the most frequent category values seen during training
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary {
    entries: Vec<String>,
}

impl Vocabulary {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    /// Keeps the `k` most frequent values, most frequent first
    ///
    /// Equal counts keep the order in which the values first appeared.
    pub fn top_k<I, S>(values: I, k: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        for (position, value) in values.into_iter().enumerate() {
            counts
                .entry(value.as_ref().to_string())
                .or_insert((0, position))
                .0 += 1;
        }

        let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_b.cmp(count_a).then(first_a.cmp(first_b))
        });

        Self {
            entries: ranked.into_iter().take(k).map(|(value, _)| value).collect(),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.entries.iter().any(|entry| entry == value)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_k_orders_by_frequency() {
        let vocab = Vocabulary::top_k(["b", "a", "b", "c", "b", "a"], 2);
        assert_eq!(vocab.entries(), &["b", "a"]);
        assert!(!vocab.contains("c"));
    }

    #[test]
    fn test_ties_keep_first_appearance() {
        let vocab = Vocabulary::top_k(["Kenya", "Chile", "Peru", "Chile", "Kenya"], 3);
        assert_eq!(vocab.entries(), &["Kenya", "Chile", "Peru"]);
    }

    #[test]
    fn test_fewer_values_than_k() {
        let vocab = Vocabulary::top_k(["Dramas"], TOP_K);
        assert_eq!(vocab.len(), 1);
        assert!(vocab.contains("Dramas"));
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let vocab = Vocabulary::new(vec!["Dramas".to_string(), "Comedies".to_string()]);
        assert_eq!(
            serde_json::to_string(&vocab).unwrap(),
            r#"["Dramas","Comedies"]"#
        );
    }
}
