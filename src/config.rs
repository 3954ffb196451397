use std::path::PathBuf;

use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the trained model, encoders and vocabularies
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// Raw catalog CSV read by the training job
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// SQLite file receiving the training snapshot
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Number of trees in the forest
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    /// Seed shared by the train/test split and the forest
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,

    /// Fraction of each class held out for evaluation
    #[serde(default = "default_test_size")]
    pub test_size: f64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("Data/netflix_titles.csv")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("Data/netflix.db")
}

fn default_n_trees() -> usize {
    200
}

fn default_random_seed() -> u64 {
    42
}

fn default_test_size() -> f64 {
    0.3
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Address the web service binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// SQLite connection URL for the snapshot database
    pub fn database_url(&self) -> String {
        format!("sqlite://{}", self.database_path.display())
    }
}
