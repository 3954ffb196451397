pub mod artifacts;
pub mod encoder;
pub mod forest;
pub mod label_encoder;
pub mod metrics;
pub mod prediction;
pub mod split;
pub mod training;
pub mod vocabulary;

pub use artifacts::Artifacts;
pub use encoder::{FeatureEncoder, FeatureVector};
pub use forest::{Classifier, ForestParams, RandomForest};
pub use label_encoder::LabelEncoder;
pub use prediction::Predictor;
pub use vocabulary::Vocabulary;
