pub mod types;
pub mod reference;
pub mod normalize;
pub mod schedule;
pub mod resolver;
pub mod label;
pub mod classifier;
pub mod analyzer;

pub use analyzer::RowAnalyzer;
pub use classifier::InteractionClassifier;
pub use label::{LabelCache, LabelError, LabelTextProvider, OpenFdaLabelClient};
pub use reference::ScreeningReferenceData;
pub use resolver::{CanonicalResolver, DrugComposition, DrugDatabase};
pub use types::*;
