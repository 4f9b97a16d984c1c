//! Rule-based customer segmentation: usage scoring, threshold bands,
//! and lifecycle classification.

pub mod bands;
pub mod engine;
pub mod features;

pub use bands::{Band, BandSet, Bound};
pub use engine::{Classification, SegmentationEngine};
pub use features::{ClampReport, FeatureDeriver, Repair};
