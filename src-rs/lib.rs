//! Shipment-status classifier for rendered tracking pages.

pub mod capture;
pub mod classify;
pub mod color;
pub mod config;
pub mod extract;
pub mod geometry;
pub mod green;
pub mod snapshot;
pub mod status;

pub use classify::{classify, ClassificationResult, Classifier, Rule};
pub use config::{ClassifierConfig, Limits, Policy};
pub use snapshot::{Node, NodeData, NodeId, Rect, Snapshot, Style};
pub use status::StatusLabel;
