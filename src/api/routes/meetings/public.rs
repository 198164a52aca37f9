//! Public types for the meetings API

pub use crate::summary::MockAiSummary;
