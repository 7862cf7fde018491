// Service exports
pub mod catalog;
pub mod pipeline;
pub mod sessions;

pub use catalog::{CatalogError, CatalogSnapshot, CatalogStore, ColumnMapping, FieldMapping, LoadReport, PropertyField};
pub use pipeline::{MatchOutcome, MatchPipeline, MatchTarget, PipelineError, TurnOutcome};
pub use sessions::{SessionError, SessionSettings, SessionStore, UnknownSessionPolicy};
