pub mod cells;
pub mod consolidate;
pub mod fetch;
pub mod header;
pub mod models;
pub mod output;
pub mod rows;
pub mod section;
pub mod sheet;
pub mod validate;

pub const PARSER_NAME: &str = "fund_portfolio";

// Re-export commonly used items
pub use crate::consolidate::PortfolioXlsxParser;
pub use crate::models::{
    Diagnostics, ExtractionResult, HoldingRecord, InstrumentType, SkippedSheet,
    ToleranceViolation, TotalsCheckpoint,
};
pub use crate::validate::{run_quality_checks, QualityReport};
