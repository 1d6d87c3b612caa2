pub mod deal_extraction;

pub use deal_extraction::{run_deal_extraction, ExtractionSummary, LoadMode};
