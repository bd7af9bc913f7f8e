pub mod analysis;
pub mod default_rules;
pub mod engine;
pub mod rules;
pub mod types;

pub use analysis::{extract_domains, luhn_check, shannon_entropy};
pub use engine::{Scanner, MAX_FILE_SIZE, SCANNABLE_EXTENSIONS};
pub use rules::{RulesConfig, ScanRule};
pub use types::{Category, ScanIssue, ScanReport, ScanSummary, Severity};
