pub mod consent;
pub mod export;
pub mod install;
pub mod keys;
pub mod marketplace;
pub mod scan;
pub mod verify;

pub use consent::{Consent, NonInteractiveConsent};
pub use install::{InstallOptions, InstallOutcome};
