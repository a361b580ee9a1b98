pub mod config;
pub mod core;
pub mod draft_file;
pub mod wizard;

pub use config::{ApiConfig, WizardConfig};
pub use crate::core::api::{Backend, RestClient};
pub use draft_file::DraftFile;
pub use wizard::{CommitOutcome, CommitReport, ProjectWizard};
