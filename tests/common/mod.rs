#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from estatedesk for tests
pub use estatedesk::{
    core::api::{
        Block, BlockStatus, NewBlock, NewPhase, Phase, PhaseStatus, Project, ProjectPayload,
        ProjectRef, Unit,
    },
    wizard::{
        BlockKey, CommitError, CommitOutcome, CommitReport, EphemeralRef, ImageRef, PhaseKey,
        ProjectPatch, ProjectWizard, Staging, StagingError,
    },
};
