//! Saving a wizard session to the server.
//!
//! For a new project the staged children only have temporary ids, so they
//! are created strictly in dependency order once the project exists: phases,
//! then blocks (whose phase references are remapped through a [`PhaseIdMap`]
//! built during this run), then unit links. Nothing is rolled back if a child
//! fails after the project was created; failures are reported and logged with
//! their payload for manual follow-up.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use crate::{
    core::api::{Backend, NewBlock, NewPhase, Phase, Project, ProjectPayload, is_object_id},
    wizard::{
        ProjectWizard,
        draft::{DraftPhase, StagedChildren, Staging, TempId, name_key},
        guard::Fingerprint,
        images::{ImageRef, ResolveError},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("The project wizard is not open")]
    NotOpen,

    #[error("Could not save images: {0}")]
    Images(#[from] ResolveError),

    #[error("Could not create project {name:?}: {cause:#}")]
    ProjectCreate { name: String, cause: anyhow::Error },

    #[error("Could not update project {id}: {cause:#}")]
    ProjectUpdate { id: String, cause: anyhow::Error },

    #[error("Server created project {0:?} but returned no id")]
    MissingProjectId(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Phase,
    Block,
    Unit,
}

/// A child operation that failed after the parent project was created.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildFailure {
    pub kind: ChildKind,
    pub name: String,
    /// JSON body that was sent, for manual reconciliation.
    pub payload: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    pub project: Project,
    pub project_id: String,
    pub phases_created: usize,
    pub blocks_created: usize,
    pub units_assigned: usize,
    pub failures: Vec<ChildFailure>,
}

impl CommitReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Rejected by the submission guard; nothing was sent.
    Skipped,
    Updated(Project),
    Created(CommitReport),
}

/// Temporary phase id to server phase id, for one commit run only.
#[derive(Debug, Default)]
pub struct PhaseIdMap {
    ids: HashMap<TempId, String>,
}

impl PhaseIdMap {
    pub fn insert(&mut self, temp_id: TempId, server_id: String) {
        self.ids.insert(temp_id, server_id);
    }

    pub fn resolve(&self, temp_id: TempId) -> Option<&str> {
        self.ids.get(&temp_id).map(String::as_str)
    }

    pub fn contains_server_id(&self, server_id: &str) -> bool {
        self.ids.values().any(|id| id == server_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Find the phase created for `staged` in the collection the server
    /// returned. The server echoes no correlation token, so this matches by
    /// name, skipping phases already claimed earlier in the run.
    pub fn match_created<'a>(&self, staged: &DraftPhase, phases: &'a [Phase]) -> Option<&'a Phase> {
        let key = name_key(&staged.name);
        phases
            .iter()
            .filter(|p| name_key(&p.name) == key)
            .find(|p| !self.contains_server_id(&p.id))
    }
}

impl<B: Backend> ProjectWizard<B> {
    /// Save the open session.
    ///
    /// Returns [`CommitOutcome::Skipped`] when the submission guard rejects
    /// the attempt. Fatal errors leave the wizard open and the guard free for
    /// a retry. After a successful create or update the wizard closes and the
    /// refresh signal fires, even when some children failed.
    pub async fn commit(&mut self) -> Result<CommitOutcome, CommitError> {
        let session = self.session.as_mut().ok_or(CommitError::NotOpen)?;
        let name = session.project.fields.name.clone();
        let Some(_permit) = self.guard.try_acquire(Fingerprint::now(&name)) else {
            debug!(name = %name, "commit ignored by submission guard");
            return Ok(CommitOutcome::Skipped);
        };

        let images = session
            .images
            .resolve_all(&session.project.images, &self.backend)
            .await
            .inspect_err(|e| error!(name = %name, error = %e, "image upload failed"))?;
        session.project.images = images.iter().cloned().map(ImageRef::Persisted).collect();
        let payload = ProjectPayload {
            fields: session.project.fields.clone(),
            images,
        };

        let outcome = match &mut session.staging {
            Staging::Live(live) => {
                let id = live.project_id().to_string();
                let project = self
                    .backend
                    .update_project(&id, &payload)
                    .await
                    .map_err(|cause| {
                        error!(project = %id, ?payload, error = %cause, "project update failed");
                        CommitError::ProjectUpdate {
                            id: id.clone(),
                            cause,
                        }
                    })?;
                info!(project = %id, name = %name, "project updated");
                CommitOutcome::Updated(project)
            }
            Staging::Draft(draft) => {
                let staged = draft.take();
                let project = match self.backend.create_project(&payload).await {
                    Ok(project) => project,
                    Err(cause) => {
                        error!(name = %name, ?payload, error = %cause, "project creation failed");
                        draft.restore(staged);
                        return Err(CommitError::ProjectCreate { name, cause });
                    }
                };
                let Some(project_id) = project.id.clone() else {
                    error!(
                        name = %name,
                        phases = ?staged.phases,
                        blocks = ?staged.blocks,
                        units = ?staged.units,
                        "project created without an id; staged children were not sent"
                    );
                    return Err(CommitError::MissingProjectId(name));
                };
                info!(project = %project_id, name = %name, "project created");
                let report = create_children(&self.backend, project, project_id, staged).await;
                CommitOutcome::Created(report)
            }
        };

        self.close();
        self.refresh.notify();
        Ok(outcome)
    }
}

/// Create the staged children of a freshly created project, in order. Every
/// child is attempted; failures are collected rather than returned.
async fn create_children<B: Backend>(
    backend: &B,
    project: Project,
    project_id: String,
    staged: StagedChildren,
) -> CommitReport {
    let mut report = CommitReport {
        project,
        project_id,
        phases_created: 0,
        blocks_created: 0,
        units_assigned: 0,
        failures: vec![],
    };
    let project_id = report.project_id.clone();

    let mut phase_ids = PhaseIdMap::default();
    for phase in &staged.phases {
        let new_phase = NewPhase {
            name: phase.name.clone(),
            delivery_date: phase.delivery_date,
            status: phase.status,
        };
        match backend.add_phase(&project_id, &new_phase).await {
            Ok(phases) => {
                report.phases_created += 1;
                match phase_ids.match_created(phase, &phases) {
                    Some(created) => {
                        debug!(temp_id = %phase.temp_id, phase = %created.id, "phase mapped");
                        let id = created.id.clone();
                        phase_ids.insert(phase.temp_id, id);
                    }
                    None => debug!(name = %phase.name, "created phase not found in response"),
                }
            }
            Err(e) => report.fail(ChildKind::Phase, &phase.name, &new_phase, e),
        }
    }

    for block in &staged.blocks {
        let resolved = block.phase.and_then(|temp_id| phase_ids.resolve(temp_id));
        let phase = resolved.filter(|id| is_object_id(id)).map(str::to_string);
        if block.phase.is_some() && phase.is_none() {
            debug!(block = %block.name, ?resolved, "block created without phase");
        }
        let new_block = NewBlock {
            name: block.name.clone(),
            project: project_id.clone(),
            phase,
            status: block.status,
        };
        match backend.create_block(&new_block).await {
            Ok(_) => report.blocks_created += 1,
            Err(e) => report.fail(ChildKind::Block, &block.name, &new_block, e),
        }
    }

    for unit_id in &staged.units {
        match backend.assign_unit(unit_id, Some(project_id.as_str())).await {
            Ok(_) => report.units_assigned += 1,
            Err(e) => report.fail(
                ChildKind::Unit,
                unit_id,
                &serde_json::json!({ "project": project_id }),
                e,
            ),
        }
    }

    if !report.failures.is_empty() {
        warn!(
            project = %project_id,
            failed = report.failures.len(),
            "project created with incomplete children"
        );
    }
    report
}

impl CommitReport {
    fn fail<T: serde::Serialize>(
        &mut self,
        kind: ChildKind,
        name: &str,
        payload: &T,
        error: anyhow::Error,
    ) {
        let payload = serde_json::to_string(payload).unwrap_or_default();
        error!(
            project = %self.project_id,
            ?kind,
            name,
            payload = %payload,
            error = %error,
            "child operation failed"
        );
        self.failures.push(ChildFailure {
            kind,
            name: name.to_string(),
            payload,
            error: format!("{:#}", error),
        });
    }
}
