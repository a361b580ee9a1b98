pub mod commit;
pub mod draft;
pub mod guard;
pub mod images;
mod live;
pub mod units;

use std::{fmt, path::Path};

use time::Date;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{
    config::WizardConfig,
    core::api::{Backend, BlockStatus, PhaseStatus, UnitFilter},
};

pub use commit::{ChildFailure, ChildKind, CommitError, CommitOutcome, CommitReport, PhaseIdMap};
pub use draft::{
    CoordinatesPatch, DraftBlock, DraftChildren, DraftPhase, DraftProject, PhaseKey,
    PriceRangePatch, ProjectPatch, StagedChildren, Staging, StagingError, TempId,
};
pub use guard::{Fingerprint, SubmissionGuard, SubmissionPermit};
pub use images::{EphemeralRef, ImageReconciler, ImageRef, ResolveError};
pub use live::LiveChildren;
pub use units::{UnitAvailability, compute_available};

/// Handle on a staged or server-side block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockKey {
    Draft(TempId),
    Persisted(String),
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKey::Draft(id) => write!(f, "{}", id),
            BlockKey::Persisted(id) => f.write_str(id),
        }
    }
}

/// Fired after a successful commit so project lists can reload. Receivers
/// see a generation counter.
#[derive(Debug, Clone)]
pub struct RefreshSignal {
    tx: watch::Sender<u64>,
}

impl Default for RefreshSignal {
    fn default() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }
}

impl RefreshSignal {
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }

    pub(crate) fn notify(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }
}

/// State of one open wizard: the draft project, its pending images and the
/// child staging strategy picked when the wizard opened.
#[derive(Debug)]
pub struct WizardSession {
    project: DraftProject,
    images: ImageReconciler,
    staging: Staging,
    availability: Option<UnitAvailability>,
}

impl WizardSession {
    fn new(project: DraftProject, staging: Staging) -> anyhow::Result<Self> {
        Ok(Self {
            project,
            images: ImageReconciler::new()?,
            staging,
            availability: None,
        })
    }

    pub fn project(&self) -> &DraftProject {
        &self.project
    }

    pub fn images(&self) -> &ImageReconciler {
        &self.images
    }

    pub fn staging(&self) -> &Staging {
        &self.staging
    }

    pub fn availability(&self) -> Option<&UnitAvailability> {
        self.availability.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.staging, Staging::Live(_))
    }
}

/// Create/edit wizard for a project and its phases, blocks and unit links.
pub struct ProjectWizard<B> {
    backend: B,
    guard: SubmissionGuard,
    refresh: RefreshSignal,
    session: Option<WizardSession>,
}

impl<B> fmt::Debug for ProjectWizard<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectWizard")
            .field("guard", &self.guard)
            .field("session", &self.session)
            .finish()
    }
}

impl<B: Backend> ProjectWizard<B> {
    pub fn new(backend: B, config: WizardConfig) -> Self {
        Self {
            backend,
            guard: SubmissionGuard::new(config.duplicate_window),
            refresh: RefreshSignal::default(),
            session: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn refresh_signal(&self) -> &RefreshSignal {
        &self.refresh
    }

    pub fn guard(&self) -> &SubmissionGuard {
        &self.guard
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&WizardSession> {
        self.session.as_ref()
    }

    fn session_mut(&mut self) -> Result<&mut WizardSession, StagingError> {
        self.session.as_mut().ok_or(StagingError::NotOpen)
    }

    /// Open the wizard for an existing project, or for a new one when
    /// `project_id` is `None`. Any previous session is closed first. An
    /// existing project's children are fetched live, never seeded from
    /// drafts.
    pub async fn open(&mut self, project_id: Option<&str>) -> anyhow::Result<()> {
        self.close();
        let session = match project_id {
            None => WizardSession::new(
                DraftProject::default(),
                Staging::Draft(DraftChildren::default()),
            )?,
            Some(id) => {
                let project = self.backend.get_project(id).await?;
                let blocks = self.backend.list_blocks(id).await?;
                let draft = DraftProject {
                    fields: project.fields,
                    images: project.images.into_iter().map(ImageRef::Persisted).collect(),
                };
                let live = LiveChildren::new(id.to_string(), project.phases, blocks);
                WizardSession::new(draft, Staging::Live(live))?
            }
        };
        info!(project = ?project_id, "wizard opened");
        self.session = Some(session);
        Ok(())
    }

    /// Close the wizard, dropping all staged children and releasing every
    /// pending image preview.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.images.release_all();
            debug!("wizard closed");
        }
    }

    pub fn stage_project(&mut self, patch: ProjectPatch) -> Result<(), StagingError> {
        self.session_mut()?.project.apply(patch);
        Ok(())
    }

    /// Add a local image for preview; it is uploaded on commit.
    pub fn stage_image(&mut self, file: &Path) -> Result<EphemeralRef, StagingError> {
        let session = self.session_mut()?;
        let reference = session
            .images
            .stage_preview(&mut session.project.images, file)?;
        Ok(reference)
    }

    /// Append a reference to an image that is already uploaded, unless the
    /// project lists it already.
    pub fn attach_image(&mut self, url: &str) -> Result<(), StagingError> {
        let images = &mut self.session_mut()?.project.images;
        let image = ImageRef::Persisted(url.to_string());
        if !images.contains(&image) {
            images.push(image);
        }
        Ok(())
    }

    pub fn discard_image(&mut self, image: &ImageRef) -> Result<bool, StagingError> {
        let session = self.session_mut()?;
        Ok(session.images.discard(&mut session.project.images, image))
    }

    pub async fn add_phase(
        &mut self,
        name: &str,
        delivery_date: Option<Date>,
    ) -> Result<PhaseKey, StagingError> {
        let session = self.session.as_mut().ok_or(StagingError::NotOpen)?;
        let status = PhaseStatus::default();
        match &mut session.staging {
            Staging::Draft(draft) => draft
                .add_phase(name, delivery_date, status)
                .map(PhaseKey::Draft),
            Staging::Live(live) => live
                .add_phase(&self.backend, name, delivery_date, status)
                .await
                .map(PhaseKey::Persisted),
        }
    }

    pub async fn remove_phase(&mut self, phase: &PhaseKey) -> Result<(), StagingError> {
        let session = self.session.as_mut().ok_or(StagingError::NotOpen)?;
        match (&mut session.staging, phase) {
            (Staging::Draft(draft), PhaseKey::Draft(id)) => {
                if draft.remove_phase(*id) {
                    Ok(())
                } else {
                    Err(StagingError::UnknownPhase(phase.clone()))
                }
            }
            (Staging::Live(live), PhaseKey::Persisted(id)) => {
                live.remove_phase(&self.backend, id).await
            }
            _ => Err(StagingError::WrongPhaseKind(phase.clone())),
        }
    }

    pub async fn add_block(
        &mut self,
        name: &str,
        phase: Option<&PhaseKey>,
    ) -> Result<BlockKey, StagingError> {
        let session = self.session.as_mut().ok_or(StagingError::NotOpen)?;
        let status = BlockStatus::default();
        match (&mut session.staging, phase) {
            (Staging::Draft(draft), None) => draft.add_block(name, None, status).map(BlockKey::Draft),
            (Staging::Draft(draft), Some(PhaseKey::Draft(id))) => draft
                .add_block(name, Some(*id), status)
                .map(BlockKey::Draft),
            (Staging::Live(live), None) => live
                .add_block(&self.backend, name, None, status)
                .await
                .map(BlockKey::Persisted),
            (Staging::Live(live), Some(PhaseKey::Persisted(id))) => live
                .add_block(&self.backend, name, Some(id.as_str()), status)
                .await
                .map(BlockKey::Persisted),
            (_, Some(other)) => Err(StagingError::WrongPhaseKind(other.clone())),
        }
    }

    pub async fn remove_block(&mut self, block: &BlockKey) -> Result<bool, StagingError> {
        let session = self.session.as_mut().ok_or(StagingError::NotOpen)?;
        match (&mut session.staging, block) {
            (Staging::Draft(draft), BlockKey::Draft(id)) => Ok(draft.remove_block(*id)),
            (Staging::Live(live), BlockKey::Persisted(id)) => {
                live.remove_block(&self.backend, id).await?;
                Ok(true)
            }
            _ => Err(StagingError::WrongBlockKind(block.clone())),
        }
    }

    /// Load units for the assignment step. Called whenever the step becomes
    /// active. For an existing project the server's links replace whatever
    /// was staged; for a new one, staged units that are no longer free are
    /// dropped.
    pub async fn enter_unit_step(&mut self) -> Result<UnitAvailability, StagingError> {
        let session = self.session.as_mut().ok_or(StagingError::NotOpen)?;
        let availability = match &mut session.staging {
            Staging::Draft(draft) => {
                let units = self.backend.list_units(&UnitFilter::default()).await?;
                let availability = compute_available(&units, None);
                draft.retain_units(|id| availability.available.iter().any(|u| u.id == id));
                availability
            }
            Staging::Live(live) => live.refresh_units(&self.backend).await?,
        };
        debug!(
            available = availability.available.len(),
            assigned = availability.currently_assigned.len(),
            "unit step loaded"
        );
        session.availability = Some(availability.clone());
        Ok(availability)
    }

    pub async fn stage_unit(&mut self, unit_id: &str) -> Result<(), StagingError> {
        let session = self.session.as_mut().ok_or(StagingError::NotOpen)?;
        if let Some(availability) = &session.availability {
            if !availability.available.iter().any(|u| u.id == unit_id) {
                return Err(StagingError::UnitUnavailable(unit_id.to_string()));
            }
        }
        match &mut session.staging {
            Staging::Draft(draft) => draft.stage_unit(unit_id),
            Staging::Live(live) => {
                let availability = live.stage_unit(&self.backend, unit_id).await?;
                session.availability = Some(availability);
            }
        }
        Ok(())
    }

    pub async fn unstage_unit(&mut self, unit_id: &str) -> Result<(), StagingError> {
        let session = self.session.as_mut().ok_or(StagingError::NotOpen)?;
        match &mut session.staging {
            Staging::Draft(draft) => {
                draft.unstage_unit(unit_id);
            }
            Staging::Live(live) => {
                let availability = live.unstage_unit(&self.backend, unit_id).await?;
                session.availability = Some(availability);
            }
        }
        Ok(())
    }
}
