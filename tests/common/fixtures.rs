use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use estatedesk::{
    WizardConfig,
    core::api::{
        Block, BlockService, NewBlock, NewPhase, Phase, PhaseService, Project, ProjectPayload,
        ProjectRef, ProjectService, Unit, UnitFilter, UnitService, UploadService, UploadedImage,
    },
    wizard::ProjectWizard,
};
use tempfile::NamedTempFile;

/// One recorded call against [`FakeBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateProject(ProjectPayload),
    UpdateProject(String, ProjectPayload),
    GetProject(String),
    AddPhase(String, NewPhase),
    RemovePhase(String, String),
    CreateBlock(NewBlock),
    DeleteBlock(String),
    ListBlocks(String),
    ListUnits,
    AssignUnit(String, Option<String>),
    UploadBatch(Vec<PathBuf>),
}

#[derive(Debug, Default)]
pub struct FakeState {
    next_id: u64,
    next_upload: u64,
    pub projects: HashMap<String, Project>,
    pub blocks: Vec<(String, Block)>,
    pub units: Vec<Unit>,
    pub calls: Vec<Call>,
    /// Sizes of the files received by each upload, in order.
    pub uploaded_sizes: Vec<u64>,

    pub fail_upload: bool,
    pub short_upload: bool,
    pub fail_create_project: bool,
    pub omit_project_id: bool,
    /// Replace every phase id the server hands out with this value.
    pub phase_id_override: Option<String>,
    pub fail_blocks: HashSet<String>,
    pub fail_units: HashSet<String>,
}

impl FakeState {
    fn object_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:024x}", 0x65a1_0000_0000_u64 + self.next_id)
    }
}

/// In-memory stand-in for the back-office API that records every call.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Add a unit, linked to `project` when given.
    pub fn with_unit(self, id: &str, project: Option<&str>) -> Self {
        self.state().units.push(Unit {
            id: id.to_string(),
            name: format!("Unit {}", id),
            project: project.map(|p| ProjectRef::Id(p.to_string())),
        });
        self
    }

    /// Insert an existing project and return its id.
    pub fn seed_project(&self, name: &str, images: &[&str]) -> String {
        let mut state = self.state();
        let id = state.object_id();
        let project = Project {
            id: Some(id.clone()),
            fields: estatedesk::core::api::ProjectFields {
                name: name.to_string(),
                ..Default::default()
            },
            images: images.iter().map(|i| i.to_string()).collect(),
            phases: vec![],
        };
        state.projects.insert(id.clone(), project);
        id
    }

    pub fn seed_phase(&self, project_id: &str, name: &str) -> String {
        let mut state = self.state();
        let id = state.object_id();
        let phase = Phase {
            id: id.clone(),
            name: name.to_string(),
            delivery_date: None,
            status: Default::default(),
        };
        state
            .projects
            .get_mut(project_id)
            .expect("seeded project")
            .phases
            .push(phase);
        id
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|c| matches(c)).count()
    }
}

impl ProjectService for FakeBackend {
    async fn create_project(&self, payload: &ProjectPayload) -> anyhow::Result<Project> {
        let mut state = self.state();
        state.calls.push(Call::CreateProject(payload.clone()));
        if state.fail_create_project {
            anyhow::bail!("HTTP 500 - create failed");
        }
        let id = state.object_id();
        let project = Project {
            id: Some(id.clone()),
            fields: payload.fields.clone(),
            images: payload.images.clone(),
            phases: vec![],
        };
        state.projects.insert(id, project.clone());
        if state.omit_project_id {
            return Ok(Project {
                id: None,
                ..project
            });
        }
        Ok(project)
    }

    async fn update_project(&self, id: &str, payload: &ProjectPayload) -> anyhow::Result<Project> {
        let mut state = self.state();
        state
            .calls
            .push(Call::UpdateProject(id.to_string(), payload.clone()));
        let project = state
            .projects
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("HTTP 404 - no project {}", id))?;
        project.fields = payload.fields.clone();
        project.images = payload.images.clone();
        Ok(project.clone())
    }

    async fn get_project(&self, id: &str) -> anyhow::Result<Project> {
        let mut state = self.state();
        state.calls.push(Call::GetProject(id.to_string()));
        state
            .projects
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("HTTP 404 - no project {}", id))
    }
}

impl PhaseService for FakeBackend {
    async fn add_phase(&self, project_id: &str, phase: &NewPhase) -> anyhow::Result<Vec<Phase>> {
        let mut state = self.state();
        state
            .calls
            .push(Call::AddPhase(project_id.to_string(), phase.clone()));
        let id = match state.phase_id_override.clone() {
            Some(id) => id,
            None => state.object_id(),
        };
        let project = state
            .projects
            .get_mut(project_id)
            .ok_or_else(|| anyhow::anyhow!("HTTP 404 - no project {}", project_id))?;
        project.phases.push(Phase {
            id,
            name: phase.name.clone(),
            delivery_date: phase.delivery_date,
            status: phase.status,
        });
        Ok(project.phases.clone())
    }

    async fn remove_phase(&self, project_id: &str, phase_id: &str) -> anyhow::Result<Vec<Phase>> {
        let mut state = self.state();
        state.calls.push(Call::RemovePhase(
            project_id.to_string(),
            phase_id.to_string(),
        ));
        let project = state
            .projects
            .get_mut(project_id)
            .ok_or_else(|| anyhow::anyhow!("HTTP 404 - no project {}", project_id))?;
        project.phases.retain(|p| p.id != phase_id);
        Ok(project.phases.clone())
    }
}

impl BlockService for FakeBackend {
    async fn create_block(&self, block: &NewBlock) -> anyhow::Result<Block> {
        let mut state = self.state();
        state.calls.push(Call::CreateBlock(block.clone()));
        if state.fail_blocks.contains(&block.name) {
            anyhow::bail!("HTTP 422 - block {:?} rejected", block.name);
        }
        let created = Block {
            id: state.object_id(),
            name: block.name.clone(),
            phase: block.phase.clone(),
            status: block.status,
        };
        state.blocks.push((block.project.clone(), created.clone()));
        Ok(created)
    }

    async fn delete_block(&self, id: &str) -> anyhow::Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteBlock(id.to_string()));
        state.blocks.retain(|(_, b)| b.id != id);
        Ok(())
    }

    async fn list_blocks(&self, project_id: &str) -> anyhow::Result<Vec<Block>> {
        let mut state = self.state();
        state.calls.push(Call::ListBlocks(project_id.to_string()));
        Ok(state
            .blocks
            .iter()
            .filter(|(project, _)| project == project_id)
            .map(|(_, block)| block.clone())
            .collect())
    }
}

impl UnitService for FakeBackend {
    async fn list_units(&self, _filter: &UnitFilter) -> anyhow::Result<Vec<Unit>> {
        let mut state = self.state();
        state.calls.push(Call::ListUnits);
        Ok(state.units.clone())
    }

    async fn assign_unit(&self, id: &str, project_id: Option<&str>) -> anyhow::Result<Unit> {
        let mut state = self.state();
        state.calls.push(Call::AssignUnit(
            id.to_string(),
            project_id.map(str::to_string),
        ));
        if state.fail_units.contains(id) {
            anyhow::bail!("HTTP 409 - unit {} locked", id);
        }
        let unit = state
            .units
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| anyhow::anyhow!("HTTP 404 - no unit {}", id))?;
        unit.project = project_id.map(|p| ProjectRef::Id(p.to_string()));
        Ok(unit.clone())
    }
}

impl UploadService for FakeBackend {
    async fn upload_batch(&self, files: &[PathBuf]) -> anyhow::Result<Vec<UploadedImage>> {
        let mut state = self.state();
        state.calls.push(Call::UploadBatch(files.to_vec()));
        if state.fail_upload {
            anyhow::bail!("HTTP 503 - storage unavailable");
        }
        let mut uploaded = vec![];
        for file in files {
            let size = std::fs::metadata(file)?.len();
            state.uploaded_sizes.push(size);
            state.next_upload += 1;
            uploaded.push(UploadedImage {
                url: format!("https://cdn.test/upload-{}.jpg", state.next_upload),
                key: None,
            });
        }
        if state.short_upload {
            uploaded.pop();
        }
        Ok(uploaded)
    }
}

pub fn new_wizard(backend: &FakeBackend) -> ProjectWizard<FakeBackend> {
    ProjectWizard::new(backend.clone(), WizardConfig::default())
}

/// Creates a small image file and returns the temp file.
/// The file will be automatically cleaned up when dropped.
pub fn create_test_image(contents: &[u8]) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".jpg")
        .tempfile()
        .expect("Failed to create temp image file");
    std::fs::write(file.path(), contents).expect("Failed to write test image");
    file
}

pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}
