mod block;
pub mod model;
mod phase;
mod project;
mod state;
mod unit;
mod upload;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use reqwest::{
    Method,
    multipart::{Form, Part},
};
use serde::Deserialize;
use state::ApiState;
use tokio::fs as async_fs;
use tracing::debug;

use crate::config::ApiConfig;

pub use block::{Block, BlockService, BlockStatus, NewBlock};
pub use model::{Coordinates, OBJECT_ID_LEN, PriceRange, ProjectRef, is_object_id};
pub use phase::{NewPhase, Phase, PhaseService, PhaseStatus};
pub use project::{
    Project, ProjectCategory, ProjectFields, ProjectPayload, ProjectService, ProjectStatus,
};
pub use state::ApiError;
pub use unit::{Unit, UnitAssignment, UnitFilter, UnitService};
pub use upload::{UploadService, UploadedImage};

/// Everything the project wizard needs from the server.
pub trait Backend: ProjectService + PhaseService + BlockService + UnitService + UploadService {}

impl<T> Backend for T where
    T: ProjectService + PhaseService + BlockService + UnitService + UploadService
{
}

#[derive(Deserialize)]
struct PhasesBody {
    #[serde(default)]
    phases: Vec<Phase>,
}

/// JSON-over-HTTP client for the back-office API.
#[derive(Debug, Clone)]
pub struct RestClient {
    state: Arc<ApiState>,
}

impl RestClient {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        Ok(Self {
            state: Arc::new(ApiState::new(config)?),
        })
    }
}

impl ProjectService for RestClient {
    async fn create_project(&self, payload: &ProjectPayload) -> anyhow::Result<Project> {
        let url = self.state.url(&["projects"])?;
        debug!(name = %payload.fields.name, "creating project");
        let project = self
            .state
            .send_json(self.state.request(Method::POST, url).json(payload))
            .await
            .with_context(|| format!("Failed to create project {:?}", payload.fields.name))?;
        Ok(project)
    }

    async fn update_project(&self, id: &str, payload: &ProjectPayload) -> anyhow::Result<Project> {
        let url = self.state.url(&["projects", id])?;
        debug!(project = id, "updating project");
        let project = self
            .state
            .send_json(self.state.request(Method::PUT, url).json(payload))
            .await
            .with_context(|| format!("Failed to update project {}", id))?;
        Ok(project)
    }

    async fn get_project(&self, id: &str) -> anyhow::Result<Project> {
        let url = self.state.url(&["projects", id])?;
        let project = self
            .state
            .send_json(self.state.request(Method::GET, url))
            .await
            .with_context(|| format!("Failed to fetch project {}", id))?;
        Ok(project)
    }
}

impl PhaseService for RestClient {
    async fn add_phase(&self, project_id: &str, phase: &NewPhase) -> anyhow::Result<Vec<Phase>> {
        let url = self.state.url(&["projects", project_id, "phases"])?;
        let body: PhasesBody = self
            .state
            .send_json(self.state.request(Method::POST, url).json(phase))
            .await
            .with_context(|| {
                format!("Failed to add phase {:?} to project {}", phase.name, project_id)
            })?;
        Ok(body.phases)
    }

    async fn remove_phase(&self, project_id: &str, phase_id: &str) -> anyhow::Result<Vec<Phase>> {
        let url = self
            .state
            .url(&["projects", project_id, "phases", phase_id])?;
        let body: PhasesBody = self
            .state
            .send_json(self.state.request(Method::DELETE, url))
            .await
            .with_context(|| {
                format!("Failed to remove phase {} from project {}", phase_id, project_id)
            })?;
        Ok(body.phases)
    }
}

impl BlockService for RestClient {
    async fn create_block(&self, block: &NewBlock) -> anyhow::Result<Block> {
        let url = self.state.url(&["blocks"])?;
        let created = self
            .state
            .send_json(self.state.request(Method::POST, url).json(block))
            .await
            .with_context(|| format!("Failed to create block {:?}", block.name))?;
        Ok(created)
    }

    async fn delete_block(&self, id: &str) -> anyhow::Result<()> {
        let url = self.state.url(&["blocks", id])?;
        self.state
            .send(self.state.request(Method::DELETE, url))
            .await
            .with_context(|| format!("Failed to delete block {}", id))?;
        Ok(())
    }

    async fn list_blocks(&self, project_id: &str) -> anyhow::Result<Vec<Block>> {
        let url = self.state.url(&["blocks"])?;
        let blocks = self
            .state
            .send_json(
                self.state
                    .request(Method::GET, url)
                    .query(&[("project", project_id)]),
            )
            .await
            .with_context(|| format!("Failed to list blocks of project {}", project_id))?;
        Ok(blocks)
    }
}

impl UnitService for RestClient {
    async fn list_units(&self, filter: &UnitFilter) -> anyhow::Result<Vec<Unit>> {
        let url = self.state.url(&["units"])?;
        let mut query: Vec<(&str, &str)> = vec![];
        if let Some(project) = &filter.project {
            query.push(("project", project.as_str()));
        }
        if filter.unassigned {
            query.push(("unassigned", "true"));
        }
        let units = self
            .state
            .send_json(self.state.request(Method::GET, url).query(&query))
            .await
            .context("Failed to list units")?;
        Ok(units)
    }

    async fn assign_unit(&self, id: &str, project_id: Option<&str>) -> anyhow::Result<Unit> {
        let url = self.state.url(&["units", id])?;
        let body = UnitAssignment {
            project: project_id,
        };
        let unit = self
            .state
            .send_json(self.state.request(Method::PATCH, url).json(&body))
            .await
            .with_context(|| format!("Failed to set project of unit {} to {:?}", id, project_id))?;
        Ok(unit)
    }
}

impl UploadService for RestClient {
    async fn upload_batch(&self, files: &[PathBuf]) -> anyhow::Result<Vec<UploadedImage>> {
        let url = self.state.url(&["uploads"])?;
        let mut form = Form::new();
        for path in files {
            let bytes = async_fs::read(path)
                .await
                .with_context(|| format!("Failed to read image {:?}", path))?;
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("image")
                .to_string();
            form = form.part("files", Part::bytes(bytes).file_name(file_name));
        }
        debug!(count = files.len(), "uploading image batch");
        let uploaded = self
            .state
            .send_json(self.state.request(Method::POST, url).multipart(form))
            .await
            .with_context(|| format!("Failed to upload {} image(s)", files.len()))?;
        Ok(uploaded)
    }
}
