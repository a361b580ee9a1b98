use std::collections::HashSet;

use time::Date;
use tracing::{debug, info};

use crate::{
    core::api::{
        Backend, Block, BlockStatus, NewBlock, NewPhase, Phase, PhaseStatus, UnitFilter,
        is_object_id,
    },
    wizard::{
        draft::{PhaseKey, StagingError, name_key},
        units::{UnitAvailability, compute_available},
    },
};

/// Edit-mode staging: the project exists, so every child action goes straight
/// to the server and the local collections are refreshed from its answers.
#[derive(Debug)]
pub struct LiveChildren {
    project_id: String,
    phases: Vec<Phase>,
    blocks: Vec<Block>,
    units: Vec<String>,
}

impl LiveChildren {
    pub fn new(project_id: String, phases: Vec<Phase>, blocks: Vec<Block>) -> Self {
        Self {
            project_id,
            phases,
            blocks,
            units: vec![],
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    /// Add a phase on the server and return its id. The server answers with
    /// the whole collection; the new phase is the one whose id was not there
    /// before.
    pub async fn add_phase<B: Backend>(
        &mut self,
        backend: &B,
        name: &str,
        delivery_date: Option<Date>,
        status: PhaseStatus,
    ) -> Result<String, StagingError> {
        let known: HashSet<&str> = self.phases.iter().map(|p| p.id.as_str()).collect();
        let new_phase = NewPhase {
            name: name.trim().to_string(),
            delivery_date,
            status,
        };
        let phases = backend.add_phase(&self.project_id, &new_phase).await?;
        let key = name_key(name);
        let fresh: Vec<&Phase> = phases
            .iter()
            .filter(|p| !known.contains(p.id.as_str()))
            .collect();
        let created = fresh
            .iter()
            .find(|p| name_key(&p.name) == key)
            .or_else(|| fresh.first())
            .map(|p| p.id.clone());
        self.phases = phases;

        let id = created.ok_or_else(|| StagingError::PhaseNotReported(name.to_string()))?;
        info!(project = %self.project_id, phase = %id, name, "phase added");
        Ok(id)
    }

    pub async fn remove_phase<B: Backend>(
        &mut self,
        backend: &B,
        phase_id: &str,
    ) -> Result<(), StagingError> {
        if !self.phases.iter().any(|p| p.id == phase_id) {
            return Err(StagingError::UnknownPhase(PhaseKey::Persisted(
                phase_id.to_string(),
            )));
        }
        self.phases = backend.remove_phase(&self.project_id, phase_id).await?;
        info!(project = %self.project_id, phase = phase_id, "phase removed");
        Ok(())
    }

    pub async fn add_block<B: Backend>(
        &mut self,
        backend: &B,
        name: &str,
        phase: Option<&str>,
        status: BlockStatus,
    ) -> Result<String, StagingError> {
        if let Some(phase) = phase {
            if !self.phases.iter().any(|p| p.id == phase) {
                return Err(StagingError::UnknownPhase(PhaseKey::Persisted(
                    phase.to_string(),
                )));
            }
        }
        let new_block = NewBlock {
            name: name.trim().to_string(),
            project: self.project_id.clone(),
            phase: phase.filter(|id| is_object_id(id)).map(str::to_string),
            status,
        };
        if phase.is_some() && new_block.phase.is_none() {
            debug!(block = name, ?phase, "dropping malformed phase reference");
        }
        let created = backend.create_block(&new_block).await?;
        self.blocks = backend.list_blocks(&self.project_id).await?;
        info!(project = %self.project_id, block = %created.id, name, "block added");
        Ok(created.id)
    }

    pub async fn remove_block<B: Backend>(
        &mut self,
        backend: &B,
        block_id: &str,
    ) -> Result<(), StagingError> {
        backend.delete_block(block_id).await?;
        self.blocks = backend.list_blocks(&self.project_id).await?;
        info!(project = %self.project_id, block = block_id, "block removed");
        Ok(())
    }

    pub async fn stage_unit<B: Backend>(
        &mut self,
        backend: &B,
        unit_id: &str,
    ) -> Result<UnitAvailability, StagingError> {
        backend
            .assign_unit(unit_id, Some(self.project_id.as_str()))
            .await?;
        info!(project = %self.project_id, unit = unit_id, "unit assigned");
        self.refresh_units(backend).await
    }

    pub async fn unstage_unit<B: Backend>(
        &mut self,
        backend: &B,
        unit_id: &str,
    ) -> Result<UnitAvailability, StagingError> {
        backend.assign_unit(unit_id, None).await?;
        info!(project = %self.project_id, unit = unit_id, "unit released");
        self.refresh_units(backend).await
    }

    /// Re-read unit links from the server. What the server reports as
    /// assigned replaces the local set wholesale.
    pub async fn refresh_units<B: Backend>(
        &mut self,
        backend: &B,
    ) -> Result<UnitAvailability, StagingError> {
        let units = backend.list_units(&UnitFilter::default()).await?;
        let availability = compute_available(&units, Some(self.project_id.as_str()));
        self.units = availability.currently_assigned.clone();
        Ok(availability)
    }
}
