use std::{fmt, mem};

use serde::Deserialize;
use time::{Date, OffsetDateTime};
use tracing::debug;

use crate::{
    core::api::{
        BlockStatus, PhaseStatus, ProjectCategory, ProjectFields, ProjectStatus,
        model::iso_date,
    },
    wizard::{BlockKey, images::ImageRef, live::LiveChildren},
};

/// Locally generated key for a child entity that has no server id yet.
/// Derived from the wall clock in milliseconds and strictly increasing within
/// one session; never sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempId(u64);

impl TempId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tmp-{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct TempIdGen {
    last: u64,
}

impl TempIdGen {
    pub fn next(&mut self) -> TempId {
        let now = u64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000)
            .unwrap_or(0);
        self.last = now.max(self.last + 1);
        TempId(self.last)
    }
}

/// Reference from a block to its phase: a staged phase while the project is
/// still a draft, a server phase once it exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhaseKey {
    Draft(TempId),
    Persisted(String),
}

impl fmt::Display for PhaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKey::Draft(id) => write!(f, "{}", id),
            PhaseKey::Persisted(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("The project wizard is not open")]
    NotOpen,

    #[error("A phase named {0:?} is already staged")]
    DuplicatePhaseName(String),

    #[error("Unknown phase {0}")]
    UnknownPhase(PhaseKey),

    #[error("Phase {0} cannot be used in this mode")]
    WrongPhaseKind(PhaseKey),

    #[error("Block {0} cannot be used in this mode")]
    WrongBlockKind(BlockKey),

    #[error("Unit {0} is not available for this project")]
    UnitUnavailable(String),

    #[error("Server did not report the new phase {0:?}")]
    PhaseNotReported(String),

    #[error(transparent)]
    Server(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct CoordinatesPatch {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PriceRangePatch {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
}

/// Partial update of a draft project. Nested groups merge field by field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub category: Option<ProjectCategory>,
    pub developer: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub coordinates: Option<CoordinatesPatch>,
    pub price_range: Option<PriceRangePatch>,
    pub amenities: Option<Vec<String>>,
    #[serde(with = "iso_date::option")]
    pub delivery_date: Option<Date>,
}

/// Working copy of a project's fields and ordered image list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftProject {
    pub fields: ProjectFields,
    pub images: Vec<ImageRef>,
}

impl DraftProject {
    pub fn apply(&mut self, patch: ProjectPatch) {
        let fields = &mut self.fields;
        if let Some(name) = patch.name {
            fields.name = name;
        }
        if let Some(description) = patch.description {
            fields.description = description;
        }
        if let Some(status) = patch.status {
            fields.status = status;
        }
        if let Some(category) = patch.category {
            fields.category = category;
        }
        if let Some(developer) = patch.developer {
            fields.developer = Some(developer).filter(|d| !d.is_empty());
        }
        if let Some(address) = patch.address {
            fields.address = address;
        }
        if let Some(city) = patch.city {
            fields.city = city;
        }
        if let Some(coordinates) = patch.coordinates {
            if let Some(lat) = coordinates.lat {
                fields.coordinates.lat = lat;
            }
            if let Some(lng) = coordinates.lng {
                fields.coordinates.lng = lng;
            }
        }
        if let Some(price_range) = patch.price_range {
            if price_range.min.is_some() {
                fields.price_range.min = price_range.min;
            }
            if price_range.max.is_some() {
                fields.price_range.max = price_range.max;
            }
            if price_range.currency.is_some() {
                fields.price_range.currency = price_range.currency;
            }
        }
        if let Some(amenities) = patch.amenities {
            fields.amenities = amenities;
        }
        if let Some(delivery_date) = patch.delivery_date {
            fields.delivery_date = Some(delivery_date);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DraftPhase {
    pub temp_id: TempId,
    pub name: String,
    pub delivery_date: Option<Date>,
    pub status: PhaseStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DraftBlock {
    pub temp_id: TempId,
    pub name: String,
    pub phase: Option<TempId>,
    pub status: BlockStatus,
}

/// Children staged for a project that does not exist yet, taken out of the
/// draft in one piece at commit time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedChildren {
    pub phases: Vec<DraftPhase>,
    pub blocks: Vec<DraftBlock>,
    pub units: Vec<String>,
}

impl StagedChildren {
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty() && self.blocks.is_empty() && self.units.is_empty()
    }
}

pub(crate) fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Create-mode staging: everything stays in memory.
#[derive(Debug, Default)]
pub struct DraftChildren {
    ids: TempIdGen,
    staged: StagedChildren,
}

impl DraftChildren {
    pub fn staged(&self) -> &StagedChildren {
        &self.staged
    }

    pub fn add_phase(
        &mut self,
        name: &str,
        delivery_date: Option<Date>,
        status: PhaseStatus,
    ) -> Result<TempId, StagingError> {
        let key = name_key(name);
        if self.staged.phases.iter().any(|p| name_key(&p.name) == key) {
            return Err(StagingError::DuplicatePhaseName(name.to_string()));
        }
        let temp_id = self.ids.next();
        self.staged.phases.push(DraftPhase {
            temp_id,
            name: name.trim().to_string(),
            delivery_date,
            status,
        });
        debug!(%temp_id, name, "staged phase");
        Ok(temp_id)
    }

    /// Drop a staged phase. Blocks that pointed at it lose their phase.
    pub fn remove_phase(&mut self, id: TempId) -> bool {
        let before = self.staged.phases.len();
        self.staged.phases.retain(|p| p.temp_id != id);
        for block in &mut self.staged.blocks {
            if block.phase == Some(id) {
                block.phase = None;
            }
        }
        self.staged.phases.len() != before
    }

    pub fn add_block(
        &mut self,
        name: &str,
        phase: Option<TempId>,
        status: BlockStatus,
    ) -> Result<TempId, StagingError> {
        if let Some(phase) = phase {
            if !self.staged.phases.iter().any(|p| p.temp_id == phase) {
                return Err(StagingError::UnknownPhase(PhaseKey::Draft(phase)));
            }
        }
        let temp_id = self.ids.next();
        self.staged.blocks.push(DraftBlock {
            temp_id,
            name: name.trim().to_string(),
            phase,
            status,
        });
        debug!(%temp_id, name, "staged block");
        Ok(temp_id)
    }

    pub fn remove_block(&mut self, id: TempId) -> bool {
        let before = self.staged.blocks.len();
        self.staged.blocks.retain(|b| b.temp_id != id);
        self.staged.blocks.len() != before
    }

    pub fn stage_unit(&mut self, id: &str) {
        if !self.staged.units.iter().any(|u| u == id) {
            self.staged.units.push(id.to_string());
        }
    }

    pub fn unstage_unit(&mut self, id: &str) -> bool {
        let before = self.staged.units.len();
        self.staged.units.retain(|u| u != id);
        self.staged.units.len() != before
    }

    /// Keep only staged units that are still offered.
    pub fn retain_units(&mut self, mut offered: impl FnMut(&str) -> bool) {
        self.staged.units.retain(|u| offered(u.as_str()));
    }

    /// Move all staged children out, leaving the staging empty.
    pub fn take(&mut self) -> StagedChildren {
        mem::take(&mut self.staged)
    }

    /// Put back children taken by [`DraftChildren::take`] when nothing was
    /// sent for them.
    pub fn restore(&mut self, staged: StagedChildren) {
        self.staged = staged;
    }
}

/// How child actions are carried out for the current session, chosen once
/// when the wizard opens: staged in memory for a new project, or applied to
/// the server for an existing one.
#[derive(Debug)]
pub enum Staging {
    Draft(DraftChildren),
    Live(LiveChildren),
}

impl Staging {
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Staging::Draft(_) => None,
            Staging::Live(live) => Some(live.project_id()),
        }
    }

    pub fn staged_units(&self) -> &[String] {
        match self {
            Staging::Draft(draft) => &draft.staged().units,
            Staging::Live(live) => live.units(),
        }
    }
}
