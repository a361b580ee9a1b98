use std::future::Future;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::core::api::model::{iso_date, pick_id};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Planned,
    InProgress,
    Delivered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawPhase")]
pub struct Phase {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso_date::option"
    )]
    pub delivery_date: Option<Date>,
    #[serde(default)]
    pub status: PhaseStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPhase {
    #[serde(rename = "_id", default)]
    object_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default, with = "iso_date::option")]
    delivery_date: Option<Date>,
    #[serde(default)]
    status: PhaseStatus,
}

impl TryFrom<RawPhase> for Phase {
    type Error = String;

    fn try_from(raw: RawPhase) -> Result<Self, Self::Error> {
        let Some(id) = pick_id(raw.object_id, raw.id) else {
            return Err(format!("phase {:?} has no id", raw.name));
        };
        Ok(Self {
            id,
            name: raw.name,
            delivery_date: raw.delivery_date,
            status: raw.status,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPhase {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", with = "iso_date::option")]
    pub delivery_date: Option<Date>,
    pub status: PhaseStatus,
}

/// Phases live inside their project; every mutation answers with the whole
/// updated collection.
pub trait PhaseService {
    fn add_phase(
        &self,
        project_id: &str,
        phase: &NewPhase,
    ) -> impl Future<Output = anyhow::Result<Vec<Phase>>>;
    fn remove_phase(
        &self,
        project_id: &str,
        phase_id: &str,
    ) -> impl Future<Output = anyhow::Result<Vec<Phase>>>;
}
