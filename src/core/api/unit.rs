use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::core::api::model::{ProjectRef, pick_id};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawUnit")]
pub struct Unit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectRef>,
}

#[derive(Deserialize)]
struct RawUnit {
    #[serde(rename = "_id", default)]
    object_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    project: Option<ProjectRef>,
}

impl TryFrom<RawUnit> for Unit {
    type Error = String;

    fn try_from(raw: RawUnit) -> Result<Self, Self::Error> {
        let Some(id) = pick_id(raw.object_id, raw.id) else {
            return Err(format!("unit {:?} has no id", raw.name));
        };
        Ok(Self {
            id,
            name: raw.name,
            project: raw.project,
        })
    }
}

impl Unit {
    pub fn project_id(&self) -> Option<&str> {
        self.project.as_ref().and_then(ProjectRef::id)
    }

    pub fn is_unassigned(&self) -> bool {
        self.project_id().is_none()
    }

    pub fn belongs_to(&self, project_id: &str) -> bool {
        self.project
            .as_ref()
            .is_some_and(|project| project.points_to(project_id))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitFilter {
    pub project: Option<String>,
    pub unassigned: bool,
}

/// Update body for a unit's project link; `None` serializes as `null` and
/// clears the link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitAssignment<'a> {
    pub project: Option<&'a str>,
}

pub trait UnitService {
    fn list_units(&self, filter: &UnitFilter) -> impl Future<Output = anyhow::Result<Vec<Unit>>>;
    fn assign_unit(
        &self,
        id: &str,
        project_id: Option<&str>,
    ) -> impl Future<Output = anyhow::Result<Unit>>;
}
