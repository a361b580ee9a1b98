use std::future::Future;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::core::api::{
    model::{Coordinates, PriceRange, iso_date, pick_id},
    phase::Phase,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Upcoming,
    Ongoing,
    Completed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectCategory {
    #[default]
    Residential,
    Commercial,
    MixedUse,
}

/// Editable fields of a project, without its identity, images or children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFields {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub category: ProjectCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub coordinates: Coordinates,
    #[serde(default)]
    pub price_range: PriceRange,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso_date::option"
    )]
    pub delivery_date: Option<Date>,
}

/// Body of a create or update call: the fields plus the persisted image list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectPayload {
    #[serde(flatten)]
    pub fields: ProjectFields,
    pub images: Vec<String>,
}

/// A project as returned by the server. `id` is optional because a create
/// response is not trusted to carry it; bodies may hold `_id`, `id` or both.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawProject")]
pub struct Project {
    pub id: Option<String>,
    pub fields: ProjectFields,
    pub images: Vec<String>,
    pub phases: Vec<Phase>,
}

#[derive(Deserialize)]
struct RawProject {
    #[serde(rename = "_id", default)]
    object_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(flatten)]
    fields: ProjectFields,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    phases: Vec<Phase>,
}

impl From<RawProject> for Project {
    fn from(raw: RawProject) -> Self {
        Self {
            id: pick_id(raw.object_id, raw.id),
            fields: raw.fields,
            images: raw.images,
            phases: raw.phases,
        }
    }
}

pub trait ProjectService {
    fn create_project(
        &self,
        payload: &ProjectPayload,
    ) -> impl Future<Output = anyhow::Result<Project>>;
    fn update_project(
        &self,
        id: &str,
        payload: &ProjectPayload,
    ) -> impl Future<Output = anyhow::Result<Project>>;
    fn get_project(&self, id: &str) -> impl Future<Output = anyhow::Result<Project>>;
}
