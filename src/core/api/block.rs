use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::core::api::model::pick_id;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    #[default]
    Planned,
    UnderConstruction,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock")]
pub struct Block {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default)]
    pub status: BlockStatus,
}

#[derive(Deserialize)]
struct RawBlock {
    #[serde(rename = "_id", default)]
    object_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    status: BlockStatus,
}

impl TryFrom<RawBlock> for Block {
    type Error = String;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        let Some(id) = pick_id(raw.object_id, raw.id) else {
            return Err(format!("block {:?} has no id", raw.name));
        };
        Ok(Self {
            id,
            name: raw.name,
            phase: raw.phase,
            status: raw.status,
        })
    }
}

/// Create-block payload. Without a phase the `phase` key is left out of the
/// body entirely rather than sent as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewBlock {
    pub name: String,
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    pub status: BlockStatus,
}

pub trait BlockService {
    fn create_block(&self, block: &NewBlock) -> impl Future<Output = anyhow::Result<Block>>;
    fn delete_block(&self, id: &str) -> impl Future<Output = anyhow::Result<()>>;
    fn list_blocks(&self, project_id: &str) -> impl Future<Output = anyhow::Result<Vec<Block>>>;
}
