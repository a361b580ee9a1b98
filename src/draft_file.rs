//! JSON description of a wizard session, replayed through
//! [`ProjectWizard`] by the `submit` command.
//!
//! ```json
//! {
//!   "project": { "name": "Palm Heights", "coordinates": { "lat": 25.2 } },
//!   "images": ["https://cdn.example.com/cover.jpg", "./photos/lobby.jpg"],
//!   "phases": [{ "name": "Phase 1", "deliveryDate": "2027-06-30" }],
//!   "blocks": [{ "name": "Tower A", "phase": "Phase 1" }],
//!   "units": ["65a1f0c2e4b0a1b2c3d4e5f6"]
//! }
//! ```

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;
use time::Date;
use tracing::debug;

use crate::{
    core::api::{Backend, model::iso_date},
    wizard::{PhaseKey, ProjectPatch, ProjectWizard, Staging, draft::name_key},
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseEntry {
    pub name: String,
    #[serde(default, with = "iso_date::option")]
    pub delivery_date: Option<Date>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockEntry {
    pub name: String,
    /// Name of a phase listed in the same file or already on the project.
    #[serde(default)]
    pub phase: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DraftFile {
    pub project: ProjectPatch,
    /// Uploaded image urls, or paths to local files to upload. Relative paths
    /// resolve against the draft file's directory.
    pub images: Vec<String>,
    pub phases: Vec<PhaseEntry>,
    pub blocks: Vec<BlockEntry>,
    pub units: Vec<String>,
}

fn is_remote(image: &str) -> bool {
    image.starts_with("https://") || image.starts_with("http://")
}

impl DraftFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read draft file {:?}", path))?;
        let mut draft: DraftFile = serde_json::from_str(&text)
            .with_context(|| format!("Invalid draft file {:?}", path))?;
        if let Some(base) = path.parent() {
            draft.resolve_paths(base);
        }
        Ok(draft)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for image in &mut self.images {
            if !is_remote(image) && Path::new(image.as_str()).is_relative() {
                *image = base.join(image.as_str()).to_string_lossy().into_owned();
            }
        }
    }

    /// Stage everything in this file on an open wizard.
    pub async fn stage<B: Backend>(self, wizard: &mut ProjectWizard<B>) -> anyhow::Result<()> {
        wizard.stage_project(self.project)?;

        for image in &self.images {
            if is_remote(image) {
                debug!(image = %image, "keeping uploaded image reference");
                wizard.attach_image(image)?;
            } else {
                wizard.stage_image(&PathBuf::from(image))?;
            }
        }

        let mut phases: HashMap<String, PhaseKey> = HashMap::new();
        if let Some(Staging::Live(live)) = wizard.session().map(|s| s.staging()) {
            for phase in live.phases() {
                phases.insert(name_key(&phase.name), PhaseKey::Persisted(phase.id.clone()));
            }
        }
        for phase in &self.phases {
            let key = wizard.add_phase(&phase.name, phase.delivery_date).await?;
            phases.insert(name_key(&phase.name), key);
        }

        for block in &self.blocks {
            let phase = match &block.phase {
                Some(name) => Some(
                    phases
                        .get(&name_key(name))
                        .with_context(|| {
                            format!("Block {:?} refers to unknown phase {:?}", block.name, name)
                        })?
                        .clone(),
                ),
                None => None,
            };
            wizard.add_block(&block.name, phase.as_ref()).await?;
        }

        if !self.units.is_empty() {
            wizard.enter_unit_step().await?;
            for unit in &self.units {
                wizard.stage_unit(unit).await?;
            }
        }
        Ok(())
    }
}
