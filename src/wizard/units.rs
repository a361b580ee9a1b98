use crate::core::api::Unit;

/// Units offered by the assignment step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitAvailability {
    /// Units that may be linked to the project: unassigned ones, plus those
    /// already linked to it.
    pub available: Vec<Unit>,
    /// Ids of units the server already links to the project.
    pub currently_assigned: Vec<String>,
}

/// Split `units` into what the assignment step may offer for `project_id`.
/// Without a project only unassigned units are offered and nothing is
/// assigned yet.
pub fn compute_available(units: &[Unit], project_id: Option<&str>) -> UnitAvailability {
    match project_id {
        None => UnitAvailability {
            available: units.iter().filter(|u| u.is_unassigned()).cloned().collect(),
            currently_assigned: vec![],
        },
        Some(project_id) => {
            let mut availability = UnitAvailability::default();
            for unit in units {
                if unit.belongs_to(project_id) {
                    availability.currently_assigned.push(unit.id.clone());
                    availability.available.push(unit.clone());
                } else if unit.is_unassigned() {
                    availability.available.push(unit.clone());
                }
            }
            availability
        }
    }
}
