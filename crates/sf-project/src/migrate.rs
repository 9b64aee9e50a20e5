//! Schema migration framework.

use crate::ProjectError;
use crate::schema::Simulation;

pub const LATEST_VERSION: u32 = 2;

pub fn migrate_to_latest(mut simulation: Simulation) -> Result<Simulation, ProjectError> {
    while simulation.version < LATEST_VERSION {
        simulation = migrate_one_version(simulation)?;
    }
    Ok(simulation)
}

fn migrate_one_version(simulation: Simulation) -> Result<Simulation, ProjectError> {
    match simulation.version {
        0 => migrate_v0_to_v1(simulation),
        1 => migrate_v1_to_v2(simulation),
        v => Err(ProjectError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

fn migrate_v0_to_v1(mut simulation: Simulation) -> Result<Simulation, ProjectError> {
    simulation.version = 1;
    Ok(simulation)
}

/// v1 documents carried neither `variableName` nor an explicit `order`.
fn migrate_v1_to_v2(mut simulation: Simulation) -> Result<Simulation, ProjectError> {
    let all_unordered = simulation.parameters.iter().all(|p| p.order == 0);

    for (idx, parameter) in simulation.parameters.iter_mut().enumerate() {
        if parameter.variable_name.is_empty() {
            parameter.variable_name = parameter.id.clone();
        }
        if all_unordered {
            parameter.order = i32::try_from(idx).unwrap_or(i32::MAX);
        }
    }

    simulation.version = 2;
    Ok(simulation)
}
