//! Named parameter snapshots stored on the simulation.
//!
//! Every change is written back through the [`SimulationRepository`]; when the
//! write fails the local change is rolled back and the error returned.

use chrono::Utc;
use sf_core::ParameterValues;
use sf_project::{ScenarioDef, Simulation};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::params::ParameterPatch;
use crate::repository::{SimulationRepository, persist};

pub struct ScenarioStore<'a> {
    simulation: &'a mut Simulation,
    repository: &'a dyn SimulationRepository,
}

impl<'a> ScenarioStore<'a> {
    pub fn new(simulation: &'a mut Simulation, repository: &'a dyn SimulationRepository) -> Self {
        Self {
            simulation,
            repository,
        }
    }

    pub fn list(&self) -> &[ScenarioDef] {
        &self.simulation.scenarios
    }

    /// Snapshot `parameter_values` under `name`. Names need not be unique.
    pub fn save(
        &mut self,
        name: &str,
        description: Option<String>,
        parameter_values: &ParameterValues,
    ) -> AppResult<ScenarioDef> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput(
                "scenario name must not be empty".to_string(),
            ));
        }

        let scenario = ScenarioDef {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description,
            parameter_values: parameter_values.clone(),
            created_at: Utc::now().to_rfc3339(),
        };

        self.simulation.scenarios.push(scenario.clone());
        if let Err(e) = self.write_back() {
            self.simulation.scenarios.pop();
            return Err(e);
        }

        info!(
            simulation_id = self.simulation.id.as_str(),
            scenario_id = scenario.id.as_str(),
            "scenario saved"
        );
        Ok(scenario)
    }

    /// Patch that replaces the live parameter map with the scenario's values verbatim.
    pub fn load(&self, scenario_id: &str) -> AppResult<ParameterPatch> {
        let scenario = self
            .simulation
            .scenario(scenario_id)
            .ok_or_else(|| AppError::ScenarioNotFound(scenario_id.to_string()))?;
        Ok(ParameterPatch::Replace(scenario.parameter_values.clone()))
    }

    pub fn delete(&mut self, scenario_id: &str) -> AppResult<ScenarioDef> {
        let index = self
            .simulation
            .scenarios
            .iter()
            .position(|s| s.id == scenario_id)
            .ok_or_else(|| AppError::ScenarioNotFound(scenario_id.to_string()))?;

        let removed = self.simulation.scenarios.remove(index);
        if let Err(e) = self.write_back() {
            self.simulation.scenarios.insert(index, removed);
            return Err(e);
        }
        Ok(removed)
    }

    /// Re-append a previously deleted scenario.
    pub fn restore(&mut self, scenario: ScenarioDef) -> AppResult<()> {
        if self.simulation.scenario(&scenario.id).is_some() {
            return Err(AppError::InvalidInput(format!(
                "scenario '{}' already exists",
                scenario.id
            )));
        }
        self.simulation.scenarios.push(scenario);
        if let Err(e) = self.write_back() {
            self.simulation.scenarios.pop();
            return Err(e);
        }
        Ok(())
    }

    fn write_back(&mut self) -> AppResult<()> {
        let previous = self.simulation.updated_at.replace(Utc::now().to_rfc3339());
        let result = persist(self.repository, self.simulation);
        if let Err(e) = &result {
            warn!(
                simulation_id = self.simulation.id.as_str(),
                error = %e,
                "failed to persist scenarios; rolling back"
            );
            self.simulation.updated_at = previous;
        }
        result
    }
}
