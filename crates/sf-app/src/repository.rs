//! Simulation persistence.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use sf_core::SimulationId;
use sf_project::Simulation;
use tracing::debug;

use crate::config::RepositoryConfig;
use crate::error::{AppError, AppResult};

/// Listing entry for a stored simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub id: SimulationId,
    pub name: String,
    pub parameter_count: usize,
    pub visualization_count: usize,
    pub scenario_count: usize,
}

impl From<&Simulation> for SimulationSummary {
    fn from(simulation: &Simulation) -> Self {
        Self {
            id: simulation.id.clone(),
            name: simulation.name.clone(),
            parameter_count: simulation.parameters.len(),
            visualization_count: simulation.visualizations.len(),
            scenario_count: simulation.scenarios.len(),
        }
    }
}

/// CRUD over the simulation aggregate. Run history is never stored here.
pub trait SimulationRepository: Send + Sync {
    fn create(&self, simulation: &Simulation) -> AppResult<()>;
    fn get(&self, id: &str) -> AppResult<Simulation>;
    fn update(&self, simulation: &Simulation) -> AppResult<()>;
    fn delete(&self, id: &str) -> AppResult<()>;
    fn list(&self) -> AppResult<Vec<SimulationSummary>>;
}

/// Build the repository named by the config.
pub fn from_config(
    config: &RepositoryConfig,
    request_timeout: Duration,
) -> AppResult<Arc<dyn SimulationRepository>> {
    Ok(match config {
        RepositoryConfig::File { root_dir } => Arc::new(FileRepository::new(root_dir.clone())?),
        RepositoryConfig::Http { base_url } => {
            Arc::new(HttpRepository::new(base_url.clone(), request_timeout)?)
        }
    })
}

/// Write `simulation` back unless it is the read-only demo.
pub fn persist(repository: &dyn SimulationRepository, simulation: &Simulation) -> AppResult<()> {
    if simulation.is_demo() {
        debug!("demo simulation is read-only; keeping change local");
        return Ok(());
    }
    repository.update(simulation)
}

fn check_id(id: &str) -> AppResult<()> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(AppError::InvalidInput(format!(
            "'{}' cannot be used as a simulation id",
            id
        )));
    }
    Ok(())
}

/// One YAML document per simulation under `root_dir`.
#[derive(Debug, Clone)]
pub struct FileRepository {
    root_dir: PathBuf,
}

impl FileRepository {
    pub fn new(root_dir: PathBuf) -> AppResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn path_for(&self, id: &str) -> AppResult<PathBuf> {
        check_id(id)?;
        Ok(self.root_dir.join(format!("{}.yaml", id)))
    }
}

impl SimulationRepository for FileRepository {
    fn create(&self, simulation: &Simulation) -> AppResult<()> {
        let path = self.path_for(&simulation.id)?;
        if path.exists() {
            return Err(AppError::Persistence(format!(
                "simulation '{}' already exists",
                simulation.id
            )));
        }
        sf_project::save_yaml(&path, simulation)?;
        Ok(())
    }

    fn get(&self, id: &str) -> AppResult<Simulation> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(AppError::SimulationNotFound(id.to_string()));
        }
        Ok(sf_project::load_yaml(&path)?)
    }

    fn update(&self, simulation: &Simulation) -> AppResult<()> {
        let path = self.path_for(&simulation.id)?;
        if !path.exists() {
            return Err(AppError::SimulationNotFound(simulation.id.clone()));
        }
        sf_project::save_yaml(&path, simulation)?;
        debug!(simulation_id = simulation.id.as_str(), path = %path.display(), "simulation saved");
        Ok(())
    }

    fn delete(&self, id: &str) -> AppResult<()> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(AppError::SimulationNotFound(id.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    fn list(&self) -> AppResult<Vec<SimulationSummary>> {
        let mut summaries = Vec::new();
        if !self.root_dir.exists() {
            return Ok(summaries);
        }

        for entry in fs::read_dir(&self.root_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            match sf_project::load_yaml(&path) {
                Ok(simulation) => summaries.push(SimulationSummary::from(&simulation)),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable simulation"),
            }
        }

        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }
}

/// Simulation API reached over HTTP.
///
/// Endpoints:
/// - `GET    {base}/api/simulations`
/// - `POST   {base}/api/simulations`
/// - `GET    {base}/api/simulations/{id}`
/// - `PUT    {base}/api/simulations/{id}`
/// - `DELETE {base}/api/simulations/{id}`
#[derive(Debug, Clone)]
pub struct HttpRepository {
    client: Client,
    base_url: String,
}

impl HttpRepository {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/api/simulations/{}", self.base_url, id),
            None => format!("{}/api/simulations", self.base_url),
        }
    }
}

fn check_response(response: Response, id: &str) -> AppResult<Response> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(AppError::SimulationNotFound(id.to_string()));
    }
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(AppError::Persistence(format!(
            "simulation API returned HTTP {}: {}",
            status.as_u16(),
            body
        )));
    }
    Ok(response)
}

impl SimulationRepository for HttpRepository {
    fn create(&self, simulation: &Simulation) -> AppResult<()> {
        let response = self.client.post(self.url(None)).json(simulation).send()?;
        check_response(response, &simulation.id)?;
        Ok(())
    }

    fn get(&self, id: &str) -> AppResult<Simulation> {
        let response = self.client.get(self.url(Some(id))).send()?;
        let simulation: Simulation = check_response(response, id)?.json()?;
        Ok(sf_project::finish_load(simulation)?)
    }

    fn update(&self, simulation: &Simulation) -> AppResult<()> {
        let response = self
            .client
            .put(self.url(Some(&simulation.id)))
            .json(simulation)
            .send()?;
        check_response(response, &simulation.id)?;
        Ok(())
    }

    fn delete(&self, id: &str) -> AppResult<()> {
        let response = self.client.delete(self.url(Some(id))).send()?;
        check_response(response, id)?;
        Ok(())
    }

    fn list(&self) -> AppResult<Vec<SimulationSummary>> {
        let response = self.client.get(self.url(None)).send()?;
        let simulations: Vec<Simulation> = check_response(response, "*")?.json()?;
        Ok(simulations.iter().map(SimulationSummary::from).collect())
    }
}

/// Process-local repository. Used for ephemeral sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    simulations: Mutex<BTreeMap<SimulationId, Simulation>>,
    fail_writes: Mutex<bool>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(simulation: Simulation) -> Self {
        let repository = Self::new();
        repository
            .lock()
            .insert(simulation.id.clone(), simulation);
        repository
    }

    /// Make every subsequent write fail, to exercise rollback paths.
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<SimulationId, Simulation>> {
        self.simulations.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self) -> AppResult<()> {
        if *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(AppError::Persistence("repository rejected the write".to_string()));
        }
        Ok(())
    }
}

impl SimulationRepository for MemoryRepository {
    fn create(&self, simulation: &Simulation) -> AppResult<()> {
        self.check_writable()?;
        let mut simulations = self.lock();
        if simulations.contains_key(&simulation.id) {
            return Err(AppError::Persistence(format!(
                "simulation '{}' already exists",
                simulation.id
            )));
        }
        simulations.insert(simulation.id.clone(), simulation.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> AppResult<Simulation> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::SimulationNotFound(id.to_string()))
    }

    fn update(&self, simulation: &Simulation) -> AppResult<()> {
        self.check_writable()?;
        let mut simulations = self.lock();
        match simulations.get_mut(&simulation.id) {
            Some(stored) => {
                *stored = simulation.clone();
                Ok(())
            }
            None => Err(AppError::SimulationNotFound(simulation.id.clone())),
        }
    }

    fn delete(&self, id: &str) -> AppResult<()> {
        self.check_writable()?;
        self.lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::SimulationNotFound(id.to_string()))
    }

    fn list(&self) -> AppResult<Vec<SimulationSummary>> {
        Ok(self.lock().values().map(SimulationSummary::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_project::demo_simulation;

    #[test]
    fn rejects_path_like_ids() {
        assert!(check_id("../etc").is_err());
        assert!(check_id("a/b").is_err());
        assert!(check_id("..").is_err());
        assert!(check_id("pricing-2024").is_ok());
    }

    #[test]
    fn memory_update_requires_existing() {
        let repository = MemoryRepository::new();
        let mut simulation = demo_simulation();
        simulation.id = "copy".to_string();
        assert!(matches!(
            repository.update(&simulation),
            Err(AppError::SimulationNotFound(_))
        ));
        repository.create(&simulation).unwrap();
        repository.update(&simulation).unwrap();
        assert_eq!(repository.list().unwrap().len(), 1);
    }

    #[test]
    fn persist_skips_demo() {
        let repository = MemoryRepository::new();
        repository.set_fail_writes(true);
        persist(&repository, &demo_simulation()).unwrap();
    }
}
