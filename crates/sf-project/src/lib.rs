//! sf-project: canonical simulation document format and validation.

pub mod demo;
pub mod migrate;
pub mod schema;
pub mod validate;

pub use demo::{DEMO_SIMULATION_ID, demo_simulation};
pub use migrate::{LATEST_VERSION, migrate_to_latest};
pub use schema::*;
pub use validate::{ValidationError, validate_simulation};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Migration error: {what}")]
    Migration { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse, migrate and validate a simulation from YAML text.
pub fn from_yaml_str(content: &str) -> ProjectResult<Simulation> {
    let simulation: Simulation = serde_yaml::from_str(content)?;
    finish_load(simulation)
}

/// Parse, migrate and validate a simulation from JSON text.
pub fn from_json_str(content: &str) -> ProjectResult<Simulation> {
    let simulation: Simulation = serde_json::from_str(content)?;
    finish_load(simulation)
}

/// Migrate and validate a simulation received from elsewhere.
pub fn finish_load(simulation: Simulation) -> ProjectResult<Simulation> {
    let simulation = migrate_to_latest(simulation)?;
    validate_simulation(&simulation)?;
    Ok(simulation)
}

pub fn load_yaml(path: &std::path::Path) -> ProjectResult<Simulation> {
    let content = std::fs::read_to_string(path)?;
    from_yaml_str(&content)
}

pub fn save_yaml(path: &std::path::Path, simulation: &Simulation) -> ProjectResult<()> {
    validate_simulation(simulation)?;
    let content = serde_yaml::to_string(simulation)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &std::path::Path) -> ProjectResult<Simulation> {
    let content = std::fs::read_to_string(path)?;
    from_json_str(&content)
}

pub fn save_json(path: &std::path::Path, simulation: &Simulation) -> ProjectResult<()> {
    validate_simulation(simulation)?;
    let content = serde_json::to_string_pretty(simulation)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load by extension: `.json` as JSON, anything else as YAML.
pub fn load_any(path: &std::path::Path) -> ProjectResult<Simulation> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => load_json(path),
        _ => load_yaml(path),
    }
}
