use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sf_app::{
    AppError, FileRepository, RepositoryConfig, SessionParts, SimflowConfig, SimulationRepository,
    SimulationSession, repository,
};
use sf_exec::NoWaitSleeper;
use sf_project::demo_simulation;

fn temp_root(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("sf_app_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn stored_simulation(id: &str) -> sf_project::Simulation {
    let mut simulation = demo_simulation();
    simulation.id = id.to_string();
    simulation.name = format!("Pricing {}", id);
    simulation
}

#[test]
fn crud_round_trip() {
    let root = temp_root("crud");
    let repo = FileRepository::new(root.clone()).unwrap();

    let simulation = stored_simulation("pricing");
    repo.create(&simulation).unwrap();
    assert!(repo.create(&simulation).is_err());
    assert!(root.join("pricing.yaml").exists());

    let mut loaded = repo.get("pricing").unwrap();
    assert_eq!(loaded, simulation);

    loaded.parameters[0].default_value = json!(120);
    repo.update(&loaded).unwrap();
    assert_eq!(repo.get("pricing").unwrap().parameters[0].default_value, json!(120));

    repo.create(&stored_simulation("churn")).unwrap();
    let ids: Vec<String> = repo.list().unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["churn", "pricing"]);

    repo.delete("pricing").unwrap();
    assert!(matches!(
        repo.get("pricing"),
        Err(AppError::SimulationNotFound(_))
    ));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn session_writes_scenarios_through_to_disk() {
    let root = temp_root("session");
    let config = SimflowConfig {
        repository: RepositoryConfig::File {
            root_dir: root.clone(),
        },
        ..SimflowConfig::default()
    };
    let repo = repository::from_config(&config.repository, Duration::from_secs(1)).unwrap();

    let simulation = stored_simulation("pricing");
    repo.create(&simulation).unwrap();

    let parts = SessionParts::new(
        Arc::new(sf_app::DemoExecutionService::for_simulation(&simulation).unwrap()),
        repo.clone(),
    )
    .with_sleeper(Arc::new(NoWaitSleeper));
    let session = SimulationSession::open(simulation, parts, &config);

    session.set_parameter("price", &json!(149)).unwrap();
    let scenario = session.save_scenario("Premium", Some("high end".to_string())).unwrap();
    session.remove_visualization("kpi-margin").unwrap();

    let on_disk = repo.get("pricing").unwrap();
    assert_eq!(on_disk.scenarios.len(), 1);
    assert_eq!(on_disk.scenarios[0].id, scenario.id);
    assert_eq!(on_disk.scenarios[0].parameter_values["price"], json!(149));
    assert!(on_disk.visualization("kpi-margin").is_none());
    assert!(on_disk.updated_at.is_some());

    session.undo().unwrap();
    assert!(repo.get("pricing").unwrap().visualization("kpi-margin").is_some());

    let _ = std::fs::remove_dir_all(&root);
}
