use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};
use sf_app::{
    AppError, ChatOutcome, ChatResponse, DemoExecutionService, MemoryRepository, ParameterPatch,
    RunOutcome, RunProgressEvent, RunStage, SessionParts, SimflowConfig, SimulationRepository,
    SimulationSession, UndoEntry,
};
use sf_core::{ManualClock, ParameterValues};
use sf_exec::{
    ExecError, ExecResult, ExecutionRequest, ExecutionService, NoWaitSleeper, StatusResponse,
    TriggerResponse,
};
use sf_project::{Simulation, demo_simulation};
use sf_results::ExecutionMode;

/// Service answering from fixed scripts. The last status repeats forever.
struct ScriptedService {
    triggers: Mutex<VecDeque<ExecResult<Value>>>,
    statuses: Mutex<VecDeque<Value>>,
}

impl ScriptedService {
    fn new(triggers: Vec<ExecResult<Value>>, statuses: Vec<Value>) -> Self {
        Self {
            triggers: Mutex::new(triggers.into()),
            statuses: Mutex::new(statuses.into()),
        }
    }
}

impl ExecutionService for ScriptedService {
    fn trigger(&self, _request: &ExecutionRequest) -> ExecResult<TriggerResponse> {
        let next = self
            .triggers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ExecError::Transport("script exhausted".to_string())));
        next.map(TriggerResponse::from_value)
    }

    fn status(&self, _execution_id: &str) -> ExecResult<StatusResponse> {
        let mut statuses = self.statuses.lock().unwrap();
        let value = if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            statuses.front().cloned().unwrap_or(Value::Null)
        };
        Ok(StatusResponse::from_value(value))
    }

    fn cancel(&self, _execution_id: &str) -> ExecResult<()> {
        Ok(())
    }
}

fn fast_config() -> SimflowConfig {
    let mut config = SimflowConfig::default();
    config.polling.interval_ms = 0;
    config
}

fn session_with(
    simulation: Simulation,
    service: Arc<dyn ExecutionService>,
    repository: Arc<MemoryRepository>,
    config: &SimflowConfig,
) -> SimulationSession {
    let parts = SessionParts::new(service, repository).with_sleeper(Arc::new(NoWaitSleeper));
    SimulationSession::open(simulation, parts, config)
}

fn demo_session(background_checks: Option<u32>) -> SimulationSession {
    let simulation = demo_simulation();
    let mut service = DemoExecutionService::for_simulation(&simulation).unwrap();
    if let Some(checks) = background_checks {
        service = service.in_background(checks);
    }
    session_with(
        simulation,
        Arc::new(service),
        Arc::new(MemoryRepository::new()),
        &fast_config(),
    )
}

fn completed(outcome: RunOutcome) -> sf_app::RunResponse {
    match outcome {
        RunOutcome::Completed(response) => response,
        RunOutcome::Skipped => panic!("execution was skipped"),
    }
}

#[test]
fn demo_defaults_produce_reference_figures() {
    let session = demo_session(None);
    let response = completed(session.execute().unwrap());

    let result = session.last_result().unwrap();
    assert_eq!(result["revenue"], json!(99000.0));
    assert_eq!(result["costs"], json!(34650.0));
    assert_eq!(result["profit"], json!(64350.0));
    assert_eq!(result["margin"], json!(65.0));
    assert_eq!(result["annualRevenue"], json!(1188000.0));

    assert_eq!(response.run.mode, ExecutionMode::Sync);
    assert_eq!(response.status_checks, 0);
    assert_eq!(session.history().len(), 1);
    assert!(!session.is_executing());
}

#[test]
fn background_run_polls_to_completion() {
    let session = demo_session(Some(3));
    let response = completed(session.execute().unwrap());

    assert_eq!(response.run.mode, ExecutionMode::Background);
    assert_eq!(response.status_checks, 3);
    assert!(response.run.execution_id.is_some());
    assert_eq!(session.last_result().unwrap()["profit"], json!(64350.0));
}

#[test]
fn progress_stages_are_reported_in_order() {
    let session = demo_session(Some(2));
    let mut stages = Vec::new();
    let mut percentages = Vec::new();
    session
        .execute_with_progress(Some(&mut |event: RunProgressEvent| {
            if let Some(nodes) = event.poll.as_ref().and_then(|p| p.nodes.as_ref()) {
                percentages.push(nodes.percentage);
            }
            if stages.last() != Some(&event.stage) {
                stages.push(event.stage);
            }
        }))
        .unwrap();

    assert_eq!(
        stages,
        vec![
            RunStage::BuildingInputs,
            RunStage::Submitting,
            RunStage::Polling,
            RunStage::Normalizing,
            RunStage::Recording,
            RunStage::Completed,
        ]
    );
    assert_eq!(percentages, vec![50]);
}

#[test]
fn failed_run_keeps_previous_result() {
    let service = Arc::new(ScriptedService::new(
        vec![
            Ok(json!({"result": {"n1": {"outputData": {"a": 1}}}})),
            Err(ExecError::Status {
                code: 500,
                body: "boom".to_string(),
            }),
        ],
        vec![],
    ));
    let session = session_with(
        demo_simulation(),
        service,
        Arc::new(MemoryRepository::new()),
        &fast_config(),
    );

    completed(session.execute().unwrap());
    let err = session.execute().unwrap_err();

    assert!(matches!(
        err,
        AppError::Execution(ExecError::Status { code: 500, .. })
    ));
    assert_eq!(session.last_result(), Some(json!({"a": 1})));
    assert_eq!(session.history().len(), 1);
    assert!(!session.is_executing());
}

#[test]
fn terminal_failure_and_timeout_are_distinct_errors() {
    let failing = Arc::new(ScriptedService::new(
        vec![Ok(json!({"backgroundExecution": true, "executionId": "e1"}))],
        vec![json!({"status": "failed", "error": "node crashed"})],
    ));
    let session = session_with(
        demo_simulation(),
        failing,
        Arc::new(MemoryRepository::new()),
        &fast_config(),
    );
    match session.execute().unwrap_err() {
        AppError::ExecutionFailed { error, .. } => assert_eq!(error.as_deref(), Some("node crashed")),
        other => panic!("unexpected error: {other}"),
    }

    let stuck = Arc::new(ScriptedService::new(
        vec![Ok(json!({"backgroundExecution": true, "executionId": "e2"}))],
        vec![json!({"status": "running"})],
    ));
    let mut config = fast_config();
    config.polling.max_attempts = 4;
    let session = session_with(
        demo_simulation(),
        stuck,
        Arc::new(MemoryRepository::new()),
        &config,
    );
    assert!(matches!(
        session.execute().unwrap_err(),
        AppError::ExecutionTimedOut { attempts: 4, .. }
    ));
    assert!(session.last_result().is_none());
    assert!(session.history().is_empty());
}

#[test]
fn history_keeps_the_fifty_most_recent_runs() {
    let session = demo_session(None);
    for price in 1..=55 {
        session.set_parameter("price", &json!(price)).unwrap();
        completed(session.execute().unwrap());
    }

    let history = session.history();
    assert_eq!(history.len(), 50);
    assert_eq!(history[0].parameter_values["price"], json!(55));
    assert_eq!(history[49].parameter_values["price"], json!(6));
}

#[test]
fn restoring_a_run_keeps_parameters_it_lacks() {
    let session = demo_session(None);
    let mut partial = ParameterValues::new();
    partial.insert("price".to_string(), json!(150));
    session.apply(ParameterPatch::Replace(partial));
    let run = completed(session.execute().unwrap()).run;
    assert!(!run.parameter_values.contains_key("volume"));

    session.set_parameter("price", &json!(10)).unwrap();
    session.set_parameter("volume", &json!(2000)).unwrap();
    let restored = session.restore_run(&run.id).unwrap();

    assert_eq!(restored["price"], json!(150));
    assert_eq!(restored["volume"], json!(2000));
    assert!(matches!(
        session.restore_run("missing"),
        Err(AppError::RunNotFound(_))
    ));
}

#[test]
fn scenario_load_restores_saved_values_exactly() {
    let session = demo_session(None);
    session.set_parameter("price", &json!(250)).unwrap();
    session.set_parameter("growth", &json!(12.5)).unwrap();
    let saved_values = session.parameters();
    let scenario = session.save_scenario("Premium", None).unwrap();

    session.reset_parameters();
    session.set_parameter("volume", &json!(10)).unwrap();
    let loaded = session.load_scenario(&scenario.id).unwrap();

    assert_eq!(loaded, saved_values);
    assert_eq!(session.parameters(), saved_values);
}

#[test]
fn scenario_persistence_failure_rolls_back() {
    let mut simulation = demo_simulation();
    simulation.id = "pricing".to_string();
    let repository = Arc::new(MemoryRepository::with(simulation.clone()));
    let session = session_with(
        simulation,
        Arc::new(DemoExecutionService::for_simulation(&demo_simulation()).unwrap()),
        repository.clone(),
        &fast_config(),
    );

    session.save_scenario("Kept", None).unwrap();
    repository.set_fail_writes(true);
    assert!(matches!(
        session.save_scenario("Lost", None),
        Err(AppError::Persistence(_))
    ));

    let names: Vec<String> = session.scenarios().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["Kept"]);
    let stored = repository.get("pricing").unwrap();
    assert_eq!(stored.scenarios.len(), 1);
}

#[test]
fn removed_visualization_returns_at_the_end_on_undo() {
    let clock = Arc::new(ManualClock::new());
    let simulation = demo_simulation();
    let parts = SessionParts::new(
        Arc::new(DemoExecutionService::for_simulation(&simulation).unwrap()),
        Arc::new(MemoryRepository::new()),
    )
    .with_sleeper(Arc::new(NoWaitSleeper))
    .with_clock(clock.clone());
    let session = SimulationSession::open(simulation, parts, &fast_config());

    session.remove_visualization("kpi-profit").unwrap();
    let notice = session.undo_notice().unwrap();
    assert_eq!(notice.message, "Removed visualization \"Profit\"");

    clock.advance(Duration::from_millis(5000));
    assert!(session.undo_notice().is_none());

    let undone = session.undo().unwrap();
    assert!(matches!(undone, Some(UndoEntry::VisualizationRemoved { .. })));
    let ids: Vec<String> = session
        .simulation()
        .visualizations
        .into_iter()
        .map(|v| v.id)
        .collect();
    assert_eq!(ids, vec!["kpi-margin", "chart-breakdown", "kpi-profit"]);
    assert!(session.undo().unwrap().is_none());
}

#[test]
fn undo_depth_is_capped_at_ten() {
    let session = demo_session(None);
    for n in 0..11 {
        let scenario = session.save_scenario(&format!("s{n}"), None).unwrap();
        session.delete_scenario(&scenario.id).unwrap();
    }
    assert_eq!(session.undo_depth(), 10);

    match session.undo().unwrap() {
        Some(UndoEntry::ScenarioDeleted { scenario }) => assert_eq!(scenario.name, "s10"),
        other => panic!("unexpected entry: {other:?}"),
    }
    assert_eq!(session.scenarios().len(), 1);
    assert!(session.undo_notice().is_none());
}

#[test]
fn chat_actions_set_parameters_and_run() {
    let session = demo_session(None);
    let request = session.chat_request("make it pricier");
    assert_eq!(request.parameters["price"], json!(99));
    assert!(request.last_result.is_none());

    let set = ChatResponse::from_value(&json!({
        "message": "Setting the unit price to the maximum.",
        "action": {"type": "set_parameter", "parameter": "Unit price", "value": "900"}
    }));
    match session.apply_chat_response(&set).unwrap() {
        ChatOutcome::ParameterSet { parameter, value } => {
            assert_eq!(parameter, "price");
            assert_eq!(value, json!(500.0));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let run = ChatResponse::from_value(&json!({"action": {"type": "run_simulation"}}));
    assert!(matches!(
        session.apply_chat_response(&run).unwrap(),
        ChatOutcome::Executed(RunOutcome::Completed(_))
    ));
    assert_eq!(session.last_result().unwrap()["revenue"], json!(500000.0));

    let unknown = ChatResponse::from_value(&json!({
        "action": {"type": "set_parameter", "parameter": "nope", "value": 1}
    }));
    assert!(matches!(
        session.apply_chat_response(&unknown),
        Err(AppError::ParameterNotFound(_))
    ));
}

/// Service whose trigger blocks until released.
struct GatedService {
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl ExecutionService for GatedService {
    fn trigger(&self, _request: &ExecutionRequest) -> ExecResult<TriggerResponse> {
        self.entered.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        Ok(TriggerResponse::Immediate(json!({"done": true})))
    }

    fn status(&self, _execution_id: &str) -> ExecResult<StatusResponse> {
        unreachable!("gated service answers synchronously")
    }

    fn cancel(&self, _execution_id: &str) -> ExecResult<()> {
        Ok(())
    }
}

#[test]
fn concurrent_trigger_is_skipped_while_busy() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let service = Arc::new(GatedService {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let session = session_with(
        demo_simulation(),
        service,
        Arc::new(MemoryRepository::new()),
        &fast_config(),
    );

    let background = session.clone();
    let first = thread::spawn(move || background.execute());
    entered_rx.recv().unwrap();

    assert!(session.is_executing());
    assert!(matches!(session.execute().unwrap(), RunOutcome::Skipped));

    release_tx.send(()).unwrap();
    assert!(matches!(first.join().unwrap().unwrap(), RunOutcome::Completed(_)));
    assert!(!session.is_executing());
    assert_eq!(session.history().len(), 1);
}

#[test]
fn synchronous_answer_after_teardown_is_discarded() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let service = Arc::new(GatedService {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let session = session_with(
        demo_simulation(),
        service,
        Arc::new(MemoryRepository::new()),
        &fast_config(),
    );

    let background = session.clone();
    let first = thread::spawn(move || background.execute());
    entered_rx.recv().unwrap();

    session.teardown();
    release_tx.send(()).unwrap();

    assert!(matches!(first.join().unwrap(), Err(AppError::SessionClosed)));
    assert!(session.history().is_empty());
    assert!(session.last_result().is_none());
    assert!(!session.is_executing());
}

/// Demo service that reports each trigger and counts cancels.
struct ObservedDemo {
    inner: DemoExecutionService,
    triggered: Mutex<mpsc::Sender<()>>,
    cancels: Mutex<u32>,
}

impl ExecutionService for ObservedDemo {
    fn trigger(&self, request: &ExecutionRequest) -> ExecResult<TriggerResponse> {
        let response = self.inner.trigger(request);
        self.triggered.lock().unwrap().send(()).unwrap();
        response
    }

    fn status(&self, execution_id: &str) -> ExecResult<StatusResponse> {
        self.inner.status(execution_id)
    }

    fn cancel(&self, execution_id: &str) -> ExecResult<()> {
        *self.cancels.lock().unwrap() += 1;
        self.inner.cancel(execution_id)
    }
}

#[test]
fn teardown_cancels_the_in_flight_poll() {
    let simulation = demo_simulation();
    let (tx, rx) = mpsc::channel();
    let service = Arc::new(ObservedDemo {
        inner: DemoExecutionService::for_simulation(&simulation)
            .unwrap()
            .in_background(1000),
        triggered: Mutex::new(tx),
        cancels: Mutex::new(0),
    });

    let mut config = SimflowConfig::default();
    config.polling.interval_ms = 60_000;
    // Real sleeper: the wait must be interrupted, not skipped.
    let parts = SessionParts::new(service.clone(), Arc::new(MemoryRepository::new()));
    let session = SimulationSession::open(simulation, parts, &config);

    let background = session.clone();
    let handle = thread::spawn(move || background.execute());
    rx.recv().unwrap();

    session.teardown();
    let result = handle.join().unwrap();

    assert!(matches!(result, Err(AppError::ExecutionCancelled { .. })));
    assert_eq!(*service.cancels.lock().unwrap(), 1);
    assert!(session.last_result().is_none());
    assert!(matches!(session.execute(), Err(AppError::SessionClosed)));
}
