use serde_json::json;
use sf_core::ParameterValues;
use sf_project::schema::*;
use sf_project::{demo_simulation, from_yaml_str, load_json, load_yaml, save_json, save_yaml};

#[test]
fn roundtrip_yaml_demo_simulation() {
    let mut simulation = demo_simulation();
    let mut values = ParameterValues::new();
    values.insert("price".to_string(), json!(120));
    simulation.scenarios.push(ScenarioDef {
        id: "sc1".to_string(),
        name: "High price".to_string(),
        description: Some("what if".to_string()),
        parameter_values: values,
        created_at: "2026-02-26T00:00:00Z".to_string(),
    });

    let path = std::env::temp_dir().join("sf_project_roundtrip_demo.yaml");
    save_yaml(&path, &simulation).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(simulation, loaded);
}

#[test]
fn roundtrip_json_demo_simulation() {
    let simulation = demo_simulation();

    let path = std::env::temp_dir().join("sf_project_roundtrip_demo.json");
    save_json(&path, &simulation).unwrap();
    let loaded = load_json(&path).unwrap();

    assert_eq!(simulation, loaded);
}

#[test]
fn yaml_uses_camel_case_wire_names() {
    let text = r#"
version: 1
id: pricing
name: Pricing
workflowId: wf-42
parameters:
  - id: price
    boundNodeId: node-7
    control:
      type: slider
      min: 0
      max: 100
    defaultValue: 50
  - id: premium
    boundNodeId: node-8
    control:
      type: toggle
    defaultValue: false
visualizations:
  - id: v1
    title: Revenue
    kind: line_chart
    fields: [revenue]
"#;

    let simulation = from_yaml_str(text).unwrap();
    assert_eq!(simulation.version, sf_project::LATEST_VERSION);
    assert_eq!(simulation.workflow_id, "wf-42");
    assert_eq!(simulation.parameters[0].bound_node_id, "node-7");
    assert_eq!(simulation.parameters[0].variable_name, "price");
    assert_eq!(simulation.parameters[1].order, 1);
    assert_eq!(
        simulation.parameters[0].control,
        ControlKind::Slider {
            min: 0.0,
            max: 100.0,
            step: 1.0
        }
    );
    assert_eq!(simulation.visualizations[0].kind, VisualizationKind::LineChart);
}

#[test]
fn invalid_document_is_rejected_on_load() {
    let text = r#"
version: 2
id: broken
name: Broken
workflowId: wf
parameters:
  - id: price
    boundNodeId: n1
    control:
      type: number
    defaultValue: "cheap"
"#;
    assert!(from_yaml_str(text).is_err());
}
