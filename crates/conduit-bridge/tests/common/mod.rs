#![allow(dead_code)]

use conduit_core::spec::ComponentSpec;

pub const PREPROCESS: &str = r#"
name: Preprocess
inputs:
  - name: data
  - name: verbose
    optional: true
outputs:
  - name: clean
implementation:
  container:
    image: python:3.12
    command: [python, -m, preprocess]
    args:
      - --data
      - {inputPath: data}
      - {concat: [--out=, {outputPath: clean}]}
      - if:
          cond: {isPresent: verbose}
          then: [--verbose, {inputValue: verbose}]
"#;

pub const TRAIN: &str = r#"
name: Train
inputs:
  - name: data
  - name: epochs
  - name: seed
    default: 0
outputs:
  - name: model
  - name: metrics
implementation:
  container:
    image: python:3.12
    args: [{inputPath: data}, {inputValue: epochs}, {outputPath: model}]
"#;

/// A two step pipeline with both tasks hydrated.
pub const PIPELINE: &str = r#"
name: Training pipeline
inputs:
  - name: dataset
  - name: epochs
    default: 10
outputs:
  - name: model
implementation:
  graph:
    tasks:
      Preprocess:
        componentRef:
          name: Preprocess
          url: https://components.test/preprocess.yaml
        arguments:
          data: {graphInput: {inputName: dataset}}
      Train:
        componentRef:
          name: Train
          url: https://components.test/train.yaml
        arguments:
          data: {taskOutput: {taskId: Preprocess, outputName: clean, type: Dataset}}
          epochs: {graphInput: {inputName: epochs}}
          seed: 42
        annotations:
          editor.position: '{"x": 100, "y": 50}'
    outputValues:
      model: {taskOutput: {taskId: Train, outputName: model}}
"#;

pub fn component(text: &str) -> ComponentSpec {
    ComponentSpec::from_yaml(text).expect("fixture parses")
}

/// [`PIPELINE`] with every task reference carrying its spec.
pub fn pipeline() -> ComponentSpec {
    let mut spec = component(PIPELINE);
    let graph = spec.graph_mut().expect("graph");
    graph.tasks.get_mut("Preprocess").unwrap().component_ref.spec = Some(Box::new(component(PREPROCESS)));
    graph.tasks.get_mut("Train").unwrap().component_ref.spec = Some(Box::new(component(TRAIN)));
    spec
}

/// A root graph with a single task `Outer` whose component is [`pipeline`].
pub fn nested() -> ComponentSpec {
    let mut root = ComponentSpec {
        name: Some("Root".to_string()),
        ..Default::default()
    };
    let reference = conduit_core::ComponentReference::from_spec(pipeline());
    root.graph_mut()
        .expect("graph")
        .tasks
        .insert("Outer".to_string(), conduit_core::TaskSpec::new(reference));
    root
}

/// Installs a test-friendly tracing subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
