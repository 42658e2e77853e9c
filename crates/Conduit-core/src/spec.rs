//! # Component Spec Model
//!
//! The declarative description of a pipeline. A [`ComponentSpec`] is either a
//! leaf (container) or a graph of [`TaskSpec`]s, each of which references
//! another component.
//!
//! Field names on the wire are camelCase (`implementation.graph.tasks`,
//! `outputValues`, `componentRef`, ...) so that stored pipelines and component
//! definitions stay interchangeable with other editors.
//!
//! Specs are treated as immutable values: every rewrite in [`crate::rewrite`]
//! returns a fresh copy.

use crate::error::SpecResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form string annotations (`metadata.annotations`, task annotations, ...).
pub type Annotations = BTreeMap<String, String>;

/// A type descriptor: either a plain type name (`String`, `Integer`, ...) or a
/// structured descriptor such as `{JsonObject: {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSpec {
    Named(String),
    Structured(serde_yaml::Mapping),
}

impl From<&str> for TypeSpec {
    fn from(name: &str) -> Self {
        TypeSpec::Named(name.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSpec {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_spec: Option<TypeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl InputSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// An input must be bound when it is neither optional nor defaulted.
    pub fn is_required(&self) -> bool {
        !self.optional.unwrap_or(false) && self.default.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_spec: Option<TypeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl OutputSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// `{taskOutput: {taskId, outputName}}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutputArgument {
    pub task_id: String,
    pub output_name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_spec: Option<TypeSpec>,
}

/// `{graphInput: {inputName}}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphInputArgument {
    pub input_name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_spec: Option<TypeSpec>,
}

/// The value bound to one task input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged, from = "RawArgument")]
pub enum ArgumentType {
    Literal(String),
    TaskOutput {
        #[serde(rename = "taskOutput")]
        task_output: TaskOutputArgument,
    },
    GraphInput {
        #[serde(rename = "graphInput")]
        graph_input: GraphInputArgument,
    },
}

impl ArgumentType {
    pub fn literal(value: impl Into<String>) -> Self {
        ArgumentType::Literal(value.into())
    }

    pub fn task_output(task_id: impl Into<String>, output_name: impl Into<String>) -> Self {
        ArgumentType::TaskOutput {
            task_output: TaskOutputArgument {
                task_id: task_id.into(),
                output_name: output_name.into(),
                type_spec: None,
            },
        }
    }

    pub fn graph_input(input_name: impl Into<String>) -> Self {
        ArgumentType::GraphInput {
            graph_input: GraphInputArgument {
                input_name: input_name.into(),
                type_spec: None,
            },
        }
    }

    /// The reference part of the argument, if it is not a literal.
    pub fn source(&self) -> Option<ArgumentSource> {
        match self {
            ArgumentType::Literal(_) => None,
            ArgumentType::TaskOutput { task_output } => Some(ArgumentSource::TaskOutput {
                task_output: task_output.clone(),
            }),
            ArgumentType::GraphInput { graph_input } => Some(ArgumentSource::GraphInput {
                graph_input: graph_input.clone(),
            }),
        }
    }
}

impl From<ArgumentSource> for ArgumentType {
    fn from(source: ArgumentSource) -> Self {
        match source {
            ArgumentSource::TaskOutput { task_output } => ArgumentType::TaskOutput { task_output },
            ArgumentSource::GraphInput { graph_input } => ArgumentType::GraphInput { graph_input },
        }
    }
}

/// Wire shape accepted when reading arguments. Scalars other than strings
/// (YAML numbers and booleans) are read as their textual form.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawArgument {
    Text(String),
    Number(serde_yaml::Number),
    Bool(bool),
    TaskOutput {
        #[serde(rename = "taskOutput")]
        task_output: TaskOutputArgument,
    },
    GraphInput {
        #[serde(rename = "graphInput")]
        graph_input: GraphInputArgument,
    },
}

impl From<RawArgument> for ArgumentType {
    fn from(raw: RawArgument) -> Self {
        match raw {
            RawArgument::Text(s) => ArgumentType::Literal(s),
            RawArgument::Number(n) => ArgumentType::Literal(n.to_string()),
            RawArgument::Bool(b) => ArgumentType::Literal(b.to_string()),
            RawArgument::TaskOutput { task_output } => ArgumentType::TaskOutput { task_output },
            RawArgument::GraphInput { graph_input } => ArgumentType::GraphInput { graph_input },
        }
    }
}

/// What a graph output (or a non-literal argument) is wired to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentSource {
    TaskOutput {
        #[serde(rename = "taskOutput")]
        task_output: TaskOutputArgument,
    },
    GraphInput {
        #[serde(rename = "graphInput")]
        graph_input: GraphInputArgument,
    },
}

impl ArgumentSource {
    pub fn task_output(task_id: impl Into<String>, output_name: impl Into<String>) -> Self {
        ArgumentSource::TaskOutput {
            task_output: TaskOutputArgument {
                task_id: task_id.into(),
                output_name: output_name.into(),
                type_spec: None,
            },
        }
    }

    pub fn graph_input(input_name: impl Into<String>) -> Self {
        ArgumentSource::GraphInput {
            graph_input: GraphInputArgument {
                input_name: input_name.into(),
                type_spec: None,
            },
        }
    }
}

/// A reference to another component, optionally carrying the resolved spec.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Raw serialized component text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Resolved spec; populated by hydration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Box<ComponentSpec>>,
}

impl ComponentReference {
    pub fn from_spec(spec: ComponentSpec) -> Self {
        Self {
            name: spec.name.clone(),
            spec: Some(Box::new(spec)),
            ..Default::default()
        }
    }

    pub fn is_hydrated(&self) -> bool {
        self.spec.is_some()
    }

    /// The reference without its embedded spec and text.
    pub fn stripped(&self) -> Self {
        Self {
            name: self.name.clone(),
            url: self.url.clone(),
            digest: self.digest.clone(),
            text: None,
            spec: None,
        }
    }

    /// Cache key for resolution: digest when valid, else url.
    pub fn cache_key(&self) -> Option<String> {
        if has_valid_digest(self) {
            self.digest.clone()
        } else {
            self.url.clone()
        }
    }

    /// Human readable label for logs and errors.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.url.clone())
            .or_else(|| self.digest.clone())
            .unwrap_or_else(|| "<inline>".to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachingStrategySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cache_staleness: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStrategySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOptionsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_strategy: Option<RetryStrategySpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caching_strategy: Option<CachingStrategySpec>,
}

/// One node of a graph implementation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub component_ref: ComponentReference,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, ArgumentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_options: Option<ExecutionOptionsSpec>,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl TaskSpec {
    pub fn new(component_ref: ComponentReference) -> Self {
        Self {
            component_ref,
            ..Default::default()
        }
    }

    /// The resolved component spec, if hydrated.
    pub fn component_spec(&self) -> Option<&ComponentSpec> {
        self.component_ref.spec.as_deref()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSpec {
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output_values: BTreeMap<String, ArgumentSource>,
}

/// A command-line fragment of a container implementation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandlineArgument {
    Literal(String),
    InputValue {
        #[serde(rename = "inputValue")]
        input_value: String,
    },
    InputPath {
        #[serde(rename = "inputPath")]
        input_path: String,
    },
    OutputPath {
        #[serde(rename = "outputPath")]
        output_path: String,
    },
    IsPresent {
        #[serde(rename = "isPresent")]
        is_present: String,
    },
    Concat {
        concat: Vec<CommandlineArgument>,
    },
    If {
        #[serde(rename = "if")]
        if_placeholder: Box<IfPlaceholder>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IfPlaceholder {
    pub cond: CommandlineArgument,
    #[serde(default)]
    pub then: Vec<CommandlineArgument>,
    #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<Vec<CommandlineArgument>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<CommandlineArgument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<CommandlineArgument>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// `implementation: {container: ...}` or `implementation: {graph: ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImplementationType {
    Container(ContainerSpec),
    Graph(GraphSpec),
}

impl Default for ImplementationType {
    fn default() -> Self {
        ImplementationType::Graph(GraphSpec::default())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataSpec {
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputSpec>,
    /// Written as a single-key map (`graph:` / `container:`), not a YAML tag.
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub implementation: ImplementationType,
}

impl ComponentSpec {
    pub fn from_yaml(text: &str) -> SpecResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml(&self) -> SpecResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn graph(&self) -> Option<&GraphSpec> {
        match &self.implementation {
            ImplementationType::Graph(graph) => Some(graph),
            ImplementationType::Container(_) => None,
        }
    }

    pub fn graph_mut(&mut self) -> Option<&mut GraphSpec> {
        match &mut self.implementation {
            ImplementationType::Graph(graph) => Some(graph),
            ImplementationType::Container(_) => None,
        }
    }

    pub fn input(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&OutputSpec> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn annotations(&self) -> Option<&Annotations> {
        self.metadata.as_ref().map(|m| &m.annotations)
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.metadata.get_or_insert_with(MetadataSpec::default).annotations
    }

    /// Label used in logs and errors.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// Discriminates the implementation union.
pub fn is_graph_implementation(implementation: &ImplementationType) -> bool {
    matches!(implementation, ImplementationType::Graph(_))
}

/// A digest is valid when it is a 64 character hex string.
pub fn has_valid_digest(reference: &ComponentReference) -> bool {
    reference
        .digest
        .as_deref()
        .is_some_and(|d| d.len() == 64 && d.chars().all(|c| c.is_ascii_hexdigit()))
}

/// A reference can be fetched or compared when it has a valid digest or an
/// absolute URL.
pub fn is_discoverable_component_reference(reference: &ComponentReference) -> bool {
    has_valid_digest(reference)
        || reference
            .url
            .as_deref()
            .is_some_and(|u| url::Url::parse(u).is_ok())
}

mod scalar {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(serde_yaml::Number),
        Bool(bool),
    }

    /// Reads an optional YAML scalar as text.
    pub fn optional<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Scalar>::deserialize(deserializer)?.map(|s| match s {
            Scalar::Text(t) => t,
            Scalar::Number(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }))
    }
}
