//! Configuration types deserialized from `kiln.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

/// Default inclusion pattern selecting every artifact.
pub const ALL: &str = "**";

/// Id of the container implied by `project.output` when none is declared.
pub const OUTPUT_CONTAINER: &str = "output";

/// The top-level build-path declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Project metadata.
    pub project: ProjectMeta,
    /// Containers in registration order.
    #[serde(default)]
    pub containers: Vec<ContainerConfig>,
    /// Build rules in registration order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    /// Extra suffix associations.
    #[serde(default)]
    pub content_types: Vec<ContentTypeConfig>,
    /// Global build settings.
    #[serde(default)]
    pub build: BuildConfig,
}

/// Core project metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// The project version string.
    #[serde(default)]
    pub version: String,
    /// Default output folder, relative to the project root.
    #[serde(default = "default_output")]
    pub output: String,
}

fn default_output() -> String {
    "bin".to_string()
}

/// What a container holds.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// User sources, rebuilt when they change.
    #[default]
    Source,
    /// Generated output, deleted by a clean.
    Binary,
    /// A library directory or archive that is never modified.
    External,
}

/// One container of the build path.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerConfig {
    /// Unique id rules refer to.
    pub id: String,
    /// What the container holds.
    #[serde(default)]
    pub kind: ContainerKind,
    /// Directory or archive, relative to the project root.
    pub path: String,
    /// Glob over artifact ids selecting the container's sources.
    #[serde(default = "default_includes")]
    pub includes: String,
    /// Content type of the container's sources, overriding `build.source_type`.
    #[serde(default)]
    pub content_type: Option<String>,
}

fn default_includes() -> String {
    ALL.to_string()
}

/// One transform from a source container into a target container.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    /// Transform to run; defaults to `build.default_builder`.
    #[serde(default)]
    pub builder: Option<String>,
    /// Id of the container read from.
    pub source: String,
    /// Id of the container written to; defaults to the output container.
    #[serde(default)]
    pub target: Option<String>,
    /// Glob over source ids this rule applies to.
    #[serde(default = "default_includes")]
    pub includes: String,
    /// Content type read; defaults to the source container's type.
    #[serde(default)]
    pub from: Option<String>,
    /// Content type written; defaults to `intermediate`.
    #[serde(default)]
    pub to: Option<String>,
    /// Per-rule override of `build.verification`.
    #[serde(default)]
    pub verify: Option<bool>,
    /// Per-rule override of `build.emit_intermediates`.
    #[serde(default)]
    pub emit_intermediates: Option<bool>,
    /// Program and arguments for the `command` builder.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub command: Vec<String>,
}

/// Deserializes a field that can be either a single string or a list of strings.
///
/// A single string is split on whitespace, so `command = "cc -c {input}"`
/// and `command = ["cc", "-c", "{input}"]` are equivalent.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.split_whitespace().map(str::to_string).collect())
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

/// An extra suffix association.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ContentTypeConfig {
    /// Suffix without the leading dot.
    pub suffix: String,
    /// Content type assigned to matching artifacts.
    pub content_type: String,
    /// Leading bytes required for the association to apply.
    #[serde(default)]
    pub magic: Option<String>,
}

/// What a build does with structured transform failures.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Record a marker and finish the build.
    #[default]
    Report,
    /// Record a marker and fail the build.
    Fail,
}

/// Global build settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BuildConfig {
    /// Whether transforms verify what they compile.
    #[serde(default = "default_true")]
    pub verification: bool,
    /// Whether transforms keep intermediate files.
    #[serde(default)]
    pub emit_intermediates: bool,
    /// Content type of sources when a container does not say.
    #[serde(default = "default_source_type")]
    pub source_type: String,
    /// Builder used by rules that do not name one.
    #[serde(default = "default_builder")]
    pub default_builder: String,
    /// Failure policy.
    #[serde(default)]
    pub on_error: OnError,
}

fn default_true() -> bool {
    true
}

fn default_source_type() -> String {
    "source".to_string()
}

fn default_builder() -> String {
    "copy".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            verification: true,
            emit_intermediates: false,
            source_type: default_source_type(),
            default_builder: default_builder(),
            on_error: OnError::default(),
        }
    }
}
