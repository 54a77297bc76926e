//! Strongly-shaped descriptors of a grading job, loaded from a YAML job
//! file with every schema default already applied. Nothing downstream of
//! this module ever touches configuration text again.

use crate::tester::compare::OutputKind;
use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Timestamp format used for homework deadlines.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The whole job file: where the checked code lives and what to grade.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JobDescriptor {
    /// Folder with the checked submissions, absolute or relative to the
    /// current directory.
    pub folder: String,
    pub homeworks: Vec<HomeworkDescriptor>,
}

impl JobDescriptor {
    pub fn from_file(path: &Path) -> anyhow::Result<JobDescriptor> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file {:?}", path))?;
        Self::from_yaml(&text).with_context(|| format!("Failed to parse job file {:?}", path))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<JobDescriptor> {
        Ok(serde_yaml::from_str(text)?)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct HomeworkDescriptor {
    pub name: String,
    pub folder: String,
    /// Submissions are still graded after this moment, but the result is
    /// marked as expired. Defaults to the end of year 9999.
    #[serde(
        default = "max_deadline",
        deserialize_with = "de::deadline",
        serialize_with = "de::serialize_deadline"
    )]
    pub submit_by: NaiveDateTime,
    pub tasks: Vec<TaskDescriptor>,
}

/// "Never expires", as a representable timestamp.
pub fn max_deadline() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .expect("valid date")
        .and_hms_opt(23, 59, 59)
        .expect("valid time")
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TaskDescriptor {
    pub name: String,
    pub language: Language,
    /// Task folder, relative to the homework folder.
    pub folder: String,
    #[serde(default)]
    pub output_type: OutputKind,
    #[serde(default = "default_compiler_flags")]
    pub compiler_flags: String,
    #[serde(default = "default_binary_name")]
    pub binary_name: String,
    /// Appended verbatim to every run command, e.g. `| sort`.
    #[serde(default)]
    pub pipe_through: String,
    #[serde(default)]
    pub build_type: BuildKind,
    /// Build budget in seconds.
    #[serde(default = "default_build_timeout")]
    pub build_timeout: f64,
    /// Folders overlaid onto the working copy for the duration of the build.
    #[serde(default)]
    pub inject_folders: Vec<InjectionSpec>,
    #[serde(default)]
    pub tests: Vec<TestDescriptor>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestDescriptor {
    pub name: String,
    /// Explicit command template. `$JOB_ROOT` expands to the folder of the
    /// job file. When absent the task's binary is run instead.
    #[serde(default)]
    pub cmd: Option<String>,
    /// Arguments passed to the task's binary.
    #[serde(default)]
    pub input_args: String,
    /// Test budget in seconds.
    #[serde(default = "default_test_timeout")]
    pub timeout: f64,
    #[serde(default, deserialize_with = "de::optional_scalar_string")]
    pub expected_output: Option<String>,
    /// Overrides the task-level output type for this test.
    #[serde(default)]
    pub output_type: Option<OutputKind>,
    /// Rebuild the whole project and run its own test runner instead of the
    /// task binary.
    #[serde(default)]
    pub run_google_tests: bool,
    /// Folders overlaid onto the working copy for this test only.
    #[serde(default)]
    pub inject_folders: Vec<InjectionSpec>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Cpp,
    Bash,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BuildKind {
    Cmake,
    Simple,
}

impl Default for BuildKind {
    fn default() -> Self {
        BuildKind::Cmake
    }
}

/// A folder overlay: `source` is resolved against the job-file folder,
/// `destination` against the working copy.
///
/// In YAML this is either a mapping with both paths or a bare string, in
/// which case the destination is the source's base name.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct InjectionSpec {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl InjectionSpec {
    fn from_source(source: PathBuf) -> Self {
        let destination = source
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| source.clone());
        InjectionSpec {
            source,
            destination,
        }
    }
}

fn default_compiler_flags() -> String {
    "-Wall".to_owned()
}

fn default_binary_name() -> String {
    "main".to_owned()
}

fn default_build_timeout() -> f64 {
    60.0
}

fn default_test_timeout() -> f64 {
    20.0
}

mod de {
    use super::{InjectionSpec, DATE_FORMAT};
    use chrono::NaiveDateTime;
    use serde::{
        de::{self, MapAccess, Visitor},
        Deserialize, Deserializer, Serializer,
    };
    use std::path::PathBuf;

    pub fn deadline<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&text, DATE_FORMAT).map_err(de::Error::custom)
    }

    pub fn serialize_deadline<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(DATE_FORMAT).to_string())
    }

    /// Expected outputs may be written as strings or as plain YAML numbers.
    pub fn optional_scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        match value {
            serde_yaml::Value::Null => Ok(None),
            serde_yaml::Value::String(s) => Ok(Some(s)),
            serde_yaml::Value::Number(n) => Ok(Some(n.to_string())),
            serde_yaml::Value::Bool(b) => Ok(Some(b.to_string())),
            other => Err(de::Error::custom(format!(
                "expected a scalar expected_output, got {:?}",
                other
            ))),
        }
    }

    #[derive(Deserialize)]
    #[serde(field_identifier, rename_all = "lowercase")]
    enum InjectionFields {
        Source,
        Destination,
    }

    struct InjectionSpecVisitor;

    impl<'de> Visitor<'de> for InjectionSpecVisitor {
        type Value = InjectionSpec;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(formatter, "string or injection mapping")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(InjectionSpec::from_source(PathBuf::from(v)))
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut source: Option<PathBuf> = None;
            let mut destination: Option<PathBuf> = None;
            while let Some(key) = map.next_key::<InjectionFields>()? {
                match key {
                    InjectionFields::Source => {
                        if source.is_some() {
                            return Err(de::Error::duplicate_field("source"));
                        }
                        source = Some(map.next_value()?);
                    }
                    InjectionFields::Destination => {
                        if destination.is_some() {
                            return Err(de::Error::duplicate_field("destination"));
                        }
                        destination = Some(map.next_value()?);
                    }
                }
            }
            let source = source.ok_or_else(|| de::Error::missing_field("source"))?;
            Ok(match destination {
                Some(destination) => InjectionSpec {
                    source,
                    destination,
                },
                None => InjectionSpec::from_source(source),
            })
        }
    }

    impl<'de> Deserialize<'de> for InjectionSpec {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_any(InjectionSpecVisitor)
        }
    }
}
