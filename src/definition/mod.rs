//! Definition document loading and schema validation.
//!
//! A definition document is the YAML file describing a shell or script unit.
//! Only a handful of fields matter to this crate; everything else in the
//! document (TOSCA imports, properties, capabilities) is ignored. Required
//! fields are checked as soon as the document is loaded so a missing name or
//! malformed class surfaces as [`TrafficError::Configuration`] before any file
//! is touched.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::context::{WorkingContext, definition_stem};
use crate::error::TrafficError;
use crate::files;

/// Which flow a definition document is loaded for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DefinitionKind {
    /// Shell packaging flow (`pack`, `generate`, `install`).
    Shell,
    /// Script upload flow (`script`).
    Script,
}

impl DefinitionKind {
    const fn name_field(self) -> &'static str {
        match self {
            Self::Shell => "metadata.template_name",
            Self::Script => "metadata.script_name",
        }
    }
}

/// File selection rules from the `files` section.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct FileRules {
    /// Base names to leave out of the archive.
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    /// Source file promoted to the script entry point.
    #[serde(default)]
    pub main: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawTraffic {
    #[serde(default)]
    main_class: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    template_name: Option<String>,
    #[serde(default)]
    script_name: Option<String>,
    #[serde(default)]
    main_class: Option<String>,
    #[serde(default)]
    traffic: Option<RawTraffic>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawArtifact {
    #[serde(default)]
    file: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawArtifacts {
    #[serde(default)]
    driver: Option<RawArtifact>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawNodeType {
    #[serde(default)]
    artifacts: Option<RawArtifacts>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawDocument {
    #[serde(default)]
    metadata: Option<RawMetadata>,
    #[serde(default)]
    files: Option<FileRules>,
    #[serde(default)]
    node_types: Option<serde_yaml::Mapping>,
}

/// A driver's dotted main class, for example `pkg.DriverClass.v1`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MainClass {
    value: String,
    name: String,
}

impl MainClass {
    /// Returns the full dotted value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns the driver name: the second dot-separated segment.
    #[must_use]
    pub fn driver_name(&self) -> &str {
        &self.name
    }
}

impl FromStr for MainClass {
    type Err = TrafficError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let mut segments = trimmed.split('.');
        let package = segments.next().unwrap_or_default();
        let name = segments.next().unwrap_or_default();
        if package.is_empty() || name.is_empty() {
            return Err(TrafficError::configuration(format!(
                "metadata.main_class '{value}' must have the form package.Class"
            )));
        }
        Ok(Self {
            value: trimmed.to_owned(),
            name: name.to_owned(),
        })
    }
}

impl fmt::Display for MainClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// A parsed definition document.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DefinitionDocument {
    name: String,
    template_name: Option<String>,
    script_name: Option<String>,
    main_class: Option<String>,
    files: Option<FileRules>,
    driver_artifact: Option<String>,
}

impl DefinitionDocument {
    /// Parses `contents` as the definition document named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::Configuration`] when the YAML is malformed or
    /// the `metadata` section is missing.
    pub fn parse(name: &str, contents: &str) -> Result<Self, TrafficError> {
        let raw: RawDocument = serde_yaml::from_str(contents).map_err(|err| {
            TrafficError::configuration(format!("{name}.yaml is not a valid definition: {err}"))
        })?;
        let metadata = raw.metadata.ok_or_else(|| {
            TrafficError::configuration(format!("{name}.yaml has no metadata section"))
        })?;
        let main_class = metadata
            .main_class
            .or_else(|| metadata.traffic.and_then(|traffic| traffic.main_class));
        Ok(Self {
            name: definition_stem(name).to_owned(),
            template_name: non_blank(metadata.template_name),
            script_name: non_blank(metadata.script_name),
            main_class: non_blank(main_class),
            files: raw.files,
            driver_artifact: raw.node_types.as_ref().and_then(first_driver_artifact),
        })
    }

    /// Loads the definition document named `name` from the context's base
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::NotFound`] when the file is missing and
    /// [`TrafficError::Configuration`] when it cannot be parsed.
    pub fn load(ctx: &WorkingContext, name: &str) -> Result<Self, TrafficError> {
        let path = ctx.definition_path(name);
        let contents = files::read_to_string(&path)?;
        Self::parse(name, &contents)
    }

    /// Loads and validates the document for the requested flow.
    ///
    /// # Errors
    ///
    /// Returns any error from [`DefinitionDocument::load`] or
    /// [`DefinitionDocument::validate`].
    pub fn load_for(
        ctx: &WorkingContext,
        name: &str,
        kind: DefinitionKind,
    ) -> Result<Self, TrafficError> {
        let document = Self::load(ctx, name)?;
        document.validate(kind)?;
        Ok(document)
    }

    /// Checks the fields the flow depends on.
    ///
    /// Shell documents need `template_name` and a well-formed `main_class`;
    /// script documents need `script_name`.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::Configuration`] naming the first missing or
    /// malformed field.
    pub fn validate(&self, kind: DefinitionKind) -> Result<(), TrafficError> {
        self.archive_name(kind)?;
        if kind == DefinitionKind::Shell {
            self.main_class()?;
        }
        Ok(())
    }

    /// Returns the definition name (file stem).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `metadata.template_name`, if present.
    #[must_use]
    pub fn template_name(&self) -> Option<&str> {
        self.template_name.as_deref()
    }

    /// Returns `metadata.script_name`, if present.
    #[must_use]
    pub fn script_name(&self) -> Option<&str> {
        self.script_name.as_deref()
    }

    /// Returns the name the flow's archive is written under.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::Configuration`] when the flow's name field is
    /// absent.
    pub fn archive_name(&self, kind: DefinitionKind) -> Result<&str, TrafficError> {
        let value = match kind {
            DefinitionKind::Shell => self.template_name(),
            DefinitionKind::Script => self.script_name(),
        };
        value.ok_or_else(|| {
            TrafficError::configuration(format!(
                "{}.yaml is missing {}",
                self.name,
                kind.name_field()
            ))
        })
    }

    /// Returns the parsed main class.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::Configuration`] when `metadata.main_class` is
    /// absent or has fewer than two dot-separated segments.
    pub fn main_class(&self) -> Result<MainClass, TrafficError> {
        self.main_class
            .as_deref()
            .ok_or_else(|| {
                TrafficError::configuration(format!(
                    "{}.yaml is missing metadata.main_class",
                    self.name
                ))
            })?
            .parse()
    }

    /// Returns the base names excluded from the archive.
    #[must_use]
    pub fn excluded_files(&self) -> &[String] {
        self.files
            .as_ref()
            .and_then(|rules| rules.exclude.as_deref())
            .unwrap_or_default()
    }

    /// Returns `files.main`, if present.
    #[must_use]
    pub fn main_file(&self) -> Option<&str> {
        self.files.as_ref().and_then(|rules| rules.main.as_deref())
    }

    /// Returns the driver archive path declared by the first node type that
    /// has one.
    #[must_use]
    pub fn driver_artifact(&self) -> Option<&str> {
        self.driver_artifact.as_deref()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn first_driver_artifact(node_types: &serde_yaml::Mapping) -> Option<String> {
    node_types.values().find_map(|value| {
        serde_yaml::from_value::<RawNodeType>(value.clone())
            .ok()?
            .artifacts?
            .driver?
            .file
    })
}
