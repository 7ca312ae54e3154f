//! Openverse API client model generation.
//!
//! Fetches the Openverse API schema document, maps the named component
//! schemas into [`schema::Model`] values and renders them as Python and
//! TypeScript model files.
//!
//! # Modules
//!
//! - [`schema`]: component schema to [`schema::SchemaType`] / [`schema::Model`] mapping
//! - [`registry`]: per-session model registry used for by-name references
//! - [`python`]: Python type strings and `models.py` rendering
//! - [`typescript`]: TypeScript type strings and `models.ts` rendering
//! - [`generator`]: schema fetch, generation session and output files

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub mod generator;
pub mod python;
pub mod registry;
pub mod schema;
pub mod typescript;
mod view;

pub use generator::{
    generate, GenerationReport, GenerationSession, GeneratorConfig, SchemaDocument,
    DEFAULT_API_URL, DEFAULT_MODELS,
};
pub use registry::ModelRegistry;
pub use schema::{model_from_schema, resolve_type, Model, Property, SchemaType};

/// Target language for generated model files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetLanguage {
    Python,
    TypeScript,
}

impl TargetLanguage {
    pub const ALL: [TargetLanguage; 2] = [TargetLanguage::Python, TargetLanguage::TypeScript];

    /// File extension of the generated models file.
    pub fn extension(&self) -> &'static str {
        match self {
            TargetLanguage::Python => "py",
            TargetLanguage::TypeScript => "ts",
        }
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetLanguage::Python => write!(f, "python"),
            TargetLanguage::TypeScript => write!(f, "typescript"),
        }
    }
}

impl FromStr for TargetLanguage {
    type Err = CodegenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(TargetLanguage::Python),
            "typescript" | "ts" => Ok(TargetLanguage::TypeScript),
            other => Err(CodegenError::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Errors raised while mapping, rendering or writing models.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error("cannot resolve type of schema fragment: {fragment}")]
    CannotResolveType { fragment: String },

    #[error("cannot cast {value} to a {language} type")]
    CannotCast {
        value: String,
        language: TargetLanguage,
    },

    #[error("schema for model '{model}' must be a mapping")]
    NotAnObject { model: String },

    #[error("schema for model '{model}' has no properties")]
    MissingProperties { model: String },

    #[error("component schema '{0}' not found in schema document")]
    MissingComponent(String),

    #[error("schema document has no components.schemas mapping")]
    MissingComponents,

    #[error("unsupported language '{0}'. Supported: python, typescript")]
    UnsupportedLanguage(String),

    #[error("invalid API base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("schema fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("schema document is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("template render failed: {0}")]
    Render(#[from] askama::Error),

    #[error("failed to write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl CodegenError {
    /// Unresolvable schema fragment; the fragment is embedded as compact JSON.
    pub fn cannot_resolve(fragment: &serde_json::Value) -> Self {
        Self::CannotResolveType {
            fragment: fragment.to_string(),
        }
    }

    /// Resolved type with no spelling in `language`.
    pub fn cannot_cast(value: impl fmt::Display, language: TargetLanguage) -> Self {
        Self::CannotCast {
            value: value.to_string(),
            language,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
