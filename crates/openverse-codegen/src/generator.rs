//! Schema fetch and model file generation.
//!
//! One run fetches `<api-url>/v1/schema/` once, maps the requested
//! component schemas in caller order, and renders one models file per
//! target language into the output directory, replacing existing files.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::registry::ModelRegistry;
use crate::schema::{model_from_schema, Model};
use crate::{python, typescript, CodegenError, TargetLanguage};

/// Production Openverse API.
pub const DEFAULT_API_URL: &str = "https://api.openverse.org";

/// Components rendered by default, in rendering order.
pub const DEFAULT_MODELS: [&str; 6] = [
    "Provider",
    "Tag",
    "AudioAltFile",
    "AudioSet",
    "Audio",
    "Image",
];

/// File name of the raw schema copy written next to the models.
pub const SCHEMA_FILE_NAME: &str = "schema.yaml";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Strip trailing slashes and check that the remainder is an absolute URL.
pub fn normalize_base_url(url: &str) -> Result<String, CodegenError> {
    let trimmed = url.trim_end_matches('/');
    url::Url::parse(trimmed).map_err(|source| CodegenError::InvalidBaseUrl {
        url: url.to_string(),
        source,
    })?;
    Ok(trimmed.to_string())
}

/// Schema endpoint for an API base URL.
pub fn schema_url(base_url: &str) -> Result<String, CodegenError> {
    Ok(format!("{}/v1/schema/", normalize_base_url(base_url)?))
}

/// Fetch the raw schema document. Failures are returned as-is; no retry.
pub async fn fetch_schema(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<Vec<u8>, CodegenError> {
    let url = schema_url(base_url)?;
    tracing::info!(%url, "Fetching API schema");

    let response = client.get(&url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;

    tracing::debug!(bytes = bytes.len(), "Fetched API schema");
    Ok(bytes.to_vec())
}

/// Parsed schema document, keeping the raw bytes for the on-disk copy.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    raw: Vec<u8>,
    components: Map<String, Value>,
}

impl SchemaDocument {
    /// Parse a YAML schema document and extract `components.schemas`.
    pub fn from_yaml(bytes: &[u8]) -> Result<Self, CodegenError> {
        let document: serde_yaml::Value = serde_yaml::from_slice(bytes)?;
        let schemas = document
            .get("components")
            .and_then(|components| components.get("schemas"))
            .filter(|schemas| schemas.is_mapping())
            .ok_or(CodegenError::MissingComponents)?;

        let components = match serde_json::to_value(schemas) {
            Ok(Value::Object(map)) => map,
            _ => return Err(CodegenError::MissingComponents),
        };

        Ok(Self {
            raw: bytes.to_vec(),
            components,
        })
    }

    /// Raw schema fragment for a component.
    pub fn component(&self, name: &str) -> Option<&Value> {
        self.components.get(name)
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

/// Models and registry for one generator invocation.
#[derive(Debug, Default)]
pub struct GenerationSession {
    registry: ModelRegistry,
    models: Vec<Model>,
}

impl GenerationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build models for `names` in order. A name listed twice keeps its first
    /// position and the later model.
    pub fn build_models<S: AsRef<str>>(
        &mut self,
        document: &SchemaDocument,
        names: &[S],
    ) -> Result<&[Model], CodegenError> {
        for name in names {
            let name = name.as_ref();
            let schema = document
                .component(name)
                .ok_or_else(|| CodegenError::MissingComponent(name.to_string()))?;

            let model = model_from_schema(name, schema, &mut self.registry)?;
            tracing::debug!(model = %model.name, properties = model.properties.len(), "Built model");

            match self.models.iter_mut().find(|m| m.name == model.name) {
                Some(existing) => *existing = model,
                None => self.models.push(model),
            }
        }
        Ok(&self.models)
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// Render the models file contents for `language`.
    pub fn render(&self, language: TargetLanguage) -> Result<String, CodegenError> {
        match language {
            TargetLanguage::Python => python::render(&self.models, &self.registry),
            TargetLanguage::TypeScript => typescript::render(&self.models, &self.registry),
        }
    }

    /// Render and write `models.<ext>` for each language into `output_dir`.
    pub fn write_models(
        &self,
        output_dir: &Path,
        languages: &[TargetLanguage],
    ) -> Result<Vec<PathBuf>, CodegenError> {
        create_output_dir(output_dir)?;
        languages
            .iter()
            .map(|language| {
                let path = output_dir.join(format!("models.{}", language.extension()));
                write_file(&path, self.render(*language)?.as_bytes())?;
                tracing::info!(%language, path = %path.display(), "Wrote models");
                Ok(path)
            })
            .collect()
    }
}

/// Settings for one generator run.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_url: String,
    pub output_dir: PathBuf,
    pub models: Vec<String>,
    pub languages: Vec<TargetLanguage>,
    /// Also write the fetched document as `schema.yaml` in the output directory
    pub write_schema: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            output_dir: PathBuf::from("out"),
            models: DEFAULT_MODELS.iter().map(ToString::to_string).collect(),
            languages: TargetLanguage::ALL.to_vec(),
            write_schema: true,
        }
    }
}

/// Files produced by [`generate`].
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub schema_path: Option<PathBuf>,
    pub model_files: Vec<PathBuf>,
    pub model_count: usize,
}

/// Fetch the schema and write all model files.
pub async fn generate(config: &GeneratorConfig) -> Result<GenerationReport, CodegenError> {
    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    let raw = fetch_schema(&client, &config.api_url).await?;
    let document = SchemaDocument::from_yaml(&raw)?;

    let schema_path = if config.write_schema {
        create_output_dir(&config.output_dir)?;
        let path = config.output_dir.join(SCHEMA_FILE_NAME);
        write_file(&path, document.raw())?;
        Some(path)
    } else {
        None
    };

    let mut session = GenerationSession::new();
    let model_count = session.build_models(&document, &config.models)?.len();
    let model_files = session.write_models(&config.output_dir, &config.languages)?;

    Ok(GenerationReport {
        schema_path,
        model_files,
        model_count,
    })
}

fn create_output_dir(dir: &Path) -> Result<(), CodegenError> {
    std::fs::create_dir_all(dir).map_err(|e| CodegenError::io(dir, e))
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), CodegenError> {
    std::fs::write(path, contents).map_err(|e| CodegenError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAG_SCHEMA: &str = r#"
openapi: 3.0.3
info:
  title: Openverse API
  version: 2024.06.03
paths: {}
components:
  schemas:
    Tag:
      type: object
      description: A tag attached to a media item.
      properties:
        provider:
          type: string
          nullable: true
          description: The source of the tag.
        name:
          type: string
          description: The name of a detailed tag.
      required:
      - name
"#;

    const FORWARD_REF_SCHEMA: &str = r#"
components:
  schemas:
    Audio:
      type: object
      properties:
        id:
          type: string
        audio_set:
          allOf:
          - $ref: '#/components/schemas/AudioSet'
          nullable: true
        tags:
          type: array
          items:
            $ref: '#/components/schemas/Tag'
          nullable: true
      required:
      - id
    AudioSet:
      type: object
      properties:
        title:
          type: string
          nullable: true
    Tag:
      type: object
      properties:
        name:
          type: string
      required:
      - name
"#;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://api.openverse.org/").unwrap(),
            "https://api.openverse.org"
        );
        assert_eq!(
            normalize_base_url("http://localhost:50280").unwrap(),
            "http://localhost:50280"
        );
        assert!(matches!(
            normalize_base_url("not a url"),
            Err(CodegenError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_schema_url() {
        assert_eq!(
            schema_url("https://api.openverse.org/").unwrap(),
            "https://api.openverse.org/v1/schema/"
        );
        assert_eq!(
            schema_url("http://localhost:50280").unwrap(),
            "http://localhost:50280/v1/schema/"
        );
    }

    #[test]
    fn test_schema_document_components() {
        let document = SchemaDocument::from_yaml(TAG_SCHEMA.as_bytes()).unwrap();
        assert_eq!(document.component_names().collect::<Vec<_>>(), vec!["Tag"]);
        assert!(document.component("Tag").is_some());
        assert_eq!(document.raw(), TAG_SCHEMA.as_bytes());
    }

    #[test]
    fn test_schema_document_without_components() {
        let err = SchemaDocument::from_yaml(b"openapi: 3.0.3\npaths: {}\n").unwrap_err();
        assert!(matches!(err, CodegenError::MissingComponents));
    }

    #[test]
    fn test_schema_document_invalid_yaml() {
        let err = SchemaDocument::from_yaml(b"components: [unclosed").unwrap_err();
        assert!(matches!(err, CodegenError::Yaml(_)));
    }

    #[test]
    fn test_missing_component() {
        let document = SchemaDocument::from_yaml(TAG_SCHEMA.as_bytes()).unwrap();
        let mut session = GenerationSession::new();
        let err = session.build_models(&document, &["Image"]).unwrap_err();
        assert!(matches!(err, CodegenError::MissingComponent(ref name) if name == "Image"));
    }

    #[test]
    fn test_forward_references_resolve_at_render() {
        let document = SchemaDocument::from_yaml(FORWARD_REF_SCHEMA.as_bytes()).unwrap();
        let mut session = GenerationSession::new();
        session
            .build_models(&document, &["Audio", "AudioSet", "Tag"])
            .unwrap();

        let ts = session.render(TargetLanguage::TypeScript).unwrap();
        assert!(ts.contains("  audio_set?: AudioSet | null\n"));
        assert!(ts.contains("  tags?: Array<Tag> | null\n"));

        let py = session.render(TargetLanguage::Python).unwrap();
        assert!(py.contains("    audio_set: AudioSet | None = None\n"));
        assert!(py.contains("    tags: list[Tag] | None = None\n"));
    }

    #[test]
    fn test_unbuilt_reference_fails_render() {
        let document = SchemaDocument::from_yaml(FORWARD_REF_SCHEMA.as_bytes()).unwrap();
        let mut session = GenerationSession::new();
        session.build_models(&document, &["Audio", "Tag"]).unwrap();

        let err = session.render(TargetLanguage::Python).unwrap_err();
        assert!(matches!(err, CodegenError::CannotCast { ref value, .. } if value == "AudioSet"));
    }

    #[test]
    fn test_duplicate_name_keeps_position() {
        let document = SchemaDocument::from_yaml(FORWARD_REF_SCHEMA.as_bytes()).unwrap();
        let mut session = GenerationSession::new();
        let models = session
            .build_models(&document, &["Tag", "AudioSet", "Tag"])
            .unwrap();
        let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Tag", "AudioSet"]);
    }

    #[test]
    fn test_tag_end_to_end_render() {
        let document = SchemaDocument::from_yaml(TAG_SCHEMA.as_bytes()).unwrap();
        let mut session = GenerationSession::new();
        session.build_models(&document, &["Tag"]).unwrap();

        let py = session.render(TargetLanguage::Python).unwrap();
        assert!(py.contains("class Tag:"));
        assert!(py.contains("    \"\"\"A tag attached to a media item.\"\"\""));
        let name_at = py.find("    name: str\n").unwrap();
        let provider_at = py.find("    provider: str | None = None").unwrap();
        assert!(name_at < provider_at);

        let ts = session.render(TargetLanguage::TypeScript).unwrap();
        assert!(ts.contains("export interface Tag {"));
        let name_at = ts.find("  name: string\n").unwrap();
        let provider_at = ts.find("  provider?: string | null\n").unwrap();
        assert!(name_at < provider_at);
    }

    #[test]
    fn test_write_models_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("models.py"), "stale").unwrap();

        let document = SchemaDocument::from_yaml(TAG_SCHEMA.as_bytes()).unwrap();
        let mut session = GenerationSession::new();
        session.build_models(&document, &["Tag"]).unwrap();
        let written = session
            .write_models(&out, &TargetLanguage::ALL)
            .unwrap();

        assert_eq!(written, vec![out.join("models.py"), out.join("models.ts")]);
        let py = std::fs::read_to_string(out.join("models.py")).unwrap();
        assert!(!py.contains("stale"));
        assert!(py.contains("class Tag:"));
    }

    #[test]
    fn test_default_config() {
        let config = GeneratorConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.models.len(), 6);
        assert_eq!(config.models[0], "Provider");
        assert_eq!(config.languages, TargetLanguage::ALL.to_vec());
    }
}
