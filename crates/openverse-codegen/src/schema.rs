//! OpenAPI component schema to intermediate type representation.
//!
//! Converts `components.schemas` fragments into language-agnostic [`Model`] and
//! [`Property`] structures that the Python and TypeScript renderers consume.
//! References to other models are kept by name and resolved against a
//! [`ModelRegistry`] at render time, so a property may name a model that is
//! constructed later in the same session.

use serde_json::{Map, Value};
use std::fmt;

use crate::registry::ModelRegistry;
use crate::CodegenError;

/// Language-agnostic resolved type.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaType {
    Null,
    Boolean,
    String,
    Integer,
    Number,
    /// Binary payload (`type: string, format: binary`)
    Bytes,
    Any,
    /// `None` means a list whose element type is unknown
    List(Option<Box<SchemaType>>),
    /// Fixed-size sequence; empty means a sequence of unknown elements
    Tuple(Vec<SchemaType>),
    /// String-keyed mapping; `None` means the value type is unknown
    Map(Option<Box<SchemaType>>),
    Union(Vec<SchemaType>),
    /// References a registered [`Model`] by name
    Model(String),
}

impl SchemaType {
    /// Name of the built-in this type stands for, as used for registry lookups.
    ///
    /// The renderers check the registry with this name before spelling the
    /// built-in, so a component schema literally named `str` or `list` shadows
    /// the primitive. That precedence is deliberate but easy to trip over when
    /// an API grows a model with a generic name.
    pub fn raw_name(&self) -> Option<&str> {
        match self {
            SchemaType::Boolean => Some("bool"),
            SchemaType::String => Some("str"),
            SchemaType::Integer => Some("int"),
            SchemaType::Number => Some("float"),
            SchemaType::Bytes => Some("bytes"),
            SchemaType::Any => Some("Any"),
            SchemaType::List(_) => Some("list"),
            SchemaType::Tuple(_) => Some("tuple"),
            SchemaType::Map(_) => Some("dict"),
            SchemaType::Null | SchemaType::Union(_) | SchemaType::Model(_) => None,
        }
    }

    /// Build a list type with a known element type.
    pub fn list_of(inner: SchemaType) -> Self {
        SchemaType::List(Some(Box::new(inner)))
    }

    /// Build a mapping type with a known value type.
    pub fn map_of(inner: SchemaType) -> Self {
        SchemaType::Map(Some(Box::new(inner)))
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaType::Null => write!(f, "Null"),
            SchemaType::Boolean => write!(f, "Boolean"),
            SchemaType::String => write!(f, "String"),
            SchemaType::Integer => write!(f, "Integer"),
            SchemaType::Number => write!(f, "Number"),
            SchemaType::Bytes => write!(f, "Bytes"),
            SchemaType::Any => write!(f, "Any"),
            SchemaType::List(Some(inner)) => write!(f, "List<{inner}>"),
            SchemaType::List(None) => write!(f, "List<Any>"),
            SchemaType::Tuple(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "Tuple<{}>", items.join(", "))
            }
            SchemaType::Map(Some(inner)) => write!(f, "Map<{inner}>"),
            SchemaType::Map(None) => write!(f, "Map<Any>"),
            SchemaType::Union(members) => {
                let members: Vec<String> = members.iter().map(ToString::to_string).collect();
                write!(f, "{}", members.join(" | "))
            }
            SchemaType::Model(name) => write!(f, "{name}"),
        }
    }
}

/// A single field of a [`Model`].
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property name as it appears in the schema
    pub name: String,
    /// Description from the schema, empty when absent
    pub description: String,
    /// Resolved type
    pub ty: SchemaType,
    /// `nullable: true` in the schema
    pub nullable: bool,
    /// Present in the owning schema's `required` list
    pub required: bool,
}

/// One named record type from `components.schemas`.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub description: String,
    /// Properties in schema document order
    pub properties: Vec<Property>,
}

impl Model {
    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Properties in rendering order: required before optional, otherwise
    /// in document order.
    pub fn rendering_order(&self) -> Vec<&Property> {
        let mut ordered: Vec<&Property> = self.properties.iter().collect();
        ordered.sort_by_key(|p| !p.required);
        ordered
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Model name from a `$ref` such as `#/components/schemas/Tag`.
pub fn ref_name(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

/// Resolve the [`SchemaType`] of a schema fragment.
///
/// Any shape outside the supported subset is a hard error carrying the
/// offending fragment.
pub fn resolve_type(schema: &Value) -> Result<SchemaType, CodegenError> {
    let obj = schema
        .as_object()
        .ok_or_else(|| CodegenError::cannot_resolve(schema))?;

    let type_name = match obj.get("type") {
        None => None,
        Some(Value::String(name)) => Some(name.as_str()),
        Some(_) => return Err(CodegenError::cannot_resolve(schema)),
    };

    match type_name {
        Some("boolean") => Ok(SchemaType::Boolean),
        Some("string") => match obj.get("format").and_then(Value::as_str) {
            Some("binary") => Ok(SchemaType::Bytes),
            _ => Ok(SchemaType::String),
        },
        Some("integer") => Ok(SchemaType::Integer),
        Some("number") => Ok(SchemaType::Number),
        Some("array") => resolve_items(obj.get("items")),
        Some("object") => match obj.get("additionalProperties") {
            Some(additional) => resolve_additional_properties(schema, additional),
            None => Err(CodegenError::cannot_resolve(schema)),
        },
        None => {
            if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
                return Ok(SchemaType::Model(ref_name(reference).to_string()));
            }
            match obj.get("allOf") {
                Some(Value::Array(members)) => resolve_all_of(schema, members),
                _ => Err(CodegenError::cannot_resolve(schema)),
            }
        }
        Some(_) => Err(CodegenError::cannot_resolve(schema)),
    }
}

fn resolve_items(items: Option<&Value>) -> Result<SchemaType, CodegenError> {
    match items {
        None | Some(Value::Null) => Ok(SchemaType::List(None)),
        Some(Value::Object(map)) if map.is_empty() => Ok(SchemaType::List(None)),
        Some(items) => Ok(SchemaType::list_of(resolve_type(items)?)),
    }
}

fn resolve_all_of(schema: &Value, members: &[Value]) -> Result<SchemaType, CodegenError> {
    let mut resolved = members
        .iter()
        .map(resolve_type)
        .collect::<Result<Vec<_>, _>>()?;

    match resolved.len() {
        0 => Err(CodegenError::cannot_resolve(schema)),
        1 => Ok(resolved.remove(0)),
        _ => Ok(SchemaType::Union(resolved)),
    }
}

fn resolve_additional_properties(
    schema: &Value,
    additional: &Value,
) -> Result<SchemaType, CodegenError> {
    match additional {
        Value::Bool(true) => Ok(SchemaType::Map(None)),
        Value::Object(map) if map.is_empty() => Ok(SchemaType::Map(None)),
        Value::Object(_) => Ok(SchemaType::map_of(resolve_type(additional)?)),
        _ => Err(CodegenError::cannot_resolve(schema)),
    }
}

/// Build a [`Model`] from a named component schema and register it.
///
/// Registration overwrites any model previously registered under `name`.
pub fn model_from_schema(
    name: &str,
    schema: &Value,
    registry: &mut ModelRegistry,
) -> Result<Model, CodegenError> {
    let obj = schema
        .as_object()
        .ok_or_else(|| CodegenError::NotAnObject {
            model: name.to_string(),
        })?;

    let properties = obj
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| CodegenError::MissingProperties {
            model: name.to_string(),
        })?;

    let required = required_names(obj);

    let properties = properties
        .iter()
        .map(|(prop_name, prop_schema)| {
            Ok(Property {
                name: prop_name.clone(),
                description: string_field(prop_schema, "description"),
                ty: resolve_type(prop_schema)?,
                nullable: prop_schema
                    .get("nullable")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                required: required.contains(&prop_name.as_str()),
            })
        })
        .collect::<Result<Vec<_>, CodegenError>>()?;

    let model = Model {
        name: name.to_string(),
        description: string_field(schema, "description"),
        properties,
    };

    registry.register(model.clone());
    Ok(model)
}

fn required_names(obj: &Map<String, Value>) -> Vec<&str> {
    obj.get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn string_field(schema: &Value, key: &str) -> String {
    schema
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
