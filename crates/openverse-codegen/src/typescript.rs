//! TypeScript type strings and `models.ts` interface rendering.

use askama::Template;

use crate::registry::ModelRegistry;
use crate::schema::{Model, Property, SchemaType};
use crate::view::{build_views, one_line, ModelView};
use crate::{CodegenError, TargetLanguage};

/// TypeScript type syntax for a resolved type.
pub fn ts_type_string(ty: &SchemaType, registry: &ModelRegistry) -> Result<String, CodegenError> {
    if let Some(model) = registry.shadowing(ty) {
        return Ok(model.name.clone());
    }

    let rendered = match ty {
        SchemaType::Model(name) => registry
            .get(name)
            .map(|model| model.name.clone())
            .ok_or_else(|| CodegenError::cannot_cast(name, TargetLanguage::TypeScript))?,
        SchemaType::Null => "null".to_string(),
        SchemaType::String => "string".to_string(),
        SchemaType::Boolean => "boolean".to_string(),
        SchemaType::Bytes => "ReadableStream".to_string(),
        SchemaType::Integer | SchemaType::Number => "number".to_string(),
        SchemaType::Any => "unknown".to_string(),
        SchemaType::List(Some(inner)) => format!("Array<{}>", ts_type_string(inner, registry)?),
        SchemaType::List(None) => "readonly unknown[]".to_string(),
        SchemaType::Tuple(items) if items.is_empty() => "readonly unknown[]".to_string(),
        SchemaType::Tuple(items) => format!("readonly [{}]", join(items, ", ", registry)?),
        SchemaType::Map(Some(inner)) => {
            format!("Record<string, {}>", ts_type_string(inner, registry)?)
        }
        SchemaType::Map(None) => "Record<string, unknown>".to_string(),
        SchemaType::Union(members) if members.is_empty() => {
            return Err(CodegenError::cannot_cast(ty, TargetLanguage::TypeScript))
        }
        SchemaType::Union(members) => join(members, " | ", registry)?,
    };

    Ok(rendered)
}

fn join(types: &[SchemaType], sep: &str, registry: &ModelRegistry) -> Result<String, CodegenError> {
    let parts = types
        .iter()
        .map(|t| ts_type_string(t, registry))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(sep))
}

fn admits_null(ty: &SchemaType) -> bool {
    match ty {
        SchemaType::Null => true,
        SchemaType::Union(members) => members.iter().any(admits_null),
        _ => false,
    }
}

impl Property {
    /// TypeScript type string for this property's resolved type.
    pub fn ts_type_string(&self, registry: &ModelRegistry) -> Result<String, CodegenError> {
        ts_type_string(&self.ty, registry)
    }

    /// Property annotation: nullable fields admit `null`. Optionality is
    /// expressed by the `?` marker in the interface, not here.
    pub fn ts_annotation(&self, registry: &ModelRegistry) -> Result<String, CodegenError> {
        let base = self.ts_type_string(registry)?;
        if self.nullable && !admits_null(&self.ty) {
            Ok(format!("{base} | null"))
        } else {
            Ok(base)
        }
    }
}

#[derive(Template, Debug)]
#[template(path = "codegen/models.ts", escape = "none")]
struct TypeScriptModelsTemplate<'a> {
    models: &'a [ModelView],
}

/// Render TypeScript interfaces for `models`, in the given order.
pub fn render(models: &[Model], registry: &ModelRegistry) -> Result<String, CodegenError> {
    let views = build_views(
        models,
        |prop| prop.ts_annotation(registry),
        |text| one_line(text).replace("*/", "*\\/"),
    )?;
    Ok(TypeScriptModelsTemplate { models: &views }.render()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{model_from_schema, resolve_type};
    use serde_json::json;

    fn registry_with(names: &[&str]) -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        for name in names {
            registry.register(Model {
                name: (*name).to_string(),
                description: String::new(),
                properties: vec![],
            });
        }
        registry
    }

    #[test]
    fn test_primitive_spellings() {
        let registry = ModelRegistry::new();
        let cases = [
            (SchemaType::Null, "null"),
            (SchemaType::Boolean, "boolean"),
            (SchemaType::String, "string"),
            (SchemaType::Integer, "number"),
            (SchemaType::Number, "number"),
            (SchemaType::Bytes, "ReadableStream"),
            (SchemaType::Any, "unknown"),
        ];
        for (ty, expected) in cases {
            assert_eq!(ts_type_string(&ty, &registry).unwrap(), expected);
        }
    }

    #[test]
    fn test_array_of_tag_ref() {
        let registry = registry_with(&["Tag"]);
        let ty = resolve_type(&json!({
            "type": "array",
            "items": { "$ref": "#/components/schemas/Tag" }
        }))
        .unwrap();
        assert_eq!(ts_type_string(&ty, &registry).unwrap(), "Array<Tag>");
    }

    #[test]
    fn test_containers() {
        let registry = ModelRegistry::new();
        assert_eq!(
            ts_type_string(&SchemaType::List(None), &registry).unwrap(),
            "readonly unknown[]"
        );
        assert_eq!(
            ts_type_string(
                &SchemaType::Tuple(vec![SchemaType::String, SchemaType::Integer]),
                &registry
            )
            .unwrap(),
            "readonly [string, number]"
        );
        assert_eq!(
            ts_type_string(&SchemaType::Tuple(vec![]), &registry).unwrap(),
            "readonly unknown[]"
        );
        assert_eq!(
            ts_type_string(&SchemaType::map_of(SchemaType::Boolean), &registry).unwrap(),
            "Record<string, boolean>"
        );
        assert_eq!(
            ts_type_string(&SchemaType::Map(None), &registry).unwrap(),
            "Record<string, unknown>"
        );
    }

    #[test]
    fn test_all_of_union_separator() {
        let registry = registry_with(&["Tag", "Provider"]);
        let ty = resolve_type(&json!({
            "allOf": [
                { "$ref": "#/components/schemas/Tag" },
                { "$ref": "#/components/schemas/Provider" }
            ]
        }))
        .unwrap();
        assert_eq!(ts_type_string(&ty, &registry).unwrap(), "Tag | Provider");
    }

    #[test]
    fn test_unregistered_model_cannot_cast() {
        let registry = ModelRegistry::new();
        let err = ts_type_string(&SchemaType::list_of(SchemaType::Model("Ghost".into())), &registry)
            .unwrap_err();
        assert!(err.to_string().contains("Ghost"));
    }

    #[test]
    fn test_registered_model_shadows_builtin() {
        let registry = registry_with(&["Any"]);
        assert_eq!(ts_type_string(&SchemaType::Any, &registry).unwrap(), "Any");
        assert_eq!(
            ts_type_string(&SchemaType::String, &registry).unwrap(),
            "string"
        );
    }

    #[test]
    fn test_reference_observes_latest_registration() {
        let mut registry = ModelRegistry::new();
        let ty = SchemaType::Model("Tag".into());
        assert!(ts_type_string(&ty, &registry).is_err());

        registry.register(Model {
            name: "Tag".into(),
            description: "first".into(),
            properties: vec![],
        });
        registry.register(Model {
            name: "Tag".into(),
            description: "second".into(),
            properties: vec![],
        });
        assert_eq!(ts_type_string(&ty, &registry).unwrap(), "Tag");
        assert_eq!(registry.get("Tag").unwrap().description, "second");
    }

    #[test]
    fn test_render_tag_interface() {
        let mut registry = ModelRegistry::new();
        let tag = model_from_schema(
            "Tag",
            &json!({
                "description": "A tag */ attached to media",
                "required": ["name"],
                "properties": {
                    "provider": { "type": "string", "nullable": true },
                    "name": { "type": "string" }
                }
            }),
            &mut registry,
        )
        .unwrap();
        let output = render(&[tag], &registry).unwrap();

        assert!(output.contains("/** A tag *\\/ attached to media */\nexport interface Tag {"));
        assert!(output.contains("  name: string\n"));
        assert!(output.contains("  provider?: string | null\n"));
        assert!(output.find("name: string").unwrap() < output.find("provider?:").unwrap());
        assert!(output.contains("}\n"));
    }

    #[test]
    fn test_render_keeps_angle_brackets_and_quotes() {
        let mut registry = ModelRegistry::new();
        let tag = model_from_schema(
            "Tag",
            &json!({ "properties": { "name": { "type": "string" } } }),
            &mut registry,
        )
        .unwrap();
        let audio = model_from_schema(
            "Audio",
            &json!({
                "description": "Audio & its \"tags\"",
                "properties": {
                    "tags": { "type": "array", "items": { "$ref": "#/components/schemas/Tag" } }
                }
            }),
            &mut registry,
        )
        .unwrap();
        let output = render(&[tag, audio], &registry).unwrap();
        assert!(output.contains("  tags?: Array<Tag>\n"), "{output}");
        assert!(output.contains("/** Audio & its \"tags\" */"));
        assert!(!output.contains("&lt;"));
        assert!(!output.contains("&amp;"));
    }
}
