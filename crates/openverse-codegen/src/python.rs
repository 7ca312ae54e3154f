//! Python type annotations and `models.py` dataclass rendering.

use askama::Template;

use crate::registry::ModelRegistry;
use crate::schema::{Model, Property, SchemaType};
use crate::view::{build_views, one_line, ModelView};
use crate::{CodegenError, TargetLanguage};

/// Python type annotation for a resolved type.
pub fn python_type_string(ty: &SchemaType, registry: &ModelRegistry) -> Result<String, CodegenError> {
    if let Some(model) = registry.shadowing(ty) {
        return Ok(model.name.clone());
    }

    let rendered = match ty {
        SchemaType::Null => "None".to_string(),
        SchemaType::Model(name) => registry
            .get(name)
            .map(|model| model.name.clone())
            .ok_or_else(|| CodegenError::cannot_cast(name, TargetLanguage::Python))?,
        SchemaType::Boolean => "bool".to_string(),
        SchemaType::String => "str".to_string(),
        SchemaType::Integer => "int".to_string(),
        SchemaType::Number => "float".to_string(),
        SchemaType::Bytes => "bytes".to_string(),
        SchemaType::Any => "Any".to_string(),
        SchemaType::List(Some(inner)) => format!("list[{}]", python_type_string(inner, registry)?),
        SchemaType::List(None) => "list[Any]".to_string(),
        SchemaType::Tuple(items) if items.is_empty() => "tuple[Any, ...]".to_string(),
        SchemaType::Tuple(items) => format!("tuple[{}]", join(items, ", ", registry)?),
        SchemaType::Map(Some(inner)) => {
            format!("dict[str, {}]", python_type_string(inner, registry)?)
        }
        SchemaType::Map(None) => "dict[str, Any]".to_string(),
        SchemaType::Union(members) if members.is_empty() => {
            return Err(CodegenError::cannot_cast(ty, TargetLanguage::Python))
        }
        SchemaType::Union(members) => join(members, " | ", registry)?,
    };

    Ok(rendered)
}

fn join(types: &[SchemaType], sep: &str, registry: &ModelRegistry) -> Result<String, CodegenError> {
    let parts = types
        .iter()
        .map(|t| python_type_string(t, registry))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(sep))
}

fn admits_none(ty: &SchemaType) -> bool {
    match ty {
        SchemaType::Null => true,
        SchemaType::Union(members) => members.iter().any(admits_none),
        _ => false,
    }
}

impl Property {
    /// Python type string for this property's resolved type.
    pub fn py_type_string(&self, registry: &ModelRegistry) -> Result<String, CodegenError> {
        python_type_string(&self.ty, registry)
    }

    /// Field annotation: nullable and optional fields admit `None`.
    pub fn python_annotation(&self, registry: &ModelRegistry) -> Result<String, CodegenError> {
        let base = self.py_type_string(registry)?;
        if (self.nullable || !self.required) && !admits_none(&self.ty) {
            Ok(format!("{base} | None"))
        } else {
            Ok(base)
        }
    }
}

#[derive(Template, Debug)]
#[template(path = "codegen/models.py", escape = "none")]
struct PythonModelsTemplate<'a> {
    models: &'a [ModelView],
}

/// Render Python dataclasses for `models`, in the given order.
pub fn render(models: &[Model], registry: &ModelRegistry) -> Result<String, CodegenError> {
    let mut views = build_views(models, |prop| prop.python_annotation(registry), one_line)?;
    for view in &mut views {
        view.description = docstring_body(&view.description);
    }
    Ok(PythonModelsTemplate { models: &views }.render()?)
}

/// Escape text for a `"""` docstring: backslashes and every double quote.
fn docstring_body(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
