//! Pre-rendered model views handed to the Askama templates.
//!
//! Type strings are computed before rendering so resolution errors surface as
//! [`CodegenError`] instead of template failures.

use crate::schema::{Model, Property};
use crate::CodegenError;

#[derive(Debug)]
pub(crate) struct ModelView {
    pub name: String,
    pub description: String,
    pub fields: Vec<FieldView>,
}

#[derive(Debug)]
pub(crate) struct FieldView {
    pub name: String,
    pub annotation: String,
    pub description: String,
    pub required: bool,
}

/// Build views for `models`, fields in rendering order.
pub(crate) fn build_views<A, C>(
    models: &[Model],
    annotate: A,
    clean: C,
) -> Result<Vec<ModelView>, CodegenError>
where
    A: Fn(&Property) -> Result<String, CodegenError>,
    C: Fn(&str) -> String,
{
    models
        .iter()
        .map(|model| {
            let fields = model
                .rendering_order()
                .into_iter()
                .map(|prop| {
                    Ok(FieldView {
                        name: prop.name.clone(),
                        annotation: annotate(prop)?,
                        description: clean(&prop.description),
                        required: prop.required,
                    })
                })
                .collect::<Result<Vec<_>, CodegenError>>()?;

            Ok(ModelView {
                name: model.name.clone(),
                description: clean(&model.description),
                fields,
            })
        })
        .collect()
}

/// Collapse whitespace runs (including newlines) into single spaces.
pub(crate) fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line() {
        assert_eq!(one_line("  Multi\n  line\tdescription "), "Multi line description");
        assert_eq!(one_line(""), "");
    }
}
