//! Tera rendering for the SQL fragments under `templates/sql`.

use tera::{Context, Tera};

use crate::{MaintenanceError, Result};

pub(crate) const OV_UNISTR: &str = "ov_unistr.sql";
pub(crate) const SELECT_QUERY: &str = "select_query.sql";
pub(crate) const UPDATE_QUERY: &str = "update_query.sql";

const TEMPLATES: [(&str, &str); 3] = [
    (OV_UNISTR, include_str!("../templates/sql/ov_unistr.sql")),
    (SELECT_QUERY, include_str!("../templates/sql/select_query.sql")),
    (UPDATE_QUERY, include_str!("../templates/sql/update_query.sql")),
];

const MAX_IDENTIFIER_LEN: usize = 63;

/// SQL template engine. Templates are compiled into the binary.
#[derive(Debug)]
pub(crate) struct SqlTemplates {
    tera: Tera,
}

impl SqlTemplates {
    pub fn load() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.to_vec())
            .map_err(|e| MaintenanceError::template("templates/sql", e))?;
        Ok(Self { tera })
    }

    /// Render a template and strip surrounding whitespace.
    pub fn render(&self, template: &str, context: &Context) -> Result<String> {
        self.tera
            .render(template, context)
            .map(|sql| sql.trim().to_string())
            .map_err(|e| MaintenanceError::template(template, e))
    }
}

/// Unquoted lowercase Postgres identifier; anything else is rejected
/// before it is interpolated into SQL.
pub(crate) fn check_identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = name.len() <= MAX_IDENTIFIER_LEN
        && matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(MaintenanceError::InvalidTableName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_load() {
        let templates = SqlTemplates::load().unwrap();
        let mut context = Context::new();
        context.insert("table_name", "audio");
        context.insert("predicate", "(@.name == \"x\")");
        let sql = templates.render(SELECT_QUERY, &context).unwrap();
        assert!(sql.starts_with("WHERE jsonb_path_query_first("));
        assert!(sql.contains("audio.tags"));
        assert!(sql.ends_with("IS NOT NULL"));
    }

    #[test]
    fn test_missing_variable_is_template_error() {
        let templates = SqlTemplates::load().unwrap();
        let err = templates.render(UPDATE_QUERY, &Context::new()).unwrap_err();
        assert!(matches!(err, MaintenanceError::Template { ref template, .. } if template == UPDATE_QUERY));
    }

    #[test]
    fn test_check_identifier() {
        assert_eq!(check_identifier("image").unwrap(), "image");
        assert!(check_identifier("audio_set").is_ok());
        assert!(check_identifier("image; DROP TABLE image").is_err());
        assert!(check_identifier("Image").is_err());
        assert!(check_identifier("").is_err());
        assert!(check_identifier("1image").is_err());
    }
}
