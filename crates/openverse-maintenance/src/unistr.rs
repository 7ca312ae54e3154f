//! `ov_unistr`: a Postgres function decoding unicode escape sequences.
//!
//! Postgres 13 has no `unistr`, so the function is written in PL/Python.
//! The `ov_` prefix avoids clashing with the built-in after an upgrade.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;
use tera::Context;

use crate::sql::{SqlTemplates, OV_UNISTR};
use crate::workflow::{StepContext, StepHandler};
use crate::Result;

pub const OV_UNISTR_FUNCTION: &str = "ov_unistr";

/// `CREATE OR REPLACE FUNCTION` statement for `ov_unistr`. The function is
/// `STRICT`, so a NULL argument yields NULL.
pub fn install_statement() -> Result<String> {
    let mut context = Context::new();
    context.insert("function_name", OV_UNISTR_FUNCTION);
    SqlTemplates::load()?.render(OV_UNISTR, &context)
}

/// Install or replace `ov_unistr`. Safe to run repeatedly.
pub async fn ensure_ov_unistr(pool: &PgPool) -> Result<()> {
    let statement = install_statement()?;
    tracing::info!(function = OV_UNISTR_FUNCTION, sql = %statement, "Installing function");
    sqlx::raw_sql(&statement).execute(pool).await?;
    Ok(())
}

/// Step handler installing `ov_unistr`.
#[derive(Debug, Clone)]
pub struct EnsureOvUnistr {
    pool: PgPool,
}

impl EnsureOvUnistr {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StepHandler for EnsureOvUnistr {
    async fn execute(&self, _ctx: &StepContext) -> Result<Value> {
        ensure_ov_unistr(&self.pool).await?;
        Ok(json!({ "function": OV_UNISTR_FUNCTION }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_statement() {
        let sql = install_statement().unwrap();
        assert!(sql.starts_with("CREATE OR REPLACE FUNCTION ov_unistr (string text)"));
        assert!(sql.contains("RETURNS text"));
        assert!(sql.contains("STRICT"));
        assert!(sql.contains(r#"string.encode("latin-1", "backslashreplace").decode("unicode_escape")"#));
        assert!(sql.ends_with("$$ LANGUAGE plpython3u;"));
    }
}
