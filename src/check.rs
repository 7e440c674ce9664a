//! Static analysis through the plpgsql_check extension

use lsp_types::{Diagnostic, DiagnosticSeverity};
use regex::Regex;
use tracing::debug;

use crate::error::SessionError;
use crate::position;
use crate::session::ValidatorSession;

/// Extension probed before attempting static analysis.
pub const CHECK_EXTENSION: &str = "plpgsql_check";

/// Introspection query: is a named extension installed?
pub const EXTENSION_QUERY: &str = "SELECT extname FROM pg_extension WHERE extname = $1";

/// Per-function/per-trigger check call. Runs inside the validation
/// transaction so functions created by the document under validation are
/// visible.
pub const FUNCTION_CHECK_QUERY: &str = r#"
SELECT
    (pcf).functionid::regprocedure::text AS procedure,
    (pcf).lineno AS lineno,
    (pcf).message AS message,
    (pcf).level AS level
FROM
(
    SELECT plpgsql_check_function_tb(pg_proc.oid, COALESCE(pg_trigger.tgrelid, 0)) AS pcf
    FROM pg_proc
    LEFT JOIN pg_trigger ON pg_trigger.tgfoid = pg_proc.oid
    WHERE pg_proc.prolang = (
        SELECT oid FROM pg_language WHERE lanname = 'plpgsql'
    )
    AND pg_proc.pronamespace = (
        SELECT oid FROM pg_namespace WHERE nspname = current_schema()
    )
) checks
"#;

/// One row reported by the check procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRow {
    /// Procedure signature, e.g. `f(integer)`.
    pub function: String,
    /// 1-based line number relative to the function definition.
    pub line: Option<u32>,
    pub message: String,
    /// Level string as reported: `error`, `warning`, `warning extra`, ...
    pub level: String,
}

impl CheckRow {
    pub fn severity(&self) -> DiagnosticSeverity {
        match self.level.as_str() {
            "error" => DiagnosticSeverity::ERROR,
            "warning" | "warning extra" => DiagnosticSeverity::WARNING,
            _ => DiagnosticSeverity::INFORMATION,
        }
    }
}

/// Whether static analysis can run in this database.
pub async fn extension_available(session: &dyn ValidatorSession) -> Result<bool, SessionError> {
    let available = session.has_extension(CHECK_EXTENSION).await?;
    if !available {
        debug!(
            "{} extension not installed, skipping static analysis",
            CHECK_EXTENSION
        );
    }
    Ok(available)
}

/// Run the check procedure and map every reported row onto the document.
///
/// Rows are anchored to the `CREATE FUNCTION` text of the reported
/// procedure; when the definition cannot be located the row degrades to a
/// whole-document diagnostic rather than being dropped.
pub async fn collect_checks(
    session: &dyn ValidatorSession,
    document: &str,
) -> Result<Vec<Diagnostic>, SessionError> {
    let mut diagnostics = Vec::new();
    for row in session.function_checks().await? {
        let range = match locate_function(document, &row.function) {
            Some(offset) => position::map_statement_error(document, offset, None, row.line),
            None => position::full_document_range(document),
        };
        diagnostics.push(Diagnostic {
            range,
            severity: Some(row.severity()),
            message: format!("{} {}", row.function, row.message),
            source: Some("plpgsql-ls".to_string()),
            ..Default::default()
        });
    }
    Ok(diagnostics)
}

/// Byte offset of the `CREATE FUNCTION`/`CREATE PROCEDURE` definition whose
/// name matches the reported procedure signature.
fn locate_function(document: &str, signature: &str) -> Option<usize> {
    let name = signature.split('(').next()?.trim();
    let bare_name = name.rsplit('.').next()?;
    if bare_name.is_empty() {
        return None;
    }
    let re = Regex::new(&format!(
        r"(?i)create(?:\s+or\s+replace)?\s+(?:function|procedure)\s+(?:[A-Za-z_][A-Za-z0-9_]*\.)?{}\s*\(",
        regex::escape(bare_name)
    ))
    .ok()?;
    re.find(document).map(|m| m.start())
}
