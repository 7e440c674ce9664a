//! Per-document validation pipeline

use std::path::PathBuf;

use lsp_types::{Diagnostic, DiagnosticSeverity};
use tracing::{debug, error};

use crate::check;
use crate::error::SessionError;
use crate::migrate;
use crate::params::{resolve_parameter_info, sanitize_statement};
use crate::position;
use crate::session::ValidatorSession;
use crate::settings::Settings;
use crate::split::{neutralize_transaction_control, split_document};

/// Directive comment disabling the language server for a document.
pub const DISABLE_DIRECTIVE: &str = "plpgsql-language-server:disable";

/// Directive comment disabling validation only.
pub const DISABLE_VALIDATION_DIRECTIVE: &str = "plpgsql-language-server:disable-validation";

/// Which directive disabled a document, for embedders that treat the two
/// differently. Validation skips the document either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledBy {
    LanguageServer,
    ValidationOnly,
}

/// Scan comment lines for a disable directive.
pub fn disabled_directive(document: &str) -> Option<DisabledBy> {
    for line in document.lines() {
        let line = line.trim_start();
        if !(line.starts_with("--") || line.starts_with("/*")) {
            continue;
        }
        if line.contains(DISABLE_VALIDATION_DIRECTIVE) {
            return Some(DisabledBy::ValidationOnly);
        }
        if line.contains(DISABLE_DIRECTIVE) {
            return Some(DisabledBy::LanguageServer);
        }
    }
    None
}

/// Per-request context supplied by the embedding layer.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// On-disk path of the document, used to keep a migration from
    /// replaying itself.
    pub document_path: Option<PathBuf>,
    /// Whether the document text is fully loaded. Failures on incomplete
    /// documents are transient and not worth logging.
    pub is_complete: bool,
}

/// Validate one document against the session, returning its diagnostics.
///
/// Every statement runs in its own `BEGIN` .. `ROLLBACK` scope; a failure
/// in one statement never corrupts validation of the next. The only errors
/// surfaced to the caller are workspace misconfiguration (keyword directive
/// without configured patterns, broken separator pattern) and session-level
/// connection failures; everything else degrades to diagnostics.
pub async fn validate_document(
    session: &dyn ValidatorSession,
    document: &str,
    settings: &Settings,
    options: &ValidateOptions,
) -> anyhow::Result<Vec<Diagnostic>> {
    if let Some(disabled) = disabled_directive(document) {
        debug!("document disabled by directive: {:?}", disabled);
        return Ok(Vec::new());
    }

    let neutralized = neutralize_transaction_control(document);
    let separator = settings.statement_separator_pattern.as_deref();
    let statements = split_document(&neutralized, separator)?;

    let mut diagnostics = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    let mut migrations_halted = false;
    let mut extension_available: Option<bool> = None;

    for statement in &statements {
        if statement.is_separator || statement.text.trim().is_empty() {
            continue;
        }
        let span = position::span_range(
            document,
            statement.offset,
            statement.offset + statement.text.len(),
        );

        if separator.is_some() {
            if seen.iter().any(|s| s == &statement.text) {
                diagnostics.push(Diagnostic {
                    range: span,
                    severity: Some(DiagnosticSeverity::ERROR),
                    message: "Duplicated statement".to_string(),
                    source: Some("plpgsql-ls".to_string()),
                    ..Default::default()
                });
                continue;
            }
            seen.push(statement.text.clone());
        }

        if statement.text.trim_start().to_uppercase().starts_with("INSERT") {
            diagnostics.push(Diagnostic {
                range: span,
                severity: Some(DiagnosticSeverity::WARNING),
                message: "INSERT statements are not validated".to_string(),
                source: Some("plpgsql-ls".to_string()),
                ..Default::default()
            });
            continue;
        }

        let first_line = statement.text.lines().next().unwrap_or("");
        let info = resolve_parameter_info(&statement.text, first_line, settings)?;
        let (sanitized, parameter_count) = sanitize_statement(&statement.text, info.as_ref())?;

        session.batch_execute("BEGIN").await?;

        if let Some(folder) = settings.migrations_folder.as_deref() {
            if !migrations_halted {
                let completed =
                    migrate::apply_migrations(session, folder, options.document_path.as_deref())
                        .await?;
                if !completed {
                    migrations_halted = true;
                }
            }
        }

        match session.execute_with_nulls(&sanitized, parameter_count).await {
            Ok(_) => {
                let available = match extension_available {
                    Some(available) => available,
                    None => {
                        let available =
                            check::extension_available(session).await.unwrap_or(false);
                        extension_available = Some(available);
                        available
                    }
                };
                if available {
                    match check::collect_checks(session, document).await {
                        Ok(more) => diagnostics.extend(more),
                        Err(SessionError::Db(info)) => {
                            if options.is_complete {
                                error!("static analysis failed: {}", info.message);
                            }
                        }
                        Err(e @ SessionError::Connection(_)) => {
                            session.batch_execute("ROLLBACK").await?;
                            return Err(e.into());
                        }
                    }
                }
            }
            Err(SessionError::Db(info)) => {
                let range = position::map_statement_error(
                    document,
                    statement.offset,
                    info.position.map(|p| p.saturating_sub(1)),
                    None,
                );
                if options.is_complete {
                    error!("validation failed: {} ({})", info.message, sanitized);
                }
                diagnostics.push(Diagnostic {
                    range,
                    severity: Some(DiagnosticSeverity::ERROR),
                    message: info.message,
                    source: Some("plpgsql-ls".to_string()),
                    ..Default::default()
                });
            }
            Err(e @ SessionError::Connection(_)) => {
                session.batch_execute("ROLLBACK").await?;
                return Err(e.into());
            }
        }

        session.batch_execute("ROLLBACK").await?;
    }

    Ok(diagnostics)
}
