//! Migration replay before validation

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::SessionError;
use crate::session::ValidatorSession;

/// Suffix identifying replayable migration files.
pub const MIGRATION_SUFFIX: &str = ".up.sql";

/// List pending migrations in replay order.
///
/// Files are ordered by natural filename comparison, so `2_x.up.sql` sorts
/// before `10_x.up.sql`. When the document being validated is itself one of
/// the migrations the list stops just before it, so a migration can be
/// edited without running itself.
pub fn pending_migrations(
    folder: &Path,
    document_path: Option<&Path>,
) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.ends_with(MIGRATION_SUFFIX))
                .unwrap_or(false)
        })
        .collect();
    files.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));

    if let Some(document_path) = document_path {
        if let Some(index) = files.iter().position(|f| same_file(f, document_path)) {
            files.truncate(index);
        }
    }
    Ok(files)
}

/// Replay pending migrations inside the current transaction.
///
/// A failing migration resets the transaction and halts replay; the
/// validation request itself continues. Returns whether replay ran to
/// completion.
pub async fn apply_migrations(
    session: &dyn ValidatorSession,
    folder: &Path,
    document_path: Option<&Path>,
) -> Result<bool, SessionError> {
    let files = match pending_migrations(folder, document_path) {
        Ok(files) => files,
        Err(e) => {
            warn!("cannot list migrations folder {}: {}", folder.display(), e);
            return Ok(false);
        }
    };

    for file in files {
        let sql = match fs::read_to_string(&file) {
            Ok(sql) => sql,
            Err(e) => {
                warn!("cannot read migration {}: {}", file.display(), e);
                return Ok(false);
            }
        };
        debug!("replaying migration {}", file.display());
        if let Err(e) = session.batch_execute(&sql).await {
            warn!("migration {} failed, halting replay: {}", file.display(), e);
            session.batch_execute("ROLLBACK").await?;
            session.batch_execute("BEGIN").await?;
            return Ok(false);
        }
    }
    Ok(true)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string()
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Numeric-aware filename comparison: digit runs compare as numbers,
/// everything else compares lexically.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a_chunks = chunk(a);
    let b_chunks = chunk(b);
    for (ca, cb) in a_chunks.iter().zip(b_chunks.iter()) {
        let ordering = match (ca, cb) {
            ((true, a_digits), (true, b_digits)) => numeric_cmp(a_digits, b_digits),
            ((_, a_text), (_, b_text)) => a_text.cmp(b_text),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a_chunks.len().cmp(&b_chunks.len())
}

/// Split into runs of digits and runs of everything else.
fn chunk(s: &str) -> Vec<(bool, &str)> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;
    for (i, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        match current {
            Some(kind) if kind == is_digit => {}
            Some(kind) => {
                chunks.push((kind, &s[start..i]));
                start = i;
                current = Some(is_digit);
            }
            None => current = Some(is_digit),
        }
    }
    if let Some(kind) = current {
        chunks.push((kind, &s[start..]));
    }
    chunks
}

/// Compare digit runs numerically without parsing, immune to overflow:
/// strip leading zeros, compare lengths, then compare lexically.
fn numeric_cmp(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
