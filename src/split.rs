//! Statement splitting with original-document offsets

use regex::Regex;

use crate::error::SplitError;

/// One entry of a split document. Concatenating the `text` of all entries
/// in order reconstructs the input exactly, so `offset` never drifts.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    /// Byte offset of `text` within the document.
    pub offset: usize,
    /// Separator entries keep offsets honest but are skipped by validation.
    pub is_separator: bool,
}

/// Split a document into candidate statements.
///
/// Without a separator the whole document is one statement at offset 0.
/// With one, separator text is preserved as its own entries so offsets can
/// be reconstructed.
pub fn split_document(text: &str, separator: Option<&str>) -> Result<Vec<Statement>, SplitError> {
    let Some(pattern) = separator else {
        return Ok(vec![Statement {
            text: text.to_string(),
            offset: 0,
            is_separator: false,
        }]);
    };

    let re = Regex::new(pattern).map_err(|source| SplitError::InvalidSeparator {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut statements = Vec::new();
    let mut cursor = 0;
    for m in re.find_iter(text) {
        // an empty separator match would loop forever
        if m.start() == m.end() {
            continue;
        }
        statements.push(Statement {
            text: text[cursor..m.start()].to_string(),
            offset: cursor,
            is_separator: false,
        });
        statements.push(Statement {
            text: m.as_str().to_string(),
            offset: m.start(),
            is_separator: true,
        });
        cursor = m.end();
    }
    statements.push(Statement {
        text: text[cursor..].to_string(),
        offset: cursor,
        is_separator: false,
    });
    Ok(statements)
}

/// Overwrite transaction-control statements with same-length filler so they
/// cannot close the validation session, without moving any offset.
pub fn neutralize_transaction_control(text: &str) -> String {
    let re = Regex::new(r"(?im)^[ \t]*(?:BEGIN|COMMIT|ROLLBACK)[ \t]*;")
        .expect("transaction control pattern compiles");
    re.replace_all(text, |captures: &regex::Captures| {
        " ".repeat(captures[0].len())
    })
    .into_owned()
}
