//! Mapping validator-reported locations back onto the source document

use lsp_types::{Position, Range};

/// Range covering the whole document, the fallback for every mapping
/// inconsistency.
pub fn full_document_range(document: &str) -> Range {
    let mut line = 0u32;
    let mut column = 0u32;
    for c in document.chars() {
        if c == '\n' {
            line += 1;
            column = 0;
        } else {
            column += 1;
        }
    }
    Range {
        start: Position::new(0, 0),
        end: Position::new(line, column),
    }
}

/// Map an error location reported against one statement back onto the
/// document.
///
/// `error_offset` is a 0-based character offset inside the statement;
/// `error_line` is a 1-based statement-relative line number. The offset is
/// preferred when both are present. The resulting range spans from the
/// first non-whitespace character of the located line to its end, widening
/// a point report into a reviewable span. Every inconsistency degrades to
/// the whole-document range; a diagnostic is never dropped over it.
pub fn map_statement_error(
    document: &str,
    statement_offset: usize,
    error_offset: Option<usize>,
    error_line: Option<u32>,
) -> Range {
    if let Some(offset) = error_offset {
        let absolute = char_count_to(document, statement_offset).map(|n| n + offset);
        if let Some(range) = line_range_at_char(document, absolute) {
            return range;
        }
        return full_document_range(document);
    }
    if let Some(line) = error_line {
        let statement_line = match char_count_to(document, statement_offset) {
            Some(chars) => line_of_char(document, chars),
            None => return full_document_range(document),
        };
        let absolute_line = statement_line + line.saturating_sub(1) as usize;
        if let Some(range) = line_span(document, absolute_line) {
            return range;
        }
    }
    full_document_range(document)
}

/// Exact range for a byte span of the document, trimmed of surrounding
/// whitespace. Used to point at a whole statement, e.g. a duplicated one.
pub fn span_range(document: &str, start: usize, end: usize) -> Range {
    let Some(span) = document.get(start..end) else {
        return full_document_range(document);
    };
    let leading = span.len() - span.trim_start().len();
    let trailing = span.len() - span.trim_end().len();
    let (start, end) = (start + leading, end - trailing);
    match (position_at(document, start), position_at(document, end)) {
        (Some(from), Some(to)) => Range { start: from, end: to },
        _ => full_document_range(document),
    }
}

/// Line/column of a byte offset, columns counted in characters.
fn position_at(document: &str, byte_offset: usize) -> Option<Position> {
    let prefix = document.get(..byte_offset)?;
    let line = prefix.matches('\n').count();
    let column = prefix
        .rsplit('\n')
        .next()
        .map(|tail| tail.chars().count())
        .unwrap_or(0);
    Some(Position::new(line as u32, column as u32))
}

/// Character count of the document prefix ending at `byte_offset`, or
/// `None` when the offset is out of range or off a char boundary.
fn char_count_to(document: &str, byte_offset: usize) -> Option<usize> {
    document.get(..byte_offset).map(|prefix| prefix.chars().count())
}

/// 0-based line index containing the given character offset.
fn line_of_char(document: &str, char_offset: usize) -> usize {
    document
        .chars()
        .take(char_offset)
        .filter(|c| *c == '\n')
        .count()
}

/// Widened range for the line containing the given absolute character
/// offset, `None` when the offset lies past the end of the document.
fn line_range_at_char(document: &str, char_offset: Option<usize>) -> Option<Range> {
    let char_offset = char_offset?;
    if char_offset > document.chars().count() {
        return None;
    }
    line_span(document, line_of_char(document, char_offset))
}

/// Range from the first non-whitespace character of the line to its end.
fn line_span(document: &str, line_index: usize) -> Option<Range> {
    let line = document.split('\n').nth(line_index)?;
    let trimmed = line.trim_end_matches('\r');
    let indent = trimmed
        .chars()
        .take_while(|c| c.is_whitespace())
        .count();
    let length = trimmed.chars().count();
    Some(Range {
        start: Position::new(line_index as u32, indent.min(length) as u32),
        end: Position::new(line_index as u32, length as u32),
    })
}
