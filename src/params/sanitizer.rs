//! Placeholder rewriting and literal masking

use std::ops::Range;

use regex::Regex;

use super::resolver::{compile_template, QueryParameterInfo, KEYWORD_CLASS};
use crate::error::ParameterError;

/// Rewrite every resolved parameter occurrence into sequential positional
/// placeholders, returning the executable statement and the number of
/// distinct parameters it binds.
pub fn sanitize_statement(
    statement: &str,
    info: Option<&QueryParameterInfo>,
) -> Result<(String, usize), ParameterError> {
    match info {
        None => Ok((statement.to_string(), 0)),
        Some(QueryParameterInfo::Positional { parameter_count }) => {
            Ok((statement.to_string(), *parameter_count))
        }
        Some(QueryParameterInfo::Default { patterns }) => sanitize_default(statement, patterns),
        Some(QueryParameterInfo::Keyword { keywords, patterns }) => {
            sanitize_keyword(statement, keywords, patterns)
        }
    }
}

fn sanitize_default(
    statement: &str,
    patterns: &[String],
) -> Result<(String, usize), ParameterError> {
    let mut regexes = Vec::new();
    for pattern in patterns {
        let re = Regex::new(pattern).map_err(|source| ParameterError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        regexes.push(re);
    }

    let masked = mask_literal_matches(statement, &regexes);

    // Distinct parameter texts, first-seen order; occurrences that survive
    // only inside literals were masked away and never become parameters.
    let mut parameters: Vec<String> = Vec::new();
    for re in &regexes {
        for m in re.find_iter(&masked) {
            if !parameters.iter().any(|p| p == m.as_str()) {
                parameters.push(m.as_str().to_string());
            }
        }
    }

    let output = rewrite_parameters(statement, &parameters)?;
    Ok((output, parameters.len()))
}

fn sanitize_keyword(
    statement: &str,
    keywords: &[String],
    patterns: &[String],
) -> Result<(String, usize), ParameterError> {
    // Expand each keyword across the family, keyword order first so the
    // positional numbering follows the resolved set.
    let mut concrete: Vec<String> = Vec::new();
    for keyword in keywords {
        if keyword.is_empty() {
            continue;
        }
        for pattern in patterns {
            let text = pattern.replace("{keyword}", keyword);
            if !concrete.iter().any(|c| c == &text) {
                concrete.push(text);
            }
        }
    }

    let mut detection = Vec::new();
    for pattern in patterns {
        detection.push(compile_template(pattern, KEYWORD_CLASS)?);
    }
    let masked = mask_literal_matches(statement, &detection);

    // Prune parameters that only ever appeared inside literals.
    let surviving: Vec<String> = concrete
        .into_iter()
        .filter(|text| masked.contains(text.as_str()))
        .collect();

    let output = rewrite_parameters(statement, &surviving)?;
    Ok((output, surviving.len()))
}

/// Replace pattern matches that lie inside single-quoted literals with
/// underscores of equal length, leaving everything else untouched.
fn mask_literal_matches(statement: &str, patterns: &[Regex]) -> String {
    let spans = literal_spans(statement);
    if spans.is_empty() {
        return statement.to_string();
    }

    let mut masked = statement.as_bytes().to_vec();
    for re in patterns {
        for m in re.find_iter(statement) {
            if spans.iter().any(|s| s.start <= m.start() && m.end() <= s.end) {
                masked[m.start()..m.end()].fill(b'_');
            }
        }
    }
    String::from_utf8(masked).unwrap_or_else(|_| statement.to_string())
}

/// Byte ranges of single-quoted literal content. Quote balance is tracked
/// per line: an unterminated quote closes at end of line, so a multi-line
/// literal is only recognized up to its first line break.
fn literal_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut line_start = 0;
    for line in text.split_inclusive('\n') {
        let content_len = line.trim_end_matches('\n').len();
        let mut open: Option<usize> = None;
        for (i, b) in line.as_bytes().iter().enumerate().take(content_len) {
            if *b == b'\'' {
                match open.take() {
                    None => open = Some(line_start + i + 1),
                    Some(start) => spans.push(start..line_start + i),
                }
            }
        }
        if let Some(start) = open {
            spans.push(start..line_start + content_len);
        }
        line_start += line.len();
    }
    spans
}

/// Rewrite every occurrence of each parameter (exact text, outside string
/// literals) into `$<index+1>` in a single pass, so replacement markers are
/// never re-matched by later parameters.
fn rewrite_parameters(statement: &str, parameters: &[String]) -> Result<String, ParameterError> {
    if parameters.is_empty() {
        return Ok(statement.to_string());
    }

    let spans = literal_spans(statement);
    let mut edits: Vec<(usize, usize, usize)> = Vec::new();
    for (index, parameter) in parameters.iter().enumerate() {
        let re = Regex::new(&regex::escape(parameter)).map_err(|source| {
            ParameterError::InvalidPattern {
                pattern: parameter.clone(),
                source,
            }
        })?;
        for m in re.find_iter(statement) {
            if spans.iter().any(|s| s.start <= m.start() && m.end() <= s.end) {
                continue;
            }
            edits.push((m.start(), m.end(), index));
        }
    }

    // Earliest start wins; on a shared start the longest match wins, so a
    // parameter that is a prefix of another never splits it.
    edits.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut output = String::with_capacity(statement.len());
    let mut cursor = 0;
    for (start, end, index) in edits {
        if start < cursor {
            continue;
        }
        output.push_str(&statement[cursor..start]);
        output.push_str(&format!("${}", index + 1));
        cursor = end;
    }
    output.push_str(&statement[cursor..]);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::resolve_parameter_info;
    use crate::settings::{PatternList, Settings};

    fn default_info(patterns: &[&str]) -> QueryParameterInfo {
        QueryParameterInfo::Default {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_keyword_scenario_rewrites_in_list_order() {
        let info = QueryParameterInfo::Keyword {
            keywords: vec!["user_id".to_string(), "name".to_string()],
            patterns: vec!["{keyword}_val".to_string()],
        };
        let (sanitized, count) =
            sanitize_statement("SELECT user_id_val, name_val", Some(&info)).unwrap();
        assert_eq!(sanitized, "SELECT $1, $2");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_repeated_parameter_keeps_one_index() {
        let info = QueryParameterInfo::Keyword {
            keywords: vec!["id".to_string()],
            patterns: vec![":{keyword}".to_string()],
        };
        let (sanitized, count) =
            sanitize_statement("SELECT :id WHERE a = :id OR b = :id", Some(&info)).unwrap();
        assert_eq!(sanitized, "SELECT $1 WHERE a = $1 OR b = $1");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_literal_occurrence_is_masked_and_statement_unchanged() {
        let statement = "SELECT * FROM users WHERE email = '$1-like-text'";
        let (sanitized, count) =
            sanitize_statement(statement, Some(&default_info(&[r"\$[1-9][0-9]*"]))).unwrap();
        assert_eq!(sanitized, statement);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_literal_occurrence_is_pruned_but_real_one_survives() {
        let info = QueryParameterInfo::Keyword {
            keywords: vec!["id".to_string(), "note".to_string()],
            patterns: vec![":{keyword}".to_string()],
        };
        let statement = "SELECT :id FROM t WHERE note = ':note'";
        let (sanitized, count) = sanitize_statement(statement, Some(&info)).unwrap();
        assert_eq!(sanitized, "SELECT $1 FROM t WHERE note = ':note'");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_markers_are_one_based_and_contiguous() {
        let info = default_info(&[r":[a-z_]+"]);
        let (sanitized, count) =
            sanitize_statement("SELECT :a, :b, :c, :a", Some(&info)).unwrap();
        assert_eq!(sanitized, "SELECT $1, $2, $3, $1");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_out_of_order_positional_tokens_do_not_cascade() {
        let (sanitized, count) =
            sanitize_statement("SELECT $2, $1", Some(&default_info(&[r"\$[1-9][0-9]*"])))
                .unwrap();
        assert_eq!(sanitized, "SELECT $1, $2");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_prefix_parameter_does_not_split_longer_one() {
        let info = default_info(&[r":[a-z_]+"]);
        let (sanitized, count) =
            sanitize_statement("SELECT :id, :id_extra", Some(&info)).unwrap();
        assert_eq!(sanitized, "SELECT $1, $2");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_positional_convention_is_untouched() {
        let info = QueryParameterInfo::Positional { parameter_count: 3 };
        let (sanitized, count) = sanitize_statement("SELECT $1, $3", Some(&info)).unwrap();
        assert_eq!(sanitized, "SELECT $1, $3");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_unresolved_convention_is_untouched() {
        let (sanitized, count) = sanitize_statement("SELECT 1", None).unwrap();
        assert_eq!(sanitized, "SELECT 1");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_sanitization_is_idempotent_on_sanitized_output() {
        let settings = Settings {
            query_parameter_pattern: Some(PatternList::One(r"\$[1-9][0-9]*".to_string())),
            ..Settings::default()
        };
        let statement = "SELECT $1, $2 WHERE a = $1";
        let first_line = statement.lines().next().unwrap();
        let info = resolve_parameter_info(statement, first_line, &settings).unwrap();
        let (sanitized, count) = sanitize_statement(statement, info.as_ref()).unwrap();
        assert_eq!(sanitized, statement);
        assert_eq!(count, 2);

        let info = resolve_parameter_info(&sanitized, first_line, &settings).unwrap();
        let (again, count_again) = sanitize_statement(&sanitized, info.as_ref()).unwrap();
        assert_eq!(again, sanitized);
        assert_eq!(count_again, count);
    }

    #[test]
    fn test_masking_never_increases_parameter_count() {
        let info = QueryParameterInfo::Keyword {
            keywords: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            patterns: vec![":{keyword}".to_string()],
        };
        // three resolved keywords, one only in a literal, one absent
        let (_, count) = sanitize_statement("SELECT :a WHERE x = ':b'", Some(&info)).unwrap();
        assert!(count <= 3);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_escaped_quote_inside_literal() {
        let statement = "SELECT :id WHERE s = 'it''s :id'";
        let info = QueryParameterInfo::Keyword {
            keywords: vec!["id".to_string()],
            patterns: vec![":{keyword}".to_string()],
        };
        let (sanitized, count) = sanitize_statement(statement, Some(&info)).unwrap();
        assert_eq!(sanitized, "SELECT $1 WHERE s = 'it''s :id'");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_literal_spans_reset_per_line() {
        let spans = literal_spans("a = 'x'\nb = 'y'");
        assert_eq!(spans.len(), 2);
        // unterminated quote runs to end of line only
        let spans = literal_spans("a = 'x\nb");
        assert_eq!(spans, vec![5..6]);
    }
}
