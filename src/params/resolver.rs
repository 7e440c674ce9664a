//! Parameter convention resolution

use regex::Regex;

use crate::error::ParameterError;
use crate::settings::Settings;

/// Directive token recognized in the first line of a statement.
pub const KEYWORD_DIRECTIVE: &str = "plpgsql-language-server:use-keyword-query-parameters";

/// Identifier class substituted into `{keyword}` template holes when
/// scanning a statement for named placeholders.
pub const KEYWORD_CLASS: &str = "[A-Za-z_][A-Za-z0-9_]*";

/// The parameter convention resolved for one statement.
///
/// Exactly one convention applies per statement; `None` from the resolver
/// means the statement is executed without any substitution.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParameterInfo {
    /// Native `$n` placeholders, executed as-is.
    Positional { parameter_count: usize },
    /// Configured placeholder regexes, applied without a directive.
    Default { patterns: Vec<String> },
    /// Named placeholders listed in a directive or auto-detected from the
    /// configured `{keyword}` templates.
    Keyword {
        keywords: Vec<String>,
        patterns: Vec<String>,
    },
}

/// Resolve which parameter convention applies to a statement.
///
/// The first line may carry a keyword directive comment; otherwise the
/// configured default pattern family applies, and failing that the
/// statement's native `$n` placeholders are counted.
pub fn resolve_parameter_info(
    statement: &str,
    first_line: &str,
    settings: &Settings,
) -> Result<Option<QueryParameterInfo>, ParameterError> {
    if let Some(directive) = match_keyword_directive(first_line) {
        let patterns = settings.keyword_patterns();
        if patterns.is_empty() {
            return Err(ParameterError::KeywordQueryParametersNotDefined);
        }
        let keywords = match directive.keywords {
            Some(list) => parse_keyword_list(&list),
            // scan past the directive line itself: the directive token
            // would otherwise match a `:{keyword}`-style template
            None => {
                let body = statement.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
                detect_keywords(body, &patterns)?
            }
        };
        return Ok(Some(QueryParameterInfo::Keyword { keywords, patterns }));
    }

    let patterns = settings.default_patterns();
    if !patterns.is_empty() {
        return Ok(Some(QueryParameterInfo::Default { patterns }));
    }

    Ok(positional_parameter_info(statement))
}

struct KeywordDirective {
    /// Content of `keywords=[...]`, absent when the directive asks for
    /// auto-detection.
    keywords: Option<String>,
}

/// Match the directive comment in its line or block form.
fn match_keyword_directive(first_line: &str) -> Option<KeywordDirective> {
    let line_form = Regex::new(&format!(
        r"^\s*--\s*{}(?:\s+keywords=\[([^\]]*)\])?\s*$",
        regex::escape(KEYWORD_DIRECTIVE)
    ))
    .expect("directive pattern compiles");
    let block_form = Regex::new(&format!(
        r"^\s*/\*\s*{}(?:\s+keywords=\[([^\]]*)\])?\s*\*/",
        regex::escape(KEYWORD_DIRECTIVE)
    ))
    .expect("directive pattern compiles");

    for re in [&line_form, &block_form] {
        if let Some(captures) = re.captures(first_line) {
            return Some(KeywordDirective {
                keywords: captures.get(1).map(|m| m.as_str().to_string()),
            });
        }
    }
    None
}

/// Split a directive keyword list, preserving order, dropping blanks from
/// trailing commas and collapsing duplicates.
fn parse_keyword_list(list: &str) -> Vec<String> {
    let mut keywords = Vec::new();
    for token in list.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if !keywords.iter().any(|k| k == token) {
            keywords.push(token.to_string());
        }
    }
    keywords
}

/// Scan the whole statement with each template's `{keyword}` hole widened
/// to the generic identifier class, collecting distinct keyword names in
/// first-seen order.
fn detect_keywords(statement: &str, patterns: &[String]) -> Result<Vec<String>, ParameterError> {
    let mut keywords: Vec<String> = Vec::new();
    for pattern in patterns {
        let re = compile_template(pattern, &format!("({})", KEYWORD_CLASS))?;
        for captures in re.captures_iter(statement) {
            let matched = captures
                .get(1)
                .or_else(|| captures.get(0))
                .map(|m| m.as_str().to_string());
            if let Some(keyword) = matched {
                if !keywords.iter().any(|k| k == &keyword) {
                    keywords.push(keyword);
                }
            }
        }
    }
    Ok(keywords)
}

/// Build a regex from a `{keyword}` template: literal text is escaped, the
/// hole is replaced by `substitution`.
pub(crate) fn compile_template(
    template: &str,
    substitution: &str,
) -> Result<Regex, ParameterError> {
    let source = template
        .split("{keyword}")
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(substitution);
    Regex::new(&source).map_err(|source| ParameterError::InvalidPattern {
        pattern: template.to_string(),
        source,
    })
}

/// Count native positional placeholders. The null-argument list must cover
/// the highest index, so gaps widen the count.
fn positional_parameter_info(statement: &str) -> Option<QueryParameterInfo> {
    let re = Regex::new(r"\$([1-9][0-9]*)").expect("positional pattern compiles");
    let max_index = re
        .captures_iter(statement)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().parse::<usize>().ok())
        .max();
    max_index.map(|parameter_count| QueryParameterInfo::Positional { parameter_count })
}
