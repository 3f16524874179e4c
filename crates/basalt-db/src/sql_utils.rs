//! SQL text helpers: statement splitting and positional placeholders.
//!
//! Both walk the sqlparser token stream so that `;` and `?` inside string
//! literals, quoted identifiers and comments are left alone.

use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, TokenWithSpan, Tokenizer};

/// Byte offset of the start of each 1-based line.
fn build_line_starts(sql: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Convert a 1-based `(line, column)` to a byte offset in `sql`.
///
/// Columns count characters, not bytes.
fn location_to_byte_offset(sql: &str, line_starts: &[usize], line: u64, column: u64) -> usize {
    let line_idx = usize::try_from(line).unwrap_or(1).saturating_sub(1);
    let line_start = line_starts.get(line_idx).copied().unwrap_or(0);
    let col_chars = usize::try_from(column).unwrap_or(1).saturating_sub(1);
    sql[line_start..]
        .char_indices()
        .nth(col_chars)
        .map_or(sql.len(), |(byte_off, _)| line_start + byte_off)
}

fn tokenize(sql: &str) -> Option<Vec<TokenWithSpan>> {
    Tokenizer::new(&GenericDialect {}, sql)
        .tokenize_with_location()
        .ok()
}

/// Split a SQL string into statements on unquoted semicolons.
///
/// Empty statements (whitespace or comments only) are skipped. If the text
/// does not tokenize, it is returned whole so the engine reports the error.
pub(crate) fn split_statements(sql: &str) -> Vec<&str> {
    let Some(tokens) = tokenize(sql) else {
        let trimmed = sql.trim();
        return if trimmed.is_empty() { Vec::new() } else { vec![trimmed] };
    };

    let line_starts = build_line_starts(sql);
    let mut statements = Vec::new();
    let mut seg_start = 0;
    let mut has_significant = false;

    for tws in &tokens {
        match tws.token {
            Token::SemiColon => {
                if has_significant {
                    let end = location_to_byte_offset(
                        sql,
                        &line_starts,
                        tws.span.start.line,
                        tws.span.start.column,
                    );
                    statements.push(sql[seg_start..end].trim());
                }
                seg_start =
                    location_to_byte_offset(sql, &line_starts, tws.span.end.line, tws.span.end.column);
                has_significant = false;
            }
            Token::Whitespace(_) | Token::EOF => {}
            _ => has_significant = true,
        }
    }

    if has_significant {
        statements.push(sql[seg_start..].trim());
    }
    statements.retain(|s| !s.is_empty());
    statements
}

/// A statement with every placeholder in `$n` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placeholders {
    /// Rewritten SQL.
    pub sql: String,
    /// Highest placeholder index; the statement's parameter count.
    pub count: usize,
}

/// Rewrite `?` placeholders to `$1..$n` and count parameters.
///
/// Anonymous `?` markers are numbered left to right. `?n` is treated as
/// `$n`, and existing `$n` markers pass through unchanged.
pub(crate) fn number_placeholders(sql: &str) -> Placeholders {
    let Some(tokens) = tokenize(sql) else {
        return Placeholders {
            sql: sql.to_string(),
            count: 0,
        };
    };

    let line_starts = build_line_starts(sql);
    let mut out = String::with_capacity(sql.len() + 8);
    let mut copied_to = 0;
    let mut anonymous = 0;
    let mut count = 0;

    for tws in &tokens {
        let Token::Placeholder(marker) = &tws.token else {
            continue;
        };
        let index = if marker == "?" {
            anonymous += 1;
            anonymous
        } else if let Some(n) = marker
            .strip_prefix(['?', '$'])
            .and_then(|digits| digits.parse::<usize>().ok())
        {
            n
        } else {
            // Named placeholders such as `$name` are left to the engine.
            continue;
        };
        count = count.max(index);

        let start =
            location_to_byte_offset(sql, &line_starts, tws.span.start.line, tws.span.start.column);
        let end = location_to_byte_offset(sql, &line_starts, tws.span.end.line, tws.span.end.column);
        out.push_str(&sql[copied_to..start]);
        out.push('$');
        out.push_str(&index.to_string());
        copied_to = end;
    }
    out.push_str(&sql[copied_to..]);

    Placeholders { sql: out, count }
}
