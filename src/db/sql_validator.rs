//! Statement splitting and read/write classification.
//!
//! Generated SQL is split with the [sqlparser](https://docs.rs/sqlparser/)
//! tokenizer rather than the full parser: vendor syntax the parser does not
//! know still runs, while `;` inside strings, quoted identifiers and comments
//! never splits a statement.

use crate::error::{NlqError, NlqResult};
use crate::models::StoreKind;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer};

/// Leading keywords of statements that return a result set.
pub const READ_PREFIXES: &[&str] = &["select", "show", "describe", "desc", "explain", "with"];

/// Whether a statement returns rows or changes data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

/// Get the tokenizer dialect for the given store.
fn get_dialect(store: StoreKind) -> Box<dyn Dialect> {
    match store {
        StoreKind::Postgres => Box::new(PostgreSqlDialect {}),
        StoreKind::SQLite => Box::new(SQLiteDialect {}),
        StoreKind::MySql | StoreKind::MongoDb => Box::new(MySqlDialect {}),
    }
}

/// Split `sql` into its non-empty statements, without trailing `;`.
///
/// Each statement is sliced from the original text, so literals and
/// comments reach the store exactly as written.
///
/// Fails with `InvalidQuerySyntax` when the text cannot be tokenized or
/// holds no statement at all.
pub fn split_statements(sql: &str, store: StoreKind) -> NlqResult<Vec<String>> {
    let tokens = tokenize(sql, store)?;
    let lines = LineOffsets::new(sql);

    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_content = false;

    for TokenWithSpan { token, span } in &tokens {
        match token {
            Token::SemiColon => {
                if has_content {
                    let end = lines.byte_offset(span.start);
                    statements.push(sql[start..end].trim().to_string());
                }
                start = lines.byte_offset(span.end);
                has_content = false;
            }
            Token::Whitespace(_) => {}
            _ => has_content = true,
        }
    }
    if has_content {
        statements.push(sql[start..].trim().to_string());
    }

    if statements.is_empty() {
        return Err(NlqError::invalid_syntax("No SQL statement found"));
    }
    Ok(statements)
}

/// Classify a single statement by its first keyword.
///
/// Comments, whitespace and opening parentheses before the keyword are
/// skipped.
pub fn statement_kind(statement: &str, store: StoreKind) -> StatementKind {
    let Ok(tokens) = tokenize(statement, store) else {
        return StatementKind::Write;
    };

    let keyword = tokens
        .iter()
        .map(|t| &t.token)
        .find(|token| !matches!(token, Token::Whitespace(_) | Token::LParen));

    match keyword {
        Some(Token::Word(word))
            if READ_PREFIXES
                .iter()
                .any(|prefix| word.value.eq_ignore_ascii_case(prefix)) =>
        {
            StatementKind::Read
        }
        _ => StatementKind::Write,
    }
}

fn tokenize(sql: &str, store: StoreKind) -> NlqResult<Vec<TokenWithSpan>> {
    let dialect = get_dialect(store);
    Tokenizer::new(dialect.as_ref(), sql)
        .tokenize_with_location()
        .map_err(|e| NlqError::invalid_syntax(format!("Failed to tokenize SQL: {}", e)))
}

/// Maps tokenizer locations (1-based line, 1-based char column) to byte
/// offsets in the source text.
struct LineOffsets<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineOffsets<'a> {
    fn new(text: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, starts }
    }

    fn byte_offset(&self, location: Location) -> usize {
        let Some(&line_start) = self.starts.get(location.line.saturating_sub(1) as usize) else {
            return self.text.len();
        };
        let column = location.column.saturating_sub(1) as usize;
        self.text[line_start..]
            .char_indices()
            .nth(column)
            .map_or(self.text.len(), |(i, _)| line_start + i)
    }
}
