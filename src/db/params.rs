//! Parameter binding utilities for database queries.
//!
//! Bound values are resolved in two steps: [`resolve`] applies the type-hint
//! policy and rewrites `:name` placeholders to the backend's positional syntax,
//! then the `bind_*_param` functions attach each value to a sqlx query.

use crate::error::{DbError, DbResult};
use crate::models::{BoundValues, DatabaseType, ParamValue, Placeholder};
use indexmap::IndexMap;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, Postgres, Sqlite};

/// A statement ready for the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStatement {
    /// SQL with named placeholders rewritten.
    pub sql: String,
    /// Arguments in bind order.
    pub args: Vec<ParamValue>,
    /// Values as they are recorded in the query log, keyed as the caller bound them.
    pub logged: IndexMap<Placeholder, ParamValue>,
}

/// Resolve bound values against a statement for the given backend.
///
/// Positional values bind in position order and leave the SQL untouched. Their
/// positions must run from 1 without gaps.
/// Named values rewrite every `:name` occurrence; a name used twice binds twice.
pub fn resolve(sql: &str, values: &BoundValues, db: DatabaseType) -> DbResult<ResolvedStatement> {
    if values.has_named() && values.has_positional() {
        return Err(DbError::invalid_input(
            "Cannot mix named and positional parameters in one statement",
        ));
    }

    let logged: IndexMap<Placeholder, ParamValue> = values
        .iter()
        .map(|(placeholder, value)| (placeholder.clone(), value.resolve()))
        .collect();

    if !values.has_named() {
        let mut positional: Vec<(usize, ParamValue)> = logged
            .iter()
            .filter_map(|(placeholder, value)| match placeholder {
                Placeholder::Position(n) => Some((*n, value.clone())),
                Placeholder::Name(_) => None,
            })
            .collect();
        positional.sort_by_key(|(n, _)| *n);
        if let Some((expected, (n, _))) = positional
            .iter()
            .enumerate()
            .map(|(idx, entry)| (idx + 1, entry))
            .find(|(expected, (n, _))| n != expected)
        {
            return Err(DbError::invalid_input(format!(
                "Positional values must be numbered 1..={} without gaps, found {} where {} was expected",
                positional.len(),
                n,
                expected
            )));
        }

        return Ok(ResolvedStatement {
            sql: sql.to_string(),
            args: positional.into_iter().map(|(_, v)| v).collect(),
            logged,
        });
    }

    let mut args = Vec::new();
    let sql = rewrite_named(sql, db, |name| {
        let value = logged
            .get(&Placeholder::Name(name.to_string()))
            .ok_or_else(|| DbError::invalid_input(format!("No value bound for :{}", name)))?;
        args.push(value.clone());
        Ok(args.len())
    })?;

    Ok(ResolvedStatement { sql, args, logged })
}

/// Rewrite `:name` placeholders outside literals, identifiers and comments.
///
/// `on_name` receives each name and returns the 1-based argument index it was
/// bound to.
fn rewrite_named(
    sql: &str,
    db: DatabaseType,
    mut on_name: impl FnMut(&str) -> DbResult<usize>,
) -> DbResult<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                let escapes = c == '\'' && backslash_escapes(&chars, i, db);
                let end = find_closing(&chars, i + 1, c, escapes);
                out.extend(&chars[i..end]);
                i = end;
            }
            '$' if db == DatabaseType::PostgreSQL => match dollar_tag(&chars, i) {
                Some(tag_len) => {
                    let end = find_dollar_end(&chars, i, tag_len);
                    out.extend(&chars[i..end]);
                    i = end;
                }
                None => {
                    out.push(c);
                    i += 1;
                }
            },
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == '\n')
                    .map_or(chars.len(), |p| i + p);
                out.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = find_block_comment_end(&chars, i + 2);
                out.extend(&chars[i..end]);
                i = end;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                out.push_str("::");
                i += 2;
            }
            ':' if chars.get(i + 1).is_some_and(|ch| is_name_start(*ch)) => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_name_char(chars[end]) {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let index = on_name(&name)?;
                if db.numbered_placeholders() {
                    out.push('$');
                    out.push_str(&index.to_string());
                } else {
                    out.push('?');
                }
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok(out)
}

/// Index just past the closing quote; doubled quotes stay inside the literal.
fn find_closing(chars: &[char], from: usize, quote: char, escapes: bool) -> usize {
    let mut i = from;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        if escapes && chars[i] == '\\' {
            i += 2;
            continue;
        }
        i += 1;
    }
    chars.len()
}

/// Whether a backslash escapes inside the string literal opened at `quote_at`.
///
/// MySQL always honors it. PostgreSQL only inside `E'...'` strings.
fn backslash_escapes(chars: &[char], quote_at: usize, db: DatabaseType) -> bool {
    match db {
        DatabaseType::MySQL => true,
        DatabaseType::PostgreSQL => {
            let prefix = quote_at.checked_sub(1).map(|p| chars[p]);
            let before = quote_at.checked_sub(2).map(|p| chars[p]);
            matches!(prefix, Some('E' | 'e')) && !before.is_some_and(is_name_char)
        }
        DatabaseType::SQLite => false,
    }
}

/// Length of the `$tag$` opener at `start`, if there is one.
fn dollar_tag(chars: &[char], start: usize) -> Option<usize> {
    if start > 0 && is_name_char(chars[start - 1]) {
        return None;
    }
    let mut i = start + 1;
    while i < chars.len() && chars[i] != '$' {
        if !is_name_char(chars[i]) || (i == start + 1 && chars[i].is_ascii_digit()) {
            return None;
        }
        i += 1;
    }
    (i < chars.len()).then(|| i - start + 1)
}

/// Index just past the `$tag$` that closes the body opened at `start`.
fn find_dollar_end(chars: &[char], start: usize, tag_len: usize) -> usize {
    let tag = &chars[start..start + tag_len];
    let mut i = start + tag_len;
    while i + tag_len <= chars.len() {
        if &chars[i..i + tag_len] == tag {
            return i + tag_len;
        }
        i += 1;
    }
    chars.len()
}

fn find_block_comment_end(chars: &[char], from: usize) -> usize {
    let mut i = from;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q ParamValue,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        ParamValue::Null => query.bind(None::<String>),
        ParamValue::Bool(v) => query.bind(*v),
        ParamValue::Int(v) => query.bind(*v),
        ParamValue::Float(v) => query.bind(*v),
        ParamValue::String(v) => query.bind(v.as_str()),
        ParamValue::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q ParamValue,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        ParamValue::Null => query.bind(None::<String>),
        ParamValue::Bool(v) => query.bind(*v),
        ParamValue::Int(v) => query.bind(*v),
        ParamValue::Float(v) => query.bind(*v),
        ParamValue::String(v) => query.bind(v.as_str()),
        ParamValue::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q ParamValue,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        ParamValue::Null => query.bind(None::<String>),
        ParamValue::Bool(v) => query.bind(*v),
        ParamValue::Int(v) => query.bind(*v),
        ParamValue::Float(v) => query.bind(*v),
        ParamValue::String(v) => query.bind(v.as_str()),
        ParamValue::Bytes(v) => query.bind(v.as_slice()),
    }
}
