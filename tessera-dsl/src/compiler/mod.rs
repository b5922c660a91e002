//! DSL Compiler - Normalize a schema source into the canonical model
//!
//! # Pipeline
//!
//! ```text
//! SchemaSource → mixin expansion → per-column Lexer → Column → CanonicalSchema
//!                                                         ↓
//!                                             index validation (semantic)
//! ```
//!
//! Column parsing is permissive: tokens the compiler does not recognize are
//! skipped. Structural mistakes (unknown mixin, index on a missing column) are
//! hard errors.

use crate::lexer::{Lexer, Token, TokenKind};
use crate::source::{ColumnMap, ColumnSpec, SchemaSource};
use indexmap::IndexMap;
use std::collections::HashSet;
use tessera_core::{
    CanonicalSchema, Column, ColumnMode, ColumnType, DefaultValue, Index, OnDelete, Reference,
    Table, ValidationError,
};

/// Prefix marking a mixin spread key, e.g. `...timestamps`.
pub const MIXIN_PREFIX: &str = "...";

pub type CompileResult<T> = Result<T, ValidationError>;

static EOF: TokenKind = TokenKind::Eof;

// ============================================================================
// ENTRY POINT
// ============================================================================

/// Compile a schema source into a canonical schema.
pub fn compile(source: &SchemaSource, name: &str, version: u32) -> CompileResult<CanonicalSchema> {
    let mut tables = Vec::with_capacity(source.tables.len());

    for (table_name, columns) in &source.tables {
        let expanded = expand_table(source, table_name, columns)?;
        let columns = expanded
            .into_iter()
            .filter_map(|(column_name, spec)| match spec {
                ColumnSpec::Flag(false) => None,
                ColumnSpec::Flag(true) => Some(Column::new(column_name, ColumnType::Text)),
                ColumnSpec::Definition(definition) => Some(parse_column(&column_name, &definition)),
            })
            .collect();
        tables.push(Table::new(table_name.clone(), columns));
    }

    for (table_name, indexes) in &source.indexes {
        let table = tables
            .iter_mut()
            .find(|t| &t.name == table_name)
            .ok_or_else(|| ValidationError::UnknownTable {
                index: indexes.keys().next().cloned().unwrap_or_default(),
                table: table_name.clone(),
            })?;
        for (index_name, definition) in indexes {
            let index = parse_index(index_name, definition);
            if let Some(missing) = index.columns.iter().find(|c| !table.has_column(c)) {
                return Err(ValidationError::UnknownColumn {
                    index: index_name.clone(),
                    table: table_name.clone(),
                    column: missing.clone(),
                });
            }
            table.indexes.push(index);
        }
    }

    Ok(CanonicalSchema::new(name, version, tables))
}

// ============================================================================
// MIXIN EXPANSION
// ============================================================================

/// Expand `...mixin` keys in place.
///
/// Columns take the position of their first occurrence. The table's own
/// definitions are applied after expansion, so they always replace a mixin
/// column of the same name.
fn expand_table(
    source: &SchemaSource,
    table_name: &str,
    columns: &ColumnMap,
) -> CompileResult<IndexMap<String, ColumnSpec>> {
    let mut expanded = IndexMap::with_capacity(columns.len());
    let mut visiting = HashSet::new();
    spread(source, table_name, columns, &mut expanded, &mut visiting)?;

    for (key, spec) in columns {
        if !key.starts_with(MIXIN_PREFIX) {
            expanded.insert(key.clone(), spec.clone());
        }
    }

    Ok(expanded)
}

fn spread(
    source: &SchemaSource,
    table_name: &str,
    columns: &ColumnMap,
    out: &mut IndexMap<String, ColumnSpec>,
    visiting: &mut HashSet<String>,
) -> CompileResult<()> {
    for (key, spec) in columns {
        let Some(mixin_name) = key.strip_prefix(MIXIN_PREFIX) else {
            out.insert(key.clone(), spec.clone());
            continue;
        };

        // `"...base": false` opts out of a spread without deleting the key.
        if *spec == ColumnSpec::Flag(false) {
            continue;
        }

        let mixin = source
            .mixins
            .get(mixin_name)
            .ok_or_else(|| ValidationError::UnknownMixin {
                table: table_name.to_string(),
                mixin: mixin_name.to_string(),
            })?;

        if !visiting.insert(mixin_name.to_string()) {
            return Err(ValidationError::Source {
                reason: format!("mixin '{}' includes itself", mixin_name),
            });
        }
        spread(source, table_name, mixin, out, visiting)?;
        visiting.remove(mixin_name);
    }
    Ok(())
}

// ============================================================================
// COLUMN DEFINITIONS
// ============================================================================

/// Base kind as written, before mapping to storage type and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseKind {
    Text,
    Integer,
    Real,
    Blob,
    Json,
    Boolean,
    TimestampMs,
}

impl BaseKind {
    fn from_word(word: &str) -> Option<Self> {
        match word {
            "text" => Some(BaseKind::Text),
            "integer" | "int" => Some(BaseKind::Integer),
            "real" => Some(BaseKind::Real),
            "blob" => Some(BaseKind::Blob),
            "json" => Some(BaseKind::Json),
            "boolean" | "bool" => Some(BaseKind::Boolean),
            "timestamp_ms" => Some(BaseKind::TimestampMs),
            _ => None,
        }
    }

    fn storage(self) -> (ColumnType, Option<ColumnMode>) {
        match self {
            BaseKind::Text => (ColumnType::Text, None),
            BaseKind::Integer => (ColumnType::Integer, None),
            BaseKind::Real => (ColumnType::Real, None),
            BaseKind::Blob => (ColumnType::Blob, None),
            BaseKind::Json => (ColumnType::Json, None),
            BaseKind::Boolean => (ColumnType::Integer, Some(ColumnMode::Boolean)),
            BaseKind::TimestampMs => (ColumnType::Integer, Some(ColumnMode::TimestampMs)),
        }
    }
}

/// Parse one compact column definition.
///
/// Never fails: unrecognized tokens are skipped and a missing type means
/// `text`.
pub fn parse_column(name: &str, definition: &str) -> Column {
    ColumnParser::new(definition).parse(name)
}

struct ColumnParser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> ColumnParser<'a> {
    fn new(definition: &'a str) -> Self {
        Self {
            source: definition,
            tokens: Lexer::new(definition).tokenize(),
            pos: 0,
        }
    }

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&EOF)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&EOF)
    }

    fn bump(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn parse(mut self, name: &str) -> Column {
        let mut kind: Option<BaseKind> = None;
        let mut column = Column::new(name, ColumnType::Text);

        loop {
            match self.peek().clone() {
                TokenKind::Eof => break,
                TokenKind::Arrow => {
                    self.bump();
                    if let Some(reference) = self.parse_reference() {
                        column.references = Some(reference);
                    }
                }
                TokenKind::Word(word) => {
                    let word = word.to_ascii_lowercase();
                    self.bump();
                    match word.as_str() {
                        "primary" if self.peek().is_word("key") => {
                            self.bump();
                            column.primary_key = true;
                        }
                        "not" if self.peek().is_word("null") => {
                            self.bump();
                            column.not_null = true;
                        }
                        "unique" => column.unique = true,
                        "enum" if *self.peek() == TokenKind::LParen => {
                            column.enum_values = Some(self.parse_enum());
                        }
                        "default" => {
                            if let Some(value) = self.parse_default() {
                                column.default = Some(value);
                            }
                        }
                        other if kind.is_none() => kind = BaseKind::from_word(other),
                        _ => {}
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }

        let (column_type, mode) = kind.unwrap_or(BaseKind::Text).storage();
        column.column_type = column_type;
        column.mode = mode;
        column
    }

    /// `( a, 'b c', 3 )` -> `["a", "b c", "3"]`
    fn parse_enum(&mut self) -> Vec<String> {
        self.bump(); // (
        let mut values = Vec::new();
        loop {
            match self.bump() {
                TokenKind::RParen | TokenKind::Eof => break,
                TokenKind::Word(v) | TokenKind::Str(v) | TokenKind::Number(v) => values.push(v),
                _ => {}
            }
        }
        values
    }

    fn parse_default(&mut self) -> Option<DefaultValue> {
        match self.peek().clone() {
            TokenKind::Word(word) => {
                let value = match word.to_ascii_lowercase().as_str() {
                    "now" => DefaultValue::Now,
                    "null" => DefaultValue::Null,
                    "true" => DefaultValue::Integer(1),
                    "false" => DefaultValue::Integer(0),
                    _ => return None,
                };
                self.bump();
                Some(value)
            }
            TokenKind::Number(text) => {
                self.bump();
                match text.parse::<i64>() {
                    Ok(n) => Some(DefaultValue::Integer(n)),
                    Err(_) => text.parse::<f64>().ok().map(DefaultValue::Real),
                }
            }
            TokenKind::Str(text) => {
                self.bump();
                Some(DefaultValue::Text(text))
            }
            TokenKind::LParen => self.parse_raw_sql(),
            _ => None,
        }
    }

    /// Balanced `( ... )` taken verbatim from the source.
    fn parse_raw_sql(&mut self) -> Option<DefaultValue> {
        let open = self.tokens.get(self.pos)?.span;
        self.bump();
        let mut depth = 1usize;
        loop {
            let token = self.tokens.get(self.pos)?.clone();
            self.bump();
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        let sql = self.source[open.end..token.span.start].trim();
                        return Some(DefaultValue::Sql(sql.to_string()));
                    }
                }
                TokenKind::Eof => return None,
                _ => {}
            }
        }
    }

    /// `table.column [action]` after an arrow.
    fn parse_reference(&mut self) -> Option<Reference> {
        let (TokenKind::Word(table), TokenKind::Dot, TokenKind::Word(column)) = (
            self.peek().clone(),
            self.peek_at(1).clone(),
            self.peek_at(2).clone(),
        ) else {
            return None;
        };
        self.pos += 3;

        let on_delete = match self.peek() {
            TokenKind::Word(action) => OnDelete::parse(action),
            _ => None,
        };
        if on_delete.is_some() {
            self.bump();
        }

        Some(Reference {
            table,
            column,
            on_delete,
        })
    }
}

// ============================================================================
// INDEXES
// ============================================================================

/// Parse `"a, b"` or `"unique(a, b)"`.
pub fn parse_index(name: &str, definition: &str) -> Index {
    let trimmed = definition.trim();
    let lower = trimmed.to_ascii_lowercase();

    let (unique, body) = match lower.strip_prefix("unique") {
        Some(rest) if rest.trim_start().starts_with('(') => {
            let start = trimmed.find('(').map(|i| i + 1).unwrap_or(trimmed.len());
            let end = trimmed.rfind(')').unwrap_or(trimmed.len()).max(start);
            (true, &trimmed[start..end])
        }
        _ => (false, trimmed),
    };

    Index {
        name: name.to_string(),
        columns: body
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect(),
        unique,
    }
}
