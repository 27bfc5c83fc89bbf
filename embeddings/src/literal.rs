//! Foreign list literal parsing.
//!
//! Embedding exports arrive as the `repr` of Python containers: strings may be
//! single- or double-quoted and the constants are spelled `None`, `True` and
//! `False`. [`normalize_literal`] rewrites such text into standard JSON so
//! that it can be handed to `serde_json`.

use std::iter::Peekable;
use std::str::CharIndices;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Embedding;
use crate::error::{EmbeddingError, ParseLocation, Result};

/// Rewrite a foreign list literal into JSON text.
///
/// Quotes and keywords that appear inside string literals are left alone.
/// Any bare identifier other than `None`, `True` or `False` is rejected.
pub fn normalize_literal(input: &str) -> Result<String> {
    Ok(normalize(input)?.json)
}

/// JSON text plus, for every token written, its start in the output and in
/// the input. Offsets are ascending in both.
struct Normalized {
    json: String,
    spans: Vec<(usize, usize)>,
}

impl Normalized {
    /// Map a byte offset in the JSON text back to the input token it came from.
    fn input_offset(&self, json_offset: usize, input_len: usize) -> usize {
        if json_offset >= self.json.len() {
            return input_len;
        }
        let i = self.spans.partition_point(|&(out, _)| out <= json_offset);
        i.checked_sub(1).map_or(0, |i| self.spans[i].1)
    }
}

fn normalize(input: &str) -> Result<Normalized> {
    let mut out = String::with_capacity(input.len());
    let mut spans = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        spans.push((out.len(), offset));
        match c {
            '\'' | '"' => {
                let value = read_string(&mut chars, offset, c)?;
                out.push_str(&serde_json::to_string(&value)?);
            }
            c if c.is_ascii_digit() => {
                out.push(c);
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_ascii_digit() || matches!(next, '.' | 'e' | 'E' | '+' | '-') {
                        out.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        ident.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match ident.as_str() {
                    "None" => out.push_str("null"),
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    other => {
                        return Err(EmbeddingError::parse(
                            offset,
                            format!("unexpected identifier `{other}`"),
                        ));
                    }
                }
            }
            _ => out.push(c),
        }
    }

    Ok(Normalized { json: out, spans })
}

/// Normalize a foreign literal and deserialize it into `T`.
///
/// Syntax errors are reported at the byte offset of the offending token in
/// `input`, not in the rewritten JSON.
pub fn parse_literal_as<T: DeserializeOwned>(input: &str) -> Result<T> {
    let normalized = normalize(input)?;
    serde_json::from_str(&normalized.json).map_err(|e| {
        let json_offset = line_start(&normalized.json, e.line()) + e.column().saturating_sub(1);
        EmbeddingError::parse(
            normalized.input_offset(json_offset, input.len()),
            format!("invalid literal: {e}"),
        )
    })
}

/// Normalize a foreign literal and parse it into a JSON value.
pub fn parse_literal(input: &str) -> Result<Value> {
    parse_literal_as(input)
}

/// Byte offset at which 1-based `line` starts.
fn line_start(text: &str, line: usize) -> usize {
    if line <= 1 {
        return 0;
    }
    text.match_indices('\n')
        .nth(line - 2)
        .map_or(text.len(), |(i, _)| i + 1)
}

/// Parse a serialized embedding such as `"[0.1, -0.2, 0.3]"`.
pub fn parse_embedding(input: &str) -> Result<Embedding> {
    let value = parse_literal(input)?;
    embedding_from_value(&value)
}

/// Convert a parsed value into an embedding.
///
/// Exports store the vector either as a numeric array or as a nested literal
/// string, so both shapes are accepted.
pub fn embedding_from_value(value: &Value) -> Result<Embedding> {
    match value {
        Value::String(s) => parse_embedding(s),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_f64().map(|x| x as f32).ok_or_else(|| {
                    EmbeddingError::parse_at(
                        ParseLocation::Element(i),
                        format!("not a number: {item}"),
                    )
                })
            })
            .collect(),
        other => Err(EmbeddingError::parse(
            0,
            format!("expected an embedding array, got {other}"),
        )),
    }
}

fn read_string(chars: &mut Peekable<CharIndices<'_>>, start: usize, quote: char) -> Result<String> {
    let mut value = String::new();

    while let Some((offset, c)) = chars.next() {
        match c {
            c if c == quote => return Ok(value),
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    '\\' | '\'' | '"' => value.push(escaped),
                    'x' => value.push(read_code_point(chars, offset, 2)?),
                    'u' => value.push(read_code_point(chars, offset, 4)?),
                    'U' => value.push(read_code_point(chars, offset, 8)?),
                    // Unknown escapes are kept verbatim.
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
            }
            _ => value.push(c),
        }
    }

    Err(EmbeddingError::parse(start, "unterminated string literal"))
}

fn read_code_point(
    chars: &mut Peekable<CharIndices<'_>>,
    offset: usize,
    digits: usize,
) -> Result<char> {
    let hex: String = chars.by_ref().take(digits).map(|(_, c)| c).collect();
    if hex.len() != digits {
        return Err(EmbeddingError::parse(offset, "truncated escape sequence"));
    }
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| EmbeddingError::parse(offset, format!("invalid escape `{hex}`")))
}
