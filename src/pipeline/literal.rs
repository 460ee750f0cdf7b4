//! Permissive literal-structure parser.
//!
//! Models asked for JSON regularly answer with something that is *almost*
//! JSON: Python reprs (`{'question': 'x', 'answer_index': 1}`), bare keys,
//! unquoted option text, `True`/`None`, trailing commas, tuples. This parser
//! accepts all of those and produces a [`serde_json::Value`] so the rest of
//! the normaliser works on one representation.
//!
//! Bare words run until the next structural character (`,` `]` `}` `)`, or
//! `:` in key position) and are trimmed. A bare word that reads as a
//! number or a literal keyword becomes that value; anything else becomes a
//! string.
//!
//! Nesting is capped at [`MAX_DEPTH`], the same limit `serde_json` applies.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Deepest container nesting accepted before parsing fails.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    pub message: String,
    pub offset: usize,
}

/// Parse `text` as a permissive literal structure.
pub fn parse_literal(text: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.peek().is_some() {
        return Err(parser.error("trailing characters after value"));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> LiteralError {
        LiteralError {
            message: message.to_string(),
            offset: self.pos,
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(open @ ('{' | '[' | '(')) => {
                if self.depth == MAX_DEPTH {
                    return Err(self.error("nesting too deep"));
                }
                self.depth += 1;
                let value = match open {
                    '{' => self.object(),
                    '[' => self.sequence(']'),
                    _ => self.sequence(')'),
                };
                self.depth -= 1;
                value
            }
            Some(q @ ('"' | '\'')) => self.string(q).map(Value::String),
            Some(_) => {
                let word = self.bare(&[',', ']', '}', ')'])?;
                Ok(classify_bare(word))
            }
        }
    }

    fn sequence(&mut self, close: char) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(self.error("unterminated sequence")),
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                // Stray and trailing commas are tolerated.
                Some(',') => self.pos += 1,
                Some(_) => items.push(self.value()?),
            }
        }
    }

    fn object(&mut self) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            let key = match self.peek() {
                None => return Err(self.error("unterminated object")),
                Some('}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(',') => {
                    self.pos += 1;
                    continue;
                }
                Some(q @ ('"' | '\'')) => self.string(q)?,
                Some(_) => self.bare(&[':', ',', '}'])?,
            };
            self.skip_ws();
            if self.bump() != Some(':') {
                return Err(self.error("expected ':' after object key"));
            }
            let value = self.value()?;
            map.insert(key, value);
        }
    }

    fn string(&mut self, quote: char) -> Result<String, LiteralError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err(self.error("unterminated escape")),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('u') => out.push(self.unicode_escape()),
                    Some(other) => out.push(other),
                },
                Some(c) => out.push(c),
            }
        }
    }

    /// Reads the four hex digits after `\u`; malformed escapes are kept verbatim.
    fn unicode_escape(&mut self) -> char {
        let start = self.pos;
        let end = (start + 4).min(self.chars.len());
        let hex: String = self.chars[start..end].iter().collect();
        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
            Some(c) if hex.len() == 4 => {
                self.pos = end;
                c
            }
            _ => 'u',
        }
    }

    fn bare(&mut self, stops: &[char]) -> Result<String, LiteralError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                break;
            }
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        let word = word.trim();
        if word.is_empty() {
            return Err(LiteralError {
                message: "expected a value".into(),
                offset: start,
            });
        }
        Ok(word.to_string())
    }
}

fn classify_bare(word: String) -> Value {
    match word.as_str() {
        "true" | "True" => return Value::Bool(true),
        "false" | "False" => return Value::Bool(false),
        "null" | "None" | "NULL" => return Value::Null,
        _ => {}
    }
    if let Ok(n) = word.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Some(n) = word.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn python_repr() {
        let v = parse_literal(
            "[{'question': 'Capital of France?', 'options': ['Paris', 'Rome'], \
             'answer_index': 0, 'verified': True, 'note': None}]",
        )
        .unwrap();
        assert_eq!(
            v,
            json!([{
                "question": "Capital of France?",
                "options": ["Paris", "Rome"],
                "answer_index": 0,
                "verified": true,
                "note": null
            }])
        );
    }

    #[test]
    fn bare_keys_values_and_trailing_commas() {
        let reply = "[{question: Largest planet?, options: [Mars, Jupiter,], answer_index: 1,},]";
        let v = parse_literal(reply).unwrap();
        assert_eq!(
            v,
            json!([{
                "question": "Largest planet?",
                "options": ["Mars", "Jupiter"],
                "answer_index": 1
            }])
        );
    }

    #[test]
    fn escapes_inside_single_quotes() {
        let v = parse_literal(r"['It\'s 1\n2', 'café']").unwrap();
        assert_eq!(v, json!(["It's 1\n2", "café"]));
    }

    #[test]
    fn tuples_become_arrays() {
        assert_eq!(parse_literal("('a', 2.5)").unwrap(), json!(["a", 2.5]));
    }

    #[test]
    fn unterminated_input_fails() {
        let err = parse_literal("[{'question': 'x'").unwrap_err();
        assert!(err.message.contains("unterminated"), "got: {err}");
    }

    #[test]
    fn deep_nesting_fails_without_overflowing() {
        let deep = format!("{}{}", "[".repeat(5000), "]".repeat(5000));
        let err = parse_literal(&deep).unwrap_err();
        assert!(err.message.contains("too deep"), "got: {err}");
        assert_eq!(err.offset, MAX_DEPTH);

        let mixed = "({[".repeat(2000);
        assert!(parse_literal(&mixed).is_err());
    }

    #[test]
    fn nesting_up_to_the_limit_parses() {
        let ok = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse_literal(&ok).is_ok());
    }

    #[test]
    fn prose_is_not_a_structure() {
        // A single bare word parses, but prose with structural characters does not.
        assert!(parse_literal("I could not find any questions: sorry}").is_err());
    }
}
