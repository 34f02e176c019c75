use serde_json::{Map, Number, Value};

/// Decodes the raw argument text of a tool call.
///
/// Strict JSON is tried first. Models sometimes emit literal syntax from
/// other languages instead (single-quoted strings, `True`/`None`, bare keys,
/// trailing commas, tuples), which a permissive parser accepts next. If
/// neither produces an object, the arguments are treated as empty. This
/// function never fails.
pub fn decode_arguments(raw: &str) -> Map<String, Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Map::new();
    }

    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return match value {
            Value::Object(map) => map,
            other => {
                warn!("tool arguments are not an object: {other}");
                Map::new()
            }
        };
    }

    match LiteralParser::new(raw).parse_document() {
        Some(Value::Object(map)) => {
            debug!("decoded tool arguments with the permissive parser");
            map
        }
        _ => {
            warn!("failed to decode tool arguments: {raw}");
            Map::new()
        }
    }
}

/// Converts string values to the JSON types declared by `schema`.
///
/// Tag grammar arguments arrive as text only. A string is replaced when its
/// property does not accept strings and the text parses as one of the
/// declared types. Everything else is left for the tool to reject.
pub fn coerce_arguments(arguments: &mut Map<String, Value>, schema: &Value) {
    let Some(properties) = schema.get("properties").and_then(Value::as_object)
    else {
        return;
    };
    for (key, value) in arguments.iter_mut() {
        let Value::String(text) = value else {
            continue;
        };
        let Some(types) = properties.get(key).map(declared_types) else {
            continue;
        };
        if types.contains(&"string") {
            continue;
        }
        let text = text.trim();
        if let Some(coerced) = types.iter().find_map(|ty| coerce(text, ty)) {
            trace!("coerced argument `{key}`: {coerced}");
            *value = coerced;
        }
    }
}

fn declared_types(property: &Value) -> Vec<&str> {
    match property.get("type") {
        Some(Value::String(ty)) => vec![ty.as_str()],
        Some(Value::Array(types)) => {
            types.iter().filter_map(Value::as_str).collect()
        }
        _ => vec![],
    }
}

fn coerce(text: &str, ty: &str) -> Option<Value> {
    match ty {
        "integer" => text.parse::<i64>().ok().map(Value::from),
        "number" => text.parse::<i64>().ok().map(Value::from).or_else(|| {
            let n = text.parse::<f64>().ok()?;
            Number::from_f64(n).map(Value::Number)
        }),
        "boolean" => match text.to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        "null" => matches!(text, "" | "null" | "None").then_some(Value::Null),
        "array" => match LiteralParser::new(text).parse_document()? {
            value @ Value::Array(_) => Some(value),
            _ => None,
        },
        "object" => match LiteralParser::new(text).parse_document()? {
            value @ Value::Object(_) => Some(value),
            _ => None,
        },
        _ => None,
    }
}

/// Same nesting limit as `serde_json`.
const MAX_DEPTH: usize = 128;

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl LiteralParser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn parse_document(mut self) -> Option<Value> {
        let value = self.parse_value()?;
        self.skip_ws();
        (self.pos == self.chars.len()).then_some(value)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            c @ ('{' | '[' | '(') => {
                if self.depth >= MAX_DEPTH {
                    return None;
                }
                self.depth += 1;
                let value = match c {
                    '{' => self.parse_object(),
                    '[' => self.parse_sequence(']'),
                    _ => self.parse_sequence(')'),
                };
                self.depth -= 1;
                value
            }
            '"' | '\'' => self.parse_string().map(Value::String),
            c if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => {
                self.parse_number()
            }
            c if is_ident_start(c) => match self.parse_ident().as_str() {
                "True" | "true" => Some(Value::Bool(true)),
                "False" | "false" => Some(Value::Bool(false)),
                "None" | "null" => Some(Value::Null),
                _ => None,
            },
            _ => None,
        }
    }

    fn parse_object(&mut self) -> Option<Value> {
        self.bump();
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.eat('}') {
                return Some(Value::Object(map));
            }
            let key = match self.peek()? {
                '"' | '\'' => self.parse_string()?,
                c if is_ident_start(c) => self.parse_ident(),
                c if c.is_ascii_digit() || c == '-' => {
                    self.parse_number()?.to_string()
                }
                _ => return None,
            };
            self.skip_ws();
            if !self.eat(':') && !self.eat('=') {
                return None;
            }
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_ws();
            if !self.eat(',') {
                self.skip_ws();
                return self.eat('}').then_some(Value::Object(map));
            }
        }
    }

    fn parse_sequence(&mut self, close: char) -> Option<Value> {
        self.bump();
        let mut items = vec![];
        loop {
            self.skip_ws();
            if self.eat(close) {
                return Some(Value::Array(items));
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            if !self.eat(',') {
                self.skip_ws();
                return self.eat(close).then_some(Value::Array(items));
            }
        }
    }

    fn parse_string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut s = String::new();
        loop {
            match self.bump()? {
                c if c == quote => return Some(s),
                '\\' => match self.bump()? {
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    'r' => s.push('\r'),
                    '0' => s.push('\0'),
                    'u' => {
                        let hex: String = (0..4)
                            .map(|_| self.bump())
                            .collect::<Option<_>>()?;
                        let code = u32::from_str_radix(&hex, 16).ok()?;
                        s.push(char::from_u32(code)?);
                    }
                    other => s.push(other),
                },
                c => s.push(c),
            }
        }
    }

    fn parse_number(&mut self) -> Option<Value> {
        let start = self.pos;
        while self.peek().is_some_and(|c| {
            c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E' | '_')
        }) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        let text = text.strip_prefix('+').unwrap_or(&text);
        if let Ok(n) = text.parse::<i64>() {
            return Some(Value::Number(n.into()));
        }
        let n = text.parse::<f64>().ok()?;
        Number::from_f64(n).map(Value::Number)
    }

    fn parse_ident(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn decode(raw: &str) -> Value {
        Value::Object(decode_arguments(raw))
    }

    #[test]
    fn test_strict_json() {
        assert_eq!(
            decode(r#"{"expression": "2+2", "precision": 2}"#),
            json!({ "expression": "2+2", "precision": 2 })
        );
    }

    #[test]
    fn test_permissive_literals() {
        assert_eq!(
            decode("{'city': 'Paris', 'metric': True, 'limit': None,}"),
            json!({ "city": "Paris", "metric": true, "limit": null })
        );
        assert_eq!(
            decode("{path: 'a/b', 'sizes': (1, 2.5, -3), nested: {'k': [1,]}}"),
            json!({
                "path": "a/b",
                "sizes": [1, 2.5, -3],
                "nested": { "k": [1] }
            })
        );
        assert_eq!(
            decode(r#"{'quote': 'it\'s', "line": "a\nb"}"#),
            json!({ "quote": "it's", "line": "a\nb" })
        );
    }

    #[test]
    fn test_fallback_to_empty() {
        assert_eq!(decode(""), json!({}));
        assert_eq!(decode("   "), json!({}));
        assert_eq!(decode("not arguments at all"), json!({}));
        assert_eq!(decode("{'unterminated': 1"), json!({}));
        assert_eq!(decode("[1, 2]"), json!({}));
        assert_eq!(decode("{'a': 1} trailing"), json!({}));
    }

    #[test]
    fn test_coerce_arguments() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": { "type": "integer", "format": "int64" },
                "ratio": { "type": "number" },
                "exact": { "type": "boolean" },
                "limit": { "type": ["integer", "null"] },
                "tags": { "type": "array", "items": { "type": "string" } },
                "label": { "type": "string" },
            },
        });
        let mut arguments = decode_arguments(
            r#"{"a": " 12 ", "ratio": "0.5", "exact": "True", "limit": "",
                "tags": "['x', 'y']", "label": "7", "extra": "3"}"#,
        );
        coerce_arguments(&mut arguments, &schema);
        assert_eq!(
            Value::Object(arguments),
            json!({
                "a": 12,
                "ratio": 0.5,
                "exact": true,
                "limit": null,
                "tags": ["x", "y"],
                "label": "7",
                "extra": "3",
            })
        );
    }

    #[test]
    fn test_coerce_keeps_unparsable_text() {
        let schema = json!({
            "properties": { "a": { "type": "integer" } },
        });
        let mut arguments = decode_arguments(r#"{"a": "one"}"#);
        coerce_arguments(&mut arguments, &schema);
        assert_eq!(Value::Object(arguments), json!({ "a": "one" }));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let raw = format!("{{'a': {}", "[".repeat(10_000));
        assert_eq!(decode(&raw), json!({}));

        let nested =
            format!("{{'a': {}1{}}}", "(".repeat(100), ")".repeat(100));
        let mut expected = json!(1);
        for _ in 0..100 {
            expected = json!([expected]);
        }
        assert_eq!(decode(&nested), json!({ "a": expected }));
    }
}
