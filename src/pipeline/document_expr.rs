//! Safe parser for generated document-store expressions.
//!
//! Accepts the PyMongo-flavoured subset the prompt asks for:
//!
//! ```text
//! expression := target "." operation ( "." modifier )*
//! target     := "db" ( "[" string "]" | "." identifier | ".get_collection(" string ")" )
//! operation  := find(filter?, projection?) | find_one(filter?, projection?)
//!             | aggregate([stage, ...]) | count_documents(filter?)
//!             | distinct(field, filter?)
//! modifier   := sort(field, dir?) | sort([(field, dir), ...]) | sort({..})
//!             | skip(n) | limit(n)                       (after find only)
//! ```
//!
//! Values are JSON or Python literals (`True`, `None`, tuples, single-quoted
//! strings) plus `ASCENDING`/`DESCENDING`, `ObjectId("..")` and
//! `ISODate("..")`. The whole expression may be wrapped in `list(...)`.
//! Nothing is ever evaluated.

use crate::error::{NlqError, NlqResult};
use crate::models::{DocumentExpression, DocumentOperation, FindSpec, JsonMap};
use serde_json::{Number, Value as JsonValue};

/// Deepest operand nesting accepted.
const MAX_NESTING: usize = 64;

/// Parse a candidate string into a [`DocumentExpression`].
pub fn parse_document_expression(input: &str) -> NlqResult<DocumentExpression> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    parser.expression()
}

// =============================================================================
// Lexer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(Number),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Equals,
    Semicolon,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier '{}'", s),
            Token::Str(_) => "string".to_string(),
            Token::Num(n) => format!("number {}", n),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Equals => "'='".to_string(),
            Token::Semicolon => "';'".to_string(),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn tokenize(input: &str) -> NlqResult<Vec<(usize, Token)>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let single = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            '.' if !chars.get(i + 1).is_some_and(|(_, n)| n.is_ascii_digit()) => {
                Some(Token::Dot)
            }
            '=' => Some(Token::Equals),
            ';' => Some(Token::Semicolon),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push((offset, token));
            i += 1;
            continue;
        }

        if c.is_whitespace() {
            i += 1;
        } else if c == '#' {
            // Python line comment
            while i < chars.len() && chars[i].1 != '\n' {
                i += 1;
            }
        } else if c == '"' || c == '\'' {
            let (s, next) = lex_string(&chars, i)?;
            tokens.push((offset, Token::Str(s)));
            i = next;
        } else if c.is_ascii_digit()
            || c == '.'
            || (c == '-' && chars.get(i + 1).is_some_and(|(_, n)| n.is_ascii_digit() || *n == '.'))
        {
            let (n, next) = lex_number(input, &chars, i)?;
            tokens.push((offset, Token::Num(n)));
            i = next;
        } else if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i].1) {
                i += 1;
            }
            let ident: String = chars[start..i].iter().map(|(_, ch)| ch).collect();
            tokens.push((offset, Token::Ident(ident)));
        } else {
            return Err(NlqError::evaluation(format!(
                "Unexpected character '{}' at offset {}",
                c, offset
            )));
        }
    }

    Ok(tokens)
}

fn lex_string(chars: &[(usize, char)], start: usize) -> NlqResult<(String, usize)> {
    let (offset, quote) = chars[start];
    let mut out = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i].1;
        if c == quote {
            return Ok((out, i + 1));
        }
        if c == '\\' {
            let Some(&(_, esc)) = chars.get(i + 1) else {
                break;
            };
            match esc {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{8}'),
                'f' => out.push('\u{c}'),
                '0' => out.push('\0'),
                'u' => {
                    let hex: String = chars
                        .get(i + 2..i + 6)
                        .map(|s| s.iter().map(|(_, ch)| ch).collect())
                        .unwrap_or_default();
                    let decoded = u32::from_str_radix(&hex, 16)
                        .ok()
                        .filter(|_| hex.len() == 4)
                        .and_then(char::from_u32)
                        .ok_or_else(|| {
                            NlqError::evaluation(format!(
                                "Invalid unicode escape in string at offset {}",
                                offset
                            ))
                        })?;
                    out.push(decoded);
                    i += 6;
                    continue;
                }
                other => out.push(other),
            }
            i += 2;
            continue;
        }
        out.push(c);
        i += 1;
    }

    Err(NlqError::evaluation(format!(
        "Unterminated string starting at offset {}",
        offset
    )))
}

fn lex_number(input: &str, chars: &[(usize, char)], start: usize) -> NlqResult<(Number, usize)> {
    let mut i = start;
    if chars[i].1 == '-' {
        i += 1;
    }
    let mut is_float = false;
    while i < chars.len() {
        let c = chars[i].1;
        if c.is_ascii_digit() || c == '_' {
            i += 1;
        } else if c == '.' || c == 'e' || c == 'E' {
            is_float = true;
            i += 1;
            if (c == 'e' || c == 'E') && chars.get(i).is_some_and(|(_, n)| *n == '+' || *n == '-') {
                i += 1;
            }
        } else {
            break;
        }
    }

    let begin = chars[start].0;
    let end = chars.get(i).map_or(input.len(), |(o, _)| *o);
    let text = input[begin..end].replace('_', "");

    let number = if is_float {
        text.parse::<f64>().ok().and_then(Number::from_f64)
    } else {
        text.parse::<i64>()
            .map(Number::from)
            .ok()
            .or_else(|| text.parse::<u64>().map(Number::from).ok())
    };

    number.map(|n| (n, i)).ok_or_else(|| {
        NlqError::evaluation(format!("Invalid number '{}' at offset {}", text, begin))
    })
}

// =============================================================================
// Parser
// =============================================================================

/// A call argument, optionally passed by keyword.
struct Argument {
    name: Option<String>,
    value: JsonValue,
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    /// Current operand nesting.
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|(_, t)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl AsRef<str>) -> NlqError {
        let location = match self.tokens.get(self.pos) {
            Some((offset, token)) => format!("at offset {} (found {})", offset, token.describe()),
            None => "at end of input".to_string(),
        };
        NlqError::evaluation(format!("{} {}", message.as_ref(), location))
    }

    fn expect(&mut self, expected: Token) -> NlqResult<()> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("Expected {}", expected.describe())))
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> NlqResult<String> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error("Expected identifier")),
        }
    }

    fn string(&mut self) -> NlqResult<String> {
        match self.peek() {
            Some(Token::Str(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(s)
            }
            _ => Err(self.error("Expected string")),
        }
    }

    fn is_ident(&self, ahead: usize, name: &str) -> bool {
        matches!(self.peek_at(ahead), Some(Token::Ident(n)) if n == name)
    }

    // -------------------------------------------------------------------------
    // Expression structure
    // -------------------------------------------------------------------------

    fn expression(&mut self) -> NlqResult<DocumentExpression> {
        if self.tokens.is_empty() {
            return Err(NlqError::malformed_output("Empty document expression"));
        }

        let wrapped = self.is_ident(0, "list") && self.peek_at(1) == Some(&Token::LParen);
        if wrapped {
            self.pos += 2;
        }

        let collection = self.target()?;
        self.expect(Token::Dot)?;
        let mut operation = self.operation()?;

        while self.eat(&Token::Dot) {
            self.modifier(&mut operation)?;
        }

        if wrapped {
            self.expect(Token::RParen)?;
        }
        self.eat(&Token::Semicolon);

        if self.peek().is_some() {
            return Err(self.error("Unexpected trailing input"));
        }

        Ok(DocumentExpression {
            collection,
            operation,
        })
    }

    fn target(&mut self) -> NlqResult<String> {
        if !self.is_ident(0, "db") {
            return Err(self.error("Expression must start with db[\"collection\"]"));
        }
        self.pos += 1;

        let collection = if self.eat(&Token::LBracket) {
            let name = self.string()?;
            self.expect(Token::RBracket)?;
            name
        } else {
            self.expect(Token::Dot)?;
            let name = self.ident()?;
            if (name == "get_collection" || name == "getCollection")
                && self.eat(&Token::LParen)
            {
                let name = self.string()?;
                self.expect(Token::RParen)?;
                name
            } else {
                name
            }
        };

        if collection.is_empty() {
            return Err(self.error("Collection name is empty"));
        }
        Ok(collection)
    }

    fn operation(&mut self) -> NlqResult<DocumentOperation> {
        let name = self.ident()?;
        self.expect(Token::LParen)?;
        let args = self.arguments()?;

        match name.as_str() {
            "find" => {
                let mut spec = FindSpec::default();
                for (idx, arg) in args.into_iter().enumerate() {
                    match (arg.name.as_deref(), idx) {
                        (Some("filter"), _) | (None, 0) => spec.filter = object(arg.value, "filter")?,
                        (Some("projection"), _) | (None, 1) => {
                            spec.projection = Some(object(arg.value, "projection")?)
                        }
                        (Some("sort"), _) => spec.sort = Some(sort_spec(vec![arg.value])?),
                        (Some("skip"), _) => spec.skip = Some(non_negative(arg.value, "skip")?),
                        (Some("limit"), _) => spec.limit = Some(limit(arg.value)?),
                        (Some(other), _) => return Err(unsupported_argument("find", other)),
                        (None, _) => return Err(too_many_arguments("find")),
                    }
                }
                Ok(DocumentOperation::Find(spec))
            }
            "find_one" | "findOne" => {
                let mut filter = JsonMap::new();
                let mut projection = None;
                for (idx, arg) in args.into_iter().enumerate() {
                    match (arg.name.as_deref(), idx) {
                        (Some("filter"), _) | (None, 0) => filter = object(arg.value, "filter")?,
                        (Some("projection"), _) | (None, 1) => {
                            projection = Some(object(arg.value, "projection")?)
                        }
                        (Some(other), _) => return Err(unsupported_argument("find_one", other)),
                        (None, _) => return Err(too_many_arguments("find_one")),
                    }
                }
                Ok(DocumentOperation::FindOne { filter, projection })
            }
            "aggregate" => {
                let mut args = args.into_iter();
                let pipeline = match (args.next(), args.next()) {
                    (Some(arg), None) if matches!(arg.name.as_deref(), None | Some("pipeline")) => {
                        arg.value
                    }
                    (None, _) => {
                        return Err(NlqError::evaluation("aggregate requires a pipeline"));
                    }
                    _ => return Err(too_many_arguments("aggregate")),
                };
                let JsonValue::Array(stages) = pipeline else {
                    return Err(NlqError::evaluation("aggregate pipeline must be a list"));
                };
                let pipeline = stages
                    .into_iter()
                    .map(|stage| object(stage, "pipeline stage"))
                    .collect::<NlqResult<Vec<_>>>()?;
                Ok(DocumentOperation::Aggregate { pipeline })
            }
            "count_documents" | "countDocuments" => {
                let mut filter = JsonMap::new();
                for (idx, arg) in args.into_iter().enumerate() {
                    match (arg.name.as_deref(), idx) {
                        (Some("filter"), _) | (None, 0) => filter = object(arg.value, "filter")?,
                        (Some(other), _) => {
                            return Err(unsupported_argument("count_documents", other));
                        }
                        (None, _) => return Err(too_many_arguments("count_documents")),
                    }
                }
                Ok(DocumentOperation::CountDocuments { filter })
            }
            "distinct" => {
                let mut field = None;
                let mut filter = JsonMap::new();
                for (idx, arg) in args.into_iter().enumerate() {
                    match (arg.name.as_deref(), idx) {
                        (Some("key"), _) | (None, 0) => match arg.value {
                            JsonValue::String(s) if !s.is_empty() => field = Some(s),
                            _ => {
                                return Err(NlqError::evaluation(
                                    "distinct field must be a non-empty string",
                                ));
                            }
                        },
                        (Some("filter"), _) | (None, 1) => filter = object(arg.value, "filter")?,
                        (Some(other), _) => return Err(unsupported_argument("distinct", other)),
                        (None, _) => return Err(too_many_arguments("distinct")),
                    }
                }
                let field =
                    field.ok_or_else(|| NlqError::evaluation("distinct requires a field name"))?;
                Ok(DocumentOperation::Distinct { field, filter })
            }
            other => Err(NlqError::evaluation(format!(
                "Unsupported operation '{}'. Supported: find, find_one, aggregate, count_documents, distinct",
                other
            ))),
        }
    }

    fn modifier(&mut self, operation: &mut DocumentOperation) -> NlqResult<()> {
        let name = self.ident()?;
        self.expect(Token::LParen)?;
        let args = self.arguments()?;

        let DocumentOperation::Find(spec) = operation else {
            return Err(NlqError::evaluation(format!(
                "Modifier '{}' is only allowed after find",
                name
            )));
        };

        if args.iter().any(|a| a.name.is_some()) {
            return Err(NlqError::evaluation(format!(
                "Modifier '{}' does not take keyword arguments",
                name
            )));
        }
        let mut values: Vec<JsonValue> = args.into_iter().map(|a| a.value).collect();

        match name.as_str() {
            "sort" => spec.sort = Some(sort_spec(values)?),
            "skip" | "limit" if values.len() != 1 => {
                return Err(NlqError::evaluation(format!(
                    "{} takes exactly one argument",
                    name
                )));
            }
            "skip" => spec.skip = Some(non_negative(values.remove(0), "skip")?),
            "limit" => spec.limit = Some(limit(values.remove(0))?),
            other => {
                return Err(NlqError::evaluation(format!(
                    "Unsupported cursor modifier '{}'. Supported: sort, skip, limit",
                    other
                )));
            }
        }
        Ok(())
    }

    /// Parse call arguments after the opening parenthesis, through the closing one.
    fn arguments(&mut self) -> NlqResult<Vec<Argument>> {
        let mut args = Vec::new();
        loop {
            if self.eat(&Token::RParen) {
                return Ok(args);
            }

            let name = match (self.peek(), self.peek_at(1)) {
                (Some(Token::Ident(name)), Some(Token::Equals)) => {
                    let name = name.clone();
                    self.pos += 2;
                    Some(name)
                }
                _ => None,
            };
            let value = self.value()?;
            args.push(Argument { name, value });

            if !self.eat(&Token::Comma) {
                self.expect(Token::RParen)?;
                return Ok(args);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Literal values
    // -------------------------------------------------------------------------

    fn value(&mut self) -> NlqResult<JsonValue> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("Operand nesting too deep"));
        }
        self.depth += 1;
        let value = self.literal();
        self.depth -= 1;
        value
    }

    fn literal(&mut self) -> NlqResult<JsonValue> {
        match self.advance() {
            Some(Token::LBrace) => self.object_body(),
            Some(Token::LBracket) => self.sequence(Token::RBracket).map(JsonValue::Array),
            Some(Token::LParen) => {
                let items = self.sequence(Token::RParen)?;
                // `(x)` is a parenthesised value, `(x,)` a one-element tuple
                let trailing_comma = self.tokens.get(self.pos.saturating_sub(2)).map(|(_, t)| t)
                    == Some(&Token::Comma);
                if items.len() == 1 && !trailing_comma {
                    Ok(items.into_iter().next().unwrap_or(JsonValue::Null))
                } else {
                    Ok(JsonValue::Array(items))
                }
            }
            Some(Token::Str(s)) => Ok(JsonValue::String(s)),
            Some(Token::Num(n)) => Ok(JsonValue::Number(n)),
            Some(Token::Ident(name)) => self.named_value(&name),
            Some(_) => {
                self.pos -= 1;
                Err(self.error("Expected a value"))
            }
            None => Err(self.error("Expected a value")),
        }
    }

    fn named_value(&mut self, name: &str) -> NlqResult<JsonValue> {
        match name {
            "true" | "True" => Ok(JsonValue::Bool(true)),
            "false" | "False" => Ok(JsonValue::Bool(false)),
            "null" | "None" => Ok(JsonValue::Null),
            "ASCENDING" => Ok(JsonValue::from(1)),
            "DESCENDING" => Ok(JsonValue::from(-1)),
            "pymongo" => {
                self.expect(Token::Dot)?;
                let inner = self.ident()?;
                match inner.as_str() {
                    "ASCENDING" | "DESCENDING" => self.named_value(&inner),
                    _ => Err(self.error(format!("Unsupported name 'pymongo.{}'", inner))),
                }
            }
            "ObjectId" | "ISODate" => {
                self.expect(Token::LParen)?;
                let text = self.string()?;
                self.expect(Token::RParen)?;
                let key = if name == "ObjectId" { "$oid" } else { "$date" };
                Ok(serde_json::json!({ key: text }))
            }
            other => {
                self.pos -= 1;
                Err(self.error(format!("Unsupported name '{}'", other)))
            }
        }
    }

    /// Object contents after `{`, through `}`.
    fn object_body(&mut self) -> NlqResult<JsonValue> {
        let mut map = JsonMap::new();
        loop {
            if self.eat(&Token::RBrace) {
                return Ok(JsonValue::Object(map));
            }
            let key = match self.advance() {
                Some(Token::Str(s)) | Some(Token::Ident(s)) => s,
                Some(_) => {
                    self.pos -= 1;
                    return Err(self.error("Expected object key"));
                }
                None => return Err(self.error("Unterminated object")),
            };
            self.expect(Token::Colon)?;
            let value = self.value()?;
            map.insert(key, value);

            if !self.eat(&Token::Comma) {
                self.expect(Token::RBrace)?;
                return Ok(JsonValue::Object(map));
            }
        }
    }

    /// Comma-separated values through `close`, trailing comma allowed.
    fn sequence(&mut self, close: Token) -> NlqResult<Vec<JsonValue>> {
        let mut items = Vec::new();
        loop {
            if self.eat(&close) {
                return Ok(items);
            }
            items.push(self.value()?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }
}

// =============================================================================
// Operand validation
// =============================================================================

fn object(value: JsonValue, what: &str) -> NlqResult<JsonMap> {
    match value {
        JsonValue::Object(map) => Ok(map),
        JsonValue::Null if what == "filter" => Ok(JsonMap::new()),
        other => Err(NlqError::evaluation(format!(
            "{} must be an object, got {}",
            what, other
        ))),
    }
}

fn direction(value: &JsonValue) -> NlqResult<JsonValue> {
    match value.as_i64() {
        Some(1) | Some(-1) => Ok(value.clone()),
        _ => match value.as_str().map(str::to_ascii_lowercase).as_deref() {
            Some("asc") | Some("ascending") => Ok(JsonValue::from(1)),
            Some("desc") | Some("descending") => Ok(JsonValue::from(-1)),
            _ => Err(NlqError::evaluation(format!(
                "Sort direction must be 1 or -1, got {}",
                value
            ))),
        },
    }
}

/// Normalize the accepted `sort` argument shapes into an ordered map.
fn sort_spec(args: Vec<JsonValue>) -> NlqResult<JsonMap> {
    let mut spec = JsonMap::new();
    match args.as_slice() {
        [JsonValue::String(field)] => {
            spec.insert(field.clone(), JsonValue::from(1));
        }
        [JsonValue::String(field), dir] => {
            spec.insert(field.clone(), direction(dir)?);
        }
        [JsonValue::Object(map)] => {
            for (field, dir) in map {
                spec.insert(field.clone(), direction(dir)?);
            }
        }
        [JsonValue::Array(pairs)] => {
            for pair in pairs {
                match pair.as_array().map(Vec::as_slice) {
                    Some([JsonValue::String(field), dir]) => {
                        spec.insert(field.clone(), direction(dir)?);
                    }
                    _ => {
                        return Err(NlqError::evaluation(
                            "sort list entries must be (field, direction) pairs",
                        ));
                    }
                }
            }
        }
        _ => {
            return Err(NlqError::evaluation(
                "sort expects a field, a (field, direction) list or an object",
            ));
        }
    }
    if spec.is_empty() {
        return Err(NlqError::evaluation("sort specification is empty"));
    }
    Ok(spec)
}

fn non_negative(value: JsonValue, what: &str) -> NlqResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| NlqError::evaluation(format!("{} must be a non-negative integer", what)))
}

fn limit(value: JsonValue) -> NlqResult<i64> {
    value
        .as_u64()
        .and_then(|n| i64::try_from(n).ok())
        .ok_or_else(|| NlqError::evaluation("limit must be a non-negative integer"))
}

fn unsupported_argument(op: &str, name: &str) -> NlqError {
    NlqError::evaluation(format!("{} does not accept argument '{}'", op, name))
}

fn too_many_arguments(op: &str) -> NlqError {
    NlqError::evaluation(format!("Too many arguments for {}", op))
}
