//! Tool parameter schemas and the schema deriver.
//!
//! A tool's parameters are described by a [`PropertyMap`]: an ordered map
//! from field name to [`PropertySchema`]. Maps can be built by hand with the
//! builder methods, or derived from a TypeScript-style structural type
//! declaration with [`derive_properties`]:
//!
//! ```text
//! interface WeatherInput {
//!     /** The city to look up */
//!     city: string;
//!     unit?: string;
//!     days: number[];
//! }
//! ```
//!
//! Supported field types (informal):
//! ```text
//! type    = "string" | "number" | "bigint" | "boolean"
//!         | type "[]" | "Array<" type ">" | "{" member* "}"
//! member  = [doc] ["readonly"] name ["?"] ":" type [";" | ","]
//! ```
//!
//! Anything else (type references, literal types, unions, tuples, function
//! types) is skipped with a warning. Field order is declaration order.

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::warn;

use crate::error::SchemaError;

/// The JSON type of a property.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    String,
    Number,
    Boolean,
    Array(Box<PropertySchema>),
    Object(PropertyMap),
    /// An element type the deriver cannot express; serialized as `{"type": ""}`.
    Unknown,
}

impl SchemaKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            SchemaKind::String => "string",
            SchemaKind::Number => "number",
            SchemaKind::Boolean => "boolean",
            SchemaKind::Array(_) => "array",
            SchemaKind::Object(_) => "object",
            SchemaKind::Unknown => "",
        }
    }
}

/// Schema for a single property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySchema {
    pub kind: SchemaKind,
    pub description: Option<String>,
    /// Declared with `?`. Non-optional properties are listed in `required`.
    pub optional: bool,
}

impl PropertySchema {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            description: None,
            optional: false,
        }
    }

    pub fn string() -> Self {
        Self::new(SchemaKind::String)
    }

    pub fn number() -> Self {
        Self::new(SchemaKind::Number)
    }

    pub fn boolean() -> Self {
        Self::new(SchemaKind::Boolean)
    }

    pub fn array(items: PropertySchema) -> Self {
        Self::new(SchemaKind::Array(Box::new(items)))
    }

    pub fn object(properties: PropertyMap) -> Self {
        Self::new(SchemaKind::Object(properties))
    }

    pub fn unknown() -> Self {
        Self::new(SchemaKind::Unknown)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

impl Serialize for PropertySchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.kind.type_name())?;
        if let Some(description) = &self.description {
            map.serialize_entry("description", description)?;
        }
        match &self.kind {
            SchemaKind::Array(items) => map.serialize_entry("items", items.as_ref())?,
            SchemaKind::Object(properties) => {
                map.serialize_entry("properties", properties)?;
                let required = properties.required();
                if !required.is_empty() {
                    map.serialize_entry("required", &required)?;
                }
            }
            _ => {}
        }
        map.end()
    }
}

/// Ordered property name → schema map. Serializes as a JSON object in
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    entries: Vec<(String, PropertySchema)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        self.insert(name, schema);
        self
    }

    /// Insert a property. A repeated name replaces the earlier schema in place.
    pub fn insert(&mut self, name: impl Into<String>, schema: PropertySchema) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = schema,
            None => self.entries.push((name, schema)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertySchema> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertySchema)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Names of properties not declared optional, in declaration order.
    pub fn required(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, s)| !s.optional)
            .map(|(n, _)| n.as_str())
            .collect()
    }
}

impl Serialize for PropertyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, schema) in &self.entries {
            map.serialize_entry(name, schema)?;
        }
        map.end()
    }
}

/// Derive a [`PropertyMap`] from the first `interface` or object `type`
/// declaration in `source`.
pub fn derive_properties(source: &str) -> Result<PropertyMap, SchemaError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
    };
    parser.parse_declaration()
}

// ─── Tokenizer ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Num(String),
    Arrow,
    Punct(char),
}

impl std::fmt::Display for Tok {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tok::Ident(s) => write!(f, "`{s}`"),
            Tok::Str(s) => write!(f, "string \"{s}\""),
            Tok::Num(n) => write!(f, "number {n}"),
            Tok::Arrow => write!(f, "`=>`"),
            Tok::Punct(c) => write!(f, "`{c}`"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    offset: usize,
    /// A line break separates this token from the previous one.
    newline_before: bool,
    /// `/** ... */` comments immediately preceding this token.
    docs: Vec<String>,
}

fn tokenize(source: &str) -> Result<Vec<Token>, SchemaError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    let mut newline_before = false;
    let mut docs: Vec<String> = Vec::new();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            '\n' => {
                chars.next();
                newline_before = true;
            }
            _ if c.is_whitespace() => {
                chars.next();
            }
            '/' => {
                chars.next();
                match chars.peek().map(|&(_, c)| c) {
                    Some('/') => {
                        for (_, c) in chars.by_ref() {
                            if c == '\n' {
                                newline_before = true;
                                break;
                            }
                        }
                    }
                    Some('*') => {
                        chars.next();
                        let body_start = offset + 2;
                        let mut prev = '\0';
                        let mut body_end = None;
                        for (i, c) in chars.by_ref() {
                            if c == '\n' {
                                newline_before = true;
                            }
                            if prev == '*' && c == '/' {
                                body_end = Some(i - 1);
                                break;
                            }
                            prev = c;
                        }
                        let Some(body_end) = body_end else {
                            return Err(SchemaError::Unterminated {
                                what: "comment",
                                offset,
                            });
                        };
                        let body = &source[body_start..body_end.max(body_start)];
                        // `/**/` is an empty plain comment, not a doc comment.
                        if let Some(doc) = body.strip_prefix('*') {
                            docs.push(doc.to_string());
                        }
                    }
                    _ => {
                        tokens.push(Token {
                            tok: Tok::Punct('/'),
                            offset,
                            newline_before: std::mem::take(&mut newline_before),
                            docs: std::mem::take(&mut docs),
                        });
                    }
                }
            }
            '"' | '\'' | '`' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '\\')) => {
                            if let Some((_, escaped)) = chars.next() {
                                s.push(escaped);
                            }
                        }
                        Some((_, ch)) if ch == quote => break,
                        Some((_, ch)) => s.push(ch),
                        None => {
                            return Err(SchemaError::Unterminated {
                                what: "string literal",
                                offset,
                            });
                        }
                    }
                }
                tokens.push(Token {
                    tok: Tok::Str(s),
                    offset,
                    newline_before: std::mem::take(&mut newline_before),
                    docs: std::mem::take(&mut docs),
                });
            }
            _ if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut ident = String::new();
                while let Some(&(_, nc)) = chars.peek() {
                    if nc.is_alphanumeric() || nc == '_' || nc == '$' {
                        ident.push(nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    tok: Tok::Ident(ident),
                    offset,
                    newline_before: std::mem::take(&mut newline_before),
                    docs: std::mem::take(&mut docs),
                });
            }
            _ if c.is_ascii_digit() => {
                let mut num = String::new();
                while let Some(&(_, nc)) = chars.peek() {
                    if nc.is_ascii_alphanumeric() || nc == '.' || nc == '_' {
                        num.push(nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    tok: Tok::Num(num),
                    offset,
                    newline_before: std::mem::take(&mut newline_before),
                    docs: std::mem::take(&mut docs),
                });
            }
            '=' => {
                chars.next();
                let tok = if chars.peek().map(|&(_, c)| c) == Some('>') {
                    chars.next();
                    Tok::Arrow
                } else {
                    Tok::Punct('=')
                };
                tokens.push(Token {
                    tok,
                    offset,
                    newline_before: std::mem::take(&mut newline_before),
                    docs: std::mem::take(&mut docs),
                });
            }
            _ => {
                chars.next();
                tokens.push(Token {
                    tok: Tok::Punct(c),
                    offset,
                    newline_before: std::mem::take(&mut newline_before),
                    docs: std::mem::take(&mut docs),
                });
            }
        }
    }

    Ok(tokens)
}

/// Turn a raw doc comment body into a description: strip the `*` gutter,
/// stop at the first `@tag` line, drop blank edges.
fn clean_doc(raw: &str) -> Option<String> {
    let mut lines = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        let line = line.strip_prefix('*').map(str::trim_start).unwrap_or(line);
        if line.starts_with('@') {
            break;
        }
        lines.push(line.trim_end());
    }
    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

// ─── Parser ──────────────────────────────────────────────────────────

/// Parsed type expression, before it is mapped onto a [`SchemaKind`].
#[derive(Debug)]
enum TypeExpr {
    String,
    Number,
    Boolean,
    Array(Box<TypeExpr>),
    Object(PropertyMap),
    Unsupported(String),
}

impl TypeExpr {
    fn into_kind(self) -> Result<SchemaKind, String> {
        match self {
            TypeExpr::String => Ok(SchemaKind::String),
            TypeExpr::Number => Ok(SchemaKind::Number),
            TypeExpr::Boolean => Ok(SchemaKind::Boolean),
            TypeExpr::Object(properties) => Ok(SchemaKind::Object(properties)),
            TypeExpr::Array(element) => {
                let items = match *element {
                    TypeExpr::String => PropertySchema::string(),
                    TypeExpr::Number => PropertySchema::number(),
                    TypeExpr::Boolean => PropertySchema::boolean(),
                    TypeExpr::Object(properties) => PropertySchema::object(properties),
                    TypeExpr::Array(_) | TypeExpr::Unsupported(_) => PropertySchema::unknown(),
                };
                Ok(SchemaKind::Array(Box::new(items)))
            }
            TypeExpr::Unsupported(reason) => Err(reason),
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + ahead).map(|t| &t.tok)
    }

    fn peek_punct(&self, c: char) -> bool {
        self.peek_at(0) == Some(&Tok::Punct(c))
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.peek_punct(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self, expected: &'static str) -> SchemaError {
        match self.peek() {
            Some(t) => SchemaError::Unexpected {
                found: t.tok.to_string(),
                expected,
                offset: t.offset,
            },
            None => SchemaError::Unexpected {
                found: "end of input".into(),
                expected,
                offset: self.end,
            },
        }
    }

    fn parse_declaration(&mut self) -> Result<PropertyMap, SchemaError> {
        while let Some(token) = self.next() {
            let Tok::Ident(keyword) = &token.tok else {
                continue;
            };
            match keyword.as_str() {
                "interface" => {
                    let Some(Tok::Ident(_)) = self.peek_at(0) else {
                        continue;
                    };
                    self.pos += 1;
                    // Skip type parameters and `extends` clauses up to the body.
                    while !self.peek_punct('{') {
                        if self.next().is_none() {
                            return Err(self.unexpected("`{`"));
                        }
                    }
                    let open = self.next().map(|t| t.offset).unwrap_or(self.end);
                    return self.parse_members(open);
                }
                "type" => {
                    let Some(Tok::Ident(alias)) = self.peek_at(0).cloned() else {
                        continue;
                    };
                    self.pos += 1;
                    if self.peek_punct('<') {
                        self.skip_balanced('<', '>')?;
                    }
                    if !self.eat_punct('=') {
                        return Err(self.unexpected("`=`"));
                    }
                    if let Some(open) = self.peek().filter(|t| t.tok == Tok::Punct('{')) {
                        let open = open.offset;
                        self.pos += 1;
                        return self.parse_members(open);
                    }
                    warn!(alias = %alias, "Skipping type alias that is not an object type literal");
                }
                _ => {}
            }
        }
        Err(SchemaError::NoDeclaration)
    }

    /// Parse members up to and including the closing `}`. The opening `{`
    /// at `open` has already been consumed.
    fn parse_members(&mut self, open: usize) -> Result<PropertyMap, SchemaError> {
        let mut properties = PropertyMap::new();
        loop {
            if self.peek().is_none() {
                return Err(SchemaError::Unterminated {
                    what: "object type",
                    offset: open,
                });
            }
            if self.eat_punct('}') {
                return Ok(properties);
            }
            if self.eat_punct(';') || self.eat_punct(',') {
                continue;
            }
            if let Some((name, schema)) = self.parse_member()? {
                properties.insert(name, schema);
            }
        }
    }

    fn parse_member(&mut self) -> Result<Option<(String, PropertySchema)>, SchemaError> {
        let description = self
            .peek()
            .and_then(|t| t.docs.first())
            .and_then(|d| clean_doc(d));

        if self.peek_at(0) == Some(&Tok::Ident("readonly".into()))
            && matches!(
                self.peek_at(1),
                Some(Tok::Ident(_)) | Some(Tok::Str(_)) | Some(Tok::Num(_)) | Some(Tok::Punct('['))
            )
        {
            self.pos += 1;
        }

        let name = match self.peek_at(0).cloned() {
            Some(Tok::Ident(s)) | Some(Tok::Str(s)) | Some(Tok::Num(s)) => s,
            // Index, call and construct signatures.
            Some(Tok::Punct('[')) | Some(Tok::Punct('(')) | Some(Tok::Punct('<')) => {
                self.skip_member();
                return Ok(None);
            }
            _ => return Err(self.unexpected("property name")),
        };
        self.pos += 1;

        let optional = self.eat_punct('?');

        if self.peek_punct('(') || self.peek_punct('<') {
            self.skip_member();
            return Ok(None);
        }
        if !self.eat_punct(':') {
            return Err(self.unexpected("`:`"));
        }

        let ty = self.parse_type()?;

        let trailing = self.peek().map(|t| (t.tok.clone(), t.newline_before));
        match trailing {
            None => {}
            Some((Tok::Punct(';' | ','), _)) => self.pos += 1,
            Some((Tok::Punct('}'), _)) | Some((_, true)) => {}
            Some((found, false)) => {
                warn!(property = %name, found = %found, "Skipping property with unparsed trailing type syntax");
                self.skip_member();
                return Ok(None);
            }
        }

        match ty.into_kind() {
            Ok(kind) => Ok(Some((
                name,
                PropertySchema {
                    kind,
                    description,
                    optional,
                },
            ))),
            Err(reason) => {
                warn!(property = %name, reason = %reason, "Skipping property with unsupported type");
                Ok(None)
            }
        }
    }

    fn parse_type(&mut self) -> Result<TypeExpr, SchemaError> {
        self.eat_punct('|');
        let first = self.parse_postfix()?;
        let mut arms = 1;
        while self.eat_punct('|') || self.eat_punct('&') {
            self.parse_postfix()?;
            arms += 1;
        }
        if arms > 1 {
            return Ok(TypeExpr::Unsupported("union or intersection type".into()));
        }
        Ok(first)
    }

    fn parse_postfix(&mut self) -> Result<TypeExpr, SchemaError> {
        let mut ty = self.parse_primary()?;
        while self.peek_punct('[') {
            if self.peek_at(1) == Some(&Tok::Punct(']')) {
                self.pos += 2;
                ty = TypeExpr::Array(Box::new(ty));
            } else {
                self.skip_balanced('[', ']')?;
                ty = TypeExpr::Unsupported("indexed access type".into());
            }
        }
        Ok(ty)
    }

    fn parse_primary(&mut self) -> Result<TypeExpr, SchemaError> {
        let Some(token) = self.next() else {
            return Err(self.unexpected("type"));
        };
        match token.tok {
            Tok::Ident(name) => match name.as_str() {
                "string" => Ok(TypeExpr::String),
                "number" | "bigint" => Ok(TypeExpr::Number),
                "boolean" => Ok(TypeExpr::Boolean),
                "readonly" => self.parse_postfix(),
                "keyof" | "typeof" | "unique" | "infer" => {
                    self.parse_postfix()?;
                    Ok(TypeExpr::Unsupported(format!("`{name}` type operator")))
                }
                _ => {
                    let mut full = name;
                    while self.peek_punct('.') {
                        self.pos += 1;
                        match self.next().map(|t| t.tok) {
                            Some(Tok::Ident(part)) => {
                                full.push('.');
                                full.push_str(&part);
                            }
                            _ => {
                                self.pos -= 1;
                                return Err(self.unexpected("identifier"));
                            }
                        }
                    }
                    if self.peek_punct('<') {
                        let mut args = self.parse_type_args()?;
                        if (full == "Array" || full == "ReadonlyArray") && args.len() == 1 {
                            if let Some(element) = args.pop() {
                                return Ok(TypeExpr::Array(Box::new(element)));
                            }
                        }
                    }
                    Ok(TypeExpr::Unsupported(format!("type `{full}`")))
                }
            },
            Tok::Str(_) => Ok(TypeExpr::Unsupported("string literal type".into())),
            Tok::Num(_) => Ok(TypeExpr::Unsupported("number literal type".into())),
            Tok::Punct('-') if matches!(self.peek_at(0), Some(Tok::Num(_))) => {
                self.pos += 1;
                Ok(TypeExpr::Unsupported("number literal type".into()))
            }
            Tok::Punct('{') => Ok(TypeExpr::Object(self.parse_members(token.offset)?)),
            Tok::Punct('[') => {
                self.pos -= 1;
                self.skip_balanced('[', ']')?;
                Ok(TypeExpr::Unsupported("tuple type".into()))
            }
            Tok::Punct('(') => {
                self.pos -= 1;
                self.skip_balanced('(', ')')?;
                if self.peek_at(0) == Some(&Tok::Arrow) {
                    self.pos += 1;
                    self.parse_type()?;
                    Ok(TypeExpr::Unsupported("function type".into()))
                } else {
                    Ok(TypeExpr::Unsupported("parenthesized type".into()))
                }
            }
            Tok::Punct('<') => {
                self.pos -= 1;
                self.skip_balanced('<', '>')?;
                self.parse_primary()?;
                Ok(TypeExpr::Unsupported("generic function type".into()))
            }
            _ => {
                self.pos -= 1;
                Err(self.unexpected("type"))
            }
        }
    }

    fn parse_type_args(&mut self) -> Result<Vec<TypeExpr>, SchemaError> {
        // Opening `<`.
        self.pos += 1;
        let mut args = Vec::new();
        loop {
            args.push(self.parse_type()?);
            if self.eat_punct(',') {
                continue;
            }
            if self.eat_punct('>') {
                return Ok(args);
            }
            return Err(self.unexpected("`,` or `>`"));
        }
    }

    /// Skip a bracketed group starting at the current token.
    fn skip_balanced(&mut self, open: char, close: char) -> Result<(), SchemaError> {
        let start = self.peek().map(|t| t.offset).unwrap_or(self.end);
        let mut depth = 0usize;
        while let Some(token) = self.next() {
            match token.tok {
                Tok::Punct(c) if c == open => depth += 1,
                Tok::Punct(c) if c == close => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(SchemaError::Unterminated {
            what: "bracket",
            offset: start,
        })
    }

    /// Skip to the end of the current member: a `;` or `,` (consumed), a
    /// closing `}` (not consumed), or a token on a new line, all at depth 0.
    fn skip_member(&mut self) {
        let mut depth = 0usize;
        let mut first = true;
        while let Some(token) = self.peek() {
            let punct = match token.tok {
                Tok::Punct(c) => Some(c),
                _ => None,
            };
            let newline_before = token.newline_before;
            if depth == 0 {
                match punct {
                    Some(';' | ',') => {
                        self.pos += 1;
                        return;
                    }
                    Some('}') => return,
                    _ if !first && newline_before => return,
                    _ => {}
                }
            }
            match punct {
                Some('(' | '[' | '{') => depth += 1,
                Some(')' | ']' | '}') => depth = depth.saturating_sub(1),
                _ => {}
            }
            first = false;
            self.pos += 1;
        }
    }
}
