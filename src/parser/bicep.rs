//! Bicep parser.
//!
//! A small hand-written scanner that understands `resource` declarations and
//! the object-literal syntax of their bodies. Everything else (`param`,
//! `var`, `module`, `output`, decorators) is skipped statement by statement.
//! Expressions are not evaluated; they are kept as source text.

use crate::config::Config;
use crate::graph::{RefTarget, Reference};
use crate::parser::{line_column_at, tags_from_value, Parser};
use crate::types::{node_id, AttrValue, Attributes, Diagnostic, Dialect, EdgeHint, ParsedDocument, ResourceNode};

use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

/// `symbol.id`, `symbol.properties.x`, `parent::child.name`, ...
static ACCESSOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b([A-Za-z_][A-Za-z0-9_]*(?:::[A-Za-z_][A-Za-z0-9_]*)*)\.(id|name|properties|location|type|apiVersion)\b",
    )
    .expect("Invalid regex")
});

/// Keys whose expressions are handled as explicit dependencies instead.
const NON_REFERENCE_KEYS: &[&str] = &["dependsOn"];

/// Parser for Bicep files.
pub struct BicepParser {
    skip_type_prefixes: Vec<String>,
}

impl BicepParser {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            skip_type_prefixes: config.graph.skip_type_prefixes.clone(),
        }
    }
}

impl Parser for BicepParser {
    fn dialect(&self) -> Dialect {
        Dialect::Bicep
    }

    fn parse_content(&self, content: &str, file_path: &Path) -> crate::Result<ParsedDocument> {
        let mut doc = ParsedDocument::new(file_path, Dialect::Bicep);
        let mut scanner = Scanner::new(content);
        let (declarations, errors) = scanner.declarations();

        for error in errors {
            tracing::warn!(
                file = %file_path.display(),
                offset = error.offset,
                error = %error.message,
                "Skipping malformed resource declaration"
            );
            let position = line_column_at(content, error.offset);
            doc.diagnostics.push(Diagnostic::ParseError {
                file: file_path.to_path_buf(),
                dialect: Dialect::Bicep,
                message: error.message,
                offset: Some(error.offset),
                line: position.map(|(l, _)| l),
                column: position.map(|(_, c)| c),
            });
        }

        let mut flat = Vec::new();
        flatten(declarations, None, &mut flat);
        flat.retain(|d| {
            !self
                .skip_type_prefixes
                .iter()
                .any(|p| d.resource_type.starts_with(p.as_str()))
        });

        let types: HashMap<String, String> = flat
            .iter()
            .map(|d| (d.symbol.clone(), d.resource_type.clone()))
            .collect();

        for declaration in flat {
            let tags = tags_from_value(declaration.attributes.get("tags"));
            let node = ResourceNode::new(
                Dialect::Bicep,
                declaration.resource_type,
                declaration.symbol,
                declaration.attributes,
                tags,
                file_path,
            );

            let depends_on = node.attributes.get("dependsOn").and_then(AttrValue::as_list);
            for dependency in depends_on.unwrap_or_default().iter().filter_map(AttrValue::as_text) {
                let symbol = last_symbol(dependency.trim());
                match types.get(symbol) {
                    Some(dep_type) => doc.hints.push(EdgeHint::explicit(
                        node_id(Dialect::Bicep, dep_type, symbol),
                        node.id.clone(),
                    )),
                    None => doc.diagnostics.push(Diagnostic::UnresolvedReference {
                        node: node.id.clone(),
                        reference: dependency.to_string(),
                        candidates: Vec::new(),
                    }),
                }
            }

            doc.nodes.push(node);
        }

        Ok(doc)
    }
}

/// Symbolic references made through `parent:` and resource accessors.
pub(crate) fn references(attributes: &Attributes, out: &mut Vec<Reference>) {
    for (key, value) in attributes {
        if NON_REFERENCE_KEYS.contains(&key.as_str()) {
            continue;
        }
        if key == "parent" {
            if let Some(symbol) = value.as_text() {
                push_symbol(last_symbol(symbol.trim()), out);
            }
            continue;
        }
        value.visit_leaves(key, &mut |_, leaf| {
            let AttrValue::Expression { expression } = leaf else {
                return;
            };
            let code = code_portions(expression);
            for caps in ACCESSOR.captures_iter(&code) {
                push_symbol(last_symbol(&caps[1]), out);
            }
        });
    }
}

fn push_symbol(symbol: &str, out: &mut Vec<Reference>) {
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return;
    }
    out.push(Reference {
        text: symbol.to_string(),
        target: RefTarget::Logical(symbol.to_string()),
    });
}

/// `parent::child` refers to `child`.
fn last_symbol(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Blank out literal string text, keeping code and `${...}` interpolations.
fn code_portions(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut chars = expression.chars().peekable();
    let mut in_string = false;
    let mut interpolation_depth = 0usize;

    while let Some(c) = chars.next() {
        if in_string && interpolation_depth == 0 {
            match c {
                '\\' => {
                    chars.next();
                    out.push(' ');
                }
                '\'' => {
                    in_string = false;
                    out.push(' ');
                }
                '$' if chars.peek() == Some(&'{') => {
                    chars.next();
                    interpolation_depth = 1;
                    out.push(' ');
                }
                _ => out.push(' '),
            }
            continue;
        }
        match c {
            '\'' if interpolation_depth == 0 => {
                in_string = true;
                out.push(' ');
            }
            '{' if interpolation_depth > 0 => {
                interpolation_depth += 1;
                out.push(c);
            }
            '}' if interpolation_depth > 0 => {
                interpolation_depth -= 1;
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// A `resource` declaration and its nested child declarations.
#[derive(Debug)]
struct Declaration {
    symbol: String,
    resource_type: String,
    attributes: Attributes,
    children: Vec<Declaration>,
}

/// Flatten nested declarations; children get a qualified type and a `parent` attribute.
fn flatten(declarations: Vec<Declaration>, parent: Option<(&str, &str)>, out: &mut Vec<Declaration>) {
    for mut declaration in declarations {
        if let Some((parent_symbol, parent_type)) = parent {
            if !declaration.resource_type.contains('/') {
                declaration.resource_type = format!("{parent_type}/{}", declaration.resource_type);
            }
            declaration
                .attributes
                .entry("parent".to_string())
                .or_insert_with(|| AttrValue::expression(parent_symbol));
        }
        let children = std::mem::take(&mut declaration.children);
        let symbol = declaration.symbol.clone();
        let resource_type = declaration.resource_type.clone();
        out.push(declaration);
        flatten(children, Some((symbol.as_str(), resource_type.as_str())), out);
    }
}

#[derive(Debug)]
struct ScanError {
    offset: usize,
    message: String,
}

type ScanResult<T> = std::result::Result<T, ScanError>;

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    /// Set when input ends inside the current declaration's body
    truncated: Option<ScanError>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, bytes: src.as_bytes(), pos: 0, truncated: None }
    }

    const fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn error(&self, message: impl Into<String>) -> ScanError {
        ScanError { offset: self.pos.min(self.bytes.len()), message: message.into() }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn expect(&mut self, byte: u8) -> ScanResult<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    /// Skip whitespace, newlines and comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.pos += 1,
                Some(b'/') if self.peek_at(1) == Some(b'/') => self.skip_to_line_end(),
                Some(b'/') if self.peek_at(1) == Some(b'*') => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    /// Skip spaces, tabs and block comments on the current line.
    fn skip_inline_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r') => self.pos += 1,
                Some(b'/') if self.peek_at(1) == Some(b'*') => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    fn skip_to_line_end(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'\n' {
                return;
            }
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while self.pos < self.bytes.len() {
            if self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/') {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            let valid = b == b'_' || b.is_ascii_alphabetic() || (self.pos > start && b.is_ascii_digit());
            if !valid {
                break;
            }
            self.pos += 1;
        }
        let src = self.src;
        (self.pos > start).then(|| &src[start..self.pos])
    }

    fn peek_ident(&mut self) -> Option<&'a str> {
        let start = self.pos;
        let ident = self.ident();
        self.pos = start;
        ident
    }

    /// Skip the rest of a statement: up to a newline outside any brackets.
    fn skip_statement(&mut self) {
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'\'' => {
                    if self.string().is_err() {
                        self.skip_to_line_end();
                    }
                    continue;
                }
                b'/' if self.peek_at(1) == Some(b'/') => self.skip_to_line_end(),
                b'/' if self.peek_at(1) == Some(b'*') => {
                    self.skip_block_comment();
                    continue;
                }
                b'{' | b'[' | b'(' => depth += 1,
                b'}' | b']' | b')' => depth = depth.saturating_sub(1),
                b'\n' if depth == 0 => {
                    self.pos += 1;
                    return;
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    /// Every top-level resource declaration, plus the errors of the ones that could not be read.
    fn declarations(&mut self) -> (Vec<Declaration>, Vec<ScanError>) {
        let mut declarations = Vec::new();
        let mut errors = Vec::new();

        loop {
            self.skip_trivia();
            if self.pos >= self.bytes.len() {
                break;
            }
            let start = self.pos;
            if self.ident() == Some("resource") && matches!(self.peek(), Some(b' ' | b'\t')) {
                match self.declaration() {
                    Ok(declaration) => {
                        // A truncated body still yields what was read before the end.
                        errors.extend(self.truncated.take());
                        declarations.push(declaration);
                    }
                    Err(e) => {
                        self.truncated = None;
                        errors.push(e);
                        self.pos = start;
                        self.skip_to_line_end();
                    }
                }
            } else {
                self.pos = start;
                self.skip_statement();
            }
        }

        (declarations, errors)
    }

    /// `resource <symbol> '<type>@<api>' [existing] = <body>`, after the keyword.
    fn declaration(&mut self) -> ScanResult<Declaration> {
        self.skip_inline_trivia();
        let symbol = self
            .ident()
            .ok_or_else(|| self.error("expected resource symbol name"))?
            .to_string();
        self.skip_inline_trivia();
        let raw_type = match self.string()? {
            Literal::Plain(t) => t,
            Literal::Interpolated(_) => return Err(self.error("resource type must be a plain string")),
        };
        let resource_type = raw_type.split('@').next().unwrap_or_default().to_string();
        if resource_type.is_empty() {
            return Err(self.error("empty resource type"));
        }
        self.skip_inline_trivia();
        if self.peek_ident() == Some("existing") {
            self.ident();
            self.skip_inline_trivia();
        }
        self.expect(b'=')?;
        self.skip_trivia();

        let mut children = Vec::new();
        let attributes = match self.peek() {
            Some(b'{') => self.object(&mut children)?,
            Some(b'[') => {
                // [for item in items: { ... }]
                self.pos += 1;
                self.skip_trivia();
                if self.ident() != Some("for") {
                    return Err(self.error("expected 'for' in resource loop"));
                }
                self.seek_body_start()?;
                let attributes = self.object(&mut children)?;
                if self.truncated.is_none() {
                    self.skip_trivia();
                    self.expect(b']')?;
                }
                attributes
            }
            _ if self.peek_ident() == Some("if") => {
                self.seek_body_start()?;
                self.object(&mut children)?
            }
            _ => return Err(self.error("expected resource body")),
        };

        Ok(Declaration { symbol, resource_type, attributes, children })
    }

    /// Advance to the `{` that opens a conditional or looped resource body.
    fn seek_body_start(&mut self) -> ScanResult<()> {
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'\'' => {
                    self.string()?;
                    continue;
                }
                b'(' | b'[' => depth += 1,
                b')' | b']' => depth = depth.saturating_sub(1),
                b'{' if depth == 0 => return Ok(()),
                _ => {}
            }
            self.pos += 1;
        }
        Err(self.error("unterminated resource declaration"))
    }

    fn object(&mut self, children: &mut Vec<Declaration>) -> ScanResult<Attributes> {
        self.expect(b'{')?;
        let mut attributes = Attributes::new();

        loop {
            self.skip_trivia();
            match self.peek() {
                None => {
                    let error = self.error("unterminated object");
                    self.truncated.get_or_insert(error);
                    return Ok(attributes);
                }
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(attributes);
                }
                Some(b',') => {
                    self.pos += 1;
                    continue;
                }
                Some(b'@') => {
                    self.skip_statement();
                    continue;
                }
                _ => {}
            }

            match self.property(children) {
                Ok(Some((key, value))) => {
                    attributes.insert(key, value);
                }
                Ok(None) => {}
                Err(e) if self.at_end() => {
                    self.truncated.get_or_insert(e);
                    return Ok(attributes);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One `key: value` entry, or `None` when the entry was a nested resource.
    fn property(&mut self, children: &mut Vec<Declaration>) -> ScanResult<Option<(String, AttrValue)>> {
        let key = match self.peek() {
            Some(b'\'') => match self.string()? {
                Literal::Plain(k) => k,
                Literal::Interpolated(_) => return Err(self.error("property name must be a plain string")),
            },
            _ => {
                let key = self.ident().ok_or_else(|| self.error("expected property name"))?;
                if key == "resource" && matches!(self.peek(), Some(b' ' | b'\t')) {
                    let resume = self.pos;
                    self.skip_inline_trivia();
                    if self.peek() != Some(b':') {
                        self.pos = resume;
                        children.push(self.declaration()?);
                        return Ok(None);
                    }
                    self.pos = resume;
                }
                key.to_string()
            }
        };

        self.skip_inline_trivia();
        self.expect(b':')?;
        self.skip_inline_trivia();
        let value = self.value(children)?;
        Ok(Some((key, value)))
    }

    fn array(&mut self, children: &mut Vec<Declaration>) -> ScanResult<AttrValue> {
        let start = self.pos;
        self.expect(b'[')?;
        self.skip_trivia();
        if self.peek_ident() == Some("for") {
            self.pos = start;
            return Ok(AttrValue::expression(self.raw_expression()?));
        }

        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => {
                    let error = self.error("unterminated array");
                    self.truncated.get_or_insert(error);
                    return Ok(AttrValue::List(items));
                }
                Some(b']') => {
                    self.pos += 1;
                    return Ok(AttrValue::List(items));
                }
                Some(b',') => self.pos += 1,
                _ => items.push(self.value(children)?),
            }
        }
    }

    fn value(&mut self, children: &mut Vec<Declaration>) -> ScanResult<AttrValue> {
        match self.peek() {
            Some(b'{') => Ok(AttrValue::Map(self.object(children)?)),
            Some(b'[') => self.array(children),
            Some(b'\'') => {
                let start = self.pos;
                let literal = self.string()?;
                self.skip_inline_trivia();
                if matches!(self.peek(), None | Some(b'\n' | b',' | b'}' | b']'))
                    || (self.peek() == Some(b'/') && self.peek_at(1) == Some(b'/'))
                {
                    return Ok(match literal {
                        Literal::Plain(s) => AttrValue::String(s),
                        Literal::Interpolated(raw) => AttrValue::expression(raw),
                    });
                }
                // A string operand of a larger expression.
                self.pos = start;
                Ok(AttrValue::expression(self.raw_expression()?))
            }
            _ => {
                let raw = self.raw_expression()?;
                Ok(classify(raw))
            }
        }
    }

    /// Source text up to the end of the current value.
    fn raw_expression(&mut self) -> ScanResult<&'a str> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'\'' => {
                    self.string()?;
                    continue;
                }
                b'/' if self.peek_at(1) == Some(b'/') && depth == 0 => break,
                b'{' | b'[' | b'(' => depth += 1,
                b'}' | b']' | b')' if depth == 0 => break,
                b'}' | b']' | b')' => depth -= 1,
                b'\n' | b',' if depth == 0 => break,
                _ => {}
            }
            self.pos += 1;
        }
        let src = self.src;
        let raw = src[start..self.pos].trim();
        if raw.is_empty() {
            return Err(self.error("expected value"));
        }
        Ok(raw)
    }

    /// A single-quoted string, or a `'''` multi-line string.
    fn string(&mut self) -> ScanResult<Literal> {
        let start = self.pos;
        if self.src[self.pos..].starts_with("'''") {
            let body_start = self.pos + 3;
            let Some(end) = self.src[body_start..].find("'''") else {
                return Err(self.error("unterminated multi-line string"));
            };
            self.pos = body_start + end + 3;
            return Ok(Literal::Plain(self.src[body_start..body_start + end].to_string()));
        }

        self.expect(b'\'')?;
        let mut text = String::new();
        let mut interpolated = false;
        loop {
            match self.peek() {
                None => {
                    let error = ScanError { offset: start, message: "unterminated string".to_string() };
                    self.pos = self.bytes.len();
                    return Err(error);
                }
                Some(b'\n') => {
                    self.pos = start;
                    return Err(self.error("unterminated string"));
                }
                Some(b'\\') => {
                    let Some(escaped) = self.src[self.pos + 1..].chars().next() else {
                        let error = ScanError { offset: start, message: "unterminated string".to_string() };
                        self.pos = self.bytes.len();
                        return Err(error);
                    };
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                    self.pos += 1 + escaped.len_utf8();
                }
                Some(b'\'') => {
                    self.pos += 1;
                    break;
                }
                Some(b'$') if self.peek_at(1) == Some(b'{') => {
                    interpolated = true;
                    self.pos += 2;
                    self.skip_interpolation()?;
                }
                Some(_) => {
                    let ch = self.src[self.pos..].chars().next().unwrap_or_default();
                    text.push(ch);
                    self.pos += ch.len_utf8().max(1);
                }
            }
        }

        if interpolated {
            Ok(Literal::Interpolated(self.src[start..self.pos].to_string()))
        } else {
            Ok(Literal::Plain(text))
        }
    }

    /// Skip the inside of `${ ... }`, just after the opening brace.
    fn skip_interpolation(&mut self) -> ScanResult<()> {
        let mut depth = 1usize;
        while let Some(b) = self.peek() {
            match b {
                b'\'' => {
                    self.string()?;
                    continue;
                }
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Ok(());
                    }
                }
                b'\n' => break,
                _ => {}
            }
            self.pos += 1;
        }
        Err(self.error("unterminated interpolation"))
    }
}

enum Literal {
    Plain(String),
    /// Raw source including quotes
    Interpolated(String),
}

fn classify(raw: &str) -> AttrValue {
    match raw {
        "true" => AttrValue::Bool(true),
        "false" => AttrValue::Bool(false),
        "null" => AttrValue::Null,
        _ if raw.starts_with(|c: char| c.is_ascii_digit() || c == '-') => raw
            .parse::<f64>()
            .map_or_else(|_| AttrValue::expression(raw), AttrValue::Number),
        _ => AttrValue::expression(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> ParsedDocument {
        BicepParser::new(&Config::default())
            .parse_content(content, Path::new("main.bicep"))
            .unwrap()
    }

    fn refs(node: &ResourceNode) -> Vec<String> {
        let mut out = Vec::new();
        references(&node.attributes, &mut out);
        out.into_iter().map(|r| r.text).collect()
    }

    const TEMPLATE: &str = r#"
@description('Deployment location')
param location string = resourceGroup().location

var prefix = 'demo'

resource vnet 'Microsoft.Network/virtualNetworks@2023-04-01' = {
  name: '${prefix}-vnet'
  location: location
  tags: {
    Name: 'main-vnet'
  }
  properties: {
    addressSpace: {
      addressPrefixes: [
        '10.0.0.0/16'
      ]
    }
  }

  resource app 'subnets' = {
    name: 'app'
    properties: {
      addressPrefix: '10.0.1.0/24'
    }
  }
}

resource nic 'Microsoft.Network/networkInterfaces@2023-04-01' = {
  name: 'nic-web' // primary NIC
  location: location
  properties: {
    ipConfigurations: [
      {
        name: 'ipconfig1'
        properties: {
          subnet: {
            id: vnet::app.id
          }
          privateIPAllocationMethod: 'Dynamic'
        }
      }
    ]
  }
  dependsOn: [
    vnet
  ]
}

resource storage 'Microsoft.Storage/storageAccounts@2023-01-01' = if (deployStorage) {
  name: 'st${uniqueString(resourceGroup().id)}'
  kind: 'StorageV2'
  properties: {
    supportsHttpsTrafficOnly: true
    minimumTlsVersion: 'TLS1_2'
  }
}

output nicId string = nic.id
"#;

    #[test]
    fn test_parse_declarations() {
        let doc = parse(TEMPLATE);
        let ids: Vec<&str> = doc.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "bicep:Microsoft.Network/virtualNetworks:vnet",
                "bicep:Microsoft.Network/virtualNetworks/subnets:app",
                "bicep:Microsoft.Network/networkInterfaces:nic",
                "bicep:Microsoft.Storage/storageAccounts:storage",
            ]
        );
        assert!(doc.diagnostics.is_empty(), "{:?}", doc.diagnostics);
        assert_eq!(doc.nodes[0].display_name, "main-vnet");
        assert_eq!(doc.nodes[0].provider, "azure");
    }

    #[test]
    fn test_attribute_values() {
        let doc = parse(TEMPLATE);
        let vnet = &doc.nodes[0];
        assert_eq!(vnet.attributes["name"], AttrValue::expression("'${prefix}-vnet'"));
        assert_eq!(vnet.attributes["location"], AttrValue::expression("location"));

        let storage = &doc.nodes[3];
        assert_eq!(storage.attributes["kind"], AttrValue::String("StorageV2".to_string()));
        let props = storage.attributes["properties"].as_map().unwrap();
        assert_eq!(props["supportsHttpsTrafficOnly"], AttrValue::Bool(true));

        let nic = &doc.nodes[2];
        assert_eq!(nic.attributes["name"], AttrValue::String("nic-web".to_string()));
    }

    #[test]
    fn test_nested_child_gets_parent() {
        let doc = parse(TEMPLATE);
        let subnet = &doc.nodes[1];
        assert_eq!(subnet.attributes["parent"], AttrValue::expression("vnet"));
        assert_eq!(refs(subnet), vec!["vnet"]);
    }

    #[test]
    fn test_references_and_depends_on() {
        let doc = parse(TEMPLATE);
        assert_eq!(refs(&doc.nodes[2]), vec!["app"]);
        assert_eq!(doc.hints.len(), 1);
        assert_eq!(doc.hints[0].from, "bicep:Microsoft.Network/virtualNetworks:vnet");
        assert_eq!(doc.hints[0].to, "bicep:Microsoft.Network/networkInterfaces:nic");
        assert!(refs(&doc.nodes[3]).is_empty());
    }

    #[test]
    fn test_malformed_declaration_is_reported() {
        let content = "resource bad 'Microsoft.Web/sites@2022-03-01' = {\n  name 'x'\n}\n\nresource ok 'Microsoft.Web/serverfarms@2022-03-01' = {\n  name: 'plan'\n}\n";
        let doc = parse(content);
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.nodes[0].logical_name, "ok");
        assert_eq!(doc.diagnostics.len(), 1);
        match &doc.diagnostics[0] {
            Diagnostic::ParseError { line, .. } => assert_eq!(*line, Some(2)),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_body_keeps_partial_resource() {
        let content = "resource vnet 'Microsoft.Network/virtualNetworks@2023-04-01' = {\n  name: 'hub'\n  location: 'westeurope'\n";
        let doc = parse(content);
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.nodes[0].attributes["name"], AttrValue::String("hub".to_string()));
        assert_eq!(doc.nodes[0].attributes["location"], AttrValue::String("westeurope".to_string()));
        assert_eq!(doc.diagnostics.len(), 1);
        match &doc.diagnostics[0] {
            Diagnostic::ParseError { offset, .. } => assert_eq!(*offset, Some(content.len())),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_nested_child_keeps_parent_and_child() {
        let content = "resource vnet 'Microsoft.Network/virtualNetworks@2023-04-01' = {\n  name: 'hub'\n  resource app 'subnets' = {\n    name: 'app'\n    properties: {\n      addressPrefix: '10.0.";
        let doc = parse(content);
        let ids: Vec<&str> = doc.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "bicep:Microsoft.Network/virtualNetworks:vnet",
                "bicep:Microsoft.Network/virtualNetworks/subnets:app",
            ]
        );
        assert_eq!(doc.diagnostics.len(), 1);
    }

    #[test]
    fn test_multibyte_escape() {
        let doc = parse("resource site 'Microsoft.Web/sites@2022-03-01' = {\n  name: '\\é-app'\n  kind: 'app'\n}\n");
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.nodes[0].attributes["name"], AttrValue::String("é-app".to_string()));
        assert_eq!(doc.nodes[0].attributes["kind"], AttrValue::String("app".to_string()));
        assert!(doc.diagnostics.is_empty());
    }

    #[test]
    fn test_resource_loop() {
        let doc = parse(
            "resource vms 'Microsoft.Compute/virtualMachines@2023-03-01' = [for i in range(0, 2): {\n  name: 'vm${i}'\n}]\n",
        );
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.nodes[0].id, "bicep:Microsoft.Compute/virtualMachines:vms");
    }

    #[test]
    fn test_code_portions() {
        assert_eq!(code_portions("'www.name.com'").trim(), "");
        assert!(code_portions("'${stg.name}-x'").contains("stg.name"));
    }
}
