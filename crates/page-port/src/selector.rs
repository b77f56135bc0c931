//! Minimal CSS selector support.
//!
//! Handles what listing pages need: type, `#id`, `.class` and attribute
//! conditions (`[a]`, `[a=v]`, `[a*=v]`, `[a^=v]`, `[a$=v]`, `[a~=v]`)
//! combined into compounds joined by the descendant combinator, plus
//! comma-separated lists. Child and sibling combinators are rejected.

use jobfilter_core_types::NodeRef;

use crate::errors::PortError;

/// Read-only view of an element tree used for matching.
pub trait ElementView {
    fn tag(&self, node: NodeRef) -> Option<&str>;
    fn attr(&self, node: NodeRef, name: &str) -> Option<&str>;
    fn parent(&self, node: NodeRef) -> Option<NodeRef>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
    Suffix(String),
    Word(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AttrCondition {
    name: String,
    op: AttrOp,
}

impl AttrCondition {
    fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match &self.op {
            AttrOp::Exists => true,
            AttrOp::Equals(expected) => value == expected,
            AttrOp::Contains(part) => !part.is_empty() && value.contains(part.as_str()),
            AttrOp::Prefix(part) => !part.is_empty() && value.starts_with(part.as_str()),
            AttrOp::Suffix(part) => !part.is_empty() && value.ends_with(part.as_str()),
            AttrOp::Word(word) => value.split_whitespace().any(|w| w == word),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
}

impl Compound {
    fn matches<V: ElementView + ?Sized>(&self, view: &V, node: NodeRef) -> bool {
        if let Some(tag) = &self.tag {
            if view.tag(node) != Some(tag.as_str()) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if view.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = view.attr(node, "class").unwrap_or_default();
            if !self
                .classes
                .iter()
                .all(|class| class_attr.split_whitespace().any(|c| c == class))
            {
                return false;
            }
        }
        self.attrs
            .iter()
            .all(|cond| cond.matches(view.attr(node, &cond.name)))
    }
}

/// A parsed selector list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Vec<Compound>>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, PortError> {
        let mut alternatives = Vec::new();
        for part in input.split(',') {
            let chars: Vec<char> = part.chars().collect();
            let complex = Parser {
                source: input,
                chars: &chars,
                pos: 0,
            }
            .complex()?;
            alternatives.push(complex);
        }
        Ok(Self {
            source: input.to_string(),
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches<V: ElementView + ?Sized>(&self, view: &V, node: NodeRef) -> bool {
        self.alternatives
            .iter()
            .any(|complex| matches_complex(complex, view, node))
    }
}

fn matches_complex<V: ElementView + ?Sized>(parts: &[Compound], view: &V, node: NodeRef) -> bool {
    let Some((last, rest)) = parts.split_last() else {
        return false;
    };
    if !last.matches(view, node) {
        return false;
    }
    // Descendant-only chains match greedily against the nearest ancestor.
    let mut current = node;
    for compound in rest.iter().rev() {
        loop {
            match view.parent(current) {
                None => return false,
                Some(parent) => {
                    current = parent;
                    if compound.matches(view, parent) {
                        break;
                    }
                }
            }
        }
    }
    true
}

struct Parser<'a> {
    source: &'a str,
    chars: &'a [char],
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: impl Into<String>) -> PortError {
        PortError::invalid_selector(self.source, reason)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn complex(mut self) -> Result<Vec<Compound>, PortError> {
        let mut compounds = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => break,
                Some('>' | '+' | '~') => {
                    return Err(self.error("only the descendant combinator is supported"))
                }
                Some(_) => compounds.push(self.compound()?),
            }
        }
        if compounds.is_empty() {
            return Err(self.error("empty selector"));
        }
        Ok(compounds)
    }

    fn compound(&mut self) -> Result<Compound, PortError> {
        let mut compound = Compound::default();
        let start = self.pos;
        if self.peek() == Some('*') {
            self.pos += 1;
        } else if self.peek().is_some_and(is_ident_char) {
            compound.tag = Some(self.ident()?.to_ascii_lowercase());
        }
        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                '#' => {
                    self.pos += 1;
                    compound.id = Some(self.ident()?);
                }
                '[' => {
                    self.pos += 1;
                    compound.attrs.push(self.attribute()?);
                }
                c if c.is_whitespace() => break,
                other => return Err(self.error(format!("unexpected '{other}'"))),
            }
        }
        if self.pos == start {
            return Err(self.error("expected a compound selector"));
        }
        Ok(compound)
    }

    fn ident(&mut self) -> Result<String, PortError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn attribute(&mut self) -> Result<AttrCondition, PortError> {
        self.skip_ws();
        let name = self.ident()?;
        self.skip_ws();
        let op_char = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrCondition {
                    name,
                    op: AttrOp::Exists,
                });
            }
            Some(c @ ('*' | '^' | '$' | '~')) => {
                self.pos += 1;
                Some(c)
            }
            Some('=') => None,
            _ => return Err(self.error("malformed attribute condition")),
        };
        if self.peek() != Some('=') {
            return Err(self.error("expected '='"));
        }
        self.pos += 1;
        self.skip_ws();
        let value = self.value()?;
        self.skip_ws();
        if self.peek() != Some(']') {
            return Err(self.error("expected ']'"));
        }
        self.pos += 1;
        let op = match op_char {
            None => AttrOp::Equals(value),
            Some('*') => AttrOp::Contains(value),
            Some('^') => AttrOp::Prefix(value),
            Some('$') => AttrOp::Suffix(value),
            _ => AttrOp::Word(value),
        };
        Ok(AttrCondition { name, op })
    }

    fn value(&mut self) -> Result<String, PortError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(self.error("unterminated string"));
                }
                let value = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                Ok(value)
            }
            _ => self.ident(),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}
