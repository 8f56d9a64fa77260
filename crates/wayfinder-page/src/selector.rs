//! CSS selector subset.
//!
//! Supported: type, universal, `#id`, `.class`, attribute selectors
//! (`[a]`, `[a=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`, `[a~=v]`), the pseudo
//! classes `:first-child`, `:last-child`, `:first-of-type`, `:last-of-type`,
//! `:nth-child(n)` and `:nth-of-type(n)`, descendant and child combinators,
//! and comma-separated groups. Backslash escapes are honoured in
//! identifiers.

use wayfinder_protocols::SurfaceError;

use crate::dom::PageTree;

/// Comma-separated selector group.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList(pub Vec<Selector>);

/// One complex selector: compounds joined by combinators.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    /// Compounds left to right; each carries its relation to the previous one.
    parts: Vec<(Relation, Compound)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    None,
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone, PartialEq)]
struct AttrSelector {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, PartialEq)]
enum AttrOp {
    Exists,
    Equals(String),
    Prefix(String),
    Suffix(String),
    Substring(String),
    Word(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Pseudo {
    NthChild(usize),
    NthOfType(usize),
    LastChild,
    LastOfType,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self, SurfaceError> {
        let mut parser = Parser {
            chars: input.chars().collect(),
            pos: 0,
            source: input,
        };
        parser.parse_list()
    }

    /// Whether any selector of the group matches `node`.
    pub fn matches(&self, tree: &PageTree, node: usize) -> bool {
        self.0.iter().any(|s| s.matches(tree, node))
    }

    /// Matching attached nodes in document order.
    pub fn query_all(&self, tree: &PageTree) -> Vec<usize> {
        tree.document_order()
            .into_iter()
            .filter(|n| self.matches(tree, *n))
            .collect()
    }
}

impl Selector {
    pub fn matches(&self, tree: &PageTree, node: usize) -> bool {
        match self.parts.len() {
            0 => false,
            n => self.matches_at(tree, node, n - 1),
        }
    }

    fn matches_at(&self, tree: &PageTree, node: usize, index: usize) -> bool {
        let (relation, compound) = &self.parts[index];
        if !compound.matches(tree, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match relation {
            Relation::Child => tree
                .node(node)
                .and_then(|n| n.parent)
                .is_some_and(|p| self.matches_at(tree, p, index - 1)),
            Relation::Descendant | Relation::None => tree
                .ancestors(node)
                .into_iter()
                .any(|a| self.matches_at(tree, a, index - 1)),
        }
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.ids.is_empty()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudos.is_empty()
    }

    fn matches(&self, tree: &PageTree, id: usize) -> bool {
        let Some(node) = tree.node(id) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if tag != "*" && *tag != node.tag {
                return false;
            }
        }
        if !self
            .ids
            .iter()
            .all(|i| node.attributes.id.as_deref() == Some(i.as_str()))
        {
            return false;
        }
        if !self.classes.iter().all(|c| node.attributes.has_class(c)) {
            return false;
        }
        if !self.attrs.iter().all(|a| a.matches(node.attributes.get(&a.name))) {
            return false;
        }
        self.pseudos.iter().all(|p| p.matches(tree, id))
    }
}

impl AttrSelector {
    fn matches(&self, value: Option<String>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match &self.op {
            AttrOp::Exists => true,
            AttrOp::Equals(v) => value == *v,
            AttrOp::Prefix(v) => !v.is_empty() && value.starts_with(v.as_str()),
            AttrOp::Suffix(v) => !v.is_empty() && value.ends_with(v.as_str()),
            AttrOp::Substring(v) => !v.is_empty() && value.contains(v.as_str()),
            AttrOp::Word(v) => value.split_whitespace().any(|w| w == v),
        }
    }
}

impl Pseudo {
    fn matches(&self, tree: &PageTree, id: usize) -> bool {
        let Some(node) = tree.node(id) else {
            return false;
        };
        let siblings: Vec<usize> = match node.parent.and_then(|p| tree.node(p)) {
            Some(parent) => parent.children.clone(),
            None => vec![id],
        };
        let same_type: Vec<usize> = siblings
            .iter()
            .copied()
            .filter(|s| tree.node(*s).is_some_and(|n| n.tag == node.tag))
            .collect();
        let one_based = |list: &[usize]| list.iter().position(|s| *s == id).map(|p| p + 1);
        match self {
            Pseudo::NthChild(n) => one_based(&siblings) == Some(*n),
            Pseudo::NthOfType(n) => one_based(&same_type) == Some(*n),
            Pseudo::LastChild => siblings.last() == Some(&id),
            Pseudo::LastOfType => same_type.last() == Some(&id),
        }
    }
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> SurfaceError {
        SurfaceError::invalid_selector(self.source, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(&mut self) -> Result<SelectorList, SurfaceError> {
        let mut selectors = vec![self.parse_complex()?];
        while self.peek() == Some(',') {
            self.pos += 1;
            selectors.push(self.parse_complex()?);
        }
        if self.pos < self.chars.len() {
            return Err(self.error(format!("unexpected character at {}", self.pos)));
        }
        Ok(SelectorList(selectors))
    }

    fn parse_complex(&mut self) -> Result<Selector, SurfaceError> {
        self.skip_ws();
        let mut parts = Vec::new();
        let mut relation = Relation::None;
        loop {
            let compound = self.parse_compound()?;
            if compound.is_empty() {
                return Err(self.error("expected a selector"));
            }
            parts.push((relation, compound));

            let had_ws = self.skip_ws();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    relation = Relation::Child;
                }
                Some('+') | Some('~') => {
                    return Err(self.error("sibling combinators are not supported"));
                }
                Some(_) if had_ws => relation = Relation::Descendant,
                Some(c) => return Err(self.error(format!("unexpected `{}`", c))),
            }
        }
        Ok(Selector { parts })
    }

    fn parse_compound(&mut self) -> Result<Compound, SurfaceError> {
        let mut compound = Compound::default();
        if self.peek() == Some('*') {
            self.pos += 1;
            compound.tag = Some("*".to_string());
        } else if self.peek().is_some_and(is_ident_start) {
            compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.ids.push(self.parse_ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.parse_attr()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.pseudos.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String, SurfaceError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                match self.peek() {
                    Some(escaped) => {
                        out.push(escaped);
                        self.pos += 1;
                    }
                    None => return Err(self.error("dangling escape")),
                }
            } else if c.is_alphanumeric() || c == '-' || c == '_' {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(self.error(format!("expected identifier at {}", self.pos)));
        }
        Ok(out)
    }

    fn parse_attr(&mut self) -> Result<AttrSelector, SurfaceError> {
        self.skip_ws();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_ws();
        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrSelector {
                    name,
                    op: AttrOp::Exists,
                });
            }
            Some('=') => {
                self.pos += 1;
                "="
            }
            Some(c @ ('^' | '$' | '*' | '~')) => {
                self.pos += 1;
                if self.peek() != Some('=') {
                    return Err(self.error("expected `=`"));
                }
                self.pos += 1;
                match c {
                    '^' => "^=",
                    '$' => "$=",
                    '*' => "*=",
                    _ => "~=",
                }
            }
            _ => return Err(self.error("malformed attribute selector")),
        };
        self.skip_ws();
        let value = self.parse_value()?;
        self.skip_ws();
        if self.peek() != Some(']') {
            return Err(self.error("expected `]`"));
        }
        self.pos += 1;
        let op = match op {
            "=" => AttrOp::Equals(value),
            "^=" => AttrOp::Prefix(value),
            "$=" => AttrOp::Suffix(value),
            "*=" => AttrOp::Substring(value),
            _ => AttrOp::Word(value),
        };
        Ok(AttrSelector { name, op })
    }

    fn parse_value(&mut self) -> Result<String, SurfaceError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut out = String::new();
                loop {
                    match self.peek() {
                        Some(c) if c == quote => {
                            self.pos += 1;
                            return Ok(out);
                        }
                        Some('\\') => {
                            self.pos += 1;
                            if let Some(c) = self.peek() {
                                out.push(c);
                                self.pos += 1;
                            }
                        }
                        Some(c) => {
                            out.push(c);
                            self.pos += 1;
                        }
                        None => return Err(self.error("unterminated string")),
                    }
                }
            }
            _ => self.parse_ident(),
        }
    }

    fn parse_pseudo(&mut self) -> Result<Pseudo, SurfaceError> {
        let name = self.parse_ident()?.to_ascii_lowercase();
        match name.as_str() {
            "first-child" => Ok(Pseudo::NthChild(1)),
            "last-child" => Ok(Pseudo::LastChild),
            "first-of-type" => Ok(Pseudo::NthOfType(1)),
            "last-of-type" => Ok(Pseudo::LastOfType),
            "nth-child" | "nth-of-type" => {
                if self.peek() != Some('(') {
                    return Err(self.error("expected `(`"));
                }
                self.pos += 1;
                self.skip_ws();
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                let n = digits
                    .parse::<usize>()
                    .map_err(|_| self.error("only numeric nth arguments are supported"))?;
                self.skip_ws();
                if self.peek() != Some(')') {
                    return Err(self.error("expected `)`"));
                }
                self.pos += 1;
                Ok(if name == "nth-child" {
                    Pseudo::NthChild(n)
                } else {
                    Pseudo::NthOfType(n)
                })
            }
            other => Err(self.error(format!("unsupported pseudo-class :{}", other))),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-' || c == '\\'
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
