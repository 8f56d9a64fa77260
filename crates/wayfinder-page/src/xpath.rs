//! XPath subset.
//!
//! Location paths built from `/` and `//` steps with element name tests or
//! `*`, and predicates: a position (`[2]`, `[last()]`), attribute presence or
//! equality (`[@id]`, `[@id='x']`), text equality (`[text()='x']`,
//! `[normalize-space()='x']`, `[.='x']`) and `contains(text()|@a|., 'x')`.
//! Predicates may be joined with `and`.

use wayfinder_protocols::SurfaceError;

use crate::dom::PageTree;

/// Parsed location path.
#[derive(Debug, Clone, PartialEq)]
pub struct XPath {
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    descendant: bool,
    name: String,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Position(usize),
    Last,
    HasAttr(String),
    AttrEquals(String, String),
    TextEquals(String),
    StringEquals(String),
    Contains(Operand, String),
    And(Box<Predicate>, Box<Predicate>),
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Text,
    Attr(String),
    StringValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Document,
    Node(usize),
}

impl XPath {
    pub fn parse(input: &str) -> Result<Self, SurfaceError> {
        let mut parser = Parser {
            chars: input.trim().chars().collect(),
            pos: 0,
            source: input,
        };
        let steps = parser.parse_path()?;
        Ok(Self { steps })
    }

    /// Every selected node in document order.
    pub fn select(&self, tree: &PageTree) -> Vec<usize> {
        let mut context = vec![Context::Document];
        for step in &self.steps {
            let mut next = Vec::new();
            let expanded = if step.descendant {
                descendant_or_self(tree, &context)
            } else {
                context.clone()
            };
            for ctx in expanded {
                let children: Vec<usize> = match ctx {
                    Context::Document => vec![tree.root()],
                    Context::Node(id) => tree.node(id).map(|n| n.children.clone()).unwrap_or_default(),
                };
                let mut candidates: Vec<usize> = children
                    .into_iter()
                    .filter(|c| step.name == "*" || tree.node(*c).is_some_and(|n| n.tag == step.name))
                    .collect();
                for predicate in &step.predicates {
                    let size = candidates.len();
                    candidates = candidates
                        .iter()
                        .enumerate()
                        .filter(|(i, c)| predicate.eval(tree, **c, i + 1, size))
                        .map(|(_, c)| *c)
                        .collect();
                }
                next.extend(candidates.into_iter().map(Context::Node));
            }
            context = dedupe_in_order(tree, next);
        }
        context
            .into_iter()
            .filter_map(|c| match c {
                Context::Node(id) => Some(id),
                Context::Document => None,
            })
            .collect()
    }

    /// First selected node.
    pub fn select_first(&self, tree: &PageTree) -> Option<usize> {
        self.select(tree).into_iter().next()
    }
}

fn descendant_or_self(tree: &PageTree, context: &[Context]) -> Vec<Context> {
    let mut out = Vec::new();
    for ctx in context {
        out.push(*ctx);
        let start = match ctx {
            Context::Document => {
                out.push(Context::Node(tree.root()));
                tree.root()
            }
            Context::Node(id) => *id,
        };
        out.extend(tree.descendants(start).into_iter().map(Context::Node));
    }
    dedupe_in_order(tree, out)
}

fn dedupe_in_order(tree: &PageTree, nodes: Vec<Context>) -> Vec<Context> {
    let order = tree.document_order();
    let rank = |c: &Context| match c {
        Context::Document => 0,
        Context::Node(id) => order.iter().position(|n| n == id).map(|p| p + 1).unwrap_or(usize::MAX),
    };
    let mut ranked: Vec<(usize, Context)> = nodes.into_iter().map(|c| (rank(&c), c)).collect();
    ranked.sort_by_key(|(r, _)| *r);
    ranked.dedup_by_key(|(_, c)| *c);
    ranked.into_iter().map(|(_, c)| c).collect()
}

impl Predicate {
    fn eval(&self, tree: &PageTree, node: usize, position: usize, size: usize) -> bool {
        let Some(n) = tree.node(node) else {
            return false;
        };
        match self {
            Predicate::Position(p) => position == *p,
            Predicate::Last => position == size,
            Predicate::HasAttr(name) => n.attributes.get(name).is_some(),
            Predicate::AttrEquals(name, value) => n.attributes.get(name).as_deref() == Some(value),
            Predicate::TextEquals(value) => n.text.trim() == value.trim(),
            Predicate::StringEquals(value) => normalize(&tree.text_content(node)) == normalize(value),
            Predicate::Contains(operand, value) => {
                let haystack = match operand {
                    Operand::Text => n.text.clone(),
                    Operand::Attr(name) => n.attributes.get(name).unwrap_or_default(),
                    Operand::StringValue => tree.text_content(node),
                };
                haystack.contains(value.as_str())
            }
            Predicate::And(a, b) => {
                a.eval(tree, node, position, size) && b.eval(tree, node, position, size)
            }
        }
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> SurfaceError {
        SurfaceError::invalid_xpath(self.source, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, s: &str) -> bool {
        let needle: Vec<char> = s.chars().collect();
        if self.chars[self.pos..].starts_with(&needle) {
            self.pos += needle.len();
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

    fn expect(&mut self, s: &str) -> Result<(), SurfaceError> {
        self.skip_ws();
        if self.eat(s) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{}` at {}", s, self.pos)))
        }
    }

    fn parse_path(&mut self) -> Result<Vec<Step>, SurfaceError> {
        if self.peek() != Some('/') {
            return Err(self.error("only absolute location paths are supported"));
        }
        let mut steps = Vec::new();
        while self.pos < self.chars.len() {
            let descendant = if self.eat("//") {
                true
            } else if self.eat("/") {
                false
            } else {
                return Err(self.error(format!("expected `/` at {}", self.pos)));
            };
            steps.push(self.parse_step(descendant)?);
        }
        if steps.is_empty() {
            return Err(self.error("empty path"));
        }
        Ok(steps)
    }

    fn parse_step(&mut self, descendant: bool) -> Result<Step, SurfaceError> {
        let name = if self.eat("*") {
            "*".to_string()
        } else {
            self.parse_name()?.to_ascii_lowercase()
        };
        let mut predicates = Vec::new();
        while self.peek() == Some('[') {
            self.pos += 1;
            let predicate = self.parse_predicate()?;
            self.expect("]")?;
            predicates.push(predicate);
        }
        Ok(Step {
            descendant,
            name,
            predicates,
        })
    }

    fn parse_name(&mut self) -> Result<String, SurfaceError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error(format!("expected name at {}", self.pos)));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_predicate(&mut self) -> Result<Predicate, SurfaceError> {
        let first = self.parse_term()?;
        self.skip_ws();
        if self.eat("and") {
            self.skip_ws();
            let rest = self.parse_predicate()?;
            return Ok(Predicate::And(Box::new(first), Box::new(rest)));
        }
        Ok(first)
    }

    fn parse_term(&mut self) -> Result<Predicate, SurfaceError> {
        self.skip_ws();
        if self.peek().is_some_and(|c| c.is_ascii_digit()) {
            let start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
            let digits: String = self.chars[start..self.pos].iter().collect();
            return digits
                .parse::<usize>()
                .map(Predicate::Position)
                .map_err(|_| self.error("invalid position"));
        }
        if self.eat("last()") {
            return Ok(Predicate::Last);
        }
        if self.eat("contains(") {
            self.skip_ws();
            let operand = self.parse_operand()?;
            self.expect(",")?;
            self.skip_ws();
            let value = self.parse_literal()?;
            self.expect(")")?;
            return Ok(Predicate::Contains(operand, value));
        }
        let operand = self.parse_operand()?;
        self.skip_ws();
        if !self.eat("=") {
            return match operand {
                Operand::Attr(name) => Ok(Predicate::HasAttr(name)),
                _ => Err(self.error("expected `=`")),
            };
        }
        self.skip_ws();
        let value = self.parse_literal()?;
        Ok(match operand {
            Operand::Attr(name) => Predicate::AttrEquals(name, value),
            Operand::Text => Predicate::TextEquals(value),
            Operand::StringValue => Predicate::StringEquals(value),
        })
    }

    fn parse_operand(&mut self) -> Result<Operand, SurfaceError> {
        if self.eat("@") {
            return Ok(Operand::Attr(self.parse_name()?.to_ascii_lowercase()));
        }
        if self.eat("text()") {
            return Ok(Operand::Text);
        }
        if self.eat("normalize-space()") || self.eat(".") {
            return Ok(Operand::StringValue);
        }
        Err(self.error(format!("unsupported expression at {}", self.pos)))
    }

    fn parse_literal(&mut self) -> Result<String, SurfaceError> {
        let Some(quote @ ('\'' | '"')) = self.peek() else {
            return Err(self.error("expected string literal"));
        };
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|c| c != quote) {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(self.error("unterminated string literal"));
        }
        let value: String = self.chars[start..self.pos].iter().collect();
        self.pos += 1;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::NodeSpec;

    fn tree() -> PageTree {
        PageTree::from_spec(
            &NodeSpec::new("html").child(
                NodeSpec::new("body")
                    .child(
                        NodeSpec::new("div")
                            .id("a")
                            .child(NodeSpec::new("button").text("Cancel"))
                            .child(NodeSpec::new("button").class("primary").text(" Save ")),
                    )
                    .child(NodeSpec::new("div").id("b").child(NodeSpec::new("button").text("Close"))),
            ),
        )
    }

    fn text_of(tree: &PageTree, id: Option<usize>) -> String {
        id.and_then(|i| tree.node(i)).map(|n| n.text.trim().to_string()).unwrap_or_default()
    }

    #[test]
    fn test_absolute_path_with_positions() {
        let tree = tree();
        let xpath = XPath::parse("/html/body/div[1]/button[2]").unwrap();
        assert_eq!(text_of(&tree, xpath.select_first(&tree)), "Save");

        let xpath = XPath::parse("/html/body/div[2]/button").unwrap();
        assert_eq!(text_of(&tree, xpath.select_first(&tree)), "Close");
    }

    #[test]
    fn test_descendant_positions_are_per_parent() {
        let tree = tree();
        let xpath = XPath::parse("//button[1]").unwrap();
        assert_eq!(xpath.select(&tree).len(), 2);
        let xpath = XPath::parse("//div/button[last()]").unwrap();
        let found: Vec<String> = xpath.select(&tree).into_iter().map(|i| text_of(&tree, Some(i))).collect();
        assert_eq!(found, vec!["Save", "Close"]);
    }

    #[test]
    fn test_attribute_and_text_predicates() {
        let tree = tree();
        let by_id = XPath::parse("//div[@id='b']/button").unwrap();
        assert_eq!(text_of(&tree, by_id.select_first(&tree)), "Close");

        let by_text = XPath::parse("//button[text()='Save']").unwrap();
        assert_eq!(text_of(&tree, by_text.select_first(&tree)), "Save");

        let contains = XPath::parse("//*[contains(@class, 'prim')]").unwrap();
        assert_eq!(text_of(&tree, contains.select_first(&tree)), "Save");

        let and = XPath::parse("//button[@class and contains(text(), 'Sa')]").unwrap();
        assert_eq!(and.select(&tree).len(), 1);

        let string_value = XPath::parse("//div[normalize-space()='Cancel Save']").unwrap();
        assert_eq!(string_value.select(&tree).len(), 1);
    }

    #[test]
    fn test_no_match() {
        let tree = tree();
        let xpath = XPath::parse("//span").unwrap();
        assert!(xpath.select_first(&tree).is_none());
    }

    #[test]
    fn test_invalid_xpaths() {
        for bad in ["button", "//", "//div[", "//div[@id='x]", "//div[position()=1]"] {
            assert!(XPath::parse(bad).is_err(), "{bad} should fail");
        }
    }
}
