//! A CSS selector subset: type, universal, `#id`, `.class`, attribute
//! matchers, descendant and child combinators, and selector lists.

use crate::error::{DomError, DomResult};
use crate::tokenizer::{tokenize_selector, SelectorToken};
use crate::tree::RenderTree;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq)]
struct ComplexSelector {
    /// Rightmost compound first; each combinator links a compound to the one after it
    parts: Vec<(Compound, Option<Combinator>)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeMatcher>,
}

#[derive(Debug, Clone, PartialEq)]
struct AttributeMatcher {
    name: String,
    op: AttributeOp,
}

#[derive(Debug, Clone, PartialEq)]
enum AttributeOp {
    Exists,
    Equals(String),
    Includes(String),
    Prefix(String),
    Suffix(String),
    Substring(String),
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attributes.is_empty()
    }

    fn matches<T: RenderTree>(&self, tree: &T, node: &T::Node) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && tree.tag_name(node) != *tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if tree.attribute(node, "id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes = tree.classes(node);
            if !self.classes.iter().all(|c| classes.contains(c)) {
                return false;
            }
        }
        self.attributes.iter().all(|matcher| {
            let Some(value) = tree.attribute(node, &matcher.name) else {
                return false;
            };
            match &matcher.op {
                AttributeOp::Exists => true,
                AttributeOp::Equals(expected) => value == *expected,
                AttributeOp::Includes(expected) => value.split_whitespace().any(|v| v == expected),
                AttributeOp::Prefix(expected) => !expected.is_empty() && value.starts_with(expected.as_str()),
                AttributeOp::Suffix(expected) => !expected.is_empty() && value.ends_with(expected.as_str()),
                AttributeOp::Substring(expected) => !expected.is_empty() && value.contains(expected.as_str()),
            }
        })
    }
}

impl SelectorList {
    pub fn parse(source: &str) -> DomResult<Self> {
        let tokens = tokenize_selector(source)
            .map_err(|pos| DomError::invalid_selector(source, format!("unexpected character at {}", pos)))?;
        SelectorParser {
            source,
            tokens,
            pos: 0,
        }
        .parse_list()
    }

    pub fn matches<T: RenderTree>(&self, tree: &T, node: &T::Node) -> bool {
        self.selectors.iter().any(|selector| selector.matches(tree, node))
    }
}

impl ComplexSelector {
    fn matches<T: RenderTree>(&self, tree: &T, node: &T::Node) -> bool {
        match_from(&self.parts, tree, node)
    }
}

fn match_from<T: RenderTree>(
    parts: &[(Compound, Option<Combinator>)],
    tree: &T,
    node: &T::Node,
) -> bool {
    let Some(((compound, combinator), rest)) = parts.split_first() else {
        return true;
    };
    if !compound.matches(tree, node) {
        return false;
    }
    match combinator {
        None => true,
        Some(Combinator::Child) => match tree.parent(node) {
            Some(parent) => match_from(rest, tree, &parent),
            None => false,
        },
        Some(Combinator::Descendant) => {
            let mut ancestor = tree.parent(node);
            while let Some(candidate) = ancestor {
                if match_from(rest, tree, &candidate) {
                    return true;
                }
                ancestor = tree.parent(&candidate);
            }
            false
        }
    }
}

struct SelectorParser<'src> {
    source: &'src str,
    tokens: Vec<SelectorToken<'src>>,
    pos: usize,
}

impl<'src> SelectorParser<'src> {
    fn error(&self, reason: impl Into<String>) -> DomError {
        DomError::invalid_selector(self.source, reason)
    }

    fn peek(&self) -> Option<&SelectorToken<'src>> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<SelectorToken<'src>> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while let Some(SelectorToken::Whitespace) = self.peek() {
            self.pos += 1;
            skipped = true;
        }
        skipped
    }

    fn expect_ident(&mut self, after: &str) -> DomResult<String> {
        match self.advance() {
            Some(SelectorToken::Ident(name)) => Ok(name.to_string()),
            Some(other) => Err(self.error(format!("expected identifier after {}, found {}", after, other))),
            None => Err(self.error(format!("expected identifier after {}", after))),
        }
    }

    fn parse_list(mut self) -> DomResult<SelectorList> {
        let mut selectors = Vec::new();
        loop {
            self.skip_whitespace();
            selectors.push(self.parse_complex()?);
            self.skip_whitespace();
            match self.advance() {
                Some(SelectorToken::Comma) => continue,
                None => break,
                Some(other) => return Err(self.error(format!("unexpected {}", other))),
            }
        }
        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self) -> DomResult<ComplexSelector> {
        // Collected left to right, reversed at the end
        let mut compounds: Vec<Compound> = Vec::new();
        let mut combinators: Vec<Combinator> = Vec::new();

        loop {
            let compound = self.parse_compound()?;
            if compound.is_empty() {
                return Err(self.error("empty compound selector"));
            }
            compounds.push(compound);

            let had_space = self.skip_whitespace();
            match self.peek() {
                Some(SelectorToken::Child) => {
                    self.pos += 1;
                    self.skip_whitespace();
                    combinators.push(Combinator::Child);
                }
                Some(SelectorToken::Comma) | None => break,
                Some(_) if had_space => combinators.push(Combinator::Descendant),
                Some(other) => return Err(self.error(format!("unexpected {}", other))),
            }
        }

        let mut parts = Vec::with_capacity(compounds.len());
        for (i, compound) in compounds.into_iter().enumerate().rev() {
            let combinator = if i == 0 { None } else { Some(combinators[i - 1]) };
            parts.push((compound, combinator));
        }
        Ok(ComplexSelector { parts })
    }

    fn parse_compound(&mut self) -> DomResult<Compound> {
        let mut compound = Compound::default();

        match self.peek() {
            Some(SelectorToken::Ident(name)) => {
                compound.tag = Some(name.to_ascii_lowercase());
                self.pos += 1;
            }
            Some(SelectorToken::Star) => {
                compound.tag = Some("*".to_string());
                self.pos += 1;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some(SelectorToken::Hash) => {
                    self.pos += 1;
                    compound.id = Some(self.expect_ident("#")?);
                }
                Some(SelectorToken::Dot) => {
                    self.pos += 1;
                    compound.classes.push(self.expect_ident(".")?);
                }
                Some(SelectorToken::LBracket) => {
                    self.pos += 1;
                    compound.attributes.push(self.parse_attribute()?);
                }
                Some(SelectorToken::Colon) => {
                    return Err(self.error("pseudo-classes are not supported"));
                }
                _ => break,
            }
        }

        Ok(compound)
    }

    fn parse_attribute(&mut self) -> DomResult<AttributeMatcher> {
        self.skip_whitespace();
        let name = self.expect_ident("[")?.to_ascii_lowercase();
        self.skip_whitespace();

        let op: fn(String) -> AttributeOp = match self.advance() {
            Some(SelectorToken::RBracket) => {
                return Ok(AttributeMatcher {
                    name,
                    op: AttributeOp::Exists,
                })
            }
            Some(SelectorToken::Equals) => AttributeOp::Equals,
            Some(SelectorToken::Includes) => AttributeOp::Includes,
            Some(SelectorToken::PrefixMatch) => AttributeOp::Prefix,
            Some(SelectorToken::SuffixMatch) => AttributeOp::Suffix,
            Some(SelectorToken::SubstringMatch) => AttributeOp::Substring,
            Some(other) => return Err(self.error(format!("unexpected {} in attribute selector", other))),
            None => return Err(self.error("unterminated attribute selector")),
        };

        self.skip_whitespace();
        let value = match self.advance() {
            Some(SelectorToken::Ident(v)) | Some(SelectorToken::Str(v)) => v.to_string(),
            Some(other) => return Err(self.error(format!("unexpected {} as attribute value", other))),
            None => return Err(self.error("missing attribute value")),
        };
        self.skip_whitespace();

        match self.advance() {
            Some(SelectorToken::RBracket) => Ok(AttributeMatcher {
                name,
                op: op(value),
            }),
            _ => Err(self.error("expected ]")),
        }
    }
}
