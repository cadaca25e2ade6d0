//! CSS selector subset for price lookups.
//!
//! Supported: type selectors, `*`, `.class`, `#id`, attribute selectors
//! (`[a]`, `[a=v]`, `[a~=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`), `:not(<compound>)`,
//! the descendant and child (`>`) combinators, and comma-separated lists.

use super::{Document, NodeId};
use crate::utils::error::{PriceToggleError, Result};

#[derive(Debug, Clone, PartialEq)]
enum AttrOp {
    Exists,
    Equals(String),
    Includes(String),
    Prefix(String),
    Suffix(String),
    Substring(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Simple {
    Tag(String),
    Class(String),
    Id(String),
    Attr { name: String, op: AttrOp },
    Not(Vec<Simple>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq)]
struct Complex {
    // 由左到右；第 i 個 compound 與第 i+1 個之間的組合子是 combinators[i]
    compounds: Vec<Vec<Simple>>,
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList {
    source: String,
    selectors: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(source: &str) -> Result<Self> {
        let mut selectors = Vec::new();
        for part in split_top_level(source, ',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(selector_error(source, "empty selector in list"));
            }
            selectors.push(Parser::new(source, part).complex()?);
        }
        Ok(Self {
            source: source.to_string(),
            selectors,
        })
    }

    /// Parse several selector strings into a single list.
    pub fn parse_all<S: AsRef<str>>(sources: &[S]) -> Result<Self> {
        let joined = sources
            .iter()
            .map(|s| s.as_ref().trim())
            .collect::<Vec<_>>()
            .join(", ");
        Self::parse(&joined)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        self.selectors.iter().any(|c| match_complex(doc, id, c, c.compounds.len() - 1))
    }
}

fn selector_error(selector: &str, reason: &str) -> PriceToggleError {
    PriceToggleError::SelectorError {
        selector: selector.to_string(),
        reason: reason.to_string(),
    }
}

fn split_top_level(source: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in source.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '(') | (None, '[') => depth += 1,
            (None, ')') | (None, ']') => depth -= 1,
            (None, c) if c == sep && depth == 0 => {
                parts.push(&source[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&source[start..]);
    parts
}

struct Parser<'a> {
    full: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(full: &'a str, part: &str) -> Self {
        Self {
            full,
            chars: part.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn err(&self, reason: &str) -> PriceToggleError {
        selector_error(self.full, reason)
    }

    fn complex(&mut self) -> Result<Complex> {
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            match self.peek() {
                None => break,
                Some('>') => {
                    self.bump();
                    self.skip_ws();
                    combinators.push(Combinator::Child);
                }
                Some(_) if had_ws => combinators.push(Combinator::Descendant),
                Some(c) => return Err(self.err(&format!("unexpected '{}'", c))),
            }
            compounds.push(self.compound()?);
        }
        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn compound(&mut self) -> Result<Vec<Simple>> {
        let mut parts = Vec::new();
        let mut universal = false;
        match self.peek() {
            Some('*') => {
                self.bump();
                universal = true;
            }
            Some(c) if is_ident_char(c) => parts.push(Simple::Tag(self.ident()?.to_ascii_lowercase())),
            _ => {}
        }
        loop {
            match self.peek() {
                Some('.') => {
                    self.bump();
                    parts.push(Simple::Class(self.ident()?));
                }
                Some('#') => {
                    self.bump();
                    parts.push(Simple::Id(self.ident()?));
                }
                Some('[') => parts.push(self.attribute()?),
                Some(':') => parts.push(self.pseudo()?),
                _ => break,
            }
        }
        if parts.is_empty() && !universal {
            return Err(self.err("expected a selector"));
        }
        Ok(parts)
    }

    fn ident(&mut self) -> Result<String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_char(c)) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.err("expected an identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn attribute(&mut self) -> Result<Simple> {
        self.bump();
        self.skip_ws();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_ws();
        let op_kind = match self.peek() {
            Some(']') => {
                self.bump();
                return Ok(Simple::Attr {
                    name,
                    op: AttrOp::Exists,
                });
            }
            Some('=') => {
                self.bump();
                '='
            }
            Some(c @ ('~' | '^' | '$' | '*')) => {
                self.bump();
                if self.bump() != Some('=') {
                    return Err(self.err("expected '=' in attribute selector"));
                }
                c
            }
            _ => return Err(self.err("malformed attribute selector")),
        };
        self.skip_ws();
        let value = self.value()?;
        self.skip_ws();
        if self.bump() != Some(']') {
            return Err(self.err("expected ']'"));
        }
        let op = match op_kind {
            '=' => AttrOp::Equals(value),
            '~' => AttrOp::Includes(value),
            '^' => AttrOp::Prefix(value),
            '$' => AttrOp::Suffix(value),
            _ => AttrOp::Substring(value),
        };
        Ok(Simple::Attr { name, op })
    }

    fn value(&mut self) -> Result<String> {
        match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == q {
                        let v: String = self.chars[start..self.pos].iter().collect();
                        self.bump();
                        return Ok(v);
                    }
                    self.pos += 1;
                }
                Err(self.err("unterminated string"))
            }
            _ => self.ident(),
        }
    }

    fn pseudo(&mut self) -> Result<Simple> {
        self.bump();
        let name = self.ident()?.to_ascii_lowercase();
        if name != "not" {
            return Err(self.err(&format!("unsupported pseudo-class ':{}'", name)));
        }
        if self.bump() != Some('(') {
            return Err(self.err("expected '(' after :not"));
        }
        self.skip_ws();
        let inner = self.compound()?;
        self.skip_ws();
        if self.bump() != Some(')') {
            return Err(self.err("expected ')'"));
        }
        Ok(Simple::Not(inner))
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn match_complex(doc: &Document, id: NodeId, complex: &Complex, index: usize) -> bool {
    if !match_compound(doc, id, &complex.compounds[index]) {
        return false;
    }
    if index == 0 {
        return true;
    }
    match complex.combinators[index - 1] {
        Combinator::Child => doc
            .parent(id)
            .filter(|p| doc.is_element(*p))
            .map(|p| match_complex(doc, p, complex, index - 1))
            .unwrap_or(false),
        Combinator::Descendant => doc
            .ancestors(id)
            .into_iter()
            .filter(|a| doc.is_element(*a))
            .any(|a| match_complex(doc, a, complex, index - 1)),
    }
}

fn match_compound(doc: &Document, id: NodeId, parts: &[Simple]) -> bool {
    parts.iter().all(|part| match_simple(doc, id, part))
}

fn match_simple(doc: &Document, id: NodeId, simple: &Simple) -> bool {
    match simple {
        Simple::Tag(tag) => doc.tag(id) == Some(tag.as_str()),
        Simple::Class(class) => doc.has_class(id, class),
        Simple::Id(expected) => doc.attr(id, "id") == Some(expected.as_str()),
        Simple::Not(inner) => !match_compound(doc, id, inner),
        Simple::Attr { name, op } => {
            let Some(actual) = doc.attr(id, name) else {
                return false;
            };
            match op {
                AttrOp::Exists => true,
                AttrOp::Equals(v) => actual == v,
                AttrOp::Includes(v) => actual.split_whitespace().any(|w| w == v),
                AttrOp::Prefix(v) => !v.is_empty() && actual.starts_with(v.as_str()),
                AttrOp::Suffix(v) => !v.is_empty() && actual.ends_with(v.as_str()),
                AttrOp::Substring(v) => !v.is_empty() && actual.contains(v.as_str()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::html::parse_document;

    #[test]
    fn test_parse_supported_forms() {
        assert!(SelectorList::parse("p.product-new-price:not([data-converted]), .price").is_ok());
        assert!(SelectorList::parse("[itemprop=\"price\"]").is_ok());
        assert!(SelectorList::parse("div.grid > span.amount").is_ok());
        assert!(SelectorList::parse("ul li *").is_ok());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SelectorList::parse("").is_err());
        assert!(SelectorList::parse(".price,").is_err());
        assert!(SelectorList::parse("[data-price").is_err());
        assert!(SelectorList::parse(".price:hover").is_err());
        assert!(SelectorList::parse("p..x").is_err());
    }

    #[test]
    fn test_matching() {
        let doc = parse_document(
            r#"<html><body>
                <div class="grid"><p class="product-new-price" id="a">1</p></div>
                <p class="product-new-price" data-converted="true" id="b">2</p>
                <section><div><span class="price" id="c">3</span></div></section>
            </body></html>"#,
        );
        let find = |id: &str| {
            doc.descendants(doc.root())
                .into_iter()
                .find(|n| doc.attr(*n, "id") == Some(id))
                .unwrap()
        };
        let (a, b, c) = (find("a"), find("b"), find("c"));

        let not_converted = SelectorList::parse("p.product-new-price:not([data-converted])").unwrap();
        assert!(not_converted.matches(&doc, a));
        assert!(!not_converted.matches(&doc, b));

        let child = SelectorList::parse("div.grid > p").unwrap();
        assert!(child.matches(&doc, a));
        assert!(!child.matches(&doc, b));

        let descendant = SelectorList::parse("section .price").unwrap();
        assert!(descendant.matches(&doc, c));
        assert!(!SelectorList::parse("section > .price").unwrap().matches(&doc, c));

        let list = SelectorList::parse_all(&["p.product-new-price", ".price"]).unwrap();
        assert_eq!(doc.select(doc.body(), &list), vec![a, b, c]);
    }
}
