//! Price extraction from loosely structured page text.

use crate::config::ExtractionConfig;
use crate::core::ledger::CLASS_WRAPPER;
use crate::dom::{Document, NodeId};
use crate::utils::error::{PriceToggleError, Result};
use regex::Regex;

pub struct PriceExtractor {
    price_attributes: Vec<String>,
    label_pattern: Option<Regex>,
    number_pattern: Regex,
    ancestor_depth: usize,
}

impl PriceExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let label_pattern = if config.label_tokens.is_empty() {
            None
        } else {
            let alternatives = config
                .label_tokens
                .iter()
                .map(|t| regex::escape(t.trim()))
                .collect::<Vec<_>>()
                .join("|");
            Some(compile(&format!("(?i){}", alternatives))?)
        };

        Ok(Self {
            price_attributes: config.price_attributes.clone(),
            label_pattern,
            number_pattern: compile(r"\d[\d.,]*")?,
            ancestor_depth: config.ancestor_depth,
        })
    }

    /// Amount in the source currency, or `None` when no usable price is found.
    ///
    /// A machine-readable price attribute on the element (or a close
    /// ancestor) wins over the text. Otherwise the first number in the text
    /// is taken, so `"89,90 lei / 2 buc."` yields `89.90`.
    pub fn extract(&self, doc: &Document, node: NodeId) -> Option<f64> {
        if let Some(amount) = self.from_attributes(doc, node) {
            return Some(amount);
        }
        self.from_text(&doc.inner_text(node))
    }

    /// Same as [`extract`](Self::extract) but reads `text` instead of the
    /// element's current text. Used to reconvert from a captured original.
    pub fn extract_with_text(&self, doc: &Document, node: NodeId, text: &str) -> Option<f64> {
        if let Some(amount) = self.from_attributes(doc, node) {
            return Some(amount);
        }
        self.from_text(text)
    }

    fn from_attributes(&self, doc: &Document, node: NodeId) -> Option<f64> {
        let candidates = std::iter::once(node).chain(
            doc.ancestors(node)
                .into_iter()
                .filter(|a| doc.is_element(*a) && !doc.has_class(*a, CLASS_WRAPPER))
                .take(self.ancestor_depth),
        );
        for candidate in candidates {
            for attr in &self.price_attributes {
                // content 只有在 itemprop=price 的元素上才代表價格
                if attr == "content" && doc.attr(candidate, "itemprop") != Some("price") {
                    continue;
                }
                if let Some(amount) = doc.attr(candidate, attr).and_then(parse_decimal) {
                    return Some(amount);
                }
            }
        }
        None
    }

    pub fn from_text(&self, text: &str) -> Option<f64> {
        let stripped = match &self.label_pattern {
            Some(re) => re.replace_all(text, " "),
            None => std::borrow::Cow::Borrowed(text),
        };
        let run = self.number_pattern.find(&stripped)?.as_str();
        parse_amount(run)
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| PriceToggleError::ConfigError {
        message: format!("extraction pattern: {}", e),
    })
}

/// Plain decimal, as found in machine-readable attributes.
pub fn parse_decimal(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v > 0.0)
}

/// Normalize a run of digits and separators and parse it.
///
/// Comma is the decimal separator only when it is the sole or the last
/// separator in the run; every other separator groups thousands.
pub fn parse_amount(run: &str) -> Option<f64> {
    let run = run.trim_end_matches(['.', ',']);
    let last_separator = run.rfind(['.', ',']);

    let normalized: String = match last_separator {
        None => run.to_string(),
        Some(pos) => {
            let decimal_is_comma = run[pos..].starts_with(',');
            let period_count = run.matches('.').count();
            let (int_part, frac_part) = run.split_at(pos);
            let frac_digits = &frac_part[1..];

            if decimal_is_comma || period_count == 1 {
                let digits: String = int_part.chars().filter(|c| c.is_ascii_digit()).collect();
                format!("{}.{}", digits, frac_digits)
            } else {
                // 1.234.567
                run.chars().filter(|c| c.is_ascii_digit()).collect()
            }
        }
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::html::parse_document;
    use crate::dom::SelectorList;

    fn extractor() -> PriceExtractor {
        PriceExtractor::new(&ExtractionConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_amount_separators() {
        assert_eq!(parse_amount("89,90"), Some(89.90));
        assert_eq!(parse_amount("12.50"), Some(12.50));
        assert_eq!(parse_amount("1.234,56"), Some(1234.56));
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("1.234.567"), Some(1234567.0));
        assert_eq!(parse_amount("100"), Some(100.0));
        assert_eq!(parse_amount("100."), Some(100.0));
        assert_eq!(parse_amount("0"), None);
        assert_eq!(parse_amount("0,00"), None);
    }

    #[test]
    fn test_from_text() {
        let ex = extractor();
        assert_eq!(ex.from_text("89,90 lei"), Some(89.90));
        assert_eq!(ex.from_text("$12.50 USD"), Some(12.50));
        assert_eq!(ex.from_text("de la 1.299,99 Lei"), Some(1299.99));
        assert_eq!(ex.from_text("Price: 45 RON"), Some(45.0));
        assert_eq!(ex.from_text("89,90 lei / 2 buc."), Some(89.90));
        assert_eq!(ex.from_text("Stoc epuizat"), None);
        assert_eq!(ex.from_text(""), None);
    }

    #[test]
    fn test_attribute_is_authoritative() {
        let doc = parse_document(
            r#"<body>
                <div class="card" data-price="249.99"><span class="price">Promo!</span></div>
                <span class="price" data-price="15">99 lei</span>
                <meta itemprop="price" content="30.50"><span class="price" content="7">7 lei</span>
            </body>"#,
        );
        let ex = extractor();
        let prices = doc.select(doc.body(), &SelectorList::parse(".price").unwrap());
        assert_eq!(ex.extract(&doc, prices[0]), Some(249.99));
        assert_eq!(ex.extract(&doc, prices[1]), Some(15.0));
        // content without itemprop=price is ignored
        assert_eq!(ex.extract(&doc, prices[2]), Some(7.0));
    }

    #[test]
    fn test_ancestor_depth_is_bounded() {
        let doc = parse_document(
            r#"<body><div data-price="10"><div><div><div><span class="price">n/a</span></div></div></div></div></body>"#,
        );
        let span = doc.select(doc.body(), &SelectorList::parse(".price").unwrap())[0];
        assert_eq!(extractor().extract(&doc, span), None);

        let deep = PriceExtractor::new(&ExtractionConfig {
            ancestor_depth: 4,
            ..ExtractionConfig::default()
        })
        .unwrap();
        assert_eq!(deep.extract(&doc, span), Some(10.0));
    }

    #[test]
    fn test_inserted_wrapper_is_not_an_ancestor_level() {
        let doc = parse_document(
            r#"<body><div data-price="100"><div><div><span class="price-toggle-wrapper"><span class="price">Oferta 5 buc</span></span></div></div></div></body>"#,
        );
        let span = doc.select(doc.body(), &SelectorList::parse(".price").unwrap())[0];
        assert_eq!(extractor().extract(&doc, span), Some(100.0));
    }

    #[test]
    fn test_superscript_decimals_without_comma() {
        // 逗號在 sup 外面時才看得出小數
        let doc = parse_document(
            r#"<body><p class="price">1.299,<sup>99</sup> Lei</p><p class="price">1.299<sup>99</sup> Lei</p></body>"#,
        );
        let prices = doc.select(doc.body(), &SelectorList::parse(".price").unwrap());
        assert_eq!(extractor().extract(&doc, prices[0]), Some(1299.99));
        assert_eq!(extractor().extract(&doc, prices[1]), Some(1.29999));
    }

    #[test]
    fn test_bad_attribute_falls_back_to_text() {
        let doc = parse_document(r#"<body><span class="price" data-price="-3">42,50 lei</span></body>"#);
        let span = doc.select(doc.body(), &SelectorList::parse(".price").unwrap())[0];
        assert_eq!(extractor().extract(&doc, span), Some(42.50));
    }
}
