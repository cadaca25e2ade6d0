use crate::config::{AppConfig, RenderConfig};
use crate::core::extractor::PriceExtractor;
use crate::core::ledger::{
    PriceLedger, ATTR_PROCESSED, ATTR_RATE, CLASS_CONVERTED, CLASS_ORIGINAL, CLASS_WRAPPER,
};
use crate::core::restorer::RestorationEngine;
use crate::dom::{Document, NodeId, SelectorList};
use crate::domain::model::{ConversionRate, PriceRecord};
use crate::utils::error::Result;

/// How converted amounts are written, e.g. `$22.00 USD`.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetFormat {
    pub symbol: String,
    pub code: String,
}

impl TargetFormat {
    pub fn render(&self, amount: f64) -> String {
        format!("{}{:.2} {}", self.symbol, amount, self.code)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConvertReport {
    /// Elements whose displayed text was (re)written in this pass.
    pub converted: usize,
    /// Already showing this rate; left alone.
    pub unchanged: usize,
    /// No price found, nested inside another price, or not on the page.
    /// Includes rebuilt records reverted because their price is unreadable.
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Converted,
    Unchanged,
    Skipped,
}

pub struct ConversionEngine {
    selectors: SelectorList,
    extractor: PriceExtractor,
    format: TargetFormat,
    render: RenderConfig,
}

impl ConversionEngine {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            selectors: config.price_selectors()?,
            extractor: PriceExtractor::new(&config.extraction)?,
            format: TargetFormat {
                symbol: config.currency.target_symbol.clone(),
                code: config.currency.target_code.clone(),
            },
            render: config.render.clone(),
        })
    }

    pub fn selectors(&self) -> &SelectorList {
        &self.selectors
    }

    pub fn extractor(&self) -> &PriceExtractor {
        &self.extractor
    }

    pub fn format(&self) -> &TargetFormat {
        &self.format
    }

    /// Convert every price element under `scope`.
    ///
    /// Elements already showing `rate` are skipped; elements converted with
    /// another rate are recomputed from the amount resolved at their first
    /// conversion. A failure on one element is logged and the sweep continues.
    pub fn convert(
        &self,
        doc: &mut Document,
        ledger: &mut PriceLedger,
        scope: NodeId,
        rate: ConversionRate,
    ) -> ConvertReport {
        ledger.prune(doc);
        let mut report = ConvertReport::default();

        for node in doc.select(scope, &self.selectors) {
            match self.convert_element(doc, ledger, node, rate) {
                Ok(Outcome::Converted) => report.converted += 1,
                Ok(Outcome::Unchanged) => report.unchanged += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!("⚠️ Failed to convert price element {}: {}", node, e);
                    report.failed += 1;
                }
            }
        }

        tracing::debug!(
            "Conversion pass at rate {}: {} converted, {} unchanged, {} skipped, {} failed",
            rate,
            report.converted,
            report.unchanged,
            report.skipped,
            report.failed
        );
        report
    }

    fn convert_element(
        &self,
        doc: &mut Document,
        ledger: &mut PriceLedger,
        node: NodeId,
        rate: ConversionRate,
    ) -> Result<Outcome> {
        if !doc.is_attached(node) || PriceLedger::is_presentation(doc, node) {
            return Ok(Outcome::Skipped);
        }
        // 外層價格已經處理過，內層跟著被取代了
        if doc
            .ancestors(node)
            .into_iter()
            .any(|a| ledger.get(a).is_some())
        {
            return Ok(Outcome::Skipped);
        }

        let mut record = match ledger.lookup(doc, node) {
            Some(record) if record.is_current(rate) => return Ok(Outcome::Unchanged),
            Some(record) => record,
            None => {
                // 先確認抓得到價格，抓不到就完全不碰這個元素
                let Some(amount) = self.extractor.extract(doc, node) else {
                    tracing::trace!("No price found in {}", node);
                    return Ok(Outcome::Skipped);
                };
                let mut record = ledger.capture(doc, node)?;
                record.source_amount = Some(amount);
                record
            }
        };

        let amount = match record.source_amount {
            Some(amount) => amount,
            None => match self
                .extractor
                .extract_with_text(doc, node, &record.original_text)
            {
                Some(amount) => amount,
                None => return self.revert(doc, ledger, record),
            },
        };
        record.source_amount = Some(amount);

        // 文字節點先準備好：失敗時頁面還沒被改過
        let rendered = self.format.render(rate.apply(amount));
        let text_node = match record.converted_text {
            Some(text_node) => {
                doc.set_text_value(text_node, &rendered)?;
                text_node
            }
            None => doc.create_text(&rendered),
        };

        if self.render.show_original {
            self.ensure_wrapper(doc, &mut record)?;
        }

        // 先標記再改文字：顯示換算後的價格時一定帶著標記
        doc.set_attr(node, ATTR_PROCESSED, "true")?;
        doc.set_attr(node, ATTR_RATE, &rate.to_attr())?;
        if doc.children(node) != [text_node].as_slice() {
            doc.replace_children(node, &[text_node])?;
        }
        doc.add_class(node, CLASS_CONVERTED)?;

        record.converted_text = Some(text_node);
        record.rate = Some(rate);
        record.converted = true;
        record.hover_bound = record.hover_bound || self.render.tooltip;
        ledger.store(record);
        Ok(Outcome::Converted)
    }

    /// A rebuilt record whose amount can no longer be read goes back to its
    /// original text instead of keeping a price at the old rate.
    fn revert(
        &self,
        doc: &mut Document,
        ledger: &mut PriceLedger,
        record: PriceRecord,
    ) -> Result<Outcome> {
        tracing::debug!(
            "Captured text '{}' of {} no longer yields a price",
            record.original_text,
            record.node
        );
        if record.converted {
            let record = RestorationEngine::new().restore_element(doc, record)?;
            ledger.store(record);
        }
        Ok(Outcome::Skipped)
    }

    fn ensure_wrapper(&self, doc: &mut Document, record: &mut PriceRecord) -> Result<()> {
        if let Some(wrapper) = record.wrapper {
            if doc.parent(record.node) == Some(wrapper) && doc.is_attached(wrapper) {
                return Ok(());
            }
            // 還原時拆下的外框連同原價一起接回去
            if doc.parent(wrapper).is_none() {
                return doc.wrap(record.node, wrapper);
            }
        }

        let wrapper = doc.create_element("span");
        doc.set_attr(wrapper, "class", CLASS_WRAPPER)?;
        doc.wrap(record.node, wrapper)?;

        let original = doc.create_element("span");
        doc.set_attr(original, "class", CLASS_ORIGINAL)?;
        doc.set_text(original, record.original_text.trim())?;
        doc.append_child(wrapper, original)?;

        record.wrapper = Some(wrapper);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::ATTR_ORIGINAL;
    use crate::dom::html::parse_document;

    fn engine(show_original: bool) -> ConversionEngine {
        let mut config = AppConfig::default();
        config.render.show_original = show_original;
        ConversionEngine::new(&config).unwrap()
    }

    fn rate(value: f64) -> ConversionRate {
        ConversionRate::new(value).unwrap()
    }

    #[test]
    fn test_target_format() {
        let format = TargetFormat {
            symbol: "$".to_string(),
            code: "USD".to_string(),
        };
        assert_eq!(format.render(22.0), "$22.00 USD");
        assert_eq!(format.render(1234.5), "$1234.50 USD");
    }

    #[test]
    fn test_convert_marks_and_wraps() {
        let mut doc = parse_document(r#"<body><p class="product-new-price">100 Lei</p></body>"#);
        let mut ledger = PriceLedger::new();
        let body = doc.body();
        let engine = engine(true);

        let report = engine.convert(&mut doc, &mut ledger, body, rate(0.22));
        assert_eq!(report.converted, 1);

        let p = ledger.nodes()[0];
        assert_eq!(doc.text_content(p), "$22.00 USD");
        assert_eq!(doc.attr(p, ATTR_ORIGINAL), Some("100 Lei"));
        assert_eq!(doc.attr(p, ATTR_PROCESSED), Some("true"));
        assert_eq!(doc.attr(p, ATTR_RATE), Some("0.22"));
        assert!(doc.has_class(p, CLASS_CONVERTED));

        let wrapper = doc.parent(p).unwrap();
        assert!(doc.has_class(wrapper, CLASS_WRAPPER));
        assert_eq!(doc.inner_text(wrapper), "$22.00 USD100 Lei");
        assert!(ledger.get(p).unwrap().hover_bound);
    }

    #[test]
    fn test_without_original_display() {
        let mut doc = parse_document(r#"<body><span class="price">50 lei</span></body>"#);
        let mut ledger = PriceLedger::new();
        let body = doc.body();

        engine(false).convert(&mut doc, &mut ledger, body, rate(0.2));
        let span = ledger.nodes()[0];
        assert_eq!(doc.parent(span), Some(body));
        assert_eq!(doc.text_content(span), "$10.00 USD");
    }

    #[test]
    fn test_unparseable_elements_are_untouched() {
        let mut doc = parse_document(
            r#"<body><span class="price">Indisponibil</span><span class="price">7 lei</span></body>"#,
        );
        let mut ledger = PriceLedger::new();
        let body = doc.body();
        let before = doc.to_html();

        let report = engine(true).convert(&mut doc, &mut ledger, body, rate(0.2));
        assert_eq!(report.converted, 1);
        assert_eq!(report.skipped, 1);

        let spans = doc.select(body, &SelectorList::parse(".price").unwrap());
        assert_eq!(doc.text_content(spans[0]), "Indisponibil");
        assert!(doc.attrs(spans[0]).iter().all(|(k, _)| k == "class"));
        assert_ne!(doc.to_html(), before);
    }

    #[test]
    fn test_same_rate_is_a_no_op() {
        let mut doc = parse_document(r#"<body><p class="price">100 Lei</p></body>"#);
        let mut ledger = PriceLedger::new();
        let body = doc.body();
        let engine = engine(true);

        engine.convert(&mut doc, &mut ledger, body, rate(0.22));
        let snapshot = doc.to_html();
        doc.take_mutations();

        let second = engine.convert(&mut doc, &mut ledger, body, rate(0.22));
        assert_eq!(second.converted, 0);
        assert_eq!(second.unchanged, 1);
        assert_eq!(doc.to_html(), snapshot);
        assert!(!doc.has_pending_mutations());
    }

    #[test]
    fn test_rate_change_does_not_compound() {
        let mut doc = parse_document(r#"<body><p class="price">89,90 lei</p></body>"#);
        let mut ledger = PriceLedger::new();
        let body = doc.body();
        let engine = engine(true);

        engine.convert(&mut doc, &mut ledger, body, rate(0.22));
        let report = engine.convert(&mut doc, &mut ledger, body, rate(0.5));
        assert_eq!(report.converted, 1);

        let p = ledger.nodes()[0];
        // 89.90 * 0.5, not 19.78 * 0.5
        assert_eq!(doc.text_content(p), "$44.95 USD");
        assert_eq!(ledger.get(p).unwrap().original_text, "89,90 lei");
        // still a single wrapper
        let wrappers = doc.select(body, &SelectorList::parse(".price-toggle-wrapper").unwrap());
        assert_eq!(wrappers.len(), 1);
    }

    #[test]
    fn test_nested_matches_are_converted_once() {
        let mut doc = parse_document(
            r#"<body><div class="price"><span itemprop="price">12 lei</span></div></body>"#,
        );
        let mut ledger = PriceLedger::new();
        let body = doc.body();

        let report = engine(true).convert(&mut doc, &mut ledger, body, rate(0.5));
        assert_eq!(report.converted, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_attribute_price_survives_rate_change() {
        let mut doc = parse_document(
            r#"<body><div data-price="100"><div><div><span class="price">Oferta 5 buc</span></div></div></div></body>"#,
        );
        let mut ledger = PriceLedger::new();
        let body = doc.body();
        let engine = engine(true);

        engine.convert(&mut doc, &mut ledger, body, rate(0.22));
        let span = ledger.nodes()[0];
        assert_eq!(doc.text_content(span), "$22.00 USD");

        let report = engine.convert(&mut doc, &mut ledger, body, rate(0.5));
        assert_eq!(report.converted, 1);
        assert_eq!(doc.text_content(span), "$50.00 USD");

        // a session over the saved page finds the attribute past the wrapper
        let mut fresh = PriceLedger::new();
        let report = engine.convert(&mut doc, &mut fresh, body, rate(0.25));
        assert_eq!(report.converted, 1);
        assert_eq!(doc.text_content(span), "$25.00 USD");
        assert_eq!(doc.attr(span, ATTR_RATE), Some("0.25"));
    }

    #[test]
    fn test_unreadable_rebuilt_record_is_reverted() {
        let mut doc = parse_document(
            r#"<body><p class="price price-toggle-converted" data-converted="true" data-original-price="Oferta" data-conversion-rate="0.22">$22.00 USD</p></body>"#,
        );
        let mut ledger = PriceLedger::new();
        let body = doc.body();

        let report = engine(true).convert(&mut doc, &mut ledger, body, rate(0.5));
        assert_eq!(report.converted, 0);
        assert_eq!(report.skipped, 1);

        let p = ledger.nodes()[0];
        assert_eq!(doc.text_content(p), "Oferta");
        assert_eq!(doc.attr(p, ATTR_RATE), None);
        assert!(!doc.has_class(p, CLASS_CONVERTED));
        assert!(!ledger.get(p).unwrap().converted);
    }

    #[test]
    fn test_one_failing_element_does_not_stop_the_sweep() {
        let mut doc = parse_document(
            r#"<body><p class="price">10 lei</p><p class="price">20 lei</p><p class="price">30 lei</p></body>"#,
        );
        let mut ledger = PriceLedger::new();
        let body = doc.body();
        let engine = engine(true);
        engine.convert(&mut doc, &mut ledger, body, rate(0.2));

        // point the middle record at a node this page does not have
        let mut other = Document::new();
        let stale = (0..500).map(|_| other.create_element("i")).last().unwrap();
        let nodes = ledger.nodes();
        let mut broken = ledger.get(nodes[1]).cloned().unwrap();
        broken.converted_text = Some(stale);
        ledger.store(broken);

        let report = engine.convert(&mut doc, &mut ledger, body, rate(0.5));
        assert_eq!(report.failed, 1);
        assert_eq!(report.converted, 2);

        assert_eq!(doc.text_content(nodes[0]), "$5.00 USD");
        assert_eq!(doc.text_content(nodes[2]), "$15.00 USD");
        // the failed element still shows its previous rate, marked as such
        assert_eq!(doc.text_content(nodes[1]), "$4.00 USD");
        assert_eq!(doc.attr(nodes[1], ATTR_RATE), Some("0.2"));
    }

    #[test]
    fn test_toggling_reuses_nodes() {
        let mut doc = parse_document(r#"<body><p class="price">100 <b>Lei</b></p></body>"#);
        let mut ledger = PriceLedger::new();
        let body = doc.body();
        let engine = engine(true);
        let restorer = RestorationEngine::new();

        engine.convert(&mut doc, &mut ledger, body, rate(0.22));
        restorer.restore(&mut doc, &mut ledger, body);
        let settled = doc.len();

        for i in 0..1000 {
            let value = if i % 2 == 0 { 0.2 } else { 0.25 };
            engine.convert(&mut doc, &mut ledger, body, rate(value));
            engine.convert(&mut doc, &mut ledger, body, rate(0.5));
            restorer.restore(&mut doc, &mut ledger, body);
        }

        assert_eq!(doc.len(), settled);
        let p = ledger.nodes()[0];
        assert_eq!(doc.text_content(p), "100 Lei");
        assert_eq!(doc.parent(p), Some(body));

        engine.convert(&mut doc, &mut ledger, body, rate(0.5));
        assert_eq!(doc.text_content(p), "$50.00 USD");
        assert_eq!(doc.inner_text(doc.parent(p).unwrap()), "$50.00 USD100 Lei");
        assert_eq!(doc.len(), settled);
    }
}
