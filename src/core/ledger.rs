//! Typed per-element bookkeeping, mirrored into page attributes.
//!
//! The map is the source of truth while the session lives. The attributes
//! (`data-converted`, `data-original-price`, `data-conversion-rate`) are the
//! serializable copy, so a fresh session over an already converted page can
//! rebuild its records.

use crate::dom::{Document, NodeId};
use crate::domain::model::{ConversionRate, PriceRecord};
use crate::utils::error::Result;
use std::collections::BTreeMap;

pub const ATTR_PROCESSED: &str = "data-converted";
pub const ATTR_ORIGINAL: &str = "data-original-price";
pub const ATTR_RATE: &str = "data-conversion-rate";

pub const CLASS_CONVERTED: &str = "price-toggle-converted";
pub const CLASS_WRAPPER: &str = "price-toggle-wrapper";
pub const CLASS_ORIGINAL: &str = "price-toggle-original";

#[derive(Debug, Default, Clone)]
pub struct PriceLedger {
    records: BTreeMap<NodeId, PriceRecord>,
}

impl PriceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: NodeId) -> Option<&PriceRecord> {
        self.records.get(&node)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.records.keys().copied().collect()
    }

    pub fn converted_count(&self) -> usize {
        self.records.values().filter(|r| r.converted).count()
    }

    /// Look up a record, rebuilding it from page attributes when the map
    /// has none.
    pub fn lookup(&mut self, doc: &Document, node: NodeId) -> Option<PriceRecord> {
        if let Some(record) = self.records.get(&node) {
            return Some(record.clone());
        }
        let record = Self::from_attributes(doc, node)?;
        tracing::debug!("Rehydrated price record for {} from page attributes", node);
        self.records.insert(node, record.clone());
        Some(record)
    }

    fn from_attributes(doc: &Document, node: NodeId) -> Option<PriceRecord> {
        let original = doc.attr(node, ATTR_ORIGINAL)?;
        let mut record = PriceRecord::new(node, original.to_string());
        record.rate = doc.attr(node, ATTR_RATE).and_then(ConversionRate::from_attr);
        record.converted = record.rate.is_some() && doc.has_class(node, CLASS_CONVERTED);
        record.wrapper = doc
            .parent(node)
            .filter(|p| doc.has_class(*p, CLASS_WRAPPER));
        Some(record)
    }

    /// Rebuild records for every element in `scope` carrying the original
    /// text attribute.
    pub fn rehydrate_all(&mut self, doc: &Document, scope: NodeId) {
        for node in doc.descendants(scope) {
            if doc.attr(node, ATTR_ORIGINAL).is_some() && !self.records.contains_key(&node) {
                self.lookup(doc, node);
            }
        }
    }

    /// Capture the original text. Writes the attribute first so the element
    /// is never marked without its original.
    pub fn capture(&mut self, doc: &mut Document, node: NodeId) -> Result<PriceRecord> {
        let original_text = doc.text_content(node);
        doc.set_attr(node, ATTR_ORIGINAL, &original_text)?;
        let mut record = PriceRecord::new(node, original_text);
        record.original_children = doc.children(node).to_vec();
        self.records.insert(node, record.clone());
        Ok(record)
    }

    pub fn store(&mut self, record: PriceRecord) {
        self.records.insert(record.node, record);
    }

    /// Forget records whose element left the page.
    pub fn prune(&mut self, doc: &Document) -> usize {
        let before = self.records.len();
        self.records.retain(|node, _| doc.is_attached(*node));
        let pruned = before - self.records.len();
        if pruned > 0 {
            tracing::debug!("Pruned {} price records for removed elements", pruned);
        }
        pruned
    }

    /// The processed element `node` sits in, if any (inclusive).
    pub fn owning_record(&self, doc: &Document, node: NodeId) -> Option<&PriceRecord> {
        std::iter::once(node)
            .chain(doc.ancestors(node))
            .find_map(|n| self.records.get(&n))
    }

    /// True for nodes inside the presentation markup this crate inserts.
    pub fn is_presentation(doc: &Document, node: NodeId) -> bool {
        std::iter::once(node)
            .chain(doc.ancestors(node))
            .any(|n| doc.has_class(n, CLASS_ORIGINAL))
    }
}
