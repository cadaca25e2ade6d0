use crate::core::ledger::{PriceLedger, ATTR_RATE, CLASS_CONVERTED};
use crate::dom::{Document, NodeId};
use crate::domain::model::PriceRecord;
use crate::utils::error::Result;

/// Puts captured originals back. Bookkeeping (`data-converted`,
/// `data-original-price`) stays so a later conversion needs no rescan of
/// what was original.
#[derive(Debug, Default, Clone, Copy)]
pub struct RestorationEngine;

impl RestorationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Returns how many elements were switched back to their original text.
    pub fn restore(&self, doc: &mut Document, ledger: &mut PriceLedger, scope: NodeId) -> usize {
        ledger.prune(doc);
        ledger.rehydrate_all(doc, scope);

        let mut restored = 0;
        for node in ledger.nodes() {
            let Some(record) = ledger.get(node).cloned() else {
                continue;
            };
            if !record.converted || !doc.is_inclusive_ancestor(scope, node) {
                continue;
            }
            match self.restore_element(doc, record) {
                Ok(record) => {
                    ledger.store(record);
                    restored += 1;
                }
                Err(e) => tracing::warn!("⚠️ Failed to restore price element {}: {}", node, e),
            }
        }

        tracing::debug!("Restored {} price elements", restored);
        restored
    }

    /// Put one element back. The wrapper and the converted text node stay in
    /// the record for the next conversion.
    pub(crate) fn restore_element(
        &self,
        doc: &mut Document,
        mut record: PriceRecord,
    ) -> Result<PriceRecord> {
        let node = record.node;
        if record.original_children.is_empty() {
            // 從頁面屬性重建的紀錄沒有原本的子節點，補一次就記下來
            doc.set_text(node, &record.original_text)?;
            record.original_children = doc.children(node).to_vec();
        } else {
            doc.replace_children(node, &record.original_children)?;
        }
        doc.remove_class(node, CLASS_CONVERTED)?;
        doc.remove_attr(node, ATTR_RATE)?;

        if let Some(wrapper) = record.wrapper {
            if doc.parent(node) == Some(wrapper) && doc.parent(wrapper).is_some() {
                doc.unwrap_from(node, wrapper)?;
            }
        }

        record.converted = false;
        Ok(record)
    }
}
