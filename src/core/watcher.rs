//! Mutation watching: which page changes call for a rescan.

use crate::dom::{Document, MutationRecord, NodeId};
use crate::domain::model::{ConversionRate, SessionState};

/// Decides whether a batch of page mutations calls for a conversion pass.
#[derive(Debug, Clone)]
pub struct ChangeWatcher {
    observed: NodeId,
    batches_seen: u64,
}

impl ChangeWatcher {
    pub fn new(observed: NodeId) -> Self {
        Self {
            observed,
            batches_seen: 0,
        }
    }

    pub fn observed(&self) -> NodeId {
        self.observed
    }

    pub fn batches_seen(&self) -> u64 {
        self.batches_seen
    }

    /// The rate to rescan with, when the page is converted and the batch
    /// inserted nodes under the observed subtree.
    pub fn on_batch(
        &mut self,
        doc: &Document,
        batch: &[MutationRecord],
        state: &SessionState,
    ) -> Option<ConversionRate> {
        if batch.is_empty() {
            return None;
        }
        self.batches_seen += 1;

        if !state.is_converted {
            return None;
        }
        let rate = state.current_rate?;
        let inserted = batch.iter().any(|m| {
            !m.added_nodes().is_empty() && doc.is_inclusive_ancestor(self.observed, m.target())
        });
        if inserted {
            tracing::debug!("🔄 Page inserted new nodes, rescanning at rate {}", rate);
            Some(rate)
        } else {
            None
        }
    }
}
