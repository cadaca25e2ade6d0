//! The per-page content session: owns the document, the session state and
//! the engines, and answers the content message contract.

use crate::config::AppConfig;
use crate::core::converter::{ConversionEngine, ConvertReport};
use crate::core::ledger::PriceLedger;
use crate::core::restorer::RestorationEngine;
use crate::core::tooltip::{Tooltip, TooltipLabels};
use crate::core::watcher::ChangeWatcher;
use crate::dom::{Document, NodeId};
use crate::domain::messages::{ContentRequest, ContentResponse, Notification};
use crate::domain::model::{ConversionRate, ConversionState, SessionState};
use crate::domain::ports::Notifier;
use crate::utils::error::Result;
use std::sync::Arc;

pub struct ContentSession {
    doc: Document,
    state: SessionState,
    ledger: PriceLedger,
    converter: ConversionEngine,
    restorer: RestorationEngine,
    watcher: ChangeWatcher,
    tooltip: Tooltip,
    labels: TooltipLabels,
    tooltip_enabled: bool,
    notifier: Arc<dyn Notifier>,
}

impl ContentSession {
    pub fn new(
        doc: Document,
        config: &AppConfig,
        auto_convert_enabled: bool,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let body = doc.body();
        Ok(Self {
            doc,
            state: SessionState::new(auto_convert_enabled),
            ledger: PriceLedger::new(),
            converter: ConversionEngine::new(config)?,
            restorer: RestorationEngine::new(),
            watcher: ChangeWatcher::new(body),
            tooltip: Tooltip::default(),
            labels: TooltipLabels {
                source_code: config.currency.source_code.clone(),
                target_code: config.currency.target_code.clone(),
                offset: config.render.tooltip_offset,
            },
            tooltip_enabled: config.render.tooltip,
            notifier,
        })
    }

    /// Page-load entry point.
    ///
    /// Picks up conversions left on the page by an earlier session, runs an
    /// automatic conversion when the preference is on and a rate is known,
    /// then announces readiness.
    pub fn start(&mut self, cached_rate: Option<ConversionRate>) {
        let body = self.doc.body();
        self.ledger.rehydrate_all(&self.doc, body);
        let mut carried_rate = None;
        for node in self.ledger.nodes() {
            if let Some(record) = self.ledger.get(node) {
                if record.converted {
                    carried_rate = carried_rate.or(record.rate);
                }
            }
        }
        if let Some(rate) = carried_rate {
            tracing::info!("Page already shows converted prices at rate {}", rate);
            self.state.mark_converted(rate);
        }

        if self.state.auto_convert_enabled && !self.state.is_converted {
            match cached_rate {
                Some(rate) => {
                    if let Err(e) = self.convert(rate.value()) {
                        tracing::warn!("⚠️ Auto-convert failed: {}", e);
                    }
                }
                None => tracing::info!("Auto-convert is on but no rate is cached yet"),
            }
        }

        self.notifier.notify(Notification::ContentScriptReady {
            is_converted: self.state.is_converted,
        });
    }

    /// Convert every price on the page. Returns the number of elements
    /// converted by this call.
    ///
    /// Passes never overlap: each one holds `&mut self`, and a shared tab
    /// reaches the session through [`LocalTab`](crate::adapters::LocalTab)'s lock.
    pub fn convert(&mut self, rate: f64) -> Result<usize> {
        let rate = ConversionRate::new(rate)?;
        let report = self.run_pass(rate);
        self.state.mark_converted(rate);

        tracing::info!("✅ Converted {} prices at rate {}", report.converted, rate);
        self.notifier.notify(Notification::ConversionComplete {
            count: report.converted,
        });
        Ok(report.converted)
    }

    /// Switch every converted price back to its original text.
    pub fn restore(&mut self) -> usize {
        let body = self.doc.body();
        let count = self.restorer.restore(&mut self.doc, &mut self.ledger, body);
        self.doc.take_mutations();
        self.tooltip.hide();
        self.state.mark_restored();

        tracing::info!("↩️ Restored {} prices", count);
        self.notifier.notify(Notification::PricesRestored { count });
        count
    }

    /// Mutation-observer callback: deliver the pending mutation batch.
    /// Every insertion since the last call is folded into one rescan.
    /// Returns the report of the rescan, if one ran.
    pub fn on_mutations(&mut self) -> Option<ConvertReport> {
        let batch = self.doc.take_mutations();
        let rate = self.watcher.on_batch(&self.doc, &batch, &self.state)?;
        let report = self.run_pass(rate);

        if report.converted > 0 {
            tracing::info!("✅ Converted {} newly inserted prices", report.converted);
            self.notifier.notify(Notification::ConversionComplete {
                count: report.converted,
            });
        }
        Some(report)
    }

    fn run_pass(&mut self, rate: ConversionRate) -> ConvertReport {
        let body = self.doc.body();
        let report = self
            .converter
            .convert(&mut self.doc, &mut self.ledger, body, rate);
        // 自己造成的變動不再回送給 watcher
        self.doc.take_mutations();
        report
    }

    pub fn set_auto_convert(&mut self, enabled: bool) {
        self.state.auto_convert_enabled = enabled;
        tracing::debug!("Auto-convert set to {}", enabled);
    }

    pub fn conversion_state(&self) -> ConversionState {
        self.state.snapshot()
    }

    pub fn handle(&mut self, request: ContentRequest) -> ContentResponse {
        tracing::debug!("Content request: {:?}", request);
        match request {
            ContentRequest::ConvertCurrency { exchange_rate } => match self.convert(exchange_rate) {
                Ok(_) => ContentResponse::ack(true),
                Err(e) => {
                    tracing::error!("❌ Conversion request failed: {}", e);
                    ContentResponse::ack(false)
                }
            },
            ContentRequest::RestoreOriginalPrices => {
                self.restore();
                ContentResponse::ack(true)
            }
            ContentRequest::GetConversionState => ContentResponse::State(self.conversion_state()),
            ContentRequest::SetAutoConvert { enabled } => {
                self.set_auto_convert(enabled);
                ContentResponse::ack(true)
            }
        }
    }

    // ── Tooltip ─────────────────────────────────────────────────────────

    pub fn pointer_over(&mut self, node: NodeId, x: i32, y: i32) {
        if !self.tooltip_enabled {
            return;
        }
        match self.ledger.owning_record(&self.doc, node) {
            Some(record) if record.converted && record.hover_bound => {
                self.tooltip.show(record, &self.labels, x, y);
            }
            _ => self.tooltip.hide(),
        }
    }

    pub fn pointer_move(&mut self, x: i32, y: i32) {
        if self.tooltip.visible {
            self.tooltip.move_to(&self.labels, x, y);
        }
    }

    pub fn pointer_leave(&mut self) {
        self.tooltip.hide();
    }

    pub fn tooltip(&self) -> &Tooltip {
        &self.tooltip
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Page-side access, e.g. a script appending product cards. Changes
    /// reach the watcher on the next [`on_mutations`](Self::on_mutations).
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn ledger(&self) -> &PriceLedger {
        &self.ledger
    }

    pub fn engine(&self) -> &ConversionEngine {
        &self.converter
    }

    pub fn into_document(self) -> Document {
        self.doc
    }
}
