//! Core engine struct and operation dispatch.

use super::offers::{apply_liquidation_offer, apply_margin_offer, OfferHost, Operation, OperationBody};
use super::results::{CloseOutcome, OperationOutcome};
use crate::config::TradingPair;
use crate::ledger::LedgerState;
use crate::types::LIQUIDATION_INTERVAL;

/// The margin-trading core. Holds the static pair configuration and drives
/// the periodic operations against a ledger view. One engine serves one
/// replica; all state lives in the ledger.
#[derive(Debug)]
pub struct Engine {
    pub(super) pairs: Vec<TradingPair>,
    pub(super) liquidation_interval: u64,
}

impl Engine {
    pub fn new(pairs: Vec<TradingPair>) -> Self {
        Self {
            pairs,
            liquidation_interval: LIQUIDATION_INTERVAL,
        }
    }

    /// Override the liquidation cadence (seconds between ticks).
    pub fn with_liquidation_interval(mut self, seconds: u64) -> Self {
        self.liquidation_interval = seconds;
        self
    }

    pub fn pairs(&self) -> &[TradingPair] {
        &self.pairs
    }

    /// Process one closed ledger: funding first, then liquidation.
    pub fn close_ledger(&self, state: &mut LedgerState, host: &mut dyn OfferHost) -> CloseOutcome {
        let funding = self.run_funding(state);
        let liquidation = self.run_liquidation(state, host);
        CloseOutcome {
            funding,
            liquidation,
        }
    }

    /// Apply a single wire operation.
    pub fn apply(
        &self,
        state: &mut LedgerState,
        host: &mut dyn OfferHost,
        op: &Operation,
    ) -> OperationOutcome {
        match &op.body {
            OperationBody::Inflation => OperationOutcome::Funding(self.run_funding(state)),
            OperationBody::Liquidation => {
                OperationOutcome::Liquidation(self.run_liquidation(state, host))
            }
            OperationBody::CreateMarginOffer {
                amount,
                selling,
                buying,
                price,
            } => OperationOutcome::Offer(apply_margin_offer(
                state,
                host,
                op.source_account,
                *amount,
                selling.clone(),
                buying.clone(),
                *price,
            )),
            OperationBody::CreateLiquidationOffer {
                offer_id,
                amount,
                selling,
                buying,
                price,
            } => OperationOutcome::Offer(apply_liquidation_offer(
                state,
                host,
                op.source_account,
                *offer_id,
                *amount,
                selling.clone(),
                buying.clone(),
                *price,
            )),
        }
    }
}
