// 4.1: periodic funding. once an hour, collateral shifts between longs and
// shorts in proportion to how far the book's mid price has drifted from the
// oracle's reference price. positive debt with mid above ref gets paid;
// truncation is always toward zero so no tick ever mints capital.

use super::core::Engine;
use super::results::{FundingResult, FundingResultCode, Payout};
use crate::pricing;
use crate::trustline::TrustLineView;
use crate::types::{DEPTH_THRESHOLD, DIFF_THRESHOLD, FUNDING_INTERVAL, MAX_DIFF_THRESHOLD};
use crate::ledger::LedgerState;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

impl Engine {
    /// Apply one funding tick. Expected failures report a result code and
    /// leave the ledger untouched; a transfer that cannot be applied aborts
    /// the close.
    pub fn run_funding(&self, state: &mut LedgerState) -> FundingResult {
        let header = *state.header();
        if header.close_time < header.last_funding.saturating_add(FUNDING_INTERVAL) {
            return FundingResult::failure(FundingResultCode::NotTime);
        }

        state.begin();
        let mut payouts: Vec<Payout> = Vec::new();

        for pair in &self.pairs {
            let Some(ref_price) = pricing::reference_price(
                state,
                &pair.reference_feed.data_name,
                &pair.reference_feed.issuer,
            ) else {
                state.rollback();
                return FundingResult::failure(FundingResultCode::NoReferencePrice);
            };

            let coin1 = pair.coin1.asset();
            let coin2 = pair.coin2.asset();
            let base = pair.base.asset();

            let Some(mid) =
                pricing::mid_orderbook_price(state, &coin1, &coin2, &base, DEPTH_THRESHOLD)
            else {
                state.rollback();
                return FundingResult::failure(FundingResultCode::InvalidMidPrice);
            };

            debug!(pair = %pair.name, %ref_price, %mid, "funding probe");

            // inside the dead band nothing moves this tick
            if (mid - ref_price).abs() <= ref_price * DIFF_THRESHOLD {
                continue;
            }

            let Some(nonbase) = pair.non_base_asset() else {
                // pairs settling in neither of their own coins are not handled
                continue;
            };

            let ratio = ((mid - ref_price) / ref_price).clamp(-MAX_DIFF_THRESHOLD, MAX_DIFF_THRESHOLD);
            debug!(pair = %pair.name, %ratio, "funding transfer");

            // debt sums to zero over the non-base asset, so funding paid out
            // through it sums to zero as well
            state.begin();
            let holders = state.debt_holders(&nonbase);
            let mut debt_total: i128 = 0;

            for holder in &holders {
                debt_total += holder.debt as i128;

                // negative because the debt is denominated in nonbase
                let delta = (Decimal::from(-holder.debt) * ratio / ref_price)
                    .trunc()
                    .to_i64()
                    .expect("funding transfer does not fit a ledger amount");

                let line = TrustLineView::load(state, holder.account_id, &base)
                    .expect("debt holder has no collateral trustline");
                if !line.add_balance(state, delta) {
                    panic!("funding overflowed entry limit");
                }
                debug!(account = %holder.account_id, debt = holder.debt, delta, "funding payout");
                payouts.push(Payout {
                    account_id: holder.account_id,
                    asset: base.clone(),
                    amount: delta,
                });
            }

            // conservation of collateral; a nonzero sum means an earlier bug
            // already corrupted the ledger and nothing may be committed
            if debt_total != 0 {
                state.rollback();
                state.rollback();
                return FundingResult::failure(FundingResultCode::DebtNotZero);
            }
            state.commit();
        }

        let close_time = header.close_time;
        let header = state.header_mut();
        header.inflation_seq += 1;
        header.last_funding = close_time;
        state.commit();

        FundingResult {
            code: FundingResultCode::Success,
            payouts,
        }
    }
}
