//! Liquidation: marking, forced offers, recovery.
//!
//! Every tick walks each configured pair three ways. Accounts whose combined
//! position has gone under water get the liquidation flag on both legs and a
//! forced offer unwinding their debt; accounts still flagged whose equity has
//! recovered get the flags cleared. Marking is idempotent and reconciliation
//! keeps at most one forced offer alive per account and selling asset, so
//! replaying a tick never doubles anything.

use super::core::Engine;
use super::offers::{apply_liquidation_offer, OfferHost};
use super::results::{LiquidationResult, LiquidationResultCode};
use crate::entry::{LedgerKey, TrustLineEntry};
use crate::ledger::LedgerState;
use crate::pricing;
use crate::types::{AccountId, Asset, Price, PRICE_MULTIPLE};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

impl Engine {
    /// Apply one liquidation tick.
    pub fn run_liquidation(
        &self,
        state: &mut LedgerState,
        host: &mut dyn OfferHost,
    ) -> LiquidationResult {
        let header = *state.header();
        if header.close_time < header.last_liquidation.saturating_add(self.liquidation_interval) {
            return LiquidationResult {
                code: LiquidationResultCode::NotTime,
            };
        }

        state.begin();

        for pair in &self.pairs {
            let Some(ref_price) = pricing::reference_price(
                state,
                &pair.reference_feed.data_name,
                &pair.reference_feed.issuer,
            ) else {
                state.rollback();
                return LiquidationResult {
                    code: LiquidationResultCode::NoReferencePrice,
                };
            };

            let coin1 = pair.coin1.asset();
            let coin2 = pair.coin2.asset();
            let base = pair.base.asset();

            // price the non-base leg in base
            let (price1, price2, coin1_is_base) = if coin1 == base {
                (Decimal::ONE, ref_price, true)
            } else if coin2 == base {
                (ref_price, Decimal::ONE, false)
            } else {
                // pair settling in neither coin is not handled
                continue;
            };
            debug!(pair = %pair.name, %price1, %price2, "liquidation scan");

            // mark pass: flag fresh casualties, then reconcile the forced
            // offer of everyone currently under water
            for account in state.should_liquidate(&coin1, price1, &coin2, price2) {
                self.mark_account(state, account, &coin1, &coin2);
                self.reconcile_forced_offer(
                    state,
                    host,
                    account,
                    &coin1,
                    &coin2,
                    coin1_is_base,
                    ref_price,
                );
            }

            // unmark pass: flagged accounts whose equity recovered
            for account in state.under_liquidation(&coin1, price1, &coin2, price2, false) {
                debug!(%account, "clearing liquidation flags");
                for asset in [&coin1, &coin2] {
                    let key = LedgerKey::trust_line(account, asset.clone());
                    if let Some(entry) = state.load_mut(&key) {
                        if let crate::entry::LedgerEntryData::TrustLine(tl) = &mut entry.data {
                            tl.set_liquidation(false);
                        }
                    }
                }
            }
        }

        let close_time = header.close_time;
        state.header_mut().last_liquidation = close_time;
        state.commit();

        LiquidationResult {
            code: LiquidationResultCode::Success,
        }
    }

    fn mark_account(
        &self,
        state: &mut LedgerState,
        account: AccountId,
        coin1: &Asset,
        coin2: &Asset,
    ) {
        let key1 = LedgerKey::trust_line(account, coin1.clone());
        let key2 = LedgerKey::trust_line(account, coin2.clone());
        let flagged = [&key1, &key2].iter().any(|key| {
            state
                .get(key)
                .and_then(|e| e.as_trust_line())
                .map_or(false, TrustLineEntry::is_liquidating)
        });
        if flagged {
            return;
        }
        debug!(%account, "marking for liquidation");
        for key in [&key1, &key2] {
            let entry = state
                .load_mut(key)
                .expect("liquidation candidate lost a trustline");
            if let crate::entry::LedgerEntryData::TrustLine(tl) = &mut entry.data {
                tl.set_liquidation(true);
            }
        }
    }

    /// Bring the account's forced offer in line with its current position:
    /// keep an exactly-matching lone offer, otherwise sweep the selling asset
    /// clean and place the offer the position calls for.
    fn reconcile_forced_offer(
        &self,
        state: &mut LedgerState,
        host: &mut dyn OfferHost,
        account: AccountId,
        coin1: &Asset,
        coin2: &Asset,
        coin1_is_base: bool,
        ref_price: Decimal,
    ) {
        let line = |state: &LedgerState, asset: &Asset| -> Option<TrustLineEntry> {
            state
                .get(&LedgerKey::trust_line(account, asset.clone()))
                .and_then(|e| e.as_trust_line())
                .cloned()
        };
        let (Some(tl1), Some(tl2)) = (line(state, coin1), line(state, coin2)) else {
            return;
        };

        let computed = forced_offer_price(
            coin1_is_base,
            tl1.balance,
            tl1.debt,
            tl2.balance,
            tl2.debt,
            ref_price,
        );

        let (selling, buying, amount, price) = if tl1.debt > 0 {
            // the account owes coin1; unwind by selling its coin2 leg
            (coin2, coin1, -tl2.debt, computed)
        } else if tl2.debt > 0 {
            (coin1, coin2, -tl1.debt, computed.inverted())
        } else {
            return;
        };
        if amount <= 0 {
            // nothing to unwind
            return;
        }

        let existing = state.offers_by_account_and_asset(&account, selling);
        if existing.len() == 1 {
            let offer = existing.values().next().unwrap();
            if offer.buying == *buying && offer.amount == amount && offer.price == price {
                return;
            }
        }

        debug!(%account, amount, %price, "issuing forced offer");
        state.begin();
        for offer_id in existing.keys() {
            let outcome = apply_liquidation_offer(
                state,
                host,
                account,
                offer_id.0,
                0,
                selling.clone(),
                buying.clone(),
                price,
            );
            if !outcome.is_success() {
                warn!(%account, offer = %offer_id, code = ?outcome.code, "could not sweep stale forced offer");
                state.rollback();
                return;
            }
        }
        let outcome = apply_liquidation_offer(
            state,
            host,
            account,
            0,
            amount,
            selling.clone(),
            buying.clone(),
            price,
        );
        if outcome.is_success() {
            state.commit();
        } else {
            warn!(%account, code = ?outcome.code, "forced offer rejected; retrying next tick");
            state.rollback();
        }
    }
}

/// Forced liquidation price from the account's current balances and debts,
/// expressed over `PRICE_MULTIPLE`. Degenerate arithmetic (zero legs,
/// overflow past i32) falls back to the scaled reference price.
fn forced_offer_price(
    coin1_is_base: bool,
    balance1: i64,
    debt1: i64,
    balance2: i64,
    debt2: i64,
    ref_price: Decimal,
) -> Price {
    let multiple = PRICE_MULTIPLE as i128;
    let leg1 = (balance1 as i128 - debt1 as i128).abs();
    let leg2 = (debt2 as i128 - balance2 as i128).abs();

    if coin1_is_base {
        if leg1 > 0 {
            let n = leg2 * multiple / leg1;
            if n > 0 && n <= i32::MAX as i128 {
                return Price::new(n as i32, PRICE_MULTIPLE as i32);
            }
        }
    } else if leg2 > 0 {
        let d = leg1 * multiple / leg2;
        if d > 0 && d <= i32::MAX as i128 {
            return Price::new(PRICE_MULTIPLE as i32, d as i32);
        }
    }

    let scaled = (ref_price * Decimal::from(PRICE_MULTIPLE))
        .trunc()
        .to_i64()
        .unwrap_or(i64::MAX)
        .clamp(1, i32::MAX as i64) as i32;
    if coin1_is_base {
        Price::new(PRICE_MULTIPLE as i32, scaled)
    } else {
        Price::new(scaled, PRICE_MULTIPLE as i32)
    }
}
