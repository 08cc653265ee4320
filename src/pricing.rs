//! Price discovery: the order-book probe and the oracle reference price.
//!
//! Both the funding and liquidation operations need two prices for a trading
//! pair: what the book says (a depth-weighted mid) and what the outside world
//! says (a signed data entry published by the reference feed). Everything here
//! is read-only over the ledger view and deterministic.

use crate::accounting::{big_divide, Rounding};
use crate::entry::LedgerKey;
use crate::ledger::LedgerState;
use crate::types::{AccountId, Asset};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::debug;

/// Depth-weighted average price of the offers selling `coin1` for `coin2`,
/// walked in price order until `depth_threshold` units of the pair's non-base
/// coin are consumed or the book runs dry.
///
/// Returns `None` when neither coin is the base, when not a single unit of
/// depth was consumed, or when the arithmetic leaves i64.
pub fn avg_offer_price(
    state: &LedgerState,
    coin1: &Asset,
    coin2: &Asset,
    base: &Asset,
    depth_threshold: i64,
) -> Option<Decimal> {
    let coin1_is_base = if coin1 == base {
        true
    } else if coin2 == base {
        false
    } else {
        return None;
    };

    let mut excludes: BTreeSet<LedgerKey> = BTreeSet::new();
    let mut total: i64 = 0;
    let mut depth = depth_threshold;

    while depth > 0 {
        let Some(entry) = state.best_offer(coin1, coin2, &excludes) else {
            break;
        };
        let offer = entry.as_offer().unwrap();
        let price = offer.price;

        // depth is denominated in the non-base coin; when the offer sells the
        // base we convert its amount across the price first
        let denominated = if coin1_is_base {
            big_divide(offer.amount, price.n as i64, price.d as i64, Rounding::Down)?
        } else {
            offer.amount
        };
        let consumed = depth.min(denominated);

        let consideration = if coin1_is_base {
            big_divide(consumed, price.d as i64, price.n as i64, Rounding::Down)?
        } else {
            big_divide(consumed, price.n as i64, price.d as i64, Rounding::Down)?
        };
        total = total.checked_add(consideration)?;
        depth -= consumed;
        excludes.insert(entry.key());
    }

    if depth == depth_threshold {
        return None;
    }
    let consumed_total = depth_threshold - depth;
    let avg = Decimal::from(total) / Decimal::from(consumed_total);
    debug!(%coin1, %coin2, %avg, consumed = consumed_total, "walked one side of the book");
    Some(avg)
}

/// Mid price of the pair: the mean of the two one-sided averages. `None` when
/// either side fails or comes out non-positive.
pub fn mid_orderbook_price(
    state: &LedgerState,
    coin1: &Asset,
    coin2: &Asset,
    base: &Asset,
    depth_threshold: i64,
) -> Option<Decimal> {
    let bid = avg_offer_price(state, coin1, coin2, base, depth_threshold)?;
    let ask = avg_offer_price(state, coin2, coin1, base, depth_threshold)?;
    if bid <= Decimal::ZERO || ask <= Decimal::ZERO {
        return None;
    }
    Some((bid + ask) / dec!(2))
}

/// External reference price: the data entry `(issuer, data_name)` holds a
/// base64-encoded decimal string. Any decode or parse failure, a missing
/// entry, or a non-positive value yields `None`.
pub fn reference_price(state: &LedgerState, data_name: &str, issuer: &AccountId) -> Option<Decimal> {
    let key = LedgerKey::Data {
        account_id: *issuer,
        data_name: data_name.to_string(),
    };
    let data = state.get(&key)?.as_data()?;
    let decoded = BASE64.decode(&data.data_value).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let price = Decimal::from_str(text.trim()).ok()?;
    if price <= Decimal::ZERO {
        return None;
    }
    Some(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{DataEntry, LedgerEntry, LedgerEntryData, LedgerHeader, OfferEntry};
    use crate::types::{OfferId, Price};

    fn issuer() -> AccountId {
        AccountId::from_byte(0xFF)
    }

    fn coin(code: &str) -> Asset {
        Asset::alphanum4(code, issuer())
    }

    fn offer(id: u64, selling: &Asset, buying: &Asset, amount: i64, price: Price) -> LedgerEntry {
        LedgerEntry::new(LedgerEntryData::Offer(OfferEntry {
            seller_id: AccountId::from_byte(7),
            offer_id: OfferId(id),
            selling: selling.clone(),
            buying: buying.clone(),
            amount,
            price,
            flags: 0,
        }))
    }

    #[test]
    fn empty_book_has_no_average() {
        let state = LedgerState::new(LedgerHeader::default());
        let btc = coin("BTC");
        let usd = coin("USD");
        assert_eq!(avg_offer_price(&state, &btc, &usd, &usd, 100), None);
    }

    #[test]
    fn pair_without_base_fails() {
        let state = LedgerState::new(LedgerHeader::default());
        let btc = coin("BTC");
        let eth = coin("ETH");
        let usd = coin("USD");
        assert_eq!(avg_offer_price(&state, &btc, &eth, &usd, 100), None);
    }

    #[test]
    fn walks_in_price_order_to_depth() {
        let mut state = LedgerState::new(LedgerHeader::default());
        let btc = coin("BTC");
        let usd = coin("USD");
        // selling BTC for USD: price is USD per BTC
        state.create(offer(1, &btc, &usd, 10, Price::new(100, 1)));
        state.create(offer(2, &btc, &usd, 10, Price::new(110, 1)));
        state.create(offer(3, &btc, &usd, 10, Price::new(120, 1)));

        // 20 units of depth reach only the two cheapest offers
        let avg = avg_offer_price(&state, &btc, &usd, &usd, 20).unwrap();
        assert_eq!(avg, dec!(105));

        // deeper than the whole book: partial consumption still averages
        let avg = avg_offer_price(&state, &btc, &usd, &usd, 40).unwrap();
        assert_eq!(avg, dec!(110));
    }

    #[test]
    fn base_selling_side_converts_amounts() {
        let mut state = LedgerState::new(LedgerHeader::default());
        let btc = coin("BTC");
        let usd = coin("USD");
        // selling USD for BTC: price is BTC per USD, 1/100 means $100 per BTC
        state.create(offer(1, &usd, &btc, 1_000, Price::new(1, 100)));

        let avg = avg_offer_price(&state, &usd, &btc, &usd, 20).unwrap();
        assert_eq!(avg, dec!(100));
    }

    #[test]
    fn mid_price_averages_both_sides() {
        let mut state = LedgerState::new(LedgerHeader::default());
        let btc = coin("BTC");
        let usd = coin("USD");
        state.create(offer(1, &btc, &usd, 100, Price::new(100, 1)));
        state.create(offer(2, &usd, &btc, 10_000, Price::new(1, 90)));

        let mid = mid_orderbook_price(&state, &btc, &usd, &usd, 10);
        assert_eq!(mid, Some(dec!(95)));

        // one-sided book: no mid
        let mut one_sided = LedgerState::new(LedgerHeader::default());
        one_sided.create(offer(1, &btc, &usd, 100, Price::new(100, 1)));
        assert_eq!(mid_orderbook_price(&one_sided, &btc, &usd, &usd, 10), None);
    }

    #[test]
    fn reference_price_decodes_and_parses() {
        let mut state = LedgerState::new(LedgerHeader::default());
        let feed = AccountId::from_byte(0xEE);
        state.create(LedgerEntry::new(LedgerEntryData::Data(DataEntry {
            account_id: feed,
            data_name: "BTCUSD".to_string(),
            data_value: BASE64.encode("123.45").into_bytes(),
        })));

        assert_eq!(
            reference_price(&state, "BTCUSD", &feed),
            Some(dec!(123.45))
        );
        assert_eq!(reference_price(&state, "ETHUSD", &feed), None);
    }

    #[test]
    fn reference_price_rejects_garbage() {
        let mut state = LedgerState::new(LedgerHeader::default());
        let feed = AccountId::from_byte(0xEE);
        state.create(LedgerEntry::new(LedgerEntryData::Data(DataEntry {
            account_id: feed,
            data_name: "BAD".to_string(),
            data_value: b"!!not-base64!!".to_vec(),
        })));
        state.create(LedgerEntry::new(LedgerEntryData::Data(DataEntry {
            account_id: feed,
            data_name: "NAN".to_string(),
            data_value: BASE64.encode("not a number").into_bytes(),
        })));
        state.create(LedgerEntry::new(LedgerEntryData::Data(DataEntry {
            account_id: feed,
            data_name: "ZERO".to_string(),
            data_value: BASE64.encode("0").into_bytes(),
        })));

        assert_eq!(reference_price(&state, "BAD", &feed), None);
        assert_eq!(reference_price(&state, "NAN", &feed), None);
        assert_eq!(reference_price(&state, "ZERO", &feed), None);
    }
}
