// 2.0: integer-exact accounting. every mutation of balance, debt, or liabilities
// funnels through here and reports failure instead of wrapping, saturating, or
// silently clamping. amounts are i64; intermediates that can outgrow i64 use i128.

use crate::entry::{AccountEntry, LedgerEntry, LedgerEntryData, LedgerHeader, LedgerKey, OfferEntry};
use crate::ledger::LedgerState;
use crate::types::{Asset, Liabilities, MAX_LEVERAGE};
use thiserror::Error;

/// Liability bookkeeping failures around offers. `Capacity` is an expected
/// outcome; the missing-entry variants are structural.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LiabilityError {
    #[error("offer buys and sells the same asset")]
    SameAsset,
    #[error("seller account does not exist")]
    MissingAccount,
    #[error("seller trustline does not exist")]
    MissingTrustLine,
    #[error("liability change exceeds available capacity")]
    Capacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

// 2.1: a * b / c with an i128 intermediate. defined for a, b >= 0 and c > 0;
// None when the result does not fit i64.
pub fn big_divide(a: i64, b: i64, c: i64, rounding: Rounding) -> Option<i64> {
    if a < 0 || b < 0 || c <= 0 {
        return None;
    }
    let product = a as i128 * b as i128;
    let quotient = match rounding {
        Rounding::Down => product / c as i128,
        Rounding::Up => (product + c as i128 - 1) / c as i128,
    };
    i64::try_from(quotient).ok()
}

fn bounded_add(current: i64, delta: i64, lower: i64, upper: i64) -> Option<i64> {
    let next = current.checked_add(delta)?;
    if next < lower || next > upper {
        return None;
    }
    Some(next)
}

fn liabilities_mut(liabilities: &mut Option<Liabilities>) -> &mut Liabilities {
    liabilities.get_or_insert(Liabilities::default())
}

// 2.2: balance arithmetic. zero deltas always succeed, even on frozen lines.
pub fn add_balance(header: &LedgerHeader, entry: &mut LedgerEntry, delta: i64) -> bool {
    match &mut entry.data {
        LedgerEntryData::Account(acc) => {
            if delta == 0 {
                return true;
            }
            let Some(next) = bounded_add(acc.balance, delta, 0, i64::MAX) else {
                return false;
            };
            if header.ledger_version >= 10 {
                let min = get_min_balance(header, acc.num_sub_entries);
                let liab = acc.liabilities.unwrap_or_default();
                if delta < 0 && next - min < liab.selling {
                    return false;
                }
                if next > i64::MAX - liab.buying {
                    return false;
                }
            }
            acc.balance = next;
            true
        }
        LedgerEntryData::TrustLine(tl) => {
            if delta == 0 {
                return true;
            }
            if !tl.is_authorized() {
                return false;
            }
            let Some(next) = bounded_add(tl.balance, delta, 0, tl.limit) else {
                return false;
            };
            if header.ledger_version >= 10 {
                let liab = tl.liabilities.unwrap_or_default();
                if next < liab.selling {
                    return false;
                }
                if next > tl.limit - liab.buying {
                    return false;
                }
            }
            tl.balance = next;
            true
        }
        _ => panic!("balance arithmetic on a non-balance entry"),
    }
}

// 2.3: debt arithmetic. |debt| is capped by the trustline limit on both sides.
pub fn add_debt(entry: &mut LedgerEntry, delta: i64) -> bool {
    match &mut entry.data {
        LedgerEntryData::TrustLine(tl) => {
            if delta == 0 {
                return true;
            }
            if !tl.is_authorized() {
                return false;
            }
            let Some(next) = bounded_add(tl.debt, delta, -tl.limit, tl.limit) else {
                return false;
            };
            tl.debt = next;
            true
        }
        _ => panic!("debt arithmetic on a non-trustline entry"),
    }
}

// 2.4: buying liabilities are capped by remaining receive capacity.
pub fn add_buying_liabilities(header: &LedgerHeader, entry: &mut LedgerEntry, delta: i64) -> bool {
    if delta == 0 {
        return true;
    }
    match &mut entry.data {
        LedgerEntryData::Account(acc) => {
            let current = acc.liabilities.unwrap_or_default().buying;
            let max = i64::MAX - acc.balance;
            let Some(next) = bounded_add(current, delta, 0, max) else {
                return false;
            };
            liabilities_mut(&mut acc.liabilities).buying = next;
            true
        }
        LedgerEntryData::TrustLine(tl) => {
            if !tl.is_authorized() {
                return false;
            }
            let current = tl.liabilities.unwrap_or_default().buying;
            let max = tl.limit - tl.balance;
            let Some(next) = bounded_add(current, delta, 0, max) else {
                return false;
            };
            liabilities_mut(&mut tl.liabilities).buying = next;
            true
        }
        _ => panic!("liability arithmetic on a non-balance entry"),
    }
}

// 2.5: selling liabilities. in margin mode the booked delta is the offer size
// divided by the leverage cap, and the ceiling is the caller-computed maximum
// (falling back to the trustline limit when negative). outside margin mode the
// ceiling is the spendable balance.
pub fn add_selling_liabilities(
    header: &LedgerHeader,
    entry: &mut LedgerEntry,
    delta: i64,
    margin_trade: bool,
    max_liability: i64,
) -> bool {
    if delta == 0 {
        return true;
    }
    match &mut entry.data {
        LedgerEntryData::Account(acc) => {
            let current = acc.liabilities.unwrap_or_default().selling;
            let max = acc.balance - get_min_balance(header, acc.num_sub_entries);
            if max < 0 {
                return false;
            }
            let Some(next) = bounded_add(current, delta, 0, max) else {
                return false;
            };
            liabilities_mut(&mut acc.liabilities).selling = next;
            true
        }
        LedgerEntryData::TrustLine(tl) => {
            if !tl.is_authorized() {
                return false;
            }
            let current = tl.liabilities.unwrap_or_default().selling;
            let (effective, max) = if margin_trade {
                let cap = if max_liability < 0 { tl.limit } else { max_liability };
                (delta / MAX_LEVERAGE, cap)
            } else {
                (delta, tl.balance)
            };
            let Some(next) = bounded_add(current, effective, 0, max) else {
                return false;
            };
            liabilities_mut(&mut tl.liabilities).selling = next;
            true
        }
        _ => panic!("liability arithmetic on a non-balance entry"),
    }
}

pub fn get_buying_liabilities(entry: &LedgerEntry) -> i64 {
    match &entry.data {
        LedgerEntryData::Account(acc) => acc.liabilities.unwrap_or_default().buying,
        LedgerEntryData::TrustLine(tl) => tl.liabilities.unwrap_or_default().buying,
        _ => panic!("liabilities read on a non-balance entry"),
    }
}

pub fn get_selling_liabilities(entry: &LedgerEntry) -> i64 {
    match &entry.data {
        LedgerEntryData::Account(acc) => acc.liabilities.unwrap_or_default().selling,
        LedgerEntryData::TrustLine(tl) => tl.liabilities.unwrap_or_default().selling,
        _ => panic!("liabilities read on a non-balance entry"),
    }
}

/// Reserve floor for an account: (2 + sub-entries) * base reserve.
pub fn get_min_balance(header: &LedgerHeader, num_sub_entries: u32) -> i64 {
    (2 + num_sub_entries as i64) * header.base_reserve as i64
}

/// What the entry can actually spend right now.
pub fn get_available_balance(header: &LedgerHeader, entry: &LedgerEntry) -> i64 {
    let mut available = match &entry.data {
        LedgerEntryData::Account(acc) => acc.balance - get_min_balance(header, acc.num_sub_entries),
        LedgerEntryData::TrustLine(tl) => tl.balance,
        _ => panic!("balance read on a non-balance entry"),
    };
    if header.ledger_version >= 10 {
        available -= get_selling_liabilities(entry);
    }
    available
}

/// How much the entry can still receive.
pub fn get_max_amount_receive(header: &LedgerHeader, entry: &LedgerEntry) -> i64 {
    match &entry.data {
        LedgerEntryData::Account(acc) => {
            let mut max = i64::MAX;
            if header.ledger_version >= 10 {
                max -= acc.balance + get_buying_liabilities(entry);
            }
            max
        }
        LedgerEntryData::TrustLine(tl) => {
            if !tl.is_authorized() {
                return 0;
            }
            let mut max = tl.limit - tl.balance;
            if header.ledger_version >= 10 {
                max -= get_buying_liabilities(entry);
            }
            max
        }
        _ => panic!("balance read on a non-balance entry"),
    }
}

/// Lowest limit the trustline could be shrunk to.
pub fn get_minimum_limit(header: &LedgerHeader, entry: &LedgerEntry) -> i64 {
    let tl = entry
        .as_trust_line()
        .expect("minimum limit of a non-trustline entry");
    let mut min = tl.balance;
    if header.ledger_version >= 10 {
        min += get_buying_liabilities(entry);
    }
    min
}

// 2.6: sub-entry counting, gated on the reserve floor.
pub fn add_num_entries(header: &LedgerHeader, entry: &mut LedgerEntry, count: i32) -> bool {
    let version = header.ledger_version;
    let min_selling = if version >= 10 {
        get_selling_liabilities(entry)
    } else {
        0
    };
    match &mut entry.data {
        LedgerEntryData::Account(acc) => {
            let next = acc.num_sub_entries as i64 + count as i64;
            assert!(next >= 0, "negative sub-entry count");
            let floor = get_min_balance(header, next as u32) + min_selling;
            if count > 0 && acc.balance < floor {
                return false;
            }
            acc.num_sub_entries = next as u32;
            true
        }
        _ => panic!("sub-entry arithmetic on a non-account entry"),
    }
}

// 2.7: liability projection of an open offer.
pub fn offer_selling_liabilities(offer: &OfferEntry) -> i64 {
    offer.amount
}

/// Consideration the offer could pull in, rounded up so the reservation can
/// never fall short of an actual fill.
pub fn offer_buying_liabilities(offer: &OfferEntry) -> Option<i64> {
    big_divide(offer.amount, offer.price.n as i64, offer.price.d as i64, Rounding::Up)
}

/// Whether the asset's issuer account carries the base-asset flag.
pub fn is_base_asset(state: &LedgerState, asset: &Asset) -> bool {
    let Some(issuer) = asset.issuer() else {
        return false;
    };
    state
        .get(&LedgerKey::Account { account_id: issuer })
        .and_then(LedgerEntry::as_account)
        .map_or(false, AccountEntry::is_base_asset_issuer)
}

/// Reserve the liabilities an offer needs while it rests on the book.
pub fn acquire_liabilities(
    state: &mut LedgerState,
    offer: &OfferEntry,
    margin_trade: bool,
    max_liability: i64,
) -> Result<(), LiabilityError> {
    apply_offer_liabilities(state, offer, true, margin_trade, max_liability)
}

/// Give back exactly what `acquire_liabilities` reserved.
pub fn release_liabilities(
    state: &mut LedgerState,
    offer: &OfferEntry,
    margin_trade: bool,
    max_liability: i64,
) -> Result<(), LiabilityError> {
    apply_offer_liabilities(state, offer, false, margin_trade, max_liability)
}

// 2.8: liability routing. the buying leg books on the buying trustline (or the
// account for native). the selling leg normally books on the selling trustline;
// a margin trade instead books on whichever leg is the base asset, converting
// through the offer price when the base sits on the buying side.
fn apply_offer_liabilities(
    state: &mut LedgerState,
    offer: &OfferEntry,
    acquire: bool,
    margin_trade: bool,
    max_liability: i64,
) -> Result<(), LiabilityError> {
    if offer.selling == offer.buying {
        return Err(LiabilityError::SameAsset);
    }
    let header = *state.header();
    let sign: i64 = if acquire { 1 } else { -1 };

    let buying_delta = sign
        .checked_mul(offer_buying_liabilities(offer).ok_or(LiabilityError::Capacity)?)
        .ok_or(LiabilityError::Capacity)?;
    let selling_delta = sign * offer_selling_liabilities(offer);

    let account_key = LedgerKey::Account {
        account_id: offer.seller_id,
    };

    if offer.buying.is_native() {
        let entry = state
            .load_mut(&account_key)
            .ok_or(LiabilityError::MissingAccount)?;
        if !add_buying_liabilities(&header, entry, buying_delta) {
            return Err(LiabilityError::Capacity);
        }
    } else {
        let key = LedgerKey::trust_line(offer.seller_id, offer.buying.clone());
        let entry = state
            .load_mut(&key)
            .ok_or(LiabilityError::MissingTrustLine)?;
        if !add_buying_liabilities(&header, entry, buying_delta) {
            return Err(LiabilityError::Capacity);
        }
    }

    if offer.selling.is_native() {
        let entry = state
            .load_mut(&account_key)
            .ok_or(LiabilityError::MissingAccount)?;
        if !add_selling_liabilities(&header, entry, selling_delta, false, 0) {
            return Err(LiabilityError::Capacity);
        }
    } else if margin_trade {
        if is_base_asset(state, &offer.selling) {
            let key = LedgerKey::trust_line(offer.seller_id, offer.selling.clone());
            let entry = state
                .load_mut(&key)
                .ok_or(LiabilityError::MissingTrustLine)?;
            if !add_selling_liabilities(&header, entry, selling_delta, true, max_liability) {
                return Err(LiabilityError::Capacity);
            }
        } else {
            // the base sits on the buying side; book its price-equivalent there
            let scaled = (selling_delta as i128 * offer.price.n as i128 / offer.price.d as i128)
                .try_into()
                .map_err(|_| LiabilityError::Capacity)?;
            let key = LedgerKey::trust_line(offer.seller_id, offer.buying.clone());
            let entry = state
                .load_mut(&key)
                .ok_or(LiabilityError::MissingTrustLine)?;
            if !add_selling_liabilities(&header, entry, scaled, true, max_liability) {
                return Err(LiabilityError::Capacity);
            }
        }
    } else {
        let key = LedgerKey::trust_line(offer.seller_id, offer.selling.clone());
        let entry = state
            .load_mut(&key)
            .ok_or(LiabilityError::MissingTrustLine)?;
        if !add_selling_liabilities(&header, entry, selling_delta, false, 0) {
            return Err(LiabilityError::Capacity);
        }
    }

    Ok(())
}
