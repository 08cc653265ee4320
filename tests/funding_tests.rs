//! End-to-end funding scenarios.
//!
//! Each test seeds a ledger with an oracle feed, an order book around a target
//! mid price, and a pair of opposing debt holders, then drives the funding
//! operation and checks the exact transfers.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use margin_core::*;

const COIN_ISSUER: u8 = 0xAA;
const BASE_ISSUER: u8 = 0xBB;
const FEED: u8 = 0xEE;
const MAKER: u8 = 0x70;

fn coin() -> Asset {
    Asset::alphanum4("COIN", AccountId::from_byte(COIN_ISSUER))
}

fn base() -> Asset {
    Asset::alphanum4("BASE", AccountId::from_byte(BASE_ISSUER))
}

fn engine() -> Engine {
    Engine::new(vec![TradingPair {
        name: "COIN-BASE".to_string(),
        coin1: CoinConfig::new("COIN", AccountId::from_byte(COIN_ISSUER)),
        coin2: CoinConfig::new("BASE", AccountId::from_byte(BASE_ISSUER)),
        base: CoinConfig::new("BASE", AccountId::from_byte(BASE_ISSUER)),
        reference_feed: FeedConfig {
            data_name: "COINBASE".to_string(),
            issuer: AccountId::from_byte(FEED),
        },
    }])
}

fn fresh_state(close_time: u64) -> LedgerState {
    LedgerState::new(LedgerHeader {
        ledger_seq: 1,
        ledger_version: 10,
        base_reserve: 5,
        close_time,
        ..LedgerHeader::default()
    })
}

fn set_reference_price(state: &mut LedgerState, value: &str) {
    state.create(LedgerEntry::new(LedgerEntryData::Data(DataEntry {
        account_id: AccountId::from_byte(FEED),
        data_name: "COINBASE".to_string(),
        data_value: BASE64.encode(value).into_bytes(),
    })));
}

/// Seed both sides of the book so the mid price comes out exactly `n / d`
/// (base units per coin).
fn seed_book(state: &mut LedgerState, n: i32, d: i32) {
    let maker = AccountId::from_byte(MAKER);
    let coin_amount = DEPTH_THRESHOLD;
    // selling coin for base at n/d
    state.create(LedgerEntry::new(LedgerEntryData::Offer(OfferEntry {
        seller_id: maker,
        offer_id: OfferId(1),
        selling: coin(),
        buying: base(),
        amount: coin_amount,
        price: Price::new(n, d),
        flags: 0,
    })));
    // selling base for coin at the inverse, deep enough to cover the probe
    state.create(LedgerEntry::new(LedgerEntryData::Offer(OfferEntry {
        seller_id: maker,
        offer_id: OfferId(2),
        selling: base(),
        buying: coin(),
        amount: coin_amount * n as i64 / d as i64,
        price: Price::new(d, n),
        flags: 0,
    })));
}

fn add_position(state: &mut LedgerState, account: u8, coin_debt: i64, base_balance: i64) {
    let id = AccountId::from_byte(account);
    let mut coin_line = TrustLineEntry::new(id, coin(), 1_000_000);
    coin_line.debt = coin_debt;
    state.create(LedgerEntry::new(LedgerEntryData::TrustLine(coin_line)));
    let mut base_line = TrustLineEntry::new(id, base(), 1_000_000);
    base_line.balance = base_balance;
    state.create(LedgerEntry::new(LedgerEntryData::TrustLine(base_line)));
}

fn base_balance(state: &LedgerState, account: u8) -> i64 {
    state
        .get(&LedgerKey::trust_line(AccountId::from_byte(account), base()))
        .unwrap()
        .as_trust_line()
        .unwrap()
        .balance
}

#[test]
fn funding_pays_shorts_when_mid_below_ref() {
    let engine = engine();
    let mut state = fresh_state(4_000);
    set_reference_price(&mut state, "100");
    seed_book(&mut state, 95, 1); // mid = 95, ratio = -0.05
    add_position(&mut state, 1, 10_000, 1_000);
    add_position(&mut state, 2, -10_000, 1_000);

    let result = engine.run_funding(&mut state);
    assert_eq!(result.code, FundingResultCode::Success);

    // delta = trunc(-debt * ratio / ref): +5 for the short, -5 for the long
    assert_eq!(base_balance(&state, 1), 1_005);
    assert_eq!(base_balance(&state, 2), 995);
    assert_eq!(
        result.payouts,
        vec![
            Payout {
                account_id: AccountId::from_byte(1),
                asset: base(),
                amount: 5
            },
            Payout {
                account_id: AccountId::from_byte(2),
                asset: base(),
                amount: -5
            },
        ]
    );

    // debts are untouched and still conserved
    let holders = state.debt_holders(&coin());
    assert_eq!(holders.iter().map(|t| t.debt).sum::<i64>(), 0);

    assert_eq!(state.header().last_funding, 4_000);
    assert_eq!(state.header().inflation_seq, 1);
    assert_eq!(state.depth(), 0);
}

#[test]
fn funding_skips_inside_the_dead_band() {
    let engine = engine();
    let mut state = fresh_state(4_000);
    set_reference_price(&mut state, "100");
    seed_book(&mut state, 998, 10); // mid = 99.8, |diff| = 0.002 * ref
    add_position(&mut state, 1, 10_000, 1_000);
    add_position(&mut state, 2, -10_000, 1_000);

    let result = engine.run_funding(&mut state);

    // no transfer, but the tick still counts
    assert_eq!(result.code, FundingResultCode::Success);
    assert!(result.payouts.is_empty());
    assert_eq!(base_balance(&state, 1), 1_000);
    assert_eq!(base_balance(&state, 2), 1_000);
    assert_eq!(state.header().last_funding, 4_000);
}

#[test]
fn funding_threshold_boundary_is_exclusive() {
    let engine = engine();
    let mut state = fresh_state(4_000);
    set_reference_price(&mut state, "100");
    seed_book(&mut state, 995, 10); // |mid - ref| is exactly 0.005 * ref
    add_position(&mut state, 1, 10_000, 1_000);
    add_position(&mut state, 2, -10_000, 1_000);

    let result = engine.run_funding(&mut state);
    assert_eq!(result.code, FundingResultCode::Success);
    assert!(result.payouts.is_empty());
    assert_eq!(base_balance(&state, 1), 1_000);
}

#[test]
fn funding_too_early_changes_nothing() {
    let engine = engine();
    let mut state = fresh_state(4_000);
    state.header_mut().last_funding = 3_000; // only 1000s ago
    set_reference_price(&mut state, "100");
    seed_book(&mut state, 95, 1);
    add_position(&mut state, 1, 10_000, 1_000);
    add_position(&mut state, 2, -10_000, 1_000);

    let result = engine.run_funding(&mut state);
    assert_eq!(result.code, FundingResultCode::NotTime);
    assert!(result.payouts.is_empty());
    assert_eq!(base_balance(&state, 1), 1_000);
    assert_eq!(state.header().last_funding, 3_000);
    assert_eq!(state.header().inflation_seq, 0);
}

#[test]
fn funding_ratio_is_clamped_to_ten_percent() {
    let engine = engine();
    let mut state = fresh_state(4_000);
    set_reference_price(&mut state, "100");
    seed_book(&mut state, 50, 1); // raw ratio -0.5, clamped to -0.1
    add_position(&mut state, 1, 10_000, 1_000);
    add_position(&mut state, 2, -10_000, 1_000);

    let result = engine.run_funding(&mut state);
    assert_eq!(result.code, FundingResultCode::Success);

    // trunc(-10000 * -0.1 / 100) = 10, not 50
    assert_eq!(base_balance(&state, 1), 1_010);
    assert_eq!(base_balance(&state, 2), 990);
    for payout in &result.payouts {
        assert!(payout.amount.abs() <= 10_000 / 10 / 100);
    }
}

#[test]
fn broken_debt_conservation_aborts_the_tick() {
    let engine = engine();
    let mut state = fresh_state(4_000);
    set_reference_price(&mut state, "100");
    seed_book(&mut state, 95, 1);
    add_position(&mut state, 1, 10_000, 1_000);
    add_position(&mut state, 2, -9_000, 1_000); // sums to +1000

    let result = engine.run_funding(&mut state);
    assert_eq!(result.code, FundingResultCode::DebtNotZero);

    // every transfer was rolled back along with the header bump
    assert_eq!(base_balance(&state, 1), 1_000);
    assert_eq!(base_balance(&state, 2), 1_000);
    assert_eq!(state.header().last_funding, 0);
    assert_eq!(state.header().inflation_seq, 0);
    assert_eq!(state.depth(), 0);
}

#[test]
fn one_sided_book_fails_with_invalid_mid() {
    let engine = engine();
    let mut state = fresh_state(4_000);
    set_reference_price(&mut state, "100");
    // only the coin-selling side exists
    state.create(LedgerEntry::new(LedgerEntryData::Offer(OfferEntry {
        seller_id: AccountId::from_byte(MAKER),
        offer_id: OfferId(1),
        selling: coin(),
        buying: base(),
        amount: DEPTH_THRESHOLD,
        price: Price::new(95, 1),
        flags: 0,
    })));
    add_position(&mut state, 1, 10_000, 1_000);
    add_position(&mut state, 2, -10_000, 1_000);

    let result = engine.run_funding(&mut state);
    assert_eq!(result.code, FundingResultCode::InvalidMidPrice);
    assert_eq!(state.header().last_funding, 0);
}

#[test]
fn missing_feed_fails_with_no_reference_price() {
    let engine = engine();
    let mut state = fresh_state(4_000);
    seed_book(&mut state, 95, 1);
    add_position(&mut state, 1, 10_000, 1_000);
    add_position(&mut state, 2, -10_000, 1_000);

    let result = engine.run_funding(&mut state);
    assert_eq!(result.code, FundingResultCode::NoReferencePrice);
    assert_eq!(base_balance(&state, 1), 1_000);
}

#[test]
fn close_ledger_runs_funding_then_liquidation() {
    let engine = engine();
    let mut state = fresh_state(4_000);
    set_reference_price(&mut state, "100");
    seed_book(&mut state, 95, 1);
    add_position(&mut state, 1, 10_000, 1_000);
    add_position(&mut state, 2, -10_000, 1_000);
    let mut host = RestingBook::new();

    let outcome = engine.close_ledger(&mut state, &mut host);
    assert_eq!(outcome.funding.code, FundingResultCode::Success);
    assert_eq!(outcome.liquidation.code, LiquidationResultCode::Success);
    assert_eq!(state.header().last_funding, 4_000);
    assert_eq!(state.header().last_liquidation, 4_000);

    // the funding transfers landed before liquidation scanned anything
    assert_eq!(base_balance(&state, 1), 1_005);
}

#[test]
fn wire_operations_dispatch() {
    let engine = engine();
    let mut state = fresh_state(4_000);
    set_reference_price(&mut state, "100");
    seed_book(&mut state, 95, 1);
    add_position(&mut state, 1, 10_000, 1_000);
    add_position(&mut state, 2, -10_000, 1_000);
    let mut host = RestingBook::new();

    let outcome = engine.apply(
        &mut state,
        &mut host,
        &Operation {
            source_account: AccountId::from_byte(1),
            body: OperationBody::Inflation,
        },
    );
    match outcome {
        OperationOutcome::Funding(result) => assert_eq!(result.code, FundingResultCode::Success),
        other => panic!("expected a funding result, got {other:?}"),
    }

    // a user margin offer goes through the same host boundary
    state.create(LedgerEntry::new(LedgerEntryData::Account(AccountEntry::new(
        AccountId::from_byte(1),
        1_000,
    ))));
    let outcome = engine.apply(
        &mut state,
        &mut host,
        &Operation {
            source_account: AccountId::from_byte(1),
            body: OperationBody::CreateMarginOffer {
                amount: 100,
                selling: base(),
                buying: coin(),
                price: Price::new(1, 95),
            },
        },
    );
    match outcome {
        OperationOutcome::Offer(result) => assert!(result.is_success()),
        other => panic!("expected an offer result, got {other:?}"),
    }
    assert_eq!(
        state
            .offers_by_account_and_asset(&AccountId::from_byte(1), &base())
            .len(),
        1
    );
}

#[test]
fn tiny_debts_truncate_to_zero_transfers() {
    let engine = engine();
    let mut state = fresh_state(4_000);
    set_reference_price(&mut state, "100");
    seed_book(&mut state, 95, 1);
    // delta = trunc(-1000 * -0.05 / 100) = trunc(0.5) = 0
    add_position(&mut state, 1, 1_000, 1_000);
    add_position(&mut state, 2, -1_000, 1_000);

    let result = engine.run_funding(&mut state);
    assert_eq!(result.code, FundingResultCode::Success);
    assert_eq!(base_balance(&state, 1), 1_000);
    assert_eq!(base_balance(&state, 2), 1_000);
    // the zero transfers are still reported
    assert_eq!(result.payouts.len(), 2);
    assert!(result.payouts.iter().all(|p| p.amount == 0));
}
