//! End-to-end liquidation scenarios: marking, recovery, and forced-offer
//! reconciliation through the passive resting book.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use margin_core::*;

const COIN_ISSUER: u8 = 0xAA;
const BASE_ISSUER: u8 = 0xBB;
const FEED: u8 = 0xEE;
const TRADER: u8 = 0x01;

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

fn fresh_state(close_time: u64, reference: &str) -> LedgerState {
    let mut state = LedgerState::new(LedgerHeader {
        ledger_seq: 1,
        ledger_version: 10,
        base_reserve: 5,
        close_time,
        ..LedgerHeader::default()
    });
    state.create(LedgerEntry::new(LedgerEntryData::Data(DataEntry {
        account_id: AccountId::from_byte(FEED),
        data_name: "COINBASE".to_string(),
        data_value: BASE64.encode(reference).into_bytes(),
    })));
    // the base issuer carries the base-asset flag so margin liabilities land
    // on the right leg
    let mut base_issuer = AccountEntry::new(AccountId::from_byte(BASE_ISSUER), 0);
    base_issuer.flags |= ACCOUNT_BASE_ASSET_ISSUER_FLAG;
    state.create(LedgerEntry::new(LedgerEntryData::Account(base_issuer)));
    state
}

fn add_trader(
    state: &mut LedgerState,
    coin_balance: i64,
    coin_debt: i64,
    base_balance: i64,
    base_debt: i64,
) {
    let id = AccountId::from_byte(TRADER);
    state.create(LedgerEntry::new(LedgerEntryData::Account(AccountEntry::new(
        id, 1_000,
    ))));
    let mut coin_line = TrustLineEntry::new(id, coin(), 100);
    coin_line.balance = coin_balance;
    coin_line.debt = coin_debt;
    state.create(LedgerEntry::new(LedgerEntryData::TrustLine(coin_line)));
    let mut base_line = TrustLineEntry::new(id, base(), 100);
    base_line.balance = base_balance;
    base_line.debt = base_debt;
    state.create(LedgerEntry::new(LedgerEntryData::TrustLine(base_line)));
}

fn is_liquidating(state: &LedgerState, asset: &Asset) -> bool {
    state
        .get(&LedgerKey::trust_line(
            AccountId::from_byte(TRADER),
            asset.clone(),
        ))
        .unwrap()
        .as_trust_line()
        .unwrap()
        .is_liquidating()
}

fn set_base_balance(state: &mut LedgerState, balance: i64) {
    let key = LedgerKey::trust_line(AccountId::from_byte(TRADER), base());
    if let LedgerEntryData::TrustLine(tl) = &mut state.load_mut(&key).unwrap().data {
        tl.balance = balance;
    }
}

#[test]
fn mark_and_unmark_cycle() {
    let engine = engine();
    // equity = (10 - 0) * 1 + (0 - 15) * 1 = -5, under water
    let mut state = fresh_state(1_000, "1");
    add_trader(&mut state, 10, 0, 0, 15);
    let mut host = RestingBook::new();

    let result = engine.run_liquidation(&mut state, &mut host);
    assert!(result.is_success());
    assert!(is_liquidating(&state, &coin()));
    assert!(is_liquidating(&state, &base()));
    assert_eq!(state.header().last_liquidation, 1_000);

    // an external credit brings the position back above water
    set_base_balance(&mut state, 20);
    state.header_mut().close_time = 1_400;

    let result = engine.run_liquidation(&mut state, &mut host);
    assert!(result.is_success());
    assert!(!is_liquidating(&state, &coin()));
    assert!(!is_liquidating(&state, &base()));
    assert_eq!(state.header().last_liquidation, 1_400);
}

#[test]
fn marking_is_idempotent() {
    let engine = engine();
    let mut state = fresh_state(1_000, "1");
    add_trader(&mut state, 10, 0, 0, 15);
    let mut host = RestingBook::new();

    engine.run_liquidation(&mut state, &mut host);
    let flags_after_one = (is_liquidating(&state, &coin()), is_liquidating(&state, &base()));

    state.header_mut().close_time = 1_400;
    engine.run_liquidation(&mut state, &mut host);
    let flags_after_two = (is_liquidating(&state, &coin()), is_liquidating(&state, &base()));

    assert_eq!(flags_after_one, flags_after_two);
    assert_eq!(flags_after_one, (true, true));
}

#[test]
fn liquidation_too_early_reports_not_time() {
    let engine = engine();
    let mut state = fresh_state(200, "1"); // interval is 300
    add_trader(&mut state, 10, 0, 0, 15);
    let mut host = RestingBook::new();

    let result = engine.run_liquidation(&mut state, &mut host);
    assert_eq!(result.code, LiquidationResultCode::NotTime);
    assert!(!is_liquidating(&state, &coin()));
    assert_eq!(state.header().last_liquidation, 0);
}

#[test]
fn tick_advances_clock_even_with_nothing_to_do() {
    let engine = engine();
    let mut state = fresh_state(1_000, "1");
    // healthy position
    add_trader(&mut state, 50, 0, 20, 0);
    let mut host = RestingBook::new();

    let result = engine.run_liquidation(&mut state, &mut host);
    assert!(result.is_success());
    assert!(!is_liquidating(&state, &coin()));
    assert_eq!(state.header().last_liquidation, 1_000);
}

#[test]
fn zero_unwind_amount_places_no_offer() {
    let engine = engine();
    // short 5 coin against a sliver of collateral: equity = -50 + 2 = -48,
    // but the base leg carries no debt so there is nothing to unwind
    let mut state = fresh_state(1_000, "10");
    add_trader(&mut state, 0, 5, 2, 0);
    let mut host = RestingBook::new();

    let result = engine.run_liquidation(&mut state, &mut host);
    assert!(result.is_success());
    assert!(is_liquidating(&state, &coin()));
    assert!(state
        .offers_by_account_and_asset(&AccountId::from_byte(TRADER), &base())
        .is_empty());
}

#[test]
fn forced_offer_unwinds_the_debt_leg() {
    let engine = engine();
    // short 5 coin at ref 10, long 3 base owed: equity = -50 + 43 = -7
    let mut state = fresh_state(1_000, "10");
    add_trader(&mut state, 0, 5, 40, -3);
    let mut host = RestingBook::new();

    let result = engine.run_liquidation(&mut state, &mut host);
    assert!(result.is_success());

    let offers = state.offers_by_account_and_asset(&AccountId::from_byte(TRADER), &base());
    assert_eq!(offers.len(), 1);
    let offer = offers.values().next().unwrap();
    assert_eq!(offer.buying, coin());
    assert_eq!(offer.amount, 3);
    // d = |0 - 5| * 10^4 / |-3 - 40| = 50000 / 43 = 1162, n = 10^4
    assert_eq!(offer.price, Price::new(10_000, 1_162));
}

#[test]
fn reconciliation_keeps_exactly_one_offer() {
    let engine = engine();
    let mut state = fresh_state(1_000, "10");
    add_trader(&mut state, 0, 5, 40, -3);
    let mut host = RestingBook::new();

    engine.run_liquidation(&mut state, &mut host);
    state.header_mut().close_time = 1_400;
    engine.run_liquidation(&mut state, &mut host);

    let offers = state.offers_by_account_and_asset(&AccountId::from_byte(TRADER), &base());
    assert_eq!(offers.len(), 1, "a second tick must not double the offer");
    assert_eq!(offers.values().next().unwrap().amount, 3);
}

#[test]
fn stale_offers_are_swept_before_placing() {
    let engine = engine();
    let mut state = fresh_state(1_000, "10");
    add_trader(&mut state, 0, 5, 40, -3);
    let mut host = RestingBook::new();

    // a leftover forced offer with the wrong size rests on the book
    let stale = apply_liquidation_offer(
        &mut state,
        &mut host,
        AccountId::from_byte(TRADER),
        0,
        7,
        base(),
        coin(),
        Price::new(10_000, 1_162),
    );
    assert!(stale.is_success());
    let stale_id = stale.offer.unwrap().offer_id;

    engine.run_liquidation(&mut state, &mut host);

    let offers = state.offers_by_account_and_asset(&AccountId::from_byte(TRADER), &base());
    assert_eq!(offers.len(), 1);
    let offer = offers.values().next().unwrap();
    assert_ne!(offer.offer_id, stale_id);
    assert_eq!(offer.amount, 3);
}

#[test]
fn recovered_position_with_exact_zero_equity_unmarks() {
    let engine = engine();
    let mut state = fresh_state(1_000, "1");
    add_trader(&mut state, 10, 0, 0, 15);
    let mut host = RestingBook::new();

    engine.run_liquidation(&mut state, &mut host);
    assert!(is_liquidating(&state, &coin()));

    // equity = 10 + (5 - 15) = 0: no longer under water
    set_base_balance(&mut state, 5);
    state.header_mut().close_time = 1_400;
    engine.run_liquidation(&mut state, &mut host);

    assert!(!is_liquidating(&state, &coin()));
    assert!(!is_liquidating(&state, &base()));
}
