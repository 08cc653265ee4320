//! Operation wire model and the forced-offer boundary.
//!
//! Margin and liquidation offers are thin translations onto a manage-offer
//! invocation: the liquidation flavour carries an offer id (zero for "place
//! new") and both flavours run with the margin liability rules. The matching
//! engine itself is an external collaborator behind `OfferHost`; `RestingBook`
//! is the passive stand-in used by the engine's own tests. It books and
//! cancels resting offers with full liability accounting but never crosses
//! the book.

use super::results::{ManageOfferOutcome, OfferHostError, OfferResultCode};
use crate::accounting::{
    self, acquire_liabilities, release_liabilities, LiabilityError,
};
use crate::entry::{LedgerEntry, LedgerEntryData, LedgerKey, OfferEntry};
use crate::ledger::LedgerState;
use crate::trustline::TrustLineView;
use crate::types::{AccountId, Asset, OfferId, Price};
use tracing::debug;

/// Wire operations understood by the core.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationBody {
    /// User-initiated margin trade.
    CreateMarginOffer {
        amount: i64,
        selling: Asset,
        buying: Asset,
        price: Price,
    },
    /// Internal, emitted by the liquidation engine. A zero amount with a
    /// nonzero offer id is a cancellation.
    CreateLiquidationOffer {
        offer_id: u64,
        amount: i64,
        selling: Asset,
        buying: Asset,
        price: Price,
    },
    /// Trigger the funding operation.
    Inflation,
    /// Trigger the liquidation operation.
    Liquidation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub source_account: AccountId,
    pub body: OperationBody,
}

/// What actually reaches the matching engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ManageOfferRequest {
    pub account_id: AccountId,
    /// Zero places a new offer; nonzero addresses an existing one.
    pub offer_id: u64,
    pub selling: Asset,
    pub buying: Asset,
    pub amount: i64,
    pub price: Price,
    pub margin_trade: bool,
    pub liquidation: bool,
}

impl ManageOfferRequest {
    pub fn is_cancellation(&self) -> bool {
        self.amount == 0 && self.offer_id != 0
    }
}

/// The external offer-matching engine. Implementations report expected
/// failures through the outcome's inner code; an `Err` means the operation
/// never properly ran and is treated as fatal by the adapter.
pub trait OfferHost {
    fn manage_offer(
        &mut self,
        state: &mut LedgerState,
        request: &ManageOfferRequest,
    ) -> Result<ManageOfferOutcome, OfferHostError>;
}

/// Translate a user margin trade into a manage-offer invocation.
pub fn apply_margin_offer(
    state: &mut LedgerState,
    host: &mut dyn OfferHost,
    source: AccountId,
    amount: i64,
    selling: Asset,
    buying: Asset,
    price: Price,
) -> ManageOfferOutcome {
    let request = ManageOfferRequest {
        account_id: source,
        offer_id: 0,
        selling,
        buying,
        amount,
        price,
        margin_trade: true,
        liquidation: false,
    };
    submit(state, host, &request)
}

/// Translate a forced liquidation offer into a manage-offer invocation.
pub fn apply_liquidation_offer(
    state: &mut LedgerState,
    host: &mut dyn OfferHost,
    source: AccountId,
    offer_id: u64,
    amount: i64,
    selling: Asset,
    buying: Asset,
    price: Price,
) -> ManageOfferOutcome {
    let request = ManageOfferRequest {
        account_id: source,
        offer_id,
        selling,
        buying,
        amount,
        price,
        margin_trade: true,
        liquidation: true,
    };
    submit(state, host, &request)
}

fn submit(
    state: &mut LedgerState,
    host: &mut dyn OfferHost,
    request: &ManageOfferRequest,
) -> ManageOfferOutcome {
    match host.manage_offer(state, request) {
        Ok(outcome) => outcome,
        // anything outside the inner result codes means divergence, not a
        // user error; the replica must stop rather than continue blind
        Err(err) => panic!("unexpected error from forced offer: {err}"),
    }
}

/// Passive reference host: offers rest on the book untouched until cancelled.
#[derive(Debug, Default)]
pub struct RestingBook;

impl RestingBook {
    pub fn new() -> Self {
        Self
    }

    fn cancel(
        &self,
        state: &mut LedgerState,
        request: &ManageOfferRequest,
    ) -> Result<ManageOfferOutcome, OfferHostError> {
        let key = LedgerKey::offer(request.account_id, OfferId(request.offer_id));
        let Some(entry) = state.get(&key) else {
            return Ok(ManageOfferOutcome::failure(OfferResultCode::NotFound));
        };
        let offer = entry.as_offer().unwrap().clone();

        state.begin();
        // releasing what acquire reserved cannot legitimately fail; if it
        // does the ledger is already inconsistent
        release_liabilities(state, &offer, request.margin_trade, -1)
            .expect("failed to release liabilities of a resting offer");
        state
            .erase(&key)
            .expect("resting offer vanished during cancellation");
        let header = *state.header();
        let account_key = LedgerKey::Account {
            account_id: request.account_id,
        };
        let account = state
            .load_mut(&account_key)
            .expect("seller account vanished during cancellation");
        accounting::add_num_entries(&header, account, -1);
        state.commit();

        debug!(account = %request.account_id, offer = request.offer_id, "cancelled resting offer");
        Ok(ManageOfferOutcome {
            code: OfferResultCode::Success,
            offer: None,
        })
    }

    fn place(
        &self,
        state: &mut LedgerState,
        request: &ManageOfferRequest,
    ) -> Result<ManageOfferOutcome, OfferHostError> {
        // both legs need a live, authorised line (the issuer always qualifies)
        if !request.selling.is_native() {
            match TrustLineView::load(state, request.account_id, &request.selling) {
                None => return Ok(ManageOfferOutcome::failure(OfferResultCode::SellNoTrust)),
                Some(view) if !view.is_authorized(state) => {
                    return Ok(ManageOfferOutcome::failure(OfferResultCode::SellNotAuthorized))
                }
                Some(_) => {}
            }
        }
        if !request.buying.is_native() {
            match TrustLineView::load(state, request.account_id, &request.buying) {
                None => return Ok(ManageOfferOutcome::failure(OfferResultCode::BuyNoTrust)),
                Some(view) if !view.is_authorized(state) => {
                    return Ok(ManageOfferOutcome::failure(OfferResultCode::BuyNotAuthorized))
                }
                Some(_) => {}
            }
        }

        state.begin();
        let offer_id = state.header_mut().generate_id();
        let offer = OfferEntry {
            seller_id: request.account_id,
            offer_id: OfferId(offer_id),
            selling: request.selling.clone(),
            buying: request.buying.clone(),
            amount: request.amount,
            price: request.price,
            flags: 0,
        };

        match acquire_liabilities(state, &offer, request.margin_trade, -1) {
            Ok(()) => {}
            Err(LiabilityError::Capacity) => {
                state.rollback();
                return Ok(ManageOfferOutcome::failure(OfferResultCode::LineFull));
            }
            Err(LiabilityError::SameAsset) => {
                state.rollback();
                return Ok(ManageOfferOutcome::failure(OfferResultCode::Malformed));
            }
            Err(err) => {
                // trustlines were checked above; a missing entry here is structural
                state.rollback();
                return Err(OfferHostError::Rejected(err.to_string()));
            }
        }

        let header = *state.header();
        let account_key = LedgerKey::Account {
            account_id: request.account_id,
        };
        let account = state
            .load_mut(&account_key)
            .expect("seller account vanished during placement");
        if !accounting::add_num_entries(&header, account, 1) {
            state.rollback();
            return Ok(ManageOfferOutcome::failure(OfferResultCode::LowReserve));
        }

        state.create(LedgerEntry::new(LedgerEntryData::Offer(offer.clone())));
        state.commit();

        debug!(
            account = %request.account_id,
            offer = offer_id,
            amount = request.amount,
            price = %request.price,
            "placed resting offer"
        );
        Ok(ManageOfferOutcome {
            code: OfferResultCode::Success,
            offer: Some(offer),
        })
    }
}

impl OfferHost for RestingBook {
    fn manage_offer(
        &mut self,
        state: &mut LedgerState,
        request: &ManageOfferRequest,
    ) -> Result<ManageOfferOutcome, OfferHostError> {
        if request.selling == request.buying
            || request.amount < 0
            || (request.amount > 0 && !request.price.is_valid())
            || (request.amount == 0 && request.offer_id == 0)
        {
            return Ok(ManageOfferOutcome::failure(OfferResultCode::Malformed));
        }

        let account_key = LedgerKey::Account {
            account_id: request.account_id,
        };
        if state.get(&account_key).is_none() {
            return Err(OfferHostError::MissingAccount);
        }

        if request.is_cancellation() {
            return self.cancel(state, request);
        }

        if request.offer_id != 0 {
            // replace path: the old offer goes away only if the new one rests
            state.begin();
            let swept = self.cancel(state, request)?;
            if !swept.is_success() {
                state.rollback();
                return Ok(swept);
            }
            let placed = self.place(state, request)?;
            if placed.is_success() {
                state.commit();
            } else {
                state.rollback();
            }
            return Ok(placed);
        }

        self.place(state, request)
    }
}
