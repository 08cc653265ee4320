//! The periodic operations over the ledger.
//!
//! The engine ties the pricing probe, the trustline accounting, and the
//! forced-offer boundary together into the two operations a closed ledger
//! triggers: funding and liquidation. Everything is deterministic given the
//! committed input state; there is no I/O anywhere below this module.

mod core;
mod funding;
mod liquidations;
mod offers;
mod results;

pub use self::core::Engine;
pub use offers::{
    apply_liquidation_offer, apply_margin_offer, ManageOfferRequest, OfferHost, Operation,
    OperationBody, RestingBook,
};
pub use results::{
    CloseOutcome, FundingResult, FundingResultCode, LiquidationResult, LiquidationResultCode,
    ManageOfferOutcome, OfferHostError, OfferResultCode, OperationOutcome, Payout,
};
