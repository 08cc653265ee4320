// 4.0.2: result types and errors for engine operations. funding and liquidation
// report expected outcomes through codes; only structural breakage escalates.

use crate::entry::OfferEntry;
use crate::types::{AccountId, Asset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingResultCode {
    Success,
    /// The funding interval has not elapsed yet.
    NotTime,
    /// The oracle feed is missing or unparseable.
    NoReferencePrice,
    /// The order book could not produce a usable mid price.
    InvalidMidPrice,
    /// Conservation of debt was already broken before this tick.
    DebtNotZero,
}

/// One funding transfer: `amount` of `asset` credited (or debited, when
/// negative) to the account's collateral line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub account_id: AccountId,
    pub asset: Asset,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingResult {
    pub code: FundingResultCode,
    pub payouts: Vec<Payout>,
}

impl FundingResult {
    pub fn failure(code: FundingResultCode) -> Self {
        Self {
            code,
            payouts: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == FundingResultCode::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidationResultCode {
    Success,
    NotTime,
    NoReferencePrice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationResult {
    pub code: LiquidationResultCode,
}

impl LiquidationResult {
    pub fn is_success(&self) -> bool {
        self.code == LiquidationResultCode::Success
    }
}

/// Inner result codes of a manage-offer invocation. These are expected
/// outcomes; the host reports them instead of failing the whole close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferResultCode {
    Success,
    Malformed,
    SellNoTrust,
    BuyNoTrust,
    SellNotAuthorized,
    BuyNotAuthorized,
    /// Liability reservation would overrun the line's capacity.
    LineFull,
    /// The account cannot afford another sub-entry.
    LowReserve,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManageOfferOutcome {
    pub code: OfferResultCode,
    /// The offer now resting on the book, when one was created.
    pub offer: Option<OfferEntry>,
}

impl ManageOfferOutcome {
    pub fn failure(code: OfferResultCode) -> Self {
        Self { code, offer: None }
    }

    pub fn is_success(&self) -> bool {
        self.code == OfferResultCode::Success
    }
}

/// Failures outside the inner result codes. These mean the operation never
/// reached the matching engine properly and are fatal to the ledger close.
#[derive(Debug, thiserror::Error)]
pub enum OfferHostError {
    #[error("source account does not exist")]
    MissingAccount,
    #[error("matching engine rejected the operation: {0}")]
    Rejected(String),
}

/// Result of applying one wire operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Funding(FundingResult),
    Liquidation(LiquidationResult),
    Offer(ManageOfferOutcome),
}

/// Combined outcome of one ledger close.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseOutcome {
    pub funding: FundingResult,
    pub liquidation: LiquidationResult,
}
