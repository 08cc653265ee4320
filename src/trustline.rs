//! Trustline views with the issuer abstraction folded in.
//!
//! An asset's issuer never has a materialised trustline in its own asset; its
//! position is fictional and infinite. `TrustLineView` collapses that edge
//! case: the issuer variant reports unbounded capacity and swallows mutations,
//! the line variant delegates to the backing entry through the accounting
//! rules. Callers write one code path and the issuer case disappears.
//!
//! `ConstTrustLineView` is the read-only flavour; it carries no mutating
//! methods at all.

use crate::accounting;
use crate::entry::{LedgerEntry, LedgerHeader, LedgerKey, TrustLineEntry};
use crate::ledger::LedgerState;
use crate::types::{AccountId, Asset};

#[derive(Debug, Clone)]
pub enum TrustLineView {
    /// The account IS the asset's issuer: infinite fictional position.
    Issuer { account_id: AccountId, asset: Asset },
    /// A real trustline entry, addressed by account and asset.
    Line { account_id: AccountId, asset: Asset },
}

impl TrustLineView {
    /// Resolve a view for `(account, asset)`. Returns `None` when the account
    /// is not the issuer and holds no trustline. Native assets have no
    /// trustlines; asking for one is a caller bug.
    pub fn load(state: &LedgerState, account_id: AccountId, asset: &Asset) -> Option<Self> {
        assert!(!asset.is_native(), "no trustline exists for the native asset");
        if asset.issuer() == Some(account_id) {
            return Some(TrustLineView::Issuer {
                account_id,
                asset: asset.clone(),
            });
        }
        let key = LedgerKey::trust_line(account_id, asset.clone());
        state.get(&key).map(|_| TrustLineView::Line {
            account_id,
            asset: asset.clone(),
        })
    }

    pub fn account_id(&self) -> AccountId {
        match self {
            TrustLineView::Issuer { account_id, .. } | TrustLineView::Line { account_id, .. } => {
                *account_id
            }
        }
    }

    pub fn asset(&self) -> &Asset {
        match self {
            TrustLineView::Issuer { asset, .. } | TrustLineView::Line { asset, .. } => asset,
        }
    }

    fn key(&self) -> LedgerKey {
        LedgerKey::trust_line(self.account_id(), self.asset().clone())
    }

    fn entry<'a>(&self, state: &'a LedgerState) -> &'a TrustLineEntry {
        state
            .get(&self.key())
            .and_then(LedgerEntry::as_trust_line)
            .expect("trustline view is stale")
    }

    pub fn balance(&self, state: &LedgerState) -> i64 {
        match self {
            TrustLineView::Issuer { .. } => i64::MAX,
            TrustLineView::Line { .. } => self.entry(state).balance,
        }
    }

    pub fn debt(&self, state: &LedgerState) -> i64 {
        match self {
            TrustLineView::Issuer { .. } => 0,
            TrustLineView::Line { .. } => self.entry(state).debt,
        }
    }

    pub fn limit(&self, state: &LedgerState) -> i64 {
        match self {
            TrustLineView::Issuer { .. } => i64::MAX,
            TrustLineView::Line { .. } => self.entry(state).limit,
        }
    }

    pub fn add_balance(&self, state: &mut LedgerState, delta: i64) -> bool {
        match self {
            TrustLineView::Issuer { .. } => true,
            TrustLineView::Line { .. } => {
                let header = *state.header();
                let entry = state.load_mut(&self.key()).expect("trustline view is stale");
                accounting::add_balance(&header, entry, delta)
            }
        }
    }

    pub fn add_debt(&self, state: &mut LedgerState, delta: i64) -> bool {
        match self {
            TrustLineView::Issuer { .. } => true,
            TrustLineView::Line { .. } => {
                let entry = state.load_mut(&self.key()).expect("trustline view is stale");
                accounting::add_debt(entry, delta)
            }
        }
    }

    pub fn buying_liabilities(&self, state: &LedgerState) -> i64 {
        match self {
            TrustLineView::Issuer { .. } => 0,
            TrustLineView::Line { .. } => self.entry(state).liabilities.unwrap_or_default().buying,
        }
    }

    pub fn selling_liabilities(&self, state: &LedgerState) -> i64 {
        match self {
            TrustLineView::Issuer { .. } => 0,
            TrustLineView::Line { .. } => self.entry(state).liabilities.unwrap_or_default().selling,
        }
    }

    pub fn add_buying_liabilities(&self, state: &mut LedgerState, delta: i64) -> bool {
        match self {
            TrustLineView::Issuer { .. } => true,
            TrustLineView::Line { .. } => {
                let header = *state.header();
                let entry = state.load_mut(&self.key()).expect("trustline view is stale");
                accounting::add_buying_liabilities(&header, entry, delta)
            }
        }
    }

    pub fn add_selling_liabilities(
        &self,
        state: &mut LedgerState,
        delta: i64,
        margin_trade: bool,
        max_liability: i64,
    ) -> bool {
        match self {
            TrustLineView::Issuer { .. } => true,
            TrustLineView::Line { .. } => {
                let header = *state.header();
                let entry = state.load_mut(&self.key()).expect("trustline view is stale");
                accounting::add_selling_liabilities(&header, entry, delta, margin_trade, max_liability)
            }
        }
    }

    pub fn is_authorized(&self, state: &LedgerState) -> bool {
        match self {
            TrustLineView::Issuer { .. } => true,
            TrustLineView::Line { .. } => self.entry(state).is_authorized(),
        }
    }

    pub fn is_liquidating(&self, state: &LedgerState) -> bool {
        match self {
            TrustLineView::Issuer { .. } => false,
            TrustLineView::Line { .. } => self.entry(state).is_liquidating(),
        }
    }

    pub fn is_base_asset(&self, state: &LedgerState) -> bool {
        match self {
            TrustLineView::Issuer { .. } => false,
            TrustLineView::Line { asset, .. } => accounting::is_base_asset(state, asset),
        }
    }

    pub fn available_balance(&self, state: &LedgerState) -> i64 {
        match self {
            TrustLineView::Issuer { .. } => i64::MAX,
            TrustLineView::Line { .. } => {
                let header = *state.header();
                let entry = state.get(&self.key()).expect("trustline view is stale");
                accounting::get_available_balance(&header, entry)
            }
        }
    }

    pub fn max_amount_receive(&self, state: &LedgerState) -> i64 {
        match self {
            TrustLineView::Issuer { .. } => i64::MAX,
            TrustLineView::Line { .. } => {
                let header = *state.header();
                let entry = state.get(&self.key()).expect("trustline view is stale");
                accounting::get_max_amount_receive(&header, entry)
            }
        }
    }
}

/// Read-only trustline view over a snapshot of the entry.
#[derive(Debug, Clone)]
pub enum ConstTrustLineView {
    Issuer,
    Line { entry: TrustLineEntry },
}

impl ConstTrustLineView {
    pub fn load(state: &LedgerState, account_id: AccountId, asset: &Asset) -> Option<Self> {
        assert!(!asset.is_native(), "no trustline exists for the native asset");
        if asset.issuer() == Some(account_id) {
            return Some(ConstTrustLineView::Issuer);
        }
        let key = LedgerKey::trust_line(account_id, asset.clone());
        state
            .get(&key)
            .and_then(LedgerEntry::as_trust_line)
            .map(|tl| ConstTrustLineView::Line { entry: tl.clone() })
    }

    pub fn balance(&self) -> i64 {
        match self {
            ConstTrustLineView::Issuer => i64::MAX,
            ConstTrustLineView::Line { entry } => entry.balance,
        }
    }

    pub fn debt(&self) -> i64 {
        match self {
            ConstTrustLineView::Issuer => 0,
            ConstTrustLineView::Line { entry } => entry.debt,
        }
    }

    pub fn limit(&self) -> i64 {
        match self {
            ConstTrustLineView::Issuer => i64::MAX,
            ConstTrustLineView::Line { entry } => entry.limit,
        }
    }

    pub fn is_authorized(&self) -> bool {
        match self {
            ConstTrustLineView::Issuer => true,
            ConstTrustLineView::Line { entry } => entry.is_authorized(),
        }
    }

    pub fn is_liquidating(&self) -> bool {
        match self {
            ConstTrustLineView::Issuer => false,
            ConstTrustLineView::Line { entry } => entry.is_liquidating(),
        }
    }

    pub fn available_balance(&self, header: &LedgerHeader) -> i64 {
        match self {
            ConstTrustLineView::Issuer => i64::MAX,
            ConstTrustLineView::Line { entry } => {
                let wrapped = LedgerEntry::new(crate::entry::LedgerEntryData::TrustLine(entry.clone()));
                accounting::get_available_balance(header, &wrapped)
            }
        }
    }

    pub fn max_amount_receive(&self, header: &LedgerHeader) -> i64 {
        match self {
            ConstTrustLineView::Issuer => i64::MAX,
            ConstTrustLineView::Line { entry } => {
                let wrapped = LedgerEntry::new(crate::entry::LedgerEntryData::TrustLine(entry.clone()));
                accounting::get_max_amount_receive(header, &wrapped)
            }
        }
    }
}
