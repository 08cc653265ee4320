//! Transactional ledger view.
//!
//! `LedgerState` is an in-memory committed store under a stack of save-point
//! frames. Each frame holds a write-set layered over everything below it:
//! reads walk the stack top-down, a rollback discards only the top frame, and
//! a commit folds the top frame into its parent (or into the committed base
//! when it is the last frame). No parent/child back-references exist; the
//! stack is the whole story.
//!
//! All scans iterate keys in `LedgerKey` order so that replicas applying the
//! same operations produce byte-for-byte identical state.

use crate::entry::{LedgerEntry, LedgerHeader, LedgerKey, TrustLineEntry};
use crate::types::{AccountId, Asset, OfferId};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("entry not found")]
    NotFound,
    #[error("trustline has live debt or liabilities")]
    TrustLineInUse,
}

#[derive(Debug, Default)]
struct Frame {
    /// `None` marks a deletion shadowing whatever lives below.
    writes: BTreeMap<LedgerKey, Option<LedgerEntry>>,
    /// Header copy, taken lazily on first header write inside this frame.
    header: Option<LedgerHeader>,
}

#[derive(Debug)]
pub struct LedgerState {
    base: BTreeMap<LedgerKey, LedgerEntry>,
    base_header: LedgerHeader,
    frames: Vec<Frame>,
}

impl LedgerState {
    pub fn new(header: LedgerHeader) -> Self {
        Self {
            base: BTreeMap::new(),
            base_header: header,
            frames: Vec::new(),
        }
    }

    /// Number of open save points.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Open a nested save point.
    pub fn begin(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Fold the top save point into its parent, atomically.
    pub fn commit(&mut self) {
        let frame = self.frames.pop().expect("commit without open transaction");
        if let Some(parent) = self.frames.last_mut() {
            for (key, write) in frame.writes {
                parent.writes.insert(key, write);
            }
            if let Some(header) = frame.header {
                parent.header = Some(header);
            }
        } else {
            for (key, write) in frame.writes {
                match write {
                    Some(entry) => {
                        self.base.insert(key, entry);
                    }
                    None => {
                        self.base.remove(&key);
                    }
                }
            }
            if let Some(header) = frame.header {
                self.base_header = header;
            }
        }
    }

    /// Discard the top save point and everything written inside it.
    pub fn rollback(&mut self) {
        self.frames
            .pop()
            .expect("rollback without open transaction");
    }

    pub fn header(&self) -> &LedgerHeader {
        for frame in self.frames.iter().rev() {
            if let Some(header) = &frame.header {
                return header;
            }
        }
        &self.base_header
    }

    pub fn header_mut(&mut self) -> &mut LedgerHeader {
        if self.frames.is_empty() {
            return &mut self.base_header;
        }
        let current = *self.header();
        let top = self.frames.last_mut().unwrap();
        top.header.get_or_insert(current)
    }

    /// Read-only load; does not join the write set.
    pub fn get(&self, key: &LedgerKey) -> Option<&LedgerEntry> {
        for frame in self.frames.iter().rev() {
            if let Some(write) = frame.writes.get(key) {
                return write.as_ref();
            }
        }
        self.base.get(key)
    }

    /// Read-write load. The entry is copied into the top frame on first
    /// touch; later loads in the same frame hand back the same copy.
    pub fn load_mut(&mut self, key: &LedgerKey) -> Option<&mut LedgerEntry> {
        if self.frames.is_empty() {
            return self.base.get_mut(key);
        }
        let top = self.frames.len() - 1;
        if !self.frames[top].writes.contains_key(key) {
            let below = self.lookup_below(top, key).cloned();
            match below {
                Some(entry) => {
                    self.frames[top].writes.insert(key.clone(), Some(entry));
                }
                None => return None,
            }
        }
        self.frames[top].writes.get_mut(key).unwrap().as_mut()
    }

    fn lookup_below(&self, frame_idx: usize, key: &LedgerKey) -> Option<&LedgerEntry> {
        for frame in self.frames[..frame_idx].iter().rev() {
            if let Some(write) = frame.writes.get(key) {
                return write.as_ref();
            }
        }
        self.base.get(key)
    }

    /// Insert a brand-new entry. Creating over a live key is a structural bug.
    pub fn create(&mut self, entry: LedgerEntry) {
        let key = entry.key();
        assert!(
            self.get(&key).is_none(),
            "create over existing entry {key:?}"
        );
        match self.frames.last_mut() {
            Some(top) => {
                top.writes.insert(key, Some(entry));
            }
            None => {
                self.base.insert(key, entry);
            }
        }
    }

    /// Delete an entry. Trustlines with live debt or liabilities refuse to go.
    pub fn erase(&mut self, key: &LedgerKey) -> Result<(), LedgerError> {
        let entry = self.get(key).ok_or(LedgerError::NotFound)?;
        if let Some(tl) = entry.as_trust_line() {
            let live_liab = tl
                .liabilities
                .map_or(false, |l| l.buying != 0 || l.selling != 0);
            if tl.debt != 0 || live_liab {
                return Err(LedgerError::TrustLineInUse);
            }
        }
        match self.frames.last_mut() {
            Some(top) => {
                top.writes.insert(key.clone(), None);
            }
            None => {
                self.base.remove(key);
            }
        }
        Ok(())
    }

    fn for_each_visible<'a, F: FnMut(&'a LedgerKey, &'a LedgerEntry)>(&'a self, mut f: F) {
        let mut keys: BTreeSet<&'a LedgerKey> = self.base.keys().collect();
        for frame in &self.frames {
            keys.extend(frame.writes.keys());
        }
        for key in keys {
            if let Some(entry) = self.get(key) {
                f(key, entry);
            }
        }
    }

    /// Lowest-priced offer selling `selling` for `buying`, skipping keys in
    /// `excludes`. Equal prices break on ascending offer id.
    pub fn best_offer(
        &self,
        selling: &Asset,
        buying: &Asset,
        excludes: &BTreeSet<LedgerKey>,
    ) -> Option<LedgerEntry> {
        let mut best: Option<&LedgerEntry> = None;
        self.for_each_visible(|key, entry| {
            let Some(offer) = entry.as_offer() else {
                return;
            };
            if &offer.selling != selling || &offer.buying != buying || excludes.contains(key) {
                return;
            }
            best = match best {
                None => Some(entry),
                Some(current) => {
                    let cur = current.as_offer().unwrap();
                    let better = offer
                        .price
                        .cmp_value(&cur.price)
                        .then(offer.offer_id.cmp(&cur.offer_id))
                        .is_lt();
                    if better {
                        Some(entry)
                    } else {
                        Some(current)
                    }
                }
            };
        });
        best.cloned()
    }

    /// Every open offer of `account` selling `selling`, keyed by offer id.
    pub fn offers_by_account_and_asset(
        &self,
        account: &AccountId,
        selling: &Asset,
    ) -> BTreeMap<OfferId, crate::entry::OfferEntry> {
        let mut offers = BTreeMap::new();
        self.for_each_visible(|_, entry| {
            if let Some(offer) = entry.as_offer() {
                if &offer.seller_id == account && &offer.selling == selling {
                    offers.insert(offer.offer_id, offer.clone());
                }
            }
        });
        offers
    }

    /// Every trustline in `asset` with a nonzero debt, ascending account id.
    pub fn debt_holders(&self, asset: &Asset) -> Vec<TrustLineEntry> {
        assert!(!asset.is_native(), "debt holder cannot be the native asset");
        let mut holders = Vec::new();
        self.for_each_visible(|_, entry| {
            if let Some(tl) = entry.as_trust_line() {
                if &tl.asset == asset && tl.debt != 0 {
                    holders.push(tl.clone());
                }
            }
        });
        holders
    }

    fn trust_line_pairs(
        &self,
        coin1: &Asset,
        coin2: &Asset,
    ) -> BTreeMap<AccountId, (TrustLineEntry, TrustLineEntry)> {
        let mut firsts: BTreeMap<AccountId, TrustLineEntry> = BTreeMap::new();
        let mut seconds: BTreeMap<AccountId, TrustLineEntry> = BTreeMap::new();
        self.for_each_visible(|_, entry| {
            if let Some(tl) = entry.as_trust_line() {
                if &tl.asset == coin1 {
                    firsts.insert(tl.account_id, tl.clone());
                } else if &tl.asset == coin2 {
                    seconds.insert(tl.account_id, tl.clone());
                }
            }
        });
        firsts
            .into_iter()
            .filter_map(|(account, tl1)| seconds.remove(&account).map(|tl2| (account, (tl1, tl2))))
            .collect()
    }

    /// Accounts whose combined position across the two coins has negative
    /// equity at the given prices, ascending account id.
    pub fn should_liquidate(
        &self,
        coin1: &Asset,
        price1: Decimal,
        coin2: &Asset,
        price2: Decimal,
    ) -> Vec<AccountId> {
        self.trust_line_pairs(coin1, coin2)
            .into_iter()
            .filter(|(_, (tl1, tl2))| pair_equity(tl1, price1, tl2, price2) < Decimal::ZERO)
            .map(|(account, _)| account)
            .collect()
    }

    /// Accounts currently flagged for liquidation on either leg. With
    /// `still_eligible` the equity is still under water; without it the
    /// position has recovered and the flags are due to be cleared.
    pub fn under_liquidation(
        &self,
        coin1: &Asset,
        price1: Decimal,
        coin2: &Asset,
        price2: Decimal,
        still_eligible: bool,
    ) -> Vec<AccountId> {
        self.trust_line_pairs(coin1, coin2)
            .into_iter()
            .filter(|(_, (tl1, tl2))| tl1.is_liquidating() || tl2.is_liquidating())
            .filter(|(_, (tl1, tl2))| {
                let under = pair_equity(tl1, price1, tl2, price2) < Decimal::ZERO;
                under == still_eligible
            })
            .map(|(account, _)| account)
            .collect()
    }
}

fn pair_equity(tl1: &TrustLineEntry, price1: Decimal, tl2: &TrustLineEntry, price2: Decimal) -> Decimal {
    (Decimal::from(tl1.balance) - Decimal::from(tl1.debt)) * price1
        + (Decimal::from(tl2.balance) - Decimal::from(tl2.debt)) * price2
}
