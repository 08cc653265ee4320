//! Ledger entry model.
//!
//! Four entry kinds live in the ledger: accounts, trustlines, offers, and
//! data entries. A trustline is an account's credit relationship with one
//! asset, extended here with a signed `debt` field for margin positions.
//! `LedgerKey` is the lookup key mirroring the four kinds; its derived
//! ordering is what makes every scan over the ledger deterministic.

use crate::types::{
    AccountId, Asset, Liabilities, OfferId, Price, ACCOUNT_AUTH_IMMUTABLE_FLAG,
    ACCOUNT_AUTH_REQUIRED_FLAG, ACCOUNT_BASE_ASSET_ISSUER_FLAG, TRUSTLINE_AUTHORIZED_FLAG,
    TRUSTLINE_LIQUIDATION_FLAG,
};
use serde::{Deserialize, Serialize};

/// Scalar ledger-wide state, advanced once per closed ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeader {
    pub ledger_seq: u32,
    pub ledger_version: u32,
    pub base_reserve: u32,
    /// Consensus close time of the current ledger, in epoch seconds.
    pub close_time: u64,
    /// Monotonic pool for offer ids.
    pub id_pool: u64,
    pub inflation_seq: u32,
    /// Close time of the last applied funding operation.
    pub last_funding: u64,
    /// Close time of the last applied liquidation operation.
    pub last_liquidation: u64,
}

impl LedgerHeader {
    /// Draw the next id from the pool.
    pub fn generate_id(&mut self) -> u64 {
        self.id_pool += 1;
        self.id_pool
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub account_id: AccountId,
    pub balance: i64,
    pub num_sub_entries: u32,
    pub flags: u32,
    pub liabilities: Option<Liabilities>,
}

impl AccountEntry {
    pub fn new(account_id: AccountId, balance: i64) -> Self {
        Self {
            account_id,
            balance,
            num_sub_entries: 0,
            flags: 0,
            liabilities: None,
        }
    }

    pub fn is_auth_required(&self) -> bool {
        self.flags & ACCOUNT_AUTH_REQUIRED_FLAG != 0
    }

    pub fn is_auth_immutable(&self) -> bool {
        self.flags & ACCOUNT_AUTH_IMMUTABLE_FLAG != 0
    }

    pub fn is_base_asset_issuer(&self) -> bool {
        self.flags & ACCOUNT_BASE_ASSET_ISSUER_FLAG != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLineEntry {
    pub account_id: AccountId,
    pub asset: Asset,
    /// Hard cap on balance and on |debt|. Always positive.
    pub limit: i64,
    pub balance: i64,
    /// Signed margin position: positive = borrowed (short), negative =
    /// owed-to-holder, zero = flat.
    pub debt: i64,
    pub flags: u32,
    pub liabilities: Option<Liabilities>,
}

impl TrustLineEntry {
    pub fn new(account_id: AccountId, asset: Asset, limit: i64) -> Self {
        Self {
            account_id,
            asset,
            limit,
            balance: 0,
            debt: 0,
            flags: TRUSTLINE_AUTHORIZED_FLAG,
            liabilities: None,
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.flags & TRUSTLINE_AUTHORIZED_FLAG != 0
    }

    pub fn is_liquidating(&self) -> bool {
        self.flags & TRUSTLINE_LIQUIDATION_FLAG != 0
    }

    pub fn set_authorized(&mut self, authorized: bool) {
        if authorized {
            self.flags |= TRUSTLINE_AUTHORIZED_FLAG;
        } else {
            self.flags &= !TRUSTLINE_AUTHORIZED_FLAG;
        }
    }

    pub fn set_liquidation(&mut self, liquidating: bool) {
        if liquidating {
            self.flags |= TRUSTLINE_LIQUIDATION_FLAG;
        } else {
            self.flags &= !TRUSTLINE_LIQUIDATION_FLAG;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEntry {
    pub seller_id: AccountId,
    pub offer_id: OfferId,
    pub selling: Asset,
    pub buying: Asset,
    /// Amount of `selling` still on offer.
    pub amount: i64,
    /// Units of `buying` per unit of `selling`.
    pub price: Price,
    pub flags: u32,
}

/// Arbitrary named payload attached to an account. Reference-price feeds are
/// data entries whose value is a base64-encoded decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    pub account_id: AccountId,
    pub data_name: String,
    pub data_value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEntryData {
    Account(AccountEntry),
    TrustLine(TrustLineEntry),
    Offer(OfferEntry),
    Data(DataEntry),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub last_modified_ledger_seq: u32,
    pub data: LedgerEntryData,
}

impl LedgerEntry {
    pub fn new(data: LedgerEntryData) -> Self {
        Self {
            last_modified_ledger_seq: 0,
            data,
        }
    }

    pub fn key(&self) -> LedgerKey {
        match &self.data {
            LedgerEntryData::Account(a) => LedgerKey::Account {
                account_id: a.account_id,
            },
            LedgerEntryData::TrustLine(t) => LedgerKey::TrustLine {
                account_id: t.account_id,
                asset: t.asset.clone(),
            },
            LedgerEntryData::Offer(o) => LedgerKey::Offer {
                seller_id: o.seller_id,
                offer_id: o.offer_id,
            },
            LedgerEntryData::Data(d) => LedgerKey::Data {
                account_id: d.account_id,
                data_name: d.data_name.clone(),
            },
        }
    }

    pub fn as_account(&self) -> Option<&AccountEntry> {
        match &self.data {
            LedgerEntryData::Account(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_trust_line(&self) -> Option<&TrustLineEntry> {
        match &self.data {
            LedgerEntryData::TrustLine(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_offer(&self) -> Option<&OfferEntry> {
        match &self.data {
            LedgerEntryData::Offer(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataEntry> {
        match &self.data {
            LedgerEntryData::Data(d) => Some(d),
            _ => None,
        }
    }
}

/// Lookup key for a ledger entry. The derived `Ord` (account id first within
/// each kind) fixes the iteration order of every ledger scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LedgerKey {
    Account {
        account_id: AccountId,
    },
    TrustLine {
        account_id: AccountId,
        asset: Asset,
    },
    Offer {
        seller_id: AccountId,
        offer_id: OfferId,
    },
    Data {
        account_id: AccountId,
        data_name: String,
    },
}

impl LedgerKey {
    pub fn trust_line(account_id: AccountId, asset: Asset) -> Self {
        LedgerKey::TrustLine { account_id, asset }
    }

    pub fn offer(seller_id: AccountId, offer_id: OfferId) -> Self {
        LedgerKey::Offer {
            seller_id,
            offer_id,
        }
    }
}
