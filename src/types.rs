// 1.0: all the primitives live here. nothing in the ledger works without these types.
// account ids, assets, rational prices, flag bits, protocol constants. each id is a
// newtype so the compiler catches type mixups.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// 32-byte public key identifying an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub fn new(key: [u8; 32]) -> Self {
        Self(key)
    }

    /// Test-friendly constructor: a key with a single distinguishing byte.
    pub fn from_byte(b: u8) -> Self {
        let mut key = [0u8; 32];
        key[0] = b;
        Self(key)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // first four bytes are enough to tell accounts apart in logs
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OfferId(pub u64);

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.1: assets. either the native asset or a (code, issuer) credit. equality is
// code + issuer; the 4/12 split mirrors the wire format's fixed-size codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Asset {
    Native,
    CreditAlphaNum4 { code: [u8; 4], issuer: AccountId },
    CreditAlphaNum12 { code: [u8; 12], issuer: AccountId },
}

impl Asset {
    /// Build a 4-character credit asset, NUL-padding short codes.
    pub fn alphanum4(code: &str, issuer: AccountId) -> Self {
        assert!(
            !code.is_empty() && code.len() <= 4,
            "asset code must be 1-4 characters"
        );
        let mut buf = [0u8; 4];
        buf[..code.len()].copy_from_slice(code.as_bytes());
        Asset::CreditAlphaNum4 { code: buf, issuer }
    }

    /// Build a 12-character credit asset, NUL-padding short codes.
    pub fn alphanum12(code: &str, issuer: AccountId) -> Self {
        assert!(
            code.len() > 4 && code.len() <= 12,
            "asset code must be 5-12 characters"
        );
        let mut buf = [0u8; 12];
        buf[..code.len()].copy_from_slice(code.as_bytes());
        Asset::CreditAlphaNum12 { code: buf, issuer }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }

    pub fn issuer(&self) -> Option<AccountId> {
        match self {
            Asset::Native => None,
            Asset::CreditAlphaNum4 { issuer, .. } => Some(*issuer),
            Asset::CreditAlphaNum12 { issuer, .. } => Some(*issuer),
        }
    }

    pub fn code(&self) -> &[u8] {
        match self {
            Asset::Native => &[],
            Asset::CreditAlphaNum4 { code, .. } => code,
            Asset::CreditAlphaNum12 { code, .. } => code,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            _ => {
                let code = self.code();
                let end = code.iter().position(|&b| b == 0).unwrap_or(code.len());
                write!(f, "{}", String::from_utf8_lossy(&code[..end]))
            }
        }
    }
}

// 1.2: exact rational price n/d. comparisons cross-multiply in i64 so 1/3-style
// prices never lose precision. field equality is deliberate: 1/2 and 2/4 are
// distinct prices on the wire and in offer reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    pub n: i32,
    pub d: i32,
}

impl Price {
    pub fn new(n: i32, d: i32) -> Self {
        Self { n, d }
    }

    pub fn is_valid(&self) -> bool {
        self.n > 0 && self.d > 0
    }

    /// Order by value: n1/d1 against n2/d2 without dividing.
    pub fn cmp_value(&self, other: &Price) -> Ordering {
        (self.n as i64 * other.d as i64).cmp(&(other.n as i64 * self.d as i64))
    }

    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.n) / Decimal::from(self.d)
    }

    /// The same price with numerator and denominator swapped.
    pub fn inverted(&self) -> Price {
        Price {
            n: self.d,
            d: self.n,
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.n, self.d)
    }
}

/// Buying/selling capacity reserved by open offers. Both sides always travel
/// together; an entry either has both or has neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liabilities {
    pub buying: i64,
    pub selling: i64,
}

// 1.3: trustline flag bits.
pub const TRUSTLINE_AUTHORIZED_FLAG: u32 = 0x1;
pub const TRUSTLINE_LIQUIDATION_FLAG: u32 = 0x2;

// 1.4: account flag bits.
pub const ACCOUNT_AUTH_REQUIRED_FLAG: u32 = 0x1;
pub const ACCOUNT_AUTH_IMMUTABLE_FLAG: u32 = 0x4;
pub const ACCOUNT_BASE_ASSET_ISSUER_FLAG: u32 = 0x8;

// 1.5: protocol constants.
/// Funding runs at most once per hour.
pub const FUNDING_INTERVAL: u64 = 60 * 60;
/// Default liquidation cadence; configurable on the engine.
pub const LIQUIDATION_INTERVAL: u64 = 60 * 5;
/// Sub-unit scale: one external unit is 10^7 ledger units.
pub const BASE_CONVERSION: i64 = 10_000_000;
/// Order-book depth consumed by the mid-price probe, in ledger units.
pub const DEPTH_THRESHOLD: i64 = 100 * BASE_CONVERSION;
/// Funding transfers only fire when |mid - ref| >= ref * DIFF_THRESHOLD.
pub const DIFF_THRESHOLD: Decimal = dec!(0.005);
/// Per-tick funding exposure is clamped to this fraction of collateral.
pub const MAX_DIFF_THRESHOLD: Decimal = dec!(0.1);
/// Forced-offer prices are expressed as rationals over this denominator.
pub const PRICE_MULTIPLE: i64 = 10_000;
/// Margin selling liabilities are booked at 1/MAX_LEVERAGE of the offer size.
pub const MAX_LEVERAGE: i64 = 10;
