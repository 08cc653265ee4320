//! Margin Trading Ledger Core.
//!
//! Collateralised margin trading over a classic asset/trustline/offer ledger:
//! trustlines carry a signed debt field, a periodic funding operation shifts
//! collateral between longs and shorts based on the divergence between the
//! order book's mid price and an external reference price, and a liquidation
//! operation marks undercollateralised accounts and unwinds them through
//! forced offers. All computation is deterministic and integer-exact with no
//! external I/O dependencies; persistence, matching, and consensus live
//! behind narrow seams.

pub mod accounting;
pub mod config;
pub mod engine;
pub mod entry;
pub mod ledger;
pub mod pricing;
pub mod trustline;
pub mod types;

pub use config::*;
pub use engine::*;
pub use entry::*;
pub use ledger::*;
pub use pricing::*;
pub use trustline::*;
pub use types::*;
