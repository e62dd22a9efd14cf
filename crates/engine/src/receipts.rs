//! Results returned by the engine operations.

use serde::{Deserialize, Serialize};

use crate::{EntryType, LedgerEntry, MissionLog, Order, TransactionRecord};

/// Outcome of a money-moving operation.
///
/// `replayed` is set when the idempotency key matched an earlier request and
/// nothing was executed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction: TransactionRecord,
    pub entries: Vec<LedgerEntry>,
    pub replayed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub receipt: Receipt,
    pub order: Order,
}

/// Outcome of grading a mission log. Rejections carry no receipt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradeOutcome {
    pub log: MissionLog,
    pub receipt: Option<Receipt>,
    pub replayed: bool,
}

/// A transaction as seen from one wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub transaction: TransactionRecord,
    pub direction: EntryType,
}

/// Offset pagination for listings, newest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Page {
    pub const MAX_LIMIT: u64 = 100;

    /// One-based page number, as exposed over HTTP.
    #[must_use]
    pub fn number(page: u64, per_page: u64) -> Self {
        let limit = per_page.clamp(1, Self::MAX_LIMIT);
        Self {
            limit,
            offset: page.saturating_sub(1).saturating_mul(limit),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::number(1, 20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_are_one_based_and_clamped() {
        assert_eq!(Page::number(1, 20), Page { limit: 20, offset: 0 });
        assert_eq!(Page::number(3, 10), Page { limit: 10, offset: 20 });
        assert_eq!(Page::number(0, 0), Page { limit: 1, offset: 0 });
        assert_eq!(Page::number(2, 1_000).limit, Page::MAX_LIMIT);
    }
}
