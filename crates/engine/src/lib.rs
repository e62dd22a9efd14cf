//! Wallet ledger and money-movement engine.
//!
//! The [`Engine`] is the only writer of point balances. Every money-moving
//! operation runs inside one database transaction that locks the wallets it
//! touches, writes a [`TransactionRecord`] keyed by the caller's idempotency
//! key, applies the balance deltas and appends one [`LedgerEntry`] per delta.

pub use commands::{
    AdjustBalanceCmd, CreateMissionCmd, CreateProductCmd, CreateQrCmd, GradeMissionCmd,
    PurchaseCmd, QrPaymentCmd, RegisterUserCmd, TransferCmd,
};
pub use config::{EngineConfig, FrozenCredit, FrozenCreditPolicy, Isolation};
pub use error::{EngineError, ErrorKind};
pub use ledger::{EntryType, LedgerEntry, ReferenceType};
pub use mission_logs::{MissionLog, MissionLogStatus};
pub use missions::Mission;
pub use ops::{Engine, EngineBuilder};
pub use orders::{Order, OrderStatus};
pub use products::Product;
pub use qr_codes::{QrCode, QrStatus, QrType};
pub use receipts::{GradeOutcome, Page, PurchaseReceipt, Receipt, WalletTransaction};
pub use transactions::{TransactionRecord, TransactionStatus, TransactionType};
pub use users::{Role, User};
pub use wallets::{BalanceChange, Wallet};

mod commands;
mod config;
mod error;
mod ledger;
mod mission_logs;
mod missions;
mod ops;
mod orders;
mod products;
mod qr_codes;
mod receipts;
pub mod signature;
mod transactions;
mod users;
mod util;
mod wallets;

type ResultEngine<T> = Result<T, EngineError>;
