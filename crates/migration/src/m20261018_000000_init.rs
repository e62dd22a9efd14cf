//! Initial schema migration - creates all tables from scratch.
//!
//! - `users`: identities with a role
//! - `wallets`: one point balance per user
//! - `wallet_ledger`: append-only balance changes
//! - `transactions`: money movements keyed by idempotency key
//! - `qr_codes`: signed single-use payment codes
//! - `missions` / `mission_logs`: graded tasks paying reward points
//! - `products` / `orders`: the marketplace

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Username,
    FullName,
    Role,
    CreatedAt,
}

#[derive(Iden)]
enum Wallets {
    Table,
    Id,
    UserId,
    Balance,
    LockedBalance,
    LifetimeEarned,
    LifetimeSpent,
    IsFrozen,
    FrozenReason,
    FrozenAt,
    FrozenBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum WalletLedger {
    Table,
    Id,
    WalletId,
    TransactionId,
    EntryType,
    Amount,
    BalanceBefore,
    BalanceAfter,
    Description,
    ReferenceType,
    ReferenceId,
    CreatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    Code,
    IdempotencyKey,
    InitiatedBy,
    TransactionType,
    Status,
    FromWalletId,
    ToWalletId,
    Amount,
    FeeAmount,
    NetAmount,
    Description,
    QrCodeId,
    OrderId,
    MissionLogId,
    ProcessedAt,
    CreatedAt,
}

#[derive(Iden)]
enum QrCodes {
    Table,
    Id,
    Code,
    QrType,
    CreatorId,
    Amount,
    Description,
    Signature,
    Status,
    IsSingleUse,
    MaxUses,
    CurrentUses,
    UsedBy,
    UsedAt,
    ProductId,
    TransactionId,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Missions {
    Table,
    Id,
    CreatorId,
    Title,
    Description,
    RewardPoints,
    MaxParticipants,
    CurrentParticipants,
    IsActive,
    IsRepeatable,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum MissionLogs {
    Table,
    Id,
    MissionId,
    UserId,
    Status,
    Score,
    Answers,
    RewardClaimed,
    RewardPoints,
    StartedAt,
    SubmittedAt,
    CompletedAt,
    GradedAt,
    GradedBy,
    Notes,
    GradeIdempotencyKey,
}

#[derive(Iden)]
enum Products {
    Table,
    Id,
    SellerId,
    Name,
    Description,
    Price,
    Stock,
    IsUnlimited,
    SoldCount,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Orders {
    Table,
    Id,
    Code,
    BuyerId,
    SellerId,
    ProductId,
    Quantity,
    UnitPrice,
    TotalPrice,
    Status,
    TransactionId,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::FullName).string().not_null())
                    .col(ColumnDef::new(Users::Role).string().not_null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Wallets
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Wallets::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Wallets::UserId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Wallets::Balance)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Wallets::Balance).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Wallets::LockedBalance)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Wallets::LockedBalance).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Wallets::LifetimeEarned)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::LifetimeSpent)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::IsFrozen)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Wallets::FrozenReason).string())
                    .col(ColumnDef::new(Wallets::FrozenAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Wallets::FrozenBy).string())
                    .col(
                        ColumnDef::new(Wallets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Wallets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-wallets-user_id")
                            .from(Wallets::Table, Wallets::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::Code).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::IdempotencyKey)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::InitiatedBy).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::TransactionType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Status).string().not_null())
                    .col(ColumnDef::new(Transactions::FromWalletId).string())
                    .col(ColumnDef::new(Transactions::ToWalletId).string())
                    .col(
                        ColumnDef::new(Transactions::Amount)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Transactions::Amount).gt(0)),
                    )
                    .col(
                        ColumnDef::new(Transactions::FeeAmount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Transactions::NetAmount).big_integer().not_null())
                    .col(ColumnDef::new(Transactions::Description).string())
                    .col(ColumnDef::new(Transactions::QrCodeId).string())
                    .col(ColumnDef::new(Transactions::OrderId).string())
                    .col(ColumnDef::new(Transactions::MissionLogId).string())
                    .col(ColumnDef::new(Transactions::ProcessedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-from_wallet_id")
                            .from(Transactions::Table, Transactions::FromWalletId)
                            .to(Wallets::Table, Wallets::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-to_wallet_id")
                            .from(Transactions::Table, Transactions::ToWalletId)
                            .to(Wallets::Table, Wallets::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-idempotency_key-unique")
                    .table(Transactions::Table)
                    .col(Transactions::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-code-unique")
                    .table(Transactions::Table)
                    .col(Transactions::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-from_wallet_id-created_at")
                    .table(Transactions::Table)
                    .col(Transactions::FromWalletId)
                    .col(Transactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-to_wallet_id-created_at")
                    .table(Transactions::Table)
                    .col(Transactions::ToWalletId)
                    .col(Transactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Wallet ledger
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(WalletLedger::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WalletLedger::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WalletLedger::WalletId).string().not_null())
                    .col(ColumnDef::new(WalletLedger::TransactionId).string())
                    .col(ColumnDef::new(WalletLedger::EntryType).string().not_null())
                    .col(
                        ColumnDef::new(WalletLedger::Amount)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(WalletLedger::Amount).gt(0)),
                    )
                    .col(
                        ColumnDef::new(WalletLedger::BalanceBefore)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WalletLedger::BalanceAfter)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(WalletLedger::BalanceAfter).gte(0)),
                    )
                    .col(ColumnDef::new(WalletLedger::Description).string())
                    .col(ColumnDef::new(WalletLedger::ReferenceType).string().not_null())
                    .col(ColumnDef::new(WalletLedger::ReferenceId).string().not_null())
                    .col(
                        ColumnDef::new(WalletLedger::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-wallet_ledger-wallet_id")
                            .from(WalletLedger::Table, WalletLedger::WalletId)
                            .to(Wallets::Table, Wallets::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-wallet_ledger-transaction_id")
                            .from(WalletLedger::Table, WalletLedger::TransactionId)
                            .to(Transactions::Table, Transactions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-wallet_ledger-wallet_id-created_at")
                    .table(WalletLedger::Table)
                    .col(WalletLedger::WalletId)
                    .col(WalletLedger::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-wallet_ledger-transaction_id")
                    .table(WalletLedger::Table)
                    .col(WalletLedger::TransactionId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. QR codes
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(QrCodes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(QrCodes::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(QrCodes::Code).string().not_null())
                    .col(ColumnDef::new(QrCodes::QrType).string().not_null())
                    .col(ColumnDef::new(QrCodes::CreatorId).string().not_null())
                    .col(
                        ColumnDef::new(QrCodes::Amount)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(QrCodes::Amount).gt(0)),
                    )
                    .col(ColumnDef::new(QrCodes::Description).string())
                    .col(ColumnDef::new(QrCodes::Signature).string().not_null())
                    .col(ColumnDef::new(QrCodes::Status).string().not_null())
                    .col(
                        ColumnDef::new(QrCodes::IsSingleUse)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(QrCodes::MaxUses)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(QrCodes::CurrentUses)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(QrCodes::UsedBy).string())
                    .col(ColumnDef::new(QrCodes::UsedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(QrCodes::ProductId).string())
                    .col(ColumnDef::new(QrCodes::TransactionId).string())
                    .col(
                        ColumnDef::new(QrCodes::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QrCodes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QrCodes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-qr_codes-creator_id")
                            .from(QrCodes::Table, QrCodes::CreatorId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-qr_codes-code-unique")
                    .table(QrCodes::Table)
                    .col(QrCodes::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Missions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Missions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Missions::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Missions::CreatorId).string().not_null())
                    .col(ColumnDef::new(Missions::Title).string().not_null())
                    .col(ColumnDef::new(Missions::Description).string())
                    .col(
                        ColumnDef::new(Missions::RewardPoints)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Missions::RewardPoints).gt(0)),
                    )
                    .col(ColumnDef::new(Missions::MaxParticipants).integer())
                    .col(
                        ColumnDef::new(Missions::CurrentParticipants)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Missions::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Missions::IsRepeatable)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Missions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Missions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-missions-creator_id")
                            .from(Missions::Table, Missions::CreatorId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MissionLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MissionLogs::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MissionLogs::MissionId).string().not_null())
                    .col(ColumnDef::new(MissionLogs::UserId).string().not_null())
                    .col(ColumnDef::new(MissionLogs::Status).string().not_null())
                    .col(ColumnDef::new(MissionLogs::Score).double())
                    .col(ColumnDef::new(MissionLogs::Answers).text())
                    .col(
                        ColumnDef::new(MissionLogs::RewardClaimed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(MissionLogs::RewardPoints).big_integer())
                    .col(
                        ColumnDef::new(MissionLogs::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MissionLogs::SubmittedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(MissionLogs::CompletedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(MissionLogs::GradedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(MissionLogs::GradedBy).string())
                    .col(ColumnDef::new(MissionLogs::Notes).string())
                    .col(ColumnDef::new(MissionLogs::GradeIdempotencyKey).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-mission_logs-mission_id")
                            .from(MissionLogs::Table, MissionLogs::MissionId)
                            .to(Missions::Table, Missions::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-mission_logs-user_id")
                            .from(MissionLogs::Table, MissionLogs::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-mission_logs-mission_id-user_id")
                    .table(MissionLogs::Table)
                    .col(MissionLogs::MissionId)
                    .col(MissionLogs::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-mission_logs-grade_idempotency_key-unique")
                    .table(MissionLogs::Table)
                    .col(MissionLogs::GradeIdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Marketplace
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Products::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Products::SellerId).string().not_null())
                    .col(ColumnDef::new(Products::Name).string().not_null())
                    .col(ColumnDef::new(Products::Description).string())
                    .col(
                        ColumnDef::new(Products::Price)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Products::Price).gt(0)),
                    )
                    .col(
                        ColumnDef::new(Products::Stock)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Products::Stock).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Products::IsUnlimited)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Products::SoldCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Products::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Products::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-products-seller_id")
                            .from(Products::Table, Products::SellerId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Orders::Code).string().not_null())
                    .col(ColumnDef::new(Orders::BuyerId).string().not_null())
                    .col(ColumnDef::new(Orders::SellerId).string().not_null())
                    .col(ColumnDef::new(Orders::ProductId).string().not_null())
                    .col(
                        ColumnDef::new(Orders::Quantity)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Orders::Quantity).gt(0)),
                    )
                    .col(ColumnDef::new(Orders::UnitPrice).big_integer().not_null())
                    .col(ColumnDef::new(Orders::TotalPrice).big_integer().not_null())
                    .col(ColumnDef::new(Orders::Status).string().not_null())
                    .col(ColumnDef::new(Orders::TransactionId).string())
                    .col(
                        ColumnDef::new(Orders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-orders-product_id")
                            .from(Orders::Table, Orders::ProductId)
                            .to(Products::Table, Products::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-orders-transaction_id")
                            .from(Orders::Table, Orders::TransactionId)
                            .to(Transactions::Table, Transactions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-orders-code-unique")
                    .table(Orders::Table)
                    .col(Orders::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-orders-transaction_id")
                    .table(Orders::Table)
                    .col(Orders::TransactionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MissionLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Missions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QrCodes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WalletLedger::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
