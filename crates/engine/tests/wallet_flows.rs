use std::{future::Future, sync::Arc};

use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use tempfile::TempDir;

use engine::{
    AdjustBalanceCmd, CreateMissionCmd, CreateProductCmd, CreateQrCmd, Engine, EngineConfig,
    EntryType, ErrorKind, FrozenCredit, FrozenCreditPolicy, GradeMissionCmd, MissionLogStatus,
    Page, PurchaseCmd, QrPaymentCmd, QrStatus, ReferenceType, RegisterUserCmd, Role,
    TransactionStatus, TransactionType, TransferCmd,
};
use migration::MigratorTrait;
use uuid::Uuid;

const SECRET: &str = "test-secret";

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    engine_with_config(EngineConfig::new(SECRET)).await
}

async fn engine_with_config(config: EngineConfig) -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .config(config)
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn user(engine: &Engine, username: &str, role: Role) -> Uuid {
    let (user, _wallet) = engine
        .register_user(RegisterUserCmd::new(username, username, role))
        .await
        .unwrap();
    user.id
}

/// Register `name` with `role`, funded by `admin` with `balance`.
async fn member(engine: &Engine, admin: Uuid, name: &str, role: Role, balance: i64) -> Uuid {
    let id = user(engine, name, role).await;
    if balance > 0 {
        engine
            .adjust_balance(AdjustBalanceCmd::new(
                admin,
                id,
                balance,
                "seed",
                format!("seed-{name}"),
            ))
            .await
            .unwrap();
    }
    id
}

/// An admin plus `names.len()` students, each student funded with `balance`.
async fn funded(engine: &Engine, names: &[&str], balance: i64) -> (Uuid, Vec<Uuid>) {
    let admin = user(engine, "root", Role::Admin).await;
    let mut ids = Vec::new();
    for name in names {
        ids.push(member(engine, admin, name, Role::Student, balance).await);
    }
    (admin, ids)
}

/// Engine over a SQLite file, so concurrent requests go through separate
/// units of work. The directory must outlive the engine.
async fn engine_on_file() -> (Arc<Engine>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("wallet.db").display());
    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db)
        .config(EngineConfig::new(SECRET))
        .build()
        .await
        .unwrap();
    (Arc::new(engine), dir)
}

/// Run `request` twice at once and return both outcomes.
async fn twice<T, F, Fut>(engine: &Arc<Engine>, request: F) -> (T, T)
where
    T: Send + 'static,
    F: Fn(Arc<Engine>) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let first = tokio::spawn(request(engine.clone()));
    let second = tokio::spawn(request(engine.clone()));
    (first.await.unwrap(), second.await.unwrap())
}

async fn balance(engine: &Engine, user_id: Uuid) -> i64 {
    engine.wallet(user_id).await.unwrap().balance
}

async fn count(db: &DatabaseConnection, sql: &str) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(backend, sql.to_string()))
        .await
        .unwrap()
        .unwrap();
    row.try_get_by_index::<i64>(0).unwrap()
}

async fn expire_now(db: &DatabaseConnection, code: &str) {
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE qr_codes SET expires_at = ? WHERE code = ?",
        vec![(Utc::now() - Duration::minutes(1)).into(), code.into()],
    ))
    .await
    .unwrap();
}

#[tokio::test]
async fn register_user_creates_an_empty_wallet() {
    let (engine, _db) = engine_with_db().await;

    let (user, wallet) = engine
        .register_user(RegisterUserCmd::new("  Alice ", "Alice Doe", Role::Student))
        .await
        .unwrap();

    assert_eq!(user.username, "alice");
    assert_eq!(wallet.user_id, user.id);
    assert_eq!(wallet.balance, 0);
    assert!(!wallet.is_frozen);
    assert_eq!(engine.user_by_username("ALICE").await.unwrap().id, user.id);

    let err = engine
        .register_user(RegisterUserCmd::new("alice", "Other", Role::Student))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn transfer_moves_points_and_replays_by_key() {
    let (engine, db) = engine_with_db().await;
    let (_admin, ids) = funded(&engine, &["alice", "bob"], 0).await;
    let (alice, bob) = (ids[0], ids[1]);
    let admin = engine.user_by_username("root").await.unwrap().id;
    engine
        .adjust_balance(AdjustBalanceCmd::new(admin, alice, 100, "seed", "seed-a"))
        .await
        .unwrap();

    let receipt = engine
        .transfer(TransferCmd::new(alice, bob, 30, "k1").description("lunch"))
        .await
        .unwrap();
    assert!(!receipt.replayed);
    assert_eq!(receipt.transaction.status, TransactionStatus::Completed);
    assert_eq!(receipt.transaction.transaction_type, TransactionType::Transfer);
    assert!(receipt.transaction.code.starts_with("TRX-"));
    assert_eq!(receipt.entries.len(), 2);
    assert_eq!(receipt.entries[0].entry_type, EntryType::Debit);
    assert_eq!(receipt.entries[0].balance_before, 100);
    assert_eq!(receipt.entries[0].balance_after, 70);
    assert_eq!(receipt.entries[1].entry_type, EntryType::Credit);
    assert_eq!(receipt.entries[1].balance_after, 30);
    assert_eq!(balance(&engine, alice).await, 70);
    assert_eq!(balance(&engine, bob).await, 30);

    let again = engine
        .transfer(TransferCmd::new(alice, bob, 30, "k1"))
        .await
        .unwrap();
    assert!(again.replayed);
    assert_eq!(again.transaction.id, receipt.transaction.id);
    assert_eq!(again.entries.len(), 2);
    assert_eq!(balance(&engine, alice).await, 70);
    assert_eq!(balance(&engine, bob).await, 30);
    assert_eq!(
        count(&db, "SELECT COUNT(*) FROM transactions WHERE idempotency_key = 'k1'").await,
        1
    );
}

#[tokio::test]
async fn transfer_over_balance_leaves_no_trace() {
    let (engine, db) = engine_with_db().await;
    let (_admin, ids) = funded(&engine, &["alice", "bob"], 10).await;

    let err = engine
        .transfer(TransferCmd::new(ids[0], ids[1], 50, "k2"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    assert!(!err.is_retryable());
    assert_eq!(balance(&engine, ids[0]).await, 10);
    assert_eq!(balance(&engine, ids[1]).await, 10);
    assert_eq!(
        count(&db, "SELECT COUNT(*) FROM transactions WHERE idempotency_key = 'k2'").await,
        0
    );

    // The key was never consumed, so a valid retry goes through.
    let receipt = engine
        .transfer(TransferCmd::new(ids[0], ids[1], 5, "k2"))
        .await
        .unwrap();
    assert!(!receipt.replayed);
    assert_eq!(balance(&engine, ids[0]).await, 5);
}

#[tokio::test]
async fn transfer_rejects_bad_input() {
    let (engine, _db) = engine_with_db().await;
    let (_admin, ids) = funded(&engine, &["alice", "bob"], 10).await;

    let err = engine
        .transfer(TransferCmd::new(ids[0], ids[0], 5, "self"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SelfTargeting);

    let err = engine
        .transfer(TransferCmd::new(ids[0], ids[1], 0, "zero"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = engine
        .transfer(TransferCmd::new(ids[0], ids[1], 5, "   "))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = engine
        .transfer(TransferCmd::new(ids[0], Uuid::new_v4(), 5, "ghost"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(balance(&engine, ids[0]).await, 10);
}

#[tokio::test]
async fn reused_key_from_another_caller_is_a_duplicate() {
    let (engine, _db) = engine_with_db().await;
    let (admin, ids) = funded(&engine, &["alice", "bob", "carol"], 50).await;
    let shop = member(&engine, admin, "shop", Role::Lecturer, 0).await;

    engine
        .transfer(TransferCmd::new(ids[0], ids[1], 5, "shared"))
        .await
        .unwrap();

    let err = engine
        .transfer(TransferCmd::new(ids[2], ids[1], 5, "shared"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateRequest);

    let qr = engine.create_qr(CreateQrCmd::new(shop, 5)).await.unwrap();
    let err = engine
        .pay_qr(QrPaymentCmd::new(ids[0], qr.code, "shared"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateRequest);
    assert_eq!(balance(&engine, ids[2]).await, 50);
}

#[tokio::test]
async fn transfers_conserve_points_and_never_go_negative() {
    let (engine, db) = engine_with_db().await;
    let (_admin, ids) = funded(&engine, &["a", "b", "c"], 40).await;

    let moves = [(0, 1, 25), (1, 2, 60), (2, 0, 100), (2, 0, 15), (0, 2, 55)];
    for (n, (from, to, amount)) in moves.into_iter().enumerate() {
        let _ = engine
            .transfer(TransferCmd::new(ids[from], ids[to], amount, format!("m{n}")))
            .await;
    }

    let mut total = 0;
    for id in &ids {
        let wallet = engine.wallet(*id).await.unwrap();
        assert!(wallet.balance >= 0);
        total += wallet.balance;
    }
    assert_eq!(total, 120);

    // Every ledger entry chains on its wallet's previous balance.
    assert_eq!(
        count(
            &db,
            "SELECT COUNT(*) FROM wallet_ledger WHERE \
             (entry_type = 'CREDIT' AND balance_after != balance_before + amount) OR \
             (entry_type = 'DEBIT' AND balance_after != balance_before - amount)"
        )
        .await,
        0
    );
    let ledger = engine.ledger(ids[0], Page::default()).await.unwrap();
    let replayed: i64 = ledger.iter().map(|entry| entry.signed_amount()).sum();
    assert_eq!(replayed, balance(&engine, ids[0]).await);
}

#[tokio::test]
async fn qr_code_pays_once() {
    let (engine, _db) = engine_with_db().await;
    let (admin, ids) = funded(&engine, &["u1", "u3"], 100).await;
    let (u1, u3) = (ids[0], ids[1]);
    let u2 = member(&engine, admin, "u2", Role::Lecturer, 100).await;

    let qr = engine
        .create_qr(CreateQrCmd::new(u2, 25).description("coffee"))
        .await
        .unwrap();
    assert_eq!(qr.status, QrStatus::Active);
    assert!(qr.expires_at > Utc::now());

    let receipt = engine
        .pay_qr(QrPaymentCmd::new(u1, qr.code.clone(), "pay-1"))
        .await
        .unwrap();
    assert_eq!(receipt.transaction.transaction_type, TransactionType::QrPayment);
    assert_eq!(receipt.transaction.qr_code_id, Some(qr.id));
    assert_eq!(balance(&engine, u1).await, 75);
    assert_eq!(balance(&engine, u2).await, 125);

    let used = engine.qr(&qr.code, u2).await.unwrap();
    assert_eq!(used.status, QrStatus::Used);
    assert_eq!(used.used_by, Some(u1));
    assert_eq!(used.current_uses, 1);
    assert_eq!(used.transaction_id, Some(receipt.transaction.id));

    let err = engine
        .pay_qr(QrPaymentCmd::new(u3, qr.code.clone(), "pay-2"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(balance(&engine, u3).await, 100);
    assert_eq!(balance(&engine, u2).await, 125);

    let replay = engine
        .pay_qr(QrPaymentCmd::new(u1, qr.code, "pay-1"))
        .await
        .unwrap();
    assert!(replay.replayed);
    assert_eq!(balance(&engine, u1).await, 75);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_payers_settle_on_one_winner() {
    let (engine, _dir) = engine_on_file().await;
    let (admin, ids) = funded(&engine, &["p1", "p2"], 100).await;
    let (p1, p2) = (ids[0], ids[1]);
    let payee = member(&engine, admin, "payee", Role::Lecturer, 100).await;

    let qr = engine.create_qr(CreateQrCmd::new(payee, 40)).await.unwrap();
    let first = tokio::spawn({
        let engine = engine.clone();
        let code = qr.code.clone();
        async move { engine.pay_qr(QrPaymentCmd::new(p1, code, "race-1")).await }
    });
    let second = tokio::spawn({
        let engine = engine.clone();
        let code = qr.code.clone();
        async move { engine.pay_qr(QrPaymentCmd::new(p2, code, "race-2")).await }
    });
    let (first, second) = (first.await.unwrap(), second.await.unwrap());

    assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
    let loser = first.err().or(second.err()).unwrap();
    assert_eq!(loser.kind(), ErrorKind::InvalidState);
    assert_eq!(balance(&engine, payee).await, 140);
    assert_eq!(
        balance(&engine, p1).await + balance(&engine, p2).await,
        160
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_retries_of_a_transfer_share_one_outcome() {
    let (engine, _dir) = engine_on_file().await;
    let (_admin, ids) = funded(&engine, &["alice", "bob"], 100).await;
    let (alice, bob) = (ids[0], ids[1]);

    for round in 0..10 {
        let key = format!("retry-{round}");
        let (first, second) = twice(&engine, |engine| {
            let key = key.clone();
            async move { engine.transfer(TransferCmd::new(alice, bob, 5, key)).await }
        })
        .await;
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(first.transaction.id, second.transaction.id);
        assert_eq!(first.replayed as u8 + second.replayed as u8, 1);
    }
    assert_eq!(balance(&engine, alice).await, 50);
    assert_eq!(balance(&engine, bob).await, 150);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_retries_of_a_qr_payment_share_one_outcome() {
    let (engine, _dir) = engine_on_file().await;
    let (admin, ids) = funded(&engine, &["payer"], 100).await;
    let payer = ids[0];
    let payee = member(&engine, admin, "payee", Role::Lecturer, 0).await;

    for round in 0..10 {
        let qr = engine.create_qr(CreateQrCmd::new(payee, 5)).await.unwrap();
        let key = format!("retry-{round}");
        let (first, second) = twice(&engine, |engine| {
            let (code, key) = (qr.code.clone(), key.clone());
            async move { engine.pay_qr(QrPaymentCmd::new(payer, code, key)).await }
        })
        .await;
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(first.transaction.id, second.transaction.id);
        assert_eq!(first.replayed as u8 + second.replayed as u8, 1);
    }
    assert_eq!(balance(&engine, payer).await, 50);
    assert_eq!(balance(&engine, payee).await, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_retries_of_a_purchase_share_one_outcome() {
    let (engine, _dir) = engine_on_file().await;
    let (admin, ids) = funded(&engine, &["buyer"], 100).await;
    let buyer = ids[0];
    let seller = member(&engine, admin, "seller", Role::Lecturer, 0).await;

    for round in 0..5 {
        let product = engine
            .create_product(CreateProductCmd::new(seller, format!("Last pin {round}"), 10).stock(1))
            .await
            .unwrap();
        let product_id = product.id;
        let key = format!("retry-{round}");
        let (first, second) = twice(&engine, |engine| {
            let key = key.clone();
            async move { engine.purchase(PurchaseCmd::new(buyer, product_id, 1, key)).await }
        })
        .await;
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(first.order.id, second.order.id);
        assert_eq!(
            first.receipt.replayed as u8 + second.receipt.replayed as u8,
            1
        );
        assert_eq!(engine.product(product.id).await.unwrap().stock, 0);
    }
    assert_eq!(balance(&engine, buyer).await, 50);
    assert_eq!(balance(&engine, seller).await, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_retries_of_a_grading_share_one_outcome() {
    let (engine, _dir) = engine_on_file().await;
    let lecturer = user(&engine, "prof", Role::Lecturer).await;
    let student = user(&engine, "stud", Role::Student).await;
    let mission = engine
        .create_mission(CreateMissionCmd::new(lecturer, "Daily", 10).repeatable())
        .await
        .unwrap();

    for round in 0..5 {
        let log = engine.start_mission(mission.id, student).await.unwrap();
        engine.submit_mission(log.id, student, None).await.unwrap();
        let log_id = log.id;
        let key = format!("grade-{round}");
        let (first, second) = twice(&engine, |engine| {
            let key = key.clone();
            async move {
                engine
                    .grade_mission(GradeMissionCmd::new(lecturer, log_id, true, key))
                    .await
            }
        })
        .await;
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(first.replayed as u8 + second.replayed as u8, 1);
        assert_eq!(
            first.receipt.unwrap().transaction.id,
            second.receipt.unwrap().transaction.id
        );
    }
    assert_eq!(balance(&engine, student).await, 50);
}

#[tokio::test]
async fn qr_payment_checks_signature_expiry_and_payer() {
    let (engine, db) = engine_with_db().await;
    let (admin, ids) = funded(&engine, &["payer"], 100).await;
    let payer = ids[0];
    let payee = member(&engine, admin, "payee", Role::Lecturer, 100).await;

    let qr = engine.create_qr(CreateQrCmd::new(payee, 10)).await.unwrap();
    let err = engine
        .pay_qr(QrPaymentCmd::new(payee, qr.code.clone(), "own"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SelfTargeting);

    let tampered = engine.create_qr(CreateQrCmd::new(payee, 10)).await.unwrap();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE qr_codes SET amount = ? WHERE code = ?",
        vec![1i64.into(), tampered.code.clone().into()],
    ))
    .await
    .unwrap();
    let err = engine
        .pay_qr(QrPaymentCmd::new(payer, tampered.code, "tampered"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureInvalid);

    let err = engine
        .pay_qr(QrPaymentCmd::new(payer, "no-such-code", "missing"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    expire_now(&db, &qr.code).await;
    let err = engine
        .pay_qr(QrPaymentCmd::new(payer, qr.code.clone(), "late"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Expired);
    assert_eq!(
        engine.qr(&qr.code, payee).await.unwrap().status,
        QrStatus::Expired
    );
    let err = engine
        .pay_qr(QrPaymentCmd::new(payer, qr.code, "later"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Expired);
    assert_eq!(balance(&engine, payer).await, 100);
}

#[tokio::test]
async fn used_code_past_expiry_still_reports_used() {
    let (engine, db) = engine_with_db().await;
    let (admin, ids) = funded(&engine, &["payer", "late"], 50).await;
    let payee = member(&engine, admin, "payee", Role::Lecturer, 50).await;

    let qr = engine.create_qr(CreateQrCmd::new(payee, 10)).await.unwrap();
    engine
        .pay_qr(QrPaymentCmd::new(ids[0], qr.code.clone(), "on-time"))
        .await
        .unwrap();
    expire_now(&db, &qr.code).await;

    let err = engine
        .pay_qr(QrPaymentCmd::new(ids[1], qr.code.clone(), "too-late"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(engine.qr(&qr.code, payee).await.unwrap().status, QrStatus::Used);
}

#[tokio::test]
async fn qr_is_private_to_its_creator_and_cancellable() {
    let (engine, _db) = engine_with_db().await;
    let (admin, ids) = funded(&engine, &["payer"], 50).await;
    let (payer, payee) = (ids[0], member(&engine, admin, "payee", Role::Lecturer, 0).await);

    let err = engine
        .create_qr(CreateQrCmd::new(payer, 10))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let qr = engine.create_qr(CreateQrCmd::new(payee, 10)).await.unwrap();
    let err = engine.qr(&qr.code, payer).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = engine.cancel_qr(qr.id, payer).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let cancelled = engine.cancel_qr(qr.id, payee).await.unwrap();
    assert_eq!(cancelled.status, QrStatus::Cancelled);
    let err = engine.cancel_qr(qr.id, payee).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = engine
        .pay_qr(QrPaymentCmd::new(payer, qr.code, "cancelled"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(balance(&engine, payer).await, 50);
}

#[tokio::test]
async fn adjustment_cannot_overdraw() {
    let (engine, _db) = engine_with_db().await;
    let (admin, ids) = funded(&engine, &["u1"], 15).await;

    let err = engine
        .adjust_balance(AdjustBalanceCmd::new(admin, ids[0], -20, "correction", "adj-1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    assert_eq!(balance(&engine, ids[0]).await, 15);

    let receipt = engine
        .adjust_balance(AdjustBalanceCmd::new(admin, ids[0], -15, "correction", "adj-2"))
        .await
        .unwrap();
    assert!(receipt.transaction.code.starts_with("ADJ-"));
    assert_eq!(receipt.entries.len(), 1);
    assert_eq!(receipt.entries[0].entry_type, EntryType::Debit);
    assert_eq!(receipt.entries[0].reference_type, ReferenceType::Adjustment);
    assert_eq!(receipt.transaction.description.as_deref(), Some("correction"));
    assert_eq!(balance(&engine, ids[0]).await, 0);
}

#[tokio::test]
async fn adjustment_requires_admin_and_reason() {
    let (engine, _db) = engine_with_db().await;
    let (_admin, ids) = funded(&engine, &["u1", "u2"], 0).await;

    let err = engine
        .adjust_balance(AdjustBalanceCmd::new(ids[0], ids[1], 10, "gift", "adj"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let admin = engine.user_by_username("root").await.unwrap().id;
    let err = engine
        .adjust_balance(AdjustBalanceCmd::new(admin, ids[1], 10, "  ", "adj"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(balance(&engine, ids[1]).await, 0);
}

#[tokio::test]
async fn frozen_wallet_cannot_spend() {
    let (engine, _db) = engine_with_db().await;
    let (admin, ids) = funded(&engine, &["bob"], 50).await;
    let bob = ids[0];
    let alice = member(&engine, admin, "alice", Role::Lecturer, 50).await;

    let frozen = engine.freeze_wallet(admin, alice, "audit").await.unwrap();
    assert!(frozen.is_frozen);
    assert_eq!(frozen.frozen_by, Some(admin));
    let err = engine.freeze_wallet(admin, alice, "again").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = engine
        .transfer(TransferCmd::new(alice, bob, 5, "spend"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Frozen);

    // Transfers into a frozen wallet are refused by default.
    let err = engine
        .transfer(TransferCmd::new(bob, alice, 5, "gift"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Frozen);

    // QR payments to a frozen creator are allowed by default.
    let qr = engine.create_qr(CreateQrCmd::new(alice, 5)).await.unwrap();
    engine
        .pay_qr(QrPaymentCmd::new(bob, qr.code, "qr"))
        .await
        .unwrap();

    // An admin may still correct a frozen wallet downwards.
    engine
        .adjust_balance(AdjustBalanceCmd::new(admin, alice, -5, "fix", "fix"))
        .await
        .unwrap();
    assert_eq!(balance(&engine, alice).await, 50);

    let err = engine.freeze_wallet(bob, alice, "nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let thawed = engine.unfreeze_wallet(admin, alice).await.unwrap();
    assert!(!thawed.is_frozen);
    assert!(thawed.frozen_reason.is_none());
    engine
        .transfer(TransferCmd::new(alice, bob, 5, "after"))
        .await
        .unwrap();
}

#[tokio::test]
async fn frozen_credit_policy_is_configurable() {
    let policy = FrozenCreditPolicy {
        transfer: FrozenCredit::Allow,
        qr_payment: FrozenCredit::Reject,
        ..FrozenCreditPolicy::default()
    };
    let (engine, _db) = engine_with_config(EngineConfig::new(SECRET).frozen_credit(policy)).await;
    let (admin, ids) = funded(&engine, &["bob"], 50).await;
    let (alice, bob) = (member(&engine, admin, "alice", Role::Lecturer, 50).await, ids[0]);
    engine.freeze_wallet(admin, alice, "audit").await.unwrap();

    engine
        .transfer(TransferCmd::new(bob, alice, 5, "gift"))
        .await
        .unwrap();
    let qr = engine.create_qr(CreateQrCmd::new(alice, 5)).await.unwrap();
    let err = engine
        .pay_qr(QrPaymentCmd::new(bob, qr.code, "qr"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Frozen);
    assert_eq!(balance(&engine, alice).await, 55);
}

#[tokio::test]
async fn approved_mission_pays_reward_once() {
    let (engine, db) = engine_with_db().await;
    let lecturer = user(&engine, "prof", Role::Lecturer).await;
    let student = user(&engine, "stud", Role::Student).await;

    let err = engine
        .create_mission(CreateMissionCmd::new(student, "Quiz", 10))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let mission = engine
        .create_mission(CreateMissionCmd::new(lecturer, "Quiz", 10).description("week 1"))
        .await
        .unwrap();
    let log = engine.start_mission(mission.id, student).await.unwrap();
    assert_eq!(log.status, MissionLogStatus::Started);

    let err = engine
        .grade_mission(GradeMissionCmd::new(lecturer, log.id, true, "early"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    engine
        .submit_mission(log.id, student, Some(serde_json::json!({"q1": "b"})))
        .await
        .unwrap();
    let err = engine
        .grade_mission(GradeMissionCmd::new(student, log.id, true, "self"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let outcome = engine
        .grade_mission(GradeMissionCmd::new(lecturer, log.id, true, "grade-1").score(9.5))
        .await
        .unwrap();
    assert!(!outcome.replayed);
    assert_eq!(outcome.log.status, MissionLogStatus::Completed);
    assert!(outcome.log.reward_claimed);
    let receipt = outcome.receipt.unwrap();
    assert_eq!(receipt.transaction.transaction_type, TransactionType::MissionReward);
    assert!(receipt.transaction.code.starts_with("MIS-"));
    assert_eq!(receipt.transaction.mission_log_id, Some(log.id));
    assert_eq!(balance(&engine, student).await, 10);

    let replay = engine
        .grade_mission(GradeMissionCmd::new(lecturer, log.id, true, "grade-1"))
        .await
        .unwrap();
    assert!(replay.replayed);
    assert_eq!(replay.receipt.unwrap().transaction.id, receipt.transaction.id);

    let err = engine
        .grade_mission(GradeMissionCmd::new(lecturer, log.id, true, "grade-2"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(balance(&engine, student).await, 10);
    assert_eq!(
        count(&db, "SELECT COUNT(*) FROM transactions WHERE transaction_type = 'MISSION_REWARD'")
            .await,
        1
    );
}

#[tokio::test]
async fn rejected_mission_pays_nothing_and_replays() {
    let (engine, _db) = engine_with_db().await;
    let lecturer = user(&engine, "prof", Role::Lecturer).await;
    let student = user(&engine, "stud", Role::Student).await;
    let mission = engine
        .create_mission(CreateMissionCmd::new(lecturer, "Essay", 20))
        .await
        .unwrap();
    let log = engine.start_mission(mission.id, student).await.unwrap();
    engine.submit_mission(log.id, student, None).await.unwrap();

    let outcome = engine
        .grade_mission(GradeMissionCmd::new(lecturer, log.id, false, "reject-1").notes("off topic"))
        .await
        .unwrap();
    assert!(outcome.receipt.is_none());
    assert_eq!(outcome.log.status, MissionLogStatus::Failed);
    assert_eq!(outcome.log.notes.as_deref(), Some("off topic"));

    let replay = engine
        .grade_mission(GradeMissionCmd::new(lecturer, log.id, false, "reject-1"))
        .await
        .unwrap();
    assert!(replay.replayed);
    assert!(replay.receipt.is_none());

    // A grading key cannot be recycled for a money movement.
    let err = engine
        .transfer(TransferCmd::new(lecturer, student, 1, "reject-1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateRequest);
    assert_eq!(balance(&engine, student).await, 0);
}

#[tokio::test]
async fn mission_participation_rules() {
    let (engine, _db) = engine_with_db().await;
    let lecturer = user(&engine, "prof", Role::Lecturer).await;
    let s1 = user(&engine, "s1", Role::Student).await;
    let s2 = user(&engine, "s2", Role::Student).await;
    let mission = engine
        .create_mission(CreateMissionCmd::new(lecturer, "Lab", 5).max_participants(1))
        .await
        .unwrap();

    let err = engine.start_mission(mission.id, lecturer).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SelfTargeting);

    engine.start_mission(mission.id, s1).await.unwrap();
    let err = engine.start_mission(mission.id, s1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let err = engine.start_mission(mission.id, s2).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn purchase_pays_seller_and_tracks_stock() {
    let (engine, db) = engine_with_db().await;
    let (admin, ids) = funded(&engine, &["buyer"], 100).await;
    let buyer = ids[0];
    let seller = member(&engine, admin, "seller", Role::Lecturer, 100).await;

    let err = engine
        .create_product(CreateProductCmd::new(buyer, "Sticker", 15))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let product = engine
        .create_product(CreateProductCmd::new(seller, "Sticker", 15).stock(3))
        .await
        .unwrap();

    let purchase = engine
        .purchase(PurchaseCmd::new(buyer, product.id, 2, "buy-1"))
        .await
        .unwrap();
    assert_eq!(purchase.order.total_price, 30);
    assert!(purchase.order.code.starts_with("ORD-"));
    assert_eq!(purchase.order.transaction_id, Some(purchase.receipt.transaction.id));
    assert_eq!(purchase.receipt.transaction.order_id, Some(purchase.order.id));
    assert_eq!(purchase.receipt.entries[0].reference_type, ReferenceType::Order);
    assert_eq!(balance(&engine, buyer).await, 70);
    assert_eq!(balance(&engine, seller).await, 130);

    let stocked = engine.product(product.id).await.unwrap();
    assert_eq!(stocked.stock, 1);
    assert_eq!(stocked.sold_count, 2);

    let replay = engine
        .purchase(PurchaseCmd::new(buyer, product.id, 2, "buy-1"))
        .await
        .unwrap();
    assert!(replay.receipt.replayed);
    assert_eq!(replay.order.id, purchase.order.id);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM orders").await, 1);

    let err = engine
        .purchase(PurchaseCmd::new(buyer, product.id, 2, "buy-2"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = engine
        .purchase(PurchaseCmd::new(seller, product.id, 1, "buy-own"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SelfTargeting);

    let pricey = engine
        .create_product(CreateProductCmd::new(seller, "Hoodie", 500).unlimited())
        .await
        .unwrap();
    let err = engine
        .purchase(PurchaseCmd::new(buyer, pricey.id, 1, "buy-3"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    assert_eq!(balance(&engine, buyer).await, 70);
    assert_eq!(engine.product(product.id).await.unwrap().stock, 1);
}

#[tokio::test]
async fn deactivated_product_is_off_sale() {
    let (engine, db) = engine_with_db().await;
    let (admin, ids) = funded(&engine, &["buyer"], 100).await;
    let buyer = ids[0];
    let seller = member(&engine, admin, "seller", Role::Lecturer, 0).await;
    let product = engine
        .create_product(CreateProductCmd::new(seller, "Mug", 20).stock(5))
        .await
        .unwrap();

    let err = engine
        .deactivate_product(product.id, buyer)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let closed = engine.deactivate_product(product.id, seller).await.unwrap();
    assert!(!closed.is_active);
    let err = engine
        .deactivate_product(product.id, admin)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = engine
        .purchase(PurchaseCmd::new(buyer, product.id, 1, "buy-closed"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let err = engine
        .create_qr(CreateQrCmd::new(seller, 20).product(product.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(balance(&engine, buyer).await, 100);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM orders").await, 0);
}

#[tokio::test]
async fn deactivated_mission_takes_no_new_participants() {
    let (engine, _db) = engine_with_db().await;
    let admin = user(&engine, "root", Role::Admin).await;
    let lecturer = user(&engine, "prof", Role::Lecturer).await;
    let s1 = user(&engine, "s1", Role::Student).await;
    let s2 = user(&engine, "s2", Role::Student).await;
    let mission = engine
        .create_mission(CreateMissionCmd::new(lecturer, "Survey", 5))
        .await
        .unwrap();
    let log = engine.start_mission(mission.id, s1).await.unwrap();

    let err = engine.deactivate_mission(mission.id, s1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let closed = engine.deactivate_mission(mission.id, admin).await.unwrap();
    assert!(!closed.is_active);

    let err = engine.start_mission(mission.id, s2).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    // Work already in progress can still be handed in and rewarded.
    engine.submit_mission(log.id, s1, None).await.unwrap();
    engine
        .grade_mission(GradeMissionCmd::new(lecturer, log.id, true, "late-grade"))
        .await
        .unwrap();
    assert_eq!(balance(&engine, s1).await, 5);
}

#[tokio::test]
async fn wallet_history_is_newest_first_with_direction() {
    let (engine, _db) = engine_with_db().await;
    let (_admin, ids) = funded(&engine, &["alice", "bob"], 50).await;

    engine
        .transfer(TransferCmd::new(ids[0], ids[1], 10, "h1"))
        .await
        .unwrap();
    engine
        .transfer(TransferCmd::new(ids[1], ids[0], 3, "h2"))
        .await
        .unwrap();

    let history = engine.transactions(ids[0], Page::default()).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].transaction.idempotency_key, "h2");
    assert_eq!(history[0].direction, EntryType::Credit);
    assert_eq!(history[1].direction, EntryType::Debit);
    assert_eq!(history[2].transaction.transaction_type, TransactionType::Adjustment);

    let first_page = engine.ledger(ids[0], Page::number(1, 2)).await.unwrap();
    let second_page = engine.ledger(ids[0], Page::number(2, 2)).await.unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(second_page.len(), 1);
    assert_eq!(first_page[0].balance_after, 43);
    assert_eq!(second_page[0].balance_after, 50);
}

#[tokio::test]
async fn builder_rejects_unusable_config() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let err = Engine::builder()
        .database(db.clone())
        .config(EngineConfig::new(""))
        .build()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = Engine::builder().database(db).build().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}
