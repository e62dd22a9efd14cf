//! Command structs for engine operations.
//!
//! These types group the parameters of write operations, keeping call sites
//! readable and avoiding long argument lists. Every money-moving command takes
//! the caller's idempotency key in its constructor.

use uuid::Uuid;

use crate::{QrType, Role};

/// Register a user together with its empty wallet.
#[derive(Clone, Debug)]
pub struct RegisterUserCmd {
    pub username: String,
    pub full_name: String,
    pub role: Role,
}

impl RegisterUserCmd {
    #[must_use]
    pub fn new(username: impl Into<String>, full_name: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            full_name: full_name.into(),
            role,
        }
    }
}

/// Move points from one user's wallet to another's.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub amount: i64,
    pub description: Option<String>,
    pub idempotency_key: String,
}

impl TransferCmd {
    #[must_use]
    pub fn new(
        from_user_id: Uuid,
        to_user_id: Uuid,
        amount: i64,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            from_user_id,
            to_user_id,
            amount,
            description: None,
            idempotency_key: idempotency_key.into(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Issue a QR code payable to its creator.
#[derive(Clone, Debug)]
pub struct CreateQrCmd {
    pub creator_id: Uuid,
    pub qr_type: QrType,
    pub amount: i64,
    pub description: Option<String>,
    pub product_id: Option<Uuid>,
}

impl CreateQrCmd {
    #[must_use]
    pub fn new(creator_id: Uuid, amount: i64) -> Self {
        Self {
            creator_id,
            qr_type: QrType::Payment,
            amount,
            description: None,
            product_id: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Turn the code into a product checkout code.
    #[must_use]
    pub fn product(mut self, product_id: Uuid) -> Self {
        self.qr_type = QrType::Product;
        self.product_id = Some(product_id);
        self
    }
}

/// Pay a scanned QR code.
#[derive(Clone, Debug)]
pub struct QrPaymentCmd {
    pub payer_id: Uuid,
    pub code: String,
    pub idempotency_key: String,
}

impl QrPaymentCmd {
    #[must_use]
    pub fn new(payer_id: Uuid, code: impl Into<String>, idempotency_key: impl Into<String>) -> Self {
        Self {
            payer_id,
            code: code.into(),
            idempotency_key: idempotency_key.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CreateMissionCmd {
    pub creator_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub reward_points: i64,
    pub max_participants: Option<i32>,
    pub is_repeatable: bool,
}

impl CreateMissionCmd {
    #[must_use]
    pub fn new(creator_id: Uuid, title: impl Into<String>, reward_points: i64) -> Self {
        Self {
            creator_id,
            title: title.into(),
            description: None,
            reward_points,
            max_participants: None,
            is_repeatable: false,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn max_participants(mut self, max: i32) -> Self {
        self.max_participants = Some(max);
        self
    }

    #[must_use]
    pub fn repeatable(mut self) -> Self {
        self.is_repeatable = true;
        self
    }
}

/// Grade a submitted mission log; approval pays the mission reward.
#[derive(Clone, Debug)]
pub struct GradeMissionCmd {
    pub grader_id: Uuid,
    pub mission_log_id: Uuid,
    pub approved: bool,
    pub score: Option<f64>,
    pub notes: Option<String>,
    pub idempotency_key: String,
}

impl GradeMissionCmd {
    #[must_use]
    pub fn new(
        grader_id: Uuid,
        mission_log_id: Uuid,
        approved: bool,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            grader_id,
            mission_log_id,
            approved,
            score: None,
            notes: None,
            idempotency_key: idempotency_key.into(),
        }
    }

    #[must_use]
    pub fn score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[derive(Clone, Debug)]
pub struct CreateProductCmd {
    pub seller_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i64,
    pub is_unlimited: bool,
}

impl CreateProductCmd {
    #[must_use]
    pub fn new(seller_id: Uuid, name: impl Into<String>, price: i64) -> Self {
        Self {
            seller_id,
            name: name.into(),
            description: None,
            price,
            stock: 0,
            is_unlimited: false,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn stock(mut self, stock: i64) -> Self {
        self.stock = stock;
        self
    }

    #[must_use]
    pub fn unlimited(mut self) -> Self {
        self.is_unlimited = true;
        self
    }
}

#[derive(Clone, Debug)]
pub struct PurchaseCmd {
    pub buyer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub idempotency_key: String,
}

impl PurchaseCmd {
    #[must_use]
    pub fn new(
        buyer_id: Uuid,
        product_id: Uuid,
        quantity: i64,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            buyer_id,
            product_id,
            quantity,
            idempotency_key: idempotency_key.into(),
        }
    }
}

/// Admin correction of a single wallet. `amount` is signed.
#[derive(Clone, Debug)]
pub struct AdjustBalanceCmd {
    pub admin_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub reason: String,
    pub idempotency_key: String,
}

impl AdjustBalanceCmd {
    #[must_use]
    pub fn new(
        admin_id: Uuid,
        user_id: Uuid,
        amount: i64,
        reason: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            admin_id,
            user_id,
            amount,
            reason: reason.into(),
            idempotency_key: idempotency_key.into(),
        }
    }
}
