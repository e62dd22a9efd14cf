use chrono::Utc;
use sea_orm::{QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, RegisterUserCmd, ResultEngine, User, Wallet, users,
    util::normalize_required_text, wallets,
};

use super::{Engine, with_tx};

impl Engine {
    /// Create a user and its zero-balance wallet in one unit of work.
    pub async fn register_user(&self, cmd: RegisterUserCmd) -> ResultEngine<(User, Wallet)> {
        let username = normalize_required_text(&cmd.username, "username")?.to_lowercase();
        let full_name = normalize_required_text(&cmd.full_name, "full_name")?;
        with_tx!(self, |db_tx| {
            let taken = users::Entity::find()
                .filter(users::Column::Username.eq(username.clone()))
                .one(&db_tx)
                .await?
                .is_some();
            if taken {
                return Err(EngineError::InvalidState(format!(
                    "username {username} already taken"
                )));
            }

            let now = Utc::now();
            let user = User {
                id: Uuid::new_v4(),
                username,
                full_name,
                role: cmd.role,
                created_at: now,
            };
            users::ActiveModel::from(&user).insert(&db_tx).await?;
            let wallet = Wallet::new(user.id, now);
            wallets::ActiveModel::from(&wallet).insert(&db_tx).await?;
            tracing::info!(user = %user.id, role = user.role.as_str(), "user registered");
            Ok((user, wallet))
        })
    }

    pub async fn user(&self, user_id: Uuid) -> ResultEngine<User> {
        self.require_user(&self.database, user_id).await
    }

    pub async fn user_by_username(&self, username: &str) -> ResultEngine<User> {
        let model = users::Entity::find()
            .filter(users::Column::Username.eq(username.trim().to_lowercase()))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound("user not exists".to_string()))?;
        User::try_from(model)
    }
}
