use sea_orm::{ConnectionTrait, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, Role, User, users};

use super::Engine;

impl Engine {
    pub(super) async fn require_user<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: Uuid,
    ) -> ResultEngine<User> {
        let model = users::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("user not exists".to_string()))?;
        User::try_from(model)
    }

    /// Resolve `user_id` and check its role is one of `allowed`.
    pub(super) async fn require_role<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: Uuid,
        allowed: &[Role],
    ) -> ResultEngine<User> {
        let user = self.require_user(db, user_id).await?;
        if !allowed.contains(&user.role) {
            return Err(EngineError::Forbidden(format!(
                "role {} may not perform this operation",
                user.role.as_str()
            )));
        }
        Ok(user)
    }

    pub(super) async fn require_admin<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: Uuid,
    ) -> ResultEngine<User> {
        self.require_role(db, user_id, &[Role::Admin]).await
    }
}
