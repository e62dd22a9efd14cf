//! Missions created by lecturers and admins.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub reward_points: i64,
    /// `None` means no cap.
    pub max_participants: Option<i32>,
    pub current_participants: i32,
    pub is_active: bool,
    pub is_repeatable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mission {
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.max_participants
            .is_some_and(|max| self.current_participants >= max)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "missions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub creator_id: String,
    pub title: String,
    pub description: Option<String>,
    pub reward_points: i64,
    pub max_participants: Option<i32>,
    pub current_participants: i32,
    pub is_active: bool,
    pub is_repeatable: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::mission_logs::Entity")]
    Logs,
}

impl Related<super::mission_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Logs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Mission> for ActiveModel {
    fn from(mission: &Mission) -> Self {
        Self {
            id: ActiveValue::Set(mission.id.to_string()),
            creator_id: ActiveValue::Set(mission.creator_id.to_string()),
            title: ActiveValue::Set(mission.title.clone()),
            description: ActiveValue::Set(mission.description.clone()),
            reward_points: ActiveValue::Set(mission.reward_points),
            max_participants: ActiveValue::Set(mission.max_participants),
            current_participants: ActiveValue::Set(mission.current_participants),
            is_active: ActiveValue::Set(mission.is_active),
            is_repeatable: ActiveValue::Set(mission.is_repeatable),
            created_at: ActiveValue::Set(mission.created_at),
            updated_at: ActiveValue::Set(mission.updated_at),
        }
    }
}

impl TryFrom<Model> for Mission {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "mission")?,
            creator_id: parse_uuid(&model.creator_id, "user")?,
            title: model.title,
            description: model.description,
            reward_points: model.reward_points,
            max_participants: model.max_participants,
            current_participants: model.current_participants,
            is_active: model.is_active,
            is_repeatable: model.is_repeatable,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
