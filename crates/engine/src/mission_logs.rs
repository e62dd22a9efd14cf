//! Participation of one user in one mission.
//!
//! Lifecycle: STARTED → (IN_PROGRESS) → SUBMITTED → COMPLETED | FAILED.
//! COMPLETED and FAILED are terminal; only a SUBMITTED log can be graded.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionLogStatus {
    Started,
    InProgress,
    Submitted,
    Completed,
    Failed,
    Expired,
}

impl MissionLogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Submitted => "SUBMITTED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Expired => "EXPIRED",
        }
    }

    #[must_use]
    pub fn can_submit(self) -> bool {
        matches!(self, Self::Started | Self::InProgress)
    }
}

impl TryFrom<&str> for MissionLogStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "STARTED" => Ok(Self::Started),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "SUBMITTED" => Ok(Self::Submitted),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(EngineError::InvalidInput(format!(
                "invalid mission log status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MissionLog {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub user_id: Uuid,
    pub status: MissionLogStatus,
    pub score: Option<f64>,
    /// Raw JSON answers, as submitted.
    pub answers: Option<String>,
    pub reward_claimed: bool,
    pub reward_points: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub graded_at: Option<DateTime<Utc>>,
    pub graded_by: Option<Uuid>,
    pub notes: Option<String>,
    /// Key of the grading request, so that a rejection replays like a payout.
    pub grade_idempotency_key: Option<String>,
}

impl MissionLog {
    pub(crate) fn started(mission_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mission_id,
            user_id,
            status: MissionLogStatus::Started,
            score: None,
            answers: None,
            reward_claimed: false,
            reward_points: None,
            started_at: now,
            submitted_at: None,
            completed_at: None,
            graded_at: None,
            graded_by: None,
            notes: None,
            grade_idempotency_key: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "mission_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub mission_id: String,
    pub user_id: String,
    pub status: String,
    pub score: Option<f64>,
    pub answers: Option<String>,
    pub reward_claimed: bool,
    pub reward_points: Option<i64>,
    pub started_at: DateTimeUtc,
    pub submitted_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
    pub graded_at: Option<DateTimeUtc>,
    pub graded_by: Option<String>,
    pub notes: Option<String>,
    #[sea_orm(unique)]
    pub grade_idempotency_key: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::missions::Entity",
        from = "Column::MissionId",
        to = "super::missions::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Mission,
}

impl Related<super::missions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Mission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&MissionLog> for ActiveModel {
    fn from(log: &MissionLog) -> Self {
        Self {
            id: ActiveValue::Set(log.id.to_string()),
            mission_id: ActiveValue::Set(log.mission_id.to_string()),
            user_id: ActiveValue::Set(log.user_id.to_string()),
            status: ActiveValue::Set(log.status.as_str().to_string()),
            score: ActiveValue::Set(log.score),
            answers: ActiveValue::Set(log.answers.clone()),
            reward_claimed: ActiveValue::Set(log.reward_claimed),
            reward_points: ActiveValue::Set(log.reward_points),
            started_at: ActiveValue::Set(log.started_at),
            submitted_at: ActiveValue::Set(log.submitted_at),
            completed_at: ActiveValue::Set(log.completed_at),
            graded_at: ActiveValue::Set(log.graded_at),
            graded_by: ActiveValue::Set(log.graded_by.map(|id| id.to_string())),
            notes: ActiveValue::Set(log.notes.clone()),
            grade_idempotency_key: ActiveValue::Set(log.grade_idempotency_key.clone()),
        }
    }
}

impl TryFrom<Model> for MissionLog {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "mission log")?,
            mission_id: parse_uuid(&model.mission_id, "mission")?,
            user_id: parse_uuid(&model.user_id, "user")?,
            status: MissionLogStatus::try_from(model.status.as_str())?,
            score: model.score,
            answers: model.answers,
            reward_claimed: model.reward_claimed,
            reward_points: model.reward_points,
            started_at: model.started_at,
            submitted_at: model.submitted_at,
            completed_at: model.completed_at,
            graded_at: model.graded_at,
            graded_by: model
                .graded_by
                .as_deref()
                .map(|id| parse_uuid(id, "user"))
                .transpose()?,
            notes: model.notes,
            grade_idempotency_key: model.grade_idempotency_key,
        })
    }
}
