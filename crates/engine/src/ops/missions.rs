//! Missions: creation, participation and the graded reward payout.

use chrono::Utc;
use sea_orm::{DatabaseTransaction, QueryFilter, QuerySelect, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    CreateMissionCmd, EngineError, GradeMissionCmd, GradeOutcome, Mission, MissionLog,
    MissionLogStatus, Receipt, ReferenceType, ResultEngine, Role, TransactionRecord, TransactionType,
    mission_logs, missions,
    util::{
        normalize_optional_text, normalize_required_text, require_idempotency_key,
        require_positive,
    },
};

use super::{
    Engine,
    store::{Posting, ensure_creditable},
    with_tx,
};

impl Engine {
    /// Lecturers and admins create missions.
    pub async fn create_mission(&self, cmd: CreateMissionCmd) -> ResultEngine<Mission> {
        let title = normalize_required_text(&cmd.title, "title")?;
        let reward_points = require_positive(cmd.reward_points, "reward_points")?;
        if cmd.max_participants.is_some_and(|max| max <= 0) {
            return Err(EngineError::InvalidInput(
                "max_participants must be > 0".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            self.require_role(&db_tx, cmd.creator_id, &[Role::Lecturer, Role::Admin])
                .await?;
            let now = Utc::now();
            let mission = Mission {
                id: Uuid::new_v4(),
                creator_id: cmd.creator_id,
                title,
                description: normalize_optional_text(cmd.description.as_deref()),
                reward_points,
                max_participants: cmd.max_participants,
                current_participants: 0,
                is_active: true,
                is_repeatable: cmd.is_repeatable,
                created_at: now,
                updated_at: now,
            };
            missions::ActiveModel::from(&mission).insert(&db_tx).await?;
            Ok(mission)
        })
    }

    pub async fn mission(&self, mission_id: Uuid) -> ResultEngine<Mission> {
        let model = missions::Entity::find_by_id(mission_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound("mission not exists".to_string()))?;
        Mission::try_from(model)
    }

    /// Close a mission to new participants. Its creator or an admin may do
    /// so; logs already started can still be submitted and graded.
    pub async fn deactivate_mission(
        &self,
        mission_id: Uuid,
        actor_id: Uuid,
    ) -> ResultEngine<Mission> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, actor_id).await?;
            let model = missions::Entity::find_by_id(mission_id.to_string())
                .lock_exclusive()
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("mission not exists".to_string()))?;
            let mut mission = Mission::try_from(model)?;
            if mission.creator_id != actor.id && actor.role != Role::Admin {
                return Err(EngineError::Forbidden(
                    "only the creator can deactivate this mission".to_string(),
                ));
            }
            if !mission.is_active {
                return Err(EngineError::InvalidState(
                    "mission is already inactive".to_string(),
                ));
            }
            mission.is_active = false;
            mission.updated_at = Utc::now();
            missions::ActiveModel::from(&mission).update(&db_tx).await?;
            tracing::info!(mission = %mission.id, "mission deactivated");
            Ok(mission)
        })
    }

    pub async fn mission_log(&self, log_id: Uuid) -> ResultEngine<MissionLog> {
        let model = mission_logs::Entity::find_by_id(log_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound("mission log not exists".to_string()))?;
        MissionLog::try_from(model)
    }

    /// Join a mission. Creators cannot join their own missions and a
    /// non-repeatable mission can be joined once.
    pub async fn start_mission(&self, mission_id: Uuid, user_id: Uuid) -> ResultEngine<MissionLog> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;
            let model = missions::Entity::find_by_id(mission_id.to_string())
                .lock_exclusive()
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("mission not exists".to_string()))?;
            let mut mission = Mission::try_from(model)?;
            if mission.creator_id == user_id {
                return Err(EngineError::SelfTargeting(
                    "cannot start your own mission".to_string(),
                ));
            }
            if !mission.is_active {
                return Err(EngineError::InvalidState("mission is not active".to_string()));
            }
            let participated = mission_logs::Entity::find()
                .filter(mission_logs::Column::MissionId.eq(mission_id.to_string()))
                .filter(mission_logs::Column::UserId.eq(user_id.to_string()))
                .one(&db_tx)
                .await?
                .is_some();
            if participated && !mission.is_repeatable {
                return Err(EngineError::InvalidState(
                    "already participated in this mission".to_string(),
                ));
            }
            if mission.is_full() {
                return Err(EngineError::InvalidState(
                    "maximum participants reached".to_string(),
                ));
            }

            let now = Utc::now();
            let log = MissionLog::started(mission_id, user_id, now);
            mission_logs::ActiveModel::from(&log).insert(&db_tx).await?;
            mission.current_participants += 1;
            mission.updated_at = now;
            missions::ActiveModel::from(&mission).update(&db_tx).await?;
            Ok(log)
        })
    }

    /// Hand in answers for grading.
    pub async fn submit_mission(
        &self,
        log_id: Uuid,
        user_id: Uuid,
        answers: Option<serde_json::Value>,
    ) -> ResultEngine<MissionLog> {
        let answers = answers
            .map(|value| serde_json::to_string(&value))
            .transpose()
            .map_err(|err| EngineError::InvalidInput(format!("invalid answers: {err}")))?;
        with_tx!(self, |db_tx| {
            let mut log = self.lock_mission_log(&db_tx, log_id).await?;
            if log.user_id != user_id {
                return Err(EngineError::Forbidden(
                    "mission log belongs to another user".to_string(),
                ));
            }
            if !log.status.can_submit() {
                return Err(EngineError::InvalidState(format!(
                    "cannot submit a {} mission",
                    log.status.as_str()
                )));
            }
            log.status = MissionLogStatus::Submitted;
            log.answers = answers;
            log.submitted_at = Some(Utc::now());
            mission_logs::ActiveModel::from(&log).update(&db_tx).await?;
            Ok(log)
        })
    }

    /// Grade a SUBMITTED log. Approval credits the mission reward to the
    /// participant; rejection only closes the log as FAILED.
    pub async fn grade_mission(&self, cmd: GradeMissionCmd) -> ResultEngine<GradeOutcome> {
        let key = require_idempotency_key(&cmd.idempotency_key)?;
        if let Some(outcome) = self.replay_grade(&key, cmd.grader_id).await? {
            return Ok(outcome);
        }

        let notes = normalize_optional_text(cmd.notes.as_deref());
        let result = with_tx!(self, |db_tx| {
            self.grade_in_tx(&db_tx, &cmd, &key, notes).await
        });
        let outcome = self
            .settle(result, &key, || self.replay_grade(&key, cmd.grader_id))
            .await?;
        if !outcome.replayed {
            match &outcome.receipt {
                Some(receipt) => tracing::info!(
                    code = %receipt.transaction.code,
                    amount = receipt.transaction.amount,
                    "mission reward committed"
                ),
                None => tracing::info!(log = %outcome.log.id, "mission submission rejected"),
            }
        }
        Ok(outcome)
    }

    async fn grade_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        cmd: &GradeMissionCmd,
        key: &str,
        notes: Option<String>,
    ) -> ResultEngine<GradeOutcome> {
        let mut log = self.lock_mission_log(db_tx, cmd.mission_log_id).await?;
        let mission = missions::Entity::find_by_id(log.mission_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound("mission not exists".to_string()))?;
        let mission = Mission::try_from(mission)?;
        if mission.creator_id != cmd.grader_id {
            return Err(EngineError::Forbidden(
                "only the mission creator can grade".to_string(),
            ));
        }
        if log.status != MissionLogStatus::Submitted {
            return Err(EngineError::InvalidState(
                "no submission to grade".to_string(),
            ));
        }

        let now = Utc::now();
        log.score = cmd.score;
        log.notes = notes;
        log.graded_at = Some(now);
        log.graded_by = Some(cmd.grader_id);
        log.grade_idempotency_key = Some(key.to_string());

        let receipt = if cmd.approved {
            let mut wallet = self.lock_wallet(db_tx, log.user_id).await?;
            ensure_creditable(&wallet, self.config.frozen_credit.mission_reward)?;

            let reward = mission.reward_points;
            let mut record = TransactionRecord::completed(
                TransactionType::MissionReward,
                key.to_string(),
                cmd.grader_id,
                reward,
                now,
            );
            record.to_wallet_id = Some(wallet.id);
            record.description = Some(format!("Mission reward: {}", mission.title));
            record.mission_log_id = Some(log.id);
            self.create_record(db_tx, &mut record).await?;

            let credit = self
                .post(
                    db_tx,
                    &mut wallet,
                    Posting::credit(reward, (ReferenceType::MissionLog, log.id), now)
                        .transaction(record.id)
                        .description(record.description.clone()),
                )
                .await?;

            log.status = MissionLogStatus::Completed;
            log.completed_at = Some(now);
            log.reward_claimed = true;
            log.reward_points = Some(reward);
            Some(Receipt {
                transaction: record,
                entries: vec![credit],
                replayed: false,
            })
        } else {
            log.status = MissionLogStatus::Failed;
            log.reward_points = Some(0);
            None
        };

        mission_logs::ActiveModel::from(&log).update(db_tx).await?;
        Ok(GradeOutcome {
            log,
            receipt,
            replayed: false,
        })
    }

    /// Stored outcome of a grading key: the reward transaction when the
    /// grading approved, otherwise the log that recorded the key.
    async fn replay_grade(&self, key: &str, grader_id: Uuid) -> ResultEngine<Option<GradeOutcome>> {
        if let Some(record) = self.find_by_idempotency_key(&self.database, key).await? {
            record.ensure_replayable(grader_id, TransactionType::MissionReward)?;
            let log_id = record.mission_log_id.ok_or_else(|| {
                EngineError::InvalidState("reward transaction without mission log".to_string())
            })?;
            let log = self.mission_log(log_id).await?;
            let receipt = self.receipt_for(&self.database, record, true).await?;
            tracing::debug!(key, "idempotent replay");
            return Ok(Some(GradeOutcome {
                log,
                receipt: Some(receipt),
                replayed: true,
            }));
        }

        let Some(model) = mission_logs::Entity::find()
            .filter(mission_logs::Column::GradeIdempotencyKey.eq(key.to_string()))
            .one(&self.database)
            .await?
        else {
            return Ok(None);
        };
        let log = MissionLog::try_from(model)?;
        if log.graded_by != Some(grader_id) {
            return Err(EngineError::DuplicateRequest(format!(
                "idempotency key {key} already used for another request"
            )));
        }
        tracing::debug!(key, "idempotent replay");
        Ok(Some(GradeOutcome {
            log,
            receipt: None,
            replayed: true,
        }))
    }

    async fn lock_mission_log(
        &self,
        db_tx: &DatabaseTransaction,
        log_id: Uuid,
    ) -> ResultEngine<MissionLog> {
        let model = mission_logs::Entity::find_by_id(log_id.to_string())
            .lock_exclusive()
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound("mission log not exists".to_string()))?;
        MissionLog::try_from(model)
    }
}
