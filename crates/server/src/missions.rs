//! Mission endpoints: create, deactivate, start, submit and grade.

use api_types::mission::{
    GradeView, MissionGrade, MissionLogView, MissionNew, MissionSubmit, MissionView,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::TypedHeader;
use engine::{CreateMissionCmd, GradeMissionCmd, User};
use uuid::Uuid;

use crate::{
    ServerError,
    server::{IdempotencyKey, ServerState},
    transfers::created_or_replayed,
    views,
};

pub async fn create(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Json(payload): Json<MissionNew>,
) -> Result<(StatusCode, Json<MissionView>), ServerError> {
    let mut cmd = CreateMissionCmd::new(user.id, payload.title, payload.reward_points);
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    if let Some(max) = payload.max_participants {
        cmd = cmd.max_participants(max);
    }
    if payload.is_repeatable {
        cmd = cmd.repeatable();
    }
    let mission = state.engine.create_mission(cmd).await?;
    Ok((StatusCode::CREATED, Json(views::mission_view(mission))))
}

pub async fn deactivate(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(mission_id): Path<Uuid>,
) -> Result<Json<MissionView>, ServerError> {
    let mission = state.engine.deactivate_mission(mission_id, user.id).await?;
    Ok(Json(views::mission_view(mission)))
}

pub async fn start(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(mission_id): Path<Uuid>,
) -> Result<(StatusCode, Json<MissionLogView>), ServerError> {
    let log = state.engine.start_mission(mission_id, user.id).await?;
    Ok((StatusCode::CREATED, Json(views::mission_log_view(log))))
}

pub async fn log(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(log_id): Path<Uuid>,
) -> Result<Json<MissionLogView>, ServerError> {
    let log = state.engine.mission_log(log_id).await?;
    if log.user_id != user.id {
        let mission = state.engine.mission(log.mission_id).await?;
        if mission.creator_id != user.id {
            return Err(engine::EngineError::Forbidden(
                "mission log belongs to another user".to_string(),
            )
            .into());
        }
    }
    Ok(Json(views::mission_log_view(log)))
}

pub async fn submit(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(log_id): Path<Uuid>,
    Json(payload): Json<MissionSubmit>,
) -> Result<Json<MissionLogView>, ServerError> {
    let log = state
        .engine
        .submit_mission(log_id, user.id, payload.answers)
        .await?;
    Ok(Json(views::mission_log_view(log)))
}

pub async fn grade(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(log_id): Path<Uuid>,
    key: Option<TypedHeader<IdempotencyKey>>,
    Json(payload): Json<MissionGrade>,
) -> Result<(StatusCode, Json<GradeView>), ServerError> {
    let mut cmd = GradeMissionCmd::new(
        user.id,
        log_id,
        payload.approved,
        IdempotencyKey::or_missing(key),
    );
    if let Some(score) = payload.score {
        cmd = cmd.score(score);
    }
    if let Some(notes) = payload.notes {
        cmd = cmd.notes(notes);
    }
    let outcome = state.engine.grade_mission(cmd).await?;
    Ok((
        created_or_replayed(outcome.replayed),
        Json(views::grade_view(outcome)),
    ))
}
