//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs the acting identity and basic result info.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use tracing::{info, instrument};

use crate::domain::{Actor, ChallengeTemplate, StudentProgress, Submission, TemplateDefinition};
use crate::error::ServiceResult;
use crate::lifecycle;
use crate::progress::compute_progress;
use crate::protocol::*;
use crate::routes::identity::{ApiJson, ApiQuery};
use crate::state::AppState;
use crate::util::supported_date;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
    Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state, def), fields(actor = %actor.id))]
pub async fn http_create_template(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ApiJson(def): ApiJson<TemplateDefinition>,
) -> ServiceResult<(StatusCode, Json<TemplateOut>)> {
    let t = state.publish_template(&actor, def, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(to_out(&t, actor.role))))
}

#[instrument(level = "info", skip(state), fields(actor = %actor.id))]
pub async fn http_list_templates(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ApiQuery(q): ApiQuery<TemplateQuery>,
) -> ServiceResult<Json<Vec<TemplateOut>>> {
    let templates: Vec<ChallengeTemplate> = if q.active.unwrap_or(true) {
        let as_of = supported_date(q.as_of.unwrap_or_else(|| Utc::now().date_naive()), "asOf")?;
        state.templates.active_for(as_of).await
    } else {
        state.templates.list(actor.role.can_oversee()).await
    };
    info!(target: "challenge", count = templates.len(), "HTTP templates served");
    Ok(Json(templates.iter().map(|t| to_out(t, actor.role)).collect()))
}

#[instrument(level = "info", skip(state), fields(actor = %actor.id))]
pub async fn http_get_template(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> ServiceResult<Json<TemplateOut>> {
    let t = state.templates.get(&id).await?;
    Ok(Json(to_out(&t, actor.role)))
}

#[instrument(level = "info", skip(state, def), fields(actor = %actor.id))]
pub async fn http_revise_template(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    ApiJson(def): ApiJson<TemplateDefinition>,
) -> ServiceResult<Json<TemplateOut>> {
    let t = state.revise_template(&actor, &id, def, Utc::now()).await?;
    Ok(Json(to_out(&t, actor.role)))
}

#[instrument(level = "info", skip(state), fields(actor = %actor.id))]
pub async fn http_archive_template(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> ServiceResult<Json<TemplateOut>> {
    let t = state.archive_template(&actor, &id).await?;
    Ok(Json(to_out(&t, actor.role)))
}

#[instrument(level = "info", skip(state, body), fields(actor = %actor.id, student = %body.student_id, template = %body.template_id))]
pub async fn http_save_draft(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ApiJson(body): ApiJson<DraftIn>,
) -> ServiceResult<Json<Submission>> {
    let sub = lifecycle::save_draft(
        &state,
        &actor,
        &body.student_id,
        &body.template_id,
        body.content,
        Utc::now(),
    )
    .await?;
    Ok(Json(sub))
}

#[instrument(level = "info", skip(state), fields(actor = %actor.id))]
pub async fn http_get_submission(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> ServiceResult<Json<Submission>> {
    Ok(Json(lifecycle::get_submission(&state, &actor, &id).await?))
}

#[instrument(level = "info", skip(state), fields(actor = %actor.id))]
pub async fn http_finalize(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> ServiceResult<Json<Submission>> {
    Ok(Json(lifecycle::finalize(&state, &actor, &id, Utc::now()).await?))
}

#[instrument(level = "info", skip(state, body), fields(actor = %actor.id, decision = ?body.decision))]
pub async fn http_review(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ReviewIn>,
) -> ServiceResult<Json<Submission>> {
    Ok(Json(lifecycle::review(&state, &actor, &id, body.into(), Utc::now()).await?))
}

#[instrument(level = "info", skip(state, body), fields(actor = %actor.id, flagged = body.flagged))]
pub async fn http_flag(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<FlagIn>,
) -> ServiceResult<Json<Submission>> {
    Ok(Json(lifecycle::set_flag(&state, &actor, &id, body.flagged, Utc::now()).await?))
}

#[instrument(level = "info", skip(state), fields(actor = %actor.id))]
pub async fn http_list_submissions(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ApiQuery(q): ApiQuery<SubmissionQuery>,
) -> ServiceResult<Json<Vec<Submission>>> {
    let subs = lifecycle::list_submissions(&state, &actor, &q.into()).await?;
    info!(target: "submission", count = subs.len(), "HTTP submissions listed");
    Ok(Json(subs))
}

/// Staff queue; any `status` in the query is ignored.
#[instrument(level = "info", skip(state), fields(actor = %actor.id))]
pub async fn http_pending_review(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ApiQuery(q): ApiQuery<SubmissionQuery>,
) -> ServiceResult<Json<Vec<Submission>>> {
    let queue = lifecycle::list_pending_review(&state, &actor, q.into()).await?;
    info!(target: "submission", count = queue.len(), "HTTP review queue served");
    Ok(Json(queue))
}

#[instrument(level = "info", skip(state), fields(actor = %actor.id))]
pub async fn http_student_progress(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(student_id): Path<String>,
    ApiQuery(q): ApiQuery<ProgressQuery>,
) -> ServiceResult<Json<StudentProgress>> {
    let as_of = q.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let progress = compute_progress(&state, &actor, &student_id, as_of, q.window).await?;
    Ok(Json(progress))
}
