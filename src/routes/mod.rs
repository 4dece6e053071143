//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod identity;

/// Build the application router with:
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers); the identity proxy sits in front
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        // Templates
        .route(
            "/api/v1/templates",
            get(http::http_list_templates).post(http::http_create_template),
        )
        .route(
            "/api/v1/templates/:id",
            get(http::http_get_template).put(http::http_revise_template),
        )
        .route("/api/v1/templates/:id/archive", post(http::http_archive_template))
        // Submissions
        .route("/api/v1/submissions", get(http::http_list_submissions))
        .route("/api/v1/submissions/pending", get(http::http_pending_review))
        .route("/api/v1/submissions/draft", post(http::http_save_draft))
        .route("/api/v1/submissions/:id", get(http::http_get_submission))
        .route("/api/v1/submissions/:id/finalize", post(http::http_finalize))
        .route("/api/v1/submissions/:id/review", post(http::http_review))
        .route("/api/v1/submissions/:id/flag", post(http::http_flag))
        // Progress
        .route("/api/v1/students/:id/progress", get(http::http_student_progress))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::ProgressConfig;
    use crate::routes::identity::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};

    fn app() -> Router {
        build_router(Arc::new(AppState::new(ProgressConfig::default())))
    }

    async fn call(app: &Router, method: &str, uri: &str, who: Option<(&str, &str)>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some((id, role)) = who {
            req = req.header(ACTOR_ID_HEADER, id).header(ACTOR_ROLE_HEADER, role);
        }
        let req = match body {
            Some(b) => req
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    const ADMIN: Option<(&str, &str)> = Some(("admin-1", "admin"));
    const STAFF: Option<(&str, &str)> = Some(("staff-1", "staff"));
    const STUDENT: Option<(&str, &str)> = Some(("s1", "student"));

    fn due_this_week() -> String {
        Utc::now().date_naive().to_string()
    }

    #[tokio::test]
    async fn health_check_returns_ok_json() {
        let (status, json) = call(&app(), "GET", "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn quiz_flow_over_http() {
        let app = app();
        let quiz = json!({
            "title": "True or false",
            "description": "One question",
            "kind": "Marked",
            "dueDate": due_this_week(),
            "questions": [{ "id": "q1", "prompt": "Sky is blue", "kind": "TrueFalse", "correctAnswer": "true" }]
        });
        let (status, created) = call(&app, "POST", "/api/v1/templates", ADMIN, Some(quiz)).await;
        assert_eq!(status, StatusCode::CREATED);
        let tid = created["id"].as_str().unwrap().to_string();

        let (status, listed) = call(&app, "GET", "/api/v1/templates?active=true", STUDENT, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert!(listed[0]["questions"][0].get("correctAnswer").is_none());

        let draft = json!({
            "studentId": "s1",
            "templateId": tid,
            "content": { "type": "answers", "answers": { "q1": "true" } }
        });
        let (status, sub) = call(&app, "POST", "/api/v1/submissions/draft", STUDENT, Some(draft)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sub["status"], "Draft");
        let sid = sub["id"].as_str().unwrap().to_string();

        let uri = format!("/api/v1/submissions/{sid}/finalize");
        let (status, done) = call(&app, "POST", &uri, STUDENT, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["status"], "Approved");
        assert_eq!(done["score"], 100);

        let (status, err) = call(&app, "POST", &uri, STUDENT, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["kind"], "InvalidState");
    }

    #[tokio::test]
    async fn reflection_review_flow_over_http() {
        let app = app();
        let prompt = json!({
            "title": "Reflect",
            "description": "Write about your week",
            "kind": "Reflection",
            "dueDate": due_this_week()
        });
        let (_, created) = call(&app, "POST", "/api/v1/templates", ADMIN, Some(prompt)).await;
        let tid = created["id"].as_str().unwrap().to_string();

        let draft = json!({
            "studentId": "s1",
            "templateId": tid,
            "payload": { "type": "response", "text": "It went well", "attachments": ["doc://42"] }
        });
        let (_, sub) = call(&app, "POST", "/api/v1/submissions/draft", STUDENT, Some(draft)).await;
        let sid = sub["id"].as_str().unwrap().to_string();
        let (_, pending) = call(&app, "POST", &format!("/api/v1/submissions/{sid}/finalize"), STUDENT, None).await;
        assert_eq!(pending["status"], "PendingReview");

        let (status, queue) = call(&app, "GET", "/api/v1/submissions?status=PendingReview", STAFF, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(queue.as_array().unwrap().len(), 1);

        let (status, pending_only) = call(&app, "GET", "/api/v1/submissions/pending?studentId=s1", STAFF, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pending_only[0]["id"], sid.as_str());

        let (status, err) = call(&app, "GET", "/api/v1/submissions?status=PendingReview", STUDENT, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(err["kind"], "Unauthorized");

        let (status, flagged) = call(
            &app,
            "POST",
            &format!("/api/v1/submissions/{sid}/flag"),
            STAFF,
            Some(json!({ "flagged": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(flagged["flagged"], true);

        let review_uri = format!("/api/v1/submissions/{sid}/review");
        let (status, err) = call(&app, "POST", &review_uri, STAFF, Some(json!({ "decision": "Reject" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err["kind"], "ValidationError");

        let (status, rejected) = call(
            &app,
            "POST",
            &review_uri,
            STAFF,
            Some(json!({ "decision": "Reject", "feedback": "needs detail" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rejected["status"], "Rejected");
        assert_eq!(rejected["feedback"], "needs detail");
        assert_eq!(rejected["flagged"], true);

        let (status, progress) = call(&app, "GET", "/api/v1/students/s1/progress?window=4", STUDENT, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(progress["completed"], 1);
        assert_eq!(progress["currentStreak"], 0);
    }

    #[tokio::test]
    async fn typed_errors_for_identity_and_payloads() {
        let app = app();
        let (status, err) = call(&app, "GET", "/api/v1/templates", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(err["kind"], "Unauthorized");

        let (status, err) = call(&app, "GET", "/api/v1/templates", Some(("x", "wizard")), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(err["kind"], "Unauthorized");

        let bad = json!({ "title": "", "description": "d", "kind": "Reflection", "dueDate": due_this_week() });
        let (status, err) = call(&app, "POST", "/api/v1/templates", ADMIN, Some(bad)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err["kind"], "ValidationError");

        let (status, err) = call(&app, "POST", "/api/v1/templates", ADMIN, Some(json!({ "kind": 3 }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err["kind"], "ValidationError");

        let (status, err) = call(&app, "GET", "/api/v1/submissions/nope", STAFF, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["kind"], "NotFound");

        let (status, err) = call(&app, "GET", "/api/v1/templates?asOf=yesterday", STUDENT, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err["kind"], "ValidationError");
    }

    #[tokio::test]
    async fn active_listing_respects_as_of() {
        let app = app();
        let next_week = (Utc::now().date_naive() + Duration::weeks(1)).to_string();
        let prompt = json!({ "title": "Later", "description": "d", "kind": "HandsOn", "dueDate": next_week });
        call(&app, "POST", "/api/v1/templates", ADMIN, Some(prompt)).await;

        let (_, now) = call(&app, "GET", "/api/v1/templates", STUDENT, None).await;
        assert!(now.as_array().unwrap().is_empty());
        let (_, later) = call(&app, "GET", &format!("/api/v1/templates?asOf={next_week}"), STUDENT, None).await;
        assert_eq!(later.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn already_finalized_maps_to_conflict() {
        let app = app();
        let prompt = json!({ "title": "R", "description": "d", "kind": "Reflection", "dueDate": due_this_week() });
        let (_, created) = call(&app, "POST", "/api/v1/templates", ADMIN, Some(prompt)).await;
        let draft = json!({
            "studentId": "s1",
            "templateId": created["id"],
            "content": { "type": "response", "text": "done" }
        });
        let (_, sub) = call(&app, "POST", "/api/v1/submissions/draft", STUDENT, Some(draft.clone())).await;
        let sid = sub["id"].as_str().unwrap().to_string();
        call(&app, "POST", &format!("/api/v1/submissions/{sid}/finalize"), STUDENT, None).await;

        let (status, err) = call(&app, "POST", "/api/v1/submissions/draft", STUDENT, Some(draft)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["kind"], "AlreadyFinalized");
    }
    #[tokio::test]
    async fn revise_and_archive_over_http() {
        let app = app();
        let prompt = json!({ "title": "Draft title", "description": "d", "kind": "Reflection", "dueDate": due_this_week() });
        let (_, created) = call(&app, "POST", "/api/v1/templates", ADMIN, Some(prompt)).await;
        let tid = created["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/templates/{tid}");

        let edit = json!({ "title": "Final title", "description": "d", "kind": "Reflection", "dueDate": due_this_week() });
        let (status, err) = call(&app, "PUT", &uri, STUDENT, Some(edit.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(err["kind"], "Unauthorized");

        let (status, revised) = call(&app, "PUT", &uri, ADMIN, Some(edit.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(revised["id"], tid.as_str());
        assert_eq!(revised["version"], 2);
        assert_eq!(revised["title"], "Final title");

        let (status, archived) = call(&app, "POST", &format!("{uri}/archive"), ADMIN, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(archived["active"], false);
        let (status, _) = call(&app, "POST", &format!("{uri}/archive"), ADMIN, None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, listed) = call(&app, "GET", "/api/v1/templates", STUDENT, None).await;
        assert!(listed.as_array().unwrap().is_empty());

        let (status, err) = call(&app, "PUT", &uri, ADMIN, Some(edit)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["kind"], "InvalidState");

        let (status, _) = call(&app, "POST", "/api/v1/templates/nope/archive", ADMIN, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn extreme_dates_are_validation_errors() {
        let app = app();
        let ancient = json!({ "title": "Old", "description": "d", "kind": "Reflection", "dueDate": "-262143-01-01" });
        let (status, err) = call(&app, "POST", "/api/v1/templates", ADMIN, Some(ancient)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err["kind"], "ValidationError");

        let (status, listed) = call(&app, "GET", "/api/v1/templates", STUDENT, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(listed.as_array().unwrap().is_empty());

        let (status, err) = call(&app, "GET", "/api/v1/templates?asOf=%2B262142-12-31", STUDENT, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err["kind"], "ValidationError");

        let (status, err) = call(&app, "GET", "/api/v1/students/s1/progress?asOf=%2B262142-12-31", STUDENT, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err["kind"], "ValidationError");
    }
}
