//! Submission storage seam.
//!
//! Any backing store must honour two rules: one submission per
//! (student, template) pair, and writes to a single submission applied as a
//! conditional update on its current status so racing writers cannot both win.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{QuestionResult, StatusChange, Submission, SubmissionContent, SubmissionStatus};
use crate::error::{ServiceError, ServiceResult};

#[derive(Clone, Debug, Default)]
pub struct SubmissionFilter {
    pub status: Option<SubmissionStatus>,
    pub template_id: Option<String>,
    pub student_id: Option<String>,
    pub flagged: Option<bool>,
}

impl SubmissionFilter {
    pub fn matches(&self, s: &Submission) -> bool {
        self.status.map_or(true, |st| s.status == st)
            && self.template_id.as_ref().map_or(true, |t| &s.template_id == t)
            && self.student_id.as_ref().map_or(true, |id| &s.student_id == id)
            && self.flagged.map_or(true, |f| s.flagged == f)
    }
}

#[derive(Clone, Debug)]
pub struct NewDraft {
    pub student_id: String,
    pub template_id: String,
    pub template_version: u32,
    pub content: SubmissionContent,
}

/// A status change applied in one step. `path` lists every status entered, in
/// order; the last one is where the submission ends up.
#[derive(Clone, Debug)]
pub struct Transition {
    pub from: SubmissionStatus,
    pub path: Vec<SubmissionStatus>,
    pub score: Option<u8>,
    pub results: Vec<QuestionResult>,
    pub feedback: Option<String>,
    pub reviewed_by: Option<String>,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Create the Draft for the pair or replace the content of the existing
    /// one. Fails with `AlreadyFinalized` once the pair is past Draft.
    async fn upsert_draft(&self, draft: NewDraft, now: DateTime<Utc>) -> ServiceResult<Submission>;

    async fn get(&self, id: &str) -> Option<Submission>;

    /// Apply `change` only if the submission is still in `change.from`.
    async fn transition(&self, id: &str, change: Transition) -> ServiceResult<Submission>;

    async fn set_flag(&self, id: &str, flagged: bool, now: DateTime<Utc>) -> ServiceResult<Submission>;

    async fn list(&self, filter: &SubmissionFilter) -> Vec<Submission>;

    async fn references_template(&self, template_id: &str) -> bool;
}

#[derive(Default)]
struct Tables {
    by_id: HashMap<String, Submission>,
    by_pair: HashMap<(String, String), String>,
}

/// In-memory store. Every write runs inside one write-lock section.
#[derive(Default)]
pub struct MemorySubmissionStore {
    tables: RwLock<Tables>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    #[instrument(level = "debug", skip(self, draft), fields(student = %draft.student_id, template = %draft.template_id))]
    async fn upsert_draft(&self, draft: NewDraft, now: DateTime<Utc>) -> ServiceResult<Submission> {
        let mut tables = self.tables.write().await;
        let key = (draft.student_id.clone(), draft.template_id.clone());

        if let Some(id) = tables.by_pair.get(&key).cloned() {
            let existing = tables
                .by_id
                .get_mut(&id)
                .ok_or_else(|| ServiceError::not_found("submission", id.as_str()))?;
            if existing.status.is_finalized() {
                return Err(ServiceError::AlreadyFinalized(format!(
                    "student {} already finalized template {}",
                    draft.student_id, draft.template_id
                )));
            }
            existing.content = draft.content;
            existing.updated_at = now;
            debug!(target: "submission", %id, "Draft updated");
            return Ok(existing.clone());
        }

        let sub = Submission {
            id: Uuid::new_v4().to_string(),
            template_id: draft.template_id,
            template_version: draft.template_version,
            student_id: draft.student_id,
            content: draft.content,
            status: SubmissionStatus::Draft,
            score: None,
            results: vec![],
            feedback: None,
            flagged: false,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            reviewed_at: None,
            reviewed_by: None,
            history: vec![StatusChange { status: SubmissionStatus::Draft, at: now }],
        };
        tables.by_pair.insert(key, sub.id.clone());
        tables.by_id.insert(sub.id.clone(), sub.clone());
        debug!(target: "submission", id = %sub.id, "Draft created");
        Ok(sub)
    }

    async fn get(&self, id: &str) -> Option<Submission> {
        self.tables.read().await.by_id.get(id).cloned()
    }

    #[instrument(level = "debug", skip(self, change), fields(%id, from = ?change.from))]
    async fn transition(&self, id: &str, change: Transition) -> ServiceResult<Submission> {
        let mut tables = self.tables.write().await;
        let sub = tables
            .by_id
            .get_mut(id)
            .ok_or_else(|| ServiceError::not_found("submission", id))?;
        if sub.status != change.from {
            return Err(ServiceError::InvalidState(format!(
                "submission {id} is {:?}, expected {:?}",
                sub.status, change.from
            )));
        }
        let Some(&last) = change.path.last() else {
            return Err(ServiceError::InvalidState(format!("empty transition for submission {id}")));
        };

        for status in &change.path {
            if *status == SubmissionStatus::Submitted {
                sub.submitted_at = Some(change.at);
            }
            sub.history.push(StatusChange { status: *status, at: change.at });
        }
        sub.status = last;
        if change.score.is_some() {
            sub.score = change.score;
        }
        if !change.results.is_empty() {
            sub.results = change.results;
        }
        if change.feedback.is_some() {
            sub.feedback = change.feedback;
        }
        if change.reviewed_by.is_some() {
            sub.reviewed_by = change.reviewed_by;
            sub.reviewed_at = Some(change.at);
        }
        sub.updated_at = change.at;
        Ok(sub.clone())
    }

    async fn set_flag(&self, id: &str, flagged: bool, now: DateTime<Utc>) -> ServiceResult<Submission> {
        let mut tables = self.tables.write().await;
        let sub = tables
            .by_id
            .get_mut(id)
            .ok_or_else(|| ServiceError::not_found("submission", id))?;
        sub.flagged = flagged;
        sub.updated_at = now;
        Ok(sub.clone())
    }

    async fn list(&self, filter: &SubmissionFilter) -> Vec<Submission> {
        let tables = self.tables.read().await;
        let mut out: Vec<Submission> = tables
            .by_id
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.submitted_at
                .unwrap_or(a.created_at)
                .cmp(&b.submitted_at.unwrap_or(b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    async fn references_template(&self, template_id: &str) -> bool {
        let tables = self.tables.read().await;
        tables.by_pair.keys().any(|(_, t)| t == template_id)
    }
}
