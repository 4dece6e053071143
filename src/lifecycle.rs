//! Submission lifecycle: the per-submission state machine shared by the HTTP
//! handlers.
//!
//! ```text
//! Marked:              Draft -> Submitted -> Approved (graded on finalize)
//! Reflection/HandsOn:  Draft -> Submitted -> PendingReview -> Approved | Rejected
//! ```
//!
//! `finalize` and `review` are applied as conditional updates on the expected
//! current status, so a duplicate or racing call gets `InvalidState` and never
//! touches the stored score.

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::access;
use crate::domain::{
  Actor, ChallengeTemplate, QuestionKind, ReviewDecision, Submission, SubmissionContent, SubmissionStatus, TemplateKind,
};
use crate::error::{ServiceError, ServiceResult};
use crate::grader::grade;
use crate::state::AppState;
use crate::store::{NewDraft, SubmissionFilter, Transition};
use crate::util::{non_blank, trunc_for_log};

/// Staff verdict on a submission waiting for review.
#[derive(Clone, Debug)]
pub struct Review {
  pub decision: ReviewDecision,
  pub score: Option<i64>,
  pub feedback: Option<String>,
}

#[instrument(level = "info", skip(state, content), fields(actor = %actor.id, %student_id, %template_id))]
pub async fn save_draft(
  state: &AppState,
  actor: &Actor,
  student_id: &str,
  template_id: &str,
  content: SubmissionContent,
  now: DateTime<Utc>,
) -> ServiceResult<Submission> {
  access::require_student(actor, student_id)?;
  // Held until the draft is stored so a revision cannot edit the template
  // under it.
  let lease = state.templates.lease(template_id).await?;
  let template = &lease.template;
  if !template.active {
    return Err(ServiceError::InvalidState(format!("template {template_id} is archived")));
  }
  check_content(template, &content)?;

  let draft = NewDraft {
    student_id: student_id.to_string(),
    template_id: template.id.clone(),
    template_version: template.version,
    content,
  };
  let sub = state.submissions.upsert_draft(draft, now).await?;
  drop(lease);
  info!(target: "submission", id = %sub.id, %student_id, %template_id, "Draft saved");
  Ok(sub)
}

#[instrument(level = "info", skip(state), fields(actor = %actor.id, %id))]
pub async fn finalize(state: &AppState, actor: &Actor, id: &str, now: DateTime<Utc>) -> ServiceResult<Submission> {
  let sub = load(state, id).await?;
  access::require_student(actor, &sub.student_id)?;
  if sub.status != SubmissionStatus::Draft {
    return Err(ServiceError::InvalidState(format!("submission {id} is already {:?}", sub.status)));
  }
  let template = state.templates.get(&sub.template_id).await?;

  let change = match (&sub.content, template.kind) {
    (SubmissionContent::Answers { answers }, TemplateKind::Marked) => {
      let report = grade(&template, answers)?;
      Transition {
        from: SubmissionStatus::Draft,
        path: vec![SubmissionStatus::Submitted, SubmissionStatus::Approved],
        score: Some(report.score),
        results: report.per_question,
        feedback: None,
        reviewed_by: None,
        at: now,
      }
    }
    (SubmissionContent::Response { text, attachments }, TemplateKind::Reflection | TemplateKind::HandsOn) => {
      if !non_blank(text) && attachments.is_empty() {
        return Err(ServiceError::Validation("a response needs text or at least one attachment".into()));
      }
      Transition {
        from: SubmissionStatus::Draft,
        path: vec![SubmissionStatus::Submitted, SubmissionStatus::PendingReview],
        score: None,
        results: vec![],
        feedback: None,
        reviewed_by: None,
        at: now,
      }
    }
    _ => return Err(mismatch(&template)),
  };

  let sub = state.submissions.transition(id, change).await?;
  info!(target: "submission", %id, status = ?sub.status, score = ?sub.score, "Submission finalized");
  Ok(sub)
}

#[instrument(level = "info", skip(state, review), fields(actor = %actor.id, %id, decision = ?review.decision))]
pub async fn review(
  state: &AppState,
  actor: &Actor,
  id: &str,
  review: Review,
  now: DateTime<Utc>,
) -> ServiceResult<Submission> {
  access::require_reviewer(actor)?;
  let sub = load(state, id).await?;
  if sub.status != SubmissionStatus::PendingReview {
    return Err(ServiceError::InvalidState(format!(
      "submission {id} is {:?}, only PendingReview can be reviewed",
      sub.status
    )));
  }

  let score = match review.score {
    None => None,
    Some(s) if (0..=100).contains(&s) => Some(s as u8),
    Some(s) => return Err(ServiceError::Validation(format!("score {s} is outside 0..=100"))),
  };
  let feedback = review.feedback.map(|f| f.trim().to_string()).filter(|f| !f.is_empty());
  let status = match review.decision {
    ReviewDecision::Approve => SubmissionStatus::Approved,
    ReviewDecision::Reject if feedback.is_none() => {
      return Err(ServiceError::Validation("rejecting a submission requires feedback".into()));
    }
    ReviewDecision::Reject => SubmissionStatus::Rejected,
  };

  let change = Transition {
    from: SubmissionStatus::PendingReview,
    path: vec![status],
    score,
    results: vec![],
    feedback,
    reviewed_by: Some(actor.id.clone()),
    at: now,
  };
  let sub = state.submissions.transition(id, change).await?;
  info!(
    target: "submission",
    %id,
    status = ?sub.status,
    score = ?sub.score,
    feedback = %sub.feedback.as_deref().map(|f| trunc_for_log(f, 80)).unwrap_or_default(),
    "Submission reviewed"
  );
  Ok(sub)
}

/// Flag or unflag for escalation. Allowed in every status.
#[instrument(level = "info", skip(state), fields(actor = %actor.id, %id, %flagged))]
pub async fn set_flag(
  state: &AppState,
  actor: &Actor,
  id: &str,
  flagged: bool,
  now: DateTime<Utc>,
) -> ServiceResult<Submission> {
  access::require_reviewer(actor)?;
  let sub = state.submissions.set_flag(id, flagged, now).await?;
  info!(target: "submission", %id, %flagged, "Flag updated");
  Ok(sub)
}

pub async fn get_submission(state: &AppState, actor: &Actor, id: &str) -> ServiceResult<Submission> {
  let sub = load(state, id).await?;
  access::require_self_or_overseer(actor, &sub.student_id)?;
  Ok(sub)
}

#[instrument(level = "debug", skip(state), fields(actor = %actor.id))]
pub async fn list_submissions(
  state: &AppState,
  actor: &Actor,
  filter: &SubmissionFilter,
) -> ServiceResult<Vec<Submission>> {
  access::require_reviewer(actor)?;
  Ok(state.submissions.list(filter).await)
}

/// Staff review queue, oldest submission first.
pub async fn list_pending_review(
  state: &AppState,
  actor: &Actor,
  filter: SubmissionFilter,
) -> ServiceResult<Vec<Submission>> {
  let filter = SubmissionFilter { status: Some(SubmissionStatus::PendingReview), ..filter };
  list_submissions(state, actor, &filter).await
}

async fn load(state: &AppState, id: &str) -> ServiceResult<Submission> {
  state
    .submissions
    .get(id)
    .await
    .ok_or_else(|| ServiceError::not_found("submission", id))
}

/// Payload must fit the template: answers to known questions for Marked,
/// a text/attachment response otherwise.
fn check_content(template: &ChallengeTemplate, content: &SubmissionContent) -> ServiceResult<()> {
  match (content, template.kind) {
    (SubmissionContent::Answers { answers }, TemplateKind::Marked) => {
      for (qid, answer) in answers {
        let q = template
          .question(qid)
          .ok_or_else(|| ServiceError::Validation(format!("template {} has no question '{qid}'", template.id)))?;
        if q.kind != QuestionKind::MultiSelect && answer.values().len() > 1 {
          return Err(ServiceError::Validation(format!("question '{qid}' takes a single answer")));
        }
      }
      Ok(())
    }
    (SubmissionContent::Response { attachments, .. }, TemplateKind::Reflection | TemplateKind::HandsOn) => {
      if attachments.iter().any(|a| !non_blank(a)) {
        return Err(ServiceError::Validation("attachment references must not be blank".into()));
      }
      Ok(())
    }
    _ => Err(mismatch(template)),
  }
}

fn mismatch(template: &ChallengeTemplate) -> ServiceError {
  let expected = if template.kind.is_autograded() { "answers" } else { "a response" };
  ServiceError::Validation(format!("{:?} template {} expects {expected}", template.kind, template.id))
}
