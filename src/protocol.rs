//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Answer, ChallengeTemplate, Difficulty, QuestionKind, ReviewDecision, Role, SubmissionContent,
    SubmissionStatus, TemplateKind,
};
use crate::lifecycle::Review;
use crate::store::SubmissionFilter;

/// DTO used for template delivery. Students get it without the answer key.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateOut {
    pub id: String,
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,
    pub title: String,
    pub description: String,
    pub kind: TemplateKind,
    pub intelligence_tag: String,
    pub difficulty: Difficulty,
    pub due_date: NaiveDate,
    pub active: bool,
    pub questions: Vec<QuestionOut>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
    pub id: String,
    pub prompt: String,
    pub kind: QuestionKind,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<Answer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Convert a full `ChallengeTemplate` to the public DTO for `role`.
pub fn to_out(t: &ChallengeTemplate, role: Role) -> TemplateOut {
    let with_key = role != Role::Student;
    TemplateOut {
        id: t.id.clone(),
        version: t.version,
        supersedes: t.supersedes.clone(),
        title: t.title.clone(),
        description: t.description.clone(),
        kind: t.kind,
        intelligence_tag: t.intelligence_tag.clone(),
        difficulty: t.difficulty,
        due_date: t.due_date,
        active: t.active,
        questions: t
            .questions
            .iter()
            .map(|q| QuestionOut {
                id: q.id.clone(),
                prompt: q.prompt.clone(),
                kind: q.kind,
                options: q.options.clone(),
                correct_answer: with_key.then(|| q.correct_answer.clone()),
                explanation: with_key.then(|| q.explanation.clone()),
            })
            .collect(),
        created_at: t.created_at,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateQuery {
    pub active: Option<bool>,
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftIn {
    pub student_id: String,
    pub template_id: String,
    #[serde(alias = "payload")]
    pub content: SubmissionContent,
}

#[derive(Debug, Deserialize)]
pub struct ReviewIn {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl From<ReviewIn> for Review {
    fn from(r: ReviewIn) -> Self {
        Review { decision: r.decision, score: r.score, feedback: r.feedback }
    }
}

#[derive(Debug, Deserialize)]
pub struct FlagIn {
    pub flagged: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionQuery {
    pub status: Option<SubmissionStatus>,
    pub template_id: Option<String>,
    pub student_id: Option<String>,
    pub flagged: Option<bool>,
}

impl From<SubmissionQuery> for SubmissionFilter {
    fn from(q: SubmissionQuery) -> Self {
        SubmissionFilter {
            status: q.status,
            template_id: q.template_id,
            student_id: q.student_id,
            flagged: q.flagged,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressQuery {
    pub as_of: Option<NaiveDate>,
    /// Window length in weeks.
    pub window: Option<u32>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
