//! Domain models used by the backend: templates and their questions, submissions,
//! actors and the derived progress view.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// How a challenge is completed and assessed.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TemplateKind {
  /// Quiz with an answer key, graded on finalize.
  Marked,
  /// Open-ended written reflection, reviewed by staff.
  Reflection,
  /// Practical task with attachments, reviewed by staff.
  HandsOn,
}

impl TemplateKind {
  pub fn is_autograded(self) -> bool {
    matches!(self, TemplateKind::Marked)
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Difficulty {
  #[default]
  Beginner,
  Intermediate,
  Advanced,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum QuestionKind {
  MultipleChoice,
  MultiSelect,
  TrueFalse,
  ShortAnswer,
}

/// A single value (`"b"`) or a set of values (`["a", "c"]`).
/// Used both for canonical answers and for what a student picked.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Answer {
  One(String),
  Many(Vec<String>),
}

impl Answer {
  pub fn values(&self) -> Vec<&str> {
    match self {
      Answer::One(v) => vec![v.as_str()],
      Answer::Many(vs) => vs.iter().map(String::as_str).collect(),
    }
  }

  /// Comparable form: trimmed, empty entries dropped, order removed.
  /// Short answers are compared without ASCII case.
  pub fn normalized(&self, kind: QuestionKind) -> BTreeSet<String> {
    self
      .values()
      .into_iter()
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(|v| match kind {
        QuestionKind::ShortAnswer => v.to_ascii_lowercase(),
        _ => v.to_string(),
      })
      .collect()
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub id: String,
  pub prompt: String,
  pub kind: QuestionKind,
  #[serde(default)] pub options: Vec<String>,
  pub correct_answer: Answer,
  #[serde(default)] pub explanation: String,
}

/// What an admin sends to publish or revise a template.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDefinition {
  pub title: String,
  pub description: String,
  pub kind: TemplateKind,
  #[serde(default)] pub intelligence_tag: String,
  #[serde(default)] pub difficulty: Difficulty,
  pub due_date: NaiveDate,
  #[serde(default)] pub questions: Vec<Question>,
}

/// Published challenge. Never mutated once a submission references it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeTemplate {
  pub id: String,
  pub version: u32,
  #[serde(default)] pub supersedes: Option<String>,
  pub title: String,
  pub description: String,
  pub kind: TemplateKind,
  pub intelligence_tag: String,
  pub difficulty: Difficulty,
  pub due_date: NaiveDate,
  pub active: bool,
  #[serde(default)] pub questions: Vec<Question>,
  pub created_at: DateTime<Utc>,
  pub created_by: String,
}

impl ChallengeTemplate {
  /// Monday of the week this challenge belongs to.
  pub fn week_start(&self) -> NaiveDate {
    crate::util::week_start(self.due_date)
  }

  pub fn question(&self, id: &str) -> Option<&Question> {
    self.questions.iter().find(|q| q.id == id)
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SubmissionStatus {
  Draft,
  Submitted,
  PendingReview,
  Approved,
  Rejected,
}

impl SubmissionStatus {
  /// Anything past Draft counts as finalized by the student.
  pub fn is_finalized(self) -> bool {
    !matches!(self, SubmissionStatus::Draft)
  }
}

/// Student payload. Marked templates take answers; the rest take a response.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubmissionContent {
  Answers {
    #[serde(default)]
    answers: HashMap<String, Answer>,
  },
  Response {
    #[serde(default)]
    text: String,
    /// Opaque references into external document storage.
    #[serde(default)]
    attachments: Vec<String>,
  },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
  pub question_id: String,
  pub correct: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
  pub status: SubmissionStatus,
  pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
  pub id: String,
  pub template_id: String,
  pub template_version: u32,
  pub student_id: String,
  pub content: SubmissionContent,
  pub status: SubmissionStatus,
  pub score: Option<u8>,
  #[serde(default)] pub results: Vec<QuestionResult>,
  pub feedback: Option<String>,
  pub flagged: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub submitted_at: Option<DateTime<Utc>>,
  pub reviewed_at: Option<DateTime<Utc>>,
  pub reviewed_by: Option<String>,
  /// Every status this submission has been in, oldest first.
  #[serde(default)] pub history: Vec<StatusChange>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReviewDecision {
  Approve,
  Reject,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Student,
  Mentor,
  Staff,
  Admin,
}

impl Role {
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "student" => Some(Role::Student),
      "mentor" => Some(Role::Mentor),
      "staff" | "ssa" => Some(Role::Staff),
      "admin" => Some(Role::Admin),
      _ => None,
    }
  }

  /// Staff and admins can review and flag.
  pub fn can_review(self) -> bool {
    matches!(self, Role::Staff | Role::Admin)
  }

  /// Roles allowed to read other students' work and progress.
  pub fn can_oversee(self) -> bool {
    !matches!(self, Role::Student)
  }
}

/// Authenticated caller as reported by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
  pub id: String,
  pub role: Role,
}

impl Actor {
  pub fn new(id: impl Into<String>, role: Role) -> Self {
    Self { id: id.into(), role }
  }
}

/// Inclusive date range the progress view is computed over.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressWindow {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

impl ProgressWindow {
  pub fn contains(&self, d: NaiveDate) -> bool {
    self.start <= d && d <= self.end
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
  pub student_id: String,
  pub window: ProgressWindow,
  pub current_streak: u32,
  pub average_score: Option<f64>,
  pub completion_rate: f64,
  pub assigned: usize,
  pub completed: usize,
  pub approved: usize,
  pub pending_review: usize,
}
