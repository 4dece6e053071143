//! Quiz grading for Marked templates.
//!
//! Pure and deterministic: the same template and answers always give the same
//! report, which is what lets a stored score be re-checked later.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::{Answer, ChallengeTemplate, QuestionResult, TemplateKind};
use crate::error::{ServiceError, ServiceResult};

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GradeReport {
  pub score: u8,
  pub per_question: Vec<QuestionResult>,
}

/// Score `answers` against the template's answer key.
///
/// A question counts as correct only when the answer set equals the canonical
/// set (order-independent). Missing answers are simply wrong. The score is
/// `round(100 * correct / total)`.
pub fn grade(template: &ChallengeTemplate, answers: &HashMap<String, Answer>) -> ServiceResult<GradeReport> {
  if template.kind != TemplateKind::Marked {
    return Err(ServiceError::InvalidTemplate(format!(
      "template {} is {:?}, only Marked templates can be graded",
      template.id, template.kind
    )));
  }
  if template.questions.is_empty() {
    return Err(ServiceError::InvalidTemplate(format!("template {} has no questions", template.id)));
  }

  let per_question: Vec<QuestionResult> = template
    .questions
    .iter()
    .map(|q| {
      let expected = q.correct_answer.normalized(q.kind);
      let correct = answers
        .get(&q.id)
        .map(|given| given.normalized(q.kind))
        .is_some_and(|given| !expected.is_empty() && given == expected);
      QuestionResult { question_id: q.id.clone(), correct }
    })
    .collect();

  let total = per_question.len() as u32;
  let correct = per_question.iter().filter(|r| r.correct).count() as u32;
  // Half rounds up: (200c + t) / 2t == round(100c / t)
  let score = ((200 * correct + total) / (2 * total)) as u8;

  Ok(GradeReport { score, per_question })
}
