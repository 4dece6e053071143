//! Progress aggregation: streak, completion rate and average score for one
//! student, derived from their submissions. Nothing here is stored.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{Days, NaiveDate};
use tracing::{debug, instrument};

use crate::access;
use crate::domain::{Actor, ChallengeTemplate, ProgressWindow, StudentProgress, Submission, SubmissionStatus};
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use crate::store::SubmissionFilter;
use crate::util::{supported_date, week_end, week_start};

/// The `weeks` whole weeks ending with the week of `as_of`.
pub fn window_ending(as_of: NaiveDate, weeks: u32) -> ProgressWindow {
  let back = 7 * u64::from(weeks.max(1) - 1);
  ProgressWindow {
    start: week_start(as_of).checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN),
    end: week_end(as_of),
  }
}

#[instrument(level = "info", skip(state), fields(actor = %actor.id, %student_id, weeks = ?weeks))]
pub async fn compute_progress(
  state: &AppState,
  actor: &Actor,
  student_id: &str,
  as_of: NaiveDate,
  weeks: Option<u32>,
) -> ServiceResult<StudentProgress> {
  access::require_self_or_overseer(actor, student_id)?;
  supported_date(as_of, "asOf")?;
  let weeks = weeks.unwrap_or(state.progress.default_window_weeks);
  if weeks == 0 || weeks > state.progress.max_window_weeks {
    return Err(ServiceError::Validation(format!(
      "window must be between 1 and {} weeks",
      state.progress.max_window_weeks
    )));
  }

  let window = window_ending(as_of, weeks);
  let assigned = state.templates.due_between(window.start, window.end).await;
  let filter = SubmissionFilter { student_id: Some(student_id.to_string()), ..Default::default() };
  let submissions = state.submissions.list(&filter).await;

  let progress = summarize(student_id, window, &assigned, &submissions);
  debug!(
    target: "progress",
    %student_id,
    streak = progress.current_streak,
    completion = progress.completion_rate,
    "Progress computed"
  );
  Ok(progress)
}

/// Pure aggregation over the templates assigned in `window` and the student's
/// submissions. Submissions against templates outside the window are ignored.
pub fn summarize(
  student_id: &str,
  window: ProgressWindow,
  assigned: &[ChallengeTemplate],
  submissions: &[Submission],
) -> StudentProgress {
  let touched: HashSet<&str> = submissions
    .iter()
    .filter(|s| s.student_id == student_id)
    .map(|s| s.template_id.as_str())
    .collect();
  let week_of: HashMap<&str, NaiveDate> = assigned
    .iter()
    .filter(|t| window.contains(t.due_date) && counts_for(t, assigned, &touched))
    .map(|t| (t.id.as_str(), t.week_start()))
    .collect();

  let relevant: Vec<&Submission> = submissions
    .iter()
    .filter(|s| s.student_id == student_id && week_of.contains_key(s.template_id.as_str()))
    .collect();

  let completed = relevant.iter().filter(|s| s.status.is_finalized()).count();
  let approved = relevant.iter().filter(|s| s.status == SubmissionStatus::Approved).count();
  let pending_review = relevant
    .iter()
    .filter(|s| s.status == SubmissionStatus::PendingReview)
    .count();

  let scores: Vec<f64> = relevant.iter().filter_map(|s| s.score).map(f64::from).collect();
  let average_score = if scores.is_empty() {
    None
  } else {
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
  };

  let completion_rate = if week_of.is_empty() {
    0.0
  } else {
    completed as f64 / week_of.len() as f64
  };

  let assigned_weeks: BTreeSet<NaiveDate> = week_of.values().copied().collect();
  let approved_weeks: BTreeSet<NaiveDate> = relevant
    .iter()
    .filter(|s| s.status == SubmissionStatus::Approved)
    .filter_map(|s| week_of.get(s.template_id.as_str()).copied())
    .collect();
  // Weeks with nothing assigned neither count nor break the streak.
  let current_streak = assigned_weeks
    .iter()
    .rev()
    .take_while(|w| approved_weeks.contains(w))
    .count() as u32;

  StudentProgress {
    student_id: student_id.to_string(),
    window,
    current_streak,
    average_score,
    completion_rate,
    assigned: week_of.len(),
    completed,
    approved,
    pending_review,
  }
}

/// One template per revision chain: the version the student worked on, else
/// the live one. Archived templates nobody touched are not assigned.
fn counts_for(t: &ChallengeTemplate, all: &[ChallengeTemplate], touched: &HashSet<&str>) -> bool {
  if touched.contains(t.id.as_str()) {
    return true;
  }
  if !t.active {
    return false;
  }
  let mut prev = t.supersedes.as_deref();
  while let Some(id) = prev {
    if touched.contains(id) {
      return false;
    }
    prev = all.iter().find(|o| o.id == id).and_then(|o| o.supersedes.as_deref());
  }
  true
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, Utc};

  use crate::config::ProgressConfig;
  use crate::domain::{Actor, ReviewDecision, Role, SubmissionContent, TemplateKind};
  use crate::lifecycle::{finalize, review, save_draft, Review};
  use crate::templates::tests::{definition, tf_question};

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  /// Fridays of four consecutive weeks: 2026-10-02 .. 2026-10-23.
  fn week(n: i64) -> NaiveDate {
    d(2026, 10, 2) + Duration::weeks(n - 1)
  }

  fn response(text: &str) -> SubmissionContent {
    SubmissionContent::Response { text: text.into(), attachments: vec![] }
  }

  async fn approved_reflection(state: &AppState, student: &Actor, due: NaiveDate, score: Option<i64>) {
    let admin = Actor::new("admin", Role::Admin);
    let staff = Actor::new("staff", Role::Staff);
    let t = state
      .publish_template(&admin, definition(TemplateKind::Reflection, due, vec![]), Utc::now())
      .await
      .unwrap();
    let sub = save_draft(state, student, &student.id, &t.id, response("done"), Utc::now()).await.unwrap();
    finalize(state, student, &sub.id, Utc::now()).await.unwrap();
    let r = Review { decision: ReviewDecision::Approve, score, feedback: None };
    review(state, &staff, &sub.id, r, Utc::now()).await.unwrap();
  }

  #[test]
  fn window_covers_whole_weeks() {
    let w = window_ending(d(2026, 10, 21), 2);
    assert_eq!(w.start, d(2026, 10, 12));
    assert_eq!(w.end, d(2026, 10, 25));
    assert_eq!(window_ending(d(2026, 10, 21), 0), window_ending(d(2026, 10, 21), 1));
  }

  #[tokio::test]
  async fn streak_breaks_on_current_week_without_approval() {
    let state = AppState::new(ProgressConfig::default());
    let s1 = Actor::new("s1", Role::Student);
    for n in 1..=3 {
      approved_reflection(&state, &s1, week(n), None).await;
    }
    let admin = Actor::new("admin", Role::Admin);
    state
      .publish_template(&admin, definition(TemplateKind::Reflection, week(4), vec![]), Utc::now())
      .await
      .unwrap();

    let now_week4 = compute_progress(&state, &s1, "s1", week(4), None).await.unwrap();
    assert_eq!(now_week4.current_streak, 0);
    assert_eq!(now_week4.assigned, 4);
    assert_eq!(now_week4.completed, 3);
    assert!((now_week4.completion_rate - 0.75).abs() < 1e-9);

    let as_of_week3 = compute_progress(&state, &s1, "s1", week(3), None).await.unwrap();
    assert_eq!(as_of_week3.current_streak, 3);
    assert_eq!(as_of_week3.assigned, 3);
    assert!((as_of_week3.completion_rate - 1.0).abs() < 1e-9);
  }

  #[tokio::test]
  async fn weeks_without_templates_do_not_break_the_streak() {
    let state = AppState::new(ProgressConfig::default());
    let s1 = Actor::new("s1", Role::Student);
    approved_reflection(&state, &s1, week(1), None).await;
    approved_reflection(&state, &s1, week(3), None).await;
    let p = compute_progress(&state, &s1, "s1", week(4), None).await.unwrap();
    assert_eq!(p.current_streak, 2);
  }

  #[tokio::test]
  async fn average_ignores_unscored_submissions() {
    let state = AppState::new(ProgressConfig::default());
    let s1 = Actor::new("s1", Role::Student);
    let admin = Actor::new("admin", Role::Admin);

    let quiz = state
      .publish_template(
        &admin,
        definition(TemplateKind::Marked, week(2), vec![tf_question("q1", "true"), tf_question("q2", "true")]),
        Utc::now(),
      )
      .await
      .unwrap();
    let answers = SubmissionContent::Answers {
      answers: [("q1".to_string(), crate::domain::Answer::One("true".into()))].into_iter().collect(),
    };
    let sub = save_draft(&state, &s1, "s1", &quiz.id, answers, Utc::now()).await.unwrap();
    finalize(&state, &s1, &sub.id, Utc::now()).await.unwrap();

    approved_reflection(&state, &s1, week(3), Some(90)).await;
    approved_reflection(&state, &s1, week(4), None).await;

    let p = compute_progress(&state, &s1, "s1", week(4), None).await.unwrap();
    assert_eq!(p.average_score, Some(70.0));
    assert_eq!(p.approved, 3);
  }

  #[tokio::test]
  async fn empty_history_reports_zeroes() {
    let state = AppState::new(ProgressConfig::default());
    let s1 = Actor::new("s1", Role::Student);
    let p = compute_progress(&state, &s1, "s1", week(1), None).await.unwrap();
    assert_eq!(p.current_streak, 0);
    assert_eq!(p.average_score, None);
    assert_eq!(p.completion_rate, 0.0);
  }

  #[tokio::test]
  async fn pending_counts_as_completed_but_not_streak() {
    let state = AppState::new(ProgressConfig::default());
    let s1 = Actor::new("s1", Role::Student);
    let admin = Actor::new("admin", Role::Admin);
    let t = state
      .publish_template(&admin, definition(TemplateKind::HandsOn, week(1), vec![]), Utc::now())
      .await
      .unwrap();
    let sub = save_draft(&state, &s1, "s1", &t.id, response("photo"), Utc::now()).await.unwrap();
    finalize(&state, &s1, &sub.id, Utc::now()).await.unwrap();

    let p = compute_progress(&state, &s1, "s1", week(1), None).await.unwrap();
    assert_eq!(p.pending_review, 1);
    assert_eq!(p.completed, 1);
    assert_eq!(p.current_streak, 0);
  }

  #[tokio::test]
  async fn drafts_do_not_count_as_completed() {
    let state = AppState::new(ProgressConfig::default());
    let s1 = Actor::new("s1", Role::Student);
    let admin = Actor::new("admin", Role::Admin);
    let t = state
      .publish_template(&admin, definition(TemplateKind::Reflection, week(1), vec![]), Utc::now())
      .await
      .unwrap();
    save_draft(&state, &s1, "s1", &t.id, response("half"), Utc::now()).await.unwrap();
    let p = compute_progress(&state, &s1, "s1", week(1), None).await.unwrap();
    assert_eq!(p.completed, 0);
    assert_eq!(p.assigned, 1);
  }

  #[tokio::test]
  async fn other_students_and_bad_windows_are_rejected() {
    let state = AppState::new(ProgressConfig::default());
    let s2 = Actor::new("s2", Role::Student);
    assert!(matches!(
      compute_progress(&state, &s2, "s1", week(1), None).await,
      Err(ServiceError::Unauthorized(_))
    ));
    let mentor = Actor::new("m1", Role::Mentor);
    assert!(compute_progress(&state, &mentor, "s1", week(1), Some(4)).await.is_ok());
    assert!(matches!(
      compute_progress(&state, &mentor, "s1", week(1), Some(0)).await,
      Err(ServiceError::Validation(_))
    ));
    assert!(compute_progress(&state, &mentor, "s1", week(1), Some(500)).await.is_err());
  }

  #[tokio::test]
  async fn as_of_at_calendar_limits_is_a_validation_error() {
    let state = AppState::new(ProgressConfig::default());
    let s1 = Actor::new("s1", Role::Student);
    for as_of in [NaiveDate::MAX, NaiveDate::MIN] {
      assert!(matches!(
        compute_progress(&state, &s1, "s1", as_of, Some(104)).await,
        Err(ServiceError::Validation(_))
      ));
    }
    assert_eq!(window_ending(NaiveDate::MIN, 104).start, NaiveDate::MIN);
  }
  #[tokio::test]
  async fn revised_template_counts_once() {
    let state = AppState::new(ProgressConfig::default());
    let s1 = Actor::new("s1", Role::Student);
    let s2 = Actor::new("s2", Role::Student);
    let admin = Actor::new("admin", Role::Admin);
    let t = state
      .publish_template(&admin, definition(TemplateKind::Reflection, week(1), vec![]), Utc::now())
      .await
      .unwrap();
    let sub = save_draft(&state, &s1, "s1", &t.id, response("v1"), Utc::now()).await.unwrap();
    finalize(&state, &s1, &sub.id, Utc::now()).await.unwrap();
    let v2 = state
      .revise_template(&admin, &t.id, definition(TemplateKind::Reflection, week(1), vec![]), Utc::now())
      .await
      .unwrap();
    assert_ne!(v2.id, t.id);

    let p1 = compute_progress(&state, &s1, "s1", week(1), None).await.unwrap();
    assert_eq!(p1.assigned, 1);
    assert_eq!(p1.completed, 1);

    let p2 = compute_progress(&state, &s2, "s2", week(1), None).await.unwrap();
    assert_eq!(p2.assigned, 1);
    assert_eq!(p2.completed, 0);
  }
}
