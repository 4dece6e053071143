//! Template store: published challenge definitions keyed by id and week.
//!
//! The store trusts its caller; role checks happen in the service layer before
//! any mutating call lands here.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{Answer, ChallengeTemplate, Question, QuestionKind, TemplateDefinition, TemplateKind};
use crate::error::{ServiceError, ServiceResult};
use crate::store::SubmissionStore;
use crate::util::{non_blank, same_week, supported_date};

type Templates = HashMap<String, ChallengeTemplate>;

#[derive(Clone, Default)]
pub struct TemplateStore {
    by_id: Arc<RwLock<Templates>>,
}

/// A template snapshot that keeps revisions out until it is dropped.
pub struct TemplateLease {
    _guard: OwnedRwLockReadGuard<Templates>,
    pub template: ChallengeTemplate,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and publish a new template (version 1).
    #[instrument(level = "info", skip(self, def), fields(title = %def.title, kind = ?def.kind))]
    pub async fn create(
        &self,
        def: TemplateDefinition,
        created_by: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<ChallengeTemplate> {
        let def = validate_definition(def)?;
        let template = build(Uuid::new_v4().to_string(), 1, None, def, created_by, now);
        self.by_id
            .write()
            .await
            .insert(template.id.clone(), template.clone());
        info!(target: "challenge", id = %template.id, due = %template.due_date, "Template published");
        Ok(template)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<ChallengeTemplate> {
        self.by_id
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("template", id))
    }

    /// Like `get`, but `revise` waits until the lease is dropped. Hold it while
    /// storing a submission against the template.
    pub async fn lease(&self, id: &str) -> ServiceResult<TemplateLease> {
        let guard = self.by_id.clone().read_owned().await;
        let template = guard
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("template", id))?;
        Ok(TemplateLease { _guard: guard, template })
    }

    /// Active templates whose due week contains `as_of`.
    #[instrument(level = "debug", skip(self))]
    pub async fn active_for(&self, as_of: NaiveDate) -> Vec<ChallengeTemplate> {
        let by_id = self.by_id.read().await;
        sorted(
            by_id
                .values()
                .filter(|t| t.active && same_week(t.due_date, as_of))
                .cloned(),
        )
    }

    pub async fn list(&self, include_archived: bool) -> Vec<ChallengeTemplate> {
        let by_id = self.by_id.read().await;
        sorted(
            by_id
                .values()
                .filter(|t| include_archived || t.active)
                .cloned(),
        )
    }

    /// Every template (archived included) due within `[start, end]`.
    pub async fn due_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<ChallengeTemplate> {
        let by_id = self.by_id.read().await;
        sorted(
            by_id
                .values()
                .filter(|t| start <= t.due_date && t.due_date <= end)
                .cloned(),
        )
    }

    /// Take a template out of the active set. Archiving twice is a no-op.
    #[instrument(level = "info", skip(self))]
    pub async fn archive(&self, id: &str) -> ServiceResult<ChallengeTemplate> {
        let mut by_id = self.by_id.write().await;
        let t = by_id
            .get_mut(id)
            .ok_or_else(|| ServiceError::not_found("template", id))?;
        if t.active {
            t.active = false;
            info!(target: "challenge", %id, "Template archived");
        }
        Ok(t.clone())
    }

    /// Apply an edit. Unreferenced templates are replaced in place; referenced
    /// ones stay untouched (but archived) and the edit becomes a new template
    /// that points back at them.
    ///
    /// References are checked under the write lock, so no draft can be stored
    /// against `id` between the check and the edit.
    #[instrument(level = "info", skip(self, def, submissions), fields(%id))]
    pub async fn revise(
        &self,
        id: &str,
        def: TemplateDefinition,
        submissions: &dyn SubmissionStore,
        revised_by: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<ChallengeTemplate> {
        let def = validate_definition(def)?;
        let mut by_id = self.by_id.write().await;
        if !by_id.contains_key(id) {
            return Err(ServiceError::not_found("template", id));
        }
        let referenced = submissions.references_template(id).await;
        let current = by_id
            .get_mut(id)
            .ok_or_else(|| ServiceError::not_found("template", id))?;
        if !current.active {
            return Err(ServiceError::InvalidState(format!("template {id} is archived")));
        }

        let version = current.version + 1;
        if !referenced {
            let updated = build(id.to_string(), version, current.supersedes.clone(), def, revised_by, now);
            *current = updated.clone();
            info!(target: "challenge", %id, version, "Template edited in place");
            return Ok(updated);
        }

        current.active = false;
        let next = build(Uuid::new_v4().to_string(), version, Some(id.to_string()), def, revised_by, now);
        by_id.insert(next.id.clone(), next.clone());
        info!(target: "challenge", old = %id, new = %next.id, version, "Template revised as new version");
        Ok(next)
    }
}

fn build(
    id: String,
    version: u32,
    supersedes: Option<String>,
    def: TemplateDefinition,
    created_by: &str,
    now: DateTime<Utc>,
) -> ChallengeTemplate {
    ChallengeTemplate {
        id,
        version,
        supersedes,
        title: def.title,
        description: def.description,
        kind: def.kind,
        intelligence_tag: def.intelligence_tag,
        difficulty: def.difficulty,
        due_date: def.due_date,
        active: true,
        questions: def.questions,
        created_at: now,
        created_by: created_by.to_string(),
    }
}

fn sorted(it: impl Iterator<Item = ChallengeTemplate>) -> Vec<ChallengeTemplate> {
    let mut out: Vec<ChallengeTemplate> = it.collect();
    out.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.id.cmp(&b.id))
    });
    out
}

/// Check a definition and return it in canonical form (trimmed text,
/// TrueFalse options filled in).
pub fn validate_definition(mut def: TemplateDefinition) -> ServiceResult<TemplateDefinition> {
    def.title = def.title.trim().to_string();
    def.description = def.description.trim().to_string();
    def.intelligence_tag = def.intelligence_tag.trim().to_string();
    if def.title.is_empty() {
        return Err(invalid("title must not be empty"));
    }
    if def.description.is_empty() {
        return Err(invalid("description must not be empty"));
    }
    supported_date(def.due_date, "dueDate")?;

    match def.kind {
        TemplateKind::Marked => {
            if def.questions.is_empty() {
                return Err(invalid("a Marked template needs at least one question"));
            }
            let mut seen = BTreeSet::new();
            for q in def.questions.iter_mut() {
                validate_question(q)?;
                if !seen.insert(q.id.clone()) {
                    return Err(invalid(format!("duplicate question id '{}'", q.id)));
                }
            }
        }
        TemplateKind::Reflection | TemplateKind::HandsOn => {
            if !def.questions.is_empty() {
                return Err(invalid(format!("a {:?} template cannot carry questions", def.kind)));
            }
        }
    }
    Ok(def)
}

fn validate_question(q: &mut Question) -> ServiceResult<()> {
    q.id = q.id.trim().to_string();
    if q.id.is_empty() {
        return Err(invalid("question id must not be empty"));
    }
    if !non_blank(&q.prompt) {
        return Err(invalid(format!("question '{}' has an empty prompt", q.id)));
    }
    q.options = q.options.iter().map(|o| o.trim().to_string()).collect();
    if q.options.iter().any(|o| o.is_empty()) {
        return Err(invalid(format!("question '{}' has an empty option", q.id)));
    }
    let distinct: BTreeSet<&str> = q.options.iter().map(String::as_str).collect();
    if distinct.len() != q.options.len() {
        return Err(invalid(format!("question '{}' repeats an option", q.id)));
    }

    let correct = q.correct_answer.normalized(q.kind);
    if correct.is_empty() {
        return Err(invalid(format!("question '{}' has no correct answer", q.id)));
    }

    match q.kind {
        QuestionKind::MultipleChoice | QuestionKind::TrueFalse => {
            if q.kind == QuestionKind::TrueFalse && q.options.is_empty() {
                q.options = vec!["true".into(), "false".into()];
            }
            if q.options.len() < 2 {
                return Err(invalid(format!("question '{}' needs at least two options", q.id)));
            }
            let single = match &q.correct_answer {
                Answer::One(v) => Some(v.trim()),
                Answer::Many(vs) if vs.len() == 1 => Some(vs[0].trim()),
                Answer::Many(_) => None,
            };
            match single {
                Some(v) if q.options.iter().any(|o| o == v) => {
                    q.correct_answer = Answer::One(v.to_string());
                }
                Some(v) => {
                    return Err(invalid(format!("question '{}': correct answer '{v}' is not an option", q.id)));
                }
                None => {
                    return Err(invalid(format!("question '{}' takes a single correct answer", q.id)));
                }
            }
        }
        QuestionKind::MultiSelect => {
            if q.options.len() < 2 {
                return Err(invalid(format!("question '{}' needs at least two options", q.id)));
            }
            if let Some(stray) = correct.iter().find(|v| !distinct.contains(v.as_str())) {
                return Err(invalid(format!("question '{}': correct answer '{stray}' is not an option", q.id)));
            }
            q.correct_answer = Answer::Many(correct.into_iter().collect());
        }
        QuestionKind::ShortAnswer => {
            if !q.options.is_empty() {
                return Err(invalid(format!("short-answer question '{}' cannot list options", q.id)));
            }
            if correct.len() != 1 {
                return Err(invalid(format!("question '{}' takes a single correct answer", q.id)));
            }
        }
    }
    Ok(())
}

fn invalid(msg: impl Into<String>) -> ServiceError {
    ServiceError::Validation(msg.into())
}
