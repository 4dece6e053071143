//! Application state: template store, submission store and settings, plus the
//! admin-facing template operations.
//!
//! This module owns:
//!   - the template store (in-memory, keyed by id)
//!   - the submission store behind the `SubmissionStore` seam
//!   - progress settings from TOML (or defaults)

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info, instrument};

use crate::access;
use crate::config::{ProgressConfig, ServiceConfig};
use crate::domain::{Actor, ChallengeTemplate, TemplateDefinition, TemplateKind};
use crate::error::ServiceResult;
use crate::seeds::seed_templates;
use crate::store::{MemorySubmissionStore, SubmissionStore};
use crate::templates::TemplateStore;

/// Identity used for templates inserted at startup.
const SYSTEM_ACTOR: &str = "system";

#[derive(Clone)]
pub struct AppState {
    pub templates: TemplateStore,
    pub submissions: Arc<dyn SubmissionStore>,
    pub progress: ProgressConfig,
}

impl AppState {
    /// Empty state over the in-memory submission store.
    pub fn new(progress: ProgressConfig) -> Self {
        Self::with_store(progress, Arc::new(MemorySubmissionStore::new()))
    }

    pub fn with_store(progress: ProgressConfig, submissions: Arc<dyn SubmissionStore>) -> Self {
        Self {
            templates: TemplateStore::new(),
            submissions,
            progress,
        }
    }

    /// Build state from config: load the template bank and demo seeds.
    #[instrument(level = "info", skip_all, fields(%today))]
    pub async fn from_config(cfg: ServiceConfig, today: NaiveDate) -> Self {
        let state = Self::new(cfg.progress.clone());
        let now = Utc::now();
        let wants_seeds = cfg.templates.wants_demo_seeds();

        for entry in cfg.templates.bank {
            let title = entry.title.clone();
            if let Err(e) = state
                .templates
                .create(entry.into_definition(today), SYSTEM_ACTOR, now)
                .await
            {
                error!(target: "challenge", %title, error = %e, "Skipping bank template");
            }
        }

        if wants_seeds {
            for def in seed_templates(today) {
                if let Err(e) = state.templates.create(def, SYSTEM_ACTOR, now).await {
                    error!(target: "challenge", error = %e, "Built-in seed template rejected");
                }
            }
        }

        // Inventory summary by kind.
        let all = state.templates.list(true).await;
        for kind in [TemplateKind::Marked, TemplateKind::Reflection, TemplateKind::HandsOn] {
            let count = all.iter().filter(|t| t.kind == kind).count();
            info!(target: "challenge", kind = ?kind, count, "Startup template inventory");
        }
        state
    }

    #[instrument(level = "info", skip(self, def), fields(actor = %actor.id))]
    pub async fn publish_template(
        &self,
        actor: &Actor,
        def: TemplateDefinition,
        now: DateTime<Utc>,
    ) -> ServiceResult<ChallengeTemplate> {
        access::require_admin(actor)?;
        self.templates.create(def, &actor.id, now).await
    }

    /// Edit a template. Once any submission references it the edit is stored
    /// as a new version so earlier scores stay auditable.
    #[instrument(level = "info", skip(self, def), fields(actor = %actor.id, %id))]
    pub async fn revise_template(
        &self,
        actor: &Actor,
        id: &str,
        def: TemplateDefinition,
        now: DateTime<Utc>,
    ) -> ServiceResult<ChallengeTemplate> {
        access::require_admin(actor)?;
        self.templates
            .revise(id, def, self.submissions.as_ref(), &actor.id, now)
            .await
    }

    #[instrument(level = "info", skip(self), fields(actor = %actor.id, %id))]
    pub async fn archive_template(&self, actor: &Actor, id: &str) -> ServiceResult<ChallengeTemplate> {
        access::require_admin(actor)?;
        self.templates.archive(id).await
    }
}
