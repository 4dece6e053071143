//! Loading service configuration (progress defaults + optional template bank)
//! from TOML.
//!
//! Example:
//! ```toml
//! [progress]
//! default_window_weeks = 8
//!
//! [templates]
//! seed_demo = false
//!
//! [[templates.bank]]
//! title = "Gratitude journal"
//! description = "Write about three things that went well this week."
//! kind = "Reflection"
//! intelligenceTag = "intrapersonal"
//! weekOffset = 1
//! ```

use chrono::{Days, Duration, NaiveDate};
use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Difficulty, Question, TemplateDefinition, TemplateKind};
use crate::util::week_start;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ServiceConfig {
  #[serde(default)]
  pub progress: ProgressConfig,
  #[serde(default)]
  pub templates: TemplatesConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProgressConfig {
  /// Weeks covered by a progress request that does not name a window.
  #[serde(default = "default_window_weeks")]
  pub default_window_weeks: u32,
  #[serde(default = "max_window_weeks")]
  pub max_window_weeks: u32,
}

fn default_window_weeks() -> u32 { 12 }
fn max_window_weeks() -> u32 { 104 }

impl Default for ProgressConfig {
  fn default() -> Self {
    Self { default_window_weeks: default_window_weeks(), max_window_weeks: max_window_weeks() }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TemplatesConfig {
  /// Insert the built-in demo templates. Defaults to "only when the bank is empty".
  #[serde(default)]
  pub seed_demo: Option<bool>,
  #[serde(default)]
  pub bank: Vec<BankTemplate>,
}

impl TemplatesConfig {
  pub fn wants_demo_seeds(&self) -> bool {
    self.seed_demo.unwrap_or(self.bank.is_empty())
  }
}

/// Template entry accepted in TOML. Either a fixed `dueDate` ("YYYY-MM-DD")
/// or a `weekOffset` from the current week (due on that week's Friday).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTemplate {
  pub title: String,
  pub description: String,
  pub kind: TemplateKind,
  #[serde(default)] pub intelligence_tag: String,
  #[serde(default)] pub difficulty: Difficulty,
  #[serde(default)] pub due_date: Option<NaiveDate>,
  #[serde(default)] pub week_offset: i64,
  #[serde(default)] pub questions: Vec<Question>,
}

impl BankTemplate {
  pub fn into_definition(self, today: NaiveDate) -> TemplateDefinition {
    let due_date = self
      .due_date
      .unwrap_or_else(|| {
        // An offset past the calendar lands on MAX, which validation rejects.
        Duration::try_weeks(self.week_offset)
          .and_then(|w| friday_of(today).checked_add_signed(w))
          .unwrap_or(NaiveDate::MAX)
      });
    TemplateDefinition {
      title: self.title,
      description: self.description,
      kind: self.kind,
      intelligence_tag: self.intelligence_tag,
      difficulty: self.difficulty,
      due_date,
      questions: self.questions,
    }
  }
}

/// Friday of the week containing `d`; the default weekly due day.
pub fn friday_of(d: NaiveDate) -> NaiveDate {
  week_start(d).checked_add_days(Days::new(4)).unwrap_or(NaiveDate::MAX)
}

/// Attempt to load `ServiceConfig` from COTW_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_service_config_from_env() -> Option<ServiceConfig> {
  let path = std::env::var("COTW_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<ServiceConfig>(&s) {
      Ok(cfg) => {
        info!(target: "cotw_backend", %path, bank = cfg.templates.bank.len(), "Loaded service config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "cotw_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "cotw_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
