//! Small utility helpers used across modules.

use chrono::{Datelike, Days, NaiveDate};

use crate::error::{ServiceError, ServiceResult};

/// Years accepted for due dates and `asOf` parameters.
const SUPPORTED_YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;

/// Monday of the ISO week containing `d`. Saturates at `NaiveDate::MIN`.
pub fn week_start(d: NaiveDate) -> NaiveDate {
  d.checked_sub_days(Days::new(u64::from(d.weekday().num_days_from_monday())))
    .unwrap_or(NaiveDate::MIN)
}

/// Sunday of the ISO week containing `d`. Saturates at `NaiveDate::MAX`.
pub fn week_end(d: NaiveDate) -> NaiveDate {
  week_start(d).checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX)
}

/// Reject client dates outside the supported calendar range.
pub fn supported_date(d: NaiveDate, field: &str) -> ServiceResult<NaiveDate> {
  if SUPPORTED_YEARS.contains(&d.year()) {
    Ok(d)
  } else {
    Err(ServiceError::Validation(format!(
      "{field} {d} is outside years {}..={}",
      SUPPORTED_YEARS.start(),
      SUPPORTED_YEARS.end()
    )))
  }
}

/// True if `a` and `b` fall in the same Monday..Sunday week.
pub fn same_week(a: NaiveDate, b: NaiveDate) -> bool {
  week_start(a) == week_start(b)
}

/// True if the string has something other than whitespace.
pub fn non_blank(s: &str) -> bool {
  !s.trim().is_empty()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with long feedback or reflection texts.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) { cut -= 1; }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}
