//! Role capability checks, run once per operation before any state is touched.

use crate::domain::{Actor, Role};
use crate::error::{ServiceError, ServiceResult};

pub fn require_admin(actor: &Actor) -> ServiceResult<()> {
  if actor.role == Role::Admin {
    Ok(())
  } else {
    Err(denied(actor, "manage templates"))
  }
}

/// Staff or admin.
pub fn require_reviewer(actor: &Actor) -> ServiceResult<()> {
  if actor.role.can_review() {
    Ok(())
  } else {
    Err(denied(actor, "review submissions"))
  }
}

/// Only the student themself may write their own submissions.
pub fn require_student(actor: &Actor, student_id: &str) -> ServiceResult<()> {
  if actor.role == Role::Student && actor.id == student_id {
    Ok(())
  } else {
    Err(ServiceError::Unauthorized(format!(
      "{} {} cannot act on behalf of student {student_id}",
      role_name(actor.role),
      actor.id
    )))
  }
}

/// The student themself, or any mentor/staff/admin.
pub fn require_self_or_overseer(actor: &Actor, student_id: &str) -> ServiceResult<()> {
  if actor.role.can_oversee() || actor.id == student_id {
    Ok(())
  } else {
    Err(ServiceError::Unauthorized(format!(
      "student {} cannot read data of student {student_id}",
      actor.id
    )))
  }
}

fn denied(actor: &Actor, what: &str) -> ServiceError {
  ServiceError::Unauthorized(format!("{} {} is not allowed to {what}", role_name(actor.role), actor.id))
}

fn role_name(role: Role) -> &'static str {
  match role {
    Role::Student => "student",
    Role::Mentor => "mentor",
    Role::Staff => "staff",
    Role::Admin => "admin",
  }
}
