use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

pub type MemberId = i64;

/// A team member as handed over by roster management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,            // ⇔ members.id
    pub name: String,            // ⇔ members.name (NOT NULL, non-blank)
    pub email: Option<String>,   // ⇔ members.email
    pub is_admin: bool,          // ⇔ members.is_admin (0/1)
}

impl Member {
    pub fn new(id: MemberId, name: &str, email: Option<&str>, is_admin: bool) -> AppResult<Self> {
        let member = Self {
            id,
            name: name.trim().to_string(),
            email: email
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
            is_admin,
        };
        member.validate()?;
        Ok(member)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("member name must not be empty".into()));
        }
        if let Some(email) = &self.email
            && !email.contains('@')
        {
            return Err(AppError::Validation(format!(
                "invalid email address '{}'",
                email
            )));
        }
        Ok(())
    }

    pub fn email_str(&self) -> &str {
        self.email.as_deref().unwrap_or("")
    }
}
