use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

// ============================================================================
// Actor - identity of the caller for one request
// ============================================================================
//
// Passed explicitly into every service operation. An unauthenticated caller
// is still an `Actor`, just one whose `authenticated` flag is false.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Owner,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Owner => "owner",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::invalid(format!("unknown role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
    pub authenticated: bool,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self {
            user_id,
            role,
            authenticated: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user_id: 0,
            role: Role::Customer,
            authenticated: false,
        }
    }

    pub fn customer(user_id: i64) -> Self {
        Self::new(user_id, Role::Customer)
    }

    pub fn owner(user_id: i64) -> Self {
        Self::new(user_id, Role::Owner)
    }

    /// Authenticated actor, or `Unauthorized`.
    pub fn require_authenticated(&self) -> Result<&Self, AppError> {
        if self.authenticated {
            Ok(self)
        } else {
            Err(AppError::unauthorized("user not authenticated"))
        }
    }

    /// Authenticated actor holding `role`; `Unauthorized` or `Forbidden` otherwise.
    pub fn require_role(&self, role: Role, refusal: &str) -> Result<&Self, AppError> {
        let actor = self.require_authenticated()?;
        if actor.role != role {
            return Err(AppError::forbidden(refusal));
        }
        Ok(actor)
    }

    pub fn is(&self, user_id: i64) -> bool {
        self.authenticated && self.user_id == user_id
    }
}
