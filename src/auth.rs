//! Caller identity and capability checks. Authentication itself is the host's job;
//! the engine only asks an `IdentityProvider` who is calling.

use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Header carrying the caller id for `HeaderIdentity`.
pub const USER_HEADER: &str = "X-Admin-User";
/// Comma-separated roles for `HeaderIdentity`.
pub const ROLES_HEADER: &str = "X-Admin-Roles";

/// Capability an action needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    List,
    Show,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::List,
        Operation::Show,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Show => "show",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub id: Option<String>,
    pub roles: BTreeSet<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Caller::default()
    }

    pub fn with_roles(id: impl Into<String>, roles: &[&str]) -> Self {
        Caller {
            id: Some(id.into()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Pure capability check: may `caller` perform `operation` on `resource`?
pub type PermissionFn = Arc<dyn Fn(&Caller, &str, Operation) -> bool + Send + Sync>;

/// Pluggable session/user provider.
pub trait IdentityProvider: Send + Sync {
    fn identify(&self, parts: &Parts) -> Caller;
}

/// Trusts `X-Admin-User` / `X-Admin-Roles` set by an upstream auth proxy.
#[derive(Clone, Debug, Default)]
pub struct HeaderIdentity;

impl IdentityProvider for HeaderIdentity {
    fn identify(&self, parts: &Parts) -> Caller {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let roles = header(ROLES_HEADER)
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Caller {
            id: header(USER_HEADER),
            roles,
        }
    }
}
