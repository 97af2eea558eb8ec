/*
 * Responsibility
 * - route の認可要件 (AuthRequirement) と identity から Allow / Deny を決める
 * - pure function: I/O なし、同じ入力には常に同じ結果
 *
 * Notes
 * - role set は完全一致。admin が user を暗黙に満たすことはない
 */
use std::fmt;

use crate::services::auth::token_codec::Role;
use crate::services::auth::verifier::VerifiedIdentity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequirement {
    Public,
    AnyAuthenticated,
    RoleIn(Vec<Role>),
}

impl AuthRequirement {
    pub fn role_in(roles: impl IntoIterator<Item = Role>) -> Self {
        let mut roles: Vec<Role> = roles.into_iter().collect();
        roles.sort();
        roles.dedup();
        Self::RoleIn(roles)
    }

    pub fn admin() -> Self {
        Self::role_in([Role::Admin])
    }

    pub fn requires_identity(&self) -> bool {
        !matches!(self, Self::Public)
    }
}

impl fmt::Display for AuthRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::AnyAuthenticated => f.write_str("authenticated"),
            Self::RoleIn(roles) => {
                let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
                write!(f, "role in [{}]", names.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

pub fn authorize(identity: Option<&VerifiedIdentity>, requirement: &AuthRequirement) -> Decision {
    match (requirement, identity) {
        (AuthRequirement::Public, _) => Decision::Allow,
        (_, None) => Decision::Deny(DenyReason::Unauthenticated),
        (AuthRequirement::AnyAuthenticated, Some(_)) => Decision::Allow,
        (AuthRequirement::RoleIn(roles), Some(identity)) => {
            if roles.contains(&identity.role) {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::Forbidden)
            }
        }
    }
}
