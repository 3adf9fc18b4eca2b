//! Request identity: resolving an opaque bearer token to the acting user.

use crate::model::Role;
use crate::store::EntityStore;
use crate::{CareError, CareResult};
use carelink_ids::RecordId;
use std::sync::Arc;

/// The authenticated caller of an operation, carried through the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: RecordId,
    pub role: Role,
    /// Client address recorded in audit entries.
    pub origin: Option<String>,
}

impl Actor {
    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

#[derive(Clone, Debug)]
pub struct IdentityService {
    store: Arc<EntityStore>,
}

impl IdentityService {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }

    /// Resolves `token` to an active user.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::Unauthenticated`] for an unknown token or an inactive account.
    pub fn authenticate(&self, token: &str, origin: Option<String>) -> CareResult<Actor> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CareError::Unauthenticated);
        }

        let user = self.store.read(|t| {
            Ok(t.users
                .values()
                .find(|u| u.api_token == token)
                .map(|u| (u.id, u.role, u.is_active)))
        })?;

        match user {
            Some((user_id, role, true)) => Ok(Actor {
                user_id,
                role,
                origin,
            }),
            Some((user_id, _, false)) => {
                tracing::warn!(%user_id, "rejected token for inactive user");
                Err(CareError::Unauthenticated)
            }
            None => Err(CareError::Unauthenticated),
        }
    }
}
