//! API-key capability scoping.
//!
//! # Design Decisions
//! - `authorize` is a pure subset check: no I/O, no side effects
//! - Key material maps to a named identity so logs and rate/abuse state
//!   reference the name, never the raw key

use std::collections::HashMap;

use crate::config::ApiKeyConfig;
use crate::error::ProtectError;
use crate::protect::token::Permission;

/// Deny unless every required scope is held by the caller.
pub fn authorize(granted: &[Permission], required: &[Permission]) -> Result<(), ProtectError> {
    if required.iter().all(|p| granted.contains(p)) {
        Ok(())
    } else {
        Err(ProtectError::InsufficientScope)
    }
}

/// The identity behind a presented API key.
#[derive(Debug, Clone)]
pub struct ApiKeyIdentity {
    pub name: String,
    pub scopes: Vec<Permission>,
}

/// Read-only lookup from presented key material to identity and scopes.
///
/// Populated from configuration at startup; key management itself is an
/// external collaborator's concern.
pub struct ApiKeyDirectory {
    keys: HashMap<String, ApiKeyIdentity>,
}

impl ApiKeyDirectory {
    pub fn from_config(entries: &[ApiKeyConfig]) -> Self {
        let keys = entries
            .iter()
            .map(|entry| {
                (
                    entry.key.clone(),
                    ApiKeyIdentity {
                        name: entry.name.clone(),
                        scopes: entry.scopes.clone(),
                    },
                )
            })
            .collect();
        Self { keys }
    }

    pub fn resolve(&self, presented: &str) -> Option<&ApiKeyIdentity> {
        self.keys.get(presented)
    }
}
