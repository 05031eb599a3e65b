//! Two-tier shared-secret access control.
//!
//! A visitor proves nothing about who they are, only which secret they know.
//! Each configured secret maps to an [`AccessLevel`]; the level is stored in
//! the visitor's [`Session`] and checked on every gallery operation.
//!
//! | Level    | Browse gallery | Change gallery |
//! |----------|----------------|----------------|
//! | `public` | yes            | no             |
//! | `admin`  | yes            | yes            |

use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Access granted by a shared secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Public,
    Admin,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::Public => f.write_str("public"),
            AccessLevel::Admin => f.write_str("admin"),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    #[error("Please log in to view the gallery.")]
    LoginRequired,
    #[error("You do not have permission to do that.")]
    Forbidden,
}

/// Maps shared secrets to access levels.
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    secrets: HashMap<String, AccessLevel>,
}

impl AccessGate {
    pub fn new<I>(secrets: I) -> Self
    where
        I: IntoIterator<Item = (String, AccessLevel)>,
    {
        Self {
            secrets: secrets.into_iter().collect(),
        }
    }

    /// Level granted by `secret`, if it is one of the configured secrets.
    pub fn authenticate(&self, secret: &str) -> Option<AccessLevel> {
        self.secrets.get(secret).copied()
    }

    /// Check that `session` holds at least `required`.
    ///
    /// Any stored level satisfies `Public`; only `Admin` satisfies `Admin`.
    pub fn authorize(
        &self,
        session: &Session,
        required: AccessLevel,
    ) -> Result<AccessLevel, AccessError> {
        match (session.access, required) {
            (None, _) => Err(AccessError::LoginRequired),
            (Some(AccessLevel::Admin), _) => Ok(AccessLevel::Admin),
            (Some(AccessLevel::Public), AccessLevel::Public) => Ok(AccessLevel::Public),
            (Some(AccessLevel::Public), AccessLevel::Admin) => Err(AccessError::Forbidden),
        }
    }
}
