//! Supervisor session context.
//!
//! Who is looking at the dashboard is decided once, before rendering, and
//! handed to the renderer as a value. Reconciliation never sees it.

use anyhow::{Result, bail};

/// The identity a dashboard is rendered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    supervisor: Option<String>,
}

impl Session {
    /// A session for an authenticated supervisor.
    pub fn supervisor(name: impl Into<String>) -> Self {
        Self {
            supervisor: Some(name.into()),
        }
    }

    /// A session for a deployment without an access check.
    pub const fn anonymous() -> Self {
        Self { supervisor: None }
    }

    /// Display name of the viewer.
    pub fn viewer(&self) -> &str {
        self.supervisor.as_deref().unwrap_or("anonymous")
    }
}

/// Verifies a credential and opens a [`Session`].
pub trait Authenticator {
    fn authenticate(&self, credential: Option<&str>) -> Result<Session>;
}

/// Compares the credential with a shared secret from configuration.
///
/// With no secret configured every caller gets an anonymous session.
#[derive(Debug, Clone)]
pub struct SharedSecret {
    secret: Option<String>,
}

impl SharedSecret {
    pub const fn new(secret: Option<String>) -> Self {
        Self { secret }
    }
}

impl Authenticator for SharedSecret {
    fn authenticate(&self, credential: Option<&str>) -> Result<Session> {
        let Some(secret) = self.secret.as_deref() else {
            return Ok(Session::anonymous());
        };
        match credential {
            None => bail!("supervisor password required (use --password or ATT_PASSWORD)"),
            Some(given) if given == secret => Ok(Session::supervisor("supervisor")),
            Some(_) => bail!("incorrect supervisor password"),
        }
    }
}
