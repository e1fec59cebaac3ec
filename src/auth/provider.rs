//! Identity providers consulted at login and signup.
//!
//! The [`Authenticator`] asks each provider in turn; the first one that
//! recognises the identifier decides the outcome. The demo provider answers
//! for the fixed demo account without touching the backend, the backend
//! provider handles everyone else.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::session::{Identity, Role};
use crate::backend::{Backends, NewBackendUser};
use crate::config::DemoConfig;
use crate::{HavenError, Result};

/// Identifier of the demo identity.
pub const DEMO_USER_ID: &str = "demo";

/// Username for backend accounts without one in their metadata.
const FALLBACK_USERNAME: &str = "admin";

/// Outcome of a credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// This provider does not know the identifier.
    NotHandled,
    /// Credentials are good and the account is an admin.
    Verified(Identity),
    /// Wrong identifier or password.
    InvalidCredentials,
    /// Credentials are good but the account is not an admin.
    Unauthorized,
}

/// Outcome of an account provisioning request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupOutcome {
    /// This provider does not handle the request.
    NotHandled,
    /// A new account was created.
    Created {
        /// Backend identifier of the new account.
        id: String,
    },
    /// Signup was acknowledged without creating anything.
    Simulated,
}

/// Signup request after validation and normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupRequest {
    /// Trimmed username.
    pub username: String,
    /// Trimmed, lower-cased email.
    pub email: String,
    /// Password.
    pub password: String,
}

/// A source of identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short name used in logs and audit entries.
    fn name(&self) -> &'static str;

    /// Check credentials. `identifier` is already trimmed and lower-cased.
    async fn verify_credentials(&self, identifier: &str, password: &str) -> Result<LoginOutcome>;

    /// Provision an admin account.
    async fn provision(&self, request: &SignupRequest) -> Result<SignupOutcome>;
}

/// The built-in demonstration account.
#[derive(Debug, Clone)]
pub struct DemoProvider {
    username: String,
    email: String,
    password: String,
}

impl DemoProvider {
    /// Create the provider from configuration.
    pub fn new(config: &DemoConfig) -> Self {
        Self {
            username: config.username.trim().to_string(),
            email: config.email.trim().to_lowercase(),
            password: config.password.clone(),
        }
    }

    /// The identity the demo account logs in as.
    pub fn identity(&self) -> Identity {
        Identity {
            id: DEMO_USER_ID.to_string(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: Role::Admin,
        }
    }

    fn owns(&self, identifier: &str) -> bool {
        identifier == self.username.to_lowercase() || identifier == self.email
    }
}

#[async_trait]
impl IdentityProvider for DemoProvider {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn verify_credentials(&self, identifier: &str, password: &str) -> Result<LoginOutcome> {
        if !self.owns(identifier) {
            return Ok(LoginOutcome::NotHandled);
        }
        if password == self.password {
            Ok(LoginOutcome::Verified(self.identity()))
        } else {
            Ok(LoginOutcome::InvalidCredentials)
        }
    }

    async fn provision(&self, request: &SignupRequest) -> Result<SignupOutcome> {
        let is_demo = request.username == self.username
            && request.email == self.email
            && request.password == self.password;
        Ok(if is_demo {
            SignupOutcome::Simulated
        } else {
            SignupOutcome::NotHandled
        })
    }
}

/// Accounts stored in the hosted identity backend.
#[derive(Debug, Clone)]
pub struct BackendProvider {
    backends: Backends,
}

impl BackendProvider {
    /// Create the provider over the configured backends.
    pub fn new(backends: Backends) -> Self {
        Self { backends }
    }
}

#[async_trait]
impl IdentityProvider for BackendProvider {
    fn name(&self) -> &'static str {
        "backend"
    }

    async fn verify_credentials(&self, identifier: &str, password: &str) -> Result<LoginOutcome> {
        let identity = self.backends.identity()?;
        let user = match self
            .backends
            .call(identity.sign_in_with_password(identifier, password))
            .await
        {
            Ok(user) => user,
            Err(e) if e.is_unavailable() => return Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "Backend sign-in rejected");
                return Ok(LoginOutcome::InvalidCredentials);
            }
        };

        let role = Role::from_claim(user.role_claim());
        if role != Role::Admin {
            return Ok(LoginOutcome::Unauthorized);
        }

        let email = user
            .email
            .clone()
            .unwrap_or_else(|| identifier.to_string());
        let username = user.username().unwrap_or(FALLBACK_USERNAME).to_string();
        Ok(LoginOutcome::Verified(Identity {
            id: user.id,
            username,
            email,
            role,
        }))
    }

    async fn provision(&self, request: &SignupRequest) -> Result<SignupOutcome> {
        let identity = self.backends.admin_identity()?;
        let user = NewBackendUser {
            email: request.email.clone(),
            password: request.password.clone(),
            email_confirm: true,
            user_metadata: json!({ "username": request.username }),
            app_metadata: json!({ "role": Role::Admin.as_str() }),
        };
        let created = self.backends.call(identity.create_user(&user)).await?;
        Ok(SignupOutcome::Created { id: created.id })
    }
}

/// An ordered chain of identity providers.
#[derive(Clone, Default)]
pub struct Authenticator {
    providers: Vec<Arc<dyn IdentityProvider>>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("Authenticator")
            .field("providers", &names)
            .finish()
    }
}

impl Authenticator {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard chain: the demo account (when enabled) then the backend.
    pub fn standard(demo: &DemoConfig, backends: Backends) -> Self {
        let mut chain = Self::new();
        if demo.enabled {
            chain = chain.with(Arc::new(DemoProvider::new(demo)));
        }
        chain.with(Arc::new(BackendProvider::new(backends)))
    }

    /// Append a provider.
    pub fn with(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Check credentials against the chain.
    ///
    /// Returns the deciding provider's name with the outcome. An identifier
    /// nobody handles is an invalid credential.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<(&'static str, LoginOutcome)> {
        for provider in &self.providers {
            match provider.verify_credentials(identifier, password).await? {
                LoginOutcome::NotHandled => continue,
                outcome => return Ok((provider.name(), outcome)),
            }
        }
        Ok(("none", LoginOutcome::InvalidCredentials))
    }

    /// Provision an account through the first provider that handles it.
    pub async fn signup(&self, request: &SignupRequest) -> Result<(&'static str, SignupOutcome)> {
        for provider in &self.providers {
            match provider.provision(request).await? {
                SignupOutcome::NotHandled => continue,
                outcome => return Ok((provider.name(), outcome)),
            }
        }
        Err(HavenError::ServiceUnavailable(
            "no identity provider accepts signups".into(),
        ))
    }
}
