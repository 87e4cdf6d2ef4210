use secrecy::SecretString;
use uuid::Uuid;

/// `SecurityContext` describes who an inbound operation runs for.
///
/// Built by the hosting layer after authenticating the caller and handed to
/// every CRM bridge operation. The delegated authentication mode exchanges
/// `bearer_token` for a store token on behalf of this subject.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    /// Subject ID: the authenticated user or service making the request.
    subject_id: Uuid,
    /// The caller's original bearer token, used as the user assertion for
    /// on-behalf-of exchanges. `Debug` redacts the value.
    bearer_token: Option<SecretString>,
}

impl SecurityContext {
    /// Create a new `SecurityContext` builder
    #[must_use]
    pub fn builder() -> SecurityContextBuilder {
        SecurityContextBuilder::default()
    }

    /// Create an anonymous `SecurityContext` with no subject and no token
    #[must_use]
    pub fn anonymous() -> Self {
        SecurityContextBuilder::default().build()
    }

    #[must_use]
    pub fn subject_id(&self) -> Uuid {
        self.subject_id
    }

    /// Get the caller's bearer token (user assertion for delegated access).
    #[must_use]
    pub fn bearer_token(&self) -> Option<&SecretString> {
        self.bearer_token.as_ref()
    }
}

#[derive(Default)]
pub struct SecurityContextBuilder {
    subject_id: Option<Uuid>,
    bearer_token: Option<SecretString>,
}

impl SecurityContextBuilder {
    #[must_use]
    pub fn subject_id(mut self, subject_id: Uuid) -> Self {
        self.subject_id = Some(subject_id);
        self
    }

    #[must_use]
    pub fn bearer_token(mut self, token: impl Into<SecretString>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn build(self) -> SecurityContext {
        SecurityContext {
            subject_id: self.subject_id.unwrap_or_default(),
            bearer_token: self.bearer_token,
        }
    }
}
