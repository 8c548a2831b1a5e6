//! Acting-principal resolution for record attribution.
//!
//! Every task record carries the principal that submitted it. Resolution
//! follows a fixed priority chain over whatever identity material the
//! embedding application has for the current request:
//!
//! 1. Authenticated subject (logged-in user id)
//! 2. API client id
//! 3. Session id
//! 4. [`SYSTEM_PRINCIPAL`](crate::constants::SYSTEM_PRINCIPAL) — submission
//!    from outside any request context (startup jobs, cron)
//!
//! Empty strings are treated as absent so a half-populated auth layer never
//! attributes records to `""`.

use crate::constants::SYSTEM_PRINCIPAL;

/// Identity material available for the request that triggers a submission.
///
/// All fields are optional; [`RequestContext::resolve`] picks the most
/// specific one present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Authenticated subject, if the request carried one.
    pub auth_subject: Option<String>,
    /// API client identifier, if the request came from a service client.
    pub client_id: Option<String>,
    /// Session identifier for otherwise-anonymous browsing sessions.
    pub session_id: Option<String>,
}

impl RequestContext {
    /// Context for an authenticated subject.
    pub fn subject(subject: impl Into<String>) -> Self {
        Self {
            auth_subject: Some(subject.into()),
            ..Self::default()
        }
    }

    /// Resolves the acting principal for attribution.
    ///
    /// # Examples
    ///
    /// ```
    /// use bgtask::principal::RequestContext;
    ///
    /// let ctx = RequestContext {
    ///     auth_subject: Some("user-42".to_string()),
    ///     client_id: Some("client-a".to_string()),
    ///     session_id: None,
    /// };
    /// assert_eq!(ctx.resolve(), "user-42");
    ///
    /// assert_eq!(RequestContext::default().resolve(), "system");
    /// ```
    pub fn resolve(&self) -> String {
        for candidate in [&self.auth_subject, &self.client_id, &self.session_id] {
            if let Some(value) = candidate {
                if !value.is_empty() {
                    return value.clone();
                }
            }
        }
        SYSTEM_PRINCIPAL.to_string()
    }
}
