//! End-user account storage.

use async_trait::async_trait;

use crate::error::OidcError;
use crate::types::User;

/// Result of resolving a login hint to at most one account.
///
/// `Ambiguous` is an expected condition for non-unique attributes such as
/// phone numbers; callers treat it exactly like `Unresolved` when deciding
/// the interaction outcome, it only differs in what gets logged.
#[derive(Debug, Clone)]
pub enum UserLookup {
    /// Exactly one account matched.
    Resolved(User),
    /// No account matched.
    Unresolved,
    /// Several accounts matched.
    Ambiguous,
}

impl UserLookup {
    /// Collapses a match list into a lookup result.
    #[must_use]
    pub fn from_matches(mut matches: Vec<User>) -> Self {
        match matches.len() {
            0 => Self::Unresolved,
            1 => Self::Resolved(matches.remove(0)),
            _ => Self::Ambiguous,
        }
    }

    /// Returns the resolved user, if any.
    #[must_use]
    pub fn into_user(self) -> Option<User> {
        match self {
            Self::Resolved(user) => Some(user),
            Self::Unresolved | Self::Ambiguous => None,
        }
    }
}

/// Storage and credential verification for end-user accounts.
///
/// Password verification lives behind the trait so the hashing scheme is a
/// backend concern.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Finds a user by subject identifier.
    async fn find_by_sub(&self, tenant_id: &str, sub: &str) -> Result<Option<User>, OidcError>;

    /// Finds a user by unique login name.
    async fn find_by_username(
        &self,
        tenant_id: &str,
        username: &str,
    ) -> Result<Option<User>, OidcError>;

    /// Finds users by e-mail address.
    async fn find_by_email(&self, tenant_id: &str, email: &str) -> Result<Vec<User>, OidcError>;

    /// Finds users by phone number. Phone numbers are not unique.
    async fn find_by_phone_number(
        &self,
        tenant_id: &str,
        phone_number: &str,
    ) -> Result<Vec<User>, OidcError>;

    /// Finds the user owning the given authentication device.
    async fn find_by_device(
        &self,
        tenant_id: &str,
        device_id: &str,
    ) -> Result<Option<User>, OidcError>;

    /// Verifies a password; returns the user on success, `None` otherwise.
    async fn verify_password(
        &self,
        tenant_id: &str,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, OidcError>;

    /// Creates a new account.
    async fn create(&self, tenant_id: &str, user: User, password: &str) -> Result<(), OidcError>;

    /// Attaches an authentication device to an existing account. Attaching
    /// an already-registered device is a no-op.
    async fn add_authentication_device(
        &self,
        tenant_id: &str,
        sub: &str,
        device_id: &str,
    ) -> Result<(), OidcError>;
}

/// Resolves a login hint (`username`, `email:`, `phone:`, `sub:` prefixes or
/// a bare username) to at most one account.
///
/// # Errors
///
/// Propagates storage failures; resolution misses are not errors.
pub async fn resolve_login_hint(
    storage: &dyn UserStorage,
    tenant_id: &str,
    hint: &str,
) -> Result<UserLookup, OidcError> {
    if let Some(sub) = hint.strip_prefix("sub:") {
        return Ok(match storage.find_by_sub(tenant_id, sub).await? {
            Some(user) => UserLookup::Resolved(user),
            None => UserLookup::Unresolved,
        });
    }
    if let Some(email) = hint.strip_prefix("email:") {
        return Ok(UserLookup::from_matches(
            storage.find_by_email(tenant_id, email).await?,
        ));
    }
    if let Some(phone) = hint.strip_prefix("phone:") {
        return Ok(UserLookup::from_matches(
            storage.find_by_phone_number(tenant_id, phone).await?,
        ));
    }
    if hint.contains('@') {
        return Ok(UserLookup::from_matches(
            storage.find_by_email(tenant_id, hint).await?,
        ));
    }
    Ok(match storage.find_by_username(tenant_id, hint).await? {
        Some(user) => UserLookup::Resolved(user),
        None => UserLookup::Unresolved,
    })
}
