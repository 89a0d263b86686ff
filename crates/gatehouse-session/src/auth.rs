//! Credential authentication.
//!
//! The gateway hands a username and a decoded password to an
//! [`Authenticator`] and gets back either the account and its owner, or
//! a classified [`SessionError`]. The production implementation,
//! [`RepositoryAuthenticator`], looks the account up in a
//! [`Repository`] and checks the password with a [`PasswordVerifier`].
//! Tests can swap in anything that implements the trait.

use std::future::Future;

use gatehouse_store::{Account, Repository, User};

use crate::{PasswordVerifier, SessionError};

/// Who a successful login belongs to.
#[derive(Debug, Clone)]
pub struct Identity {
    pub account: Account,
    pub user: User,
}

/// Validates a username/password pair.
///
/// # Trait bounds
///
/// - `Send + Sync` → one authenticator is shared by every connection
///   task, and Tokio may call it from any worker thread.
/// - `'static` → it lives as long as the server.
pub trait Authenticator: Send + Sync + 'static {
    /// Resolves the account named `username` and checks `password`
    /// against its owner's stored hash.
    ///
    /// # Errors
    /// - [`SessionError::UnknownAccount`]: no such account.
    /// - [`SessionError::AccountLookup`]: the account lookup failed.
    /// - [`SessionError::Store`]: the owner lookup failed.
    /// - [`SessionError::WrongPassword`]: the password does not match.
    /// - [`SessionError::Verification`]: the stored hash is unusable.
    fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, SessionError>> + Send;
}

/// Authenticates against a [`Repository`].
#[derive(Clone)]
pub struct RepositoryAuthenticator<R, V> {
    repo: R,
    verifier: V,
}

impl<R: Repository, V: PasswordVerifier> RepositoryAuthenticator<R, V> {
    pub fn new(repo: R, verifier: V) -> Self {
        Self { repo, verifier }
    }
}

impl<R: Repository, V: PasswordVerifier> Authenticator
    for RepositoryAuthenticator<R, V>
{
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, SessionError> {
        let account = match self.repo.account_by_name(username).await {
            Ok(account) => account,
            Err(e) if e.is_not_found() => {
                return Err(SessionError::UnknownAccount(username.to_string()));
            }
            Err(e) => return Err(SessionError::AccountLookup(e)),
        };

        let user = self.repo.user_by_id(account.user_id).await?;

        if !self.verifier.verify(password, &user.password_hash).await? {
            return Err(SessionError::WrongPassword);
        }

        Ok(Identity { account, user })
    }
}
