//! The process-wide session registry.
//!
//! Every live connection is a member from accept until its task exits.
//! The registry's one job is exclusivity: at most one member may be bound
//! to a given account at any instant.
//!
//! # Concurrency
//!
//! Both tables sit behind one `parking_lot::Mutex`. The lock is held only
//! for the in-memory mutation, never across an `.await`, which is also
//! why a plain (non-async) mutex works: deregistration happens in `Drop`.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use gatehouse_protocol::AccountId;
use gatehouse_transport::CloseHandle;
use parking_lot::Mutex;

use crate::{SessionError, SessionId};

struct Member {
    closer: CloseHandle,
    account: Option<AccountId>,
}

#[derive(Default)]
struct Members {
    sessions: HashMap<SessionId, Member>,
    /// Account → the member bound to it. Kept in sync with `sessions`.
    accounts: HashMap<AccountId, SessionId>,
}

/// Tracks live sessions and which account each is bound to.
///
/// Cheap to clone; clones share the same tables.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    members: Arc<Mutex<Members>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session. It stays a member until the returned
    /// [`Registration`] is dropped, whichever way its task exits.
    ///
    /// `closer` is what [`claim`](Self::claim) uses to evict the session.
    pub fn register(&self, id: SessionId, closer: CloseHandle) -> Registration {
        self.members.lock().sessions.insert(
            id,
            Member {
                closer,
                account: None,
            },
        );
        tracing::trace!(session_id = %id, "session registered");
        Registration {
            registry: self.clone(),
            id,
        }
    }

    /// Binds `account` to session `id`.
    ///
    /// If a different member already holds `account`, that member's
    /// connection is closed **and** this claim fails. The evicted member
    /// keeps its binding until its task deregisters, so claims racing
    /// with the eviction fail too.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyLoggedIn`] if another member holds the
    ///   account.
    /// - [`SessionError::NotRegistered`] if `id` is not a member.
    pub fn claim(&self, id: SessionId, account: AccountId) -> Result<(), SessionError> {
        let mut guard = self.members.lock();
        let members = &mut *guard;

        if let Some(&holder) = members.accounts.get(&account) {
            if holder == id {
                return Ok(());
            }
            if let Some(member) = members.sessions.get(&holder) {
                member.closer.close();
            }
            tracing::debug!(
                session_id = %id,
                holder = %holder,
                account_id = %account,
                "account already held, evicting holder"
            );
            return Err(SessionError::AlreadyLoggedIn(account));
        }

        let member = members
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotRegistered(id))?;
        if let Some(previous) = member.account.replace(account) {
            members.accounts.remove(&previous);
        }
        members.accounts.insert(account, id);
        Ok(())
    }

    /// Returns the member bound to `account`, if any.
    pub fn holder(&self, account: AccountId) -> Option<SessionId> {
        self.members.lock().accounts.get(&account).copied()
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> usize {
        self.members.lock().sessions.len()
    }

    /// Returns `true` if no session is live.
    pub fn is_empty(&self) -> bool {
        self.members.lock().sessions.is_empty()
    }

    fn deregister(&self, id: SessionId) {
        let mut members = self.members.lock();
        let Some(member) = members.sessions.remove(&id) else {
            return;
        };
        if let Some(account) = member.account {
            if let Entry::Occupied(entry) = members.accounts.entry(account) {
                if *entry.get() == id {
                    entry.remove();
                }
            }
        }
        tracing::trace!(session_id = %id, "session deregistered");
    }
}

/// Registry membership for one session. Dropping it deregisters the
/// session and releases its account.
#[must_use = "dropping the registration deregisters the session"]
pub struct Registration {
    registry: SessionRegistry,
    id: SessionId,
}

impl Registration {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Shorthand for [`SessionRegistry::claim`] on this session.
    pub fn claim(&self, account: AccountId) -> Result<(), SessionError> {
        self.registry.claim(self.id, account)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}
