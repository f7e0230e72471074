use std::fmt;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::backup::repository::{LockRecord, RepositoryGateway, RepositoryHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Free,
    Active,
    Stale,
}

impl LockState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Free => "free",
            LockState::Active => "active",
            LockState::Stale => "stale",
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockDecision {
    Proceed { recovered: bool },
    Locked { state: LockState, detail: String },
}

/// A lock with an unknown age is never considered stale.
fn record_is_active(record: &LockRecord, now: DateTime<Utc>, window: Duration) -> bool {
    match record.timestamp {
        None => true,
        Some(ts) => now.signed_duration_since(ts.with_timezone(&Utc)) < window,
    }
}

#[derive(Debug, Clone)]
pub struct LockArbiter {
    window: Duration,
    strict_listing: bool,
}

impl LockArbiter {
    pub fn new(window: Duration, strict_listing: bool) -> Self {
        Self {
            window,
            strict_listing,
        }
    }

    pub fn inspect<G: RepositoryGateway + ?Sized>(
        &self,
        gateway: &G,
        repo: &RepositoryHandle,
        now: DateTime<Utc>,
    ) -> LockState {
        let ids = match gateway.list_locks(repo) {
            Ok(ids) => ids,
            Err(err) => {
                let state = if self.strict_listing {
                    LockState::Active
                } else {
                    LockState::Free
                };
                warn!(repository = %repo, error = %err, state = %state, "lock listing failed");
                return state;
            }
        };
        for id in &ids {
            let record = match gateway.read_lock(repo, id) {
                Ok(record) => record,
                Err(err) => {
                    debug!(repository = %repo, lock = %id, error = %err, "lock unreadable");
                    LockRecord {
                        id: id.clone(),
                        timestamp: None,
                    }
                }
            };
            if record_is_active(&record, now, self.window) {
                debug!(repository = %repo, lock = %id, "active lock");
                return LockState::Active;
            }
        }
        if ids.is_empty() {
            LockState::Free
        } else {
            LockState::Stale
        }
    }

    pub fn arbitrate<G: RepositoryGateway + ?Sized>(
        &self,
        gateway: &G,
        repo: &RepositoryHandle,
    ) -> LockDecision {
        match self.inspect(gateway, repo, Utc::now()) {
            LockState::Free => LockDecision::Proceed { recovered: false },
            LockState::Active => LockDecision::Locked {
                state: LockState::Active,
                detail: "repository is locked by another process".to_string(),
            },
            LockState::Stale => {
                info!(repository = %repo, "removing stale locks");
                if let Err(err) = gateway.unlock(repo) {
                    warn!(repository = %repo, error = %err, "unlock failed");
                }
                match self.inspect(gateway, repo, Utc::now()) {
                    LockState::Free => LockDecision::Proceed { recovered: true },
                    state => LockDecision::Locked {
                        state,
                        detail: format!("lock still {} after unlock", state),
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::testing::{lock_aged, lock_without_time, FakeGateway};

    fn arbiter() -> LockArbiter {
        LockArbiter::new(Duration::minutes(30), false)
    }

    fn repo() -> RepositoryHandle {
        RepositoryHandle::for_target("bucket", "docs")
    }

    fn inspect(locks: Vec<LockRecord>) -> LockState {
        let gateway = FakeGateway::with_locks(locks);
        arbiter().inspect(&gateway, &repo(), Utc::now())
    }

    #[test]
    fn classification() {
        assert_eq!(inspect(vec![]), LockState::Free);
        assert_eq!(
            inspect(vec![lock_aged("a", 45), lock_aged("b", 600)]),
            LockState::Stale
        );
        assert_eq!(
            inspect(vec![lock_aged("a", 45), lock_aged("b", 5)]),
            LockState::Active
        );
        assert_eq!(
            inspect(vec![lock_aged("a", 45), lock_without_time("b")]),
            LockState::Active
        );
    }

    #[test]
    fn future_timestamps_count_as_active() {
        assert_eq!(inspect(vec![lock_aged("a", -10)]), LockState::Active);
    }

    #[test]
    fn no_locks_proceeds_without_unlock() {
        let gateway = FakeGateway::default();
        assert_eq!(
            arbiter().arbitrate(&gateway, &repo()),
            LockDecision::Proceed { recovered: false }
        );
        assert!(!gateway.called("unlock"));
    }

    #[test]
    fn active_lock_is_never_touched() {
        let gateway = FakeGateway::with_locks(vec![lock_aged("a", 5)]);
        assert!(matches!(
            arbiter().arbitrate(&gateway, &repo()),
            LockDecision::Locked {
                state: LockState::Active,
                ..
            }
        ));
        assert!(!gateway.called("unlock"));
    }

    #[test]
    fn scan_stops_at_first_active_lock() {
        let gateway = FakeGateway::with_locks(vec![lock_without_time("a"), lock_aged("b", 90)]);
        assert_eq!(arbiter().inspect(&gateway, &repo(), Utc::now()), LockState::Active);
        assert!(gateway.called("read_lock:a"));
        assert!(!gateway.called("read_lock:b"));
    }

    #[test]
    fn unreadable_lock_is_active() {
        let mut gateway = FakeGateway::with_locks(vec![lock_aged("a", 90)]);
        gateway.unreadable_locks = vec!["a".to_string()];
        assert_eq!(arbiter().inspect(&gateway, &repo(), Utc::now()), LockState::Active);
    }

    #[test]
    fn stale_lock_is_recovered() {
        let gateway = FakeGateway::with_locks(vec![lock_aged("a", 45)]);
        assert_eq!(
            arbiter().arbitrate(&gateway, &repo()),
            LockDecision::Proceed { recovered: true }
        );
        assert_eq!(
            gateway.calls().iter().filter(|c| c.as_str() == "unlock").count(),
            1
        );
    }

    #[test]
    fn stale_lock_that_survives_unlock_blocks() {
        let mut gateway = FakeGateway::with_locks(vec![lock_aged("a", 45)]);
        gateway.unlock_clears = false;
        assert_eq!(
            arbiter().arbitrate(&gateway, &repo()),
            LockDecision::Locked {
                state: LockState::Stale,
                detail: "lock still stale after unlock".to_string(),
            }
        );
    }

    #[test]
    fn listing_failure_is_free_unless_strict() {
        let mut gateway = FakeGateway::with_locks(vec![lock_aged("a", 5)]);
        gateway.list_fails = true;
        assert_eq!(arbiter().inspect(&gateway, &repo(), Utc::now()), LockState::Free);
        let strict = LockArbiter::new(Duration::minutes(30), true);
        assert_eq!(strict.inspect(&gateway, &repo(), Utc::now()), LockState::Active);
    }
}
