use futures::lock::Mutex;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// How long an unused per-user lock stays cached.
const LOCK_IDLE_TTL: Duration = Duration::from_secs(600);

/// Per-user async mutexes serializing read-decide-write sequences.
///
/// Entries only expire after sitting idle, so a lock that is currently held
/// (and was therefore just fetched) is never replaced underneath its holder.
#[derive(Clone)]
pub struct UserLocks {
    locks: Cache<String, Arc<Mutex<()>>>,
}

impl Default for UserLocks {
    fn default() -> Self {
        Self::with_idle_ttl(LOCK_IDLE_TTL)
    }
}

impl UserLocks {
    pub fn with_idle_ttl(idle: Duration) -> Self {
        Self {
            locks: Cache::builder().time_to_idle(idle).build(),
        }
    }

    /// Lock handle for a user; the same handle is returned while it is live.
    pub async fn for_user(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .get_with(user_id.to_string(), async { Arc::new(Mutex::new(())) })
            .await
    }
}
