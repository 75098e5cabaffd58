use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, Weak},
};

use tokio::sync::{Mutex as SectionMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Default number of tracked entries before dead ones are swept
pub const DEFAULT_SWEEP_THRESHOLD: usize = 1024;

/// Registry of per-account exclusive sections
///
/// Each account gets its own async mutex, created on first use. The registry only holds weak
/// references: a section lives as long as someone holds or waits for it, and entries left
/// behind by idle accounts are swept once the registry grows past a threshold. Waiters are
/// served in FIFO order.
#[derive(Debug)]
pub struct AccountLocks {
    inner: Mutex<Registry>,
}

#[derive(Debug)]
struct Registry {
    sections: HashMap<Uuid, Weak<SectionMutex<()>>>,
    min_sweep_threshold: usize,
    sweep_at: usize,
}

/// Proof of holding an account's exclusive section
///
/// The section is released when the guard is dropped.
#[derive(Debug)]
pub struct SectionGuard {
    account_id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl SectionGuard {
    pub fn account_id(&self) -> Uuid {
        self.account_id
    }
}

impl AccountLocks {
    pub fn new(sweep_threshold: usize) -> Self {
        let min_sweep_threshold = sweep_threshold.max(1);
        Self {
            inner: Mutex::new(Registry {
                sections: HashMap::new(),
                min_sweep_threshold,
                sweep_at: min_sweep_threshold,
            }),
        }
    }

    /// Wait for exclusive access to an account
    ///
    /// Dropping the returned future before it resolves gives up the place in the queue without
    /// any other effect.
    pub async fn acquire(&self, account_id: Uuid) -> SectionGuard {
        let section = self.section(account_id);
        let guard = section.lock_owned().await;

        SectionGuard {
            account_id,
            _guard: guard,
        }
    }

    /// Take exclusive access to an account only if nobody holds or awaits it
    pub fn try_acquire(&self, account_id: Uuid) -> Option<SectionGuard> {
        let section = self.section(account_id);
        let guard = section.try_lock_owned().ok()?;

        Some(SectionGuard {
            account_id,
            _guard: guard,
        })
    }

    /// Number of entries currently in the registry, dead or alive
    pub fn tracked(&self) -> usize {
        self.registry().sections.len()
    }

    /// Number of sections currently held or awaited
    pub fn active(&self) -> usize {
        self.registry()
            .sections
            .values()
            .filter(|section| section.strong_count() > 0)
            .count()
    }

    /// Drop all entries whose section is no longer referenced
    pub fn sweep(&self) {
        let mut registry = self.registry();
        registry.sweep();
    }

    fn section(&self, account_id: Uuid) -> Arc<SectionMutex<()>> {
        let mut registry = self.registry();
        if let Some(section) = registry.sections.get(&account_id).and_then(Weak::upgrade) {
            return section;
        }

        let section = Arc::new(SectionMutex::new(()));
        registry
            .sections
            .insert(account_id, Arc::downgrade(&section));
        if registry.sections.len() >= registry.sweep_at {
            registry.sweep();
        }
        section
    }

    // The registry lock is never held across an await or user code, so a poisoned lock still
    // guards a consistent map.
    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AccountLocks {
    fn default() -> Self {
        Self::new(DEFAULT_SWEEP_THRESHOLD)
    }
}

impl Registry {
    fn sweep(&mut self) {
        let before = self.sections.len();
        self.sections
            .retain(|_, section| section.strong_count() > 0);
        // Grow the threshold with the live set so sweeping stays amortized
        self.sweep_at = (self.sections.len() * 2).max(self.min_sweep_threshold);
        tracing::trace!(
            before,
            after = self.sections.len(),
            "swept idle account sections"
        );
    }
}
