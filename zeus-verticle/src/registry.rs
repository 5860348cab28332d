// Pending verticle types awaiting deployment

use crate::discovery::VerticleType;
use parking_lot::Mutex;
use std::any::TypeId;
use std::collections::HashSet;
use zeus_core::Provider;

#[derive(Default)]
struct Candidates {
    pending: HashSet<VerticleType>,
    drained: HashSet<TypeId>,
}

/// Deduplicated set of verticle types found by discovery.
///
/// A type taken out for deployment is remembered and never accepted again,
/// so repeated discovery passes cannot cause a second deployment.
#[derive(Default)]
pub struct CandidateRegistry {
    inner: Mutex<Candidates>,
}

impl CandidateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a candidate; returns false if it is already pending or was deployed
    pub fn add(&self, verticle: VerticleType) -> bool {
        let mut inner = self.inner.lock();
        if inner.drained.contains(&verticle.type_id()) {
            return false;
        }
        inner.pending.insert(verticle)
    }

    /// Add several candidates, returning how many were new
    pub fn extend<I: IntoIterator<Item = VerticleType>>(&self, verticles: I) -> usize {
        verticles.into_iter().filter(|v| self.add(*v)).count()
    }

    /// Remove one pending candidate, marking it deployed
    pub fn take_one(&self) -> Option<VerticleType> {
        let mut inner = self.inner.lock();
        let next = inner.pending.iter().next().copied()?;
        inner.pending.remove(&next);
        inner.drained.insert(next.type_id());
        Some(next)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().pending.is_empty()
    }

    pub fn contains(&self, verticle: &VerticleType) -> bool {
        self.inner.lock().pending.contains(verticle)
    }

    /// Snapshot of the pending candidates
    pub fn pending(&self) -> Vec<VerticleType> {
        self.inner.lock().pending.iter().copied().collect()
    }
}

impl Provider for CandidateRegistry {}
