//! Edge Locks
//!
//! Bound-state table indexed by system edge. A lock is only ever taken through
//! an [`EdgeLease`], which releases everything it holds when dropped, so an
//! early `?` return from the recursion cannot leave an edge stuck.

use petgraph::graph::EdgeIndex;
use std::ops::{Deref, DerefMut};

/// One flag per system edge
#[derive(Debug, Clone, Default)]
pub struct EdgeLocks {
    locked: Vec<bool>,
}

impl EdgeLocks {
    pub fn new(edge_count: usize) -> Self {
        Self {
            locked: vec![false; edge_count],
        }
    }

    pub fn is_locked(&self, edge: EdgeIndex) -> bool {
        self.locked.get(edge.index()).copied().unwrap_or(false)
    }

    /// Number of edges currently held
    pub fn held(&self) -> usize {
        self.locked.iter().filter(|l| **l).count()
    }

    /// An empty lease; edges are added with [`EdgeLease::acquire_more`]
    pub fn lease(&mut self) -> EdgeLease<'_> {
        EdgeLease {
            locks: self,
            held: Vec::new(),
        }
    }

    /// Lock `edge` for the lifetime of the returned lease; `None` if it is taken
    pub fn acquire(&mut self, edge: EdgeIndex) -> Option<EdgeLease<'_>> {
        let mut lease = self.lease();
        if lease.acquire_more(edge) {
            Some(lease)
        } else {
            None
        }
    }

    fn set(&mut self, edge: EdgeIndex, value: bool) {
        let idx = edge.index();
        if idx >= self.locked.len() {
            self.locked.resize(idx + 1, false);
        }
        self.locked[idx] = value;
    }
}

/// Scope guard over a set of locked edges
#[derive(Debug)]
pub struct EdgeLease<'a> {
    locks: &'a mut EdgeLocks,
    held: Vec<EdgeIndex>,
}

impl<'a> EdgeLease<'a> {
    /// Lock another edge under this lease; false if it is taken
    pub fn acquire_more(&mut self, edge: EdgeIndex) -> bool {
        if self.locks.is_locked(edge) {
            return false;
        }
        self.locks.set(edge, true);
        self.held.push(edge);
        true
    }
}

impl Deref for EdgeLease<'_> {
    type Target = EdgeLocks;

    fn deref(&self) -> &EdgeLocks {
        self.locks
    }
}

impl DerefMut for EdgeLease<'_> {
    fn deref_mut(&mut self) -> &mut EdgeLocks {
        self.locks
    }
}

impl Drop for EdgeLease<'_> {
    fn drop(&mut self) {
        for edge in self.held.drain(..) {
            self.locks.set(edge, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fail_inside(locks: &mut EdgeLocks, edge: EdgeIndex) -> Result<(), String> {
        let _lease = locks.acquire(edge).ok_or("taken")?;
        Err("branch aborted".to_string())
    }

    #[test]
    fn test_lease_releases_on_drop() {
        let mut locks = EdgeLocks::new(3);
        {
            let mut lease = locks.acquire(EdgeIndex::new(0)).unwrap();
            assert!(lease.acquire_more(EdgeIndex::new(2)));
            assert!(!lease.acquire_more(EdgeIndex::new(0)));
            assert_eq!(lease.held(), 2);
        }
        assert_eq!(locks.held(), 0);
    }

    #[test]
    fn test_nested_leases() {
        let mut locks = EdgeLocks::new(2);
        let mut outer = locks.acquire(EdgeIndex::new(0)).unwrap();
        assert!(outer.acquire(EdgeIndex::new(0)).is_none());
        {
            let inner = outer.acquire(EdgeIndex::new(1)).unwrap();
            assert!(inner.is_locked(EdgeIndex::new(0)));
            assert!(inner.is_locked(EdgeIndex::new(1)));
        }
        assert!(!outer.is_locked(EdgeIndex::new(1)));
        drop(outer);
        assert_eq!(locks.held(), 0);
    }

    #[test]
    fn test_empty_lease_collects_edges() {
        let mut locks = EdgeLocks::new(3);
        let first = locks.acquire(EdgeIndex::new(1)).unwrap();
        drop(first);
        {
            let mut lease = locks.lease();
            assert_eq!(lease.held(), 0);
            assert!(lease.acquire_more(EdgeIndex::new(1)));
            assert!(lease.acquire_more(EdgeIndex::new(2)));
        }
        assert_eq!(locks.held(), 0);
    }

    #[test]
    fn test_early_error_does_not_leak_lock() {
        let mut locks = EdgeLocks::new(1);
        assert!(fail_inside(&mut locks, EdgeIndex::new(0)).is_err());
        assert!(!locks.is_locked(EdgeIndex::new(0)));
    }
}
