//! Orders concurrent oplog writers against tailing readers.
//!
//! Tracks the set of in-flight (uncommitted) record ids, the highest id
//! ever registered, the exclusive upper bound of ids known to have
//! resolved (`commit-boundary`), and the exclusive upper bound of ids
//! known durable (`persist-boundary`). A forward oplog cursor must gate
//! its reads by `persist-boundary` so it never observes an uncommitted or
//! non-durable entry.

use std::{
    collections::BTreeSet,
    sync::{Arc, Condvar, Mutex},
};

use crate::{error::Result, types::RecordId};

struct State {
    uncommitted: BTreeSet<RecordId>,
    highest_seen: Option<RecordId>,
    commit_boundary: RecordId,
    persist_boundary: RecordId,
}

impl State {
    fn assert_ordering(&self) {
        let highest_plus_one = self.highest_seen.map(|h| h.next()).unwrap_or(RecordId(0));
        if !(self.persist_boundary <= self.commit_boundary
            && self.commit_boundary <= highest_plus_one)
        {
            crate::fatal!(
                "visibility ordering violated: persist={} commit={} highest+1={}",
                self.persist_boundary.0,
                self.commit_boundary.0,
                highest_plus_one.0
            );
        }
    }
}

/// Coordinates ordering between concurrent oplog writers and readers. One
/// instance per open oplog ident.
pub struct VisibilityManager {
    state: Mutex<State>,
    cond: Condvar,
    /// Whether a sync is required before an insert becomes durable. When
    /// `false` (no journaling), `persist_boundary` tracks `commit_boundary`
    /// directly and no separate durability sync is awaited.
    durable_journaling: bool,
}

/// A pending registration returned by [`VisibilityManager::add_uncommitted`].
/// The recovery unit must resolve it via [`VisibilityManager::resolve`] on
/// commit or abort, via a registered [`crate::recovery_unit::Change`].
pub struct Registration {
    id: RecordId,
}

impl VisibilityManager {
    pub fn new(durable_journaling: bool) -> Arc<VisibilityManager> {
        Arc::new(VisibilityManager {
            state: Mutex::new(State {
                uncommitted: BTreeSet::new(),
                highest_seen: None,
                commit_boundary: RecordId(0),
                persist_boundary: RecordId(0),
            }),
            cond: Condvar::new(),
            durable_journaling,
        })
    }

    /// Register `id` as in-flight. Returns a [`Registration`] the caller
    /// must resolve exactly once when the enclosing recovery unit commits
    /// or aborts.
    pub fn add_uncommitted(&self, id: RecordId) -> Registration {
        let mut st = self.state.lock().unwrap();
        st.uncommitted.insert(id);
        st.highest_seen = Some(st.highest_seen.map_or(id, |h| h.max(id)));
        st.assert_ordering();
        Registration { id }
    }

    /// Resolve a prior registration. `committed` distinguishes a commit
    /// from an abort; both remove the id from `uncommitted` and recompute
    /// `commit_boundary`, since an aborted write must not block the
    /// boundary either.
    pub fn resolve(&self, reg: Registration, committed: bool) {
        let _ = committed;
        let mut st = self.state.lock().unwrap();
        st.uncommitted.remove(&reg.id);
        st.commit_boundary = match st.uncommitted.iter().next() {
            Some(min) => *min,
            None => st.highest_seen.map(|h| h.next()).unwrap_or(RecordId(0)),
        };
        if !self.durable_journaling {
            st.persist_boundary = st.commit_boundary;
        }
        st.assert_ordering();
        self.cond.notify_all();
    }

    /// Advance `persist_boundary` toward (but never past) `commit_boundary`,
    /// called by the durability manager after a successful backend sync.
    pub fn durable_callback(&self, new_persist: RecordId) {
        let mut st = self.state.lock().unwrap();
        if new_persist > st.persist_boundary {
            st.persist_boundary = new_persist.min(st.commit_boundary);
        }
        st.assert_ordering();
        self.cond.notify_all();
    }

    /// Current persist boundary: forward oplog cursors must read this
    /// *before* creating or repositioning their backend cursor.
    pub fn persist_boundary(&self) -> RecordId {
        self.state.lock().unwrap().persist_boundary
    }

    pub fn commit_boundary(&self) -> RecordId {
        self.state.lock().unwrap().commit_boundary
    }

    pub fn highest_seen(&self) -> Option<RecordId> {
        self.state.lock().unwrap().highest_seen
    }

    /// Block until either every registered id has resolved and is durable
    /// (`uncommitted` empty and `commit_boundary == persist_boundary`), or
    /// `persist_boundary` has advanced past `waiting_for` — whichever comes
    /// first lets a tailing reader either catch a fully quiesced oplog or
    /// pick up newly visible entries past the id it was blocked on.
    pub fn wait_for_all_visible(&self, waiting_for: RecordId) -> Result<()> {
        let st = self.state.lock().unwrap();
        let _st = self
            .cond
            .wait_while(st, |s| {
                let all_visible = s.uncommitted.is_empty() && s.commit_boundary == s.persist_boundary;
                let advanced_past = s.persist_boundary > waiting_for;
                !(all_visible || advanced_past)
            })
            .unwrap();
        Ok(())
    }

    /// Rewind `highest_seen`/`commit_boundary`/`persist_boundary` to `at`,
    /// used after truncating trailing oplog records away.
    pub fn rewind_to(&self, at: RecordId) {
        let mut st = self.state.lock().unwrap();
        st.highest_seen = if at.0 == 0 { None } else { Some(RecordId(at.0 - 1)) };
        st.commit_boundary = at;
        st.persist_boundary = at;
        st.uncommitted.retain(|id| *id < at);
        st.assert_ordering();
    }
}

#[cfg(test)]
#[path = "visibility_test.rs"]
mod visibility_test;
