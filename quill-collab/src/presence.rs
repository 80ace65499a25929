//! Client-side presence: who is in the session and where their caret is.
//!
//! The store is the authoritative local view of *remote* participants. The
//! local user is never tracked here — they are self-evident to the embedding
//! editor and the relay never echoes their own join back.
//!
//! Two reconciliation paths feed the store:
//! - incremental events (`user-joined`, `user-left`, `cursor-moved`,
//!   `selection-changed`), applied in transport order;
//! - full `presence-update` snapshots, which atomically replace everything
//!   (last received wins).
//!
//! A cursor or selection event for an id that was never joined is a no-op:
//! synthesizing a participant from it would plant an entry with no display
//! metadata if events arrive reordered.

use std::collections::HashMap;

use crate::color::{color_for, Color};
use crate::protocol::{CursorPosition, PresenceEntry, SelectionRange};

/// A remote participant in the collaboration session.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub avatar: String,
    /// Computed locally from `id`, never transmitted.
    pub color: Color,
    pub cursor: Option<CursorPosition>,
    pub selection: Option<SelectionRange>,
}

impl Participant {
    /// Build a participant from join metadata. Cursor and selection start
    /// absent until first reported.
    pub fn new(id: impl Into<String>, name: impl Into<String>, avatar: impl Into<String>) -> Self {
        let id = id.into();
        let color = color_for(&id);
        Self {
            id,
            name: name.into(),
            avatar: avatar.into(),
            color,
            cursor: None,
            selection: None,
        }
    }
}

impl From<PresenceEntry> for Participant {
    fn from(entry: PresenceEntry) -> Self {
        let color = color_for(&entry.user_id);
        Self {
            id: entry.user_id,
            name: entry.user_name,
            avatar: entry.user_avatar,
            color,
            cursor: entry.cursor,
            selection: entry.selection,
        }
    }
}

/// Ordered map of remote participants for one document session.
///
/// Iteration order is insertion order (snapshot order after a snapshot), so
/// UI participant lists don't visibly reshuffle on every update. None of the
/// apply operations can fail; invalid input is ignored.
#[derive(Debug)]
pub struct PresenceStore {
    local_id: String,
    entries: HashMap<String, Participant>,
    order: Vec<String>,
}

impl PresenceStore {
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Insert or overwrite a participant. The local user is never stored.
    /// Overwriting keeps the original position in the ordering.
    pub fn apply_join(&mut self, participant: Participant) {
        if participant.id == self.local_id {
            return;
        }
        if !self.entries.contains_key(&participant.id) {
            self.order.push(participant.id.clone());
        }
        self.entries.insert(participant.id.clone(), participant);
    }

    /// Remove a participant; no-op if unknown.
    pub fn apply_leave(&mut self, id: &str) {
        if self.entries.remove(id).is_some() {
            self.order.retain(|entry| entry != id);
        }
    }

    /// Update the cursor of an existing participant. Unknown ids are ignored
    /// rather than synthesized (reordering guard).
    pub fn apply_cursor(&mut self, id: &str, position: CursorPosition) {
        if let Some(participant) = self.entries.get_mut(id) {
            participant.cursor = Some(position);
        }
    }

    /// Update the selection of an existing participant; same contract as
    /// [`apply_cursor`](Self::apply_cursor).
    pub fn apply_selection(&mut self, id: &str, selection: SelectionRange) {
        if let Some(participant) = self.entries.get_mut(id) {
            participant.selection = Some(selection);
        }
    }

    /// Atomically replace the whole store with a snapshot, recomputing
    /// colors. The snapshot is authoritative: prior entries are discarded,
    /// not merged. Entries for the local user are filtered out.
    pub fn apply_snapshot(&mut self, entries: Vec<PresenceEntry>) {
        self.entries.clear();
        self.order.clear();
        for entry in entries {
            if entry.user_id == self.local_id {
                continue;
            }
            let participant = Participant::from(entry);
            if !self.entries.contains_key(&participant.id) {
                self.order.push(participant.id.clone());
            }
            self.entries.insert(participant.id.clone(), participant);
        }
    }

    /// All participants in stable insertion order.
    pub fn all(&self) -> Vec<&Participant> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Used when a connection is torn down for good.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }
}
