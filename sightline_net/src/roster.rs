// Ordered participant roster with disconnect renumbering.
//
// Both sides of the protocol keep one of these: the host's copy is the
// canonical index assignment (it is the only process that ever *allocates*
// an index), every client's copy is an eventually-consistent mirror rebuilt
// from the handshake snapshot and updated by `Joined`/`Disconnect` messages.
//
// The invariant after any operation: entries are ordered by index and the
// indices are exactly `0..len` with no gaps. Removing index k shifts every
// entry above k down by one.

use sightline_protocol::{PlayerIndex, RosterEntry};

#[derive(Clone, Debug, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a handshake snapshot. Entries are re-sorted by index so
    /// a well-formed snapshot always produces a gap-free roster.
    pub fn from_entries(mut entries: Vec<RosterEntry>) -> Self {
        entries.sort_by_key(|e| e.index);
        Self { entries }
    }

    /// Allocate the next sequential index for a new participant.
    pub fn push(&mut self, name: &str, team: &str) -> PlayerIndex {
        let index = PlayerIndex(self.entries.len() as u32);
        self.entries.push(RosterEntry {
            index,
            name: name.to_owned(),
            team: team.to_owned(),
        });
        index
    }

    /// Client-side: insert an entry announced by the host. The host hands
    /// out sequential indices, so this lands at the end; anything else is a
    /// protocol violation the caller may log.
    pub fn insert(&mut self, entry: RosterEntry) {
        if entry.index.slot() == self.entries.len() {
            self.entries.push(entry);
        }
    }

    /// Remove the participant at `index` and renumber everyone above it.
    pub fn remove(&mut self, index: PlayerIndex) -> Option<RosterEntry> {
        if index.slot() >= self.entries.len() {
            return None;
        }
        let removed = self.entries.remove(index.slot());
        for entry in &mut self.entries[index.slot()..] {
            entry.index.0 -= 1;
        }
        Some(removed)
    }

    pub fn get(&self, index: PlayerIndex) -> Option<&RosterEntry> {
        self.entries.get(index.slot())
    }

    pub fn contains(&self, index: PlayerIndex) -> bool {
        index.slot() < self.entries.len()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }
}
