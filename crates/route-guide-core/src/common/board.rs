//! Shared board of route notes, keyed by location.
//!
//! This is the only state mutated by concurrent sessions. A single
//! `RwLock` guards the whole map, so an append can never interleave with a
//! snapshot of the same location's list. Notes are kept for the life of the
//! process.

use crate::proto::{Point, RouteNote};
use parking_lot::RwLock;
use std::collections::HashMap;

type LocationKey = (i32, i32);

fn key(point: Option<&Point>) -> LocationKey {
    point.map_or((0, 0), |p| (p.latitude, p.longitude))
}

#[derive(Debug, Default)]
pub struct NoteBoard {
    notes: RwLock<HashMap<LocationKey, Vec<RouteNote>>>,
}

impl NoteBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `note` under its location. A note without a location is filed
    /// under the `(0, 0)` sentinel.
    pub fn record(&self, note: RouteNote) {
        let key = key(note.location.as_ref());
        self.notes.write().entry(key).or_default().push(note);
    }

    /// Copy of the notes recorded at `point` so far, oldest first.
    pub fn notes_at(&self, point: &Point) -> Vec<RouteNote> {
        self.notes
            .read()
            .get(&key(Some(point)))
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of notes on the board.
    pub fn len(&self) -> usize {
        self.notes.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct locations with at least one note.
    pub fn locations(&self) -> usize {
        self.notes.read().len()
    }
}
