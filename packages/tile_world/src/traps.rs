//! Index of where each kind of trap lies in the loaded window.

use chunk_data::*;
use std::collections::{
    HashMap,
    HashSet,
};
use vek::*;


/// Global tile coordinates of every loaded trap, by trap kind. Null traps are
/// never indexed.
#[derive(Debug, Default)]
pub struct TrapIndex {
    locations: HashMap<TrapId, HashSet<Vec3<i32>>>,
}

impl TrapIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, trap: TrapId, gtc: Vec3<i32>) {
        if !trap.is_null() {
            self.locations.entry(trap).or_default().insert(gtc);
        }
    }

    pub fn remove(&mut self, trap: TrapId, gtc: Vec3<i32>) {
        if let Some(set) = self.locations.get_mut(&trap) {
            set.remove(&gtc);
            if set.is_empty() {
                self.locations.remove(&trap);
            }
        }
    }

    /// Index every trap of a chunk at chunk coordinate `cc`.
    pub fn add_chunk(&mut self, cc: Vec3<i32>, chunk: &Chunk) {
        for lti in 0..=MAX_LTI {
            self.insert(chunk.trp[lti], cc_ltc_to_gtc(cc, lti_to_ltc(lti)));
        }
    }

    /// Forget every trap of a chunk at chunk coordinate `cc`.
    pub fn remove_chunk(&mut self, cc: Vec3<i32>, chunk: &Chunk) {
        for lti in 0..=MAX_LTI {
            self.remove(chunk.trp[lti], cc_ltc_to_gtc(cc, lti_to_ltc(lti)));
        }
    }

    /// Global tile coordinates of every trap of a kind, sorted by z, then y,
    /// then x.
    pub fn locations(&self, trap: TrapId) -> Vec<Vec3<i32>> {
        let mut gtcs = self.locations
            .get(&trap)
            .map(|set| set.iter().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        gtcs.sort_by_key(|gtc| (gtc.z, gtc.y, gtc.x));
        gtcs
    }

    /// Total number of indexed traps.
    pub fn len(&self) -> usize {
        self.locations.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
