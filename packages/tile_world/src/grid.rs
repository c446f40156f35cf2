//! The in-memory window of chunks and their caches.

use crate::{
    cache::{
        ChunkCache,
        CacheSource,
    },
    window::Window,
};
use chunk_data::*;
use std::{
    cell::{
        Ref,
        RefCell,
    },
    mem::{
        replace,
        take,
    },
};
use vek::*;


/// Fixed-capacity box of chunk slots, each possibly empty, each with a cache.
#[derive(Debug)]
pub struct ChunkGrid {
    window: Window,
    chunks: Vec<Option<Chunk>>,
    caches: Vec<RefCell<ChunkCache>>,
}

fn empty_slots(window: Window) -> (Vec<Option<Chunk>>, Vec<RefCell<ChunkCache>>) {
    let n = window.slot_count();
    (
        (0..n).map(|_| None).collect(),
        (0..n).map(|_| RefCell::new(ChunkCache::new())).collect(),
    )
}

impl ChunkGrid {
    /// Construct with every slot empty.
    pub fn new(window: Window) -> Self {
        let (chunks, caches) = empty_slots(window);
        ChunkGrid { window, chunks, caches }
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn chunk(&self, gp: Vec3<i32>) -> Option<&Chunk> {
        if !self.window.gp_inbounds(gp) {
            return None;
        }
        self.chunks[self.window.slot(gp)].as_ref()
    }

    pub fn chunk_mut(&mut self, gp: Vec3<i32>) -> Option<&mut Chunk> {
        if !self.window.gp_inbounds(gp) {
            return None;
        }
        let slot = self.window.slot(gp);
        self.chunks[slot].as_mut()
    }

    pub fn is_loaded(&self, gp: Vec3<i32>) -> bool {
        self.chunk(gp).is_some()
    }

    /// Chunk and lti of a position, if in bounds and loaded.
    pub fn tile(&self, pos: Vec3<i32>) -> Option<(&Chunk, u8)> {
        if !self.window.inbounds(pos) {
            return None;
        }
        let lti = self.window.pos_lti(pos);
        self.chunk(self.window.pos_gp(pos)).map(|chunk| (chunk, lti))
    }

    pub fn tile_mut(&mut self, pos: Vec3<i32>) -> Option<(&mut Chunk, u8)> {
        if !self.window.inbounds(pos) {
            return None;
        }
        let lti = self.window.pos_lti(pos);
        let gp = self.window.pos_gp(pos);
        self.chunk_mut(gp).map(|chunk| (chunk, lti))
    }

    /// Install a chunk into an in-bounds slot with a dirty cache, returning
    /// whatever was there.
    pub fn put(&mut self, gp: Vec3<i32>, chunk: Chunk) -> Option<Chunk> {
        let slot = self.window.slot(gp);
        self.caches[slot].get_mut().mark_dirty();
        self.chunks[slot].replace(chunk)
    }

    pub fn take(&mut self, gp: Vec3<i32>) -> Option<Chunk> {
        if !self.window.gp_inbounds(gp) {
            return None;
        }
        let slot = self.window.slot(gp);
        self.caches[slot].get_mut().mark_dirty();
        self.chunks[slot].take()
    }

    /// Every loaded chunk with its grid position.
    pub fn loaded(&self) -> impl Iterator<Item=(Vec3<i32>, &Chunk)> + '_ {
        let window = self.window;
        self.chunks.iter().enumerate()
            .filter_map(move |(slot, chunk)| chunk.as_ref().map(|chunk| (window.slot_gp(slot), chunk)))
    }

    pub fn loaded_mut(&mut self) -> impl Iterator<Item=(Vec3<i32>, &mut Chunk)> + '_ {
        let window = self.window;
        self.chunks.iter_mut().enumerate()
            .filter_map(move |(slot, chunk)| chunk.as_mut().map(|chunk| (window.slot_gp(slot), chunk)))
    }

    /// Grid positions of every empty slot.
    pub fn empty_gps(&self) -> Vec<Vec3<i32>> {
        self.window.gps().filter(|&gp| !self.is_loaded(gp)).collect()
    }

    /// Move the window origin by `delta` chunks. Chunks that stay within the
    /// window keep their caches. Returns the chunks that left the window,
    /// keyed by chunk coordinate.
    pub fn shift(&mut self, delta: Vec3<i32>) -> Vec<(Vec3<i32>, Chunk)> {
        let old_window = self.window;
        let new_window = old_window.shifted(delta);
        let (mut chunks, mut caches) = empty_slots(new_window);
        let mut old_chunks = take(&mut self.chunks);
        let mut old_caches = take(&mut self.caches);

        for gp in new_window.gps() {
            let old_gp = gp + delta;
            if !old_window.gp_inbounds(old_gp) {
                continue;
            }
            let old_slot = old_window.slot(old_gp);
            if let Some(chunk) = old_chunks[old_slot].take() {
                let slot = new_window.slot(gp);
                chunks[slot] = Some(chunk);
                caches[slot] = replace(&mut old_caches[old_slot], RefCell::new(ChunkCache::new()));
            }
        }

        self.window = new_window;
        self.chunks = chunks;
        self.caches = caches;

        old_chunks.into_iter().enumerate()
            .filter_map(|(slot, chunk)| {
                chunk.map(|chunk| (old_window.gp_cc(old_window.slot_gp(slot)), chunk))
            })
            .collect()
    }

    /// Empty every slot and move the window to a new origin. Returns the
    /// chunks that were loaded, keyed by chunk coordinate.
    pub fn relocate(&mut self, abs_sub: Vec3<i32>) -> Vec<(Vec3<i32>, Chunk)> {
        let old_window = self.window;
        let (chunks, caches) = empty_slots(self.window);
        let old_chunks = replace(&mut self.chunks, chunks);
        self.caches = caches;
        self.window.abs_sub = abs_sub;
        old_chunks.into_iter().enumerate()
            .filter_map(|(slot, chunk)| {
                chunk.map(|chunk| (old_window.gp_cc(old_window.slot_gp(slot)), chunk))
            })
            .collect()
    }

    /// Cache of a loaded chunk, rebuilt first if dirty.
    pub fn cache<S>(&self, gp: Vec3<i32>, src: &S) -> Option<Ref<'_, ChunkCache>>
    where
        S: CacheSource + ?Sized,
    {
        if !self.is_loaded(gp) {
            return None;
        }
        let cell = &self.caches[self.window.slot(gp)];
        if cell.borrow().is_dirty() {
            trace!(?gp, "rebuilding chunk cache");
            cell.borrow_mut().rebuild(gp, src);
        }
        Some(cell.borrow())
    }

    /// Whether a loaded chunk's cache is currently valid.
    pub fn cache_is_valid(&self, gp: Vec3<i32>) -> bool {
        self.is_loaded(gp) && !self.caches[self.window.slot(gp)].borrow().is_dirty()
    }

    pub fn mark_dirty(&self, gp: Vec3<i32>) {
        if self.window.gp_inbounds(gp) {
            self.caches[self.window.slot(gp)].borrow_mut().mark_dirty();
        }
    }

    fn mark_pos_dirty(&self, pos: Vec3<i32>) {
        if self.window.inbounds(pos) {
            self.mark_dirty(self.window.pos_gp(pos));
        }
    }

    /// Invalidate after terrain or furniture changed at a position.
    ///
    /// Outdoors spreads to neighbors, and the level below sees up through
    /// this tile's floor.
    pub fn dirty_structure(&self, pos: Vec3<i32>) {
        for dy in -1..=1 {
            for dx in -1..=1 {
                self.mark_pos_dirty(pos + Vec3::new(dx, dy, 0));
            }
        }
        self.mark_pos_dirty(pos - Vec3::unit_z());
    }

    /// Invalidate after field state changed at a position.
    pub fn dirty_fields(&self, pos: Vec3<i32>) {
        self.mark_pos_dirty(pos);
    }

    /// Invalidate after a vehicle part arrived at or left a position.
    pub fn dirty_vehicle_cover(&self, pos: Vec3<i32>) {
        self.mark_pos_dirty(pos);
        self.mark_pos_dirty(pos + Vec3::unit_z());
    }

    /// Invalidate the chunks whose caches read from a chunk that was just
    /// installed at `gp`.
    pub fn dirty_around(&self, gp: Vec3<i32>) {
        for dy in -1..=1 {
            for dx in -1..=1 {
                self.mark_dirty(gp + Vec3::new(dx, dy, 0));
            }
        }
        self.mark_dirty(gp - Vec3::unit_z());
        self.mark_dirty(gp + Vec3::unit_z());
    }
}
