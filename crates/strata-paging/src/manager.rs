use std::collections::VecDeque;

use crate::config::PagingConfig;
use crate::error::TileError;
use crate::tile::{Tile, TileId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TilePoolStats {
    pub tiles: usize,
    pub free: usize,
    pub increment: usize,
    pub grow_events: u64,
}

/// Slot arena of tiles plus a FIFO queue of the unused ones.
///
/// Tiles are never deallocated; a freed tile keeps its [`TileId`] and is
/// handed out again by a later [`get_tile`](Self::get_tile). Growth happens
/// only when the free queue is empty, in batches of `increment`, and each
/// batch grows the next one by 10%.
pub struct TileManager {
    pub(crate) tiles: Vec<Tile>,
    free: VecDeque<TileId>,
    increment: usize,
    grow_events: u64,
}

impl TileManager {
    pub fn new(config: &PagingConfig) -> Self {
        Self::with_capacity(config.initial_pool_size, config.pool_increment)
    }

    pub fn with_capacity(initial: usize, increment: usize) -> Self {
        let mut mgr = Self {
            tiles: Vec::with_capacity(initial),
            free: VecDeque::with_capacity(initial),
            increment: increment.max(1),
            grow_events: 0,
        };
        mgr.allocate(initial);
        mgr
    }

    /// Takes a tile from the free queue, growing the arena when it is empty.
    pub fn get_tile(&mut self) -> TileId {
        if self.free.is_empty() {
            self.grow();
        }
        // grow() always adds at least one tile
        let id = self.free.pop_front().unwrap_or_else(|| self.mint());
        self.tiles[id.index()].queued_free = false;
        id
    }

    /// Returns a released tile to the free queue.
    ///
    /// The tile must already be released: the pool does not reset it.
    pub fn free_tile(&mut self, id: TileId) -> Result<(), TileError> {
        let tile = self
            .tiles
            .get_mut(id.index())
            .ok_or(TileError::UnknownTile(id))?;
        if tile.is_initialized() || tile.queued_free {
            return Err(TileError::InvalidState {
                tile: id,
                expected: "released and not already free",
                found: tile.state,
            });
        }
        tile.queued_free = true;
        self.free.push_back(id);
        Ok(())
    }

    #[inline]
    pub fn num_tiles(&self) -> usize {
        self.tiles.len()
    }

    #[inline]
    pub fn num_free(&self) -> usize {
        self.free.len()
    }

    /// Size of the next growth batch.
    #[inline]
    pub fn increment(&self) -> usize {
        self.increment
    }

    #[inline]
    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.index())
    }

    pub fn is_free(&self, id: TileId) -> bool {
        self.tile(id).map(|t| t.queued_free).unwrap_or(false)
    }

    /// Ids of tiles currently handed out.
    pub fn active(&self) -> impl Iterator<Item = TileId> + '_ {
        self.tiles
            .iter()
            .filter(|t| t.is_initialized())
            .map(|t| t.id)
    }

    pub fn stats(&self) -> TilePoolStats {
        TilePoolStats {
            tiles: self.tiles.len(),
            free: self.free.len(),
            increment: self.increment,
            grow_events: self.grow_events,
        }
    }

    pub(crate) fn tile_mut(&mut self, id: TileId) -> Result<&mut Tile, TileError> {
        self.tiles
            .get_mut(id.index())
            .ok_or(TileError::UnknownTile(id))
    }

    pub(crate) fn tile_ref(&self, id: TileId) -> Result<&Tile, TileError> {
        self.tiles.get(id.index()).ok_or(TileError::UnknownTile(id))
    }

    fn grow(&mut self) {
        let batch = self.increment;
        self.allocate(batch);
        self.grow_events += 1;
        // +10%, rounded up so small increments still grow
        self.increment = batch + batch.div_ceil(10);
        log::info!(
            target: "pool",
            "tile pool grew by {} to {} tiles; next increment {}",
            batch,
            self.tiles.len(),
            self.increment
        );
    }

    fn allocate(&mut self, count: usize) {
        for _ in 0..count {
            let id = self.mint();
            self.tiles[id.index()].queued_free = true;
            self.free.push_back(id);
        }
    }

    fn mint(&mut self) -> TileId {
        let id = TileId(self.tiles.len() as u32);
        self.tiles.push(Tile::new(id));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preallocates_initial_tiles() {
        let mgr = TileManager::with_capacity(8, 4);
        assert_eq!(mgr.num_tiles(), 8);
        assert_eq!(mgr.num_free(), 8);
        assert!(mgr.is_free(TileId(0)));
    }

    #[test]
    fn free_queue_is_fifo() {
        let mut mgr = TileManager::with_capacity(3, 1);
        assert_eq!(mgr.get_tile(), TileId(0));
        assert_eq!(mgr.get_tile(), TileId(1));
        mgr.free_tile(TileId(0)).unwrap();
        assert_eq!(mgr.get_tile(), TileId(2));
        assert_eq!(mgr.get_tile(), TileId(0));
    }

    #[test]
    fn grows_only_when_empty_and_increment_rises_ten_percent() {
        let mut mgr = TileManager::with_capacity(2, 10);
        mgr.get_tile();
        mgr.get_tile();
        assert_eq!(mgr.num_tiles(), 2);
        assert_eq!(mgr.num_free(), 0);

        let t = mgr.get_tile();
        assert_eq!(t, TileId(2));
        assert_eq!(mgr.num_tiles(), 12);
        assert_eq!(mgr.num_free(), 9);
        assert_eq!(mgr.increment(), 11);

        for _ in 0..9 {
            mgr.get_tile();
        }
        assert_eq!(mgr.num_tiles(), 12);
        mgr.get_tile();
        assert_eq!(mgr.num_tiles(), 23);
        assert_eq!(mgr.increment(), 13);
        assert_eq!(mgr.stats().grow_events, 2);
    }

    #[test]
    fn small_increment_still_grows() {
        let mut mgr = TileManager::with_capacity(0, 1);
        mgr.get_tile();
        assert_eq!(mgr.num_tiles(), 1);
        assert_eq!(mgr.increment(), 2);
    }

    #[test]
    fn double_free_is_rejected() {
        let mut mgr = TileManager::with_capacity(1, 1);
        let t = mgr.get_tile();
        mgr.free_tile(t).unwrap();
        assert!(matches!(
            mgr.free_tile(t),
            Err(TileError::InvalidState { .. })
        ));
        assert_eq!(mgr.num_free(), 1);
        assert_eq!(mgr.free_tile(TileId(99)), Err(TileError::UnknownTile(TileId(99))));
    }
}
