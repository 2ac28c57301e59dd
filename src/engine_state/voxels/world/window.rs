//! The square window of chunk coordinates kept around the player.
//!
//! A chunk is *wanted* within `render_distance` (Chebyshev distance) of the
//! center and *kept* until it drifts past `render_distance + eviction_margin`.
//! The gap between the two radii stops chunks on the boundary from being
//! loaded and evicted over and over as the player walks back and forth.
//!
//! Both radii are capped at `MAX_RENDER_DISTANCE` and `MAX_EVICTION_MARGIN`,
//! and the window is cut off at the edge of the addressable chunk range.

use crate::engine_state::settings::{MAX_EVICTION_MARGIN, MAX_RENDER_DISTANCE};
use crate::engine_state::voxels::chunk::{ChunkCoord, BLOCK_WIDTH};

#[derive(Clone, Debug, PartialEq)]
pub struct StreamingWindow {
    center: Option<ChunkCoord>,
    render_distance: u32,
    eviction_margin: u32,
}

impl StreamingWindow {
    pub fn new(render_distance: u32, eviction_margin: u32) -> Self {
        StreamingWindow {
            center: None,
            render_distance: render_distance.min(MAX_RENDER_DISTANCE),
            eviction_margin: eviction_margin.min(MAX_EVICTION_MARGIN),
        }
    }

    pub fn center(&self) -> Option<ChunkCoord> {
        self.center
    }

    /// Moves the center. Returns `false` if it did not change.
    pub fn set_center(&mut self, center: ChunkCoord) -> bool {
        if self.center == Some(center) {
            return false;
        }
        self.center = Some(center);
        true
    }

    pub fn render_distance(&self) -> u32 {
        self.render_distance
    }

    /// Sets the radius, capped at `MAX_RENDER_DISTANCE`.
    pub fn set_render_distance(&mut self, render_distance: u32) {
        self.render_distance = render_distance.min(MAX_RENDER_DISTANCE);
    }

    /// Distance past which nothing is drawn, in blocks.
    pub fn fog_distance(&self) -> f32 {
        ((self.render_distance as f32 - 0.5) * BLOCK_WIDTH as f32).max(0.0)
    }

    /// Bound of block raycasts, in blocks. A zero radius still reaches across one chunk.
    pub fn max_ray_distance(&self) -> f32 {
        self.render_distance.max(1) as f32 * BLOCK_WIDTH as f32
    }

    pub fn wants(&self, coord: ChunkCoord) -> bool {
        self.center
            .is_some_and(|center| center.chebyshev_distance(coord) <= self.render_distance)
    }

    pub fn keeps(&self, coord: ChunkCoord) -> bool {
        self.center.is_some_and(|center| {
            center.chebyshev_distance(coord)
                <= self.render_distance.saturating_add(self.eviction_margin)
        })
    }

    /// Every wanted coordinate, nearest to the center first.
    pub fn wanted(&self) -> Vec<ChunkCoord> {
        let Some(center) = self.center else {
            return Vec::new();
        };
        let radius = self.render_distance as i32;
        let span = |middle: i32| {
            middle.saturating_sub(radius).max(ChunkCoord::MIN)
                ..=middle.saturating_add(radius).min(ChunkCoord::MAX)
        };
        let side = 2 * self.render_distance as usize + 1;
        let mut coords = Vec::with_capacity(side * side);
        for x in span(center.x) {
            for z in span(center.z) {
                coords.push(ChunkCoord::new(x, z));
            }
        }
        coords.sort_by_key(|coord| coord.distance_squared(center));
        coords
    }
}
