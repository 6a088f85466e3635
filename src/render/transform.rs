//! World to screen mapping
//!
//! World positions are centred on the world origin with Y (z on the wire)
//! growing upward. Screen space starts top-left with Y growing downward.

use crate::util::vec::{Vector2, Vector2i, Vector3};

/// Result of [`ScreenTransform::rescale`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scaled {
    /// Position in absolute world space (origin at the bottom-left corner)
    pub absolute_position: Vector2i,
    pub scaled_position: Vector2i,
    pub scaled_size: Vector2i,
}

/// Stateless mapping for one (world extent, viewport) pair.
///
/// Every method returns zero vectors when either size has a non-positive
/// component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenTransform {
    world_extent: Vector2i,
    viewport: Vector2i,
}

impl ScreenTransform {
    pub fn new(world_extent: Vector2i, viewport: Vector2i) -> Self {
        Self {
            world_extent,
            viewport,
        }
    }

    pub fn world_extent(&self) -> Vector2i {
        self.world_extent
    }

    pub fn viewport(&self) -> Vector2i {
        self.viewport
    }

    #[inline]
    fn is_valid(&self) -> bool {
        self.world_extent.is_positive() && self.viewport.is_positive()
    }

    /// Map an absolute world position to pixels. Positions need `flip_y`,
    /// sizes must not use it.
    pub fn world_to_screen(&self, pos: Vector2i, flip_y: bool) -> Vector2i {
        if !self.is_valid() {
            return Vector2i::ZERO;
        }
        let x = scale_axis(pos.x, self.world_extent.x, self.viewport.x);
        let mut y = scale_axis(pos.y, self.world_extent.y, self.viewport.y);
        if flip_y {
            y = self.viewport.y.saturating_sub(y);
        }
        Vector2i::new(x, y)
    }

    /// Move a centre-origin position to bottom-left origin, clamped at 0.
    /// Only x and z are touched.
    pub fn world_to_absolute_world(&self, pos: Vector3) -> Vector3 {
        if !self.is_valid() {
            return Vector3::ZERO;
        }
        let half = self.world_extent / 2;
        Vector3::new(
            (pos.x + half.x as f32).max(0.0),
            pos.y,
            (pos.z + half.y as f32).max(0.0),
        )
    }

    /// Recentre, then map the position with flip and the marker size
    /// without it
    pub fn rescale(&self, pos: Vector3, marker_size: Vector2i) -> Scaled {
        let absolute = self.world_to_absolute_world(pos);
        let absolute_position = Vector2i::new(absolute.x as i32, absolute.z as i32);
        Scaled {
            absolute_position,
            scaled_position: self.world_to_screen(absolute_position, true),
            scaled_size: self.world_to_screen(marker_size, false),
        }
    }

    /// [`Self::rescale`] for a horizontal-plane point
    pub fn rescale_point(&self, pos: Vector2i, marker_size: Vector2i) -> Scaled {
        self.rescale(Vector3::from_xz(pos), marker_size)
    }

    /// On-screen length of `blocks` world blocks
    pub fn rescale_blocks_to_screen(&self, blocks: i32) -> Vector2i {
        self.world_to_screen(Vector2i::splat(blocks), false)
    }

    /// Inverse of the flipped [`Self::world_to_screen`], into absolute world
    /// space
    pub fn screen_to_world(&self, screen: Vector2i) -> Vector2 {
        if !self.is_valid() {
            return Vector2::ZERO;
        }
        let ex = self.world_extent.x as f32;
        let ey = self.world_extent.y as f32;
        Vector2::new(
            screen.x as f32 / self.viewport.x as f32 * ex,
            ey - screen.y as f32 / self.viewport.y as f32 * ey,
        )
    }
}

/// `value / extent * size`, truncated toward zero
#[inline]
fn scale_axis(value: i32, extent: i32, size: i32) -> i32 {
    (value as f64 * size as f64 / extent as f64) as i32
}
