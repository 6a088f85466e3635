//! Draw-ready capture of the world, plus the status banner
//!
//! A `Scene` owns all of its data. Only the entity copy needs the world lock;
//! the grid depends on the extent alone and is laid out after release.

use std::fmt;

use crate::net::session::ConnectionState;
use crate::render::transform::ScreenTransform;
use crate::util::vec::Vector2i;
use crate::world::{ClusterKind, Entity, WorldSnapshot};

pub const PLAYER_MARKER: Vector2i = Vector2i { x: 50, y: 50 };
pub const CLUSTER_MARKER: Vector2i = Vector2i { x: 10, y: 10 };
/// World blocks between grid anchors on small worlds
pub const GRID_SPACING: i32 = 100;
/// World blocks covered by each axis line
pub const AXIS_BLOCKS: i32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Cluster(ClusterKind),
    PointOfInterest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneItem {
    pub kind: EntityKind,
    pub label: String,
    /// Screen position of the entity's anchor
    pub position: Vector2i,
    /// Screen size of the marker
    pub size: Vector2i,
}

impl SceneItem {
    fn from_entity(entity: Entity<'_>, transform: &ScreenTransform) -> Self {
        match entity {
            Entity::Player(player) => {
                let scaled = transform.rescale_point(player.location.to_vxz(), PLAYER_MARKER);
                Self {
                    kind: EntityKind::Player,
                    label: format!("gamestage {} ({})", player.gamestage, player.biome),
                    position: scaled.scaled_position,
                    size: scaled.scaled_size,
                }
            }
            Entity::Cluster(cluster) => {
                let scaled = transform.rescale(cluster.location, CLUSTER_MARKER);
                Self {
                    kind: EntityKind::Cluster(cluster.kind()),
                    label: cluster.cluster_type.clone(),
                    position: scaled.scaled_position,
                    size: scaled.scaled_size,
                }
            }
            Entity::PointOfInterest(zone) => {
                let scaled = transform.rescale_point(zone.position, zone.size);
                Self {
                    kind: EntityKind::PointOfInterest,
                    label: format!("density {:.2} count {}", zone.density, zone.count),
                    position: scaled.scaled_position,
                    size: scaled.scaled_size,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    pub transform: ScreenTransform,
    /// Terrain image dimensions, stretched over the whole viewport
    pub terrain_size: Option<(u32, u32)>,
    /// Items in draw order: clusters, players, zones
    pub items: Vec<SceneItem>,
    /// Screen positions of the grid crosses
    pub grid: Vec<Vector2i>,
    /// World blocks between grid anchors
    pub grid_spacing: i32,
    /// Half length of one grid cross arm
    pub grid_arm: Vector2i,
    pub axis_thickness: Vector2i,
}

impl Scene {
    /// Capture everything needed to draw `world`
    pub fn capture(world: &WorldSnapshot, viewport: Vector2i) -> Self {
        let mut scene = Self::capture_entities(world, viewport);
        scene.lay_out_grid();
        scene
    }

    /// Copy the entities out of `world`, leaving the grid empty. This is the
    /// only part that needs the world lock.
    pub fn capture_entities(world: &WorldSnapshot, viewport: Vector2i) -> Self {
        let transform = ScreenTransform::new(world.world_extent(), viewport);

        let items = world
            .entities()
            .map(|entity| SceneItem::from_entity(entity, &transform))
            .collect();

        Self {
            transform,
            terrain_size: world.terrain().map(|t| (t.width(), t.height())),
            items,
            grid: Vec::new(),
            grid_spacing: GRID_SPACING,
            grid_arm: Vector2i::ZERO,
            axis_thickness: transform.rescale_blocks_to_screen(AXIS_BLOCKS),
        }
    }

    /// Fill in the grid crosses from the world extent
    pub fn lay_out_grid(&mut self) {
        let transform = self.transform;
        let spacing = grid_spacing(transform.world_extent(), transform.viewport());
        let half = transform.world_extent() / 2;

        let mut grid = Vec::new();
        let mut x = -half.x;
        while x <= half.x {
            let mut y = -half.y;
            while y <= half.y {
                grid.push(
                    transform
                        .rescale_point(Vector2i::new(x, y), Vector2i::splat(1))
                        .scaled_position,
                );
                let Some(next) = y.checked_add(spacing) else {
                    break;
                };
                y = next;
            }
            let Some(next) = x.checked_add(spacing) else {
                break;
            };
            x = next;
        }

        self.grid = grid;
        self.grid_spacing = spacing;
        self.grid_arm = transform.rescale_blocks_to_screen(spacing);
    }

    pub fn count(&self, matches: impl Fn(&EntityKind) -> bool) -> usize {
        self.items.iter().filter(|item| matches(&item.kind)).count()
    }

    /// One-line description for logs
    pub fn summary(&self) -> String {
        let players = self.count(|k| *k == EntityKind::Player);
        let clusters = self.count(|k| matches!(k, EntityKind::Cluster(_)));
        let zones = self.count(|k| *k == EntityKind::PointOfInterest);
        let terrain = match self.terrain_size {
            Some((w, h)) => format!("{}x{}", w, h),
            None => "none".to_string(),
        };
        format!(
            "world {} | players {} | clusters {} | zones {} | terrain {}",
            self.transform.world_extent(),
            players,
            clusters,
            zones,
            terrain
        )
    }
}

/// [`GRID_SPACING`], doubled until there are at most half as many grid
/// cells per axis as viewport pixels
fn grid_spacing(extent: Vector2i, viewport: Vector2i) -> i32 {
    let max_cells = Vector2i::new((viewport.x / 2).max(1), (viewport.y / 2).max(1));
    let mut spacing = GRID_SPACING;
    while spacing < i32::MAX
        && (extent.x / spacing > max_cells.x || extent.y / spacing > max_cells.y)
    {
        spacing = spacing.saturating_mul(2);
    }
    spacing
}

/// Message shown instead of the world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBanner {
    NotConnected,
    LostConnection,
    Reconnecting,
    WorldNotLoaded,
}

impl StatusBanner {
    /// `None` when the world should be drawn
    pub fn for_state(state: ConnectionState, has_world: bool) -> Option<Self> {
        match state {
            ConnectionState::NotConnected => Some(StatusBanner::NotConnected),
            ConnectionState::LostConnection => Some(StatusBanner::LostConnection),
            ConnectionState::Reconnecting => Some(StatusBanner::Reconnecting),
            ConnectionState::Connected if !has_world => Some(StatusBanner::WorldNotLoaded),
            ConnectionState::Connected => None,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            StatusBanner::NotConnected => "Not connected.",
            StatusBanner::LostConnection => "Connection with the server was lost.",
            StatusBanner::Reconnecting => "Reconnecting.",
            StatusBanner::WorldNotLoaded => "World has not been loaded yet.",
        }
    }
}

impl fmt::Display for StatusBanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::vec::Vector3;
    use crate::world::{ClusterSnapshot, PlayerSnapshot, PointOfInterest, TerrainImage};

    fn world() -> WorldSnapshot {
        let mut world = WorldSnapshot::new(1000, Some(8));
        world.replace_players(vec![PlayerSnapshot {
            location: Vector3::new(0.0, 60.0, 0.0),
            gamestage: 12,
            biome: "pine_forest".to_string(),
        }]);
        world.replace_clusters(vec![
            ClusterSnapshot {
                cluster_type: "ScreamerHorde".to_string(),
                location: Vector3::new(100.0, 0.0, 100.0),
                density: 0.5,
            },
            ClusterSnapshot {
                cluster_type: "Unknown".to_string(),
                location: Vector3::ZERO,
                density: 0.1,
            },
        ]);
        world.append_zones(vec![PointOfInterest {
            position: Vector2i::new(-500, -500),
            size: Vector2i::new(200, 100),
            density: 0.25,
            count: 4,
            avg_zone_distance: 0.0,
            avg_weight: 0.0,
        }]);
        world
    }

    #[test]
    fn test_capture_items_in_draw_order() {
        let scene = Scene::capture(&world(), Vector2i::splat(500));
        let kinds: Vec<EntityKind> = scene.items.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EntityKind::Cluster(ClusterKind::Screamer),
                EntityKind::Cluster(ClusterKind::Other),
                EntityKind::Player,
                EntityKind::PointOfInterest,
            ]
        );
    }

    #[test]
    fn test_capture_marker_geometry() {
        let scene = Scene::capture(&world(), Vector2i::splat(500));

        let player = &scene.items[2];
        assert_eq!(player.position, Vector2i::new(250, 250));
        assert_eq!(player.size, Vector2i::new(25, 25));
        assert_eq!(player.label, "gamestage 12 (pine_forest)");

        let screamer = &scene.items[0];
        assert_eq!(screamer.position, Vector2i::new(300, 200));
        assert_eq!(screamer.size, Vector2i::new(5, 5));

        let zone = &scene.items[3];
        assert_eq!(zone.position, Vector2i::new(0, 500));
        assert_eq!(zone.size, Vector2i::new(100, 50));
    }

    #[test]
    fn test_grid_and_axis() {
        let scene = Scene::capture(&world(), Vector2i::splat(500));
        // -500..=500 step 100 on both axes
        assert_eq!(scene.grid.len(), 11 * 11);
        assert_eq!(scene.grid[0], Vector2i::new(0, 500));
        assert_eq!(scene.grid_spacing, GRID_SPACING);
        assert_eq!(scene.grid_arm, Vector2i::new(50, 50));
        assert_eq!(scene.axis_thickness, Vector2i::new(16, 16));
    }

    #[test]
    fn test_grid_is_bounded_by_viewport() {
        let world = WorldSnapshot::new(400_000, None);
        let scene = Scene::capture(&world, Vector2i::splat(1000));
        // 100 -> 200 -> 400 -> 800 blocks, 500 cells per axis
        assert_eq!(scene.grid_spacing, 800);
        assert_eq!(scene.grid.len(), 501 * 501);
        assert_eq!(scene.grid_arm, Vector2i::new(2, 2));

        let scene = Scene::capture(&WorldSnapshot::new(i32::MAX, None), Vector2i::splat(4));
        assert!(scene.grid.len() <= 9);

        let scene = Scene::capture(&world, Vector2i::ZERO);
        assert!(scene.grid.len() <= 4);
    }

    #[test]
    fn test_capture_entities_leaves_grid_empty() {
        let mut scene = Scene::capture_entities(&world(), Vector2i::splat(500));
        assert_eq!(scene.items.len(), 4);
        assert!(scene.grid.is_empty());

        scene.lay_out_grid();
        assert_eq!(scene, Scene::capture(&world(), Vector2i::splat(500)));
    }

    #[test]
    fn test_summary() {
        let mut world = world();
        world.set_terrain(TerrainImage::from_rgb(4, 2, &[]));
        let scene = Scene::capture(&world, Vector2i::splat(500));
        assert_eq!(
            scene.summary(),
            "world Vector2i [x: 1000, y: 1000] | players 1 | clusters 2 | zones 1 | terrain 4x2"
        );
    }

    #[test]
    fn test_status_banner() {
        assert_eq!(
            StatusBanner::for_state(ConnectionState::NotConnected, false).map(|b| b.message()),
            Some("Not connected.")
        );
        assert_eq!(
            StatusBanner::for_state(ConnectionState::LostConnection, true).map(|b| b.message()),
            Some("Connection with the server was lost.")
        );
        assert_eq!(
            StatusBanner::for_state(ConnectionState::Reconnecting, false).map(|b| b.message()),
            Some("Reconnecting.")
        );
        assert_eq!(
            StatusBanner::for_state(ConnectionState::Connected, false).map(|b| b.to_string()),
            Some("World has not been loaded yet.".to_string())
        );
        assert_eq!(StatusBanner::for_state(ConnectionState::Connected, true), None);
    }
}
