//! Decoded world state shared between the network loop and the renderer

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::util::vec::{Vector2i, Vector3};
use crate::world::terrain::TerrainImage;

/// A tracked player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub location: Vector3,
    pub gamestage: i32,
    pub biome: String,
}

impl fmt::Display for PlayerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Player [location: {}, gamestage: {}, biome: {}]",
            self.location, self.gamestage, self.biome
        )
    }
}

/// One horde instance, tagged with its horde type name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub cluster_type: String,
    pub location: Vector3,
    pub density: f32,
}

impl ClusterSnapshot {
    pub fn kind(&self) -> ClusterKind {
        ClusterKind::from_type_name(&self.cluster_type)
    }
}

impl fmt::Display for ClusterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cluster [type: {}, location: {}, density: {:.6}]",
            self.cluster_type, self.location, self.density
        )
    }
}

/// Known horde types. Matching is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterKind {
    WanderingAnimal,
    WanderingEnemy,
    Screamer,
    WanderingAnimalEnemy,
    Other,
}

impl ClusterKind {
    pub fn from_type_name(name: &str) -> Self {
        const KINDS: [(&str, ClusterKind); 4] = [
            ("WanderingAnimalHorde", ClusterKind::WanderingAnimal),
            ("WanderingEnemyHorde", ClusterKind::WanderingEnemy),
            ("ScreamerHorde", ClusterKind::Screamer),
            ("WanderingAnimalEnemyHorde", ClusterKind::WanderingAnimalEnemy),
        ];
        KINDS
            .iter()
            .find(|(type_name, _)| type_name.eq_ignore_ascii_case(name))
            .map(|(_, kind)| *kind)
            .unwrap_or(ClusterKind::Other)
    }
}

/// Rectangular point-of-interest zone with spawn statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub position: Vector2i,
    pub size: Vector2i,
    pub density: f32,
    pub count: i32,
    pub avg_zone_distance: f32,
    pub avg_weight: f32,
}

/// Borrowed view of one drawable item in the world
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Player(&'a PlayerSnapshot),
    Cluster(&'a ClusterSnapshot),
    PointOfInterest(&'a PointOfInterest),
}

/// Live world state for one session.
///
/// Created by the Init packet, then mutated in place by later packets.
/// Always accessed through the session's world lock.
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    world_extent: Vector2i,
    view_distance: Option<i32>,
    terrain: Option<TerrainImage>,
    players: Vec<PlayerSnapshot>,
    clusters: Vec<ClusterSnapshot>,
    zones: Vec<PointOfInterest>,
}

impl WorldSnapshot {
    /// Square world of `world_size` blocks per side
    pub fn new(world_size: i32, view_distance: Option<i32>) -> Self {
        Self {
            world_extent: Vector2i::splat(world_size),
            view_distance,
            terrain: None,
            players: Vec::new(),
            clusters: Vec::new(),
            zones: Vec::new(),
        }
    }

    pub fn world_extent(&self) -> Vector2i {
        self.world_extent
    }

    pub fn view_distance(&self) -> Option<i32> {
        self.view_distance
    }

    pub fn terrain(&self) -> Option<&TerrainImage> {
        self.terrain.as_ref()
    }

    pub fn set_terrain(&mut self, terrain: TerrainImage) {
        self.terrain = Some(terrain);
    }

    pub fn players(&self) -> &[PlayerSnapshot] {
        &self.players
    }

    pub fn clusters(&self) -> &[ClusterSnapshot] {
        &self.clusters
    }

    pub fn zones(&self) -> &[PointOfInterest] {
        &self.zones
    }

    /// Clear, then repopulate. No merge with the previous list.
    pub fn replace_players(&mut self, players: Vec<PlayerSnapshot>) {
        self.players.clear();
        self.players.extend(players);
    }

    /// Clear, then repopulate. No merge with the previous list.
    pub fn replace_clusters(&mut self, clusters: Vec<ClusterSnapshot>) {
        self.clusters.clear();
        self.clusters.extend(clusters);
    }

    /// Zones accumulate for the whole session
    pub fn append_zones(&mut self, zones: Vec<PointOfInterest>) {
        self.zones.extend(zones);
    }

    /// Everything drawable, in draw order: clusters, players, zones
    pub fn entities(&self) -> impl Iterator<Item = Entity<'_>> {
        self.clusters
            .iter()
            .map(Entity::Cluster)
            .chain(self.players.iter().map(Entity::Player))
            .chain(self.zones.iter().map(Entity::PointOfInterest))
    }
}

impl fmt::Display for WorldSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "World [size: {}]", self.world_extent)
    }
}
