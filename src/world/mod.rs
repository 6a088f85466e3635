pub mod snapshot;
pub mod terrain;

pub use snapshot::{
    ClusterKind, ClusterSnapshot, Entity, PlayerSnapshot, PointOfInterest, WorldSnapshot,
};
pub use terrain::TerrainImage;
