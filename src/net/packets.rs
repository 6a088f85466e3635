//! Packet kinds, the static registry, and dispatch onto the world snapshot
//!
//! Every payload is decoded in full into a [`Packet`] before anything is
//! applied, so a payload that fails halfway leaves the world untouched.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::net::codec::{DecodeError, PacketReader, PacketWriter};
use crate::net::constants::packet_id;
use crate::util::vec::Vector3;
use crate::world::{ClusterSnapshot, PlayerSnapshot, PointOfInterest, TerrainImage, WorldSnapshot};

/// A fully decoded packet
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Starts a new world of `world_size` x `world_size` blocks
    Init { world_size: i32, view_distance: i32 },
    /// Biome map
    Biomes(TerrainImage),
    Zones(Vec<PointOfInterest>),
    /// Reserved, carries nothing we use
    Heat,
    /// All players, flattened from their groups
    Players(Vec<PlayerSnapshot>),
    /// All clusters, flattened from their per-type lists
    Clusters(Vec<ClusterSnapshot>),
    /// Reserved, carries nothing we use
    Event,
}

impl Packet {
    pub fn id(&self) -> i16 {
        match self {
            Packet::Init { .. } => packet_id::INIT,
            Packet::Biomes(_) => packet_id::BIOMES,
            Packet::Zones(_) => packet_id::ZONES,
            Packet::Heat => packet_id::HEAT,
            Packet::Players(_) => packet_id::PLAYERS,
            Packet::Clusters(_) => packet_id::CLUSTERS,
            Packet::Event => packet_id::EVENT,
        }
    }

    /// Mutate the live world. Init replaces it, the reserved packets never
    /// touch it, everything else needs one.
    pub fn apply(self, world: &mut Option<WorldSnapshot>) -> Result<(), DispatchError> {
        let packet = packet_name(self.id());
        match self {
            Packet::Init {
                world_size,
                view_distance,
            } => {
                *world = Some(WorldSnapshot::new(world_size, Some(view_distance)));
                return Ok(());
            }
            Packet::Heat | Packet::Event => {
                debug!(packet, "Ignoring reserved packet");
                return Ok(());
            }
            _ => {}
        }

        let world = world.as_mut().ok_or(DispatchError::NoWorld { packet })?;
        match self {
            Packet::Biomes(image) => world.set_terrain(image),
            Packet::Zones(zones) => world.append_zones(zones),
            Packet::Players(players) => world.replace_players(players),
            Packet::Clusters(clusters) => world.replace_clusters(clusters),
            Packet::Init { .. } | Packet::Heat | Packet::Event => {}
        }
        Ok(())
    }
}

/// Errors from dispatching one frame. None of these end the connection.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Unrecognized packet id {0}")]
    UnknownPacket(i16),
    #[error("Packet {packet} received before Init")]
    NoWorld { packet: &'static str },
    #[error("Failed to decode packet {packet}: {source}")]
    Decode {
        packet: &'static str,
        #[source]
        source: DecodeError,
    },
}

pub type DecodeFn = fn(&mut PacketReader<'_>) -> Result<Packet, DecodeError>;

/// One registered packet kind
#[derive(Clone, Copy)]
pub struct PacketDescriptor {
    pub id: i16,
    pub name: &'static str,
    decode: DecodeFn,
}

impl fmt::Debug for PacketDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PacketDescriptor {
    pub fn decode(&self, payload: &[u8]) -> Result<Packet, DecodeError> {
        let mut reader = PacketReader::new(payload);
        let packet = (self.decode)(&mut reader)?;
        if reader.has_remaining() {
            debug!(
                packet = self.name,
                trailing = reader.remaining(),
                "Packet has trailing bytes"
            );
        }
        Ok(packet)
    }
}

/// The closed set of packet kinds
const PACKETS: [PacketDescriptor; 7] = [
    PacketDescriptor {
        id: packet_id::INIT,
        name: "Init",
        decode: decode_init,
    },
    PacketDescriptor {
        id: packet_id::BIOMES,
        name: "Biomes",
        decode: decode_biomes,
    },
    PacketDescriptor {
        id: packet_id::ZONES,
        name: "Zones",
        decode: decode_zones,
    },
    PacketDescriptor {
        id: packet_id::HEAT,
        name: "Heat",
        decode: decode_heat,
    },
    PacketDescriptor {
        id: packet_id::PLAYERS,
        name: "Players",
        decode: decode_players,
    },
    PacketDescriptor {
        id: packet_id::CLUSTERS,
        name: "Clusters",
        decode: decode_clusters,
    },
    PacketDescriptor {
        id: packet_id::EVENT,
        name: "Event",
        decode: decode_event,
    },
];

/// Human-readable name for a packet id
pub fn packet_name(id: i16) -> &'static str {
    PACKETS
        .iter()
        .find(|p| p.id == id)
        .map(|p| p.name)
        .unwrap_or("Unknown")
}

/// Lookup table from packet id to decoder, built once at startup
#[derive(Debug, Clone)]
pub struct PacketRegistry {
    packets: HashMap<i16, PacketDescriptor>,
}

impl PacketRegistry {
    pub fn new() -> Self {
        let mut packets = HashMap::with_capacity(PACKETS.len());
        for descriptor in PACKETS {
            debug!("Loaded packet {} with ID {}", descriptor.name, descriptor.id);
            let previous = packets.insert(descriptor.id, descriptor);
            debug_assert!(previous.is_none(), "duplicate packet id {}", descriptor.id);
        }
        Self { packets }
    }

    pub fn get(&self, id: i16) -> Option<&PacketDescriptor> {
        self.packets.get(&id)
    }

    pub fn is_registered(&self, id: i16) -> bool {
        self.packets.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Decode `payload` as packet `id` and apply it to `world`.
    ///
    /// Returns the packet name on success.
    pub fn dispatch(
        &self,
        id: i16,
        payload: &[u8],
        world: &mut Option<WorldSnapshot>,
    ) -> Result<&'static str, DispatchError> {
        let descriptor = self.get(id).ok_or(DispatchError::UnknownPacket(id))?;
        let packet = descriptor
            .decode(payload)
            .map_err(|source| DispatchError::Decode {
                packet: descriptor.name,
                source,
            })?;
        packet.apply(world)?;
        Ok(descriptor.name)
    }
}

impl Default for PacketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_init(reader: &mut PacketReader<'_>) -> Result<Packet, DecodeError> {
    let world_size = reader.read_i32()?;
    let view_distance = reader.read_i32()?;
    if world_size <= 0 {
        return Err(DecodeError::InvalidWorldSize(world_size));
    }
    Ok(Packet::Init {
        world_size,
        view_distance,
    })
}

fn decode_biomes(reader: &mut PacketReader<'_>) -> Result<Packet, DecodeError> {
    let width = reader.read_i32()?;
    let height = reader.read_i32()?;
    let compressed = reader.read_bytes()?;
    debug!(
        compressed_len = compressed.len(),
        width, height, "Received compressed biome map"
    );
    Ok(Packet::Biomes(TerrainImage::from_gzip(width, height, compressed)?))
}

fn decode_zones(reader: &mut PacketReader<'_>) -> Result<Packet, DecodeError> {
    let zones = reader.read_vec(|r| {
        Ok(PointOfInterest {
            position: r.read_vector2i()?,
            size: r.read_vector2i()?,
            density: r.read_f32()?,
            count: r.read_i32()?,
            avg_zone_distance: r.read_f32()?,
            avg_weight: r.read_f32()?,
        })
    })?;
    Ok(Packet::Zones(zones))
}

fn decode_heat(_: &mut PacketReader<'_>) -> Result<Packet, DecodeError> {
    Ok(Packet::Heat)
}

fn decode_event(_: &mut PacketReader<'_>) -> Result<Packet, DecodeError> {
    Ok(Packet::Event)
}

fn decode_players(reader: &mut PacketReader<'_>) -> Result<Packet, DecodeError> {
    let mut players = Vec::new();
    // outer list is the player grouping, which we do not keep
    reader.read_list(|r| {
        r.read_list(|r| {
            players.push(PlayerSnapshot {
                location: r.read_vector3()?,
                gamestage: r.read_i32()?,
                biome: r.read_string()?,
            });
            Ok(())
        })
    })?;
    Ok(Packet::Players(players))
}

fn decode_clusters(reader: &mut PacketReader<'_>) -> Result<Packet, DecodeError> {
    let mut clusters = Vec::new();
    reader.read_list(|r| {
        let cluster_type = r.read_string()?;
        r.read_list(|r| {
            clusters.push(ClusterSnapshot {
                cluster_type: cluster_type.clone(),
                location: r.read_vector3()?,
                density: r.read_f32()?,
            });
            Ok(())
        })
    })?;
    Ok(Packet::Clusters(clusters))
}

/// Payload encoders, the server side of the decoders above
pub mod encode {
    use super::*;

    pub fn init(world_size: i32, view_distance: i32) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(8);
        w.write_i32(world_size).write_i32(view_distance);
        w.build()
    }

    /// `compressed` is a gzip stream of `width * height` RGB pixels
    pub fn biomes(width: i32, height: i32, compressed: &[u8]) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(12 + compressed.len());
        w.write_i32(width).write_i32(height).write_bytes(compressed);
        w.build()
    }

    pub fn zones(zones: &[PointOfInterest]) -> Vec<u8> {
        let mut w = PacketWriter::new();
        w.write_list(zones, |w, zone| {
            w.write_vector2i(zone.position)
                .write_vector2i(zone.size)
                .write_f32(zone.density)
                .write_i32(zone.count)
                .write_f32(zone.avg_zone_distance)
                .write_f32(zone.avg_weight);
        });
        w.build()
    }

    /// Players grouped the way the server groups them
    pub fn players(groups: &[Vec<PlayerSnapshot>]) -> Vec<u8> {
        let mut w = PacketWriter::new();
        w.write_list(groups, |w, group| {
            w.write_list(group, |w, player| {
                w.write_vector3(player.location)
                    .write_i32(player.gamestage)
                    .write_string(Some(&player.biome));
            });
        });
        w.build()
    }

    /// Clusters grouped by type name, each instance is (location, density)
    pub fn clusters(groups: &[(String, Vec<(Vector3, f32)>)]) -> Vec<u8> {
        let mut w = PacketWriter::new();
        w.write_list(groups, |w, (cluster_type, instances)| {
            w.write_string(Some(cluster_type));
            w.write_list(instances, |w, (location, density)| {
                w.write_vector3(*location).write_f32(*density);
            });
        });
        w.build()
    }
}
