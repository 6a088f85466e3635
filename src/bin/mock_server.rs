//! Stand-in for the simulation's debug server
//!
//! Sends the login packets (Init, Biomes, Zones) to each client, then
//! Players and Clusters every tick with randomly drifting positions.
//! Serves one client at a time.

use rand::{Rng, SeedableRng};
use tokio::io::AsyncWrite;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use horde_viewer::config::MockServerConfig;
use horde_viewer::net::constants::packet_id;
use horde_viewer::net::framing::{write_frame, FramingError};
use horde_viewer::net::packets::encode;
use horde_viewer::util::vec::{Vector2i, Vector3};
use horde_viewer::world::terrain::compress_rgb;
use horde_viewer::world::{PlayerSnapshot, PointOfInterest};

const CLUSTER_TYPES: [&str; 4] = [
    "WanderingAnimalHorde",
    "WanderingEnemyHorde",
    "ScreamerHorde",
    "WanderingAnimalEnemyHorde",
];
const BIOMES: [(&str, [u8; 3]); 4] = [
    ("pine_forest", [34, 102, 34]),
    ("desert", [219, 193, 120]),
    ("snow", [235, 240, 245]),
    ("wasteland", [120, 110, 90]),
];
/// Biome map edge length in pixels
const BIOME_IMAGE_SIZE: u32 = 256;
const ZONE_COUNT: usize = 48;
const PLAYERS_PER_GROUP: usize = 2;
/// Max distance a tracked entity moves per tick, in blocks
const DRIFT: f32 = 12.0;

struct MockWorld {
    half: f32,
    player_groups: Vec<Vec<PlayerSnapshot>>,
    clusters: Vec<(String, Vec<(Vector3, f32)>)>,
}

impl MockWorld {
    fn generate(config: &MockServerConfig, rng: &mut impl Rng) -> Self {
        let half = (config.world_size / 2) as f32;

        let players: Vec<PlayerSnapshot> = (0..config.players)
            .map(|_| {
                let (biome, _) = BIOMES[rng.gen_range(0..BIOMES.len())];
                PlayerSnapshot {
                    location: random_location(half, rng),
                    gamestage: rng.gen_range(1..150),
                    biome: biome.to_string(),
                }
            })
            .collect();
        let player_groups = players
            .chunks(PLAYERS_PER_GROUP)
            .map(|group| group.to_vec())
            .collect();

        let mut clusters: Vec<(String, Vec<(Vector3, f32)>)> = CLUSTER_TYPES
            .iter()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();
        for i in 0..config.clusters {
            let instance = (random_location(half, rng), rng.gen_range(0.05..1.0));
            clusters[i % CLUSTER_TYPES.len()].1.push(instance);
        }

        Self {
            half,
            player_groups,
            clusters,
        }
    }

    fn drift(&mut self, rng: &mut impl Rng) {
        let half = self.half;
        let mut step = |location: &mut Vector3| {
            location.x = (location.x + rng.gen_range(-DRIFT..=DRIFT)).clamp(-half, half);
            location.z = (location.z + rng.gen_range(-DRIFT..=DRIFT)).clamp(-half, half);
        };

        for player in self.player_groups.iter_mut().flatten() {
            step(&mut player.location);
        }
        for (_, instances) in self.clusters.iter_mut() {
            for (location, _) in instances.iter_mut() {
                step(location);
            }
        }
    }
}

fn random_location(half: f32, rng: &mut impl Rng) -> Vector3 {
    Vector3::new(
        rng.gen_range(-half..=half),
        rng.gen_range(40.0..120.0),
        rng.gen_range(-half..=half),
    )
}

/// Quadrant biome map with a little noise
fn biome_image(rng: &mut impl Rng) -> Vec<u8> {
    let size = BIOME_IMAGE_SIZE;
    let mut rgb = Vec::with_capacity((size * size * 3) as usize);
    for y in 0..size {
        for x in 0..size {
            let quadrant = (x * 2 / size + (y * 2 / size) * 2) as usize;
            let (_, color) = BIOMES[quadrant % BIOMES.len()];
            let noise: i16 = rng.gen_range(-6..=6);
            rgb.extend(
                color
                    .iter()
                    .map(|c| (*c as i16 + noise).clamp(0, 255) as u8),
            );
        }
    }
    rgb
}

fn random_zones(half: i32, rng: &mut impl Rng) -> Vec<PointOfInterest> {
    (0..ZONE_COUNT)
        .map(|_| {
            let size = Vector2i::new(rng.gen_range(50..400), rng.gen_range(50..400));
            PointOfInterest {
                position: Vector2i::new(
                    rng.gen_range(-half..=(half - size.x).max(-half)),
                    rng.gen_range(-half..=(half - size.y).max(-half)),
                ),
                size,
                density: rng.gen_range(0.0..1.0),
                count: rng.gen_range(1..30),
                avg_zone_distance: rng.gen_range(100.0..1500.0),
                avg_weight: rng.gen_range(0.0..1.0),
            }
        })
        .collect()
}

async fn send_login<W: AsyncWrite + Unpin>(
    writer: &mut W,
    config: &MockServerConfig,
    rng: &mut impl Rng,
) -> Result<(), FramingError> {
    write_frame(
        writer,
        packet_id::INIT,
        &encode::init(config.world_size, config.view_distance),
    )
    .await?;

    let rgb = biome_image(rng);
    let compressed = compress_rgb(&rgb)?;
    info!(
        "Biome map: {} bytes, compressed {} bytes",
        rgb.len(),
        compressed.len()
    );
    let size = BIOME_IMAGE_SIZE as i32;
    write_frame(writer, packet_id::BIOMES, &encode::biomes(size, size, &compressed)).await?;

    let zones = random_zones(config.world_size / 2, rng);
    write_frame(writer, packet_id::ZONES, &encode::zones(&zones)).await?;
    Ok(())
}

async fn send_tick<W: AsyncWrite + Unpin>(
    writer: &mut W,
    world: &MockWorld,
) -> Result<(), FramingError> {
    write_frame(writer, packet_id::PLAYERS, &encode::players(&world.player_groups)).await?;
    write_frame(writer, packet_id::CLUSTERS, &encode::clusters(&world.clusters)).await?;
    Ok(())
}

async fn serve(mut stream: TcpStream, config: &MockServerConfig) -> Result<(), FramingError> {
    stream.set_nodelay(true)?;
    let mut rng = rand::rngs::StdRng::from_entropy();

    send_login(&mut stream, config, &mut rng).await?;
    let mut world = MockWorld::generate(config, &mut rng);

    let mut ticker = tokio::time::interval(config.tick_interval);
    loop {
        ticker.tick().await;
        world.drift(&mut rng);
        send_tick(&mut stream, &world).await?;
    }
}

async fn run(config: MockServerConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", config.port)).await?;
    info!("Started debug server listening on port {}.", config.port);

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("New client {} connected.", addr);
        if let Err(e) = serve(stream, &config).await {
            warn!("Client disconnected: {}", e);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = MockServerConfig::load_or_default();
    config.validate()?;
    info!(
        "Mock horde server: world={}, players={}, clusters={}, tick={:?}",
        config.world_size, config.players, config.clusters, config.tick_interval
    );

    tokio::select! {
        result = run(config) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown debug server.");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use horde_viewer::net::framing::{read_header, read_payload};
    use horde_viewer::net::PacketRegistry;
    use rand::rngs::StdRng;
    use std::io::Cursor;

    fn config() -> MockServerConfig {
        MockServerConfig {
            world_size: 1000,
            players: 5,
            clusters: 10,
            ..MockServerConfig::default()
        }
    }

    #[test]
    fn test_generate_groups() {
        let mut rng = StdRng::seed_from_u64(7);
        let world = MockWorld::generate(&config(), &mut rng);
        let sizes: Vec<usize> = world.player_groups.iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        let clusters: usize = world.clusters.iter().map(|(_, c)| c.len()).sum();
        assert_eq!(clusters, 10);
    }

    #[test]
    fn test_drift_stays_in_world() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut world = MockWorld::generate(&config(), &mut rng);
        for _ in 0..500 {
            world.drift(&mut rng);
        }
        for player in world.player_groups.iter().flatten() {
            assert!(player.location.x.abs() <= 500.0);
            assert!(player.location.z.abs() <= 500.0);
        }
    }

    #[tokio::test]
    async fn test_login_and_tick_decode() {
        let config = config();
        let mut rng = StdRng::seed_from_u64(3);
        let world = MockWorld::generate(&config, &mut rng);

        let mut buffer = Vec::new();
        send_login(&mut buffer, &config, &mut rng).await.unwrap();
        send_tick(&mut buffer, &world).await.unwrap();

        let registry = PacketRegistry::new();
        let mut snapshot = None;
        let mut cursor = Cursor::new(buffer);
        let mut names = Vec::new();
        for _ in 0..5 {
            let header = read_header(&mut cursor).await.unwrap();
            let payload = read_payload(&mut cursor, header.payload_len).await.unwrap();
            names.push(
                registry
                    .dispatch(header.packet_id, &payload, &mut snapshot)
                    .unwrap(),
            );
        }
        assert_eq!(names, vec!["Init", "Biomes", "Zones", "Players", "Clusters"]);

        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot.players().len(), 5);
        assert_eq!(snapshot.clusters().len(), 10);
        assert_eq!(snapshot.zones().len(), ZONE_COUNT);
        assert_eq!(snapshot.terrain().unwrap().width(), BIOME_IMAGE_SIZE);
    }
}
