//! # VANTAGE Server
//!
//! Headless scripted run of the whole spectation stack.
//!
//! ```bash
//! # Defaults
//! RUST_LOG=info ./vantage_server
//!
//! # With a config file
//! RUST_LOG=debug ./vantage_server vantage.toml
//! ```

use std::error::Error;
use std::time::Duration;

use vantage::{CommandOutcome, CommandSender, DemoHost};
use vantage_core::{CellKind, EntityMode, VantageConfig, VoxelGrid};
use vantage_shared::{Orientation, RegionId, Vec3};

const OVERWORLD: RegionId = RegionId(0);
const NETHER: RegionId = RegionId(1);
const GROUND: i32 = 64;
const RELOCATION_LATENCY: Duration = Duration::from_millis(5);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => VantageConfig::load(path)?,
        None => VantageConfig::default(),
    };
    tracing::info!("Starting VANTAGE demo at {} ticks/s", config.tick_rate);

    let mut host = DemoHost::new(config, build_world(), RELOCATION_LATENCY)?;
    run_scenario(&mut host)?;

    tracing::info!(
        "Finished after {} refresh ticks, {} relocations, {} live proxies",
        host.ticks(),
        host.session().relocations(),
        host.session().live_proxies()
    );
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Flat stone floor in both regions, a roofed shelter and a wall.
fn build_world() -> VoxelGrid {
    let mut world = VoxelGrid::with_ground(GROUND);
    world.fill(OVERWORLD, [10, GROUND + 3, -2], [16, GROUND + 3, 4], CellKind::Stone);
    world.fill(OVERWORLD, [-4, GROUND, -6], [4, GROUND + 4, -6], CellKind::Stone);
    world.fill(OVERWORLD, [-20, GROUND, -20], [-18, GROUND + 2, -18], CellKind::TallGrass);
    world
}

fn run_scenario(host: &mut DemoHost) -> Result<(), Box<dyn Error>> {
    let alice = host.join("alice", OVERWORLD, Vec3::new(0.5, f64::from(GROUND), 0.5));
    let bob = host.join("bob", OVERWORLD, Vec3::new(20.5, f64::from(GROUND), 20.5));
    let carol = host.join("carol", OVERWORLD, Vec3::new(-10.5, f64::from(GROUND), 5.5));
    host.tick();

    if let Ok(CommandOutcome::Candidates(names)) = host.command(CommandSender::Entity(bob), &[]) {
        tracing::info!("bob can spectate: {}", names.join(", "));
    }
    tracing::info!("Completions for \"a\": {:?}", host.complete("a"));

    host.command(CommandSender::Entity(bob), &["alice"])?;
    host.command(CommandSender::Entity(carol), &["alice"])?;
    if !host.wait_for_relocations(SETTLE_TIMEOUT) {
        tracing::warn!("Relocations did not settle in {:?}", SETTLE_TIMEOUT);
    }
    tracing::info!(
        "alice has {} spectator(s)",
        host.registry().spectators_of(alice).len()
    );

    // Walk towards the shelter, looking around.
    for step in 0..40_u8 {
        let x = 0.5 + f64::from(step) * 0.3;
        let yaw = f32::from(step) * 9.0;
        host.move_entity(alice, Vec3::new(x, f64::from(GROUND), 0.5), Orientation::new(yaw, 10.0));
        host.run_for(1);
    }

    // Look up steeply under the roof, then stand still.
    host.move_entity(alice, Vec3::new(13.5, f64::from(GROUND), 0.5), Orientation::new(0.0, -70.0));
    let stats = host.run_for(10);
    tracing::info!(
        "Tick timing: avg {}us, max {}us, {} late",
        stats.avg_tick_us,
        stats.max_tick_us,
        stats.late_ticks
    );

    host.sneak(carol);
    host.tick();
    tracing::info!("carol spectating after sneak: {}", host.registry().is_spectating(carol));

    host.request_mode(bob, EntityMode::Survival);
    host.tick();
    for reply in host.messages_for(bob) {
        tracing::info!("to bob: {}", reply);
    }

    host.change_region(alice, NETHER, Vec3::new(0.5, f64::from(GROUND), 0.5));
    host.tick();
    if !host.wait_for_relocations(SETTLE_TIMEOUT) {
        tracing::warn!("Relocations did not settle in {:?}", SETTLE_TIMEOUT);
    }
    host.run_for(5);
    tracing::info!(
        "bob still spectating alice in {}: {}",
        NETHER,
        host.registry().subject_of(bob) == Some(alice)
    );

    host.command(CommandSender::Entity(carol), &["nobody"]).ok();
    for reply in host.messages_for(carol) {
        tracing::info!("to carol: {}", reply);
    }

    host.leave(alice);
    host.tick();
    tracing::info!(
        "After alice left: bob spectating = {}, {} record(s)",
        host.registry().is_spectating(bob),
        host.registry().len()
    );
    Ok(())
}
