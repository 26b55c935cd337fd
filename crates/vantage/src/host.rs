//! # Demo Host
//!
//! A headless host wiring the spectation core to an in-memory world.
//!
//! ```text
//! join/leave/move ──> EntityTable ──┐
//!        │                          │
//!        └──> EventSender ──> EventBus ──> tick(): dispatch ──> registry
//!                                  ^                  │
//!        relocation worker ────────┘                  └──> scheduler.tick()
//! ```
//!
//! Everything that mutates the registry runs inside [`DemoHost::tick`] or
//! [`DemoHost::command`], on the caller's thread.

use std::time::{Duration, Instant};

use vantage_core::{
    dispatch, AttachOutcome, ConfigError, EntityDirectory, EntityMode, EntitySnapshot,
    EntityTable, EventBus, EventOutcome, EventSender, HostEvent, RefreshReport,
    RefreshScheduler, SpectationContext, SpectationRegistry, TickLoop, TickStats, VantageConfig,
    VoxelGrid,
};
use vantage_shared::{EntityId, Orientation, RegionId, Vec3};

use crate::commands::{self, CommandError, CommandOutcome, CommandSender};
use crate::simulated::SimulatedSession;

/// What one host tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HostTick {
    /// Host events dispatched.
    pub events: usize,
    /// Refresh pass result.
    pub refresh: RefreshReport,
}

/// In-memory host running the full spectation stack.
pub struct DemoHost {
    // Dropped before `session`: a closed bus unblocks the relocation worker.
    bus: EventBus,
    events: EventSender,
    entities: EntityTable,
    world: VoxelGrid,
    session: SimulatedSession,
    registry: SpectationRegistry,
    scheduler: RefreshScheduler,
    config: VantageConfig,
    outbox: Vec<(EntityId, String)>,
}

impl DemoHost {
    /// Builds a host over `world`. Relocations land after `latency`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if `config` fails validation.
    pub fn new(config: VantageConfig, world: VoxelGrid, latency: Duration) -> Result<Self, ConfigError> {
        config.validate()?;
        let bus = EventBus::default();
        let events = bus.sender();
        let session = SimulatedSession::new(bus.sender(), latency);
        let mut scheduler = RefreshScheduler::new();
        scheduler.start();

        Ok(Self {
            bus,
            events,
            entities: EntityTable::new(),
            world,
            session,
            registry: SpectationRegistry::new(config.camera),
            scheduler,
            config,
            outbox: Vec::new(),
        })
    }

    // ========================================================================
    // HOST NOTIFICATIONS
    // ========================================================================

    /// Adds an entity and announces it.
    pub fn join(&mut self, name: &str, region: RegionId, position: Vec3) -> EntityId {
        let id = self.entities.spawn(name, region, position);
        if let Some(snapshot) = self.entities.get(id) {
            self.session.connect(id, snapshot.body());
        }
        self.announce(HostEvent::Joined(id));
        tracing::info!("{} joined as {}", name, id);
        id
    }

    /// Removes an entity and announces it.
    pub fn leave(&mut self, id: EntityId) -> Option<EntitySnapshot> {
        let snapshot = self.entities.despawn(id)?;
        self.session.disconnect(id);
        self.announce(HostEvent::Left(id));
        tracing::info!("{} left", snapshot.name);
        Some(snapshot)
    }

    /// Moves an entity within its region.
    pub fn move_entity(&mut self, id: EntityId, position: Vec3, orientation: Orientation) -> bool {
        if !self.entities.move_to(id, position, orientation) {
            return false;
        }
        if let Some(snapshot) = self.entities.get(id) {
            self.session.sync_body(id, snapshot.body());
        }
        true
    }

    /// Moves an entity to another region and announces it.
    pub fn change_region(&mut self, id: EntityId, region: RegionId, position: Vec3) -> bool {
        if !self.entities.change_region(id, region, position) {
            return false;
        }
        if let Some(snapshot) = self.entities.get(id) {
            self.session.sync_body(id, snapshot.body());
        }
        self.announce(HostEvent::RegionChanged(id));
        true
    }

    /// Queues a mode change request.
    pub fn request_mode(&mut self, id: EntityId, mode: EntityMode) {
        self.announce(HostEvent::ModeChangeRequested { entity: id, mode });
    }

    /// Queues a dismount.
    pub fn sneak(&mut self, id: EntityId) {
        self.announce(HostEvent::Dismount(id));
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    /// Runs `spectate` for `sender`. Failures are also queued as replies.
    ///
    /// # Errors
    ///
    /// See [`CommandError`].
    pub fn command(
        &mut self,
        sender: CommandSender,
        args: &[&str],
    ) -> Result<CommandOutcome, CommandError> {
        let result = {
            let mut ctx =
                SpectationContext::new(&mut self.entities, &self.world, &mut self.session);
            commands::spectate(sender, args, &mut self.registry, &mut ctx)
        };
        match (&result, sender) {
            (Err(err), CommandSender::Entity(id)) => {
                self.outbox.push((id, err.reply(&self.config.messages)));
            }
            (Err(err), CommandSender::Console) => {
                tracing::warn!("Console command failed: {}", err);
            }
            (Ok(_), _) => {}
        }
        result
    }

    /// Tab completion for `spectate`.
    #[must_use]
    pub fn complete(&self, partial: &str) -> Vec<String> {
        commands::complete(partial, &self.registry, &self.entities)
    }

    // ========================================================================
    // TICKING
    // ========================================================================

    /// Drains host events, then runs the refresh pass.
    pub fn tick(&mut self) -> HostTick {
        let pending = self.bus.drain();
        let events = pending.len();
        for event in pending {
            self.handle(event);
        }

        let refresh = {
            let mut ctx =
                SpectationContext::new(&mut self.entities, &self.world, &mut self.session);
            self.scheduler.tick(&mut self.registry, &mut ctx)
        };
        self.sync_spectator_bodies();

        HostTick { events, refresh }
    }

    /// Blocks until no relocation is pending or `timeout` elapses.
    ///
    /// Returns `true` if every relocation settled.
    pub fn wait_for_relocations(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.registry.pending_relocations() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.bus.recv_timeout(remaining) {
                Some(event) => self.handle(event),
                None => return self.registry.pending_relocations() == 0,
            }
        }
        true
    }

    /// Runs `ticks` paced ticks at the configured rate.
    pub fn run_for(&mut self, ticks: u64) -> TickStats {
        let mut tick_loop = TickLoop::new(self.config.tick_rate);
        while tick_loop.tick_count() < ticks {
            if tick_loop.should_tick() {
                let start = tick_loop.begin_tick();
                self.tick();
                tick_loop.end_tick(start);
            } else {
                tick_loop.wait_for_next_tick();
            }
        }
        *tick_loop.stats()
    }

    /// Queues `event` for the next tick. Lifecycle events that do not fit on
    /// the bus are applied on the spot, anything else is dropped.
    fn announce(&mut self, event: HostEvent) {
        if self.events.send(event.clone()) {
            return;
        }
        match event {
            HostEvent::Joined(_) | HostEvent::Left(_) | HostEvent::RegionChanged(_) => {
                tracing::debug!("Bus unavailable, applying {:?} now", event);
                self.handle(event);
            }
            _ => tracing::warn!("Dropped {:?}", event),
        }
    }

    fn handle(&mut self, event: HostEvent) {
        let requester = match &event {
            HostEvent::ModeChangeRequested { entity, .. } => Some(*entity),
            _ => None,
        };
        let outcome = {
            let mut ctx =
                SpectationContext::new(&mut self.entities, &self.world, &mut self.session);
            dispatch(&mut self.registry, event, &mut ctx)
        };

        match outcome {
            EventOutcome::ModeChange(Err(err)) => {
                tracing::debug!("{}", err);
                if let Some(entity) = requester {
                    let reply = self
                        .config
                        .messages
                        .prefixed(&self.config.messages.gamemode_change_not_allowed);
                    self.outbox.push((entity, reply));
                }
            }
            EventOutcome::Attach(Err(err)) => tracing::warn!("Attach failed: {}", err),
            EventOutcome::Attach(Ok(AttachOutcome::Attached)) => {
                self.sync_spectator_bodies();
            }
            EventOutcome::Restarted(results) => {
                for (spectator, result) in results {
                    if let Err(err) = result {
                        tracing::warn!("Could not restart {}: {}", spectator, err);
                    }
                }
            }
            _ => {}
        }
    }

    /// Copies client bodies moved by the session back into the table.
    fn sync_spectator_bodies(&mut self) {
        for id in self.entities.active_entities() {
            if !self.registry.is_spectating(id) {
                continue;
            }
            let (Some(body), Some(entity)) = (self.session.body_of(id), self.entities.get(id))
            else {
                continue;
            };
            if entity.position != body.position {
                self.entities.move_to(id, body.position, body.orientation);
            }
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    /// Takes the replies queued for `id`.
    pub fn messages_for(&mut self, id: EntityId) -> Vec<String> {
        let (mine, rest): (Vec<_>, Vec<_>) =
            self.outbox.drain(..).partition(|(target, _)| *target == id);
        self.outbox = rest;
        mine.into_iter().map(|(_, text)| text).collect()
    }

    /// Spectation state.
    #[must_use]
    pub const fn registry(&self) -> &SpectationRegistry {
        &self.registry
    }

    /// Simulated client state.
    #[must_use]
    pub const fn session(&self) -> &SimulatedSession {
        &self.session
    }

    /// Host-side entities.
    #[must_use]
    pub const fn entities(&self) -> &EntityTable {
        &self.entities
    }

    /// Refresh ticks run so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.scheduler.ticks()
    }
}
