//! # Spectation Registry
//!
//! Single source of truth for who watches whom.
//!
//! ## Model
//!
//! ```text
//!   records:  subject ──> Spectatable { spectators, proxy, last_known_pose }
//!   edges:    spectator ──> subject           (at most one per spectator)
//!   pending:  ticket ──> (subject, spectator)  (relocations in flight)
//! ```
//!
//! ## Invariants
//!
//! - `proxy` is `Some` iff `spectators` is non-empty.
//! - No entity is in its own `spectators`.
//! - `edges[s] == t` iff `s` is in `records[t].spectators`.
//!
//! ## Relocation
//!
//! Starting a spectation is two-phase. [`SpectationRegistry::start_spectating`]
//! records the edge, ensures the proxy and asks the View Session to relocate
//! the spectator, returning a [`RelocationTicket`]. Show and attach happen in
//! [`SpectationRegistry::complete_relocation`], and only if the ticket is
//! still pending and the edge still holds. Stopping drops the spectator's
//! pending tickets, so a late completion finds nothing and reports stale.
//!
//! The registry is owned by the host and mutated from the tick thread only.

use std::collections::{BTreeMap, BTreeSet};

use vantage_shared::{EntityId, Transform};

use crate::entity::{EntityDirectory, EntityMode, SubjectPose};
use crate::error::{SessionError, SpectateError, SpectateResult, TargetRejection};
use crate::placement::{place_camera, CameraRig};
use crate::session::{ProxyHandle, RelocationTicket, ViewSession};
use crate::world::{CellClassifier, RegionCells};

/// Collaborators handed to every mutating registry call.
pub struct SpectationContext<'a> {
    /// Host entities.
    pub entities: &'a mut dyn EntityDirectory,
    /// World cells for camera placement.
    pub world: &'a dyn CellClassifier,
    /// Render layer.
    pub session: &'a mut dyn ViewSession,
}

impl<'a> SpectationContext<'a> {
    /// Bundles the collaborators for one call.
    pub fn new(
        entities: &'a mut dyn EntityDirectory,
        world: &'a dyn CellClassifier,
        session: &'a mut dyn ViewSession,
    ) -> Self {
        Self {
            entities,
            world,
            session,
        }
    }
}

/// Per-entity spectation record.
#[derive(Clone, Debug, PartialEq)]
pub struct Spectatable {
    entity: EntityId,
    spectators: BTreeSet<EntityId>,
    proxy: Option<ProxyHandle>,
    last_known_pose: Option<SubjectPose>,
}

impl Spectatable {
    fn new(entity: EntityId) -> Self {
        Self {
            entity,
            spectators: BTreeSet::new(),
            proxy: None,
            last_known_pose: None,
        }
    }

    /// The watched entity.
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// Current spectators, ascending by id.
    pub fn spectators(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.spectators.iter().copied()
    }

    /// Whether anyone is watching.
    #[must_use]
    pub fn has_spectators(&self) -> bool {
        !self.spectators.is_empty()
    }

    /// Shared proxy, present iff there are spectators.
    #[must_use]
    pub const fn proxy(&self) -> Option<ProxyHandle> {
        self.proxy
    }

    /// Pose used for the last placement.
    #[must_use]
    pub const fn last_known_pose(&self) -> Option<SubjectPose> {
        self.last_known_pose
    }
}

/// Result of a relocation completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachOutcome {
    /// Proxy shown and camera attached.
    Attached,
    /// Ticket unknown, already completed, or dropped by a stop.
    Stale,
}

/// Result of a stop request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    /// The edge existed and was removed.
    Stopped,
    /// There was nothing to stop.
    NotSpectating,
}

/// Result of refreshing one subject.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Nobody is watching, nothing to do.
    Idle,
    /// Pose unchanged since the last placement.
    Skipped,
    /// New transform pushed to every spectator.
    Refreshed,
    /// Subject turned ineligible, its spectators were stopped.
    Cascaded,
    /// Subject vanished from the directory and was dropped.
    Removed,
}

/// A broken registry invariant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Proxy alive with nobody watching.
    OrphanProxy(EntityId),
    /// Spectators without a proxy.
    MissingProxy(EntityId),
    /// An entity listed as its own spectator.
    SelfSpectation(EntityId),
    /// Edge and spectator set disagree.
    DanglingEdge {
        /// Spectator side of the edge.
        spectator: EntityId,
        /// Subject side of the edge.
        subject: EntityId,
    },
}

#[derive(Clone, Copy, Debug)]
struct PendingRelocation {
    subject: EntityId,
    spectator: EntityId,
}

/// Owner of every [`Spectatable`] and spectation edge.
#[derive(Debug, Default)]
pub struct SpectationRegistry {
    records: BTreeMap<EntityId, Spectatable>,
    edges: BTreeMap<EntityId, EntityId>,
    pending: BTreeMap<RelocationTicket, PendingRelocation>,
    next_ticket: u64,
    rig: CameraRig,
}

impl SpectationRegistry {
    /// Creates an empty registry placing cameras with `rig`.
    #[must_use]
    pub fn new(rig: CameraRig) -> Self {
        Self {
            rig,
            ..Self::default()
        }
    }

    /// Camera rig used for placement.
    #[must_use]
    pub const fn rig(&self) -> &CameraRig {
        &self.rig
    }

    /// Record for `entity`, created on first reference.
    pub fn get_or_create(&mut self, entity: EntityId) -> &Spectatable {
        self.records
            .entry(entity)
            .or_insert_with(|| Spectatable::new(entity))
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Starts `spectator` watching `subject`.
    ///
    /// Phase one of the relocation handshake: the proxy exists when this
    /// returns, but it is only shown and attached once the returned ticket
    /// is passed to [`Self::complete_relocation`].
    ///
    /// # Errors
    ///
    /// - [`SpectateError::InvalidTarget`] for self-spectation or an observing
    ///   subject. Nothing changes.
    /// - [`SpectateError::UnknownEntity`] if either side is not active.
    /// - [`SpectateError::ViewSessionFailure`] if spawning or relocating
    ///   failed. The edge is rolled back.
    pub fn start_spectating(
        &mut self,
        subject: EntityId,
        spectator: EntityId,
        ctx: &mut SpectationContext<'_>,
    ) -> SpectateResult<RelocationTicket> {
        if subject == spectator {
            return Err(SpectateError::InvalidTarget {
                subject,
                reason: TargetRejection::SelfSpectation,
            });
        }
        let target = ctx
            .entities
            .snapshot(subject)
            .ok_or(SpectateError::UnknownEntity(subject))?;
        if ctx.entities.snapshot(spectator).is_none() {
            return Err(SpectateError::UnknownEntity(spectator));
        }
        if !target.mode.is_eligible() {
            return Err(SpectateError::InvalidTarget {
                subject,
                reason: TargetRejection::Ineligible,
            });
        }

        if let Some(previous) = self.edges.get(&spectator).copied() {
            self.detach(previous, spectator, ctx);
        }

        self.records
            .entry(subject)
            .or_insert_with(|| Spectatable::new(subject))
            .spectators
            .insert(spectator);
        self.edges.insert(spectator, subject);

        ctx.entities.set_mode(spectator, EntityMode::Observing);
        if self.has_spectators(spectator) {
            self.on_subject_ineligible(spectator, ctx);
        }

        // Every spectator of every subject hides from the newcomer.
        let others: Vec<EntityId> = self
            .edges
            .keys()
            .copied()
            .filter(|other| *other != spectator)
            .collect();
        for other in others {
            ctx.session.set_mutual_visibility(other, spectator, false);
        }

        if let Err(source) = self.ensure_proxy(subject, target.pose(), ctx) {
            self.detach(subject, spectator, ctx);
            return Err(SpectateError::ViewSessionFailure { spectator, source });
        }

        self.next_ticket += 1;
        let ticket = RelocationTicket(self.next_ticket);
        self.pending.insert(
            ticket,
            PendingRelocation { subject, spectator },
        );

        if let Err(source) = ctx.session.relocate(spectator, target.body(), ticket) {
            self.detach(subject, spectator, ctx);
            return Err(SpectateError::ViewSessionFailure { spectator, source });
        }

        tracing::info!("{} started spectating {} (ticket {})", spectator, subject, ticket.0);
        Ok(ticket)
    }

    /// Phase two of the relocation handshake.
    ///
    /// Shows the proxy and attaches the camera, in that order, only if the
    /// ticket is live and the edge still holds.
    ///
    /// # Errors
    ///
    /// [`SpectateError::ViewSessionFailure`] if the relocation itself or the
    /// show/attach failed. The edge is rolled back.
    pub fn complete_relocation(
        &mut self,
        ticket: RelocationTicket,
        result: Result<(), SessionError>,
        ctx: &mut SpectationContext<'_>,
    ) -> SpectateResult<AttachOutcome> {
        let Some(pending) = self.pending.remove(&ticket) else {
            tracing::debug!("Ignoring stale relocation ticket {}", ticket.0);
            return Ok(AttachOutcome::Stale);
        };
        let PendingRelocation { subject, spectator } = pending;

        let still_watching = self.edges.get(&spectator) == Some(&subject);
        let handle = self.records.get(&subject).and_then(|record| record.proxy);
        let handle = match handle {
            Some(handle) if still_watching => handle,
            _ => {
                tracing::debug!(
                    "Relocation {} of {} finished after the spectation ended",
                    ticket.0,
                    spectator
                );
                return Ok(AttachOutcome::Stale);
            }
        };

        let attached = result
            .and_then(|()| ctx.session.show_proxy(spectator, handle))
            .and_then(|()| ctx.session.attach_camera(spectator, Some(handle)));

        match attached {
            Ok(()) => {
                tracing::debug!("{} attached to proxy of {}", spectator, subject);
                Ok(AttachOutcome::Attached)
            }
            Err(source) => {
                tracing::warn!(
                    "Rolling back spectation of {} by {}: {}",
                    subject,
                    spectator,
                    source
                );
                self.detach(subject, spectator, ctx);
                Err(SpectateError::ViewSessionFailure { spectator, source })
            }
        }
    }

    /// Stops `spectator` watching `subject`. Idempotent.
    pub fn stop_spectating(
        &mut self,
        subject: EntityId,
        spectator: EntityId,
        ctx: &mut SpectationContext<'_>,
    ) -> StopOutcome {
        if self.edges.get(&spectator) != Some(&subject) {
            tracing::debug!("{} is not spectating {}", spectator, subject);
            return StopOutcome::NotSpectating;
        }
        self.detach(subject, spectator, ctx);
        StopOutcome::Stopped
    }

    /// Stops every spectator of a subject that can no longer be watched.
    ///
    /// Returns how many spectations were stopped.
    pub fn on_subject_ineligible(
        &mut self,
        subject: EntityId,
        ctx: &mut SpectationContext<'_>,
    ) -> usize {
        let spectators = self.spectators_of(subject);
        for spectator in &spectators {
            self.detach(subject, *spectator, ctx);
        }
        if !spectators.is_empty() {
            tracing::info!(
                "{} became ineligible, stopped {} spectator(s)",
                subject,
                spectators.len()
            );
        }
        spectators.len()
    }

    /// Forgets an entity that left the simulation.
    ///
    /// Stops its own spectation, stops everyone watching it and drops its
    /// record. Returns how many spectations were stopped.
    pub fn on_entity_removed(&mut self, entity: EntityId, ctx: &mut SpectationContext<'_>) -> usize {
        let mut stopped = 0;
        if let Some(subject) = self.edges.get(&entity).copied() {
            self.detach(subject, entity, ctx);
            stopped += 1;
        }
        for spectator in self.spectators_of(entity) {
            self.detach(entity, spectator, ctx);
            stopped += 1;
        }
        self.records.remove(&entity);
        self.pending
            .retain(|_, pending| pending.spectator != entity && pending.subject != entity);
        tracing::debug!("{} removed, {} spectation(s) stopped", entity, stopped);
        stopped
    }

    /// Restarts every spectation of a subject that moved to another region.
    ///
    /// The old proxy is torn down and a fresh one is spawned in the new
    /// region. Returns the restart result for each spectator.
    pub fn on_subject_region_changed(
        &mut self,
        subject: EntityId,
        ctx: &mut SpectationContext<'_>,
    ) -> Vec<(EntityId, SpectateResult<RelocationTicket>)> {
        let spectators = self.spectators_of(subject);
        for spectator in &spectators {
            self.detach(subject, *spectator, ctx);
        }
        let mut restarted = Vec::with_capacity(spectators.len());
        for spectator in spectators {
            let result = self.start_spectating(subject, spectator, ctx);
            restarted.push((spectator, result));
        }
        restarted
    }

    /// Guards a mode change requested for `entity`.
    ///
    /// # Errors
    ///
    /// [`SpectateError::ModeLocked`] when the entity is spectating and the
    /// request would take it out of observing.
    pub fn check_mode_change(&self, entity: EntityId, requested: EntityMode) -> SpectateResult<()> {
        if self.is_spectating(entity) && requested != EntityMode::Observing {
            return Err(SpectateError::ModeLocked(entity));
        }
        Ok(())
    }

    /// The spectator asked to leave the camera.
    pub fn on_dismount(&mut self, spectator: EntityId, ctx: &mut SpectationContext<'_>) -> StopOutcome {
        match self.edges.get(&spectator).copied() {
            Some(subject) => self.stop_spectating(subject, spectator, ctx),
            None => StopOutcome::NotSpectating,
        }
    }

    // ========================================================================
    // REFRESH
    // ========================================================================

    /// Subjects with at least one spectator, ascending by id.
    #[must_use]
    pub fn watched_subjects(&self) -> Vec<EntityId> {
        self.records
            .values()
            .filter(|record| record.has_spectators())
            .map(|record| record.entity)
            .collect()
    }

    /// Brings one subject's proxy up to date.
    pub fn refresh(&mut self, subject: EntityId, ctx: &mut SpectationContext<'_>) -> RefreshOutcome {
        if !self.has_spectators(subject) {
            return RefreshOutcome::Idle;
        }
        let Some(snapshot) = ctx.entities.snapshot(subject) else {
            self.on_entity_removed(subject, ctx);
            return RefreshOutcome::Removed;
        };
        if !snapshot.mode.is_eligible() {
            self.on_subject_ineligible(subject, ctx);
            return RefreshOutcome::Cascaded;
        }

        let pose = snapshot.pose();
        let rig = self.rig;
        let Some(record) = self.records.get_mut(&subject) else {
            return RefreshOutcome::Idle;
        };
        if record.last_known_pose == Some(pose) {
            return RefreshOutcome::Skipped;
        }
        let Some(handle) = record.proxy else {
            tracing::warn!("{} has spectators but no proxy", subject);
            return RefreshOutcome::Idle;
        };

        let world = RegionCells::new(ctx.world, pose.region);
        let camera = place_camera(pose.eye, &world, &rig).transform;
        let spectators: Vec<EntityId> = record.spectators().collect();
        record.last_known_pose = Some(pose);

        if let Err(err) = ctx.session.update_transform(&spectators, handle, camera) {
            tracing::warn!("Failed to move proxy of {}: {}", subject, err);
        }
        for spectator in spectators {
            if let Err(err) = ctx.session.teleport(spectator, camera) {
                tracing::warn!("Failed to keep {} near {}: {}", spectator, subject, err);
            }
        }
        RefreshOutcome::Refreshed
    }

    // ========================================================================
    // INVARIANTS
    // ========================================================================

    /// Lists every broken invariant.
    #[must_use]
    pub fn invariant_violations(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        for record in self.records.values() {
            match (record.proxy.is_some(), record.has_spectators()) {
                (true, false) => violations.push(InvariantViolation::OrphanProxy(record.entity)),
                (false, true) => violations.push(InvariantViolation::MissingProxy(record.entity)),
                _ => {}
            }
            if record.spectators.contains(&record.entity) {
                violations.push(InvariantViolation::SelfSpectation(record.entity));
            }
            for spectator in &record.spectators {
                if self.edges.get(spectator) != Some(&record.entity) {
                    violations.push(InvariantViolation::DanglingEdge {
                        spectator: *spectator,
                        subject: record.entity,
                    });
                }
            }
        }
        for (spectator, subject) in &self.edges {
            let listed = self
                .records
                .get(subject)
                .is_some_and(|record| record.spectators.contains(spectator));
            if !listed {
                violations.push(InvariantViolation::DanglingEdge {
                    spectator: *spectator,
                    subject: *subject,
                });
            }
        }
        violations
    }

    /// Fails fast in debug builds if any invariant is broken.
    pub fn check_invariants(&self) {
        let violations = self.invariant_violations();
        debug_assert!(
            violations.is_empty(),
            "spectation registry invariants broken: {violations:?}"
        );
    }

    /// Releases proxies nobody is watching anymore. Returns how many.
    pub fn heal_orphans(&mut self, ctx: &mut SpectationContext<'_>) -> usize {
        let mut healed = 0;
        for record in self.records.values_mut() {
            if record.has_spectators() {
                continue;
            }
            if let Some(handle) = record.proxy.take() {
                tracing::warn!("Releasing orphaned proxy of {}", record.entity);
                ctx.session.release_proxy(handle);
                record.last_known_pose = None;
                healed += 1;
            }
        }
        healed
    }

    // ========================================================================
    // READ API
    // ========================================================================

    /// Subject `spectator` is watching.
    #[must_use]
    pub fn subject_of(&self, spectator: EntityId) -> Option<EntityId> {
        self.edges.get(&spectator).copied()
    }

    /// Spectators of `subject`, ascending by id.
    #[must_use]
    pub fn spectators_of(&self, subject: EntityId) -> Vec<EntityId> {
        self.records
            .get(&subject)
            .map(|record| record.spectators().collect())
            .unwrap_or_default()
    }

    /// Shared proxy of `subject`.
    #[must_use]
    pub fn proxy_of(&self, subject: EntityId) -> Option<ProxyHandle> {
        self.records.get(&subject).and_then(|record| record.proxy)
    }

    /// Whether `entity` is watching someone.
    #[must_use]
    pub fn is_spectating(&self, entity: EntityId) -> bool {
        self.edges.contains_key(&entity)
    }

    /// Record of `entity`, if one was created.
    #[must_use]
    pub fn record(&self, entity: EntityId) -> Option<&Spectatable> {
        self.records.get(&entity)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no record exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Relocations issued and not yet completed.
    #[must_use]
    pub fn pending_relocations(&self) -> usize {
        self.pending.len()
    }

    /// Names of recorded entities that can currently be watched.
    #[must_use]
    pub fn spectatable_names(&self, entities: &dyn EntityDirectory) -> Vec<String> {
        self.records
            .keys()
            .filter_map(|id| entities.snapshot(*id))
            .filter(|snapshot| snapshot.mode.is_eligible())
            .map(|snapshot| snapshot.name)
            .collect()
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn has_spectators(&self, subject: EntityId) -> bool {
        self.records
            .get(&subject)
            .is_some_and(Spectatable::has_spectators)
    }

    fn ensure_proxy(
        &mut self,
        subject: EntityId,
        pose: SubjectPose,
        ctx: &mut SpectationContext<'_>,
    ) -> Result<ProxyHandle, SessionError> {
        if let Some(handle) = self.proxy_of(subject) {
            return Ok(handle);
        }
        let world = RegionCells::new(ctx.world, pose.region);
        let camera: Transform = place_camera(pose.eye, &world, &self.rig).transform;
        let handle = ctx.session.spawn_proxy(pose.region, camera)?;

        let record = self
            .records
            .entry(subject)
            .or_insert_with(|| Spectatable::new(subject));
        record.proxy = Some(handle);
        record.last_known_pose = Some(pose);
        tracing::debug!("Spawned proxy {:?} for {}", handle, subject);
        Ok(handle)
    }

    /// Removes one edge and undoes its effects. Session failures are logged.
    fn detach(&mut self, subject: EntityId, spectator: EntityId, ctx: &mut SpectationContext<'_>) {
        self.edges.remove(&spectator);
        self.pending.retain(|_, pending| pending.spectator != spectator);
        let Some(record) = self.records.get_mut(&subject) else {
            return;
        };
        record.spectators.remove(&spectator);
        let handle = record.proxy;
        let now_empty = !record.has_spectators();

        if let Err(err) = ctx.session.attach_camera(spectator, None) {
            tracing::warn!("Could not return camera of {}: {}", spectator, err);
        }
        if let Some(handle) = handle {
            if let Err(err) = ctx.session.destroy_proxy(spectator, handle) {
                tracing::warn!("Could not remove proxy for {}: {}", spectator, err);
            }
        }
        for other in ctx.entities.active_entities() {
            if other != spectator {
                ctx.session.set_mutual_visibility(spectator, other, true);
            }
        }

        if now_empty {
            if let Some(record) = self.records.get_mut(&subject) {
                if let Some(handle) = record.proxy.take() {
                    ctx.session.release_proxy(handle);
                    tracing::debug!("Released proxy {:?} of {}", handle, subject);
                }
                record.last_known_pose = None;
            }
        }
        tracing::info!("{} stopped spectating {}", spectator, subject);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityTable;
    use crate::session::{RecordingViewSession, RefusedCall, SessionCall};
    use crate::world::VoxelGrid;
    use vantage_shared::{Orientation, RegionId, Vec3};

    struct Fixture {
        entities: EntityTable,
        world: VoxelGrid,
        session: RecordingViewSession,
        registry: SpectationRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                entities: EntityTable::new(),
                world: VoxelGrid::with_ground(64),
                session: RecordingViewSession::new(),
                registry: SpectationRegistry::new(CameraRig::default()),
            }
        }

        fn spawn(&mut self, name: &str) -> EntityId {
            self.entities.spawn(name, RegionId(0), Vec3::new(0.5, 64.0, 0.5))
        }

        fn start(&mut self, subject: EntityId, spectator: EntityId) -> SpectateResult<RelocationTicket> {
            let mut ctx = SpectationContext::new(&mut self.entities, &self.world, &mut self.session);
            self.registry.start_spectating(subject, spectator, &mut ctx)
        }

        fn complete(&mut self, ticket: RelocationTicket) -> SpectateResult<AttachOutcome> {
            let mut ctx = SpectationContext::new(&mut self.entities, &self.world, &mut self.session);
            self.registry.complete_relocation(ticket, Ok(()), &mut ctx)
        }

        fn stop(&mut self, subject: EntityId, spectator: EntityId) -> StopOutcome {
            let mut ctx = SpectationContext::new(&mut self.entities, &self.world, &mut self.session);
            self.registry.stop_spectating(subject, spectator, &mut ctx)
        }

        fn refresh(&mut self, subject: EntityId) -> RefreshOutcome {
            let mut ctx = SpectationContext::new(&mut self.entities, &self.world, &mut self.session);
            self.registry.refresh(subject, &mut ctx)
        }
    }

    #[test]
    fn test_self_spectation_is_rejected_without_effects() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let err = fx.start(alice, alice).unwrap_err();
        assert!(matches!(
            err,
            SpectateError::InvalidTarget {
                reason: TargetRejection::SelfSpectation,
                ..
            }
        ));
        assert!(fx.registry.is_empty());
        assert!(fx.session.calls().is_empty());
        assert_eq!(fx.entities.get(alice).unwrap().mode, EntityMode::Survival);
    }

    #[test]
    fn test_observing_subject_is_rejected() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        fx.entities.set_mode(alice, EntityMode::Observing);
        let err = fx.start(alice, bob).unwrap_err();
        assert!(matches!(
            err,
            SpectateError::InvalidTarget {
                reason: TargetRejection::Ineligible,
                ..
            }
        ));
        assert!(!fx.registry.is_spectating(bob));
    }

    #[test]
    fn test_unknown_entities_are_rejected() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        assert_eq!(
            fx.start(EntityId(99), alice),
            Err(SpectateError::UnknownEntity(EntityId(99)))
        );
        assert_eq!(
            fx.start(alice, EntityId(98)),
            Err(SpectateError::UnknownEntity(EntityId(98)))
        );
    }

    #[test]
    fn test_start_forces_observing_and_spawns_proxy() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        fx.start(alice, bob).unwrap();

        assert_eq!(fx.entities.get(bob).unwrap().mode, EntityMode::Observing);
        assert_eq!(fx.registry.subject_of(bob), Some(alice));
        assert_eq!(fx.registry.spectators_of(alice), vec![bob]);
        assert!(fx.registry.proxy_of(alice).is_some());
        assert!(fx.registry.record(alice).unwrap().last_known_pose().is_some());
        assert_eq!(fx.session.live_proxies(), 1);
        assert_eq!(fx.registry.pending_relocations(), 1);
        fx.registry.check_invariants();
    }

    #[test]
    fn test_attach_waits_for_relocation() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        let ticket = fx.start(alice, bob).unwrap();

        let shown = |call: &SessionCall| matches!(call, SessionCall::Show { .. });
        assert_eq!(fx.session.count(shown), 0);

        assert_eq!(fx.complete(ticket), Ok(AttachOutcome::Attached));
        let handle = fx.registry.proxy_of(alice).unwrap();
        let relocate = fx
            .session
            .calls()
            .iter()
            .position(|call| matches!(call, SessionCall::Relocate { .. }))
            .unwrap();
        let show = fx
            .session
            .position_of(&SessionCall::Show { spectator: bob, handle })
            .unwrap();
        let attach = fx
            .session
            .position_of(&SessionCall::Attach {
                spectator: bob,
                target: Some(handle),
            })
            .unwrap();
        assert!(relocate < show && show < attach);

        // Completing twice is harmless.
        assert_eq!(fx.complete(ticket), Ok(AttachOutcome::Stale));
    }

    #[test]
    fn test_stop_before_relocation_cancels_attach() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        let ticket = fx.start(alice, bob).unwrap();
        assert_eq!(fx.stop(alice, bob), StopOutcome::Stopped);
        assert_eq!(fx.registry.pending_relocations(), 0);

        assert_eq!(fx.complete(ticket), Ok(AttachOutcome::Stale));
        assert_eq!(
            fx.session
                .count(|call| matches!(call, SessionCall::Attach { target: Some(_), .. })),
            0
        );
    }

    #[test]
    fn test_restart_does_not_honour_old_ticket() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        let first = fx.start(alice, bob).unwrap();
        fx.stop(alice, bob);
        let second = fx.start(alice, bob).unwrap();
        assert!(second > first);

        assert_eq!(fx.registry.pending_relocations(), 1);
        assert_eq!(fx.complete(first), Ok(AttachOutcome::Stale));
        assert_eq!(fx.complete(second), Ok(AttachOutcome::Attached));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        fx.start(alice, bob).unwrap();

        assert_eq!(fx.stop(alice, bob), StopOutcome::Stopped);
        let calls = fx.session.calls().len();
        assert_eq!(fx.stop(alice, bob), StopOutcome::NotSpectating);
        assert_eq!(fx.session.calls().len(), calls);
        assert_eq!(fx.stop(bob, alice), StopOutcome::NotSpectating);
    }

    #[test]
    fn test_stop_restores_camera_and_visibility() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        let carol = fx.spawn("carol");
        fx.start(alice, bob).unwrap();
        let handle = fx.registry.proxy_of(alice).unwrap();
        fx.session.clear();

        fx.stop(alice, bob);
        assert!(fx
            .session
            .position_of(&SessionCall::Destroy {
                spectator: bob,
                handle
            })
            .is_some());
        assert!(fx
            .session
            .position_of(&SessionCall::Attach {
                spectator: bob,
                target: None
            })
            .is_some());
        for other in [alice, carol] {
            assert!(fx
                .session
                .position_of(&SessionCall::Visibility {
                    a: bob,
                    b: other,
                    visible: true
                })
                .is_some());
        }
        assert_eq!(fx.session.count(|call| matches!(call, SessionCall::Release { .. })), 1);
        assert_eq!(fx.session.live_proxies(), 0);
        // The record outlives its last spectator, the proxy does not.
        let record = fx.registry.record(alice).unwrap();
        assert!(record.proxy().is_none());
        assert!(!record.has_spectators());
    }

    #[test]
    fn test_visibility_is_suppressed_globally() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        let carol = fx.spawn("carol");
        let dave = fx.spawn("dave");
        fx.start(alice, bob).unwrap();
        fx.start(carol, dave).unwrap();

        // Dave watches someone else, but still hides from Bob.
        assert!(fx
            .session
            .position_of(&SessionCall::Visibility {
                a: bob,
                b: dave,
                visible: false
            })
            .is_some());
    }

    #[test]
    fn test_switching_subject_stops_previous_edge() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        let carol = fx.spawn("carol");
        fx.start(alice, bob).unwrap();
        fx.start(carol, bob).unwrap();

        assert_eq!(fx.registry.subject_of(bob), Some(carol));
        assert!(fx.registry.spectators_of(alice).is_empty());
        assert!(fx.registry.proxy_of(alice).is_none());
        assert_eq!(fx.session.live_proxies(), 1);
        fx.registry.check_invariants();
    }

    #[test]
    fn test_new_spectator_sheds_its_own_audience() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        let carol = fx.spawn("carol");
        fx.start(bob, carol).unwrap();
        fx.start(alice, bob).unwrap();

        assert!(!fx.registry.is_spectating(carol));
        assert!(fx.registry.proxy_of(bob).is_none());
        fx.registry.check_invariants();
    }

    #[test]
    fn test_refused_relocation_rolls_back() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        fx.session.disconnect(bob);

        let err = fx.start(alice, bob).unwrap_err();
        assert!(matches!(
            err,
            SpectateError::ViewSessionFailure {
                source: SessionError::Disconnected(_),
                ..
            }
        ));
        assert!(!fx.registry.is_spectating(bob));
        assert!(fx.registry.proxy_of(alice).is_none());
        assert_eq!(fx.session.live_proxies(), 0);
        assert_eq!(fx.registry.pending_relocations(), 0);
    }

    #[test]
    fn test_failed_relocation_rolls_back() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        let ticket = fx.start(alice, bob).unwrap();

        let mut ctx = SpectationContext::new(&mut fx.entities, &fx.world, &mut fx.session);
        let result = fx.registry.complete_relocation(
            ticket,
            Err(SessionError::Disconnected(bob)),
            &mut ctx,
        );
        assert!(matches!(result, Err(SpectateError::ViewSessionFailure { .. })));
        assert!(!fx.registry.is_spectating(bob));
        assert_eq!(fx.session.live_proxies(), 0);
    }

    /// Asserts `spectator` is fully unwound after a failed spectation.
    fn assert_rolled_back(fx: &Fixture, subject: EntityId, spectator: EntityId, bystander: EntityId) {
        assert!(!fx.registry.is_spectating(spectator));
        assert!(fx.registry.spectators_of(subject).is_empty());
        assert!(fx.registry.proxy_of(subject).is_none());
        assert_eq!(fx.registry.pending_relocations(), 0);
        assert_eq!(fx.session.live_proxies(), 0);
        assert!(fx
            .session
            .position_of(&SessionCall::Visibility {
                a: spectator,
                b: bystander,
                visible: true
            })
            .is_some());
        assert!(fx.registry.invariant_violations().is_empty());
    }

    #[test]
    fn test_refused_spawn_rolls_back() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        let carol = fx.spawn("carol");
        fx.session.refuse(RefusedCall::Spawn);

        let err = fx.start(alice, bob).unwrap_err();
        assert!(matches!(
            err,
            SpectateError::ViewSessionFailure {
                source: SessionError::Rejected(_),
                ..
            }
        ));
        assert_eq!(fx.session.count(|call| matches!(call, SessionCall::Relocate { .. })), 0);
        assert_rolled_back(&fx, alice, bob, carol);

        fx.session.accept(RefusedCall::Spawn);
        let ticket = fx.start(alice, bob).unwrap();
        assert_eq!(fx.complete(ticket), Ok(AttachOutcome::Attached));
    }

    #[test]
    fn test_refused_show_or_attach_rolls_back() {
        for refused in [RefusedCall::Show, RefusedCall::Attach] {
            let mut fx = Fixture::new();
            let alice = fx.spawn("alice");
            let bob = fx.spawn("bob");
            let carol = fx.spawn("carol");
            let ticket = fx.start(alice, bob).unwrap();
            let handle = fx.registry.proxy_of(alice).unwrap();
            fx.session.refuse(refused);

            let err = fx.complete(ticket).unwrap_err();
            assert!(matches!(
                err,
                SpectateError::ViewSessionFailure {
                    source: SessionError::Rejected(_),
                    ..
                }
            ));
            assert_rolled_back(&fx, alice, bob, carol);
            assert!(fx
                .session
                .position_of(&SessionCall::Destroy {
                    spectator: bob,
                    handle
                })
                .is_some());
            assert!(fx
                .session
                .position_of(&SessionCall::Attach {
                    spectator: bob,
                    target: None
                })
                .is_some());
            assert_eq!(fx.complete(ticket), Ok(AttachOutcome::Stale));
        }
    }

    #[test]
    fn test_mode_lock() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        assert!(fx.registry.check_mode_change(bob, EntityMode::Creative).is_ok());

        fx.start(alice, bob).unwrap();
        assert_eq!(
            fx.registry.check_mode_change(bob, EntityMode::Creative),
            Err(SpectateError::ModeLocked(bob))
        );
        assert!(fx.registry.check_mode_change(bob, EntityMode::Observing).is_ok());
        assert!(fx.registry.check_mode_change(alice, EntityMode::Creative).is_ok());
    }

    #[test]
    fn test_refresh_skips_unchanged_pose() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        fx.start(alice, bob).unwrap();

        // Pose was captured when the proxy spawned.
        assert_eq!(fx.refresh(alice), RefreshOutcome::Skipped);

        fx.entities
            .move_to(alice, Vec3::new(3.5, 64.0, 0.5), Orientation::new(10.0, 5.0));
        assert_eq!(fx.refresh(alice), RefreshOutcome::Refreshed);
        assert_eq!(fx.refresh(alice), RefreshOutcome::Skipped);
        assert_eq!(fx.refresh(bob), RefreshOutcome::Idle);
    }

    #[test]
    fn test_refresh_of_vanished_subject_drops_it() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        fx.start(alice, bob).unwrap();
        fx.entities.despawn(alice);

        assert_eq!(fx.refresh(alice), RefreshOutcome::Removed);
        assert!(fx.registry.record(alice).is_none());
        assert!(!fx.registry.is_spectating(bob));
    }

    #[test]
    fn test_heal_orphans_releases_once() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        fx.start(alice, bob).unwrap();

        // Corrupt the record the way a lost edge would.
        fx.registry.edges.clear();
        fx.registry
            .records
            .get_mut(&alice)
            .unwrap()
            .spectators
            .clear();
        assert_eq!(
            fx.registry.invariant_violations(),
            vec![InvariantViolation::OrphanProxy(alice)]
        );

        let mut ctx = SpectationContext::new(&mut fx.entities, &fx.world, &mut fx.session);
        assert_eq!(fx.registry.heal_orphans(&mut ctx), 1);
        assert_eq!(fx.registry.heal_orphans(&mut ctx), 0);
        assert!(fx.registry.invariant_violations().is_empty());
        assert_eq!(fx.session.live_proxies(), 0);
    }

    #[test]
    fn test_spectatable_names_skip_observers() {
        let mut fx = Fixture::new();
        let alice = fx.spawn("alice");
        let bob = fx.spawn("bob");
        fx.registry.get_or_create(alice);
        fx.registry.get_or_create(bob);
        fx.start(alice, bob).unwrap();

        assert_eq!(fx.registry.spectatable_names(&fx.entities), vec!["alice".to_string()]);
    }
}
