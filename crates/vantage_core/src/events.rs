//! # Host Events
//!
//! Marshals host notifications onto the tick thread.
//!
//! ```text
//! ┌──────────────┐   try_send   ┌──────────┐   drain   ┌──────────────┐
//! │ host threads │─────────────>│ EventBus │──────────>│ tick thread  │
//! │ (I/O, relocs)│              │ bounded  │           │ dispatch()   │
//! └──────────────┘              └──────────┘           └──────────────┘
//! ```
//!
//! Only [`dispatch`] touches the registry, and only the tick thread calls it.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use vantage_shared::EntityId;

use crate::entity::EntityMode;
use crate::error::{SessionError, SpectateResult};
use crate::registry::{AttachOutcome, SpectationContext, SpectationRegistry, StopOutcome};
use crate::session::RelocationTicket;

/// Default channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Something the host observed.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    /// An entity entered the simulation.
    Joined(EntityId),
    /// An entity left the simulation.
    Left(EntityId),
    /// An entity moved to another region.
    RegionChanged(EntityId),
    /// An entity asks to switch mode.
    ModeChangeRequested {
        /// Requesting entity.
        entity: EntityId,
        /// Desired mode.
        mode: EntityMode,
    },
    /// A spectator asked to leave the camera.
    Dismount(EntityId),
    /// A relocation issued by the registry finished.
    RelocationFinished {
        /// Ticket passed to `relocate`.
        ticket: RelocationTicket,
        /// How it went.
        result: Result<(), SessionError>,
    },
}

/// What dispatching one event did.
#[derive(Debug, PartialEq)]
pub enum EventOutcome {
    /// Record ensured for a new entity.
    Registered,
    /// Entity forgotten; this many spectations were stopped.
    Removed(usize),
    /// Spectations restarted after a region change.
    Restarted(Vec<(EntityId, SpectateResult<RelocationTicket>)>),
    /// Mode change applied, or refused while spectating.
    ModeChange(SpectateResult<()>),
    /// Result of a dismount.
    Dismounted(StopOutcome),
    /// Result of phase two of a relocation.
    Attach(SpectateResult<AttachOutcome>),
}

/// Bounded multi-producer channel of [`HostEvent`]s.
pub struct EventBus {
    sender: Sender<HostEvent>,
    receiver: Receiver<HostEvent>,
}

impl EventBus {
    /// Creates a bus holding at most `capacity` undelivered events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Producer handle, clone freely.
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Takes every pending event without blocking.
    pub fn drain(&self) -> Vec<HostEvent> {
        self.receiver.try_iter().collect()
    }

    /// Waits up to `timeout` for one event.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<HostEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Handle for sending events.
#[derive(Clone)]
pub struct EventSender {
    sender: Sender<HostEvent>,
}

impl EventSender {
    /// Sends without blocking. Returns `false` if the event was dropped.
    #[inline]
    pub fn send(&self, event: HostEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!("Event bus full, dropping {:?}", event);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Sends, waiting for room. Use for events that must not be lost.
    #[inline]
    pub fn send_blocking(&self, event: HostEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Applies one host event to the registry.
pub fn dispatch(
    registry: &mut SpectationRegistry,
    event: HostEvent,
    ctx: &mut SpectationContext<'_>,
) -> EventOutcome {
    match event {
        HostEvent::Joined(entity) => {
            registry.get_or_create(entity);
            EventOutcome::Registered
        }
        HostEvent::Left(entity) => EventOutcome::Removed(registry.on_entity_removed(entity, ctx)),
        HostEvent::RegionChanged(entity) => {
            EventOutcome::Restarted(registry.on_subject_region_changed(entity, ctx))
        }
        HostEvent::ModeChangeRequested { entity, mode } => {
            let allowed = registry.check_mode_change(entity, mode);
            if allowed.is_ok() {
                ctx.entities.set_mode(entity, mode);
                if !mode.is_eligible() {
                    registry.on_subject_ineligible(entity, ctx);
                }
            }
            EventOutcome::ModeChange(allowed)
        }
        HostEvent::Dismount(spectator) => {
            EventOutcome::Dismounted(registry.on_dismount(spectator, ctx))
        }
        HostEvent::RelocationFinished { ticket, result } => {
            EventOutcome::Attach(registry.complete_relocation(ticket, result, ctx))
        }
    }
}
