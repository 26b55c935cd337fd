//! # View Session
//!
//! The narrow contract the core needs from the render/network layer that
//! actually shows a proxy body to spectator clients and moves their cameras.
//!
//! ```text
//! Core issues:            Host implements:
//! ┌──────────────────┐    ┌──────────────────┐
//! │ trait ViewSession│ ←─ │ impl ViewSession │
//! └──────────────────┘    └──────────────────┘
//! ```
//!
//! [`RecordingViewSession`] records every call for tests.

use std::collections::BTreeSet;

use vantage_shared::{head_yaw_angle, EntityId, RegionId, Transform};

use crate::error::SessionError;

/// Opaque reference to a proxy body spawned in a View Session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProxyHandle(u32);

impl ProxyHandle {
    /// Wraps a session-issued raw handle.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw value for the session's own bookkeeping.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Identifies one pending relocation.
///
/// Issued in strictly increasing order by the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelocationTicket(pub u64);

/// Render-layer operations used by the spectation core.
///
/// All calls are made from the tick thread. `relocate` is the only
/// asynchronous operation: the host reports its completion later through
/// [`crate::events::HostEvent::RelocationFinished`] carrying the same ticket.
pub trait ViewSession {
    /// Spawns a proxy body at `transform` in `region`.
    fn spawn_proxy(&mut self, region: RegionId, transform: Transform)
        -> Result<ProxyHandle, SessionError>;

    /// Makes the proxy visible to one spectator's client.
    fn show_proxy(&mut self, spectator: EntityId, handle: ProxyHandle) -> Result<(), SessionError>;

    /// Moves the proxy for every listed spectator, body and head yaw.
    fn update_transform(
        &mut self,
        spectators: &[EntityId],
        handle: ProxyHandle,
        transform: Transform,
    ) -> Result<(), SessionError>;

    /// Removes the proxy from one spectator's client.
    fn destroy_proxy(&mut self, spectator: EntityId, handle: ProxyHandle)
        -> Result<(), SessionError>;

    /// Drops the proxy server-side. Called once per proxy.
    fn release_proxy(&mut self, handle: ProxyHandle);

    /// Points a spectator's camera at a proxy, or back at its own body.
    fn attach_camera(
        &mut self,
        spectator: EntityId,
        target: Option<ProxyHandle>,
    ) -> Result<(), SessionError>;

    /// Starts moving a spectator's body to `transform`.
    fn relocate(
        &mut self,
        spectator: EntityId,
        transform: Transform,
        ticket: RelocationTicket,
    ) -> Result<(), SessionError>;

    /// Moves a spectator's body immediately.
    fn teleport(&mut self, spectator: EntityId, transform: Transform) -> Result<(), SessionError>;

    /// Shows or hides two entities from each other.
    fn set_mutual_visibility(&mut self, a: EntityId, b: EntityId, visible: bool);
}

// ============================================================================
// RECORDING SESSION (for tests)
// ============================================================================

/// One call made against a [`RecordingViewSession`].
#[derive(Clone, Debug, PartialEq)]
pub enum SessionCall {
    /// `spawn_proxy`
    Spawn {
        /// Issued handle.
        handle: ProxyHandle,
        /// Region of the proxy.
        region: RegionId,
        /// Initial transform.
        transform: Transform,
    },
    /// `show_proxy`
    Show {
        /// Receiving spectator.
        spectator: EntityId,
        /// Shown proxy.
        handle: ProxyHandle,
    },
    /// `update_transform`
    Update {
        /// Receiving spectators.
        spectators: Vec<EntityId>,
        /// Moved proxy.
        handle: ProxyHandle,
        /// New transform.
        transform: Transform,
        /// Head yaw in wire angle units.
        head_yaw: i8,
    },
    /// `destroy_proxy`
    Destroy {
        /// Spectator losing the proxy.
        spectator: EntityId,
        /// Removed proxy.
        handle: ProxyHandle,
    },
    /// `release_proxy`
    Release {
        /// Released proxy.
        handle: ProxyHandle,
    },
    /// `attach_camera`
    Attach {
        /// Spectator whose camera moves.
        spectator: EntityId,
        /// New camera target, `None` for the own body.
        target: Option<ProxyHandle>,
    },
    /// `relocate`
    Relocate {
        /// Moved spectator.
        spectator: EntityId,
        /// Destination.
        transform: Transform,
        /// Completion token.
        ticket: RelocationTicket,
    },
    /// `teleport`
    Teleport {
        /// Moved spectator.
        spectator: EntityId,
        /// Destination.
        transform: Transform,
    },
    /// `set_mutual_visibility`
    Visibility {
        /// First entity.
        a: EntityId,
        /// Second entity.
        b: EntityId,
        /// Whether they see each other.
        visible: bool,
    },
}

/// Calls a [`RecordingViewSession`] can be told to refuse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefusedCall {
    /// `spawn_proxy`
    Spawn,
    /// `show_proxy`
    Show,
    /// `attach_camera` onto a proxy. Returning the camera still succeeds.
    Attach,
}

/// [`ViewSession`] that records calls and can simulate disconnected clients
/// or a render layer refusing requests.
#[derive(Debug, Default)]
pub struct RecordingViewSession {
    calls: Vec<SessionCall>,
    next_handle: u32,
    live: BTreeSet<ProxyHandle>,
    disconnected: BTreeSet<EntityId>,
    refused: BTreeSet<RefusedCall>,
}

impl RecordingViewSession {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> &[SessionCall] {
        &self.calls
    }

    /// Forgets recorded calls, keeps proxies and connection state.
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&SessionCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    /// Proxies spawned and not yet released.
    #[must_use]
    pub fn live_proxies(&self) -> usize {
        self.live.len()
    }

    /// Makes every later call addressed to `entity` fail.
    pub fn disconnect(&mut self, entity: EntityId) {
        self.disconnected.insert(entity);
    }

    /// Undoes [`Self::disconnect`].
    pub fn reconnect(&mut self, entity: EntityId) {
        self.disconnected.remove(&entity);
    }

    /// Makes every later `call` fail with [`SessionError::Rejected`].
    pub fn refuse(&mut self, call: RefusedCall) {
        self.refused.insert(call);
    }

    /// Undoes [`Self::refuse`].
    pub fn accept(&mut self, call: RefusedCall) {
        self.refused.remove(&call);
    }

    /// Position of `call` in the log, if recorded.
    #[must_use]
    pub fn position_of(&self, call: &SessionCall) -> Option<usize> {
        self.calls.iter().position(|recorded| recorded == call)
    }

    fn reachable(&self, spectator: EntityId) -> Result<(), SessionError> {
        if self.disconnected.contains(&spectator) {
            Err(SessionError::Disconnected(spectator))
        } else {
            Ok(())
        }
    }

    fn allowed(&self, call: RefusedCall) -> Result<(), SessionError> {
        if self.refused.contains(&call) {
            Err(SessionError::Rejected(format!("{call:?} refused")))
        } else {
            Ok(())
        }
    }

    fn known(&self, handle: ProxyHandle) -> Result<(), SessionError> {
        if self.live.contains(&handle) {
            Ok(())
        } else {
            Err(SessionError::UnknownProxy(handle))
        }
    }
}

impl ViewSession for RecordingViewSession {
    fn spawn_proxy(
        &mut self,
        region: RegionId,
        transform: Transform,
    ) -> Result<ProxyHandle, SessionError> {
        self.allowed(RefusedCall::Spawn)?;
        self.next_handle += 1;
        let handle = ProxyHandle(self.next_handle);
        self.live.insert(handle);
        self.calls.push(SessionCall::Spawn {
            handle,
            region,
            transform,
        });
        Ok(handle)
    }

    fn show_proxy(&mut self, spectator: EntityId, handle: ProxyHandle) -> Result<(), SessionError> {
        self.calls.push(SessionCall::Show { spectator, handle });
        self.allowed(RefusedCall::Show)?;
        self.reachable(spectator)?;
        self.known(handle)
    }

    fn update_transform(
        &mut self,
        spectators: &[EntityId],
        handle: ProxyHandle,
        transform: Transform,
    ) -> Result<(), SessionError> {
        self.calls.push(SessionCall::Update {
            spectators: spectators.to_vec(),
            handle,
            transform,
            head_yaw: head_yaw_angle(transform.orientation.yaw),
        });
        self.known(handle)
    }

    fn destroy_proxy(
        &mut self,
        spectator: EntityId,
        handle: ProxyHandle,
    ) -> Result<(), SessionError> {
        self.calls.push(SessionCall::Destroy { spectator, handle });
        self.reachable(spectator)
    }

    fn release_proxy(&mut self, handle: ProxyHandle) {
        self.live.remove(&handle);
        self.calls.push(SessionCall::Release { handle });
    }

    fn attach_camera(
        &mut self,
        spectator: EntityId,
        target: Option<ProxyHandle>,
    ) -> Result<(), SessionError> {
        self.calls.push(SessionCall::Attach { spectator, target });
        if target.is_some() {
            self.allowed(RefusedCall::Attach)?;
        }
        self.reachable(spectator)
    }

    fn relocate(
        &mut self,
        spectator: EntityId,
        transform: Transform,
        ticket: RelocationTicket,
    ) -> Result<(), SessionError> {
        self.calls.push(SessionCall::Relocate {
            spectator,
            transform,
            ticket,
        });
        self.reachable(spectator)
    }

    fn teleport(&mut self, spectator: EntityId, transform: Transform) -> Result<(), SessionError> {
        self.calls.push(SessionCall::Teleport {
            spectator,
            transform,
        });
        self.reachable(spectator)
    }

    fn set_mutual_visibility(&mut self, a: EntityId, b: EntityId, visible: bool) {
        self.calls.push(SessionCall::Visibility { a, b, visible });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_shared::{Orientation, Vec3};

    #[test]
    fn test_recorder_tracks_proxies() {
        let mut session = RecordingViewSession::new();
        let a = session.spawn_proxy(RegionId(0), Transform::default()).unwrap();
        let b = session.spawn_proxy(RegionId(0), Transform::default()).unwrap();
        assert_ne!(a, b);
        assert_eq!(session.live_proxies(), 2);

        session.release_proxy(a);
        assert_eq!(session.live_proxies(), 1);
        assert_eq!(
            session.show_proxy(EntityId(1), a),
            Err(SessionError::UnknownProxy(a))
        );
    }

    #[test]
    fn test_disconnected_spectator_fails() {
        let mut session = RecordingViewSession::new();
        session.disconnect(EntityId(9));
        let err = session
            .teleport(EntityId(9), Transform::default())
            .unwrap_err();
        assert_eq!(err, SessionError::Disconnected(EntityId(9)));
        // The call is still recorded.
        assert_eq!(session.calls().len(), 1);

        session.reconnect(EntityId(9));
        assert!(session.teleport(EntityId(9), Transform::default()).is_ok());
    }

    #[test]
    fn test_refused_calls_fail_until_accepted() {
        let mut session = RecordingViewSession::new();
        session.refuse(RefusedCall::Spawn);
        assert!(matches!(
            session.spawn_proxy(RegionId(0), Transform::default()),
            Err(SessionError::Rejected(_))
        ));
        assert_eq!(session.live_proxies(), 0);
        session.accept(RefusedCall::Spawn);
        let handle = session.spawn_proxy(RegionId(0), Transform::default()).unwrap();

        session.refuse(RefusedCall::Attach);
        assert!(session.attach_camera(EntityId(1), Some(handle)).is_err());
        assert!(session.attach_camera(EntityId(1), None).is_ok());
    }

    #[test]
    fn test_update_records_head_yaw() {
        let mut session = RecordingViewSession::new();
        let handle = session.spawn_proxy(RegionId(0), Transform::default()).unwrap();
        let transform = Transform::new(Vec3::ZERO, Orientation::new(90.0, 0.0));
        session
            .update_transform(&[EntityId(1)], handle, transform)
            .unwrap();
        assert_eq!(
            session.count(|call| matches!(call, SessionCall::Update { head_yaw: 64, .. })),
            1
        );
    }
}
