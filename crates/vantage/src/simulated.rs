//! # Simulated View Session
//!
//! A headless stand-in for the render/network layer.
//!
//! Client state (bodies, cameras, visible proxies, hidden pairs) lives behind
//! a `parking_lot::Mutex` shared with a relocation worker thread. Relocations
//! are queued to the worker over a channel; when one lands, the worker moves
//! the body and reports [`HostEvent::RelocationFinished`] on the event bus so
//! the tick thread can run phase two.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use vantage_core::{EventSender, HostEvent, ProxyHandle, RelocationTicket, SessionError, ViewSession};
use vantage_shared::{EntityId, RegionId, Transform};

/// Everything the connected clients would currently be rendering.
#[derive(Debug, Default)]
struct ClientState {
    bodies: HashMap<EntityId, Transform>,
    cameras: HashMap<EntityId, ProxyHandle>,
    shown: HashMap<EntityId, BTreeSet<ProxyHandle>>,
    proxies: HashMap<ProxyHandle, (RegionId, Transform)>,
    hidden: BTreeSet<(EntityId, EntityId)>,
    disconnected: BTreeSet<EntityId>,
    relocations: u64,
}

impl ClientState {
    fn reachable(&self, entity: EntityId) -> Result<(), SessionError> {
        if self.disconnected.contains(&entity) {
            Err(SessionError::Disconnected(entity))
        } else {
            Ok(())
        }
    }

    fn pair(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

struct RelocationRequest {
    spectator: EntityId,
    transform: Transform,
    ticket: RelocationTicket,
}

/// [`ViewSession`] backed by in-memory client state and a worker thread.
pub struct SimulatedSession {
    state: Arc<Mutex<ClientState>>,
    requests: Option<Sender<RelocationRequest>>,
    worker: Option<JoinHandle<()>>,
    next_handle: u32,
}

impl SimulatedSession {
    /// Starts the relocation worker. Completions go to `events`.
    #[must_use]
    pub fn new(events: EventSender, latency: Duration) -> Self {
        let state = Arc::new(Mutex::new(ClientState::default()));
        let (requests, inbox) = unbounded();
        let worker_state = Arc::clone(&state);
        let worker = std::thread::Builder::new()
            .name("vantage-relocation".to_string())
            .spawn(move || relocation_worker(&worker_state, &inbox, &events, latency))
            .map_err(|err| tracing::warn!("Relocation worker failed to start: {}", err))
            .ok();

        Self {
            state,
            requests: Some(requests),
            worker,
            next_handle: 0,
        }
    }

    /// Registers a client body.
    pub fn connect(&self, entity: EntityId, body: Transform) {
        let mut state = self.state.lock();
        state.disconnected.remove(&entity);
        state.bodies.insert(entity, body);
    }

    /// Drops a client; later calls addressed to it fail.
    pub fn disconnect(&self, entity: EntityId) {
        let mut state = self.state.lock();
        state.disconnected.insert(entity);
        state.bodies.remove(&entity);
        state.cameras.remove(&entity);
        state.shown.remove(&entity);
    }

    /// Keeps a body in sync with the host's own movement.
    pub fn sync_body(&self, entity: EntityId, body: Transform) {
        self.state.lock().bodies.insert(entity, body);
    }

    /// Where a client's body is.
    #[must_use]
    pub fn body_of(&self, entity: EntityId) -> Option<Transform> {
        self.state.lock().bodies.get(&entity).copied()
    }

    /// Proxy a client's camera is attached to.
    #[must_use]
    pub fn camera_of(&self, entity: EntityId) -> Option<ProxyHandle> {
        self.state.lock().cameras.get(&entity).copied()
    }

    /// Whether a client currently renders `handle`.
    #[must_use]
    pub fn sees_proxy(&self, entity: EntityId, handle: ProxyHandle) -> bool {
        self.state
            .lock()
            .shown
            .get(&entity)
            .is_some_and(|shown| shown.contains(&handle))
    }

    /// Current transform of a live proxy.
    #[must_use]
    pub fn proxy_transform(&self, handle: ProxyHandle) -> Option<Transform> {
        self.state
            .lock()
            .proxies
            .get(&handle)
            .map(|(_, transform)| *transform)
    }

    /// Region a live proxy was spawned in.
    #[must_use]
    pub fn proxy_region(&self, handle: ProxyHandle) -> Option<RegionId> {
        self.state.lock().proxies.get(&handle).map(|(region, _)| *region)
    }

    /// Number of live proxies.
    #[must_use]
    pub fn live_proxies(&self) -> usize {
        self.state.lock().proxies.len()
    }

    /// Whether two entities are hidden from each other.
    #[must_use]
    pub fn are_hidden(&self, a: EntityId, b: EntityId) -> bool {
        self.state.lock().hidden.contains(&ClientState::pair(a, b))
    }

    /// Relocations the worker has finished.
    #[must_use]
    pub fn relocations(&self) -> u64 {
        self.state.lock().relocations
    }
}

fn relocation_worker(
    state: &Mutex<ClientState>,
    inbox: &Receiver<RelocationRequest>,
    events: &EventSender,
    latency: Duration,
) {
    for request in inbox {
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        let result = {
            let mut state = state.lock();
            state.relocations += 1;
            state.reachable(request.spectator).map(|()| {
                state.bodies.insert(request.spectator, request.transform);
            })
        };
        let finished = HostEvent::RelocationFinished {
            ticket: request.ticket,
            result,
        };
        if !events.send_blocking(finished) {
            tracing::debug!("Event bus closed, relocation worker exiting");
            return;
        }
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Relocation worker panicked");
            }
        }
    }
}

impl ViewSession for SimulatedSession {
    fn spawn_proxy(
        &mut self,
        region: RegionId,
        transform: Transform,
    ) -> Result<ProxyHandle, SessionError> {
        self.next_handle += 1;
        let handle = ProxyHandle::from_raw(self.next_handle);
        self.state.lock().proxies.insert(handle, (region, transform));
        Ok(handle)
    }

    fn show_proxy(&mut self, spectator: EntityId, handle: ProxyHandle) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.reachable(spectator)?;
        if !state.proxies.contains_key(&handle) {
            return Err(SessionError::UnknownProxy(handle));
        }
        state.shown.entry(spectator).or_default().insert(handle);
        Ok(())
    }

    fn update_transform(
        &mut self,
        spectators: &[EntityId],
        handle: ProxyHandle,
        transform: Transform,
    ) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        let Some(proxy) = state.proxies.get_mut(&handle) else {
            return Err(SessionError::UnknownProxy(handle));
        };
        proxy.1 = transform;
        tracing::trace!(
            "Proxy {:?} moved for {} spectator(s)",
            handle,
            spectators.len()
        );
        Ok(())
    }

    fn destroy_proxy(
        &mut self,
        spectator: EntityId,
        handle: ProxyHandle,
    ) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.reachable(spectator)?;
        if let Some(shown) = state.shown.get_mut(&spectator) {
            shown.remove(&handle);
        }
        Ok(())
    }

    fn release_proxy(&mut self, handle: ProxyHandle) {
        self.state.lock().proxies.remove(&handle);
    }

    fn attach_camera(
        &mut self,
        spectator: EntityId,
        target: Option<ProxyHandle>,
    ) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.reachable(spectator)?;
        match target {
            Some(handle) => {
                state.cameras.insert(spectator, handle);
            }
            None => {
                state.cameras.remove(&spectator);
            }
        }
        Ok(())
    }

    fn relocate(
        &mut self,
        spectator: EntityId,
        transform: Transform,
        ticket: RelocationTicket,
    ) -> Result<(), SessionError> {
        self.state.lock().reachable(spectator)?;
        let request = RelocationRequest {
            spectator,
            transform,
            ticket,
        };
        match &self.requests {
            Some(requests) if self.worker.is_some() => requests
                .send(request)
                .map_err(|_| SessionError::Rejected("relocation worker stopped".to_string())),
            _ => Err(SessionError::Rejected(
                "relocation worker not running".to_string(),
            )),
        }
    }

    fn teleport(&mut self, spectator: EntityId, transform: Transform) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.reachable(spectator)?;
        state.bodies.insert(spectator, transform);
        Ok(())
    }

    fn set_mutual_visibility(&mut self, a: EntityId, b: EntityId, visible: bool) {
        let mut state = self.state.lock();
        let pair = ClientState::pair(a, b);
        if visible {
            state.hidden.remove(&pair);
        } else {
            state.hidden.insert(pair);
        }
    }
}
