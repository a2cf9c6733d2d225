//! # Playback Coordination Engine
//!
//! Single active-track state machine owning exactly one player resource
//! at a time.
//!
//! ## State machine
//!
//! ```text
//! Idle ──load──> Loading ──first status tick──> Playing <──> Paused
//!   ^               │                              │
//!   └── stop / watchdog / finish / fault ──────────┘
//! ```
//!
//! Commands serialize on an async session lock. Status events from the
//! player pipeline arrive on a pump task and are folded into the snapshot
//! through the same generation-checked mutation path, so a superseded
//! pump can never corrupt the state of a newer session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::error::BridgeError;
use bridge_traits::player::{MediaSource, PlayerBackend, PlayerControls, PlayerEventStream};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::{PlaybackError, Result};
use crate::listeners::{ListenerRegistry, SubscriptionId};
use crate::model::TrackRef;
use crate::state::{EngineFault, FaultKind, PlaybackPhase, PlaybackSnapshot, PlaybackSpeed};

/// The playback coordination engine.
///
/// One logical instance exists per running app, but the engine is an
/// explicitly constructed, dependency-injected value so parallel tests
/// can hold as many as they like. Cloning is cheap and shares the same
/// underlying state.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    backend: Arc<dyn PlayerBackend>,
    config: EngineConfig,
    events: Option<Arc<EventBus>>,
    state: Mutex<PlaybackSnapshot>,
    listeners: ListenerRegistry,
    generation: AtomicU64,
    session: AsyncMutex<Option<Session>>,
}

/// Live player resource plus its background tasks.
struct Session {
    track: TrackRef,
    controls: Arc<dyn PlayerControls>,
    generation: u64,
    pump: JoinHandle<()>,
    watchdog: JoinHandle<()>,
}

impl PlaybackEngine {
    /// Create a new engine.
    pub fn new(backend: Arc<dyn PlayerBackend>, config: EngineConfig) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;

        Ok(Self {
            inner: Arc::new(EngineInner {
                backend,
                config,
                events: None,
                state: Mutex::new(PlaybackSnapshot::idle()),
                listeners: ListenerRegistry::new(),
                generation: AtomicU64::new(0),
                session: AsyncMutex::new(None),
            }),
        })
    }

    /// Set event bus for lifecycle events. Must be called before the
    /// engine is cloned or shared.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.events = Some(event_bus),
            None => warn!("with_event_bus ignored: engine already shared"),
        }
        self
    }

    /// Current playback snapshot.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.inner.snapshot()
    }

    /// Register a snapshot observer.
    ///
    /// The current snapshot is delivered synchronously before this
    /// returns; every subsequent mutation delivers the full new snapshot.
    pub fn subscribe(
        &self,
        callback: impl Fn(&PlaybackSnapshot) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let current = self.inner.snapshot();
        self.inner.listeners.subscribe(callback, &current)
    }

    /// Remove a snapshot observer. Returns whether it existed.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    /// Load `source` and start playing `track`.
    ///
    /// When `track` is already current this degrades to a toggle: pause
    /// in place while playing, resume while paused. Anything else tears
    /// the previous session down first.
    #[instrument(skip(self, source, track), fields(track_id = %track.id))]
    pub async fn load_and_play(&self, source: MediaSource, track: TrackRef) -> Result<()> {
        let inner = &self.inner;
        let mut session = inner.session.lock().await;

        if let Some(current) = session.as_ref() {
            if current.track.id == track.id {
                match inner.snapshot().phase {
                    PlaybackPhase::Playing => {
                        return inner.pause_current(current).await;
                    }
                    PlaybackPhase::Paused => {
                        return inner.resume_current(current).await;
                    }
                    // Reloading a track that never settled falls through
                    // to a full fresh load.
                    _ => {}
                }
            }
        }

        if let Some(previous) = session.take() {
            debug!(previous = %previous.track.id, "tearing down previous session");
            inner.teardown(previous).await;
        }

        let generation = inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        inner.mutate(|state| *state = PlaybackSnapshot::loading(track.clone()));

        let handle = match inner.backend.create(source).await {
            Ok(handle) => handle,
            Err(err) => {
                let (kind, failure) = match &err {
                    BridgeError::NotAvailable(message) => {
                        (FaultKind::Setup, PlaybackError::SetupFailed(message.clone()))
                    }
                    other => (FaultKind::Load, PlaybackError::LoadFailed(other.to_string())),
                };
                warn!(error = %err, "player resource acquisition failed");
                inner.mutate(|state| {
                    *state = PlaybackSnapshot::idle();
                    state.fault = Some(EngineFault::new(kind, err.to_string()));
                });
                inner.emit(PlaybackEvent::Error {
                    track_id: Some(track.id.to_string()),
                    message: err.to_string(),
                    recoverable: failure.is_recoverable(),
                });
                return Err(failure);
            }
        };

        // Begin playback immediately; the pump promotes Loading ->
        // Playing on the first status tick that reports audio.
        if let Err(err) = handle.controls.play().await {
            handle.controls.remove().await.ok();
            inner.mutate(|state| {
                *state = PlaybackSnapshot::idle();
                state.fault = Some(EngineFault::new(FaultKind::Load, err.to_string()));
            });
            inner.emit(PlaybackEvent::Error {
                track_id: Some(track.id.to_string()),
                message: err.to_string(),
                recoverable: true,
            });
            return Err(PlaybackError::LoadFailed(err.to_string()));
        }

        let pump = self.spawn_pump(handle.events, generation, track.id.to_string());
        let watchdog = self.spawn_watchdog(generation);

        info!("playback session started");
        inner.emit(PlaybackEvent::Started {
            track_id: track.id.to_string(),
            title: track.title.clone(),
        });

        *session = Some(Session {
            track,
            controls: handle.controls,
            generation,
            pump,
            watchdog,
        });
        Ok(())
    }

    /// Pause playback. Valid only while `Playing`; the player resource is
    /// kept alive for quick resume.
    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<()> {
        let session = self.inner.session.lock().await;
        let Some(session) = session.as_ref() else {
            return Err(PlaybackError::NoTrackLoaded);
        };

        if self.inner.snapshot().phase != PlaybackPhase::Playing {
            return Err(PlaybackError::NotPlaying);
        }

        self.inner.pause_current(session).await
    }

    /// Stop playback and release the player resource. Valid from any
    /// state and idempotent.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let mut session = self.inner.session.lock().await;
        if session.is_none() && self.inner.snapshot().is_initial() {
            return Ok(());
        }
        self.inner.stop_locked(&mut session, None).await;
        Ok(())
    }

    /// Seek to an absolute position, clamped into `[0, duration]`.
    #[instrument(skip(self))]
    pub async fn seek_to(&self, position: Duration) -> Result<()> {
        let session = self.inner.session.lock().await;
        let Some(session) = session.as_ref() else {
            return Err(PlaybackError::NoTrackLoaded);
        };

        let snapshot = self.inner.snapshot();
        if snapshot.phase == PlaybackPhase::Loading {
            return Err(PlaybackError::StillLoading);
        }

        let clamped = position.min(snapshot.duration);
        session.controls.seek(clamped).await.map_err(|err| {
            self.inner.capture_fault(FaultKind::Playback, err.to_string());
            PlaybackError::ControlFailed(err.to_string())
        })?;

        self.inner.mutate(|state| state.position = clamped);
        Ok(())
    }

    /// Skip forward by `delta`, clamped to the track duration.
    pub async fn skip_forward(&self, delta: Duration) -> Result<()> {
        let target = {
            let snapshot = self.inner.snapshot();
            (snapshot.position + delta).min(snapshot.duration)
        };
        self.seek_to(target).await
    }

    /// Skip backward by `delta`, clamped to the track start.
    pub async fn skip_backward(&self, delta: Duration) -> Result<()> {
        let target = self.inner.snapshot().position.saturating_sub(delta);
        self.seek_to(target).await
    }

    /// Change the playback rate. Returns `false` when no player resource
    /// is attached or the resource rejected the rate.
    pub async fn set_speed(&self, speed: PlaybackSpeed) -> bool {
        let session = self.inner.session.lock().await;
        let Some(session) = session.as_ref() else {
            return false;
        };

        match session.controls.set_rate(speed.rate()).await {
            Ok(()) => {
                self.inner.mutate(|state| state.speed = speed);
                true
            }
            Err(err) => {
                warn!(error = %err, "player rejected rate change");
                false
            }
        }
    }

    /// Toggle looping. Returns `false` when no player resource is
    /// attached or the resource rejected the change.
    pub async fn set_looping(&self, looping: bool) -> bool {
        let session = self.inner.session.lock().await;
        let Some(session) = session.as_ref() else {
            return false;
        };

        match session.controls.set_looping(looping).await {
            Ok(()) => {
                self.inner.mutate(|state| state.looping = looping);
                true
            }
            Err(err) => {
                warn!(error = %err, "player rejected looping change");
                false
            }
        }
    }

    fn spawn_watchdog(&self, generation: u64) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        let timeout = self.inner.config.load_timeout;

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = inner.upgrade() {
                inner.abort_stalled_load(generation).await;
            }
        })
    }

    fn spawn_pump(
        &self,
        mut events: Box<dyn PlayerEventStream>,
        generation: u64,
        track_id: String,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let grace = self.inner.config.finish_grace;

        tokio::spawn(async move {
            while let Some(status) = events.next().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };

                if let Some(message) = status.error {
                    inner.fail_session(generation, message).await;
                    break;
                }

                if status.did_finish {
                    // Fold the final frame in and give listeners a beat
                    // to observe it before the reset.
                    inner.mutate_if_current(generation, |state| {
                        state.position = status.position;
                        state.duration = status.duration;
                    });
                    tokio::time::sleep(grace).await;
                    inner.finish_session(generation, track_id.clone()).await;
                    break;
                }

                let applied = inner.mutate_if_current(generation, |state| {
                    state.position = status.position;
                    if status.duration > Duration::ZERO {
                        state.duration = status.duration;
                    }
                    if state.phase == PlaybackPhase::Loading && status.is_playing {
                        state.phase = PlaybackPhase::Playing;
                    }
                });

                if applied.is_none() {
                    // Superseded by a newer session
                    break;
                }
            }
        })
    }
}

impl EngineInner {
    fn snapshot(&self) -> PlaybackSnapshot {
        self.state.lock().clone()
    }

    fn mutate<F: FnOnce(&mut PlaybackSnapshot)>(&self, f: F) -> PlaybackSnapshot {
        let snapshot = {
            let mut guard = self.state.lock();
            f(&mut guard);
            guard.clone()
        };
        self.listeners.notify(&snapshot);
        snapshot
    }

    /// Apply a mutation only while `generation` is still the live
    /// session. Background tasks use this so teardown turns them into
    /// no-ops.
    fn mutate_if_current<F: FnOnce(&mut PlaybackSnapshot)>(
        &self,
        generation: u64,
        f: F,
    ) -> Option<PlaybackSnapshot> {
        let snapshot = {
            let mut guard = self.state.lock();
            if self.generation.load(Ordering::Acquire) != generation {
                return None;
            }
            f(&mut guard);
            guard.clone()
        };
        self.listeners.notify(&snapshot);
        Some(snapshot)
    }

    async fn pause_current(&self, session: &Session) -> Result<()> {
        session.controls.pause().await.map_err(|err| {
            self.capture_fault(FaultKind::Playback, err.to_string());
            PlaybackError::ControlFailed(err.to_string())
        })?;

        let snapshot = self.mutate(|state| state.phase = PlaybackPhase::Paused);
        self.emit(PlaybackEvent::Paused {
            track_id: session.track.id.to_string(),
            position_ms: snapshot.position.as_millis() as u64,
        });
        Ok(())
    }

    async fn resume_current(&self, session: &Session) -> Result<()> {
        session.controls.play().await.map_err(|err| {
            self.capture_fault(FaultKind::Playback, err.to_string());
            PlaybackError::ControlFailed(err.to_string())
        })?;

        let snapshot = self.mutate(|state| state.phase = PlaybackPhase::Playing);
        self.emit(PlaybackEvent::Resumed {
            track_id: session.track.id.to_string(),
            position_ms: snapshot.position.as_millis() as u64,
        });
        Ok(())
    }

    /// Tear down the session and reset the snapshot, optionally leaving a
    /// fault behind for listeners.
    async fn stop_locked(&self, session: &mut Option<Session>, fault: Option<EngineFault>) {
        let track_id = self.snapshot().track_id().map(|id| id.to_string());

        if let Some(live) = session.take() {
            self.teardown(live).await;
        }

        self.mutate(|state| {
            *state = PlaybackSnapshot::idle();
            state.fault = fault.clone();
        });

        match fault {
            Some(fault) => self.emit(PlaybackEvent::Error {
                track_id,
                message: fault.message,
                recoverable: true,
            }),
            None => self.emit(PlaybackEvent::Stopped { track_id }),
        }
    }

    /// Release a session's player resource and invalidate its tasks.
    ///
    /// Aborts come last: the watchdog or pump may be the task running
    /// this very teardown, and aborting the current task only takes
    /// effect at its next await point.
    async fn teardown(&self, session: Session) {
        self.generation.fetch_add(1, Ordering::AcqRel);

        if let Err(err) = session.controls.remove().await {
            warn!(error = %err, "failed to release player resource");
        }

        session.pump.abort();
        session.watchdog.abort();
    }

    async fn abort_stalled_load(&self, generation: u64) {
        let mut session = self.session.lock().await;
        let stalled = session
            .as_ref()
            .map_or(false, |live| live.generation == generation)
            && self.snapshot().phase == PlaybackPhase::Loading;
        if !stalled {
            return;
        }

        warn!("load watchdog fired; stopping stalled load");
        self.stop_locked(
            &mut session,
            Some(EngineFault::new(FaultKind::Load, "load timed out")),
        )
        .await;
    }

    async fn finish_session(&self, generation: u64, track_id: String) {
        let mut session = self.session.lock().await;
        if !session
            .as_ref()
            .map_or(false, |live| live.generation == generation)
        {
            return;
        }

        info!(track_id = %track_id, "track finished; auto-stopping");
        self.emit(PlaybackEvent::Completed { track_id });
        self.stop_locked(&mut session, None).await;
    }

    async fn fail_session(&self, generation: u64, message: String) {
        let mut session = self.session.lock().await;
        if !session
            .as_ref()
            .map_or(false, |live| live.generation == generation)
        {
            return;
        }

        warn!(error = %message, "player pipeline fault; stopping session");
        self.stop_locked(
            &mut session,
            Some(EngineFault::new(FaultKind::Playback, message)),
        )
        .await;
    }

    fn capture_fault(&self, kind: FaultKind, message: String) {
        self.mutate(|state| state.fault = Some(EngineFault::new(kind, message.clone())));
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.events {
            bus.emit(CoreEvent::Playback(event)).ok();
        }
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("snapshot", &self.inner.snapshot())
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}
