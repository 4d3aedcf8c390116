//! One exchange session: the entry point for the simulation loop.
//!
//! A [`Session`] owns every piece of protocol state (behavior registry, step
//! buffer, side channels, lifecycle) so several independent sessions can run
//! in one process. Call order per simulation step:
//!
//! 1. [`Session::submit_observation`] once per actor requesting a decision
//! 2. [`Session::step`] once
//! 3. [`Session::read_action`] per actor
//!
//! All entry points expect a single thread of control. Hosts driving a
//! session from several threads wrap it in a [`SharedSession`].

use std::collections::HashMap;
use std::sync::Arc;

use actorlink_channels::{SideChannel, SideChannelMultiplexer};
use actorlink_core::config::ExchangeConfig;
use actorlink_core::error::{ChannelError, ExchangeError};
use actorlink_core::types::{
    Action, ActorId, BehaviorName, BehaviorSpec, ObservationRecord, SideChannelId,
};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::batch::StepBatchBuffer;
use crate::controller::{SessionController, SessionState};
use crate::engine::{EnvLookup, ExchangeEngine};
use crate::protocol::{InboundPayload, LocalInfo, OutboundPayload, RemoteInfo};
use crate::registry::{AnnouncementState, BehaviorRegistry};
use crate::transport::Transport;

/// A session shared between threads. The whole session is one critical section.
pub type SharedSession<T> = Arc<Mutex<Session<T>>>;

/// Step-synchronous exchange session over transport `T`.
#[derive(Debug)]
pub struct Session<T: Transport> {
    engine: ExchangeEngine<T>,
    registry: BehaviorRegistry,
    batch: StepBatchBuffer,
    channels: SideChannelMultiplexer,
    controller: SessionController,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, local: LocalInfo) -> Self {
        Self {
            engine: ExchangeEngine::new(transport, local),
            registry: BehaviorRegistry::new(),
            batch: StepBatchBuffer::new(),
            channels: SideChannelMultiplexer::new(),
            controller: SessionController::new(),
        }
    }

    /// Session whose greeting is built from `config`.
    pub fn from_config(transport: T, config: &ExchangeConfig) -> Self {
        let local = LocalInfo {
            package_version: config.package_version.clone(),
            capabilities: config.capabilities.clone(),
            seed: config.seed,
            ..LocalInfo::new(config.name.clone())
        };
        Self::new(transport, local)
    }

    /// Replace the environment lookup used for proxy diagnostics.
    #[must_use]
    pub fn with_env_lookup(mut self, env: EnvLookup) -> Self {
        self.engine = self.engine.with_env_lookup(env);
        self
    }

    /// Wrap in an `Arc<Mutex<_>>` for multi-threaded hosts.
    pub fn shared(self) -> SharedSession<T> {
        Arc::new(Mutex::new(self))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Perform the handshake and process the peer's first input.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::AlreadyOpened`] if the session was opened before.
    /// Any handshake failure closes the session and is returned.
    pub fn open(&mut self) -> Result<RemoteInfo, ExchangeError> {
        self.controller.ensure_unopened()?;
        let handshake = match self.engine.handshake() {
            Ok(handshake) => handshake,
            Err(e) => {
                error!("handshake failed: {e}");
                self.controller.close();
                return Err(e);
            }
        };
        self.controller.mark_open();
        self.process_input(handshake.first_input).or_else(|e| self.fail(e))?;
        Ok(handshake.remote)
    }

    /// Notify the peer and close. No-op once closed.
    ///
    /// The shutdown notice is best effort; the session is closed whether or
    /// not it is delivered.
    pub fn close(&mut self) {
        let was_open = self.controller.is_open();
        if !self.controller.close() {
            return;
        }
        if was_open {
            self.engine.send_closing();
        }
        self.batch.discard_queued();
        info!("session closed");
    }

    pub const fn state(&self) -> SessionState {
        self.controller.state()
    }

    pub const fn is_open(&self) -> bool {
        self.controller.is_open()
    }

    /// Peer version info, once open.
    pub const fn remote_info(&self) -> Option<&RemoteInfo> {
        self.engine.remote_info()
    }

    /// Capabilities enabled on both sides.
    pub const fn capabilities(&self) -> &HashMap<String, bool> {
        self.engine.capabilities()
    }

    /// Register a listener fired once when the session ends by peer quit or
    /// fatal error.
    pub fn on_quit(&mut self, listener: impl FnMut() + Send + 'static) {
        self.controller.on_quit(listener);
    }

    /// Register a listener fired whenever the peer signals an episode boundary.
    pub fn on_reset(&mut self, listener: impl FnMut() + Send + 'static) {
        self.controller.on_reset(listener);
    }

    // -----------------------------------------------------------------------
    // Behaviors and observations
    // -----------------------------------------------------------------------

    /// Register a behavior. Re-registering a name keeps the first spec.
    pub fn register_behavior(&mut self, spec: BehaviorSpec) -> bool {
        self.registry.register(spec)
    }

    pub fn announcement_state(&self, behavior: &str) -> Option<AnnouncementState> {
        self.registry.state(behavior)
    }

    pub const fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    /// Queue an actor's record and request a decision for it.
    ///
    /// Records submitted after the session closed are dropped.
    pub fn submit_observation(
        &mut self,
        behavior: impl Into<BehaviorName>,
        record: ObservationRecord,
    ) {
        if self.controller.state() == SessionState::Closed {
            debug!(actor = %record.actor_id, "session closed; dropping observation");
            return;
        }
        self.batch.add_observation(&behavior.into(), record);
    }

    /// Latest action received for `actor`, or `None` while a decision is
    /// outstanding or after its episode ended.
    pub fn read_action(&self, behavior: &str, actor: impl Into<ActorId>) -> Option<&Action> {
        self.batch.action(behavior, actor.into())
    }

    pub const fn batch(&self) -> &StepBatchBuffer {
        &self.batch
    }

    // -----------------------------------------------------------------------
    // Side channels
    // -----------------------------------------------------------------------

    /// Register a side channel and deliver any frames cached for its id.
    ///
    /// # Errors
    ///
    /// [`ChannelError::DuplicateChannel`] if the id is taken. Session state is
    /// unaffected.
    pub fn register_side_channel(
        &mut self,
        channel: Box<dyn SideChannel>,
    ) -> Result<(), ChannelError> {
        self.channels.register(channel)
    }

    /// Remove a side channel. No-op if absent.
    pub fn unregister_side_channel(&mut self, id: SideChannelId) -> Option<Box<dyn SideChannel>> {
        self.channels.unregister(id)
    }

    pub fn side_channel<C: SideChannel>(&self, id: SideChannelId) -> Option<&C> {
        self.channels.channel(id)
    }

    pub fn side_channel_mut<C: SideChannel>(&mut self, id: SideChannelId) -> Option<&mut C> {
        self.channels.channel_mut(id)
    }

    pub const fn side_channels(&self) -> &SideChannelMultiplexer {
        &self.channels
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Exchange this step's observations for actions.
    ///
    /// No-op when nothing was submitted since the last exchange or when the
    /// session is closed. Blocks until the peer answers.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::NotOpen`] before [`open`](Self::open). Any other error
    /// is fatal: the session is closed, quit listeners fire, and in-flight
    /// decisions are abandoned.
    pub fn step(&mut self) -> Result<(), ExchangeError> {
        match self.controller.state() {
            SessionState::Unopened => return Err(ExchangeError::NotOpen),
            SessionState::Closed => return Ok(()),
            SessionState::Open => {}
        }
        if !self.batch.needs_exchange() {
            return Ok(());
        }

        let batches = self.batch.take_batch();
        let announcements = self.registry.announcements_due(|name| {
            batches
                .get(name)
                .is_some_and(|records| !records.is_empty())
        });
        let side_channel = match self.channels.encode() {
            Ok(bytes) => bytes,
            Err(e) => return self.fail(e.into()),
        };

        let payload = OutboundPayload {
            batches,
            announcements,
            side_channel,
            initialization: None,
        };
        let input = match self.engine.exchange(payload) {
            Ok(input) => input,
            Err(e) => return self.fail(e),
        };
        self.process_input(input).or_else(|e| self.fail(e))
    }

    /// Alias of [`step`](Self::step).
    pub fn request_exchange_if_needed(&mut self) -> Result<(), ExchangeError> {
        self.step()
    }

    /// Route one reply: side channels, acknowledgements, actions, then command.
    fn process_input(&mut self, input: InboundPayload) -> Result<(), ExchangeError> {
        self.channels.decode(&input.side_channel)?;

        self.registry.confirm(&input.acknowledged);
        for (behavior, actions) in input.actions {
            self.batch.apply_actions(&behavior, actions);
        }
        self.batch.clear_pending();

        self.controller.dispatch(input.command, &mut self.batch);
        Ok(())
    }

    fn fail(&mut self, err: ExchangeError) -> Result<(), ExchangeError> {
        error!("closing session after fatal error: {err}");
        self.batch.discard_queued();
        self.controller.close();
        self.controller.notify_quit();
        Err(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{InboundMessage, OutboundMessage, PeerCommand};
    use actorlink_core::error::TransportError;
    use actorlink_core::types::{ActionSpec, Observation};
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    struct Canned {
        replies: VecDeque<Result<InboundMessage, TransportError>>,
        sent: Vec<OutboundMessage>,
        notified: usize,
    }

    impl Transport for Canned {
        fn exchange(&mut self, message: &OutboundMessage) -> Result<InboundMessage, TransportError> {
            self.sent.push(message.clone());
            self.replies.pop_front().unwrap_or(Err(TransportError::Disconnected))
        }

        fn notify(&mut self, _message: &OutboundMessage) -> Result<(), TransportError> {
            self.notified += 1;
            Ok(())
        }
    }

    fn reply(payload: InboundPayload) -> Result<InboundMessage, TransportError> {
        Ok(InboundMessage::ok(payload))
    }

    fn hello() -> Result<InboundMessage, TransportError> {
        reply(InboundPayload {
            initialization: Some(RemoteInfo {
                communication_version: crate::protocol::PROTOCOL_VERSION.into(),
                package_version: env!("CARGO_PKG_VERSION").into(),
                seed: None,
                capabilities: HashMap::new(),
            }),
            ..InboundPayload::default()
        })
    }

    fn session(mut replies: Vec<Result<InboundMessage, TransportError>>) -> Session<Canned> {
        replies.insert(0, hello());
        replies.insert(1, reply(InboundPayload::default()));
        let transport = Canned {
            replies: replies.into(),
            ..Canned::default()
        };
        let mut session = Session::new(transport, LocalInfo::new("test"));
        session.open().unwrap();
        session
    }

    fn record(actor: i32) -> ObservationRecord {
        ObservationRecord::new(actor, vec![Observation::zeros(2)])
    }

    // ---- lifecycle ----

    #[test]
    fn step_before_open_is_not_open() {
        let mut session = Session::new(Canned::default(), LocalInfo::new("test"));
        session.submit_observation("A", record(0));
        assert!(matches!(session.step(), Err(ExchangeError::NotOpen)));
        assert_eq!(session.state(), SessionState::Unopened);
    }

    #[test]
    fn open_twice_is_rejected() {
        let mut session = session(vec![]);
        assert!(matches!(session.open(), Err(ExchangeError::AlreadyOpened)));
        assert!(session.is_open());
    }

    #[test]
    fn failed_handshake_closes() {
        let mut session = Session::new(Canned::default(), LocalInfo::new("test"))
            .with_env_lookup(|_| None);
        assert!(matches!(session.open(), Err(ExchangeError::Initialization { .. })));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn close_sends_one_notice() {
        let mut session = session(vec![]);
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.engine.transport().notified, 1);
    }

    #[test]
    fn close_before_open_sends_nothing() {
        let mut session = Session::new(Canned::default(), LocalInfo::new("test"));
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.engine.transport().notified, 0);
    }

    // ---- stepping ----

    #[test]
    fn step_without_submissions_is_noop() {
        let mut session = session(vec![]);
        session.step().unwrap();
        assert_eq!(session.engine.transport().sent.len(), 2);
    }

    #[test]
    fn request_exchange_if_needed_steps_only_with_traffic() {
        let mut session = session(vec![reply(InboundPayload::default())]);
        session.request_exchange_if_needed().unwrap();
        assert_eq!(session.engine.transport().sent.len(), 2);

        session.submit_observation("A", record(0));
        session.request_exchange_if_needed().unwrap();
        assert_eq!(session.engine.transport().sent.len(), 3);
        assert!(!session.batch().needs_exchange());
    }

    #[test]
    fn unregistered_behavior_is_sent_without_announcement() {
        let mut session = session(vec![reply(InboundPayload::default())]);
        session.submit_observation("Free", record(0));
        session.step().unwrap();

        let sent = session.engine.transport().sent.last().unwrap().clone();
        let payload = sent.payload.unwrap();
        assert_eq!(payload.batches["Free"].len(), 1);
        assert!(payload.announcements.is_empty());
    }

    #[test]
    fn actions_alone_do_not_acknowledge_a_spec() {
        let mut actions = std::collections::BTreeMap::new();
        actions.insert(BehaviorName::from("A"), vec![Action::Continuous(vec![1.0])]);
        let mut session = session(vec![
            reply(InboundPayload {
                actions,
                ..InboundPayload::default()
            }),
            reply(InboundPayload::default()),
        ]);
        let spec = BehaviorSpec::new("A", vec![vec![2]], ActionSpec::Continuous { size: 1 });
        session.register_behavior(spec.clone());

        session.submit_observation("A", record(0));
        session.step().unwrap();
        assert_eq!(session.announcement_state("A"), Some(AnnouncementState::Unannounced));
        assert_eq!(session.read_action("A", 0), Some(&Action::Continuous(vec![1.0])));

        session.submit_observation("A", record(0));
        session.step().unwrap();
        let sent = session.engine.transport().sent.last().unwrap().clone();
        assert_eq!(sent.payload.unwrap().announcements, vec![spec]);
    }

    #[test]
    fn peer_status_error_is_fatal() {
        let mut session = session(vec![Ok(InboundMessage {
            status: 503,
            payload: None,
        })]);
        session.submit_observation("A", record(0));
        assert!(matches!(session.step(), Err(ExchangeError::PeerStatus { code: 503 })));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.batch().has_pending());
    }

    #[test]
    fn submissions_after_fatal_error_are_dropped() {
        let mut session = session(vec![]);
        session.submit_observation("A", record(0));
        assert!(session.step().is_err());
        assert_eq!(session.state(), SessionState::Closed);

        for actor in 0..3 {
            session.submit_observation("A", record(actor));
        }
        assert!(!session.batch().needs_exchange());
        assert!(!session.batch().has_traffic("A"));
        assert!(!session.batch().has_pending());
        session.step().unwrap();
    }

    #[test]
    fn quit_in_first_input_closes_after_open() {
        let transport = Canned {
            replies: vec![
                hello(),
                reply(InboundPayload {
                    command: PeerCommand::Quit,
                    ..InboundPayload::default()
                }),
            ]
            .into(),
            ..Canned::default()
        };
        let mut session = Session::new(transport, LocalInfo::new("test"));
        assert!(session.open().is_ok());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn from_config_copies_identity() {
        let config = ExchangeConfig {
            name: "walker".into(),
            seed: Some(11),
            ..ExchangeConfig::default()
        };
        let session = Session::from_config(Canned::default(), &config);
        let local = session.engine.local_info();
        assert_eq!(local.name, "walker");
        assert_eq!(local.seed, Some(11));
        assert_eq!(local.communication_version, crate::protocol::PROTOCOL_VERSION);
    }
}
