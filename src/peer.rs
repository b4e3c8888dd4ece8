//! The Diameter peer actor (spec.md §4.4): one task per peer
//! connection owns all peer state, and is the only place that state
//! is mutated. Everything else - the read loop, the watchdog ticker,
//! callers wanting to send a request - only ever posts a [`PeerEvent`]
//! onto the actor's channel and, where an answer is expected, waits on
//! a oneshot receiver.
use crate::config::{DiameterPeerConfig, PeerPolicy};
use crate::dictionary::Dictionary;
use crate::diameter::{CommandFlags, DiameterMessage};
use crate::error::{Error, Result};
use crate::id::{EndToEndGenerator, HopByHopGenerator};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::Instant;

const PRE_ENGAGED_WATCHDOG: Duration = Duration::from_secs(30);
const MAX_OUTSTANDING_DWA: u32 = 2;
const CER_TIMEOUT: Duration = Duration::from_secs(10);
const ANSWER_TIMEOUT: Duration = Duration::from_secs(30);
const DIAMETER_SUCCESS: u32 = 2001;
const DIAMETER_UNKNOWN_PEER: u32 = 3010;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Connecting,
    Connected,
    Engaged,
    Terminating,
    Terminated,
}

/// What the actor task does with the outside world: send bytes, or
/// tear the connection down. The actor never touches a socket
/// directly, it only emits these and lets its owner act on them.
pub enum PeerAction {
    Send(DiameterMessage),
    Disconnect,
}

/// Lifecycle notifications the actor emits to its owning router so the
/// peer table can defer insertion until the peer actually engages, and
/// evict it when it goes down (spec.md §4.5 "PeerUp"/"PeerDown handling").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerControl {
    Up,
    Down,
}

enum PeerEvent {
    MessageReceived(DiameterMessage),
    ConnectionClosed,
    WatchdogTick,
    CerTimeoutCheck,
    SendRequest {
        msg: DiameterMessage,
        respond_to: oneshot::Sender<Result<DiameterMessage>>,
    },
    SetDown,
}

struct InFlight {
    respond_to: oneshot::Sender<Result<DiameterMessage>>,
    deadline: Instant,
}

/// A handle callers use to talk to a running peer actor.
#[derive(Clone)]
pub struct PeerHandle {
    origin_host: String,
    events: mpsc::Sender<PeerEventHandle>,
}

/// Events crossing the public API boundary; wraps [`PeerEvent`] so the
/// actor's internal enum stays private.
enum PeerEventHandle {
    Inner(PeerEvent),
}

impl PeerHandle {
    pub fn origin_host(&self) -> &str {
        &self.origin_host
    }

    /// True if `self` and `other` are handles to the same running
    /// actor task, used to resolve a `PeerDown` race against a
    /// since-replaced reconnect (spec.md §4.5 "PeerDown handling").
    pub fn is_same_actor(&self, other: &PeerHandle) -> bool {
        self.events.same_channel(&other.events)
    }

    pub async fn message_received(&self, msg: DiameterMessage) {
        let _ = self
            .events
            .send(PeerEventHandle::Inner(PeerEvent::MessageReceived(msg)))
            .await;
    }

    pub async fn connection_closed(&self) {
        let _ = self
            .events
            .send(PeerEventHandle::Inner(PeerEvent::ConnectionClosed))
            .await;
    }

    pub async fn send_request(&self, msg: DiameterMessage) -> Result<DiameterMessage> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(PeerEventHandle::Inner(PeerEvent::SendRequest {
                msg,
                respond_to: tx,
            }))
            .await
            .map_err(|_| Error::PeerTerminated)?;
        rx.await.map_err(|_| Error::PeerTerminated)?
    }

    /// Idempotent: sending `SetDown` to an already-terminating or
    /// terminated peer is a no-op, not an error.
    pub async fn set_down(&self) {
        let _ = self
            .events
            .send(PeerEventHandle::Inner(PeerEvent::SetDown))
            .await;
    }
}

/// The actor's owned state. Constructed by [`Peer::spawn_active`] or
/// [`Peer::spawn_passive`], which hand back a [`PeerHandle`] and an
/// `mpsc::Receiver<PeerAction>` the caller drives against its socket.
pub struct Peer {
    state: PeerState,
    config: DiameterPeerConfig,
    dict: Arc<Dictionary>,
    local_origin_host: String,
    local_origin_realm: String,
    hop_gen: HopByHopGenerator,
    end_gen: Arc<EndToEndGenerator>,
    in_flight: HashMap<u32, InFlight>,
    outstanding_dwa: u32,
    actions: mpsc::Sender<PeerAction>,
    control: mpsc::Sender<PeerControl>,
    shared_state: Arc<RwLock<PeerState>>,
}

impl Peer {
    /// Spawns the actor task for an actively-dialed peer (this side
    /// sends the CER). Returns the handle callers drive events through,
    /// a shared cell the router can poll for the peer's last-known
    /// state without a channel round trip, and the action stream the
    /// caller forwards onto the socket.
    pub fn spawn_active(
        config: DiameterPeerConfig,
        dict: Arc<Dictionary>,
        local_origin_host: String,
        local_origin_realm: String,
        end_gen: Arc<EndToEndGenerator>,
    ) -> (PeerHandle, Arc<RwLock<PeerState>>, mpsc::Receiver<PeerAction>, mpsc::Receiver<PeerControl>) {
        Self::spawn(config, dict, local_origin_host, local_origin_realm, end_gen, true)
    }

    /// Spawns the actor task for a passively-accepted peer (this side
    /// waits for the inbound CER before sending a CEA).
    pub fn spawn_passive(
        config: DiameterPeerConfig,
        dict: Arc<Dictionary>,
        local_origin_host: String,
        local_origin_realm: String,
        end_gen: Arc<EndToEndGenerator>,
    ) -> (PeerHandle, Arc<RwLock<PeerState>>, mpsc::Receiver<PeerAction>, mpsc::Receiver<PeerControl>) {
        Self::spawn(config, dict, local_origin_host, local_origin_realm, end_gen, false)
    }

    fn spawn(
        config: DiameterPeerConfig,
        dict: Arc<Dictionary>,
        local_origin_host: String,
        local_origin_realm: String,
        end_gen: Arc<EndToEndGenerator>,
        active: bool,
    ) -> (PeerHandle, Arc<RwLock<PeerState>>, mpsc::Receiver<PeerAction>, mpsc::Receiver<PeerControl>) {
        let (event_tx, mut event_rx) = mpsc::channel::<PeerEventHandle>(256);
        let (action_tx, action_rx) = mpsc::channel::<PeerAction>(256);
        let (control_tx, control_rx) = mpsc::channel::<PeerControl>(16);
        let shared_state = Arc::new(RwLock::new(PeerState::Connecting));

        let origin_host = config.origin_host.clone();
        let mut peer = Peer {
            state: PeerState::Connecting,
            config,
            dict,
            local_origin_host,
            local_origin_realm,
            hop_gen: HopByHopGenerator::new(),
            end_gen,
            in_flight: HashMap::new(),
            outstanding_dwa: 0,
            actions: action_tx,
            control: control_tx,
            shared_state: Arc::clone(&shared_state),
        };

        let cer_timer_tx = event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(CER_TIMEOUT).await;
            let _ = cer_timer_tx.send(PeerEventHandle::Inner(PeerEvent::CerTimeoutCheck)).await;
        });

        tokio::spawn(async move {
            if active {
                if let Err(e) = peer.send_cer().await {
                    log::error!("[{}] failed to send CER: {:?}", peer.config.origin_host, e);
                    return;
                }
                peer.set_state(PeerState::Connected).await;
            }

            let mut ticker = tokio::time::interval(PRE_ENGAGED_WATCHDOG);
            let mut engaged_interval = false;
            loop {
                tokio::select! {
                    event = event_rx.recv() => {
                        match event {
                            Some(PeerEventHandle::Inner(e)) => {
                                if !peer.handle_event(e).await {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    _ = ticker.tick() => {
                        peer.handle_event(PeerEvent::WatchdogTick).await;
                    }
                }
                if !engaged_interval && peer.state == PeerState::Engaged {
                    ticker = tokio::time::interval(peer.config.watchdog_interval);
                    ticker.reset();
                    engaged_interval = true;
                }
            }
            peer.set_state(PeerState::Terminated).await;
        });

        (
            PeerHandle {
                origin_host,
                events: event_tx,
            },
            shared_state,
            action_rx,
            control_rx,
        )
    }

    async fn set_state(&mut self, state: PeerState) {
        self.state = state;
        *self.shared_state.write().await = state;
        match state {
            PeerState::Engaged => {
                let _ = self.control.send(PeerControl::Up).await;
            }
            PeerState::Terminated => {
                let _ = self.control.send(PeerControl::Down).await;
            }
            _ => {}
        }
    }

    /// Returns `false` when the actor should stop.
    async fn handle_event(&mut self, event: PeerEvent) -> bool {
        match event {
            PeerEvent::MessageReceived(msg) => {
                if let Err(e) = self.on_message(msg).await {
                    log::warn!("[{}] error handling message: {:?}", self.config.origin_host, e);
                }
                true
            }
            PeerEvent::ConnectionClosed => {
                self.fail_all_in_flight(Error::PeerTerminated);
                false
            }
            PeerEvent::WatchdogTick => {
                self.on_watchdog_tick().await;
                self.expire_in_flight();
                true
            }
            PeerEvent::CerTimeoutCheck => {
                if self.state == PeerState::Connecting || self.state == PeerState::Connected {
                    log::warn!("[{}] capabilities exchange timed out", self.config.origin_host);
                    self.set_state(PeerState::Terminating).await;
                    let _ = self.actions.send(PeerAction::Disconnect).await;
                    return false;
                }
                true
            }
            PeerEvent::SendRequest { msg, respond_to } => {
                self.on_send_request(msg, respond_to).await;
                true
            }
            PeerEvent::SetDown => {
                if self.state == PeerState::Terminating || self.state == PeerState::Terminated {
                    return true;
                }
                self.set_state(PeerState::Terminating).await;
                let _ = self.send_dpr().await;
                false
            }
        }
    }

    async fn on_message(&mut self, msg: DiameterMessage) -> Result<()> {
        match (msg.header.code, msg.header.flags.request) {
            (257, true) => self.on_cer(msg).await,
            (257, false) => self.on_cea(msg).await,
            (280, true) => self.on_dwr(msg).await,
            (280, false) => self.on_dwa(msg),
            (282, true) => self.on_dpr(msg).await,
            (282, false) => self.on_dpa().await,
            (_, false) => self.on_answer(msg),
            (_, true) => {
                // Non-base requests are routed by the owning router, not
                // answered here; surface it upward by dropping it - the
                // caller is expected to watch for these via a separate
                // inbound-request channel in a fuller build.
                log::debug!(
                    "[{}] unhandled request code {}",
                    self.config.origin_host,
                    msg.header.code
                );
                Ok(())
            }
        }
    }

    async fn send_cer(&mut self) -> Result<()> {
        let mut cer = self.new_request(257, 0);
        cer.add_by_name(&self.dict, "Origin-Host", self.local_origin_host.clone().into())?;
        cer.add_by_name(&self.dict, "Origin-Realm", self.local_origin_realm.clone().into())?;
        self.actions
            .send(PeerAction::Send(cer))
            .await
            .map_err(|_| Error::WriteError("action channel closed".into()))?;
        Ok(())
    }

    async fn on_cer(&mut self, req: DiameterMessage) -> Result<()> {
        let origin_host = req
            .get_by_name(&self.dict, "Origin-Host")
            .and_then(|a| a.as_str())
            .ok_or_else(|| Error::CerMismatch("CER missing Origin-Host".into()))?;

        if origin_host != self.config.origin_host {
            let mut cea = DiameterMessage::new_answer(&req);
            cea.add_by_name(&self.dict, "Result-Code", (DIAMETER_UNKNOWN_PEER as u32).into())?;
            self.actions
                .send(PeerAction::Send(cea))
                .await
                .map_err(|_| Error::WriteError("action channel closed".into()))?;
            return Err(Error::UnknownPeer(origin_host.to_string()));
        }

        let mut cea = DiameterMessage::new_answer(&req);
        cea.add_by_name(&self.dict, "Result-Code", DIAMETER_SUCCESS.into())?;
        cea.add_by_name(&self.dict, "Origin-Host", self.local_origin_host.clone().into())?;
        cea.add_by_name(&self.dict, "Origin-Realm", self.local_origin_realm.clone().into())?;
        self.actions
            .send(PeerAction::Send(cea))
            .await
            .map_err(|_| Error::WriteError("action channel closed".into()))?;

        self.set_state(PeerState::Engaged).await;
        Ok(())
    }

    async fn on_cea(&mut self, answer: DiameterMessage) -> Result<()> {
        let result_code = answer
            .get_by_name(&self.dict, "Result-Code")
            .and_then(|a| a.as_u64());
        let origin_host = answer.get_by_name(&self.dict, "Origin-Host").and_then(|a| a.as_str());

        match (origin_host, result_code) {
            (Some(host), Some(code)) if host == self.config.origin_host && code == DIAMETER_SUCCESS as u64 => {
                self.set_state(PeerState::Engaged).await;
                Ok(())
            }
            (Some(host), _) if host != self.config.origin_host => {
                self.set_state(PeerState::Terminating).await;
                Err(Error::CerMismatch(format!("CEA origin-host {} does not match expected {}", host, self.config.origin_host)))
            }
            (_, other) => {
                self.set_state(PeerState::Terminating).await;
                Err(Error::CerMismatch(format!("CEA result-code {:?}", other)))
            }
        }
    }

    async fn on_watchdog_tick(&mut self) {
        if self.state != PeerState::Engaged && self.state != PeerState::Connected {
            return;
        }
        if self.outstanding_dwa >= MAX_OUTSTANDING_DWA {
            log::error!(
                "[{}] watchdog failure: {} DWA outstanding",
                self.config.origin_host,
                self.outstanding_dwa
            );
            self.set_state(PeerState::Terminating).await;
            self.fail_all_in_flight(Error::WatchdogFailure);
            return;
        }

        if let Ok(mut dwr) = self.try_new_request(280, 0) {
            if dwr
                .add_by_name(&self.dict, "Origin-Host", self.local_origin_host.clone().into())
                .is_ok()
            {
                if self.actions.send(PeerAction::Send(dwr)).await.is_ok() {
                    self.outstanding_dwa += 1;
                }
            }
        }
    }

    async fn on_dwr(&mut self, req: DiameterMessage) -> Result<()> {
        let mut dwa = DiameterMessage::new_answer(&req);
        dwa.add_by_name(&self.dict, "Result-Code", DIAMETER_SUCCESS.into())?;
        dwa.add_by_name(&self.dict, "Origin-Host", self.local_origin_host.clone().into())?;
        self.actions
            .send(PeerAction::Send(dwa))
            .await
            .map_err(|_| Error::WriteError("action channel closed".into()))?;
        Ok(())
    }

    fn on_dwa(&mut self, _answer: DiameterMessage) -> Result<()> {
        self.outstanding_dwa = self.outstanding_dwa.saturating_sub(1);
        Ok(())
    }

    async fn send_dpr(&mut self) -> Result<()> {
        let mut dpr = self.new_request(282, 0);
        dpr.add_by_name(&self.dict, "Origin-Host", self.local_origin_host.clone().into())?;
        dpr.add_by_name(&self.dict, "Disconnect-Cause", 0i32.into())?;
        self.actions
            .send(PeerAction::Send(dpr))
            .await
            .map_err(|_| Error::WriteError("action channel closed".into()))?;
        self.fail_all_in_flight(Error::PeerTerminated);
        Ok(())
    }

    async fn on_dpr(&mut self, req: DiameterMessage) -> Result<()> {
        let mut dpa = DiameterMessage::new_answer(&req);
        dpa.add_by_name(&self.dict, "Result-Code", DIAMETER_SUCCESS.into())?;
        self.actions
            .send(PeerAction::Send(dpa))
            .await
            .map_err(|_| Error::WriteError("action channel closed".into()))?;
        self.set_state(PeerState::Terminating).await;
        self.fail_all_in_flight(Error::PeerTerminated);
        let _ = self.actions.send(PeerAction::Disconnect).await;
        Ok(())
    }

    async fn on_dpa(&mut self) -> Result<()> {
        self.set_state(PeerState::Terminated).await;
        Ok(())
    }

    fn on_answer(&mut self, msg: DiameterMessage) -> Result<()> {
        if let Some(in_flight) = self.in_flight.remove(&msg.header.hop_by_hop_id) {
            let _ = in_flight.respond_to.send(Ok(msg));
        } else {
            log::warn!(
                "[{}] answer for unknown hop-by-hop id {}",
                self.config.origin_host,
                msg.header.hop_by_hop_id
            );
        }
        Ok(())
    }

    async fn on_send_request(&mut self, mut msg: DiameterMessage, respond_to: oneshot::Sender<Result<DiameterMessage>>) {
        if self.state != PeerState::Engaged {
            let _ = respond_to.send(Err(Error::PeerTerminated));
            return;
        }
        msg.header.hop_by_hop_id = self.hop_gen.next();
        msg.header.end_to_end_id = self.end_gen.next();
        let hop_by_hop_id = msg.header.hop_by_hop_id;

        self.in_flight.insert(
            hop_by_hop_id,
            InFlight {
                respond_to,
                deadline: Instant::now() + ANSWER_TIMEOUT,
            },
        );

        if self.actions.send(PeerAction::Send(msg)).await.is_err() {
            if let Some(in_flight) = self.in_flight.remove(&hop_by_hop_id) {
                let _ = in_flight.respond_to.send(Err(Error::WriteError("action channel closed".into())));
            }
        }
    }

    fn expire_in_flight(&mut self) {
        let now = Instant::now();
        let expired: Vec<u32> = self
            .in_flight
            .iter()
            .filter(|(_, v)| v.deadline <= now)
            .map(|(k, _)| *k)
            .collect();
        for key in expired {
            if let Some(in_flight) = self.in_flight.remove(&key) {
                let _ = in_flight.respond_to.send(Err(Error::Timeout));
            }
        }
    }

    fn fail_all_in_flight(&mut self, err: Error) {
        for (_, in_flight) in self.in_flight.drain() {
            let _ = in_flight.respond_to.send(Err(clone_error(&err)));
        }
    }

    fn new_request(&self, code: u32, application_id: u32) -> DiameterMessage {
        DiameterMessage::new(
            code,
            application_id,
            CommandFlags {
                request: true,
                proxyable: false,
                error: false,
                retransmit: false,
            },
            self.hop_gen.next(),
            self.end_gen.next(),
        )
    }

    fn try_new_request(&self, code: u32, application_id: u32) -> Result<DiameterMessage> {
        Ok(self.new_request(code, application_id))
    }

    pub fn state(&self) -> PeerState {
        self.state
    }
}

/// `Error` does not implement `Clone`; this reconstructs an equivalent
/// instance for fanning one failure out to every in-flight waiter.
fn clone_error(err: &Error) -> Error {
    match err {
        Error::WatchdogFailure => Error::WatchdogFailure,
        Error::PeerTerminated => Error::PeerTerminated,
        Error::Cancelled => Error::Cancelled,
        Error::Timeout => Error::Timeout,
        other => Error::DecodeError(other.to_string()),
    }
}

/// Checks whether `addr` falls within a peer's configured
/// origin-network (spec.md §4.5, applied on the passive accept path).
pub fn check_origin_network(addr: IpAddr, network: &ipnet::IpNet) -> Result<()> {
    if network.contains(&addr) {
        Ok(())
    } else {
        Err(Error::BadOriginNetwork(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::BASE_DICT_XML;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn test_dict() -> Arc<Dictionary> {
        Arc::new(Dictionary::new(&[BASE_DICT_XML]).unwrap())
    }

    fn test_config() -> DiameterPeerConfig {
        DiameterPeerConfig {
            origin_host: "peer.example.com".into(),
            ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            port: 3868,
            policy: PeerPolicy::Active,
            origin_network: "10.0.0.0/24".parse().unwrap(),
            watchdog_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_origin_network_check() {
        let network: ipnet::IpNet = "10.0.0.0/24".parse().unwrap();
        assert!(check_origin_network(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), &network).is_ok());
        assert!(check_origin_network(IpAddr::V4(Ipv4Addr::new(10, 0, 1, 5)), &network).is_err());
    }

    #[tokio::test]
    async fn test_passive_peer_answers_cer_and_engages() {
        let dict = test_dict();
        let env_dir = std::env::temp_dir().join(format!("aaa-router-peer-test-{}", rand::random::<u32>()));
        std::env::set_var("AAA_ROUTER_STATE_DIR", &env_dir);
        let end_gen = Arc::new(EndToEndGenerator::load().unwrap());

        let (handle, _state, mut actions, _control) = Peer::spawn_passive(
            test_config(),
            Arc::clone(&dict),
            "router.example.com".into(),
            "example.com".into(),
            end_gen,
        );

        let mut cer = DiameterMessage::new(
            257,
            0,
            CommandFlags {
                request: true,
                proxyable: false,
                error: false,
                retransmit: false,
            },
            1,
            1,
        );
        cer.add_by_name(&dict, "Origin-Host", "peer.example.com".to_string().into())
            .unwrap();
        cer.add_by_name(&dict, "Origin-Realm", "example.com".to_string().into())
            .unwrap();

        handle.message_received(cer).await;

        let action = tokio::time::timeout(Duration::from_secs(1), actions.recv())
            .await
            .unwrap()
            .unwrap();
        match action {
            PeerAction::Send(cea) => {
                assert_eq!(cea.header.code, 257);
                assert!(!cea.header.flags.request);
            }
            PeerAction::Disconnect => panic!("expected a CEA, got a disconnect"),
        }

        std::fs::remove_dir_all(&env_dir).ok();
    }

    #[tokio::test]
    async fn test_active_peer_rejects_cea_with_mismatched_origin_host() {
        let dict = test_dict();
        let env_dir = std::env::temp_dir().join(format!("aaa-router-peer-test-{}", rand::random::<u32>()));
        std::env::set_var("AAA_ROUTER_STATE_DIR", &env_dir);
        let end_gen = Arc::new(EndToEndGenerator::load().unwrap());

        let (handle, state, mut actions, _control) = Peer::spawn_active(
            test_config(),
            Arc::clone(&dict),
            "router.example.com".into(),
            "example.com".into(),
            end_gen,
        );

        // the outbound CER sent on connect
        let _ = tokio::time::timeout(Duration::from_secs(1), actions.recv()).await.unwrap().unwrap();

        let mut cea = DiameterMessage::new(
            257,
            0,
            CommandFlags {
                request: false,
                proxyable: false,
                error: false,
                retransmit: false,
            },
            1,
            1,
        );
        cea.add_by_name(&dict, "Origin-Host", "impostor.example.com".to_string().into())
            .unwrap();
        cea.add_by_name(&dict, "Result-Code", DIAMETER_SUCCESS.into()).unwrap();

        handle.message_received(cea).await;

        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if *state.read().await == PeerState::Terminating {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        std::fs::remove_dir_all(&env_dir).ok();
    }

    #[tokio::test]
    async fn test_rejects_unexpected_origin_host() {
        let dict = test_dict();
        let env_dir = std::env::temp_dir().join(format!("aaa-router-peer-test-{}", rand::random::<u32>()));
        std::env::set_var("AAA_ROUTER_STATE_DIR", &env_dir);
        let end_gen = Arc::new(EndToEndGenerator::load().unwrap());

        let (handle, _state, mut actions, _control) = Peer::spawn_passive(
            test_config(),
            Arc::clone(&dict),
            "router.example.com".into(),
            "example.com".into(),
            end_gen,
        );

        let mut cer = DiameterMessage::new(
            257,
            0,
            CommandFlags {
                request: true,
                proxyable: false,
                error: false,
                retransmit: false,
            },
            1,
            1,
        );
        cer.add_by_name(&dict, "Origin-Host", "impostor.example.com".to_string().into())
            .unwrap();

        handle.message_received(cer).await;

        let action = tokio::time::timeout(Duration::from_secs(1), actions.recv())
            .await
            .unwrap()
            .unwrap();
        match action {
            PeerAction::Send(cea) => {
                let rc = cea.get_by_name(&dict, "Result-Code").unwrap().as_u64().unwrap();
                assert_eq!(rc, DIAMETER_UNKNOWN_PEER as u64);
            }
            PeerAction::Disconnect => panic!("expected a CEA, got a disconnect"),
        }

        std::fs::remove_dir_all(&env_dir).ok();
    }
}
