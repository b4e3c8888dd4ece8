//! The Diameter router (spec.md §4.5): owns the table of peer actors,
//! reconciles it against configuration on a tick, accepts inbound
//! connections, and applies routing rules to forward requests to a
//! peer, an HTTP handler, or a local handler.
use crate::config::{DiameterPeerConfig, PeerPolicy, RoutingDestination, RoutingRule, SelectionPolicy};
use crate::dictionary::Dictionary;
use crate::diameter::DiameterMessage;
use crate::error::{Error, Result};
use crate::handler::HttpHandler;
use crate::id::EndToEndGenerator;
use crate::peer::{check_origin_network, Peer, PeerAction, PeerControl, PeerHandle, PeerState};
use crate::transport::Codec;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};

/// Routed either by an absolute count of known peers regardless of
/// state, or only those currently engaged - callers asking "can I
/// route here" want the latter.
pub struct PeerTable {
    peers: HashMap<String, (PeerHandle, Arc<RwLock<PeerState>>)>,
}

impl PeerTable {
    pub fn new() -> PeerTable {
        PeerTable {
            peers: HashMap::new(),
        }
    }

    pub fn insert(&mut self, origin_host: String, handle: PeerHandle, state: Arc<RwLock<PeerState>>) {
        self.peers.insert(origin_host, (handle, state));
    }

    pub fn remove(&mut self, origin_host: &str) -> Option<(PeerHandle, Arc<RwLock<PeerState>>)> {
        self.peers.remove(origin_host)
    }

    pub fn get(&self, origin_host: &str) -> Option<&PeerHandle> {
        self.peers.get(origin_host).map(|(h, _)| h)
    }

    pub async fn is_engaged(&self, origin_host: &str) -> bool {
        match self.peers.get(origin_host) {
            Some((_, state)) => *state.read().await == PeerState::Engaged,
            None => false,
        }
    }

    pub fn contains(&self, origin_host: &str) -> bool {
        self.peers.contains_key(origin_host)
    }

    pub fn configured_hosts(&self) -> Vec<String> {
        self.peers.keys().cloned().collect()
    }

    /// Handles a `PeerUp` notification (spec.md §4.5 "PeerUp handling"):
    /// a different, already-engaged existing entry wins and the new
    /// connection is closed; otherwise (no existing entry, the existing
    /// entry isn't engaged, or it's the same actor reconnecting) the new
    /// connection is adopted.
    pub async fn on_peer_up(&mut self, origin_host: String, handle: PeerHandle, state: Arc<RwLock<PeerState>>) {
        if let Some((existing_handle, existing_state)) = self.peers.get(&origin_host) {
            let existing_engaged = *existing_state.read().await == PeerState::Engaged;
            if existing_engaged && !existing_handle.is_same_actor(&handle) {
                handle.set_down().await;
                return;
            }
        }
        self.peers.insert(origin_host, (handle, state));
    }

    /// Handles a `PeerDown` notification: only removes the entry if it
    /// still points at the handle that went down, so a down event for
    /// a since-replaced connection doesn't evict the new one
    /// (spec.md §4.5 "PeerDown handling").
    pub fn on_peer_down(&mut self, origin_host: &str, down_handle: &PeerHandle) {
        if let Some((current, _)) = self.peers.get(origin_host) {
            if current.is_same_actor(down_handle) {
                self.peers.remove(origin_host);
            }
        }
    }
}

impl Default for PeerTable {
    fn default() -> Self {
        PeerTable::new()
    }
}

/// Picks engaged peers from `candidates` in rule order (fixed) or
/// shuffled (random), trying each until one accepts the request or all
/// are exhausted. Returns `NoAvailablePeer` if none of the candidates
/// currently resolve to a table entry in `Engaged` state - an explicit
/// fix over treating an empty result as "try nothing, return success".
pub async fn select_route(
    table: &PeerTable,
    candidates: &[String],
    policy: SelectionPolicy,
) -> Result<PeerHandle> {
    let mut ordered: Vec<&String> = candidates.iter().collect();
    if policy == SelectionPolicy::Random {
        ordered.shuffle(&mut rand::thread_rng());
    }

    for origin_host in ordered {
        if table.is_engaged(origin_host).await {
            if let Some(handle) = table.get(origin_host) {
                return Ok(handle.clone());
            }
        }
    }

    Err(Error::NoAvailablePeer(candidates.join(",")))
}

/// Resolves a `(realm, application)` pair to a routing rule, trying an
/// exact match before falling back to a realm-only wildcard rule (an
/// application of `"*"`).
pub fn find_rule<'a>(rules: &'a [RoutingRule], realm: &str, application: &str) -> Option<&'a RoutingRule> {
    rules
        .iter()
        .find(|r| r.realm == realm && r.application == application)
        .or_else(|| rules.iter().find(|r| r.realm == realm && r.application == "*"))
}

/// The router's live handlers, built once from configuration and
/// reused for every request that names them.
pub struct HandlerTable {
    handlers: HashMap<String, HttpHandler>,
}

impl HandlerTable {
    pub fn new() -> HandlerTable {
        HandlerTable {
            handlers: HashMap::new(),
        }
    }

    pub fn insert(&mut self, url: String, handler: HttpHandler) {
        self.handlers.insert(url, handler);
    }

    pub fn get(&self, url: &str) -> Option<&HttpHandler> {
        self.handlers.get(url)
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        HandlerTable::new()
    }
}

pub struct DiameterRouter {
    pub table: RwLock<PeerTable>,
    pub rules: RwLock<Vec<RoutingRule>>,
    pub handlers: RwLock<HandlerTable>,
    peers_config: RwLock<Vec<DiameterPeerConfig>>,
    /// Origin-hosts with a live actor spawned but not yet in `table`
    /// (table insertion is deferred to PeerUp). Consulted alongside
    /// `table` so `reconcile` doesn't re-dial a peer still mid-handshake.
    connecting: RwLock<std::collections::HashSet<String>>,
    dict: Arc<Dictionary>,
    end_gen: Arc<EndToEndGenerator>,
    local_origin_host: String,
    local_origin_realm: String,
}

impl DiameterRouter {
    pub fn new(
        dict: Arc<Dictionary>,
        end_gen: Arc<EndToEndGenerator>,
        local_origin_host: String,
        local_origin_realm: String,
    ) -> DiameterRouter {
        DiameterRouter {
            table: RwLock::new(PeerTable::new()),
            rules: RwLock::new(Vec::new()),
            handlers: RwLock::new(HandlerTable::new()),
            peers_config: RwLock::new(Vec::new()),
            connecting: RwLock::new(std::collections::HashSet::new()),
            dict,
            end_gen,
            local_origin_host,
            local_origin_realm,
        }
    }

    pub async fn set_rules(&self, rules: Vec<RoutingRule>) {
        *self.rules.write().await = rules;
    }

    /// Reconciles the live peer table against the configured peer
    /// list on a tick (default 120s, spec.md §4.5): spawns actors for
    /// newly-configured peers, and tears down actors no longer in the
    /// list. A torn-down peer is given a chance to close cleanly via
    /// `set_down` rather than simply dropped.
    pub async fn reconcile(self: Arc<Self>, configured: &[DiameterPeerConfig]) {
        *self.peers_config.write().await = configured.to_vec();
        let configured_hosts: Vec<&str> = configured.iter().map(|c| c.origin_host.as_str()).collect();

        let stale: Vec<String> = {
            let table = self.table.read().await;
            table
                .configured_hosts()
                .into_iter()
                .filter(|h| !configured_hosts.contains(&h.as_str()))
                .collect()
        };
        for host in stale {
            let removed = self.table.write().await.remove(&host);
            if let Some((handle, _)) = removed {
                handle.set_down().await;
            }
        }

        for peer_config in configured {
            let already_present = self.table.read().await.contains(&peer_config.origin_host)
                || self.connecting.read().await.contains(&peer_config.origin_host);
            if already_present || peer_config.policy == PeerPolicy::Passive {
                continue;
            }
            let peer_config = peer_config.clone();
            let addr = format!("{}:{}", peer_config.ip, peer_config.port);
            let socket = match tokio::time::timeout(peer_config.connect_timeout, TcpStream::connect(addr.as_str())).await {
                Ok(Ok(socket)) => socket,
                Ok(Err(e)) => {
                    log::warn!("failed to dial peer {} at {}: {:?}", peer_config.origin_host, addr, e);
                    continue;
                }
                Err(_) => {
                    log::warn!("timed out dialing peer {} at {}", peer_config.origin_host, addr);
                    continue;
                }
            };
            let (handle, state, actions, control) = Peer::spawn_active(
                peer_config.clone(),
                Arc::clone(&self.dict),
                self.local_origin_host.clone(),
                self.local_origin_realm.clone(),
                Arc::clone(&self.end_gen),
            );
            self.connecting.write().await.insert(peer_config.origin_host.clone());
            tokio::spawn(watch_peer_control(
                Arc::clone(&self),
                peer_config.origin_host.clone(),
                handle.clone(),
                state,
                control,
            ));
            drive_connection(peer_config.origin_host, socket, Arc::clone(&self.dict), handle, actions);
        }
    }

    /// Accepts inbound connections for passively-configured peers
    /// (spec.md §4.5): the remote address must fall within one of the
    /// configured peers' origin-network before a CER is even read, and
    /// the CER's Origin-Host must then match that same peer entry -
    /// both checks run inside the spawned `Peer` actor and the
    /// connection-driving loop below.
    pub async fn accept_loop(self: Arc<Self>, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        log::info!("diameter router listening on {}", bind_addr);
        loop {
            let (socket, remote) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("accept failed: {:?}", e);
                    continue;
                }
            };

            let candidate = self
                .peers_config
                .read()
                .await
                .iter()
                .find(|c| c.policy == PeerPolicy::Passive && check_origin_network(remote.ip(), &c.origin_network).is_ok())
                .cloned();

            let peer_config = match candidate {
                Some(c) => c,
                None => {
                    log::warn!("rejecting connection from {}: no passive peer configured for this network", remote);
                    continue;
                }
            };

            let (handle, state, actions, control) = Peer::spawn_passive(
                peer_config.clone(),
                Arc::clone(&self.dict),
                self.local_origin_host.clone(),
                self.local_origin_realm.clone(),
                Arc::clone(&self.end_gen),
            );
            tokio::spawn(watch_peer_control(
                Arc::clone(&self),
                peer_config.origin_host.clone(),
                handle.clone(),
                state,
                control,
            ));
            drive_connection(peer_config.origin_host, socket, Arc::clone(&self.dict), handle, actions);
        }
    }

    /// Routes a request per the matching rule for `(realm, application)`,
    /// returning the answer once received. Used for blocking-style
    /// request injection; `route_non_blocking` fires the same logic
    /// without waiting.
    pub async fn route(&self, realm: &str, application: &str, req: DiameterMessage) -> Result<DiameterMessage> {
        let rules = self.rules.read().await;
        let rule = find_rule(&rules, realm, application)
            .ok_or_else(|| Error::NoRouteFound(realm.to_string(), application.to_string()))?;

        match &rule.destination {
            RoutingDestination::Peers { origin_hosts, policy } => {
                let table = self.table.read().await;
                let handle = select_route(&table, origin_hosts, *policy).await?;
                drop(table);
                handle.send_request(req).await
            }
            RoutingDestination::Handlers { urls } => {
                let handlers = self.handlers.read().await;
                let url = urls.first().ok_or_else(|| Error::NoRouteFound(realm.to_string(), application.to_string()))?;
                let handler = handlers
                    .get(url)
                    .ok_or_else(|| Error::HandlerError(format!("no handler configured for {}", url)))?;
                handler.handle(&req).await
            }
            RoutingDestination::Local => Err(Error::HandlerError(
                "local routing destinations are resolved by the caller, not the router".into(),
            )),
        }
    }

    /// Fire-and-forget variant: spawns the routing work and discards
    /// the answer, logging failures instead of propagating them.
    pub fn route_non_blocking(self: &Arc<Self>, realm: String, application: String, req: DiameterMessage) {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = router.route(&realm, &application, req).await {
                log::warn!("non-blocking route realm={} application={} failed: {:?}", realm, application, e);
            }
        });
    }
}

/// Watches one peer actor's control channel and applies the table
/// transitions spec.md §4.5 describes: the actor isn't added to the
/// table until its first `PeerUp` (reaching `Engaged`), and is removed
/// on `PeerDown` (the actor terminating).
async fn watch_peer_control(
    router: Arc<DiameterRouter>,
    origin_host: String,
    handle: PeerHandle,
    state: Arc<RwLock<PeerState>>,
    mut control: mpsc::Receiver<PeerControl>,
) {
    while let Some(event) = control.recv().await {
        match event {
            PeerControl::Up => {
                router.table.write().await.on_peer_up(origin_host.clone(), handle.clone(), Arc::clone(&state)).await;
                router.connecting.write().await.remove(&origin_host);
            }
            PeerControl::Down => {
                router.table.write().await.on_peer_down(&origin_host, &handle);
                router.connecting.write().await.remove(&origin_host);
                break;
            }
        }
    }
    router.connecting.write().await.remove(&origin_host);
}

/// Drives one live TCP connection for a spawned peer actor: a read
/// half feeding decoded messages into the actor via `message_received`,
/// and a write half draining the actor's action stream onto the wire.
/// Either half ending tears the other down.
fn drive_connection(
    origin_host: String,
    socket: TcpStream,
    dict: Arc<Dictionary>,
    handle: PeerHandle,
    mut actions: mpsc::Receiver<PeerAction>,
) {
    let (mut read_half, mut write_half) = socket.into_split();

    let read_handle = handle.clone();
    let read_host = origin_host.clone();
    tokio::spawn(async move {
        loop {
            match Codec::decode(&mut read_half, &dict).await {
                Ok(msg) => read_handle.message_received(msg).await,
                Err(e) => {
                    log::info!("[{}] connection read ended: {:?}", read_host, e);
                    read_handle.connection_closed().await;
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        while let Some(action) = actions.recv().await {
            match action {
                PeerAction::Send(msg) => {
                    if let Err(e) = Codec::encode(&mut write_half, &msg).await {
                        log::warn!("[{}] failed to write message: {:?}", origin_host, e);
                        break;
                    }
                }
                PeerAction::Disconnect => {
                    log::info!("[{}] disconnecting", origin_host);
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{Dictionary, BASE_DICT_XML};
    use crate::id::EndToEndGenerator;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn peer_config() -> DiameterPeerConfig {
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

    fn spawn_test_peer(env_dir: &std::path::Path) -> (PeerHandle, Arc<RwLock<PeerState>>) {
        std::env::set_var("AAA_ROUTER_STATE_DIR", env_dir);
        let dict = Arc::new(Dictionary::new(&[BASE_DICT_XML]).unwrap());
        let end_gen = Arc::new(EndToEndGenerator::load().unwrap());
        let (handle, state, _actions, _control) = crate::peer::Peer::spawn_active(
            peer_config(),
            dict,
            "router.example.com".into(),
            "example.com".into(),
            end_gen,
        );
        (handle, state)
    }

    #[tokio::test]
    async fn test_on_peer_up_existing_engaged_wins_over_different_actor() {
        let env_dir = std::env::temp_dir().join(format!("aaa-router-router-test-{}", rand::random::<u32>()));
        let (old_handle, old_state) = spawn_test_peer(&env_dir);
        let (new_handle, new_state) = spawn_test_peer(&env_dir);
        *old_state.write().await = PeerState::Engaged;

        let mut table = PeerTable::new();
        table.insert("peer.example.com".into(), old_handle.clone(), Arc::clone(&old_state));
        table.on_peer_up("peer.example.com".into(), new_handle.clone(), Arc::clone(&new_state)).await;

        let current = table.get("peer.example.com").unwrap();
        assert!(current.is_same_actor(&old_handle));
        assert!(!current.is_same_actor(&new_handle));

        std::fs::remove_dir_all(&env_dir).ok();
    }

    #[tokio::test]
    async fn test_on_peer_up_adopts_new_when_existing_not_engaged() {
        let env_dir = std::env::temp_dir().join(format!("aaa-router-router-test-{}", rand::random::<u32>()));
        let (old_handle, old_state) = spawn_test_peer(&env_dir);
        let (new_handle, new_state) = spawn_test_peer(&env_dir);
        // old_state left at its spawned Connecting state - not engaged.

        let mut table = PeerTable::new();
        table.insert("peer.example.com".into(), old_handle.clone(), Arc::clone(&old_state));
        table.on_peer_up("peer.example.com".into(), new_handle.clone(), Arc::clone(&new_state)).await;

        let current = table.get("peer.example.com").unwrap();
        assert!(current.is_same_actor(&new_handle));

        std::fs::remove_dir_all(&env_dir).ok();
    }

    #[tokio::test]
    async fn test_on_peer_up_inserts_when_no_existing_entry() {
        let env_dir = std::env::temp_dir().join(format!("aaa-router-router-test-{}", rand::random::<u32>()));
        let (handle, state) = spawn_test_peer(&env_dir);

        let mut table = PeerTable::new();
        assert!(!table.contains("peer.example.com"));
        table.on_peer_up("peer.example.com".into(), handle.clone(), state).await;

        assert!(table.contains("peer.example.com"));
        let current = table.get("peer.example.com").unwrap();
        assert!(current.is_same_actor(&handle));

        std::fs::remove_dir_all(&env_dir).ok();
    }

    fn rule(realm: &str, application: &str, hosts: &[&str], policy: SelectionPolicy) -> RoutingRule {
        RoutingRule {
            realm: realm.to_string(),
            application: application.to_string(),
            destination: RoutingDestination::Peers {
                origin_hosts: hosts.iter().map(|s| s.to_string()).collect(),
                policy,
            },
        }
    }

    #[test]
    fn test_find_rule_exact_then_wildcard() {
        let rules = vec![
            rule("example.com", "Gx", &["peer-a"], SelectionPolicy::Fixed),
            rule("example.com", "*", &["peer-b"], SelectionPolicy::Fixed),
        ];
        assert_eq!(find_rule(&rules, "example.com", "Gx").unwrap().application, "Gx");
        assert_eq!(find_rule(&rules, "example.com", "Gy").unwrap().application, "*");
        assert!(find_rule(&rules, "other.com", "Gx").is_none());
    }

    #[tokio::test]
    async fn test_select_route_errors_when_all_peers_disengaged() {
        let table = PeerTable::new();
        let result = select_route(&table, &["peer-a".to_string(), "peer-b".to_string()], SelectionPolicy::Fixed).await;
        assert!(matches!(result, Err(Error::NoAvailablePeer(_))));
    }
}
