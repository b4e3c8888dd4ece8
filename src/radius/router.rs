//! The RADIUS router (spec.md §4.6): owns the upstream server table,
//! the enabled UDP listeners, and egress routing (direct, group, or
//! local). All server health mutation happens inline in `route`, the
//! RADIUS analogue of the Diameter router owning its peer table.
use crate::config::{RadiusClientConfig, RadiusGroupConfig, RadiusServerConfig, SelectionPolicy};
use crate::error::{Error, Result};
use crate::radius::packet::{Code, Packet};
use crate::radius::server_table::ServerTable;
use rand::Rng;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinSet;

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(500);
const MAX_PACKET_SIZE: usize = 4096;

/// Where an egress request is headed (spec.md §4.6 "Egress routing").
pub enum RadiusDestination {
    Local,
    Direct { addr: SocketAddr, secret: String },
    Group(String),
}

pub struct RoutableRadiusRequest {
    pub destination: RadiusDestination,
    pub packet: Packet,
}

/// A local, in-process sink for ingress packets with no configured
/// HTTP handler - the RADIUS analogue of [`crate::handler::LocalHandler`].
pub trait LocalRadiusHandler: Send + Sync {
    fn handle(&self, req: &Packet) -> Result<Packet>;
}

impl<F> LocalRadiusHandler for F
where
    F: Fn(&Packet) -> Result<Packet> + Send + Sync,
{
    fn handle(&self, req: &Packet) -> Result<Packet> {
        self(req)
    }
}

/// HTTP handler for RADIUS packets: same protocol as the Diameter
/// side (spec.md §6) - a JSON projection POSTed over HTTP/2 with
/// certificate verification disabled - but over `Packet`'s own JSON
/// shape rather than a dictionary-resolved one.
#[derive(Clone)]
struct RadiusHttpHandler {
    client: reqwest::Client,
    url: String,
}

impl RadiusHttpHandler {
    fn new(url: impl Into<String>) -> Result<RadiusHttpHandler> {
        let client = reqwest::Client::builder()
            .http2_prior_knowledge()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::HandlerError(e.to_string()))?;
        Ok(RadiusHttpHandler { client, url: url.into() })
    }

    async fn handle(&self, req: &Packet) -> Result<Packet> {
        let resp = self
            .client
            .post(&self.url)
            .json(&req.to_json())
            .send()
            .await
            .map_err(|e| Error::HandlerError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::HandlerError(format!("handler {} returned status {}", self.url, resp.status())));
        }
        let body: serde_json::Value = resp.json().await.map_err(|e| Error::HandlerError(e.to_string()))?;
        Packet::from_json(&body)
    }
}

/// Sends an egress packet from a chosen origin port, retrying
/// `server_tries` times against the same server before giving up
/// (spec.md §4.6 "RADIUS client (upstream)"). A fresh socket is bound
/// per attempt; the identifier/authenticator pair is what correlates
/// the reply, since UDP gives no connection state to lean on.
pub struct RadiusClient {
    attempt_timeout: Duration,
}

impl RadiusClient {
    pub fn new(attempt_timeout: Duration) -> RadiusClient {
        RadiusClient { attempt_timeout }
    }

    async fn send_once(&self, packet: &Packet, origin_port: u16, server_addr: SocketAddr, secret: &str) -> Result<Packet> {
        let bind_addr: SocketAddr = match server_addr {
            SocketAddr::V4(_) => (IpAddr::from([0, 0, 0, 0]), origin_port).into(),
            SocketAddr::V6(_) => (IpAddr::from([0u16; 8]), origin_port).into(),
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        let mut req = packet.clone();
        let wire = req.encode(secret, None)?;
        socket.send_to(&wire, server_addr).await?;

        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let (n, _) = tokio::time::timeout(self.attempt_timeout, socket.recv_from(&mut buf))
            .await
            .map_err(|_| Error::Timeout)??;
        Packet::decode(&buf[..n], secret, Some(&req))
    }

    pub async fn send(&self, packet: &Packet, origin_port: u16, server_addr: SocketAddr, secret: &str, server_tries: usize) -> Result<Packet> {
        let mut last_err = Error::NoResponse;
        for _ in 0..server_tries.max(1) {
            match self.send_once(packet, origin_port, server_addr, secret).await {
                Ok(resp) => return Ok(resp),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }
}

pub struct RadiusRouter {
    servers: RwLock<ServerTable>,
    groups: RwLock<HashMap<String, RadiusGroupConfig>>,
    clients: RwLock<Vec<RadiusClientConfig>>,
    http_handlers: RwLock<HashMap<u8, Vec<RadiusHttpHandler>>>,
    local_handler: Arc<dyn LocalRadiusHandler>,
    client: RadiusClient,
    shutdown: Notify,
    in_flight: Arc<std::sync::Mutex<JoinSet<()>>>,
}

impl RadiusRouter {
    pub fn new(servers: Vec<RadiusServerConfig>, local_handler: Arc<dyn LocalRadiusHandler>) -> RadiusRouter {
        RadiusRouter {
            servers: RwLock::new(ServerTable::new(servers)),
            groups: RwLock::new(HashMap::new()),
            clients: RwLock::new(Vec::new()),
            http_handlers: RwLock::new(HashMap::new()),
            local_handler,
            client: RadiusClient::new(DEFAULT_ATTEMPT_TIMEOUT),
            shutdown: Notify::new(),
            in_flight: Arc::new(std::sync::Mutex::new(JoinSet::new())),
        }
    }

    /// Overrides the per-attempt timeout the egress client uses; the
    /// default is generous, but quarantine testing needs a short one.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> RadiusRouter {
        self.client = RadiusClient::new(timeout);
        self
    }

    /// Rebuilds the server table from configuration. Per spec.md §4.6
    /// this always discards per-server health state, so a changed
    /// error limit or quarantine window takes effect cleanly.
    pub async fn reload_servers(&self, servers: Vec<RadiusServerConfig>) {
        *self.servers.write().await = ServerTable::new(servers);
    }

    pub async fn set_groups(&self, groups: Vec<RadiusGroupConfig>) {
        let mut map = HashMap::new();
        for g in groups {
            map.insert(g.name.clone(), g);
        }
        *self.groups.write().await = map;
    }

    pub async fn set_clients(&self, clients: Vec<RadiusClientConfig>) {
        *self.clients.write().await = clients;
    }

    pub async fn set_handler_urls(&self, code: Code, urls: Vec<String>) -> Result<()> {
        let handlers = urls.into_iter().map(RadiusHttpHandler::new).collect::<Result<Vec<_>>>()?;
        self.http_handlers.write().await.insert(code_key(code), handlers);
        Ok(())
    }

    /// Egress routing (spec.md §4.6 "Egress routing"): dispatches to a
    /// one-off endpoint, a named server group (with quarantine-aware
    /// server selection and retry), or back to the local handler.
    pub async fn route(&self, req: RoutableRadiusRequest) -> Result<Packet> {
        match req.destination {
            RadiusDestination::Local => self.local_handler.handle(&req.packet),
            RadiusDestination::Direct { addr, secret } => {
                let origin_port = { rand::thread_rng().gen_range(32768..=60999) };
                self.client.send(&req.packet, origin_port, addr, &secret, 1).await
            }
            RadiusDestination::Group(name) => self.route_to_group(&name, req.packet).await,
        }
    }

    async fn route_to_group(&self, group_name: &str, packet: Packet) -> Result<Packet> {
        let group = {
            let groups = self.groups.read().await;
            groups
                .get(group_name)
                .cloned()
                .ok_or_else(|| Error::NoRouteFound(group_name.to_string(), "radius-group".to_string()))
        }?;

        let available: Vec<String> = {
            let mut servers = self.servers.write().await;
            group
                .servers
                .iter()
                .filter(|name| servers.get_mut(name).map(|s| s.is_available()).unwrap_or(false))
                .cloned()
                .collect()
        };
        if available.is_empty() {
            return Err(Error::NoServerAvailable);
        }

        let start = if group.policy == SelectionPolicy::Random {
            rand::thread_rng().gen_range(0..available.len())
        } else {
            0
        };

        let mut last_err = Error::NoResponse;
        for i in 0..group.tries {
            let server_name = &available[(start + i) % available.len()];
            let (server_ip, port, secret, origin_ports, had_errors) = {
                let mut servers = self.servers.write().await;
                let entry = match servers.get_mut(server_name) {
                    Some(e) => e,
                    None => continue,
                };
                (
                    entry.config.ip,
                    entry.port_for(packet.code),
                    entry.config.secret.clone(),
                    entry.config.origin_ports.clone(),
                    entry.has_errors(),
                )
            };
            let server_addr = SocketAddr::new(server_ip, port);
            let origin_port = if origin_ports.is_empty() {
                rand::thread_rng().gen_range(32768..=60999)
            } else {
                origin_ports[rand::thread_rng().gen_range(0..origin_ports.len())]
            };

            match self.client.send(&packet, origin_port, server_addr, &secret, group.server_tries).await {
                Ok(resp) => {
                    if had_errors {
                        if let Some(entry) = self.servers.write().await.get_mut(server_name) {
                            entry.record_success_after_errors();
                        }
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    if let Some(entry) = self.servers.write().await.get_mut(server_name) {
                        entry.record_error();
                    }
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Runs the ingress UDP loop for one enabled port (spec.md §4.6
    /// "Ingress"): validates the sender against the configured client
    /// list, dispatches to the packet code's handler list or the
    /// local handler, and replies with the original authenticator.
    pub async fn listen(self: Arc<Self>, bind_ip: IpAddr, port: u16) -> Result<()> {
        let socket = Arc::new(UdpSocket::bind((bind_ip, port)).await?);
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        loop {
            let (n, from) = tokio::select! {
                result = socket.recv_from(&mut buf) => result?,
                _ = self.shutdown.notified() => return Ok(()),
            };
            let secret = match self.secret_for(from.ip()).await {
                Some(s) => s,
                None => {
                    log::warn!("rejecting RADIUS packet from {}: no client configured for this address", from);
                    continue;
                }
            };
            let packet = match Packet::decode(&buf[..n], &secret, None) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("failed to decode RADIUS packet from {}: {:?}", from, e);
                    continue;
                }
            };

            let router = Arc::clone(&self);
            let socket = Arc::clone(&socket);
            self.in_flight.lock().unwrap().spawn(async move {
                let code = packet.code;
                let req = packet.clone();
                let result = router.dispatch_ingress(code, &packet).await;
                match result {
                    Ok(mut resp) => {
                        if let Ok(wire) = resp.encode(&secret, Some(&req)) {
                            let _ = socket.send_to(&wire, from).await;
                        }
                    }
                    Err(e) => log::warn!("RADIUS handler error for {}: {:?}", from, e),
                }
            });
        }
    }

    async fn dispatch_ingress(&self, code: Code, packet: &Packet) -> Result<Packet> {
        let handlers = self.http_handlers.read().await;
        match handlers.get(&code_key(code)) {
            Some(urls) if !urls.is_empty() => urls[0].handle(packet).await,
            _ => self.local_handler.handle(packet),
        }
    }

    async fn secret_for(&self, addr: IpAddr) -> Option<String> {
        self.clients.read().await.iter().find(|c| c.network.contains(&addr)).map(|c| c.secret.clone())
    }

    /// Stops taking new ingress packets and waits for in-flight
    /// handler tasks to finish (spec.md §4.6 "Shutdown").
    pub async fn shutdown(&self) {
        self.shutdown.notify_waiters();
        loop {
            let next = {
                let mut in_flight = self.in_flight.lock().unwrap();
                in_flight.try_join_next()
            };
            match next {
                Some(_) => continue,
                None => {
                    if self.in_flight.lock().unwrap().is_empty() {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            }
        }
    }
}

fn code_key(code: Code) -> u8 {
    match code {
        Code::AccessRequest | Code::AccessAccept | Code::AccessReject | Code::AccessChallenge => 1,
        Code::AccountingRequest | Code::AccountingResponse => 4,
        _ => 43,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radius::packet::Code;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn local_echo() -> Arc<dyn LocalRadiusHandler> {
        Arc::new(|req: &Packet| {
            let mut resp = Packet::new(Code::AccessAccept, req.identifier);
            resp.add(1, b"ok".to_vec());
            Ok(resp)
        })
    }

    #[tokio::test]
    async fn test_route_local_invokes_local_handler() {
        let router = RadiusRouter::new(Vec::new(), local_echo());
        let req = RoutableRadiusRequest {
            destination: RadiusDestination::Local,
            packet: Packet::new(Code::AccessRequest, 1),
        };
        let resp = router.route(req).await.unwrap();
        assert_eq!(resp.code, Code::AccessAccept);
        assert_eq!(resp.get(1), Some(b"ok".as_slice()));
    }

    #[tokio::test]
    async fn test_group_quarantines_after_repeated_timeouts() {
        let server = RadiusServerConfig {
            name: "s1".into(),
            ip: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), // TEST-NET-1, never responds
            auth_port: 1812,
            acct_port: 1813,
            coa_port: 3799,
            secret: "secret".into(),
            origin_ports: vec![40000],
            error_limit: 2,
            quarantine: Duration::from_secs(60),
        };
        let router = RadiusRouter::new(vec![server], local_echo()).with_attempt_timeout(Duration::from_millis(100));
        router
            .set_groups(vec![RadiusGroupConfig {
                name: "g1".into(),
                servers: vec!["s1".into()],
                policy: SelectionPolicy::Fixed,
                tries: 1,
                server_tries: 1,
            }])
            .await;

        for _ in 0..2 {
            let req = RoutableRadiusRequest {
                destination: RadiusDestination::Group("g1".into()),
                packet: Packet::new(Code::AccessRequest, 1),
            };
            let result = router.route(req).await;
            assert!(result.is_err());
        }

        let req = RoutableRadiusRequest {
            destination: RadiusDestination::Group("g1".into()),
            packet: Packet::new(Code::AccessRequest, 1),
        };
        let result = router.route(req).await;
        assert!(matches!(result, Err(Error::NoServerAvailable)));
    }
}
