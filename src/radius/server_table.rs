//! The RADIUS upstream server table and its quarantine state machine
//! (spec.md §4.6, §8 "RADIUS timeout + quarantine"). All health state
//! lives here and is mutated only by the router's own event handling,
//! mirroring the Diameter peer table's single-writer discipline.
use crate::config::RadiusServerConfig;
use crate::radius::packet::Code;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One upstream server's configuration plus its live health state.
/// Availability is derived, never set directly from outside:
/// `is_available` is the only path back from quarantine, and it only
/// fires once `unavailable_until` has passed (spec.md §3 invariant).
pub struct ServerEntry {
    pub config: RadiusServerConfig,
    error_streak: u32,
    available: bool,
    unavailable_until: Option<Instant>,
}

impl ServerEntry {
    fn new(config: RadiusServerConfig) -> ServerEntry {
        ServerEntry {
            config,
            error_streak: 0,
            available: true,
            unavailable_until: None,
        }
    }

    /// Re-evaluates availability against the clock and returns the
    /// result. A server whose quarantine has elapsed flips back to
    /// available as a side effect - this is the *only* place that
    /// transition happens.
    pub fn is_available(&mut self) -> bool {
        if !self.available {
            if let Some(until) = self.unavailable_until {
                if Instant::now() >= until {
                    self.available = true;
                    self.unavailable_until = None;
                    self.error_streak = 0;
                }
            }
        }
        self.available
    }

    /// An attempt against this server failed. Once the streak reaches
    /// the configured limit, the server is quarantined for
    /// `config.quarantine`.
    pub fn record_error(&mut self) {
        if !self.available {
            return;
        }
        self.error_streak += 1;
        if self.error_streak >= self.config.error_limit {
            self.available = false;
            self.unavailable_until = Some(Instant::now() + self.config.quarantine);
        }
    }

    /// A request succeeded after earlier attempts on this server had
    /// errored; reset the streak so isolated failures don't
    /// accumulate toward quarantine across unrelated requests.
    pub fn record_success_after_errors(&mut self) {
        self.error_streak = 0;
    }

    /// True if this server has accumulated errors since its last
    /// reset - used to decide whether a subsequent success should
    /// post a reset-error-count event (spec.md §4.6 step 5).
    pub fn has_errors(&self) -> bool {
        self.error_streak > 0
    }

    pub fn port_for(&self, code: Code) -> u16 {
        match code {
            Code::AccessRequest => self.config.auth_port,
            Code::AccountingRequest => self.config.acct_port,
            _ => self.config.coa_port,
        }
    }
}

/// Built fresh from configuration on every reload; rebuilding always
/// discards per-server health state by design (spec.md §4.6 "Server
/// table") so a changed error limit or quarantine window applies
/// cleanly rather than inheriting a stale streak.
pub struct ServerTable {
    servers: HashMap<String, ServerEntry>,
}

impl ServerTable {
    pub fn new(configs: Vec<RadiusServerConfig>) -> ServerTable {
        let servers = configs.into_iter().map(|c| (c.name.clone(), ServerEntry::new(c))).collect();
        ServerTable { servers }
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ServerEntry> {
        self.servers.get_mut(name)
    }

    pub fn get(&self, name: &str) -> Option<&ServerEntry> {
        self.servers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn server(name: &str, error_limit: u32, quarantine: Duration) -> RadiusServerConfig {
        RadiusServerConfig {
            name: name.to_string(),
            ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            auth_port: 1812,
            acct_port: 1813,
            coa_port: 3799,
            secret: "secret".into(),
            origin_ports: vec![32768],
            error_limit,
            quarantine,
        }
    }

    #[test]
    fn test_quarantine_after_error_limit_then_recovers() {
        let mut entry = ServerEntry::new(server("s1", 2, Duration::from_millis(20)));
        assert!(entry.is_available());

        entry.record_error();
        assert!(entry.is_available(), "should still be available after one error below the limit");

        entry.record_error();
        assert!(!entry.is_available(), "should be quarantined once the streak hits the limit");

        std::thread::sleep(Duration::from_millis(30));
        assert!(entry.is_available(), "should recover once the quarantine window elapses");
    }

    #[test]
    fn test_success_resets_error_streak() {
        let mut entry = ServerEntry::new(server("s1", 3, Duration::from_secs(60)));
        entry.record_error();
        entry.record_error();
        entry.record_success_after_errors();
        entry.record_error();
        assert!(entry.is_available(), "streak should have reset, so one more error shouldn't quarantine");
    }
}
