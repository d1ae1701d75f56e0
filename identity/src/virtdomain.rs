//! Mapping client addresses to virtual domains.
//!
//! Lookups are local and bounded. A directory that may be slow is wrapped in
//! [`TimeoutDomainMapper`], where running out of time means "no mapping".

use configuration::VirtualDomainRule;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// Resolves the virtual domain a client address belongs to.
pub trait DomainMapper: Send + Sync {
    fn domain_for(&self, ip: IpAddr) -> Option<String>;
}

/// Never maps anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDomainMap;

impl DomainMapper for NoDomainMap {
    fn domain_for(&self, _ip: IpAddr) -> Option<String> {
        None
    }
}

/// An IP network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = prefix_mask_u32(self.prefix);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = prefix_mask_u128(self.prefix);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V4(ip)) => match net.to_ipv4_mapped() {
                Some(_) => self.contains(IpAddr::V6(ip.to_ipv6_mapped())),
                None => false,
            },
            (IpAddr::V4(_), IpAddr::V6(ip)) => match ip.to_ipv4_mapped() {
                Some(v4) => self.contains(IpAddr::V4(v4)),
                None => false,
            },
        }
    }
}

fn prefix_mask_u32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn prefix_mask_u128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

impl FromStr for Cidr {
    type Err = String;

    /// Accepts `addr/prefix` or a bare address (host route).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };
        let network: IpAddr = addr
            .trim()
            .parse()
            .map_err(|e| format!("invalid network address '{}': {}", addr, e))?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix {
            Some(p) => p
                .trim()
                .parse::<u8>()
                .map_err(|e| format!("invalid prefix length '{}': {}", p, e))?,
            None => max,
        };
        if prefix > max {
            return Err(format!("prefix length {} exceeds {}", prefix, max));
        }
        Ok(Self { network, prefix })
    }
}

/// Configured network-to-domain table; the most specific network wins.
#[derive(Debug, Clone, Default)]
pub struct StaticDomainMap {
    rules: Vec<(Cidr, String)>,
}

impl StaticDomainMap {
    /// Build from configuration, skipping rules that do not parse.
    pub fn from_rules(rules: &[VirtualDomainRule]) -> Self {
        let mut parsed = Vec::with_capacity(rules.len());
        for rule in rules {
            match rule.network.parse::<Cidr>() {
                Ok(cidr) => parsed.push((cidr, rule.domain.clone())),
                Err(e) => {
                    tracing::warn!(network = %rule.network, domain = %rule.domain, "Skipping virtual domain rule: {}", e)
                }
            }
        }
        parsed.sort_by(|a, b| b.0.prefix().cmp(&a.0.prefix()));
        Self { rules: parsed }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl DomainMapper for StaticDomainMap {
    fn domain_for(&self, ip: IpAddr) -> Option<String> {
        self.rules
            .iter()
            .find(|(cidr, _)| cidr.contains(ip))
            .map(|(_, domain)| domain.clone())
    }
}

/// Lookups a [`TimeoutDomainMapper`] lets run at once unless told otherwise.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Bounds a potentially slow mapper by a timeout.
///
/// The lookup runs on a helper thread. If it does not answer in time the
/// result is `None`; a late answer is discarded. Timed-out helpers keep
/// counting against the in-flight limit until the inner lookup returns, so
/// a hung directory cannot pile up threads: once the limit is reached new
/// lookups answer `None` straight away.
pub struct TimeoutDomainMapper {
    inner: Arc<dyn DomainMapper>,
    timeout: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: usize,
}

/// Releases one in-flight slot when the helper thread finishes.
struct InFlightSlot(Arc<AtomicUsize>);

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl TimeoutDomainMapper {
    pub fn new(inner: Arc<dyn DomainMapper>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Helper threads that have not returned yet, timed out or not.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn acquire_slot(&self) -> Option<InFlightSlot> {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_in_flight).then_some(n + 1)
            })
            .ok()
            .map(|_| InFlightSlot(Arc::clone(&self.in_flight)))
    }
}

impl DomainMapper for TimeoutDomainMapper {
    fn domain_for(&self, ip: IpAddr) -> Option<String> {
        let Some(slot) = self.acquire_slot() else {
            tracing::warn!(%ip, limit = self.max_in_flight, "Too many virtual domain lookups pending");
            return None;
        };
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let spawned = std::thread::Builder::new()
            .name("vdomain-lookup".to_string())
            .spawn(move || {
                let _slot = slot;
                let _ = tx.send(inner.domain_for(ip));
            });
        if let Err(e) = spawned {
            tracing::warn!(%ip, "Virtual domain lookup could not start: {}", e);
            return None;
        }
        match rx.recv_timeout(self.timeout) {
            Ok(domain) => domain,
            Err(_) => {
                tracing::warn!(%ip, timeout_ms = self.timeout.as_millis() as u64, "Virtual domain lookup timed out");
                None
            }
        }
    }
}
