//! Routing table with readiness gating
//!
//! The port/destination mapping is compiled once at startup and never
//! changes. The only mutable state is the set of enabled destinations,
//! which grows as the sink reports destinations ready and never shrinks.

use std::collections::{BTreeSet, HashMap, HashSet};

use sysrelay_protocol::Port;

use crate::destination::{Destination, Route};
use crate::error::{Result, RoutingError};

static NO_DESTINATIONS: BTreeSet<String> = BTreeSet::new();

/// Bidirectional port/destination index plus the delivery gate
///
/// Owned by the dispatcher; no interior locking.
///
/// # Example
///
/// ```
/// use sysrelay_protocol::Port;
/// use sysrelay_routing::{Route, RoutingTable};
///
/// let mut table = RoutingTable::from_routes([
///     Route::new(Port::udp(514), "#ops"),
///     Route::new(Port::udp(514), "#net"),
///     Route::new(Port::udp(55514), "#net"),
/// ]);
///
/// assert_eq!(table.destinations_for_port(&Port::udp(514)).len(), 2);
/// assert!(!table.is_enabled("#net"));
///
/// let ports = table.enable("#net").unwrap();
/// assert_eq!(ports.len(), 2);
/// assert!(table.is_enabled("#net"));
///
/// // Unknown names leave the gate untouched
/// assert!(table.enable("#nowhere").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    /// Forward index used for dispatch
    ports_to_destinations: HashMap<Port, BTreeSet<String>>,

    /// Reverse index used when enabling
    destinations_to_ports: HashMap<String, BTreeSet<Port>>,

    /// Destinations that may receive messages; subset of the reverse index keys
    enabled: HashSet<String>,
}

impl RoutingTable {
    /// Create an empty routing table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a routing table from a set of routes
    ///
    /// Duplicate routes collapse into one.
    pub fn from_routes(routes: impl IntoIterator<Item = Route>) -> Self {
        let mut table = Self::new();
        for route in routes {
            table.insert(route);
        }
        table
    }

    fn insert(&mut self, route: Route) {
        self.ports_to_destinations
            .entry(route.port)
            .or_default()
            .insert(route.destination.clone());
        self.destinations_to_ports
            .entry(route.destination)
            .or_default()
            .insert(route.port);
    }

    /// Destinations routed from `port`, empty when the port has no routes
    #[inline]
    pub fn destinations_for_port(&self, port: &Port) -> &BTreeSet<String> {
        self.ports_to_destinations
            .get(port)
            .unwrap_or(&NO_DESTINATIONS)
    }

    /// Ports routed to `destination`, if it is a route target
    #[inline]
    pub fn ports_for_destination(&self, destination: &str) -> Option<&BTreeSet<Port>> {
        self.destinations_to_ports.get(destination)
    }

    /// Open the gate for a destination
    ///
    /// Returns the ports that now feed it. Enabling twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDestination` when no route targets `name`; the gate
    /// state is left unchanged.
    pub fn enable(&mut self, name: &str) -> Result<&BTreeSet<Port>> {
        let ports = self
            .destinations_to_ports
            .get(name)
            .ok_or_else(|| RoutingError::unknown_destination(name))?;

        if !self.enabled.contains(name) {
            self.enabled.insert(name.to_owned());
        }
        Ok(ports)
    }

    /// Whether messages may currently be delivered to `name`
    #[inline]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    /// All ports that have at least one route, sorted
    pub fn ports(&self) -> BTreeSet<Port> {
        self.ports_to_destinations.keys().copied().collect()
    }

    /// All route targets, sorted
    pub fn destinations(&self) -> BTreeSet<&str> {
        self.destinations_to_ports
            .keys()
            .map(String::as_str)
            .collect()
    }

    /// Number of distinct routed ports
    #[inline]
    pub fn port_count(&self) -> usize {
        self.ports_to_destinations.len()
    }

    /// Number of distinct (port, destination) routes
    pub fn route_count(&self) -> usize {
        self.ports_to_destinations.values().map(BTreeSet::len).sum()
    }

    /// Number of destinations currently enabled
    #[inline]
    pub fn enabled_count(&self) -> usize {
        self.enabled.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ports_to_destinations.is_empty()
    }
}

/// Builder that checks route targets against the configured destinations
#[derive(Debug, Default)]
pub struct RoutingTableBuilder {
    destinations: HashSet<String>,
    routes: Vec<Route>,
}

impl RoutingTableBuilder {
    /// Create a new builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a destination that routes may target
    pub fn destination(&mut self, destination: &Destination) -> &mut Self {
        self.destinations.insert(destination.name().to_owned());
        self
    }

    /// Add a route
    ///
    /// # Errors
    ///
    /// Returns `UnregisteredDestination` if the target was not registered.
    pub fn route(&mut self, route: Route) -> Result<&mut Self> {
        if !self.destinations.contains(&route.destination) {
            return Err(RoutingError::unregistered_destination(route.destination));
        }
        self.routes.push(route);
        Ok(self)
    }

    /// Build the routing table
    pub fn build(self) -> RoutingTable {
        RoutingTable::from_routes(self.routes)
    }
}
