//! sysrelay - Routing
//!
//! Maps listening ports to destinations and gates delivery until each
//! destination has been reported ready by the sink.
//!
//! # Design
//!
//! Routes come from configuration and are compiled once at startup into a
//! bidirectional index. Only the gate (the set of enabled destinations) is
//! mutable, and it only grows: there is no way to disable a destination.
//!
//! # Example
//!
//! ```
//! use sysrelay_protocol::Port;
//! use sysrelay_routing::{Route, RoutingTable};
//!
//! let mut table = RoutingTable::from_routes([Route::new(Port::udp(514), "#ops")]);
//!
//! for dest in table.destinations_for_port(&Port::udp(514)) {
//!     assert!(!table.is_enabled(dest));
//! }
//!
//! table.enable("#ops").unwrap();
//! assert!(table.is_enabled("#ops"));
//! ```

mod destination;
mod error;
mod table;


pub use destination::{Destination, Route};
pub use error::{Result, RoutingError};
pub use table::{RoutingTable, RoutingTableBuilder};
