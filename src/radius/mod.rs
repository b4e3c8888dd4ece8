//! The RADIUS side of the routing engine (spec.md §4.6): a hand-rolled
//! wire codec (mirroring the Diameter codec's own choice not to
//! delegate framing to an external crate), a quarantine-aware upstream
//! server table, and the router that ties egress/ingress together.
pub mod packet;
pub mod router;
pub mod server_table;

pub use packet::{Code, Packet};
pub use router::{LocalRadiusHandler, RadiusClient, RadiusDestination, RadiusRouter, RoutableRadiusRequest};
pub use server_table::ServerTable;
