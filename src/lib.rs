//! # aaa-router
//!
//! A Diameter (RFC 6733) and RADIUS AAA routing engine: AVP and
//! message codecs, a vendor-aware dictionary, Diameter peer and
//! router actors, and a RADIUS router and client.
//!
//! ## Reference
//! Based on [RFC 6733](https://tools.ietf.org/html/rfc6733) for
//! Diameter and RFC 2865/2866 for RADIUS.

pub mod avp;
pub mod config;
pub mod dictionary;
pub mod diameter;
pub mod display;
pub mod error;
pub mod handler;
pub mod id;
pub mod peer;
pub mod radius;
pub mod router;
pub mod transport;

pub use crate::diameter::{CommandFlags, DiameterHeader, DiameterMessage};
pub use crate::error::{Error, Result};
