//! GTFS-realtime feed types and HTTP client.
//!
//! Feeds are fetched as protobuf, decoded with `prost` into the
//! `gtfs_realtime` wire types, then converted to the domain types in `types`
//! which the rest of the crate works with. The archive stores the wire
//! encoding.

mod client;
mod convert;
mod error;
mod types;

pub use client::{FeedClient, FeedClientConfig};
pub use convert::{decode_message, encode_message};
pub use error::FeedError;
pub use types::{
    Alert, FeedEntity, FeedKind, InformedEntity, LiveMessage, Position, StopRelationship,
    StopTimeEvent, StopTimeUpdate, TripDescriptor, TripRelationship, TripUpdate, UnknownFeedKind,
    VehicleDescriptor, VehiclePosition,
};
