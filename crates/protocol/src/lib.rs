// Wire messages exchanged with the replica hub

pub mod messages;

pub use messages::{ClientMessage, ReplicaInfo, ServerMessage};
