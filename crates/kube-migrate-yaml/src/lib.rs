//! YAML document trees for in-place manifest rewrites.
//!
//! Documents are parsed into an arena ([`Tree`]) of [`Node`]s that keeps the
//! presentation details needed to write them back: block or flow collections,
//! scalar quoting, explicit tags and anchors. Aliases resolve to the anchored
//! node's [`NodeId`], so one node can sit at several places of a document.

mod emit;
mod load;
mod tree;

pub use emit::{EmitError, Emitter, emit_stream};
pub use load::{LoadError, load_from_str};
pub use tree::{CollectionStyle, Kind, Node, NodeId, ScalarStyle, Stream, Tree};
