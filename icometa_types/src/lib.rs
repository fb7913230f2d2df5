//! # `icometa_types`
//!
//! Value types shared by the `icometa` decoders: the IPTC tag key, the
//! record mapping built up while parsing a tag stream, and the small enums
//! derived from it.
//!
//! These live in their own crate so downstream tools can work with parsed
//! metadata without pulling in the decoders themselves.

pub use rustc_hash::FxHashMap;

pub mod iptc;
