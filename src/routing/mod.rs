//! Route synthesis: path templates bound to generated shapes, and request path decoding.

mod pattern;
mod table;

pub use pattern::RoutePattern;
pub use table::*;
