//! Entity graph: introspected, read-only descriptors of the catalog's relational entities.

mod descriptor;
mod introspect;

pub use descriptor::*;
pub use introspect::*;
