//! Named roots available for scanning

mod registry;

pub use registry::{Root, RootSet};
