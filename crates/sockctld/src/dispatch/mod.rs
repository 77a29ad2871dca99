//! Method registry consulted for every complete request frame.

mod registry;

pub use self::registry::{MethodHandler, MethodRegistry};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
