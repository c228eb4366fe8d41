// src/resolver/mod.rs
pub mod lookup;
pub mod pool;
pub mod types;

pub use lookup::{HickoryLookup, Lookup};
pub use pool::ResolverPool;
pub use types::{HostEntry, Outcome, ResolveResult};
