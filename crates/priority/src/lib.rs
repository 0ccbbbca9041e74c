pub mod graph;
pub mod resolver;
pub mod working_set;

pub use graph::{ApplicationGraph, ApplicationNode};
pub use resolver::{
    ChainAnomaly, PriorityChainResolver, PriorityResolution, PrioritySource, ResolverConfig,
};
pub use working_set::{ParentLookup, WorkingSet};
