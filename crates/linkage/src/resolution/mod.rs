//! Identity resolution: request validation, the resolver and the response projection

pub mod aggregator;
pub mod cluster;
pub mod error;
pub mod query;
pub mod resolver;

pub use aggregator::{ContactSummary, IdentifyResponse, ResponseAggregator};
pub use cluster::{Resolution, ResolvedCluster};
pub use error::ResolutionError;
pub use query::ContactQuery;
pub use resolver::IdentityResolver;
