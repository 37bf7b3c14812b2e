#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod builder;
pub mod dedup;
pub mod gateway;

pub use builder::QueryBuilder;
pub use dedup::Deduplicator;
pub use gateway::RetrievalGateway;
