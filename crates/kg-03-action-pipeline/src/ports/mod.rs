//! Ports: the dispatch API (inbound), collaborators the pipeline calls
//! (outbound) and the contracts business actions implement (plugin).

pub mod inbound;
pub mod outbound;
pub mod plugin;

pub use inbound::ActionApi;
pub use outbound::{Authenticator, NoopReplication, ReplicationSink};
pub use plugin::{GraphAction, NonGraphAction, NonGraphContext, NonGraphOutcome};
