//! The two output streams: contract creation dates and decoded contract
//! events. Each fans out one worker per chain and writes to a `RecordSink`.

pub mod contract_events;
pub mod creation_info;

pub use contract_events::{archive_clients, build_import_states, sync_contract_events};
pub use creation_info::{resolve_explorers, sync_creation_info};
