pub mod chain;
pub mod config;
pub mod db;
pub mod explorer;
pub mod fanout;
pub mod http;
pub mod indexer;
pub mod serde_util;
pub mod sink;
pub mod state;
pub mod streams;
pub mod watch;
