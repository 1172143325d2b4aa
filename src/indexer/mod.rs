pub mod abi;
pub mod archive;
pub mod crawler;
pub mod decoder;
pub mod networks;
pub mod types;

pub use abi::{AbiError, AbiSet};
pub use archive::{ArchiveClient, ArchiveError};
pub use crawler::{CrawlError, CrawlItem, Crawler};
pub use decoder::{DecodeError, EventDecoder};
pub use types::{AnyEvent, ContractEventWatch, EventStreamRecord, EventType, SquidImportState};
