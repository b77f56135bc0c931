pub mod errors;
pub mod events;
pub mod memory;
pub mod ports;
pub mod selector;

pub use errors::PortError;
pub use events::{DomChangeSource, PageEvent};
pub use memory::{ElementSpec, MemoryPage};
pub use ports::{PagePort, ScrollMetrics};
pub use selector::Selector;

pub use jobfilter_core_types::NodeRef;
