//! Locator - resolves the scrollable listing container and its items
//!
//! Resolution runs ordered strategy chains against the live page:
//! - Container: header sibling, scrollable wrapper child, direct selectors
//! - Items: first selector strategy with a non-empty result
//! - Text probes used by classification to read labels and company names
//!
//! Nothing is cached; the host page may replace the list at any time.

pub mod errors;
pub mod resolver;
pub mod strategies;
pub mod types;

pub use errors::*;
pub use resolver::*;
pub use strategies::*;
pub use types::*;
