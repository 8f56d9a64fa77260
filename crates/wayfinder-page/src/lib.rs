//! # Wayfinder Page
//!
//! An in-memory render surface implementing
//! [`HostSurface`](wayfinder_protocols::HostSurface).
//!
//! The page keeps an element tree with layout rectangles and computed
//! styles, answers CSS-selector and XPath queries over a practical subset of
//! both grammars, simulates window and container scrolling, resizes and URL
//! changes, and records every overlay the engine mounts. It backs the test
//! suites and the CLI's headless runs.

mod dom;
mod fixture;
mod page;
mod selector;
mod xpath;

pub use dom::{NodeAttributes, PageNode, PageTree};
pub use fixture::{FixtureError, NodeSpec, PageFixture};
pub use page::{MemoryPage, NavigationRecord, OverlayRecord};
pub use selector::{Selector, SelectorList};
pub use xpath::XPath;
