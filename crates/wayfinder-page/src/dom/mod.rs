//! Element tree of the in-memory page.

mod dom_tree;
mod dom_types;

pub use dom_tree::PageTree;
pub use dom_types::{NodeAttributes, PageNode};

#[cfg(test)]
#[path = "dom_tests.rs"]
mod tests;
