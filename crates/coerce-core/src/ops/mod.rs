//! Structural operations over runtime values.

mod clone;
mod equals;
mod sort;

pub use clone::{CloneOptions, deep_clone, deep_clone_with};
pub use equals::equals;
pub use sort::{Comparator, SortError, sort};
