pub mod walk;

pub use walk::{walk, Walk, WalkEntry};
