//! The three detection engines.
//!
//! Each engine is a pure function over a file tree: it walks the shared
//! candidate set, analyzes files independently, and returns a sorted list of
//! findings. No state crosses files or engines.

pub mod rate_limit;
pub mod secrets;
pub mod taint;
