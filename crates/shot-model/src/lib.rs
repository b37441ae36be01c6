//! Shotline Shot Model
//!
//! Defines the data contracts every pipeline stage agrees on:
//! - **Identity:** episode/sequence/shot codes parsed from asset filenames
//! - **Paths:** canonical, nested output locations for rendered layers
//! - **Passes:** the ordered image channels a render layer exposes
//! - **Range:** a shot's frame range and derived playback step
//! - **Buckets:** how library collections are sorted into parent buckets
//!
//! Everything in this crate is pure: the only I/O is reading a range table
//! from disk when asked to.

pub mod buckets;
pub mod identity;
pub mod passes;
pub mod paths;
pub mod range;

pub use buckets::*;
pub use identity::*;
pub use passes::*;
pub use paths::*;
pub use range::*;
