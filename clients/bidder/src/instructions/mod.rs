//! Client-side builders for the pool program's instructions.
//!
//! Account lists follow the order the program declares them in; the data is the Anchor
//! discriminator followed by the borsh-encoded arguments.

pub mod close;
pub mod entry;
pub mod payout;
pub mod resolve;
pub mod select;

pub use close::*;
pub use entry::*;
pub use payout::*;
pub use resolve::*;
pub use select::*;
