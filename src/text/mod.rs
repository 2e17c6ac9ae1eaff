//! Text primitives shared by both ends of the sync protocol:
//! canonical deltas and character-offset patching.

pub mod delta;
pub mod patch;

pub use delta::{DeltaKind, EditDelta, canonicalize};
pub use patch::{OutOfRange, apply_all, apply_delta, byte_offset};
