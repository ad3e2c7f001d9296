// src/common/mod.rs

// --- Declare all public modules within common ---
pub mod checksum;
pub mod command;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod gap;
pub mod hal_traits;
pub mod layout;
pub mod reading;
pub mod sync;
pub mod timing;

#[cfg(test)]
pub(crate) mod test_support;

// --- Re-export key types/traits/functions for easier access ---

pub use checksum::{validate, ChecksumPosition, ChecksumScheme, ChecksumSpec};
pub use command::{CommandFormat, EncodedFrame, InjectionTemplate, OutboundCommand};
pub use decoder::decode;
pub use error::{BusError, DecodeError, EncodeError};
pub use frame::RawFrame;
pub use gap::{GapScanner, GapState};
pub use hal_traits::{BusInstant, BusTimer, Direction, Rs485Serial};
pub use layout::{layouts, BroadcastFraming, Field, FieldKind, FieldSpec, FrameLayout, SignatureByte};
pub use reading::{Reading, ReadingState, Temperature};
pub use sync::FrameSynchronizer;

// timing.rs constants are reached through `common::timing::*`.

#[cfg(feature = "impl-native")]
pub use hal_traits::native::{NativeError, NativeRs485};
