//! Service layer: the approval-gated surface the extension consumes

pub mod keyring;

pub use keyring::{Bip44Selectable, KeyRingService};
