//! Key material: validated derivation paths and the key source abstraction

pub mod path;
pub mod source;

pub use path::Bip44Path;
pub use source::{generate_mnemonic, KeySource, KeySourceKind};
