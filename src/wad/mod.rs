mod archive;
mod lump;
pub mod name;

pub use archive::{Archive, WadError, WadKind};
pub use lump::{Lump, SourceRef};
