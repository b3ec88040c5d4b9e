mod table;

pub use table::{PatchDef, TextureDef, TextureError, TextureTable};
