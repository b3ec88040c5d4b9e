//! TEXTURE1/TEXTURE2 + PNAMES codec.
//!
//! Wall textures are compositions of patches.  On the wire a texture
//! references its patches by numeric index into the PNAMES name list;
//! merging tables from several archives by name would scramble those
//! indices, so in memory every patch reference is the resolved *name* and
//! the numeric index is a cache rebuilt just before serialization.
//!
//! Two record layouts exist.  Canonical Doom:
//!
//! ```text
//! name[8]  unused[4]  width:i16  height:i16  unused[4]  patch_count:u16
//!     patch_count × { x:i16  y:i16  patch:u16  unused[4] }
//! ```
//!
//! Strife 1.1 drops both unused runs after the height field and inside
//! each patch record.  The variant is detected from the u16 where Doom
//! stores zero padding: the first non-zero value there is a Strife patch
//! count, and once seen the whole table stays in Strife mode.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use smallvec::SmallVec;
use std::io::{self, Cursor};
use thiserror::Error;

use crate::orderedmap::OrderedMap;
use crate::report::{DuplicateKind, DuplicateLog};
use crate::wad::name::{read_name, write_name};
use crate::wad::{Archive, Lump};

/// First TEXTURE1 entry of the stock IWADs.  Engines never render these,
/// and editors expect one of them to stay at the top of the table.
const NULL_TEXTURE_NAMES: &[&str] = &["AASTINKY", "AASHITTY", "BADPATCH", "ABADONE"];

/// Texture record sizes, canonical / Strife.
const HEADER_SIZE_DOOM: usize = 22;
const HEADER_SIZE_STRIFE: usize = 18;
const PATCH_SIZE_DOOM: usize = 10;
const PATCH_SIZE_STRIFE: usize = 6;

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0} lump is truncated")]
    Truncated(&'static str),

    /// A texture references a patch index past the end of PNAMES.
    #[error("texture {texture} references patch {index}, PNAMES only has {count} names")]
    BadPatchIndex {
        texture: String,
        index: usize,
        count: usize,
    },

    #[error("{0} patch names do not fit a 16-bit index")]
    TooManyPatches(usize),
}

/// One patch placement inside a texture.  `index` is only meaningful
/// after [`TextureTable::update_patch_names`] has run.
#[derive(Clone, Debug)]
pub struct PatchDef {
    pub name: String,
    pub x: i16,
    pub y: i16,
    pub index: usize,
}

/// One texture definition, detached from the lump it was parsed from.
#[derive(Clone, Debug)]
pub struct TextureDef {
    pub name: String,
    pub width: i16,
    pub height: i16,
    pub patches: SmallVec<[PatchDef; 2]>,
    /// Basename of the contributing archive, for conflict reporting.
    pub source: String,
}

/// Structural equality: the numeric patch index is a serialization cache
/// and deliberately not part of it.
fn same_definition(a: &TextureDef, b: &TextureDef) -> bool {
    a.name == b.name
        && a.width == b.width
        && a.height == b.height
        && a.patches.len() == b.patches.len()
        && a.patches
            .iter()
            .zip(&b.patches)
            .all(|(p, q)| p.x == q.x && p.y == q.y && p.name == q.name)
}

/// The merged texture table.
#[derive(Default)]
pub struct TextureTable {
    textures: OrderedMap<TextureDef>,
    /// Rebuilt by `update_patch_names`; stale until then.
    patch_names: Vec<String>,
    strife_mode: bool,
}

impl TextureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn strife_mode(&self) -> bool {
        self.strife_mode
    }

    pub fn get(&self, name: &str) -> Option<&TextureDef> {
        self.textures.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextureDef> {
        self.textures.iter()
    }

    /// The live patch-name list, valid after [`Self::update_patch_names`].
    pub fn patch_names(&self) -> &[String] {
        &self.patch_names
    }

    /// Read PNAMES + TEXTURE1 (+ TEXTURE2) from `archive`, claiming the
    /// lumps.  A no-op unless both PNAMES and TEXTURE1 are present.
    pub fn read_from(&mut self, archive: &mut Archive) -> Result<(), TextureError> {
        let (Some(pn_pos), Some(t1_pos)) = (
            archive.lumps.index_of("PNAMES"),
            archive.lumps.index_of("TEXTURE1"),
        ) else {
            return Ok(());
        };

        let source = archive.basename();
        let pnames = parse_pnames(&archive.lumps.get_at(pn_pos).unwrap().data)?;

        let t1 = archive.lumps.get_at(t1_pos).unwrap().data.clone();
        self.read_texture_lump("TEXTURE1", &t1, &pnames, &source)?;

        let t2_pos = archive.lumps.index_of("TEXTURE2");
        if let Some(pos) = t2_pos {
            let t2 = archive.lumps.get_at(pos).unwrap().data.clone();
            self.read_texture_lump("TEXTURE2", &t2, &pnames, &source)?;
        }

        for pos in [Some(pn_pos), Some(t1_pos), t2_pos].into_iter().flatten() {
            archive.lumps.get_at_mut(pos).unwrap().used = true;
        }

        log::info!("{:5} textures in {}", self.textures.len(), source);
        Ok(())
    }

    fn read_texture_lump(
        &mut self,
        which: &'static str,
        data: &[u8],
        pnames: &[String],
        source: &str,
    ) -> Result<(), TextureError> {
        let trunc = |_: io::Error| TextureError::Truncated(which);

        let mut cur = Cursor::new(data);
        let count = cur.read_u32::<LE>().map_err(trunc)? as usize;
        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            offsets.push(cur.read_u32::<LE>().map_err(trunc)? as usize);
        }

        for offset in offsets {
            if offset >= data.len() {
                return Err(TextureError::Truncated(which));
            }
            let mut cur = Cursor::new(&data[offset..]);

            let name = read_name::<8>(&mut cur).map_err(trunc)?;
            cur.read_u32::<LE>().map_err(trunc)?; // unused
            let width = cur.read_i16::<LE>().map_err(trunc)?;
            let height = cur.read_i16::<LE>().map_err(trunc)?;

            // Doom keeps 4 more padding bytes here; Strife 1.1 stores the
            // patch count in their place.  First non-zero read latches the
            // variant for the rest of the table.
            let probe = cur.read_u16::<LE>().map_err(trunc)?;
            let patch_count = if self.strife_mode {
                probe as usize
            } else if probe != 0 {
                log::debug!("texture {name}: Strife 1.1 layout detected");
                self.strife_mode = true;
                probe as usize
            } else {
                cur.read_u16::<LE>().map_err(trunc)?; // second padding half
                cur.read_u16::<LE>().map_err(trunc)? as usize
            };

            let mut patches = SmallVec::with_capacity(patch_count);
            for _ in 0..patch_count {
                let x = cur.read_i16::<LE>().map_err(trunc)?;
                let y = cur.read_i16::<LE>().map_err(trunc)?;
                let index = cur.read_u16::<LE>().map_err(trunc)? as usize;
                if !self.strife_mode {
                    cur.read_u32::<LE>().map_err(trunc)?; // unused
                }
                let patch_name =
                    pnames
                        .get(index)
                        .ok_or_else(|| TextureError::BadPatchIndex {
                            texture: name.clone(),
                            index,
                            count: pnames.len(),
                        })?;
                patches.push(PatchDef {
                    name: patch_name.clone(),
                    x,
                    y,
                    index,
                });
            }

            self.textures.add(
                name.clone(),
                TextureDef {
                    name,
                    width,
                    height,
                    patches,
                    source: source.to_owned(),
                },
            );
        }
        Ok(())
    }

    /// Fold `other` into this table.  New names append; structurally equal
    /// duplicates are dropped silently; differing duplicates replace the
    /// existing definition and are logged.
    pub fn merge_with(&mut self, other: TextureTable, log: &mut DuplicateLog) {
        self.strife_mode |= other.strife_mode;
        for tex in other.textures.into_values() {
            match self.textures.get(&tex.name) {
                None => self.textures.add(tex.name.clone(), tex),
                Some(existing) if same_definition(existing, &tex) => {}
                Some(existing) => {
                    log.record(
                        DuplicateKind::Overwrite,
                        "texture",
                        format!("{}:{}", existing.source, existing.name),
                        format!("{}:{}", tex.source, tex.name),
                    );
                    self.textures.update(tex.name.clone(), tex);
                }
            }
        }
    }

    /// Rebuild the patch-name list from the union of names in use, in
    /// first-seen order, and rewrite every patch index to match.  Must run
    /// exactly once before [`Self::write_to`].
    pub fn update_patch_names(&mut self) {
        let mut names: Vec<String> = Vec::new();
        let mut positions: std::collections::HashMap<String, usize> =
            std::collections::HashMap::new();

        for tex in self.textures.iter_mut() {
            for patch in &mut tex.patches {
                let index = *positions.entry(patch.name.clone()).or_insert_with(|| {
                    names.push(patch.name.clone());
                    names.len() - 1
                });
                patch.index = index;
            }
        }
        self.patch_names = names;
    }

    /// Ascending by name, with the configured null-texture names pinned to
    /// the top.  Two null textures at once is almost certainly a user
    /// error; it is reported and resolved by plain name order.
    pub fn sort(&mut self) {
        let is_null = |name: &str| NULL_TEXTURE_NAMES.contains(&name);

        let nulls: Vec<&str> = self
            .textures
            .entries()
            .map(|(k, _)| k)
            .filter(|k| is_null(k))
            .collect();
        if nulls.len() > 1 {
            log::warn!(
                "multiple null textures present ({}); keeping name order",
                nulls.join(", ")
            );
        }

        self.textures.sort_by(|ka, _, kb, _| {
            is_null(kb).cmp(&is_null(ka)).then_with(|| ka.cmp(kb))
        });
    }

    /// Emit TEXTURE1 and PNAMES into `archive`.  All textures land in
    /// TEXTURE1; a TEXTURE2 lump is never produced.
    pub fn write_to(&self, archive: &mut Archive) -> Result<(), TextureError> {
        if self.textures.is_empty() {
            return Ok(());
        }
        if self.patch_names.len() > u16::MAX as usize {
            return Err(TextureError::TooManyPatches(self.patch_names.len()));
        }

        let (header_size, patch_size) = if self.strife_mode {
            (HEADER_SIZE_STRIFE, PATCH_SIZE_STRIFE)
        } else {
            (HEADER_SIZE_DOOM, PATCH_SIZE_DOOM)
        };

        let mut buf = Vec::new();
        buf.write_u32::<LE>(self.textures.len() as u32)?;

        let mut offset = 4 + 4 * self.textures.len();
        for tex in self.textures.iter() {
            buf.write_u32::<LE>(offset as u32)?;
            offset += header_size + patch_size * tex.patches.len();
        }

        for tex in self.textures.iter() {
            write_name::<8>(&mut buf, &tex.name)?;
            buf.write_u32::<LE>(0)?; // unused
            buf.write_i16::<LE>(tex.width)?;
            buf.write_i16::<LE>(tex.height)?;
            if !self.strife_mode {
                buf.write_u32::<LE>(0)?; // unused
            }
            buf.write_u16::<LE>(tex.patches.len() as u16)?;
            for patch in &tex.patches {
                buf.write_i16::<LE>(patch.x)?;
                buf.write_i16::<LE>(patch.y)?;
                buf.write_u16::<LE>(patch.index as u16)?;
                if !self.strife_mode {
                    buf.write_u32::<LE>(0)?; // unused
                }
            }
        }
        archive.add_lump(Lump::new("TEXTURE1", buf));

        let mut buf = Vec::new();
        buf.write_u32::<LE>(self.patch_names.len() as u32)?;
        for name in &self.patch_names {
            write_name::<8>(&mut buf, name)?;
        }
        archive.add_lump(Lump::new("PNAMES", buf));

        Ok(())
    }
}

fn parse_pnames(data: &[u8]) -> Result<Vec<String>, TextureError> {
    let trunc = |_: io::Error| TextureError::Truncated("PNAMES");

    let mut cur = Cursor::new(data);
    let count = cur.read_u32::<LE>().map_err(trunc)? as usize;
    if data.len() < 4 + count * 8 {
        return Err(TextureError::Truncated("PNAMES"));
    }
    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        names.push(read_name::<8>(&mut cur).map_err(trunc)?);
    }
    Ok(names)
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
