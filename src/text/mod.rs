//! Text-lump merging.
//!
//! Engines layer plain-text configuration lumps (DECORATE, MAPINFO, …)
//! additively, so two inputs shipping the same lump usually both matter.
//! For every name on the whitelist the merged table keeps one entry and
//! appends later occurrences after a single newline.  The bytes are never
//! interpreted.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::orderedmap::OrderedMap;
use crate::report::{DuplicateKind, DuplicateLog};
use crate::wad::{Archive, Lump};

/// Known text-format lump names across Doom, Hexen, ZDoom, Skulltag,
/// Eternity and Doomsday.
static TEXT_LUMP_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "ALTHUDCF", "ANIMDEFS", "CVARINFO", "DD_DEFNS", "DECALDEF", "DECORATE", "DEFBINDS",
        "DEFCVARS", "DEHACKED", "DMXGUS", "DMXGUSC", "DOOMDEFS", "EMAPINFO", "FONTDEFS",
        "GAMEINFO", "GLDEFS", "HEXNDEFS", "HTICDEFS", "IWADINFO", "KEYCONF", "LANGUAGE",
        "LOADACS", "LOCKDEFS", "MAPINFO", "MENUDEF", "MODELDEF", "MUSINFO", "PALVERS",
        "REVERBS", "SBARINFO", "SECRETS", "SKININFO", "SNDINFO", "SNDSEQ", "STRFDEFS",
        "TEAMINFO", "TERRAIN", "TEXTCOLO", "TRNSLATE", "UMAPINFO", "VOXELDEF", "X11R6RGB",
        "XHAIRS", "ZMAPINFO", "ZSCRIPT",
    ]
    .into_iter()
    .collect()
});

/// Merged text lumps, keyed by lump name.
#[derive(Default)]
pub struct TextTable {
    lumps: OrderedMap<Lump>,
}

impl TextTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lumps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lumps.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Lump> {
        self.lumps.get(name)
    }

    /// Claim every unclaimed whitelisted lump of `archive`, concatenating
    /// repeats behind a newline.
    pub fn read_from(&mut self, archive: &mut Archive, log: &mut DuplicateLog) {
        for i in 0..archive.lumps.len() {
            let (name, used) = {
                let lump = archive.lumps.get_at(i).unwrap();
                (lump.name.clone(), lump.used)
            };
            if used || !TEXT_LUMP_NAMES.contains(name.as_str()) {
                continue;
            }

            let incoming = {
                let lump = archive.lumps.get_at_mut(i).unwrap();
                lump.used = true;
                lump.clone()
            };

            match self.lumps.get_mut(&name) {
                None => self.lumps.add(name, incoming),
                Some(existing) => {
                    log.record(
                        DuplicateKind::Merge,
                        "text lump",
                        existing.full_name(),
                        incoming.full_name(),
                    );
                    existing.data.push(b'\n');
                    existing.data.extend_from_slice(&incoming.data);
                }
            }
        }
    }

    pub fn sort(&mut self) {
        self.lumps.sort();
    }

    pub fn write_to(&self, out: &mut Archive) {
        for lump in self.lumps.iter() {
            out.add_lump(lump.clone());
        }
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
