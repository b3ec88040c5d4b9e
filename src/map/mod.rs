//! Map run extraction.
//!
//! A playable map is a zero-length marker lump (`MAP01`, `E1M1`, …)
//! followed by a run of data lumps.  The run's shape identifies the
//! format:
//!
//! ```text
//! [marker] THINGS LINEDEFS …            classic Doom
//! [marker] THINGS … BEHAVIOR …          Hexen (scripted)
//! [marker] TEXTMAP … ENDMAP             UDMF (textual)
//! ```
//!
//! Rather than parse map geometry, the extractor records each map as a
//! half-open index range into its source archive; serialization copies
//! those lumps verbatim behind a fresh marker.

use crate::orderedmap::OrderedMap;
use crate::report::{DuplicateKind, DuplicateLog};
use crate::wad::{Archive, Lump};

/// Lump names that can belong to a Doom/Hexen map run.
const MAP_LUMP_NAMES: &[&str] = &[
    "THINGS", "VERTEXES", "SIDEDEFS", "SECTORS", "SEGS", "SSECTORS", "NODES", "LINEDEFS",
    "REJECT", "BLOCKMAP", "BEHAVIOR", "SCRIPTS",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapFormat {
    Doom,
    Hexen,
    Udmf,
}

/// One extracted map: its marker name and where its lumps live.
#[derive(Clone, Debug)]
pub struct MapMarker {
    pub name: String,
    pub format: MapFormat,
    /// Index into the driver's archive list.
    pub archive_id: usize,
    /// Basename of the source archive, for conflict reporting.
    pub archive: String,
    /// Half-open lump range `[start, end)` in the source archive,
    /// excluding the marker itself.
    pub start: usize,
    pub end: usize,
}

enum Scan {
    Out,
    In {
        name: String,
        start: usize,
        format: MapFormat,
    },
}

/// All maps gathered across the inputs, keyed by marker name.
#[derive(Default)]
pub struct MapTable {
    maps: OrderedMap<MapMarker>,
}

impl MapTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&MapMarker> {
        self.maps.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MapMarker> {
        self.maps.iter()
    }

    /// Scan `archive` left to right, claiming every lump that belongs to a
    /// map run.  `archive_id` is the caller's handle for the archive; the
    /// recorded ranges are resolved against it at write time.
    pub fn read_from(
        &mut self,
        archive: &mut Archive,
        archive_id: usize,
        log: &mut DuplicateLog,
    ) {
        let source = archive.basename();
        let count = archive.lumps.len();
        let before = self.maps.len();
        let mut state = Scan::Out;

        for i in 0..count {
            let lump_name = archive.lumps.get_at(i).unwrap().name.clone();

            state = match state {
                Scan::Out => {
                    if (lump_name == "THINGS" || lump_name == "TEXTMAP") && i > 0 {
                        let marker = archive.lumps.get_at(i - 1).unwrap().name.clone();
                        archive.lumps.get_at_mut(i - 1).unwrap().used = true;
                        archive.lumps.get_at_mut(i).unwrap().used = true;
                        let format = if lump_name == "TEXTMAP" {
                            MapFormat::Udmf
                        } else {
                            MapFormat::Doom
                        };
                        Scan::In {
                            name: marker,
                            start: i,
                            format,
                        }
                    } else {
                        Scan::Out
                    }
                }

                Scan::In {
                    name,
                    start,
                    format: MapFormat::Udmf,
                } => {
                    archive.lumps.get_at_mut(i).unwrap().used = true;
                    if lump_name == "ENDMAP" {
                        self.emit(name, MapFormat::Udmf, archive_id, &source, start, i + 1, log);
                        Scan::Out
                    } else {
                        Scan::In {
                            name,
                            start,
                            format: MapFormat::Udmf,
                        }
                    }
                }

                Scan::In {
                    name,
                    start,
                    format,
                } => {
                    if MAP_LUMP_NAMES.contains(&lump_name.as_str()) {
                        archive.lumps.get_at_mut(i).unwrap().used = true;
                        let format = if lump_name == "BEHAVIOR" {
                            MapFormat::Hexen
                        } else {
                            format
                        };
                        if i + 1 == count {
                            self.emit(name, format, archive_id, &source, start, i + 1, log);
                            Scan::Out
                        } else {
                            Scan::In {
                                name,
                                start,
                                format,
                            }
                        }
                    } else {
                        // first foreign lump ends the run and stays unclaimed
                        self.emit(name, format, archive_id, &source, start, i, log);
                        Scan::Out
                    }
                }
            };
        }

        // a run still open at end-of-archive ends with it
        if let Scan::In {
            name,
            start,
            format,
        } = state
        {
            self.emit(name, format, archive_id, &source, start, count, log);
        }

        log::info!("{:5} maps in {}", self.maps.len() - before, source);
    }

    fn emit(
        &mut self,
        name: String,
        format: MapFormat,
        archive_id: usize,
        source: &str,
        start: usize,
        end: usize,
        log: &mut DuplicateLog,
    ) {
        if let Some(existing) = self.maps.get(&name) {
            log.record(
                DuplicateKind::Overwrite,
                "map",
                format!("{}:{}", existing.archive, existing.name),
                format!("{}:{}", source, name),
            );
        }
        log::debug!("map {name}: {format:?}, lumps {start}..{end}");
        self.maps.update(
            name.clone(),
            MapMarker {
                name,
                format,
                archive_id,
                archive: source.to_owned(),
                start,
                end,
            },
        );
    }

    /// Ascending by map name.
    pub fn sort(&mut self) {
        self.maps.sort();
    }

    /// Emit every map: a fresh zero-length marker, then the recorded lump
    /// range copied from its source archive.
    pub fn write_to(&self, out: &mut Archive, archives: &[Archive]) {
        for marker in self.maps.iter() {
            out.add_lump(Lump::marker(&marker.name));
            let src = &archives[marker.archive_id];
            for i in marker.start..marker.end {
                if let Some(lump) = src.lumps.get_at(i) {
                    out.add_lump(lump.clone());
                }
            }
        }
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
