//! Doom-format WAD container.
//!
//! * Reads an entire WAD into RAM; every lump's bytes are materialized so
//!   the merge tables get full random access.
//! * Writes a fresh WAD with lump data packed from byte 12 and the
//!   directory recomputed behind it.
//!
//! Both `IWAD` and `PWAD` magics are accepted.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::{
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::orderedmap::OrderedMap;
use crate::wad::lump::{Lump, SourceRef};
use crate::wad::name::{unpack_name, write_name};

/// Size (in bytes) of one directory entry.
const DIR_ENTRY_SIZE: usize = 16;

/// Size (in bytes) of the header.
const HEADER_SIZE: usize = 12;

/// Header tag of an archive.  Structurally the two kinds are identical.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WadKind {
    Iwad,
    Pwad,
}

impl WadKind {
    pub fn magic(self) -> &'static [u8; 4] {
        match self {
            WadKind::Iwad => b"IWAD",
            WadKind::Pwad => b"PWAD",
        }
    }

    fn from_magic(magic: &[u8; 4]) -> Option<Self> {
        match magic {
            b"IWAD" => Some(WadKind::Iwad),
            b"PWAD" => Some(WadKind::Pwad),
            _ => None,
        }
    }
}

/// Errors encountered while opening, parsing, or writing a WAD.
#[derive(Error, Debug)]
pub enum WadError {
    /// Underlying I/O failure, propagated unchanged.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Header magic is neither `IWAD` nor `PWAD`.
    #[error("not a WAD file (bad magic)")]
    InvalidFormat,

    /// Directory claims to extend past end-of-file.
    #[error("corrupt WAD: directory {dir_offset}+{dir_len} past end of file ({file_size})")]
    CorruptHeader {
        dir_offset: u32,
        dir_len: usize,
        file_size: usize,
    },

    /// A directory entry points outside the file.
    #[error("corrupt WAD: lump {name} (# {index}) slice {offset}+{size} past EOF ({file_size})")]
    LumpOutOfBounds {
        index: usize,
        name: String,
        offset: u32,
        size: u32,
        file_size: usize,
    },
}

/// A WAD resident in memory: kind tag plus an ordered lump list.
pub struct Archive {
    kind: WadKind,
    path: PathBuf,
    pub lumps: OrderedMap<Lump>,
}

impl Archive {
    /// An empty archive with a declared kind, to be filled with
    /// [`Archive::add_lump`] and serialized with [`Archive::save`].
    pub fn new(kind: WadKind) -> Self {
        Self {
            kind,
            path: PathBuf::new(),
            lumps: OrderedMap::new(),
        }
    }

    /// Load a WAD from disk, fully materialized.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WadError> {
        let path = path.as_ref();
        let mut file = File::open(path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        let kind = WadKind::from_magic(&magic).ok_or(WadError::InvalidFormat)?;

        let num_lumps = file.read_u32::<LE>()?;
        let dir_offset = file.read_u32::<LE>()?;

        // read the rest of the file in one go; the header is already consumed
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let file_size = bytes.len() + HEADER_SIZE;

        let dir_len = num_lumps as usize * DIR_ENTRY_SIZE;
        let dir_end = dir_offset as usize + dir_len;
        if (dir_offset as usize) < HEADER_SIZE || dir_end > file_size {
            return Err(WadError::CorruptHeader {
                dir_offset,
                dir_len,
                file_size,
            });
        }

        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut lumps = OrderedMap::new();
        let mut cur = &bytes[dir_offset as usize - HEADER_SIZE..dir_end - HEADER_SIZE];

        for index in 0..num_lumps as usize {
            let offset = cur.read_u32::<LE>()?;
            let size = cur.read_u32::<LE>()?;
            let mut raw_name = [0u8; 8];
            cur.read_exact(&mut raw_name)?;
            let name = unpack_name(&raw_name);

            let start = offset as usize;
            let end = start + size as usize;
            if start < HEADER_SIZE && size > 0 || end > file_size {
                return Err(WadError::LumpOutOfBounds {
                    index,
                    name,
                    offset,
                    size,
                    file_size,
                });
            }

            let data = if size == 0 {
                Vec::new()
            } else {
                bytes[start - HEADER_SIZE..end - HEADER_SIZE].to_vec()
            };

            let mut lump = Lump::new(name.clone(), data);
            lump.source = Some(SourceRef {
                archive: basename.clone(),
                index,
            });
            lumps.add(name, lump);
        }

        log::debug!("{}: {} lumps, {:?}", path.display(), lumps.len(), kind);

        Ok(Self {
            kind,
            path: path.to_path_buf(),
            lumps,
        })
    }

    pub fn kind(&self) -> WadKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Basename of the file this archive was read from.
    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Append a lump.  The sole mutation an archive supports after
    /// construction.
    pub fn add_lump(&mut self, lump: Lump) {
        self.lumps.add(lump.name.clone(), lump);
    }

    /// Latest lump under `name`, if any.
    pub fn find(&self, name: &str) -> Option<&Lump> {
        self.lumps.get(name)
    }

    pub fn len(&self) -> usize {
        self.lumps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lumps.is_empty()
    }

    /// Serialize: header, lump data packed from byte 12 in insertion
    /// order, then the directory.  Offsets are recomputed from scratch and
    /// the header carries the actual number of lumps written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), WadError> {
        let mut out = BufWriter::new(File::create(path.as_ref())?);

        let total_data: usize = self.lumps.iter().map(Lump::size).sum();
        let dir_offset = (HEADER_SIZE + total_data) as u32;

        out.write_all(self.kind.magic())?;
        out.write_u32::<LE>(self.lumps.len() as u32)?;
        out.write_u32::<LE>(dir_offset)?;

        for lump in self.lumps.iter() {
            out.write_all(&lump.data)?;
        }

        let mut offset = HEADER_SIZE as u32;
        for lump in self.lumps.iter() {
            out.write_u32::<LE>(offset)?;
            out.write_u32::<LE>(lump.size() as u32)?;
            write_name::<8>(&mut out, &lump.name)?;
            offset += lump.size() as u32;
        }

        out.flush()?;
        Ok(())
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
