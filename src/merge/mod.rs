//! Merge orchestration.
//!
//! For every input archive the typed readers run in a fixed order —
//! textures, animations, maps, text, namespaces — each claiming the lumps
//! it understands.  Whatever is left becomes a loose lump.  After the last
//! input the patch table is renumbered, optional pruning and sorting run,
//! and the output archive is assembled section by section:
//!
//! ```text
//! loose | text | ANIMATED+SWITCHES | TEXTURE1+PNAMES | maps | namespaces
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::anim::{AnimError, AnimationTable};
use crate::map::MapTable;
use crate::namespace::NamespaceTable;
use crate::report::DuplicateLog;
use crate::text::TextTable;
use crate::texture::{TextureError, TextureTable};
use crate::wad::{Archive, WadError, WadKind};

/// Everything the driver lets the caller decide.
#[derive(Clone, Debug)]
pub struct MergeOptions {
    /// Drop PP lumps no merged texture references.
    pub filter_patches: bool,
    /// Concatenate whitelisted text lumps instead of treating them loose.
    pub merge_text: bool,
    pub sort_namespaces: bool,
    pub sort_maps: bool,
    pub sort_textures: bool,
    pub sort_text: bool,
    pub sort_loose: bool,
    /// Where to write the duplicate report, if anywhere.
    pub report_path: Option<PathBuf>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            filter_patches: true,
            merge_text: true,
            sort_namespaces: true,
            sort_maps: true,
            sort_textures: false,
            sort_text: true,
            sort_loose: false,
            report_path: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum MergeError {
    #[error(transparent)]
    Wad(#[from] WadError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error(transparent)]
    Anim(#[from] AnimError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The merge driver.  Feed it archives with [`Merger::add_file`], then
/// call [`Merger::finish`] once to emit the combined output.
pub struct Merger {
    options: MergeOptions,
    archives: Vec<Archive>,
    textures: TextureTable,
    animations: AnimationTable,
    maps: MapTable,
    text: TextTable,
    namespaces: NamespaceTable,
    log: DuplicateLog,
}

impl Merger {
    pub fn new(options: MergeOptions) -> Self {
        Self {
            options,
            archives: Vec::new(),
            textures: TextureTable::new(),
            animations: AnimationTable::new(),
            maps: MapTable::new(),
            text: TextTable::new(),
            namespaces: NamespaceTable::new(),
            log: DuplicateLog::new(),
        }
    }

    /// Archives ingested so far (skipped inputs excluded).
    pub fn archive_count(&self) -> usize {
        self.archives.len()
    }

    pub fn duplicates(&self) -> &DuplicateLog {
        &self.log
    }

    /// Load and ingest one input.  A file that is not a readable WAD
    /// (bad magic, corrupt directory) is logged and skipped; plain I/O
    /// failures abort the merge.  Returns whether the input was taken.
    pub fn add_file(&mut self, path: &Path) -> Result<bool, MergeError> {
        let archive = match Archive::open(path) {
            Ok(archive) => archive,
            Err(err @ WadError::Io(_)) => return Err(err.into()),
            Err(err) => {
                log::warn!("skipping {}: {err}", path.display());
                return Ok(false);
            }
        };
        self.ingest(archive)?;
        Ok(true)
    }

    fn ingest(&mut self, mut archive: Archive) -> Result<(), MergeError> {
        let id = self.archives.len();
        log::info!("adding {}", archive.basename());

        let mut incoming = TextureTable::new();
        incoming.read_from(&mut archive)?;
        self.textures.merge_with(incoming, &mut self.log);

        self.animations.read_from(&mut archive, &mut self.log)?;
        self.maps.read_from(&mut archive, id, &mut self.log);
        if self.options.merge_text {
            self.text.read_from(&mut archive, &mut self.log);
        }
        self.namespaces.read_from(&mut archive, &mut self.log);

        self.archives.push(archive);
        Ok(())
    }

    /// Renumber, prune, sort, assemble, and write the output archive,
    /// plus the duplicate report when configured.
    pub fn finish(&mut self, output: &Path) -> Result<(), MergeError> {
        self.textures.update_patch_names();
        if self.options.filter_patches {
            self.namespaces.retain_patches(self.textures.patch_names());
        }

        if self.options.sort_namespaces {
            self.namespaces.sort();
        }
        if self.options.sort_loose {
            self.namespaces.sort_loose();
        }
        if self.options.sort_maps {
            self.maps.sort();
        }
        if self.options.sort_textures {
            self.textures.sort();
        }
        if self.options.sort_text {
            self.text.sort();
        }

        // merging an IWAD yields an IWAD; pure add-on merges stay PWAD
        let kind = if self.archives.iter().any(|a| a.kind() == WadKind::Iwad) {
            WadKind::Iwad
        } else {
            WadKind::Pwad
        };
        let mut out = Archive::new(kind);

        self.namespaces.write_loose_to(&mut out);
        self.text.write_to(&mut out);
        self.animations.write_to(&mut out)?;
        self.textures.write_to(&mut out)?;
        self.maps.write_to(&mut out, &self.archives);
        self.namespaces.write_to(&mut out);

        out.save(output)?;
        log::info!("{:5} lumps written to {}", out.len(), output.display());

        if let Some(report) = &self.options.report_path {
            let mut file = BufWriter::new(File::create(report)?);
            self.log.write_report(&mut file)?;
            file.flush()?;
            log::info!(
                "{:5} duplicates reported to {}",
                self.log.len(),
                report.display()
            );
        }
        Ok(())
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::wad::Lump;
    use std::fs;

    fn write_wad(dir: &Path, name: &str, lumps: &[(&str, &[u8])]) -> PathBuf {
        let mut wad = Archive::new(WadKind::Pwad);
        for (lump_name, data) in lumps {
            wad.add_lump(Lump::new(*lump_name, data.to_vec()));
        }
        let path = dir.join(name);
        wad.save(&path).unwrap();
        path
    }

    fn animated(records: &[(u8, &str, &str, u32)]) -> Vec<u8> {
        let mut buf = Vec::new();
        for (kind, last, first, speed) in records {
            buf.push(*kind);
            for name in [last, first] {
                let mut raw = [0u8; 9];
                raw[..name.len()].copy_from_slice(name.as_bytes());
                buf.extend_from_slice(&raw);
            }
            buf.extend(speed.to_le_bytes());
        }
        buf.push(0xFF);
        buf.extend_from_slice(&[0u8; 22]);
        buf
    }

    #[test]
    fn output_sections_come_in_fixed_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_wad(
            dir.path(),
            "a.wad",
            &[
                ("CREDITS", b"gfx"),
                ("DECORATE", b"actor A {}"),
                ("ANIMATED", &animated(&[(0, "BLODGR4", "BLODGR1", 8)])),
                ("MAP01", b""),
                ("THINGS", b"\x01"),
                ("LINEDEFS", b"\x02"),
            ],
        );
        let b = write_wad(
            dir.path(),
            "b.wad",
            &[("SS_START", b""), ("TROOA1", b"spr"), ("S_END", b"")],
        );

        let mut merger = Merger::new(MergeOptions::default());
        assert!(merger.add_file(&a).unwrap());
        assert!(merger.add_file(&b).unwrap());

        let out_path = dir.path().join("merged.wad");
        merger.finish(&out_path).unwrap();

        let out = Archive::open(&out_path).unwrap();
        let names: Vec<String> = (0..out.len())
            .map(|i| out.lumps.get_at(i).unwrap().name.clone())
            .collect();
        assert_eq!(
            names,
            vec![
                "CREDITS", "DECORATE", "ANIMATED", "MAP01", "THINGS", "LINEDEFS", "SS_START",
                "TROOA1", "S_END"
            ]
        );
        assert_eq!(out.kind(), WadKind::Pwad);
    }

    #[test]
    fn unreadable_input_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.wad");
        fs::write(&bogus, b"JUNKJUNKJUNKJUNK").unwrap();
        let good = write_wad(dir.path(), "good.wad", &[("MUSIC", b"m")]);

        let mut merger = Merger::new(MergeOptions::default());
        assert!(!merger.add_file(&bogus).unwrap());
        assert!(merger.add_file(&good).unwrap());
        assert_eq!(merger.archive_count(), 1);
    }

    #[test]
    fn missing_input_is_fatal() {
        let mut merger = Merger::new(MergeOptions::default());
        let err = merger.add_file(Path::new("/nonexistent/nope.wad"));
        assert!(matches!(err, Err(MergeError::Wad(WadError::Io(_)))));
    }

    #[test]
    fn same_inputs_same_options_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_wad(
            dir.path(),
            "a.wad",
            &[("DECORATE", b"actor A {}"), ("MUSIC", b"m1")],
        );
        let b = write_wad(
            dir.path(),
            "b.wad",
            &[("DECORATE", b"actor B {}"), ("MUSIC", b"m2")],
        );

        let out1 = dir.path().join("one.wad");
        let out2 = dir.path().join("two.wad");
        for out in [&out1, &out2] {
            let mut merger = Merger::new(MergeOptions::default());
            merger.add_file(&a).unwrap();
            merger.add_file(&b).unwrap();
            merger.finish(out).unwrap();
        }
        assert_eq!(fs::read(&out1).unwrap(), fs::read(&out2).unwrap());
    }

    #[test]
    fn report_file_is_written_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_wad(dir.path(), "a.wad", &[("DECORATE", b"A")]);
        let b = write_wad(dir.path(), "b.wad", &[("DECORATE", b"B")]);
        let report = dir.path().join("dups.txt");

        let mut merger = Merger::new(MergeOptions {
            report_path: Some(report.clone()),
            ..Default::default()
        });
        merger.add_file(&a).unwrap();
        merger.add_file(&b).unwrap();
        merger.finish(&dir.path().join("merged.wad")).unwrap();

        let text = fs::read_to_string(&report).unwrap();
        assert!(text.contains("merge text lump"));
        assert!(text.contains("a.wad:DECORATE"));
        assert!(text.contains("b.wad:DECORATE"));
    }

    #[test]
    fn iwad_input_makes_iwad_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut iwad = Archive::new(WadKind::Iwad);
        iwad.add_lump(Lump::new("MUSIC", b"m".to_vec()));
        let a = dir.path().join("base.wad");
        iwad.save(&a).unwrap();
        let b = write_wad(dir.path(), "mod.wad", &[("MUSIC2", b"n")]);

        let mut merger = Merger::new(MergeOptions::default());
        merger.add_file(&a).unwrap();
        merger.add_file(&b).unwrap();
        let out_path = dir.path().join("merged.wad");
        merger.finish(&out_path).unwrap();
        assert_eq!(Archive::open(&out_path).unwrap().kind(), WadKind::Iwad);
    }
}
