//! Boom ANIMATED and SWITCHES tables.
//!
//! Neither lump is length-prefixed; both are flat runs of fixed-size
//! records ended by a sentinel:
//!
//! ```text
//! ANIMATED   23 bytes: kind:u8  last[9]  first[9]  speed:u32
//!            terminated by a record whose first byte is 0xFF
//! SWITCHES   20 bytes: off[9]  on[9]  iwad:u16
//!            terminated by a record whose iwad selector is 0
//! ```
//!
//! Merging deduplicates by texture-name key — (last, first) for
//! animations, (off, on) for switches.  A later record under an existing
//! key replaces it and leaves a duplicate record.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor};
use thiserror::Error;

use crate::orderedmap::OrderedMap;
use crate::report::{DuplicateKind, DuplicateLog};
use crate::wad::name::{read_name, write_name};
use crate::wad::{Archive, Lump};

#[derive(Error, Debug)]
pub enum AnimError {
    /// Reader hit end-of-lump before the sentinel record.
    #[error("{0} lump ends without a terminator record")]
    Unterminated(&'static str),
}

/// One animation cycle: everything between `first` and `last` animates.
#[derive(Clone, Debug)]
pub struct AnimateDef {
    /// 0 = wall texture, 1 = flat.
    pub kind: u8,
    pub last: String,
    pub first: String,
    /// Frame duration in game tics.
    pub speed: u32,
    pub source: String,
}

/// One switch pair plus the IWAD it belongs to (1, 2 or 3).
#[derive(Clone, Debug)]
pub struct SwitchDef {
    pub off: String,
    pub on: String,
    pub iwad: u16,
    pub source: String,
}

/// Merged ANIMATED + SWITCHES content.
#[derive(Default)]
pub struct AnimationTable {
    animations: OrderedMap<AnimateDef>,
    switches: OrderedMap<SwitchDef>,
}

impl AnimationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty() && self.switches.is_empty()
    }

    pub fn animations(&self) -> impl Iterator<Item = &AnimateDef> {
        self.animations.iter()
    }

    pub fn switches(&self) -> impl Iterator<Item = &SwitchDef> {
        self.switches.iter()
    }

    /// Read and claim ANIMATED and SWITCHES from `archive`, if present.
    pub fn read_from(
        &mut self,
        archive: &mut Archive,
        log: &mut DuplicateLog,
    ) -> Result<(), AnimError> {
        let source = archive.basename();

        if let Some(pos) = archive.lumps.index_of("ANIMATED") {
            let data = archive.lumps.get_at(pos).unwrap().data.clone();
            self.read_animated(&data, &source, log)?;
            archive.lumps.get_at_mut(pos).unwrap().used = true;
        }
        if let Some(pos) = archive.lumps.index_of("SWITCHES") {
            let data = archive.lumps.get_at(pos).unwrap().data.clone();
            self.read_switches(&data, &source, log)?;
            archive.lumps.get_at_mut(pos).unwrap().used = true;
        }
        Ok(())
    }

    fn read_animated(
        &mut self,
        data: &[u8],
        source: &str,
        log: &mut DuplicateLog,
    ) -> Result<(), AnimError> {
        let trunc = |_: io::Error| AnimError::Unterminated("ANIMATED");

        let mut cur = Cursor::new(data);
        loop {
            let kind = cur.read_u8().map_err(trunc)?;
            if kind == 0xFF {
                break;
            }
            let last = read_name::<9>(&mut cur).map_err(trunc)?;
            let first = read_name::<9>(&mut cur).map_err(trunc)?;
            let speed = cur.read_u32::<LE>().map_err(trunc)?;

            let key = format!("{last}/{first}");
            let def = AnimateDef {
                kind,
                last,
                first,
                speed,
                source: source.to_owned(),
            };
            if let Some(existing) = self.animations.get(&key) {
                log.record(
                    DuplicateKind::Overwrite,
                    "animation",
                    format!("{}:{}", existing.source, existing.first),
                    format!("{}:{}", def.source, def.first),
                );
            }
            self.animations.update(key, def);
        }
        Ok(())
    }

    fn read_switches(
        &mut self,
        data: &[u8],
        source: &str,
        log: &mut DuplicateLog,
    ) -> Result<(), AnimError> {
        let trunc = |_: io::Error| AnimError::Unterminated("SWITCHES");

        let mut cur = Cursor::new(data);
        loop {
            let off = read_name::<9>(&mut cur).map_err(trunc)?;
            let on = read_name::<9>(&mut cur).map_err(trunc)?;
            let iwad = cur.read_u16::<LE>().map_err(trunc)?;
            if iwad == 0 {
                break;
            }

            let key = format!("{off}/{on}");
            let def = SwitchDef {
                off,
                on,
                iwad,
                source: source.to_owned(),
            };
            if let Some(existing) = self.switches.get(&key) {
                log.record(
                    DuplicateKind::Overwrite,
                    "switch",
                    format!("{}:{}", existing.source, existing.off),
                    format!("{}:{}", def.source, def.off),
                );
            }
            self.switches.update(key, def);
        }
        Ok(())
    }

    /// Emit ANIMATED and SWITCHES lumps (each only if non-empty), with
    /// their zero-filled sentinel records appended.
    pub fn write_to(&self, out: &mut Archive) -> io::Result<()> {
        if !self.animations.is_empty() {
            let mut buf = Vec::new();
            for def in self.animations.iter() {
                buf.write_u8(def.kind)?;
                write_name::<9>(&mut buf, &def.last)?;
                write_name::<9>(&mut buf, &def.first)?;
                buf.write_u32::<LE>(def.speed)?;
            }
            buf.write_u8(0xFF)?;
            buf.extend_from_slice(&[0u8; 22]);
            out.add_lump(Lump::new("ANIMATED", buf));
        }

        if !self.switches.is_empty() {
            let mut buf = Vec::new();
            for def in self.switches.iter() {
                write_name::<9>(&mut buf, &def.off)?;
                write_name::<9>(&mut buf, &def.on)?;
                buf.write_u16::<LE>(def.iwad)?;
            }
            buf.extend_from_slice(&[0u8; 20]);
            out.add_lump(Lump::new("SWITCHES", buf));
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
    use crate::wad::WadKind;

    fn animated_lump(records: &[(u8, &str, &str, u32)]) -> Vec<u8> {
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

    fn switches_lump(records: &[(&str, &str, u16)]) -> Vec<u8> {
        let mut buf = Vec::new();
        for (off, on, iwad) in records {
            for name in [off, on] {
                let mut raw = [0u8; 9];
                raw[..name.len()].copy_from_slice(name.as_bytes());
                buf.extend_from_slice(&raw);
            }
            buf.extend(iwad.to_le_bytes());
        }
        buf.extend_from_slice(&[0u8; 20]);
        buf
    }

    fn archive_with(lumps: Vec<(&str, Vec<u8>)>) -> Archive {
        let mut wad = Archive::new(WadKind::Pwad);
        for (name, data) in lumps {
            wad.add_lump(Lump::new(name, data));
        }
        wad
    }

    #[test]
    fn reads_until_sentinel() {
        let mut wad = archive_with(vec![
            ("ANIMATED", animated_lump(&[(0, "SLADRIP3", "SLADRIP1", 8)])),
            ("SWITCHES", switches_lump(&[("SW1BRN1", "SW2BRN1", 1)])),
        ]);
        let mut table = AnimationTable::new();
        table.read_from(&mut wad, &mut DuplicateLog::new()).unwrap();

        let anim: Vec<&AnimateDef> = table.animations().collect();
        assert_eq!(anim.len(), 1);
        assert_eq!(anim[0].first, "SLADRIP1");
        assert_eq!(anim[0].speed, 8);

        let sw: Vec<&SwitchDef> = table.switches().collect();
        assert_eq!(sw.len(), 1);
        assert_eq!(sw[0].iwad, 1);
        assert!(wad.lumps.get_at(0).unwrap().used);
        assert!(wad.lumps.get_at(1).unwrap().used);
    }

    #[test]
    fn missing_sentinel_is_fatal() {
        // a single record with no terminator behind it
        let mut data = animated_lump(&[(1, "NUKAGE3", "NUKAGE1", 8)]);
        data.truncate(23);
        let mut wad = archive_with(vec![("ANIMATED", data)]);
        let mut table = AnimationTable::new();
        let err = table
            .read_from(&mut wad, &mut DuplicateLog::new())
            .unwrap_err();
        assert!(matches!(err, AnimError::Unterminated("ANIMATED")));
    }

    #[test]
    fn same_cycle_overwrites_and_records() {
        // identical (first, last), different speed
        let mut wad1 = archive_with(vec![(
            "ANIMATED",
            animated_lump(&[(0, "SLADRIP3", "SLADRIP1", 8)]),
        )]);
        let mut wad2 = archive_with(vec![(
            "ANIMATED",
            animated_lump(&[(0, "SLADRIP3", "SLADRIP1", 16)]),
        )]);
        let mut table = AnimationTable::new();
        let mut log = DuplicateLog::new();
        table.read_from(&mut wad1, &mut log).unwrap();
        table.read_from(&mut wad2, &mut log).unwrap();

        let anim: Vec<&AnimateDef> = table.animations().collect();
        assert_eq!(anim.len(), 1);
        assert_eq!(anim[0].speed, 16, "later record wins");
        assert_eq!(log.len(), 1);
        assert_eq!(log.records()[0].label, "animation");
    }

    #[test]
    fn switch_key_ignores_iwad_selector() {
        let mut wad1 = archive_with(vec![(
            "SWITCHES",
            switches_lump(&[("SW1STON1", "SW2STON1", 1)]),
        )]);
        let mut wad2 = archive_with(vec![(
            "SWITCHES",
            switches_lump(&[("SW1STON1", "SW2STON1", 3)]),
        )]);
        let mut table = AnimationTable::new();
        let mut log = DuplicateLog::new();
        table.read_from(&mut wad1, &mut log).unwrap();
        table.read_from(&mut wad2, &mut log).unwrap();

        let sw: Vec<&SwitchDef> = table.switches().collect();
        assert_eq!(sw.len(), 1);
        assert_eq!(sw[0].iwad, 3);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut wad = archive_with(vec![
            (
                "ANIMATED",
                animated_lump(&[(0, "BLODGR4", "BLODGR1", 8), (1, "NUKAGE3", "NUKAGE1", 12)]),
            ),
            ("SWITCHES", switches_lump(&[("SW1BRN1", "SW2BRN1", 2)])),
        ]);
        let mut table = AnimationTable::new();
        table.read_from(&mut wad, &mut DuplicateLog::new()).unwrap();

        let mut out = Archive::new(WadKind::Pwad);
        table.write_to(&mut out).unwrap();
        assert_eq!(out.find("ANIMATED").unwrap().size(), 23 * 3);
        assert_eq!(out.find("SWITCHES").unwrap().size(), 20 * 2);

        let mut back = AnimationTable::new();
        back.read_from(&mut out, &mut DuplicateLog::new()).unwrap();
        assert_eq!(back.animations().count(), 2);
        assert_eq!(back.switches().count(), 1);
    }
}
