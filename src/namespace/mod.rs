//! Namespace partitioning.
//!
//! Sprites, flats, patches and friends live between zero-length
//! `<NAME>_START` / `<NAME>_END` bracket lumps.  IWADs and PWADs
//! historically used different prefixes for the same logical namespace, so
//! incoming names are folded through a fixed alias table before grouping:
//!
//! ```text
//! F, F1, F2, F3 -> FF      S -> SS      P, P1, P2, P3 -> PP
//! ```
//!
//! Anything not claimed by a typed reader and not inside a bracket pair
//! lands in the loose bucket and is emitted at the very front of the
//! output archive.

use std::collections::HashSet;

use crate::orderedmap::OrderedMap;
use crate::report::{DuplicateKind, DuplicateLog};
use crate::wad::{Archive, Lump};

/// Fold a raw marker prefix onto its canonical namespace name.  Already
/// canonical and unknown prefixes pass through unchanged.
fn fold_alias(raw: &str) -> &str {
    match raw {
        "F" | "F1" | "F2" | "F3" | "FF" => "FF",
        "S" | "SS" => "SS",
        "P" | "P1" | "P2" | "P3" | "PP" => "PP",
        other => other,
    }
}

/// The engine reads the short end markers for sprites and flats; keep
/// emitting those for vanilla compatibility.
fn end_marker(namespace: &str) -> String {
    match namespace {
        "SS" => "S_END".to_owned(),
        "FF" => "F_END".to_owned(),
        other => format!("{other}_END"),
    }
}

/// A bracketed group of lumps, keyed by lump name.
pub struct Namespace {
    pub name: String,
    pub lumps: OrderedMap<Lump>,
}

/// Namespaced lumps plus the loose bucket.
#[derive(Default)]
pub struct NamespaceTable {
    namespaces: OrderedMap<Namespace>,
    loose: OrderedMap<Lump>,
}

/// Shared collision policy: identical bytes keep the existing lump
/// silently, differing bytes overwrite it and leave a record.
fn insert_lump(
    map: &mut OrderedMap<Lump>,
    lump: Lump,
    label: &'static str,
    log: &mut DuplicateLog,
) {
    match map.get(&lump.name) {
        None => map.add(lump.name.clone(), lump),
        Some(existing) if existing.data == lump.data => {}
        Some(existing) => {
            log.record(
                DuplicateKind::Overwrite,
                label,
                existing.full_name(),
                lump.full_name(),
            );
            map.update(lump.name.clone(), lump);
        }
    }
}

impl NamespaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    pub fn loose(&self) -> &OrderedMap<Lump> {
        &self.loose
    }

    /// Partition every still-unclaimed lump of `archive`.  This is the
    /// last reader in the per-archive chain, so it consumes the rest.
    pub fn read_from(&mut self, archive: &mut Archive, log: &mut DuplicateLog) {
        let mut open: Option<String> = None;

        for i in 0..archive.lumps.len() {
            let (name, size, used) = {
                let lump = archive.lumps.get_at(i).unwrap();
                (lump.name.clone(), lump.size(), lump.used)
            };
            if used {
                continue;
            }

            if size == 0 && name.ends_with("_START") {
                let raw = &name[..name.len() - "_START".len()];
                let folded = fold_alias(raw).to_owned();
                if !self.namespaces.contains(&folded) {
                    self.namespaces.add(
                        folded.clone(),
                        Namespace {
                            name: folded.clone(),
                            lumps: OrderedMap::new(),
                        },
                    );
                }
                open = Some(folded);
                archive.lumps.get_at_mut(i).unwrap().used = true;
                continue;
            }

            // any end marker closes the open namespace, prefix unchecked;
            // with nothing open it is just another loose lump
            if size == 0 && name.ends_with("_END") && open.is_some() {
                open = None;
                archive.lumps.get_at_mut(i).unwrap().used = true;
                continue;
            }

            let lump = {
                let lump = archive.lumps.get_at_mut(i).unwrap();
                lump.used = true;
                lump.clone()
            };
            match &open {
                Some(ns_name) => {
                    if let Some(ns) = self.namespaces.get_mut(ns_name) {
                        insert_lump(&mut ns.lumps, lump, "namespace lump", log);
                    }
                }
                None => insert_lump(&mut self.loose, lump, "loose lump", log),
            }
        }

        if let Some(ns_name) = open {
            log::warn!(
                "{}: namespace {} is missing its end marker",
                archive.basename(),
                ns_name
            );
        }
    }

    /// Drop every PP lump whose name is not in the live patch-name list.
    pub fn retain_patches(&mut self, live: &[String]) {
        let keep: HashSet<&str> = live.iter().map(String::as_str).collect();
        if let Some(ns) = self.namespaces.get_mut("PP") {
            let before = ns.lumps.len();
            ns.lumps.retain(|name, _| keep.contains(name));
            let dropped = before - ns.lumps.len();
            if dropped > 0 {
                log::info!("{dropped:5} unreferenced patches pruned");
            }
        }
    }

    /// Sort the namespace list and each namespace's members by name.
    pub fn sort(&mut self) {
        self.namespaces.sort();
        for ns in self.namespaces.iter_mut() {
            ns.lumps.sort();
        }
    }

    pub fn sort_loose(&mut self) {
        self.loose.sort();
    }

    /// Loose lumps go at the very front of the output, unbracketed.
    pub fn write_loose_to(&self, out: &mut Archive) {
        for lump in self.loose.iter() {
            out.add_lump(lump.clone());
        }
    }

    /// Every non-empty namespace: start marker, members, end marker.
    pub fn write_to(&self, out: &mut Archive) {
        for ns in self.namespaces.iter() {
            if ns.lumps.is_empty() {
                continue;
            }
            out.add_lump(Lump::marker(format!("{}_START", ns.name)));
            for lump in ns.lumps.iter() {
                out.add_lump(lump.clone());
            }
            out.add_lump(Lump::marker(end_marker(&ns.name)));
        }
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::wad::WadKind;

    fn archive_with(lumps: &[(&str, &[u8])]) -> Archive {
        let mut wad = Archive::new(WadKind::Pwad);
        for (name, data) in lumps {
            wad.add_lump(Lump::new(*name, data.to_vec()));
        }
        wad
    }

    fn output_names(out: &Archive) -> Vec<String> {
        (0..out.len())
            .map(|i| out.lumps.get_at(i).unwrap().name.clone())
            .collect()
    }

    #[test]
    fn sprite_namespace_round_trips_with_short_end_marker() {
        let mut wad = archive_with(&[("SS_START", b""), ("SPRITE1", b"gfx"), ("S_END", b"")]);
        let mut table = NamespaceTable::new();
        table.read_from(&mut wad, &mut DuplicateLog::new());

        assert_eq!(table.get("SS").unwrap().lumps.len(), 1);
        assert!(table.loose().is_empty());

        let mut out = Archive::new(WadKind::Pwad);
        table.write_to(&mut out);
        assert_eq!(output_names(&out), vec!["SS_START", "SPRITE1", "S_END"]);
    }

    #[test]
    fn aliased_prefixes_fold_into_one_namespace() {
        let mut wad1 = archive_with(&[("F_START", b""), ("FLAT1", b"a"), ("F_END", b"")]);
        let mut wad2 = archive_with(&[("FF_START", b""), ("FLAT2", b"b"), ("FF_END", b"")]);
        let mut table = NamespaceTable::new();
        let mut log = DuplicateLog::new();
        table.read_from(&mut wad1, &mut log);
        table.read_from(&mut wad2, &mut log);

        let ff = table.get("FF").unwrap();
        assert_eq!(ff.lumps.len(), 2);
        assert!(table.get("F").is_none());

        let mut out = Archive::new(WadKind::Pwad);
        table.write_to(&mut out);
        assert_eq!(
            output_names(&out),
            vec!["FF_START", "FLAT1", "FLAT2", "F_END"]
        );
    }

    #[test]
    fn any_end_marker_closes_the_open_namespace() {
        let mut wad = archive_with(&[("P1_START", b""), ("PATCH1", b"p"), ("WRONG_END", b"")]);
        let mut table = NamespaceTable::new();
        table.read_from(&mut wad, &mut DuplicateLog::new());
        assert_eq!(table.get("PP").unwrap().lumps.len(), 1);
        assert!(table.loose().is_empty());
    }

    #[test]
    fn differing_content_overwrites_and_records() {
        let mut wad1 = archive_with(&[("S_START", b""), ("TROOA1", b"old"), ("S_END", b"")]);
        let mut wad2 = archive_with(&[("S_START", b""), ("TROOA1", b"new"), ("S_END", b"")]);
        let mut table = NamespaceTable::new();
        let mut log = DuplicateLog::new();
        table.read_from(&mut wad1, &mut log);
        table.read_from(&mut wad2, &mut log);

        let ss = table.get("SS").unwrap();
        assert_eq!(ss.lumps.len(), 1);
        assert_eq!(ss.lumps.get("TROOA1").unwrap().data, b"new");
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn identical_content_is_kept_silently() {
        let mut wad1 = archive_with(&[("PLAYPAL", b"pal")]);
        let mut wad2 = archive_with(&[("PLAYPAL", b"pal")]);
        let mut table = NamespaceTable::new();
        let mut log = DuplicateLog::new();
        table.read_from(&mut wad1, &mut log);
        table.read_from(&mut wad2, &mut log);

        assert_eq!(table.loose().len(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn stray_end_marker_is_loose() {
        let mut wad = archive_with(&[("X_END", b""), ("MUSIC", b"mus")]);
        let mut table = NamespaceTable::new();
        table.read_from(&mut wad, &mut DuplicateLog::new());
        assert_eq!(table.loose().len(), 2);
    }

    #[test]
    fn used_lumps_are_skipped() {
        let mut wad = archive_with(&[("TEXTURE1", b"t"), ("MUSIC", b"m")]);
        wad.lumps.get_at_mut(0).unwrap().used = true;
        let mut table = NamespaceTable::new();
        table.read_from(&mut wad, &mut DuplicateLog::new());
        assert_eq!(table.loose().len(), 1);
        assert!(table.loose().get("TEXTURE1").is_none());
    }

    #[test]
    fn retain_patches_prunes_pp_only() {
        let mut wad = archive_with(&[
            ("P_START", b""),
            ("USED1", b"u"),
            ("UNUSED1", b"x"),
            ("P_END", b""),
        ]);
        let mut table = NamespaceTable::new();
        table.read_from(&mut wad, &mut DuplicateLog::new());

        table.retain_patches(&["USED1".to_owned()]);
        let pp = table.get("PP").unwrap();
        assert_eq!(pp.lumps.len(), 1);
        assert!(pp.lumps.get("USED1").is_some());
    }
}
