//! A named byte blob inside a WAD.

/// Where a lump came from, kept for conflict reporting only.
#[derive(Clone, Debug)]
pub struct SourceRef {
    /// Basename of the archive file the lump was read from.
    pub archive: String,
    /// Original position in that archive's directory.
    pub index: usize,
}

/// A single lump.  The bytes are never mutated after construction; only
/// the `used` flag changes once a typed reader has claimed the lump.
#[derive(Clone, Debug)]
pub struct Lump {
    pub name: String,
    pub data: Vec<u8>,
    pub used: bool,
    pub source: Option<SourceRef>,
}

impl Lump {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            used: false,
            source: None,
        }
    }

    /// A zero-length marker lump (map markers, namespace brackets).
    pub fn marker(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// `"<archive-basename>:<lump-name>"`, or just the name for lumps
    /// synthesized rather than read from a file.
    pub fn full_name(&self) -> String {
        match &self.source {
            Some(src) => format!("{}:{}", src.archive, self.name),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_includes_source_archive() {
        let mut lump = Lump::new("DECORATE", b"actor X {}".to_vec());
        assert_eq!(lump.full_name(), "DECORATE");
        lump.source = Some(SourceRef {
            archive: "mod.wad".into(),
            index: 3,
        });
        assert_eq!(lump.full_name(), "mod.wad:DECORATE");
    }

    #[test]
    fn marker_is_empty() {
        let m = Lump::marker("P_START");
        assert_eq!(m.size(), 0);
        assert!(!m.used);
    }
}
