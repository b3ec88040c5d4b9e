//! Conflict bookkeeping.
//!
//! Every time a merge rule resolves a collision (a texture overwritten, a
//! text lump concatenated, …) a record lands here.  Resolutions are never
//! errors; the log exists so the user can audit what the merge decided.

use std::io::{self, Write};

/// What the merge rule did with the colliding resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicateKind {
    /// Contents were combined (text lumps).
    Merge,
    /// The newer definition replaced the older one.
    Overwrite,
}

impl DuplicateKind {
    fn as_str(self) -> &'static str {
        match self {
            DuplicateKind::Merge => "merge",
            DuplicateKind::Overwrite => "overwrite",
        }
    }
}

/// One resolved collision.  The two names are fully qualified as
/// `"<archive-basename>:<name>"`.
#[derive(Clone, Debug)]
pub struct DuplicateRecord {
    pub kind: DuplicateKind,
    pub label: &'static str,
    pub existing: String,
    pub incoming: String,
}

/// Append-only list of resolved collisions.
#[derive(Default)]
pub struct DuplicateLog {
    records: Vec<DuplicateRecord>,
}

impl DuplicateLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        kind: DuplicateKind,
        label: &'static str,
        existing: String,
        incoming: String,
    ) {
        log::debug!("{} {}: {} <- {}", kind.as_str(), label, existing, incoming);
        self.records.push(DuplicateRecord {
            kind,
            label,
            existing,
            incoming,
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DuplicateRecord] {
        &self.records
    }

    /// Emit the human-readable report: three columns, each padded to the
    /// widest entry seen across the whole list.
    pub fn write_report(&self, out: &mut impl Write) -> io::Result<()> {
        let ops: Vec<String> = self
            .records
            .iter()
            .map(|r| format!("{} {}", r.kind.as_str(), r.label))
            .collect();

        let w0 = ops.iter().map(String::len).max().unwrap_or(0);
        let w1 = self.records.iter().map(|r| r.existing.len()).max().unwrap_or(0);
        let w2 = self.records.iter().map(|r| r.incoming.len()).max().unwrap_or(0);

        for (op, rec) in ops.iter().zip(&self.records) {
            writeln!(
                out,
                "{:<w0$}  {:<w1$}  {:<w2$}",
                op, rec.existing, rec.incoming
            )?;
        }
        Ok(())
    }
}
