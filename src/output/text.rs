//! Plain-text output for reconciliation results.

use std::io::{self, Write};

use crate::actions::MaterializeSummary;
use crate::engine::Reconciliation;
use crate::warning::Warning;

/// Human-readable listing of a reconciliation.
pub struct TextOutput<'a> {
    reconciliation: &'a Reconciliation,
    materialized: Option<&'a MaterializeSummary>,
}

impl<'a> TextOutput<'a> {
    #[must_use]
    pub fn new(reconciliation: &'a Reconciliation) -> Self {
        Self {
            reconciliation,
            materialized: None,
        }
    }

    /// Include the result of a merge.
    #[must_use]
    pub fn with_materialized(mut self, summary: &'a MaterializeSummary) -> Self {
        self.materialized = Some(summary);
        self
    }

    /// Write the listing, warnings, and summary.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let rec = self.reconciliation;
        let classification = &rec.classification;

        writeln!(w, "A: {}", rec.tree_a.root.display())?;
        writeln!(w, "B: {}", rec.tree_b.root.display())?;
        writeln!(w, "Mode: {}", classification.mode)?;
        writeln!(w)?;

        writeln!(w, "Duplicates ({}):", classification.duplicates.len())?;
        for record in &classification.duplicates {
            writeln!(
                w,
                "  {}  {} <-> {}",
                short_key(&record.key.to_string_lossy()),
                record.entry_a.relative_path.display(),
                record.entry_b.relative_path.display()
            )?;
        }

        writeln!(w, "Only in A ({}):", classification.unique_a.len())?;
        for entry in &classification.unique_a {
            writeln!(w, "  {}", entry.relative_path.display())?;
        }
        writeln!(w, "Only in B ({}):", classification.unique_b.len())?;
        for entry in &classification.unique_b {
            writeln!(w, "  {}", entry.relative_path.display())?;
        }
        if !classification.shadowed.is_empty() {
            writeln!(w, "Shadowed ({}):", classification.shadowed.len())?;
            for shadowed in &classification.shadowed {
                writeln!(
                    w,
                    "  {}  [{}] {}",
                    short_key(&shadowed.key.to_string_lossy()),
                    shadowed.side,
                    shadowed.entry.relative_path.display()
                )?;
            }
        }

        let copy_warnings: &[Warning] = self.materialized.map_or(&[], |m| &m.warnings);
        let warning_count = rec.warnings.len() + copy_warnings.len();
        if warning_count > 0 {
            writeln!(w, "Warnings ({}):", warning_count)?;
            for warning in rec.warnings.iter().chain(copy_warnings) {
                writeln!(w, "  {}", warning)?;
            }
        }

        writeln!(w)?;
        writeln!(w, "{}", rec.report)?;

        if let Some(summary) = self.materialized {
            writeln!(
                w,
                "Merged:             {} files ({}) into {}",
                summary.files_written,
                bytesize::ByteSize::b(summary.bytes_written),
                summary.output_dir.display()
            )?;
        }

        Ok(())
    }
}

/// Digests are shortened to 12 characters; names are kept whole.
fn short_key(key: &str) -> &str {
    if key.len() == 64 && key.bytes().all(|b| b.is_ascii_hexdigit()) {
        &key[..12]
    } else {
        key
    }
}
