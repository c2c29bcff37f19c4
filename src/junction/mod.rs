/// Splice junction motifs and junction summary collection
///
/// This module handles:
/// - Splice motif codes as carried by transcripts and emitted in `jM` tags
/// - Collapsed junction statistics collected from emitted alignments
mod sj_output;

pub use sj_output::{JunctionScratch, SjKey, SjRecord, SpliceJunctionStats};

/// Offset added to a motif code in the `jM` tag when the junction is annotated.
pub const ANNOTATED_MOTIF_SHIFT: i8 = 20;

/// Splice junction motif types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpliceMotif {
    /// Non-canonical
    NonCanonical,
    /// GT-AG (canonical, + strand)
    GtAg,
    /// CT-AC (canonical, - strand; reverse complement of GT-AG)
    CtAc,
    /// GC-AG (semi-canonical, + strand)
    GcAg,
    /// CT-GC (semi-canonical, - strand; reverse complement of GC-AG)
    CtGc,
    /// AT-AC (semi-canonical, + strand)
    AtAc,
    /// GT-AT (semi-canonical, - strand; reverse complement of AT-AC)
    GtAt,
}

impl SpliceMotif {
    /// Decode STAR's numeric motif code (0-6).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NonCanonical),
            1 => Some(Self::GtAg),
            2 => Some(Self::CtAc),
            3 => Some(Self::GcAg),
            4 => Some(Self::CtGc),
            5 => Some(Self::AtAc),
            6 => Some(Self::GtAt),
            _ => None,
        }
    }

    /// STAR convention:
    /// 0 = non-canonical
    /// 1 = GT/AG
    /// 2 = CT/AC
    /// 3 = GC/AG
    /// 4 = CT/GC
    /// 5 = AT/AC
    /// 6 = GT/AT
    pub fn code(&self) -> u8 {
        match self {
            SpliceMotif::NonCanonical => 0,
            SpliceMotif::GtAg => 1,
            SpliceMotif::CtAc => 2,
            SpliceMotif::GcAg => 3,
            SpliceMotif::CtGc => 4,
            SpliceMotif::AtAc => 5,
            SpliceMotif::GtAt => 6,
        }
    }

    /// Get the implied transcript strand from this motif.
    /// Forward-strand motifs (GT-AG, GC-AG, AT-AC) → Some('+')
    /// Reverse-strand motifs (CT-AC, CT-GC, GT-AT) → Some('-')
    /// Non-canonical → None (no strand information)
    pub fn implied_strand(&self) -> Option<char> {
        match self {
            SpliceMotif::GtAg | SpliceMotif::GcAg | SpliceMotif::AtAc => Some('+'),
            SpliceMotif::CtAc | SpliceMotif::CtGc | SpliceMotif::GtAt => Some('-'),
            SpliceMotif::NonCanonical => None,
        }
    }

    /// Strand column of the junction table: 0=undefined, 1=+, 2=-
    pub fn strand_code(&self) -> u8 {
        match self.implied_strand() {
            Some('+') => 1,
            Some(_) => 2,
            None => 0,
        }
    }
}
