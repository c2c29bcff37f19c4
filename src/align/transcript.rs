/// Transcript data structures: one candidate alignment of a read
use crate::error::Error;
use crate::junction::SpliceMotif;

/// Classification of the gap between two consecutive exons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JunctionType {
    /// Spliced junction (reference skip)
    Splice { motif: SpliceMotif, annotated: bool },
    /// Deletion from the reference
    Deletion,
    /// Insertion to the reference
    Insertion,
    /// Boundary between mate 1 and mate 2 of a spanning alignment
    MateGap,
}

impl JunctionType {
    /// STAR's signed junction code: motif code (>= 0) for splices,
    /// -1 deletion, -2 insertion, -3 mate gap.
    pub fn code(&self) -> i32 {
        match self {
            JunctionType::Splice { motif, .. } => motif.code() as i32,
            JunctionType::Deletion => -1,
            JunctionType::Insertion => -2,
            JunctionType::MateGap => -3,
        }
    }

    /// Build from STAR's signed code and annotation flag.
    pub fn from_code(code: i32, annotated: bool) -> Option<Self> {
        match code {
            -1 => Some(JunctionType::Deletion),
            -2 => Some(JunctionType::Insertion),
            -3 => Some(JunctionType::MateGap),
            c if c >= 0 => {
                let motif = SpliceMotif::from_code(u8::try_from(c).ok()?)?;
                Some(JunctionType::Splice { motif, annotated })
            }
            _ => None,
        }
    }

    pub fn is_splice(&self) -> bool {
        matches!(self, JunctionType::Splice { .. })
    }

    pub fn is_annotated(&self) -> bool {
        matches!(self, JunctionType::Splice { annotated: true, .. })
    }
}

/// An exon segment in a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exon {
    /// Start in the concatenated genome (0-based)
    pub g_start: u64,
    /// Start in the combined read, in the transcript's orientation (0-based)
    pub r_start: u32,
    /// Segment length
    pub len: u32,
    /// Physical mate (0 or 1) this segment belongs to
    pub i_frag: usize,
}

impl Exon {
    pub fn g_end(&self) -> u64 {
        self.g_start + self.len as u64
    }

    pub fn r_end(&self) -> u32 {
        self.r_start + self.len
    }
}

/// A complete alignment of a read to the genome
///
/// Exons are ordered by increasing read offset and `junctions[i]` describes
/// the gap between `exons[i]` and `exons[i + 1]`.
#[derive(Debug, Clone)]
pub struct Transcript {
    /// Chromosome index
    pub chr: usize,
    /// Alignment strand. For paired reads, `true` means mate 2 is the
    /// leftmost mate on the genome.
    pub is_reverse: bool,
    /// Exon segments
    pub exons: Vec<Exon>,
    /// Gap classifications, one per adjacent exon pair
    pub junctions: Vec<JunctionType>,
    /// Alignment score
    pub max_score: i32,
    /// Number of mismatches
    pub n_mismatch: u32,
    /// Number of matched bases
    pub n_match: u32,
    /// Read length covered by the alignment
    pub r_length: u32,
    /// Primary alignment among ties
    pub primary: bool,
    /// Strand implied by the splice motifs: 0=undefined, 1=+, 2=-
    pub sj_motif_strand: u8,
}

impl Transcript {
    pub fn n_exons(&self) -> usize {
        self.exons.len()
    }

    /// Strand as STAR's 0/1 index.
    pub fn strand(&self) -> usize {
        self.is_reverse as usize
    }

    /// Leftmost genomic position covered (concatenated genome).
    pub fn g_start(&self) -> u64 {
        self.exons.first().map_or(0, |e| e.g_start)
    }

    /// Rightmost genomic position covered, exclusive.
    pub fn g_end(&self) -> u64 {
        self.exons.last().map_or(0, |e| e.g_end())
    }

    /// Index of the last exon of the first mate when the transcript spans
    /// both mates.
    ///
    /// Returns `Ok(None)` for a single-mate transcript and rejects transcripts
    /// with more than one mate gap.
    pub fn mate_split(&self) -> Result<Option<usize>, Error> {
        let mut split = None;
        for (i, junction) in self.junctions.iter().enumerate() {
            if *junction == JunctionType::MateGap {
                if split.is_some() {
                    return Err(Error::Bug(
                        "transcript contains more than one mate gap".into(),
                    ));
                }
                split = Some(i);
            }
        }
        Ok(split)
    }

    /// Mates covered by the first and the last exon.
    pub fn mates_covered(&self) -> [bool; 2] {
        let mut mapped = [false; 2];
        if let (Some(first), Some(last)) = (self.exons.first(), self.exons.last()) {
            mapped[first.i_frag.min(1)] = true;
            mapped[last.i_frag.min(1)] = true;
        }
        mapped
    }

    /// True if any gap is a splice junction absent from the annotation.
    pub fn has_novel_junction(&self) -> bool {
        self.junctions
            .iter()
            .any(|j| j.is_splice() && !j.is_annotated())
    }

    /// Check the structural invariants the encoder relies on.
    pub fn validate(&self) -> Result<(), Error> {
        if self.exons.is_empty() {
            return Err(Error::Bug("transcript has no exons".into()));
        }
        if self.junctions.len() + 1 != self.exons.len() {
            return Err(Error::Bug(format!(
                "transcript has {} exons but {} gaps",
                self.exons.len(),
                self.junctions.len()
            )));
        }
        for (pair, junction) in self.exons.windows(2).zip(&self.junctions) {
            if pair[1].r_start < pair[0].r_end() {
                return Err(Error::Bug("transcript exons are out of read order".into()));
            }
            // i_frag is the physical mate; only a mate gap may change it, and the
            // mate on the left of the combined read comes first (mate 2 on strand 1)
            let mate_change = pair[0].i_frag != pair[1].i_frag;
            if *junction == JunctionType::MateGap {
                if !mate_change || pair[0].i_frag != self.strand() {
                    return Err(Error::Bug(format!(
                        "mate gap from mate {} to mate {} on strand {}",
                        pair[0].i_frag + 1,
                        pair[1].i_frag + 1,
                        self.strand()
                    )));
                }
            } else if mate_change {
                return Err(Error::Bug("mate changes without a mate gap".into()));
            }
            // mates may overlap each other on the genome
            if *junction != JunctionType::MateGap && pair[1].g_start < pair[0].g_end() {
                return Err(Error::Bug("transcript exons overlap on the genome".into()));
            }
        }
        if let Some(exon) = self.exons.iter().find(|e| e.i_frag > 1) {
            return Err(Error::Bug(format!(
                "exon belongs to mate {}; at most two mates are supported",
                exon.i_frag
            )));
        }
        Ok(())
    }
}

/// Orientation of one physical mate within an alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MateOrientation {
    /// Mate whose sequence occupies the left part of the combined read
    pub left_mate: usize,
    /// This mate is the leftmost one on the genome
    pub leftmost: bool,
    /// Sequence must be reverse complemented for output; also the 0x10 flag
    pub reverse: bool,
}

impl MateOrientation {
    /// Orientation of `mate` for an alignment on `strand` (0/1) of a read
    /// with `n_mates` mates.
    pub fn new(strand: usize, mate: usize, n_mates: usize) -> Self {
        let left_mate = if n_mates == 2 { strand } else { 0 };
        Self {
            left_mate,
            leftmost: n_mates == 1 || mate == strand,
            reverse: mate != strand,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exon(g_start: u64, r_start: u32, len: u32, i_frag: usize) -> Exon {
        Exon {
            g_start,
            r_start,
            len,
            i_frag,
        }
    }

    fn transcript(exons: Vec<Exon>, junctions: Vec<JunctionType>) -> Transcript {
        Transcript {
            chr: 0,
            is_reverse: false,
            exons,
            junctions,
            max_score: 98,
            n_mismatch: 0,
            n_match: 100,
            r_length: 100,
            primary: true,
            sj_motif_strand: 0,
        }
    }

    #[test]
    fn test_junction_codes() {
        let splice = JunctionType::Splice {
            motif: SpliceMotif::GtAg,
            annotated: false,
        };
        assert_eq!(splice.code(), 1);
        assert_eq!(JunctionType::Deletion.code(), -1);
        assert_eq!(JunctionType::Insertion.code(), -2);
        assert_eq!(JunctionType::MateGap.code(), -3);

        assert_eq!(JunctionType::from_code(1, false), Some(splice));
        assert_eq!(JunctionType::from_code(-3, false), Some(JunctionType::MateGap));
        assert_eq!(JunctionType::from_code(-4, false), None);
        assert_eq!(JunctionType::from_code(9, false), None);
    }

    #[test]
    fn test_mate_split() {
        let single = transcript(vec![exon(100, 0, 50, 0)], vec![]);
        assert_eq!(single.mate_split().unwrap(), None);

        let pair = transcript(
            vec![exon(100, 0, 50, 0), exon(300, 51, 50, 1)],
            vec![JunctionType::MateGap],
        );
        assert_eq!(pair.mate_split().unwrap(), Some(0));
        assert_eq!(pair.mates_covered(), [true, true]);
    }

    #[test]
    fn test_mate_split_rejects_two_gaps() {
        let tr = transcript(
            vec![exon(100, 0, 10, 0), exon(200, 11, 10, 1), exon(300, 22, 10, 1)],
            vec![JunctionType::MateGap, JunctionType::MateGap],
        );
        assert!(matches!(tr.mate_split(), Err(Error::Bug(_))));
    }

    #[test]
    fn test_has_novel_junction() {
        let annotated = transcript(
            vec![exon(100, 0, 50, 0), exon(650, 50, 50, 0)],
            vec![JunctionType::Splice {
                motif: SpliceMotif::GtAg,
                annotated: true,
            }],
        );
        assert!(!annotated.has_novel_junction());

        let novel = transcript(
            vec![exon(100, 0, 50, 0), exon(650, 50, 50, 0)],
            vec![JunctionType::Splice {
                motif: SpliceMotif::NonCanonical,
                annotated: false,
            }],
        );
        assert!(novel.has_novel_junction());

        let deletion = transcript(
            vec![exon(100, 0, 50, 0), exon(152, 50, 50, 0)],
            vec![JunctionType::Deletion],
        );
        assert!(!deletion.has_novel_junction());
    }

    #[test]
    fn test_validate() {
        let ok = transcript(
            vec![exon(100, 0, 50, 0), exon(650, 50, 50, 0)],
            vec![JunctionType::Deletion],
        );
        assert!(ok.validate().is_ok());

        let missing_gap = transcript(vec![exon(100, 0, 50, 0), exon(650, 50, 50, 0)], vec![]);
        assert!(missing_gap.validate().is_err());

        let third_mate = transcript(vec![exon(100, 0, 50, 2)], vec![]);
        assert!(third_mate.validate().is_err());
    }

    #[test]
    fn test_validate_mate_order_follows_strand() {
        // strand 1: mate 2 is on the left of the combined read and the genome
        let mut reverse_pair = transcript(
            vec![exon(100, 0, 20, 1), exon(300, 21, 20, 0)],
            vec![JunctionType::MateGap],
        );
        reverse_pair.is_reverse = true;
        assert!(reverse_pair.validate().is_ok());
        assert_eq!(reverse_pair.mates_covered(), [true, true]);

        let mut wrong_order = reverse_pair.clone();
        wrong_order.exons[0].i_frag = 0;
        wrong_order.exons[1].i_frag = 1;
        assert!(matches!(wrong_order.validate(), Err(Error::Bug(_))));

        // strand 0 keeps mate 1 first
        let forward_pair = transcript(
            vec![exon(100, 0, 20, 1), exon(300, 21, 20, 0)],
            vec![JunctionType::MateGap],
        );
        assert!(forward_pair.validate().is_err());

        let no_gap = transcript(
            vec![exon(100, 0, 20, 0), exon(130, 20, 20, 1)],
            vec![JunctionType::Deletion],
        );
        assert!(no_gap.validate().is_err());

        let same_mate_gap = transcript(
            vec![exon(100, 0, 20, 0), exon(300, 21, 20, 0)],
            vec![JunctionType::MateGap],
        );
        assert!(same_mate_gap.validate().is_err());
    }

    #[test]
    fn test_mate_orientation() {
        // Single-end: the only mate is always leftmost, reversed on strand 1
        assert_eq!(
            MateOrientation::new(1, 0, 1),
            MateOrientation {
                left_mate: 0,
                leftmost: true,
                reverse: true
            }
        );

        // Paired, forward: mate 1 left and forward, mate 2 right and reversed
        let m1 = MateOrientation::new(0, 0, 2);
        let m2 = MateOrientation::new(0, 1, 2);
        assert!(m1.leftmost && !m1.reverse);
        assert!(!m2.leftmost && m2.reverse);
        assert_eq!(m2.left_mate, 0);

        // Paired, reverse: mate 2 is on the left
        let m1 = MateOrientation::new(1, 0, 2);
        let m2 = MateOrientation::new(1, 1, 2);
        assert!(!m1.leftmost && m1.reverse);
        assert!(m2.leftmost && !m2.reverse);
        assert_eq!(m1.left_mate, 1);
    }
}
