/// Alignment statistics tracking and reporting
use crate::align::transcript::{JunctionType, Transcript};
use log::info;

/// Why a read ended up unmapped; the numeric code is written in the `uT` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnmappedReason {
    /// No alignment windows / other
    Other = 0,
    /// Best alignment too short
    TooShort = 1,
    /// Best alignment has too many mismatches
    TooManyMismatches = 2,
    /// More loci than outFilterMultimapNmax
    TooManyLoci = 3,
    /// Paired read whose best alignment covers a single mate
    MateUnmapped = 4,
}

impl UnmappedReason {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// ASCII digit written as the `uT` attribute.
    pub fn tag_char(&self) -> u8 {
        b'0' + *self as u8
    }
}

/// Per-worker alignment statistics for a read mapping run
#[derive(Default, Debug, Clone, PartialEq)]
pub struct AlignmentStats {
    /// Number of input reads (reads held for the junction filter excluded)
    pub read_n: u64,
    /// Number of input bases after trimming
    pub read_bases: u64,
    /// Reads that mapped uniquely (exactly 1 locus)
    pub mapped_unique: u64,
    /// Reads that mapped to multiple loci
    pub mapped_multi: u64,
    /// Reads without alignment windows
    pub unmapped_other: u64,
    pub unmapped_short: u64,
    pub unmapped_mismatch: u64,
    /// Reads that mapped to too many loci (exceeds outFilterMultimapNmax)
    pub unmapped_multi: u64,

    // Unique alignments only
    pub mapped_bases: u64,
    pub mapped_mismatches: u64,
    pub mapped_portion: f64,
    pub ins_n: u64,
    pub ins_l: u64,
    pub del_n: u64,
    pub del_l: u64,
    /// Spliced junctions per motif code (0-6)
    pub splices_n: [u64; 7],
    pub splices_annotated: u64,
}

impl AlignmentStats {
    /// Create new statistics tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an input read.
    pub fn add_read(&mut self, bases: u64) {
        self.read_n += 1;
        self.read_bases += bases;
    }

    /// Count an unmapped outcome.
    pub fn add_unmapped(&mut self, reason: UnmappedReason) {
        match reason {
            UnmappedReason::Other => self.unmapped_other += 1,
            UnmappedReason::TooShort => self.unmapped_short += 1,
            UnmappedReason::TooManyMismatches => self.unmapped_mismatch += 1,
            UnmappedReason::TooManyLoci => self.unmapped_multi += 1,
            // counted as mapped already
            UnmappedReason::MateUnmapped => {}
        }
    }

    /// Accumulate the per-alignment summary of a unique mapper.
    ///
    /// # Arguments
    /// * `tr` - The unique alignment
    /// * `read_len` - Combined read length (Lread)
    pub fn transcript_stats(&mut self, tr: &Transcript, read_len: u32) {
        self.mapped_mismatches += tr.n_mismatch as u64;

        let mapped_len: u64 = tr.exons.iter().map(|e| e.len as u64).sum();
        self.mapped_bases += mapped_len;
        if read_len > 0 {
            self.mapped_portion += mapped_len as f64 / read_len as f64;
        }

        for (pair, junction) in tr.exons.windows(2).zip(&tr.junctions) {
            match junction {
                JunctionType::Splice { motif, annotated } => {
                    self.splices_n[motif.code() as usize] += 1;
                    if *annotated {
                        self.splices_annotated += 1;
                    }
                }
                JunctionType::Deletion => {
                    self.del_n += 1;
                    self.del_l += pair[1].g_start.saturating_sub(pair[0].g_end());
                }
                JunctionType::Insertion => {
                    self.ins_n += 1;
                    self.ins_l += pair[1].r_start.saturating_sub(pair[0].r_end()) as u64;
                }
                JunctionType::MateGap => {}
            }
        }
    }

    /// Add another worker's counters into this one.
    pub fn merge(&mut self, other: &AlignmentStats) {
        self.read_n += other.read_n;
        self.read_bases += other.read_bases;
        self.mapped_unique += other.mapped_unique;
        self.mapped_multi += other.mapped_multi;
        self.unmapped_other += other.unmapped_other;
        self.unmapped_short += other.unmapped_short;
        self.unmapped_mismatch += other.unmapped_mismatch;
        self.unmapped_multi += other.unmapped_multi;
        self.mapped_bases += other.mapped_bases;
        self.mapped_mismatches += other.mapped_mismatches;
        self.mapped_portion += other.mapped_portion;
        self.ins_n += other.ins_n;
        self.ins_l += other.ins_l;
        self.del_n += other.del_n;
        self.del_l += other.del_l;
        for (a, b) in self.splices_n.iter_mut().zip(other.splices_n) {
            *a += b;
        }
        self.splices_annotated += other.splices_annotated;
    }

    /// Print summary statistics to log
    pub fn print_summary(&self) {
        if self.read_n == 0 {
            info!("No reads processed");
            return;
        }

        info!("=== Alignment Summary ===");
        info!("Number of input reads: {}", self.read_n);
        if self.mapped_unique > 0 {
            info!(
                "Average input read length: {:.0}",
                self.read_bases as f64 / self.read_n as f64
            );
        }
        info!(
            "Uniquely mapped reads: {} ({:.2}%)",
            self.mapped_unique,
            self.unique_percent()
        );
        info!(
            "Number of splices: Total {}, Annotated {}, GT/AG {}, GC/AG {}, AT/AC {}, Non-canonical {}",
            self.splices_total(),
            self.splices_annotated,
            self.splices_n[1] + self.splices_n[2],
            self.splices_n[3] + self.splices_n[4],
            self.splices_n[5] + self.splices_n[6],
            self.splices_n[0]
        );
        info!("Mismatch rate per base: {:.2}%", self.mismatch_rate());
        info!(
            "Deletions: {} (average length {:.2}), insertions: {} (average length {:.2})",
            self.del_n,
            average(self.del_l, self.del_n),
            self.ins_n,
            average(self.ins_l, self.ins_n)
        );
        info!(
            "Multi-mapped reads: {} ({:.2}%)",
            self.mapped_multi,
            self.multi_percent()
        );
        info!(
            "Reads mapped to too many loci: {} ({:.2}%)",
            self.unmapped_multi,
            self.percent(self.unmapped_multi)
        );
        info!(
            "Unmapped reads: too many mismatches {:.2}%, too short {:.2}%, other {:.2}%",
            self.percent(self.unmapped_mismatch),
            self.percent(self.unmapped_short),
            self.percent(self.unmapped_other)
        );
    }

    pub fn splices_total(&self) -> u64 {
        self.splices_n.iter().sum()
    }

    /// Mismatches per mapped base of unique alignments, in percent
    pub fn mismatch_rate(&self) -> f64 {
        if self.mapped_bases == 0 {
            0.0
        } else {
            100.0 * self.mapped_mismatches as f64 / self.mapped_bases as f64
        }
    }

    fn percent(&self, n: u64) -> f64 {
        if self.read_n == 0 {
            0.0
        } else {
            100.0 * n as f64 / self.read_n as f64
        }
    }

    /// Get percentage of uniquely mapped reads
    pub fn unique_percent(&self) -> f64 {
        self.percent(self.mapped_unique)
    }

    /// Get percentage of multi-mapped reads
    pub fn multi_percent(&self) -> f64 {
        self.percent(self.mapped_multi)
    }

    /// Get percentage of unmapped reads (all reasons but mate-unmapped)
    pub fn unmapped_percent(&self) -> f64 {
        self.percent(
            self.unmapped_other + self.unmapped_short + self.unmapped_mismatch + self.unmapped_multi,
        )
    }

    /// Get total mapped reads (unique + multi)
    pub fn total_mapped(&self) -> u64 {
        self.mapped_unique + self.mapped_multi
    }

    /// Get percentage of mapped reads
    pub fn mapped_percent(&self) -> f64 {
        self.percent(self.total_mapped())
    }
}

fn average(total: u64, n: u64) -> f64 {
    if n == 0 {
        0.0
    } else {
        total as f64 / n as f64
    }
}
