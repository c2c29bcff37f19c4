/// Per-read outcome classification and record dispatch
///
/// Decides whether a read is uniquely mapped, multi-mapped, held for the
/// junction filter or unmapped (and why), updates the worker's counters,
/// feeds the junction collectors and asks the encoder for the records.
use crate::align::transcript::Transcript;
use crate::error::Error;
use crate::genome::Genome;
use crate::io::bam_record::RecordEncoder;
use crate::io::fastq::Read;
use crate::io::fastx_out::MateStreams;
use crate::junction::{JunctionScratch, SpliceJunctionStats};
use crate::params::{FilterThresholds, OutReadsUnmapped, OutSjFilterReads, OutputConfig};
use crate::stats::{AlignmentStats, UnmappedReason};
use std::io::Write;

/// Candidate alignments of one read, as produced by the aligner
#[derive(Debug, Clone, Copy)]
pub struct ReadAlignments<'t> {
    /// Number of alignment windows; 0 means nothing aligned at all
    pub n_windows: usize,
    /// Best-scoring alignment, used for the filters and the mate bookkeeping
    pub best: Option<&'t Transcript>,
    /// All alignments reported for the read
    pub multi: &'t [Transcript],
}

/// Disposition of one read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    MappedMulti,
    MappedUnique,
    /// Held back until the junction filter has seen every read
    HeldForSjFilter,
    Unmapped(UnmappedReason),
}

impl ReadOutcome {
    /// Numeric outcome: unmapped reasons are 0..=4, mapped and held reads negative.
    pub fn code(&self) -> i32 {
        match self {
            ReadOutcome::MappedMulti => -1,
            ReadOutcome::MappedUnique => -2,
            ReadOutcome::HeldForSjFilter => -3,
            ReadOutcome::Unmapped(reason) => reason.code(),
        }
    }
}

/// Result of [`OutputWorker::output_alignments`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutput {
    pub outcome: ReadOutcome,
    /// Alignments passed to the encoder
    pub n_emitted: usize,
    /// Mates covered by the best alignment of an emitted read
    pub mate_mapped: [bool; 2],
    /// Record bytes appended to the output buffer
    pub bytes_written: usize,
}

/// Outputs shared by all workers of a run
pub struct SharedOutputs<W: Write + Send> {
    /// Reads held for the junction filter
    pub held_reads: Option<MateStreams<W>>,
    /// `--outReadsUnmapped Fastx`
    pub unmapped_reads: Option<MateStreams<W>>,
    /// Junctions of every read reaching the filter step, held reads included
    pub sj_first_stage: SpliceJunctionStats,
    /// Junctions of emitted reads only
    pub sj_final: SpliceJunctionStats,
}

impl<W: Write + Send> SharedOutputs<W> {
    pub fn new(held_reads: Option<MateStreams<W>>, unmapped_reads: Option<MateStreams<W>>) -> Self {
        Self {
            held_reads,
            unmapped_reads,
            sj_first_stage: SpliceJunctionStats::new(),
            sj_final: SpliceJunctionStats::new(),
        }
    }
}

/// Unmapped reason from the best alignment and the candidate count, or
/// `None` when the read passes every filter.
///
/// `read_len` is the combined read length (both mates plus the spacer).
pub fn filter_outcome(
    filter: &FilterThresholds,
    alignments: &ReadAlignments,
    read_len: u32,
) -> Option<UnmappedReason> {
    let best = match alignments.best {
        Some(best) if alignments.n_windows > 0 => best,
        _ => return Some(UnmappedReason::Other),
    };

    let bases = read_len.saturating_sub(1) as f64;
    if best.max_score < filter.score_min
        || best.max_score < (filter.score_min_over_lread * bases) as i32
        || best.n_match < filter.match_nmin
        || best.n_match < (filter.match_nmin_over_lread * bases) as u32
    {
        return Some(UnmappedReason::TooShort);
    }

    if best.n_mismatch > filter.mismatch_nmax
        || best.n_mismatch as f64 / best.r_length as f64 > filter.mismatch_nover_lmax
    {
        return Some(UnmappedReason::TooManyMismatches);
    }

    if alignments.multi.len() > filter.multimap_nmax as usize {
        return Some(UnmappedReason::TooManyLoci);
    }
    None
}

/// Per-worker output state: counters, encoder scratch and shared sinks
pub struct OutputWorker<'a, W: Write + Send> {
    config: &'a OutputConfig,
    genome: &'a Genome,
    shared: &'a SharedOutputs<W>,
    encoder: RecordEncoder<'a>,
    sj_scratch: JunctionScratch,
    pub stats: AlignmentStats,
    bytes_total: u64,
}

impl<'a, W: Write + Send> OutputWorker<'a, W> {
    pub fn new(config: &'a OutputConfig, genome: &'a Genome, shared: &'a SharedOutputs<W>) -> Self {
        Self {
            config,
            genome,
            shared,
            encoder: RecordEncoder::new(config, genome),
            sj_scratch: JunctionScratch::new(),
            stats: AlignmentStats::new(),
            bytes_total: 0,
        }
    }

    /// Record bytes produced by this worker so far.
    pub fn bytes_total(&self) -> u64 {
        self.bytes_total
    }

    /// Classify one read and append its records to `out`.
    pub fn output_alignments(
        &mut self,
        alignments: &ReadAlignments,
        read: &Read,
        out: &mut Vec<u8>,
    ) -> Result<ReadOutput, Error> {
        let mut bytes_written = 0;
        let mut n_emitted = 0;
        let mut mate_mapped = [false; 2];

        let outcome = match filter_outcome(&self.config.filter, alignments, read.combined_len()) {
            Some(reason) => {
                if reason == UnmappedReason::TooManyLoci {
                    log::debug!(
                        "{}: {} loci exceed outFilterMultimapNmax",
                        read.name,
                        alignments.multi.len()
                    );
                }
                self.stats.add_unmapped(reason);
                ReadOutcome::Unmapped(reason)
            }
            None => {
                let multi = alignments.multi;
                let n_tr = multi.len();

                let held = self.config.sj_filter_stage == 1
                    && multi.iter().any(Transcript::has_novel_junction);
                if held {
                    log::debug!("{}: held for the junction filter", read.name);
                    let streams = self.shared.held_reads.as_ref().ok_or_else(|| {
                        Error::Bug("junction filter active without a held-read stream".into())
                    })?;
                    streams.append_read(read, None)?;
                }

                let collect_sj = self.config.sj_filter_reads == OutSjFilterReads::All || n_tr == 1;
                if collect_sj {
                    self
                        .shared
                        .sj_first_stage
                        .record_read(multi, self.genome, &mut self.sj_scratch)?;
                }

                if held {
                    ReadOutcome::HeldForSjFilter
                } else {
                    let mut outcome = match n_tr {
                        0 => {
                            return Err(Error::Bug(format!(
                                "read {} passed the filters without alignments",
                                read.name
                            )));
                        }
                        1 => {
                            self.stats.mapped_unique += 1;
                            self.stats.transcript_stats(&multi[0], read.combined_len());
                            ReadOutcome::MappedUnique
                        }
                        _ => {
                            self.stats.mapped_multi += 1;
                            ReadOutcome::MappedMulti
                        }
                    };

                    for (i_tr, tr) in multi.iter().enumerate() {
                        bytes_written += self.encoder.encode_mapped(tr, n_tr, i_tr, None, read, out)?;
                    }
                    n_emitted = n_tr;

                    if collect_sj {
                        self.shared
                            .sj_final
                            .record_read(multi, self.genome, &mut self.sj_scratch)?;
                    }

                    if let Some(best) = alignments.best {
                        mate_mapped = best.mates_covered();
                    }
                    if read.is_paired() && !(mate_mapped[0] && mate_mapped[1]) {
                        outcome = ReadOutcome::Unmapped(UnmappedReason::MateUnmapped);
                    }
                    outcome
                }
            }
        };

        if outcome != ReadOutcome::HeldForSjFilter {
            self.stats.add_read(read.trimmed_bases());
        }

        if let ReadOutcome::Unmapped(reason) = outcome {
            if self.config.unmapped_within() {
                bytes_written +=
                    self.encoder
                        .encode_unmapped(alignments.best, reason, mate_mapped, read, out)?;
            }
            if self.config.reads_unmapped == OutReadsUnmapped::Fastx {
                let streams = self.shared.unmapped_reads.as_ref().ok_or_else(|| {
                    Error::Bug("--outReadsUnmapped Fastx without an unmapped-read stream".into())
                })?;
                streams.append_read(read, Some(mate_mapped))?;
            }
        }

        self.bytes_total += bytes_written as u64;
        Ok(ReadOutput {
            outcome,
            n_emitted,
            mate_mapped,
            bytes_written,
        })
    }
}
