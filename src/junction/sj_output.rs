/// Collapsed splice junction summary (SJ.out.tab layout)
///
/// Format (9 tab-separated columns):
/// 1. chromosome
/// 2. intron start (1-based)
/// 3. intron end (1-based)
/// 4. strand (0=undefined, 1=+, 2=-)
/// 5. motif (0=non-canonical, 1=GT/AG, 2=CT/AC, 3=GC/AG, 4=CT/GC, 5=AT/AC, 6=GT/AT)
/// 6. annotated (0=no, 1=yes)
/// 7. unique-mapping reads
/// 8. multi-mapping reads
/// 9. maximum overhang
use crate::align::transcript::{JunctionType, Transcript};
use crate::error::Error;
use crate::genome::Genome;
use dashmap::DashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

/// Key for junction statistics
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct SjKey {
    pub chr_idx: usize,
    /// First intronic base, 1-based within the chromosome
    pub intron_start: u64,
    /// Last intronic base, 1-based within the chromosome
    pub intron_end: u64,
    pub strand: u8,
    pub motif: u8,
}

/// Counts for a single junction
#[derive(Debug)]
struct SjCounts {
    unique_count: AtomicU32,
    multi_count: AtomicU32,
    max_overhang: AtomicU32,
    annotated: bool,
}

/// Snapshot of one collapsed junction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SjRecord {
    pub key: SjKey,
    pub annotated: bool,
    pub unique: u32,
    pub multi: u32,
    pub max_overhang: u32,
}

/// Per-worker buffer for collapsing the junctions of one read
#[derive(Debug, Default)]
pub struct JunctionScratch {
    seen: Vec<(SjKey, u32, bool)>,
}

impl JunctionScratch {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Thread-safe junction statistics accumulator
#[derive(Default)]
pub struct SpliceJunctionStats {
    /// Thread-safe map for parallel accumulation
    junctions: DashMap<SjKey, SjCounts>,
}

impl SpliceJunctionStats {
    /// Create new empty statistics accumulator
    pub fn new() -> Self {
        Self {
            junctions: DashMap::new(),
        }
    }

    /// Record one junction occurrence (thread-safe)
    ///
    /// # Arguments
    /// * `key` - Junction coordinates, strand and motif
    /// * `is_unique` - True if from unique mapping, false if multi-mapping
    /// * `overhang` - Minimum overhang on either side
    /// * `annotated` - True if junction is annotated
    pub fn record_junction(&self, key: SjKey, is_unique: bool, overhang: u32, annotated: bool) {
        self.junctions
            .entry(key)
            .or_insert_with(|| SjCounts {
                unique_count: AtomicU32::new(0),
                multi_count: AtomicU32::new(0),
                max_overhang: AtomicU32::new(0),
                annotated,
            })
            .value()
            .record(is_unique, overhang);
    }

    /// Record the junctions of all alignments of one read.
    ///
    /// A junction crossed by several alignments (or by both overlapping
    /// mates) of the same read is counted once, with the largest overhang.
    /// `scratch` is reused between reads.
    pub fn record_read(
        &self,
        transcripts: &[Transcript],
        genome: &Genome,
        scratch: &mut JunctionScratch,
    ) -> Result<(), Error> {
        let is_unique = transcripts.len() == 1;
        let seen = &mut scratch.seen;
        seen.clear();

        for tr in transcripts {
            let chr_start = genome.chr_start(tr.chr)?;
            for (pair, junction) in tr.exons.windows(2).zip(&tr.junctions) {
                let JunctionType::Splice { motif, annotated } = *junction else {
                    continue;
                };
                let start = pair[0].g_end().checked_sub(chr_start);
                let end = pair[1].g_start.checked_sub(chr_start);
                let (Some(start), Some(end)) = (start, end) else {
                    return Err(Error::Bug(format!(
                        "junction outside chromosome {}",
                        tr.chr
                    )));
                };
                let key = SjKey {
                    chr_idx: tr.chr,
                    intron_start: start + 1,
                    intron_end: end,
                    strand: motif.strand_code(),
                    motif: motif.code(),
                };
                seen.push((key, pair[0].len.min(pair[1].len), annotated));
            }
        }

        seen.sort_unstable_by_key(|&(key, ..)| key);
        let mut i = 0;
        while i < seen.len() {
            let (key, mut overhang, annotated) = seen[i];
            i += 1;
            while i < seen.len() && seen[i].0 == key {
                overhang = overhang.max(seen[i].1);
                i += 1;
            }
            self.record_junction(key, is_unique, overhang, annotated);
        }
        Ok(())
    }

    /// Snapshot of all junctions sorted by chromosome, start, end.
    pub fn sorted(&self) -> Vec<SjRecord> {
        let mut records: Vec<SjRecord> = self
            .junctions
            .iter()
            .map(|entry| {
                let counts = entry.value();
                SjRecord {
                    key: *entry.key(),
                    annotated: counts.annotated,
                    unique: counts.unique_count.load(Ordering::Relaxed),
                    multi: counts.multi_count.load(Ordering::Relaxed),
                    max_overhang: counts.max_overhang.load(Ordering::Relaxed),
                }
            })
            .collect();
        records.sort_by_key(|r| r.key);
        records
    }

    /// Write the collapsed junctions as a 9-column table
    pub fn write_tab(&self, output_path: &Path, genome: &Genome) -> Result<(), Error> {
        let file = File::create(output_path).map_err(|e| Error::io(e, output_path))?;
        let mut writer = BufWriter::new(file);

        let records = self.sorted();
        for r in &records {
            let chr_name = genome.chr_name.get(r.key.chr_idx).ok_or_else(|| {
                Error::Bug(format!(
                    "invalid chromosome index {} in junction",
                    r.key.chr_idx
                ))
            })?;

            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                chr_name,
                r.key.intron_start,
                r.key.intron_end,
                r.key.strand,
                r.key.motif,
                u8::from(r.annotated),
                r.unique,
                r.multi,
                r.max_overhang
            )
            .map_err(|e| Error::io(e, output_path))?;
        }

        writer.flush().map_err(|e| Error::io(e, output_path))?;

        log::info!(
            "Wrote {} junctions to {}",
            records.len(),
            output_path.display()
        );

        Ok(())
    }

    /// Get the number of unique junctions tracked
    pub fn len(&self) -> usize {
        self.junctions.len()
    }

    /// Check if any junctions have been recorded
    pub fn is_empty(&self) -> bool {
        self.junctions.is_empty()
    }
}

impl SjCounts {
    /// Record a junction occurrence (thread-safe)
    fn record(&self, is_unique: bool, overhang: u32) {
        if is_unique {
            self.unique_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.multi_count.fetch_add(1, Ordering::Relaxed);
        }
        self.max_overhang.fetch_max(overhang, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::transcript::Exon;
    use crate::junction::SpliceMotif;
    use std::sync::Arc;
    use std::thread;
    use tempfile::NamedTempFile;

    fn genome() -> Genome {
        Genome::from_sequences(&[("chr1", &[b'A'; 2000]), ("chr2", &[b'C'; 2000])], 10).unwrap()
    }

    fn spliced(chr: usize, offset: u64, left: u32, right: u32, annotated: bool) -> Transcript {
        Transcript {
            chr,
            is_reverse: false,
            exons: vec![
                Exon {
                    g_start: offset + 100,
                    r_start: 0,
                    len: left,
                    i_frag: 0,
                },
                Exon {
                    g_start: offset + 600,
                    r_start: left,
                    len: right,
                    i_frag: 0,
                },
            ],
            junctions: vec![JunctionType::Splice {
                motif: SpliceMotif::GtAg,
                annotated,
            }],
            max_score: 50,
            n_mismatch: 0,
            n_match: left + right,
            r_length: left + right,
            primary: true,
            sj_motif_strand: 1,
        }
    }

    #[test]
    fn test_record_unique_read() {
        let stats = SpliceJunctionStats::new();
        let genome = genome();
        stats
            .record_read(&[spliced(0, 0, 30, 20, false)], &genome, &mut JunctionScratch::new())
            .unwrap();

        let records = stats.sorted();
        assert_eq!(records.len(), 1);
        let r = records[0];
        assert_eq!(r.key.intron_start, 131);
        assert_eq!(r.key.intron_end, 600);
        assert_eq!(r.key.strand, 1);
        assert_eq!(r.key.motif, 1);
        assert_eq!(r.unique, 1);
        assert_eq!(r.multi, 0);
        assert_eq!(r.max_overhang, 20);
    }

    #[test]
    fn test_same_junction_counted_once_per_read() {
        let stats = SpliceJunctionStats::new();
        let genome = genome();
        // Two alignments of one read over the same junction: one multi count
        stats
            .record_read(
                &[spliced(0, 0, 30, 20, false), spliced(0, 0, 30, 20, false)],
                &genome,
                &mut JunctionScratch::new(),
            )
            .unwrap();
        let r = stats.sorted()[0];
        assert_eq!(r.unique, 0);
        assert_eq!(r.multi, 1);
    }

    #[test]
    fn test_scratch_reused_between_reads() {
        let stats = SpliceJunctionStats::new();
        let genome = genome();
        let mut scratch = JunctionScratch::new();
        stats
            .record_read(
                &[spliced(0, 0, 30, 20, false), spliced(0, 0, 40, 10, false)],
                &genome,
                &mut scratch,
            )
            .unwrap();
        stats
            .record_read(&[spliced(0, 0, 40, 10, false)], &genome, &mut scratch)
            .unwrap();

        let records = stats.sorted();
        assert_eq!(records.len(), 2);
        // intron 131-600 only in the first read; 141-600 in both
        assert_eq!((records[0].unique, records[0].multi), (0, 1));
        assert_eq!((records[1].unique, records[1].multi), (1, 1));
        assert_eq!(records[0].max_overhang, 20);
        assert_eq!(records[1].max_overhang, 10);
    }

    #[test]
    fn test_chromosome_offsets_and_order() {
        let stats = SpliceJunctionStats::new();
        let genome = genome();
        let chr2_start = genome.chr_start[1];
        let mut scratch = JunctionScratch::new();
        stats
            .record_read(&[spliced(1, chr2_start, 25, 25, true)], &genome, &mut scratch)
            .unwrap();
        stats
            .record_read(&[spliced(0, 0, 40, 10, false)], &genome, &mut scratch)
            .unwrap();

        let records = stats.sorted();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key.chr_idx, 0);
        assert_eq!(records[1].key.chr_idx, 1);
        assert_eq!(records[1].key.intron_start, 126);
        assert!(records[1].annotated);
    }

    #[test]
    fn test_write_tab() {
        let stats = SpliceJunctionStats::new();
        let genome = genome();
        let mut scratch = JunctionScratch::new();
        stats
            .record_read(&[spliced(0, 0, 30, 20, false)], &genome, &mut scratch)
            .unwrap();
        stats
            .record_read(&[spliced(0, 0, 10, 40, false)], &genome, &mut scratch)
            .unwrap();

        let tmp = NamedTempFile::new().unwrap();
        stats.write_tab(tmp.path(), &genome).unwrap();
        let text = std::fs::read_to_string(tmp.path()).unwrap();
        assert_eq!(text, "chr1\t111\t600\t1\t1\t0\t1\t0\t10\nchr1\t131\t600\t1\t1\t0\t1\t0\t20\n");
    }

    #[test]
    fn test_concurrent_recording() {
        let stats = Arc::new(SpliceJunctionStats::new());
        let genome = Arc::new(genome());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                let genome = Arc::clone(&genome);
                thread::spawn(move || {
                    let mut scratch = JunctionScratch::new();
                    for _ in 0..100 {
                        stats
                            .record_read(&[spliced(0, 0, 30, 20, false)], &genome, &mut scratch)
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.len(), 1);
        assert_eq!(stats.sorted()[0].unique, 400);
    }
}
