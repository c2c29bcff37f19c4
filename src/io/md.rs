/// NM (edit distance) and MD (mismatch description) recomputed from raw bases
use crate::align::transcript::{JunctionType, Transcript};
use crate::error::Error;
use crate::genome::Genome;
use crate::io::fastq::decode_base;
use std::fmt::Write;

/// Numeric code of an ambiguous base; always counted as a mismatch.
const BASE_N: u8 = 4;

/// Compare `tr.exons[iex1..=iex2]` with the genome and fill `md`.
///
/// `read` is the combined numeric read in the transcript's orientation.
/// Returns the edit distance: mismatching or ambiguous bases plus deleted
/// and inserted bases between the exons.
pub fn edit_tags(
    tr: &Transcript,
    iex1: usize,
    iex2: usize,
    read: &[u8],
    genome: &Genome,
    md: &mut String,
) -> Result<u32, Error> {
    md.clear();
    let mut nm: u32 = 0;
    let mut run: u32 = 0;

    for iex in iex1..=iex2 {
        let exon = &tr.exons[iex];
        let read_bases = read
            .get(exon.r_start as usize..exon.r_end() as usize)
            .ok_or_else(|| {
                Error::Bug(format!(
                    "exon [{}, {}) outside the read of length {}",
                    exon.r_start,
                    exon.r_end(),
                    read.len()
                ))
            })?;
        for (ii, &r) in read_bases.iter().enumerate() {
            let g = genome_base(genome, exon.g_start + ii as u64)?;
            if r != g || r == BASE_N || g == BASE_N {
                nm += 1;
                push_run(md, run);
                md.push(decode_base(g) as char);
                run = 0;
            } else {
                run += 1;
            }
        }

        if iex < iex2 {
            let next = &tr.exons[iex + 1];
            match tr.junctions[iex] {
                JunctionType::Deletion => {
                    nm += next.g_start.saturating_sub(exon.g_end()) as u32;
                    push_run(md, run);
                    md.push('^');
                    for g in exon.g_end()..next.g_start {
                        md.push(decode_base(genome_base(genome, g)?) as char);
                    }
                    run = 0;
                }
                JunctionType::Insertion => {
                    nm += next.r_start.saturating_sub(exon.r_end());
                }
                _ => {}
            }
        }
    }
    push_run(md, run);
    Ok(nm)
}

fn genome_base(genome: &Genome, pos: u64) -> Result<u8, Error> {
    genome
        .get_base(pos)
        .ok_or_else(|| Error::Bug(format!("genome position {} out of range", pos)))
}

fn push_run(md: &mut String, run: u32) {
    // writing to a String cannot fail
    let _ = write!(md, "{}", run);
}
