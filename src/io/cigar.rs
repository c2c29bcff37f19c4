/// Packed CIGAR construction for one mate's exon span, with junction bookkeeping
use crate::align::transcript::Transcript;
use crate::error::Error;
use crate::junction::ANNOTATED_MOTIF_SHIFT;

/// BAM CIGAR operation codes (`MIDNSHP=X`)
pub const CIGAR_M: u32 = 0;
pub const CIGAR_I: u32 = 1;
pub const CIGAR_D: u32 = 2;
pub const CIGAR_N: u32 = 3;
pub const CIGAR_S: u32 = 4;
pub const CIGAR_H: u32 = 5;
pub const CIGAR_P: u32 = 6;
pub const CIGAR_EQ: u32 = 7;
pub const CIGAR_X: u32 = 8;

const CIGAR_OP_SHIFT: u32 = 4;
const CIGAR_OP_CHARS: &[u8; 9] = b"MIDNSHP=X";

/// Upper bound on operations in one record.
pub const MAX_CIGAR_OPS: usize = 10000;

/// Read lengths the clip computation needs for one mate.
///
/// The "left" mate is the one occupying the first part of the combined read
/// in the transcript's orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipGeometry {
    /// Clip on the genomic left of this mate (3' clip if the mate is reversed, else 5')
    pub trim_left: u32,
    /// Trimmed length of the left mate
    pub left_trimmed_len: u32,
    /// Original length of the left mate
    pub left_original_len: u32,
    /// Original length of this mate
    pub mate_original_len: u32,
}

/// CIGAR and junction arrays of one mate record.
#[derive(Debug, Default)]
pub struct MateCigar {
    /// Packed `len << 4 | op`
    pub ops: Vec<u32>,
    /// jM values: motif code, +20 when annotated; `[-1]` when unspliced
    pub sj_motif: Vec<i8>,
    /// jI values: 1-based intron start/end pairs; `[-1]` when unspliced
    pub sj_intron: Vec<i32>,
}

impl MateCigar {
    pub fn with_capacity(n_ops: usize) -> Self {
        Self {
            ops: Vec::with_capacity(n_ops),
            sj_motif: Vec::with_capacity(n_ops / 2),
            sj_intron: Vec::with_capacity(n_ops),
        }
    }

    pub fn clear(&mut self) {
        self.ops.clear();
        self.sj_motif.clear();
        self.sj_intron.clear();
    }

    fn push(&mut self, len: u32, op: u32) -> Result<(), Error> {
        if self.ops.len() >= MAX_CIGAR_OPS {
            return Err(Error::Bug(format!(
                "CIGAR exceeds {} operations",
                MAX_CIGAR_OPS
            )));
        }
        if len >= 1 << 28 {
            return Err(Error::Bug(format!("CIGAR operation length {} too large", len)));
        }
        self.ops.push(len << CIGAR_OP_SHIFT | op);
        Ok(())
    }

    /// Build the operations for `tr.exons[iex1..=iex2]`.
    ///
    /// `chr_start` is the genome offset of the transcript's chromosome, used
    /// for the 1-based intron coordinates.
    pub fn build(
        &mut self,
        tr: &Transcript,
        iex1: usize,
        iex2: usize,
        geometry: &ClipGeometry,
        chr_start: u64,
    ) -> Result<(), Error> {
        self.clear();

        let first = tr
            .exons
            .get(iex1)
            .ok_or_else(|| Error::Bug(format!("exon index {} out of range", iex1)))?;
        let last = tr
            .exons
            .get(iex2)
            .ok_or_else(|| Error::Bug(format!("exon index {} out of range", iex2)))?;

        // Exons of the right mate sit after the left mate and the spacer base
        let second = first.r_start >= geometry.left_trimmed_len;
        let mate_offset = if second {
            geometry.left_trimmed_len + 1
        } else {
            0
        };

        let lead = (geometry.trim_left + first.r_start)
            .checked_sub(mate_offset)
            .ok_or_else(|| {
                Error::Bug(format!(
                    "exon read start {} falls in the mate spacer",
                    first.r_start
                ))
            })?;
        if lead > 0 {
            self.push(lead, CIGAR_S)?;
        }

        for ii in iex1..=iex2 {
            let exon = &tr.exons[ii];
            if ii > iex1 {
                let prev = &tr.exons[ii - 1];
                let junction = tr.junctions[ii - 1];
                let gap_r = exon.r_start.checked_sub(prev.r_end()).ok_or_else(|| {
                    Error::Bug(format!("exons {} and {} overlap in the read", ii - 1, ii))
                })?;
                let gap_g = exon.g_start.checked_sub(prev.g_end()).ok_or_else(|| {
                    Error::Bug(format!("exons {} and {} overlap on the genome", ii - 1, ii))
                })?;
                let gap_g = u32::try_from(gap_g)
                    .map_err(|_| Error::Bug(format!("genomic gap {} too large", gap_g)))?;

                // a read gap and a genomic gap may both be present
                if gap_r > 0 {
                    self.push(gap_r, CIGAR_I)?;
                }
                if junction.code() >= 0 || junction.is_annotated() {
                    self.push(gap_g, CIGAR_N)?;
                    let shift = if junction.is_annotated() {
                        ANNOTATED_MOTIF_SHIFT
                    } else {
                        0
                    };
                    self.sj_motif.push(junction.code() as i8 + shift);
                    self.sj_intron
                        .push(chr_coord(prev.g_end() + 1, chr_start)?);
                    self.sj_intron.push(chr_coord(exon.g_start, chr_start)?);
                } else if gap_g > 0 {
                    self.push(gap_g, CIGAR_D)?;
                }
            }
            self.push(exon.len, CIGAR_M)?;
        }

        if self.sj_motif.is_empty() {
            self.sj_motif.push(-1);
            self.sj_intron.push(-1);
        }

        let read_end = if second {
            geometry.left_trimmed_len + 1 + geometry.mate_original_len
        } else {
            geometry.left_original_len
        };
        let trail = read_end
            .checked_sub(last.r_end())
            .and_then(|v| v.checked_sub(geometry.trim_left))
            .ok_or_else(|| {
                Error::Bug(format!(
                    "exon read end {} exceeds the mate length",
                    last.r_end()
                ))
            })?;
        if trail > 0 {
            self.push(trail, CIGAR_S)?;
        }
        Ok(())
    }

    /// Bases consumed from the read (M, I, S, =, X).
    pub fn read_len(&self) -> u32 {
        self.ops
            .iter()
            .filter(|&&op| matches!(op & 0xF, CIGAR_M | CIGAR_I | CIGAR_S | CIGAR_EQ | CIGAR_X))
            .map(|&op| op >> CIGAR_OP_SHIFT)
            .sum()
    }

    /// Bases consumed from the reference (M, D, N, =, X).
    pub fn ref_len(&self) -> u32 {
        self.ops
            .iter()
            .filter(|&&op| matches!(op & 0xF, CIGAR_M | CIGAR_D | CIGAR_N | CIGAR_EQ | CIGAR_X))
            .map(|&op| op >> CIGAR_OP_SHIFT)
            .sum()
    }
}

/// Text form of packed operations, e.g. `5S45M`.
pub fn cigar_string(ops: &[u32]) -> String {
    let mut s = String::new();
    for &op in ops {
        s.push_str(&(op >> CIGAR_OP_SHIFT).to_string());
        s.push(CIGAR_OP_CHARS.get((op & 0xF) as usize).copied().unwrap_or(b'?') as char);
    }
    s
}

fn chr_coord(g: u64, chr_start: u64) -> Result<i32, Error> {
    g.checked_sub(chr_start)
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| {
            Error::Bug(format!(
                "genome position {} outside chromosome starting at {}",
                g, chr_start
            ))
        })
}
