/// Binary BAM record assembly for mapped and unmapped mates
///
/// Records are appended to a caller-owned buffer in the on-disk BAM layout
/// (`block_size` first), ready to be handed to a BGZF writer untouched.
use crate::align::transcript::{MateOrientation, Transcript};
use crate::error::Error;
use crate::genome::Genome;
use crate::io::bam_attr::{write_attr, AttrValue, SamAttr};
use crate::io::cigar::{ClipGeometry, MateCigar, MAX_CIGAR_OPS};
use crate::io::fastq::{pack_sequence_into, reverse_complement_into, Read, QUALITY_OFFSET};
use crate::io::md::edit_tags;
use crate::mapq::calculate_mapq;
use crate::params::OutputConfig;
use crate::stats::UnmappedReason;
use byteorder::{ByteOrder, LittleEndian};

/// SAM flag bit masks
pub mod flags {
    pub const PAIRED: u16 = 0x1;
    pub const PROPER_PAIR: u16 = 0x2;
    pub const UNMAPPED: u16 = 0x4;
    pub const MATE_UNMAPPED: u16 = 0x8;
    pub const REVERSE: u16 = 0x10;
    pub const MATE_REVERSE: u16 = 0x20;
    pub const FIRST_IN_PAIR: u16 = 0x40;
    pub const SECOND_IN_PAIR: u16 = 0x80;
    pub const SECONDARY: u16 = 0x100;
}

/// Bin of an unplaced record, `reg2bin(-1, 0)`.
pub const UNMAPPED_BIN: u16 = 4680;

/// Upper bound on the attribute block of one record.
pub const MAX_ATTR_BYTES: usize = 1000;

/// Fixed-size part of a record, `block_size` included.
const CORE_BYTES: usize = 36;

/// Compute the BAI bin of the 0-based half-open interval `[beg, end)`.
pub fn reg2bin(beg: i64, end: i64) -> u16 {
    let end = end - 1;
    if beg >> 14 == end >> 14 {
        return (((1 << 15) - 1) / 7 + (beg >> 14)) as u16;
    }
    if beg >> 17 == end >> 17 {
        return (((1 << 12) - 1) / 7 + (beg >> 17)) as u16;
    }
    if beg >> 20 == end >> 20 {
        return (((1 << 9) - 1) / 7 + (beg >> 20)) as u16;
    }
    if beg >> 23 == end >> 23 {
        return (((1 << 6) - 1) / 7 + (beg >> 23)) as u16;
    }
    if beg >> 26 == end >> 26 {
        return (((1 << 3) - 1) / 7 + (beg >> 26)) as u16;
    }
    0
}

/// Placement of the mate of a single-mate alignment reported elsewhere
/// (e.g. a chimeric partner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MateLocus {
    pub chr: usize,
    /// Start in the concatenated genome
    pub start: u64,
    pub reverse: bool,
}

/// Fixed fields of one record
#[derive(Debug, Clone, Copy)]
struct RecordCore {
    ref_id: i32,
    pos: i32,
    bin: u16,
    mapq: u8,
    flag: u16,
    next_ref_id: i32,
    next_pos: i32,
    tlen: i32,
}

/// Per-worker record encoder.
///
/// Owns the scratch buffers reused from read to read; the output buffer
/// belongs to the caller.
pub struct RecordEncoder<'a> {
    config: &'a OutputConfig,
    genome: &'a Genome,
    cigar: MateCigar,
    attrs: Vec<u8>,
    seq: Vec<u8>,
    qual: Vec<u8>,
    md: String,
}

impl<'a> RecordEncoder<'a> {
    pub fn new(config: &'a OutputConfig, genome: &'a Genome) -> Self {
        Self {
            config,
            genome,
            cigar: MateCigar::with_capacity(MAX_CIGAR_OPS),
            attrs: Vec::with_capacity(MAX_ATTR_BYTES),
            seq: Vec::new(),
            qual: Vec::new(),
            md: String::new(),
        }
    }

    /// Append the record(s) of alignment `i_tr` out of `n_tr` reported loci.
    ///
    /// One record is written per mate the transcript covers. Returns the
    /// number of bytes appended; on error `out` is left as it was.
    pub fn encode_mapped(
        &mut self,
        tr: &Transcript,
        n_tr: usize,
        i_tr: usize,
        mate: Option<MateLocus>,
        read: &Read,
        out: &mut Vec<u8>,
    ) -> Result<usize, Error> {
        if !self.config.record_output {
            return Ok(0);
        }
        let start = out.len();
        match self.mapped_records(tr, n_tr, i_tr, mate, read, out) {
            Ok(()) => Ok(out.len() - start),
            Err(e) => {
                out.truncate(start);
                Err(e)
            }
        }
    }

    /// Append an unmapped record for every mate not flagged in `mate_mapped`.
    ///
    /// `best` supplies the score and mismatch tags and the strand of a mapped
    /// mate; it is absent when the read produced no alignment at all.
    pub fn encode_unmapped(
        &mut self,
        best: Option<&Transcript>,
        reason: UnmappedReason,
        mate_mapped: [bool; 2],
        read: &Read,
        out: &mut Vec<u8>,
    ) -> Result<usize, Error> {
        if !self.config.record_output {
            return Ok(0);
        }
        let start = out.len();
        match self.unmapped_records(best, reason, mate_mapped, read, out) {
            Ok(()) => Ok(out.len() - start),
            Err(e) => {
                out.truncate(start);
                Err(e)
            }
        }
    }

    fn mapped_records(
        &mut self,
        tr: &Transcript,
        n_tr: usize,
        i_tr: usize,
        mate: Option<MateLocus>,
        read: &Read,
        out: &mut Vec<u8>,
    ) -> Result<(), Error> {
        tr.validate()?;
        let split = tr.mate_split()?;
        let n_exons = tr.n_exons();
        let n_mates = if split.is_some() { 2 } else { 1 };
        let i_ex_mate = split.unwrap_or(n_exons - 1);
        let paired = read.is_paired();
        let strand = tr.strand();
        let chr_start = self.genome.chr_start(tr.chr)?;

        let mate = match mate {
            Some(m) if m.chr >= self.genome.n_chr_real => {
                return Err(Error::Bug(format!(
                    "mate chromosome {} out of range",
                    m.chr
                )));
            }
            other => other,
        };

        for imate in 0..n_mates {
            let (iex1, iex2) = if imate == 0 {
                (0, i_ex_mate)
            } else {
                (i_ex_mate + 1, n_exons - 1)
            };
            let mate_idx = tr.exons[iex1].i_frag;
            let Some(this_mate) = read.mates.get(mate_idx) else {
                return Err(Error::Bug(format!(
                    "alignment references mate {} of a read with {} mates",
                    mate_idx + 1,
                    read.n_mates()
                )));
            };
            let orient = MateOrientation::new(strand, mate_idx, read.n_mates());

            let mut flag = 0;
            if paired {
                flag |= flags::PAIRED;
                if n_mates == 2 {
                    flag |= flags::PROPER_PAIR;
                } else if mate.is_none() {
                    flag |= flags::MATE_UNMAPPED;
                }
                flag |= if mate_idx == 0 {
                    flags::FIRST_IN_PAIR
                } else {
                    flags::SECOND_IN_PAIR
                };
                if n_mates == 1 && mate.is_some_and(|m| m.reverse) {
                    flag |= flags::MATE_REVERSE;
                }
            }
            if orient.reverse {
                flag |= flags::REVERSE;
            }
            // in a proper pair only the rightmost mate is reversed
            if n_mates == 2 && orient.leftmost {
                flag |= flags::MATE_REVERSE;
            }
            if !tr.primary {
                flag |= flags::SECONDARY;
            }

            let left = &read.mates[orient.left_mate];
            let geometry = ClipGeometry {
                trim_left: if orient.reverse {
                    this_mate.clip3p
                } else {
                    this_mate.clip5p
                },
                left_trimmed_len: left.trimmed_len(),
                left_original_len: left.original_len(),
                mate_original_len: this_mate.original_len(),
            };
            self.cigar.build(tr, iex1, iex2, &geometry, chr_start)?;
            if self.cigar.read_len() != this_mate.original_len() {
                return Err(Error::Bug(format!(
                    "CIGAR covers {} bases of a {}-base mate",
                    self.cigar.read_len(),
                    this_mate.original_len()
                )));
            }

            let nm = if self.config.needs_edit_tags() {
                edit_tags(tr, iex1, iex2, read.combined(strand), self.genome, &mut self.md)?
            } else {
                0
            };
            self.mapped_attrs(tr, n_tr, i_tr, nm)?;

            let pos = chr_coord(tr.exons[iex1].g_start, chr_start)?;
            let end = chr_coord(tr.exons[iex2].g_end(), chr_start)?;
            let (next_ref_id, next_pos, tlen) = if n_mates == 2 {
                let other = if imate == 0 { i_ex_mate + 1 } else { 0 };
                let span = tr.g_end().saturating_sub(tr.g_start());
                let tlen = i32::try_from(span)
                    .map_err(|_| Error::Bug(format!("template length {} too large", span)))?;
                (
                    tr.chr as i32,
                    chr_coord(tr.exons[other].g_start, chr_start)?,
                    if orient.leftmost { tlen } else { -tlen },
                )
            } else if let Some(m) = mate {
                (
                    m.chr as i32,
                    chr_coord(m.start, self.genome.chr_start(m.chr)?)?,
                    0,
                )
            } else {
                (-1, -1, 0)
            };

            let core = RecordCore {
                ref_id: tr.chr as i32,
                pos,
                bin: reg2bin(pos as i64, end as i64),
                mapq: calculate_mapq(n_tr, self.config.mapq_unique),
                flag,
                next_ref_id,
                next_pos,
                tlen,
            };
            self.orient_sequence(read, mate_idx, orient.reverse);
            write_record(out, &core, &read.name, &self.cigar.ops, &self.seq, self.quality(read), &self.attrs);
        }
        Ok(())
    }

    fn mapped_attrs(&mut self, tr: &Transcript, n_tr: usize, i_tr: usize, nm: u32) -> Result<(), Error> {
        let config = self.config;
        self.attrs.clear();
        for attr in &config.attributes {
            let value = match attr {
                SamAttr::NumHits => AttrValue::Int(n_tr as i64),
                SamAttr::HitIndex => AttrValue::Int(i_tr as i64 + 1),
                SamAttr::AlignmentScore => AttrValue::Int(tr.max_score as i64),
                SamAttr::Mismatches => AttrValue::Int(tr.n_mismatch as i64),
                SamAttr::JunctionMotifs => AttrValue::Int8Array(&self.cigar.sj_motif),
                SamAttr::JunctionIntrons => AttrValue::Int32Array(&self.cigar.sj_intron),
                SamAttr::MotifStrand => match tr.sj_motif_strand {
                    1 => AttrValue::Char(b'+'),
                    2 => AttrValue::Char(b'-'),
                    _ => continue,
                },
                SamAttr::EditDistance => AttrValue::Int(nm as i64),
                SamAttr::MismatchString => AttrValue::String(self.md.as_bytes()),
                SamAttr::ReadGroup => match config.read_group.as_deref() {
                    Some(rg) => AttrValue::String(rg.as_bytes()),
                    None => {
                        return Err(Error::Parameter(
                            "RG attribute requested without --outSAMattrRGline".into(),
                        ));
                    }
                },
            };
            write_attr(&mut self.attrs, attr.tag(), value)?;
        }
        self.check_attr_size()
    }

    fn unmapped_records(
        &mut self,
        best: Option<&Transcript>,
        reason: UnmappedReason,
        mate_mapped: [bool; 2],
        read: &Read,
        out: &mut Vec<u8>,
    ) -> Result<(), Error> {
        let paired = read.is_paired();
        for imate in 0..read.n_mates() {
            if mate_mapped[imate] {
                continue;
            }
            let mut flag = flags::UNMAPPED;
            if paired {
                flag |= flags::PAIRED;
                flag |= if imate == 0 {
                    flags::FIRST_IN_PAIR
                } else {
                    flags::SECOND_IN_PAIR
                };
                if mate_mapped[1 - imate] {
                    if best.is_some_and(|b| b.strand() != 1 - imate) {
                        flag |= flags::MATE_REVERSE;
                    }
                } else {
                    flag |= flags::MATE_UNMAPPED;
                }
            }

            self.attrs.clear();
            write_attr(&mut self.attrs, *b"NH", AttrValue::Int(0))?;
            write_attr(&mut self.attrs, *b"HI", AttrValue::Int(0))?;
            write_attr(&mut self.attrs, *b"AS", AttrValue::Int(best.map_or(0, |b| b.max_score as i64)))?;
            write_attr(&mut self.attrs, *b"nM", AttrValue::Int(best.map_or(0, |b| b.n_mismatch as i64)))?;
            write_attr(&mut self.attrs, *b"uT", AttrValue::Char(reason.tag_char()))?;
            // an empty RG:Z: would name no @RG line, so without a read group the tag is left out
            if let Some(rg) = &self.config.read_group {
                write_attr(&mut self.attrs, SamAttr::ReadGroup.tag(), AttrValue::String(rg.as_bytes()))?;
            }
            self.check_attr_size()?;

            let core = RecordCore {
                ref_id: -1,
                pos: -1,
                bin: UNMAPPED_BIN,
                mapq: 0,
                flag,
                next_ref_id: -1,
                next_pos: -1,
                tlen: 0,
            };
            self.orient_sequence(read, imate, false);
            write_record(out, &core, &read.name, &[], &self.seq, self.quality(read), &self.attrs);
        }
        Ok(())
    }

    fn check_attr_size(&self) -> Result<(), Error> {
        if self.attrs.len() > MAX_ATTR_BYTES {
            return Err(Error::Bug(format!(
                "attribute block of {} bytes exceeds {}",
                self.attrs.len(),
                MAX_ATTR_BYTES
            )));
        }
        Ok(())
    }

    /// Load the mate's original sequence and quality, reverse complemented
    /// when the mate is reported on the opposite strand.
    fn orient_sequence(&mut self, read: &Read, mate_idx: usize, reverse: bool) {
        let mate = &read.mates[mate_idx];
        self.qual.clear();
        if reverse {
            reverse_complement_into(&mut self.seq, &mate.sequence);
            if let Some(q) = &mate.quality {
                self.qual.extend(q.iter().rev());
            }
        } else {
            self.seq.clear();
            self.seq.extend_from_slice(&mate.sequence);
            if let Some(q) = &mate.quality {
                self.qual.extend_from_slice(q);
            }
        }
    }

    fn quality(&self, read: &Read) -> Option<&[u8]> {
        (self.config.write_qualities() && read.has_quality()).then_some(self.qual.as_slice())
    }
}

/// Append one record: core fields, name, CIGAR, packed sequence, quality, attributes.
fn write_record(
    out: &mut Vec<u8>,
    core: &RecordCore,
    name: &str,
    cigar: &[u32],
    seq: &[u8],
    qual: Option<&[u8]>,
    attrs: &[u8],
) {
    let start = out.len();
    out.resize(start + CORE_BYTES, 0);
    let fields = &mut out[start..];
    LittleEndian::write_i32_into(&[0, core.ref_id, core.pos], &mut fields[0..12]);
    LittleEndian::write_u32_into(
        &[
            (core.bin as u32) << 16 | (core.mapq as u32) << 8 | (name.len() as u32 + 1),
            (core.flag as u32) << 16 | cigar.len() as u32,
            seq.len() as u32,
        ],
        &mut fields[12..24],
    );
    LittleEndian::write_i32_into(&[core.next_ref_id, core.next_pos, core.tlen], &mut fields[24..36]);

    out.extend_from_slice(name.as_bytes());
    out.push(0);

    let at = out.len();
    out.resize(at + 4 * cigar.len(), 0);
    LittleEndian::write_u32_into(cigar, &mut out[at..]);

    pack_sequence_into(out, seq);
    match qual {
        Some(q) => out.extend(q.iter().map(|&c| c.saturating_sub(QUALITY_OFFSET))),
        None => out.resize(out.len() + seq.len(), 0xFF),
    }
    out.extend_from_slice(attrs);

    let block_size = (out.len() - start - 4) as i32;
    LittleEndian::write_i32(&mut out[start..start + 4], block_size);
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
