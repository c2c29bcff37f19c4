/// Reads as seen by the output stage: original mates plus the combined numeric read
use crate::error::Error;
use std::io::Write;

/// Longest supported mate, in bases.
pub const MAX_READ_LENGTH: usize = 650;

/// Numeric base separating the two mates in the combined read.
pub const MATE_SPACER_BASE: u8 = 11;

/// Offset of ASCII-encoded Phred qualities.
pub const QUALITY_OFFSET: u8 = 33;

/// One sequenced fragment of a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mate {
    /// Original (untrimmed) ASCII sequence
    pub sequence: Vec<u8>,
    /// Original ASCII Phred+33 qualities; None for FASTA input
    pub quality: Option<Vec<u8>>,
    /// Bases trimmed from the 5' end
    pub clip5p: u32,
    /// Bases trimmed from the 3' end
    pub clip3p: u32,
}

impl Mate {
    pub fn new(sequence: &[u8], quality: Option<&[u8]>) -> Self {
        Self {
            sequence: sequence.to_vec(),
            quality: quality.map(<[u8]>::to_vec),
            clip5p: 0,
            clip3p: 0,
        }
    }

    /// Set the clips; the 5' clip is applied first and both are capped at
    /// the mate length.
    pub fn with_clips(mut self, clip5p: u32, clip3p: u32) -> Self {
        self.clip5p = clip5p;
        self.clip3p = clip3p;
        self.clamp_clips();
        self
    }

    fn clamp_clips(&mut self) {
        let len = self.original_len();
        self.clip5p = self.clip5p.min(len);
        self.clip3p = self.clip3p.min(len - self.clip5p);
    }

    /// Untrimmed length.
    pub fn original_len(&self) -> u32 {
        self.sequence.len() as u32
    }

    /// Length after 5'/3' trimming.
    pub fn trimmed_len(&self) -> u32 {
        self.original_len()
            .saturating_sub(self.clip5p.saturating_add(self.clip3p))
    }

    /// Trimmed part of the sequence.
    pub fn trimmed(&self) -> &[u8] {
        let start = (self.clip5p as usize).min(self.sequence.len());
        &self.sequence[start..start + self.trimmed_len() as usize]
    }
}

/// A single- or paired-end read
#[derive(Debug, Clone)]
pub struct Read {
    /// Read name without the leading `@`/`>` and without mate suffix
    pub name: String,
    /// One or two mates
    pub mates: Vec<Mate>,
    /// Combined numeric read in both orientations: `[forward, reverse complement]`.
    /// Forward is trimmed mate 1, a spacer, then trimmed mate 2 reverse complemented.
    combined: [Vec<u8>; 2],
}

impl Read {
    /// Build a read and its combined numeric sequence.
    ///
    /// Rejects reads with more than two mates, mates longer than
    /// [`MAX_READ_LENGTH`], names containing NUL, and quality strings whose
    /// length differs from the sequence. Clips longer than a mate are capped.
    pub fn new(name: &str, mut mates: Vec<Mate>) -> Result<Self, Error> {
        if mates.is_empty() || mates.len() > 2 {
            return Err(Error::Read(format!(
                "read {} has {} mates; only single- and paired-end reads are supported",
                name,
                mates.len()
            )));
        }
        if name.as_bytes().contains(&0) {
            return Err(Error::Read(format!("read name {:?} contains NUL", name)));
        }
        if name.len() >= u8::MAX as usize {
            return Err(Error::Read(format!(
                "read name {} is longer than {} characters",
                name,
                u8::MAX - 1
            )));
        }
        for (i, mate) in mates.iter_mut().enumerate() {
            mate.clamp_clips();
            if mate.sequence.len() > MAX_READ_LENGTH {
                return Err(Error::Read(format!(
                    "mate {} of read {} has length {}, maximum supported is {}",
                    i + 1,
                    name,
                    mate.sequence.len(),
                    MAX_READ_LENGTH
                )));
            }
            if let Some(qual) = &mate.quality {
                if qual.len() != mate.sequence.len() {
                    return Err(Error::Read(format!(
                        "mate {} of read {}: quality length {} differs from sequence length {}",
                        i + 1,
                        name,
                        qual.len(),
                        mate.sequence.len()
                    )));
                }
            }
        }

        let mut forward: Vec<u8> = mates[0].trimmed().iter().map(|&b| encode_base(b)).collect();
        if let Some(mate2) = mates.get(1) {
            forward.push(MATE_SPACER_BASE);
            forward.extend(
                mate2
                    .trimmed()
                    .iter()
                    .rev()
                    .map(|&b| complement_base(encode_base(b))),
            );
        }
        let reverse = forward.iter().rev().map(|&b| complement_base(b)).collect();

        Ok(Self {
            name: name.to_string(),
            mates,
            combined: [forward, reverse],
        })
    }

    pub fn n_mates(&self) -> usize {
        self.mates.len()
    }

    pub fn is_paired(&self) -> bool {
        self.mates.len() == 2
    }

    /// True if the read came from FASTQ (all mates carry qualities).
    pub fn has_quality(&self) -> bool {
        self.mates.iter().all(|m| m.quality.is_some())
    }

    /// Combined numeric read in the given orientation (0 forward, 1 reverse).
    pub fn combined(&self, strand: usize) -> &[u8] {
        &self.combined[strand.min(1)]
    }

    /// Length of the combined read (Lread).
    pub fn combined_len(&self) -> u32 {
        self.combined[0].len() as u32
    }

    /// Sum of the trimmed mate lengths.
    pub fn trimmed_bases(&self) -> u64 {
        self.mates.iter().map(|m| m.trimmed_len() as u64).sum()
    }
}

/// Convert FASTQ base character to genome encoding
///
/// # Arguments
/// * `base` - ASCII base character (A, C, G, T, N, or lowercase variants)
///
/// # Returns
/// Encoded base: 0=A, 1=C, 2=G, 3=T, 4=N (or any ambiguous base)
pub fn encode_base(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' => 3,
        _ => 4, // N or any ambiguous base (R, Y, S, W, K, M, etc.)
    }
}

/// Decode genome encoding to ASCII base character
///
/// # Arguments
/// * `encoded` - Encoded base (0-4)
///
/// # Returns
/// ASCII base character (A, C, G, T, or N)
pub fn decode_base(encoded: u8) -> u8 {
    match encoded {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        3 => b'T',
        _ => b'N',
    }
}

/// Complement a numeric base; N, spacer and padding codes are unchanged.
pub fn complement_base(encoded: u8) -> u8 {
    if encoded < 4 {
        3 - encoded
    } else {
        encoded
    }
}

/// Complement an ASCII nucleotide, IUPAC codes included, preserving case.
pub fn complement_nucleotide(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' | b'U' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'R' => b'Y',
        b'Y' => b'R',
        b'K' => b'M',
        b'M' => b'K',
        b'B' => b'V',
        b'V' => b'B',
        b'D' => b'H',
        b'H' => b'D',
        b'a' => b't',
        b't' | b'u' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        b'r' => b'y',
        b'y' => b'r',
        b'k' => b'm',
        b'm' => b'k',
        b'b' => b'v',
        b'v' => b'b',
        b'd' => b'h',
        b'h' => b'd',
        other => other, // N, S, W and anything unknown
    }
}

/// Reverse complement an ASCII sequence into `dst` (cleared first).
pub fn reverse_complement_into(dst: &mut Vec<u8>, seq: &[u8]) {
    dst.clear();
    dst.extend(seq.iter().rev().map(|&b| complement_nucleotide(b)));
}

/// 4-bit BAM code for each ASCII character (`=ACMGRSVTWYHKDBN` -> 0..15).
const SEQ_CODES: [u8; 256] = build_seq_codes();

const fn build_seq_codes() -> [u8; 256] {
    const BASES: [u8; 16] = *b"=ACMGRSVTWYHKDBN";
    let mut codes = [15u8; 256];
    let mut i = 0;
    while i < BASES.len() {
        codes[BASES[i] as usize] = i as u8;
        codes[BASES[i].to_ascii_lowercase() as usize] = i as u8;
        i += 1;
    }
    codes
}

/// Pack ASCII bases two per byte, first base in the high nibble.
pub fn pack_sequence_into(dst: &mut Vec<u8>, bases: &[u8]) {
    dst.reserve(bases.len().div_ceil(2));
    let mut pairs = bases.chunks_exact(2);
    for pair in pairs.by_ref() {
        dst.push((SEQ_CODES[pair[0] as usize] << 4) | SEQ_CODES[pair[1] as usize]);
    }
    if let Some(&last) = pairs.remainder().first() {
        dst.push(SEQ_CODES[last as usize] << 4);
    }
}

/// Write one mate as a FASTQ (or FASTA, without quality) entry named `@name/N`.
///
/// `suffix` is appended to the name line verbatim.
pub fn write_fastx<W: Write>(
    out: &mut W,
    name: &str,
    mate_index: usize,
    mate: &Mate,
    suffix: &str,
) -> std::io::Result<()> {
    let marker = if mate.quality.is_some() { '@' } else { '>' };
    writeln!(out, "{}{}/{}{}", marker, name, mate_index + 1, suffix)?;
    out.write_all(&mate.sequence)?;
    out.write_all(b"\n")?;
    if let Some(qual) = &mate.quality {
        out.write_all(b"+\n")?;
        out.write_all(qual)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}
