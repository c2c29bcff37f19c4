use crate::error::Error;
use crate::io::fastq::encode_base;

/// STAR's genome spacing character (used for inter-chromosome padding).
pub const GENOME_SPACING_CHAR: u8 = 5;

/// Packed genome with chromosome metadata.
///
/// The genome sequence is stored as one byte per base:
/// - A=0, C=1, G=2, T=3, N=4, padding=5
/// - Chromosomes are concatenated with padding to bin boundaries
pub struct Genome {
    /// Forward genome (0..n_genome).
    pub sequence: Vec<u8>,

    /// Total length of the padded genome.
    pub n_genome: u64,

    /// Number of real chromosomes.
    pub n_chr_real: usize,

    /// Chromosome names.
    pub chr_name: Vec<String>,

    /// True (unpadded) chromosome lengths.
    pub chr_length: Vec<u64>,

    /// Padded start positions of each chromosome in the genome.
    /// Length = n_chr_real + 1; the last entry is n_genome (total size).
    pub chr_start: Vec<u64>,
}

impl Genome {
    /// Build a genome from named ASCII sequences, matching STAR's layout.
    ///
    /// # Arguments
    /// - `chromosomes`: (name, sequence) pairs in output order
    /// - `bin_nbits`: log2 of the padding bin size (genomeChrBinNbits)
    pub fn from_sequences(chromosomes: &[(&str, &[u8])], bin_nbits: u32) -> Result<Self, Error> {
        let bin_size = 1u64 << bin_nbits;

        let mut chr_name = Vec::with_capacity(chromosomes.len());
        let mut chr_length = Vec::with_capacity(chromosomes.len());
        let mut chr_start = Vec::with_capacity(chromosomes.len() + 1);

        let mut n: u64 = 0; // current position in the padded genome

        for (name, seq) in chromosomes {
            let len = seq.len() as u64;

            if len == 0 {
                return Err(Error::Parameter(format!(
                    "chromosome '{}' has zero length",
                    name
                )));
            }

            // Apply STAR's padding formula before this chromosome (except for the first)
            if n > 0 {
                n = ((n + 1) / bin_size + 1) * bin_size;
            }

            chr_name.push(name.to_string());
            chr_length.push(len);
            chr_start.push(n);

            n += len;
        }

        n = ((n + 1) / bin_size + 1) * bin_size;
        let n_genome = n;
        chr_start.push(n_genome);

        let mut sequence = vec![GENOME_SPACING_CHAR; n_genome as usize];
        for (i, (_, seq)) in chromosomes.iter().enumerate() {
            let start = chr_start[i] as usize;
            for (dst, &base) in sequence[start..start + seq.len()].iter_mut().zip(seq.iter()) {
                *dst = encode_base(base);
            }
        }

        Ok(Genome {
            sequence,
            n_genome,
            n_chr_real: chromosomes.len(),
            chr_name,
            chr_length,
            chr_start,
        })
    }

    /// Access a base from the genome.
    ///
    /// # Returns
    /// The base value (0-3 for ACGT, 4 for N, 5 for padding), or None if out of bounds.
    pub fn get_base(&self, pos: u64) -> Option<u8> {
        if pos < self.sequence.len() as u64 {
            Some(self.sequence[pos as usize])
        } else {
            None
        }
    }

    /// Padded start offset of chromosome `chr`.
    pub fn chr_start(&self, chr: usize) -> Result<u64, Error> {
        if chr >= self.n_chr_real {
            return Err(Error::Bug(format!(
                "invalid chromosome index {} (genome has {})",
                chr, self.n_chr_real
            )));
        }
        Ok(self.chr_start[chr])
    }

    /// Get the chromosome containing a given genomic position.
    ///
    /// # Returns
    /// `(chr_index, offset_within_chr)` or None if position is in padding.
    pub fn position_to_chr(&self, pos: u64) -> Option<(usize, u64)> {
        // chr_start is sorted; find the last chromosome starting at or before pos
        let idx = self.chr_start[..self.n_chr_real].partition_point(|&s| s <= pos);
        let chr = idx.checked_sub(1)?;
        let offset = pos - self.chr_start[chr];
        (offset < self.chr_length[chr]).then_some((chr, offset))
    }
}
