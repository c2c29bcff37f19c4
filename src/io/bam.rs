/// BAM output writer with noodles (streaming, unsorted)
use crate::error::Error;
use crate::genome::Genome;
use crate::params::OutputConfig;
use noodles::bam;
use noodles::sam;
use noodles::sam::alignment::io::Write as SamWrite;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// SAM header version written in @HD
const SAM_VERSION: &str = "1.4";

/// BAM file writer (streaming, unsorted)
///
/// Records arrive already encoded by [`crate::io::bam_record::RecordEncoder`]
/// and are appended to the BGZF stream as raw bytes, in the order the
/// workers hand them over. Sort with `samtools sort` if needed.
pub struct BamWriter {
    writer: bam::io::Writer<noodles::bgzf::Writer<BufWriter<File>>>,
    header: sam::Header,
    path: PathBuf,
    bytes_written: u64,
}

impl BamWriter {
    /// Create a new BAM writer and write the header
    ///
    /// # Arguments
    /// * `output_path` - Path to output BAM file
    /// * `genome` - Chromosome names and lengths for @SQ
    /// * `config` - Output configuration (for @RG)
    pub fn create(output_path: &Path, genome: &Genome, config: &OutputConfig) -> Result<Self, Error> {
        let file = File::create(output_path).map_err(|e| Error::io(e, output_path))?;
        let buf_writer = BufWriter::new(file);

        let header = build_sam_header(genome, config)?;

        // Writer::new handles BGZF compression internally
        let mut writer = bam::io::Writer::new(buf_writer);
        writer
            .write_header(&header)
            .map_err(|e| Error::io(e, output_path))?;

        log::info!("Writing BAM records to {}", output_path.display());

        Ok(Self {
            writer,
            header,
            path: output_path.to_path_buf(),
            bytes_written: 0,
        })
    }

    /// Default output file: `{prefix}Aligned.out.bam`
    pub fn default_path(prefix: &Path) -> PathBuf {
        let mut name = prefix.as_os_str().to_os_string();
        name.push("Aligned.out.bam");
        PathBuf::from(name)
    }

    pub fn header(&self) -> &sam::Header {
        &self.header
    }

    /// Append a block of encoded records (one worker's output buffer)
    pub fn write_raw(&mut self, records: &[u8]) -> Result<(), Error> {
        self.writer
            .get_mut()
            .write_all(records)
            .map_err(|e| Error::io(e, &self.path))?;
        self.bytes_written += records.len() as u64;
        Ok(())
    }

    /// Flush and close BAM file
    pub fn finish(mut self) -> Result<(), Error> {
        self.writer
            .finish(&self.header)
            .map_err(|e| Error::io(e, &self.path))?;
        log::info!(
            "BAM file written successfully: {} ({} record bytes)",
            self.path.display(),
            self.bytes_written
        );
        Ok(())
    }
}

/// Build the SAM header: @HD, one @SQ per chromosome, @RG when configured, @PG
pub fn build_sam_header(genome: &Genome, config: &OutputConfig) -> Result<sam::Header, Error> {
    let mut text = format!("@HD\tVN:{}\n", SAM_VERSION);

    for i in 0..genome.n_chr_real {
        let name = &genome.chr_name[i];
        let length = genome.chr_length[i];
        if length == 0 {
            return Err(Error::Parameter(format!("chromosome {} has zero length", name)));
        }
        text.push_str(&format!("@SQ\tSN:{}\tLN:{}\n", name, length));
    }

    if let Some(rg) = &config.read_group_line {
        text.push_str(&format!("@RG\t{}\n", rg));
    }

    text.push_str(&format!(
        "@PG\tID:{}\tPN:{}\tVN:{}\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    ));

    text.parse::<sam::Header>()
        .map_err(|e| Error::Parameter(format!("invalid SAM header: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameters;
    use clap::Parser;
    use tempfile::NamedTempFile;

    fn create_test_genome() -> Genome {
        Genome::from_sequences(&[("chr1", b"ACGTACGT"), ("chr2", b"GGGG")], 4).unwrap()
    }

    fn create_test_config(args: &[&str]) -> OutputConfig {
        let mut full = vec!["ruSTAR", "--outSAMtype", "BAM", "Unsorted"];
        full.extend_from_slice(args);
        OutputConfig::from_params(&Parameters::parse_from(full)).unwrap()
    }

    #[test]
    fn test_build_sam_header() {
        let genome = create_test_genome();
        let header = build_sam_header(&genome, &create_test_config(&[])).unwrap();
        assert!(header.header().is_some());
        assert_eq!(header.reference_sequences().len(), 2);
        assert!(header.read_groups().is_empty());
    }

    #[test]
    fn test_header_read_group() {
        let genome = create_test_genome();
        let config = create_test_config(&["--outSAMattrRGline", "ID:rg1", "SM:sample"]);
        let header = build_sam_header(&genome, &config).unwrap();
        assert_eq!(header.read_groups().len(), 1);
        assert!(header.read_groups().keys().any(|id| id.as_slice() == b"rg1"));
    }

    #[test]
    fn test_bam_writer_creation() {
        let genome = create_test_genome();
        let config = create_test_config(&[]);
        let temp_file = NamedTempFile::new().unwrap();

        let writer = BamWriter::create(temp_file.path(), &genome, &config);
        assert!(writer.is_ok(), "BAM writer creation should succeed");
        assert!(writer.unwrap().finish().is_ok());
    }

    #[test]
    fn test_default_path() {
        assert_eq!(
            BamWriter::default_path(Path::new("out/sample_")),
            PathBuf::from("out/sample_Aligned.out.bam")
        );
    }
}
