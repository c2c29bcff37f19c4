pub mod bam;
pub mod bam_attr;
pub mod bam_record;
pub mod cigar;
pub mod fastq;
pub mod fastx_out;
pub mod md;

pub use bam::BamWriter;
pub use bam_record::{MateLocus, RecordEncoder};
pub use fastq::{Mate, Read};
pub use fastx_out::MateStreams;
