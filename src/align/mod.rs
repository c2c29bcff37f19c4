pub mod read_output;
pub mod transcript;

// Re-export commonly used types
pub use read_output::{
    filter_outcome, OutputWorker, ReadAlignments, ReadOutcome, ReadOutput, SharedOutputs,
};
pub use transcript::{Exon, JunctionType, MateOrientation, Transcript};
