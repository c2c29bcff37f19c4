use std::path::PathBuf;

use clap::Parser;

use crate::error::Error;
use crate::io::bam_attr::SamAttr;

// ---------------------------------------------------------------------------
// SAM output type enums
// ---------------------------------------------------------------------------

/// STAR's `--outSAMtype` format component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutSamFormat {
    Sam,
    Bam,
    None,
}

/// STAR's `--outSAMtype` sort order component (only applies to BAM).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutSamSortOrder {
    Unsorted,
    SortedByCoordinate,
}

/// Combined `--outSAMtype` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutSamType {
    pub format: OutSamFormat,
    pub sort_order: Option<OutSamSortOrder>,
}

impl std::fmt::Display for OutSamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.format, &self.sort_order) {
            (OutSamFormat::Sam, _) => write!(f, "SAM"),
            (OutSamFormat::None, _) => write!(f, "None"),
            (OutSamFormat::Bam, Some(OutSamSortOrder::SortedByCoordinate)) => {
                write!(f, "BAM SortedByCoordinate")
            }
            (OutSamFormat::Bam, _) => write!(f, "BAM Unsorted"),
        }
    }
}

// ---------------------------------------------------------------------------
// SAM record mode
// ---------------------------------------------------------------------------

/// STAR's `--outSAMmode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutSamMode {
    #[default]
    Full,
    /// Full records without base qualities
    NoQS,
    /// No records at all
    None,
}

impl std::str::FromStr for OutSamMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Full" => Ok(Self::Full),
            "NoQS" => Ok(Self::NoQS),
            "None" => Ok(Self::None),
            _ => Err(format!("unknown outSAMmode value: '{s}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// SAM unmapped output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutSamUnmapped {
    #[default]
    None,
    Within,
    WithinKeepPairs,
}

impl std::str::FromStr for OutSamUnmapped {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "Within" => Ok(Self::Within),
            "Within KeepPairs" => Ok(Self::WithinKeepPairs),
            _ => Err(format!("unknown outSAMunmapped value: '{s}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Strand field
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutSamStrandField {
    #[default]
    None,
    /// Emit `XS` derived from the junction motifs
    IntronMotif,
}

impl std::str::FromStr for OutSamStrandField {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "intronMotif" => Ok(Self::IntronMotif),
            _ => Err(format!("unknown outSAMstrandField value: '{s}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Output filter type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutFilterType {
    #[default]
    Normal,
    BySJout,
}

impl std::str::FromStr for OutFilterType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Normal" => Ok(Self::Normal),
            "BySJout" => Ok(Self::BySJout),
            _ => Err(format!("unknown outFilterType value: '{s}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Junction collection filter
// ---------------------------------------------------------------------------

/// STAR's `--outSJfilterReads`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutSjFilterReads {
    /// Collect junctions from all emitted alignments
    #[default]
    All,
    /// Collect junctions from uniquely mapped reads only
    Unique,
}

impl std::str::FromStr for OutSjFilterReads {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "All" => Ok(Self::All),
            "Unique" => Ok(Self::Unique),
            _ => Err(format!("unknown outSJfilterReads value: '{s}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Unmapped reads side files
// ---------------------------------------------------------------------------

/// STAR's `--outReadsUnmapped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutReadsUnmapped {
    #[default]
    None,
    Fastx,
}

impl std::str::FromStr for OutReadsUnmapped {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "Fastx" => Ok(Self::Fastx),
            _ => Err(format!("unknown outReadsUnmapped value: '{s}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Parameters struct
// ---------------------------------------------------------------------------

/// Output-stage parameters, matching STAR's `--camelCase` argument names.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ruSTAR",
    about = "Alignment output stage of the ruSTAR RNA-seq aligner",
    version
)]
pub struct Parameters {
    // ── Output ──────────────────────────────────────────────────────────
    /// Output file name prefix (including path)
    #[arg(long = "outFileNamePrefix", default_value = "./")]
    pub out_file_name_prefix: PathBuf,

    /// Output type: SAM, BAM Unsorted, BAM SortedByCoordinate, None.
    /// Provide as space-separated tokens, e.g. "BAM SortedByCoordinate".
    #[arg(long = "outSAMtype", num_args = 1..=2, default_values_t = vec!["SAM".to_string()])]
    pub out_sam_type_raw: Vec<String>,

    /// Record mode: Full, NoQS (no qualities) or None
    #[arg(long = "outSAMmode", default_value = "Full")]
    pub out_sam_mode: OutSamMode,

    /// Strand field: None or intronMotif
    #[arg(long = "outSAMstrandField", default_value = "None")]
    pub out_sam_strand_field: OutSamStrandField,

    /// SAM attributes to include (Standard, All, None, or explicit list)
    #[arg(long = "outSAMattributes", num_args = 1.., default_values_t = vec!["Standard".to_string()])]
    pub out_sam_attributes: Vec<String>,

    /// Read group line (without @RG); its ID: value is written as the RG attribute
    #[arg(long = "outSAMattrRGline", num_args = 1..)]
    pub out_sam_attr_rg_line: Vec<String>,

    /// Unmapped reads in record output: None, Within or "Within KeepPairs"
    #[arg(long = "outSAMunmapped", num_args = 1..=2, default_values_t = vec!["None".to_string()])]
    pub out_sam_unmapped_raw: Vec<String>,

    /// MAPQ value for unique mappers
    #[arg(long = "outSAMmapqUnique", default_value_t = 255)]
    pub out_sam_mapq_unique: u8,

    /// Output filter type: Normal or BySJout
    #[arg(long = "outFilterType", default_value = "Normal")]
    pub out_filter_type: OutFilterType,

    /// Max multimap loci (reads mapping to more loci are unmapped)
    #[arg(long = "outFilterMultimapNmax", default_value_t = 10)]
    pub out_filter_multimap_nmax: u32,

    /// Max mismatches per pair
    #[arg(long = "outFilterMismatchNmax", default_value_t = 10)]
    pub out_filter_mismatch_nmax: u32,

    /// Max ratio of mismatches to mapped length
    #[arg(long = "outFilterMismatchNoverLmax", default_value_t = 0.3)]
    pub out_filter_mismatch_nover_lmax: f64,

    /// Min alignment score (absolute)
    #[arg(long = "outFilterScoreMin", default_value_t = 0, allow_hyphen_values = true)]
    pub out_filter_score_min: i32,

    /// Min alignment score normalized to read length
    #[arg(long = "outFilterScoreMinOverLread", default_value_t = 0.66)]
    pub out_filter_score_min_over_lread: f64,

    /// Min matched bases (absolute)
    #[arg(long = "outFilterMatchNmin", default_value_t = 0)]
    pub out_filter_match_nmin: u32,

    /// Min matched bases normalized to read length
    #[arg(long = "outFilterMatchNminOverLread", default_value_t = 0.66)]
    pub out_filter_match_nmin_over_lread: f64,

    /// Which reads feed the junction summaries: All or Unique
    #[arg(long = "outSJfilterReads", default_value = "All")]
    pub out_sj_filter_reads: OutSjFilterReads,

    /// Unmapped reads side files: None or Fastx
    #[arg(long = "outReadsUnmapped", default_value = "None")]
    pub out_reads_unmapped: OutReadsUnmapped,
}

impl Parameters {
    /// Parse the raw `--outSAMtype` tokens into a structured `OutSamType`.
    pub fn out_sam_type(&self) -> Result<OutSamType, String> {
        match self
            .out_sam_type_raw
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .as_slice()
        {
            ["SAM"] => Ok(OutSamType {
                format: OutSamFormat::Sam,
                sort_order: None,
            }),
            ["None"] => Ok(OutSamType {
                format: OutSamFormat::None,
                sort_order: None,
            }),
            ["BAM", "Unsorted"] => Ok(OutSamType {
                format: OutSamFormat::Bam,
                sort_order: Some(OutSamSortOrder::Unsorted),
            }),
            ["BAM", "SortedByCoordinate"] => Ok(OutSamType {
                format: OutSamFormat::Bam,
                sort_order: Some(OutSamSortOrder::SortedByCoordinate),
            }),
            other => Err(format!("unknown outSAMtype: {:?}", other)),
        }
    }

    /// Parse the raw `--outSAMunmapped` tokens.
    pub fn out_sam_unmapped(&self) -> Result<OutSamUnmapped, String> {
        self.out_sam_unmapped_raw.join(" ").parse()
    }

    /// Read group line with fields tab-separated, if one was given.
    pub fn read_group_line(&self) -> Option<String> {
        match self.out_sam_attr_rg_line.as_slice() {
            [] => None,
            [first] if first == "-" => None,
            fields => Some(fields.join("\t")),
        }
    }

    /// Value of the `ID:` field of the read group line.
    pub fn read_group_id(&self) -> Option<String> {
        self.out_sam_attr_rg_line
            .iter()
            .find_map(|field| field.strip_prefix("ID:"))
            .map(str::to_string)
    }

    /// Resolve `--outSAMattributes` into the ordered attribute list.
    ///
    /// `RG` is appended when a read group line is set, `XS` when the strand
    /// field is `intronMotif`.
    pub fn sam_attributes(&self) -> Result<Vec<SamAttr>, Error> {
        let mut attrs: Vec<SamAttr> = match self
            .out_sam_attributes
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .as_slice()
        {
            ["None"] => Vec::new(),
            ["Standard"] => vec![
                SamAttr::NumHits,
                SamAttr::HitIndex,
                SamAttr::AlignmentScore,
                SamAttr::Mismatches,
            ],
            ["All"] => vec![
                SamAttr::NumHits,
                SamAttr::HitIndex,
                SamAttr::AlignmentScore,
                SamAttr::Mismatches,
                SamAttr::EditDistance,
                SamAttr::MismatchString,
                SamAttr::JunctionMotifs,
                SamAttr::JunctionIntrons,
            ],
            list => list
                .iter()
                .map(|s| s.parse::<SamAttr>())
                .collect::<Result<_, _>>()?,
        };

        if self.read_group_id().is_some() && !attrs.contains(&SamAttr::ReadGroup) {
            log::warn!("--outSAMattrRGline defines RG, therefore the RG attribute will be output");
            attrs.push(SamAttr::ReadGroup);
        }
        if self.out_sam_strand_field == OutSamStrandField::IntronMotif
            && !attrs.contains(&SamAttr::MotifStrand)
        {
            attrs.push(SamAttr::MotifStrand);
        }
        Ok(attrs)
    }

    /// Validate parameter combinations that clap alone cannot enforce.
    pub fn validate(&self) -> Result<(), Error> {
        // Validate outSAMtype
        let sam_type = self.out_sam_type().map_err(Error::Parameter)?;
        self.out_sam_unmapped().map_err(Error::Parameter)?;

        if self.read_group_line().is_some() && self.read_group_id().is_none() {
            return Err(Error::Parameter(
                "--outSAMattrRGline must contain an ID: field".into(),
            ));
        }

        let attrs = self.sam_attributes()?;
        if attrs.contains(&SamAttr::ReadGroup) && self.read_group_id().is_none() {
            return Err(Error::Parameter(
                "--outSAMattributes contains RG but --outSAMattrRGline is not set".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.out_filter_mismatch_nover_lmax) {
            return Err(Error::Parameter(
                "--outFilterMismatchNoverLmax must be within [0, 1]".into(),
            ));
        }

        if sam_type.format == OutSamFormat::Sam {
            log::warn!("--outSAMtype SAM: text records are not produced by this stage, only BAM");
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Resolved output configuration
// ---------------------------------------------------------------------------

/// Thresholds of the mapped/unmapped decision.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterThresholds {
    pub score_min: i32,
    pub score_min_over_lread: f64,
    pub match_nmin: u32,
    pub match_nmin_over_lread: f64,
    pub mismatch_nmax: u32,
    pub mismatch_nover_lmax: f64,
    pub multimap_nmax: u32,
}

/// Immutable per-run configuration of the output stage, shared by all workers.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// BAM records are produced
    pub record_output: bool,
    pub sam_mode: OutSamMode,
    /// Attributes of mapped records, in output order
    pub attributes: Vec<SamAttr>,
    /// `RG` attribute value
    pub read_group: Option<String>,
    /// Full read group line for the header
    pub read_group_line: Option<String>,
    pub mapq_unique: u8,
    pub unmapped: OutSamUnmapped,
    pub reads_unmapped: OutReadsUnmapped,
    pub sj_filter_reads: OutSjFilterReads,
    /// 1 while reads with novel junctions are held back (first BySJout pass), else 0
    pub sj_filter_stage: u8,
    pub filter: FilterThresholds,
}

impl OutputConfig {
    /// Resolve and validate the parameters of one run.
    pub fn from_params(params: &Parameters) -> Result<Self, Error> {
        params.validate()?;

        let sam_type = params.out_sam_type().map_err(Error::Parameter)?;
        let unmapped = params.out_sam_unmapped().map_err(Error::Parameter)?;
        let record_output =
            sam_type.format == OutSamFormat::Bam && params.out_sam_mode != OutSamMode::None;

        if unmapped != OutSamUnmapped::None && !record_output {
            log::warn!("--outSAMunmapped {} has no effect without BAM record output", params.out_sam_unmapped_raw.join(" "));
        }

        Ok(Self {
            record_output,
            sam_mode: params.out_sam_mode,
            attributes: params.sam_attributes()?,
            read_group: params.read_group_id(),
            read_group_line: params.read_group_line(),
            mapq_unique: params.out_sam_mapq_unique,
            unmapped,
            reads_unmapped: params.out_reads_unmapped,
            sj_filter_reads: params.out_sj_filter_reads,
            sj_filter_stage: u8::from(params.out_filter_type == OutFilterType::BySJout),
            filter: FilterThresholds {
                score_min: params.out_filter_score_min,
                score_min_over_lread: params.out_filter_score_min_over_lread,
                match_nmin: params.out_filter_match_nmin,
                match_nmin_over_lread: params.out_filter_match_nmin_over_lread,
                mismatch_nmax: params.out_filter_mismatch_nmax,
                mismatch_nover_lmax: params.out_filter_mismatch_nover_lmax,
                multimap_nmax: params.out_filter_multimap_nmax,
            },
        })
    }

    /// Configuration of the second BySJout pass: held reads are now emitted.
    pub fn second_pass(&self) -> Self {
        Self {
            sj_filter_stage: 2,
            ..self.clone()
        }
    }

    /// NM or MD must be computed.
    pub fn needs_edit_tags(&self) -> bool {
        self.attributes
            .iter()
            .any(|a| matches!(a, SamAttr::EditDistance | SamAttr::MismatchString))
    }

    /// Inline unmapped records requested.
    pub fn unmapped_within(&self) -> bool {
        self.record_output && self.unmapped != OutSamUnmapped::None
    }

    /// Base qualities are written (otherwise 0xFF).
    pub fn write_qualities(&self) -> bool {
        self.sam_mode != OutSamMode::NoQS
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: parse a STAR-style command line (without program name).
    fn parse(args: &[&str]) -> Parameters {
        let mut full = vec!["ruSTAR"];
        full.extend_from_slice(args);
        Parameters::parse_from(full)
    }

    #[test]
    fn defaults() {
        let p = parse(&[]);
        assert_eq!(p.out_file_name_prefix, PathBuf::from("./"));
        assert_eq!(p.out_sam_type_raw, vec!["SAM".to_string()]);
        assert_eq!(p.out_sam_mode, OutSamMode::Full);
        assert_eq!(p.out_sam_strand_field, OutSamStrandField::None);
        assert_eq!(p.out_sam_attributes, vec!["Standard".to_string()]);
        assert!(p.out_sam_attr_rg_line.is_empty());
        assert_eq!(p.out_sam_unmapped().unwrap(), OutSamUnmapped::None);
        assert_eq!(p.out_sam_mapq_unique, 255);
        assert_eq!(p.out_filter_type, OutFilterType::Normal);
        assert_eq!(p.out_filter_multimap_nmax, 10);
        assert_eq!(p.out_filter_mismatch_nmax, 10);
        assert!((p.out_filter_mismatch_nover_lmax - 0.3).abs() < f64::EPSILON);
        assert_eq!(p.out_filter_score_min, 0);
        assert!((p.out_filter_score_min_over_lread - 0.66).abs() < f64::EPSILON);
        assert_eq!(p.out_filter_match_nmin, 0);
        assert!((p.out_filter_match_nmin_over_lread - 0.66).abs() < f64::EPSILON);
        assert_eq!(p.out_sj_filter_reads, OutSjFilterReads::All);
        assert_eq!(p.out_reads_unmapped, OutReadsUnmapped::None);
    }

    #[test]
    fn typical_output_command() {
        let p = parse(&[
            "--outSAMtype",
            "BAM",
            "Unsorted",
            "--outSAMunmapped",
            "Within",
            "KeepPairs",
            "--outSAMattributes",
            "NH",
            "HI",
            "NM",
            "MD",
            "--outSAMattrRGline",
            "ID:rg1",
            "SM:sample",
            "--outFilterType",
            "BySJout",
            "--outSJfilterReads",
            "Unique",
            "--outReadsUnmapped",
            "Fastx",
        ]);
        let sam_type = p.out_sam_type().unwrap();
        assert_eq!(sam_type.format, OutSamFormat::Bam);
        assert_eq!(sam_type.to_string(), "BAM Unsorted");
        assert_eq!(p.out_sam_unmapped().unwrap(), OutSamUnmapped::WithinKeepPairs);
        assert_eq!(p.read_group_id(), Some("rg1".to_string()));
        assert_eq!(p.read_group_line(), Some("ID:rg1\tSM:sample".to_string()));

        let config = OutputConfig::from_params(&p).unwrap();
        assert!(config.record_output);
        assert!(config.unmapped_within());
        assert!(config.needs_edit_tags());
        assert_eq!(
            config.attributes,
            vec![
                SamAttr::NumHits,
                SamAttr::HitIndex,
                SamAttr::EditDistance,
                SamAttr::MismatchString,
                SamAttr::ReadGroup
            ]
        );
        assert_eq!(config.read_group.as_deref(), Some("rg1"));
        assert_eq!(config.sj_filter_stage, 1);
        assert_eq!(config.second_pass().sj_filter_stage, 2);
        assert_eq!(config.sj_filter_reads, OutSjFilterReads::Unique);
        assert_eq!(config.reads_unmapped, OutReadsUnmapped::Fastx);
    }

    #[test]
    fn attribute_sets() {
        let p = parse(&["--outSAMattributes", "All"]);
        let attrs = p.sam_attributes().unwrap();
        assert_eq!(attrs.len(), 8);
        assert_eq!(attrs[4], SamAttr::EditDistance);

        let p = parse(&["--outSAMattributes", "None"]);
        assert!(p.sam_attributes().unwrap().is_empty());

        let p = parse(&["--outSAMstrandField", "intronMotif"]);
        assert_eq!(
            p.sam_attributes().unwrap().last(),
            Some(&SamAttr::MotifStrand)
        );
    }

    #[test]
    fn unknown_attribute_is_config_error() {
        let p = parse(&["--outSAMattributes", "NH", "ch"]);
        assert!(matches!(p.validate(), Err(Error::Parameter(_))));
        assert!(OutputConfig::from_params(&p).is_err());
    }

    #[test]
    fn rg_attribute_needs_line() {
        let p = parse(&["--outSAMattributes", "NH", "RG"]);
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("outSAMattrRGline"));
    }

    #[test]
    fn unknown_mode_rejected_by_parser() {
        let full = vec!["ruSTAR", "--outSAMmode", "Compact"];
        assert!(Parameters::try_parse_from(full).is_err());
    }

    #[test]
    fn out_sam_type_parsing() {
        let p = parse(&["--outSAMtype", "SAM"]);
        let t = p.out_sam_type().unwrap();
        assert_eq!(t.format, OutSamFormat::Sam);
        assert_eq!(t.sort_order, None);

        let p = parse(&["--outSAMtype", "BAM", "SortedByCoordinate"]);
        let t = p.out_sam_type().unwrap();
        assert_eq!(t.format, OutSamFormat::Bam);
        assert_eq!(t.sort_order, Some(OutSamSortOrder::SortedByCoordinate));

        let p = parse(&["--outSAMtype", "None"]);
        let config = OutputConfig::from_params(&p).unwrap();
        assert!(!config.record_output);

        let p = parse(&["--outSAMtype", "BAM", "Sorted"]);
        assert!(p.validate().is_err());
    }

    #[test]
    fn no_qs_mode() {
        let p = parse(&["--outSAMtype", "BAM", "Unsorted", "--outSAMmode", "NoQS"]);
        let config = OutputConfig::from_params(&p).unwrap();
        assert!(config.record_output);
        assert!(!config.write_qualities());
        assert!(!config.needs_edit_tags());
    }
}
