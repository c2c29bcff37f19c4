/// MAPQ (mapping quality) calculation
///
/// Following STAR's step function of the number of loci:
/// - Unique mappers (n=1): use outSAMmapqUnique (default 255)
/// - n=2: 3
/// - n=3 or 4: 1
/// - n>=5: 0

/// Calculate MAPQ score based on number of alignments
///
/// # Arguments
/// * `n_alignments` - Number of loci reported for this read
/// * `mapq_unique` - MAPQ value for unique mappers (typically 255)
///
/// # Returns
/// MAPQ score (0-255)
pub fn calculate_mapq(n_alignments: usize, mapq_unique: u8) -> u8 {
    match n_alignments {
        0 | 1 => mapq_unique,
        2 => 3,
        3 | 4 => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapq_unique() {
        assert_eq!(calculate_mapq(1, 255), 255);
        assert_eq!(calculate_mapq(1, 60), 60);
    }

    #[test]
    fn test_mapq_multi() {
        assert_eq!(calculate_mapq(2, 255), 3);
        assert_eq!(calculate_mapq(3, 255), 1);
        assert_eq!(calculate_mapq(4, 255), 1);
        assert_eq!(calculate_mapq(5, 255), 0);
        assert_eq!(calculate_mapq(100, 255), 0);
    }

    #[test]
    fn test_mapq_independent_of_unique_value() {
        for n in 2..10 {
            assert_eq!(calculate_mapq(n, 255), calculate_mapq(n, 50));
        }
    }
}
