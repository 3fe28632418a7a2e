use super::scorer::quality_split;
use crate::qsnp::{
    error::ContigError,
    model::{
        nucleotide::{nuc_to_index, AlleleCounts, NUM_NUCLEOTIDES},
        Contig, Read, Variation,
    },
};
use crate::utils::Config;

/// Minimum reads an allele needs at a position with `informative` calls.
pub fn min_allele_support(informative: u32, config: &Config) -> u32 {
    let relative = (informative as f64 * config.min_reads_per_allele_frac) as u32 + 1;
    relative.max(config.min_reads_per_allele as u32)
}

fn tally(reads: &[Read], active: &[usize], pos: i64) -> AlleleCounts {
    let mut counts = [0; NUM_NUCLEOTIDES];
    for &i in active {
        if let Some(nuc) = reads[i].base_at(pos).and_then(nuc_to_index) {
            counts[nuc] += 1;
        }
    }
    counts
}

/// Finds every polymorphic position of the contig.
///
/// Reads are expected in start order. A position becomes a variation when at least
/// two symbols reach the minimum allele support; the high/low quality split of each
/// new variation is computed from the same active reads.
pub fn call_variations(contig: &mut Contig, config: &Config) -> usize {
    let len = contig.len();
    let mut starts: Vec<Vec<usize>> = vec![Vec::new(); len];
    for (i, read) in contig.reads.iter().enumerate() {
        if let Some(bucket) = starts.get_mut(read.start.max(0) as usize) {
            bucket.push(i);
        }
    }

    let mut variations = Vec::new();
    let mut active: Vec<usize> = Vec::new();
    for (pos, bucket) in starts.iter().enumerate() {
        let signed_pos = pos as i64;
        active.extend(bucket);
        active.retain(|&i| contig.reads[i].end() >= signed_pos);

        let counts = tally(&contig.reads, &active, signed_pos);
        let informative: u32 = counts.iter().sum();
        let min_support = min_allele_support(informative, config);
        if counts.iter().filter(|&&c| c >= min_support).count() < 2 {
            continue;
        }
        match Variation::from_counts(pos, counts) {
            Some(mut var) => {
                let (hq, lq) = quality_split(
                    active.iter().map(|&i| &contig.reads[i]),
                    pos,
                    config.min_snp_quality_score,
                );
                var.set_quality_counts(hq, lq);
                variations.push(var);
            }
            None => {
                let err = ContigError::DegenerateAllele {
                    contig: contig.name.clone(),
                    pos,
                };
                log::error!("{}", err);
            }
        }
    }
    contig.variations = variations;
    contig.variations.len()
}

/// Counts, per read, the variations it covers and the high-confidence ones among them.
pub fn count_read_snps(contig: &mut Contig) {
    for read in contig.reads.iter_mut() {
        read.snp_count = 0;
        read.hq_snp_count = 0;
        for var in contig.variations.iter() {
            if read.base_at(var.pos as i64).is_some() {
                read.snp_count += 1;
                if var.is_high_confidence() {
                    read.hq_snp_count += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contig_with_reads(reference: &[u8], reads: &[(&str, i64, &str)]) -> Contig {
        let mut contig = Contig::new("c1", 20);
        contig.set_sequence(reference);
        for (name, start, seq) in reads {
            contig.add_read(Read::with_sequence(name, *start, seq.as_bytes()));
        }
        contig.sort_reads();
        contig
    }

    #[test]
    fn test_min_allele_support() {
        let config = Config::default();
        assert_eq!(min_allele_support(2, &config), 2);
        assert_eq!(min_allele_support(30, &config), 4);
    }

    #[test]
    fn test_identical_reads_give_no_variation() {
        let mut contig = contig_with_reads(
            b"ACGTACGT",
            &[("r1", 0, "ACGTACGT"), ("r2", 0, "ACGTACGT"), ("r3", 2, "GTAC")],
        );
        assert_eq!(call_variations(&mut contig, &Config::default()), 0);
    }

    #[test]
    fn test_single_read_per_allele_is_not_enough() {
        let mut contig = contig_with_reads(b"ACGT", &[("r1", 0, "ACGT"), ("r2", 0, "ACTT")]);
        assert_eq!(call_variations(&mut contig, &Config::default()), 0);
    }

    #[test]
    fn test_two_reads_per_allele_make_a_variation() {
        let mut contig = contig_with_reads(
            b"ACGT",
            &[
                ("r1", 0, "ACGT"),
                ("r2", 0, "ACGT"),
                ("r3", 0, "ACTT"),
                ("r4", 0, "ACTT"),
            ],
        );
        assert_eq!(call_variations(&mut contig, &Config::default()), 1);
        let var = &contig.variations[0];
        assert_eq!(var.pos, 2);
        assert_eq!((var.major_nuc(), var.minor_nuc()), (b'T', b'G'));
        assert_eq!(var.hq_counts, [0, 0, 2, 2, 0]);
    }

    #[test]
    fn test_reads_leave_after_their_end() {
        let mut contig = contig_with_reads(
            b"AAAAAA",
            &[
                ("r1", 0, "AAC"),
                ("r2", 0, "AAC"),
                ("r3", 3, "AAA"),
                ("r4", 3, "AAA"),
                ("r5", -2, "AAAAA"),
            ],
        );
        assert_eq!(call_variations(&mut contig, &Config::default()), 0);
    }

    #[test]
    fn test_count_read_snps() {
        let mut contig = contig_with_reads(
            b"ACGT",
            &[
                ("r1", 0, "ACGT"),
                ("r2", 0, "ACGT"),
                ("r3", 0, "ACTT"),
                ("r4", 0, "ACTT"),
                ("r5", 0, "AC"),
            ],
        );
        call_variations(&mut contig, &Config::default());
        contig.variations[0].set_score(5, 5);
        count_read_snps(&mut contig);
        let r1 = contig.find_read("r1").unwrap();
        assert_eq!((r1.snp_count, r1.hq_snp_count), (1, 1));
        let r5 = contig.find_read("r5").unwrap();
        assert_eq!((r5.snp_count, r5.hq_snp_count), (0, 0));
    }
}
