use crate::qsnp::{
    analysis::{caller, clusterer, scorer},
    model::Contig,
};
use crate::utils::Config;
use std::collections::BTreeMap;

/// Counts gathered while a contig moves through the analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContigReport {
    pub reads: usize,
    pub potential_snps: usize,
    pub high_confidence_snps: usize,
    pub haplotypes: usize,
    pub reliable_snps: usize,
    pub markers: usize,
}

/// Groups read indices by their group label.
pub fn group_reads(contig: &mut Contig) {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, read) in contig.reads.iter().enumerate() {
        if let Some(group) = &read.group {
            groups.entry(group.clone()).or_default().push(i);
        }
    }
    contig.read_groups = groups;
}

/// Runs every analysis step on one contig in order: variation calling, confidence
/// scoring, per-read SNP counts, clustering, reliability, marker flanks, D-value.
pub fn analyze_contig(contig: &mut Contig, config: &Config) -> ContigReport {
    contig.sort_reads();
    let potential_snps = caller::call_variations(contig, config);
    let high_confidence_snps = scorer::score_confidence(contig, config);
    caller::count_read_snps(contig);
    let haplotypes = clusterer::cluster_reads(contig, config);
    let reliable_snps = scorer::assess_reliability(contig, config);
    let markers = scorer::size_marker_flanks(contig, config);
    contig.d_value = Some(scorer::d_value(&contig.haplotypes));
    group_reads(contig);

    let report = ContigReport {
        reads: contig.reads.len(),
        potential_snps,
        high_confidence_snps,
        haplotypes,
        reliable_snps,
        markers,
    };
    log::debug!(
        "{}: {} reads, {} potential SNPs, {} high confidence, {} haplotypes, {} reliable",
        contig.name,
        report.reads,
        report.potential_snps,
        report.high_confidence_snps,
        report.haplotypes,
        report.reliable_snps
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qsnp::{
        model::Read,
        readers::{ContigSource, InputFormat},
    };
    use std::io::Cursor;

    fn two_allele_contig(reads_per_allele: usize) -> Contig {
        let mut contig = Contig::new("c1", 20);
        contig.set_sequence(b"ACGTACGTAC");
        for i in 0..reads_per_allele {
            let mut a = Read::with_sequence(&format!("a{}", i), 0, b"ACGTACGTAC");
            a.group = Some("lib1".to_string());
            contig.add_read(a);
            let mut b = Read::with_sequence(&format!("b{}", i), 0, b"ACGTTCGTAC");
            b.group = Some("lib2".to_string());
            contig.add_read(b);
        }
        contig
    }

    #[test]
    fn test_analyze_two_haplotypes() {
        let mut contig = two_allele_contig(3);
        let report = analyze_contig(&mut contig, &Config::default());
        assert_eq!(
            report,
            ContigReport {
                reads: 6,
                potential_snps: 1,
                high_confidence_snps: 1,
                haplotypes: 2,
                reliable_snps: 1,
                markers: 1,
            }
        );
        let var = &contig.variations[0];
        assert_eq!(var.pos, 4);
        assert!(var.defining);
        assert_eq!(var.haplotype_count, 2);
        assert_eq!(contig.d_value(), 0.0);
        assert_eq!(contig.read_groups["lib1"].len(), 3);
        assert!(contig.reads.iter().all(|r| r.haplotype.is_some()));
    }

    fn mixed_contig() -> Contig {
        let mut contig = Contig::new("c2", 20);
        contig.set_sequence(b"ACGTACGTACGTACGT");
        for i in 0..3 {
            contig.add_read(Read::with_sequence(&format!("b{}", i), 0, b"ACGTTCGTACCTACGT"));
            contig.add_read(Read::with_sequence(&format!("a{}", i), 0, b"ACGTACGTACGTACGT"));
        }
        contig.add_read(Read::with_sequence("m0", 0, b"ACGTTCGTACGTACGT"));
        contig
    }

    #[test]
    fn test_variation_positions_are_ordered_and_in_range() {
        let mut contig = mixed_contig();
        analyze_contig(&mut contig, &Config::default());
        let positions: Vec<usize> = contig.variations.iter().map(|v| v.pos).collect();
        assert_eq!(positions, vec![4, 10]);
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(positions.iter().all(|&pos| pos < contig.len()));
    }

    #[test]
    fn test_reads_belong_to_at_most_one_haplotype() {
        let mut contig = mixed_contig();
        analyze_contig(&mut contig, &Config::default());
        let mut memberships = vec![0; contig.reads.len()];
        for (i, hap) in contig.haplotypes.iter().enumerate() {
            assert_eq!(hap.id, i + 1);
            for &r in &hap.reads {
                memberships[r] += 1;
                assert_eq!(contig.reads[r].haplotype, Some(hap.id));
            }
        }
        assert!(memberships.iter().all(|&n| n <= 1));
        for (read, &n) in contig.reads.iter().zip(&memberships) {
            assert_eq!(read.haplotype.is_some(), n == 1);
        }
    }

    #[test]
    fn test_clustering_is_deterministic() {
        let config = Config::default();
        let mut first = mixed_contig();
        let mut second = mixed_contig();
        assert_eq!(
            analyze_contig(&mut first, &config),
            analyze_contig(&mut second, &config)
        );
        assert_eq!(first.haplotypes, second.haplotypes);
        let placement = |contig: &Contig| {
            contig
                .reads
                .iter()
                .map(|r| (r.name().to_string(), r.haplotype))
                .collect::<Vec<_>>()
        };
        assert_eq!(placement(&first), placement(&second));

        // a second pass over an analysed contig reproduces the same clusters
        let members = |contig: &Contig| {
            contig
                .haplotypes
                .iter()
                .map(|hap| (hap.id, hap.reads.clone()))
                .collect::<Vec<_>>()
        };
        let before = members(&first);
        crate::qsnp::analysis::clusterer::cluster_reads(&mut first, &config);
        assert_eq!(members(&first), before);
    }

    #[test]
    fn test_single_supporting_read_per_allele() {
        let mut contig = two_allele_contig(1);
        let report = analyze_contig(&mut contig, &Config::default());
        assert_eq!(report.potential_snps, 0);
        assert_eq!(report.haplotypes, 0);
        assert!(contig.reads.iter().all(|r| r.haplotype.is_none()));
    }

    #[test]
    fn test_ace_contig_with_identical_reads() {
        let data = "\
CO c1 8 3 1 U
ACGTACGT

AF r1 U 1
AF r2 U 1
AF r3 U 3

RD r1 8 0 0
ACGTACGT

RD r2 8 0 0
ACGTACGT

RD r3 6 0 0
GTACGT
";
        let mut source =
            ContigSource::from_reader(InputFormat::Ace, Cursor::new(data), &Config::default());
        let mut contig = source.next().unwrap().unwrap();
        let report = analyze_contig(&mut contig, &Config::default());
        assert_eq!(report.potential_snps, 0);
        assert_eq!(report.haplotypes, 0);
        assert_eq!(contig.d_value(), 0.0);
    }

    #[test]
    fn test_sam_contig_analysis() {
        let data = "\
@SQ\tSN:ctg\tLN:10
a1\t0\tctg\t1\t60\t10M\t*\t0\t0\tACGTACGTAC\t*
a2\t0\tctg\t1\t60\t10M\t*\t0\t0\tACGTACGTAC\t*
b1\t0\tctg\t1\t60\t10M\t*\t0\t0\tACGTTCGTAC\t*
b2\t0\tctg\t1\t60\t10M\t*\t0\t0\tACGTTCGTAC\t*
";
        let mut source =
            ContigSource::from_reader(InputFormat::Sam, Cursor::new(data), &Config::default());
        let mut contig = source.next().unwrap().unwrap();
        let report = analyze_contig(&mut contig, &Config::default());
        assert_eq!(report.potential_snps, 1);
        assert_eq!(report.haplotypes, 2);
        assert_eq!(report.reliable_snps, 1);
    }
}
