use crate::qsnp::model::{nucleotide::nuc_to_index, Contig, HaploType, ReadProfile};
use crate::utils::Config;

fn read_profiles(contig: &Contig, sites: &[usize]) -> Vec<ReadProfile> {
    contig
        .reads
        .iter()
        .enumerate()
        .filter(|(_, read)| read.hq_snp_count > 0)
        .map(|(i, read)| ReadProfile {
            read: i,
            alleles: sites
                .iter()
                .map(|&pos| read.base_at(pos as i64).and_then(nuc_to_index))
                .collect(),
            hq_snp_count: read.hq_snp_count,
        })
        .collect()
}

/// Grows clusters one at a time, re-scanning the unassigned reads until a full pass
/// adds nothing.
fn grow_haplotypes(profiles: &[ReadProfile], sites: &[usize], config: &Config) -> Vec<HaploType> {
    let mut haplotypes = Vec::new();
    let mut remaining: Vec<usize> = (0..profiles.len()).collect();
    while !remaining.is_empty() {
        let mut hap = HaploType::new(haplotypes.len() + 1, sites.to_vec());
        loop {
            let before = remaining.len();
            remaining.retain(|&p| !hap.try_add(&profiles[p], config));
            if remaining.len() == before {
                break;
            }
        }
        haplotypes.push(hap);
    }
    haplotypes
}

/// Dissolves clusters below the minimum size, offering their reads to the remaining
/// clusters in id order. A released read joins the first cluster that accepts it.
///
/// Clusters grown before a dissolved one already rejected its reads and are unchanged
/// since, so in practice only later clusters take them.
fn prune_haplotypes(
    mut haplotypes: Vec<HaploType>,
    profiles: &[ReadProfile],
    profile_of_read: &[Option<usize>],
    config: &Config,
) -> Vec<HaploType> {
    let mut i = 0;
    while i < haplotypes.len() {
        if haplotypes[i].len() >= config.min_reads_per_haplotype {
            i += 1;
            continue;
        }
        let dissolved = haplotypes.remove(i);
        for read in dissolved.reads {
            let Some(p) = profile_of_read[read] else {
                continue;
            };
            for hap in haplotypes.iter_mut() {
                if hap.try_add(&profiles[p], config) {
                    break;
                }
            }
        }
    }
    haplotypes
}

/// Partitions the reads carrying high-confidence variations into haplotypes.
///
/// Surviving haplotypes are numbered from 1 and every member read records its id;
/// reads left without a cluster have none.
pub fn cluster_reads(contig: &mut Contig, config: &Config) -> usize {
    let sites: Vec<usize> = contig
        .variations
        .iter()
        .filter(|v| v.is_high_confidence())
        .map(|v| v.pos)
        .collect();
    for read in contig.reads.iter_mut() {
        read.haplotype = None;
    }

    let profiles = read_profiles(contig, &sites);
    let mut profile_of_read = vec![None; contig.reads.len()];
    for (p, profile) in profiles.iter().enumerate() {
        profile_of_read[profile.read] = Some(p);
    }

    let haplotypes = grow_haplotypes(&profiles, &sites, config);
    let grown = haplotypes.len();
    let mut haplotypes = prune_haplotypes(haplotypes, &profiles, &profile_of_read, config);
    log::trace!(
        "Contig {}: {} clusters grown, {} kept",
        contig.name,
        grown,
        haplotypes.len()
    );

    for (i, hap) in haplotypes.iter_mut().enumerate() {
        hap.id = i + 1;
        for &read in &hap.reads {
            contig.reads[read].haplotype = Some(hap.id);
        }
    }
    contig.haplotypes = haplotypes;
    contig.haplotypes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qsnp::model::{Read, Variation};

    /// Contig with high-confidence variations at the given positions and the given reads.
    fn contig(reads: &[(&str, &str)], sites: &[usize]) -> Contig {
        let mut contig = Contig::new("c", 20);
        contig.set_sequence(&vec![b'A'; reads[0].1.len()]);
        for (name, seq) in reads {
            let mut read = Read::with_sequence(name, 0, seq.as_bytes());
            read.hq_snp_count = sites.len();
            contig.add_read(read);
        }
        for &pos in sites {
            let mut var = Variation::from_counts(pos, [2, 2, 0, 0, 0]).unwrap();
            var.set_score(5, 5);
            contig.variations.push(var);
        }
        contig
    }

    fn members(contig: &Contig, id: usize) -> Vec<&str> {
        contig
            .haplotype(id)
            .unwrap()
            .reads
            .iter()
            .map(|&r| contig.reads[r].name())
            .collect()
    }

    #[test]
    fn test_two_clean_haplotypes() {
        let mut contig = contig(
            &[
                ("a1", "AAAAAA"),
                ("b1", "ACACAC"),
                ("a2", "AAAAAA"),
                ("b2", "ACACAC"),
                ("a3", "AAAAAA"),
            ],
            &[1, 3, 5],
        );
        assert_eq!(cluster_reads(&mut contig, &Config::default()), 2);
        assert_eq!(members(&contig, 1), vec!["a1", "a2", "a3"]);
        assert_eq!(members(&contig, 2), vec!["b1", "b2"]);
        assert_eq!(contig.find_read("b2").unwrap().haplotype, Some(2));
    }

    #[test]
    fn test_every_clustered_read_has_exactly_one_haplotype() {
        let mut contig = contig(
            &[
                ("a1", "AAAAAA"),
                ("b1", "ACACAC"),
                ("a2", "AAAAAA"),
                ("b2", "ACACAC"),
                ("x1", "ACAAAC"),
            ],
            &[1, 3, 5],
        );
        cluster_reads(&mut contig, &Config::default());
        let mut seen = vec![0; contig.reads.len()];
        for hap in &contig.haplotypes {
            assert!(hap.len() >= 2);
            for &r in &hap.reads {
                seen[r] += 1;
                assert_eq!(contig.reads[r].haplotype, Some(hap.id));
            }
        }
        assert!(seen.iter().all(|&n| n <= 1));
        for (r, read) in contig.reads.iter().enumerate() {
            assert_eq!(read.haplotype.is_some(), seen[r] == 1);
        }
    }

    #[test]
    fn test_small_cluster_is_dissolved() {
        let mut contig = contig(
            &[("a1", "AAAAAA"), ("a2", "AAAAAA"), ("b1", "ACACAC")],
            &[1, 3, 5],
        );
        assert_eq!(cluster_reads(&mut contig, &Config::default()), 1);
        assert_eq!(members(&contig, 1), vec!["a1", "a2"]);
        assert_eq!(contig.find_read("b1").unwrap().haplotype, None);
    }

    #[test]
    fn test_reads_without_high_confidence_calls_are_ignored() {
        let mut contig = contig(&[("a1", "AAAAAA"), ("a2", "AAAAAA")], &[1]);
        contig.reads[1].hq_snp_count = 0;
        let config = Config {
            min_reads_per_haplotype: 1,
            ..Config::default()
        };
        assert_eq!(cluster_reads(&mut contig, &config), 1);
        assert_eq!(members(&contig, 1), vec!["a1"]);
    }

    #[test]
    fn test_released_read_joins_later_cluster() {
        let config = Config {
            min_reads_per_haplotype: 2,
            ..Config::default()
        };
        // x1 is too sparse to pull b1 in, but fits the b cluster once it is dissolved
        let mut contig = contig(
            &[
                ("a1", "AAAAAA"),
                ("a2", "AAAAAA"),
                ("x1", "ANANAC"),
                ("b1", "ACACAC"),
                ("b2", "ACACAC"),
                ("b3", "ACACAC"),
                ("b4", "ACACAC"),
            ],
            &[1, 3, 5],
        );
        assert_eq!(cluster_reads(&mut contig, &config), 2);
        assert_eq!(contig.find_read("x1").unwrap().haplotype, Some(2));
        assert_eq!(members(&contig, 2), vec!["b1", "b2", "b3", "b4", "x1"]);
    }

    #[test]
    fn test_zero_threshold_keeps_reads_without_overlap() {
        let config = Config {
            similarity_all_sites: 0.0,
            ..Config::default()
        };
        let mut contig = contig(
            &[("a1", "AANNNN"), ("a2", "AANNNN"), ("b1", "NNNNNC")],
            &[1, 5],
        );
        assert_eq!(cluster_reads(&mut contig, &config), 1);
        assert_eq!(members(&contig, 1), vec!["a1", "a2", "b1"]);
        assert!(contig.reads.iter().all(|r| r.haplotype == Some(1)));
    }

    #[test]
    fn test_earlier_clusters_are_untouched_by_pruning() {
        let config = Config {
            min_reads_per_haplotype: 2,
            ..Config::default()
        };
        let mut contig = contig(
            &[
                ("a1", "AAAAAA"),
                ("a2", "AAAAAA"),
                ("x1", "ANANAC"),
                ("b1", "ACACAC"),
                ("b2", "ACACAC"),
            ],
            &[1, 3, 5],
        );
        let sites = [1, 3, 5];
        let profiles = read_profiles(&contig, &sites);
        let grown = grow_haplotypes(&profiles, &sites, &config);
        let first = grown[0].clone();
        let profile_of_read: Vec<Option<usize>> = (0..profiles.len()).map(Some).collect();
        assert_eq!(grown.len(), 3);
        let pruned = prune_haplotypes(grown, &profiles, &profile_of_read, &config);
        assert_eq!(pruned.len(), 2);
        assert_eq!(pruned[0], first);

        assert_eq!(cluster_reads(&mut contig, &config), 2);
        assert_eq!(members(&contig, 1), vec!["a1", "a2"]);
        assert_eq!(members(&contig, 2), vec!["b1", "b2", "x1"]);
    }
}
