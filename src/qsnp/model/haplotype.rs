use super::nucleotide::{index_to_nuc, AlleleCounts, NUM_NUCLEOTIDES};
use crate::utils::Config;

/// Alleles a read carries at each high-confidence site, in site order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadProfile {
    pub read: usize,
    pub alleles: Vec<Option<usize>>,
    pub hq_snp_count: usize,
}

/// A cluster of reads that agree on their alleles at high-confidence sites.
#[derive(Debug, Clone, PartialEq)]
pub struct HaploType {
    pub id: usize,
    pub reads: Vec<usize>,
    site_positions: Vec<usize>,
    histogram: Vec<Option<AlleleCounts>>,
    first_hq_snp_count: usize,
    pub defining_positions: Vec<usize>,
}

impl HaploType {
    pub fn new(id: usize, site_positions: Vec<usize>) -> Self {
        let histogram = vec![None; site_positions.len()];
        HaploType {
            id,
            reads: Vec::new(),
            site_positions,
            histogram,
            first_hq_snp_count: 0,
            defining_positions: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    pub fn add(&mut self, profile: &ReadProfile) {
        if self.reads.is_empty() {
            self.first_hq_snp_count = profile.hq_snp_count;
        }
        self.reads.push(profile.read);
        for (site, allele) in profile.alleles.iter().enumerate() {
            if let Some(nuc) = *allele {
                self.histogram[site].get_or_insert([0; NUM_NUCLEOTIDES])[nuc] += 1;
            }
        }
    }

    /// Agreement of one allele with the cluster at a site: 0 when no member is
    /// informative there, +1 when the allele holds at least `threshold` of the calls,
    /// otherwise -1.
    fn match_at(&self, site: usize, nuc: usize, threshold: f64) -> i32 {
        let Some(counts) = &self.histogram[site] else {
            return 0;
        };
        let hits = counts[nuc];
        if hits == 0 {
            return -1;
        }
        let total: u32 = counts.iter().sum();
        if (hits as f64 / total as f64) < threshold {
            -1
        } else {
            1
        }
    }

    /// Counts agreeing and disagreeing sites between a read and the cluster.
    pub fn match_read(&self, profile: &ReadProfile, threshold: f64) -> (usize, usize) {
        let mut matches = 0;
        let mut mismatches = 0;
        for (site, allele) in profile.alleles.iter().enumerate() {
            if let Some(nuc) = *allele {
                match self.match_at(site, nuc, threshold) {
                    1 => matches += 1,
                    -1 => mismatches += 1,
                    _ => {}
                }
            }
        }
        (matches, mismatches)
    }

    /// Adds the read when it is similar enough to the cluster.
    pub fn try_add(&mut self, profile: &ReadProfile, config: &Config) -> bool {
        if self.reads.is_empty() {
            self.add(profile);
            return true;
        }
        let (matches, mismatches) = self.match_read(profile, config.similarity_per_site);
        let accept = if matches == 0 {
            config.similarity_all_sites == 0.0
        } else if self.reads.len() == 1 && mismatches == 0 {
            let by_read = matches as f64 / profile.hq_snp_count.max(1) as f64;
            let by_member = matches as f64 / self.first_hq_snp_count.max(1) as f64;
            by_read.max(by_member) >= 0.5
        } else {
            matches as f64 / (matches + mismatches) as f64 >= config.similarity_all_sites
        };
        if accept {
            self.add(profile);
        }
        accept
    }

    pub fn counts_at(&self, pos: usize) -> Option<&AlleleCounts> {
        let site = self.site_positions.binary_search(&pos).ok()?;
        self.histogram[site].as_ref()
    }

    /// Most frequent allele among members at a contig position.
    pub fn consensus_at(&self, pos: usize) -> Option<u8> {
        let counts = self.counts_at(pos)?;
        let mut best = 0;
        for nuc in 1..NUM_NUCLEOTIDES {
            if counts[nuc] > counts[best] {
                best = nuc;
            }
        }
        Some(index_to_nuc(best))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(read: usize, alleles: &[Option<usize>]) -> ReadProfile {
        ReadProfile {
            read,
            alleles: alleles.to_vec(),
            hq_snp_count: alleles.iter().flatten().count(),
        }
    }

    #[test]
    fn test_first_read_always_joins() {
        let mut hap = HaploType::new(1, vec![10, 20]);
        assert!(hap.try_add(&profile(0, &[Some(0), Some(1)]), &Config::default()));
        assert_eq!(hap.reads, vec![0]);
        assert_eq!(hap.consensus_at(10), Some(b'A'));
        assert_eq!(hap.consensus_at(15), None);
    }

    #[test]
    fn test_match_read_counts() {
        let mut hap = HaploType::new(1, vec![10, 20, 30]);
        hap.add(&profile(0, &[Some(0), Some(1), None]));
        let (m, mm) = hap.match_read(&profile(1, &[Some(0), Some(2), Some(3)]), 0.75);
        assert_eq!((m, mm), (1, 1));
    }

    #[test]
    fn test_no_matching_site_is_rejected() {
        let mut hap = HaploType::new(1, vec![10, 20]);
        hap.add(&profile(0, &[Some(0), None]));
        assert!(!hap.try_add(&profile(1, &[None, Some(1)]), &Config::default()));
        assert_eq!(hap.len(), 1);
    }

    #[test]
    fn test_two_read_half_overlap_rule() {
        let mut hap = HaploType::new(1, vec![10, 20, 30, 40]);
        hap.add(&profile(0, &[Some(0), Some(1), None, None]));
        // one agreement out of a two-site read passes the 0.5 rule
        assert!(hap.try_add(&profile(1, &[None, Some(1), Some(2), None]), &Config::default()));
        assert_eq!(hap.len(), 2);
    }

    #[test]
    fn test_two_read_rule_divides_exactly() {
        let sparse = |hq_snp_count| ReadProfile {
            read: 1,
            alleles: vec![Some(0), Some(1), None, None, None],
            hq_snp_count,
        };
        let member = profile(0, &[Some(0), Some(1), Some(2), Some(3), None]);

        // two agreements out of four high-quality SNPs sit exactly on the 0.5 line
        let mut hap = HaploType::new(1, vec![10, 20, 30, 40, 50]);
        hap.add(&member);
        assert!(hap.try_add(&sparse(4), &Config::default()));

        let mut hap = HaploType::new(1, vec![10, 20, 30, 40, 50]);
        hap.add(&profile(0, &[Some(0), Some(1), Some(2), Some(3), Some(0)]));
        assert!(!hap.try_add(&sparse(5), &Config::default()));
        assert_eq!(hap.len(), 1);
    }

    #[test]
    fn test_zero_threshold_accepts_read_without_agreement() {
        let config = Config {
            similarity_all_sites: 0.0,
            ..Config::default()
        };
        let mut hap = HaploType::new(1, vec![10, 20]);
        hap.add(&profile(0, &[Some(0), None]));
        assert!(hap.try_add(&profile(1, &[None, Some(1)]), &config));
        assert_eq!(hap.reads, vec![0, 1]);
        assert_eq!(hap.counts_at(20), Some(&[0, 1, 0, 0, 0]));
    }

    #[test]
    fn test_global_similarity_threshold() {
        let mut hap = HaploType::new(1, vec![10, 20, 30, 40]);
        hap.add(&profile(0, &[Some(0), Some(1), Some(2), Some(3)]));
        hap.add(&profile(1, &[Some(0), Some(1), Some(2), Some(3)]));
        let config = Config::default();
        assert!(!hap.try_add(&profile(2, &[Some(0), Some(1), Some(2), Some(0)]), &config));
        assert!(hap.try_add(&profile(3, &[Some(0), Some(1), Some(2), None]), &config));
        assert_eq!(hap.counts_at(10), Some(&[3, 0, 0, 0, 0]));
    }
}
