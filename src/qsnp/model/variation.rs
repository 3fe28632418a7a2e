use super::nucleotide::{index_to_nuc, AlleleCounts, NUM_NUCLEOTIDES};

/// A polymorphic contig position and everything derived about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Variation {
    pub pos: usize,
    pub major: usize,
    pub minor: usize,
    pub counts: AlleleCounts,
    pub hq_counts: AlleleCounts,
    pub lq_counts: AlleleCounts,
    score: Option<u8>,
    high_confidence: bool,
    pub reliable: bool,
    pub defining: bool,
    pub haplotype_count: usize,
    pub flank_length: usize,
}

impl Variation {
    /// Builds a variation from raw allele counts, `None` when no minor allele exists.
    ///
    /// Observed symbols are scanned in alphabet order; a later symbol takes the major
    /// on ties, pushing the old major down to minor.
    pub fn from_counts(pos: usize, counts: AlleleCounts) -> Option<Self> {
        let mut major: Option<usize> = None;
        let mut minor: Option<usize> = None;
        for (nuc, &count) in counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            match major {
                None => major = Some(nuc),
                Some(m) if count >= counts[m] => {
                    minor = Some(m);
                    major = Some(nuc);
                }
                Some(_) => {
                    if minor.map_or(true, |m| count > counts[m]) {
                        minor = Some(nuc);
                    }
                }
            }
        }
        let (major, minor) = (major?, minor?);
        Some(Variation {
            pos,
            major,
            minor,
            counts,
            hq_counts: [0; NUM_NUCLEOTIDES],
            lq_counts: [0; NUM_NUCLEOTIDES],
            score: None,
            high_confidence: false,
            reliable: false,
            defining: false,
            haplotype_count: 0,
            flank_length: 0,
        })
    }

    pub fn major_nuc(&self) -> u8 {
        index_to_nuc(self.major)
    }

    pub fn minor_nuc(&self) -> u8 {
        index_to_nuc(self.minor)
    }

    /// Stores the high/low quality split and invalidates the cached confidence.
    pub fn set_quality_counts(&mut self, hq_counts: AlleleCounts, lq_counts: AlleleCounts) {
        self.hq_counts = hq_counts;
        self.lq_counts = lq_counts;
        self.score = None;
        self.high_confidence = false;
    }

    pub fn cached_score(&self) -> Option<u8> {
        self.score
    }

    pub fn set_score(&mut self, score: u8, min_confidence: u8) {
        self.score = Some(score);
        self.high_confidence = score >= min_confidence;
    }

    pub fn is_high_confidence(&self) -> bool {
        self.high_confidence
    }

    /// Quality score (1..=5) of one allele from its high/low quality support.
    pub fn allele_score(&self, nuc: usize) -> u8 {
        let hq = self.hq_counts[nuc];
        let lq = self.lq_counts[nuc];
        if hq > 1 {
            5
        } else if hq == 1 && lq > 1 {
            4
        } else if lq > 3 {
            3
        } else if (hq == 1 && lq == 1) || lq == 3 {
            2
        } else {
            1
        }
    }
}
