//! Confidence, reliability, marker flanks and the contig D-value.

use crate::qsnp::model::{
    nucleotide::{nuc_to_index, AlleleCounts, GAP, GAP_INDEX, NUM_NUCLEOTIDES},
    Contig, HaploType, Read, Reference, Variation,
};
use crate::utils::Config;

/// Splits the allele calls at a position into high- and low-quality counts.
pub fn quality_split<'a>(
    reads: impl Iterator<Item = &'a Read>,
    pos: usize,
    min_quality: i32,
) -> (AlleleCounts, AlleleCounts) {
    let mut hq = [0; NUM_NUCLEOTIDES];
    let mut lq = [0; NUM_NUCLEOTIDES];
    let pos = pos as i64;
    for read in reads {
        if let Some(nuc) = read.base_at(pos).and_then(nuc_to_index) {
            if read.is_high_quality(pos, min_quality) {
                hq[nuc] += 1;
            } else {
                lq[nuc] += 1;
            }
        }
    }
    (hq, lq)
}

/// Ungapped neighbourhood of a position: up to `size - 1` bases on each side plus the
/// base at the position itself.
fn neighbourhood(bases: &[u8], pos: usize, size: usize) -> Vec<u8> {
    let mut upstream = Vec::with_capacity(size);
    let mut p = pos;
    while p > 0 && upstream.len() + 1 < size {
        p -= 1;
        if bases[p] != GAP {
            upstream.push(bases[p]);
        }
    }
    upstream.reverse();

    let mut window = upstream;
    window.push(bases[pos]);
    let mut downstream = 1;
    for &base in bases.iter().skip(pos + 1) {
        if downstream >= size {
            break;
        }
        if base != GAP {
            window.push(base);
            downstream += 1;
        }
    }
    window
}

/// Whether either allele repeats at least the configured number of times inside some
/// window of the configured size around the variation.
pub fn inside_low_complexity(bases: &[u8], var: &Variation, config: &Config) -> bool {
    let size = config.low_complexity_region_size;
    if size == 0 || var.pos >= bases.len() {
        return false;
    }
    let major = var.major_nuc();
    let minor = var.minor_nuc();
    let repeat = config.low_complexity_repeat_count;
    neighbourhood(bases, var.pos, size).windows(size).any(|w| {
        w.iter().filter(|&&b| b == major).count() >= repeat
            || w.iter().filter(|&&b| b == minor).count() >= repeat
    })
}

/// Confidence score of a variation, computed once and cached on it.
pub fn confidence_score(var: &mut Variation, reference: &Reference, config: &Config) -> u8 {
    if let Some(score) = var.cached_score() {
        return score;
    }
    let score = if reference.quality_at(var.pos) < config.min_snp_quality_score {
        1
    } else if config.indel_low_quality && (var.major == GAP_INDEX || var.minor == GAP_INDEX) {
        1
    } else if config.low_complexity_low_quality
        && inside_low_complexity(reference.bases(), var, config)
    {
        1
    } else {
        var.allele_score(var.major).min(var.allele_score(var.minor))
    };
    var.set_score(score, config.min_confidence_score);
    score
}

pub fn score_confidence(contig: &mut Contig, config: &Config) -> usize {
    for var in contig.variations.iter_mut() {
        confidence_score(var, &contig.reference, config);
    }
    contig.high_confidence_snp_count()
}

#[derive(Debug, Default)]
struct HaplotypeTally {
    informative: u32,
    hq: AlleleCounts,
    lq: AlleleCounts,
}

impl HaplotypeTally {
    fn collect(hap: &HaploType, reads: &[Read], pos: usize, min_quality: i32) -> Self {
        let (hq, lq) = quality_split(hap.reads.iter().map(|&r| &reads[r]), pos, min_quality);
        let informative = hq.iter().sum::<u32>() + lq.iter().sum::<u32>();
        HaplotypeTally {
            informative,
            hq,
            lq,
        }
    }

    fn weighted_fraction(&self, nuc: usize, config: &Config) -> f64 {
        (config.weight_high_quality * self.hq[nuc] as f64
            + config.weight_low_quality * self.lq[nuc] as f64)
            / self.informative as f64
    }
}

/// Marks reliable and defining variations from the per-haplotype allele majorities.
pub fn assess_reliability(contig: &mut Contig, config: &Config) -> usize {
    for hap in contig.haplotypes.iter_mut() {
        hap.defining_positions.clear();
    }
    for vi in 0..contig.variations.len() {
        let var = &mut contig.variations[vi];
        var.haplotype_count = 0;
        var.reliable = false;
        var.defining = false;
        if !var.is_high_confidence() {
            continue;
        }
        let (pos, major, minor) = (var.pos, var.major, var.minor);

        let mut major_majority = false;
        let mut minor_majority = false;
        let mut carriers = [0usize; NUM_NUCLEOTIDES];
        let mut last_carrier = [0usize; NUM_NUCLEOTIDES];
        let mut haplotype_count = 0;
        for (hi, hap) in contig.haplotypes.iter().enumerate() {
            let tally =
                HaplotypeTally::collect(hap, &contig.reads, pos, config.min_snp_quality_score);
            if tally.informative == 0 {
                continue;
            }
            haplotype_count += 1;
            for nuc in 0..NUM_NUCLEOTIDES {
                if tally.hq[nuc] + tally.lq[nuc] > 0 {
                    carriers[nuc] += 1;
                    last_carrier[nuc] = hi;
                }
            }
            major_majority |=
                tally.weighted_fraction(major, config) >= config.allele_majority_threshold;
            minor_majority |=
                tally.weighted_fraction(minor, config) >= config.allele_majority_threshold;
        }

        let mut defining = false;
        for nuc in 0..NUM_NUCLEOTIDES {
            if carriers[nuc] == 1 {
                contig.haplotypes[last_carrier[nuc]]
                    .defining_positions
                    .push(pos);
                defining = true;
            }
        }

        let var = &mut contig.variations[vi];
        var.haplotype_count = haplotype_count;
        var.reliable = major_majority && minor_majority;
        var.defining = defining;
    }
    contig.reliable_snp_count()
}

/// Contig quality passes and enough reads are high quality at the position.
pub fn is_high_quality_position(contig: &Contig, pos: i64, config: &Config) -> bool {
    if pos < 0 || contig.reference.quality_at(pos as usize) < config.min_snp_quality_score {
        return false;
    }
    let needed = config.min_high_quality_reads;
    contig
        .reads
        .iter()
        .filter(|read| read.is_high_quality(pos, config.min_snp_quality_score))
        .take(needed)
        .count()
        >= needed
}

/// Sizes the high-quality flank around each marker variation; returns the marker count.
pub fn size_marker_flanks(contig: &mut Contig, config: &Config) -> usize {
    let k = config.max_snps_in_flanks;
    let seq_len = contig.len() as i64;
    let mut markers = 0;
    let mut flanks = vec![0; contig.variations.len()];
    for (i, var) in contig.variations.iter().enumerate() {
        let qualifies =
            var.reliable || (!config.only_reliable_markers && var.is_high_confidence());
        if !qualifies {
            continue;
        }
        markers += 1;
        let left_border = if i > k {
            contig.variations[i - (k + 1)].pos as i64
        } else {
            -1
        };
        let right_border = contig
            .variations
            .get(i + k + 1)
            .map_or(seq_len, |v| v.pos as i64);
        let pos = var.pos as i64;
        let mut flank = 1;
        while pos - flank > left_border
            && pos + flank < right_border
            && is_high_quality_position(contig, pos - flank, config)
            && is_high_quality_position(contig, pos + flank, config)
        {
            flank += 1;
        }
        flanks[i] = (flank - 1) as usize;
    }
    for (var, flank) in contig.variations.iter_mut().zip(flanks) {
        var.flank_length = flank;
    }
    markers
}

/// Spread of the defining-SNP counts across haplotypes relative to their mean.
pub fn d_value(haplotypes: &[HaploType]) -> f64 {
    if haplotypes.is_empty() {
        return 0.0;
    }
    let n = haplotypes.len() as f64;
    let total: usize = haplotypes.iter().map(|h| h.defining_positions.len()).sum();
    let mean = total as f64 / n;
    if mean < 0.1 {
        return 0.0;
    }
    let sum_sq: f64 = haplotypes
        .iter()
        .map(|h| (h.defining_positions.len() as f64 / mean - 1.0).powi(2))
        .sum();
    (sum_sq / n).sqrt()
}
