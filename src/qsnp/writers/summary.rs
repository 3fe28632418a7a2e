use crate::qsnp::model::Contig;
use crate::utils::{Config, Result};
use itertools::Itertools;
use std::io::Write;

pub fn summary_line(contig: &Contig) -> String {
    format!(
        "{}; reads: {}; potential SNPs: {}; high quality SNPs: {}; reliable SNPs: {}; HaploTypes: {}; max HaploTypes/SNP: {}; D Value: {:.3}",
        contig.name,
        contig.reads.len(),
        contig.potential_snp_count(),
        contig.high_confidence_snp_count(),
        contig.reliable_snp_count(),
        contig.haplotypes.len(),
        contig.max_haplotypes_per_snp(),
        contig.d_value()
    )
}

fn high_confidence_sites(contig: &Contig) -> Vec<usize> {
    contig
        .variations
        .iter()
        .filter(|v| v.is_high_confidence())
        .map(|v| v.pos)
        .collect_vec()
}

/// Per haplotype member, the bases it carries at the high-confidence variations.
pub fn snp_listing(contig: &Contig) -> Vec<String> {
    let sites = high_confidence_sites(contig);
    let header = format!(
        "  positions: {}",
        sites.iter().map(|pos| pos + 1).join(" ")
    );
    let mut lines = vec![header];
    for hap in &contig.haplotypes {
        for &r in &hap.reads {
            let read = &contig.reads[r];
            let alleles: String = sites
                .iter()
                .map(|&pos| read.base_at(pos as i64).map_or('-', char::from))
                .collect();
            lines.push(format!("  {} {} {}", hap.id, alleles, read.name()));
        }
    }
    lines
}

/// Haplotype membership, consensus alleles and defining positions of each haplotype.
pub fn haplotype_listing(contig: &Contig) -> Vec<String> {
    let sites = high_confidence_sites(contig);
    contig
        .haplotypes
        .iter()
        .map(|hap| {
            let alleles: String = sites
                .iter()
                .map(|&pos| hap.consensus_at(pos).map_or('-', char::from))
                .collect();
            format!(
                "  HaploType {}: {} reads [{}]; alleles: {}; defining: {}",
                hap.id,
                hap.len(),
                hap.reads.iter().map(|&r| contig.reads[r].name()).join(", "),
                alleles,
                hap.defining_positions.iter().map(|pos| pos + 1).join(" ")
            )
        })
        .collect()
}

/// Writes the text summary of a contig according to the print settings.
pub fn write_summary<W: Write>(out: &mut W, contig: &Contig, config: &Config) -> Result<()> {
    let mut lines = Vec::new();
    if config.print_summary_line {
        lines.push(summary_line(contig));
    }
    if config.print_snps && !contig.haplotypes.is_empty() {
        lines.extend(snp_listing(contig));
    }
    if config.print_haplotypes {
        lines.extend(haplotype_listing(contig));
    }
    for line in lines {
        writeln!(out, "{}", line).map_err(|e| format!("Failed to write summary: {}", e))?;
    }
    Ok(())
}
