//! Analysis settings and their `key=value` file representation.
//!
//! Every threshold used by the readers and the analysis steps lives in [`Config`].
//! A configuration file holds one `key=value` pair per line; values may be quoted,
//! `#` starts a comment and a `name=` line labels the profile.

use crate::utils::Result;
use std::{fmt::Write as _, fs, io::BufRead, path::Path};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub name: String,
    /// Absolute minimum number of reads carrying an allele before a position is polymorphic
    pub min_reads_per_allele: usize,
    /// Minimum allele support as a fraction of the informative reads at a position
    pub min_reads_per_allele_frac: f64,
    pub min_reads_per_haplotype: usize,
    pub low_quality_region_5prime: usize,
    pub low_quality_region_3prime: usize,
    pub low_quality_region_3prime_frac: f64,
    pub max_snps_in_flanks: usize,
    pub weight_high_quality: f64,
    pub weight_low_quality: f64,
    pub min_snp_quality_score: i32,
    pub min_confidence_score: u8,
    pub min_high_quality_reads: usize,
    pub min_mapping_quality: u32,
    pub low_complexity_region_size: usize,
    pub low_complexity_repeat_count: usize,
    pub similarity_per_site: f64,
    pub similarity_all_sites: f64,
    pub allele_majority_threshold: f64,
    pub indel_low_quality: bool,
    pub low_complexity_low_quality: bool,
    pub only_reliable_markers: bool,
    pub use_iupac_codes: bool,
    pub show_contigs_without_snp: bool,
    pub output_read_groups: bool,
    pub print_summary_line: bool,
    pub print_snps: bool,
    pub print_haplotypes: bool,
    pub read_name_group_separator: String,
    pub field_separator: char,
    pub contigs_file: String,
    pub reads_file: String,
    pub haplotypes_file: String,
    pub variations_file: String,
    pub read_groups_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            name: "default".to_string(),
            min_reads_per_allele: 2,
            min_reads_per_allele_frac: 0.1,
            min_reads_per_haplotype: 2,
            low_quality_region_5prime: 0,
            low_quality_region_3prime: 0,
            low_quality_region_3prime_frac: 0.0,
            max_snps_in_flanks: 0,
            weight_high_quality: 1.0,
            weight_low_quality: 0.5,
            min_snp_quality_score: 20,
            min_confidence_score: 5,
            min_high_quality_reads: 2,
            min_mapping_quality: 0,
            low_complexity_region_size: 6,
            low_complexity_repeat_count: 5,
            similarity_per_site: 0.75,
            similarity_all_sites: 0.8,
            allele_majority_threshold: 0.75,
            indel_low_quality: true,
            low_complexity_low_quality: true,
            only_reliable_markers: true,
            use_iupac_codes: false,
            show_contigs_without_snp: true,
            output_read_groups: true,
            print_summary_line: true,
            print_snps: false,
            print_haplotypes: false,
            read_name_group_separator: String::new(),
            field_separator: '\t',
            contigs_file: "contigs.csv".to_string(),
            reads_file: "reads.csv".to_string(),
            haplotypes_file: "haplotypes.csv".to_string(),
            variations_file: "variations.csv".to_string(),
            read_groups_file: "readgroups.csv".to_string(),
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "" | "true" | "t" | "1" | "yes" => Ok(true),
        "false" | "f" | "0" | "no" => Ok(false),
        _ => Err(format!("Invalid boolean: {}", value)),
    }
}

fn parse_num<T: std::str::FromStr>(value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| format!("Invalid number: {}", value))
}

fn parse_separator(value: &str) -> Result<char> {
    match value {
        "\\t" | "tab" => Ok('\t'),
        _ => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(format!("Field separator must be a single character: {}", value)),
            }
        }
    }
}

fn trim_value(value: &str) -> &str {
    value.trim().trim_matches(|c| c == '"' || c == '\'')
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = fs::File::open(path).map_err(|e| format!("File {}: {}", path.display(), e))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Builds a configuration from the defaults overridden by `key=value` lines.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut config = Config::default();
        for (line_number, line) in reader.lines().enumerate() {
            let line =
                line.map_err(|e| format!("Error reading line {}: {}", line_number + 1, e))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or(format!(
                "Expected key=value at line {}: {}",
                line_number + 1,
                line
            ))?;
            config
                .set_value(key.trim(), trim_value(value))
                .map_err(|e| format!("Invalid setting at line {}: {}", line_number + 1, e))?;
        }
        Ok(config)
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let value = trim_value(value);
        match key {
            "name" => self.name = value.to_string(),
            "minimalNumberOfReadsPerAllele" => self.min_reads_per_allele = parse_num(value)?,
            "minimalNumberOfReadsPerAllelep" => self.min_reads_per_allele_frac = parse_num(value)?,
            "minimalNumberOfReadsPerHaploType" => {
                self.min_reads_per_haplotype = parse_num(value)?
            }
            "lowQualityRegion5prime" => self.low_quality_region_5prime = parse_num(value)?,
            "lowQualityRegion3prime" => self.low_quality_region_3prime = parse_num(value)?,
            "lowQualityRegion3primePerc" => {
                self.low_quality_region_3prime_frac = parse_num(value)?
            }
            "maxNumberOfSNPsInFlanks" => self.max_snps_in_flanks = parse_num(value)?,
            "weightHighQualityRegion" => self.weight_high_quality = parse_num(value)?,
            "weightLowQualityRegion" => self.weight_low_quality = parse_num(value)?,
            "minSNPQualityScore" => self.min_snp_quality_score = parse_num(value)?,
            "minimalConfidenceScore" => self.min_confidence_score = parse_num(value)?,
            "minNumberOfHighQualityReads" => self.min_high_quality_reads = parse_num(value)?,
            "minimalMappingQuality" => self.min_mapping_quality = parse_num(value)?,
            "lowComplexityRegionSize" => self.low_complexity_region_size = parse_num(value)?,
            "lowComplexityRepeatCount" => self.low_complexity_repeat_count = parse_num(value)?,
            "similarityPerPolymorphicSite" => self.similarity_per_site = parse_num(value)?,
            "similarityAllPolymorphicSites" => self.similarity_all_sites = parse_num(value)?,
            "alleleMajorityThreshold" => self.allele_majority_threshold = parse_num(value)?,
            "indelLowQuality" => self.indel_low_quality = parse_bool(value)?,
            "lowComplexityLowQuality" => self.low_complexity_low_quality = parse_bool(value)?,
            "onlyReliableMarkers" => self.only_reliable_markers = parse_bool(value)?,
            "useIUPACCodes" => self.use_iupac_codes = parse_bool(value)?,
            "showContigsWithoutSNP" => self.show_contigs_without_snp = parse_bool(value)?,
            "outputReadGroups" => self.output_read_groups = parse_bool(value)?,
            "printSummaryLine" => self.print_summary_line = parse_bool(value)?,
            "printSNPs" => self.print_snps = parse_bool(value)?,
            "printHaploTypes" => self.print_haplotypes = parse_bool(value)?,
            "readNameGroupSeparator" => self.read_name_group_separator = value.to_string(),
            "fieldSeparator" => self.field_separator = parse_separator(value)?,
            "contigsFile" => self.contigs_file = value.to_string(),
            "readsFile" => self.reads_file = value.to_string(),
            "haploTypesFile" => self.haplotypes_file = value.to_string(),
            "variationsFile" => self.variations_file = value.to_string(),
            "readGroupsFile" => self.read_groups_file = value.to_string(),
            _ => return Err(format!("Unknown configuration key: {}", key)),
        }
        Ok(())
    }

    /// Serializes every setting as `key=value` lines accepted by [`Config::from_reader`].
    pub fn to_cfg_string(&self) -> String {
        let separator = match self.field_separator {
            '\t' => "\\t".to_string(),
            c => c.to_string(),
        };
        let entries: Vec<(&str, String)> = vec![
            ("name", self.name.clone()),
            ("minimalNumberOfReadsPerAllele", self.min_reads_per_allele.to_string()),
            ("minimalNumberOfReadsPerAllelep", self.min_reads_per_allele_frac.to_string()),
            ("minimalNumberOfReadsPerHaploType", self.min_reads_per_haplotype.to_string()),
            ("lowQualityRegion5prime", self.low_quality_region_5prime.to_string()),
            ("lowQualityRegion3prime", self.low_quality_region_3prime.to_string()),
            ("lowQualityRegion3primePerc", self.low_quality_region_3prime_frac.to_string()),
            ("maxNumberOfSNPsInFlanks", self.max_snps_in_flanks.to_string()),
            ("weightHighQualityRegion", self.weight_high_quality.to_string()),
            ("weightLowQualityRegion", self.weight_low_quality.to_string()),
            ("minSNPQualityScore", self.min_snp_quality_score.to_string()),
            ("minimalConfidenceScore", self.min_confidence_score.to_string()),
            ("minNumberOfHighQualityReads", self.min_high_quality_reads.to_string()),
            ("minimalMappingQuality", self.min_mapping_quality.to_string()),
            ("lowComplexityRegionSize", self.low_complexity_region_size.to_string()),
            ("lowComplexityRepeatCount", self.low_complexity_repeat_count.to_string()),
            ("similarityPerPolymorphicSite", self.similarity_per_site.to_string()),
            ("similarityAllPolymorphicSites", self.similarity_all_sites.to_string()),
            ("alleleMajorityThreshold", self.allele_majority_threshold.to_string()),
            ("indelLowQuality", self.indel_low_quality.to_string()),
            ("lowComplexityLowQuality", self.low_complexity_low_quality.to_string()),
            ("onlyReliableMarkers", self.only_reliable_markers.to_string()),
            ("useIUPACCodes", self.use_iupac_codes.to_string()),
            ("showContigsWithoutSNP", self.show_contigs_without_snp.to_string()),
            ("outputReadGroups", self.output_read_groups.to_string()),
            ("printSummaryLine", self.print_summary_line.to_string()),
            ("printSNPs", self.print_snps.to_string()),
            ("printHaploTypes", self.print_haplotypes.to_string()),
            ("readNameGroupSeparator", format!("\"{}\"", self.read_name_group_separator)),
            ("fieldSeparator", separator),
            ("contigsFile", self.contigs_file.clone()),
            ("readsFile", self.reads_file.clone()),
            ("haploTypesFile", self.haplotypes_file.clone()),
            ("variationsFile", self.variations_file.clone()),
            ("readGroupsFile", self.read_groups_file.clone()),
        ];
        let mut out = String::new();
        for (key, value) in entries {
            let _ = writeln!(out, "{}={}", key, value);
        }
        out
    }

    pub fn read_group_separator(&self) -> Option<&str> {
        if self.read_name_group_separator.is_empty() {
            None
        } else {
            Some(&self.read_name_group_separator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.min_reads_per_allele, 2);
        assert_eq!(config.min_snp_quality_score, 20);
        assert_eq!(config.min_confidence_score, 5);
        assert_eq!(config.similarity_per_site, 0.75);
        assert_eq!(config.similarity_all_sites, 0.8);
        assert!(config.indel_low_quality);
        assert!(!config.use_iupac_codes);
        assert_eq!(config.read_group_separator(), None);
    }

    #[test]
    fn test_from_reader_overrides() {
        let data = "\
# comment\n\
name = strict\n\
minimalNumberOfReadsPerAllele=4\n\
similarityAllPolymorphicSites = \"0.9\"\n\
useIUPACCodes=\n\
indelLowQuality=f\n\
fieldSeparator=,\n\
readNameGroupSeparator=_\n";
        let config = Config::from_reader(Cursor::new(data)).unwrap();
        assert_eq!(config.name, "strict");
        assert_eq!(config.min_reads_per_allele, 4);
        assert_eq!(config.similarity_all_sites, 0.9);
        assert!(config.use_iupac_codes);
        assert!(!config.indel_low_quality);
        assert_eq!(config.field_separator, ',');
        assert_eq!(config.read_group_separator(), Some("_"));
    }

    #[test]
    fn test_from_reader_rejects_bad_lines() {
        assert!(Config::from_reader(Cursor::new("minSNPQualityScore\n")).is_err());
        assert!(Config::from_reader(Cursor::new("minSNPQualityScore=high\n")).is_err());
        assert!(Config::from_reader(Cursor::new("noSuchKey=1\n")).is_err());
    }

    #[test]
    fn test_cfg_string_is_reloadable() {
        let mut config = Config::default();
        config.set_value("minimalConfidenceScore", "3").unwrap();
        config.set_value("readNameGroupSeparator", "|").unwrap();
        let reloaded = Config::from_reader(Cursor::new(config.to_cfg_string())).unwrap();
        assert_eq!(reloaded, config);
    }
}
