use crate::utils::Config;

/// A sequencing read placed on a contig.
///
/// Coordinates are 0-based contig positions; the clip window and the low-quality
/// bounds are read-local and inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct Read {
    name: String,
    sequence: Vec<u8>,
    quality: Vec<i32>,
    pub start: i64,
    clip_start: usize,
    clip_end: usize,
    low_qual_5p: i64,
    low_qual_3p: i64,
    pub snp_count: usize,
    pub hq_snp_count: usize,
    pub group: Option<String>,
    pub haplotype: Option<usize>,
}

impl Read {
    pub fn new(name: &str, start: i64) -> Self {
        Read {
            name: name.to_string(),
            sequence: Vec::new(),
            quality: Vec::new(),
            start,
            clip_start: 0,
            clip_end: 0,
            low_qual_5p: 0,
            low_qual_3p: -1,
            snp_count: 0,
            hq_snp_count: 0,
            group: None,
            haplotype: None,
        }
    }

    pub fn with_sequence(name: &str, start: i64, sequence: &[u8]) -> Self {
        let mut read = Read::new(name, start);
        read.set_sequence(sequence);
        read
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn quality(&self) -> &[i32] {
        &self.quality
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Replaces the bases (uppercased) and resets the clip window to the whole read.
    pub fn set_sequence(&mut self, sequence: &[u8]) {
        self.sequence = sequence.to_ascii_uppercase();
        self.clip_start = 0;
        self.clip_end = self.sequence.len().saturating_sub(1);
        self.low_qual_5p = 0;
        self.low_qual_3p = self.sequence.len() as i64 - 1;
    }

    pub fn set_quality(&mut self, quality: Vec<i32>) {
        self.quality = quality;
    }

    /// Converts Phred+33 encoded characters.
    pub fn set_quality_sanger(&mut self, encoded: &[u8]) {
        self.quality = encoded.iter().map(|&c| c as i32 - 33).collect();
    }

    pub fn clip_window(&self) -> (usize, usize) {
        (self.clip_start, self.clip_end)
    }

    /// Applies a 1-based inclusive clip window and recomputes the low-quality bounds.
    pub fn set_clip(&mut self, start: i64, end: i64, config: &Config) {
        let len = self.sequence.len();
        self.clip_start = if start >= 1 && (start as usize) < len {
            start as usize - 1
        } else {
            0
        };
        self.clip_end = if end >= 1 && (end as usize) < len {
            end as usize - 1
        } else {
            len.saturating_sub(1)
        };
        self.set_low_quality_bounds(config);
    }

    fn set_low_quality_bounds(&mut self, config: &Config) {
        let clip_start = self.clip_start as i64;
        let clipped_len = self.clip_end as i64 - clip_start + 1;
        self.low_qual_5p = config.low_quality_region_5prime as i64 + clip_start;
        self.low_qual_3p = if config.low_quality_region_3prime == 0 {
            ((1.0 - config.low_quality_region_3prime_frac) * clipped_len as f64) as i64 + clip_start
        } else {
            clipped_len - config.low_quality_region_3prime as i64 - 1 + clip_start
        };
    }

    /// Last contig position covered by the clipped read.
    pub fn end(&self) -> i64 {
        self.start + self.clip_end as i64
    }

    fn local_pos(&self, pos: i64) -> Option<usize> {
        if pos < self.start {
            None
        } else {
            Some((pos - self.start) as usize)
        }
    }

    /// Base at a contig position, `None` outside the clip window.
    pub fn base_at(&self, pos: i64) -> Option<u8> {
        let local = self.local_pos(pos)?;
        if local < self.clip_start || local > self.clip_end {
            return None;
        }
        self.sequence.get(local).copied()
    }

    pub fn is_high_quality(&self, pos: i64, min_quality: i32) -> bool {
        let Some(local) = self.local_pos(pos) else {
            return false;
        };
        let local_signed = local as i64;
        if local_signed < self.low_qual_5p || local_signed > self.low_qual_3p {
            return false;
        }
        match self.quality.get(local) {
            Some(&q) => q >= min_quality,
            None => true,
        }
    }

    /// Group label derived from the read name: the text before the first separator.
    pub fn group_from_name(&self, separator: &str) -> Option<String> {
        self.name
            .split_once(separator)
            .map(|(group, _)| group.to_string())
            .filter(|group| !group.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_at_respects_start_and_clip() {
        let mut read = Read::with_sequence("r1", 10, b"acgtacgt");
        assert_eq!(read.base_at(9), None);
        assert_eq!(read.base_at(10), Some(b'A'));
        assert_eq!(read.base_at(17), Some(b'T'));
        assert_eq!(read.base_at(18), None);
        assert_eq!(read.end(), 17);

        read.set_clip(2, 6, &Config::default());
        assert_eq!(read.clip_window(), (1, 5));
        assert_eq!(read.base_at(10), None);
        assert_eq!(read.base_at(11), Some(b'C'));
        assert_eq!(read.base_at(15), Some(b'C'));
        assert_eq!(read.base_at(16), None);
        assert_eq!(read.end(), 15);
    }

    #[test]
    fn test_out_of_range_clip_falls_back_to_full_read() {
        let mut read = Read::with_sequence("r1", 0, b"ACGTACGT");
        read.set_clip(-1, 100, &Config::default());
        assert_eq!(read.clip_window(), (0, 7));
    }

    #[test]
    fn test_low_quality_bounds() {
        let config = Config {
            low_quality_region_5prime: 2,
            low_quality_region_3prime: 1,
            ..Config::default()
        };
        let mut read = Read::with_sequence("r1", 0, b"ACGTACGTAC");
        read.set_clip(1, 10, &config);
        assert!(!read.is_high_quality(1, 20));
        assert!(read.is_high_quality(2, 20));
        assert!(read.is_high_quality(8, 20));
        assert!(!read.is_high_quality(9, 20));

        let config = Config {
            low_quality_region_3prime_frac: 0.5,
            ..Config::default()
        };
        read.set_clip(1, 10, &config);
        assert!(read.is_high_quality(5, 20));
        assert!(!read.is_high_quality(6, 20));
    }

    #[test]
    fn test_high_quality_uses_base_quality() {
        let mut read = Read::with_sequence("r1", 5, b"ACG");
        read.set_quality_sanger(b"5+I");
        assert_eq!(read.quality(), &[20, 10, 40]);
        assert!(read.is_high_quality(5, 20));
        assert!(!read.is_high_quality(6, 20));
        assert!(read.is_high_quality(7, 20));
        assert!(!read.is_high_quality(4, 20));
    }

    #[test]
    fn test_group_from_name() {
        let read = Read::new("lib1_read7", 0);
        assert_eq!(read.group_from_name("_"), Some("lib1".to_string()));
        assert_eq!(read.group_from_name("|"), None);
    }
}
