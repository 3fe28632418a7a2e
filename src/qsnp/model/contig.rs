use super::{
    haplotype::HaploType,
    nucleotide::{iupac_code, GAP},
    read::Read,
    variation::Variation,
};
use std::collections::{BTreeMap, HashMap};

/// Gapped consensus sequence of a contig with its optional per-position quality.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    bases: Vec<u8>,
    quality: Option<Vec<i32>>,
    default_quality: i32,
}

impl Reference {
    pub fn new(default_quality: i32) -> Self {
        Reference {
            bases: Vec::new(),
            quality: None,
            default_quality,
        }
    }

    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Quality at a position; positions without a recorded value use the default.
    pub fn quality_at(&self, pos: usize) -> i32 {
        self.quality
            .as_ref()
            .and_then(|q| q.get(pos).copied())
            .unwrap_or(self.default_quality)
    }

    fn set_bases(&mut self, bases: &[u8]) {
        self.bases = bases.to_ascii_uppercase();
    }

    /// Parses whitespace separated integers, assigning -1 to every gap position.
    fn set_quality_text(&mut self, text: &str) -> Result<(), String> {
        let mut quality = Vec::with_capacity(self.bases.len());
        let mut pos = 0;
        let fill_gaps = |quality: &mut Vec<i32>, pos: &mut usize| {
            while self.bases.get(*pos) == Some(&GAP) {
                quality.push(-1);
                *pos += 1;
            }
        };
        for token in text.split_whitespace() {
            fill_gaps(&mut quality, &mut pos);
            let value = token
                .parse::<i32>()
                .map_err(|_| format!("Invalid quality value: {}", token))?;
            quality.push(value);
            pos += 1;
        }
        fill_gaps(&mut quality, &mut pos);
        self.quality = Some(quality);
        Ok(())
    }
}

/// An assembled contig: consensus, placed reads and the analysis results.
#[derive(Debug, Clone)]
pub struct Contig {
    pub name: String,
    pub reference: Reference,
    pub reads: Vec<Read>,
    read_index: HashMap<String, usize>,
    pub variations: Vec<Variation>,
    pub haplotypes: Vec<HaploType>,
    pub read_groups: BTreeMap<String, Vec<usize>>,
    pub d_value: Option<f64>,
}

impl Contig {
    pub fn new(name: &str, default_quality: i32) -> Self {
        Contig {
            name: name.to_string(),
            reference: Reference::new(default_quality),
            reads: Vec::new(),
            read_index: HashMap::new(),
            variations: Vec::new(),
            haplotypes: Vec::new(),
            read_groups: BTreeMap::new(),
            d_value: None,
        }
    }

    pub fn set_sequence(&mut self, bases: &[u8]) {
        self.reference.set_bases(bases);
    }

    pub fn set_quality_text(&mut self, text: &str) -> Result<(), String> {
        self.reference.set_quality_text(text)
    }

    pub fn sequence(&self) -> &[u8] {
        self.reference.bases()
    }

    pub fn len(&self) -> usize {
        self.reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }

    /// Adds a read unless one with the same name is already present.
    pub fn add_read(&mut self, read: Read) -> bool {
        if self.read_index.contains_key(read.name()) {
            log::error!(
                "Duplicate read {} in contig {}, keeping the first copy",
                read.name(),
                self.name
            );
            return false;
        }
        self.read_index.insert(read.name().to_string(), self.reads.len());
        self.reads.push(read);
        true
    }

    pub fn find_read(&self, name: &str) -> Option<&Read> {
        self.read_index.get(name).map(|&i| &self.reads[i])
    }

    pub fn find_read_mut(&mut self, name: &str) -> Option<&mut Read> {
        self.read_index.get(name).map(|&i| &mut self.reads[i])
    }

    /// Stable sort of the reads by alignment start.
    pub fn sort_reads(&mut self) {
        self.reads.sort_by_key(|read| read.start);
        self.read_index = self
            .reads
            .iter()
            .enumerate()
            .map(|(i, read)| (read.name().to_string(), i))
            .collect();
    }

    pub fn haplotype(&self, id: usize) -> Option<&HaploType> {
        self.haplotypes.iter().find(|hap| hap.id == id)
    }

    pub fn potential_snp_count(&self) -> usize {
        self.variations.len()
    }

    pub fn high_confidence_snp_count(&self) -> usize {
        self.variations
            .iter()
            .filter(|v| v.is_high_confidence())
            .count()
    }

    pub fn reliable_snp_count(&self) -> usize {
        self.variations.iter().filter(|v| v.reliable).count()
    }

    pub fn max_haplotypes_per_snp(&self) -> usize {
        self.variations
            .iter()
            .map(|v| v.haplotype_count)
            .max()
            .unwrap_or(0)
    }

    pub fn d_value(&self) -> f64 {
        self.d_value.unwrap_or(0.0)
    }

    /// Consensus with variation positions replaced by their IUPAC ambiguity code.
    pub fn iupac_sequence(&self) -> Vec<u8> {
        let mut bases = self.reference.bases().to_vec();
        for var in &self.variations {
            if let Some(base) = bases.get_mut(var.pos) {
                *base = iupac_code(var.major, var.minor);
            }
        }
        bases
    }
}
