use super::cigar::{CigarOp, CigarOpExt};
use crate::qsnp::{error::ContigError, model::nucleotide::GAP, model::Read};
use rust_htslib::bam::{record::Aux, Header, HeaderView, Record};

/// Quality character used for bases that were not sequenced (gaps and fillers).
pub const SENTINEL_QUALITY: u8 = b'~';

const SANGER_OFFSET: u8 = 33;
const MISSING_QUALITY: u8 = 0xff;

/// A read rebuilt from a SAM record as a gapped row of the contig alignment.
///
/// `operations` runs parallel to `sequence` and holds the CIGAR operation that produced
/// each base (`M`, `I`, `=`, `X`) or gap (`D`, `N`, `P`).
#[derive(Debug, Clone, PartialEq)]
pub struct SamRead {
    pub name: String,
    pub contig: String,
    pub start: i64,
    pub sequence: Vec<u8>,
    pub quality: Vec<u8>,
    pub operations: Vec<u8>,
    pub group: Option<String>,
}

/// Parses SAM text lines with htslib against the header lines that precede them.
pub struct RecordParser {
    header_text: Vec<u8>,
    header: Option<HeaderView>,
    min_mapping_quality: u32,
}

impl RecordParser {
    pub fn new(min_mapping_quality: u32) -> Self {
        RecordParser {
            header_text: Vec::new(),
            header: None,
            min_mapping_quality,
        }
    }

    fn header(&mut self) -> &mut HeaderView {
        let text = &self.header_text;
        self.header.get_or_insert_with(|| HeaderView::from_bytes(text))
    }

    /// Parses one line of a SAM stream.
    ///
    /// Header lines are collected until the first record. They yield `Ok(None)`, as do
    /// records that are unplaced, lack a CIGAR, name a reference missing from the header
    /// or fall below the mapping quality threshold.
    pub fn parse_line(
        &mut self,
        line: &str,
        line_number: usize,
    ) -> Result<Option<SamRead>, ContigError> {
        if line.is_empty() {
            return Ok(None);
        }
        if line.starts_with('@') {
            if self.header.is_some() {
                log::warn!("Ignoring header line {} after the first record", line_number);
            } else {
                self.header_text.extend_from_slice(line.as_bytes());
                self.header_text.push(b'\n');
            }
            return Ok(None);
        }
        let min_mapping_quality = self.min_mapping_quality;
        let header = self.header();
        let record = Record::from_sam(header, line.as_bytes()).map_err(|e| {
            ContigError::MalformedRecord {
                line: line_number,
                reason: e.to_string(),
            }
        })?;
        SamRead::from_record(&record, header, line_number, min_mapping_quality)
    }

    /// Read group ids declared by `@RG` header lines.
    pub fn declared_read_groups(&mut self) -> Vec<String> {
        let header = Header::from_template(self.header());
        header
            .to_hashmap()
            .get("RG")
            .map(|groups| groups.iter().filter_map(|rg| rg.get("ID").cloned()).collect())
            .unwrap_or_default()
    }
}

impl SamRead {
    /// Rebuilds the alignment row of a parsed record.
    ///
    /// Returns `Ok(None)` for records that are unplaced, lack a CIGAR, or fall below the
    /// mapping quality threshold.
    pub fn from_record(
        record: &Record,
        header: &HeaderView,
        line_number: usize,
        min_mapping_quality: u32,
    ) -> Result<Option<Self>, ContigError> {
        let name = String::from_utf8_lossy(record.qname()).into_owned();
        if record.is_unmapped() || record.tid() < 0 || record.cigar_len() == 0 {
            log::trace!("Skipping unplaced record {}", name);
            return Ok(None);
        }
        if u32::from(record.mapq()) < min_mapping_quality {
            log::trace!("Skipping {} with mapping quality {}", name, record.mapq());
            return Ok(None);
        }
        let contig = String::from_utf8_lossy(header.tid2name(record.tid() as u32)).into_owned();

        let sequence = record.seq().as_bytes();
        let quality = match record.qual() {
            [MISSING_QUALITY, ..] | [] => vec![SENTINEL_QUALITY; sequence.len()],
            qual => qual.iter().map(|q| q.saturating_add(SANGER_OFFSET)).collect(),
        };
        let group = match record.aux(b"RG") {
            Ok(Aux::String(rg)) => Some(rg.to_string()),
            _ => None,
        };

        let mut read = SamRead {
            name,
            contig,
            start: record.pos().max(0),
            sequence,
            quality,
            operations: Vec::new(),
            group,
        };
        read.apply_cigar(&record.cigar().take().to_vec(), line_number)?;
        Ok(Some(read))
    }

    /// Removes clipping and expands deletions into gap bases.
    fn apply_cigar(&mut self, cigar: &[CigarOp], line_number: usize) -> Result<(), ContigError> {
        let mut ops = cigar;
        while let Some((CigarOp::HardClip(_), rest)) = ops.split_first() {
            ops = rest;
        }
        while let Some((CigarOp::HardClip(_), rest)) = ops.split_last() {
            ops = rest;
        }
        if let Some((CigarOp::SoftClip(len), rest)) = ops.split_first() {
            let len = *len as usize;
            self.check_clip(len)?;
            self.sequence.drain(..len);
            self.quality.drain(..len);
            ops = rest;
        }
        if let Some((CigarOp::SoftClip(len), rest)) = ops.split_last() {
            let len = *len as usize;
            self.check_clip(len)?;
            let keep = self.sequence.len() - len;
            self.sequence.truncate(keep);
            self.quality.truncate(keep);
            ops = rest;
        }

        self.operations = vec![b' '; self.sequence.len()];
        let mut pos = 0;
        for op in ops {
            let len = op.len() as usize;
            if op.places_bases() {
                if pos + len > self.sequence.len() {
                    return Err(ContigError::MalformedRecord {
                        line: line_number,
                        reason: format!("CIGAR of read {} exceeds its sequence", self.name),
                    });
                }
                self.operations[pos..pos + len].fill(op.symbol());
            } else if op.opens_gap() {
                let at = pos.min(self.sequence.len());
                self.sequence.splice(at..at, std::iter::repeat(GAP).take(len));
                self.quality
                    .splice(at..at, std::iter::repeat(SENTINEL_QUALITY).take(len));
                self.operations
                    .splice(at..at, std::iter::repeat(op.symbol()).take(len));
            } else {
                return Err(ContigError::MalformedRecord {
                    line: line_number,
                    reason: format!("Internal clip {} in read {}", op, self.name),
                });
            }
            pos += len;
        }
        Ok(())
    }

    fn check_clip(&self, len: usize) -> Result<(), ContigError> {
        if len > self.sequence.len() {
            Err(ContigError::ClipOutOfRange {
                read: self.name.clone(),
                clip: len,
                len: self.sequence.len(),
            })
        } else {
            Ok(())
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// One past the last covered 0-based position.
    pub fn end(&self) -> i64 {
        self.start + self.sequence.len() as i64
    }

    pub fn has_insertions(&self) -> bool {
        self.operations.contains(&b'I')
    }

    /// Operation at a 1-based position: `<` before the read, `>` after it.
    pub fn operation_at(&self, pos: i64) -> u8 {
        let pos = pos - 1;
        if pos < self.start {
            return b'<';
        }
        self.operations
            .get((pos - self.start) as usize)
            .copied()
            .unwrap_or(b'>')
    }

    pub fn base_at(&self, pos: i64) -> Option<u8> {
        if pos < self.start {
            return None;
        }
        self.sequence.get((pos - self.start) as usize).copied()
    }

    /// Opens a one-base gap at a 1-based position to make room for another read's insertion.
    ///
    /// A read that has not started yet moves right instead. Returns `false` once the
    /// position lies past the end of the read.
    pub fn insert_gap_at(&mut self, pos: i64) -> bool {
        let pos = pos - 1;
        if pos < self.start {
            self.start += 1;
            return true;
        }
        let local = (pos - self.start) as usize;
        if local >= self.sequence.len() {
            return false;
        }
        if self.operations[local] != b'I' {
            self.sequence.insert(local, GAP);
            self.quality.insert(local, SENTINEL_QUALITY);
            self.operations.insert(local, b'I');
        }
        true
    }

    pub fn into_read(self) -> Read {
        let mut read = Read::with_sequence(&self.name, self.start, &self.sequence);
        read.set_quality_sanger(&self.quality);
        read.group = self.group;
        read
    }
}

#[cfg(test)]
pub(super) fn parse_with_header(
    line: &str,
    min_mapping_quality: u32,
) -> Result<Option<SamRead>, ContigError> {
    let mut parser = RecordParser::new(min_mapping_quality);
    parser.parse_line("@SQ\tSN:ctg1\tLN:1000", 1)?;
    parser.parse_line(line, 3)
}
