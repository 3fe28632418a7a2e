mod assembly;
mod cigar;
mod record;

pub use assembly::{build_reference, merge_mates, merge_pairs, stretch_reads};
pub use cigar::{CigarOp, CigarOpExt};
pub use record::{RecordParser, SamRead, SENTINEL_QUALITY};

use super::InputStatistics;
use crate::qsnp::{error::ContigError, model::Contig};
use crate::utils::Config;
use std::{collections::BTreeSet, io::BufRead};

/// Whether the head of an input looks like a SAM file with a header.
pub fn is_sam(head: &[String]) -> bool {
    head.iter().any(|line| line.starts_with('@'))
}

/// Streams contigs out of a SAM file whose records are grouped by reference name.
pub struct SamReader<R: BufRead> {
    reader: R,
    config: Config,
    parser: RecordParser,
    line_number: usize,
    current: Option<String>,
    pending: Vec<SamRead>,
    finished: bool,
}

impl<R: BufRead> SamReader<R> {
    pub fn new(reader: R, config: &Config) -> Self {
        SamReader {
            reader,
            config: config.clone(),
            parser: RecordParser::new(config.min_mapping_quality),
            line_number: 0,
            current: None,
            pending: Vec::new(),
            finished: false,
        }
    }

    fn assemble(&self, name: String, mut reads: Vec<SamRead>) -> Contig {
        stretch_reads(&mut reads);
        let reads = merge_pairs(reads);
        let reference = build_reference(&reads);

        let mut contig = Contig::new(&name, self.config.min_snp_quality_score);
        contig.set_sequence(&reference);
        for read in reads {
            let mut read = read.into_read();
            read.set_clip(1, read.len() as i64, &self.config);
            contig.add_read(read);
        }
        log::trace!(
            "Assembled contig {} of length {} from {} reads",
            contig.name,
            contig.len(),
            contig.reads.len()
        );
        contig
    }

    fn take_contig(&mut self) -> Option<Contig> {
        let name = self.current.take()?;
        let reads = std::mem::take(&mut self.pending);
        Some(self.assemble(name, reads))
    }

    fn next_contig(&mut self) -> Option<Result<Contig, ContigError>> {
        if self.finished {
            return None;
        }
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    self.finished = true;
                    return self.take_contig().map(Ok);
                }
                Ok(_) => self.line_number += 1,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            }
            let record = line.trim_end_matches(['\n', '\r']);
            let read = match self.parser.parse_line(record, self.line_number) {
                Ok(Some(read)) => read,
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            };
            if self.current.as_deref() == Some(read.contig.as_str()) {
                self.pending.push(read);
                continue;
            }
            let finished = self.take_contig();
            self.current = Some(read.contig.clone());
            self.pending.push(read);
            if let Some(contig) = finished {
                return Some(Ok(contig));
            }
        }
    }
}

impl<R: BufRead> Iterator for SamReader<R> {
    type Item = Result<Contig, ContigError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_contig()
    }
}

/// Counts references with placed reads, placed reads and read groups.
pub fn collect_statistics<R: BufRead>(
    reader: R,
    config: &Config,
) -> Result<InputStatistics, ContigError> {
    let mut stats = InputStatistics::new("SAM");
    let mut parser = RecordParser::new(config.min_mapping_quality);
    let mut groups = BTreeSet::new();
    let mut current: Option<String> = None;
    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let read = match parser.parse_line(&line, line_number + 1) {
            Ok(Some(read)) => read,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("{}", e);
                stats.skipped_records += 1;
                continue;
            }
        };
        stats.reads += 1;
        if current.as_deref() != Some(read.contig.as_str()) {
            stats.contigs += 1;
            current = Some(read.contig);
        }
        if let Some(group) = read.group {
            groups.insert(group);
        }
    }
    groups.extend(parser.declared_read_groups());
    stats.read_groups = groups.into_iter().collect();
    Ok(stats)
}
