//! Streaming reader for CAP3-style ACE assemblies.
//!
//! The reader walks the file line by line. A tag line (`CO`, `BQ`, `AF`, `RD`, `QA`)
//! either acts immediately or opens a text block; text blocks (contig sequence, read
//! sequence, contig quality) accumulate until the next blank line. Reaching a new
//! `CO` completes the contig built so far.

use super::InputStatistics;
use crate::qsnp::{
    error::ContigError,
    model::{Contig, Read},
};
use crate::utils::Config;
use std::{collections::BTreeSet, io::BufRead};

#[derive(Debug, Clone, Copy, PartialEq)]
enum BlockState {
    LookingForBlock,
    ReadingContig,
    ReadingRead,
    ReadingQuality,
}

/// Two-letter tag at the start of a line, followed by whitespace or end of line.
fn line_tag(line: &str) -> Option<&str> {
    let bytes = line.as_bytes();
    if bytes.len() < 2 || !bytes[0].is_ascii_alphabetic() || !bytes[1].is_ascii_alphabetic() {
        return None;
    }
    if bytes.len() > 2 && !bytes[2].is_ascii_whitespace() {
        return None;
    }
    Some(&line[..2])
}

fn strip_read_name(name: &str) -> &str {
    name.split('|').next().unwrap_or(name)
}

/// Whether the head of an input looks like an ACE assembly.
pub fn is_ace(head: &[String]) -> bool {
    head.iter().any(|line| line_tag(line) == Some("CO"))
}

pub struct AceReader<R: BufRead> {
    reader: R,
    config: Config,
    line_number: usize,
    state: BlockState,
    text: String,
    contig: Option<Contig>,
    current_read: Option<String>,
    skip_to_next_contig: bool,
    finished: bool,
}

impl<R: BufRead> AceReader<R> {
    pub fn new(reader: R, config: &Config) -> Self {
        AceReader {
            reader,
            config: config.clone(),
            line_number: 0,
            state: BlockState::LookingForBlock,
            text: String::new(),
            contig: None,
            current_read: None,
            skip_to_next_contig: false,
            finished: false,
        }
    }

    fn malformed(&self, reason: String) -> ContigError {
        ContigError::MalformedRecord {
            line: self.line_number,
            reason,
        }
    }

    /// Drops the contig under construction and ignores input until the next `CO`.
    fn abandon_contig(&mut self) {
        self.contig = None;
        self.current_read = None;
        self.text.clear();
        self.state = BlockState::LookingForBlock;
        self.skip_to_next_contig = true;
    }

    fn commit_text(&mut self) -> Result<(), ContigError> {
        let text = std::mem::take(&mut self.text);
        let state = std::mem::replace(&mut self.state, BlockState::LookingForBlock);
        let Some(contig) = self.contig.as_mut() else {
            return Ok(());
        };
        match state {
            BlockState::ReadingContig => contig.set_sequence(text.as_bytes()),
            BlockState::ReadingRead => {
                if let Some(read) = self
                    .current_read
                    .as_deref()
                    .and_then(|name| contig.find_read_mut(name))
                {
                    read.set_sequence(text.as_bytes());
                }
            }
            BlockState::ReadingQuality => {
                if let Err(e) = contig.set_quality_text(&text) {
                    return Err(self.malformed(e));
                }
            }
            BlockState::LookingForBlock => {}
        }
        Ok(())
    }

    fn start_contig(&mut self, line: &str) -> Result<Option<Contig>, ContigError> {
        let name = line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| self.malformed("CO line without contig name".to_string()))?;
        log::trace!("Reading contig {} at line {}", name, self.line_number);
        let contig = Contig::new(name, self.config.min_snp_quality_score);
        self.current_read = None;
        self.skip_to_next_contig = false;
        self.state = BlockState::ReadingContig;
        Ok(self.contig.replace(contig))
    }

    fn place_read(&mut self, line: &str) -> Result<(), ContigError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (name, pos) = match &fields[..] {
            [_, name, _orientation, pos, ..] => (strip_read_name(name), *pos),
            _ => return Err(self.malformed(format!("Expected 'AF name U|C pos': {}", line))),
        };
        let pos: i64 = pos
            .parse()
            .map_err(|_| self.malformed(format!("Invalid read position: {}", pos)))?;
        let mut read = Read::new(name, pos - 1);
        if let Some(separator) = self.config.read_group_separator() {
            read.group = read.group_from_name(separator);
        }
        if let Some(contig) = self.contig.as_mut() {
            contig.add_read(read);
        }
        Ok(())
    }

    fn open_read(&mut self, line: &str) -> Result<(), ContigError> {
        let name = line
            .split_whitespace()
            .nth(1)
            .map(strip_read_name)
            .ok_or_else(|| self.malformed("RD line without read name".to_string()))?;
        let contig = self
            .contig
            .as_ref()
            .ok_or_else(|| self.malformed("RD line outside of a contig".to_string()))?;
        if contig.find_read(name).is_none() {
            return Err(ContigError::MissingPlacement {
                contig: contig.name.clone(),
                read: name.to_string(),
            });
        }
        self.current_read = Some(name.to_string());
        self.state = BlockState::ReadingRead;
        Ok(())
    }

    fn apply_clip(&mut self, line: &str) -> Result<(), ContigError> {
        let values: Vec<i64> = line
            .split_whitespace()
            .skip(1)
            .take(2)
            .map(|v| v.parse::<i64>())
            .collect::<Result<_, _>>()
            .map_err(|_| self.malformed(format!("Invalid QA line: {}", line)))?;
        let [start, end] = values[..] else {
            return Err(self.malformed(format!("Invalid QA line: {}", line)));
        };
        let config = &self.config;
        if let (Some(contig), Some(name)) = (self.contig.as_mut(), self.current_read.as_deref()) {
            if let Some(read) = contig.find_read_mut(name) {
                read.set_clip(start, end, config);
            }
        }
        Ok(())
    }

    /// Handles a line while no text block is open.
    fn process_tag(&mut self, line: &str) -> Result<Option<Contig>, ContigError> {
        let Some(tag) = line_tag(line) else {
            return Ok(None);
        };
        if tag == "CO" {
            return self.start_contig(line);
        }
        if self.skip_to_next_contig || self.contig.is_none() {
            return Ok(None);
        }
        match tag {
            "BQ" => {
                self.state = BlockState::ReadingQuality;
            }
            "AF" => self.place_read(line)?,
            "RD" => self.open_read(line)?,
            "QA" => self.apply_clip(line)?,
            _ => {}
        }
        Ok(None)
    }

    fn next_contig(&mut self) -> Option<Result<Contig, ContigError>> {
        if self.finished {
            return None;
        }
        let mut line = String::new();
        loop {
            line.clear();
            let bytes = match self.reader.read_line(&mut line) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            };
            if bytes == 0 {
                self.finished = true;
                if let Err(e) = self.commit_text() {
                    self.contig = None;
                    return Some(Err(e));
                }
                return self.contig.take().map(Ok);
            }
            self.line_number += 1;
            let trimmed = line.trim_end_matches(['\n', '\r']);

            if self.state != BlockState::LookingForBlock {
                if trimmed.trim().is_empty() {
                    if let Err(e) = self.commit_text() {
                        self.abandon_contig();
                        return Some(Err(e));
                    }
                } else {
                    if self.state == BlockState::ReadingQuality && !self.text.is_empty() {
                        self.text.push(' ');
                    }
                    self.text.push_str(trimmed.trim());
                }
                continue;
            }

            match self.process_tag(trimmed) {
                Ok(Some(finished)) => return Some(Ok(finished)),
                Ok(None) => {}
                Err(e) => {
                    self.abandon_contig();
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for AceReader<R> {
    type Item = Result<Contig, ContigError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_contig()
    }
}

/// Counts contigs, reads and read groups without building contigs.
pub fn collect_statistics<R: BufRead>(
    reader: R,
    config: &Config,
) -> Result<InputStatistics, ContigError> {
    let mut stats = InputStatistics::new("ACE");
    let mut groups = BTreeSet::new();
    for line in reader.lines() {
        let line = line?;
        match line_tag(&line) {
            Some("CO") => stats.contigs += 1,
            Some("RD") => stats.reads += 1,
            Some("AF") => {
                if let (Some(separator), Some(name)) = (
                    config.read_group_separator(),
                    line.split_whitespace().nth(1),
                ) {
                    if let Some(group) = Read::new(strip_read_name(name), 0).group_from_name(separator)
                    {
                        groups.insert(group);
                    }
                }
            }
            _ => {}
        }
    }
    stats.read_groups = groups.into_iter().collect();
    Ok(stats)
}
