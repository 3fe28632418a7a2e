//! Contig sources: ACE assemblies and SAM alignments behind one iterator.

pub mod ace;
pub mod sam;

use crate::qsnp::{error::ContigError, model::Contig};
use crate::utils::{input_extension, open_input_reader, read_head_lines, Config};
use crossbeam_channel::Sender;
use std::{
    fmt,
    io::{BufRead, BufReader, Read as ioRead},
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

const HEAD_LINE_COUNT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Ace,
    Sam,
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InputFormat::Ace => write!(f, "ACE"),
            InputFormat::Sam => write!(f, "SAM"),
        }
    }
}

/// Identifies the input format from its first lines, falling back to the extension.
pub fn detect_format(head: &[String], extension: Option<&str>) -> Result<InputFormat, ContigError> {
    if ace::is_ace(head) {
        return Ok(InputFormat::Ace);
    }
    if extension == Some("ace") {
        return Ok(InputFormat::Ace);
    }
    if sam::is_sam(head) {
        return Ok(InputFormat::Sam);
    }
    if extension == Some("sam") {
        return Ok(InputFormat::Sam);
    }
    Err(ContigError::UnsupportedFormat(
        extension.unwrap_or("unknown").to_string(),
    ))
}

pub fn detect_file_format(path: &Path) -> crate::utils::Result<InputFormat> {
    let head = read_head_lines(path, HEAD_LINE_COUNT)?;
    let extension = input_extension(path);
    detect_format(&head, extension.as_deref()).map_err(|e| format!("{}: {}", path.display(), e))
}

type InputReader = BufReader<Box<dyn ioRead + Send>>;

/// Stream of contigs read from either supported format.
pub enum ContigSource<R: BufRead> {
    Ace(ace::AceReader<R>),
    Sam(sam::SamReader<R>),
}

impl<R: BufRead> ContigSource<R> {
    pub fn from_reader(format: InputFormat, reader: R, config: &Config) -> Self {
        match format {
            InputFormat::Ace => ContigSource::Ace(ace::AceReader::new(reader, config)),
            InputFormat::Sam => ContigSource::Sam(sam::SamReader::new(reader, config)),
        }
    }

    pub fn format(&self) -> InputFormat {
        match self {
            ContigSource::Ace(_) => InputFormat::Ace,
            ContigSource::Sam(_) => InputFormat::Sam,
        }
    }
}

impl ContigSource<InputReader> {
    pub fn open(path: &Path, config: &Config) -> crate::utils::Result<Self> {
        let format = detect_file_format(path)?;
        log::debug!("Reading {} as {}", path.display(), format);
        let reader = open_input_reader(path)?;
        Ok(Self::from_reader(format, reader, config))
    }
}

impl<R: BufRead> Iterator for ContigSource<R> {
    type Item = Result<Contig, ContigError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ContigSource::Ace(reader) => reader.next(),
            ContigSource::Sam(reader) => reader.next(),
        }
    }
}

/// Contig stream item tagged with its position in the input.
pub type ContigItem = (usize, Result<Contig, ContigError>);

/// Feeds the contigs of a source into a channel until the input ends, the receiver
/// goes away or `cancel` is raised. The flag is checked between contigs only.
pub fn stream_contigs_into_channel<R: BufRead>(
    source: ContigSource<R>,
    sender: Sender<ContigItem>,
    cancel: &AtomicBool,
) -> usize {
    let mut sent = 0;
    for (index, item) in source.enumerate() {
        if cancel.load(Ordering::Relaxed) {
            log::warn!("Input streaming cancelled after {} contigs", sent);
            break;
        }
        if sender.send((index, item)).is_err() {
            log::error!("Contig receiver disconnected");
            break;
        }
        sent += 1;
    }
    sent
}

/// Summary of an input file gathered without running the analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct InputStatistics {
    pub format: String,
    pub contigs: usize,
    pub reads: usize,
    pub skipped_records: usize,
    pub read_groups: Vec<String>,
}

impl InputStatistics {
    pub fn new(format: &str) -> Self {
        InputStatistics {
            format: format.to_string(),
            contigs: 0,
            reads: 0,
            skipped_records: 0,
            read_groups: Vec::new(),
        }
    }
}

pub fn collect_statistics(path: &Path, config: &Config) -> crate::utils::Result<InputStatistics> {
    let format = detect_file_format(path)?;
    let reader = open_input_reader(path)?;
    let stats = match format {
        InputFormat::Ace => ace::collect_statistics(reader, config),
        InputFormat::Sam => sam::collect_statistics(reader, config),
    };
    stats.map_err(|e| format!("{}: {}", path.display(), e))
}
