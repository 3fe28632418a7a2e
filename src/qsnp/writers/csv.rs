//! Delimited result tables, one file per table, each with a byte-offset index.

use crate::qsnp::model::{nucleotide::index_to_nuc, Contig};
use crate::utils::{Config, Result};
use std::{
    fs::File,
    io::{BufWriter, Seek, Write},
    path::Path,
};

const CONTIG_COLUMNS: [&str; 9] = [
    "contig",
    "potential_snps",
    "high_confidence_snps",
    "reliable_snps",
    "d_value",
    "reads",
    "haplotypes",
    "max_haplotypes_per_snp",
    "sequence",
];
const READ_COLUMNS: [&str; 6] = ["read", "haplotype", "contig", "start", "group", "sequence"];
const HAPLOTYPE_COLUMNS: [&str; 2] = ["contig", "haplotype"];
const VARIATION_COLUMNS: [&str; 8] = [
    "contig",
    "position",
    "major",
    "minor",
    "high_confidence",
    "reliable",
    "defining",
    "flank",
];
const READ_GROUP_COLUMNS: [&str; 3] = ["contig", "position", "groups"];

/// One output table plus its `.inx` companion mapping contigs to row offsets.
struct Table {
    writer: csv::Writer<File>,
    index: BufWriter<File>,
}

fn create(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| format!("Failed to create {}: {}", path.display(), e))
}

impl Table {
    fn new(dir: &Path, file_name: &str, columns: &[&str], separator: char) -> Result<Table> {
        let path = dir.join(file_name);
        let index_path = dir.join(format!("{}.inx", file_name));
        let delimiter = u8::try_from(separator)
            .map_err(|_| format!("Field separator must be a single byte: {:?}", separator))?;
        // Read group rows carry one column per group.
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_writer(create(&path)?);
        writer
            .write_record(columns)
            .map_err(|e| format!("Failed to write header of {}: {}", path.display(), e))?;
        Ok(Table {
            writer,
            index: BufWriter::new(create(&index_path)?),
        })
    }

    /// Byte offset of the next row in the table file.
    fn offset(&mut self) -> Result<u64> {
        self.writer
            .flush()
            .map_err(|e| format!("Flush failed: {}", e))?;
        let mut file: &File = self.writer.get_ref();
        file.stream_position()
            .map_err(|e| format!("Failed to query table position: {}", e))
    }

    fn write_rows(&mut self, contig: &str, rows: Vec<Vec<String>>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let offset = self.offset()?;
        writeln!(self.index, "{}\t{}", contig, offset)
            .map_err(|e| format!("Index write failed: {}", e))?;
        for row in rows {
            self.writer
                .write_record(&row)
                .map_err(|e| format!("Write failed: {}", e))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .and_then(|_| self.index.flush())
            .map_err(|e| format!("Flush failed: {}", e))
    }
}

/// Writes analysed contigs into the contig, read, haplotype, variation and read
/// group tables of an output directory.
pub struct CsvWriter {
    contigs: Table,
    reads: Table,
    haplotypes: Table,
    variations: Table,
    read_groups: Option<Table>,
    use_iupac_codes: bool,
    show_contigs_without_snp: bool,
}

impl CsvWriter {
    pub fn new(output_dir: &Path, config: &Config) -> Result<CsvWriter> {
        let sep = config.field_separator;
        let read_groups = if config.output_read_groups {
            Some(Table::new(
                output_dir,
                &config.read_groups_file,
                &READ_GROUP_COLUMNS,
                sep,
            )?)
        } else {
            None
        };
        Ok(CsvWriter {
            contigs: Table::new(output_dir, &config.contigs_file, &CONTIG_COLUMNS, sep)?,
            reads: Table::new(output_dir, &config.reads_file, &READ_COLUMNS, sep)?,
            haplotypes: Table::new(output_dir, &config.haplotypes_file, &HAPLOTYPE_COLUMNS, sep)?,
            variations: Table::new(output_dir, &config.variations_file, &VARIATION_COLUMNS, sep)?,
            read_groups,
            use_iupac_codes: config.use_iupac_codes,
            show_contigs_without_snp: config.show_contigs_without_snp,
        })
    }

    /// Appends one contig to every table; returns whether it was written.
    pub fn write(&mut self, contig: &Contig) -> Result<bool> {
        if contig.variations.is_empty() && !self.show_contigs_without_snp {
            return Ok(false);
        }
        let name = contig.name.as_str();

        let sequence = if self.use_iupac_codes {
            contig.iupac_sequence()
        } else {
            contig.sequence().to_vec()
        };
        let contig_row = vec![
            name.to_string(),
            contig.potential_snp_count().to_string(),
            contig.high_confidence_snp_count().to_string(),
            contig.reliable_snp_count().to_string(),
            format!("{:.3}", contig.d_value()),
            contig.reads.len().to_string(),
            contig.haplotypes.len().to_string(),
            contig.max_haplotypes_per_snp().to_string(),
            String::from_utf8_lossy(&sequence).into_owned(),
        ];
        self.contigs.write_rows(name, vec![contig_row])?;

        let read_rows = contig
            .reads
            .iter()
            .map(|read| {
                vec![
                    read.name().to_string(),
                    read.haplotype.map_or("-1".to_string(), |id| id.to_string()),
                    name.to_string(),
                    (read.start + 1).to_string(),
                    read.group.clone().unwrap_or_default(),
                    String::from_utf8_lossy(read.sequence()).into_owned(),
                ]
            })
            .collect();
        self.reads.write_rows(name, read_rows)?;

        let haplotype_rows = contig
            .haplotypes
            .iter()
            .map(|hap| vec![name.to_string(), hap.id.to_string()])
            .collect();
        self.haplotypes.write_rows(name, haplotype_rows)?;

        let variation_rows = contig
            .variations
            .iter()
            .map(|var| {
                vec![
                    name.to_string(),
                    (var.pos + 1).to_string(),
                    (var.major_nuc() as char).to_string(),
                    (var.minor_nuc() as char).to_string(),
                    var.is_high_confidence().to_string(),
                    var.reliable.to_string(),
                    var.defining.to_string(),
                    var.flank_length.to_string(),
                ]
            })
            .collect();
        self.variations.write_rows(name, variation_rows)?;

        if let Some(table) = self.read_groups.as_mut() {
            table.write_rows(name, read_group_rows(contig))?;
        }
        Ok(true)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.contigs.flush()?;
        self.reads.flush()?;
        self.haplotypes.flush()?;
        self.variations.flush()?;
        if let Some(table) = self.read_groups.as_mut() {
            table.flush()?;
        }
        Ok(())
    }
}

/// Major/minor allele counts per read group at every reliable variation.
fn read_group_rows(contig: &Contig) -> Vec<Vec<String>> {
    if contig.read_groups.is_empty() {
        return Vec::new();
    }
    contig
        .variations
        .iter()
        .filter(|var| var.reliable)
        .map(|var| {
            let pos = var.pos as i64;
            let groups = contig.read_groups.iter().map(|(group, members)| {
                let count = |nuc: u8| {
                    members
                        .iter()
                        .filter(|&&r| contig.reads[r].base_at(pos) == Some(nuc))
                        .count()
                };
                let (major, minor) = (index_to_nuc(var.major), index_to_nuc(var.minor));
                format!(
                    "{}={}:{}/{}:{}",
                    group,
                    major as char,
                    count(major),
                    minor as char,
                    count(minor)
                )
            });
            let mut row = vec![contig.name.clone(), (var.pos + 1).to_string()];
            row.extend(groups);
            row
        })
        .collect()
}
