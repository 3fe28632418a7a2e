mod csv;
mod summary;

pub use csv::CsvWriter;
pub use summary::{haplotype_listing, snp_listing, summary_line, write_summary};
