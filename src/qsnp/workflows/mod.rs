mod contig;

pub use contig::{analyze_contig, group_reads, ContigReport};
