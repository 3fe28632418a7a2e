mod contig;
mod haplotype;
pub mod nucleotide;
mod read;
mod variation;

pub use contig::{Contig, Reference};
pub use haplotype::{HaploType, ReadProfile};
pub use read::Read;
pub use variation::Variation;
