//! Fixed nucleotide alphabet shared by every analysis step.
//!
//! Symbols map to dense indices `A=0, C=1, G=2, T=3, *=4`; every other byte is
//! unknown and never counted.

pub const NUM_NUCLEOTIDES: usize = 5;
pub const GAP: u8 = b'*';
pub const GAP_INDEX: usize = 4;

const ALPHABET: [u8; NUM_NUCLEOTIDES] = [b'A', b'C', b'G', b'T', GAP];

/// Per-symbol tally indexed by nucleotide index.
pub type AlleleCounts = [u32; NUM_NUCLEOTIDES];

pub fn nuc_to_index(base: u8) -> Option<usize> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        GAP => Some(GAP_INDEX),
        _ => None,
    }
}

pub fn index_to_nuc(index: usize) -> u8 {
    ALPHABET.get(index).copied().unwrap_or(b'N')
}

/// IUPAC ambiguity code for a pair of allele indices, `N` when the pair has none.
pub fn iupac_code(first: usize, second: usize) -> u8 {
    let (lo, hi) = if first <= second {
        (first, second)
    } else {
        (second, first)
    };
    match lo * 10 + hi {
        3 => b'W',
        12 => b'S',
        2 => b'R',
        13 => b'Y',
        1 => b'M',
        23 => b'K',
        _ => b'N',
    }
}
