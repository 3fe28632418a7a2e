//! Builds a gapped multiple alignment out of the reads of one SAM reference.

use super::record::{SamRead, SENTINEL_QUALITY};
use crate::qsnp::model::nucleotide::{index_to_nuc, nuc_to_index, AlleleCounts, NUM_NUCLEOTIDES};
use std::collections::HashMap;

/// Opens gaps in every overlapping read wherever some read carries an insertion.
///
/// Positions are scanned left to right; after the pass all reads share one gapped
/// coordinate system.
pub fn stretch_reads(reads: &mut [SamRead]) {
    let mut with_insertions: Vec<usize> = (0..reads.len())
        .filter(|&i| reads[i].has_insertions())
        .collect();
    let mut open: Vec<usize> = (0..reads.len()).collect();
    let mut pos: i64 = 1;
    let mut gaps = 0;
    while !with_insertions.is_empty() {
        with_insertions.retain(|&i| reads[i].operation_at(pos) != b'>');
        let insertion_here = with_insertions
            .iter()
            .any(|&i| reads[i].operation_at(pos) == b'I');
        if insertion_here {
            open.retain(|&i| reads[i].insert_gap_at(pos));
            gaps += 1;
        }
        pos += 1;
    }
    if gaps > 0 {
        log::trace!("Opened {} insertion columns across {} reads", gaps, reads.len());
    }
}

/// Joins the two mates of a pair into one read anchored at the leftmost start.
///
/// Where the mates overlap the call with the higher quality wins; the space between
/// non-overlapping mates is filled with blank bases of sentinel quality.
pub fn merge_mates(first: SamRead, second: SamRead) -> SamRead {
    let (mut left, right) = if second.start < first.start {
        (second, first)
    } else {
        (first, second)
    };
    let offset = (right.start - left.start) as usize;

    if offset >= left.len() {
        let filler = offset - left.len();
        left.sequence.extend(std::iter::repeat(b' ').take(filler));
        left.quality
            .extend(std::iter::repeat(SENTINEL_QUALITY).take(filler));
        left.operations.extend(std::iter::repeat(b' ').take(filler));
        left.sequence.extend_from_slice(&right.sequence);
        left.quality.extend_from_slice(&right.quality);
        left.operations.extend_from_slice(&right.operations);
    } else {
        let total = left.len().max(offset + right.len());
        let mut sequence = Vec::with_capacity(total);
        let mut quality = Vec::with_capacity(total);
        let mut operations = Vec::with_capacity(total);
        for i in 0..total {
            let from_right = i >= offset && i - offset < right.len();
            let use_right = from_right
                && (i >= left.len() || right.quality[i - offset] >= left.quality[i]);
            let (src, j) = if use_right {
                (&right, i - offset)
            } else {
                (&left, i)
            };
            sequence.push(src.sequence[j]);
            quality.push(src.quality[j]);
            operations.push(src.operations[j]);
        }
        left.sequence = sequence;
        left.quality = quality;
        left.operations = operations;
    }
    if left.group.is_none() {
        left.group = right.group;
    }
    left
}

/// Merges reads sharing a name, keeping first-seen order.
pub fn merge_pairs(reads: Vec<SamRead>) -> Vec<SamRead> {
    let mut merged: Vec<Option<SamRead>> = Vec::with_capacity(reads.len());
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for read in reads {
        match by_name.get(&read.name) {
            Some(&i) => {
                if let Some(mate) = merged[i].take() {
                    merged[i] = Some(merge_mates(mate, read));
                }
            }
            None => {
                by_name.insert(read.name.clone(), merged.len());
                merged.push(Some(read));
            }
        }
    }
    merged.into_iter().flatten().collect()
}

/// Majority consensus over the reads; `N` where no read is informative.
///
/// Ties go to the symbol first in alphabet order.
pub fn build_reference(reads: &[SamRead]) -> Vec<u8> {
    let length = reads.iter().map(|r| r.end()).max().unwrap_or(0).max(0) as usize;
    let mut starts: Vec<Vec<usize>> = vec![Vec::new(); length];
    for (i, read) in reads.iter().enumerate() {
        if let Some(bucket) = starts.get_mut(read.start.max(0) as usize) {
            bucket.push(i);
        }
    }

    let mut reference = Vec::with_capacity(length);
    let mut active: Vec<usize> = Vec::new();
    for (pos, bucket) in starts.iter().enumerate() {
        let pos = pos as i64;
        active.extend(bucket);
        active.retain(|&i| reads[i].end() > pos);

        let mut counts: AlleleCounts = [0; NUM_NUCLEOTIDES];
        for &i in &active {
            if let Some(nuc) = reads[i].base_at(pos).and_then(|b| nuc_to_index(b.to_ascii_uppercase())) {
                counts[nuc] += 1;
            }
        }
        let mut best = 0;
        for nuc in 1..NUM_NUCLEOTIDES {
            if counts[nuc] > counts[best] {
                best = nuc;
            }
        }
        reference.push(if counts[best] == 0 {
            b'N'
        } else {
            index_to_nuc(best)
        });
    }
    reference
}
