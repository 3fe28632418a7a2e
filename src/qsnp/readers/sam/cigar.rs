pub type CigarOp = rust_htslib::bam::record::Cigar;

pub trait CigarOpExt {
    /// Operation letter as it is stored in the per-base operation track.
    fn symbol(&self) -> u8;
    /// Read bases that stay on the alignment row.
    fn places_bases(&self) -> bool;
    /// Reference columns the read does not cover, kept as gap bases.
    fn opens_gap(&self) -> bool;
}

impl CigarOpExt for CigarOp {
    fn symbol(&self) -> u8 {
        self.char() as u8
    }

    fn places_bases(&self) -> bool {
        matches!(
            self,
            CigarOp::Match(_) | CigarOp::Ins(_) | CigarOp::Equal(_) | CigarOp::Diff(_)
        )
    }

    fn opens_gap(&self) -> bool {
        matches!(self, CigarOp::Del(_) | CigarOp::RefSkip(_) | CigarOp::Pad(_))
    }
}
