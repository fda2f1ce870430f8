mod aminoacid;
mod peptide;
mod residue;
mod sequence;

pub use aminoacid::*;
pub use peptide::*;
pub use residue::*;
pub use sequence::*;
