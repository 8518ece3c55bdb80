use phf::{Map, phf_map};

pub const STOP: char = '*';

static STANDARD_CODE: Map<&'static str, char> = phf_map! {
    "TTT" => 'F', "TTC" => 'F', "TTA" => 'L', "TTG" => 'L',
    "CTT" => 'L', "CTC" => 'L', "CTA" => 'L', "CTG" => 'L',
    "ATT" => 'I', "ATC" => 'I', "ATA" => 'I', "ATG" => 'M',
    "GTT" => 'V', "GTC" => 'V', "GTA" => 'V', "GTG" => 'V',
    "TCT" => 'S', "TCC" => 'S', "TCA" => 'S', "TCG" => 'S',
    "CCT" => 'P', "CCC" => 'P', "CCA" => 'P', "CCG" => 'P',
    "ACT" => 'T', "ACC" => 'T', "ACA" => 'T', "ACG" => 'T',
    "GCT" => 'A', "GCC" => 'A', "GCA" => 'A', "GCG" => 'A',
    "TAT" => 'Y', "TAC" => 'Y', "TAA" => '*', "TAG" => '*',
    "CAT" => 'H', "CAC" => 'H', "CAA" => 'Q', "CAG" => 'Q',
    "AAT" => 'N', "AAC" => 'N', "AAA" => 'K', "AAG" => 'K',
    "GAT" => 'D', "GAC" => 'D', "GAA" => 'E', "GAG" => 'E',
    "TGT" => 'C', "TGC" => 'C', "TGA" => '*', "TGG" => 'W',
    "CGT" => 'R', "CGC" => 'R', "CGA" => 'R', "CGG" => 'R',
    "AGT" => 'S', "AGC" => 'S', "AGA" => 'R', "AGG" => 'R',
    "GGT" => 'G', "GGC" => 'G', "GGA" => 'G', "GGG" => 'G',
};

/// Standard genetic code lookup. Accepts DNA or RNA, any case.
pub fn translate_codon(codon: &str) -> Option<char> {
    let key = crate::core::sequence::normalize(codon);
    STANDARD_CODE.get(key.as_str()).copied()
}

/// All codons encoding `residue`, in table order.
pub fn codons_for(residue: char) -> Vec<&'static str> {
    let residue = residue.to_ascii_uppercase();
    let mut codons: Vec<&'static str> = STANDARD_CODE
        .entries()
        .filter(|&(_, &aa)| aa == residue)
        .map(|(codon, _)| *codon)
        .collect();
    codons.sort_unstable();
    codons
}

pub fn is_amino_acid(residue: char) -> bool {
    let residue = residue.to_ascii_uppercase();
    STANDARD_CODE.values().any(|&aa| aa == residue)
}

/// Translates a nucleotide sequence codon by codon; trailing bases are ignored.
pub fn translate(sequence: &str) -> Option<String> {
    sequence
        .as_bytes()
        .chunks_exact(3)
        .map(|chunk| std::str::from_utf8(chunk).ok().and_then(translate_codon))
        .collect()
}
