use crate::summary::{KmerCounts, PartialSummary};
use crate::SeqsumError;
use rustc_hash::FxHashMap;
use std::io::Read;

/// Bytes streamed per read block, matching the 10 MB blocks the chunk
/// processor has always used. Peak memory stays bounded by this regardless
/// of unit size.
pub const DEFAULT_BLOCK_BYTES: usize = 10 * 1024 * 1024;

/// Processes one unit of raw sequence bytes into a [`PartialSummary`].
///
/// Stateless and pure: the summary is a function of the input bytes and k
/// alone. Anything that is not A/C/G/T after uppercasing is dropped, which
/// silently removes FASTA headers, newlines, and ambiguity codes.
pub struct UnitProcessor {
    k: usize,
    block_bytes: usize,
}

impl UnitProcessor {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            block_bytes: DEFAULT_BLOCK_BYTES,
        }
    }

    /// Smaller blocks exercise the carry-over path; tests use this.
    pub fn with_block_bytes(k: usize, block_bytes: usize) -> Self {
        Self { k, block_bytes }
    }

    /// Stream the unit's bytes, count k-mers and GC content, and build the
    /// partial summary.
    ///
    /// The trailing `k-1` filtered bases of each block are carried into the
    /// next, so every window of the logical sequence is counted exactly once
    /// no matter where read boundaries fall.
    pub fn process<R: Read>(
        &self,
        unit_index: usize,
        mut reader: R,
    ) -> Result<PartialSummary, SeqsumError> {
        if self.k == 0 {
            return Err(SeqsumError::MalformedBatch(
                "k-mer size must be positive".to_string(),
            ));
        }
        if self.block_bytes == 0 {
            return Err(SeqsumError::Other("block size must be positive".to_string()));
        }

        let mut block = vec![0u8; self.block_bytes];
        let mut window = Vec::with_capacity(self.block_bytes + self.k);
        let mut carry: Vec<u8> = Vec::new();
        let mut counts: FxHashMap<Vec<u8>, u64> = FxHashMap::default();
        let mut total_bases: u64 = 0;
        let mut gc_count: u64 = 0;

        loop {
            let n = reader.read(&mut block).map_err(SeqsumError::Io)?;
            if n == 0 {
                break;
            }

            window.clear();
            window.extend_from_slice(&carry);
            for &byte in &block[..n] {
                let base = byte.to_ascii_uppercase();
                if matches!(base, b'A' | b'C' | b'G' | b'T') {
                    window.push(base);
                    total_bases += 1;
                    if base == b'G' || base == b'C' {
                        gc_count += 1;
                    }
                }
            }

            // Every window here contains at least one base new to this
            // block: the carry is only k-1 long, so none of these were
            // counted against the previous block.
            for kmer in window.windows(self.k) {
                *counts.entry(kmer.to_vec()).or_insert(0) += 1;
            }

            let keep = window.len().min(self.k - 1);
            carry = window[window.len() - keep..].to_vec();
        }

        if total_bases < self.k as u64 {
            return Err(SeqsumError::InputTooShort {
                length: total_bases,
                k: self.k,
            });
        }

        let kmer_counts: KmerCounts = counts
            .into_iter()
            .map(|(kmer, count)| (String::from_utf8_lossy(&kmer).into_owned(), count))
            .collect();

        Ok(PartialSummary {
            unit_index,
            kmer_size: self.k,
            total_bases,
            gc_count,
            kmer_counts,
        })
    }
}
