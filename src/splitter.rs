use crate::store::{chunk_key, descriptor_key, ObjectStore};
use crate::SeqsumError;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Chunks are cut at fixed byte offsets. A k-mer spanning two chunks is
/// lost to both; the per-unit statistics are exact for the bytes each unit
/// receives.
pub const DEFAULT_CHUNK_BYTES: usize = 100 * 1024 * 1024;

/// Fixes the shape of a batch: how many units exist and what k the workers
/// use. Registered once by the splitter, immutable afterward. The
/// coordinator refuses to guess an expected count from trigger payloads;
/// this record is the only source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDescriptor {
    pub batch: String,
    pub expected_count: usize,
    pub kmer_size: usize,
}

impl BatchDescriptor {
    pub fn register(&self, store: &dyn ObjectStore) -> Result<(), SeqsumError> {
        if self.expected_count == 0 {
            return Err(SeqsumError::MalformedBatch(format!(
                "batch {} has expected count 0",
                self.batch
            )));
        }
        if self.kmer_size == 0 {
            return Err(SeqsumError::MalformedBatch(format!(
                "batch {} has k-mer size 0",
                self.batch
            )));
        }
        let bytes = serde_json::to_vec(self)?;
        store.put(&descriptor_key(&self.batch), bytes)
    }

    /// `Ok(None)` when no descriptor was ever registered for the batch; a
    /// registered but unusable descriptor is an error.
    pub fn load(store: &dyn ObjectStore, batch: &str) -> Result<Option<Self>, SeqsumError> {
        let Some(bytes) = store.get(&descriptor_key(batch))? else {
            return Ok(None);
        };
        let descriptor: BatchDescriptor = serde_json::from_slice(&bytes)?;
        if descriptor.expected_count == 0 {
            return Err(SeqsumError::MalformedBatch(format!(
                "batch {} has expected count 0",
                batch
            )));
        }
        if descriptor.kmer_size == 0 {
            return Err(SeqsumError::MalformedBatch(format!(
                "batch {} has k-mer size 0",
                batch
            )));
        }
        Ok(Some(descriptor))
    }
}

/// Splits an input stream into fixed-size chunks and registers the batch.
pub struct Splitter {
    chunk_bytes: usize,
}

impl Splitter {
    pub fn new(chunk_bytes: usize) -> Self {
        Self { chunk_bytes }
    }

    /// Read the input, write one chunk object per `chunk_bytes` slice, and
    /// register a descriptor fixing the expected unit count.
    pub fn split<R: Read>(
        &self,
        batch: &str,
        kmer_size: usize,
        mut reader: R,
        store: &dyn ObjectStore,
    ) -> Result<BatchDescriptor, SeqsumError> {
        if self.chunk_bytes == 0 {
            return Err(SeqsumError::Other("chunk size must be positive".to_string()));
        }

        let mut buffer: Vec<u8> = Vec::with_capacity(self.chunk_bytes.min(1 << 20));
        let mut block = vec![0u8; self.chunk_bytes.min(1 << 20)];
        let mut chunk_index = 0usize;

        loop {
            let n = reader.read(&mut block).map_err(SeqsumError::Io)?;
            if n == 0 {
                if !buffer.is_empty() {
                    store.put(&chunk_key(batch, chunk_index), std::mem::take(&mut buffer))?;
                    chunk_index += 1;
                }
                break;
            }

            let mut slice = &block[..n];
            while !slice.is_empty() {
                let room = self.chunk_bytes - buffer.len();
                let take = room.min(slice.len());
                buffer.extend_from_slice(&slice[..take]);
                slice = &slice[take..];
                if buffer.len() == self.chunk_bytes {
                    store.put(&chunk_key(batch, chunk_index), std::mem::take(&mut buffer))?;
                    chunk_index += 1;
                }
            }
        }

        if chunk_index == 0 {
            return Err(SeqsumError::MalformedBatch(format!(
                "batch {} input was empty",
                batch
            )));
        }

        let descriptor = BatchDescriptor {
            batch: batch.to_string(),
            expected_count: chunk_index,
            kmer_size,
        };
        descriptor.register(store)?;
        tracing::info!(
            batch,
            chunks = chunk_index,
            kmer_size,
            "batch split and registered"
        );
        Ok(descriptor)
    }
}
