use std::collections::HashMap;

// Payloads at or above this length skip the substring scan and go through
// the hash index instead; the scan is quadratic in heap size.
const HASH_DEDUP_MIN: usize = 32;

/// Arena for variable-length payloads. Short payloads are deduplicated by
/// substring search so equal and overlapping strings share bytes; long
/// payloads by a rapidhash bucket index.
#[derive(Clone, Debug, Default)]
pub(crate) struct StrHeap {
    data: Vec<u8>,
    buckets: HashMap<u64, Vec<u32>>,
}

impl StrHeap {
    pub(crate) fn add(&mut self, new_data: &[u8]) -> usize {
        if new_data.len() >= HASH_DEDUP_MIN {
            let hash = rapidhash::rapidhash(new_data);
            if let Some(offs) = self.buckets.get(&hash) {
                for &off in offs {
                    let off = off as usize;
                    if self.data.get(off..off + new_data.len()) == Some(new_data) {
                        return off;
                    }
                }
            }
            let pos = self.data.len();
            self.data.extend_from_slice(new_data);
            self.buckets.entry(hash).or_default().push(pos as u32);
            pos
        } else if let Some(pos) = memchr::memmem::find(&self.data, new_data) {
            pos
        } else {
            let pos = self.data.len();
            self.data.extend_from_slice(new_data);
            pos
        }
    }

    pub(crate) fn get(&self, off: usize, len: usize) -> &[u8] {
        &self.data[off..off + len]
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Rebuild from raw bytes; the dedup index is rebuilt lazily (new adds
    /// simply re-hash), so decoded heaps start with empty buckets.
    pub(crate) fn from_bytes(data: Vec<u8>) -> Self {
        StrHeap {
            data,
            buckets: HashMap::new(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.data.clear();
        self.buckets.clear();
    }
}
