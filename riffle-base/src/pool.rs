// The buffer pool is the single shared mutable resource on the sort path.
// Pages are written once at allocation and immutable afterwards; pinning
// yields shared bytes, unpinning makes a page evictable again. When the
// resident set grows past the budget, unpinned pages are written out to a
// spill file and reloaded on the next pin.

use crate::{err_internal, err_resource, Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub type PageId = u64;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Resident-byte budget before unpinned pages spill.
    pub budget_bytes: usize,
    /// Where spilled pages go. `None` disables spilling; going over budget
    /// then fails with a resource error.
    pub spill_dir: Option<PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            budget_bytes: usize::MAX,
            spill_dir: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Pages allocated over the pool's lifetime.
    pub pages_allocated: usize,
    /// Pages currently live (not destroyed).
    pub pages_live: usize,
    pub resident_bytes: usize,
    pub peak_resident_bytes: usize,
    /// Page-spill events over the pool's lifetime.
    pub pages_spilled: usize,
}

pub trait BufferPool: Send + Sync {
    /// Store `bytes` as a new immutable page.
    fn allocate_page(&self, bytes: Vec<u8>) -> Result<PageId>;
    /// Make the page resident and hold it so until the matching `unpin`.
    fn pin(&self, id: PageId) -> Result<Arc<[u8]>>;
    fn unpin(&self, id: PageId);
    fn destroy_page(&self, id: PageId);
}

enum Slot {
    Resident { bytes: Arc<[u8]>, pins: u32 },
    Spilled { off: u64, len: usize },
}

#[derive(Default)]
struct PoolInner {
    slots: HashMap<PageId, Slot>,
    next_id: PageId,
    resident: usize,
    spill: Option<File>,
    spill_len: u64,
    stats: PoolStats,
}

pub struct MemPool {
    cfg: PoolConfig,
    spill_path: Option<PathBuf>,
    inner: Mutex<PoolInner>,
}

static POOL_SEQ: AtomicU64 = AtomicU64::new(0);

fn res_err(e: std::io::Error) -> Error {
    Error::with_kind(ErrorKind::Resource, e)
}

impl MemPool {
    pub fn new(cfg: PoolConfig) -> Self {
        let spill_path = cfg.spill_dir.as_ref().map(|dir| {
            dir.join(format!(
                "riffle-pool-{}-{}.spill",
                std::process::id(),
                POOL_SEQ.fetch_add(1, Ordering::Relaxed)
            ))
        });
        MemPool {
            cfg,
            spill_path,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    /// An unbudgeted, never-spilling pool.
    pub fn in_memory() -> Self {
        MemPool::new(PoolConfig::default())
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.lock().expect("pool mutex poisoned").stats
    }

    fn evict_over_budget(&self, inner: &mut PoolInner) -> Result<()> {
        if inner.resident <= self.cfg.budget_bytes {
            return Ok(());
        }
        let Some(path) = &self.spill_path else {
            return Err(err_resource(
                "buffer pool budget exhausted and spilling is disabled",
            ));
        };
        if inner.spill.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)
                .map_err(res_err)?;
            inner.spill = Some(file);
        }
        while inner.resident > self.cfg.budget_bytes {
            let victim = inner.slots.iter().find_map(|(id, slot)| match slot {
                Slot::Resident { bytes, pins: 0 } => Some((*id, bytes.clone())),
                _ => None,
            });
            let Some((vid, bytes)) = victim else {
                // Everything left is pinned; the working set itself may
                // exceed the budget.
                break;
            };
            let off = inner.spill_len;
            let file = inner.spill.as_mut().ok_or_else(|| err_internal("spill file vanished"))?;
            file.seek(SeekFrom::Start(off)).map_err(res_err)?;
            file.write_all(&bytes).map_err(res_err)?;
            inner.spill_len += bytes.len() as u64;
            inner.resident -= bytes.len();
            inner.stats.resident_bytes = inner.resident;
            inner.stats.pages_spilled += 1;
            debug!(target: "riffle", "spilled page {} ({} bytes)", vid, bytes.len());
            inner.slots.insert(
                vid,
                Slot::Spilled {
                    off,
                    len: bytes.len(),
                },
            );
        }
        Ok(())
    }
}

impl Drop for MemPool {
    fn drop(&mut self) {
        if let Some(path) = &self.spill_path {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl BufferPool for MemPool {
    fn allocate_page(&self, bytes: Vec<u8>) -> Result<PageId> {
        let mut inner = self.inner.lock().expect("pool mutex poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        let len = bytes.len();
        inner.resident += len;
        inner.stats.pages_allocated += 1;
        inner.stats.pages_live += 1;
        inner.stats.resident_bytes = inner.resident;
        inner.stats.peak_resident_bytes = inner.stats.peak_resident_bytes.max(inner.resident);
        inner.slots.insert(
            id,
            Slot::Resident {
                bytes: Arc::from(bytes),
                pins: 0,
            },
        );
        self.evict_over_budget(&mut inner)?;
        Ok(id)
    }

    fn pin(&self, id: PageId) -> Result<Arc<[u8]>> {
        let mut inner = self.inner.lock().expect("pool mutex poisoned");
        let spilled = match inner.slots.get_mut(&id) {
            None => return Err(err_internal("pin of unknown page")),
            Some(Slot::Resident { bytes, pins }) => {
                *pins += 1;
                return Ok(bytes.clone());
            }
            Some(Slot::Spilled { off, len }) => (*off, *len),
        };
        let (off, len) = spilled;
        let file = inner
            .spill
            .as_mut()
            .ok_or_else(|| err_internal("spilled page without a spill file"))?;
        file.seek(SeekFrom::Start(off)).map_err(res_err)?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).map_err(res_err)?;
        let bytes: Arc<[u8]> = Arc::from(buf);
        inner.resident += len;
        inner.stats.resident_bytes = inner.resident;
        inner.stats.peak_resident_bytes = inner.stats.peak_resident_bytes.max(inner.resident);
        inner.slots.insert(
            id,
            Slot::Resident {
                bytes: bytes.clone(),
                pins: 1,
            },
        );
        self.evict_over_budget(&mut inner)?;
        Ok(bytes)
    }

    fn unpin(&self, id: PageId) {
        let mut inner = self.inner.lock().expect("pool mutex poisoned");
        if let Some(Slot::Resident { pins, .. }) = inner.slots.get_mut(&id) {
            *pins = pins.saturating_sub(1);
        }
    }

    fn destroy_page(&self, id: PageId) {
        let mut inner = self.inner.lock().expect("pool mutex poisoned");
        match inner.slots.remove(&id) {
            Some(Slot::Resident { bytes, .. }) => {
                inner.resident -= bytes.len();
                inner.stats.resident_bytes = inner.resident;
                inner.stats.pages_live -= 1;
            }
            Some(Slot::Spilled { .. }) => {
                inner.stats.pages_live -= 1;
            }
            None => {}
        }
    }
}
