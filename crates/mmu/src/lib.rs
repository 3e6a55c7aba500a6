mod backing_store;
mod page_table;
mod snapshot;

pub use snapshot::SNAPSHOT_DIR;

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use backing_store::BackingStore;
use page_table::{Frame, PageTable};

/// Outcome of a virtual memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access<T> {
    /// Every touched page was resident; the access happened.
    Hit(T),
    /// The page holding this byte address is absent. Nothing changed; the
    /// caller must have the fault serviced and retry. A 2-byte access that
    /// straddles a page boundary can fault on either page.
    Fault(i32),
    /// The address lies outside the process's address space.
    Violation,
}

/// Cumulative paging counters, readable without taking the MMU lock.
#[derive(Debug, Default)]
pub struct PagingStats {
    page_ins: AtomicU64,
    page_outs: AtomicU64,
}

impl PagingStats {
    pub fn page_ins(&self) -> u64 {
        self.page_ins.load(Ordering::Relaxed)
    }

    pub fn page_outs(&self) -> u64 {
        self.page_outs.load(Ordering::Relaxed)
    }
}

/// Demand-paged memory manager.
///
/// Design at a glance:
/// - Physical memory is a single `Vec<u8>`; frames are `frame_size` slices
///   into it.
/// - Each registered process gets a flat page table of
///   `ceil(memory_size / frame_size)` entries, all absent at first.
/// - Reads and writes move 2-byte values, each byte resolved through its own
///   page, and report a three-way outcome: hit, page fault (absent page, no
///   state change), or violation (address outside the process's space).
/// - Replacement is FIFO over resident frames; eviction writes dirty pages
///   to a flat backing-store file whose slots are append-allocated and never
///   reclaimed.
/// - One mutex serializes page tables, the frame table, the FIFO queue, RAM,
///   and backing-store I/O. `page_ins`/`page_outs` are atomics so status
///   queries never contend with fault service.
#[derive(Debug)]
pub struct MemoryManager {
    total_memory: usize,
    frame_size: usize,
    inner: Mutex<MmuInner>,
    stats: PagingStats,
}

#[derive(Debug)]
struct MmuInner {
    ram: Vec<u8>,
    frames: Vec<Frame>,
    free_frames: VecDeque<usize>,
    /// Resident frames in load order; the head is the next eviction victim.
    fifo: VecDeque<usize>,
    tables: HashMap<u32, PageTable>,
    store: BackingStore,
}

impl MemoryManager {
    /// Build a manager over `total_memory` bytes of physical RAM split into
    /// `frame_size` frames, with its backing store at `store_path`. The file
    /// is truncated: nothing persists across runs.
    pub fn new(total_memory: usize, frame_size: usize, store_path: &Path) -> io::Result<Self> {
        assert!(frame_size > 0, "frame size must be > 0");
        assert!(
            total_memory >= frame_size,
            "total memory must hold at least one frame"
        );
        let num_frames = total_memory / frame_size;
        let store = BackingStore::create(store_path, frame_size)?;
        Ok(Self {
            total_memory,
            frame_size,
            inner: Mutex::new(MmuInner {
                ram: vec![0u8; num_frames * frame_size],
                frames: vec![Frame::default(); num_frames],
                free_frames: (0..num_frames).collect(),
                fifo: VecDeque::new(),
                tables: HashMap::new(),
                store,
            }),
            stats: PagingStats::default(),
        })
    }

    pub fn total_memory(&self) -> usize {
        self.total_memory
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn stats(&self) -> &PagingStats {
        &self.stats
    }

    /// Bytes currently backed by a physical frame.
    pub fn used_memory(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        (inner.frames.len() - inner.free_frames.len()) * self.frame_size
    }

    /// Number of this process's pages currently resident.
    pub fn resident_page_count(&self, pid: u32) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .tables
            .get(&pid)
            .map_or(0, |t| t.entries.iter().filter(|e| e.present).count())
    }

    /// Allocate an all-absent page table for a new process.
    pub fn register_process(&self, pid: u32, memory_size: usize) {
        let mut inner = self.inner.lock().unwrap();
        let table = PageTable::new(memory_size, self.frame_size);
        log::debug!(
            "registered pid={pid} memory_size={memory_size} pages={}",
            table.entries.len()
        );
        inner.tables.insert(pid, table);
    }

    /// Physical offset of one virtual byte, or `None` while its page is out.
    fn byte_offset(&self, table: &PageTable, addr: usize) -> Option<usize> {
        let pte = &table.entries[addr / self.frame_size];
        let frame = pte.frame.filter(|_| pte.present)?;
        Some(frame * self.frame_size + addr % self.frame_size)
    }

    /// Read the 2-byte value at `addr` in `pid`'s address space. The two
    /// bytes resolve independently, so a value crossing a page boundary
    /// needs both pages resident.
    pub fn read_u16(&self, pid: u32, addr: i32) -> Access<u16> {
        let inner = self.inner.lock().unwrap();
        let Some(table) = inner.tables.get(&pid) else {
            return Access::Violation;
        };
        if addr < 0 || addr as usize + 2 > table.memory_size {
            return Access::Violation;
        }
        let addr = addr as usize;
        let Some(lo) = self.byte_offset(table, addr) else {
            return Access::Fault(addr as i32);
        };
        let Some(hi) = self.byte_offset(table, addr + 1) else {
            return Access::Fault((addr + 1) as i32);
        };
        Access::Hit(u16::from_le_bytes([inner.ram[lo], inner.ram[hi]]))
    }

    /// Write the 2-byte value at `addr` in `pid`'s address space, marking
    /// every touched page dirty. Nothing is written unless both bytes
    /// resolve, so a faulted write leaves no partial state behind.
    pub fn write_u16(&self, pid: u32, addr: i32, value: u16) -> Access<()> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let Some(table) = inner.tables.get_mut(&pid) else {
            return Access::Violation;
        };
        if addr < 0 || addr as usize + 2 > table.memory_size {
            return Access::Violation;
        }
        let addr = addr as usize;
        let Some(lo) = self.byte_offset(table, addr) else {
            return Access::Fault(addr as i32);
        };
        let Some(hi) = self.byte_offset(table, addr + 1) else {
            return Access::Fault((addr + 1) as i32);
        };
        table.entries[addr / self.frame_size].dirty = true;
        table.entries[(addr + 1) / self.frame_size].dirty = true;
        let bytes = value.to_le_bytes();
        inner.ram[lo] = bytes[0];
        inner.ram[hi] = bytes[1];
        Access::Hit(())
    }

    /// Bring `page` of `pid` into a frame: grab a free frame or evict the
    /// FIFO head (writing it back first if dirty), then load the page's
    /// bytes from its backing slot or zero-fill a never-swapped page.
    ///
    /// I/O errors are the environment failing underneath us; callers treat
    /// them as fatal.
    pub fn handle_page_fault(&self, pid: u32, page: usize) -> io::Result<()> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        match inner.tables.get(&pid) {
            Some(table) if page < table.entries.len() && !table.entries[page].present => {}
            // Already resident, out of range, or the process is gone.
            _ => return Ok(()),
        }

        let frame = match inner.free_frames.pop_front() {
            Some(frame) => frame,
            None => {
                let victim = inner.fifo.pop_front().expect("no physical frames configured");
                let (vpid, vpage) = inner.frames[victim]
                    .owner
                    .expect("queued frame has no owner");
                let table = inner
                    .tables
                    .get_mut(&vpid)
                    .expect("frame owner has no page table");
                let pte = &mut table.entries[vpage];
                if pte.dirty {
                    let offset = match pte.store_offset {
                        Some(offset) => offset,
                        None => {
                            let offset = inner.store.allocate();
                            pte.store_offset = Some(offset);
                            offset
                        }
                    };
                    let base = victim * self.frame_size;
                    inner
                        .store
                        .write_frame(offset, &inner.ram[base..base + self.frame_size])?;
                }
                pte.present = false;
                pte.dirty = false;
                pte.frame = None;
                inner.frames[victim].owner = None;
                self.stats.page_outs.fetch_add(1, Ordering::Relaxed);
                log::debug!("page-out pid={vpid} page={vpage} frame={victim}");
                victim
            }
        };

        let table = inner
            .tables
            .get_mut(&pid)
            .expect("faulting process has no page table");
        let pte = &mut table.entries[page];
        let base = frame * self.frame_size;
        let slot = &mut inner.ram[base..base + self.frame_size];
        match pte.store_offset {
            Some(offset) => inner.store.read_frame(offset, slot)?,
            None => slot.fill(0),
        }
        pte.present = true;
        pte.frame = Some(frame);
        inner.frames[frame].owner = Some((pid, page));
        inner.fifo.push_back(frame);
        self.stats.page_ins.fetch_add(1, Ordering::Relaxed);
        log::debug!("page-in pid={pid} page={page} frame={frame}");
        Ok(())
    }

    /// Drop a finished process: free its resident frames, pull them out of
    /// the FIFO queue without disturbing the order of the others, and delete
    /// its page table. Backing-store slots are simply abandoned.
    pub fn release_process(&self, pid: u32) {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let Some(table) = inner.tables.remove(&pid) else {
            return;
        };
        let mut freed = 0usize;
        for pte in &table.entries {
            if let Some(frame) = pte.frame.filter(|_| pte.present) {
                inner.frames[frame].owner = None;
                inner.free_frames.push_back(frame);
                freed += 1;
            }
        }
        let frames = &inner.frames;
        inner.fifo.retain(|f| frames[*f].owner.is_some());
        log::debug!("released pid={pid} frames_freed={freed}");
    }
}
