use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::MemoryManager;

/// Default directory for memory snapshot dumps.
pub const SNAPSHOT_DIR: &str = "memory_stamps";

impl MemoryManager {
    /// Dump frame occupancy to `<dir>/memory_stamp_<tick>.txt`. `names` maps
    /// pids to display names for the listing.
    pub fn write_snapshot(
        &self,
        dir: &Path,
        tick: u64,
        names: &HashMap<u32, String>,
    ) -> io::Result<PathBuf> {
        let inner = self.inner.lock().unwrap();
        let mut resident: Vec<u32> = inner
            .frames
            .iter()
            .filter_map(|f| f.owner.map(|(pid, _)| pid))
            .collect();
        resident.sort_unstable();
        resident.dedup();

        let mut out = String::new();
        out.push_str(&format!(
            "Timestamp: {}\n",
            chrono::Local::now().format("%m/%d/%Y, %I:%M:%S %p")
        ));
        out.push_str(&format!(
            "Number of processes in memory: {}\n",
            resident.len()
        ));
        out.push_str(&format!(
            "Free frames: {} / {}\n\n",
            inner.free_frames.len(),
            inner.frames.len()
        ));
        for (index, frame) in inner.frames.iter().enumerate() {
            match frame.owner {
                Some((pid, page)) => {
                    let name = names.get(&pid).map(String::as_str).unwrap_or("?");
                    out.push_str(&format!("frame {index:4}: pid {pid} ({name}) page {page}\n"));
                }
                None => out.push_str(&format!("frame {index:4}: free\n")),
            }
        }

        fs::create_dir_all(dir)?;
        let path = dir.join(format!("memory_stamp_{tick}.txt"));
        fs::write(&path, out)?;
        Ok(path)
    }
}
