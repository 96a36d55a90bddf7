//! In-memory procfs for tests.
//!
//! `MockFs` can be cloned and mutated after it has been handed to a sampler,
//! which lets tests make a source disappear between two cycles.

use crate::core::FileSystem;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Shared in-memory filesystem.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    files: Arc<RwLock<HashMap<PathBuf, String>>>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `/proc` with every source the sampler reads, using the fixtures below.
    pub fn typical_system() -> Self {
        let fs = Self::new();
        fs.set_file("/proc/meminfo", fixtures::MEMINFO);
        fs.set_file("/proc/stat", fixtures::STAT);
        fs.set_file("/proc/diskstats", fixtures::DISKSTATS);
        fs.set_file("/proc/net/dev", fixtures::NET_DEV);
        fs
    }

    pub fn set_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files
            .write()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), content.into());
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.files.write().unwrap().remove(path.as_ref());
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("file not found: {:?}", path),
                )
            })
    }
}

/// Literal source texts in the kernel's formats.
pub mod fixtures {
    /// 16 GB total, 4 GB available: 75% used.
    pub const MEMINFO: &str = "\
MemTotal:       16000000 kB
MemFree:         1500000 kB
MemAvailable:    4000000 kB
Buffers:          345678 kB
Cached:          2456789 kB
SwapCached:            0 kB
SwapTotal:       2097148 kB
SwapFree:        2097148 kB
";

    pub const STAT: &str = "\
cpu  10132153 290696 3084719 46828483 16683 0 25195 0 0 0
cpu0 1393280 32966 572056 13343292 6130 0 17875 0 0 0
cpu1 1335560 25938 469917 13533540 3372 0 3316 0 0 0
intr 1462898 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
ctxt 1990473
btime 1062191376
processes 2915
procs_running 3
procs_blocked 0
softirq 183433 0 21755 12 39 0 0 0 0 0 161627
";

    /// `STAT` one interval later: 60 busy ticks and 40 idle ticks.
    pub const STAT_LATER: &str = "\
cpu  10132193 290696 3084739 46828513 16693 0 25195 0 0 0
cpu0 1393300 32966 572066 13343307 6135 0 17875 0 0 0
cpu1 1335580 25938 469927 13533555 3377 0 3316 0 0 0
intr 1463010 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
ctxt 1990611
btime 1062191376
processes 2917
procs_running 2
procs_blocked 0
softirq 183501 0 21790 12 39 0 0 0 0 0 161660
";

    pub const DISKSTATS: &str = "\
   7       0 loop0 52 0 2084 13 0 0 0 0 0 40 13 0 0 0 0
   8       0 sda 12345 678 987654 4321 23456 789 1234567 8765 0 9876 13086 0 0 0 0
   8       1 sda1 12000 600 980000 4000 23000 700 1230000 8000 0 9500 12000 0 0 0 0
   8      16 sdb 555 11 4444 333 666 22 5555 444 0 777 777 0 0 0 0
";

    pub const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1234567    8901    0    0    0     0          0         0  1234567    8901    0    0    0     0       0          0
wlp2s0: 987654321  654321  0    0    0     0          0         0 123456789  321098    0    0    0     0       0          0
docker0:       0       0    0    0    0     0          0         0     4512      38    0    0    0     0       0          0
";

    /// A host with only a wired interface.
    pub const NET_DEV_WIRED_ONLY: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1234567    8901    0    0    0     0          0         0  1234567    8901    0    0    0     0       0          0
enp3s0: 55512345  43210    0    0    0     0          0       120  9876543   23456    0    0    0     0       0          0
";
}
