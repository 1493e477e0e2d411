//! System metrics for `SystemInfo` (§3), collected via `sysinfo` — the same crate the
//! teacher reaches for this concern (`ac_sysinfo.rs`'s `System::new_all()` /
//! `cpu_usage()` / `memory()`), rather than hand-parsing `/proc` or shelling out to `df`.

use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};

use fleet_proto::{DiskInfo, MemoryInfo, SystemInfo};

pub fn collect(root: &std::path::Path) -> SystemInfo {
    let mut sys = System::new_all();
    sys.refresh_cpu_usage();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu_usage_percent: sys.global_cpu_usage(),
        memory: MemoryInfo { total_bytes: sys.total_memory(), used_bytes: sys.used_memory() },
        disk: disk_info(root),
        load_avg: load_avg(),
        uptime_seconds: System::uptime(),
    }
}

/// Linux/macOS only in `sysinfo`; returns `[0.0, 0.0, 0.0]` elsewhere (Windows has no
/// load-average concept), matching the wire type's documented best-effort nature.
fn load_avg() -> [f64; 3] {
    let avg = System::load_average();
    [avg.one, avg.five, avg.fifteen]
}

/// The disk whose mount point is the longest matching prefix of `root` — the same
/// "closest enclosing filesystem" resolution `df <path>` performs.
fn disk_info(root: &std::path::Path) -> DiskInfo {
    let disks = Disks::new_with_refreshed_list();
    let best = disks
        .list()
        .iter()
        .filter(|disk| root.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len());

    match best {
        Some(disk) => {
            let total = disk.total_space();
            let used = total.saturating_sub(disk.available_space());
            DiskInfo { total_bytes: total, used_bytes: used }
        }
        None => DiskInfo::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_never_panics_on_any_platform() {
        let info = collect(std::path::Path::new("/"));
        assert!(!info.os.is_empty());
        assert!(!info.arch.is_empty());
    }

    #[test]
    fn test_disk_info_for_unmatched_root_falls_back_to_zeroed_default() {
        let info = disk_info(std::path::Path::new("/this/path/does/not/exist/as/a/mount"));
        assert_eq!(info.total_bytes, 0);
        assert_eq!(info.used_bytes, 0);
    }
}
