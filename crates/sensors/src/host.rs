// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host metrics via sysinfo

use std::net::{ToSocketAddrs, UdpSocket};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, Networks, ProcessesToUpdate, System};

use crate::SensorError;

/// Usage of one mounted partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskUsage {
    pub mount_point: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub percent: f64,
}

/// Cumulative network interface counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

/// One observation of the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disks: Vec<DiskUsage>,
    pub network: NetworkCounters,
    pub processes_count: usize,
    pub uptime_seconds: u64,
    pub ip_address: Option<String>,
    pub hostname: Option<String>,
    pub platform: String,
}

impl HostSnapshot {
    /// Max usage across partitions; what thresholds and the cache row use.
    pub fn max_disk_percent(&self) -> f64 {
        self.disks.iter().map(|d| d.percent).fold(0.0, f64::max)
    }
}

/// One row of the process table
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cmdline: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub exe: Option<PathBuf>,
}

/// Source of host observations
#[async_trait]
pub trait HostMonitor: Send + Sync + 'static {
    async fn snapshot(&self) -> Result<HostSnapshot, SensorError>;
    async fn processes(&self) -> Result<Vec<ProcessInfo>, SensorError>;
}

/// Real host monitor backed by sysinfo.
///
/// Keeps one `System` alive so per-process CPU usage is a delta between
/// successive refreshes rather than always zero.
#[derive(Clone)]
pub struct SysinfoHost {
    sys: Arc<Mutex<System>>,
}

impl SysinfoHost {
    pub fn new() -> Self {
        Self {
            sys: Arc::new(Mutex::new(System::new())),
        }
    }
}

impl Default for SysinfoHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostMonitor for SysinfoHost {
    async fn snapshot(&self) -> Result<HostSnapshot, SensorError> {
        // CPU usage needs two refreshes separated by the minimum interval
        {
            let mut sys = self.sys.lock();
            sys.refresh_cpu_usage();
        }
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;

        let (cpu_percent, memory_percent, processes_count) = {
            let mut sys = self.sys.lock();
            sys.refresh_cpu_usage();
            sys.refresh_memory();
            sys.refresh_processes(ProcessesToUpdate::All, true);

            let memory_percent = if sys.total_memory() > 0 {
                sys.used_memory() as f64 / sys.total_memory() as f64 * 100.0
            } else {
                0.0
            };
            (
                sys.global_cpu_usage() as f64,
                memory_percent,
                sys.processes().len(),
            )
        };

        let disks = Disks::new_with_refreshed_list()
            .iter()
            .filter(|d| d.total_space() > 0)
            .map(|d| {
                let total = d.total_space();
                let available = d.available_space();
                DiskUsage {
                    mount_point: d.mount_point().display().to_string(),
                    total_bytes: total,
                    available_bytes: available,
                    percent: (total - available) as f64 / total as f64 * 100.0,
                }
            })
            .collect();

        let mut network = NetworkCounters::default();
        for (_name, data) in Networks::new_with_refreshed_list().iter() {
            network.bytes_sent += data.total_transmitted();
            network.bytes_recv += data.total_received();
            network.packets_sent += data.total_packets_transmitted();
            network.packets_recv += data.total_packets_received();
        }

        Ok(HostSnapshot {
            cpu_percent,
            memory_percent,
            disks,
            network,
            processes_count,
            uptime_seconds: System::uptime(),
            ip_address: primary_ip(),
            hostname: System::host_name(),
            platform: std::env::consts::OS.to_string(),
        })
    }

    async fn processes(&self) -> Result<Vec<ProcessInfo>, SensorError> {
        let mut sys = self.sys.lock();
        sys.refresh_processes(ProcessesToUpdate::All, true);

        let total_memory = sys.total_memory().max(1);
        let processes = sys
            .processes()
            .values()
            .map(|p| ProcessInfo {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                cmdline: p
                    .cmd()
                    .iter()
                    .map(|s| s.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" "),
                cpu_percent: p.cpu_usage(),
                memory_percent: (p.memory() as f64 / total_memory as f64 * 100.0) as f32,
                exe: p.exe().map(|p| p.to_path_buf()),
            })
            .collect();
        Ok(processes)
    }
}

/// Primary IP: open a datagram socket toward a public address and read the
/// local endpoint (no packet is sent), falling back to hostname resolution.
pub fn primary_ip() -> Option<String> {
    if let Ok(socket) = UdpSocket::bind(("0.0.0.0", 0)) {
        if socket.connect(("8.8.8.8", 80)).is_ok() {
            if let Ok(addr) = socket.local_addr() {
                return Some(addr.ip().to_string());
            }
        }
    }

    let host = System::host_name()?;
    (host.as_str(), 0)
        .to_socket_addrs()
        .ok()?
        .next()
        .map(|addr| addr.ip().to_string())
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;

    /// Scriptable host monitor for tests
    #[derive(Clone, Default)]
    pub struct FakeHost {
        snapshot: Arc<Mutex<HostSnapshot>>,
        processes: Arc<Mutex<Vec<ProcessInfo>>>,
    }

    impl FakeHost {
        pub fn new(snapshot: HostSnapshot) -> Self {
            Self {
                snapshot: Arc::new(Mutex::new(snapshot)),
                processes: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn set_snapshot(&self, snapshot: HostSnapshot) {
            *self.snapshot.lock() = snapshot;
        }

        pub fn set_processes(&self, processes: Vec<ProcessInfo>) {
            *self.processes.lock() = processes;
        }
    }

    #[async_trait]
    impl HostMonitor for FakeHost {
        async fn snapshot(&self) -> Result<HostSnapshot, SensorError> {
            Ok(self.snapshot.lock().clone())
        }

        async fn processes(&self) -> Result<Vec<ProcessInfo>, SensorError> {
            Ok(self.processes.lock().clone())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeHost;

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
