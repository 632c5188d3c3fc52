//! Types that mirror the monitor backend's JSON snapshot.
//!
//! Optional producer fields default when absent; unknown fields are ignored.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuFrequency {
    pub current: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub overall: f32,
    pub per_core: Vec<f32>,
    pub cores: usize,
    // 1, 5 and 15 minute load averages
    pub load_avg: [f64; 3],
    #[serde(default)]
    pub physical_cores: Option<usize>,
    #[serde(default)]
    pub frequency: Option<CpuFrequency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapStats {
    pub total: u64,
    pub used: u64,
    #[serde(default)]
    pub free: u64,
    pub percent: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f32,
    pub swap: SwapStats,
    #[serde(default)]
    pub free: u64,
    #[serde(default)]
    pub cached: u64,
    #[serde(default)]
    pub buffers: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    #[serde(default)]
    pub errors_in: u64,
    #[serde(default)]
    pub errors_out: u64,
    #[serde(default)]
    pub drops_in: u64,
    #[serde(default)]
    pub drops_out: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    // cumulative totals since the producer started
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    // instantaneous rates, bytes/sec
    pub bytes_sent_rate: f64,
    pub bytes_recv_rate: f64,
    #[serde(default)]
    pub packets_sent: u64,
    #[serde(default)]
    pub packets_recv: u64,
    // keyed by interface name; BTreeMap keeps the table order stable
    #[serde(default)]
    pub interfaces: BTreeMap<String, InterfaceStats>,
}

/// Traffic aggregated per remote address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpTraffic {
    pub ip: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub connections: u32,
    // recently seen "ip:port" endpoints, already capped by the producer
    #[serde(default)]
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    #[serde(default)]
    pub status: Option<String>,
}

/// One telemetry tick. Never mutated after decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    // producer wall-clock time; an explicit offset is dropped after parsing
    #[serde(deserialize_with = "producer_time::deserialize")]
    pub timestamp: NaiveDateTime,
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    pub network: NetworkStats,
    #[serde(default)]
    pub ip_traffic: Vec<IpTraffic>,
    // producer sorts by cpu_percent, descending
    #[serde(default)]
    pub processes: Vec<ProcessInfo>,
}

impl Snapshot {
    /// Parse one text frame and check the structural invariants the
    /// consumers rely on.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let snap: Snapshot = serde_json::from_str(text)?;
        snap.validate()?;
        Ok(snap)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if self.cpu.per_core.len() != self.cpu.cores {
            return Err(DecodeError::CoreCountMismatch {
                cores: self.cpu.cores,
                per_core: self.cpu.per_core.len(),
            });
        }
        Ok(())
    }
}

mod producer_time {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{de::Error, Deserialize, Deserializer};

    // Accepts both `2024-05-01T12:00:00.25` and `2024-05-01T12:00:00Z` / `+02:00`.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(dt.naive_local());
        }
        raw.parse::<NaiveDateTime>().map_err(D::Error::custom)
    }
}
