//! Read-only projections of the latest snapshot for the rendering layer.
//! Recomputed on demand, nothing is cached.

use crate::format::{format_rate, human};
use crate::types::{InterfaceStats, IpTraffic, ProcessInfo, Snapshot};

/// How many endpoints of an address the traffic table shows.
pub const IP_URL_DISPLAY_LIMIT: usize = 3;

/// Clamp a producer percentage into 0..=100 for gauges; NaN reads as 0.
pub fn clamp_percent(p: f32) -> f32 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 100.0)
    }
}

pub fn total_connections(s: &Snapshot) -> u64 {
    s.ip_traffic.iter().map(|ip| u64::from(ip.connections)).sum()
}

/// First `n` processes in producer order (already sorted by CPU share).
pub fn top_processes(s: &Snapshot, n: usize) -> &[ProcessInfo] {
    &s.processes[..n.min(s.processes.len())]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterfaceRow<'a> {
    pub name: &'a str,
    pub stats: &'a InterfaceStats,
}

/// Per-interface table, ordered by interface name.
pub fn interfaces(s: &Snapshot) -> Vec<InterfaceRow<'_>> {
    s.network
        .interfaces
        .iter()
        .map(|(name, stats)| InterfaceRow {
            name: name.as_str(),
            stats,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreUsage {
    pub core: usize,
    pub percent: f32,
}

pub fn per_core(s: &Snapshot) -> Vec<CoreUsage> {
    s.cpu
        .per_core
        .iter()
        .enumerate()
        .map(|(core, p)| CoreUsage {
            core,
            percent: clamp_percent(*p),
        })
        .collect()
}

pub fn display_urls(ip: &IpTraffic) -> &[String] {
    &ip.urls[..IP_URL_DISPLAY_LIMIT.min(ip.urls.len())]
}

/// "used / total", e.g. `1.00 GB / 4.00 GB`.
pub fn memory_label(s: &Snapshot) -> String {
    format!("{} / {}", human(s.memory.used), human(s.memory.total))
}

pub fn swap_label(s: &Snapshot) -> String {
    format!("{} / {}", human(s.memory.swap.used), human(s.memory.swap.total))
}

/// Producer-side time of the snapshot.
pub fn clock_label(s: &Snapshot) -> String {
    s.timestamp.format("%H:%M:%S").to_string()
}

/// One-line digest of a snapshot, as printed by the headless runner.
pub fn summary(s: &Snapshot) -> String {
    let top = top_processes(s, 1)
        .first()
        .map(|p| format!("{} ({:.1}%)", p.name, clamp_percent(p.cpu_percent)))
        .unwrap_or_else(|| "-".into());
    format!(
        "[{}] cpu {:.1}% ({} cores) | mem {:.1}% ({}) | down {} | up {} | conns {} | top {}",
        clock_label(s),
        clamp_percent(s.cpu.overall),
        s.cpu.cores,
        clamp_percent(s.memory.percent),
        memory_label(s),
        format_rate(s.network.bytes_recv_rate),
        format_rate(s.network.bytes_sent_rate),
        total_connections(s),
        top,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::snapshot_json;

    fn snap() -> Snapshot {
        Snapshot::decode(&snapshot_json(25.0, 40.0).to_string()).unwrap()
    }

    #[test]
    fn connections_are_summed() {
        assert_eq!(total_connections(&snap()), 4);
        let mut s = snap();
        s.ip_traffic.clear();
        assert_eq!(total_connections(&s), 0);
    }

    #[test]
    fn top_processes_trusts_producer_order() {
        let mut s = snap();
        // deliberately unsorted: the projection must not reorder
        s.processes.reverse();
        let top = top_processes(&s, 10);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "nginx");
        assert_eq!(top_processes(&s, 1).len(), 1);
        assert!(top_processes(&s, 0).is_empty());
    }

    #[test]
    fn interfaces_are_name_ordered() {
        let s = snap();
        let names: Vec<&str> = interfaces(&s).iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["eth0", "lo"]);
        assert_eq!(interfaces(&s)[0].stats.bytes_recv, 4990);
    }

    #[test]
    fn percentages_are_clamped() {
        assert_eq!(clamp_percent(-3.0), 0.0);
        assert_eq!(clamp_percent(130.0), 100.0);
        assert_eq!(clamp_percent(f32::NAN), 0.0);
        let mut s = snap();
        s.cpu.per_core = vec![150.0, 12.5];
        let cores = per_core(&s);
        assert_eq!(cores[0], CoreUsage { core: 0, percent: 100.0 });
        assert_eq!(cores[1].percent, 12.5);
    }

    #[test]
    fn url_list_is_capped_for_display() {
        let s = snap();
        assert_eq!(display_urls(&s.ip_traffic[0]).len(), IP_URL_DISPLAY_LIMIT);
        assert!(display_urls(&s.ip_traffic[1]).is_empty());
    }

    #[test]
    fn labels() {
        let s = snap();
        assert_eq!(memory_label(&s), "1.00 GB / 4.00 GB");
        assert_eq!(swap_label(&s), "0 B / 0 B");
        assert_eq!(clock_label(&s), "12:00:00");
    }

    #[test]
    fn summary_mentions_key_figures() {
        let line = summary(&snap());
        assert!(line.contains("cpu 25.0%"), "{line}");
        assert!(line.contains("down 2.00 KB/s"), "{line}");
        assert!(line.contains("up 512.00 B/s"), "{line}");
        assert!(line.contains("conns 4"), "{line}");
        assert!(line.contains("postgres (12.5%)"), "{line}");
    }
}
