//! 状态快照与运行统计
//!
//! 快照是只读的拷贝，供展示层（文本表格或 JSON）使用。

use serde::Serialize;

use crate::memory::{Frame, FrameTable};
use crate::process::Process;
use crate::tlb::{Tlb, TlbEntry, TlbStats};

/// 引用串运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// 已处理的引用数
    pub references: usize,
    pub hits: usize,
    pub faults: usize,
    /// 发生置换的缺页数（不含装入空闲帧）
    pub evictions: usize,
}

impl RunStats {
    /// 命中率，未处理任何引用时为 0
    pub fn hit_ratio(&self) -> f64 {
        if self.references == 0 {
            0.0
        } else {
            self.hits as f64 / self.references as f64
        }
    }

    pub fn fault_ratio(&self) -> f64 {
        if self.references == 0 {
            0.0
        } else {
            self.faults as f64 / self.references as f64
        }
    }
}

/// 模拟状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// 帧表未配置时为空
    pub frames: Vec<Frame>,
    pub utilization: f64,
    pub processes: Vec<Process>,
    pub tlb: Vec<Option<TlbEntry>>,
    pub tlb_stats: TlbStats,
    pub stats: Option<RunStats>,
}

impl Snapshot {
    pub fn capture(
        memory: Option<&FrameTable>,
        processes: &[Process],
        tlb: &Tlb,
        stats: Option<&RunStats>,
    ) -> Self {
        Self {
            frames: memory.map(|m| m.frames().to_vec()).unwrap_or_default(),
            utilization: memory.map_or(0.0, FrameTable::utilization),
            processes: processes.to_vec(),
            tlb: tlb.slots().to_vec(),
            tlb_stats: tlb.stats().clone(),
            stats: stats.copied(),
        }
    }

    /// 序列化为 JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratios() {
        let stats = RunStats {
            references: 4,
            hits: 1,
            faults: 3,
            evictions: 0,
        };
        assert_eq!(stats.hit_ratio(), 0.25);
        assert_eq!(stats.fault_ratio(), 0.75);
        assert_eq!(RunStats::default().hit_ratio(), 0.0);
        assert_eq!(RunStats::default().fault_ratio(), 0.0);
    }

    #[test]
    fn test_capture_and_json() {
        let mut memory = FrameTable::new(3).unwrap();
        memory.load_page(1, 1, 4, 1, true);
        let tlb = Tlb::new(2);

        let snapshot = Snapshot::capture(Some(&memory), &[], &tlb, None);
        assert_eq!(snapshot.frames.len(), 3);
        assert!((snapshot.utilization - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(snapshot.tlb, vec![None, None]);

        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(json["frames"][0]["state"], "free");
        assert_eq!(json["frames"][1]["state"], "occupied");
        assert_eq!(json["frames"][1]["page"], 4);
        assert!(json["stats"].is_null());
    }
}
