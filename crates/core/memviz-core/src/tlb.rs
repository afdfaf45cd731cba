//! 软件 TLB (Translation Lookaside Buffer)
//!
//! 固定容量的全相联页号→帧号缓存，使用独立于页表的 LRU 淘汰。
//! TLB 不会在页被换出时自动失效：条目可能过期，需要准确结果的调用者
//! 应当用页表重新校验（见 `translation::AddressTranslator::translate_cached`）。

use serde::Serialize;

use crate::config::TlbConfig;
use crate::{FrameIndex, PageNumber, Timestamp};

/// TLB 条目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TlbEntry {
    pub page: PageNumber,
    pub frame: FrameIndex,
    /// 最后访问时间戳
    pub last_used: Timestamp,
}

/// TLB 统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TlbStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
}

impl TlbStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TLB 缓存
#[derive(Debug, Clone)]
pub struct Tlb {
    slots: Vec<Option<TlbEntry>>,
    stats: TlbStats,
}

impl Tlb {
    pub fn new(capacity: usize) -> Self {
        log::debug!("Creating TLB with capacity: {} entries", capacity);
        Self {
            slots: vec![None; capacity],
            stats: TlbStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 所有槽位，空槽为 `None`
    pub fn slots(&self) -> &[Option<TlbEntry>] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> &TlbStats {
        &self.stats
    }

    /// 查找但不更新时间戳和统计
    pub fn probe(&self, page: PageNumber) -> Option<&TlbEntry> {
        self.slots.iter().flatten().find(|entry| entry.page == page)
    }

    /// 查找页号，命中时刷新时间戳并返回帧号
    pub fn lookup(&mut self, page: PageNumber, now: Timestamp) -> Option<FrameIndex> {
        let hit = self.slots.iter_mut().flatten().find(|entry| entry.page == page);
        match hit {
            Some(entry) => {
                entry.last_used = now;
                self.stats.hits += 1;
                Some(entry.frame)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// 插入映射，返回被淘汰的条目
    ///
    /// 已缓存的页原地更新；否则优先使用第一个空槽，没有空槽时淘汰
    /// 时间戳最小的条目（相同时取槽位编号最小的）。
    pub fn insert(&mut self, page: PageNumber, frame: FrameIndex, now: Timestamp) -> Option<TlbEntry> {
        if self.slots.is_empty() {
            return None;
        }
        self.stats.inserts += 1;
        let entry = TlbEntry {
            page,
            frame,
            last_used: now,
        };

        if let Some(existing) = self.slots.iter_mut().flatten().find(|e| e.page == page) {
            *existing = entry;
            return None;
        }

        if let Some(empty) = self.slots.iter_mut().find(|slot| slot.is_none()) {
            *empty = Some(entry);
            return None;
        }

        let victim = self.lru_slot();
        let evicted = self.slots[victim].replace(entry);
        self.stats.evictions += 1;
        log::trace!("TLB evicted {:?} from slot {}", evicted, victim);
        evicted
    }

    fn lru_slot(&self) -> usize {
        let mut victim = 0;
        let mut oldest = Timestamp::MAX;
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(entry) = slot
                && entry.last_used < oldest
            {
                oldest = entry.last_used;
                victim = i;
            }
        }
        victim
    }

    /// 使某页的条目失效
    pub fn invalidate(&mut self, page: PageNumber) -> bool {
        for slot in &mut self.slots {
            if slot.is_some_and(|entry| entry.page == page) {
                *slot = None;
                return true;
            }
        }
        false
    }

    /// 清空所有条目
    pub fn flush(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// 清空条目和统计
    pub fn reset(&mut self) {
        self.flush();
        self.stats = TlbStats::default();
    }
}

// ============================================================================
// TLB 访问时间模拟
// ============================================================================

/// 演示用的页→帧映射
pub fn demo_frame_for(page: PageNumber) -> FrameIndex {
    page * 2 + 1
}

/// 单次访问的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlbTraceEvent {
    pub step: Timestamp,
    pub page: PageNumber,
    pub frame: FrameIndex,
    pub hit: bool,
    pub evicted: Option<TlbEntry>,
    /// 本次访问耗时
    pub cost: u64,
}

/// 访问时间模拟报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TlbTraceReport {
    pub references: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// 总访问时间
    pub total_time: u64,
    /// 不使用 TLB、每次都访问页表时的总时间
    pub without_tlb_time: u64,
    /// `without_tlb_time / total_time`，总时间为 0 时为 0
    pub speedup: f64,
    pub hit_ratio: f64,
    /// 平均（有效）访问时间
    pub average_access_time: f64,
    pub events: Vec<TlbTraceEvent>,
}

/// 用引用串驱动 TLB，统计访问时间
///
/// 命中耗时 `hit_latency`；未命中耗时 `hit_latency + miss_latency`，
/// 帧号由 `resolve` 给出后插入 TLB。运行前会清空 TLB。
pub fn run_tlb_trace<F>(
    tlb: &mut Tlb,
    config: &TlbConfig,
    references: &[PageNumber],
    mut resolve: F,
) -> TlbTraceReport
where
    F: FnMut(PageNumber) -> FrameIndex,
{
    tlb.reset();
    let mut total_time = 0;
    let mut events = Vec::with_capacity(references.len());

    for (i, &page) in references.iter().enumerate() {
        let step = i as Timestamp + 1;
        let event = match tlb.lookup(page, step) {
            Some(frame) => TlbTraceEvent {
                step,
                page,
                frame,
                hit: true,
                evicted: None,
                cost: config.hit_latency,
            },
            None => {
                let frame = resolve(page);
                let evicted = tlb.insert(page, frame, step);
                TlbTraceEvent {
                    step,
                    page,
                    frame,
                    hit: false,
                    evicted,
                    cost: config.hit_latency + config.miss_latency,
                }
            }
        };
        log::debug!(
            "TLB step {}: page {} {}",
            step,
            page,
            if event.hit { "hit" } else { "miss" }
        );
        total_time += event.cost;
        events.push(event);
    }

    let stats = tlb.stats();
    let references_len = references.len();
    let without_tlb_time = references_len as u64 * config.miss_latency;
    let speedup = if total_time == 0 {
        0.0
    } else {
        without_tlb_time as f64 / total_time as f64
    };
    let (hit_ratio, average_access_time) = if references_len == 0 {
        (0.0, 0.0)
    } else {
        (
            stats.hits as f64 / references_len as f64,
            total_time as f64 / references_len as f64,
        )
    };

    TlbTraceReport {
        references: references_len,
        hits: stats.hits,
        misses: stats.misses,
        evictions: stats.evictions,
        total_time,
        without_tlb_time,
        speedup,
        hit_ratio,
        average_access_time,
        events,
    }
}
