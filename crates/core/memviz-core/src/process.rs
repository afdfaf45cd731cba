//! 进程、页表和段表

use rand::Rng;
use serde::Serialize;

use crate::config::{ProcessSpec, SEGMENT_UNIT};
use crate::{FrameIndex, PageNumber, Pid, Timestamp};

/// 页的驻留状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "residency", content = "frame", rename_all = "snake_case")]
pub enum Residency {
    NotResident,
    Resident(FrameIndex),
}

/// 页表项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageTableEntry {
    pub page: PageNumber,
    pub residency: Residency,
    pub last_used: Option<Timestamp>,
    pub reference: bool,
    pub modified: bool,
}

impl PageTableEntry {
    fn new(page: PageNumber, modified: bool) -> Self {
        Self {
            page,
            residency: Residency::NotResident,
            last_used: None,
            reference: false,
            modified,
        }
    }

    pub fn is_resident(&self) -> bool {
        matches!(self.residency, Residency::Resident(_))
    }

    pub fn frame(&self) -> Option<FrameIndex> {
        match self.residency {
            Residency::Resident(frame) => Some(frame),
            Residency::NotResident => None,
        }
    }

    /// 标记为驻留在 `frame`
    pub fn map(&mut self, frame: FrameIndex, timestamp: Timestamp) {
        self.residency = Residency::Resident(frame);
        self.last_used = Some(timestamp);
        self.reference = true;
    }

    /// 命中时刷新最近使用信息
    pub fn touch(&mut self, timestamp: Timestamp) {
        self.last_used = Some(timestamp);
        self.reference = true;
    }

    /// 被换出
    pub fn invalidate(&mut self) {
        self.residency = Residency::NotResident;
    }

    fn reset(&mut self) {
        self.residency = Residency::NotResident;
        self.last_used = None;
        self.reference = false;
    }
}

/// 段表项，基址和段长以 KB 为单位
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentTableEntry {
    pub segment: usize,
    pub base: u64,
    pub limit: u64,
    pub valid: bool,
}

impl SegmentTableEntry {
    /// 段起始字节地址
    pub fn base_address(&self) -> u64 {
        self.base.saturating_mul(SEGMENT_UNIT)
    }

    /// 段长（字节）
    pub fn limit_bytes(&self) -> u64 {
        self.limit.saturating_mul(SEGMENT_UNIT)
    }
}

/// 进程
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Process {
    pub pid: Pid,
    pub name: String,
    pub page_table: Vec<PageTableEntry>,
    pub segment_table: Vec<SegmentTableEntry>,
}

impl Process {
    /// 由已钳制的 [`ProcessSpec`] 创建进程，修改位随机生成
    pub fn from_spec<R: Rng + ?Sized>(pid: Pid, spec: &ProcessSpec, rng: &mut R) -> Self {
        let page_table = (0..spec.pages)
            .map(|page| PageTableEntry::new(page, rng.gen_bool(0.5)))
            .collect();

        let mut next_base = 0;
        let segment_table = spec
            .segments
            .iter()
            .enumerate()
            .map(|(segment, seg)| {
                let base = seg.base.unwrap_or(next_base);
                next_base = base.saturating_add(seg.limit);
                SegmentTableEntry {
                    segment,
                    base,
                    limit: seg.limit,
                    valid: true,
                }
            })
            .collect();

        Self {
            pid,
            name: spec.name.clone(),
            page_table,
            segment_table,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_table.len()
    }

    pub fn page(&self, page: PageNumber) -> Option<&PageTableEntry> {
        self.page_table.get(page)
    }

    pub fn page_mut(&mut self, page: PageNumber) -> Option<&mut PageTableEntry> {
        self.page_table.get_mut(page)
    }

    pub fn segment(&self, segment: usize) -> Option<&SegmentTableEntry> {
        self.segment_table.get(segment)
    }

    pub fn resident_pages(&self) -> usize {
        self.page_table.iter().filter(|e| e.is_resident()).count()
    }

    /// 所有页表项置为不驻留
    pub fn reset_pages(&mut self) {
        self.page_table.iter_mut().for_each(PageTableEntry::reset);
    }
}
