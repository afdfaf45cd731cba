//! 地址翻译
//!
//! 分页：`page = addr / PAGE_SIZE`，`offset = addr % PAGE_SIZE`，驻留页的物理地址为
//! `frame * FRAME_SIZE + offset`。
//!
//! 分段：只做越界检查，不做重定位，物理地址等于逻辑地址。
//!
//! 缺页、非法地址和越界都是正常的翻译结果，不是错误。

use serde::Serialize;

use crate::config::{FRAME_SIZE, PAGE_SIZE};
use crate::process::Process;
use crate::tlb::Tlb;
use crate::{FrameIndex, PageNumber, Timestamp};

/// 分页翻译结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Translation {
    Mapped {
        page: PageNumber,
        offset: u64,
        frame: FrameIndex,
        physical: u64,
    },
    /// 页不在内存中，需要先装入
    PageFault { page: PageNumber, offset: u64 },
    /// 页号超出进程页数
    InvalidAddress { page: PageNumber, page_count: usize },
}

impl Translation {
    pub fn physical(&self) -> Option<u64> {
        match self {
            Translation::Mapped { physical, .. } => Some(*physical),
            _ => None,
        }
    }
}

/// 分段翻译结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SegmentTranslation {
    Mapped {
        segment: usize,
        offset: u64,
        logical: u64,
        physical: u64,
    },
    /// 偏移超出段长（字节）
    BoundsFault {
        segment: usize,
        offset: u64,
        limit: u64,
    },
    InvalidSegment { segment: usize, segment_count: usize },
}

/// 经过 TLB 的翻译结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CachedTranslation {
    pub translation: Translation,
    pub tlb_hit: bool,
    /// TLB 中的映射与页表不一致，已被作废
    pub stale: bool,
}

/// 地址翻译器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressTranslator {
    page_size: u64,
    frame_size: u64,
}

impl Default for AddressTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressTranslator {
    pub fn new() -> Self {
        Self {
            page_size: PAGE_SIZE,
            frame_size: FRAME_SIZE,
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// 拆分逻辑地址为 (页号, 页内偏移)
    pub fn split(&self, logical: u64) -> (PageNumber, u64) {
        ((logical / self.page_size) as PageNumber, logical % self.page_size)
    }

    pub fn translate(&self, process: &Process, logical: u64) -> Translation {
        let (page, offset) = self.split(logical);
        self.translate_page(process, page, offset)
    }

    pub fn translate_page(&self, process: &Process, page: PageNumber, offset: u64) -> Translation {
        let Some(entry) = process.page(page) else {
            return Translation::InvalidAddress {
                page,
                page_count: process.page_count(),
            };
        };

        match entry.frame() {
            Some(frame) => Translation::Mapped {
                page,
                offset,
                frame,
                physical: frame as u64 * self.frame_size + offset,
            },
            None => Translation::PageFault { page, offset },
        }
    }

    /// 段式翻译，`offset` 以字节为单位
    pub fn translate_segment(&self, process: &Process, segment: usize, offset: u64) -> SegmentTranslation {
        let Some(entry) = process.segment(segment).filter(|entry| entry.valid) else {
            return SegmentTranslation::InvalidSegment {
                segment,
                segment_count: process.segment_table.len(),
            };
        };

        let limit = entry.limit_bytes();
        if offset >= limit {
            return SegmentTranslation::BoundsFault {
                segment,
                offset,
                limit,
            };
        }

        let logical = entry.base_address().saturating_add(offset);
        SegmentTranslation::Mapped {
            segment,
            offset,
            logical,
            physical: logical,
        }
    }

    /// 先查 TLB，再查页表
    ///
    /// TLB 命中时用页表校验缓存的帧号；不一致的条目被作废并按未命中处理。
    /// 未命中且页已驻留时，把映射插入 TLB。
    pub fn translate_cached(
        &self,
        tlb: &mut Tlb,
        process: &Process,
        logical: u64,
        now: Timestamp,
    ) -> CachedTranslation {
        let (page, offset) = self.split(logical);
        let mut stale = false;

        if let Some(cached) = tlb.lookup(page, now) {
            let current = process.page(page).and_then(|entry| entry.frame());
            if current == Some(cached) {
                return CachedTranslation {
                    translation: Translation::Mapped {
                        page,
                        offset,
                        frame: cached,
                        physical: cached as u64 * self.frame_size + offset,
                    },
                    tlb_hit: true,
                    stale: false,
                };
            }
            log::debug!("stale TLB entry for page {page}: frame {cached}, page table {current:?}");
            tlb.invalidate(page);
            stale = true;
        }

        let translation = self.translate_page(process, page, offset);
        if let Translation::Mapped { frame, .. } = translation {
            tlb.insert(page, frame, now);
        }
        CachedTranslation {
            translation,
            tlb_hit: false,
            stale,
        }
    }
}
