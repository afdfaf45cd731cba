//! 物理内存帧表
//!
//! 帧状态的所有修改都集中在 [`FrameTable`] 上，其它模块只能读取。

use serde::Serialize;

use crate::error::{MemvizError, Result};
use crate::{FrameIndex, PageNumber, Pid, Timestamp};

/// 驻留在帧中的页
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResidentPage {
    /// 所属进程
    pub pid: Pid,
    /// 页号
    pub page: PageNumber,
    /// 引用位（时钟算法使用）
    pub reference: bool,
    /// 修改位（仅用于展示）
    pub modified: bool,
    /// 最近一次装入或命中的时间戳
    pub loaded_at: Timestamp,
}

/// 帧状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FrameState {
    Free,
    Occupied(ResidentPage),
}

/// 物理帧
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    index: FrameIndex,
    #[serde(flatten)]
    state: FrameState,
    /// 保留字段，当前没有算法使用
    age: u32,
}

impl Frame {
    fn free(index: FrameIndex) -> Self {
        Self {
            index,
            state: FrameState::Free,
            age: 0,
        }
    }

    pub fn index(&self) -> FrameIndex {
        self.index
    }

    pub fn state(&self) -> &FrameState {
        &self.state
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn is_free(&self) -> bool {
        matches!(self.state, FrameState::Free)
    }

    pub fn resident(&self) -> Option<&ResidentPage> {
        match &self.state {
            FrameState::Occupied(page) => Some(page),
            FrameState::Free => None,
        }
    }

    fn resident_mut(&mut self) -> Option<&mut ResidentPage> {
        match &mut self.state {
            FrameState::Occupied(page) => Some(page),
            FrameState::Free => None,
        }
    }
}

/// 帧表
///
/// 容量在创建时确定，之后不再变化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTable {
    frames: Vec<Frame>,
}

impl FrameTable {
    /// 分配 `capacity` 个空闲帧
    ///
    /// # 错误
    ///
    /// 分配失败时返回 [`MemvizError::AllocationFailed`]
    pub fn new(capacity: usize) -> Result<Self> {
        let mut frames = Vec::new();
        frames
            .try_reserve_exact(capacity)
            .map_err(|_| MemvizError::AllocationFailed { frames: capacity })?;
        frames.extend((0..capacity).map(Frame::free));
        Ok(Self { frames })
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn get(&self, index: FrameIndex) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn resident(&self, index: FrameIndex) -> Option<&ResidentPage> {
        self.frames.get(index).and_then(Frame::resident)
    }

    /// 编号最小的空闲帧
    pub fn find_free_frame(&self) -> Option<FrameIndex> {
        self.frames.iter().position(Frame::is_free)
    }

    /// 查找 `(pid, page)` 所在的帧
    pub fn find_resident(&self, pid: Pid, page: PageNumber) -> Option<FrameIndex> {
        self.frames.iter().position(|frame| {
            frame
                .resident()
                .is_some_and(|r| r.pid == pid && r.page == page)
        })
    }

    pub fn occupied_count(&self) -> usize {
        self.frames.iter().filter(|frame| !frame.is_free()).count()
    }

    /// 已占用帧的比例，范围 `[0, 1]`
    pub fn utilization(&self) -> f64 {
        if self.frames.is_empty() {
            0.0
        } else {
            self.occupied_count() as f64 / self.frames.len() as f64
        }
    }

    /// 把页装入帧：置引用位，记录时间戳和修改位
    ///
    /// 调用者需要先用 [`FrameTable::evict`] 腾出被占用的帧。越界的帧号被忽略。
    pub(crate) fn load_page(
        &mut self,
        index: FrameIndex,
        pid: Pid,
        page: PageNumber,
        timestamp: Timestamp,
        modified: bool,
    ) {
        let Some(frame) = self.frames.get_mut(index) else {
            return;
        };
        debug_assert!(frame.is_free(), "frame {index} loaded while occupied");
        frame.state = FrameState::Occupied(ResidentPage {
            pid,
            page,
            reference: true,
            modified,
            loaded_at: timestamp,
        });
    }

    /// 释放帧，返回原来驻留的 `(pid, page)`
    pub fn evict(&mut self, index: FrameIndex) -> Option<(Pid, PageNumber)> {
        let frame = self.frames.get_mut(index)?;
        match std::mem::replace(&mut frame.state, FrameState::Free) {
            FrameState::Occupied(page) => Some((page.pid, page.page)),
            FrameState::Free => None,
        }
    }

    /// 命中：置引用位并刷新时间戳
    pub fn touch(&mut self, index: FrameIndex, timestamp: Timestamp) {
        if let Some(page) = self.frames.get_mut(index).and_then(Frame::resident_mut) {
            page.reference = true;
            page.loaded_at = timestamp;
        }
    }

    /// 清除引用位（第二次机会）
    pub fn clear_reference(&mut self, index: FrameIndex) {
        if let Some(page) = self.frames.get_mut(index).and_then(Frame::resident_mut) {
            page.reference = false;
        }
    }

    /// 释放所有帧
    pub fn reset(&mut self) {
        for frame in &mut self.frames {
            frame.state = FrameState::Free;
            frame.age = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_is_free() {
        let table = FrameTable::new(4).unwrap();
        assert_eq!(table.capacity(), 4);
        assert_eq!(table.occupied_count(), 0);
        assert_eq!(table.find_free_frame(), Some(0));
        assert_eq!(table.utilization(), 0.0);
    }

    #[test]
    fn test_allocation_failure() {
        let err = FrameTable::new(usize::MAX).unwrap_err();
        assert_eq!(err, MemvizError::AllocationFailed { frames: usize::MAX });
    }

    #[test]
    fn test_load_and_evict() {
        let mut table = FrameTable::new(3).unwrap();
        table.load_page(0, 1, 7, 1, true);
        table.load_page(1, 1, 3, 2, false);

        assert_eq!(table.find_free_frame(), Some(2));
        assert_eq!(table.find_resident(1, 3), Some(1));
        assert_eq!(table.find_resident(2, 3), None);

        let resident = table.resident(0).unwrap();
        assert!(resident.reference);
        assert!(resident.modified);
        assert_eq!(resident.loaded_at, 1);

        assert_eq!(table.evict(0), Some((1, 7)));
        assert_eq!(table.evict(0), None);
        assert_eq!(table.find_free_frame(), Some(0));
        assert_eq!(table.occupied_count(), 1);
    }

    #[test]
    fn test_touch_and_clear_reference() {
        let mut table = FrameTable::new(3).unwrap();
        table.load_page(2, 1, 0, 1, false);
        table.clear_reference(2);
        assert!(!table.resident(2).unwrap().reference);

        table.touch(2, 9);
        let resident = table.resident(2).unwrap();
        assert!(resident.reference);
        assert_eq!(resident.loaded_at, 9);

        // 空闲帧上的操作被忽略
        table.touch(0, 10);
        assert!(table.get(0).unwrap().is_free());
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let mut table = FrameTable::new(3).unwrap();
        table.load_page(3, 1, 0, 1, false);
        table.touch(7, 2);
        table.clear_reference(7);
        assert_eq!(table.evict(3), None);
        assert_eq!(table.occupied_count(), 0);
    }

    #[test]
    fn test_reset() {
        let mut table = FrameTable::new(3).unwrap();
        table.load_page(0, 1, 0, 1, false);
        table.load_page(1, 1, 1, 2, false);
        table.reset();
        assert_eq!(table.occupied_count(), 0);
        assert!((table.utilization() - 0.0).abs() < f64::EPSILON);
    }
}
