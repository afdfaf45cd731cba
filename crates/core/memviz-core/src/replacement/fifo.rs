use super::{Lookahead, PageReplacer, ReplacementAlgorithm};
use crate::FrameIndex;
use crate::memory::FrameTable;

/// 先进先出
///
/// 循环游标指向下一个要淘汰的帧。命中不会改变淘汰顺序。
#[derive(Debug, Default)]
pub struct FifoReplacer {
    cursor: usize,
}

impl FifoReplacer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PageReplacer for FifoReplacer {
    fn algorithm(&self) -> ReplacementAlgorithm {
        ReplacementAlgorithm::Fifo
    }

    fn select_victim(&mut self, frames: &mut FrameTable, _lookahead: &Lookahead<'_>) -> FrameIndex {
        let capacity = frames.capacity();
        let mut selected = self.cursor % capacity;

        // 从游标开始找第一个已占用的帧
        for _ in 0..capacity {
            if frames.resident(selected).is_some() {
                self.cursor = (selected + 1) % capacity;
                return selected;
            }
            selected = (selected + 1) % capacity;
        }

        self.cursor = 1 % capacity;
        0
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}
