use super::{Lookahead, PageReplacer, ReplacementAlgorithm};
use crate::FrameIndex;
use crate::memory::FrameTable;

/// 时钟算法（第二次机会）
///
/// 指针循环扫描：引用位为 0 的帧被淘汰，为 1 的帧清零后跳过。
/// 最多扫描两圈，仍未找到时直接淘汰指针所指的帧。
#[derive(Debug, Default)]
pub struct ClockReplacer {
    hand: usize,
}

impl ClockReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hand(&self) -> usize {
        self.hand
    }
}

impl PageReplacer for ClockReplacer {
    fn algorithm(&self) -> ReplacementAlgorithm {
        ReplacementAlgorithm::Clock
    }

    fn select_victim(&mut self, frames: &mut FrameTable, _lookahead: &Lookahead<'_>) -> FrameIndex {
        let capacity = frames.capacity();
        self.hand %= capacity;

        for _ in 0..capacity * 2 {
            let current = self.hand;
            if let Some(page) = frames.resident(current) {
                if !page.reference {
                    self.hand = (current + 1) % capacity;
                    return current;
                }
                frames.clear_reference(current);
            }
            self.hand = (current + 1) % capacity;
        }

        self.hand
    }

    fn reset(&mut self) {
        self.hand = 0;
    }
}
