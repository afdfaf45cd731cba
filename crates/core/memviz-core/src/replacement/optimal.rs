use super::{Lookahead, PageReplacer, ReplacementAlgorithm};
use crate::FrameIndex;
use crate::memory::FrameTable;

/// 最优置换（Belady）
///
/// 淘汰下一次使用最远的页；不再使用的页视为 `len + 1`。距离相同时取编号最小的帧。
/// 只在 `lookahead.position` 之后的引用中查找。
#[derive(Debug, Default)]
pub struct OptimalReplacer;

impl PageReplacer for OptimalReplacer {
    fn algorithm(&self) -> ReplacementAlgorithm {
        ReplacementAlgorithm::Optimal
    }

    fn select_victim(&mut self, frames: &mut FrameTable, lookahead: &Lookahead<'_>) -> FrameIndex {
        let mut victim = None;
        for frame in frames.frames() {
            let Some(page) = frame.resident() else {
                continue;
            };
            let next_use = lookahead.next_use(page.page);
            match victim {
                Some((_, farthest)) if next_use <= farthest => {}
                _ => victim = Some((frame.index(), next_use)),
            }
        }
        victim.map_or(0, |(index, _)| index)
    }
}
