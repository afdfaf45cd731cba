use super::{Lookahead, PageReplacer, ReplacementAlgorithm};
use crate::FrameIndex;
use crate::memory::FrameTable;

/// 最近最少使用
///
/// 选时间戳最小的帧，时间戳相同时取编号最小的帧。
/// 帧的时间戳在装入和命中时都会刷新。
#[derive(Debug, Default)]
pub struct LruReplacer;

impl PageReplacer for LruReplacer {
    fn algorithm(&self) -> ReplacementAlgorithm {
        ReplacementAlgorithm::Lru
    }

    fn select_victim(&mut self, frames: &mut FrameTable, _lookahead: &Lookahead<'_>) -> FrameIndex {
        let mut victim = None;
        for frame in frames.frames() {
            let Some(page) = frame.resident() else {
                continue;
            };
            match victim {
                Some((_, oldest)) if page.loaded_at >= oldest => {}
                _ => victim = Some((frame.index(), page.loaded_at)),
            }
        }
        victim.map_or(0, |(index, _)| index)
    }
}
