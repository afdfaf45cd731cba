//! 页面置换
//!
//! 四种策略实现同一个 [`PageReplacer`] 接口，每次运行开始时由
//! [`ReplacementAlgorithm`] 构造一次，运行期间不再切换。
//!
//! 策略只在没有空闲帧时被调用；[`ReplacementEngine`] 负责检查这一点。

mod clock;
mod fifo;
mod lru;
mod optimal;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MemvizError, Result};
use crate::memory::FrameTable;
use crate::{FrameIndex, PageNumber};

pub use clock::ClockReplacer;
pub use fifo::FifoReplacer;
pub use lru::LruReplacer;
pub use optimal::OptimalReplacer;

/// 置换算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacementAlgorithm {
    /// 先进先出
    Fifo,
    /// 最近最少使用
    Lru,
    /// 最优（需要完整的引用串）
    Optimal,
    /// 时钟（第二次机会）
    Clock,
}

impl ReplacementAlgorithm {
    pub const ALL: [ReplacementAlgorithm; 4] = [Self::Fifo, Self::Lru, Self::Optimal, Self::Clock];

    pub fn name(self) -> &'static str {
        match self {
            Self::Fifo => "FIFO",
            Self::Lru => "LRU",
            Self::Optimal => "Optimal",
            Self::Clock => "Clock",
        }
    }

    /// 构造对应的置换器
    pub fn build(self) -> Box<dyn PageReplacer> {
        match self {
            Self::Fifo => Box::new(FifoReplacer::new()),
            Self::Lru => Box::new(LruReplacer),
            Self::Optimal => Box::new(OptimalReplacer),
            Self::Clock => Box::new(ClockReplacer::new()),
        }
    }
}

impl fmt::Display for ReplacementAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReplacementAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" | "1" => Ok(Self::Fifo),
            "lru" | "2" => Ok(Self::Lru),
            "optimal" | "opt" | "3" => Ok(Self::Optimal),
            "clock" | "second-chance" | "4" => Ok(Self::Clock),
            other => Err(format!(
                "unknown replacement algorithm '{other}' (expected fifo, lru, optimal or clock)"
            )),
        }
    }
}

/// 选择牺牲帧时可见的引用串
///
/// `position` 是当前正在处理的引用下标，最优算法只向后看 `position` 之后的部分。
#[derive(Debug, Clone, Copy)]
pub struct Lookahead<'a> {
    pub references: &'a [PageNumber],
    pub position: usize,
}

impl<'a> Lookahead<'a> {
    pub fn new(references: &'a [PageNumber], position: usize) -> Self {
        Self {
            references,
            position,
        }
    }

    /// 不提供未来信息
    pub fn none() -> Self {
        Self {
            references: &[],
            position: 0,
        }
    }

    /// `page` 在当前位置之后的下一次出现位置；不再出现时为 `len + 1`
    pub fn next_use(&self, page: PageNumber) -> usize {
        let start = self.position.saturating_add(1);
        self.references
            .iter()
            .enumerate()
            .skip(start)
            .find(|&(_, &p)| p == page)
            .map_or(self.references.len() + 1, |(i, _)| i)
    }
}

/// 页面置换策略
pub trait PageReplacer: fmt::Debug {
    fn algorithm(&self) -> ReplacementAlgorithm;

    /// 在已占用的帧中选出牺牲帧
    ///
    /// 调用时所有帧都已占用。时钟算法会通过 [`FrameTable::clear_reference`]
    /// 修改引用位。
    fn select_victim(&mut self, frames: &mut FrameTable, lookahead: &Lookahead<'_>) -> FrameIndex;

    /// 清除游标/指针等内部状态
    fn reset(&mut self) {}
}

/// 置换引擎：检查调用前提后转发给具体策略
#[derive(Debug)]
pub struct ReplacementEngine {
    replacer: Box<dyn PageReplacer>,
}

impl ReplacementEngine {
    pub fn new(algorithm: ReplacementAlgorithm) -> Self {
        Self {
            replacer: algorithm.build(),
        }
    }

    pub fn algorithm(&self) -> ReplacementAlgorithm {
        self.replacer.algorithm()
    }

    /// 选择牺牲帧
    ///
    /// # 错误
    ///
    /// - 仍有空闲帧：[`MemvizError::FreeFrameAvailable`]
    /// - 帧表为空：[`MemvizError::EmptyFrameTable`]
    pub fn select_victim(
        &mut self,
        frames: &mut FrameTable,
        lookahead: &Lookahead<'_>,
    ) -> Result<FrameIndex> {
        if frames.capacity() == 0 {
            return Err(MemvizError::EmptyFrameTable);
        }
        if let Some(free) = frames.find_free_frame() {
            return Err(MemvizError::FreeFrameAvailable(free));
        }
        let victim = self.replacer.select_victim(frames, lookahead);
        log::trace!("{} selected frame {}", self.replacer.algorithm(), victim);
        Ok(victim)
    }

    pub fn reset(&mut self) {
        self.replacer.reset();
    }
}
