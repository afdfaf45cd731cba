//! 引用串模拟
//!
//! [`ReferenceSimulator`] 在整个运行期间独占 [`SimulationContext`]，逐个处理
//! 引用：命中时刷新帧的时间戳和引用位；缺页时优先使用空闲帧，否则由置换
//! 策略选出牺牲帧，使原页表项失效后再装入新页。
//!
//! 引用串属于 1 号进程。

use serde::Serialize;

use crate::config::Adjustment;
use crate::context::SimulationContext;
use crate::error::Result;
use crate::reference;
use crate::replacement::{Lookahead, ReplacementAlgorithm, ReplacementEngine};
use crate::snapshot::{RunStats, Snapshot};
use crate::{FrameIndex, PageNumber, Pid, SIMULATED_PID, Timestamp};

/// 被换出的页
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvictedPage {
    pub pid: Pid,
    pub page: PageNumber,
}

/// 单步结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Hit {
        frame: FrameIndex,
    },
    Fault {
        frame: FrameIndex,
        /// 装入空闲帧时为 `None`
        evicted: Option<EvictedPage>,
    },
}

/// 单步事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepEvent {
    /// 逻辑时钟，从 1 开始
    pub step: Timestamp,
    /// 引用串下标
    pub position: usize,
    pub page: PageNumber,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

impl StepEvent {
    pub fn is_hit(&self) -> bool {
        matches!(self.outcome, StepOutcome::Hit { .. })
    }

    pub fn frame(&self) -> FrameIndex {
        match self.outcome {
            StepOutcome::Hit { frame } | StepOutcome::Fault { frame, .. } => frame,
        }
    }
}

/// 一次完整运行的报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub algorithm: ReplacementAlgorithm,
    pub references: Vec<PageNumber>,
    pub stats: RunStats,
    pub hit_ratio: f64,
    pub fault_ratio: f64,
    pub events: Vec<StepEvent>,
    /// 运行结束时每个帧中的页号
    pub final_frames: Vec<Option<PageNumber>>,
    /// 引用串中被钳制的页号
    pub adjustments: Vec<Adjustment>,
}

/// 引用串模拟器
#[derive(Debug)]
pub struct ReferenceSimulator<'a> {
    ctx: &'a mut SimulationContext,
    engine: ReplacementEngine,
    references: Vec<PageNumber>,
    adjustments: Vec<Adjustment>,
    position: usize,
    clock: Timestamp,
    stats: RunStats,
    events: Vec<StepEvent>,
}

impl<'a> ReferenceSimulator<'a> {
    /// 开始一次运行
    ///
    /// 释放所有帧、清空页表驻留状态并重置策略状态。引用串中超出进程页
    /// 范围的页号被钳制。
    ///
    /// # 错误
    ///
    /// 帧表未配置时返回 [`MemoryNotConfigured`](crate::MemvizError::MemoryNotConfigured)，
    /// 进程不存在时返回 [`UnknownProcess`](crate::MemvizError::UnknownProcess)。
    pub fn start(
        ctx: &'a mut SimulationContext,
        algorithm: ReplacementAlgorithm,
        references: Vec<PageNumber>,
    ) -> Result<Self> {
        let page_count = ctx.process(SIMULATED_PID)?.page_count();
        ctx.reset_for_run()?;

        let (references, adjustments) = reference::sanitize(&references, page_count);
        let mut engine = ReplacementEngine::new(algorithm);
        engine.reset();

        log::info!(
            "Starting {} run: {} references, {} frames",
            algorithm,
            references.len(),
            ctx.memory()?.capacity()
        );

        Ok(Self {
            ctx,
            engine,
            events: Vec::with_capacity(references.len()),
            references,
            adjustments,
            position: 0,
            clock: 0,
            stats: RunStats::default(),
        })
    }

    pub fn algorithm(&self) -> ReplacementAlgorithm {
        self.engine.algorithm()
    }

    pub fn references(&self) -> &[PageNumber] {
        &self.references
    }

    /// 下一个待处理的引用下标
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.references.len()
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn events(&self) -> &[StepEvent] {
        &self.events
    }

    pub fn context(&self) -> &SimulationContext {
        &*self.ctx
    }

    /// 处理下一个引用，引用串耗尽时返回 `None`
    pub fn step(&mut self) -> Result<Option<StepEvent>> {
        let Some(&page) = self.references.get(self.position) else {
            return Ok(None);
        };
        self.clock += 1;
        let now = self.clock;

        let memory = self.ctx.memory_mut()?;
        let outcome = match memory.find_resident(SIMULATED_PID, page) {
            Some(frame) => {
                memory.touch(frame, now);
                if let Some(entry) = self.ctx.process_mut(SIMULATED_PID)?.page_mut(page) {
                    entry.touch(now);
                }
                self.stats.hits += 1;
                StepOutcome::Hit { frame }
            }
            None => {
                let (frame, evicted) = match memory.find_free_frame() {
                    Some(frame) => (frame, None),
                    None => {
                        let lookahead = Lookahead::new(&self.references, self.position);
                        let victim = self.engine.select_victim(memory, &lookahead)?;
                        let evicted = self
                            .ctx
                            .evict_frame(victim)?
                            .map(|(pid, page)| EvictedPage { pid, page });
                        self.stats.evictions += 1;
                        (victim, evicted)
                    }
                };
                self.ctx.load_page(frame, SIMULATED_PID, page, now)?;
                self.stats.faults += 1;
                StepOutcome::Fault { frame, evicted }
            }
        };

        let event = StepEvent {
            step: now,
            position: self.position,
            page,
            outcome,
        };
        log::debug!("step {}: page {} -> {:?}", now, page, outcome);

        self.position += 1;
        self.stats.references += 1;
        self.events.push(event);
        Ok(Some(event))
    }

    /// 当前状态快照
    pub fn snapshot(&self) -> Snapshot {
        self.ctx.snapshot(Some(&self.stats))
    }

    /// 处理剩余的全部引用
    pub fn run_to_end(mut self) -> Result<RunReport> {
        while self.step()?.is_some() {}

        let final_frames = self
            .ctx
            .memory()?
            .frames()
            .iter()
            .map(|frame| frame.resident().map(|r| r.page))
            .collect();

        log::info!(
            "{} run finished: {} hits, {} faults, hit ratio {:.2}",
            self.algorithm(),
            self.stats.hits,
            self.stats.faults,
            self.stats.hit_ratio()
        );

        Ok(RunReport {
            algorithm: self.algorithm(),
            hit_ratio: self.stats.hit_ratio(),
            fault_ratio: self.stats.fault_ratio(),
            stats: self.stats,
            events: self.events,
            final_frames,
            references: self.references,
            adjustments: self.adjustments,
        })
    }
}

/// 对同一引用串依次运行所有置换算法
pub fn compare_algorithms(
    ctx: &mut SimulationContext,
    references: &[PageNumber],
) -> Result<Vec<RunReport>> {
    ReplacementAlgorithm::ALL
        .into_iter()
        .map(|algorithm| ReferenceSimulator::start(&mut *ctx, algorithm, references.to_vec())?.run_to_end())
        .collect()
}

/// 运行单个算法直到结束
pub fn run(
    ctx: &mut SimulationContext,
    algorithm: ReplacementAlgorithm,
    references: &[PageNumber],
) -> Result<RunReport> {
    ReferenceSimulator::start(ctx, algorithm, references.to_vec())?.run_to_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::error::MemvizError;

    fn context(frames: usize) -> SimulationContext {
        SimulationContext::new(SimulationConfig {
            frames,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_step_hit_and_fault() {
        let mut ctx = context(3);
        let mut sim = ReferenceSimulator::start(&mut ctx, ReplacementAlgorithm::Fifo, vec![2, 2, 5]).unwrap();

        let first = sim.step().unwrap().unwrap();
        assert_eq!(
            first.outcome,
            StepOutcome::Fault {
                frame: 0,
                evicted: None
            }
        );
        let second = sim.step().unwrap().unwrap();
        assert_eq!(second.outcome, StepOutcome::Hit { frame: 0 });
        assert_eq!(sim.step().unwrap().unwrap().frame(), 1);
        assert!(sim.is_finished());
        assert_eq!(sim.step().unwrap(), None);

        assert_eq!(
            *sim.stats(),
            RunStats {
                references: 3,
                hits: 1,
                faults: 2,
                evictions: 0
            }
        );
        let process = sim.context().process(SIMULATED_PID).unwrap();
        assert_eq!(process.page(2).unwrap().frame(), Some(0));
        assert_eq!(process.page(2).unwrap().last_used, Some(2));
    }

    #[test]
    fn test_eviction_invalidates_page_table() {
        let mut ctx = context(3);
        let report = run(&mut ctx, ReplacementAlgorithm::Fifo, &[0, 1, 2, 3]).unwrap();

        let last = report.events.last().unwrap();
        assert_eq!(
            last.outcome,
            StepOutcome::Fault {
                frame: 0,
                evicted: Some(EvictedPage { pid: 1, page: 0 })
            }
        );
        assert_eq!(report.final_frames, vec![Some(3), Some(1), Some(2)]);

        let process = ctx.process(SIMULATED_PID).unwrap();
        assert!(!process.page(0).unwrap().is_resident());
        assert_eq!(process.page(3).unwrap().frame(), Some(0));
    }

    #[test]
    fn test_start_resets_previous_run() {
        let mut ctx = context(3);
        run(&mut ctx, ReplacementAlgorithm::Lru, &[0, 1, 2, 3, 4]).unwrap();

        let sim = ReferenceSimulator::start(&mut ctx, ReplacementAlgorithm::Lru, vec![0]).unwrap();
        let snapshot = sim.snapshot();
        assert!(snapshot.frames.iter().all(|f| f.is_free()));
        assert_eq!(snapshot.processes[0].resident_pages(), 0);
        assert_eq!(snapshot.stats, Some(RunStats::default()));
    }

    #[test]
    fn test_out_of_range_pages_are_clamped() {
        let mut ctx = context(3);
        let report = run(&mut ctx, ReplacementAlgorithm::Fifo, &[0, 40]).unwrap();
        assert_eq!(report.references, vec![0, 7]);
        assert_eq!(report.adjustments.len(), 1);
    }

    #[test]
    fn test_empty_reference_string() {
        let mut ctx = context(3);
        let report = run(&mut ctx, ReplacementAlgorithm::Clock, &[]).unwrap();
        assert_eq!(report.stats, RunStats::default());
        assert_eq!(report.hit_ratio, 0.0);
        assert_eq!(report.final_frames, vec![None, None, None]);
    }

    #[test]
    fn test_requires_memory() {
        let mut ctx = context(3);
        ctx.release_memory();
        assert_eq!(
            ReferenceSimulator::start(&mut ctx, ReplacementAlgorithm::Fifo, vec![0]).unwrap_err(),
            MemvizError::MemoryNotConfigured
        );
    }

    #[test]
    fn test_compare_runs_all_algorithms() {
        let mut ctx = context(3);
        let reports = compare_algorithms(&mut ctx, &[7, 0, 1, 2, 0, 3, 0, 4, 2, 3]).unwrap();
        let algorithms: Vec<_> = reports.iter().map(|r| r.algorithm).collect();
        assert_eq!(algorithms, ReplacementAlgorithm::ALL.to_vec());

        let optimal = reports[2].stats.faults;
        assert!(reports.iter().all(|r| optimal <= r.stats.faults));
        assert!(reports.iter().all(|r| r.stats.hits + r.stats.faults == 10));
    }
}
