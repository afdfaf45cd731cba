//! 模拟上下文
//!
//! [`SimulationContext`] 是帧表、进程表、TLB 和随机数发生器的唯一所有者，
//! 所有操作都通过它进行。帧表放在 `Option` 中：重新配置时旧帧表先被丢弃，
//! 分配失败时上下文处于"未配置"状态，任何模拟都无法继续。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{
    Adjustment, MAX_FRAMES, MAX_PROCESSES, MAX_TLB_CAPACITY, MIN_FRAMES, MIN_TLB_CAPACITY,
    ProcessSpec, SimulationConfig, TLB_TRACE_PAGES, clamp_setting,
};
use crate::error::{MemvizError, Result};
use crate::memory::FrameTable;
use crate::process::Process;
use crate::reference;
use crate::snapshot::{RunStats, Snapshot};
use crate::tlb::{Tlb, TlbTraceReport, demo_frame_for, run_tlb_trace};
use crate::translation::{AddressTranslator, CachedTranslation, SegmentTranslation, Translation};
use crate::{FrameIndex, PageNumber, Pid, Timestamp};

/// 模拟上下文
#[derive(Debug)]
pub struct SimulationContext {
    config: SimulationConfig,
    memory: Option<FrameTable>,
    processes: Vec<Process>,
    tlb: Tlb,
    /// TLB 当前缓存的是哪个进程的映射
    tlb_owner: Option<Pid>,
    tlb_clock: Timestamp,
    translator: AddressTranslator,
    rng: StdRng,
    adjustments: Vec<Adjustment>,
}

impl SimulationContext {
    /// 按配置创建上下文：钳制配置、注册进程、分配帧表
    pub fn new(mut config: SimulationConfig) -> Result<Self> {
        let adjustments = config.normalize();
        let mut rng = StdRng::seed_from_u64(config.seed);

        let processes = config
            .processes
            .iter()
            .enumerate()
            .map(|(i, spec)| Process::from_spec(i as Pid + 1, spec, &mut rng))
            .collect();

        let memory = FrameTable::new(config.frames)?;
        let tlb = Tlb::new(config.tlb.capacity);

        log::info!(
            "Simulation context: {} frames, {} processes, TLB {} entries",
            config.frames,
            config.processes.len(),
            config.tlb.capacity
        );

        Ok(Self {
            config,
            memory: Some(memory),
            processes,
            tlb,
            tlb_owner: None,
            tlb_clock: 0,
            translator: AddressTranslator::new(),
            rng,
            adjustments,
        })
    }

    /// 当前（已钳制的）配置
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// 创建以来所有被钳制的配置项
    pub fn adjustments(&self) -> &[Adjustment] {
        &self.adjustments
    }

    // ========================================================================
    // 物理内存
    // ========================================================================

    /// 重新配置帧数
    ///
    /// 旧帧表先被释放，所有页表项置为不驻留，TLB 清空。
    ///
    /// # 错误
    ///
    /// 分配失败时返回 [`MemvizError::AllocationFailed`]，上下文保持未配置状态。
    pub fn configure_memory(&mut self, frames: usize) -> Result<Vec<Adjustment>> {
        let mut adjustments = Vec::new();
        let frames = clamp_setting("frames", frames, MIN_FRAMES, MAX_FRAMES, &mut adjustments);

        self.memory = None;
        self.invalidate_all_pages();
        self.tlb.flush();
        self.tlb_owner = None;

        self.memory = Some(FrameTable::new(frames)?);
        self.config.frames = frames;
        self.adjustments.extend(adjustments.iter().cloned());
        log::info!("Configured {} memory frames", frames);
        Ok(adjustments)
    }

    /// 释放帧表
    pub fn release_memory(&mut self) {
        if self.memory.take().is_some() {
            self.invalidate_all_pages();
            log::info!("Released frame table");
        }
    }

    pub fn is_memory_configured(&self) -> bool {
        self.memory.is_some()
    }

    pub fn memory(&self) -> Result<&FrameTable> {
        self.memory.as_ref().ok_or(MemvizError::MemoryNotConfigured)
    }

    pub(crate) fn memory_mut(&mut self) -> Result<&mut FrameTable> {
        self.memory.as_mut().ok_or(MemvizError::MemoryNotConfigured)
    }

    /// 释放帧并使原页表项失效，返回原来的 `(pid, page)`
    pub(crate) fn evict_frame(&mut self, frame: FrameIndex) -> Result<Option<(Pid, PageNumber)>> {
        let previous = self.memory_mut()?.evict(frame);
        if let Some((pid, page)) = previous
            && let Some(entry) = self.process_mut(pid)?.page_mut(page)
        {
            entry.invalidate();
        }
        Ok(previous)
    }

    /// 把页装入空闲帧并更新页表，修改位随机生成
    pub(crate) fn load_page(
        &mut self,
        frame: FrameIndex,
        pid: Pid,
        page: PageNumber,
        timestamp: Timestamp,
    ) -> Result<()> {
        let modified = self.rng.gen_bool(0.5);
        self.memory_mut()?.load_page(frame, pid, page, timestamp, modified);
        if let Some(entry) = self.process_mut(pid)?.page_mut(page) {
            entry.map(frame, timestamp);
        }
        Ok(())
    }

    /// 运行开始前的完全重置：释放所有帧，页表项全部不驻留
    pub(crate) fn reset_for_run(&mut self) -> Result<()> {
        self.memory_mut()?.reset();
        self.invalidate_all_pages();
        Ok(())
    }

    fn invalidate_all_pages(&mut self) {
        self.processes.iter_mut().for_each(Process::reset_pages);
    }

    // ========================================================================
    // 进程
    // ========================================================================

    /// 注册新进程，返回进程号和钳制记录
    ///
    /// # 错误
    ///
    /// 进程数已达上限时返回 [`MemvizError::ProcessLimit`]
    pub fn add_process(&mut self, mut spec: ProcessSpec) -> Result<(Pid, Vec<Adjustment>)> {
        if self.processes.len() >= MAX_PROCESSES {
            return Err(MemvizError::ProcessLimit {
                limit: MAX_PROCESSES,
            });
        }

        let pid = self.processes.len() as Pid + 1;
        let mut adjustments = Vec::new();
        spec.normalize(&format!("processes[{}]", pid - 1), &mut adjustments);

        let process = Process::from_spec(pid, &spec, &mut self.rng);
        log::info!(
            "Added process {} '{}' with {} pages and {} segments",
            pid,
            process.name,
            process.page_count(),
            process.segment_table.len()
        );
        self.processes.push(process);
        self.config.processes.push(spec);
        self.adjustments.extend(adjustments.iter().cloned());
        Ok((pid, adjustments))
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn process(&self, pid: Pid) -> Result<&Process> {
        self.processes
            .iter()
            .find(|p| p.pid == pid)
            .ok_or(MemvizError::UnknownProcess(pid))
    }

    pub(crate) fn process_mut(&mut self, pid: Pid) -> Result<&mut Process> {
        self.processes
            .iter_mut()
            .find(|p| p.pid == pid)
            .ok_or(MemvizError::UnknownProcess(pid))
    }

    // ========================================================================
    // 引用串
    // ========================================================================

    /// 按配置得到引用串：显式给出时清洗页号，否则随机生成
    pub fn reference_string(&mut self) -> Result<Vec<PageNumber>> {
        let page_count = self.process(crate::SIMULATED_PID)?.page_count();
        let reference = self.config.reference.clone();

        match reference.pages {
            Some(pages) => {
                let (references, adjustments) = reference::sanitize(&pages, page_count);
                self.adjustments.extend(adjustments);
                Ok(references)
            }
            None => Ok(reference::generate(
                &mut self.rng,
                reference.length,
                page_count,
                reference.locality,
            )),
        }
    }

    // ========================================================================
    // 地址翻译
    // ========================================================================

    pub fn translator(&self) -> &AddressTranslator {
        &self.translator
    }

    pub fn translate(&self, pid: Pid, logical: u64) -> Result<Translation> {
        Ok(self.translator.translate(self.process(pid)?, logical))
    }

    pub fn translate_page(&self, pid: Pid, page: PageNumber, offset: u64) -> Result<Translation> {
        Ok(self.translator.translate_page(self.process(pid)?, page, offset))
    }

    pub fn translate_segment(&self, pid: Pid, segment: usize, offset: u64) -> Result<SegmentTranslation> {
        Ok(self.translator.translate_segment(self.process(pid)?, segment, offset))
    }

    /// 经过 TLB 的分页翻译；切换进程时先清空 TLB
    pub fn translate_cached(&mut self, pid: Pid, logical: u64) -> Result<CachedTranslation> {
        let process = self
            .processes
            .iter()
            .find(|p| p.pid == pid)
            .ok_or(MemvizError::UnknownProcess(pid))?;

        if self.tlb_owner != Some(pid) {
            self.tlb.flush();
            self.tlb_owner = Some(pid);
        }
        self.tlb_clock += 1;
        Ok(self
            .translator
            .translate_cached(&mut self.tlb, process, logical, self.tlb_clock))
    }

    /// 随机生成一个落在进程地址空间内的逻辑地址
    pub fn random_logical_address(&mut self, pid: Pid) -> Result<u64> {
        let size = self.process(pid)?.page_count() as u64 * self.translator.page_size();
        Ok(self.rng.gen_range(0..size))
    }

    // ========================================================================
    // TLB
    // ========================================================================

    pub fn tlb(&self) -> &Tlb {
        &self.tlb
    }

    /// 重新设置 TLB 容量，已有条目全部丢弃
    pub fn configure_tlb(&mut self, capacity: usize) -> Vec<Adjustment> {
        let mut adjustments = Vec::new();
        let capacity = clamp_setting(
            "tlb.capacity",
            capacity,
            MIN_TLB_CAPACITY,
            MAX_TLB_CAPACITY,
            &mut adjustments,
        );
        self.tlb = Tlb::new(capacity);
        self.tlb_owner = None;
        self.config.tlb.capacity = capacity;
        self.adjustments.extend(adjustments.iter().cloned());
        adjustments
    }

    /// TLB 访问时间演示
    ///
    /// 未给出引用串时随机生成 `tlb.trace_length` 个 `0..TLB_TRACE_PAGES` 的页号；
    /// 未命中时使用演示映射 `page * 2 + 1`。
    pub fn run_tlb_trace(&mut self, references: Option<&[PageNumber]>) -> TlbTraceReport {
        let generated;
        let references = match references {
            Some(references) => references,
            None => {
                let rng = &mut self.rng;
                generated = (0..self.config.tlb.trace_length)
                    .map(|_| rng.gen_range(0..TLB_TRACE_PAGES))
                    .collect::<Vec<_>>();
                generated.as_slice()
            }
        };

        self.tlb_owner = None;
        let report = run_tlb_trace(&mut self.tlb, &self.config.tlb, references, demo_frame_for);
        log::info!(
            "TLB trace: {} references, {} hits, average access time {:.2}",
            report.references,
            report.hits,
            report.average_access_time
        );
        report
    }

    // ========================================================================
    // 快照
    // ========================================================================

    /// 当前状态快照，`stats` 为运行中的统计
    pub fn snapshot(&self, stats: Option<&RunStats>) -> Snapshot {
        Snapshot::capture(self.memory.as_ref(), &self.processes, &self.tlb, stats)
    }
}
