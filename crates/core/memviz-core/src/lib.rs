//! memviz-core: 内存管理模拟器
//!
//! 包含物理帧表、进程页表/段表、四种页面置换算法（FIFO、LRU、最优、时钟）、
//! 分页与分段地址翻译、带 LRU 淘汰的软件 TLB，以及逐步执行的引用串模拟。
//!
//! 入口是 [`SimulationContext`]：它拥有全部状态，[`ReferenceSimulator`]
//! 在一次运行期间借用它。
//!
//! ```
//! use memviz_core::{ReplacementAlgorithm, SimulationConfig, SimulationContext, simulator};
//!
//! let mut ctx = SimulationContext::new(SimulationConfig::default()).unwrap();
//! let report = simulator::run(&mut ctx, ReplacementAlgorithm::Lru, &[0, 1, 2, 0, 3]).unwrap();
//! assert_eq!(report.stats.hits + report.stats.faults, 5);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod memory;
pub mod process;
pub mod reference;
pub mod replacement;
pub mod simulator;
pub mod snapshot;
pub mod tlb;
pub mod translation;

// ============================================================================
// 基本类型
// ============================================================================

/// 进程号，从 1 开始
pub type Pid = u32;
/// 页号
pub type PageNumber = usize;
/// 帧号
pub type FrameIndex = usize;
/// 逻辑时钟
pub type Timestamp = u64;

/// 引用串模拟使用的进程
pub const SIMULATED_PID: Pid = 1;

pub use config::{Adjustment, ProcessSpec, SegmentSpec, SimulationConfig};
pub use context::SimulationContext;
pub use error::{ConfigError, MemvizError, Result};
pub use memory::{Frame, FrameState, FrameTable, ResidentPage};
pub use process::{PageTableEntry, Process, Residency, SegmentTableEntry};
pub use replacement::{Lookahead, PageReplacer, ReplacementAlgorithm, ReplacementEngine};
pub use simulator::{ReferenceSimulator, RunReport, StepEvent, StepOutcome, compare_algorithms};
pub use snapshot::{RunStats, Snapshot};
pub use tlb::{Tlb, TlbEntry, TlbStats, TlbTraceReport};
pub use translation::{AddressTranslator, CachedTranslation, SegmentTranslation, Translation};
