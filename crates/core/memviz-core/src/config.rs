//! 模拟配置
//!
//! 所有输入参数都有闭区间边界。越界的值不会报错，而是被钳制到边界内，
//! 每次钳制都会记录为一条 [`Adjustment`] 并输出 `warn` 日志。

use std::fmt::Display;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ============================================================================
// 常量
// ============================================================================

/// 页大小（字节），帧大小与之相同
pub const PAGE_SIZE: u64 = 4 * 1024;
/// 帧大小（字节）
pub const FRAME_SIZE: u64 = PAGE_SIZE;
/// 段基址和段长的单位（字节）
pub const SEGMENT_UNIT: u64 = 1024;

pub const MIN_FRAMES: usize = 3;
pub const MAX_FRAMES: usize = 20;
pub const DEFAULT_FRAMES: usize = 5;

pub const MAX_PROCESSES: usize = 5;
pub const MIN_PAGES: usize = 1;
pub const MAX_PAGES: usize = 50;
pub const DEFAULT_PAGES: usize = 5;
pub const MIN_SEGMENTS: usize = 1;
pub const MAX_SEGMENTS: usize = 8;
pub const MIN_SEGMENT_LIMIT: u64 = 1;
pub const MAX_SEGMENT_LIMIT: u64 = 20;
pub const DEFAULT_SEGMENT_LIMIT: u64 = 4;
/// 显式段基址上限（KB），即最多段数都取最大段长时的总长
pub const MAX_SEGMENT_BASE: u64 = MAX_SEGMENTS as u64 * MAX_SEGMENT_LIMIT;
/// 进程名最大长度（字符）
pub const MAX_NAME_LEN: usize = 19;

pub const MIN_REFERENCE_LEN: usize = 5;
pub const MAX_REFERENCE_LEN: usize = 30;
pub const DEFAULT_REFERENCE_LEN: usize = 10;
/// 生成引用串时"访问相邻页"的默认概率
pub const DEFAULT_LOCALITY: f64 = 2.0 / 3.0;

pub const MIN_TLB_CAPACITY: usize = 2;
pub const MAX_TLB_CAPACITY: usize = 32;
pub const DEFAULT_TLB_CAPACITY: usize = 4;
pub const MIN_TLB_HIT_LATENCY: u64 = 1;
pub const MAX_TLB_HIT_LATENCY: u64 = 1_000;
pub const DEFAULT_TLB_HIT_LATENCY: u64 = 10;
pub const MIN_TLB_MISS_LATENCY: u64 = 1;
pub const MAX_TLB_MISS_LATENCY: u64 = 10_000;
pub const DEFAULT_TLB_MISS_LATENCY: u64 = 100;
pub const MIN_TLB_TRACE_LEN: usize = 1;
pub const MAX_TLB_TRACE_LEN: usize = 100;
pub const DEFAULT_TLB_TRACE_LEN: usize = 10;
/// TLB 演示中随机引用的页范围 `0..TLB_TRACE_PAGES`
pub const TLB_TRACE_PAGES: usize = 10;

pub const DEFAULT_SEED: u64 = 0x5eed_cafe;

// ============================================================================
// 钳制记录
// ============================================================================

/// 一次被钳制的配置项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    /// 配置项路径，如 `tlb.capacity`
    pub field: String,
    /// 请求值
    pub requested: String,
    /// 实际采用的值
    pub applied: String,
}

impl Display for Adjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} adjusted to {}",
            self.field, self.requested, self.applied
        )
    }
}

/// 把 `value` 钳制到 `[min, max]`，越界时记录调整
pub(crate) fn clamp_setting<T>(
    field: &str,
    value: T,
    min: T,
    max: T,
    adjustments: &mut Vec<Adjustment>,
) -> T
where
    T: PartialOrd + Copy + Display,
{
    let applied = if value < min {
        min
    } else if value > max {
        max
    } else {
        return value;
    };

    log::warn!("{field} = {value} out of range [{min}, {max}], using {applied}");
    adjustments.push(Adjustment {
        field: field.to_string(),
        requested: value.to_string(),
        applied: applied.to_string(),
    });
    applied
}

// ============================================================================
// 配置结构
// ============================================================================

/// 段定义，单位为 KB
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSpec {
    /// 省略时紧接上一段
    #[serde(default)]
    pub base: Option<u64>,
    pub limit: u64,
}

impl SegmentSpec {
    pub fn new(limit: u64) -> Self {
        Self { base: None, limit }
    }

    pub fn at(base: u64, limit: u64) -> Self {
        Self {
            base: Some(base),
            limit,
        }
    }
}

/// 进程定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub name: String,
    #[serde(default = "default_pages")]
    pub pages: usize,
    #[serde(default)]
    pub segments: Vec<SegmentSpec>,
}

fn default_pages() -> usize {
    DEFAULT_PAGES
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, pages: usize, segments: Vec<SegmentSpec>) -> Self {
        Self {
            name: name.into(),
            pages,
            segments,
        }
    }

    /// 钳制页数、段数、段长并截断名字
    pub fn normalize(&mut self, prefix: &str, adjustments: &mut Vec<Adjustment>) {
        if self.name.chars().count() > MAX_NAME_LEN {
            let truncated: String = self.name.chars().take(MAX_NAME_LEN).collect();
            adjustments.push(Adjustment {
                field: format!("{prefix}.name"),
                requested: self.name.clone(),
                applied: truncated.clone(),
            });
            self.name = truncated;
        }
        if self.name.is_empty() {
            self.name = "Process".to_string();
        }

        self.pages = clamp_setting(
            &format!("{prefix}.pages"),
            self.pages,
            MIN_PAGES,
            MAX_PAGES,
            adjustments,
        );

        if self.segments.is_empty() {
            log::warn!("{prefix}.segments is empty, using one {DEFAULT_SEGMENT_LIMIT} KB segment");
            adjustments.push(Adjustment {
                field: format!("{prefix}.segments"),
                requested: "0".to_string(),
                applied: MIN_SEGMENTS.to_string(),
            });
            self.segments.push(SegmentSpec::new(DEFAULT_SEGMENT_LIMIT));
        } else if self.segments.len() > MAX_SEGMENTS {
            clamp_setting(
                &format!("{prefix}.segments"),
                self.segments.len(),
                MIN_SEGMENTS,
                MAX_SEGMENTS,
                adjustments,
            );
            self.segments.truncate(MAX_SEGMENTS);
        }

        for (i, segment) in self.segments.iter_mut().enumerate() {
            segment.limit = clamp_setting(
                &format!("{prefix}.segments[{i}].limit"),
                segment.limit,
                MIN_SEGMENT_LIMIT,
                MAX_SEGMENT_LIMIT,
                adjustments,
            );
            if let Some(base) = segment.base {
                segment.base = Some(clamp_setting(
                    &format!("{prefix}.segments[{i}].base"),
                    base,
                    0,
                    MAX_SEGMENT_BASE,
                    adjustments,
                ));
            }
        }
    }
}

/// 引用串配置
///
/// `pages` 给出时使用显式引用串（长度不受限制，页号钳制到进程 1 的页范围），
/// 否则按 `length` 和 `locality` 生成。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub length: usize,
    pub locality: f64,
    pub pages: Option<Vec<usize>>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_REFERENCE_LEN,
            locality: DEFAULT_LOCALITY,
            pages: None,
        }
    }
}

impl ReferenceConfig {
    pub fn normalize(&mut self, adjustments: &mut Vec<Adjustment>) {
        self.length = clamp_setting(
            "reference.length",
            self.length,
            MIN_REFERENCE_LEN,
            MAX_REFERENCE_LEN,
            adjustments,
        );
        if self.locality.is_nan() {
            adjustments.push(Adjustment {
                field: "reference.locality".to_string(),
                requested: "NaN".to_string(),
                applied: DEFAULT_LOCALITY.to_string(),
            });
            self.locality = DEFAULT_LOCALITY;
        }
        self.locality = clamp_setting("reference.locality", self.locality, 0.0, 1.0, adjustments);
    }
}

/// TLB 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlbConfig {
    pub capacity: usize,
    pub hit_latency: u64,
    pub miss_latency: u64,
    pub trace_length: usize,
}

impl Default for TlbConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_TLB_CAPACITY,
            hit_latency: DEFAULT_TLB_HIT_LATENCY,
            miss_latency: DEFAULT_TLB_MISS_LATENCY,
            trace_length: DEFAULT_TLB_TRACE_LEN,
        }
    }
}

impl TlbConfig {
    pub fn normalize(&mut self, adjustments: &mut Vec<Adjustment>) {
        self.capacity = clamp_setting(
            "tlb.capacity",
            self.capacity,
            MIN_TLB_CAPACITY,
            MAX_TLB_CAPACITY,
            adjustments,
        );
        self.hit_latency = clamp_setting(
            "tlb.hit_latency",
            self.hit_latency,
            MIN_TLB_HIT_LATENCY,
            MAX_TLB_HIT_LATENCY,
            adjustments,
        );
        self.miss_latency = clamp_setting(
            "tlb.miss_latency",
            self.miss_latency,
            MIN_TLB_MISS_LATENCY,
            MAX_TLB_MISS_LATENCY,
            adjustments,
        );
        self.trace_length = clamp_setting(
            "tlb.trace_length",
            self.trace_length,
            MIN_TLB_TRACE_LEN,
            MAX_TLB_TRACE_LEN,
            adjustments,
        );
    }
}

/// 完整的模拟配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub frames: usize,
    /// 随机数种子：修改位和生成的引用串都由它决定
    pub seed: u64,
    pub processes: Vec<ProcessSpec>,
    pub reference: ReferenceConfig,
    pub tlb: TlbConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frames: DEFAULT_FRAMES,
            seed: DEFAULT_SEED,
            processes: default_processes(),
            reference: ReferenceConfig::default(),
            tlb: TlbConfig::default(),
        }
    }
}

/// 启动时预置的两个进程
pub fn default_processes() -> Vec<ProcessSpec> {
    vec![
        ProcessSpec::new(
            "Process A",
            8,
            vec![
                SegmentSpec::at(0, 8),
                SegmentSpec::at(8, 12),
                SegmentSpec::at(20, 4),
            ],
        ),
        ProcessSpec::new(
            "Process B",
            6,
            vec![SegmentSpec::at(0, 16), SegmentSpec::at(16, 8)],
        ),
    ]
}

impl SimulationConfig {
    /// 钳制所有越界配置项，返回调整记录
    pub fn normalize(&mut self) -> Vec<Adjustment> {
        let mut adjustments = Vec::new();

        self.frames = clamp_setting("frames", self.frames, MIN_FRAMES, MAX_FRAMES, &mut adjustments);

        if self.processes.len() > MAX_PROCESSES {
            clamp_setting(
                "processes",
                self.processes.len(),
                0,
                MAX_PROCESSES,
                &mut adjustments,
            );
            self.processes.truncate(MAX_PROCESSES);
        }
        for (i, spec) in self.processes.iter_mut().enumerate() {
            spec.normalize(&format!("processes[{i}]"), &mut adjustments);
        }

        self.reference.normalize(&mut adjustments);
        self.tlb.normalize(&mut adjustments);
        adjustments
    }

    /// 从 TOML 字符串加载配置
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(format!("TOML parse error: {}", e)))
    }

    /// 从 JSON 字符串加载配置
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json)
            .map_err(|e| ConfigError::Parse(format!("JSON parse error: {}", e)))
    }

    /// 从文件加载，按扩展名选择格式（`.json` 为 JSON，其余按 TOML）
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_toml(&content),
        }
    }

    /// 将配置序列化为 TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(format!("TOML serialize error: {}", e)))
    }

    /// 将配置序列化为 JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(format!("JSON serialize error: {}", e)))
    }
}
