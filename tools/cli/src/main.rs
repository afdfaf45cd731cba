//! memviz: 内存管理模拟器命令行
//!
//! 非交互式驱动：加载配置，执行一个子命令，以文本表格或 JSON 输出结果。

mod render;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};
use memviz_core::reference;
use memviz_core::{
    PageNumber, Pid, ReferenceSimulator, ReplacementAlgorithm, SimulationConfig,
    SimulationContext, compare_algorithms,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "memviz")]
#[command(about = "Paging, segmentation, page replacement and TLB simulator")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, or JSON with a .json extension)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Random seed for modify bits and generated reference strings
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Number of physical frames (3-20)
    #[arg(short, long, global = true)]
    frames: Option<usize>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one replacement algorithm over a reference string
    Replace {
        /// Algorithm: fifo, lru, optimal or clock
        #[arg(short, long, default_value = "fifo")]
        algorithm: ReplacementAlgorithm,

        /// Explicit reference string, e.g. "7 0 1 2 0 3"
        #[arg(short, long)]
        refs: Option<String>,

        /// Print frame contents after every step
        #[arg(long)]
        steps: bool,
    },

    /// Run all four algorithms over the same reference string
    Compare {
        /// Explicit reference string
        #[arg(short, long)]
        refs: Option<String>,
    },

    /// Translate a logical address with paging
    Translate {
        /// Process id
        #[arg(short, long, default_value = "1")]
        pid: Pid,

        /// Logical address (decimal or 0x hex); random when omitted
        #[arg(short, long)]
        address: Option<String>,

        /// Run the reference string with this algorithm first so pages are resident
        #[arg(long)]
        warm: Option<ReplacementAlgorithm>,

        /// Look up the TLB before the page table
        #[arg(long)]
        cached: bool,
    },

    /// Translate a segment offset with segmentation
    Segment {
        /// Process id
        #[arg(short, long, default_value = "1")]
        pid: Pid,

        /// Segment number
        #[arg(short, long)]
        segment: usize,

        /// Offset in bytes (decimal or 0x hex)
        #[arg(short, long)]
        offset: String,
    },

    /// Simulate TLB access time over a page trace
    Tlb {
        /// Explicit page trace; random pages 0-9 when omitted
        #[arg(short, long)]
        refs: Option<String>,

        /// TLB capacity (2-32)
        #[arg(long)]
        capacity: Option<usize>,
    },

    /// Show frames, page tables, segment tables and the TLB
    Show,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "warn")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut ctx = build_context(&cli)?;
    let json = cli.json;

    match cli.command {
        Commands::Replace {
            algorithm,
            refs,
            steps,
        } => cmd_replace(&mut ctx, algorithm, refs.as_deref(), steps, json),
        Commands::Compare { refs } => cmd_compare(&mut ctx, refs.as_deref(), json),
        Commands::Translate {
            pid,
            address,
            warm,
            cached,
        } => cmd_translate(&mut ctx, pid, address.as_deref(), warm, cached, json),
        Commands::Segment {
            pid,
            segment,
            offset,
        } => cmd_segment(&ctx, pid, segment, &offset, json),
        Commands::Tlb { refs, capacity } => cmd_tlb(&mut ctx, refs.as_deref(), capacity, json),
        Commands::Show => emit(&ctx.snapshot(None), json, render::snapshot),
    }
}

/// 加载配置文件，命令行参数覆盖文件中的值
fn build_context(cli: &Cli) -> Result<SimulationContext> {
    let mut config = match &cli.config {
        Some(path) => SimulationConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(frames) = cli.frames {
        config.frames = frames;
    }

    let ctx = SimulationContext::new(config).context("Failed to initialize simulation")?;
    for adjustment in ctx.adjustments() {
        warn!("{}", adjustment);
    }
    info!(
        "Configured {} frames, {} processes",
        ctx.config().frames,
        ctx.processes().len()
    );
    Ok(ctx)
}

/// 显式引用串优先，否则按配置取得
fn references(ctx: &mut SimulationContext, refs: Option<&str>) -> Result<Vec<PageNumber>> {
    match refs {
        Some(text) => reference::parse(text).with_context(|| format!("Invalid reference string '{text}'")),
        None => Ok(ctx.reference_string()?),
    }
}

fn parse_number(text: &str) -> Result<u64> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.with_context(|| format!("Invalid number '{text}'"))
}

fn emit<T: Serialize>(value: &T, json: bool, text: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text(value));
    }
    Ok(())
}

fn cmd_replace(
    ctx: &mut SimulationContext,
    algorithm: ReplacementAlgorithm,
    refs: Option<&str>,
    steps: bool,
    json: bool,
) -> Result<()> {
    let references = references(ctx, refs)?;
    let mut sim = ReferenceSimulator::start(ctx, algorithm, references)?;

    if steps && !json {
        println!("{}", render::reference_line(sim.references()));
        while let Some(event) = sim.step()? {
            print!("{}", render::step(&event, &sim.snapshot()));
        }
    }

    let report = sim.run_to_end()?;
    emit(&report, json, render::run_report)
}

fn cmd_compare(ctx: &mut SimulationContext, refs: Option<&str>, json: bool) -> Result<()> {
    let references = references(ctx, refs)?;
    let reports = compare_algorithms(ctx, &references)?;
    emit(&reports, json, |reports| render::comparison(&references, reports))
}

fn cmd_translate(
    ctx: &mut SimulationContext,
    pid: Pid,
    address: Option<&str>,
    warm: Option<ReplacementAlgorithm>,
    cached: bool,
    json: bool,
) -> Result<()> {
    if let Some(algorithm) = warm {
        let references = ctx.reference_string()?;
        ReferenceSimulator::start(ctx, algorithm, references)?.run_to_end()?;
    }

    let logical = match address {
        Some(text) => parse_number(text)?,
        None => ctx.random_logical_address(pid)?,
    };

    if cached {
        // 先访问一次填充 TLB，第二次访问展示命中
        let first = ctx.translate_cached(pid, logical)?;
        let second = ctx.translate_cached(pid, logical)?;
        emit(&[first, second], json, |results| render::cached_translations(logical, results))
    } else {
        let translation = ctx.translate(pid, logical)?;
        emit(&translation, json, |t| render::translation(logical, t))
    }
}

fn cmd_segment(ctx: &SimulationContext, pid: Pid, segment: usize, offset: &str, json: bool) -> Result<()> {
    let offset = parse_number(offset)?;
    let translation = ctx.translate_segment(pid, segment, offset)?;
    emit(&translation, json, render::segment_translation)
}

fn cmd_tlb(ctx: &mut SimulationContext, refs: Option<&str>, capacity: Option<usize>, json: bool) -> Result<()> {
    if let Some(capacity) = capacity {
        for adjustment in ctx.configure_tlb(capacity) {
            warn!("{}", adjustment);
        }
    }

    let trace = refs
        .map(|text| reference::parse(text).with_context(|| format!("Invalid page trace '{text}'")))
        .transpose()?;
    if trace.as_ref().is_some_and(Vec::is_empty) {
        bail!("Page trace is empty");
    }

    let report = ctx.run_tlb_trace(trace.as_deref());
    emit(&report, json, |r| render::tlb_report(r, ctx.config().tlb.capacity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("4096").unwrap(), 4096);
        assert_eq!(parse_number("0x1000").unwrap(), 4096);
        assert_eq!(parse_number(" 0X10 ").unwrap(), 16);
        assert!(parse_number("0xzz").is_err());
        assert!(parse_number("-1").is_err());
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["memviz", "replace", "-a", "lru", "--frames", "4", "--json"]).unwrap();
        assert_eq!(cli.frames, Some(4));
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Replace {
                algorithm: ReplacementAlgorithm::Lru,
                ..
            }
        ));
    }

    #[test]
    fn test_build_context_applies_overrides() {
        let cli = Cli::try_parse_from(["memviz", "--seed", "9", "--frames", "99", "show"]).unwrap();
        let ctx = build_context(&cli).unwrap();
        assert_eq!(ctx.config().seed, 9);
        assert_eq!(ctx.config().frames, 20);
        assert_eq!(ctx.adjustments().len(), 1);
    }

    #[test]
    fn test_explicit_references_win() {
        let mut ctx = SimulationContext::new(SimulationConfig::default()).unwrap();
        assert_eq!(references(&mut ctx, Some("3, 1 2")).unwrap(), vec![3, 1, 2]);
        assert_eq!(references(&mut ctx, None).unwrap().len(), 10);
        assert!(references(&mut ctx, Some("1 two")).is_err());
    }
}
