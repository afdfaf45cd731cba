//! 文本输出
//!
//! 只负责把核心库的结果格式化为表格，不包含任何模拟逻辑。

use memviz_core::tlb::TlbTraceReport;
use memviz_core::{
    CachedTranslation, FrameState, PageNumber, Residency, RunReport, SegmentTranslation, Snapshot,
    StepEvent, StepOutcome, Translation,
};

const RULE: &str = "------------------------------------------------------------";

pub fn reference_line(references: &[PageNumber]) -> String {
    let pages: Vec<String> = references.iter().map(ToString::to_string).collect();
    format!("Reference string ({}): {}", references.len(), pages.join(" "))
}

fn frame_row(snapshot: &Snapshot) -> String {
    snapshot
        .frames
        .iter()
        .map(|frame| match frame.state() {
            FrameState::Free => "[ -- ]".to_string(),
            FrameState::Occupied(page) => {
                format!("[{:>2}{}]", page.page, if page.reference { "*" } else { " " })
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn step(event: &StepEvent, snapshot: &Snapshot) -> String {
    let outcome = match event.outcome {
        StepOutcome::Hit { frame } => format!("hit   (frame {frame})"),
        StepOutcome::Fault {
            frame,
            evicted: Some(evicted),
        } => format!("fault (frame {frame}, evicted page {})", evicted.page),
        StepOutcome::Fault {
            frame,
            evicted: None,
        } => format!("fault (frame {frame})"),
    };
    format!(
        "{:>3}: page {:>2}  {:<36} {}\n",
        event.step,
        event.page,
        outcome,
        frame_row(snapshot)
    )
}

pub fn run_report(report: &RunReport) -> String {
    let mut out = String::new();
    out += &format!("{} replacement\n{RULE}\n", report.algorithm);
    out += &format!("{}\n", reference_line(&report.references));
    out += &format!(
        "Hits: {}  Faults: {}  Evictions: {}\n",
        report.stats.hits, report.stats.faults, report.stats.evictions
    );
    out += &format!(
        "Hit ratio: {:.2}%  Fault ratio: {:.2}%\n",
        report.hit_ratio * 100.0,
        report.fault_ratio * 100.0
    );

    let frames: Vec<String> = report
        .final_frames
        .iter()
        .map(|page| page.map_or_else(|| "--".to_string(), |p| p.to_string()))
        .collect();
    out += &format!("Final frames: [{}]\n", frames.join(", "));

    for adjustment in &report.adjustments {
        out += &format!("note: {adjustment}\n");
    }
    out
}

pub fn comparison(references: &[PageNumber], reports: &[RunReport]) -> String {
    let mut out = format!("{}\n{RULE}\n", reference_line(references));
    out += &format!(
        "{:<10} {:>6} {:>7} {:>10} {:>10}\n",
        "Algorithm", "Hits", "Faults", "Hit ratio", "Evictions"
    );
    for report in reports {
        out += &format!(
            "{:<10} {:>6} {:>7} {:>9.2}% {:>10}\n",
            report.algorithm.name(),
            report.stats.hits,
            report.stats.faults,
            report.hit_ratio * 100.0,
            report.stats.evictions
        );
    }

    if let Some(best) = reports.iter().min_by_key(|r| r.stats.faults) {
        out += &format!("Fewest faults: {}\n", best.algorithm);
    }
    out
}

pub fn translation(logical: u64, translation: &Translation) -> String {
    match translation {
        Translation::Mapped {
            page,
            offset,
            frame,
            physical,
        } => format!(
            "Logical 0x{logical:x} -> page {page}, offset {offset} -> frame {frame} -> physical 0x{physical:x}\n"
        ),
        Translation::PageFault { page, offset } => format!(
            "Logical 0x{logical:x} -> page {page}, offset {offset}: page fault (page not resident)\n"
        ),
        Translation::InvalidAddress { page, page_count } => format!(
            "Logical 0x{logical:x} -> page {page}: invalid address (process has {page_count} pages)\n"
        ),
    }
}

pub fn cached_translations(logical: u64, results: &[CachedTranslation]) -> String {
    let mut out = String::new();
    for (i, result) in results.iter().enumerate() {
        let source = match (result.tlb_hit, result.stale) {
            (true, _) => "TLB hit",
            (false, true) => "stale TLB entry, page table",
            (false, false) => "TLB miss, page table",
        };
        out += &format!("Access {} [{}]: {}", i + 1, source, translation(logical, &result.translation));
    }
    out
}

pub fn segment_translation(translation: &SegmentTranslation) -> String {
    match translation {
        SegmentTranslation::Mapped {
            segment,
            offset,
            logical,
            physical,
        } => format!(
            "Segment {segment}, offset {offset} -> logical 0x{logical:x} -> physical 0x{physical:x}\n"
        ),
        SegmentTranslation::BoundsFault {
            segment,
            offset,
            limit,
        } => format!("Segment {segment}, offset {offset}: bounds fault (limit {limit} bytes)\n"),
        SegmentTranslation::InvalidSegment {
            segment,
            segment_count,
        } => format!("Segment {segment}: invalid segment (process has {segment_count} segments)\n"),
    }
}

pub fn tlb_report(report: &TlbTraceReport, capacity: usize) -> String {
    let mut out = format!("TLB trace (capacity {capacity})\n{RULE}\n");
    for event in &report.events {
        let evicted = event
            .evicted
            .map(|e| format!(", evicted page {}", e.page))
            .unwrap_or_default();
        out += &format!(
            "{:>3}: page {:>2} -> frame {:>2}  {:<4} {:>5}{}\n",
            event.step,
            event.page,
            event.frame,
            if event.hit { "hit" } else { "miss" },
            event.cost,
            evicted
        );
    }
    out += &format!(
        "{RULE}\nHits: {}  Misses: {}  Hit ratio: {:.2}%\n",
        report.hits,
        report.misses,
        report.hit_ratio * 100.0
    );
    out += &format!(
        "Total time: {}  Average access time: {:.2}\n",
        report.total_time, report.average_access_time
    );
    out += &format!(
        "Without TLB: {}  Speedup: {:.2}x\n",
        report.without_tlb_time, report.speedup
    );
    out
}

pub fn snapshot(snapshot: &Snapshot) -> String {
    let mut out = String::new();

    if snapshot.frames.is_empty() {
        out += "Physical memory: not configured\n";
    } else {
        out += &format!(
            "Physical memory: {} frames, {:.0}% used\n{RULE}\n",
            snapshot.frames.len(),
            snapshot.utilization * 100.0
        );
        out += &format!("{:<6} {:<10} {:>4} {:>5} {:>4} {:>4}\n", "Frame", "State", "PID", "Page", "R", "M");
        for frame in &snapshot.frames {
            match frame.state() {
                FrameState::Free => out += &format!("{:<6} {:<10}\n", frame.index(), "free"),
                FrameState::Occupied(page) => {
                    out += &format!(
                        "{:<6} {:<10} {:>4} {:>5} {:>4} {:>4}\n",
                        frame.index(),
                        "occupied",
                        page.pid,
                        page.page,
                        u8::from(page.reference),
                        u8::from(page.modified)
                    )
                }
            }
        }
    }

    for process in &snapshot.processes {
        out += &format!(
            "\nProcess {} '{}': {} pages, {} resident\n",
            process.pid,
            process.name,
            process.page_count(),
            process.resident_pages()
        );
        out += &format!("  {:<5} {:<8} {:>6} {:>9} {:>4}\n", "Page", "Resident", "Frame", "Last used", "M");
        for entry in &process.page_table {
            let (resident, frame) = match entry.residency {
                Residency::Resident(frame) => ("yes", frame.to_string()),
                Residency::NotResident => ("no", "-".to_string()),
            };
            let last_used = entry.last_used.map_or_else(|| "-".to_string(), |t| t.to_string());
            out += &format!(
                "  {:<5} {:<8} {:>6} {:>9} {:>4}\n",
                entry.page,
                resident,
                frame,
                last_used,
                u8::from(entry.modified)
            );
        }
        out += &format!("  {:<8} {:>9} {:>9}\n", "Segment", "Base (KB)", "Limit (KB)");
        for segment in &process.segment_table {
            out += &format!("  {:<8} {:>9} {:>9}\n", segment.segment, segment.base, segment.limit);
        }
    }

    out += &format!("\nTLB ({} slots, hit rate {:.2}%)\n", snapshot.tlb.len(), snapshot.tlb_stats.hit_rate() * 100.0);
    for (slot, entry) in snapshot.tlb.iter().enumerate() {
        match entry {
            Some(entry) => {
                out += &format!(
                    "  [{slot}] page {} -> frame {} (last used {})\n",
                    entry.page, entry.frame, entry.last_used
                )
            }
            None => out += &format!("  [{slot}] empty\n"),
        }
    }

    if let Some(stats) = &snapshot.stats {
        out += &format!(
            "\nReferences: {}  Hits: {}  Faults: {}  Hit ratio: {:.2}%\n",
            stats.references,
            stats.hits,
            stats.faults,
            stats.hit_ratio() * 100.0
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use memviz_core::{ReplacementAlgorithm, SimulationConfig, SimulationContext, simulator};

    #[test]
    fn test_run_report_text() {
        let mut ctx = SimulationContext::new(SimulationConfig::default()).unwrap();
        let report = simulator::run(&mut ctx, ReplacementAlgorithm::Fifo, &[0, 1, 0]).unwrap();
        let text = run_report(&report);
        assert!(text.starts_with("FIFO replacement"));
        assert!(text.contains("Hits: 1  Faults: 2"));
        assert!(text.contains("Final frames: [0, 1, --, --, --]"));
    }

    #[test]
    fn test_snapshot_text() {
        let ctx = SimulationContext::new(SimulationConfig::default()).unwrap();
        let text = snapshot(&ctx.snapshot(None));
        assert!(text.contains("Physical memory: 5 frames, 0% used"));
        assert!(text.contains("Process 1 'Process A': 8 pages, 0 resident"));
        assert!(text.contains("[3] empty"));
    }

    #[test]
    fn test_tlb_report_text() {
        let mut ctx = SimulationContext::new(SimulationConfig::default()).unwrap();
        let report = ctx.run_tlb_trace(Some(&[0, 1, 2, 3, 0, 1, 2, 3]));
        let text = tlb_report(&report, 4);
        assert!(text.contains("Total time: 480  Average access time: 60.00"));
        assert!(text.contains("Without TLB: 800  Speedup: 1.67x"));
    }

    #[test]
    fn test_translation_text() {
        let text = translation(
            0x1010,
            &Translation::Mapped {
                page: 1,
                offset: 16,
                frame: 2,
                physical: 0x2010,
            },
        );
        assert_eq!(text, "Logical 0x1010 -> page 1, offset 16 -> frame 2 -> physical 0x2010\n");
    }
}
