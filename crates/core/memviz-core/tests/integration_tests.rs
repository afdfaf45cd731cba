//! 集成测试
//!
//! 通过公开 API 驱动完整的模拟流程：配置 → 运行 → 快照。

use memviz_core::simulator::{self, EvictedPage};
use memviz_core::{
    MemvizError, ReferenceSimulator, ReplacementAlgorithm, SegmentTranslation, SimulationConfig,
    SimulationContext, StepOutcome, Tlb, Translation, compare_algorithms,
};

/// Belady 异常的经典引用串
const BELADY: [usize; 12] = [0, 1, 2, 3, 0, 1, 4, 0, 1, 2, 3, 4];

fn context_with_frames(frames: usize) -> SimulationContext {
    SimulationContext::new(SimulationConfig {
        frames,
        ..Default::default()
    })
    .unwrap()
}

fn faults(algorithm: ReplacementAlgorithm, frames: usize, references: &[usize]) -> usize {
    let mut ctx = context_with_frames(frames);
    simulator::run(&mut ctx, algorithm, references)
        .unwrap()
        .stats
        .faults
}

#[test]
fn test_textbook_fault_counts() {
    assert_eq!(faults(ReplacementAlgorithm::Fifo, 3, &BELADY), 9);
    assert_eq!(faults(ReplacementAlgorithm::Lru, 3, &BELADY), 10);
    assert_eq!(faults(ReplacementAlgorithm::Optimal, 3, &BELADY), 7);
}

#[test]
fn test_belady_anomaly_with_fifo() {
    // 4 个帧反而多一次缺页
    assert_eq!(faults(ReplacementAlgorithm::Fifo, 4, &BELADY), 10);
}

#[test]
fn test_hits_plus_faults_equals_length() {
    let mut ctx = context_with_frames(4);
    let references = [7, 0, 1, 2, 0, 3, 0, 4, 2, 3, 0, 3, 2];
    for report in compare_algorithms(&mut ctx, &references).unwrap() {
        assert_eq!(
            report.stats.hits + report.stats.faults,
            references.len(),
            "{}",
            report.algorithm
        );
        assert_eq!(report.events.len(), references.len());
        assert!((report.hit_ratio + report.fault_ratio - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_clock_matches_fifo_without_hits() {
    // 循环访问 frames + 1 个页，每次都缺页
    let references: Vec<usize> = (0..4).cycle().take(16).collect();

    let mut ctx = context_with_frames(3);
    let fifo = simulator::run(&mut ctx, ReplacementAlgorithm::Fifo, &references).unwrap();
    let clock = simulator::run(&mut ctx, ReplacementAlgorithm::Clock, &references).unwrap();

    assert_eq!(fifo.stats.hits, 0);
    assert_eq!(clock.stats.hits, 0);
    let fifo_frames: Vec<_> = fifo.events.iter().map(|e| e.frame()).collect();
    let clock_frames: Vec<_> = clock.events.iter().map(|e| e.frame()).collect();
    assert_eq!(fifo_frames, clock_frames);
}

#[test]
fn test_runs_are_repeatable_after_reset() {
    let mut ctx = context_with_frames(3);
    for algorithm in ReplacementAlgorithm::ALL {
        let first = simulator::run(&mut ctx, algorithm, &BELADY).unwrap();
        let second = simulator::run(&mut ctx, algorithm, &BELADY).unwrap();
        assert_eq!(first.stats, second.stats, "{algorithm}");
        assert_eq!(first.final_frames, second.final_frames, "{algorithm}");
    }
}

#[test]
fn test_same_seed_same_simulation() {
    let build = || {
        let mut ctx = SimulationContext::new(SimulationConfig {
            seed: 1234,
            ..Default::default()
        })
        .unwrap();
        let references = ctx.reference_string().unwrap();
        let report = simulator::run(&mut ctx, ReplacementAlgorithm::Clock, &references).unwrap();
        (references, report, ctx.snapshot(None))
    };

    let (refs_a, report_a, snapshot_a) = build();
    let (refs_b, report_b, snapshot_b) = build();
    assert_eq!(refs_a, refs_b);
    assert_eq!(report_a, report_b);
    assert_eq!(snapshot_a, snapshot_b);
}

#[test]
fn test_step_by_step_matches_run_to_end() {
    let mut ctx = context_with_frames(3);
    let mut sim = ReferenceSimulator::start(&mut ctx, ReplacementAlgorithm::Lru, BELADY.to_vec()).unwrap();
    let mut stepped = Vec::new();
    while let Some(event) = sim.step().unwrap() {
        stepped.push(event);
    }
    let stats = *sim.stats();

    let report = simulator::run(&mut ctx, ReplacementAlgorithm::Lru, &BELADY).unwrap();
    assert_eq!(stepped, report.events);
    assert_eq!(stats, report.stats);
}

#[test]
fn test_eviction_keeps_page_table_consistent() {
    let mut ctx = context_with_frames(3);
    let mut sim = ReferenceSimulator::start(&mut ctx, ReplacementAlgorithm::Optimal, BELADY.to_vec()).unwrap();

    while let Some(event) = sim.step().unwrap() {
        let ctx = sim.context();
        let memory = ctx.memory().unwrap();
        let process = ctx.process(1).unwrap();

        // 每个驻留页的页表项都指向它所在的帧
        for frame in memory.frames() {
            if let Some(resident) = frame.resident() {
                assert_eq!(process.page(resident.page).unwrap().frame(), Some(frame.index()));
            }
        }
        assert_eq!(process.resident_pages(), memory.occupied_count());

        if let StepOutcome::Fault {
            evicted: Some(EvictedPage { page, .. }),
            ..
        } = event.outcome
        {
            assert!(!process.page(page).unwrap().is_resident());
        }
    }
}

#[test]
fn test_reconfigure_invalidates_residency() {
    let mut ctx = context_with_frames(3);
    simulator::run(&mut ctx, ReplacementAlgorithm::Fifo, &[0, 1, 2]).unwrap();
    assert!(matches!(ctx.translate(1, 0).unwrap(), Translation::Mapped { .. }));

    ctx.configure_memory(6).unwrap();
    assert_eq!(ctx.memory().unwrap().capacity(), 6);
    assert_eq!(ctx.memory().unwrap().occupied_count(), 0);
    assert_eq!(
        ctx.translate(1, 0).unwrap(),
        Translation::PageFault { page: 0, offset: 0 }
    );
}

#[test]
fn test_released_memory_blocks_simulation() {
    let mut ctx = context_with_frames(3);
    ctx.release_memory();
    assert_eq!(
        simulator::run(&mut ctx, ReplacementAlgorithm::Lru, &BELADY).unwrap_err(),
        MemvizError::MemoryNotConfigured
    );
}

#[test]
fn test_translation_after_run() {
    let mut ctx = context_with_frames(3);
    let report = simulator::run(&mut ctx, ReplacementAlgorithm::Fifo, &[5]).unwrap();
    assert_eq!(report.final_frames, vec![Some(5), None, None]);

    let addr = 5 * 4096 + 123;
    assert_eq!(
        ctx.translate(1, addr).unwrap(),
        Translation::Mapped {
            page: 5,
            offset: 123,
            frame: 0,
            physical: 123,
        }
    );
    assert_eq!(
        ctx.translate(1, 8 * 4096).unwrap(),
        Translation::InvalidAddress {
            page: 8,
            page_count: 8
        }
    );

    let cached = ctx.translate_cached(1, addr).unwrap();
    assert!(!cached.tlb_hit);
    assert!(ctx.translate_cached(1, addr).unwrap().tlb_hit);
}

#[test]
fn test_oversized_segment_base_from_config() {
    let config = SimulationConfig::from_toml(
        r#"
        [[processes]]
        name = "p"
        pages = 4
        segments = [{ base = 9223372036854775807, limit = 2 }, { limit = 3 }]
        "#,
    )
    .unwrap();

    let ctx = SimulationContext::new(config).unwrap();
    assert_eq!(ctx.adjustments()[0].field, "processes[0].segments[0].base");

    let process = ctx.process(1).unwrap();
    assert_eq!(process.segment(0).unwrap().base, 160);
    assert_eq!(process.segment(1).unwrap().base, 162);
    assert_eq!(
        ctx.translate_segment(1, 0, 10).unwrap(),
        SegmentTranslation::Mapped {
            segment: 0,
            offset: 10,
            logical: 160 * 1024 + 10,
            physical: 160 * 1024 + 10,
        }
    );
}

#[test]
fn test_tlb_evicts_oldest_after_capacity() {
    let capacity = 4;
    let mut tlb = Tlb::new(capacity);
    for page in 0..capacity {
        assert!(tlb.insert(page, page * 2 + 1, page as u64 + 1).is_none());
    }
    let evicted = tlb.insert(capacity, 99, 100).unwrap();
    assert_eq!(evicted.page, 0);
    assert_eq!(tlb.len(), capacity);
    assert!(tlb.probe(0).is_none());
}

#[test]
fn test_tlb_trace_with_explicit_references() {
    let mut ctx = SimulationContext::new(SimulationConfig::default()).unwrap();
    // 容量 4：前 4 次缺失，重复访问全部命中
    let report = ctx.run_tlb_trace(Some(&[0, 1, 2, 3, 0, 1, 2, 3]));
    assert_eq!(report.misses, 4);
    assert_eq!(report.hits, 4);
    assert_eq!(report.total_time, 4 * 10 + 4 * 110);
    assert!((report.average_access_time - 60.0).abs() < 1e-9);
    assert_eq!(report.without_tlb_time, 8 * 100);
    assert!((report.speedup - 800.0 / 480.0).abs() < 1e-9);
}

#[test]
fn test_config_from_toml_drives_simulation() {
    let config = SimulationConfig::from_toml(
        r#"
        frames = 1
        seed = 42

        [reference]
        pages = [0, 1, 2, 0, 1, 3, 9]

        [[processes]]
        name = "worker"
        pages = 4
        segments = [{ limit = 2 }, { limit = 30 }]
        "#,
    )
    .unwrap();

    let mut ctx = SimulationContext::new(config).unwrap();
    // frames 和段长都被钳制
    assert_eq!(ctx.memory().unwrap().capacity(), 3);
    assert_eq!(ctx.adjustments().len(), 2);
    assert_eq!(ctx.process(1).unwrap().segment(1).unwrap().limit, 20);

    let references = ctx.reference_string().unwrap();
    assert_eq!(references, vec![0, 1, 2, 0, 1, 3, 3]);

    let reports = compare_algorithms(&mut ctx, &references).unwrap();
    assert_eq!(reports.len(), 4);
}
