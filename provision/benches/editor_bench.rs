//! Benchmarks for managed block editing.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use provision::editor::{apply_block, ManagedBlock, Placement};
use provision::stages::{dialplan_block, firewall_block};

fn large_dialplan(contexts: usize) -> String {
    (0..contexts)
        .map(|i| format!("[ctx-{i}]\nexten => {i},1,NoOp()\n same => n,Hangup()\n\n"))
        .collect()
}

fn editor_benchmark(c: &mut Criterion) {
    let block = dialplan_block();
    let body = "[infocall-ivr]\nexten => 7777,1,AGI(ivr_handler.agi)";
    let plain = large_dialplan(2_000);
    let managed = apply_block(&plain, &block, body, &Placement::AtEnd).unwrap_or_default();

    c.bench_function("apply_block_insert", |b| {
        b.iter(|| apply_block(black_box(&plain), &block, body, &Placement::AtEnd))
    });

    c.bench_function("apply_block_replace", |b| {
        b.iter(|| apply_block(black_box(&managed), &block, body, &Placement::AtEnd))
    });

    let rules = format!("*filter\n{}COMMIT\n", "-A INPUT -s 10.0.0.1 -j ACCEPT\n".repeat(5_000));
    let firewall: ManagedBlock = firewall_block();
    let placement = Placement::before_in_section("COMMIT", "*filter");
    c.bench_function("apply_block_before_anchor", |b| {
        b.iter(|| apply_block(black_box(&rules), &firewall, "-A INPUT -p tcp --dport 80 -j ACCEPT", &placement))
    });
}

criterion_group!(benches, editor_benchmark);
criterion_main!(benches);
