//! 热路径基准：缓存命中查询与立即数编解码。
//!
//! 两者都在每消息路径上出现一次以上，回归会直接放大为吞吐损失。

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use weft_core::imm::NixlImmLayout;
use weft_core::mr_cache::{MrCache, PAGE_SIZE};
use weft_core::provider::Shm;
use weft_core::test_stubs::NoopRegistration;
use weft_core::types::MrAccess;

fn bench_mr_cache_hit(c: &mut Criterion) {
    let cache = MrCache::<Shm>::with_backend(Box::new(NoopRegistration::new()));
    let buf = (1024 * PAGE_SIZE) as *mut u8;
    let access = MrAccess::READ | MrAccess::WRITE;
    // 预热：后续全部命中。
    let warm = unsafe { cache.lookup(buf, PAGE_SIZE, access) }.expect("warm lookup");

    c.bench_function("mr_cache_hit_lookup", |b| {
        b.iter(|| {
            let handle = unsafe {
                cache.lookup(black_box(buf), black_box(64), MrAccess::READ)
            }
            .expect("hit lookup");
            black_box(handle.len());
        })
    });

    drop(warm);
}

fn bench_imm_codec(c: &mut Criterion) {
    c.bench_function("imm_encode_decode", |b| {
        b.iter(|| {
            let data = NixlImmLayout::encode(
                black_box(0xA),
                black_box(0x55),
                black_box(0x1234),
                black_box(0x3),
            );
            black_box(NixlImmLayout::decode_id(data));
            black_box(NixlImmLayout::decode_type(data));
        })
    });
}

criterion_group!(benches, bench_mr_cache_hit, bench_imm_codec);
criterion_main!(benches);
