//! 注册缓存契约测试套件。
//!
//! # 教案级导览
//!
//! - **Why**：缓存的命中/对齐/引用计数/失效协议独立于真实注册，必须在
//!   无 NIC 环境下可完整验证；本套件以官方测试桩后端驱动全部不变量。
//! - **How**：桩后端永不解引用地址，测试使用合成地址构造各种区间关系；
//!   统计量在每步之后与契约对照。
//! - **What**：覆盖命中-失效-驱逐场景、clear 后必未命中定律、失败路径
//!   不落条目、访问位超集判定与并发查询下的计数守恒。

use std::sync::Arc;
use std::thread;

use weft_core::mr_cache::{MrCache, PAGE_SIZE};
use weft_core::provider::Shm;
use weft_core::test_stubs::{FailingRegistration, NoopRegistration};
use weft_core::types::MrAccess;
use weft_core::Errc;

const RW: MrAccess = MrAccess::READ.union(MrAccess::WRITE);

fn stub_cache() -> (MrCache<Shm>, NoopRegistration) {
    let backend = NoopRegistration::new();
    let cache = MrCache::<Shm>::with_backend(Box::new(backend.clone()));
    (cache, backend)
}

/// 场景：命中后失效——未重叠区间失效不影响条目，引用清零后驱逐生效。
///
/// 步骤与期望：
/// 1. 查 `[buf, 4096)` RW → 未命中，建条目 E1，
///    统计 `{misses: 1, registrations: 1, current_entries: 1}`；
/// 2. 查 `[buf+100, 200)` R → 命中 E1，`{hits: 1}`，E1 引用数 = 2；
/// 3. 失效 `[buf+4096, 4096)` → 与 E1 不重叠，无影响；
/// 4. 释放两个句柄 → E1 引用数 = 0；
/// 5. `evict_unreferenced` → E1 移除，`{evictions: 1, current_entries: 0}`。
#[test]
fn hit_then_invalidate_scenario() {
    let (cache, backend) = stub_cache();
    let buf = (64 * PAGE_SIZE) as *mut u8;

    let first = unsafe { cache.lookup(buf, PAGE_SIZE, RW) }.expect("首查必须注册成功");
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.registrations, 1);
    assert_eq!(stats.current_entries, 1);
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.total_registered_bytes, PAGE_SIZE);
    assert_eq!(backend.registration_count(), 1);
    assert_eq!(first.refcount(), 1);

    let second = unsafe { cache.lookup(buf.wrapping_add(100), 200, MrAccess::READ) }
        .expect("子区间读访问必须命中");
    let stats = cache.stats();
    assert_eq!(stats.hits, 1, "包含关系 + 访问位子集 ⇒ 命中");
    assert_eq!(stats.registrations, 1, "命中不触达后端");
    assert_eq!(backend.registration_count(), 1);
    assert_eq!(second.refcount(), 2, "两个句柄共享同一条目");
    assert_eq!(second.base_address(), buf, "命中条目覆盖请求区间");
    assert_eq!(second.len(), PAGE_SIZE);

    // 相邻页失效：区间端点互斥，不得波及 E1。
    cache.invalidate(buf.wrapping_add(PAGE_SIZE), PAGE_SIZE);
    assert_eq!(cache.stats().current_entries, 1, "未重叠区间失效无影响");
    assert_eq!(cache.stats().evictions, 0);

    drop(first);
    drop(second);

    cache.evict_unreferenced();
    let stats = cache.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.current_entries, 0);
    assert_eq!(stats.total_registered_bytes, 0);
}

/// 被引用条目在失效与驱逐下幸存，释放后才可回收。
#[test]
fn referenced_entries_survive_invalidation_and_eviction() {
    let (cache, _backend) = stub_cache();
    let buf = (128 * PAGE_SIZE) as *mut u8;

    let handle = unsafe { cache.lookup(buf, PAGE_SIZE, RW) }.unwrap();
    assert_eq!(handle.refcount(), 1);

    cache.invalidate(buf, PAGE_SIZE);
    assert_eq!(cache.stats().current_entries, 1, "被引用条目不得被失效移除");

    cache.evict_unreferenced();
    assert_eq!(cache.stats().current_entries, 1, "被引用条目不得被驱逐");

    let clone = handle.clone();
    assert_eq!(clone.refcount(), 2, "克隆加一");
    drop(handle);
    assert_eq!(clone.refcount(), 1, "释放减一");
    drop(clone);

    cache.invalidate(buf, 1);
    let stats = cache.stats();
    assert_eq!(stats.current_entries, 0, "引用清零后重叠失效生效");
    assert_eq!(stats.evictions, 1);
}

/// 定律：`clear()` 之后的任何查询都是未命中。
#[test]
fn clear_resets_to_cold_state() {
    let (cache, _backend) = stub_cache();
    let buf = (32 * PAGE_SIZE) as *mut u8;

    let handle = unsafe { cache.lookup(buf, 64, RW) }.unwrap();
    drop(handle);
    let _ = unsafe { cache.lookup(buf, 64, RW) }.unwrap();
    assert_eq!(cache.stats().hits, 1);

    cache.clear();
    let stats = cache.stats();
    assert_eq!(stats, weft_core::CacheStats::default(), "clear 后统计归零");
    assert!(cache.is_empty());

    let _h = unsafe { cache.lookup(buf, 64, RW) }.unwrap();
    let stats = cache.stats();
    assert_eq!(stats.hits, 0, "clear 后首查必须未命中");
    assert_eq!(stats.misses, 1);
}

/// 注册失败：错误原样返回，缓存不落条目。
#[test]
fn registration_failure_leaves_no_entry() {
    let cache = MrCache::<Shm>::with_backend(Box::new(FailingRegistration::default()));
    let buf = (16 * PAGE_SIZE) as *mut u8;

    let err = unsafe { cache.lookup(buf, 64, RW) }.unwrap_err();
    assert_eq!(err.errc(), Errc::NoMemory);

    let stats = cache.stats();
    assert_eq!(stats.current_entries, 0, "失败不得插入条目");
    assert_eq!(stats.registrations, 0);
    assert_eq!(stats.misses, 1, "失败的查询仍计一次未命中");
    assert!(cache.is_empty());
}

/// 访问位不是子集时不命中：重叠范围会再注册一个条目。
#[test]
fn access_superset_required_for_hit() {
    let (cache, backend) = stub_cache();
    let buf = (256 * PAGE_SIZE) as *mut u8;

    let _rw = unsafe { cache.lookup(buf, PAGE_SIZE, RW) }.unwrap();
    // REMOTE_READ 不在 RW 内 ⇒ 未命中，按对齐范围另行注册。
    let _remote = unsafe { cache.lookup(buf, PAGE_SIZE, MrAccess::REMOTE_READ) }.unwrap();

    let stats = cache.stats();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.registrations, 2);
    assert_eq!(backend.registration_count(), 2);
}

/// 非对齐请求按页对齐注册：条目覆盖整页范围。
#[test]
fn unaligned_requests_round_to_pages() {
    let (cache, _backend) = stub_cache();
    let base = 512 * PAGE_SIZE;
    let addr = (base + 100) as *mut u8;

    let handle = unsafe { cache.lookup(addr, 2 * PAGE_SIZE, RW) }.unwrap();
    assert_eq!(handle.base_address() as usize, base, "基址向下对齐");
    assert_eq!(handle.len(), 3 * PAGE_SIZE, "长度覆盖 [100, 100 + 2 页) 的整页范围");
    assert_eq!(cache.stats().total_registered_bytes, 3 * PAGE_SIZE);
}

/// 并发命中路径：引用计数与统计量守恒。
#[test]
fn concurrent_lookups_keep_counts_consistent() {
    let (cache, backend) = stub_cache();
    let cache = Arc::new(cache);
    let buf = (1024 * PAGE_SIZE) as *mut u8;
    let buf_addr = buf as usize;

    // 预热条目，保证其余线程全部走命中路径。
    let warm = unsafe { cache.lookup(buf, PAGE_SIZE, RW) }.unwrap();

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..200 {
                    let handle = unsafe {
                        cache.lookup(buf_addr as *mut u8, PAGE_SIZE, MrAccess::READ)
                    }
                    .expect("命中路径不得失败");
                    assert!(handle.refcount() >= 1);
                }
            })
        })
        .collect();
    for t in threads {
        t.join().expect("查询线程不得崩溃");
    }

    let stats = cache.stats();
    assert_eq!(stats.hits, 8 * 200, "全部后续查询必须命中");
    assert_eq!(stats.registrations, 1, "后端只触达一次");
    assert_eq!(backend.registration_count(), 1);
    assert_eq!(warm.refcount(), 1, "瞬态句柄全部释放后只剩预热句柄");

    drop(warm);
    cache.evict_unreferenced();
    assert_eq!(cache.stats().current_entries, 0);
}
