//! # mr_cache 模块说明
//!
//! ## 角色定位（Why）
//! - 内存注册是钉页级别的昂贵操作，且注册配额是稀缺资源；缓存以页对齐
//!   区间为键复用注册，命中路径只增一次引用计数；
//! - 这是推荐的长生命周期注册入口：显式注册合法，但驱逐责任归调用方。
//!
//! ## 契约（What）
//! - 查询 `(addr, len, access)`：读锁扫描基址 ≤ `addr` 的条目，区间覆盖且
//!   访问位为请求超集即命中；未命中升级写锁、复查（并发填充窗口）、
//!   再按页对齐范围注册新条目；注册失败原样返回错误、不落条目；
//! - 失效 `(addr, len)`：写锁下删除所有重叠且引用数为零的条目，
//!   被引用条目保留到释放为止；
//! - 句柄是条目的引用计数借用：克隆加一、释放减一；任何持有句柄的条目
//!   不会被驱逐；
//! - 统计量与触发它的结构变更在同一把锁下更新，`hit_rate` 为派生值。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::domain::Domain;
use crate::error::Result;
use crate::mr::{HmemDevice, MemoryRegion, RemoteMemory};
use crate::provider::ProviderTraits;
use crate::types::{MrAccess, MrDescriptor, MrKey};

/// 缓存使用的页尺寸。
pub const PAGE_SIZE: usize = 4096;

/// 地址向下对齐到页边界。
pub const fn align_down(addr: usize) -> usize {
    addr & !(PAGE_SIZE - 1)
}

/// 地址向上对齐到页边界。
pub const fn align_up(addr: usize) -> usize {
    (addr + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// 覆盖 `[addr, addr + len)` 的页对齐长度。
pub const fn aligned_length(addr: usize, len: usize) -> usize {
    align_up(addr + len) - align_down(addr)
}

/// 注册后端：缓存经由它完成真实注册。
///
/// 生产路径是 domain（[`MrCache::new`]）；`test_stubs` 提供不触达 fabric
/// 的空实现供缓存逻辑测试使用。
pub trait RegisterBackend: Send + Sync {
    /// # Safety
    /// 同 [`MemoryRegion::register_host`]。
    unsafe fn register(&self, addr: *mut u8, len: usize, access: MrAccess)
    -> Result<MemoryRegion>;

    /// # Safety
    /// 同 [`MemoryRegion::register_dmabuf`]。
    unsafe fn register_dmabuf(
        &self,
        addr: *mut u8,
        len: usize,
        access: MrAccess,
        fd: i32,
        offset: u64,
    ) -> Result<MemoryRegion>;

    /// # Safety
    /// 同 [`MemoryRegion::register_hmem`]。
    unsafe fn register_hmem(
        &self,
        addr: *mut u8,
        len: usize,
        access: MrAccess,
        device: HmemDevice,
    ) -> Result<MemoryRegion>;
}

struct DomainBackend {
    domain: Domain,
}

impl RegisterBackend for DomainBackend {
    unsafe fn register(
        &self,
        addr: *mut u8,
        len: usize,
        access: MrAccess,
    ) -> Result<MemoryRegion> {
        unsafe { MemoryRegion::register_host(&self.domain, addr, len, access) }
    }

    unsafe fn register_dmabuf(
        &self,
        addr: *mut u8,
        len: usize,
        access: MrAccess,
        fd: i32,
        offset: u64,
    ) -> Result<MemoryRegion> {
        unsafe { MemoryRegion::register_dmabuf(&self.domain, addr, len, access, fd, offset) }
    }

    unsafe fn register_hmem(
        &self,
        addr: *mut u8,
        len: usize,
        access: MrAccess,
        device: HmemDevice,
    ) -> Result<MemoryRegion> {
        unsafe { MemoryRegion::register_hmem(&self.domain, addr, len, access, device) }
    }
}

struct CacheEntry {
    base: usize,
    len: usize,
    access: MrAccess,
    refcount: AtomicUsize,
    mr: MemoryRegion,
}

impl CacheEntry {
    fn contains(&self, addr: usize, len: usize) -> bool {
        addr >= self.base && addr + len <= self.base + self.len
    }

    fn overlaps(&self, addr: usize, len: usize) -> bool {
        addr < self.base + self.len && addr + len > self.base
    }
}

/// 缓存条目的引用计数借用。
///
/// 克隆加一、释放减一；减到零只是允许缓存回收该条目的信号，
/// 条目内存由 `Arc` 兜底，不存在悬垂。
pub struct MrHandle {
    entry: Arc<CacheEntry>,
}

impl std::fmt::Debug for MrHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MrHandle")
            .field("base", &self.entry.base)
            .field("len", &self.entry.len)
            .finish()
    }
}

impl MrHandle {
    fn attach(entry: &Arc<CacheEntry>) -> MrHandle {
        entry.refcount.fetch_add(1, Ordering::Relaxed);
        MrHandle {
            entry: Arc::clone(entry),
        }
    }

    /// 底层内存区域。
    pub fn mr(&self) -> &MemoryRegion {
        &self.entry.mr
    }

    /// 远端键。
    pub fn key(&self) -> MrKey {
        self.entry.mr.key()
    }

    /// 本地描述符。
    pub fn descriptor(&self) -> MrDescriptor {
        self.entry.mr.descriptor()
    }

    /// 条目基址（页对齐）。
    pub fn base_address(&self) -> *mut u8 {
        self.entry.base as *mut u8
    }

    /// 条目长度（页对齐）。
    pub fn len(&self) -> usize {
        self.entry.len
    }

    pub fn is_empty(&self) -> bool {
        self.entry.len == 0
    }

    /// 条目访问位。
    pub fn access(&self) -> MrAccess {
        self.entry.access
    }

    /// 当前引用计数（含本句柄）。
    pub fn refcount(&self) -> usize {
        self.entry.refcount.load(Ordering::Relaxed)
    }

    /// 远端内存视图。
    pub fn to_remote_memory(&self) -> RemoteMemory {
        RemoteMemory::from_mr(&self.entry.mr)
    }
}

impl Clone for MrHandle {
    fn clone(&self) -> Self {
        MrHandle::attach(&self.entry)
    }
}

impl Drop for MrHandle {
    fn drop(&mut self) {
        self.entry.refcount.fetch_sub(1, Ordering::AcqRel);
    }
}

/// 缓存统计快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub registrations: usize,
    pub evictions: usize,
    pub current_entries: usize,
    pub total_registered_bytes: usize,
}

#[derive(Default)]
struct StatsCells {
    hits: AtomicUsize,
    misses: AtomicUsize,
    registrations: AtomicUsize,
    evictions: AtomicUsize,
    current_entries: AtomicUsize,
    total_registered_bytes: AtomicUsize,
}

impl StatsCells {
    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            current_entries: self.current_entries.load(Ordering::Relaxed),
            total_registered_bytes: self.total_registered_bytes.load(Ordering::Relaxed),
        }
    }
}

/// 页对齐、引用计数的内存注册缓存。
pub struct MrCache<P: ProviderTraits> {
    backend: Box<dyn RegisterBackend>,
    entries: RwLock<BTreeMap<usize, Arc<CacheEntry>>>,
    stats: StatsCells,
    _provider: core::marker::PhantomData<P>,
}

impl<P: ProviderTraits> MrCache<P> {
    /// 以 domain 为注册后端创建缓存。
    pub fn new(domain: &Domain) -> Result<MrCache<P>> {
        let Some(inner) = domain.inner() else {
            return Err(crate::error::empty_object("mr_cache::new"));
        };
        Ok(Self::with_backend(Box::new(DomainBackend {
            domain: Domain::from_inner(Arc::clone(inner)),
        })))
    }

    /// 以自定义注册后端创建缓存（测试桩入口）。
    pub fn with_backend(backend: Box<dyn RegisterBackend>) -> MrCache<P> {
        MrCache {
            backend,
            entries: RwLock::new(BTreeMap::new()),
            stats: StatsCells::default(),
            _provider: core::marker::PhantomData,
        }
    }

    /// 查询或注册覆盖 `[addr, addr + len)` 的区域。
    ///
    /// # Safety
    /// 未命中路径会以页对齐范围注册内存，约束同
    /// [`MemoryRegion::register_host`]；调用方必须保证对齐后的整个范围
    /// 在句柄存续期内有效。
    pub unsafe fn lookup(&self, addr: *mut u8, len: usize, access: MrAccess) -> Result<MrHandle> {
        let uaddr = addr as usize;

        {
            let entries = self.entries.read();
            if let Some(entry) = find_existing(&entries, uaddr, len, access) {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(MrHandle::attach(entry));
            }
        }

        let mut entries = self.entries.write();

        // 写锁复查：读锁释放到写锁获得之间其他线程可能已注册同范围。
        if let Some(entry) = find_existing(&entries, uaddr, len, access) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(MrHandle::attach(entry));
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let base = align_down(uaddr);
        let total = aligned_length(uaddr, len);

        let mr = unsafe { self.backend.register(base as *mut u8, total, access)? };

        let entry = Arc::new(CacheEntry {
            base,
            len: total,
            access,
            refcount: AtomicUsize::new(0),
            mr,
        });
        let handle = MrHandle::attach(&entry);
        // 同基址再注册视为替换：旧条目计一次驱逐；在外句柄经 Arc 兜底仍然有效。
        if let Some(old) = entries.insert(base, entry) {
            self.stats
                .total_registered_bytes
                .fetch_sub(old.len, Ordering::Relaxed);
            self.stats.current_entries.fetch_sub(1, Ordering::Relaxed);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }

        self.stats.registrations.fetch_add(1, Ordering::Relaxed);
        self.stats.current_entries.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_registered_bytes
            .fetch_add(total, Ordering::Relaxed);

        Ok(handle)
    }

    /// 注册 DMA-buf 区域并建立条目（不经命中路径）。
    ///
    /// # Safety
    /// 同 [`MemoryRegion::register_dmabuf`]。
    pub unsafe fn lookup_dmabuf(
        &self,
        addr: *mut u8,
        len: usize,
        access: MrAccess,
        fd: i32,
        offset: u64,
    ) -> Result<MrHandle> {
        let uaddr = addr as usize;
        let mut entries = self.entries.write();

        let base = align_down(uaddr);
        let total = aligned_length(uaddr, len);

        let mr = unsafe {
            self.backend
                .register_dmabuf(base as *mut u8, total, access, fd, offset)?
        };

        let entry = Arc::new(CacheEntry {
            base,
            len: total,
            access,
            refcount: AtomicUsize::new(0),
            mr,
        });
        let handle = MrHandle::attach(&entry);
        // 同基址再注册视为替换：旧条目计一次驱逐；在外句柄经 Arc 兜底仍然有效。
        if let Some(old) = entries.insert(base, entry) {
            self.stats
                .total_registered_bytes
                .fetch_sub(old.len, Ordering::Relaxed);
            self.stats.current_entries.fetch_sub(1, Ordering::Relaxed);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }

        self.stats.registrations.fetch_add(1, Ordering::Relaxed);
        self.stats.current_entries.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_registered_bytes
            .fetch_add(total, Ordering::Relaxed);

        Ok(handle)
    }

    /// 注册异构内存区域并建立条目（不经命中路径）。
    ///
    /// # Safety
    /// 同 [`MemoryRegion::register_hmem`]。
    pub unsafe fn lookup_hmem(
        &self,
        addr: *mut u8,
        len: usize,
        access: MrAccess,
        device: HmemDevice,
    ) -> Result<MrHandle> {
        let uaddr = addr as usize;
        let mut entries = self.entries.write();

        let base = align_down(uaddr);
        let total = aligned_length(uaddr, len);

        let mr = unsafe {
            self.backend
                .register_hmem(base as *mut u8, total, access, device)?
        };

        let entry = Arc::new(CacheEntry {
            base,
            len: total,
            access,
            refcount: AtomicUsize::new(0),
            mr,
        });
        let handle = MrHandle::attach(&entry);
        // 同基址再注册视为替换：旧条目计一次驱逐；在外句柄经 Arc 兜底仍然有效。
        if let Some(old) = entries.insert(base, entry) {
            self.stats
                .total_registered_bytes
                .fetch_sub(old.len, Ordering::Relaxed);
            self.stats.current_entries.fetch_sub(1, Ordering::Relaxed);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }

        self.stats.registrations.fetch_add(1, Ordering::Relaxed);
        self.stats.current_entries.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_registered_bytes
            .fetch_add(total, Ordering::Relaxed);

        Ok(handle)
    }

    /// 失效与 `[addr, addr + len)` 重叠的零引用条目；被引用条目保留。
    pub fn invalidate(&self, addr: *mut u8, len: usize) {
        let uaddr = addr as usize;
        let mut entries = self.entries.write();
        entries.retain(|_, entry| {
            let evict =
                entry.overlaps(uaddr, len) && entry.refcount.load(Ordering::Acquire) == 0;
            if evict {
                self.stats
                    .total_registered_bytes
                    .fetch_sub(entry.len, Ordering::Relaxed);
                self.stats.current_entries.fetch_sub(1, Ordering::Relaxed);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
            !evict
        });
    }

    /// 驱逐所有零引用条目。
    pub fn evict_unreferenced(&self) {
        let mut entries = self.entries.write();
        entries.retain(|_, entry| {
            let evict = entry.refcount.load(Ordering::Acquire) == 0;
            if evict {
                self.stats
                    .total_registered_bytes
                    .fetch_sub(entry.len, Ordering::Relaxed);
                self.stats.current_entries.fetch_sub(1, Ordering::Relaxed);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
            !evict
        });
    }

    /// 清空缓存：驱逐零引用条目并重置统计量；被引用条目保留。
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.retain(|_, entry| entry.refcount.load(Ordering::Acquire) != 0);

        let mut remaining_bytes = 0;
        let remaining = entries.len();
        for entry in entries.values() {
            remaining_bytes += entry.len;
        }

        self.stats.hits.store(0, Ordering::Relaxed);
        self.stats.misses.store(0, Ordering::Relaxed);
        self.stats.registrations.store(0, Ordering::Relaxed);
        self.stats.evictions.store(0, Ordering::Relaxed);
        self.stats.current_entries.store(remaining, Ordering::Relaxed);
        self.stats
            .total_registered_bytes
            .store(remaining_bytes, Ordering::Relaxed);
    }

    /// 统计快照。
    pub fn stats(&self) -> CacheStats {
        let _guard = self.entries.read();
        self.stats.snapshot()
    }

    /// 条目数量。
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 命中率（派生值）。
    pub fn hit_rate(&self) -> f64 {
        let stats = self.stats();
        let total = stats.hits + stats.misses;
        if total == 0 {
            0.0
        } else {
            stats.hits as f64 / total as f64
        }
    }
}

fn find_existing<'a>(
    entries: &'a BTreeMap<usize, Arc<CacheEntry>>,
    addr: usize,
    len: usize,
    access: MrAccess,
) -> Option<&'a Arc<CacheEntry>> {
    // 候选条目的基址都不大于 addr；由近及远扫描，首个覆盖且访问位为
    // 超集的条目即命中。
    entries
        .range(..=addr)
        .rev()
        .map(|(_, entry)| entry)
        .find(|entry| entry.contains(addr, len) && entry.access.contains(access))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 页对齐边界：0、1、page-1、page、page+1。
    #[test]
    fn page_alignment_boundaries() {
        assert_eq!(align_down(0), 0);
        assert_eq!(align_down(1), 0);
        assert_eq!(align_down(PAGE_SIZE - 1), 0);
        assert_eq!(align_down(PAGE_SIZE), PAGE_SIZE);
        assert_eq!(align_down(PAGE_SIZE + 1), PAGE_SIZE);

        assert_eq!(align_up(0), 0);
        assert_eq!(align_up(1), PAGE_SIZE);
        assert_eq!(align_up(PAGE_SIZE - 1), PAGE_SIZE);
        assert_eq!(align_up(PAGE_SIZE), PAGE_SIZE);
        assert_eq!(align_up(PAGE_SIZE + 1), 2 * PAGE_SIZE);

        assert_eq!(aligned_length(0, 1), PAGE_SIZE);
        assert_eq!(aligned_length(100, 200), PAGE_SIZE);
        assert_eq!(aligned_length(PAGE_SIZE - 1, 2), 2 * PAGE_SIZE);
        assert_eq!(aligned_length(0, PAGE_SIZE), PAGE_SIZE);
    }

    #[test]
    fn entry_interval_predicates() {
        let entry = CacheEntry {
            base: PAGE_SIZE,
            len: PAGE_SIZE,
            access: MrAccess::READ,
            refcount: AtomicUsize::new(0),
            mr: MemoryRegion::default(),
        };
        assert!(entry.contains(PAGE_SIZE, PAGE_SIZE));
        assert!(entry.contains(PAGE_SIZE + 100, 200));
        assert!(!entry.contains(PAGE_SIZE, PAGE_SIZE + 1));
        // 区间端点互斥：相邻不算重叠。
        assert!(!entry.overlaps(0, PAGE_SIZE));
        assert!(!entry.overlaps(2 * PAGE_SIZE, PAGE_SIZE));
        assert!(entry.overlaps(PAGE_SIZE + PAGE_SIZE - 1, 2));
    }
}
