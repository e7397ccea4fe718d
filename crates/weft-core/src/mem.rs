//! # mem 模块说明
//!
//! ## 角色定位（Why）
//! - 提交上下文这类小对象在热路径上高频分配，集群场景常希望把它们固定到
//!   NUMA 友好的内存池；本模块提供进程级的缺省内存源挂载点，
//!   上下文池的 slab 扩容经由它完成；
//! - 挂载点是显式全局状态：以原子指针承载 get/set，不作为任何 API 的
//!   隐藏参数。
//!
//! ## 契约（What）
//! - [`default_resource`] 永不返回空：未显式设置时回落到
//!   [`SystemResource`]（即全局分配器）；
//! - [`set_default_resource`] 要求 `&'static` 引用——内存源必须活过所有
//!   仍在使用它的分配；
//! - `allocate` 失败返回空指针，调用方据此映射为 `no_memory`。

use core::alloc::Layout;
use core::sync::atomic::{AtomicPtr, Ordering};

/// 原始内存源：以 `Layout` 为单位分配/释放。
///
/// # 安全契约
/// - `deallocate` 的指针与布局必须来自同一内存源上成对的 `allocate`；
/// - 实现必须线程安全（`Sync`），分配结果在释放前保持地址稳定。
pub trait MemoryResource: Send + Sync {
    /// 分配 `layout` 描述的内存块；失败返回空指针。
    fn allocate(&self, layout: Layout) -> *mut u8;

    /// 释放先前由 [`allocate`](Self::allocate) 返回的内存块。
    ///
    /// # Safety
    /// `ptr` 必须由同一内存源以相同 `layout` 分配且尚未释放。
    unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout);
}

/// 委托给全局分配器的缺省内存源。
pub struct SystemResource;

impl MemoryResource for SystemResource {
    fn allocate(&self, layout: Layout) -> *mut u8 {
        // Layout 尺寸为 0 时全局分配器未定义；上调为最小对齐块。
        let layout = if layout.size() == 0 {
            Layout::from_size_align(1, layout.align()).expect("align preserved")
        } else {
            layout
        };
        unsafe { std::alloc::alloc(layout) }
    }

    unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout) {
        let layout = if layout.size() == 0 {
            Layout::from_size_align(1, layout.align()).expect("align preserved")
        } else {
            layout
        };
        unsafe { std::alloc::dealloc(ptr, layout) }
    }
}

static SYSTEM_RESOURCE: SystemResource = SystemResource;

static DEFAULT_RESOURCE: AtomicPtr<&'static (dyn MemoryResource + 'static)> =
    AtomicPtr::new(core::ptr::null_mut());

/// 读取进程级缺省内存源；未设置时返回 [`SystemResource`]。
pub fn default_resource() -> &'static dyn MemoryResource {
    let slot = DEFAULT_RESOURCE.load(Ordering::Acquire);
    if slot.is_null() {
        &SYSTEM_RESOURCE
    } else {
        // 槽内存放的是由 set_default_resource 泄漏出的 'static 胖引用。
        unsafe { *slot }
    }
}

/// 设置进程级缺省内存源，返回先前的值（未设置过则为 `None`）。
///
/// 胖指针无法塞进单个原子字，这里把它装箱后泄漏为 `'static` 槽位；
/// 设置操作在进程生命周期内应当是有限次的配置动作而非热路径。
pub fn set_default_resource(
    resource: &'static dyn MemoryResource,
) -> Option<&'static dyn MemoryResource> {
    let slot = Box::leak(Box::new(resource)) as *mut &'static (dyn MemoryResource + 'static);
    let prev = DEFAULT_RESOURCE.swap(slot, Ordering::AcqRel);
    if prev.is_null() { None } else { Some(unsafe { *prev }) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicUsize;

    struct CountingResource {
        allocations: AtomicUsize,
    }

    impl MemoryResource for CountingResource {
        fn allocate(&self, layout: Layout) -> *mut u8 {
            self.allocations.fetch_add(1, Ordering::Relaxed);
            SystemResource.allocate(layout)
        }

        unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout) {
            unsafe { SystemResource.deallocate(ptr, layout) }
        }
    }

    #[test]
    fn system_resource_allocates_and_frees() {
        let layout = Layout::from_size_align(64, 8).unwrap();
        let ptr = SystemResource.allocate(layout);
        assert!(!ptr.is_null(), "常规小块分配不应失败");
        unsafe { SystemResource.deallocate(ptr, layout) };
    }

    #[test]
    fn default_resource_accessor_round_trips() {
        // 缺省值非空。
        let layout = Layout::from_size_align(16, 8).unwrap();
        let ptr = default_resource().allocate(layout);
        assert!(!ptr.is_null());
        unsafe { default_resource().deallocate(ptr, layout) };

        static COUNTING: CountingResource = CountingResource {
            allocations: AtomicUsize::new(0),
        };
        set_default_resource(&COUNTING);
        let ptr = default_resource().allocate(layout);
        assert!(!ptr.is_null());
        unsafe { default_resource().deallocate(ptr, layout) };
        assert!(
            COUNTING.allocations.load(Ordering::Relaxed) >= 1,
            "设置后分配必须经过新内存源"
        );
        // 还原，避免影响同进程其他测试。
        set_default_resource(&SystemResource);
    }
}
