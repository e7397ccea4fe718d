//! # mr 模块说明
//!
//! ## 角色定位（Why）
//! - 内存区域是 DMA 硬件可见内存的注册凭证：本地描述符用于提交，
//!   远端键随带外交换给对端供 RMA/原子操作寻址；
//! - 注册是昂贵且受配额限制的操作，长生命周期注册推荐经
//!   [`MrCache`](crate::mr_cache::MrCache) 摊销。
//!
//! ## 契约（What）
//! - 注册构造器是 `unsafe`：调用方必须保证缓冲区在区域存续期内有效且
//!   不被移动（注册即钉住）；
//! - drop 幂等注销；空对象上所有访问器返回零值等价物。

use std::sync::Arc;

use weft_sys as sys;

use crate::conv;
use crate::domain::{Domain, DomainInner};
use crate::endpoint::Endpoint;
use crate::error::{FabricError, Result, check, empty_object};
use crate::types::{MrAccess, MrDescriptor, MrKey, RmaAddr};

/// 异构内存接口类别。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HmemIface {
    /// 普通主机内存。
    #[default]
    System,
    Cuda,
    Rocr,
    Ze,
    Neuron,
    SynapseAi,
}

impl HmemIface {
    fn to_fi(self) -> u32 {
        match self {
            HmemIface::System => sys::FI_HMEM_SYSTEM,
            HmemIface::Cuda => sys::FI_HMEM_CUDA,
            HmemIface::Rocr => sys::FI_HMEM_ROCR,
            HmemIface::Ze => sys::FI_HMEM_ZE,
            HmemIface::Neuron => sys::FI_HMEM_NEURON,
            HmemIface::SynapseAi => sys::FI_HMEM_SYNAPSEAI,
        }
    }
}

/// 异构内存设备描述。
#[derive(Clone, Copy, Debug, Default)]
pub struct HmemDevice {
    pub iface: HmemIface,
    /// 设备侧标识（CUDA 设备号等）。
    pub device: u64,
    /// provider 专有数据。
    pub hmem_data: *mut core::ffi::c_void,
}

// hmem_data 是 provider 不透明指针，仅透传。
unsafe impl Send for HmemDevice {}
unsafe impl Sync for HmemDevice {}

/// 远端内存三元组：地址、键、长度。带外交换给对端使用。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemoteMemory {
    pub addr: RmaAddr,
    pub key: MrKey,
    pub len: usize,
}

impl RemoteMemory {
    pub const fn new(addr: RmaAddr, key: MrKey, len: usize) -> Self {
        Self { addr, key, len }
    }

    /// 从已注册区域构造远端视图。
    pub fn from_mr(mr: &MemoryRegion) -> RemoteMemory {
        RemoteMemory {
            addr: RmaAddr::new(mr.address() as u64),
            key: mr.key(),
            len: mr.len(),
        }
    }
}

struct MrInner {
    mr: *mut sys::fid_mr,
    addr: *mut u8,
    len: usize,
    _domain: Arc<DomainInner>,
}

unsafe impl Send for MrInner {}
unsafe impl Sync for MrInner {}

impl Drop for MrInner {
    fn drop(&mut self) {
        if !self.mr.is_null() {
            let ret = unsafe { sys::fi_close(&raw mut (*self.mr).fid) };
            if ret != 0 {
                tracing::warn!(ret, "fi_close(mr) failed");
            }
            self.mr = core::ptr::null_mut();
        }
    }
}

/// 已向 domain 注册的进程内存段。
#[derive(Default)]
pub struct MemoryRegion {
    inner: Option<Arc<MrInner>>,
}

impl MemoryRegion {
    /// 注册主机内存。
    ///
    /// # Safety
    /// `[addr, addr + len)` 必须在区域存续期内保持有效且地址稳定；
    /// 注册成功即视为钉住，期间缓冲区不得释放或重映射。
    pub unsafe fn register_host(
        domain: &Domain,
        addr: *mut u8,
        len: usize,
        access: MrAccess,
    ) -> Result<MemoryRegion> {
        let Some(domain_inner) = domain.inner() else {
            return Err(empty_object("mr::register_host"));
        };

        let mut mr: *mut sys::fid_mr = core::ptr::null_mut();
        let ret = unsafe {
            sys::fi_mr_reg(
                domain_inner.domain,
                addr.cast(),
                len,
                conv::to_fi_mr_access(access),
                0,
                0,
                0,
                &mut mr,
                core::ptr::null_mut(),
            )
        };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_mr_reg"));
        }
        tracing::trace!(?addr, len, "memory region registered");

        Ok(MemoryRegion {
            inner: Some(Arc::new(MrInner {
                mr,
                addr,
                len,
                _domain: Arc::clone(domain_inner),
            })),
        })
    }

    /// 注册 DMA-buf（文件描述符 + 偏移）。
    ///
    /// # Safety
    /// 同 [`register_host`](Self::register_host)；另外 `fd` 必须是有效的
    /// DMA-buf 描述符且在区域存续期内保持打开。
    pub unsafe fn register_dmabuf(
        domain: &Domain,
        addr: *mut u8,
        len: usize,
        access: MrAccess,
        fd: i32,
        offset: u64,
    ) -> Result<MemoryRegion> {
        let Some(domain_inner) = domain.inner() else {
            return Err(empty_object("mr::register_dmabuf"));
        };

        let dmabuf = sys::fi_mr_dmabuf {
            fd,
            offset,
            len,
            base_addr: addr.cast(),
        };

        let mut attr: sys::fi_mr_attr = unsafe { core::mem::zeroed() };
        // mr_iov 与 dmabuf 在 C 侧共用一个 union 槽位。
        attr.mr_iov = (&raw const dmabuf).cast();
        attr.iov_count = 1;
        attr.access = conv::to_fi_mr_access(access);

        let mut mr: *mut sys::fid_mr = core::ptr::null_mut();
        let ret = unsafe {
            sys::fi_mr_regattr(domain_inner.domain, &attr, sys::FI_MR_DMABUF, &mut mr)
        };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_mr_regattr"));
        }

        Ok(MemoryRegion {
            inner: Some(Arc::new(MrInner {
                mr,
                addr,
                len,
                _domain: Arc::clone(domain_inner),
            })),
        })
    }

    /// 注册异构内存（设备显存等）。
    ///
    /// # Safety
    /// 同 [`register_host`](Self::register_host)；`device` 描述必须与
    /// 实际内存归属一致。
    pub unsafe fn register_hmem(
        domain: &Domain,
        addr: *mut u8,
        len: usize,
        access: MrAccess,
        device: HmemDevice,
    ) -> Result<MemoryRegion> {
        let Some(domain_inner) = domain.inner() else {
            return Err(empty_object("mr::register_hmem"));
        };

        let iov = libc::iovec {
            iov_base: addr.cast(),
            iov_len: len,
        };

        let mut attr: sys::fi_mr_attr = unsafe { core::mem::zeroed() };
        attr.mr_iov = &iov;
        attr.iov_count = 1;
        attr.access = conv::to_fi_mr_access(access);
        attr.iface = device.iface.to_fi();
        attr.device = device.device;
        attr.hmem_data = device.hmem_data;

        let mut mr: *mut sys::fid_mr = core::ptr::null_mut();
        let ret = unsafe { sys::fi_mr_regattr(domain_inner.domain, &attr, 0, &mut mr) };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_mr_regattr"));
        }

        Ok(MemoryRegion {
            inner: Some(Arc::new(MrInner {
                mr,
                addr,
                len,
                _domain: Arc::clone(domain_inner),
            })),
        })
    }

    /// 本地描述符；空对象返回空描述符。
    pub fn descriptor(&self) -> MrDescriptor {
        self.inner
            .as_deref()
            .filter(|i| !i.mr.is_null())
            .map(|i| MrDescriptor::from_raw(unsafe { sys::fi_mr_desc(i.mr) }))
            .unwrap_or_default()
    }

    /// 远端键；空对象返回 0。
    pub fn key(&self) -> MrKey {
        MrKey::new(
            self.inner
                .as_deref()
                .filter(|i| !i.mr.is_null())
                .map(|i| unsafe { sys::fi_mr_key(i.mr) })
                .unwrap_or(0),
        )
    }

    /// 注册基址；空对象返回空指针。
    pub fn address(&self) -> *mut u8 {
        self.inner
            .as_deref()
            .map(|i| i.addr)
            .unwrap_or(core::ptr::null_mut())
    }

    /// 注册长度。
    pub fn len(&self) -> usize {
        self.inner.as_deref().map(|i| i.len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 绑定到端点（`FI_MR_ENDPOINT` 模式的 provider 要求）。
    pub fn bind(&self, ep: &Endpoint) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("mr::bind"));
        };
        let Some(ep_fid) = ep.raw_fid() else {
            return Err(empty_object("mr::bind"));
        };
        check(
            unsafe { sys::fi_mr_bind(inner.mr, ep_fid, 0) } as isize,
            "fi_mr_bind",
        )
    }

    /// 显式激活（`FI_MR_ENDPOINT`/`FI_MR_RMA_EVENT` 模式要求）。
    pub fn enable(&self) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("mr::enable"));
        };
        check(unsafe { sys::fi_mr_enable(inner.mr) } as isize, "fi_mr_enable")
    }

    /// 刷新注册（页迁移后重新钉住）。
    pub fn refresh(&self) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("mr::refresh"));
        };
        check(
            unsafe { sys::fi_mr_refresh(inner.mr, core::ptr::null(), 0, 0) } as isize,
            "fi_mr_refresh",
        )
    }

    /// 是否持有有效注册。
    pub fn is_valid(&self) -> bool {
        self.inner.as_deref().is_some_and(|i| !i.mr.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mr_reports_defaults() {
        let mr = MemoryRegion::default();
        assert!(!mr.is_valid());
        assert!(mr.descriptor().is_null());
        assert_eq!(mr.key().get(), 0);
        assert!(mr.address().is_null());
        assert_eq!(mr.len(), 0);
        assert_eq!(mr.enable().unwrap_err().errc(), crate::error::Errc::InvalidArgument);
        assert_eq!(mr.refresh().unwrap_err().errc(), crate::error::Errc::InvalidArgument);
    }

    #[test]
    fn remote_memory_from_empty_mr_is_zeroed() {
        let remote = RemoteMemory::from_mr(&MemoryRegion::default());
        assert_eq!(remote.addr.get(), 0);
        assert_eq!(remote.key.get(), 0);
        assert_eq!(remote.len, 0);
    }
}
