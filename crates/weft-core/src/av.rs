//! # av 模块说明
//!
//! ## 角色定位（Why）
//! - 无连接端点以紧凑句柄（`fi_addr_t`）寻址对端；地址向量负责把原始地址
//!   字节翻译为 provider 优化的句柄表；
//! - 批量插入的部分成功（返回数 < 请求数）与单条失败是两种不同结局，
//!   接口上显式区分。
//!
//! ## 契约（What）
//! - [`AvHandle::NOT_AVAILABLE`] 是保留哨兵，表示插入失败；
//! - `lookup`/`address_to_string` 只读，不修改表。

use std::sync::Arc;

use weft_sys as sys;

use crate::addr::Address;
use crate::conv;
use crate::domain::{Domain, DomainInner};
use crate::error::{Errc, FabricError, Result, check, empty_object};
use crate::types::{AddressFormat, AvType};

/// provider 颁发的紧凑对端句柄。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct AvHandle(u64);

impl AvHandle {
    /// 插入失败哨兵。
    pub const NOT_AVAILABLE: Self = Self(sys::FI_ADDR_NOTAVAIL);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// 是否为有效句柄。
    pub const fn is_valid(self) -> bool {
        self.0 != sys::FI_ADDR_NOTAVAIL
    }
}

impl Default for AvHandle {
    fn default() -> Self {
        Self::NOT_AVAILABLE
    }
}

impl From<AvHandle> for crate::types::FabricAddr {
    fn from(handle: AvHandle) -> Self {
        crate::types::FabricAddr::new(handle.get())
    }
}

/// 地址向量创建参数。
#[derive(Clone, Debug, Default)]
pub struct AddressVectorAttr {
    pub av_type: AvType,
    pub count: usize,
    pub rx_ctx_bits: u32,
    pub ep_per_node: usize,
    pub flags: u64,
    /// 解析返回地址时使用的格式。
    pub addr_format: AddressFormat,
}

struct AvInner {
    av: *mut sys::fid_av,
    av_type: AvType,
    addr_format: AddressFormat,
    addr_count: std::sync::atomic::AtomicUsize,
    _domain: Arc<DomainInner>,
}

unsafe impl Send for AvInner {}
unsafe impl Sync for AvInner {}

impl Drop for AvInner {
    fn drop(&mut self) {
        if !self.av.is_null() {
            let ret = unsafe { sys::fi_close(&raw mut (*self.av).fid) };
            if ret != 0 {
                tracing::warn!(ret, "fi_close(av) failed");
            }
            self.av = core::ptr::null_mut();
        }
    }
}

/// 对端地址到紧凑句柄的映射表。
#[derive(Default)]
pub struct AddressVector {
    inner: Option<Arc<AvInner>>,
}

impl AddressVector {
    /// 在 domain 上打开地址向量。
    pub fn create(domain: &Domain, attr: &AddressVectorAttr) -> Result<AddressVector> {
        let Some(domain_inner) = domain.inner() else {
            return Err(empty_object("av::create"));
        };

        let mut av_attr = sys::fi_av_attr {
            av_type: conv::to_fi_av_type(attr.av_type),
            rx_ctx_bits: attr.rx_ctx_bits as i32,
            count: attr.count,
            ep_per_node: attr.ep_per_node,
            name: core::ptr::null(),
            map_addr: core::ptr::null_mut(),
            flags: attr.flags,
        };

        let mut av: *mut sys::fid_av = core::ptr::null_mut();
        let ret = unsafe {
            sys::fi_av_open(domain_inner.domain, &mut av_attr, &mut av, core::ptr::null_mut())
        };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_av_open"));
        }

        Ok(AddressVector {
            inner: Some(Arc::new(AvInner {
                av,
                av_type: attr.av_type,
                addr_format: attr.addr_format,
                addr_count: std::sync::atomic::AtomicUsize::new(0),
                _domain: Arc::clone(domain_inner),
            })),
        })
    }

    /// 插入单个地址，返回紧凑句柄。
    pub fn insert(&self, addr: &Address, context: Option<*mut core::ffi::c_void>) -> Result<AvHandle> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("av::insert"));
        };

        let bytes = addr.to_raw_bytes();
        if bytes.is_empty() {
            return Err(FabricError::new(Errc::InvalidArgument).with_context("av::insert"));
        }

        let mut fi_addr: sys::fi_addr_t = sys::FI_ADDR_NOTAVAIL;
        let ret = unsafe {
            sys::fi_av_insert(
                inner.av,
                bytes.as_ptr().cast(),
                1,
                &mut fi_addr,
                0,
                context.unwrap_or(core::ptr::null_mut()),
            )
        };
        if ret < 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_av_insert"));
        }
        // 同步模式下返回成功插入的条数；0 表示该地址被拒绝。
        if ret == 0 {
            return Err(FabricError::new(Errc::InvalidArgument).with_context("fi_av_insert"));
        }

        inner
            .addr_count
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(AvHandle::new(fi_addr))
    }

    /// 批量插入；返回成功条数（可能小于请求数，失败槽位为
    /// [`AvHandle::NOT_AVAILABLE`]）。
    ///
    /// `contexts` 为每地址用户上下文数组：绑定事件队列的异步 AV 把它随
    /// 完成事件回传；留空表示不关联上下文。
    pub fn insert_batch(
        &self,
        addresses: &[Address],
        handles: &mut [AvHandle],
        contexts: &[*mut core::ffi::c_void],
    ) -> Result<usize> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("av::insert_batch"));
        };
        if addresses.is_empty() || handles.len() < addresses.len() {
            return Err(FabricError::new(Errc::InvalidArgument).with_context("av::insert_batch"));
        }

        // fi_av_insert 要求同格式地址的连续缓冲；逐条序列化后拼接。
        let first_len = addresses[0].to_raw_bytes().len();
        let mut buf = Vec::with_capacity(first_len * addresses.len());
        for addr in addresses {
            let bytes = addr.to_raw_bytes();
            if bytes.len() != first_len {
                return Err(
                    FabricError::new(Errc::InvalidArgument).with_context("av::insert_batch")
                );
            }
            buf.extend_from_slice(&bytes);
        }

        let mut fi_addrs = vec![sys::FI_ADDR_NOTAVAIL; addresses.len()];
        let context = if contexts.is_empty() {
            core::ptr::null_mut()
        } else {
            contexts.as_ptr().cast_mut().cast()
        };
        let ret = unsafe {
            sys::fi_av_insert(
                inner.av,
                buf.as_ptr().cast(),
                addresses.len(),
                fi_addrs.as_mut_ptr(),
                0,
                context,
            )
        };
        if ret < 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_av_insert"));
        }

        let count = ret as usize;
        for (slot, fi_addr) in handles.iter_mut().zip(fi_addrs.iter()) {
            *slot = AvHandle::new(*fi_addr);
        }
        inner
            .addr_count
            .fetch_add(count, std::sync::atomic::Ordering::Relaxed);
        Ok(count)
    }

    /// 移除单个句柄。
    pub fn remove(&self, handle: AvHandle) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("av::remove"));
        };
        if !handle.is_valid() {
            return Err(FabricError::new(Errc::InvalidArgument).with_context("av::remove"));
        }

        let mut fi_addr = handle.get();
        check(
            unsafe { sys::fi_av_remove(inner.av, &mut fi_addr, 1, 0) } as isize,
            "fi_av_remove",
        )?;
        inner
            .addr_count
            .fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }

    /// 批量移除；无效句柄被跳过。
    pub fn remove_batch(&self, handles: &[AvHandle]) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("av::remove_batch"));
        };
        if handles.is_empty() {
            return Ok(());
        }

        let mut fi_addrs: Vec<sys::fi_addr_t> = handles
            .iter()
            .filter(|h| h.is_valid())
            .map(|h| h.get())
            .collect();
        if fi_addrs.is_empty() {
            return Ok(());
        }

        check(
            unsafe { sys::fi_av_remove(inner.av, fi_addrs.as_mut_ptr(), fi_addrs.len(), 0) }
                as isize,
            "fi_av_remove",
        )?;
        inner
            .addr_count
            .fetch_sub(fi_addrs.len(), std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }

    /// 反查句柄对应的原始地址。
    pub fn lookup(&self, handle: AvHandle) -> Result<Address> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("av::lookup"));
        };
        if !handle.is_valid() {
            return Err(FabricError::new(Errc::InvalidArgument).with_context("av::lookup"));
        }

        let mut buf = [0u8; 256];
        let mut addrlen = buf.len();
        check(
            unsafe { sys::fi_av_lookup(inner.av, handle.get(), buf.as_mut_ptr().cast(), &mut addrlen) }
                as isize,
            "fi_av_lookup",
        )?;
        Ok(Address::from_raw(&buf[..addrlen.min(buf.len())], inner.addr_format))
    }

    /// 句柄地址的字符串形式（经 provider 的 straddr）。
    pub fn address_to_string(&self, handle: AvHandle) -> Result<String> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("av::address_to_string"));
        };
        if !handle.is_valid() {
            return Err(FabricError::new(Errc::InvalidArgument).with_context("av::address_to_string"));
        }

        let mut addr_buf = [0u8; 256];
        let mut addrlen = addr_buf.len();
        check(
            unsafe {
                sys::fi_av_lookup(inner.av, handle.get(), addr_buf.as_mut_ptr().cast(), &mut addrlen)
            } as isize,
            "fi_av_lookup",
        )?;

        let mut str_buf = [0i8; 256];
        let mut str_len = str_buf.len();
        let ptr = unsafe {
            sys::fi_av_straddr(
                inner.av,
                addr_buf.as_ptr().cast(),
                str_buf.as_mut_ptr().cast(),
                &mut str_len,
            )
        };
        if ptr.is_null() {
            return Err(FabricError::new(Errc::InvalidArgument).with_context("fi_av_straddr"));
        }
        Ok(unsafe { std::ffi::CStr::from_ptr(ptr) }
            .to_string_lossy()
            .into_owned())
    }

    /// 当前已插入的地址条数。
    pub fn count(&self) -> usize {
        self.inner
            .as_deref()
            .map(|i| i.addr_count.load(std::sync::atomic::Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// 表的组织形式。
    pub fn av_type(&self) -> AvType {
        self.inner
            .as_deref()
            .map(|i| i.av_type)
            .unwrap_or(AvType::Unspecified)
    }

    /// 是否持有有效句柄。
    pub fn is_valid(&self) -> bool {
        self.inner.as_deref().is_some_and(|i| !i.av.is_null())
    }

    pub(crate) fn raw_fid(&self) -> Option<*mut sys::fid> {
        self.inner
            .as_deref()
            .map(|i| unsafe { &raw mut (*i.av).fid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Ipv4Address;

    #[test]
    fn empty_av_rejects_operations() {
        let av = AddressVector::default();
        assert!(!av.is_valid());
        let addr = Address::Ipv4(Ipv4Address::new([127, 0, 0, 1], 1234));
        assert_eq!(av.insert(&addr, None).unwrap_err().errc(), Errc::InvalidArgument);

        let addresses = [addr, addr];
        let mut handles = [AvHandle::NOT_AVAILABLE; 2];
        let mut ctx_a = 1u32;
        let mut ctx_b = 2u32;
        let contexts: [*mut core::ffi::c_void; 2] =
            [(&raw mut ctx_a).cast(), (&raw mut ctx_b).cast()];
        assert_eq!(
            av.insert_batch(&addresses, &mut handles, &contexts)
                .unwrap_err()
                .errc(),
            Errc::InvalidArgument
        );

        assert_eq!(
            av.lookup(AvHandle::new(0)).unwrap_err().errc(),
            Errc::InvalidArgument
        );
        assert_eq!(av.count(), 0);
        assert_eq!(av.av_type(), AvType::Unspecified);
    }

    #[test]
    fn not_available_sentinel_is_invalid() {
        assert!(!AvHandle::NOT_AVAILABLE.is_valid());
        assert!(AvHandle::new(0).is_valid());
        assert_eq!(AvHandle::default(), AvHandle::NOT_AVAILABLE);
    }
}
