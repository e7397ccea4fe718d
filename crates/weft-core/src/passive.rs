//! 被动端点：面向连接端点类型的监听侧句柄。
//!
//! 连接请求以 [`EventKind::ConnectionRequest`](crate::eq::EventKind) 事件
//! 出现在绑定的事件队列上；`reject` 以事件携带的 fid 句柄拒绝请求。

use std::sync::Arc;

use weft_sys as sys;

use crate::addr::Address;
use crate::conv;
use crate::eq::EventQueue;
use crate::error::{FabricError, Result, check, empty_object};
use crate::fabric::{Fabric, FabricInner};
use crate::info::FabricInfo;
use crate::types::{AddressFormat, ContextPtr};

struct PepInner {
    pep: *mut sys::fid_pep,
    addr_format: AddressFormat,
    _fabric: Arc<FabricInner>,
}

unsafe impl Send for PepInner {}
unsafe impl Sync for PepInner {}

impl Drop for PepInner {
    fn drop(&mut self) {
        if !self.pep.is_null() {
            let ret = unsafe { sys::fi_close(&raw mut (*self.pep).fid) };
            if ret != 0 {
                tracing::warn!(ret, "fi_close(pep) failed");
            }
            self.pep = core::ptr::null_mut();
        }
    }
}

/// 监听侧端点。
#[derive(Default)]
pub struct PassiveEndpoint {
    inner: Option<Arc<PepInner>>,
}

impl PassiveEndpoint {
    /// 在 fabric 上创建被动端点。
    pub fn create(fabric: &Fabric, info: &FabricInfo) -> Result<PassiveEndpoint> {
        let Some(fabric_inner) = fabric.inner() else {
            return Err(empty_object("pep::create"));
        };
        let info_ptr = info.as_raw();
        if info_ptr.is_null() {
            return Err(empty_object("pep::create"));
        }

        let mut pep: *mut sys::fid_pep = core::ptr::null_mut();
        let ret = unsafe {
            sys::fi_passive_ep(fabric_inner.fabric, info_ptr, &mut pep, core::ptr::null_mut())
        };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_passive_ep"));
        }

        let addr_format = conv::from_fi_addr_format(unsafe { (*info_ptr).addr_format });

        Ok(PassiveEndpoint {
            inner: Some(Arc::new(PepInner {
                pep,
                addr_format,
                _fabric: Arc::clone(fabric_inner),
            })),
        })
    }

    /// 绑定事件队列；连接请求经此上报。
    pub fn bind_eq(&self, eq: &EventQueue, flags: u64) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("pep::bind_eq"));
        };
        let Some(eq_fid) = eq.raw_fid() else {
            return Err(empty_object("pep::bind_eq"));
        };
        check(
            unsafe { sys::fi_pep_bind(inner.pep, eq_fid, flags) } as isize,
            "fi_pep_bind",
        )
    }

    /// 开始监听入站连接。
    pub fn listen(&self) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("pep::listen"));
        };
        check(unsafe { sys::fi_listen(inner.pep) } as isize, "fi_listen")
    }

    /// 拒绝连接请求（`handle` 为请求事件携带的 fid）。
    pub fn reject(&self, handle: ContextPtr) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("pep::reject"));
        };
        if handle.is_null() {
            return Err(empty_object("pep::reject"));
        }
        check(
            unsafe { sys::fi_reject(inner.pep, handle.as_ptr().cast(), core::ptr::null(), 0) }
                as isize,
            "fi_reject",
        )
    }

    /// 读取监听地址。
    pub fn local_address(&self) -> Result<Address> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("pep::local_address"));
        };
        let mut buf = [0u8; 256];
        let mut len = buf.len();
        let ret = unsafe {
            sys::fi_getname(&raw mut (*inner.pep).fid, buf.as_mut_ptr().cast(), &mut len)
        };
        check(ret as isize, "fi_getname")?;
        Ok(Address::from_raw(&buf[..len.min(buf.len())], inner.addr_format))
    }

    /// 是否持有有效句柄。
    pub fn is_valid(&self) -> bool {
        self.inner.as_deref().is_some_and(|i| !i.pep.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Errc;

    #[test]
    fn empty_passive_endpoint_rejects_operations() {
        let pep = PassiveEndpoint::default();
        assert!(!pep.is_valid());
        assert_eq!(pep.listen().unwrap_err().errc(), Errc::InvalidArgument);
        assert_eq!(pep.reject(ContextPtr::null()).unwrap_err().errc(), Errc::InvalidArgument);
        assert_eq!(pep.local_address().unwrap_err().errc(), Errc::InvalidArgument);
    }
}
