//! 共享发送/接收上下文：多个端点绑定同一队列容量时使用。
//!
//! 共享 RX 上下文在 libfabric 中以端点句柄表示，因此可以直接绑定完成队列
//! 与计数器；共享 TX 上下文只是容量凭证，绑定动作发生在端点一侧。

use std::sync::Arc;

use weft_sys as sys;

use crate::conv;
use crate::counter::Counter;
use crate::cq::CompletionQueue;
use crate::domain::{Domain, DomainInner};
use crate::error::{FabricError, Result, check, empty_object};
use crate::info::FabricInfo;
use crate::types::CqBindFlags;

struct StxInner {
    stx: *mut sys::fid_stx,
    _domain: Arc<DomainInner>,
}

unsafe impl Send for StxInner {}
unsafe impl Sync for StxInner {}

impl Drop for StxInner {
    fn drop(&mut self) {
        if !self.stx.is_null() {
            let ret = unsafe { sys::fi_close(&raw mut (*self.stx).fid) };
            if ret != 0 {
                tracing::warn!(ret, "fi_close(stx) failed");
            }
            self.stx = core::ptr::null_mut();
        }
    }
}

/// 可被多个端点共享的发送上下文。
#[derive(Default)]
pub struct SharedTxContext {
    inner: Option<Arc<StxInner>>,
}

impl SharedTxContext {
    /// 按候选描述的发送属性打开共享发送上下文。
    pub fn create(domain: &Domain, info: &FabricInfo) -> Result<SharedTxContext> {
        let Some(domain_inner) = domain.inner() else {
            return Err(empty_object("stx::create"));
        };
        let info_ptr = info.as_raw();
        if info_ptr.is_null() {
            return Err(empty_object("stx::create"));
        }

        let mut stx: *mut sys::fid_stx = core::ptr::null_mut();
        let ret = unsafe {
            sys::fi_stx_context(
                domain_inner.domain,
                (*info_ptr).tx_attr,
                &mut stx,
                core::ptr::null_mut(),
            )
        };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_stx_context"));
        }

        Ok(SharedTxContext {
            inner: Some(Arc::new(StxInner {
                stx,
                _domain: Arc::clone(domain_inner),
            })),
        })
    }

    /// 是否持有有效句柄。
    pub fn is_valid(&self) -> bool {
        self.inner.as_deref().is_some_and(|i| !i.stx.is_null())
    }

    pub(crate) fn raw_fid(&self) -> Option<*mut sys::fid> {
        self.inner
            .as_deref()
            .map(|i| unsafe { &raw mut (*i.stx).fid })
    }
}

struct SrxInner {
    srx: *mut sys::fid_ep,
    _domain: Arc<DomainInner>,
}

unsafe impl Send for SrxInner {}
unsafe impl Sync for SrxInner {}

impl Drop for SrxInner {
    fn drop(&mut self) {
        if !self.srx.is_null() {
            let ret = unsafe { sys::fi_close(&raw mut (*self.srx).fid) };
            if ret != 0 {
                tracing::warn!(ret, "fi_close(srx) failed");
            }
            self.srx = core::ptr::null_mut();
        }
    }
}

/// 可被多个端点共享的接收上下文。
#[derive(Default)]
pub struct SharedRxContext {
    inner: Option<Arc<SrxInner>>,
}

impl SharedRxContext {
    /// 按候选描述的接收属性打开共享接收上下文。
    pub fn create(domain: &Domain, info: &FabricInfo) -> Result<SharedRxContext> {
        let Some(domain_inner) = domain.inner() else {
            return Err(empty_object("srx::create"));
        };
        let info_ptr = info.as_raw();
        if info_ptr.is_null() {
            return Err(empty_object("srx::create"));
        }

        let mut srx: *mut sys::fid_ep = core::ptr::null_mut();
        let ret = unsafe {
            sys::fi_srx_context(
                domain_inner.domain,
                (*info_ptr).rx_attr,
                &mut srx,
                core::ptr::null_mut(),
            )
        };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_srx_context"));
        }

        Ok(SharedRxContext {
            inner: Some(Arc::new(SrxInner {
                srx,
                _domain: Arc::clone(domain_inner),
            })),
        })
    }

    /// 绑定完成队列到共享接收上下文。
    pub fn bind_cq(&self, cq: &CompletionQueue, flags: CqBindFlags) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("srx::bind_cq"));
        };
        let Some(cq_fid) = cq.raw_fid() else {
            return Err(empty_object("srx::bind_cq"));
        };
        check(
            unsafe { sys::fi_ep_bind(inner.srx, cq_fid, conv::to_fi_cq_bind_flags(flags)) }
                as isize,
            "fi_ep_bind",
        )
    }

    /// 绑定计数器到共享接收上下文。
    pub fn bind_counter(&self, counter: &Counter, flags: u64) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("srx::bind_counter"));
        };
        let Some(cntr_fid) = counter.raw_fid() else {
            return Err(empty_object("srx::bind_counter"));
        };
        check(
            unsafe { sys::fi_ep_bind(inner.srx, cntr_fid, flags) } as isize,
            "fi_ep_bind",
        )
    }

    /// 是否持有有效句柄。
    pub fn is_valid(&self) -> bool {
        self.inner.as_deref().is_some_and(|i| !i.srx.is_null())
    }

    pub(crate) fn raw_fid(&self) -> Option<*mut sys::fid> {
        self.inner
            .as_deref()
            .map(|i| unsafe { &raw mut (*i.srx).fid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Errc;

    #[test]
    fn empty_shared_contexts_reject_operations() {
        let stx = SharedTxContext::default();
        assert!(!stx.is_valid());

        let srx = SharedRxContext::default();
        assert!(!srx.is_valid());
        let cq = CompletionQueue::default();
        assert_eq!(
            srx.bind_cq(&cq, CqBindFlags::RECV).unwrap_err().errc(),
            Errc::InvalidArgument
        );
        let cntr = Counter::default();
        assert_eq!(srx.bind_counter(&cntr, 0).unwrap_err().errc(), Errc::InvalidArgument);
    }
}
