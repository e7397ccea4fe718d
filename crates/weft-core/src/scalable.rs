//! 可扩展端点：一个父端点暴露 N 个发送子上下文与 M 个接收子上下文，
//! 每个子上下文都可作为普通端点走绑定→使能流程；子上下文持有父的
//! 引用计数，父在所有子释放前保持存活。

use std::sync::Arc;

use weft_sys as sys;

use crate::av::AddressVector;
use crate::conv;
use crate::domain::{Domain, DomainInner};
use crate::endpoint::{Endpoint, EndpointInner};
use crate::error::{Errc, FabricError, Result, check, empty_object};
use crate::info::FabricInfo;
use crate::types::{AddressFormat, EndpointType};

pub(crate) struct SepInner {
    pub(crate) sep: *mut sys::fid_ep,
    tx_ctx_cnt: usize,
    rx_ctx_cnt: usize,
    ep_type: EndpointType,
    addr_format: AddressFormat,
    _domain: Arc<DomainInner>,
}

unsafe impl Send for SepInner {}
unsafe impl Sync for SepInner {}

impl Drop for SepInner {
    fn drop(&mut self) {
        if !self.sep.is_null() {
            let ret = unsafe { sys::fi_close(&raw mut (*self.sep).fid) };
            if ret != 0 {
                tracing::warn!(ret, "fi_close(sep) failed");
            }
            self.sep = core::ptr::null_mut();
        }
    }
}

/// 带独立收发子上下文的端点。
#[derive(Default)]
pub struct ScalableEndpoint {
    inner: Option<Arc<SepInner>>,
}

impl ScalableEndpoint {
    /// 在 domain 上创建可扩展端点，子上下文数量取自候选描述。
    pub fn create(domain: &Domain, info: &FabricInfo) -> Result<ScalableEndpoint> {
        let Some(domain_inner) = domain.inner() else {
            return Err(empty_object("sep::create"));
        };
        let info_ptr = info.as_raw();
        if info_ptr.is_null() {
            return Err(empty_object("sep::create"));
        }

        let mut sep: *mut sys::fid_ep = core::ptr::null_mut();
        let ret = unsafe {
            sys::fi_scalable_ep(domain_inner.domain, info_ptr, &mut sep, core::ptr::null_mut())
        };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_scalable_ep"));
        }

        let (tx_ctx_cnt, rx_ctx_cnt, ep_type) = unsafe {
            let ep_attr = (*info_ptr).ep_attr;
            if ep_attr.is_null() {
                (0, 0, EndpointType::Msg)
            } else {
                (
                    (*ep_attr).tx_ctx_cnt,
                    (*ep_attr).rx_ctx_cnt,
                    conv::from_fi_ep_type((*ep_attr).ep_type),
                )
            }
        };
        let addr_format = conv::from_fi_addr_format(unsafe { (*info_ptr).addr_format });

        Ok(ScalableEndpoint {
            inner: Some(Arc::new(SepInner {
                sep,
                tx_ctx_cnt,
                rx_ctx_cnt,
                ep_type,
                addr_format,
                _domain: Arc::clone(domain_inner),
            })),
        })
    }

    /// 取第 `index` 个发送子上下文；越界返回 `invalid_argument`。
    pub fn tx_context(&self, index: usize) -> Result<Endpoint> {
        let Some(inner) = self.inner.as_ref() else {
            return Err(empty_object("sep::tx_context"));
        };
        if index >= inner.tx_ctx_cnt {
            return Err(FabricError::new(Errc::InvalidArgument).with_context("sep::tx_context"));
        }

        let mut tx_ep: *mut sys::fid_ep = core::ptr::null_mut();
        let ret = unsafe {
            sys::fi_tx_context(
                inner.sep,
                index as i32,
                core::ptr::null_mut(),
                &mut tx_ep,
                core::ptr::null_mut(),
            )
        };
        check(ret as isize, "fi_tx_context")?;

        Ok(Endpoint::from_inner(Arc::new(EndpointInner {
            ep: tx_ep,
            ep_type: inner.ep_type,
            addr_format: inner.addr_format,
            _parent: Arc::clone(inner) as Arc<dyn core::any::Any + Send + Sync>,
        })))
    }

    /// 取第 `index` 个接收子上下文；越界返回 `invalid_argument`。
    pub fn rx_context(&self, index: usize) -> Result<Endpoint> {
        let Some(inner) = self.inner.as_ref() else {
            return Err(empty_object("sep::rx_context"));
        };
        if index >= inner.rx_ctx_cnt {
            return Err(FabricError::new(Errc::InvalidArgument).with_context("sep::rx_context"));
        }

        let mut rx_ep: *mut sys::fid_ep = core::ptr::null_mut();
        let ret = unsafe {
            sys::fi_rx_context(
                inner.sep,
                index as i32,
                core::ptr::null_mut(),
                &mut rx_ep,
                core::ptr::null_mut(),
            )
        };
        check(ret as isize, "fi_rx_context")?;

        Ok(Endpoint::from_inner(Arc::new(EndpointInner {
            ep: rx_ep,
            ep_type: inner.ep_type,
            addr_format: inner.addr_format,
            _parent: Arc::clone(inner) as Arc<dyn core::any::Any + Send + Sync>,
        })))
    }

    /// 绑定地址向量到父端点。
    pub fn bind_av(&self, av: &AddressVector, flags: u64) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("sep::bind_av"));
        };
        let Some(av_fid) = av.raw_fid() else {
            return Err(empty_object("sep::bind_av"));
        };
        check(
            unsafe { sys::fi_scalable_ep_bind(inner.sep, av_fid, flags) } as isize,
            "fi_scalable_ep_bind",
        )
    }

    /// 使能父端点（子上下文各自独立使能）。
    pub fn enable(&self) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("sep::enable"));
        };
        check(unsafe { sys::fi_enable(inner.sep) } as isize, "fi_enable")
    }

    /// 发送子上下文数量。
    pub fn tx_context_count(&self) -> usize {
        self.inner.as_deref().map(|i| i.tx_ctx_cnt).unwrap_or(0)
    }

    /// 接收子上下文数量。
    pub fn rx_context_count(&self) -> usize {
        self.inner.as_deref().map(|i| i.rx_ctx_cnt).unwrap_or(0)
    }

    /// 是否持有有效句柄。
    pub fn is_valid(&self) -> bool {
        self.inner.as_deref().is_some_and(|i| !i.sep.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scalable_endpoint_rejects_operations() {
        let sep = ScalableEndpoint::default();
        assert!(!sep.is_valid());
        assert_eq!(sep.tx_context_count(), 0);
        assert_eq!(sep.rx_context_count(), 0);
        assert_eq!(sep.tx_context(0).unwrap_err().errc(), Errc::InvalidArgument);
        assert_eq!(sep.rx_context(0).unwrap_err().errc(), Errc::InvalidArgument);
        assert_eq!(sep.enable().unwrap_err().errc(), Errc::InvalidArgument);
    }
}
