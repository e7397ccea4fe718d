//! # domain 模块说明
//!
//! ## 角色定位（Why）
//! - domain 是 fabric 内的资源保护域：端点、内存区域、完成队列、计数器、
//!   地址向量与共享上下文都以它为父；
//! - 创建时从 `fi_info` 记录固化线程模型与控制/数据面进度模式，
//!   完成队列据此决定阻塞等待是否可用。
//!
//! ## 契约（What）
//! - `DomainInner` 持有 `Arc<FabricInner>`，保证父 fabric 活到最后一个
//!   子资源释放之后；
//! - 默认构造得到空对象：一切操作返回 `invalid_argument`。

use std::sync::Arc;

use weft_sys as sys;

use crate::conv;
use crate::error::{FabricError, Result, empty_object};
use crate::eq::EventQueue;
use crate::fabric::{Fabric, FabricInner};
use crate::info::FabricInfo;
use crate::types::{ProgressMode, ThreadingMode};

/// domain 固化的进度策略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgressPolicy {
    pub control: ProgressMode,
    pub data: ProgressMode,
}

impl ProgressPolicy {
    pub const fn new(control: ProgressMode, data: ProgressMode) -> Self {
        Self { control, data }
    }

    /// 数据面是否需要调用方轮询推进。
    pub const fn requires_manual_data_progress(&self) -> bool {
        !matches!(self.data, ProgressMode::Auto)
    }

    /// 控制面是否需要调用方轮询推进。
    pub const fn requires_manual_control_progress(&self) -> bool {
        !matches!(self.control, ProgressMode::Auto)
    }

    /// 阻塞等待只在数据面自动推进时才有意义。
    pub const fn supports_blocking_wait(&self) -> bool {
        matches!(self.data, ProgressMode::Auto)
    }
}

pub(crate) struct DomainInner {
    pub(crate) domain: *mut sys::fid_domain,
    pub(crate) threading: ThreadingMode,
    pub(crate) policy: ProgressPolicy,
    // 子保活父：最后一个子资源释放前 fabric 不关闭。
    pub(crate) _fabric: Arc<FabricInner>,
}

unsafe impl Send for DomainInner {}
unsafe impl Sync for DomainInner {}

impl Drop for DomainInner {
    fn drop(&mut self) {
        if !self.domain.is_null() {
            let ret = unsafe { sys::fi_close(&raw mut (*self.domain).fid) };
            if ret != 0 {
                tracing::warn!(ret, "fi_close(domain) failed");
            }
            self.domain = core::ptr::null_mut();
        }
    }
}

/// fabric 内的资源保护域。
#[derive(Default)]
pub struct Domain {
    inner: Option<Arc<DomainInner>>,
}

impl Domain {
    /// 在 fabric 上打开 domain。
    pub fn create(fabric: &Fabric, info: &FabricInfo) -> Result<Domain> {
        let Some(fabric_inner) = fabric.inner() else {
            return Err(empty_object("domain::create"));
        };
        let info_ptr = info.as_raw();
        if info_ptr.is_null() {
            return Err(empty_object("domain::create"));
        }

        let mut domain: *mut sys::fid_domain = core::ptr::null_mut();
        let ret = unsafe {
            sys::fi_domain(fabric_inner.fabric, info_ptr, &mut domain, core::ptr::null_mut())
        };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_domain"));
        }

        let mut threading = ThreadingMode::Unspecified;
        let mut policy = ProgressPolicy::default();
        let domain_attr = unsafe { (*info_ptr).domain_attr };
        if !domain_attr.is_null() {
            unsafe {
                threading = conv::from_fi_threading((*domain_attr).threading);
                policy = ProgressPolicy::new(
                    conv::from_fi_progress((*domain_attr).control_progress),
                    conv::from_fi_progress((*domain_attr).data_progress),
                );
            }
        }
        tracing::debug!(?threading, ?policy, "domain opened");

        Ok(Domain {
            inner: Some(Arc::new(DomainInner {
                domain,
                threading,
                policy,
                _fabric: Arc::clone(fabric_inner),
            })),
        })
    }

    /// domain 的线程模型。
    pub fn threading(&self) -> ThreadingMode {
        self.inner
            .as_deref()
            .map(|i| i.threading)
            .unwrap_or(ThreadingMode::Unspecified)
    }

    /// 控制面进度模式。
    pub fn control_progress(&self) -> ProgressMode {
        self.inner
            .as_deref()
            .map(|i| i.policy.control)
            .unwrap_or(ProgressMode::Unspecified)
    }

    /// 数据面进度模式。
    pub fn data_progress(&self) -> ProgressMode {
        self.inner
            .as_deref()
            .map(|i| i.policy.data)
            .unwrap_or(ProgressMode::Unspecified)
    }

    /// 完整进度策略。
    pub fn progress_policy(&self) -> ProgressPolicy {
        self.inner.as_deref().map(|i| i.policy).unwrap_or_default()
    }

    /// 把事件队列绑定到 domain（MR 完成事件等控制事件经此上报）。
    pub fn bind_eq(&self, eq: &EventQueue, flags: u64) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("domain::bind_eq"));
        };
        let Some(eq_fid) = eq.raw_fid() else {
            return Err(empty_object("domain::bind_eq"));
        };
        let ret = unsafe { sys::fi_domain_bind(inner.domain, eq_fid, flags) };
        crate::error::check(ret as isize, "fi_domain_bind")
    }

    /// 是否持有有效句柄。
    pub fn is_valid(&self) -> bool {
        self.inner.as_deref().is_some_and(|i| !i.domain.is_null())
    }

    pub(crate) fn inner(&self) -> Option<&Arc<DomainInner>> {
        self.inner.as_ref()
    }

    pub(crate) fn from_inner(inner: Arc<DomainInner>) -> Domain {
        Domain { inner: Some(inner) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_domain_reports_defaults() {
        let domain = Domain::default();
        assert!(!domain.is_valid());
        assert_eq!(domain.threading(), ThreadingMode::Unspecified);
        assert_eq!(domain.control_progress(), ProgressMode::Unspecified);
        assert_eq!(domain.progress_policy(), ProgressPolicy::default());
    }

    /// 阻塞等待仅在数据面自动推进时可用。
    #[test]
    fn blocking_wait_requires_auto_data_progress() {
        let auto = ProgressPolicy::new(ProgressMode::Auto, ProgressMode::Auto);
        assert!(auto.supports_blocking_wait());
        assert!(!auto.requires_manual_data_progress());

        let manual = ProgressPolicy::new(ProgressMode::Manual, ProgressMode::Manual);
        assert!(!manual.supports_blocking_wait());
        assert!(manual.requires_manual_data_progress());
        assert!(manual.requires_manual_control_progress());

        let unspecified = ProgressPolicy::default();
        assert!(!unspecified.supports_blocking_wait(), "未声明时保守处理");
    }
}
