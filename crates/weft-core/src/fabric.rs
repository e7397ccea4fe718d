//! # fabric 模块说明
//!
//! ## 角色定位（Why）
//! - `Fabric` 是 provider 实例的进程级句柄，也是资源图的根：domain、事件队列、
//!   被动端点都挂在它之下；
//! - 子资源内部持有 `Arc<FabricInner>`，因此父句柄在最后一个子资源释放前
//!   不会被关闭——这正是“子保活父”的所有权图。
//!
//! ## 契约（What）
//! - 创建自一条已解析的 [`FabricInfo`](crate::info::FabricInfo)，创建后不可变；
//! - 默认构造得到空对象：一切操作返回 `invalid_argument`；
//! - drop 幂等关闭底层句柄，关闭失败仅记录告警，不阻塞析构。

use std::sync::Arc;

use weft_sys as sys;

use crate::error::{Errc, FabricError, Result, empty_object};
use crate::info::FabricInfo;
use crate::types::FabricVersion;

pub(crate) struct FabricInner {
    pub(crate) fabric: *mut sys::fid_fabric,
    pub(crate) name: String,
    pub(crate) provider_name: String,
    pub(crate) provider_version: u32,
}

// fabric 句柄允许多线程共享；并发约束由 provider 的 threading 模式声明。
unsafe impl Send for FabricInner {}
unsafe impl Sync for FabricInner {}

impl Drop for FabricInner {
    fn drop(&mut self) {
        if !self.fabric.is_null() {
            let ret = unsafe { sys::fi_close(&raw mut (*self.fabric).fid) };
            if ret != 0 {
                tracing::warn!(provider = %self.provider_name, ret, "fi_close(fabric) failed");
            }
            self.fabric = core::ptr::null_mut();
        }
    }
}

/// provider 实例的进程级句柄。
#[derive(Default)]
pub struct Fabric {
    inner: Option<Arc<FabricInner>>,
}

impl Fabric {
    /// 从已解析的 provider 描述创建 fabric。
    pub fn create(info: &FabricInfo) -> Result<Fabric> {
        let info_ptr = info.as_raw();
        if info_ptr.is_null() {
            return Err(empty_object("fabric::create"));
        }
        let fabric_attr = unsafe { (*info_ptr).fabric_attr };
        if fabric_attr.is_null() {
            return Err(FabricError::new(Errc::InvalidArgument).with_context("fabric::create"));
        }

        let mut fabric: *mut sys::fid_fabric = core::ptr::null_mut();
        let ret = unsafe { sys::fi_fabric(fabric_attr, &mut fabric, core::ptr::null_mut()) };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_fabric"));
        }

        let (name, provider_name, provider_version) = unsafe {
            (
                cstr_owned((*fabric_attr).name),
                cstr_owned((*fabric_attr).prov_name),
                (*fabric_attr).prov_version,
            )
        };
        tracing::debug!(%provider_name, provider_version, "fabric opened");

        Ok(Fabric {
            inner: Some(Arc::new(FabricInner {
                fabric,
                name,
                provider_name,
                provider_version,
            })),
        })
    }

    /// fabric 名称；空对象返回空串。
    pub fn name(&self) -> &str {
        self.inner.as_deref().map(|i| i.name.as_str()).unwrap_or("")
    }

    /// provider 名称；空对象返回空串。
    pub fn provider_name(&self) -> &str {
        self.inner
            .as_deref()
            .map(|i| i.provider_name.as_str())
            .unwrap_or("")
    }

    /// provider 版本；空对象返回 0。
    pub fn provider_version(&self) -> FabricVersion {
        FabricVersion::new(self.inner.as_deref().map(|i| i.provider_version).unwrap_or(0))
    }

    /// 是否持有有效句柄。
    pub fn is_valid(&self) -> bool {
        self.inner.as_deref().is_some_and(|i| !i.fabric.is_null())
    }

    pub(crate) fn inner(&self) -> Option<&Arc<FabricInner>> {
        self.inner.as_ref()
    }
}

fn cstr_owned(ptr: *const core::ffi::c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        unsafe { std::ffi::CStr::from_ptr(ptr) }
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 空对象契约：默认构造的 fabric 上所有访问器返回零值等价物。
    #[test]
    fn empty_fabric_reports_defaults() {
        let fabric = Fabric::default();
        assert!(!fabric.is_valid());
        assert_eq!(fabric.name(), "");
        assert_eq!(fabric.provider_name(), "");
        assert_eq!(fabric.provider_version().get(), 0);
    }
}
