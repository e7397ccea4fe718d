//! # counter 模块说明
//!
//! ## 角色定位（Why）
//! - 计数器是完成计数与触发条件的载体：绑定到端点后随操作完成单调递增，
//!   触发式提交以“计数器跨过阈值”为点火条件；
//! - 错误计数独立于主值，读取不消费。
//!
//! ## 契约（What）
//! - `read`/`add` 允许任意线程并发调用；
//! - `wait(threshold, timeout)` 只在创建时带等待对象时可用，阈值由调用方给出；
//! - `ack(count)` 以负增量实现扣减，与底层 `fi_cntr_add` 的回绕语义一致。

use std::sync::Arc;
use std::time::Duration;

use weft_sys as sys;

use crate::cq::timeout_to_ms;
use crate::domain::{Domain, DomainInner};
use crate::error::{Errc, FabricError, Result, check, empty_object};

/// 计数器创建参数。
#[derive(Clone, Copy, Debug)]
pub struct CounterAttr {
    /// 初始值；非零时创建后立即 `set`。
    pub initial: u64,
    /// 透传给 provider 的原始标志。
    pub flags: u64,
    /// 是否创建等待对象（阻塞 `wait` 的前提）。
    pub wait_obj: bool,
}

impl Default for CounterAttr {
    fn default() -> Self {
        Self {
            initial: 0,
            flags: 0,
            wait_obj: true,
        }
    }
}

struct CounterInner {
    cntr: *mut sys::fid_cntr,
    wait_obj: bool,
    _domain: Arc<DomainInner>,
}

unsafe impl Send for CounterInner {}
unsafe impl Sync for CounterInner {}

impl Drop for CounterInner {
    fn drop(&mut self) {
        if !self.cntr.is_null() {
            let ret = unsafe { sys::fi_close(&raw mut (*self.cntr).fid) };
            if ret != 0 {
                tracing::warn!(ret, "fi_close(cntr) failed");
            }
            self.cntr = core::ptr::null_mut();
        }
    }
}

/// 单调 64 位完成计数器。
#[derive(Default)]
pub struct Counter {
    inner: Option<Arc<CounterInner>>,
}

impl Counter {
    /// 在 domain 上打开计数器。
    pub fn create(domain: &Domain, attr: &CounterAttr) -> Result<Counter> {
        let Some(domain_inner) = domain.inner() else {
            return Err(empty_object("counter::create"));
        };

        let mut cntr_attr = sys::fi_cntr_attr {
            events: sys::FI_CNTR_EVENTS_COMP,
            wait_obj: if attr.wait_obj {
                sys::FI_WAIT_UNSPEC
            } else {
                sys::FI_WAIT_NONE
            },
            wait_set: core::ptr::null_mut(),
            flags: attr.flags,
        };

        let mut cntr: *mut sys::fid_cntr = core::ptr::null_mut();
        let ret = unsafe {
            sys::fi_cntr_open(domain_inner.domain, &mut cntr_attr, &mut cntr, core::ptr::null_mut())
        };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_cntr_open"));
        }

        if attr.initial != 0 {
            let ret = unsafe { sys::fi_cntr_set(cntr, attr.initial) };
            if ret != 0 {
                // 构造半途失败：先关句柄再返回错误，不暴露半初始化对象。
                unsafe { sys::fi_close(&raw mut (*cntr).fid) };
                return Err(FabricError::from_errno(ret as isize).with_context("fi_cntr_set"));
            }
        }

        Ok(Counter {
            inner: Some(Arc::new(CounterInner {
                cntr,
                wait_obj: attr.wait_obj,
                _domain: Arc::clone(domain_inner),
            })),
        })
    }

    /// 读取当前值。
    pub fn read(&self) -> Result<u64> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("counter::read"));
        };
        Ok(unsafe { sys::fi_cntr_read(inner.cntr) })
    }

    /// 覆写计数值。
    pub fn set(&self, value: u64) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("counter::set"));
        };
        check(unsafe { sys::fi_cntr_set(inner.cntr, value) } as isize, "fi_cntr_set")
    }

    /// 增加计数值。
    pub fn add(&self, delta: u64) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("counter::add"));
        };
        check(unsafe { sys::fi_cntr_add(inner.cntr, delta) } as isize, "fi_cntr_add")
    }

    /// 阻塞等待计数值达到 `threshold`。
    ///
    /// 仅在创建时带等待对象时可用；到期返回 `timeout`。
    pub fn wait(&self, threshold: u64, timeout: Option<Duration>) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("counter::wait"));
        };
        if !inner.wait_obj {
            return Err(FabricError::new(Errc::NotSupported).with_context("counter::wait"));
        }

        let ret = unsafe { sys::fi_cntr_wait(inner.cntr, threshold, timeout_to_ms(timeout)) };
        if ret == -sys::FI_ETIMEDOUT {
            return Err(FabricError::new(Errc::Timeout).with_context("fi_cntr_wait"));
        }
        check(ret as isize, "fi_cntr_wait")
    }

    /// 非阻塞检查计数值是否已达阈值。
    pub fn check_threshold(&self, threshold: u64) -> bool {
        self.read().map(|value| value >= threshold).unwrap_or(false)
    }

    /// 扣减计数（负增量加法）。
    pub fn ack(&self, count: u64) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("counter::ack"));
        };
        let delta = (count as i64).wrapping_neg() as u64;
        check(unsafe { sys::fi_cntr_add(inner.cntr, delta) } as isize, "fi_cntr_add")
    }

    /// 读取错误计数；非零时折叠为 `io_error`。
    pub fn get_error(&self) -> Option<FabricError> {
        let inner = self.inner.as_deref()?;
        let err_count = unsafe { sys::fi_cntr_readerr(inner.cntr) };
        if err_count == 0 {
            None
        } else {
            Some(FabricError::new(Errc::IoError).with_context("counter error events"))
        }
    }

    /// 是否持有有效句柄。
    pub fn is_valid(&self) -> bool {
        self.inner.as_deref().is_some_and(|i| !i.cntr.is_null())
    }

    pub(crate) fn raw(&self) -> Option<*mut sys::fid_cntr> {
        self.inner.as_deref().map(|i| i.cntr)
    }

    pub(crate) fn raw_fid(&self) -> Option<*mut sys::fid> {
        self.inner
            .as_deref()
            .map(|i| unsafe { &raw mut (*i.cntr).fid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_counter_rejects_operations() {
        let counter = Counter::default();
        assert!(!counter.is_valid());
        assert_eq!(counter.read().unwrap_err().errc(), Errc::InvalidArgument);
        assert_eq!(counter.set(1).unwrap_err().errc(), Errc::InvalidArgument);
        assert_eq!(counter.add(1).unwrap_err().errc(), Errc::InvalidArgument);
        assert_eq!(counter.ack(1).unwrap_err().errc(), Errc::InvalidArgument);
        assert_eq!(counter.wait(1, None).unwrap_err().errc(), Errc::InvalidArgument);
        assert!(!counter.check_threshold(0), "空对象读取失败按未达阈值处理");
        assert!(counter.get_error().is_none());
    }
}
