//! # eq 模块说明
//!
//! ## 角色定位（Why）
//! - 事件队列承载异步控制事件：连接建立/请求/关断、组播加入完成、
//!   MR 注册完成、地址向量插入完成；
//! - 连接管理状态机（connect → connected → shutdown）以它为唯一事实来源；
//!   `shutdown` 事件要求上层把端点置为关断态。
//!
//! ## 契约（What）
//! - `poll`/`read` 非阻塞，`wait` 的超时语义与完成队列一致；
//! - 负返回值触发错误条目补读，事件携带错误码与原始 errno。

use std::sync::Arc;
use std::time::Duration;

use weft_sys as sys;

use crate::cq::timeout_to_ms;
use crate::error::{Errc, FabricError, Result, empty_object};
use crate::fabric::{Fabric, FabricInner};
use crate::types::ContextPtr;

/// 控制事件类别。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// 连接已建立。
    Connected,
    /// 收到连接请求（被动端点）。
    ConnectionRequest,
    /// 对端或本端关断。
    Shutdown,
    /// 集合组加入完成。
    JoinComplete,
    /// 内存区域注册完成。
    MrComplete,
    /// 地址向量操作完成。
    AvComplete,
}

impl EventKind {
    fn from_fi(raw: u32) -> EventKind {
        match raw {
            sys::FI_CONNREQ => EventKind::ConnectionRequest,
            sys::FI_SHUTDOWN => EventKind::Shutdown,
            sys::FI_JOIN_COMPLETE => EventKind::JoinComplete,
            sys::FI_MR_COMPLETE => EventKind::MrComplete,
            sys::FI_AV_COMPLETE => EventKind::AvComplete,
            _ => EventKind::Connected,
        }
    }
}

/// 一条控制事件。
#[derive(Clone, Copy, Debug)]
pub struct FabricEvent {
    pub kind: EventKind,
    /// 事件关联的 fabric 对象句柄（不透明）。
    pub fid: ContextPtr,
    /// 错误事件携带的用户上下文。
    pub context: ContextPtr,
    /// 事件附带数据（错误路径为 provider 数据字）。
    pub data: u64,
    /// 错误结局；`None` 表示正常控制事件。
    pub error: Option<FabricError>,
}

impl FabricEvent {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

struct EqInner {
    eq: *mut sys::fid_eq,
    capacity: usize,
    _fabric: Arc<FabricInner>,
}

unsafe impl Send for EqInner {}
unsafe impl Sync for EqInner {}

impl Drop for EqInner {
    fn drop(&mut self) {
        if !self.eq.is_null() {
            let ret = unsafe { sys::fi_close(&raw mut (*self.eq).fid) };
            if ret != 0 {
                tracing::warn!(ret, "fi_close(eq) failed");
            }
            self.eq = core::ptr::null_mut();
        }
    }
}

/// 事件队列创建参数。
#[derive(Clone, Copy, Debug)]
pub struct EventQueueAttr {
    pub size: usize,
    pub flags: u64,
    pub wait_obj: bool,
}

impl Default for EventQueueAttr {
    fn default() -> Self {
        Self {
            size: 0,
            flags: 0,
            wait_obj: true,
        }
    }
}

/// 异步控制事件 FIFO。
#[derive(Default)]
pub struct EventQueue {
    inner: Option<Arc<EqInner>>,
}

/// CM 条目之外的事件数据上限；超出部分由 provider 截断。
const EVENT_BUF_LEN: usize = 1024;

/// 事件读取缓冲：按 u64 对齐，保证条目头的指针字段可直接读取。
#[repr(C)]
struct EventBuf([u64; EVENT_BUF_LEN / 8]);

impl EventBuf {
    fn new() -> Self {
        Self([0; EVENT_BUF_LEN / 8])
    }

    fn as_mut_ptr(&mut self) -> *mut core::ffi::c_void {
        self.0.as_mut_ptr().cast()
    }
}

impl EventQueue {
    /// 在 fabric 上打开事件队列。
    pub fn create(fabric: &Fabric, attr: &EventQueueAttr) -> Result<EventQueue> {
        let Some(fabric_inner) = fabric.inner() else {
            return Err(empty_object("eq::create"));
        };

        let mut eq_attr = sys::fi_eq_attr {
            size: attr.size,
            flags: attr.flags,
            wait_obj: if attr.wait_obj {
                sys::FI_WAIT_UNSPEC
            } else {
                sys::FI_WAIT_NONE
            },
            signaling_vector: 0,
            wait_set: core::ptr::null_mut(),
        };

        let mut eq: *mut sys::fid_eq = core::ptr::null_mut();
        let ret = unsafe {
            sys::fi_eq_open(fabric_inner.fabric, &mut eq_attr, &mut eq, core::ptr::null_mut())
        };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_eq_open"));
        }

        Ok(EventQueue {
            inner: Some(Arc::new(EqInner {
                eq,
                capacity: if attr.size == 0 { 128 } else { attr.size },
                _fabric: Arc::clone(fabric_inner),
            })),
        })
    }

    /// 非阻塞出队一条控制事件。
    pub fn poll(&self) -> Option<FabricEvent> {
        let inner = self.inner.as_deref()?;

        let mut event_code = 0u32;
        let mut buf = EventBuf::new();
        let ret = unsafe {
            sys::fi_eq_read(inner.eq, &mut event_code, buf.as_mut_ptr(), EVENT_BUF_LEN, 0)
        };

        if ret == -(sys::FI_EAGAIN as isize) {
            return None;
        }
        if ret < 0 {
            return Some(read_error_entry(inner, event_code));
        }

        Some(cm_entry_to_event(event_code, &buf))
    }

    /// 阻塞等待一条控制事件；超时返回 `timeout`。
    pub fn wait(&self, timeout: Option<Duration>) -> Result<FabricEvent> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("eq::wait"));
        };

        let mut event_code = 0u32;
        let mut buf = EventBuf::new();
        let ret = unsafe {
            sys::fi_eq_sread(
                inner.eq,
                &mut event_code,
                buf.as_mut_ptr(),
                EVENT_BUF_LEN,
                timeout_to_ms(timeout),
                0,
            )
        };

        if ret == -(sys::FI_ETIMEDOUT as isize) || ret == -(sys::FI_EAGAIN as isize) {
            return Err(FabricError::new(Errc::Timeout).with_context("fi_eq_sread"));
        }
        if ret < 0 {
            return Ok(read_error_entry(inner, event_code));
        }

        Ok(cm_entry_to_event(event_code, &buf))
    }

    /// 与 `poll` 等价，但空队列返回 `again`。
    pub fn read(&self) -> Result<FabricEvent> {
        if self.inner.is_none() {
            return Err(empty_object("eq::read"));
        }
        self.poll()
            .ok_or_else(|| FabricError::new(Errc::Again).with_context("eq::read"))
    }

    /// 事件的人类可读描述（经 provider 的 strerror）。
    pub fn event_to_string(&self, event: &FabricEvent) -> String {
        let Some(inner) = self.inner.as_deref() else {
            return String::from("invalid event queue");
        };
        let prov_errno = event.error.map(|e| e.prov_errno()).unwrap_or(0);
        let mut buf = [0i8; 256];
        let ptr = unsafe {
            sys::fi_eq_strerror(
                inner.eq,
                prov_errno,
                core::ptr::null(),
                buf.as_mut_ptr().cast(),
                buf.len(),
            )
        };
        if ptr.is_null() {
            String::from("unknown event")
        } else {
            unsafe { std::ffi::CStr::from_ptr(ptr) }
                .to_string_lossy()
                .into_owned()
        }
    }

    /// 队列深度（创建时请求值，0 时回落为 provider 常见缺省 128）。
    pub fn capacity(&self) -> usize {
        self.inner.as_deref().map(|i| i.capacity).unwrap_or(0)
    }

    /// 格式对称性占位。
    pub fn ack(&self, _event: &FabricEvent) -> Result<()> {
        if self.inner.is_none() {
            return Err(empty_object("eq::ack"));
        }
        Ok(())
    }

    /// 是否持有有效句柄。
    pub fn is_valid(&self) -> bool {
        self.inner.as_deref().is_some_and(|i| !i.eq.is_null())
    }

    pub(crate) fn raw_fid(&self) -> Option<*mut sys::fid> {
        self.inner
            .as_deref()
            .map(|i| unsafe { &raw mut (*i.eq).fid })
    }
}

fn cm_entry_to_event(event_code: u32, buf: &EventBuf) -> FabricEvent {
    // CM 条目以 fid 指针开头；缓冲按 u64 对齐，可直接按条目头取字段。
    let entry = buf.0.as_ptr().cast::<sys::fi_eq_cm_entry>();
    FabricEvent {
        kind: EventKind::from_fi(event_code),
        fid: ContextPtr::from_raw(unsafe { (*entry).fid.cast() }),
        context: ContextPtr::null(),
        data: 0,
        error: None,
    }
}

fn read_error_entry(inner: &EqInner, event_code: u32) -> FabricEvent {
    let mut err_entry = sys::fi_eq_err_entry::default();
    let ret = unsafe { sys::fi_eq_readerr(inner.eq, &mut err_entry, 0) };

    if ret != 1 {
        return FabricEvent {
            kind: EventKind::from_fi(event_code),
            fid: ContextPtr::null(),
            context: ContextPtr::null(),
            data: 0,
            error: Some(FabricError::new(Errc::IoError).with_context("fi_eq_readerr")),
        };
    }

    FabricEvent {
        kind: EventKind::from_fi(event_code),
        fid: ContextPtr::from_raw(err_entry.fid.cast()),
        context: ContextPtr::from_raw(err_entry.context),
        data: err_entry.data,
        error: Some(
            FabricError::from_errno(-(err_entry.err as isize)).with_context("event queue"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_eq_rejects_operations() {
        let eq = EventQueue::default();
        assert!(!eq.is_valid());
        assert!(eq.poll().is_none());
        assert_eq!(eq.read().unwrap_err().errc(), Errc::InvalidArgument);
        assert_eq!(eq.wait(None).unwrap_err().errc(), Errc::InvalidArgument);
        assert_eq!(eq.capacity(), 0);
    }

    #[test]
    fn event_kind_mapping_is_total() {
        assert_eq!(EventKind::from_fi(sys::FI_CONNREQ), EventKind::ConnectionRequest);
        assert_eq!(EventKind::from_fi(sys::FI_CONNECTED), EventKind::Connected);
        assert_eq!(EventKind::from_fi(sys::FI_SHUTDOWN), EventKind::Shutdown);
        assert_eq!(EventKind::from_fi(sys::FI_JOIN_COMPLETE), EventKind::JoinComplete);
        assert_eq!(EventKind::from_fi(sys::FI_MR_COMPLETE), EventKind::MrComplete);
        assert_eq!(EventKind::from_fi(sys::FI_AV_COMPLETE), EventKind::AvComplete);
        // 未识别事件码回落为 Connected，与事件源语义最接近。
        assert_eq!(EventKind::from_fi(0xFFFF), EventKind::Connected);
    }
}
