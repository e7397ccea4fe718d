//! # cq 模块说明
//!
//! ## 角色定位（Why）
//! - 完成队列是异步引擎的心脏：硬件把每个已提交操作的结局投递到这里，
//!   完成路径从条目中的上下文指针恢复归属操作并触发延续；
//! - 负返回值触发错误条目补读，错误事件与正常事件共用一个
//!   [`CompletionEvent`] 形态，分发逻辑只看 `error` 字段。
//!
//! ## 契约（What）
//! - `poll`/`poll_batch`/`read` 非阻塞；`wait` 仅在“创建时带等待对象 **且**
//!   domain 数据面自动推进”时可用，否则返回 `not_supported`；
//! - 超时返回 `timeout` 且不动队列状态；`ack` 是格式对称性占位，恒成功；
//! - `capacity` 报告创建时请求的深度（0 表示交由 provider 决定）。

use std::sync::Arc;
use std::time::Duration;

use weft_sys as sys;

use crate::domain::{Domain, DomainInner, ProgressPolicy};
use crate::error::{Errc, FabricError, Result, empty_object};
use crate::imm::ImmediateData;
use crate::types::ContextPtr;

/// 完成队列创建参数。
#[derive(Clone, Copy, Debug)]
pub struct CompletionQueueAttr {
    /// 请求的队列深度；0 表示 provider 缺省。
    pub size: usize,
    /// 透传给 provider 的原始标志。
    pub flags: u64,
    /// 是否创建等待对象（阻塞 `wait` 的前提之一）。
    pub wait_obj: bool,
}

impl Default for CompletionQueueAttr {
    fn default() -> Self {
        Self {
            size: 0,
            flags: 0,
            wait_obj: true,
        }
    }
}

/// 完成事件的错误侧信息。
///
/// `err_data` 指向 provider 的诊断缓冲，仅在下一次错误条目读取前有效；
/// 需要留存时调用方必须立即拷贝。
#[derive(Clone, Copy, Debug)]
pub struct CompletionError {
    pub errc: Errc,
    pub prov_errno: i32,
    pub err_data: *const u8,
    pub err_data_size: usize,
}

// err_data 是只读诊断指针，事件本身按值在线程间传递。
unsafe impl Send for CompletionError {}
unsafe impl Sync for CompletionError {}

impl CompletionError {
    /// 转换为统一错误形态。
    pub fn to_fabric_error(&self) -> FabricError {
        FabricError::from_errno(self.errc.as_raw() as isize)
    }
}

/// 单个操作的完成结局。
#[derive(Clone, Copy, Debug, Default)]
pub struct CompletionEvent {
    /// 提交时注册的操作上下文。
    pub context: ContextPtr,
    /// provider 报告的完成标志。
    pub flags: u64,
    /// 条目长度字段。
    pub len: usize,
    /// 实际传输字节数。
    pub bytes_transferred: usize,
    /// 随完成抵达的立即数。
    pub data: ImmediateData,
    /// 错误结局；`None` 表示成功。
    pub error: Option<CompletionError>,
}

impl CompletionEvent {
    /// 是否成功完成。
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// 是否以取消收场。
    pub fn is_cancelled(&self) -> bool {
        self.error.is_some_and(|e| e.errc == Errc::Canceled)
    }
}

struct CqInner {
    cq: *mut sys::fid_cq,
    policy: ProgressPolicy,
    wait_obj: bool,
    capacity: usize,
    _domain: Arc<DomainInner>,
}

unsafe impl Send for CqInner {}
unsafe impl Sync for CqInner {}

impl Drop for CqInner {
    fn drop(&mut self) {
        if !self.cq.is_null() {
            let ret = unsafe { sys::fi_close(&raw mut (*self.cq).fid) };
            if ret != 0 {
                tracing::warn!(ret, "fi_close(cq) failed");
            }
            self.cq = core::ptr::null_mut();
        }
    }
}

/// 操作完成事件的有界 FIFO。
#[derive(Default)]
pub struct CompletionQueue {
    inner: Option<Arc<CqInner>>,
}

/// 单次批量出队的内部上限，与栈上条目数组匹配。
const MAX_BATCH: usize = 64;

impl CompletionQueue {
    /// 在 domain 上打开完成队列，进度策略随 domain 固化。
    pub fn create(domain: &Domain, attr: &CompletionQueueAttr) -> Result<CompletionQueue> {
        let Some(domain_inner) = domain.inner() else {
            return Err(empty_object("cq::create"));
        };

        let mut cq_attr = sys::fi_cq_attr {
            size: attr.size,
            flags: attr.flags,
            format: sys::FI_CQ_FORMAT_DATA,
            wait_obj: if attr.wait_obj {
                sys::FI_WAIT_UNSPEC
            } else {
                sys::FI_WAIT_NONE
            },
            signaling_vector: 0,
            wait_cond: 0,
            wait_set: core::ptr::null_mut(),
        };

        let mut cq: *mut sys::fid_cq = core::ptr::null_mut();
        let ret = unsafe {
            sys::fi_cq_open(domain_inner.domain, &mut cq_attr, &mut cq, core::ptr::null_mut())
        };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_cq_open"));
        }

        Ok(CompletionQueue {
            inner: Some(Arc::new(CqInner {
                cq,
                policy: domain_inner.policy,
                wait_obj: attr.wait_obj,
                capacity: attr.size,
                _domain: Arc::clone(domain_inner),
            })),
        })
    }

    /// 非阻塞出队一个完成事件；队列为空返回 `None`。
    pub fn poll(&self) -> Option<CompletionEvent> {
        let inner = self.inner.as_deref()?;

        let mut entry = sys::fi_cq_data_entry::default();
        let ret = unsafe { sys::fi_cq_read(inner.cq, (&raw mut entry).cast(), 1) };

        if ret == -(sys::FI_EAGAIN as isize) {
            return None;
        }
        if ret < 0 {
            return Some(self.read_error_entry(inner, ret));
        }
        if ret == 0 {
            return None;
        }

        Some(data_entry_to_event(&entry))
    }

    /// 批量出队，至多填满 `events`，返回实际条目数。
    pub fn poll_batch(&self, events: &mut [CompletionEvent]) -> usize {
        let Some(inner) = self.inner.as_deref() else {
            return 0;
        };
        if events.is_empty() {
            return 0;
        }

        let mut entries = [sys::fi_cq_data_entry::default(); MAX_BATCH];
        let batch = events.len().min(MAX_BATCH);
        let ret = unsafe { sys::fi_cq_read(inner.cq, entries.as_mut_ptr().cast(), batch) };

        if ret <= 0 {
            return 0;
        }

        let count = ret as usize;
        for (event, entry) in events.iter_mut().zip(entries.iter().take(count)) {
            *event = data_entry_to_event(entry);
        }
        count
    }

    /// 阻塞等待一个完成事件。
    ///
    /// # 契约
    /// - 仅在创建时带等待对象且 provider 数据面自动推进时可用；
    /// - `timeout` 为 `None` 表示无限等待；到期返回 `timeout` 且队列状态不变。
    pub fn wait(&self, timeout: Option<Duration>) -> Result<CompletionEvent> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("cq::wait"));
        };
        if !inner.wait_obj || !inner.policy.supports_blocking_wait() {
            return Err(FabricError::new(Errc::NotSupported).with_context("cq::wait"));
        }

        let timeout_ms = timeout_to_ms(timeout);
        let mut entry = sys::fi_cq_data_entry::default();
        let ret = unsafe {
            sys::fi_cq_sread(inner.cq, (&raw mut entry).cast(), 1, core::ptr::null(), timeout_ms)
        };

        if ret == -(sys::FI_ETIMEDOUT as isize) || ret == -(sys::FI_EAGAIN as isize) {
            return Err(FabricError::new(Errc::Timeout).with_context("fi_cq_sread"));
        }
        if ret < 0 {
            return Ok(self.read_error_entry(inner, ret));
        }

        Ok(data_entry_to_event(&entry))
    }

    /// 与 `poll` 等价，但空队列返回 `again` 而非 `None`。
    pub fn read(&self) -> Result<CompletionEvent> {
        if self.inner.is_none() {
            return Err(empty_object("cq::read"));
        }
        self.poll()
            .ok_or_else(|| FabricError::new(Errc::Again).with_context("cq::read"))
    }

    /// 格式对称性占位：完成事件无需确认。
    pub fn ack(&self, _event: &CompletionEvent) -> Result<()> {
        if self.inner.is_none() {
            return Err(empty_object("cq::ack"));
        }
        Ok(())
    }

    /// 创建时请求的队列深度；0 表示 provider 缺省。
    pub fn capacity(&self) -> usize {
        self.inner.as_deref().map(|i| i.capacity).unwrap_or(0)
    }

    /// 当前进度策略。
    pub fn progress_policy(&self) -> ProgressPolicy {
        self.inner.as_deref().map(|i| i.policy).unwrap_or_default()
    }

    /// 阻塞等待是否可用。
    pub fn supports_blocking_wait(&self) -> bool {
        self.inner
            .as_deref()
            .is_some_and(|i| i.wait_obj && i.policy.supports_blocking_wait())
    }

    /// 是否需要调用方手动推进数据面。
    pub fn requires_manual_progress(&self) -> bool {
        self.inner
            .as_deref()
            .map(|i| i.policy.requires_manual_data_progress())
            .unwrap_or(true)
    }

    /// 是否持有有效句柄。
    pub fn is_valid(&self) -> bool {
        self.inner.as_deref().is_some_and(|i| !i.cq.is_null())
    }

    pub(crate) fn raw_fid(&self) -> Option<*mut sys::fid> {
        self.inner
            .as_deref()
            .map(|i| unsafe { &raw mut (*i.cq).fid })
    }

    /// 负返回值后的错误条目补读。
    fn read_error_entry(&self, inner: &CqInner, original_ret: isize) -> CompletionEvent {
        let mut err_entry = sys::fi_cq_err_entry::default();
        let ret = unsafe { sys::fi_cq_readerr(inner.cq, &mut err_entry, 0) };

        if ret != 1 {
            // 错误条目读取本身失败：以原始返回值合成错误事件。
            return CompletionEvent {
                error: Some(CompletionError {
                    errc: Errc::from_raw(original_ret as i32),
                    prov_errno: original_ret.unsigned_abs() as i32,
                    err_data: core::ptr::null(),
                    err_data_size: 0,
                }),
                ..CompletionEvent::default()
            };
        }

        CompletionEvent {
            context: ContextPtr::from_raw(err_entry.op_context),
            flags: err_entry.flags,
            len: err_entry.len,
            bytes_transferred: 0,
            data: ImmediateData::from_raw(err_entry.data),
            error: Some(CompletionError {
                errc: Errc::from_raw(-err_entry.err),
                prov_errno: err_entry.prov_errno,
                err_data: err_entry.err_data.cast_const().cast(),
                err_data_size: err_entry.err_data_size,
            }),
        }
    }
}

fn data_entry_to_event(entry: &sys::fi_cq_data_entry) -> CompletionEvent {
    CompletionEvent {
        context: ContextPtr::from_raw(entry.op_context),
        flags: entry.flags,
        len: entry.len,
        bytes_transferred: entry.len,
        data: ImmediateData::from_raw(entry.data),
        error: None,
    }
}

pub(crate) fn timeout_to_ms(timeout: Option<Duration>) -> i32 {
    match timeout {
        None => -1,
        Some(d) => d.as_millis().min(i32::MAX as u128) as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 空对象契约：默认构造的 CQ 上所有操作失败或返回零值等价物。
    #[test]
    fn empty_cq_rejects_operations() {
        let cq = CompletionQueue::default();
        assert!(!cq.is_valid());
        assert!(cq.poll().is_none());
        assert_eq!(cq.poll_batch(&mut [CompletionEvent::default(); 4]), 0);
        assert_eq!(cq.capacity(), 0);
        assert_eq!(cq.read().unwrap_err().errc(), Errc::InvalidArgument);
        assert_eq!(cq.wait(None).unwrap_err().errc(), Errc::InvalidArgument);
        assert_eq!(
            cq.ack(&CompletionEvent::default()).unwrap_err().errc(),
            Errc::InvalidArgument
        );
        assert!(!cq.supports_blocking_wait());
        assert!(cq.requires_manual_progress(), "未知策略按手动进度保守处理");
    }

    #[test]
    fn timeout_conversion_boundaries() {
        assert_eq!(timeout_to_ms(None), -1, "缺省为无限等待");
        assert_eq!(timeout_to_ms(Some(Duration::ZERO)), 0);
        assert_eq!(timeout_to_ms(Some(Duration::from_millis(250))), 250);
        assert_eq!(timeout_to_ms(Some(Duration::from_secs(u64::MAX / 2000))), i32::MAX);
    }

    #[test]
    fn cancelled_classification_follows_errc() {
        let mut event = CompletionEvent::default();
        assert!(event.is_ok());
        event.error = Some(CompletionError {
            errc: Errc::Canceled,
            prov_errno: 125,
            err_data: core::ptr::null(),
            err_data_size: 0,
        });
        assert!(event.is_cancelled());
        assert!(!event.is_ok());
    }
}
