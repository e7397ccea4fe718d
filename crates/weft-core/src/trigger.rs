//! # trigger 模块说明
//!
//! ## 角色定位（Why）
//! - 触发式/延迟工作把“计数器跨过阈值”变成操作的点火条件：集合通信的
//!   依赖链可以完全下沉给 provider 推进，host 侧不再逐步参与；
//! - 两条路径：[`DeferredWork`] 经 domain 控制调用入队（支持取消/冲刷），
//!   [`TriggeredContext`] 支撑带 `FI_TRIGGER` 标志的内联触发提交。
//!
//! ## 契约（What）
//! - 生命周期 `queued → fired`（progress 引擎点火）或 `queued → cancelled`；
//!   在队状态下 drop 隐式取消；
//! - 工作对象独占持有全部被引用的 iovec/描述符存储直至释放——provider
//!   在点火前随时可能读取它们；
//! - [`flush_work`] 强制推进整个 domain 的在队工作，
//!   [`flush_work_for`] 仅限定由某个计数器门控的工作。

use std::sync::Arc;

use weft_sys as sys;

use crate::counter::Counter;
use crate::domain::{Domain, DomainInner};
use crate::endpoint::ActiveEndpoint;
use crate::error::{FabricError, Result, check, empty_object};
use crate::msg::{
    RecvFlags, RecvMessage, SendFlags, SendMessage, TaggedRecvMessage, TaggedSendMessage,
    translate_recv_flags, translate_send_flags, validate_iov_count,
};
use crate::rma::RmaIov;
use crate::types::{ContextPtr, FabricAddr};

/// 触发条件：计数器跨过阈值。
#[derive(Clone, Copy)]
pub struct ThresholdCondition<'a> {
    pub counter: &'a Counter,
    pub threshold: u64,
}

impl<'a> ThresholdCondition<'a> {
    pub fn new(counter: &'a Counter, threshold: u64) -> Self {
        Self { counter, threshold }
    }
}

struct DeferredWorkInner {
    domain: Arc<DomainInner>,
    work: sys::fi_deferred_work,
    op_msg: sys::fi_op_msg,
    op_tagged: sys::fi_op_tagged,
    op_rma: sys::fi_op_rma,
    op_cntr: sys::fi_op_cntr,
    iov_storage: Vec<libc::iovec>,
    desc_storage: Vec<*mut core::ffi::c_void>,
    rma_iov_storage: Vec<sys::fi_rma_iov>,
    queued: bool,
}

unsafe impl Send for DeferredWorkInner {}

impl DeferredWorkInner {
    fn new(domain: Arc<DomainInner>) -> Box<DeferredWorkInner> {
        // op_* 是纯 POD 描述符，入队前逐字段填写。
        Box::new(DeferredWorkInner {
            domain,
            work: unsafe { core::mem::zeroed() },
            op_msg: unsafe { core::mem::zeroed() },
            op_tagged: unsafe { core::mem::zeroed() },
            op_rma: unsafe { core::mem::zeroed() },
            op_cntr: unsafe { core::mem::zeroed() },
            iov_storage: Vec::new(),
            desc_storage: Vec::new(),
            rma_iov_storage: Vec::new(),
            queued: false,
        })
    }

    fn set_trigger(&mut self, trigger: &ThresholdCondition<'_>, completion: Option<&Counter>) {
        self.work.threshold = trigger.threshold;
        self.work.triggering_cntr = trigger.counter.raw().unwrap_or(core::ptr::null_mut());
        self.work.completion_cntr = completion
            .and_then(|c| c.raw())
            .unwrap_or(core::ptr::null_mut());
    }

    fn queue(mut self: Box<Self>) -> Result<DeferredWork> {
        let domain_fid = unsafe { &raw mut (*self.domain.domain).fid };
        let ret = unsafe {
            sys::fi_control(domain_fid, sys::FI_QUEUE_WORK, (&raw mut self.work).cast())
        };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("FI_QUEUE_WORK"));
        }
        self.queued = true;
        Ok(DeferredWork { inner: Some(self) })
    }
}

impl Drop for DeferredWorkInner {
    fn drop(&mut self) {
        if self.queued && !self.domain.domain.is_null() {
            let domain_fid = unsafe { &raw mut (*self.domain.domain).fid };
            let ret = unsafe {
                sys::fi_control(domain_fid, sys::FI_CANCEL_WORK, (&raw mut self.work).cast())
            };
            if ret != 0 {
                tracing::warn!(ret, "FI_CANCEL_WORK on drop failed");
            }
        }
    }
}

/// 一件等待计数器阈值点火的延迟工作。
#[derive(Default)]
pub struct DeferredWork {
    inner: Option<Box<DeferredWorkInner>>,
}

macro_rules! deferred_guards {
    ($domain:expr, $ep:expr, $ctx:literal) => {{
        let Some(domain_inner) = $domain.inner() else {
            return Err(empty_object($ctx));
        };
        let Some(ep_raw) = $ep.raw() else {
            return Err(empty_object($ctx));
        };
        (domain_inner, ep_raw)
    }};
}

impl DeferredWork {
    /// 入队一笔触发式发送。
    ///
    /// # Safety
    /// `msg` 引用的缓冲与上下文必须活到工作点火完成（或取消）为止。
    pub unsafe fn send(
        domain: &Domain,
        ep: &ActiveEndpoint,
        trigger: &ThresholdCondition<'_>,
        completion: Option<&Counter>,
        msg: &SendMessage<'_>,
        flags: SendFlags,
    ) -> Result<DeferredWork> {
        validate_iov_count(msg.iov.len())?;
        let (domain_inner, ep_raw) = deferred_guards!(domain, ep, "deferred::send");

        let mut inner = DeferredWorkInner::new(Arc::clone(domain_inner));
        inner.iov_storage = msg
            .iov
            .iter()
            .map(|slice| libc::iovec {
                iov_base: slice.as_ptr().cast_mut().cast(),
                iov_len: slice.len(),
            })
            .collect();
        inner.desc_storage = msg.desc.iter().map(|d| d.as_raw()).collect();

        inner.op_msg.ep = ep_raw;
        inner.op_msg.msg.msg_iov = inner.iov_storage.as_ptr();
        inner.op_msg.msg.desc = if inner.desc_storage.is_empty() {
            core::ptr::null_mut()
        } else {
            inner.desc_storage.as_mut_ptr()
        };
        inner.op_msg.msg.iov_count = inner.iov_storage.len();
        inner.op_msg.msg.addr = msg.dest.get();
        inner.op_msg.msg.context = msg.context.as_ptr();
        inner.op_msg.msg.data = msg.data;
        inner.op_msg.flags = translate_send_flags(flags);

        inner.set_trigger(trigger, completion);
        inner.work.op_type = sys::FI_OP_SEND;
        inner.work.op = (&raw mut inner.op_msg).cast();

        inner.queue()
    }

    /// 入队一笔触发式接收。
    ///
    /// # Safety
    /// 同 [`send`](Self::send)。
    pub unsafe fn recv(
        domain: &Domain,
        ep: &ActiveEndpoint,
        trigger: &ThresholdCondition<'_>,
        completion: Option<&Counter>,
        msg: &RecvMessage<'_>,
        flags: RecvFlags,
    ) -> Result<DeferredWork> {
        validate_iov_count(msg.iov.len())?;
        let (domain_inner, ep_raw) = deferred_guards!(domain, ep, "deferred::recv");

        let mut inner = DeferredWorkInner::new(Arc::clone(domain_inner));
        inner.iov_storage = msg
            .iov
            .iter()
            .map(|slice| libc::iovec {
                iov_base: slice.as_ptr().cast_mut().cast(),
                iov_len: slice.len(),
            })
            .collect();
        inner.desc_storage = msg.desc.iter().map(|d| d.as_raw()).collect();

        inner.op_msg.ep = ep_raw;
        inner.op_msg.msg.msg_iov = inner.iov_storage.as_ptr();
        inner.op_msg.msg.desc = if inner.desc_storage.is_empty() {
            core::ptr::null_mut()
        } else {
            inner.desc_storage.as_mut_ptr()
        };
        inner.op_msg.msg.iov_count = inner.iov_storage.len();
        inner.op_msg.msg.addr = msg.src.get();
        inner.op_msg.msg.context = msg.context.as_ptr();
        inner.op_msg.msg.data = 0;
        inner.op_msg.flags = translate_recv_flags(flags);

        inner.set_trigger(trigger, completion);
        inner.work.op_type = sys::FI_OP_RECV;
        inner.work.op = (&raw mut inner.op_msg).cast();

        inner.queue()
    }

    /// 入队一笔触发式标签发送。
    ///
    /// # Safety
    /// 同 [`send`](Self::send)。
    pub unsafe fn tagged_send(
        domain: &Domain,
        ep: &ActiveEndpoint,
        trigger: &ThresholdCondition<'_>,
        completion: Option<&Counter>,
        msg: &TaggedSendMessage<'_>,
        flags: SendFlags,
    ) -> Result<DeferredWork> {
        validate_iov_count(msg.iov.len())?;
        let (domain_inner, ep_raw) = deferred_guards!(domain, ep, "deferred::tagged_send");

        let mut inner = DeferredWorkInner::new(Arc::clone(domain_inner));
        inner.iov_storage = msg
            .iov
            .iter()
            .map(|slice| libc::iovec {
                iov_base: slice.as_ptr().cast_mut().cast(),
                iov_len: slice.len(),
            })
            .collect();
        inner.desc_storage = msg.desc.iter().map(|d| d.as_raw()).collect();

        inner.op_tagged.ep = ep_raw;
        inner.op_tagged.msg.msg_iov = inner.iov_storage.as_ptr();
        inner.op_tagged.msg.desc = if inner.desc_storage.is_empty() {
            core::ptr::null_mut()
        } else {
            inner.desc_storage.as_mut_ptr()
        };
        inner.op_tagged.msg.iov_count = inner.iov_storage.len();
        inner.op_tagged.msg.addr = msg.dest.get();
        inner.op_tagged.msg.tag = msg.tag.get();
        inner.op_tagged.msg.ignore = 0;
        inner.op_tagged.msg.context = msg.context.as_ptr();
        inner.op_tagged.msg.data = msg.data;
        inner.op_tagged.flags = translate_send_flags(flags);

        inner.set_trigger(trigger, completion);
        inner.work.op_type = sys::FI_OP_TSEND;
        inner.work.op = (&raw mut inner.op_tagged).cast();

        inner.queue()
    }

    /// 入队一笔触发式标签接收。
    ///
    /// # Safety
    /// 同 [`send`](Self::send)。
    pub unsafe fn tagged_recv(
        domain: &Domain,
        ep: &ActiveEndpoint,
        trigger: &ThresholdCondition<'_>,
        completion: Option<&Counter>,
        msg: &TaggedRecvMessage<'_>,
        flags: RecvFlags,
    ) -> Result<DeferredWork> {
        validate_iov_count(msg.iov.len())?;
        let (domain_inner, ep_raw) = deferred_guards!(domain, ep, "deferred::tagged_recv");

        let mut inner = DeferredWorkInner::new(Arc::clone(domain_inner));
        inner.iov_storage = msg
            .iov
            .iter()
            .map(|slice| libc::iovec {
                iov_base: slice.as_ptr().cast_mut().cast(),
                iov_len: slice.len(),
            })
            .collect();
        inner.desc_storage = msg.desc.iter().map(|d| d.as_raw()).collect();

        inner.op_tagged.ep = ep_raw;
        inner.op_tagged.msg.msg_iov = inner.iov_storage.as_ptr();
        inner.op_tagged.msg.desc = if inner.desc_storage.is_empty() {
            core::ptr::null_mut()
        } else {
            inner.desc_storage.as_mut_ptr()
        };
        inner.op_tagged.msg.iov_count = inner.iov_storage.len();
        inner.op_tagged.msg.addr = msg.src.get();
        inner.op_tagged.msg.tag = msg.tag.get();
        inner.op_tagged.msg.ignore = msg.ignore;
        inner.op_tagged.msg.context = msg.context.as_ptr();
        inner.op_tagged.msg.data = 0;
        inner.op_tagged.flags = translate_recv_flags(flags);

        inner.set_trigger(trigger, completion);
        inner.work.op_type = sys::FI_OP_TRECV;
        inner.work.op = (&raw mut inner.op_tagged).cast();

        inner.queue()
    }

    /// 入队一笔触发式 RMA 读。
    ///
    /// # Safety
    /// 本地/远端 IOV 引用的内存必须活到点火完成；描述符必须覆盖本地段。
    pub unsafe fn read(
        domain: &Domain,
        ep: &ActiveEndpoint,
        trigger: &ThresholdCondition<'_>,
        completion: Option<&Counter>,
        local_iov: &[std::io::IoSliceMut<'_>],
        desc: &[crate::types::MrDescriptor],
        remote_iov: &[RmaIov],
        dest: FabricAddr,
        context: ContextPtr,
        flags: u64,
    ) -> Result<DeferredWork> {
        validate_iov_count(local_iov.len())?;
        let (domain_inner, ep_raw) = deferred_guards!(domain, ep, "deferred::read");

        let mut inner = DeferredWorkInner::new(Arc::clone(domain_inner));
        inner.iov_storage = local_iov
            .iter()
            .map(|slice| libc::iovec {
                iov_base: slice.as_ptr().cast_mut().cast(),
                iov_len: slice.len(),
            })
            .collect();
        inner.desc_storage = desc.iter().map(|d| d.as_raw()).collect();
        inner.rma_iov_storage = remote_iov.iter().map(|r| r.to_fi()).collect();

        inner.op_rma.ep = ep_raw;
        inner.op_rma.msg.msg_iov = inner.iov_storage.as_ptr();
        inner.op_rma.msg.desc = if inner.desc_storage.is_empty() {
            core::ptr::null_mut()
        } else {
            inner.desc_storage.as_mut_ptr()
        };
        inner.op_rma.msg.iov_count = inner.iov_storage.len();
        inner.op_rma.msg.addr = dest.get();
        inner.op_rma.msg.rma_iov = inner.rma_iov_storage.as_ptr();
        inner.op_rma.msg.rma_iov_count = inner.rma_iov_storage.len();
        inner.op_rma.msg.context = context.as_ptr();
        inner.op_rma.msg.data = 0;
        inner.op_rma.flags = flags;

        inner.set_trigger(trigger, completion);
        inner.work.op_type = sys::FI_OP_READ;
        inner.work.op = (&raw mut inner.op_rma).cast();

        inner.queue()
    }

    /// 入队一笔触发式 RMA 写（可携带立即数）。
    ///
    /// # Safety
    /// 同 [`read`](Self::read)。
    pub unsafe fn write(
        domain: &Domain,
        ep: &ActiveEndpoint,
        trigger: &ThresholdCondition<'_>,
        completion: Option<&Counter>,
        local_iov: &[std::io::IoSlice<'_>],
        desc: &[crate::types::MrDescriptor],
        remote_iov: &[RmaIov],
        dest: FabricAddr,
        context: ContextPtr,
        data: u64,
        flags: u64,
    ) -> Result<DeferredWork> {
        validate_iov_count(local_iov.len())?;
        let (domain_inner, ep_raw) = deferred_guards!(domain, ep, "deferred::write");

        let mut inner = DeferredWorkInner::new(Arc::clone(domain_inner));
        inner.iov_storage = local_iov
            .iter()
            .map(|slice| libc::iovec {
                iov_base: slice.as_ptr().cast_mut().cast(),
                iov_len: slice.len(),
            })
            .collect();
        inner.desc_storage = desc.iter().map(|d| d.as_raw()).collect();
        inner.rma_iov_storage = remote_iov.iter().map(|r| r.to_fi()).collect();

        inner.op_rma.ep = ep_raw;
        inner.op_rma.msg.msg_iov = inner.iov_storage.as_ptr();
        inner.op_rma.msg.desc = if inner.desc_storage.is_empty() {
            core::ptr::null_mut()
        } else {
            inner.desc_storage.as_mut_ptr()
        };
        inner.op_rma.msg.iov_count = inner.iov_storage.len();
        inner.op_rma.msg.addr = dest.get();
        inner.op_rma.msg.rma_iov = inner.rma_iov_storage.as_ptr();
        inner.op_rma.msg.rma_iov_count = inner.rma_iov_storage.len();
        inner.op_rma.msg.context = context.as_ptr();
        inner.op_rma.msg.data = data;
        inner.op_rma.flags = flags;

        inner.set_trigger(trigger, completion);
        inner.work.op_type = sys::FI_OP_WRITE;
        inner.work.op = (&raw mut inner.op_rma).cast();

        inner.queue()
    }

    /// 入队一笔触发式计数器覆写。
    pub fn counter_set(
        domain: &Domain,
        trigger: &ThresholdCondition<'_>,
        target: &Counter,
        value: u64,
    ) -> Result<DeferredWork> {
        Self::counter_op(domain, trigger, target, value, sys::FI_OP_CNTR_SET, "deferred::counter_set")
    }

    /// 入队一笔触发式计数器加法。
    pub fn counter_add(
        domain: &Domain,
        trigger: &ThresholdCondition<'_>,
        target: &Counter,
        value: u64,
    ) -> Result<DeferredWork> {
        Self::counter_op(domain, trigger, target, value, sys::FI_OP_CNTR_ADD, "deferred::counter_add")
    }

    fn counter_op(
        domain: &Domain,
        trigger: &ThresholdCondition<'_>,
        target: &Counter,
        value: u64,
        op_type: u32,
        ctx: &'static str,
    ) -> Result<DeferredWork> {
        let Some(domain_inner) = domain.inner() else {
            return Err(empty_object(ctx));
        };
        let Some(target_raw) = target.raw() else {
            return Err(empty_object(ctx));
        };

        let mut inner = DeferredWorkInner::new(Arc::clone(domain_inner));
        inner.op_cntr.cntr = target_raw;
        inner.op_cntr.value = value;

        inner.set_trigger(trigger, None);
        inner.work.op_type = op_type;
        inner.work.op = (&raw mut inner.op_cntr).cast();

        inner.queue()
    }

    /// 取消在队工作；点火后取消返回错误。
    pub fn cancel(&mut self) -> Result<()> {
        let Some(inner) = self.inner.as_deref_mut() else {
            return Err(empty_object("deferred::cancel"));
        };
        if !inner.queued {
            return Err(empty_object("deferred::cancel"));
        }

        let domain_fid = unsafe { &raw mut (*inner.domain.domain).fid };
        let ret = unsafe {
            sys::fi_control(domain_fid, sys::FI_CANCEL_WORK, (&raw mut inner.work).cast())
        };
        check(ret as isize, "FI_CANCEL_WORK")?;
        inner.queued = false;
        Ok(())
    }

    /// 是否仍在队列中等待点火。
    pub fn is_pending(&self) -> bool {
        self.inner.as_deref().is_some_and(|i| i.queued)
    }

    /// 点火完成后调用，解除 drop 时的隐式取消。
    pub fn mark_fired(&mut self) {
        if let Some(inner) = self.inner.as_deref_mut() {
            inner.queued = false;
        }
    }
}

/// 强制推进 domain 内全部在队工作。
pub fn flush_work(domain: &Domain) -> Result<()> {
    let Some(inner) = domain.inner() else {
        return Err(empty_object("trigger::flush_work"));
    };
    let domain_fid = unsafe { &raw mut (*inner.domain).fid };
    let ret = unsafe { sys::fi_control(domain_fid, sys::FI_FLUSH_WORK, core::ptr::null_mut()) };
    check(ret as isize, "FI_FLUSH_WORK")
}

/// 只推进由 `counter` 门控的在队工作。
pub fn flush_work_for(domain: &Domain, counter: &Counter) -> Result<()> {
    let Some(inner) = domain.inner() else {
        return Err(empty_object("trigger::flush_work_for"));
    };
    let Some(cntr_raw) = counter.raw() else {
        return Err(empty_object("trigger::flush_work_for"));
    };
    let domain_fid = unsafe { &raw mut (*inner.domain).fid };
    let ret = unsafe { sys::fi_control(domain_fid, sys::FI_FLUSH_WORK, cntr_raw.cast()) };
    check(ret as isize, "FI_FLUSH_WORK")
}

/// 内联触发提交使用的上下文：触发头 + 固定尺寸刮写区。
///
/// 以 `FI_TRIGGER` 标志提交时，provider 把操作 context 解释为
/// `fi_triggered_context`；本类型将触发头放在偏移 0 以满足该约定。
#[repr(C)]
pub struct TriggeredContext {
    trig: sys::fi_triggered_context,
}

const _: () = assert!(core::mem::offset_of!(TriggeredContext, trig) == 0);

impl TriggeredContext {
    /// 以阈值条件构造触发上下文。
    pub fn threshold(trigger: &ThresholdCondition<'_>) -> TriggeredContext {
        TriggeredContext {
            trig: sys::fi_triggered_context {
                event_type: sys::FI_TRIGGER_THRESHOLD,
                trigger: sys::fi_trigger_union {
                    threshold: sys::fi_trigger_threshold {
                        cntr: trigger.counter.raw().unwrap_or(core::ptr::null_mut()),
                        threshold: trigger.threshold as usize,
                    },
                },
            },
        }
    }

    /// 提交用的上下文指针。
    pub fn context_ptr(&self) -> ContextPtr {
        ContextPtr::from_raw((&raw const self.trig).cast_mut().cast())
    }
}

/// 以 `FI_TRIGGER` 内联提交一笔触发式标签发送。
///
/// # Safety
/// `msg` 引用的缓冲与 `trig_ctx` 必须活到操作点火完成。
pub unsafe fn tagged_sendmsg_triggered(
    ep: &ActiveEndpoint,
    msg: &TaggedSendMessage<'_>,
    trig_ctx: &TriggeredContext,
    flags: SendFlags,
) -> Result<()> {
    validate_iov_count(msg.iov.len())?;
    let Some(ep_raw) = ep.raw() else {
        return Err(empty_object("trigger::tagged_sendmsg"));
    };

    let mut raw_desc = [core::ptr::null_mut(); crate::msg::MAX_IOV_COUNT];
    let fi_msg = sys::fi_msg_tagged {
        msg_iov: msg.iov.as_ptr().cast::<libc::iovec>(),
        desc: crate::msg::descriptors_to_raw(msg.desc, &mut raw_desc),
        iov_count: msg.iov.len(),
        addr: msg.dest.get(),
        tag: msg.tag.get(),
        ignore: 0,
        context: trig_ctx.context_ptr().as_ptr(),
        data: msg.data,
    };

    let ret = unsafe {
        sys::fi_tsendmsg(ep_raw, &fi_msg, translate_send_flags(flags) | sys::FI_TRIGGER)
    };
    check(ret, "fi_tsendmsg")
}

/// 以 `FI_TRIGGER` 内联提交一笔触发式标签接收。
///
/// # Safety
/// 同 [`tagged_sendmsg_triggered`]。
pub unsafe fn tagged_recvmsg_triggered(
    ep: &ActiveEndpoint,
    msg: &TaggedRecvMessage<'_>,
    trig_ctx: &TriggeredContext,
    flags: RecvFlags,
) -> Result<()> {
    validate_iov_count(msg.iov.len())?;
    let Some(ep_raw) = ep.raw() else {
        return Err(empty_object("trigger::tagged_recvmsg"));
    };

    let mut raw_desc = [core::ptr::null_mut(); crate::msg::MAX_IOV_COUNT];
    let fi_msg = sys::fi_msg_tagged {
        msg_iov: msg.iov.as_ptr().cast::<libc::iovec>(),
        desc: crate::msg::descriptors_to_raw(msg.desc, &mut raw_desc),
        iov_count: msg.iov.len(),
        addr: msg.src.get(),
        tag: msg.tag.get(),
        ignore: msg.ignore,
        context: trig_ctx.context_ptr().as_ptr(),
        data: 0,
    };

    let ret = unsafe {
        sys::fi_trecvmsg(ep_raw, &fi_msg, translate_recv_flags(flags) | sys::FI_TRIGGER)
    };
    check(ret, "fi_trecvmsg")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Errc;

    #[test]
    fn empty_deferred_work_rejects_operations() {
        let mut work = DeferredWork::default();
        assert!(!work.is_pending());
        assert_eq!(work.cancel().unwrap_err().errc(), Errc::InvalidArgument);
    }

    /// 空 domain / 空计数器上的入队在守卫层被拒绝。
    #[test]
    fn counter_ops_reject_empty_resources() {
        let domain = Domain::default();
        let gate = Counter::default();
        let target = Counter::default();
        let trigger = ThresholdCondition::new(&gate, 2);
        assert_eq!(
            DeferredWork::counter_add(&domain, &trigger, &target, 1)
                .unwrap_err()
                .errc(),
            Errc::InvalidArgument
        );
        assert_eq!(
            flush_work(&domain).unwrap_err().errc(),
            Errc::InvalidArgument
        );
        assert_eq!(
            flush_work_for(&domain, &gate).unwrap_err().errc(),
            Errc::InvalidArgument
        );
    }

    /// 触发上下文的触发头位于偏移 0，阈值字段按条件填写。
    #[test]
    fn triggered_context_layout_and_threshold() {
        let gate = Counter::default();
        let cond = ThresholdCondition::new(&gate, 7);
        let ctx = TriggeredContext::threshold(&cond);
        assert_eq!(ctx.context_ptr().as_ptr(), (&raw const ctx).cast_mut().cast());
        assert_eq!(ctx.trig.event_type, sys::FI_TRIGGER_THRESHOLD);
        let threshold = unsafe { ctx.trig.trigger.threshold.threshold };
        assert_eq!(threshold, 7);
    }
}
