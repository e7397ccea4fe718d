//! # ctx 模块说明
//!
//! ## 角色定位（Why）
//! - 提交上下文把 provider 要求的定长刮写区（`fi_context2`）与用户侧延续
//!   （回调 / waker / 一次性承诺）背靠背绑在一起：刮写区固定在偏移 0，
//!   完成路径拿到条目里的上下文指针即可零开销恢复归属对象；
//! - 每个已提交操作恰好拥有一个上下文；投递价值/错误/取消三者之一后
//!   上下文随即回收——“恰好触发一次”由 Rust 所有权表达：触发按值消耗
//!   `Box<OpContext>`，重复触发无从写出。
//!
//! ## 契约（What）
//! - 上下文在在途期间地址必须稳定：以 `Box` 钉住，提交即 `into_raw` 移交；
//! - 同步被 fabric 拒绝的提交仍然触发错误通道（[`submit_with`] 负责），
//!   不存在丢失的延续；
//! - 小callable（≤ 4 指针宽）内联存储，更大的装箱；内联路径的移动不抛。

use std::sync::{Arc, Mutex};
use std::task::Waker;

use futures::channel::oneshot;
use weft_sys as sys;

use crate::cq::CompletionEvent;
use crate::error::{Errc, FabricError, Result};
use crate::mem::{self, MemoryResource};
use crate::types::ContextPtr;

// ---------------------------------------------------------------------------
// 小缓冲一次性 callable
// ---------------------------------------------------------------------------

/// 内联存储上限：四个指针宽。
const SMALL_FN_STORAGE: usize = 4 * size_of::<usize>();

struct SmallFnVtable<A> {
    /// 取出 callable 并调用（消耗所有权）。
    call: unsafe fn(*mut u8, A),
    /// 未调用即销毁时的清理。
    drop_in_place: unsafe fn(*mut u8),
}

unsafe fn call_inline<A, F: FnOnce(A)>(storage: *mut u8, arg: A) {
    let f = unsafe { storage.cast::<F>().read() };
    f(arg);
}

unsafe fn drop_inline<A, F: FnOnce(A)>(storage: *mut u8) {
    unsafe { storage.cast::<F>().drop_in_place() };
}

unsafe fn call_boxed<A, F: FnOnce(A)>(storage: *mut u8, arg: A) {
    let boxed = unsafe { Box::from_raw(storage.cast::<*mut F>().read()) };
    boxed(arg);
}

unsafe fn drop_boxed<A, F: FnOnce(A)>(storage: *mut u8) {
    drop(unsafe { Box::from_raw(storage.cast::<*mut F>().read()) });
}

struct InlineVtable<A, F>(core::marker::PhantomData<(A, F)>);

impl<A, F: FnOnce(A)> InlineVtable<A, F> {
    const VTABLE: SmallFnVtable<A> = SmallFnVtable {
        call: call_inline::<A, F>,
        drop_in_place: drop_inline::<A, F>,
    };
    const BOXED: SmallFnVtable<A> = SmallFnVtable {
        call: call_boxed::<A, F>,
        drop_in_place: drop_boxed::<A, F>,
    };
}

/// 一次性 callable 的小缓冲存储。
///
/// 尺寸与对齐都装得下时内联存放（移动即逐字节拷贝，不抛）；
/// 否则装箱，存储区只保存指针。
pub(crate) struct SmallFn<A: 'static> {
    storage: core::mem::MaybeUninit<[usize; 4]>,
    vtable: Option<&'static SmallFnVtable<A>>,
}

// callable 以 `Send` 约束收入，存储本身只是字节。
unsafe impl<A: Send> Send for SmallFn<A> {}

impl<A: 'static> SmallFn<A> {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: FnOnce(A) + Send + 'static,
    {
        let mut storage = core::mem::MaybeUninit::<[usize; 4]>::uninit();
        let vtable = if size_of::<F>() <= SMALL_FN_STORAGE && align_of::<F>() <= align_of::<[usize; 4]>()
        {
            unsafe { storage.as_mut_ptr().cast::<F>().write(f) };
            &InlineVtable::<A, F>::VTABLE
        } else {
            let boxed = Box::into_raw(Box::new(f));
            unsafe { storage.as_mut_ptr().cast::<*mut F>().write(boxed) };
            &InlineVtable::<A, F>::BOXED
        };
        Self {
            storage,
            vtable: Some(vtable),
        }
    }

    /// 调用并消耗；每个实例至多调用一次。
    pub(crate) fn call(mut self, arg: A) {
        if let Some(vtable) = self.vtable.take() {
            unsafe { (vtable.call)(self.storage.as_mut_ptr().cast(), arg) };
        }
    }
}

impl<A: 'static> Drop for SmallFn<A> {
    fn drop(&mut self) {
        if let Some(vtable) = self.vtable.take() {
            unsafe { (vtable.drop_in_place)(self.storage.as_mut_ptr().cast()) };
        }
    }
}

// ---------------------------------------------------------------------------
// 延续与结局
// ---------------------------------------------------------------------------

/// 一个操作的最终结局。
#[derive(Debug)]
pub enum OpOutcome {
    /// 正常完成。
    Completed(CompletionEvent),
    /// 以错误收场。
    Failed(FabricError),
    /// 被取消。
    Cancelled,
}

enum Continuation {
    /// 三通道回调。
    Callback {
        on_value: SmallFn<CompletionEvent>,
        on_error: SmallFn<FabricError>,
        on_cancelled: SmallFn<()>,
    },
    /// executor 无关的挂起任务：结局写入槽位后唤醒。
    Waker {
        waker: Waker,
        slot: Arc<Mutex<Option<OpOutcome>>>,
    },
    /// 一次性承诺。
    Promise(oneshot::Sender<OpOutcome>),
}

// ---------------------------------------------------------------------------
// 提交上下文
// ---------------------------------------------------------------------------

/// 单个已提交操作的上下文：provider 刮写区 + 用户延续。
#[repr(C)]
pub struct OpContext {
    // 必须是首字段：完成条目回传的指针直接指向这里。
    fi_ctx: sys::fi_context2,
    continuation: Option<Continuation>,
}

const _: () = assert!(core::mem::offset_of!(OpContext, fi_ctx) == 0);

// 刮写区是 provider 专用字节，延续的各分量均以 `Send` 约束收入；
// 上下文随提交移交、在完成线程回收，跨线程转移是协议的一部分。
unsafe impl Send for OpContext {}

impl OpContext {
    fn with_continuation(continuation: Continuation) -> Box<OpContext> {
        Box::new(OpContext {
            fi_ctx: sys::fi_context2::default(),
            continuation: Some(continuation),
        })
    }

    /// 三通道回调上下文。
    pub fn callback<V, E, C>(on_value: V, on_error: E, on_cancelled: C) -> Box<OpContext>
    where
        V: FnOnce(CompletionEvent) + Send + 'static,
        E: FnOnce(FabricError) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        Self::with_continuation(Continuation::Callback {
            on_value: SmallFn::new(on_value),
            on_error: SmallFn::new(on_error),
            on_cancelled: SmallFn::new(move |()| on_cancelled()),
        })
    }

    /// 只关心成功通道的回调上下文；错误与取消静默丢弃。
    pub fn on_complete<V>(on_value: V) -> Box<OpContext>
    where
        V: FnOnce(CompletionEvent) + Send + 'static,
    {
        Self::callback(on_value, |_| {}, || {})
    }

    /// 挂起任务上下文：结局写入 `slot` 后唤醒 `waker`。
    pub fn with_waker(waker: Waker, slot: Arc<Mutex<Option<OpOutcome>>>) -> Box<OpContext> {
        Self::with_continuation(Continuation::Waker { waker, slot })
    }

    /// 一次性承诺上下文，返回可等待的未来。
    pub fn promise() -> (Box<OpContext>, CompletionFuture) {
        let (tx, rx) = oneshot::channel();
        (
            Self::with_continuation(Continuation::Promise(tx)),
            CompletionFuture { receiver: rx },
        )
    }

    /// 提交用的上下文指针（即自身地址，刮写区在偏移 0）。
    pub fn context_ptr(&self) -> ContextPtr {
        ContextPtr::from_raw((&raw const self.fi_ctx).cast_mut().cast())
    }

    /// 从完成条目的上下文指针恢复所有权。
    ///
    /// # Safety
    /// `ptr` 必须来自本类型经 [`submit_with`]（或 `Box::into_raw`）移交的
    /// 上下文，且尚未被恢复过。
    pub unsafe fn from_completion(ptr: ContextPtr) -> Option<Box<OpContext>> {
        let raw = ptr.as_ptr();
        if raw.is_null() {
            None
        } else {
            Some(unsafe { Box::from_raw(raw.cast::<OpContext>()) })
        }
    }

    fn fire(mut self: Box<Self>, outcome: OpOutcome) {
        let Some(continuation) = self.continuation.take() else {
            return;
        };
        match continuation {
            Continuation::Callback {
                on_value,
                on_error,
                on_cancelled,
            } => match outcome {
                OpOutcome::Completed(event) => on_value.call(event),
                OpOutcome::Failed(err) => on_error.call(err),
                OpOutcome::Cancelled => on_cancelled.call(()),
            },
            Continuation::Waker { waker, slot } => {
                if let Ok(mut guard) = slot.lock() {
                    *guard = Some(outcome);
                }
                waker.wake();
            }
            Continuation::Promise(sender) => {
                // 接收端已放弃时结局无人认领，丢弃即可。
                let _ = sender.send(outcome);
            }
        }
    }

    /// 触发价值通道并回收上下文。
    pub fn fire_value(self: Box<Self>, event: CompletionEvent) {
        self.fire(OpOutcome::Completed(event));
    }

    /// 触发错误通道并回收上下文。
    pub fn fire_error(self: Box<Self>, err: FabricError) {
        self.fire(OpOutcome::Failed(err));
    }

    /// 触发取消通道并回收上下文。
    pub fn fire_cancelled(self: Box<Self>) {
        self.fire(OpOutcome::Cancelled);
    }
}

/// 以上下文提交一次操作。
///
/// 把上下文所有权移交 fabric 后调用 `post`；同步拒绝时收回所有权并
/// 触发错误通道——延续在任何路径上都不会丢失。
pub fn submit_with<F>(ctx: Box<OpContext>, post: F) -> Result<()>
where
    F: FnOnce(ContextPtr) -> Result<()>,
{
    let ptr = Box::into_raw(ctx);
    let context_ptr = ContextPtr::from_raw(ptr.cast());
    match post(context_ptr) {
        Ok(()) => Ok(()),
        Err(err) => {
            let ctx = unsafe { Box::from_raw(ptr) };
            ctx.fire_error(err);
            Err(err)
        }
    }
}

/// 完成路径的标准分发：错误→错误通道、取消→取消通道、其余→价值通道。
///
/// # Safety
/// `event.context` 必须来自 [`submit_with`] 移交且尚未分发过的上下文。
pub unsafe fn dispatch_completion(event: &CompletionEvent) {
    let Some(ctx) = (unsafe { OpContext::from_completion(event.context) }) else {
        return;
    };
    match event.error {
        None => ctx.fire_value(*event),
        Some(err) if err.errc == Errc::Canceled => ctx.fire_cancelled(),
        Some(err) => ctx.fire_error(err.to_fabric_error()),
    }
}

/// 承诺上下文对应的未来。
pub struct CompletionFuture {
    receiver: oneshot::Receiver<OpOutcome>,
}

impl core::future::Future for CompletionFuture {
    type Output = Result<CompletionEvent>;

    fn poll(
        mut self: core::pin::Pin<&mut Self>,
        cx: &mut core::task::Context<'_>,
    ) -> core::task::Poll<Self::Output> {
        use core::task::Poll;
        match core::pin::Pin::new(&mut self.receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(OpOutcome::Completed(event))) => Poll::Ready(Ok(event)),
            Poll::Ready(Ok(OpOutcome::Failed(err))) => Poll::Ready(Err(err)),
            Poll::Ready(Ok(OpOutcome::Cancelled)) | Poll::Ready(Err(_)) => {
                Poll::Ready(Err(FabricError::new(Errc::Canceled)))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 裸请求上下文与上下文池
// ---------------------------------------------------------------------------

/// 不携带延续的裸操作上下文：刮写区 + 用户数据指针。
///
/// 适合调用方自行轮询完成队列、以指针判别归属的场景。
#[repr(C)]
pub struct RequestContext {
    fi_ctx: sys::fi_context2,
    user_data: *mut core::ffi::c_void,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            fi_ctx: sys::fi_context2::default(),
            user_data: core::ptr::null_mut(),
        }
    }
}

const _: () = assert!(core::mem::offset_of!(RequestContext, fi_ctx) == 0);

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 提交用的上下文指针。
    pub fn context_ptr(&self) -> ContextPtr {
        ContextPtr::from_raw((&raw const self.fi_ctx).cast_mut().cast())
    }

    /// 挂载用户数据指针。
    pub fn set_user_data<T>(&mut self, data: *mut T) {
        self.user_data = data.cast();
    }

    /// 读取用户数据指针。
    pub fn user_data<T>(&self) -> *mut T {
        self.user_data.cast()
    }

    /// 从完成条目的上下文指针恢复（偏移 0 逆向转换）。
    ///
    /// # Safety
    /// `ptr` 必须指向仍然存活的 [`RequestContext`] 的刮写区；返回指针的
    /// 解引用由调用方继续负责。
    pub unsafe fn from_fi_context(ptr: ContextPtr) -> Option<*mut RequestContext> {
        let raw = ptr.as_ptr();
        if raw.is_null() {
            None
        } else {
            Some(raw.cast::<RequestContext>())
        }
    }
}

struct PoolEntry {
    ctx: RequestContext,
    in_use: bool,
}

/// 裸请求上下文的复用池。
///
/// 槽位经进程缺省内存源逐个分配，地址在池生命周期内稳定——在途操作
/// 持有的刮写区指针不会因扩容失效。
pub struct ContextPool {
    resource: &'static dyn MemoryResource,
    entries: Mutex<Vec<core::ptr::NonNull<PoolEntry>>>,
}

unsafe impl Send for ContextPool {}
unsafe impl Sync for ContextPool {}

impl ContextPool {
    /// 以进程缺省内存源创建池并预热 `initial_capacity` 个槽位。
    pub fn new(initial_capacity: usize) -> Result<ContextPool> {
        let pool = ContextPool {
            resource: mem::default_resource(),
            entries: Mutex::new(Vec::with_capacity(initial_capacity)),
        };
        {
            let mut entries = pool.entries.lock().expect("context pool lock");
            for _ in 0..initial_capacity {
                entries.push(pool.allocate_entry()?);
            }
        }
        Ok(pool)
    }

    fn allocate_entry(&self) -> Result<core::ptr::NonNull<PoolEntry>> {
        let layout = core::alloc::Layout::new::<PoolEntry>();
        let raw = self.resource.allocate(layout).cast::<PoolEntry>();
        let Some(ptr) = core::ptr::NonNull::new(raw) else {
            return Err(FabricError::new(Errc::NoMemory).with_context("context pool"));
        };
        unsafe {
            ptr.as_ptr().write(PoolEntry {
                ctx: RequestContext::default(),
                in_use: false,
            });
        }
        Ok(ptr)
    }

    /// 取出一个空闲上下文；池满时向内存源追加槽位。
    pub fn acquire(&self) -> Result<*mut RequestContext> {
        let mut entries = self.entries.lock().expect("context pool lock");
        for entry in entries.iter() {
            let entry_ref = unsafe { &mut *entry.as_ptr() };
            if !entry_ref.in_use {
                entry_ref.in_use = true;
                return Ok(&raw mut entry_ref.ctx);
            }
        }

        let ptr = self.allocate_entry()?;
        unsafe { (*ptr.as_ptr()).in_use = true };
        entries.push(ptr);
        Ok(unsafe { &raw mut (*ptr.as_ptr()).ctx })
    }

    /// 归还上下文；内容重置为空。
    pub fn release(&self, ctx: *mut RequestContext) {
        let entries = self.entries.lock().expect("context pool lock");
        for entry in entries.iter() {
            // ctx 是槽位首字段，地址相同即归属本槽。
            if entry.as_ptr().cast::<RequestContext>() == ctx {
                let entry_ref = unsafe { &mut *entry.as_ptr() };
                entry_ref.ctx = RequestContext::default();
                entry_ref.in_use = false;
                return;
            }
        }
    }

    /// 槽位总数。
    pub fn len(&self) -> usize {
        self.entries.lock().expect("context pool lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 在用槽位数。
    pub fn in_use_count(&self) -> usize {
        self.entries
            .lock()
            .expect("context pool lock")
            .iter()
            .filter(|e| unsafe { (*e.as_ptr()).in_use })
            .count()
    }
}

impl Drop for ContextPool {
    fn drop(&mut self) {
        let entries = self.entries.get_mut().expect("context pool lock");
        let layout = core::alloc::Layout::new::<PoolEntry>();
        for entry in entries.drain(..) {
            unsafe {
                entry.as_ptr().drop_in_place();
                self.resource.deallocate(entry.as_ptr().cast(), layout);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_event() -> CompletionEvent {
        CompletionEvent {
            bytes_transferred: 64,
            len: 64,
            ..CompletionEvent::default()
        }
    }

    /// 价值通道恰好触发一次，其余通道不触发。
    #[test]
    fn callback_value_channel_fires_exactly_once() {
        static VALUE: AtomicUsize = AtomicUsize::new(0);
        static ERROR: AtomicUsize = AtomicUsize::new(0);
        static CANCEL: AtomicUsize = AtomicUsize::new(0);
        VALUE.store(0, Ordering::SeqCst);
        ERROR.store(0, Ordering::SeqCst);
        CANCEL.store(0, Ordering::SeqCst);

        let ctx = OpContext::callback(
            |event| {
                assert_eq!(event.bytes_transferred, 64);
                VALUE.fetch_add(1, Ordering::SeqCst);
            },
            |_| {
                ERROR.fetch_add(1, Ordering::SeqCst);
            },
            || {
                CANCEL.fetch_add(1, Ordering::SeqCst);
            },
        );
        ctx.fire_value(make_event());
        assert_eq!(VALUE.load(Ordering::SeqCst), 1, "价值通道必须恰好触发一次");
        assert_eq!(ERROR.load(Ordering::SeqCst), 0);
        assert_eq!(CANCEL.load(Ordering::SeqCst), 0);
    }

    /// 完成分发规则：错误→错误通道，取消→取消通道。
    #[test]
    fn dispatch_routes_by_completion_status() {
        static ERROR: AtomicUsize = AtomicUsize::new(0);
        static CANCEL: AtomicUsize = AtomicUsize::new(0);
        ERROR.store(0, Ordering::SeqCst);
        CANCEL.store(0, Ordering::SeqCst);

        // 错误结局。
        let ctx = OpContext::callback(
            |_| panic!("错误结局不得走价值通道"),
            |err| {
                assert_eq!(err.errc(), Errc::IoError);
                ERROR.fetch_add(1, Ordering::SeqCst);
            },
            || panic!("错误结局不得走取消通道"),
        );
        let mut event = make_event();
        event.context = ctx.context_ptr();
        core::mem::forget(ctx);
        event.error = Some(crate::cq::CompletionError {
            errc: Errc::IoError,
            prov_errno: 5,
            err_data: core::ptr::null(),
            err_data_size: 0,
        });
        unsafe { dispatch_completion(&event) };
        assert_eq!(ERROR.load(Ordering::SeqCst), 1);

        // 取消结局。
        let ctx = OpContext::callback(
            |_| panic!("取消结局不得走价值通道"),
            |_| panic!("取消结局不得走错误通道"),
            || {
                CANCEL.fetch_add(1, Ordering::SeqCst);
            },
        );
        let mut event = make_event();
        event.context = ctx.context_ptr();
        core::mem::forget(ctx);
        event.error = Some(crate::cq::CompletionError {
            errc: Errc::Canceled,
            prov_errno: 125,
            err_data: core::ptr::null(),
            err_data_size: 0,
        });
        unsafe { dispatch_completion(&event) };
        assert_eq!(CANCEL.load(Ordering::SeqCst), 1);
    }

    /// 同步拒绝的提交仍触发错误通道，所有权回收。
    #[test]
    fn submit_with_fires_error_on_synchronous_rejection() {
        static ERROR: AtomicUsize = AtomicUsize::new(0);
        ERROR.store(0, Ordering::SeqCst);

        let ctx = OpContext::callback(
            |_| panic!("同步拒绝不得走价值通道"),
            |err| {
                assert_eq!(err.errc(), Errc::Again);
                ERROR.fetch_add(1, Ordering::SeqCst);
            },
            || {},
        );
        let result = submit_with(ctx, |_| Err(FabricError::new(Errc::Again)));
        assert_eq!(result.unwrap_err().errc(), Errc::Again);
        assert_eq!(ERROR.load(Ordering::SeqCst), 1, "错误通道必须在返回前触发");
    }

    /// 承诺路径：未来解析为完成事件。
    #[test]
    fn promise_future_resolves_with_event() {
        let (ctx, future) = OpContext::promise();
        ctx.fire_value(make_event());
        let event = futures::executor::block_on(future).expect("承诺必须兑现");
        assert_eq!(event.bytes_transferred, 64);

        let (ctx, future) = OpContext::promise();
        ctx.fire_cancelled();
        let err = futures::executor::block_on(future).unwrap_err();
        assert_eq!(err.errc(), Errc::Canceled);
    }

    /// 大 callable 落入装箱路径，行为与内联一致。
    #[test]
    fn boxed_callable_path_behaves_like_inline() {
        static VALUE: AtomicUsize = AtomicUsize::new(0);
        VALUE.store(0, Ordering::SeqCst);
        // 5 指针宽的捕获超出内联上限。
        let payload = [0usize; 5];
        let ctx = OpContext::on_complete(move |_| {
            let _ = payload;
            VALUE.fetch_add(1, Ordering::SeqCst);
        });
        ctx.fire_value(make_event());
        assert_eq!(VALUE.load(Ordering::SeqCst), 1);
    }

    /// 未触发即销毁的 callable 正常释放（Drop 路径）。
    #[test]
    fn unfired_context_drops_cleanly() {
        let ctx = OpContext::on_complete(|_| panic!("不得触发"));
        drop(ctx);

        let boxed_payload = vec![1u8; 128];
        let ctx = OpContext::on_complete(move |_| {
            let _ = &boxed_payload;
        });
        drop(ctx);
    }

    #[test]
    fn request_context_back_offset_round_trip() {
        let mut ctx = RequestContext::new();
        let mut marker = 42u32;
        ctx.set_user_data(&mut marker);

        let ptr = ctx.context_ptr();
        let recovered = unsafe { RequestContext::from_fi_context(ptr) }.expect("非空指针");
        assert_eq!(recovered, &raw mut ctx, "刮写区位于偏移 0，恢复必须得到原对象");
        assert_eq!(unsafe { *(*recovered).user_data::<u32>() }, 42);
    }

    #[test]
    fn context_pool_reuses_released_slots() {
        let pool = ContextPool::new(2).expect("池创建失败");
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.in_use_count(), 0);

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!(pool.in_use_count(), 2);

        // 池满时扩容。
        let c = pool.acquire().unwrap();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.in_use_count(), 3);

        pool.release(b);
        assert_eq!(pool.in_use_count(), 2);
        let d = pool.acquire().unwrap();
        assert_eq!(d, b, "释放的槽位应被复用");
        assert_eq!(pool.len(), 3);

        pool.release(a);
        pool.release(c);
        pool.release(d);
        assert_eq!(pool.in_use_count(), 0);
    }
}
