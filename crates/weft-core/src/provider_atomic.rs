//! # provider_atomic 模块说明
//!
//! ## 角色定位（Why）
//! - 不同 provider 的原子能力差异巨大：Verbs/Slingshot/共享内存/UCX 由硬件
//!   原生执行，EFA/TCP 只能以“RMA 读 → 本地改 → RMA 写回”的分段方式模拟；
//! - 选择发生在编译期：[`AtomicStrategy`] 按 provider 标签各给一个实现，
//!   单态化后不存在运行时分支。
//!
//! ## 契约（What）
//! - 分段路径要求上下文先配置覆盖暂存缓冲的内存区域，否则快速失败
//!   `not_supported`；
//! - 分段 CAS 的语义：读出原值 → 写入 `result` → 仅当 `current == compare`
//!   时写回 `swap`，否则不再发出写；
//! - 分段路径不具备原子性保证（读与写回之间存在窗口），语义上等同
//!   单写者场景下的读改写。

use crate::atomic::{self, AtomicOp, AtomicType};
use crate::domain::{Domain, DomainInner};
use crate::endpoint::ActiveEndpoint;
use crate::error::{Errc, FabricError, Result, empty_object};
use crate::mr::{MemoryRegion, RemoteMemory};
use crate::provider::{Efa, ProviderTraits, Shm, Slingshot, Tcp, Ucx, Verbs};
use crate::rma;
use crate::types::{ContextPtr, MrAccess};

/// 暂存缓冲尺寸：容纳最大原子元素（128 位）并对齐到缓存行。
pub const STAGING_BUFFER_LEN: usize = 64;

#[repr(C, align(64))]
struct StagingBuffer([u8; STAGING_BUFFER_LEN]);

/// 可按 provider 策略执行的原子操作描述符。
pub trait ProviderAtomicOp {
    /// 以硬件原生原子执行。
    ///
    /// # Safety
    /// 描述符引用的缓冲、结果指针与上下文必须活到完成事件返回。
    unsafe fn execute_native(&self) -> Result<()>;

    /// 以 RMA 读改写模拟执行。
    ///
    /// # Safety
    /// 同 [`execute_native`](Self::execute_native)；`staging_mr` 必须覆盖
    /// `staging` 缓冲。
    unsafe fn execute_staged(
        &self,
        staging_mr: &MemoryRegion,
        staging: &mut [u8],
    ) -> Result<()>;
}

/// 取回加法描述符。
pub struct FetchAddOp<'a, T: AtomicType> {
    pub ep: &'a ActiveEndpoint,
    pub operand: T,
    /// 原值写入位置；空指针表示丢弃。
    pub result: *mut T,
    pub mr_result: &'a MemoryRegion,
    pub remote: RemoteMemory,
    pub context: ContextPtr,
}

impl<T: AtomicType> ProviderAtomicOp for FetchAddOp<'_, T> {
    unsafe fn execute_native(&self) -> Result<()> {
        unsafe {
            atomic::fetch_add(
                self.ep,
                &self.operand,
                self.result,
                self.mr_result,
                self.remote,
                self.context,
            )
        }
    }

    unsafe fn execute_staged(
        &self,
        staging_mr: &MemoryRegion,
        staging: &mut [u8],
    ) -> Result<()> {
        unsafe {
            staged_rmw(
                self.ep,
                AtomicOp::Sum,
                self.operand,
                self.result,
                staging_mr,
                staging,
                self.remote,
                self.context,
            )
        }
    }
}

/// 纯加法描述符（无取回）。
pub struct AtomicAddOp<'a, T: AtomicType> {
    pub ep: &'a ActiveEndpoint,
    pub operand: T,
    pub remote: RemoteMemory,
    pub context: ContextPtr,
}

impl<T: AtomicType> ProviderAtomicOp for AtomicAddOp<'_, T> {
    unsafe fn execute_native(&self) -> Result<()> {
        unsafe { atomic::add(self.ep, &self.operand, self.remote, self.context) }
    }

    unsafe fn execute_staged(
        &self,
        staging_mr: &MemoryRegion,
        staging: &mut [u8],
    ) -> Result<()> {
        unsafe {
            staged_rmw(
                self.ep,
                AtomicOp::Sum,
                self.operand,
                core::ptr::null_mut(),
                staging_mr,
                staging,
                self.remote,
                self.context,
            )
        }
    }
}

/// 比较交换描述符。
pub struct CompareSwapOp<'a, T: AtomicType> {
    pub ep: &'a ActiveEndpoint,
    pub compare: T,
    pub swap: T,
    /// 原值写入位置；空指针表示丢弃。
    pub old_value: *mut T,
    pub mr_old: &'a MemoryRegion,
    pub remote: RemoteMemory,
    pub context: ContextPtr,
}

impl<T: AtomicType> ProviderAtomicOp for CompareSwapOp<'_, T> {
    unsafe fn execute_native(&self) -> Result<()> {
        unsafe {
            atomic::cas(
                self.ep,
                &self.compare,
                &self.swap,
                self.old_value,
                self.mr_old,
                self.remote,
                self.context,
            )
        }
    }

    unsafe fn execute_staged(
        &self,
        staging_mr: &MemoryRegion,
        staging: &mut [u8],
    ) -> Result<()> {
        let size = size_of::<T>();
        debug_assert!(size <= staging.len());

        let current = unsafe { staged_read_current::<T>(self.ep, staging_mr, staging, self.remote)? };

        if !self.old_value.is_null() {
            unsafe { self.old_value.write(current) };
        }

        // 比较不中：原值已取回，不再发出写回。
        if current != self.compare {
            return Ok(());
        }

        unsafe {
            core::ptr::copy_nonoverlapping(
                (&raw const self.swap).cast::<u8>(),
                staging.as_mut_ptr(),
                size,
            );
            rma::write(
                self.ep,
                &staging[..size],
                staging_mr.descriptor(),
                self.remote,
                self.context,
            )
        }
    }
}

/// 通用取回型描述符：携带操作码。
pub struct GenericFetchOp<'a, T: AtomicType> {
    pub ep: &'a ActiveEndpoint,
    pub op: AtomicOp,
    pub operand: T,
    pub result: *mut T,
    pub mr_result: &'a MemoryRegion,
    pub remote: RemoteMemory,
    pub context: ContextPtr,
}

impl<T: AtomicType> ProviderAtomicOp for GenericFetchOp<'_, T> {
    unsafe fn execute_native(&self) -> Result<()> {
        unsafe {
            atomic::fetch(
                self.ep,
                self.op,
                &self.operand,
                self.result,
                1,
                None,
                Some(self.mr_result),
                self.remote,
                self.context,
            )
        }
    }

    unsafe fn execute_staged(
        &self,
        staging_mr: &MemoryRegion,
        staging: &mut [u8],
    ) -> Result<()> {
        unsafe {
            staged_rmw(
                self.ep,
                self.op,
                self.operand,
                self.result,
                staging_mr,
                staging,
                self.remote,
                self.context,
            )
        }
    }
}

/// 分段路径公共骨架：读出原值 → 报告 → 本地改 → 写回。
unsafe fn staged_rmw<T: AtomicType>(
    ep: &ActiveEndpoint,
    op: AtomicOp,
    operand: T,
    result: *mut T,
    staging_mr: &MemoryRegion,
    staging: &mut [u8],
    remote: RemoteMemory,
    context: ContextPtr,
) -> Result<()> {
    let size = size_of::<T>();
    debug_assert!(size <= staging.len());

    let current = unsafe { staged_read_current::<T>(ep, staging_mr, staging, remote)? };

    if !result.is_null() {
        unsafe { result.write(current) };
    }

    let new_value = T::local_rmw(op, current, operand);
    unsafe {
        core::ptr::copy_nonoverlapping(
            (&raw const new_value).cast::<u8>(),
            staging.as_mut_ptr(),
            size,
        );
        rma::write(ep, &staging[..size], staging_mr.descriptor(), remote, context)
    }
}

unsafe fn staged_read_current<T: AtomicType>(
    ep: &ActiveEndpoint,
    staging_mr: &MemoryRegion,
    staging: &mut [u8],
    remote: RemoteMemory,
) -> Result<T> {
    let size = size_of::<T>();
    unsafe {
        rma::read(
            ep,
            &mut staging[..size],
            staging_mr.descriptor(),
            remote,
            ContextPtr::null(),
        )?;
    }

    let mut current = core::mem::MaybeUninit::<T>::uninit();
    unsafe {
        core::ptr::copy_nonoverlapping(staging.as_ptr(), current.as_mut_ptr().cast::<u8>(), size);
        Ok(current.assume_init())
    }
}

/// provider 标签的原子执行策略；每个标签一份实现。
pub trait AtomicStrategy: ProviderTraits {
    /// 按策略执行描述符。
    ///
    /// # Safety
    /// 同 [`ProviderAtomicOp::execute_native`]。
    unsafe fn dispatch<O: ProviderAtomicOp>(ctx: &mut AtomicContext<Self>, op: &O) -> Result<()>
    where
        Self: Sized;
}

unsafe fn dispatch_native<P: ProviderTraits, O: ProviderAtomicOp>(
    _ctx: &mut AtomicContext<P>,
    op: &O,
) -> Result<()> {
    unsafe { op.execute_native() }
}

unsafe fn dispatch_staged<P: ProviderTraits, O: ProviderAtomicOp>(
    ctx: &mut AtomicContext<P>,
    op: &O,
) -> Result<()> {
    let AtomicContext {
        staging_mr,
        staging,
        ..
    } = ctx;
    let Some(mr) = staging_mr.as_ref() else {
        return Err(FabricError::new(Errc::NotSupported).with_context("staged atomics"));
    };
    unsafe { op.execute_staged(mr, &mut staging.0) }
}

macro_rules! native_strategy {
    ($($provider:ty),+ $(,)?) => {
        $(
            impl AtomicStrategy for $provider {
                unsafe fn dispatch<O: ProviderAtomicOp>(
                    ctx: &mut AtomicContext<Self>,
                    op: &O,
                ) -> Result<()> {
                    unsafe { dispatch_native(ctx, op) }
                }
            }
        )+
    };
}

macro_rules! staged_strategy {
    ($($provider:ty),+ $(,)?) => {
        $(
            impl AtomicStrategy for $provider {
                unsafe fn dispatch<O: ProviderAtomicOp>(
                    ctx: &mut AtomicContext<Self>,
                    op: &O,
                ) -> Result<()> {
                    unsafe { dispatch_staged(ctx, op) }
                }
            }
        )+
    };
}

native_strategy!(Verbs, Slingshot, Shm, Ucx);
staged_strategy!(Efa, Tcp);

/// provider 感知的原子执行上下文。
///
/// # 教案式说明
/// - **契约 (What)**：持有 domain 引用、可选暂存内存区域与 64 字节对齐的
///   暂存缓冲；缓冲装箱以保证注册后地址稳定（上下文自身可以随意移动）；
/// - **风险 (Trade-offs)**：暂存缓冲同一时刻只支撑一个在途分段操作；
///   需要并发分段原子时应每流各建一个上下文。
pub struct AtomicContext<P: ProviderTraits> {
    staging_mr: Option<MemoryRegion>,
    staging: Box<StagingBuffer>,
    _domain: Option<std::sync::Arc<DomainInner>>,
    _provider: core::marker::PhantomData<P>,
}

impl<P: ProviderTraits> AtomicContext<P> {
    /// 创建不带暂存区域的上下文（原生原子 provider 足够）。
    pub fn new(domain: &Domain) -> Result<Self> {
        let Some(domain_inner) = domain.inner() else {
            return Err(empty_object("atomic_context::new"));
        };
        Ok(Self {
            staging_mr: None,
            staging: Box::new(StagingBuffer([0; STAGING_BUFFER_LEN])),
            _domain: Some(std::sync::Arc::clone(domain_inner)),
            _provider: core::marker::PhantomData,
        })
    }

    #[cfg(test)]
    fn detached() -> Self {
        Self {
            staging_mr: None,
            staging: Box::new(StagingBuffer([0; STAGING_BUFFER_LEN])),
            _domain: None,
            _provider: core::marker::PhantomData,
        }
    }

    /// 注册内部暂存缓冲并启用分段路径。
    pub fn register_staging(&mut self, domain: &Domain) -> Result<()> {
        let buf = self.staging.0.as_mut_ptr();
        // 缓冲在 Box 内地址稳定；注册读写权限以覆盖读改写两个方向。
        let mr = unsafe {
            MemoryRegion::register_host(
                domain,
                buf,
                STAGING_BUFFER_LEN,
                MrAccess::READ | MrAccess::WRITE,
            )?
        };
        self.staging_mr = Some(mr);
        Ok(())
    }

    /// 直接挂载外部暂存内存区域（必须覆盖后续分段操作的暂存范围）。
    pub fn set_staging_mr(&mut self, mr: MemoryRegion) {
        self.staging_mr = Some(mr);
    }

    /// 是否已配置暂存区域。
    pub fn has_staging_mr(&self) -> bool {
        self.staging_mr.is_some()
    }

    /// 该 provider 是否必须走分段路径。
    pub const fn requires_staging() -> bool {
        P::USES_STAGED_ATOMICS
    }

    /// 按 provider 策略执行描述符。
    ///
    /// # Safety
    /// 同 [`ProviderAtomicOp::execute_native`]。
    pub unsafe fn execute<O: ProviderAtomicOp>(&mut self, op: &O) -> Result<()>
    where
        P: AtomicStrategy,
    {
        unsafe { P::dispatch(self, op) }
    }
}

/// provider 感知的取回加法。
///
/// # Safety
/// 同 [`ProviderAtomicOp::execute_native`]。
pub unsafe fn fetch_add<P: AtomicStrategy, T: AtomicType>(
    ctx: &mut AtomicContext<P>,
    ep: &ActiveEndpoint,
    operand: T,
    result: *mut T,
    mr_result: &MemoryRegion,
    remote: RemoteMemory,
    context: ContextPtr,
) -> Result<()> {
    unsafe {
        ctx.execute(&FetchAddOp {
            ep,
            operand,
            result,
            mr_result,
            remote,
            context,
        })
    }
}

/// provider 感知的纯加法。
///
/// # Safety
/// 同 [`ProviderAtomicOp::execute_native`]。
pub unsafe fn add<P: AtomicStrategy, T: AtomicType>(
    ctx: &mut AtomicContext<P>,
    ep: &ActiveEndpoint,
    operand: T,
    remote: RemoteMemory,
    context: ContextPtr,
) -> Result<()> {
    unsafe {
        ctx.execute(&AtomicAddOp {
            ep,
            operand,
            remote,
            context,
        })
    }
}

/// provider 感知的比较交换。
///
/// # Safety
/// 同 [`ProviderAtomicOp::execute_native`]。
pub unsafe fn compare_swap<P: AtomicStrategy, T: AtomicType>(
    ctx: &mut AtomicContext<P>,
    ep: &ActiveEndpoint,
    compare: T,
    swap: T,
    old_value: *mut T,
    mr_old: &MemoryRegion,
    remote: RemoteMemory,
    context: ContextPtr,
) -> Result<()> {
    unsafe {
        ctx.execute(&CompareSwapOp {
            ep,
            compare,
            swap,
            old_value,
            mr_old,
            remote,
            context,
        })
    }
}

/// provider 感知的通用取回操作。
///
/// # Safety
/// 同 [`ProviderAtomicOp::execute_native`]。
pub unsafe fn fetch_op<P: AtomicStrategy, T: AtomicType>(
    ctx: &mut AtomicContext<P>,
    ep: &ActiveEndpoint,
    op: AtomicOp,
    operand: T,
    result: *mut T,
    mr_result: &MemoryRegion,
    remote: RemoteMemory,
    context: ContextPtr,
) -> Result<()> {
    unsafe {
        ctx.execute(&GenericFetchOp {
            ep,
            op,
            operand,
            result,
            mr_result,
            remote,
            context,
        })
    }
}

const _: () = {
    assert!(STAGING_BUFFER_LEN >= size_of::<u128>(), "staging must fit the widest element");
    assert!(align_of::<StagingBuffer>() == 64);
};

#[cfg(test)]
mod tests {
    use super::*;

    /// 分段 provider 未配置暂存区域时快速失败 `not_supported`。
    #[test]
    fn staged_without_staging_mr_fails_fast() {
        let mut ctx = AtomicContext::<Efa>::detached();
        assert!(!ctx.has_staging_mr());
        let ep = ActiveEndpoint::default();
        let op = AtomicAddOp {
            ep: &ep,
            operand: 1u32,
            remote: RemoteMemory::default(),
            context: ContextPtr::null(),
        };
        let err = unsafe { ctx.execute(&op) }.unwrap_err();
        assert_eq!(err.errc(), Errc::NotSupported);
    }

    /// 原生 provider 的分发不经过暂存守卫：空端点直接报 invalid_argument。
    #[test]
    fn native_dispatch_reaches_endpoint_check() {
        let mut ctx = AtomicContext::<Shm>::detached();
        let ep = ActiveEndpoint::default();
        let op = AtomicAddOp {
            ep: &ep,
            operand: 1u64,
            remote: RemoteMemory::default(),
            context: ContextPtr::null(),
        };
        let err = unsafe { ctx.execute(&op) }.unwrap_err();
        assert_eq!(err.errc(), Errc::InvalidArgument);
    }

    #[test]
    fn requires_staging_mirrors_provider_table() {
        assert!(AtomicContext::<Efa>::requires_staging());
        assert!(AtomicContext::<Tcp>::requires_staging());
        assert!(!AtomicContext::<Verbs>::requires_staging());
        assert!(!AtomicContext::<Shm>::requires_staging());
    }
}
