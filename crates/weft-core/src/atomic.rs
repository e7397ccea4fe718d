//! # atomic 模块说明
//!
//! ## 角色定位（Why）
//! - 封装 fabric 的远端原子操作三族：写型（无返回值）、取回型（返回原值）、
//!   比较交换型；数据类型标签在编译期由 Rust 类型推导，杜绝标签与缓冲
//!   类型不一致的一类错误；
//! - [`AtomicType::local_rmw`] 同时是分段原子路径的本地读改写语义表。
//!
//! ## 契约（What）
//! - 有效性查询返回 `(op, datatype)` 组合的最大元素数，`None` 表示不支持；
//! - 结果指针由硬件异步写入，因此以裸指针传递并要求调用方保证其存活。

use weft_sys as sys;

use crate::endpoint::ActiveEndpoint;
use crate::error::{Result, check, empty_object};
use crate::mr::{MemoryRegion, RemoteMemory};
use crate::types::ContextPtr;

/// 远端原子操作码。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AtomicOp {
    Min,
    Max,
    Sum,
    Prod,
    LogicalOr,
    LogicalAnd,
    BitwiseOr,
    BitwiseAnd,
    LogicalXor,
    BitwiseXor,
    AtomicRead,
    AtomicWrite,
    CompareSwap,
    CompareSwapNe,
    CompareSwapLe,
    CompareSwapLt,
    CompareSwapGe,
    CompareSwapGt,
    MaskedSwap,
}

impl AtomicOp {
    pub(crate) fn to_fi(self) -> u32 {
        match self {
            AtomicOp::Min => sys::FI_MIN,
            AtomicOp::Max => sys::FI_MAX,
            AtomicOp::Sum => sys::FI_SUM,
            AtomicOp::Prod => sys::FI_PROD,
            AtomicOp::LogicalOr => sys::FI_LOR,
            AtomicOp::LogicalAnd => sys::FI_LAND,
            AtomicOp::BitwiseOr => sys::FI_BOR,
            AtomicOp::BitwiseAnd => sys::FI_BAND,
            AtomicOp::LogicalXor => sys::FI_LXOR,
            AtomicOp::BitwiseXor => sys::FI_BXOR,
            AtomicOp::AtomicRead => sys::FI_ATOMIC_READ,
            AtomicOp::AtomicWrite => sys::FI_ATOMIC_WRITE,
            AtomicOp::CompareSwap => sys::FI_CSWAP,
            AtomicOp::CompareSwapNe => sys::FI_CSWAP_NE,
            AtomicOp::CompareSwapLe => sys::FI_CSWAP_LE,
            AtomicOp::CompareSwapLt => sys::FI_CSWAP_LT,
            AtomicOp::CompareSwapGe => sys::FI_CSWAP_GE,
            AtomicOp::CompareSwapGt => sys::FI_CSWAP_GT,
            AtomicOp::MaskedSwap => sys::FI_MSWAP,
        }
    }
}

/// 原子操作数据类型标签。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AtomicDatatype {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Int128,
    Uint128,
    Float32,
    Float64,
    FloatComplex,
    DoubleComplex,
    LongDouble,
    LongDoubleComplex,
}

impl AtomicDatatype {
    pub(crate) fn to_fi(self) -> u32 {
        match self {
            AtomicDatatype::Int8 => sys::FI_INT8,
            AtomicDatatype::Uint8 => sys::FI_UINT8,
            AtomicDatatype::Int16 => sys::FI_INT16,
            AtomicDatatype::Uint16 => sys::FI_UINT16,
            AtomicDatatype::Int32 => sys::FI_INT32,
            AtomicDatatype::Uint32 => sys::FI_UINT32,
            AtomicDatatype::Int64 => sys::FI_INT64,
            AtomicDatatype::Uint64 => sys::FI_UINT64,
            AtomicDatatype::Int128 => sys::FI_INT128,
            AtomicDatatype::Uint128 => sys::FI_UINT128,
            AtomicDatatype::Float32 => sys::FI_FLOAT,
            AtomicDatatype::Float64 => sys::FI_DOUBLE,
            AtomicDatatype::FloatComplex => sys::FI_FLOAT_COMPLEX,
            AtomicDatatype::DoubleComplex => sys::FI_DOUBLE_COMPLEX,
            AtomicDatatype::LongDouble => sys::FI_LONG_DOUBLE,
            AtomicDatatype::LongDoubleComplex => sys::FI_LONG_DOUBLE_COMPLEX,
        }
    }
}

/// 可参与远端原子操作的 Rust 类型。
///
/// `local_rmw` 是分段原子路径的本地读改写表：整数支持全部操作，
/// 浮点跳过位运算（保持原值），逻辑运算把零/非零抬升为 0/1。
pub trait AtomicType: Copy + PartialEq + Send + Sync + 'static {
    const DATATYPE: AtomicDatatype;

    /// 本地执行一次读改写，返回新值。
    fn local_rmw(op: AtomicOp, current: Self, operand: Self) -> Self;
}

macro_rules! atomic_int {
    ($($ty:ty => $tag:ident),+ $(,)?) => {
        $(
            impl AtomicType for $ty {
                const DATATYPE: AtomicDatatype = AtomicDatatype::$tag;

                fn local_rmw(op: AtomicOp, current: Self, operand: Self) -> Self {
                    match op {
                        AtomicOp::Sum => current.wrapping_add(operand),
                        AtomicOp::Min => current.min(operand),
                        AtomicOp::Max => current.max(operand),
                        AtomicOp::Prod => current.wrapping_mul(operand),
                        AtomicOp::BitwiseOr => current | operand,
                        AtomicOp::BitwiseAnd => current & operand,
                        AtomicOp::BitwiseXor => current ^ operand,
                        AtomicOp::LogicalOr => ((current != 0) || (operand != 0)) as $ty,
                        AtomicOp::LogicalAnd => ((current != 0) && (operand != 0)) as $ty,
                        AtomicOp::LogicalXor => ((current != 0) != (operand != 0)) as $ty,
                        AtomicOp::AtomicWrite => operand,
                        AtomicOp::AtomicRead => current,
                        _ => current,
                    }
                }
            }
        )+
    };
}

atomic_int! {
    i8 => Int8,
    u8 => Uint8,
    i16 => Int16,
    u16 => Uint16,
    i32 => Int32,
    u32 => Uint32,
    i64 => Int64,
    u64 => Uint64,
    i128 => Int128,
    u128 => Uint128,
}

macro_rules! atomic_float {
    ($($ty:ty => $tag:ident),+ $(,)?) => {
        $(
            impl AtomicType for $ty {
                const DATATYPE: AtomicDatatype = AtomicDatatype::$tag;

                fn local_rmw(op: AtomicOp, current: Self, operand: Self) -> Self {
                    match op {
                        AtomicOp::Sum => current + operand,
                        AtomicOp::Min => if current < operand { current } else { operand },
                        AtomicOp::Max => if current > operand { current } else { operand },
                        AtomicOp::Prod => current * operand,
                        // 位运算对浮点无定义：保持原值。
                        AtomicOp::BitwiseOr | AtomicOp::BitwiseAnd | AtomicOp::BitwiseXor => current,
                        AtomicOp::LogicalOr => {
                            if current != 0.0 || operand != 0.0 { 1.0 } else { 0.0 }
                        }
                        AtomicOp::LogicalAnd => {
                            if current != 0.0 && operand != 0.0 { 1.0 } else { 0.0 }
                        }
                        AtomicOp::LogicalXor => {
                            if (current != 0.0) != (operand != 0.0) { 1.0 } else { 0.0 }
                        }
                        AtomicOp::AtomicWrite => operand,
                        AtomicOp::AtomicRead => current,
                        _ => current,
                    }
                }
            }
        )+
    };
}

atomic_float! {
    f32 => Float32,
    f64 => Float64,
}

fn ep_raw(ep: &ActiveEndpoint, context: &'static str) -> Result<*mut sys::fid_ep> {
    ep.raw().ok_or_else(|| empty_object(context))
}

/// 提交写型原子操作（无返回值）。
///
/// # Safety
/// `buf`、`ctx` 引用的存储必须活到完成事件返回；`remote` 指向对端有效的
/// 注册区域。
pub unsafe fn execute<T: AtomicType>(
    ep: &ActiveEndpoint,
    op: AtomicOp,
    buf: &T,
    count: usize,
    mr: Option<&MemoryRegion>,
    remote: RemoteMemory,
    ctx: ContextPtr,
) -> Result<()> {
    let fid_ep = ep_raw(ep, "atomic::execute")?;
    let desc = mr.map(|m| m.descriptor().as_raw()).unwrap_or(core::ptr::null_mut());

    let ret = unsafe {
        sys::fi_atomic(
            fid_ep,
            (buf as *const T).cast(),
            count,
            desc,
            sys::FI_ADDR_UNSPEC,
            remote.addr.get(),
            remote.key.get(),
            T::DATATYPE.to_fi(),
            op.to_fi(),
            ctx.as_ptr(),
        )
    };
    check(ret, "fi_atomic")
}

/// 提交取回型原子操作：远端执行 `op`，原值写入 `result`。
///
/// # Safety
/// 同 [`execute`]；`result` 由硬件异步写入，必须活到完成事件返回。
pub unsafe fn fetch<T: AtomicType>(
    ep: &ActiveEndpoint,
    op: AtomicOp,
    buf: &T,
    result: *mut T,
    count: usize,
    mr_buf: Option<&MemoryRegion>,
    mr_result: Option<&MemoryRegion>,
    remote: RemoteMemory,
    ctx: ContextPtr,
) -> Result<()> {
    let fid_ep = ep_raw(ep, "atomic::fetch")?;
    let desc_buf = mr_buf.map(|m| m.descriptor().as_raw()).unwrap_or(core::ptr::null_mut());
    let desc_result = mr_result
        .map(|m| m.descriptor().as_raw())
        .unwrap_or(core::ptr::null_mut());

    let ret = unsafe {
        sys::fi_fetch_atomic(
            fid_ep,
            (buf as *const T).cast(),
            count,
            desc_buf,
            result.cast(),
            desc_result,
            sys::FI_ADDR_UNSPEC,
            remote.addr.get(),
            remote.key.get(),
            T::DATATYPE.to_fi(),
            op.to_fi(),
            ctx.as_ptr(),
        )
    };
    check(ret, "fi_fetch_atomic")
}

/// 提交比较交换：远端值等于 `compare` 时写入 `swap`，原值写入 `result`。
///
/// # Safety
/// 同 [`fetch`]。
pub unsafe fn compare_swap<T: AtomicType>(
    ep: &ActiveEndpoint,
    compare: &T,
    swap: &T,
    result: *mut T,
    count: usize,
    mr_compare: Option<&MemoryRegion>,
    mr_result: Option<&MemoryRegion>,
    remote: RemoteMemory,
    ctx: ContextPtr,
) -> Result<()> {
    let fid_ep = ep_raw(ep, "atomic::compare_swap")?;
    let desc_compare = mr_compare
        .map(|m| m.descriptor().as_raw())
        .unwrap_or(core::ptr::null_mut());
    let desc_result = mr_result
        .map(|m| m.descriptor().as_raw())
        .unwrap_or(core::ptr::null_mut());

    let ret = unsafe {
        sys::fi_compare_atomic(
            fid_ep,
            (swap as *const T).cast(),
            count,
            core::ptr::null_mut(),
            (compare as *const T).cast(),
            desc_compare,
            result.cast(),
            desc_result,
            sys::FI_ADDR_UNSPEC,
            remote.addr.get(),
            remote.key.get(),
            T::DATATYPE.to_fi(),
            sys::FI_CSWAP,
            ctx.as_ptr(),
        )
    };
    check(ret, "fi_compare_atomic")
}

/// 小操作数原子直发：无完成事件。
pub fn inject<T: AtomicType>(
    ep: &ActiveEndpoint,
    op: AtomicOp,
    buf: &T,
    count: usize,
    remote: RemoteMemory,
) -> Result<()> {
    let fid_ep = ep_raw(ep, "atomic::inject")?;
    let ret = unsafe {
        sys::fi_inject_atomic(
            fid_ep,
            (buf as *const T).cast(),
            count,
            sys::FI_ADDR_UNSPEC,
            remote.addr.get(),
            remote.key.get(),
            T::DATATYPE.to_fi(),
            op.to_fi(),
        )
    };
    check(ret, "fi_inject_atomic")
}

/// 远端加法（无取回）。
///
/// # Safety
/// 同 [`execute`]。
pub unsafe fn add<T: AtomicType>(
    ep: &ActiveEndpoint,
    value: &T,
    remote: RemoteMemory,
    ctx: ContextPtr,
) -> Result<()> {
    unsafe { execute(ep, AtomicOp::Sum, value, 1, None, remote, ctx) }
}

/// 远端加法并取回原值。
///
/// # Safety
/// 同 [`fetch`]。
pub unsafe fn fetch_add<T: AtomicType>(
    ep: &ActiveEndpoint,
    value: &T,
    result: *mut T,
    mr_result: &MemoryRegion,
    remote: RemoteMemory,
    ctx: ContextPtr,
) -> Result<()> {
    unsafe {
        fetch(
            ep,
            AtomicOp::Sum,
            value,
            result,
            1,
            None,
            Some(mr_result),
            remote,
            ctx,
        )
    }
}

/// 类型化比较交换便捷入口。
///
/// # Safety
/// 同 [`compare_swap`]。
pub unsafe fn cas<T: AtomicType>(
    ep: &ActiveEndpoint,
    compare: &T,
    swap: &T,
    old_value: *mut T,
    mr_old: &MemoryRegion,
    remote: RemoteMemory,
    ctx: ContextPtr,
) -> Result<()> {
    unsafe {
        compare_swap(ep, compare, swap, old_value, 1, None, Some(mr_old), remote, ctx)
    }
}

/// 写型原子操作的有效性查询；返回最大元素数。
pub fn is_valid(ep: &ActiveEndpoint, op: AtomicOp, dt: AtomicDatatype) -> Option<usize> {
    let fid_ep = ep.raw()?;
    let mut count = 0usize;
    let ret = unsafe { sys::fi_atomicvalid(fid_ep, dt.to_fi(), op.to_fi(), &mut count) };
    (ret == 0).then_some(count)
}

/// 取回型原子操作的有效性查询。
pub fn is_fetch_valid(ep: &ActiveEndpoint, op: AtomicOp, dt: AtomicDatatype) -> Option<usize> {
    let fid_ep = ep.raw()?;
    let mut count = 0usize;
    let ret = unsafe { sys::fi_fetch_atomicvalid(fid_ep, dt.to_fi(), op.to_fi(), &mut count) };
    (ret == 0).then_some(count)
}

/// 比较型原子操作的有效性查询。
pub fn is_compare_valid(ep: &ActiveEndpoint, op: AtomicOp, dt: AtomicDatatype) -> Option<usize> {
    let fid_ep = ep.raw()?;
    let mut count = 0usize;
    let ret = unsafe { sys::fi_compare_atomicvalid(fid_ep, dt.to_fi(), op.to_fi(), &mut count) };
    (ret == 0).then_some(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 本地读改写表：整数全操作。
    #[test]
    fn integer_rmw_semantics() {
        assert_eq!(u32::local_rmw(AtomicOp::Sum, 7, 5), 12);
        assert_eq!(u32::local_rmw(AtomicOp::Min, 7, 5), 5);
        assert_eq!(u32::local_rmw(AtomicOp::Max, 7, 5), 7);
        assert_eq!(u32::local_rmw(AtomicOp::Prod, 7, 5), 35);
        assert_eq!(u32::local_rmw(AtomicOp::BitwiseOr, 0b1010, 0b0110), 0b1110);
        assert_eq!(u32::local_rmw(AtomicOp::BitwiseAnd, 0b1010, 0b0110), 0b0010);
        assert_eq!(u32::local_rmw(AtomicOp::BitwiseXor, 0b1010, 0b0110), 0b1100);
        assert_eq!(u32::local_rmw(AtomicOp::LogicalOr, 0, 3), 1);
        assert_eq!(u32::local_rmw(AtomicOp::LogicalAnd, 2, 0), 0);
        assert_eq!(u32::local_rmw(AtomicOp::LogicalXor, 2, 3), 0);
        assert_eq!(u32::local_rmw(AtomicOp::AtomicWrite, 7, 5), 5);
        assert_eq!(u32::local_rmw(AtomicOp::AtomicRead, 7, 5), 7);
        // 比较交换族不在读改写表内：保持原值。
        assert_eq!(u32::local_rmw(AtomicOp::CompareSwap, 7, 5), 7);
        assert_eq!(i64::local_rmw(AtomicOp::Sum, -3, 1), -2);
    }

    /// 浮点跳过位运算，逻辑运算抬升为 0/1。
    #[test]
    fn float_rmw_semantics() {
        assert_eq!(f64::local_rmw(AtomicOp::Sum, 1.5, 2.5), 4.0);
        assert_eq!(f64::local_rmw(AtomicOp::Min, 1.5, 2.5), 1.5);
        assert_eq!(f64::local_rmw(AtomicOp::Prod, 2.0, 3.0), 6.0);
        assert_eq!(f64::local_rmw(AtomicOp::BitwiseOr, 2.0, 3.0), 2.0);
        assert_eq!(f64::local_rmw(AtomicOp::LogicalOr, 0.0, 3.0), 1.0);
        assert_eq!(f64::local_rmw(AtomicOp::LogicalXor, 1.0, 2.0), 0.0);
        assert_eq!(f32::local_rmw(AtomicOp::AtomicWrite, 1.0, 9.0), 9.0);
    }

    /// 数据类型标签由 Rust 类型在编译期推导。
    #[test]
    fn datatype_tags_match_types() {
        assert_eq!(<i8 as AtomicType>::DATATYPE, AtomicDatatype::Int8);
        assert_eq!(<u16 as AtomicType>::DATATYPE, AtomicDatatype::Uint16);
        assert_eq!(<u64 as AtomicType>::DATATYPE, AtomicDatatype::Uint64);
        assert_eq!(<i128 as AtomicType>::DATATYPE, AtomicDatatype::Int128);
        assert_eq!(<f32 as AtomicType>::DATATYPE, AtomicDatatype::Float32);
        assert_eq!(<f64 as AtomicType>::DATATYPE, AtomicDatatype::Float64);
    }

    #[test]
    fn validity_queries_fail_closed_on_empty_endpoint() {
        let ep = ActiveEndpoint::default();
        assert!(is_valid(&ep, AtomicOp::Sum, AtomicDatatype::Uint32).is_none());
        assert!(is_fetch_valid(&ep, AtomicOp::Sum, AtomicDatatype::Uint32).is_none());
        assert!(is_compare_valid(&ep, AtomicOp::CompareSwap, AtomicDatatype::Uint64).is_none());
    }
}
