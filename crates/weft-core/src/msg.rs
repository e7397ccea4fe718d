//! # msg 模块说明
//!
//! ## 角色定位（Why）
//! - 端点自带的简单提交方法覆盖单缓冲场景；本模块承载完整的散布/聚合
//!   消息描述符路径：IOV 列表、逐段内存描述符、目的地址、标签与立即数
//!   一次性成帧提交；
//! - provider 的 IOV 上限是硬约束，超限请求在进入 fabric 之前拒绝。
//!
//! ## 契约（What）
//! - [`MAX_IOV_COUNT`] = 16；恰好 16 段合法，17 段返回 `invalid_argument`；
//! - 描述符缓冲提交为 `unsafe`：所有引用的缓冲与上下文必须活到完成返回；
//! - [`inject_with`] 按 provider 能力表校验 inject 尺寸；
//!   [`inject_array`] 在编译期锁死静态缓冲的尺寸上限。

use std::io::{IoSlice, IoSliceMut};

use weft_sys as sys;

use crate::endpoint::ActiveEndpoint;
use crate::error::{Errc, FabricError, Result, check, empty_object};
use crate::imm::ImmediateData;
use crate::provider::ProviderTraits;
use crate::types::{ContextPtr, FabricAddr, MrDescriptor, Tag};

/// 每条消息允许的最大 IOV 段数。
pub const MAX_IOV_COUNT: usize = 16;

/// 发送操作修饰位。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendFlags(u64);

impl SendFlags {
    pub const NONE: Self = Self(0);
    /// 走 inject 路径（provider 当场拷贝）。
    pub const INJECT: Self = Self(1);
    /// 强制产生完成事件。
    pub const COMPLETION: Self = Self(1 << 1);
    /// 携带远端 CQ 立即数。
    pub const REMOTE_CQ_DATA: Self = Self(1 << 2);
    /// 后续还有同批操作（批量提交提示）。
    pub const MORE: Self = Self(1 << 3);
    /// 栅栏：先于本操作提交的操作全部完成后才执行。
    pub const FENCE: Self = Self(1 << 4);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for SendFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// 接收操作修饰位。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecvFlags(u64);

impl RecvFlags {
    pub const NONE: Self = Self(0);
    /// 强制产生完成事件。
    pub const COMPLETION: Self = Self(1 << 1);
    /// 后续还有同批操作。
    pub const MORE: Self = Self(1 << 3);
    /// 多接收缓冲：单次张贴，多条消息顺序填充。
    pub const MULTI_RECV: Self = Self(1 << 16);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for RecvFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

pub(crate) fn translate_send_flags(flags: SendFlags) -> u64 {
    let mut out = 0;
    if flags.contains(SendFlags::INJECT) {
        out |= sys::FI_INJECT;
    }
    if flags.contains(SendFlags::COMPLETION) {
        out |= sys::FI_COMPLETION;
    }
    if flags.contains(SendFlags::REMOTE_CQ_DATA) {
        out |= sys::FI_REMOTE_CQ_DATA;
    }
    if flags.contains(SendFlags::MORE) {
        out |= sys::FI_MORE;
    }
    if flags.contains(SendFlags::FENCE) {
        out |= sys::FI_FENCE;
    }
    out
}

pub(crate) fn translate_recv_flags(flags: RecvFlags) -> u64 {
    let mut out = 0;
    if flags.contains(RecvFlags::COMPLETION) {
        out |= sys::FI_COMPLETION;
    }
    if flags.contains(RecvFlags::MORE) {
        out |= sys::FI_MORE;
    }
    if flags.contains(RecvFlags::MULTI_RECV) {
        out |= sys::FI_MULTI_RECV;
    }
    out
}

/// 发送消息描述符。
#[derive(Clone, Copy, Debug, Default)]
pub struct SendMessage<'a> {
    pub iov: &'a [IoSlice<'a>],
    pub desc: &'a [MrDescriptor],
    pub dest: FabricAddr,
    pub context: ContextPtr,
    pub data: u64,
}

/// 接收消息描述符。
#[derive(Debug, Default)]
pub struct RecvMessage<'a> {
    pub iov: &'a [IoSliceMut<'a>],
    pub desc: &'a [MrDescriptor],
    pub src: FabricAddr,
    pub context: ContextPtr,
}

/// 标签发送消息描述符。
#[derive(Clone, Copy, Debug, Default)]
pub struct TaggedSendMessage<'a> {
    pub iov: &'a [IoSlice<'a>],
    pub desc: &'a [MrDescriptor],
    pub dest: FabricAddr,
    pub tag: Tag,
    pub context: ContextPtr,
    pub data: u64,
}

/// 标签接收消息描述符。
#[derive(Debug, Default)]
pub struct TaggedRecvMessage<'a> {
    pub iov: &'a [IoSliceMut<'a>],
    pub desc: &'a [MrDescriptor],
    pub src: FabricAddr,
    pub tag: Tag,
    pub ignore: u64,
    pub context: ContextPtr,
}

/// IOV 段数校验：恰好 [`MAX_IOV_COUNT`] 合法，超出拒绝。
pub(crate) fn validate_iov_count(count: usize) -> Result<()> {
    if count > MAX_IOV_COUNT {
        Err(FabricError::new(Errc::InvalidArgument).with_context("iov count"))
    } else {
        Ok(())
    }
}

pub(crate) fn descriptors_to_raw(
    desc: &[MrDescriptor],
    out: &mut [*mut core::ffi::c_void; MAX_IOV_COUNT],
) -> *mut *mut core::ffi::c_void {
    if desc.is_empty() {
        return core::ptr::null_mut();
    }
    for (slot, d) in out.iter_mut().zip(desc.iter()) {
        *slot = d.as_raw();
    }
    out.as_mut_ptr()
}

fn ep_raw(ep: &ActiveEndpoint, context: &'static str) -> Result<*mut sys::fid_ep> {
    ep.raw().ok_or_else(|| empty_object(context))
}

/// 提交散布/聚合发送。
///
/// # Safety
/// `msg` 引用的全部缓冲、描述符与上下文必须活到完成事件返回。
pub unsafe fn sendmsg(ep: &ActiveEndpoint, msg: &SendMessage<'_>, flags: SendFlags) -> Result<()> {
    validate_iov_count(msg.iov.len())?;
    let fid_ep = ep_raw(ep, "msg::sendmsg")?;

    let mut raw_desc = [core::ptr::null_mut(); MAX_IOV_COUNT];
    let fi_msg = sys::fi_msg {
        msg_iov: msg.iov.as_ptr().cast::<libc::iovec>(),
        desc: descriptors_to_raw(msg.desc, &mut raw_desc),
        iov_count: msg.iov.len(),
        addr: msg.dest.get(),
        context: msg.context.as_ptr(),
        data: msg.data,
    };

    let ret = unsafe { sys::fi_sendmsg(fid_ep, &fi_msg, translate_send_flags(flags)) };
    check(ret, "fi_sendmsg")
}

/// 提交散布/聚合接收。
///
/// # Safety
/// 同 [`sendmsg`]。
pub unsafe fn recvmsg(ep: &ActiveEndpoint, msg: &RecvMessage<'_>, flags: RecvFlags) -> Result<()> {
    validate_iov_count(msg.iov.len())?;
    let fid_ep = ep_raw(ep, "msg::recvmsg")?;

    let mut raw_desc = [core::ptr::null_mut(); MAX_IOV_COUNT];
    let fi_msg = sys::fi_msg {
        msg_iov: msg.iov.as_ptr().cast::<libc::iovec>(),
        desc: descriptors_to_raw(msg.desc, &mut raw_desc),
        iov_count: msg.iov.len(),
        addr: msg.src.get(),
        context: msg.context.as_ptr(),
        data: 0,
    };

    let ret = unsafe { sys::fi_recvmsg(fid_ep, &fi_msg, translate_recv_flags(flags)) };
    check(ret, "fi_recvmsg")
}

/// 提交标签散布发送。
///
/// # Safety
/// 同 [`sendmsg`]。
pub unsafe fn tagged_sendmsg(
    ep: &ActiveEndpoint,
    msg: &TaggedSendMessage<'_>,
    flags: SendFlags,
) -> Result<()> {
    validate_iov_count(msg.iov.len())?;
    let fid_ep = ep_raw(ep, "msg::tagged_sendmsg")?;

    let mut raw_desc = [core::ptr::null_mut(); MAX_IOV_COUNT];
    let fi_msg = sys::fi_msg_tagged {
        msg_iov: msg.iov.as_ptr().cast::<libc::iovec>(),
        desc: descriptors_to_raw(msg.desc, &mut raw_desc),
        iov_count: msg.iov.len(),
        addr: msg.dest.get(),
        tag: msg.tag.get(),
        ignore: 0,
        context: msg.context.as_ptr(),
        data: msg.data,
    };

    let ret = unsafe { sys::fi_tsendmsg(fid_ep, &fi_msg, translate_send_flags(flags)) };
    check(ret, "fi_tsendmsg")
}

/// 提交标签散布接收。
///
/// # Safety
/// 同 [`sendmsg`]。
pub unsafe fn tagged_recvmsg(
    ep: &ActiveEndpoint,
    msg: &TaggedRecvMessage<'_>,
    flags: RecvFlags,
) -> Result<()> {
    validate_iov_count(msg.iov.len())?;
    let fid_ep = ep_raw(ep, "msg::tagged_recvmsg")?;

    let mut raw_desc = [core::ptr::null_mut(); MAX_IOV_COUNT];
    let fi_msg = sys::fi_msg_tagged {
        msg_iov: msg.iov.as_ptr().cast::<libc::iovec>(),
        desc: descriptors_to_raw(msg.desc, &mut raw_desc),
        iov_count: msg.iov.len(),
        addr: msg.src.get(),
        tag: msg.tag.get(),
        ignore: msg.ignore,
        context: msg.context.as_ptr(),
        data: 0,
    };

    let ret = unsafe { sys::fi_trecvmsg(fid_ep, &fi_msg, translate_recv_flags(flags)) };
    check(ret, "fi_trecvmsg")
}

/// 向指定对端发送单缓冲消息（无连接端点的基本发送）。
///
/// # Safety
/// 同 [`sendmsg`]。
pub unsafe fn send_to(
    ep: &ActiveEndpoint,
    data: &[u8],
    dest: FabricAddr,
    desc: MrDescriptor,
    ctx: ContextPtr,
) -> Result<()> {
    let fid_ep = ep_raw(ep, "msg::send_to")?;
    let ret = unsafe {
        weft_sys::fi_send(
            fid_ep,
            data.as_ptr().cast(),
            data.len(),
            desc.as_raw(),
            dest.get(),
            ctx.as_ptr(),
        )
    };
    check(ret, "fi_send")
}

/// 从指定对端接收单缓冲消息。
///
/// # Safety
/// 同 [`sendmsg`]。
pub unsafe fn recv_from(
    ep: &ActiveEndpoint,
    buffer: &mut [u8],
    src: FabricAddr,
    desc: MrDescriptor,
    ctx: ContextPtr,
) -> Result<()> {
    let fid_ep = ep_raw(ep, "msg::recv_from")?;
    let ret = unsafe {
        weft_sys::fi_recv(
            fid_ep,
            buffer.as_mut_ptr().cast(),
            buffer.len(),
            desc.as_raw(),
            src.get(),
            ctx.as_ptr(),
        )
    };
    check(ret, "fi_recv")
}

/// 向指定对端发送标签消息。
///
/// # Safety
/// 同 [`sendmsg`]。
pub unsafe fn tagged_send_to(
    ep: &ActiveEndpoint,
    data: &[u8],
    dest: FabricAddr,
    tag: Tag,
    desc: MrDescriptor,
    ctx: ContextPtr,
) -> Result<()> {
    let fid_ep = ep_raw(ep, "msg::tagged_send_to")?;
    let ret = unsafe {
        weft_sys::fi_tsend(
            fid_ep,
            data.as_ptr().cast(),
            data.len(),
            desc.as_raw(),
            dest.get(),
            tag.get(),
            ctx.as_ptr(),
        )
    };
    check(ret, "fi_tsend")
}

/// 发送并附带立即数（非 inject 路径，产生完成事件）。
///
/// # Safety
/// 同 [`sendmsg`]。
pub unsafe fn send_data(
    ep: &ActiveEndpoint,
    data: &[u8],
    imm: ImmediateData,
    dest: FabricAddr,
    desc: MrDescriptor,
    ctx: ContextPtr,
) -> Result<()> {
    let fid_ep = ep_raw(ep, "msg::send_data")?;
    let ret = unsafe {
        sys::fi_senddata(
            fid_ep,
            data.as_ptr().cast(),
            data.len(),
            desc.as_raw(),
            imm.raw(),
            dest.get(),
            ctx.as_ptr(),
        )
    };
    check(ret, "fi_senddata")
}

/// 标签发送并附带立即数。
///
/// # Safety
/// 同 [`sendmsg`]。
pub unsafe fn tagged_send_data(
    ep: &ActiveEndpoint,
    data: &[u8],
    tag: Tag,
    imm: ImmediateData,
    dest: FabricAddr,
    desc: MrDescriptor,
    ctx: ContextPtr,
) -> Result<()> {
    let fid_ep = ep_raw(ep, "msg::tagged_send_data")?;
    let ret = unsafe {
        sys::fi_tsenddata(
            fid_ep,
            data.as_ptr().cast(),
            data.len(),
            desc.as_raw(),
            imm.raw(),
            dest.get(),
            tag.get(),
            ctx.as_ptr(),
        )
    };
    check(ret, "fi_tsenddata")
}

/// 张贴多接收缓冲：一次提交，按序承接多条入站消息。
///
/// # Safety
/// `buffer` 必须活到缓冲耗尽的 `FI_MULTI_RECV` 完成事件返回。
pub unsafe fn post_multi_recv(
    ep: &ActiveEndpoint,
    buffer: &mut [u8],
    ctx: ContextPtr,
) -> Result<()> {
    let fid_ep = ep_raw(ep, "msg::post_multi_recv")?;

    let iov = libc::iovec {
        iov_base: buffer.as_mut_ptr().cast(),
        iov_len: buffer.len(),
    };
    let fi_msg = sys::fi_msg {
        msg_iov: &iov,
        desc: core::ptr::null_mut(),
        iov_count: 1,
        addr: sys::FI_ADDR_UNSPEC,
        context: ctx.as_ptr(),
        data: 0,
    };

    let ret = unsafe { sys::fi_recvmsg(fid_ep, &fi_msg, sys::FI_MULTI_RECV) };
    check(ret, "fi_recvmsg")
}

/// 按 provider 能力表校验后的 inject 发送。
///
/// 尺寸超过 `P::MAX_INJECT_SIZE` 时返回 `invalid_argument`，不触达 fabric。
pub fn inject_with<P: ProviderTraits>(
    ep: &ActiveEndpoint,
    data: &[u8],
    dest: FabricAddr,
) -> Result<()> {
    if !crate::provider::can_inject::<P>(data.len()) {
        return Err(FabricError::new(Errc::InvalidArgument).with_context("inject size"));
    }
    ep.inject(data, dest)
}

/// 静态缓冲的 inject 发送：尺寸上限在编译期校验。
pub fn inject_array<P: ProviderTraits, const N: usize>(
    ep: &ActiveEndpoint,
    data: &[u8; N],
    dest: FabricAddr,
) -> Result<()> {
    const {
        assert!(N <= P::MAX_INJECT_SIZE, "inject buffer exceeds provider limit");
    }
    ep.inject(data.as_slice(), dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Efa, Shm, Verbs};

    /// 边界：16 段恰好通过，17 段拒绝。
    #[test]
    fn iov_count_boundary() {
        assert!(validate_iov_count(0).is_ok());
        assert!(validate_iov_count(MAX_IOV_COUNT).is_ok());
        assert_eq!(
            validate_iov_count(MAX_IOV_COUNT + 1).unwrap_err().errc(),
            Errc::InvalidArgument
        );
    }

    #[test]
    fn flag_translation_is_bit_exact() {
        assert_eq!(translate_send_flags(SendFlags::INJECT), sys::FI_INJECT);
        assert_eq!(translate_send_flags(SendFlags::COMPLETION), sys::FI_COMPLETION);
        assert_eq!(
            translate_send_flags(SendFlags::REMOTE_CQ_DATA | SendFlags::FENCE),
            sys::FI_REMOTE_CQ_DATA | sys::FI_FENCE
        );
        assert_eq!(translate_send_flags(SendFlags::MORE), sys::FI_MORE);
        assert_eq!(translate_recv_flags(RecvFlags::MULTI_RECV), sys::FI_MULTI_RECV);
        assert_eq!(
            translate_recv_flags(RecvFlags::COMPLETION | RecvFlags::MORE),
            sys::FI_COMPLETION | sys::FI_MORE
        );
        assert_eq!(translate_send_flags(SendFlags::NONE), 0);
    }

    /// inject 尺寸校验：上限以内放行到句柄检查，超限立即拒绝。
    #[test]
    fn inject_size_enforced_per_provider() {
        let ep = ActiveEndpoint::default();
        // 空端点：尺寸合法时失败于句柄检查，同样是 invalid_argument，
        // 但超限输入在校验层即返回，二者路径都已覆盖。
        let within = [0u8; 64];
        assert!(inject_with::<Verbs>(&ep, &within, FabricAddr::UNSPECIFIED).is_err());

        let over = vec![0u8; Efa::MAX_INJECT_SIZE + 1];
        let err = inject_with::<Efa>(&ep, &over, FabricAddr::UNSPECIFIED).unwrap_err();
        assert_eq!(err.errc(), Errc::InvalidArgument);

        let shm_max = vec![0u8; Shm::MAX_INJECT_SIZE];
        assert!(crate::provider::can_inject::<Shm>(shm_max.len()));
    }

    #[test]
    fn descriptors_marshal_to_raw_pointers() {
        let mut out = [core::ptr::null_mut(); MAX_IOV_COUNT];
        assert!(descriptors_to_raw(&[], &mut out).is_null(), "空描述符列表传空指针");

        let descs = [MrDescriptor::default(), MrDescriptor::default()];
        let ptr = descriptors_to_raw(&descs, &mut out);
        assert!(!ptr.is_null());
    }
}
