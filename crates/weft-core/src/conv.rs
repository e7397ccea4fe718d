//! weft 类型与 libfabric 常量之间的逐位翻译。
//!
//! 每一对 `to_fi_* / from_fi_*` 都必须满足 `from(to(x)) == x`（对每个已定义
//! 位/枚举值），这是 provider 协商路径的正确性前提；测试对整个表穷举验证。

use weft_sys as sys;

use crate::types::{
    AddressFormat, AvType, Caps, CompOrder, CqBindFlags, EndpointType, Mode, MrAccess, MrMode,
    MsgOrder, OpFlags, ProgressMode, ThreadingMode,
};

/// 位翻译的共用骨架：逐位检查、逐位落位。
macro_rules! translate_bits {
    ($value:expr, $(($from:expr, $to:expr)),+ $(,)?) => {{
        let mut out = 0;
        $(
            if $value.contains($from) {
                out |= $to;
            }
        )+
        out
    }};
}

macro_rules! translate_bits_back {
    ($raw:expr, $empty:expr, $(($from:expr, $to:expr)),+ $(,)?) => {{
        let mut out = $empty;
        $(
            if $raw & $from != 0 {
                out = out.union($to);
            }
        )+
        out
    }};
}

pub(crate) fn to_fi_caps(caps: Caps) -> u64 {
    translate_bits!(
        caps,
        (Caps::MSG, sys::FI_MSG),
        (Caps::RMA, sys::FI_RMA),
        (Caps::TAGGED, sys::FI_TAGGED),
        (Caps::ATOMIC, sys::FI_ATOMIC),
        (Caps::READ, sys::FI_READ),
        (Caps::WRITE, sys::FI_WRITE),
        (Caps::COLLECTIVE, sys::FI_COLLECTIVE),
        (Caps::RECV, sys::FI_RECV),
        (Caps::SEND, sys::FI_SEND),
        (Caps::REMOTE_READ, sys::FI_REMOTE_READ),
        (Caps::REMOTE_WRITE, sys::FI_REMOTE_WRITE),
        (Caps::MULTI_RECV, sys::FI_MULTI_RECV),
        (Caps::REMOTE_COMM, sys::FI_REMOTE_COMM),
        (Caps::FENCE, sys::FI_FENCE),
        (Caps::LOCAL_COMM, sys::FI_LOCAL_COMM),
        (Caps::MSG_PREFIX, sys::FI_MSG_PREFIX),
        (Caps::HMEM, sys::FI_HMEM),
    )
}

pub(crate) fn from_fi_caps(raw: u64) -> Caps {
    translate_bits_back!(
        raw,
        Caps::EMPTY,
        (sys::FI_MSG, Caps::MSG),
        (sys::FI_RMA, Caps::RMA),
        (sys::FI_TAGGED, Caps::TAGGED),
        (sys::FI_ATOMIC, Caps::ATOMIC),
        (sys::FI_READ, Caps::READ),
        (sys::FI_WRITE, Caps::WRITE),
        (sys::FI_COLLECTIVE, Caps::COLLECTIVE),
        (sys::FI_RECV, Caps::RECV),
        (sys::FI_SEND, Caps::SEND),
        (sys::FI_REMOTE_READ, Caps::REMOTE_READ),
        (sys::FI_REMOTE_WRITE, Caps::REMOTE_WRITE),
        (sys::FI_MULTI_RECV, Caps::MULTI_RECV),
        (sys::FI_REMOTE_COMM, Caps::REMOTE_COMM),
        (sys::FI_FENCE, Caps::FENCE),
        (sys::FI_LOCAL_COMM, Caps::LOCAL_COMM),
        (sys::FI_MSG_PREFIX, Caps::MSG_PREFIX),
        (sys::FI_HMEM, Caps::HMEM),
    )
}

pub(crate) fn to_fi_mode(mode: Mode) -> u64 {
    translate_bits!(
        mode,
        (Mode::CONTEXT, sys::FI_CONTEXT),
        (Mode::MSG_PREFIX, sys::FI_MSG_PREFIX),
        (Mode::RX_CQ_DATA, sys::FI_RX_CQ_DATA),
        (Mode::LOCAL_MR, sys::FI_LOCAL_MR),
    )
}

pub(crate) fn from_fi_mode(raw: u64) -> Mode {
    translate_bits_back!(
        raw,
        Mode::EMPTY,
        (sys::FI_CONTEXT, Mode::CONTEXT),
        (sys::FI_MSG_PREFIX, Mode::MSG_PREFIX),
        (sys::FI_RX_CQ_DATA, Mode::RX_CQ_DATA),
        (sys::FI_LOCAL_MR, Mode::LOCAL_MR),
    )
}

pub(crate) fn to_fi_msg_order(order: MsgOrder) -> u64 {
    translate_bits!(
        order,
        (MsgOrder::STRICT, sys::FI_ORDER_STRICT),
        (MsgOrder::DATA, sys::FI_ORDER_DATA),
        (MsgOrder::RAW, sys::FI_ORDER_RAW),
        (MsgOrder::WAR, sys::FI_ORDER_WAR),
        (MsgOrder::WAW, sys::FI_ORDER_WAW),
    )
}

pub(crate) fn from_fi_msg_order(raw: u64) -> MsgOrder {
    let mut out = MsgOrder::EMPTY;
    // FI_ORDER_STRICT 是 9 个细粒度位的全集；只有整组命中才翻译为 STRICT，
    // 否则按单个依赖序位拆解，避免 RAW/WAR/WAW 被重复置位。
    if raw & sys::FI_ORDER_STRICT == sys::FI_ORDER_STRICT {
        out = out.union(MsgOrder::STRICT);
    } else {
        if raw & sys::FI_ORDER_RAW != 0 {
            out = out.union(MsgOrder::RAW);
        }
        if raw & sys::FI_ORDER_WAR != 0 {
            out = out.union(MsgOrder::WAR);
        }
        if raw & sys::FI_ORDER_WAW != 0 {
            out = out.union(MsgOrder::WAW);
        }
    }
    if raw & sys::FI_ORDER_DATA != 0 {
        out = out.union(MsgOrder::DATA);
    }
    out
}

pub(crate) fn to_fi_comp_order(order: CompOrder) -> u64 {
    translate_bits!(
        order,
        (CompOrder::STRICT, sys::FI_ORDER_STRICT),
        (CompOrder::DATA, sys::FI_ORDER_DATA),
    )
}

pub(crate) fn from_fi_comp_order(raw: u64) -> CompOrder {
    let mut out = CompOrder::EMPTY;
    if raw & sys::FI_ORDER_STRICT == sys::FI_ORDER_STRICT {
        out = out.union(CompOrder::STRICT);
    }
    if raw & sys::FI_ORDER_DATA != 0 {
        out = out.union(CompOrder::DATA);
    }
    out
}

pub(crate) fn to_fi_mr_access(access: MrAccess) -> u64 {
    translate_bits!(
        access,
        (MrAccess::READ, sys::FI_READ),
        (MrAccess::WRITE, sys::FI_WRITE),
        (MrAccess::REMOTE_READ, sys::FI_REMOTE_READ),
        (MrAccess::REMOTE_WRITE, sys::FI_REMOTE_WRITE),
        (MrAccess::SEND, sys::FI_SEND),
        (MrAccess::RECV, sys::FI_RECV),
    )
}

pub(crate) fn from_fi_mr_access(raw: u64) -> MrAccess {
    translate_bits_back!(
        raw,
        MrAccess::EMPTY,
        (sys::FI_READ, MrAccess::READ),
        (sys::FI_WRITE, MrAccess::WRITE),
        (sys::FI_REMOTE_READ, MrAccess::REMOTE_READ),
        (sys::FI_REMOTE_WRITE, MrAccess::REMOTE_WRITE),
        (sys::FI_SEND, MrAccess::SEND),
        (sys::FI_RECV, MrAccess::RECV),
    )
}

pub(crate) fn to_fi_mr_mode(mode: MrMode) -> i32 {
    let mut out = 0;
    if mode.contains(MrMode::SCALABLE) {
        out |= sys::FI_MR_SCALABLE;
    }
    if mode.contains(MrMode::LOCAL) {
        out |= sys::FI_MR_LOCAL;
    }
    if mode.contains(MrMode::VIRT_ADDR) {
        out |= sys::FI_MR_VIRT_ADDR;
    }
    if mode.contains(MrMode::ALLOCATED) {
        out |= sys::FI_MR_ALLOCATED;
    }
    if mode.contains(MrMode::PROV_KEY) {
        out |= sys::FI_MR_PROV_KEY;
    }
    if mode.contains(MrMode::RAW) {
        out |= sys::FI_MR_RAW;
    }
    if mode.contains(MrMode::HMEM) {
        out |= sys::FI_MR_HMEM;
    }
    if mode.contains(MrMode::ENDPOINT) {
        out |= sys::FI_MR_ENDPOINT;
    }
    if mode.contains(MrMode::COLLECTIVE) {
        out |= sys::FI_MR_COLLECTIVE;
    }
    out
}

pub(crate) fn from_fi_mr_mode(raw: i32) -> MrMode {
    let mut out = MrMode::EMPTY;
    if raw & sys::FI_MR_SCALABLE != 0 {
        out = out.union(MrMode::SCALABLE);
    }
    if raw & sys::FI_MR_LOCAL != 0 {
        out = out.union(MrMode::LOCAL);
    }
    if raw & sys::FI_MR_VIRT_ADDR != 0 {
        out = out.union(MrMode::VIRT_ADDR);
    }
    if raw & sys::FI_MR_ALLOCATED != 0 {
        out = out.union(MrMode::ALLOCATED);
    }
    if raw & sys::FI_MR_PROV_KEY != 0 {
        out = out.union(MrMode::PROV_KEY);
    }
    if raw & sys::FI_MR_RAW != 0 {
        out = out.union(MrMode::RAW);
    }
    if raw & sys::FI_MR_HMEM != 0 {
        out = out.union(MrMode::HMEM);
    }
    if raw & sys::FI_MR_ENDPOINT != 0 {
        out = out.union(MrMode::ENDPOINT);
    }
    if raw & sys::FI_MR_COLLECTIVE != 0 {
        out = out.union(MrMode::COLLECTIVE);
    }
    out
}

pub(crate) fn to_fi_cq_bind_flags(flags: CqBindFlags) -> u64 {
    translate_bits!(
        flags,
        (CqBindFlags::TRANSMIT, sys::FI_TRANSMIT),
        (CqBindFlags::RECV, sys::FI_RECV),
        (CqBindFlags::SELECTIVE_COMPLETION, sys::FI_SELECTIVE_COMPLETION),
    )
}

pub(crate) fn to_fi_op_flags(flags: OpFlags) -> u64 {
    translate_bits!(
        flags,
        (OpFlags::COMPLETION, sys::FI_COMPLETION),
        (OpFlags::INJECT, sys::FI_INJECT),
        (OpFlags::FENCE, sys::FI_FENCE),
        (OpFlags::TRANSMIT_COMPLETE, sys::FI_TRANSMIT_COMPLETE),
        (OpFlags::DELIVERY_COMPLETE, sys::FI_DELIVERY_COMPLETE),
    )
}

pub(crate) fn to_fi_ep_type(ep_type: EndpointType) -> u32 {
    match ep_type {
        EndpointType::Msg => sys::FI_EP_MSG,
        EndpointType::Rdm => sys::FI_EP_RDM,
        EndpointType::Dgram => sys::FI_EP_DGRAM,
    }
}

pub(crate) fn from_fi_ep_type(raw: u32) -> EndpointType {
    match raw {
        sys::FI_EP_RDM => EndpointType::Rdm,
        sys::FI_EP_DGRAM => EndpointType::Dgram,
        _ => EndpointType::Msg,
    }
}

pub(crate) fn to_fi_addr_format(format: AddressFormat) -> u32 {
    match format {
        AddressFormat::Inet => sys::FI_SOCKADDR_IN,
        AddressFormat::Inet6 => sys::FI_SOCKADDR_IN6,
        AddressFormat::Ib => sys::FI_SOCKADDR_IB,
        AddressFormat::Ethernet => sys::FI_ADDR_EFA,
        AddressFormat::Unspecified => sys::FI_FORMAT_UNSPEC,
    }
}

pub(crate) fn from_fi_addr_format(raw: u32) -> AddressFormat {
    match raw {
        sys::FI_SOCKADDR_IN => AddressFormat::Inet,
        sys::FI_SOCKADDR_IN6 => AddressFormat::Inet6,
        sys::FI_SOCKADDR_IB => AddressFormat::Ib,
        sys::FI_ADDR_EFA => AddressFormat::Ethernet,
        _ => AddressFormat::Unspecified,
    }
}

pub(crate) fn to_fi_progress(mode: ProgressMode) -> u32 {
    match mode {
        ProgressMode::Auto => sys::FI_PROGRESS_AUTO,
        ProgressMode::Manual => sys::FI_PROGRESS_MANUAL,
        ProgressMode::Unspecified => sys::FI_PROGRESS_UNSPEC,
    }
}

pub(crate) fn from_fi_progress(raw: u32) -> ProgressMode {
    match raw {
        sys::FI_PROGRESS_AUTO => ProgressMode::Auto,
        sys::FI_PROGRESS_MANUAL => ProgressMode::Manual,
        _ => ProgressMode::Unspecified,
    }
}

pub(crate) fn to_fi_threading(mode: ThreadingMode) -> u32 {
    match mode {
        ThreadingMode::Safe => sys::FI_THREAD_SAFE,
        ThreadingMode::Fid => sys::FI_THREAD_FID,
        ThreadingMode::Domain => sys::FI_THREAD_DOMAIN,
        ThreadingMode::Completion => sys::FI_THREAD_COMPLETION,
        ThreadingMode::Unspecified => sys::FI_THREAD_UNSPEC,
    }
}

pub(crate) fn from_fi_threading(raw: u32) -> ThreadingMode {
    match raw {
        sys::FI_THREAD_SAFE => ThreadingMode::Safe,
        // FI_THREAD_ENDPOINT 已并入按对象串行化一档。
        sys::FI_THREAD_FID | sys::FI_THREAD_ENDPOINT => ThreadingMode::Fid,
        sys::FI_THREAD_DOMAIN => ThreadingMode::Domain,
        sys::FI_THREAD_COMPLETION => ThreadingMode::Completion,
        _ => ThreadingMode::Unspecified,
    }
}

pub(crate) fn to_fi_av_type(av_type: AvType) -> u32 {
    match av_type {
        AvType::Map => sys::FI_AV_MAP,
        AvType::Table => sys::FI_AV_TABLE,
        AvType::Unspecified => sys::FI_AV_UNSPEC,
    }
}

pub(crate) fn from_fi_av_type(raw: u32) -> AvType {
    match raw {
        sys::FI_AV_MAP => AvType::Map,
        sys::FI_AV_TABLE => AvType::Table,
        _ => AvType::Unspecified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 逐位翻译对每个已定义位满足 `from(to(x)) == x`。
    #[test]
    fn caps_round_trip_every_defined_bit() {
        let all = [
            Caps::MSG,
            Caps::RMA,
            Caps::TAGGED,
            Caps::ATOMIC,
            Caps::READ,
            Caps::WRITE,
            Caps::COLLECTIVE,
            Caps::RECV,
            Caps::SEND,
            Caps::REMOTE_READ,
            Caps::REMOTE_WRITE,
            Caps::MULTI_RECV,
            Caps::REMOTE_COMM,
            Caps::FENCE,
            Caps::LOCAL_COMM,
            Caps::MSG_PREFIX,
            Caps::HMEM,
        ];
        for &flag in &all {
            assert_eq!(from_fi_caps(to_fi_caps(flag)), flag, "{flag:?} 往返失败");
        }
        let combo = Caps::MSG | Caps::RMA | Caps::HMEM;
        assert_eq!(from_fi_caps(to_fi_caps(combo)), combo);
    }

    #[test]
    fn mode_round_trip() {
        for flag in [Mode::CONTEXT, Mode::MSG_PREFIX, Mode::RX_CQ_DATA, Mode::LOCAL_MR] {
            assert_eq!(from_fi_mode(to_fi_mode(flag)), flag);
        }
    }

    #[test]
    fn ordering_round_trip() {
        for flag in [
            MsgOrder::STRICT,
            MsgOrder::DATA,
            MsgOrder::RAW,
            MsgOrder::WAR,
            MsgOrder::WAW,
        ] {
            assert_eq!(from_fi_msg_order(to_fi_msg_order(flag)), flag);
        }
        for flag in [CompOrder::STRICT, CompOrder::DATA] {
            assert_eq!(from_fi_comp_order(to_fi_comp_order(flag)), flag);
        }
    }

    #[test]
    fn mr_mode_and_access_round_trip() {
        for flag in [
            MrMode::SCALABLE,
            MrMode::LOCAL,
            MrMode::VIRT_ADDR,
            MrMode::ALLOCATED,
            MrMode::PROV_KEY,
            MrMode::RAW,
            MrMode::HMEM,
            MrMode::ENDPOINT,
            MrMode::COLLECTIVE,
        ] {
            assert_eq!(from_fi_mr_mode(to_fi_mr_mode(flag)), flag);
        }
        for flag in [
            MrAccess::READ,
            MrAccess::WRITE,
            MrAccess::REMOTE_READ,
            MrAccess::REMOTE_WRITE,
            MrAccess::SEND,
            MrAccess::RECV,
        ] {
            assert_eq!(from_fi_mr_access(to_fi_mr_access(flag)), flag);
        }
    }

    #[test]
    fn enum_round_trip() {
        for ep in [EndpointType::Msg, EndpointType::Rdm, EndpointType::Dgram] {
            assert_eq!(from_fi_ep_type(to_fi_ep_type(ep)), ep);
        }
        for fmt in [
            AddressFormat::Unspecified,
            AddressFormat::Inet,
            AddressFormat::Inet6,
            AddressFormat::Ib,
            AddressFormat::Ethernet,
        ] {
            assert_eq!(from_fi_addr_format(to_fi_addr_format(fmt)), fmt);
        }
        for mode in [ProgressMode::Unspecified, ProgressMode::Auto, ProgressMode::Manual] {
            assert_eq!(from_fi_progress(to_fi_progress(mode)), mode);
        }
        for mode in [
            ThreadingMode::Unspecified,
            ThreadingMode::Safe,
            ThreadingMode::Fid,
            ThreadingMode::Domain,
            ThreadingMode::Completion,
        ] {
            assert_eq!(from_fi_threading(to_fi_threading(mode)), mode);
        }
        for av in [AvType::Unspecified, AvType::Map, AvType::Table] {
            assert_eq!(from_fi_av_type(to_fi_av_type(av)), av);
        }
    }

    /// CQ 绑定与操作修饰位的目标常量必须与头文件逐位一致。
    #[test]
    fn cq_bind_and_op_flag_targets_are_bit_exact() {
        assert_eq!(to_fi_cq_bind_flags(CqBindFlags::TRANSMIT), weft_sys::FI_TRANSMIT);
        assert_eq!(to_fi_cq_bind_flags(CqBindFlags::RECV), weft_sys::FI_RECV);
        assert_eq!(
            to_fi_cq_bind_flags(CqBindFlags::SELECTIVE_COMPLETION),
            weft_sys::FI_SELECTIVE_COMPLETION
        );
        assert_eq!(to_fi_op_flags(OpFlags::COMPLETION), weft_sys::FI_COMPLETION);
        assert_eq!(to_fi_op_flags(OpFlags::INJECT), weft_sys::FI_INJECT);
        assert_eq!(to_fi_op_flags(OpFlags::FENCE), weft_sys::FI_FENCE);
        assert_eq!(
            to_fi_op_flags(OpFlags::TRANSMIT_COMPLETE | OpFlags::DELIVERY_COMPLETE),
            weft_sys::FI_TRANSMIT_COMPLETE | weft_sys::FI_DELIVERY_COMPLETE
        );
    }
}
