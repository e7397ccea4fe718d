//! # weft-sys
//!
//! ## 定位与职责（Why）
//! - 以手写 `#[repr(C)]` 镜像的方式暴露 libfabric（OFI）的 C ABI：导出符号、
//!   属性结构、完成/事件条目、以及各对象的操作函数表；
//! - libfabric 头文件把几乎所有数据面入口（`fi_send`、`fi_cq_read`、
//!   `fi_cntr_add` 等）定义为 `static inline` 的函数表转发，动态库中并不存在
//!   对应符号，因此本 crate 以 `#[inline]` 的 `unsafe fn` 按同样的布局完成转发。
//!
//! ## 契约（What）
//! - 结构布局与常量值与 libfabric 1.x 头文件逐位一致；任何偏差都是缺陷；
//! - 本 crate 不做任何语义封装：空指针检查、错误码翻译、生命周期管理全部
//!   属于上层 `weft-core` 的职责；
//! - 所有函数均为 `unsafe`：调用方必须保证句柄有效且来自同一 provider 实例。
//!
//! ## 风险提示（Trade-offs）
//! - 手写镜像省去了 bindgen 的构建依赖，代价是升级 libfabric 大版本时需要
//!   人工核对新增字段；函数表均带 `size` 头字段，provider 端以此保证前向兼容。

#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

use core::ffi::{c_char, c_int, c_void};

use libc::{iovec, size_t, ssize_t};

pub type fi_addr_t = u64;
pub type fid_t = *mut fid;

/// `fi_addr_t` 的保留值：不指定对端地址。
pub const FI_ADDR_UNSPEC: fi_addr_t = u64::MAX;
/// 地址向量插入失败时返回的句柄哨兵值。
pub const FI_ADDR_NOTAVAIL: fi_addr_t = u64::MAX;
/// 远端键不可用哨兵值。
pub const FI_KEY_NOTAVAIL: u64 = u64::MAX;

pub const FI_MAJOR_VERSION: u32 = 1;
pub const FI_MINOR_VERSION: u32 = 21;

/// 组合 libfabric 接口版本号，传给 [`fi_getinfo`]。
#[inline]
pub const fn fi_version_for(major: u32, minor: u32) -> u32 {
    (major << 16) | minor
}

// ---------------------------------------------------------------------------
// 能力位（fi_info::caps）
// ---------------------------------------------------------------------------

pub const FI_MSG: u64 = 1 << 1;
pub const FI_RMA: u64 = 1 << 2;
pub const FI_TAGGED: u64 = 1 << 3;
pub const FI_ATOMIC: u64 = 1 << 4;
pub const FI_MULTICAST: u64 = 1 << 5;
pub const FI_COLLECTIVE: u64 = 1 << 6;

pub const FI_READ: u64 = 1 << 8;
pub const FI_WRITE: u64 = 1 << 9;
pub const FI_RECV: u64 = 1 << 10;
pub const FI_SEND: u64 = 1 << 11;
pub const FI_TRANSMIT: u64 = FI_SEND;
pub const FI_REMOTE_READ: u64 = 1 << 12;
pub const FI_REMOTE_WRITE: u64 = 1 << 13;

pub const FI_MULTI_RECV: u64 = 1 << 16;
pub const FI_REMOTE_CQ_DATA: u64 = 1 << 17;
pub const FI_MORE: u64 = 1 << 18;
pub const FI_PEEK: u64 = 1 << 19;
pub const FI_TRIGGER: u64 = 1 << 20;
pub const FI_FENCE: u64 = 1 << 21;

pub const FI_COMPLETION: u64 = 1 << 24;
pub const FI_INJECT: u64 = 1 << 25;
pub const FI_INJECT_COMPLETE: u64 = 1 << 26;
pub const FI_TRANSMIT_COMPLETE: u64 = 1 << 27;
pub const FI_DELIVERY_COMPLETE: u64 = 1 << 28;
pub const FI_AFFINITY: u64 = 1 << 29;
pub const FI_COMMIT_COMPLETE: u64 = 1 << 30;
pub const FI_MATCH_COMPLETE: u64 = 1 << 31;

pub const FI_HMEM: u64 = 1 << 47;
pub const FI_VARIABLE_MSG: u64 = 1 << 48;
pub const FI_RMA_PMEM: u64 = 1 << 49;
pub const FI_SOURCE_ERR: u64 = 1 << 50;
pub const FI_LOCAL_COMM: u64 = 1 << 51;
pub const FI_REMOTE_COMM: u64 = 1 << 52;
pub const FI_SHARED_AV: u64 = 1 << 53;
pub const FI_PROV_ATTR_ONLY: u64 = 1 << 54;
pub const FI_NUMERICHOST: u64 = 1 << 55;
pub const FI_RMA_EVENT: u64 = 1 << 56;
pub const FI_SOURCE: u64 = 1 << 57;
pub const FI_NAMED_RX_CTX: u64 = 1 << 58;
pub const FI_DIRECTED_RECV: u64 = 1 << 59;

// ---------------------------------------------------------------------------
// 模式位（fi_info::mode）——与能力位同宽但处于独立命名空间
// ---------------------------------------------------------------------------

pub const FI_CONTEXT: u64 = 1 << 59;
pub const FI_MSG_PREFIX: u64 = 1 << 58;
pub const FI_ASYNC_IOV: u64 = 1 << 57;
pub const FI_RX_CQ_DATA: u64 = 1 << 56;
pub const FI_LOCAL_MR: u64 = 1 << 55;
pub const FI_NOTIFY_FLAGS_ONLY: u64 = 1 << 54;
pub const FI_RESTRICTED_COMP: u64 = 1 << 53;
pub const FI_CONTEXT2: u64 = 1 << 52;
pub const FI_BUFFERED_RECV: u64 = 1 << 51;

// ---------------------------------------------------------------------------
// MR 模式位（fi_domain_attr::mr_mode，int 宽度）
// ---------------------------------------------------------------------------

pub const FI_MR_UNSPEC: c_int = 0;
pub const FI_MR_BASIC: c_int = 1 << 0;
pub const FI_MR_SCALABLE: c_int = 1 << 1;
pub const FI_MR_LOCAL: c_int = 1 << 2;
pub const FI_MR_RAW: c_int = 1 << 3;
pub const FI_MR_VIRT_ADDR: c_int = 1 << 4;
pub const FI_MR_ALLOCATED: c_int = 1 << 5;
pub const FI_MR_PROV_KEY: c_int = 1 << 6;
pub const FI_MR_MMU_NOTIFY: c_int = 1 << 7;
pub const FI_MR_RMA_EVENT: c_int = 1 << 8;
pub const FI_MR_ENDPOINT: c_int = 1 << 9;
pub const FI_MR_HMEM: c_int = 1 << 10;
pub const FI_MR_COLLECTIVE: c_int = 1 << 11;

/// `fi_mr_regattr` 专用：注册 DMA-buf 时在 flags 中置位。
pub const FI_MR_DMABUF: u64 = 1 << 40;

// ---------------------------------------------------------------------------
// 顺序保证位（fi_tx_attr::msg_order / comp_order）
// ---------------------------------------------------------------------------

pub const FI_ORDER_NONE: u64 = 0;
pub const FI_ORDER_RAR: u64 = 1 << 0;
pub const FI_ORDER_RAW: u64 = 1 << 1;
pub const FI_ORDER_RAS: u64 = 1 << 2;
pub const FI_ORDER_WAR: u64 = 1 << 3;
pub const FI_ORDER_WAW: u64 = 1 << 4;
pub const FI_ORDER_WAS: u64 = 1 << 5;
pub const FI_ORDER_SAR: u64 = 1 << 6;
pub const FI_ORDER_SAW: u64 = 1 << 7;
pub const FI_ORDER_SAS: u64 = 1 << 8;
pub const FI_ORDER_STRICT: u64 = 0x1ff;
pub const FI_ORDER_DATA: u64 = 1 << 16;

// ---------------------------------------------------------------------------
// 绑定与选择性完成
// ---------------------------------------------------------------------------

pub const FI_SELECTIVE_COMPLETION: u64 = 1 << 0;

// ---------------------------------------------------------------------------
// 枚举
// ---------------------------------------------------------------------------

pub const FI_EP_UNSPEC: u32 = 0;
pub const FI_EP_MSG: u32 = 1;
pub const FI_EP_DGRAM: u32 = 2;
pub const FI_EP_RDM: u32 = 3;

pub const FI_FORMAT_UNSPEC: u32 = 0;
pub const FI_SOCKADDR: u32 = 1;
pub const FI_SOCKADDR_IN: u32 = 2;
pub const FI_SOCKADDR_IN6: u32 = 3;
pub const FI_SOCKADDR_IB: u32 = 4;
pub const FI_ADDR_PSMX: u32 = 5;
pub const FI_ADDR_GNI: u32 = 6;
pub const FI_ADDR_BGQ: u32 = 7;
pub const FI_ADDR_MLX: u32 = 8;
pub const FI_ADDR_STR: u32 = 9;
pub const FI_ADDR_PSMX2: u32 = 10;
pub const FI_ADDR_IB_UD: u32 = 11;
pub const FI_ADDR_EFA: u32 = 12;
pub const FI_ADDR_PSMX3: u32 = 13;
pub const FI_ADDR_OPX: u32 = 14;
pub const FI_ADDR_CXI: u32 = 15;
pub const FI_ADDR_UCX: u32 = 16;

pub const FI_PROGRESS_UNSPEC: u32 = 0;
pub const FI_PROGRESS_AUTO: u32 = 1;
pub const FI_PROGRESS_MANUAL: u32 = 2;

pub const FI_THREAD_UNSPEC: u32 = 0;
pub const FI_THREAD_SAFE: u32 = 1;
pub const FI_THREAD_FID: u32 = 2;
pub const FI_THREAD_DOMAIN: u32 = 3;
pub const FI_THREAD_COMPLETION: u32 = 4;
pub const FI_THREAD_ENDPOINT: u32 = 5;

pub const FI_RM_UNSPEC: u32 = 0;
pub const FI_RM_DISABLED: u32 = 1;
pub const FI_RM_ENABLED: u32 = 2;

pub const FI_AV_UNSPEC: u32 = 0;
pub const FI_AV_MAP: u32 = 1;
pub const FI_AV_TABLE: u32 = 2;

pub const FI_WAIT_NONE: u32 = 0;
pub const FI_WAIT_UNSPEC: u32 = 1;
pub const FI_WAIT_SET: u32 = 2;
pub const FI_WAIT_FD: u32 = 3;
pub const FI_WAIT_MUTEX_COND: u32 = 4;
pub const FI_WAIT_YIELD: u32 = 5;

pub const FI_CQ_FORMAT_UNSPEC: u32 = 0;
pub const FI_CQ_FORMAT_CONTEXT: u32 = 1;
pub const FI_CQ_FORMAT_MSG: u32 = 2;
pub const FI_CQ_FORMAT_DATA: u32 = 3;
pub const FI_CQ_FORMAT_TAGGED: u32 = 4;

pub const FI_CNTR_EVENTS_COMP: u32 = 1;

// 事件队列事件码。
pub const FI_NOTIFY: u32 = 1;
pub const FI_CONNREQ: u32 = 2;
pub const FI_CONNECTED: u32 = 3;
pub const FI_SHUTDOWN: u32 = 4;
pub const FI_MR_COMPLETE: u32 = 5;
pub const FI_AV_COMPLETE: u32 = 6;
pub const FI_JOIN_COMPLETE: u32 = 7;

// 原子操作码（enum fi_op）。
pub const FI_MIN: u32 = 0;
pub const FI_MAX: u32 = 1;
pub const FI_SUM: u32 = 2;
pub const FI_PROD: u32 = 3;
pub const FI_LOR: u32 = 4;
pub const FI_LAND: u32 = 5;
pub const FI_BOR: u32 = 6;
pub const FI_BAND: u32 = 7;
pub const FI_LXOR: u32 = 8;
pub const FI_BXOR: u32 = 9;
pub const FI_ATOMIC_READ: u32 = 10;
pub const FI_ATOMIC_WRITE: u32 = 11;
pub const FI_CSWAP: u32 = 12;
pub const FI_CSWAP_NE: u32 = 13;
pub const FI_CSWAP_LE: u32 = 14;
pub const FI_CSWAP_LT: u32 = 15;
pub const FI_CSWAP_GE: u32 = 16;
pub const FI_CSWAP_GT: u32 = 17;
pub const FI_MSWAP: u32 = 18;

// 原子数据类型（enum fi_datatype）。
pub const FI_INT8: u32 = 0;
pub const FI_UINT8: u32 = 1;
pub const FI_INT16: u32 = 2;
pub const FI_UINT16: u32 = 3;
pub const FI_INT32: u32 = 4;
pub const FI_UINT32: u32 = 5;
pub const FI_INT64: u32 = 6;
pub const FI_UINT64: u32 = 7;
pub const FI_FLOAT: u32 = 8;
pub const FI_DOUBLE: u32 = 9;
pub const FI_FLOAT_COMPLEX: u32 = 10;
pub const FI_DOUBLE_COMPLEX: u32 = 11;
pub const FI_LONG_DOUBLE: u32 = 12;
pub const FI_LONG_DOUBLE_COMPLEX: u32 = 13;
pub const FI_INT128: u32 = 14;
pub const FI_UINT128: u32 = 15;

// 触发操作（enum fi_trigger_op / fi_trigger_event）。
pub const FI_OP_RECV: u32 = 0;
pub const FI_OP_SEND: u32 = 1;
pub const FI_OP_TRECV: u32 = 2;
pub const FI_OP_TSEND: u32 = 3;
pub const FI_OP_READ: u32 = 4;
pub const FI_OP_WRITE: u32 = 5;
pub const FI_OP_ATOMIC: u32 = 6;
pub const FI_OP_FETCH_ATOMIC: u32 = 7;
pub const FI_OP_COMPARE_ATOMIC: u32 = 8;
pub const FI_OP_CNTR_SET: u32 = 9;
pub const FI_OP_CNTR_ADD: u32 = 10;

pub const FI_TRIGGER_THRESHOLD: u32 = 0;
pub const FI_TRIGGER_XPU: u32 = 1;

// fi_control 命令（fabric.h 匿名枚举）。
pub const FI_GETFIDFLAG: c_int = 0;
pub const FI_SETFIDFLAG: c_int = 1;
pub const FI_GETOPSFLAG: c_int = 2;
pub const FI_SETOPSFLAG: c_int = 3;
pub const FI_ENABLE: c_int = 4;
pub const FI_BACKLOG: c_int = 5;
pub const FI_GET_RAW_MR: c_int = 6;
pub const FI_MAP_RAW_MR: c_int = 7;
pub const FI_UNMAP_KEY: c_int = 8;
pub const FI_QUEUE_WORK: c_int = 9;
pub const FI_CANCEL_WORK: c_int = 10;
pub const FI_FLUSH_WORK: c_int = 11;
pub const FI_REFRESH: c_int = 12;

// HMEM 接口（enum fi_hmem_iface）。
pub const FI_HMEM_SYSTEM: u32 = 0;
pub const FI_HMEM_CUDA: u32 = 1;
pub const FI_HMEM_ROCR: u32 = 2;
pub const FI_HMEM_ZE: u32 = 3;
pub const FI_HMEM_NEURON: u32 = 4;
pub const FI_HMEM_SYNAPSEAI: u32 = 5;

// 常用负 errno（与 Linux errno 同值，provider 以负值返回）。
pub const FI_ENOENT: c_int = 2;
pub const FI_EIO: c_int = 5;
pub const FI_EAGAIN: c_int = 11;
pub const FI_ENOMEM: c_int = 12;
pub const FI_EBUSY: c_int = 16;
pub const FI_EINVAL: c_int = 22;
pub const FI_ENOSPC: c_int = 28;
pub const FI_ENODATA: c_int = 61;
pub const FI_EMSGSIZE: c_int = 90;
pub const FI_ENOSYS: c_int = 95;
pub const FI_EADDRINUSE: c_int = 98;
pub const FI_EADDRNOTAVAIL: c_int = 99;
pub const FI_ENOTCONN: c_int = 107;
pub const FI_ETIMEDOUT: c_int = 110;
pub const FI_ECONNREFUSED: c_int = 111;
pub const FI_EALREADY: c_int = 114;
pub const FI_ECANCELED: c_int = 125;

// ---------------------------------------------------------------------------
// 基础记录
// ---------------------------------------------------------------------------

/// 每次提交操作随附的 provider 刮写区，必须保持地址稳定直至完成事件返回。
#[repr(C)]
#[derive(Debug)]
pub struct fi_context2 {
    pub internal: [*mut c_void; 8],
}

impl Default for fi_context2 {
    fn default() -> Self {
        Self {
            internal: [core::ptr::null_mut(); 8],
        }
    }
}

/// 所有 fabric 对象共享的句柄头：类别、用户上下文、基础操作表。
#[repr(C)]
pub struct fid {
    pub fclass: size_t,
    pub context: *mut c_void,
    pub ops: *mut fi_ops,
}

#[repr(C)]
pub struct fi_ops {
    pub size: size_t,
    pub close: unsafe extern "C" fn(fid: *mut fid) -> c_int,
    pub bind: unsafe extern "C" fn(fid: *mut fid, bfid: *mut fid, flags: u64) -> c_int,
    pub control: unsafe extern "C" fn(fid: *mut fid, command: c_int, arg: *mut c_void) -> c_int,
    pub ops_open: unsafe extern "C" fn(
        fid: *mut fid,
        name: *const c_char,
        flags: u64,
        ops: *mut *mut c_void,
        context: *mut c_void,
    ) -> c_int,
    pub tostr: unsafe extern "C" fn(fid: *const fid, buf: *mut c_char, len: size_t) -> c_int,
    pub ops_set: unsafe extern "C" fn(
        fid: *mut fid,
        name: *const c_char,
        flags: u64,
        ops: *mut c_void,
        context: *mut c_void,
    ) -> c_int,
}

// ---------------------------------------------------------------------------
// 属性结构
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct fi_fabric_attr {
    pub fabric: *mut fid_fabric,
    pub name: *mut c_char,
    pub prov_name: *mut c_char,
    pub prov_version: u32,
    pub api_version: u32,
}

#[repr(C)]
pub struct fi_domain_attr {
    pub domain: *mut fid_domain,
    pub name: *mut c_char,
    pub threading: u32,
    pub control_progress: u32,
    pub data_progress: u32,
    pub resource_mgmt: u32,
    pub av_type: u32,
    pub mr_mode: c_int,
    pub mr_key_size: size_t,
    pub cq_data_size: size_t,
    pub cq_cnt: size_t,
    pub ep_cnt: size_t,
    pub tx_ctx_cnt: size_t,
    pub rx_ctx_cnt: size_t,
    pub max_ep_tx_ctx: size_t,
    pub max_ep_rx_ctx: size_t,
    pub max_ep_stx_ctx: size_t,
    pub max_ep_srx_ctx: size_t,
    pub cntr_cnt: size_t,
    pub mr_iov_limit: size_t,
    pub caps: u64,
    pub mode: u64,
    pub auth_key: *mut u8,
    pub auth_key_size: size_t,
    pub max_err_data: size_t,
    pub mr_cnt: size_t,
    pub tclass: u32,
}

#[repr(C)]
pub struct fi_ep_attr {
    pub ep_type: u32,
    pub protocol: u32,
    pub protocol_version: u32,
    pub max_msg_size: size_t,
    pub msg_prefix_size: size_t,
    pub max_order_raw_size: size_t,
    pub max_order_war_size: size_t,
    pub max_order_waw_size: size_t,
    pub mem_tag_format: u64,
    pub tx_ctx_cnt: size_t,
    pub rx_ctx_cnt: size_t,
    pub auth_key_size: size_t,
    pub auth_key: *mut u8,
}

#[repr(C)]
pub struct fi_tx_attr {
    pub caps: u64,
    pub mode: u64,
    pub op_flags: u64,
    pub msg_order: u64,
    pub comp_order: u64,
    pub inject_size: size_t,
    pub size: size_t,
    pub iov_limit: size_t,
    pub rma_iov_limit: size_t,
    pub tclass: u32,
}

#[repr(C)]
pub struct fi_rx_attr {
    pub caps: u64,
    pub mode: u64,
    pub op_flags: u64,
    pub msg_order: u64,
    pub comp_order: u64,
    pub total_buffered_recv: size_t,
    pub size: size_t,
    pub iov_limit: size_t,
}

#[repr(C)]
pub struct fi_info {
    pub next: *mut fi_info,
    pub caps: u64,
    pub mode: u64,
    pub addr_format: u32,
    pub src_addrlen: size_t,
    pub dest_addrlen: size_t,
    pub src_addr: *mut c_void,
    pub dest_addr: *mut c_void,
    pub handle: fid_t,
    pub tx_attr: *mut fi_tx_attr,
    pub rx_attr: *mut fi_rx_attr,
    pub ep_attr: *mut fi_ep_attr,
    pub domain_attr: *mut fi_domain_attr,
    pub fabric_attr: *mut fi_fabric_attr,
    pub nic: *mut c_void,
}

#[repr(C)]
pub struct fi_cq_attr {
    pub size: size_t,
    pub flags: u64,
    pub format: u32,
    pub wait_obj: u32,
    pub signaling_vector: c_int,
    pub wait_cond: u32,
    pub wait_set: *mut c_void,
}

#[repr(C)]
pub struct fi_eq_attr {
    pub size: size_t,
    pub flags: u64,
    pub wait_obj: u32,
    pub signaling_vector: c_int,
    pub wait_set: *mut c_void,
}

#[repr(C)]
pub struct fi_av_attr {
    pub av_type: u32,
    pub rx_ctx_bits: c_int,
    pub count: size_t,
    pub ep_per_node: size_t,
    pub name: *const c_char,
    pub map_addr: *mut c_void,
    pub flags: u64,
}

#[repr(C)]
pub struct fi_cntr_attr {
    pub events: u32,
    pub wait_obj: u32,
    pub wait_set: *mut c_void,
    pub flags: u64,
}

#[repr(C)]
pub struct fi_mr_dmabuf {
    pub fd: c_int,
    pub offset: u64,
    pub len: size_t,
    pub base_addr: *mut c_void,
}

/// `fi_mr_attr::mr_iov` 与 `dmabuf` 在 C 侧是 union；此处保留 iov 形态，
/// DMA-buf 注册时以指针转写同一字段（两者均为单指针宽度）。
#[repr(C)]
pub struct fi_mr_attr {
    pub mr_iov: *const iovec,
    pub iov_count: size_t,
    pub access: u64,
    pub offset: u64,
    pub requested_key: u64,
    pub context: *mut c_void,
    pub auth_key_size: size_t,
    pub auth_key: *mut u8,
    pub iface: u32,
    pub device: u64,
    pub hmem_data: *mut c_void,
    pub page_size: size_t,
    pub base_mr: *const *const fid_mr,
    pub sub_mr_cnt: size_t,
}

// ---------------------------------------------------------------------------
// 消息描述符
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct fi_msg {
    pub msg_iov: *const iovec,
    pub desc: *mut *mut c_void,
    pub iov_count: size_t,
    pub addr: fi_addr_t,
    pub context: *mut c_void,
    pub data: u64,
}

#[repr(C)]
pub struct fi_msg_tagged {
    pub msg_iov: *const iovec,
    pub desc: *mut *mut c_void,
    pub iov_count: size_t,
    pub addr: fi_addr_t,
    pub tag: u64,
    pub ignore: u64,
    pub context: *mut c_void,
    pub data: u64,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct fi_rma_iov {
    pub addr: u64,
    pub len: size_t,
    pub key: u64,
}

#[repr(C)]
pub struct fi_msg_rma {
    pub msg_iov: *const iovec,
    pub desc: *mut *mut c_void,
    pub iov_count: size_t,
    pub addr: fi_addr_t,
    pub rma_iov: *const fi_rma_iov,
    pub rma_iov_count: size_t,
    pub context: *mut c_void,
    pub data: u64,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct fi_ioc {
    pub addr: *mut c_void,
    pub count: size_t,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct fi_rma_ioc {
    pub addr: u64,
    pub count: size_t,
    pub key: u64,
}

#[repr(C)]
pub struct fi_msg_atomic {
    pub msg_iov: *const fi_ioc,
    pub desc: *mut *mut c_void,
    pub iov_count: size_t,
    pub addr: fi_addr_t,
    pub rma_iov: *const fi_rma_ioc,
    pub rma_iov_count: size_t,
    pub datatype: u32,
    pub op: u32,
    pub context: *mut c_void,
    pub data: u64,
}

// ---------------------------------------------------------------------------
// 完成/事件条目
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct fi_cq_data_entry {
    pub op_context: *mut c_void,
    pub flags: u64,
    pub len: size_t,
    pub buf: *mut c_void,
    pub data: u64,
}

impl Default for fi_cq_data_entry {
    fn default() -> Self {
        Self {
            op_context: core::ptr::null_mut(),
            flags: 0,
            len: 0,
            buf: core::ptr::null_mut(),
            data: 0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct fi_cq_err_entry {
    pub op_context: *mut c_void,
    pub flags: u64,
    pub len: size_t,
    pub buf: *mut c_void,
    pub data: u64,
    pub tag: u64,
    pub olen: size_t,
    pub err: c_int,
    pub prov_errno: c_int,
    pub err_data: *mut c_void,
    pub err_data_size: size_t,
}

impl Default for fi_cq_err_entry {
    fn default() -> Self {
        Self {
            op_context: core::ptr::null_mut(),
            flags: 0,
            len: 0,
            buf: core::ptr::null_mut(),
            data: 0,
            tag: 0,
            olen: 0,
            err: 0,
            prov_errno: 0,
            err_data: core::ptr::null_mut(),
            err_data_size: 0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct fi_eq_entry {
    pub fid: fid_t,
    pub context: *mut c_void,
    pub data: u64,
}

/// 连接管理事件条目；尾部柔性数组承载 CM 数据，读取时以缓冲区长度为准。
#[repr(C)]
pub struct fi_eq_cm_entry {
    pub fid: fid_t,
    pub info: *mut fi_info,
    pub data: [u8; 0],
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct fi_eq_err_entry {
    pub fid: fid_t,
    pub context: *mut c_void,
    pub data: u64,
    pub err: c_int,
    pub prov_errno: c_int,
    pub err_data: *mut c_void,
    pub err_data_size: size_t,
}

impl Default for fi_eq_err_entry {
    fn default() -> Self {
        Self {
            fid: core::ptr::null_mut(),
            context: core::ptr::null_mut(),
            data: 0,
            err: 0,
            prov_errno: 0,
            err_data: core::ptr::null_mut(),
            err_data_size: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// 触发/延迟工作
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy)]
pub struct fi_trigger_threshold {
    pub cntr: *mut fid_cntr,
    pub threshold: size_t,
}

/// 触发式提交使用的上下文头：事件类型 + 触发条件。
/// 以 `FI_TRIGGER` 标志提交时，操作的 context 字段必须指向本结构。
#[repr(C)]
pub struct fi_triggered_context {
    pub event_type: u32,
    pub trigger: fi_trigger_union,
}

/// `fi_triggered_context::trigger` 的 union 槽位（阈值形态或 3 指针保留区）。
#[repr(C)]
pub union fi_trigger_union {
    pub threshold: fi_trigger_threshold,
    pub internal: [*mut c_void; 3],
}

#[repr(C)]
pub struct fi_op_msg {
    pub ep: *mut fid_ep,
    pub msg: fi_msg,
    pub flags: u64,
}

#[repr(C)]
pub struct fi_op_tagged {
    pub ep: *mut fid_ep,
    pub msg: fi_msg_tagged,
    pub flags: u64,
}

#[repr(C)]
pub struct fi_op_rma {
    pub ep: *mut fid_ep,
    pub msg: fi_msg_rma,
    pub flags: u64,
}

#[repr(C)]
pub struct fi_op_cntr {
    pub cntr: *mut fid_cntr,
    pub value: u64,
}

/// `fi_deferred_work::op` 在 C 侧是指针 union；所有成员同宽，以裸指针建模。
#[repr(C)]
pub struct fi_deferred_work {
    pub context: fi_context2,
    pub threshold: u64,
    pub triggering_cntr: *mut fid_cntr,
    pub completion_cntr: *mut fid_cntr,
    pub op_type: u32,
    pub op: *mut c_void,
}

// ---------------------------------------------------------------------------
// 对象操作表
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct fi_ops_fabric {
    pub size: size_t,
    pub domain: unsafe extern "C" fn(
        fabric: *mut fid_fabric,
        info: *mut fi_info,
        dom: *mut *mut fid_domain,
        context: *mut c_void,
    ) -> c_int,
    pub passive_ep: unsafe extern "C" fn(
        fabric: *mut fid_fabric,
        info: *mut fi_info,
        pep: *mut *mut fid_pep,
        context: *mut c_void,
    ) -> c_int,
    pub eq_open: unsafe extern "C" fn(
        fabric: *mut fid_fabric,
        attr: *mut fi_eq_attr,
        eq: *mut *mut fid_eq,
        context: *mut c_void,
    ) -> c_int,
    pub wait_open: unsafe extern "C" fn(
        fabric: *mut fid_fabric,
        attr: *mut c_void,
        waitset: *mut *mut c_void,
    ) -> c_int,
    pub trywait:
        unsafe extern "C" fn(fabric: *mut fid_fabric, fids: *mut fid_t, count: c_int) -> c_int,
}

#[repr(C)]
pub struct fi_ops_domain {
    pub size: size_t,
    pub av_open: unsafe extern "C" fn(
        domain: *mut fid_domain,
        attr: *mut fi_av_attr,
        av: *mut *mut fid_av,
        context: *mut c_void,
    ) -> c_int,
    pub cq_open: unsafe extern "C" fn(
        domain: *mut fid_domain,
        attr: *mut fi_cq_attr,
        cq: *mut *mut fid_cq,
        context: *mut c_void,
    ) -> c_int,
    pub endpoint: unsafe extern "C" fn(
        domain: *mut fid_domain,
        info: *mut fi_info,
        ep: *mut *mut fid_ep,
        context: *mut c_void,
    ) -> c_int,
    pub scalable_ep: unsafe extern "C" fn(
        domain: *mut fid_domain,
        info: *mut fi_info,
        sep: *mut *mut fid_ep,
        context: *mut c_void,
    ) -> c_int,
    pub cntr_open: unsafe extern "C" fn(
        domain: *mut fid_domain,
        attr: *mut fi_cntr_attr,
        cntr: *mut *mut fid_cntr,
        context: *mut c_void,
    ) -> c_int,
    pub poll_open: unsafe extern "C" fn(
        domain: *mut fid_domain,
        attr: *mut c_void,
        pollset: *mut *mut c_void,
    ) -> c_int,
    pub stx_ctx: unsafe extern "C" fn(
        domain: *mut fid_domain,
        attr: *mut fi_tx_attr,
        stx: *mut *mut fid_stx,
        context: *mut c_void,
    ) -> c_int,
    pub srx_ctx: unsafe extern "C" fn(
        domain: *mut fid_domain,
        attr: *mut fi_rx_attr,
        rx_ep: *mut *mut fid_ep,
        context: *mut c_void,
    ) -> c_int,
    pub query_atomic: unsafe extern "C" fn(
        domain: *mut fid_domain,
        datatype: u32,
        op: u32,
        attr: *mut c_void,
        flags: u64,
    ) -> c_int,
    pub query_collective: unsafe extern "C" fn(
        domain: *mut fid_domain,
        coll: u32,
        attr: *mut c_void,
        flags: u64,
    ) -> c_int,
}

#[repr(C)]
pub struct fi_ops_mr {
    pub size: size_t,
    pub reg: unsafe extern "C" fn(
        fid: *mut fid,
        buf: *const c_void,
        len: size_t,
        access: u64,
        offset: u64,
        requested_key: u64,
        flags: u64,
        mr: *mut *mut fid_mr,
        context: *mut c_void,
    ) -> c_int,
    pub regv: unsafe extern "C" fn(
        fid: *mut fid,
        iov: *const iovec,
        count: size_t,
        access: u64,
        offset: u64,
        requested_key: u64,
        flags: u64,
        mr: *mut *mut fid_mr,
        context: *mut c_void,
    ) -> c_int,
    pub regattr: unsafe extern "C" fn(
        fid: *mut fid,
        attr: *const fi_mr_attr,
        flags: u64,
        mr: *mut *mut fid_mr,
    ) -> c_int,
}

#[repr(C)]
pub struct fi_ops_ep {
    pub size: size_t,
    pub cancel: unsafe extern "C" fn(fid: *mut fid, context: *mut c_void) -> ssize_t,
    pub getopt: unsafe extern "C" fn(
        fid: *mut fid,
        level: c_int,
        optname: c_int,
        optval: *mut c_void,
        optlen: *mut size_t,
    ) -> c_int,
    pub setopt: unsafe extern "C" fn(
        fid: *mut fid,
        level: c_int,
        optname: c_int,
        optval: *const c_void,
        optlen: size_t,
    ) -> c_int,
    pub tx_ctx: unsafe extern "C" fn(
        sep: *mut fid_ep,
        index: c_int,
        attr: *mut fi_tx_attr,
        tx_ep: *mut *mut fid_ep,
        context: *mut c_void,
    ) -> c_int,
    pub rx_ctx: unsafe extern "C" fn(
        sep: *mut fid_ep,
        index: c_int,
        attr: *mut fi_rx_attr,
        rx_ep: *mut *mut fid_ep,
        context: *mut c_void,
    ) -> c_int,
    pub rx_size_left: unsafe extern "C" fn(ep: *mut fid_ep) -> ssize_t,
    pub tx_size_left: unsafe extern "C" fn(ep: *mut fid_ep) -> ssize_t,
}

#[repr(C)]
pub struct fi_ops_msg {
    pub size: size_t,
    pub recv: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *mut c_void,
        len: size_t,
        desc: *mut c_void,
        src_addr: fi_addr_t,
        context: *mut c_void,
    ) -> ssize_t,
    pub recvv: unsafe extern "C" fn(
        ep: *mut fid_ep,
        iov: *const iovec,
        desc: *mut *mut c_void,
        count: size_t,
        src_addr: fi_addr_t,
        context: *mut c_void,
    ) -> ssize_t,
    pub recvmsg:
        unsafe extern "C" fn(ep: *mut fid_ep, msg: *const fi_msg, flags: u64) -> ssize_t,
    pub send: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        len: size_t,
        desc: *mut c_void,
        dest_addr: fi_addr_t,
        context: *mut c_void,
    ) -> ssize_t,
    pub sendv: unsafe extern "C" fn(
        ep: *mut fid_ep,
        iov: *const iovec,
        desc: *mut *mut c_void,
        count: size_t,
        dest_addr: fi_addr_t,
        context: *mut c_void,
    ) -> ssize_t,
    pub sendmsg:
        unsafe extern "C" fn(ep: *mut fid_ep, msg: *const fi_msg, flags: u64) -> ssize_t,
    pub inject: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        len: size_t,
        dest_addr: fi_addr_t,
    ) -> ssize_t,
    pub senddata: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        len: size_t,
        desc: *mut c_void,
        data: u64,
        dest_addr: fi_addr_t,
        context: *mut c_void,
    ) -> ssize_t,
    pub injectdata: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        len: size_t,
        data: u64,
        dest_addr: fi_addr_t,
    ) -> ssize_t,
}

#[repr(C)]
pub struct fi_ops_tagged {
    pub size: size_t,
    pub recv: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *mut c_void,
        len: size_t,
        desc: *mut c_void,
        src_addr: fi_addr_t,
        tag: u64,
        ignore: u64,
        context: *mut c_void,
    ) -> ssize_t,
    pub recvv: unsafe extern "C" fn(
        ep: *mut fid_ep,
        iov: *const iovec,
        desc: *mut *mut c_void,
        count: size_t,
        src_addr: fi_addr_t,
        tag: u64,
        ignore: u64,
        context: *mut c_void,
    ) -> ssize_t,
    pub recvmsg:
        unsafe extern "C" fn(ep: *mut fid_ep, msg: *const fi_msg_tagged, flags: u64) -> ssize_t,
    pub send: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        len: size_t,
        desc: *mut c_void,
        dest_addr: fi_addr_t,
        tag: u64,
        context: *mut c_void,
    ) -> ssize_t,
    pub sendv: unsafe extern "C" fn(
        ep: *mut fid_ep,
        iov: *const iovec,
        desc: *mut *mut c_void,
        count: size_t,
        dest_addr: fi_addr_t,
        tag: u64,
        context: *mut c_void,
    ) -> ssize_t,
    pub sendmsg:
        unsafe extern "C" fn(ep: *mut fid_ep, msg: *const fi_msg_tagged, flags: u64) -> ssize_t,
    pub inject: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        len: size_t,
        dest_addr: fi_addr_t,
        tag: u64,
    ) -> ssize_t,
    pub senddata: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        len: size_t,
        desc: *mut c_void,
        data: u64,
        dest_addr: fi_addr_t,
        tag: u64,
        context: *mut c_void,
    ) -> ssize_t,
    pub injectdata: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        len: size_t,
        data: u64,
        dest_addr: fi_addr_t,
        tag: u64,
    ) -> ssize_t,
}

#[repr(C)]
pub struct fi_ops_rma {
    pub size: size_t,
    pub read: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *mut c_void,
        len: size_t,
        desc: *mut c_void,
        src_addr: fi_addr_t,
        addr: u64,
        key: u64,
        context: *mut c_void,
    ) -> ssize_t,
    pub readv: unsafe extern "C" fn(
        ep: *mut fid_ep,
        iov: *const iovec,
        desc: *mut *mut c_void,
        count: size_t,
        src_addr: fi_addr_t,
        addr: u64,
        key: u64,
        context: *mut c_void,
    ) -> ssize_t,
    pub readmsg:
        unsafe extern "C" fn(ep: *mut fid_ep, msg: *const fi_msg_rma, flags: u64) -> ssize_t,
    pub write: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        len: size_t,
        desc: *mut c_void,
        dest_addr: fi_addr_t,
        addr: u64,
        key: u64,
        context: *mut c_void,
    ) -> ssize_t,
    pub writev: unsafe extern "C" fn(
        ep: *mut fid_ep,
        iov: *const iovec,
        desc: *mut *mut c_void,
        count: size_t,
        dest_addr: fi_addr_t,
        addr: u64,
        key: u64,
        context: *mut c_void,
    ) -> ssize_t,
    pub writemsg:
        unsafe extern "C" fn(ep: *mut fid_ep, msg: *const fi_msg_rma, flags: u64) -> ssize_t,
    pub inject: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        len: size_t,
        dest_addr: fi_addr_t,
        addr: u64,
        key: u64,
    ) -> ssize_t,
    pub writedata: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        len: size_t,
        desc: *mut c_void,
        data: u64,
        dest_addr: fi_addr_t,
        addr: u64,
        key: u64,
        context: *mut c_void,
    ) -> ssize_t,
    pub injectdata: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        len: size_t,
        data: u64,
        dest_addr: fi_addr_t,
        addr: u64,
        key: u64,
    ) -> ssize_t,
}

#[repr(C)]
pub struct fi_ops_atomic {
    pub size: size_t,
    pub write: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        count: size_t,
        desc: *mut c_void,
        dest_addr: fi_addr_t,
        addr: u64,
        key: u64,
        datatype: u32,
        op: u32,
        context: *mut c_void,
    ) -> ssize_t,
    pub writev: unsafe extern "C" fn(
        ep: *mut fid_ep,
        iov: *const fi_ioc,
        desc: *mut *mut c_void,
        count: size_t,
        dest_addr: fi_addr_t,
        addr: u64,
        key: u64,
        datatype: u32,
        op: u32,
        context: *mut c_void,
    ) -> ssize_t,
    pub writemsg:
        unsafe extern "C" fn(ep: *mut fid_ep, msg: *const fi_msg_atomic, flags: u64) -> ssize_t,
    pub inject: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        count: size_t,
        dest_addr: fi_addr_t,
        addr: u64,
        key: u64,
        datatype: u32,
        op: u32,
    ) -> ssize_t,
    pub readwrite: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        count: size_t,
        desc: *mut c_void,
        result: *mut c_void,
        result_desc: *mut c_void,
        dest_addr: fi_addr_t,
        addr: u64,
        key: u64,
        datatype: u32,
        op: u32,
        context: *mut c_void,
    ) -> ssize_t,
    pub readwritev: unsafe extern "C" fn(
        ep: *mut fid_ep,
        iov: *const fi_ioc,
        desc: *mut *mut c_void,
        count: size_t,
        resultv: *mut fi_ioc,
        result_desc: *mut *mut c_void,
        result_count: size_t,
        dest_addr: fi_addr_t,
        addr: u64,
        key: u64,
        datatype: u32,
        op: u32,
        context: *mut c_void,
    ) -> ssize_t,
    pub readwritemsg: unsafe extern "C" fn(
        ep: *mut fid_ep,
        msg: *const fi_msg_atomic,
        resultv: *mut fi_ioc,
        result_desc: *mut *mut c_void,
        result_count: size_t,
        flags: u64,
    ) -> ssize_t,
    pub compwrite: unsafe extern "C" fn(
        ep: *mut fid_ep,
        buf: *const c_void,
        count: size_t,
        desc: *mut c_void,
        compare: *const c_void,
        compare_desc: *mut c_void,
        result: *mut c_void,
        result_desc: *mut c_void,
        dest_addr: fi_addr_t,
        addr: u64,
        key: u64,
        datatype: u32,
        op: u32,
        context: *mut c_void,
    ) -> ssize_t,
    pub compwritev: unsafe extern "C" fn(
        ep: *mut fid_ep,
        iov: *const fi_ioc,
        desc: *mut *mut c_void,
        count: size_t,
        comparev: *const fi_ioc,
        compare_desc: *mut *mut c_void,
        compare_count: size_t,
        resultv: *mut fi_ioc,
        result_desc: *mut *mut c_void,
        result_count: size_t,
        dest_addr: fi_addr_t,
        addr: u64,
        key: u64,
        datatype: u32,
        op: u32,
        context: *mut c_void,
    ) -> ssize_t,
    pub compwritemsg: unsafe extern "C" fn(
        ep: *mut fid_ep,
        msg: *const fi_msg_atomic,
        comparev: *const fi_ioc,
        compare_desc: *mut *mut c_void,
        compare_count: size_t,
        resultv: *mut fi_ioc,
        result_desc: *mut *mut c_void,
        result_count: size_t,
        flags: u64,
    ) -> ssize_t,
    pub writevalid:
        unsafe extern "C" fn(ep: *mut fid_ep, datatype: u32, op: u32, count: *mut size_t) -> c_int,
    pub readwritevalid:
        unsafe extern "C" fn(ep: *mut fid_ep, datatype: u32, op: u32, count: *mut size_t) -> c_int,
    pub compwritevalid:
        unsafe extern "C" fn(ep: *mut fid_ep, datatype: u32, op: u32, count: *mut size_t) -> c_int,
}

#[repr(C)]
pub struct fi_ops_cm {
    pub size: size_t,
    pub setname: unsafe extern "C" fn(fid: fid_t, addr: *mut c_void, addrlen: size_t) -> c_int,
    pub getname: unsafe extern "C" fn(fid: fid_t, addr: *mut c_void, addrlen: *mut size_t) -> c_int,
    pub getpeer:
        unsafe extern "C" fn(ep: *mut fid_ep, addr: *mut c_void, addrlen: *mut size_t) -> c_int,
    pub connect: unsafe extern "C" fn(
        ep: *mut fid_ep,
        addr: *const c_void,
        param: *const c_void,
        paramlen: size_t,
    ) -> c_int,
    pub listen: unsafe extern "C" fn(pep: *mut fid_pep) -> c_int,
    pub accept:
        unsafe extern "C" fn(ep: *mut fid_ep, param: *const c_void, paramlen: size_t) -> c_int,
    pub reject: unsafe extern "C" fn(
        pep: *mut fid_pep,
        handle: fid_t,
        param: *const c_void,
        paramlen: size_t,
    ) -> c_int,
    pub shutdown: unsafe extern "C" fn(ep: *mut fid_ep, flags: u64) -> c_int,
    pub join: unsafe extern "C" fn(
        ep: *mut fid_ep,
        addr: *const c_void,
        flags: u64,
        mc: *mut *mut c_void,
        context: *mut c_void,
    ) -> c_int,
}

#[repr(C)]
pub struct fi_ops_cq {
    pub size: size_t,
    pub read: unsafe extern "C" fn(cq: *mut fid_cq, buf: *mut c_void, count: size_t) -> ssize_t,
    pub readfrom: unsafe extern "C" fn(
        cq: *mut fid_cq,
        buf: *mut c_void,
        count: size_t,
        src_addr: *mut fi_addr_t,
    ) -> ssize_t,
    pub readerr:
        unsafe extern "C" fn(cq: *mut fid_cq, buf: *mut fi_cq_err_entry, flags: u64) -> ssize_t,
    pub sread: unsafe extern "C" fn(
        cq: *mut fid_cq,
        buf: *mut c_void,
        count: size_t,
        cond: *const c_void,
        timeout: c_int,
    ) -> ssize_t,
    pub sreadfrom: unsafe extern "C" fn(
        cq: *mut fid_cq,
        buf: *mut c_void,
        count: size_t,
        src_addr: *mut fi_addr_t,
        cond: *const c_void,
        timeout: c_int,
    ) -> ssize_t,
    pub signal: unsafe extern "C" fn(cq: *mut fid_cq) -> c_int,
    pub strerror: unsafe extern "C" fn(
        cq: *mut fid_cq,
        prov_errno: c_int,
        err_data: *const c_void,
        buf: *mut c_char,
        len: size_t,
    ) -> *const c_char,
}

#[repr(C)]
pub struct fi_ops_eq {
    pub size: size_t,
    pub read: unsafe extern "C" fn(
        eq: *mut fid_eq,
        event: *mut u32,
        buf: *mut c_void,
        len: size_t,
        flags: u64,
    ) -> ssize_t,
    pub readerr:
        unsafe extern "C" fn(eq: *mut fid_eq, buf: *mut fi_eq_err_entry, flags: u64) -> ssize_t,
    pub write: unsafe extern "C" fn(
        eq: *mut fid_eq,
        event: u32,
        buf: *const c_void,
        len: size_t,
        flags: u64,
    ) -> ssize_t,
    pub sread: unsafe extern "C" fn(
        eq: *mut fid_eq,
        event: *mut u32,
        buf: *mut c_void,
        len: size_t,
        timeout: c_int,
        flags: u64,
    ) -> ssize_t,
    pub strerror: unsafe extern "C" fn(
        eq: *mut fid_eq,
        prov_errno: c_int,
        err_data: *const c_void,
        buf: *mut c_char,
        len: size_t,
    ) -> *const c_char,
}

#[repr(C)]
pub struct fi_ops_av {
    pub size: size_t,
    pub insert: unsafe extern "C" fn(
        av: *mut fid_av,
        addr: *const c_void,
        count: size_t,
        fi_addr: *mut fi_addr_t,
        flags: u64,
        context: *mut c_void,
    ) -> c_int,
    pub insertsvc: unsafe extern "C" fn(
        av: *mut fid_av,
        node: *const c_char,
        service: *const c_char,
        fi_addr: *mut fi_addr_t,
        flags: u64,
        context: *mut c_void,
    ) -> c_int,
    pub insertsym: unsafe extern "C" fn(
        av: *mut fid_av,
        node: *const c_char,
        nodecnt: size_t,
        service: *const c_char,
        svccnt: size_t,
        fi_addr: *mut fi_addr_t,
        flags: u64,
        context: *mut c_void,
    ) -> c_int,
    pub remove: unsafe extern "C" fn(
        av: *mut fid_av,
        fi_addr: *mut fi_addr_t,
        count: size_t,
        flags: u64,
    ) -> c_int,
    pub lookup: unsafe extern "C" fn(
        av: *mut fid_av,
        fi_addr: fi_addr_t,
        addr: *mut c_void,
        addrlen: *mut size_t,
    ) -> c_int,
    pub straddr: unsafe extern "C" fn(
        av: *mut fid_av,
        addr: *const c_void,
        buf: *mut c_char,
        len: *mut size_t,
    ) -> *const c_char,
    pub av_set: unsafe extern "C" fn(
        av: *mut fid_av,
        attr: *mut c_void,
        av_set: *mut *mut c_void,
        context: *mut c_void,
    ) -> c_int,
}

#[repr(C)]
pub struct fi_ops_cntr {
    pub size: size_t,
    pub read: unsafe extern "C" fn(cntr: *mut fid_cntr) -> u64,
    pub readerr: unsafe extern "C" fn(cntr: *mut fid_cntr) -> u64,
    pub add: unsafe extern "C" fn(cntr: *mut fid_cntr, value: u64) -> c_int,
    pub set: unsafe extern "C" fn(cntr: *mut fid_cntr, value: u64) -> c_int,
    pub wait:
        unsafe extern "C" fn(cntr: *mut fid_cntr, threshold: u64, timeout: c_int) -> c_int,
    pub adderr: unsafe extern "C" fn(cntr: *mut fid_cntr, value: u64) -> c_int,
    pub seterr: unsafe extern "C" fn(cntr: *mut fid_cntr, value: u64) -> c_int,
}

// ---------------------------------------------------------------------------
// 对象句柄
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct fid_fabric {
    pub fid: fid,
    pub ops: *mut fi_ops_fabric,
    pub api_version: u32,
}

#[repr(C)]
pub struct fid_domain {
    pub fid: fid,
    pub ops: *mut fi_ops_domain,
    pub mr: *mut fi_ops_mr,
}

#[repr(C)]
pub struct fid_ep {
    pub fid: fid,
    pub ops: *mut fi_ops_ep,
    pub cm: *mut fi_ops_cm,
    pub msg: *mut fi_ops_msg,
    pub rma: *mut fi_ops_rma,
    pub tagged: *mut fi_ops_tagged,
    pub atomic: *mut fi_ops_atomic,
    pub collective: *mut c_void,
}

#[repr(C)]
pub struct fid_pep {
    pub fid: fid,
    pub ops: *mut fi_ops_ep,
    pub cm: *mut fi_ops_cm,
}

#[repr(C)]
pub struct fid_stx {
    pub fid: fid,
    pub ops: *mut fi_ops_ep,
}

#[repr(C)]
pub struct fid_cq {
    pub fid: fid,
    pub ops: *mut fi_ops_cq,
}

#[repr(C)]
pub struct fid_eq {
    pub fid: fid,
    pub ops: *mut fi_ops_eq,
}

#[repr(C)]
pub struct fid_av {
    pub fid: fid,
    pub ops: *mut fi_ops_av,
}

#[repr(C)]
pub struct fid_cntr {
    pub fid: fid,
    pub ops: *mut fi_ops_cntr,
}

#[repr(C)]
pub struct fid_mr {
    pub fid: fid,
    pub mem_desc: *mut c_void,
    pub key: u64,
}

// ---------------------------------------------------------------------------
// 导出符号
// ---------------------------------------------------------------------------

unsafe extern "C" {
    pub fn fi_getinfo(
        version: u32,
        node: *const c_char,
        service: *const c_char,
        flags: u64,
        hints: *const fi_info,
        info: *mut *mut fi_info,
    ) -> c_int;
    pub fn fi_freeinfo(info: *mut fi_info);
    pub fn fi_dupinfo(info: *const fi_info) -> *mut fi_info;
    pub fn fi_fabric(
        attr: *mut fi_fabric_attr,
        fabric: *mut *mut fid_fabric,
        context: *mut c_void,
    ) -> c_int;
    pub fn fi_version() -> u32;
    pub fn fi_strerror(errnum: c_int) -> *const c_char;
}

/// `fi_allocinfo()` 在 C 头文件中是 `fi_dupinfo(NULL)` 的宏。
#[inline]
pub unsafe fn fi_allocinfo() -> *mut fi_info {
    unsafe { fi_dupinfo(core::ptr::null()) }
}

// ---------------------------------------------------------------------------
// static inline 转发
// ---------------------------------------------------------------------------

#[inline]
pub unsafe fn fi_close(fid: *mut fid) -> c_int {
    unsafe { ((*(*fid).ops).close)(fid) }
}

#[inline]
pub unsafe fn fi_control(fid: *mut fid, command: c_int, arg: *mut c_void) -> c_int {
    unsafe { ((*(*fid).ops).control)(fid, command, arg) }
}

#[inline]
pub unsafe fn fi_domain(
    fabric: *mut fid_fabric,
    info: *mut fi_info,
    dom: *mut *mut fid_domain,
    context: *mut c_void,
) -> c_int {
    unsafe { ((*(*fabric).ops).domain)(fabric, info, dom, context) }
}

#[inline]
pub unsafe fn fi_passive_ep(
    fabric: *mut fid_fabric,
    info: *mut fi_info,
    pep: *mut *mut fid_pep,
    context: *mut c_void,
) -> c_int {
    unsafe { ((*(*fabric).ops).passive_ep)(fabric, info, pep, context) }
}

#[inline]
pub unsafe fn fi_eq_open(
    fabric: *mut fid_fabric,
    attr: *mut fi_eq_attr,
    eq: *mut *mut fid_eq,
    context: *mut c_void,
) -> c_int {
    unsafe { ((*(*fabric).ops).eq_open)(fabric, attr, eq, context) }
}

#[inline]
pub unsafe fn fi_endpoint(
    domain: *mut fid_domain,
    info: *mut fi_info,
    ep: *mut *mut fid_ep,
    context: *mut c_void,
) -> c_int {
    unsafe { ((*(*domain).ops).endpoint)(domain, info, ep, context) }
}

#[inline]
pub unsafe fn fi_scalable_ep(
    domain: *mut fid_domain,
    info: *mut fi_info,
    sep: *mut *mut fid_ep,
    context: *mut c_void,
) -> c_int {
    unsafe { ((*(*domain).ops).scalable_ep)(domain, info, sep, context) }
}

#[inline]
pub unsafe fn fi_cq_open(
    domain: *mut fid_domain,
    attr: *mut fi_cq_attr,
    cq: *mut *mut fid_cq,
    context: *mut c_void,
) -> c_int {
    unsafe { ((*(*domain).ops).cq_open)(domain, attr, cq, context) }
}

#[inline]
pub unsafe fn fi_av_open(
    domain: *mut fid_domain,
    attr: *mut fi_av_attr,
    av: *mut *mut fid_av,
    context: *mut c_void,
) -> c_int {
    unsafe { ((*(*domain).ops).av_open)(domain, attr, av, context) }
}

#[inline]
pub unsafe fn fi_cntr_open(
    domain: *mut fid_domain,
    attr: *mut fi_cntr_attr,
    cntr: *mut *mut fid_cntr,
    context: *mut c_void,
) -> c_int {
    unsafe { ((*(*domain).ops).cntr_open)(domain, attr, cntr, context) }
}

#[inline]
pub unsafe fn fi_stx_context(
    domain: *mut fid_domain,
    attr: *mut fi_tx_attr,
    stx: *mut *mut fid_stx,
    context: *mut c_void,
) -> c_int {
    unsafe { ((*(*domain).ops).stx_ctx)(domain, attr, stx, context) }
}

#[inline]
pub unsafe fn fi_srx_context(
    domain: *mut fid_domain,
    attr: *mut fi_rx_attr,
    rx_ep: *mut *mut fid_ep,
    context: *mut c_void,
) -> c_int {
    unsafe { ((*(*domain).ops).srx_ctx)(domain, attr, rx_ep, context) }
}

#[inline]
pub unsafe fn fi_tx_context(
    sep: *mut fid_ep,
    index: c_int,
    attr: *mut fi_tx_attr,
    tx_ep: *mut *mut fid_ep,
    context: *mut c_void,
) -> c_int {
    unsafe { ((*(*sep).ops).tx_ctx)(sep, index, attr, tx_ep, context) }
}

#[inline]
pub unsafe fn fi_rx_context(
    sep: *mut fid_ep,
    index: c_int,
    attr: *mut fi_rx_attr,
    rx_ep: *mut *mut fid_ep,
    context: *mut c_void,
) -> c_int {
    unsafe { ((*(*sep).ops).rx_ctx)(sep, index, attr, rx_ep, context) }
}

#[inline]
pub unsafe fn fi_ep_bind(ep: *mut fid_ep, bfid: *mut fid, flags: u64) -> c_int {
    unsafe { ((*(*ep).fid.ops).bind)(&raw mut (*ep).fid, bfid, flags) }
}

#[inline]
pub unsafe fn fi_pep_bind(pep: *mut fid_pep, bfid: *mut fid, flags: u64) -> c_int {
    unsafe { ((*(*pep).fid.ops).bind)(&raw mut (*pep).fid, bfid, flags) }
}

#[inline]
pub unsafe fn fi_scalable_ep_bind(sep: *mut fid_ep, bfid: *mut fid, flags: u64) -> c_int {
    unsafe { fi_ep_bind(sep, bfid, flags) }
}

#[inline]
pub unsafe fn fi_domain_bind(domain: *mut fid_domain, bfid: *mut fid, flags: u64) -> c_int {
    unsafe { ((*(*domain).fid.ops).bind)(&raw mut (*domain).fid, bfid, flags) }
}

#[inline]
pub unsafe fn fi_enable(ep: *mut fid_ep) -> c_int {
    unsafe { fi_control(&raw mut (*ep).fid, FI_ENABLE, core::ptr::null_mut()) }
}

#[inline]
pub unsafe fn fi_cancel(fid: *mut fid, context: *mut c_void) -> ssize_t {
    // fi_ep 与 fi_pep 共用 fi_ops_ep 表；cancel 以基础 fid 进入。
    let ep = fid.cast::<fid_ep>();
    unsafe { ((*(*ep).ops).cancel)(fid, context) }
}

// --- 消息 ---

#[inline]
pub unsafe fn fi_send(
    ep: *mut fid_ep,
    buf: *const c_void,
    len: size_t,
    desc: *mut c_void,
    dest_addr: fi_addr_t,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).msg).send)(ep, buf, len, desc, dest_addr, context) }
}

#[inline]
pub unsafe fn fi_sendv(
    ep: *mut fid_ep,
    iov: *const iovec,
    desc: *mut *mut c_void,
    count: size_t,
    dest_addr: fi_addr_t,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).msg).sendv)(ep, iov, desc, count, dest_addr, context) }
}

#[inline]
pub unsafe fn fi_sendmsg(ep: *mut fid_ep, msg: *const fi_msg, flags: u64) -> ssize_t {
    unsafe { ((*(*ep).msg).sendmsg)(ep, msg, flags) }
}

#[inline]
pub unsafe fn fi_senddata(
    ep: *mut fid_ep,
    buf: *const c_void,
    len: size_t,
    desc: *mut c_void,
    data: u64,
    dest_addr: fi_addr_t,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).msg).senddata)(ep, buf, len, desc, data, dest_addr, context) }
}

#[inline]
pub unsafe fn fi_inject(
    ep: *mut fid_ep,
    buf: *const c_void,
    len: size_t,
    dest_addr: fi_addr_t,
) -> ssize_t {
    unsafe { ((*(*ep).msg).inject)(ep, buf, len, dest_addr) }
}

#[inline]
pub unsafe fn fi_injectdata(
    ep: *mut fid_ep,
    buf: *const c_void,
    len: size_t,
    data: u64,
    dest_addr: fi_addr_t,
) -> ssize_t {
    unsafe { ((*(*ep).msg).injectdata)(ep, buf, len, data, dest_addr) }
}

#[inline]
pub unsafe fn fi_recv(
    ep: *mut fid_ep,
    buf: *mut c_void,
    len: size_t,
    desc: *mut c_void,
    src_addr: fi_addr_t,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).msg).recv)(ep, buf, len, desc, src_addr, context) }
}

#[inline]
pub unsafe fn fi_recvv(
    ep: *mut fid_ep,
    iov: *const iovec,
    desc: *mut *mut c_void,
    count: size_t,
    src_addr: fi_addr_t,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).msg).recvv)(ep, iov, desc, count, src_addr, context) }
}

#[inline]
pub unsafe fn fi_recvmsg(ep: *mut fid_ep, msg: *const fi_msg, flags: u64) -> ssize_t {
    unsafe { ((*(*ep).msg).recvmsg)(ep, msg, flags) }
}

// --- 标签消息 ---

#[inline]
pub unsafe fn fi_tsend(
    ep: *mut fid_ep,
    buf: *const c_void,
    len: size_t,
    desc: *mut c_void,
    dest_addr: fi_addr_t,
    tag: u64,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).tagged).send)(ep, buf, len, desc, dest_addr, tag, context) }
}

#[inline]
pub unsafe fn fi_tsendv(
    ep: *mut fid_ep,
    iov: *const iovec,
    desc: *mut *mut c_void,
    count: size_t,
    dest_addr: fi_addr_t,
    tag: u64,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).tagged).sendv)(ep, iov, desc, count, dest_addr, tag, context) }
}

#[inline]
pub unsafe fn fi_tsendmsg(ep: *mut fid_ep, msg: *const fi_msg_tagged, flags: u64) -> ssize_t {
    unsafe { ((*(*ep).tagged).sendmsg)(ep, msg, flags) }
}

#[inline]
pub unsafe fn fi_tsenddata(
    ep: *mut fid_ep,
    buf: *const c_void,
    len: size_t,
    desc: *mut c_void,
    data: u64,
    dest_addr: fi_addr_t,
    tag: u64,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).tagged).senddata)(ep, buf, len, desc, data, dest_addr, tag, context) }
}

#[inline]
pub unsafe fn fi_tinject(
    ep: *mut fid_ep,
    buf: *const c_void,
    len: size_t,
    dest_addr: fi_addr_t,
    tag: u64,
) -> ssize_t {
    unsafe { ((*(*ep).tagged).inject)(ep, buf, len, dest_addr, tag) }
}

#[inline]
pub unsafe fn fi_tinjectdata(
    ep: *mut fid_ep,
    buf: *const c_void,
    len: size_t,
    data: u64,
    dest_addr: fi_addr_t,
    tag: u64,
) -> ssize_t {
    unsafe { ((*(*ep).tagged).injectdata)(ep, buf, len, data, dest_addr, tag) }
}

#[inline]
pub unsafe fn fi_trecv(
    ep: *mut fid_ep,
    buf: *mut c_void,
    len: size_t,
    desc: *mut c_void,
    src_addr: fi_addr_t,
    tag: u64,
    ignore: u64,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).tagged).recv)(ep, buf, len, desc, src_addr, tag, ignore, context) }
}

#[inline]
pub unsafe fn fi_trecvv(
    ep: *mut fid_ep,
    iov: *const iovec,
    desc: *mut *mut c_void,
    count: size_t,
    src_addr: fi_addr_t,
    tag: u64,
    ignore: u64,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).tagged).recvv)(ep, iov, desc, count, src_addr, tag, ignore, context) }
}

#[inline]
pub unsafe fn fi_trecvmsg(ep: *mut fid_ep, msg: *const fi_msg_tagged, flags: u64) -> ssize_t {
    unsafe { ((*(*ep).tagged).recvmsg)(ep, msg, flags) }
}

// --- RMA ---

#[inline]
pub unsafe fn fi_read(
    ep: *mut fid_ep,
    buf: *mut c_void,
    len: size_t,
    desc: *mut c_void,
    src_addr: fi_addr_t,
    addr: u64,
    key: u64,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).rma).read)(ep, buf, len, desc, src_addr, addr, key, context) }
}

#[inline]
pub unsafe fn fi_readv(
    ep: *mut fid_ep,
    iov: *const iovec,
    desc: *mut *mut c_void,
    count: size_t,
    src_addr: fi_addr_t,
    addr: u64,
    key: u64,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).rma).readv)(ep, iov, desc, count, src_addr, addr, key, context) }
}

#[inline]
pub unsafe fn fi_readmsg(ep: *mut fid_ep, msg: *const fi_msg_rma, flags: u64) -> ssize_t {
    unsafe { ((*(*ep).rma).readmsg)(ep, msg, flags) }
}

#[inline]
pub unsafe fn fi_write(
    ep: *mut fid_ep,
    buf: *const c_void,
    len: size_t,
    desc: *mut c_void,
    dest_addr: fi_addr_t,
    addr: u64,
    key: u64,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).rma).write)(ep, buf, len, desc, dest_addr, addr, key, context) }
}

#[inline]
pub unsafe fn fi_writev(
    ep: *mut fid_ep,
    iov: *const iovec,
    desc: *mut *mut c_void,
    count: size_t,
    dest_addr: fi_addr_t,
    addr: u64,
    key: u64,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).rma).writev)(ep, iov, desc, count, dest_addr, addr, key, context) }
}

#[inline]
pub unsafe fn fi_writemsg(ep: *mut fid_ep, msg: *const fi_msg_rma, flags: u64) -> ssize_t {
    unsafe { ((*(*ep).rma).writemsg)(ep, msg, flags) }
}

#[inline]
pub unsafe fn fi_writedata(
    ep: *mut fid_ep,
    buf: *const c_void,
    len: size_t,
    desc: *mut c_void,
    data: u64,
    dest_addr: fi_addr_t,
    addr: u64,
    key: u64,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).rma).writedata)(ep, buf, len, desc, data, dest_addr, addr, key, context) }
}

#[inline]
pub unsafe fn fi_inject_write(
    ep: *mut fid_ep,
    buf: *const c_void,
    len: size_t,
    dest_addr: fi_addr_t,
    addr: u64,
    key: u64,
) -> ssize_t {
    unsafe { ((*(*ep).rma).inject)(ep, buf, len, dest_addr, addr, key) }
}

#[inline]
pub unsafe fn fi_inject_writedata(
    ep: *mut fid_ep,
    buf: *const c_void,
    len: size_t,
    data: u64,
    dest_addr: fi_addr_t,
    addr: u64,
    key: u64,
) -> ssize_t {
    unsafe { ((*(*ep).rma).injectdata)(ep, buf, len, data, dest_addr, addr, key) }
}

// --- 原子操作 ---

#[inline]
pub unsafe fn fi_atomic(
    ep: *mut fid_ep,
    buf: *const c_void,
    count: size_t,
    desc: *mut c_void,
    dest_addr: fi_addr_t,
    addr: u64,
    key: u64,
    datatype: u32,
    op: u32,
    context: *mut c_void,
) -> ssize_t {
    unsafe { ((*(*ep).atomic).write)(ep, buf, count, desc, dest_addr, addr, key, datatype, op, context) }
}

#[inline]
pub unsafe fn fi_inject_atomic(
    ep: *mut fid_ep,
    buf: *const c_void,
    count: size_t,
    dest_addr: fi_addr_t,
    addr: u64,
    key: u64,
    datatype: u32,
    op: u32,
) -> ssize_t {
    unsafe { ((*(*ep).atomic).inject)(ep, buf, count, dest_addr, addr, key, datatype, op) }
}

#[inline]
pub unsafe fn fi_fetch_atomic(
    ep: *mut fid_ep,
    buf: *const c_void,
    count: size_t,
    desc: *mut c_void,
    result: *mut c_void,
    result_desc: *mut c_void,
    dest_addr: fi_addr_t,
    addr: u64,
    key: u64,
    datatype: u32,
    op: u32,
    context: *mut c_void,
) -> ssize_t {
    unsafe {
        ((*(*ep).atomic).readwrite)(
            ep, buf, count, desc, result, result_desc, dest_addr, addr, key, datatype, op, context,
        )
    }
}

#[inline]
pub unsafe fn fi_compare_atomic(
    ep: *mut fid_ep,
    buf: *const c_void,
    count: size_t,
    desc: *mut c_void,
    compare: *const c_void,
    compare_desc: *mut c_void,
    result: *mut c_void,
    result_desc: *mut c_void,
    dest_addr: fi_addr_t,
    addr: u64,
    key: u64,
    datatype: u32,
    op: u32,
    context: *mut c_void,
) -> ssize_t {
    unsafe {
        ((*(*ep).atomic).compwrite)(
            ep,
            buf,
            count,
            desc,
            compare,
            compare_desc,
            result,
            result_desc,
            dest_addr,
            addr,
            key,
            datatype,
            op,
            context,
        )
    }
}

#[inline]
pub unsafe fn fi_atomicvalid(ep: *mut fid_ep, datatype: u32, op: u32, count: *mut size_t) -> c_int {
    unsafe { ((*(*ep).atomic).writevalid)(ep, datatype, op, count) }
}

#[inline]
pub unsafe fn fi_fetch_atomicvalid(
    ep: *mut fid_ep,
    datatype: u32,
    op: u32,
    count: *mut size_t,
) -> c_int {
    unsafe { ((*(*ep).atomic).readwritevalid)(ep, datatype, op, count) }
}

#[inline]
pub unsafe fn fi_compare_atomicvalid(
    ep: *mut fid_ep,
    datatype: u32,
    op: u32,
    count: *mut size_t,
) -> c_int {
    unsafe { ((*(*ep).atomic).compwritevalid)(ep, datatype, op, count) }
}

// --- 连接管理 ---

#[inline]
pub unsafe fn fi_connect(
    ep: *mut fid_ep,
    addr: *const c_void,
    param: *const c_void,
    paramlen: size_t,
) -> c_int {
    unsafe { ((*(*ep).cm).connect)(ep, addr, param, paramlen) }
}

#[inline]
pub unsafe fn fi_accept(ep: *mut fid_ep, param: *const c_void, paramlen: size_t) -> c_int {
    unsafe { ((*(*ep).cm).accept)(ep, param, paramlen) }
}

#[inline]
pub unsafe fn fi_listen(pep: *mut fid_pep) -> c_int {
    unsafe { ((*(*pep).cm).listen)(pep) }
}

#[inline]
pub unsafe fn fi_reject(
    pep: *mut fid_pep,
    handle: fid_t,
    param: *const c_void,
    paramlen: size_t,
) -> c_int {
    unsafe { ((*(*pep).cm).reject)(pep, handle, param, paramlen) }
}

#[inline]
pub unsafe fn fi_shutdown(ep: *mut fid_ep, flags: u64) -> c_int {
    unsafe { ((*(*ep).cm).shutdown)(ep, flags) }
}

#[inline]
pub unsafe fn fi_getname(fid: *mut fid, addr: *mut c_void, addrlen: *mut size_t) -> c_int {
    let ep = fid.cast::<fid_ep>();
    unsafe { ((*(*ep).cm).getname)(fid, addr, addrlen) }
}

#[inline]
pub unsafe fn fi_getpeer(ep: *mut fid_ep, addr: *mut c_void, addrlen: *mut size_t) -> c_int {
    unsafe { ((*(*ep).cm).getpeer)(ep, addr, addrlen) }
}

// --- 完成队列 / 事件队列 ---

#[inline]
pub unsafe fn fi_cq_read(cq: *mut fid_cq, buf: *mut c_void, count: size_t) -> ssize_t {
    unsafe { ((*(*cq).ops).read)(cq, buf, count) }
}

#[inline]
pub unsafe fn fi_cq_readerr(cq: *mut fid_cq, buf: *mut fi_cq_err_entry, flags: u64) -> ssize_t {
    unsafe { ((*(*cq).ops).readerr)(cq, buf, flags) }
}

#[inline]
pub unsafe fn fi_cq_sread(
    cq: *mut fid_cq,
    buf: *mut c_void,
    count: size_t,
    cond: *const c_void,
    timeout: c_int,
) -> ssize_t {
    unsafe { ((*(*cq).ops).sread)(cq, buf, count, cond, timeout) }
}

#[inline]
pub unsafe fn fi_cq_strerror(
    cq: *mut fid_cq,
    prov_errno: c_int,
    err_data: *const c_void,
    buf: *mut c_char,
    len: size_t,
) -> *const c_char {
    unsafe { ((*(*cq).ops).strerror)(cq, prov_errno, err_data, buf, len) }
}

#[inline]
pub unsafe fn fi_eq_read(
    eq: *mut fid_eq,
    event: *mut u32,
    buf: *mut c_void,
    len: size_t,
    flags: u64,
) -> ssize_t {
    unsafe { ((*(*eq).ops).read)(eq, event, buf, len, flags) }
}

#[inline]
pub unsafe fn fi_eq_readerr(eq: *mut fid_eq, buf: *mut fi_eq_err_entry, flags: u64) -> ssize_t {
    unsafe { ((*(*eq).ops).readerr)(eq, buf, flags) }
}

#[inline]
pub unsafe fn fi_eq_sread(
    eq: *mut fid_eq,
    event: *mut u32,
    buf: *mut c_void,
    len: size_t,
    timeout: c_int,
    flags: u64,
) -> ssize_t {
    unsafe { ((*(*eq).ops).sread)(eq, event, buf, len, timeout, flags) }
}

#[inline]
pub unsafe fn fi_eq_strerror(
    eq: *mut fid_eq,
    prov_errno: c_int,
    err_data: *const c_void,
    buf: *mut c_char,
    len: size_t,
) -> *const c_char {
    unsafe { ((*(*eq).ops).strerror)(eq, prov_errno, err_data, buf, len) }
}

// --- 地址向量 ---

#[inline]
pub unsafe fn fi_av_insert(
    av: *mut fid_av,
    addr: *const c_void,
    count: size_t,
    fi_addr: *mut fi_addr_t,
    flags: u64,
    context: *mut c_void,
) -> c_int {
    unsafe { ((*(*av).ops).insert)(av, addr, count, fi_addr, flags, context) }
}

#[inline]
pub unsafe fn fi_av_remove(
    av: *mut fid_av,
    fi_addr: *mut fi_addr_t,
    count: size_t,
    flags: u64,
) -> c_int {
    unsafe { ((*(*av).ops).remove)(av, fi_addr, count, flags) }
}

#[inline]
pub unsafe fn fi_av_lookup(
    av: *mut fid_av,
    fi_addr: fi_addr_t,
    addr: *mut c_void,
    addrlen: *mut size_t,
) -> c_int {
    unsafe { ((*(*av).ops).lookup)(av, fi_addr, addr, addrlen) }
}

#[inline]
pub unsafe fn fi_av_straddr(
    av: *mut fid_av,
    addr: *const c_void,
    buf: *mut c_char,
    len: *mut size_t,
) -> *const c_char {
    unsafe { ((*(*av).ops).straddr)(av, addr, buf, len) }
}

// --- 计数器 ---

#[inline]
pub unsafe fn fi_cntr_read(cntr: *mut fid_cntr) -> u64 {
    unsafe { ((*(*cntr).ops).read)(cntr) }
}

#[inline]
pub unsafe fn fi_cntr_readerr(cntr: *mut fid_cntr) -> u64 {
    unsafe { ((*(*cntr).ops).readerr)(cntr) }
}

#[inline]
pub unsafe fn fi_cntr_add(cntr: *mut fid_cntr, value: u64) -> c_int {
    unsafe { ((*(*cntr).ops).add)(cntr, value) }
}

#[inline]
pub unsafe fn fi_cntr_set(cntr: *mut fid_cntr, value: u64) -> c_int {
    unsafe { ((*(*cntr).ops).set)(cntr, value) }
}

#[inline]
pub unsafe fn fi_cntr_wait(cntr: *mut fid_cntr, threshold: u64, timeout: c_int) -> c_int {
    unsafe { ((*(*cntr).ops).wait)(cntr, threshold, timeout) }
}

// --- 内存区域 ---

#[inline]
pub unsafe fn fi_mr_reg(
    domain: *mut fid_domain,
    buf: *const c_void,
    len: size_t,
    access: u64,
    offset: u64,
    requested_key: u64,
    flags: u64,
    mr: *mut *mut fid_mr,
    context: *mut c_void,
) -> c_int {
    unsafe {
        ((*(*domain).mr).reg)(
            &raw mut (*domain).fid,
            buf,
            len,
            access,
            offset,
            requested_key,
            flags,
            mr,
            context,
        )
    }
}

#[inline]
pub unsafe fn fi_mr_regattr(
    domain: *mut fid_domain,
    attr: *const fi_mr_attr,
    flags: u64,
    mr: *mut *mut fid_mr,
) -> c_int {
    unsafe { ((*(*domain).mr).regattr)(&raw mut (*domain).fid, attr, flags, mr) }
}

#[inline]
pub unsafe fn fi_mr_desc(mr: *mut fid_mr) -> *mut c_void {
    unsafe { (*mr).mem_desc }
}

#[inline]
pub unsafe fn fi_mr_key(mr: *mut fid_mr) -> u64 {
    unsafe { (*mr).key }
}

#[inline]
pub unsafe fn fi_mr_bind(mr: *mut fid_mr, bfid: *mut fid, flags: u64) -> c_int {
    unsafe { ((*(*mr).fid.ops).bind)(&raw mut (*mr).fid, bfid, flags) }
}

#[inline]
pub unsafe fn fi_mr_enable(mr: *mut fid_mr) -> c_int {
    unsafe { fi_control(&raw mut (*mr).fid, FI_ENABLE, core::ptr::null_mut()) }
}

#[inline]
pub unsafe fn fi_mr_refresh(mr: *mut fid_mr, iov: *const iovec, count: size_t, flags: u64) -> c_int {
    // FI_REFRESH 的参数是 fi_mr_modify；此处只支持整区刷新（iov 为空）。
    let _ = (iov, count, flags);
    unsafe { fi_control(&raw mut (*mr).fid, FI_REFRESH, core::ptr::null_mut()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 校验句柄头与上下文刮写区的布局假设；provider 依赖 offset 0 恢复上下文。
    #[test]
    fn layout_assumptions_hold() {
        assert_eq!(core::mem::size_of::<fi_context2>(), 8 * size_of::<*mut c_void>());
        assert_eq!(core::mem::offset_of!(fid_ep, fid), 0, "fid 头必须位于对象起始");
        assert_eq!(core::mem::offset_of!(fid_cq, fid), 0);
        assert_eq!(core::mem::offset_of!(fid_mr, fid), 0);
        assert_eq!(
            core::mem::offset_of!(fi_deferred_work, context),
            0,
            "deferred work 的 context 同样承担 offset 0 恢复职责"
        );
    }

    #[test]
    fn version_packing_matches_header_macro() {
        assert_eq!(fi_version_for(1, 21), (1 << 16) | 21);
        assert_eq!(fi_version_for(FI_MAJOR_VERSION, FI_MINOR_VERSION) >> 16, 1);
    }
}
