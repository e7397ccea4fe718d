//! # info 模块说明
//!
//! ## 角色定位（Why）
//! - `fi_getinfo` 返回一条候选 provider 描述链表，是后续一切资源创建的输入；
//!   本模块负责查询参数的组装、结果链表的所有权管理与属性视图化；
//! - 查询提示（hints）是本库的“配置面”：能力、模式、地址族、端点类型、
//!   线程模型与 MR 模式都在这里声明。
//!
//! ## 契约（What）
//! - [`FabricInfo`] 独占持有 `fi_info` 链表，drop 时调用 `fi_freeinfo`；
//! - 视图（[`FabricInfoView`]）借用链表节点，生命周期受 `FabricInfo` 约束；
//! - 属性访问拷贝出自有数据，不暴露内部指针。

use std::ffi::CStr;

use weft_sys as sys;

use crate::conv;
use crate::error::{Errc, FabricError, Result};
use crate::types::{
    AddressFormat, Caps, CompOrder, EndpointType, FabricVersion, Mode, MrMode, MsgOrder,
    ProgressMode, ProtocolVersion, QueueSize, ThreadingMode,
};

/// fabric 查询提示。
///
/// # 教案式说明
/// - **意图 (Why)**：把分散的 libfabric 协商参数集中为一个可默认构造的
///   结构，调用方按需覆盖字段即可；
/// - **契约 (What)**：空集合/`None` 字段不写入 hints，交由 provider 自行
///   决定缺省；`provider` 字段用于精确选择 provider（如 `"shm"`）。
#[derive(Clone, Debug, Default)]
pub struct FabricHints {
    pub caps: Caps,
    pub mode: Mode,
    pub addr_format: AddressFormat,
    pub ep_type: EndpointType,
    pub threading: Option<ThreadingMode>,
    pub mr_mode: Option<MrMode>,
    pub provider: Option<String>,
}

/// fabric 层属性摘要。
#[derive(Clone, Debug, Default)]
pub struct FabricAttributes {
    pub name: String,
    pub provider_name: String,
    pub provider_version: FabricVersion,
}

/// domain 层属性摘要。
#[derive(Clone, Debug, Default)]
pub struct DomainAttributes {
    pub name: String,
    pub threading: ThreadingMode,
    pub control_progress: ProgressMode,
    pub data_progress: ProgressMode,
    pub addr_format: AddressFormat,
    pub mr_mode: MrMode,
    pub max_ep_tx_ctx: usize,
    pub max_ep_rx_ctx: usize,
}

/// endpoint 层属性摘要。
#[derive(Clone, Debug, Default)]
pub struct EndpointAttributes {
    pub ep_type: EndpointType,
    pub protocol: ProtocolVersion,
    pub max_msg_size: QueueSize,
    pub tx_ctx_cnt: QueueSize,
    pub rx_ctx_cnt: QueueSize,
    pub msg_order: MsgOrder,
    pub comp_order: CompOrder,
    pub inject_size: usize,
    pub iov_limit: usize,
}

/// `fi_getinfo` 结果链表的所有者。
pub struct FabricInfo {
    raw: *mut sys::fi_info,
}

// fi_info 链表在查询返回后只读；独占所有权由本类型保证。
unsafe impl Send for FabricInfo {}
unsafe impl Sync for FabricInfo {}

impl Drop for FabricInfo {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            unsafe { sys::fi_freeinfo(self.raw) };
        }
    }
}

impl FabricInfo {
    pub(crate) fn from_raw(raw: *mut sys::fi_info) -> Self {
        Self { raw }
    }

    pub(crate) fn as_raw(&self) -> *mut sys::fi_info {
        self.raw
    }

    /// 首个候选的视图；查询成功时必然存在。
    pub fn head(&self) -> Option<FabricInfoView<'_>> {
        if self.raw.is_null() {
            None
        } else {
            Some(FabricInfoView {
                node: self.raw,
                _owner: core::marker::PhantomData,
            })
        }
    }

    /// 遍历全部候选 provider 描述。
    pub fn iter(&self) -> FabricInfoIter<'_> {
        FabricInfoIter {
            node: self.raw,
            _owner: core::marker::PhantomData,
        }
    }

    /// 候选数量。
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_null()
    }

    /// 首候选的能力位。
    pub fn caps(&self) -> Caps {
        self.head().map(|v| v.caps()).unwrap_or_default()
    }

    /// 首候选的模式位。
    pub fn mode(&self) -> Mode {
        self.head().map(|v| v.mode()).unwrap_or_default()
    }

    /// 首候选的地址格式。
    pub fn address_format(&self) -> AddressFormat {
        self.head().map(|v| v.address_format()).unwrap_or_default()
    }

    /// 首候选的 fabric 属性。
    pub fn fabric_attr(&self) -> Option<FabricAttributes> {
        self.head().and_then(|v| v.fabric_attr())
    }

    /// 首候选的 domain 属性。
    pub fn domain_attr(&self) -> Option<DomainAttributes> {
        self.head().and_then(|v| v.domain_attr())
    }

    /// 首候选的 endpoint 属性。
    pub fn endpoint_attr(&self) -> Option<EndpointAttributes> {
        self.head().and_then(|v| v.endpoint_attr())
    }
}

/// 借用单个 `fi_info` 节点的只读视图。
#[derive(Clone, Copy)]
pub struct FabricInfoView<'a> {
    node: *mut sys::fi_info,
    _owner: core::marker::PhantomData<&'a FabricInfo>,
}

impl FabricInfoView<'_> {
    pub(crate) fn as_raw(&self) -> *mut sys::fi_info {
        self.node
    }

    /// 把单个候选复制为独立的 [`FabricInfo`]（脱离原链表生命周期）。
    pub fn to_owned(&self) -> Result<FabricInfo> {
        let dup = unsafe { sys::fi_dupinfo(self.node) };
        if dup.is_null() {
            return Err(FabricError::new(Errc::NoMemory).with_context("fi_dupinfo"));
        }
        Ok(FabricInfo::from_raw(dup))
    }

    pub fn caps(&self) -> Caps {
        conv::from_fi_caps(unsafe { (*self.node).caps })
    }

    pub fn mode(&self) -> Mode {
        conv::from_fi_mode(unsafe { (*self.node).mode })
    }

    pub fn address_format(&self) -> AddressFormat {
        conv::from_fi_addr_format(unsafe { (*self.node).addr_format })
    }

    pub fn fabric_attr(&self) -> Option<FabricAttributes> {
        let attr = unsafe { (*self.node).fabric_attr };
        if attr.is_null() {
            return None;
        }
        unsafe {
            Some(FabricAttributes {
                name: cstr_to_string((*attr).name),
                provider_name: cstr_to_string((*attr).prov_name),
                provider_version: FabricVersion::new((*attr).prov_version),
            })
        }
    }

    pub fn domain_attr(&self) -> Option<DomainAttributes> {
        let attr = unsafe { (*self.node).domain_attr };
        if attr.is_null() {
            return None;
        }
        unsafe {
            Some(DomainAttributes {
                name: cstr_to_string((*attr).name),
                threading: conv::from_fi_threading((*attr).threading),
                control_progress: conv::from_fi_progress((*attr).control_progress),
                data_progress: conv::from_fi_progress((*attr).data_progress),
                addr_format: conv::from_fi_addr_format((*self.node).addr_format),
                mr_mode: conv::from_fi_mr_mode((*attr).mr_mode),
                max_ep_tx_ctx: (*attr).max_ep_tx_ctx,
                max_ep_rx_ctx: (*attr).max_ep_rx_ctx,
            })
        }
    }

    pub fn endpoint_attr(&self) -> Option<EndpointAttributes> {
        let attr = unsafe { (*self.node).ep_attr };
        if attr.is_null() {
            return None;
        }
        let tx_attr = unsafe { (*self.node).tx_attr };
        unsafe {
            Some(EndpointAttributes {
                ep_type: conv::from_fi_ep_type((*attr).ep_type),
                protocol: ProtocolVersion::new((*attr).protocol),
                max_msg_size: QueueSize::new((*attr).max_msg_size),
                tx_ctx_cnt: QueueSize::new((*attr).tx_ctx_cnt),
                rx_ctx_cnt: QueueSize::new((*attr).rx_ctx_cnt),
                msg_order: if tx_attr.is_null() {
                    MsgOrder::EMPTY
                } else {
                    conv::from_fi_msg_order((*tx_attr).msg_order)
                },
                comp_order: if tx_attr.is_null() {
                    CompOrder::EMPTY
                } else {
                    conv::from_fi_comp_order((*tx_attr).comp_order)
                },
                inject_size: if tx_attr.is_null() { 0 } else { (*tx_attr).inject_size },
                iov_limit: if tx_attr.is_null() { 0 } else { (*tx_attr).iov_limit },
            })
        }
    }
}

/// 候选链表迭代器。
pub struct FabricInfoIter<'a> {
    node: *mut sys::fi_info,
    _owner: core::marker::PhantomData<&'a FabricInfo>,
}

impl<'a> Iterator for FabricInfoIter<'a> {
    type Item = FabricInfoView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.node.is_null() {
            return None;
        }
        let view = FabricInfoView {
            node: self.node,
            _owner: core::marker::PhantomData,
        };
        self.node = unsafe { (*self.node).next };
        Some(view)
    }
}

fn cstr_to_string(ptr: *const core::ffi::c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }
}

/// 按提示查询候选 provider 描述链表。
///
/// # 执行逻辑（How）
/// 1. `fi_allocinfo` 拿到已初始化的 hints 骨架；
/// 2. 写入能力/模式/地址族/端点类型，按需写入线程模型与 MR 模式；
/// 3. `provider` 提示经 `strdup` 写入 `fabric_attr.prov_name`
///    （`fi_freeinfo` 以 `free` 回收，必须用 C 堆分配）；
/// 4. `fi_getinfo` 成功后接管结果链表所有权。
pub fn query_fabric(hints: &FabricHints) -> Result<FabricInfo> {
    let provider_name = match &hints.provider {
        Some(name) => Some(
            std::ffi::CString::new(name.as_str())
                .map_err(|_| FabricError::new(Errc::InvalidArgument).with_context("provider name"))?,
        ),
        None => None,
    };

    let info_hints = unsafe { sys::fi_allocinfo() };
    if info_hints.is_null() {
        return Err(FabricError::new(Errc::NoMemory).with_context("fi_allocinfo"));
    }

    unsafe {
        if !hints.caps.is_empty() {
            (*info_hints).caps = conv::to_fi_caps(hints.caps);
        }
        if !hints.mode.is_empty() {
            (*info_hints).mode = conv::to_fi_mode(hints.mode);
        }
        (*info_hints).addr_format = conv::to_fi_addr_format(hints.addr_format);

        if !(*info_hints).ep_attr.is_null() {
            (*(*info_hints).ep_attr).ep_type = conv::to_fi_ep_type(hints.ep_type);
        }
        if !(*info_hints).domain_attr.is_null() {
            if let Some(threading) = hints.threading {
                (*(*info_hints).domain_attr).threading = conv::to_fi_threading(threading);
            }
            if let Some(mr_mode) = hints.mr_mode {
                (*(*info_hints).domain_attr).mr_mode = conv::to_fi_mr_mode(mr_mode);
            }
        }
        if let Some(c_name) = &provider_name
            && !(*info_hints).fabric_attr.is_null()
        {
            let dup = libc::strdup(c_name.as_ptr());
            if dup.is_null() {
                sys::fi_freeinfo(info_hints);
                return Err(FabricError::new(Errc::NoMemory).with_context("strdup"));
            }
            // 旧值由 fi_allocinfo 产生（可能为空），交还 C 堆。
            let prev = (*(*info_hints).fabric_attr).prov_name;
            if !prev.is_null() {
                libc::free(prev.cast());
            }
            (*(*info_hints).fabric_attr).prov_name = dup;
        }
    }

    let mut result: *mut sys::fi_info = core::ptr::null_mut();
    let ret = unsafe {
        sys::fi_getinfo(
            sys::fi_version_for(sys::FI_MAJOR_VERSION, sys::FI_MINOR_VERSION),
            core::ptr::null(),
            core::ptr::null(),
            0,
            info_hints,
            &mut result,
        )
    };

    unsafe { sys::fi_freeinfo(info_hints) };

    if ret != 0 {
        return Err(FabricError::from_errno(ret as isize).with_context("fi_getinfo"));
    }

    let candidates = unsafe { count_nodes(result) };
    tracing::debug!(candidates, "fi_getinfo returned provider candidates");

    Ok(FabricInfo::from_raw(result))
}

unsafe fn count_nodes(mut node: *mut sys::fi_info) -> usize {
    let mut count = 0;
    while !node.is_null() {
        count += 1;
        node = unsafe { (*node).next };
    }
    count
}

/// 以 provider 能力表的名称与缺省值组装查询。
///
/// 提示会带上 `P::NAME` 过滤器与该 provider 的缺省 MR 模式；其余字段
/// 取 `extra` 的值，便于在编译期选定 provider 的同时追加能力要求。
pub fn query_provider<P: crate::provider::ProviderTraits>(
    extra: &FabricHints,
) -> Result<FabricInfo> {
    let hints = FabricHints {
        provider: Some(String::from(P::NAME)),
        mr_mode: extra.mr_mode.or(Some(P::DEFAULT_MR_MODE)),
        ..extra.clone()
    };
    query_fabric(&hints)
}

/// 运行时 libfabric 接口版本。
pub fn fabric_version() -> FabricVersion {
    FabricVersion::new(unsafe { sys::fi_version() })
}
