#![doc = "weft-core: libfabric (OFI) 之上的类型安全异步 I/O 引擎。"]
#![doc = ""]
#![doc = "== 定位 =="]
#![doc = "以统一抽象暴露 RDMA 硬件族（InfiniBand Verbs、AWS EFA、HPE Slingshot、"]
#![doc = "共享内存、TCP、UCX）：资源对象图（fabric → domain → endpoint → CQ/EQ/AV/"]
#![doc = "counter）、提交/完成分发协议、注册缓存、provider 编译期能力表与触发式工作。"]
#![doc = ""]
#![doc = "== 安全边界 =="]
#![doc = "缓冲区型的异步提交（send/recv/RMA/原子）是 `unsafe`：fabric 在完成事件"]
#![doc = "返回前持续引用调用方缓冲与上下文，该生命周期约束超出借用检查器的表达"]
#![doc = "能力，由调用方以安全契约承担。inject 族与控制面操作是安全的。"]
#![doc = ""]
#![doc = "== 并发模型 =="]
#![doc = "无隐式线程池：进度由调用 `poll`/`wait` 的线程驱动，或在数据面自动推进的"]
#![doc = "provider 上由 provider 自行驱动。阻塞等待仅在后者可用。"]

pub mod addr;
pub mod atomic;
pub mod av;
mod conv;
pub mod counter;
pub mod cq;
pub mod ctx;
pub mod domain;
pub mod endpoint;
pub mod eq;
pub mod error;
pub mod fabric;
mod fmtutil;
pub mod imm;
pub mod info;
pub mod mem;
pub mod mr;
pub mod mr_cache;
pub mod msg;
pub mod passive;
pub mod provider;
pub mod provider_atomic;
pub mod rma;
pub mod scalable;
pub mod shared;
pub mod test_stubs;
pub mod trigger;
pub mod types;

pub use addr::{
    Address, ANY_V4, BROADCAST_V4, EthernetAddress, IbAddress, Ipv4Address, Ipv6Address,
    LOCALHOST_V4,
};
pub use atomic::{AtomicDatatype, AtomicOp, AtomicType};
pub use av::{AddressVector, AddressVectorAttr, AvHandle};
pub use counter::{Counter, CounterAttr};
pub use cq::{CompletionError, CompletionEvent, CompletionQueue, CompletionQueueAttr};
pub use ctx::{
    CompletionFuture, ContextPool, OpContext, OpOutcome, RequestContext, dispatch_completion,
    submit_with,
};
pub use domain::{Domain, ProgressPolicy};
pub use endpoint::{ActiveEndpoint, Endpoint};
pub use eq::{EventKind, EventQueue, EventQueueAttr, FabricEvent};
pub use error::{Errc, FabricError, Result};
pub use fabric::Fabric;
pub use imm::{ImmLayout, ImmediateData, NcclImmLayout, NixlImmLayout};
pub use info::{
    DomainAttributes, EndpointAttributes, FabricAttributes, FabricHints, FabricInfo,
    FabricInfoView, fabric_version, query_fabric, query_provider,
};
pub use mem::{MemoryResource, SystemResource, default_resource, set_default_resource};
pub use mr::{HmemDevice, HmemIface, MemoryRegion, RemoteMemory};
pub use mr_cache::{
    CacheStats, MrCache, MrHandle, PAGE_SIZE, RegisterBackend, align_down, align_up,
    aligned_length,
};
pub use msg::{
    MAX_IOV_COUNT, RecvFlags, RecvMessage, SendFlags, SendMessage, TaggedRecvMessage,
    TaggedSendMessage,
};
pub use passive::PassiveEndpoint;
pub use provider::{
    AutoProgressProvider, Efa, InjectCapableProvider, LocalKeyRequiredProvider,
    ManualProgressProvider, MultiRecvProvider, NativeAtomicProvider, ProviderTraits,
    RmaEventProvider, SelectiveCompletionProvider, Shm, Slingshot, StagedAtomicProvider, Tcp, Ucx,
    Verbs, can_inject, compute_rma_addr,
};
pub use provider_atomic::{
    AtomicAddOp, AtomicContext, AtomicStrategy, CompareSwapOp, FetchAddOp, GenericFetchOp,
    ProviderAtomicOp,
};
pub use rma::{RmaIov, RmaReadMessage, RmaWriteMessage};
pub use scalable::ScalableEndpoint;
pub use shared::{SharedRxContext, SharedTxContext};
pub use trigger::{
    DeferredWork, ThresholdCondition, TriggeredContext, flush_work, flush_work_for,
};
pub use types::{
    AddressFormat, AvType, Caps, CompOrder, ContextPtr, CqBindFlags, EndpointType, FabricAddr,
    FabricVersion, Mode, MrAccess, MrDescriptor, MrKey, MrMode, MsgOrder, OpFlags, ProgressMode,
    ProtocolVersion, QueueSize, RmaAddr, Tag, ThreadingMode,
};
