//! # provider 模块说明
//!
//! ## 角色定位（Why）
//! - 把各 NIC 家族（Verbs / EFA / Slingshot / 共享内存 / TCP / UCX）的能力差异
//!   收敛为编译期常量表，使原子路径选择、inject 上限检查、进度模式推断都能
//!   在单态化时完成，不产生任何运行时分支；
//! - 派生标记 trait（原生原子、分段原子、可 inject……）是下游泛型约束的词汇表。
//!
//! ## 契约（What）
//! - 每个 provider 标签恰好实现 `NativeAtomicProvider` 与 `StagedAtomicProvider`
//!   中的一个；文件尾部的编译期断言会在常量表与标记实现不一致时拒绝编译；
//! - 常量默认值以各 provider 的公开文档行为为准，不随运行时协商结果变化——
//!   运行时协商以 `FabricInfo` 为准，此表仅用于编译期决策。

use crate::types::{MrMode, ProgressMode};

mod sealed {
    pub trait Sealed {}
}

/// 单个 provider 的编译期能力表。
///
/// # 教案式说明
/// - **契约 (What)**：关联常量描述 provider 的缺省行为；`compute_remote_addr`
///   是纯函数，负责把注册基址与偏移合成 RMA 目标地址（个别 provider 在
///   virt-addr 模式下语义不同，故留作可覆写项）。
/// - **风险 (Trade-offs)**：表值是保守缺省；若运行时 `FabricInfo` 报告更强的
///   能力，以运行时为准。
pub trait ProviderTraits: sealed::Sealed + 'static {
    /// libfabric provider 名称（传给查询过滤器）。
    const NAME: &'static str;
    const SUPPORTS_NATIVE_ATOMICS: bool;
    const USES_STAGED_ATOMICS: bool;
    const SUPPORTS_INJECT: bool;
    const SUPPORTS_SELECTIVE_COMPLETION: bool;
    const USES_COMPLETION_QUEUE_FOR_INJECT: bool;
    const SUPPORTS_RMA_EVENT: bool;
    const SUPPORTS_MULTI_RECV: bool;
    const DEFAULT_MR_MODE: MrMode;
    const MAX_INJECT_SIZE: usize;
    const DEFAULT_CONTROL_PROGRESS: ProgressMode;
    const DEFAULT_DATA_PROGRESS: ProgressMode;
    const SUPPORTS_AUTO_PROGRESS: bool;
    const REQUIRES_LOCAL_KEY: bool;

    /// 计算 RMA 目标地址。
    #[inline]
    fn compute_remote_addr(base: u64, offset: u64) -> u64 {
        base + offset
    }
}

/// RDMA Verbs provider（InfiniBand、RoCE）。
pub struct Verbs;

/// AWS Elastic Fabric Adapter provider。
pub struct Efa;

/// HPE Slingshot（CXI）provider。
pub struct Slingshot;

/// 共享内存 provider。
pub struct Shm;

/// TCP 套接字 provider。
pub struct Tcp;

/// UCX provider。
pub struct Ucx;

impl sealed::Sealed for Verbs {}
impl sealed::Sealed for Efa {}
impl sealed::Sealed for Slingshot {}
impl sealed::Sealed for Shm {}
impl sealed::Sealed for Tcp {}
impl sealed::Sealed for Ucx {}

impl ProviderTraits for Verbs {
    const NAME: &'static str = "verbs";
    const SUPPORTS_NATIVE_ATOMICS: bool = true;
    const USES_STAGED_ATOMICS: bool = false;
    const SUPPORTS_INJECT: bool = true;
    const SUPPORTS_SELECTIVE_COMPLETION: bool = true;
    const USES_COMPLETION_QUEUE_FOR_INJECT: bool = false;
    const SUPPORTS_RMA_EVENT: bool = true;
    const SUPPORTS_MULTI_RECV: bool = true;
    const DEFAULT_MR_MODE: MrMode = MrMode::BASIC.union(MrMode::LOCAL).union(MrMode::PROV_KEY);
    const MAX_INJECT_SIZE: usize = 64;
    const DEFAULT_CONTROL_PROGRESS: ProgressMode = ProgressMode::Manual;
    const DEFAULT_DATA_PROGRESS: ProgressMode = ProgressMode::Manual;
    const SUPPORTS_AUTO_PROGRESS: bool = false;
    const REQUIRES_LOCAL_KEY: bool = true;
}

impl ProviderTraits for Efa {
    const NAME: &'static str = "efa";
    const SUPPORTS_NATIVE_ATOMICS: bool = false;
    const USES_STAGED_ATOMICS: bool = true;
    const SUPPORTS_INJECT: bool = true;
    const SUPPORTS_SELECTIVE_COMPLETION: bool = true;
    const USES_COMPLETION_QUEUE_FOR_INJECT: bool = false;
    const SUPPORTS_RMA_EVENT: bool = false;
    const SUPPORTS_MULTI_RECV: bool = true;
    const DEFAULT_MR_MODE: MrMode = MrMode::BASIC.union(MrMode::PROV_KEY);
    const MAX_INJECT_SIZE: usize = 32;
    const DEFAULT_CONTROL_PROGRESS: ProgressMode = ProgressMode::Manual;
    const DEFAULT_DATA_PROGRESS: ProgressMode = ProgressMode::Manual;
    const SUPPORTS_AUTO_PROGRESS: bool = false;
    const REQUIRES_LOCAL_KEY: bool = false;
}

impl ProviderTraits for Slingshot {
    const NAME: &'static str = "cxi";
    const SUPPORTS_NATIVE_ATOMICS: bool = true;
    const USES_STAGED_ATOMICS: bool = false;
    const SUPPORTS_INJECT: bool = true;
    const SUPPORTS_SELECTIVE_COMPLETION: bool = true;
    const USES_COMPLETION_QUEUE_FOR_INJECT: bool = false;
    const SUPPORTS_RMA_EVENT: bool = true;
    const SUPPORTS_MULTI_RECV: bool = true;
    const DEFAULT_MR_MODE: MrMode = MrMode::SCALABLE.union(MrMode::VIRT_ADDR);
    const MAX_INJECT_SIZE: usize = 64;
    const DEFAULT_CONTROL_PROGRESS: ProgressMode = ProgressMode::Auto;
    const DEFAULT_DATA_PROGRESS: ProgressMode = ProgressMode::Auto;
    const SUPPORTS_AUTO_PROGRESS: bool = true;
    const REQUIRES_LOCAL_KEY: bool = false;
}

impl ProviderTraits for Shm {
    const NAME: &'static str = "shm";
    const SUPPORTS_NATIVE_ATOMICS: bool = true;
    const USES_STAGED_ATOMICS: bool = false;
    const SUPPORTS_INJECT: bool = true;
    const SUPPORTS_SELECTIVE_COMPLETION: bool = true;
    const USES_COMPLETION_QUEUE_FOR_INJECT: bool = false;
    const SUPPORTS_RMA_EVENT: bool = true;
    const SUPPORTS_MULTI_RECV: bool = true;
    const DEFAULT_MR_MODE: MrMode = MrMode::VIRT_ADDR;
    const MAX_INJECT_SIZE: usize = 4096;
    const DEFAULT_CONTROL_PROGRESS: ProgressMode = ProgressMode::Auto;
    const DEFAULT_DATA_PROGRESS: ProgressMode = ProgressMode::Auto;
    const SUPPORTS_AUTO_PROGRESS: bool = true;
    const REQUIRES_LOCAL_KEY: bool = false;
}

impl ProviderTraits for Tcp {
    const NAME: &'static str = "tcp";
    const SUPPORTS_NATIVE_ATOMICS: bool = false;
    const USES_STAGED_ATOMICS: bool = true;
    const SUPPORTS_INJECT: bool = true;
    const SUPPORTS_SELECTIVE_COMPLETION: bool = true;
    const USES_COMPLETION_QUEUE_FOR_INJECT: bool = false;
    const SUPPORTS_RMA_EVENT: bool = false;
    const SUPPORTS_MULTI_RECV: bool = true;
    const DEFAULT_MR_MODE: MrMode = MrMode::BASIC;
    const MAX_INJECT_SIZE: usize = 64;
    const DEFAULT_CONTROL_PROGRESS: ProgressMode = ProgressMode::Manual;
    const DEFAULT_DATA_PROGRESS: ProgressMode = ProgressMode::Manual;
    const SUPPORTS_AUTO_PROGRESS: bool = false;
    const REQUIRES_LOCAL_KEY: bool = false;
}

impl ProviderTraits for Ucx {
    const NAME: &'static str = "ucx";
    const SUPPORTS_NATIVE_ATOMICS: bool = true;
    const USES_STAGED_ATOMICS: bool = false;
    const SUPPORTS_INJECT: bool = true;
    const SUPPORTS_SELECTIVE_COMPLETION: bool = true;
    const USES_COMPLETION_QUEUE_FOR_INJECT: bool = false;
    const SUPPORTS_RMA_EVENT: bool = true;
    const SUPPORTS_MULTI_RECV: bool = true;
    const DEFAULT_MR_MODE: MrMode = MrMode::BASIC;
    const MAX_INJECT_SIZE: usize = 128;
    const DEFAULT_CONTROL_PROGRESS: ProgressMode = ProgressMode::Manual;
    const DEFAULT_DATA_PROGRESS: ProgressMode = ProgressMode::Manual;
    const SUPPORTS_AUTO_PROGRESS: bool = true;
    const REQUIRES_LOCAL_KEY: bool = false;
}

/// 硬件原生原子 provider。
pub trait NativeAtomicProvider: ProviderTraits {}
/// 以 RMA 读改写模拟原子的 provider。
pub trait StagedAtomicProvider: ProviderTraits {}
/// 支持 inject 小消息路径的 provider。
pub trait InjectCapableProvider: ProviderTraits {}
/// 支持选择性完成的 provider。
pub trait SelectiveCompletionProvider: ProviderTraits {}
/// 支持 RMA 事件通知的 provider。
pub trait RmaEventProvider: ProviderTraits {}
/// 支持多接收缓冲的 provider。
pub trait MultiRecvProvider: ProviderTraits {}
/// 注册内存时要求本地键的 provider。
pub trait LocalKeyRequiredProvider: ProviderTraits {}
/// 支持自动进度的 provider。
pub trait AutoProgressProvider: ProviderTraits {}
/// 必须手动推进进度的 provider。
pub trait ManualProgressProvider: ProviderTraits {}

impl NativeAtomicProvider for Verbs {}
impl NativeAtomicProvider for Slingshot {}
impl NativeAtomicProvider for Shm {}
impl NativeAtomicProvider for Ucx {}

impl StagedAtomicProvider for Efa {}
impl StagedAtomicProvider for Tcp {}

impl InjectCapableProvider for Verbs {}
impl InjectCapableProvider for Efa {}
impl InjectCapableProvider for Slingshot {}
impl InjectCapableProvider for Shm {}
impl InjectCapableProvider for Tcp {}
impl InjectCapableProvider for Ucx {}

impl SelectiveCompletionProvider for Verbs {}
impl SelectiveCompletionProvider for Efa {}
impl SelectiveCompletionProvider for Slingshot {}
impl SelectiveCompletionProvider for Shm {}
impl SelectiveCompletionProvider for Tcp {}
impl SelectiveCompletionProvider for Ucx {}

impl RmaEventProvider for Verbs {}
impl RmaEventProvider for Slingshot {}
impl RmaEventProvider for Shm {}
impl RmaEventProvider for Ucx {}

impl MultiRecvProvider for Verbs {}
impl MultiRecvProvider for Efa {}
impl MultiRecvProvider for Slingshot {}
impl MultiRecvProvider for Shm {}
impl MultiRecvProvider for Tcp {}
impl MultiRecvProvider for Ucx {}

impl LocalKeyRequiredProvider for Verbs {}

impl AutoProgressProvider for Slingshot {}
impl AutoProgressProvider for Shm {}
impl AutoProgressProvider for Ucx {}

impl ManualProgressProvider for Verbs {}
impl ManualProgressProvider for Efa {}
impl ManualProgressProvider for Tcp {}

/// 给定尺寸能否走 inject 路径。
#[inline]
pub const fn can_inject<P: ProviderTraits>(size: usize) -> bool {
    P::SUPPORTS_INJECT && size <= P::MAX_INJECT_SIZE
}

/// provider 的缺省内存注册模式。
#[inline]
pub const fn default_mr_mode<P: ProviderTraits>() -> MrMode {
    P::DEFAULT_MR_MODE
}

/// 合成 RMA 目标地址。
#[inline]
pub fn compute_rma_addr<P: ProviderTraits>(base: u64, offset: u64) -> u64 {
    P::compute_remote_addr(base, offset)
}

/// provider 的缺省控制面进度模式。
#[inline]
pub const fn default_control_progress<P: ProviderTraits>() -> ProgressMode {
    P::DEFAULT_CONTROL_PROGRESS
}

/// provider 的缺省数据面进度模式。
#[inline]
pub const fn default_data_progress<P: ProviderTraits>() -> ProgressMode {
    P::DEFAULT_DATA_PROGRESS
}

/// 数据面是否需要调用方手动推进。
#[inline]
pub const fn requires_manual_progress<P: ProviderTraits>() -> bool {
    matches!(P::DEFAULT_DATA_PROGRESS, ProgressMode::Manual)
}

// 常量表与标记实现的一致性在编译期锁死。
const _: () = {
    assert!(Verbs::SUPPORTS_NATIVE_ATOMICS && !Verbs::USES_STAGED_ATOMICS);
    assert!(Slingshot::SUPPORTS_NATIVE_ATOMICS && !Slingshot::USES_STAGED_ATOMICS);
    assert!(Shm::SUPPORTS_NATIVE_ATOMICS && !Shm::USES_STAGED_ATOMICS);
    assert!(Ucx::SUPPORTS_NATIVE_ATOMICS && !Ucx::USES_STAGED_ATOMICS);
    assert!(Efa::USES_STAGED_ATOMICS && !Efa::SUPPORTS_NATIVE_ATOMICS);
    assert!(Tcp::USES_STAGED_ATOMICS && !Tcp::SUPPORTS_NATIVE_ATOMICS);
    assert!(Verbs::REQUIRES_LOCAL_KEY);
    assert!(!Efa::REQUIRES_LOCAL_KEY);
    assert!(Slingshot::SUPPORTS_AUTO_PROGRESS);
    assert!(Shm::SUPPORTS_AUTO_PROGRESS);
    assert!(!Verbs::SUPPORTS_AUTO_PROGRESS);
    assert!(!Efa::SUPPORTS_AUTO_PROGRESS);
    assert!(!Tcp::SUPPORTS_AUTO_PROGRESS);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inject_limit_is_inclusive() {
        assert!(can_inject::<Verbs>(Verbs::MAX_INJECT_SIZE));
        assert!(!can_inject::<Verbs>(Verbs::MAX_INJECT_SIZE + 1));
        assert!(can_inject::<Shm>(4096));
        assert!(!can_inject::<Efa>(33));
    }

    #[test]
    fn remote_addr_is_base_plus_offset_for_all_providers() {
        assert_eq!(compute_rma_addr::<Verbs>(0x1000, 0x20), 0x1020);
        assert_eq!(compute_rma_addr::<Shm>(0, 7), 7);
        assert_eq!(compute_rma_addr::<Tcp>(u64::MAX - 1, 1), u64::MAX);
    }

    #[test]
    fn default_modes_match_provider_documentation() {
        assert_eq!(default_mr_mode::<Slingshot>(), MrMode::SCALABLE | MrMode::VIRT_ADDR);
        assert_eq!(default_mr_mode::<Tcp>(), MrMode::BASIC);
        assert!(requires_manual_progress::<Verbs>());
        assert!(!requires_manual_progress::<Shm>());
        assert_eq!(default_control_progress::<Slingshot>(), ProgressMode::Auto);
        assert_eq!(default_data_progress::<Efa>(), ProgressMode::Manual);
    }
}
