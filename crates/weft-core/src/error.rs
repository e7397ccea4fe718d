//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 把 libfabric 以负 errno 形式返回的失败合流为一个封闭的错误域，
//!   使上层可以按“可重试 / 调用方可恢复 / 单操作致命 / 端点致命”分类处置；
//! - 同时保留 provider 原始错误码，排障时不丢失底层诊断信息。
//!
//! ## 设计要求（What）
//! - [`Errc`] 是封闭集合：枚举值与 libfabric 负 errno 数值一一对应，
//!   `from_raw(as_raw(x)) == x` 对每个已定义值成立；
//! - [`FabricError`] 实现 `thiserror::Error`，携带 `Errc` + provider errno +
//!   可选的静态上下文；
//! - 所有可失败操作返回 [`Result`]；构造路径失败时不残留半初始化对象。

use thiserror::Error;

/// libfabric 错误码的封闭映射。
///
/// # 教案式说明
/// - **意图 (Why)**：provider 返回的负 errno 语义分散，统一收敛为本枚举后，
///   重试策略与完成通道分发可以只依赖枚举判别而非裸数值。
/// - **契约 (What)**：判别值即负 errno；`BadFlags` 是本库自有的扩展值，
///   用于标记在进入 fabric 之前就被拦截的非法标志组合。
/// - **风险 (Trade-offs)**：未列出的 errno 会被折叠为 [`Errc::IoError`]，
///   原始值仍保存在 [`FabricError::prov_errno`] 中。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Errc {
    /// 操作成功。
    Success = 0,
    /// 条目不存在。
    NoEntry = -2,
    /// I/O 错误。
    IoError = -5,
    /// 资源暂时不可用，调用方应在排空完成事件后重试。
    Again = -11,
    /// 内存不足。
    NoMemory = -12,
    /// 设备或资源忙。
    Busy = -16,
    /// 非法参数。
    InvalidArgument = -22,
    /// 设备无剩余空间。
    NoSpace = -28,
    /// 无可用数据。
    NoData = -61,
    /// 消息超过缓冲区上限。
    MessageTooLong = -90,
    /// 操作不受支持。
    NotSupported = -95,
    /// 地址已被占用。
    AddressInUse = -98,
    /// 地址不可达。
    AddressNotAvailable = -99,
    /// 传输端点未连接。
    NotConnected = -107,
    /// 等待超时。
    Timeout = -110,
    /// 连接被拒绝。
    ConnectionRefused = -111,
    /// 连接已在进行中。
    Already = -114,
    /// 操作已被取消。
    Canceled = -125,
    /// 非法标志组合。
    BadFlags = -1001,
}

impl Errc {
    /// 从 provider 返回值恢复错误码；未知值折叠为 `IoError`。
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Errc::Success,
            -2 => Errc::NoEntry,
            -5 => Errc::IoError,
            -11 => Errc::Again,
            -12 => Errc::NoMemory,
            -16 => Errc::Busy,
            -22 => Errc::InvalidArgument,
            -28 => Errc::NoSpace,
            -61 => Errc::NoData,
            -90 => Errc::MessageTooLong,
            -95 => Errc::NotSupported,
            -98 => Errc::AddressInUse,
            -99 => Errc::AddressNotAvailable,
            -107 => Errc::NotConnected,
            -110 => Errc::Timeout,
            -111 => Errc::ConnectionRefused,
            -114 => Errc::Already,
            -125 => Errc::Canceled,
            -1001 => Errc::BadFlags,
            _ => Errc::IoError,
        }
    }

    /// 返回判别值（负 errno）。
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// 可重试类错误：返回调用方后不做内部重试。
    pub const fn is_retriable(self) -> bool {
        matches!(self, Errc::Again | Errc::Timeout)
    }

    /// 人类可读的错误摘要。
    pub const fn message(self) -> &'static str {
        match self {
            Errc::Success => "success",
            Errc::NoEntry => "no such entry",
            Errc::IoError => "I/O error",
            Errc::Again => "resource temporarily unavailable",
            Errc::NoMemory => "out of memory",
            Errc::Busy => "device or resource busy",
            Errc::InvalidArgument => "invalid argument",
            Errc::NoSpace => "no space left on device",
            Errc::NoData => "no data available",
            Errc::MessageTooLong => "message too long",
            Errc::NotSupported => "operation not supported",
            Errc::AddressInUse => "address already in use",
            Errc::AddressNotAvailable => "address not available",
            Errc::NotConnected => "transport endpoint is not connected",
            Errc::Timeout => "operation timed out",
            Errc::ConnectionRefused => "connection refused",
            Errc::Already => "operation already in progress",
            Errc::Canceled => "operation canceled",
            Errc::BadFlags => "invalid flags specified",
        }
    }
}

/// fabric 调用失败的完整描述。
///
/// # 教案式说明
/// - **意图 (Why)**：`Errc` 只表达分类，排障还需要 provider 的原始 errno 与
///   失败位置；两者合流后，完成通道与同步返回路径共享同一错误形态。
/// - **契约 (What)**：
///   - `errc` 永不为 `Success`（成功路径不构造本类型）；
///   - `prov_errno` 为 provider 原始返回值的绝对值，`0` 表示与 `errc` 同源；
///   - `context` 为静态描述（如 `"fi_cq_open"`），不承载动态信息。
/// - **风险 (Trade-offs)**：`Copy` 语义要求丢弃 provider 的 err_data 缓冲；
///   该缓冲经由完成事件单独暴露，不在此复制。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("{} in {} (prov_errno {prov_errno})", .errc.message(), .context.unwrap_or("fabric call"))]
pub struct FabricError {
    errc: Errc,
    prov_errno: i32,
    context: Option<&'static str>,
}

impl FabricError {
    /// 以错误码构造，provider errno 视作与分类同源。
    pub const fn new(errc: Errc) -> Self {
        Self {
            errc,
            prov_errno: 0,
            context: None,
        }
    }

    /// 从 fabric 调用的负返回值构造。
    ///
    /// # 契约
    /// - **输入**：`ret` 为负的 errno（`fi_*` 约定）；非负输入是调用方缺陷，
    ///   会被当作 `IoError` 处理而不是 panic；
    /// - **后置条件**：`prov_errno` 保留 `|ret|`，分类经 [`Errc::from_raw`]。
    pub fn from_errno(ret: isize) -> Self {
        let raw = ret as i32;
        Self {
            errc: Errc::from_raw(if raw > 0 { -raw } else { raw }),
            prov_errno: raw.unsigned_abs() as i32,
            context: None,
        }
    }

    /// 附加静态上下文（通常为失败的 fabric 入口名）。
    pub const fn with_context(mut self, context: &'static str) -> Self {
        self.context = Some(context);
        self
    }

    /// 错误分类。
    pub const fn errc(&self) -> Errc {
        self.errc
    }

    /// provider 原始 errno（绝对值；`0` 表示与分类同源）。
    pub const fn prov_errno(&self) -> i32 {
        self.prov_errno
    }

    /// 是否属于可重试类（`again` / `timeout`）。
    pub const fn is_retriable(&self) -> bool {
        self.errc.is_retriable()
    }
}

impl From<Errc> for FabricError {
    fn from(errc: Errc) -> Self {
        FabricError::new(errc)
    }
}

/// 本 crate 统一的可失败返回形态。
pub type Result<T> = core::result::Result<T, FabricError>;

/// 把 fabric 的 `ssize_t`/`int` 返回值折叠为 `Result<()>`。
#[inline]
pub(crate) fn check(ret: isize, context: &'static str) -> Result<()> {
    if ret < 0 {
        Err(FabricError::from_errno(ret).with_context(context))
    } else {
        Ok(())
    }
}

/// 空资源对象上的任何操作返回的统一错误。
#[inline]
pub(crate) fn empty_object(context: &'static str) -> FabricError {
    FabricError::new(Errc::InvalidArgument).with_context(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[Errc] = &[
        Errc::Success,
        Errc::NoEntry,
        Errc::IoError,
        Errc::Again,
        Errc::NoMemory,
        Errc::Busy,
        Errc::InvalidArgument,
        Errc::NoSpace,
        Errc::NoData,
        Errc::MessageTooLong,
        Errc::NotSupported,
        Errc::AddressInUse,
        Errc::AddressNotAvailable,
        Errc::NotConnected,
        Errc::Timeout,
        Errc::ConnectionRefused,
        Errc::Already,
        Errc::Canceled,
        Errc::BadFlags,
    ];

    /// 封闭集合内每个值都必须满足 `from_raw(as_raw(x)) == x`。
    #[test]
    fn errc_raw_round_trip() {
        for &errc in ALL {
            assert_eq!(Errc::from_raw(errc.as_raw()), errc, "{errc:?} 往返失败");
        }
    }

    #[test]
    fn unknown_errno_folds_into_io_error_and_keeps_raw() {
        let err = FabricError::from_errno(-4242);
        assert_eq!(err.errc(), Errc::IoError);
        assert_eq!(err.prov_errno(), 4242);
    }

    #[test]
    fn retriable_classification_covers_again_and_timeout_only() {
        for &errc in ALL {
            let expect = matches!(errc, Errc::Again | Errc::Timeout);
            assert_eq!(errc.is_retriable(), expect, "{errc:?} 重试分类错误");
        }
    }

    #[test]
    fn display_includes_context_when_present() {
        let err = FabricError::new(Errc::Busy).with_context("fi_cq_open");
        let text = err.to_string();
        assert!(text.contains("busy"), "缺少分类摘要: {text}");
        assert!(text.contains("fi_cq_open"), "缺少上下文: {text}");
    }
}
