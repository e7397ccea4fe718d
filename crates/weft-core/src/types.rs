//! # types 模块说明
//!
//! ## 角色定位（Why）
//! - 为同宽整数承载的不同语义（远端地址、远端键、标签、能力位……）提供
//!   零开销的编译期区分，杜绝“把 key 当 addr 传”的一整类错误；
//! - 位集合类型统一暴露并/交/差/补与子集判定，供标志翻译层与调用方复用。
//!
//! ## 设计要求（What）
//! - 位集合满足集合代数律：`(x | y) & y == y`、`x & !x == EMPTY`、
//!   `x.contains(y) ⇔ (x & y) == y`；
//! - 强类型之间不存在隐式转换；取值只能经 `get()` 显式拆封。

use core::ffi::c_void;
use core::fmt;
use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Not};

/// 生成一个 `u64` 承载的位集合类型。
///
/// 生成的类型提供 `empty`/`from_bits`/`bits`/`union`/`intersection`/
/// `difference`/`complement`/`contains`/`intersects`/`is_empty` 以及全套
/// 位运算符实现；所有方法均为 `const fn`，可直接用于关联常量初始化。
macro_rules! bit_set {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                const $flag:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name {
            bits: u64,
        }

        impl $name {
            /// 空集合。
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$fmeta])*
                pub const $flag: Self = Self { bits: $value };
            )*

            /// 从原始位值构造。
            pub const fn from_bits(bits: u64) -> Self {
                Self { bits }
            }

            /// 返回底层位值。
            pub const fn bits(self) -> u64 {
                self.bits
            }

            /// 并集。
            pub const fn union(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }

            /// 交集。
            pub const fn intersection(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }

            /// 差集（`self \ other`）。
            pub const fn difference(self, other: Self) -> Self {
                Self { bits: self.bits & !other.bits }
            }

            /// 补集。
            pub const fn complement(self) -> Self {
                Self { bits: !self.bits }
            }

            /// 是否包含 `other` 的全部位。
            pub const fn contains(self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// 是否与 `other` 存在任一公共位。
            pub const fn intersects(self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// 是否为空集合。
            pub const fn is_empty(self) -> bool {
                self.bits == 0
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.bits |= rhs.bits;
            }
        }

        impl BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                self.intersection(rhs)
            }
        }

        impl BitAndAssign for $name {
            fn bitand_assign(&mut self, rhs: Self) {
                self.bits &= rhs.bits;
            }
        }

        impl BitXor for $name {
            type Output = Self;
            fn bitxor(self, rhs: Self) -> Self {
                Self { bits: self.bits ^ rhs.bits }
            }
        }

        impl BitXorAssign for $name {
            fn bitxor_assign(&mut self, rhs: Self) {
                self.bits ^= rhs.bits;
            }
        }

        impl Not for $name {
            type Output = Self;
            fn not(self) -> Self {
                self.complement()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "(0x{:x})"), self.bits)
            }
        }
    };
}

bit_set! {
    /// 端点能力位集合。
    pub struct Caps {
        const MSG = 1;
        const RMA = 1 << 1;
        const TAGGED = 1 << 2;
        const ATOMIC = 1 << 3;
        const READ = 1 << 4;
        const WRITE = 1 << 5;
        const COLLECTIVE = 1 << 6;
        const RECV = 1 << 7;
        const SEND = 1 << 8;
        const REMOTE_READ = 1 << 9;
        const REMOTE_WRITE = 1 << 10;
        const MULTI_RECV = 1 << 11;
        const REMOTE_COMM = 1 << 12;
        const FENCE = 1 << 13;
        const LOCAL_COMM = 1 << 14;
        const MSG_PREFIX = 1 << 15;
        const HMEM = 1 << 16;
    }
}

bit_set! {
    /// 应用行为要求位（libfabric mode）。
    pub struct Mode {
        const CONTEXT = 1;
        const MSG_PREFIX = 1 << 1;
        const RX_CQ_DATA = 1 << 2;
        const LOCAL_MR = 1 << 3;
    }
}

bit_set! {
    /// 传输侧消息顺序保证位。
    pub struct MsgOrder {
        const STRICT = 1;
        const DATA = 1 << 1;
        const RAW = 1 << 8;
        const WAR = 1 << 9;
        const WAW = 1 << 10;
    }
}

bit_set! {
    /// 完成顺序保证位。
    pub struct CompOrder {
        const STRICT = 1;
        const DATA = 1 << 1;
    }
}

bit_set! {
    /// 内存区域访问权限位。
    pub struct MrAccess {
        const READ = 1;
        const WRITE = 1 << 1;
        const REMOTE_READ = 1 << 2;
        const REMOTE_WRITE = 1 << 3;
        const SEND = 1 << 4;
        const RECV = 1 << 5;
    }
}

bit_set! {
    /// 内存区域注册模式位。
    pub struct MrMode {
        const SCALABLE = 1;
        const LOCAL = 1 << 1;
        const VIRT_ADDR = 1 << 2;
        const ALLOCATED = 1 << 3;
        const PROV_KEY = 1 << 4;
        const RAW = 1 << 5;
        const HMEM = 1 << 6;
        const ENDPOINT = 1 << 7;
        const COLLECTIVE = 1 << 8;
    }
}

impl MrMode {
    /// 基础模式：不要求任何显式注册行为。
    pub const BASIC: Self = Self::EMPTY;
}

bit_set! {
    /// 完成队列绑定方向位。
    pub struct CqBindFlags {
        const TRANSMIT = 1;
        const RECV = 1 << 1;
        const SELECTIVE_COMPLETION = 1 << 2;
    }
}

bit_set! {
    /// 提交操作修饰位。
    pub struct OpFlags {
        const COMPLETION = 1;
        const INJECT = 1 << 1;
        const FENCE = 1 << 2;
        const TRANSMIT_COMPLETE = 1 << 3;
        const DELIVERY_COMPLETE = 1 << 4;
    }
}

/// 生成一个不可隐式转换的整数新类型。
macro_rules! strong_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($inner:ty);
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name($inner);

        impl $name {
            /// 显式封装。
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// 显式拆封。
            pub const fn get(self) -> $inner {
                self.0
            }
        }
    };
}

strong_id! {
    /// fabric 接口版本号（`FI_VERSION` 编码）。
    pub struct FabricVersion(u32);
}

strong_id! {
    /// 端点协议版本号。
    pub struct ProtocolVersion(u32);
}

strong_id! {
    /// RMA 目标内存地址。
    pub struct RmaAddr(u64);
}

strong_id! {
    /// 内存区域远端键。
    pub struct MrKey(u64);
}

strong_id! {
    /// 标签匹配消息的 64 位标签。
    pub struct Tag(u64);
}

strong_id! {
    /// 队列深度或消息尺寸上限。
    pub struct QueueSize(usize);
}

/// 无连接传输使用的紧凑对端句柄。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FabricAddr(u64);

impl FabricAddr {
    /// 未指定对端。
    pub const UNSPECIFIED: Self = Self(u64::MAX);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Default for FabricAddr {
    fn default() -> Self {
        Self::UNSPECIFIED
    }
}

/// 操作上下文指针的类型安全包装。
///
/// 仅是指针语义的薄封装：既不管理生命周期，也不保证指向合法对象；
/// 提交路径与完成路径以它传递 provider 回传的不透明上下文。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ContextPtr(*mut c_void);

impl ContextPtr {
    /// 空上下文。
    pub const fn null() -> Self {
        Self(core::ptr::null_mut())
    }

    /// 从裸指针封装。
    pub const fn from_raw(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    /// 取出裸指针。
    pub const fn as_ptr(self) -> *mut c_void {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Default for ContextPtr {
    fn default() -> Self {
        Self::null()
    }
}

// 上下文指针只作为不透明令牌在线程间传递，解引用仅发生在持有者一侧。
unsafe impl Send for ContextPtr {}
unsafe impl Sync for ContextPtr {}

/// 数据操作使用的本地内存描述符（provider 不透明令牌）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct MrDescriptor(*mut c_void);

impl MrDescriptor {
    pub const fn null() -> Self {
        Self(core::ptr::null_mut())
    }

    pub const fn from_raw(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub const fn as_raw(self) -> *mut c_void {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Default for MrDescriptor {
    fn default() -> Self {
        Self::null()
    }
}

// 描述符是 provider 颁发的注册令牌，可跨线程复用于同一 domain 的提交。
unsafe impl Send for MrDescriptor {}
unsafe impl Sync for MrDescriptor {}

/// 网络地址格式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AddressFormat {
    /// 不要求特定格式。
    #[default]
    Unspecified = 0,
    /// IPv4 套接字地址。
    Inet = 1,
    /// IPv6 套接字地址。
    Inet6 = 2,
    /// InfiniBand 地址。
    Ib = 3,
    /// 以太网 MAC 地址。
    Ethernet = 8,
}

/// 端点类型。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EndpointType {
    /// 面向连接的可靠字节流端点。
    #[default]
    Msg,
    /// 可靠数据报端点。
    Rdm,
    /// 不可靠数据报端点。
    Dgram,
}

/// provider 线程安全级别。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ThreadingMode {
    #[default]
    Unspecified,
    /// 完全线程安全，允许并发访问。
    Safe,
    /// 按对象串行化。
    Fid,
    /// 按 domain 串行化。
    Domain,
    /// 完成路径需要串行化。
    Completion,
}

/// 进度推进模式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProgressMode {
    #[default]
    Unspecified,
    /// provider 自动推进。
    Auto,
    /// 应用必须轮询推进。
    Manual,
}

/// 地址向量的内部组织形式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AvType {
    #[default]
    Unspecified,
    /// provider 自选映射结构。
    Map,
    /// 稠密索引表。
    Table,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 集合代数律：`(x|y)&y == y`、`x & !x == EMPTY`、`contains ⇔ 交集回收`。
    #[test]
    fn bit_set_algebra_laws() {
        let x = Caps::MSG | Caps::RMA | Caps::SEND;
        let y = Caps::RMA | Caps::RECV;
        assert_eq!((x | y) & y, y);
        assert_eq!(x & !x, Caps::EMPTY);
        assert!(x.contains(Caps::MSG | Caps::RMA));
        assert_eq!(x.contains(y), (x & y) == y);
        assert!(x.intersects(y), "RMA 为公共位");
        assert!(!Caps::EMPTY.intersects(x));
    }

    #[test]
    fn strong_types_round_trip_their_value() {
        assert_eq!(MrKey::new(42).get(), 42);
        assert_eq!(RmaAddr::new(0xdead_beef).get(), 0xdead_beef);
        assert_eq!(FabricAddr::default(), FabricAddr::UNSPECIFIED);
    }

    #[test]
    fn context_ptr_defaults_to_null() {
        assert!(ContextPtr::default().is_null());
        assert!(MrDescriptor::default().is_null());
    }

    #[test]
    fn mr_mode_basic_is_empty() {
        assert!(MrMode::BASIC.is_empty());
        assert!(!MrMode::BASIC.intersects(MrMode::SCALABLE));
    }
}
