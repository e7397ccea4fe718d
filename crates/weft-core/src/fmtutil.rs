//! 人类可读格式化：地址、错误码、事件、标志位集合的 `Display` 实现。
//!
//! 日志与排障输出统一经由这里：位集合展开为具名标志列表而非裸十六进制，
//! 地址按各自族的习惯记法（点分十进制、冒号分组、MAC 连字符）呈现。

use core::fmt;

use crate::addr::{Address, EthernetAddress, IbAddress, Ipv4Address, Ipv6Address};
use crate::atomic::{AtomicDatatype, AtomicOp};
use crate::eq::EventKind;
use crate::error::Errc;
use crate::types::{Caps, MrAccess, MrMode};

impl fmt::Display for Errc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.octets();
        if self.port() == 0 {
            write!(f, "{}.{}.{}.{}", o[0], o[1], o[2], o[3])
        } else {
            write!(f, "{}.{}.{}.{}:{}", o[0], o[1], o[2], o[3], self.port())
        }
    }
}

impl fmt::Display for Ipv6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.segments();
        if self.port() != 0 {
            f.write_str("[")?;
        }
        for (i, seg) in s.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{seg:x}")?;
        }
        if self.port() != 0 {
            write!(f, "]:{}", self.port())?;
        }
        Ok(())
    }
}

impl fmt::Display for EthernetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mac = self.mac();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
        )
    }
}

impl fmt::Display for IbAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("gid=")?;
        for (i, byte) in self.gid().iter().enumerate() {
            if i > 0 && i % 2 == 0 {
                f.write_str(":")?;
            }
            write!(f, "{byte:02x}")?;
        }
        write!(f, " qpn={:#x} lid={}", self.qpn(), self.lid())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Unspecified => f.write_str("unspecified"),
            Address::Ipv4(a) => a.fmt(f),
            Address::Ipv6(a) => a.fmt(f),
            Address::Ib(a) => a.fmt(f),
            Address::Ethernet(a) => a.fmt(f),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::Connected => "connected",
            EventKind::ConnectionRequest => "connection request",
            EventKind::Shutdown => "shutdown",
            EventKind::JoinComplete => "join complete",
            EventKind::MrComplete => "mr complete",
            EventKind::AvComplete => "av complete",
        })
    }
}

impl fmt::Display for AtomicOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AtomicOp::Min => "min",
            AtomicOp::Max => "max",
            AtomicOp::Sum => "sum",
            AtomicOp::Prod => "prod",
            AtomicOp::LogicalOr => "logical or",
            AtomicOp::LogicalAnd => "logical and",
            AtomicOp::BitwiseOr => "bitwise or",
            AtomicOp::BitwiseAnd => "bitwise and",
            AtomicOp::LogicalXor => "logical xor",
            AtomicOp::BitwiseXor => "bitwise xor",
            AtomicOp::AtomicRead => "atomic read",
            AtomicOp::AtomicWrite => "atomic write",
            AtomicOp::CompareSwap => "compare swap",
            AtomicOp::CompareSwapNe => "compare swap (ne)",
            AtomicOp::CompareSwapLe => "compare swap (le)",
            AtomicOp::CompareSwapLt => "compare swap (lt)",
            AtomicOp::CompareSwapGe => "compare swap (ge)",
            AtomicOp::CompareSwapGt => "compare swap (gt)",
            AtomicOp::MaskedSwap => "masked swap",
        })
    }
}

impl fmt::Display for AtomicDatatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AtomicDatatype::Int8 => "int8",
            AtomicDatatype::Uint8 => "uint8",
            AtomicDatatype::Int16 => "int16",
            AtomicDatatype::Uint16 => "uint16",
            AtomicDatatype::Int32 => "int32",
            AtomicDatatype::Uint32 => "uint32",
            AtomicDatatype::Int64 => "int64",
            AtomicDatatype::Uint64 => "uint64",
            AtomicDatatype::Int128 => "int128",
            AtomicDatatype::Uint128 => "uint128",
            AtomicDatatype::Float32 => "float32",
            AtomicDatatype::Float64 => "float64",
            AtomicDatatype::FloatComplex => "float complex",
            AtomicDatatype::DoubleComplex => "double complex",
            AtomicDatatype::LongDouble => "long double",
            AtomicDatatype::LongDoubleComplex => "long double complex",
        })
    }
}

/// 把位集合展开为 `a|b|c` 形式；空集合输出 `none`，
/// 未具名的剩余位以十六进制兜底。
macro_rules! display_flag_set {
    ($ty:ty, [$(($flag:expr, $label:literal)),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_empty() {
                    return f.write_str("none");
                }
                let mut remaining = *self;
                let mut first = true;
                $(
                    if self.contains($flag) {
                        if !first {
                            f.write_str("|")?;
                        }
                        f.write_str($label)?;
                        first = false;
                        remaining = remaining.difference($flag);
                    }
                )+
                if !remaining.is_empty() {
                    if !first {
                        f.write_str("|")?;
                    }
                    write!(f, "{:#x}", remaining.bits())?;
                }
                Ok(())
            }
        }
    };
}

display_flag_set!(Caps, [
    (Caps::MSG, "msg"),
    (Caps::RMA, "rma"),
    (Caps::TAGGED, "tagged"),
    (Caps::ATOMIC, "atomic"),
    (Caps::READ, "read"),
    (Caps::WRITE, "write"),
    (Caps::COLLECTIVE, "collective"),
    (Caps::RECV, "recv"),
    (Caps::SEND, "send"),
    (Caps::REMOTE_READ, "remote_read"),
    (Caps::REMOTE_WRITE, "remote_write"),
    (Caps::MULTI_RECV, "multi_recv"),
    (Caps::REMOTE_COMM, "remote_comm"),
    (Caps::FENCE, "fence"),
    (Caps::LOCAL_COMM, "local_comm"),
    (Caps::MSG_PREFIX, "msg_prefix"),
    (Caps::HMEM, "hmem"),
]);

display_flag_set!(MrAccess, [
    (MrAccess::READ, "read"),
    (MrAccess::WRITE, "write"),
    (MrAccess::REMOTE_READ, "remote_read"),
    (MrAccess::REMOTE_WRITE, "remote_write"),
    (MrAccess::SEND, "send"),
    (MrAccess::RECV, "recv"),
]);

display_flag_set!(MrMode, [
    (MrMode::SCALABLE, "scalable"),
    (MrMode::LOCAL, "local"),
    (MrMode::VIRT_ADDR, "virt_addr"),
    (MrMode::ALLOCATED, "allocated"),
    (MrMode::PROV_KEY, "prov_key"),
    (MrMode::RAW, "raw"),
    (MrMode::HMEM, "hmem"),
    (MrMode::ENDPOINT, "endpoint"),
    (MrMode::COLLECTIVE, "collective"),
]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_dotted_quad_with_optional_port() {
        assert_eq!(Ipv4Address::new([192, 168, 1, 7], 0).to_string(), "192.168.1.7");
        assert_eq!(Ipv4Address::new([10, 0, 0, 1], 8080).to_string(), "10.0.0.1:8080");
    }

    #[test]
    fn ipv6_segments_with_bracketed_port() {
        let addr = Ipv6Address::new([0x2001, 0xdb8, 0, 0, 0, 0, 0, 1], 0);
        assert_eq!(addr.to_string(), "2001:db8:0:0:0:0:0:1");
        let with_port = Ipv6Address::new([0, 0, 0, 0, 0, 0, 0, 1], 443);
        assert_eq!(with_port.to_string(), "[0:0:0:0:0:0:0:1]:443");
    }

    #[test]
    fn mac_colon_separated() {
        let mac = EthernetAddress::new([0x02, 0x42, 0xac, 0x11, 0x00, 0x02]);
        assert_eq!(mac.to_string(), "02:42:ac:11:00:02");
    }

    #[test]
    fn address_variant_dispatches() {
        assert_eq!(Address::Unspecified.to_string(), "unspecified");
        assert_eq!(
            Address::Ipv4(Ipv4Address::new([127, 0, 0, 1], 0)).to_string(),
            "127.0.0.1"
        );
        let ib = Address::Ib(IbAddress::new([0; 16], 0x12, 3));
        assert!(ib.to_string().contains("qpn=0x12"));
        assert!(ib.to_string().contains("lid=3"));
    }

    #[test]
    fn flag_sets_expand_to_named_lists() {
        assert_eq!(Caps::EMPTY.to_string(), "none");
        assert_eq!((Caps::MSG | Caps::RMA).to_string(), "msg|rma");
        assert_eq!(
            (MrAccess::READ | MrAccess::REMOTE_WRITE).to_string(),
            "read|remote_write"
        );
        assert_eq!((MrMode::SCALABLE | MrMode::VIRT_ADDR).to_string(), "scalable|virt_addr");
        // 未具名位以十六进制兜底。
        assert_eq!(Caps::from_bits(1 << 60).to_string(), "0x1000000000000000");
    }

    #[test]
    fn errc_and_event_kind_read_naturally() {
        assert_eq!(Errc::Again.to_string(), "resource temporarily unavailable");
        assert_eq!(EventKind::Shutdown.to_string(), "shutdown");
        assert_eq!(AtomicOp::Sum.to_string(), "sum");
        assert_eq!(AtomicDatatype::Uint32.to_string(), "uint32");
    }
}
