//! 往返/幂等性质测试套件（proptest）。
//!
//! - **Why**：标志翻译、立即数布局、地址编解码是协商与寻址路径的正确性
//!   地基，单点用例不足以覆盖位域组合空间；
//! - **What**：对随机输入验证 `decode(encode(x)) == x` 一族定律与位集合
//!   代数律。

use proptest::prelude::*;

use weft_core::addr::{Address, EthernetAddress, IbAddress, Ipv4Address, Ipv6Address};
use weft_core::imm::{ImmediateData, NcclImmLayout, NixlImmLayout};
use weft_core::mr_cache::{PAGE_SIZE, align_down, align_up, aligned_length};
use weft_core::types::Caps;
use weft_core::Errc;

proptest! {
    /// 布局 (4,8,16,4)：掩码内字段完整往返。
    #[test]
    fn nixl_imm_round_trip(
        msg_type in 0u32..16,
        index in 0u32..256,
        id in 0u32..65536,
        seq in 0u32..16,
    ) {
        let data = NixlImmLayout::encode(msg_type, index, id, seq);
        prop_assert_eq!(NixlImmLayout::decode_type(data), msg_type);
        prop_assert_eq!(NixlImmLayout::decode_index(data), index);
        prop_assert_eq!(NixlImmLayout::decode_id(data), id);
        prop_assert_eq!(NixlImmLayout::decode_seq(data), seq);
    }

    /// 布局 (8,8,16,0)：seq 恒为 0，其余字段往返。
    #[test]
    fn nccl_imm_round_trip(
        msg_type in 0u32..256,
        index in 0u32..256,
        id in 0u32..65536,
        seq in any::<u32>(),
    ) {
        let data = NcclImmLayout::encode(msg_type, index, id, seq);
        prop_assert_eq!(NcclImmLayout::decode_type(data), msg_type);
        prop_assert_eq!(NcclImmLayout::decode_index(data), index);
        prop_assert_eq!(NcclImmLayout::decode_id(data), id);
        prop_assert_eq!(NcclImmLayout::decode_seq(data), 0);
    }

    /// 超宽输入的截断等价于先按掩码截断再编码。
    #[test]
    fn imm_truncation_is_masking(
        msg_type in any::<u32>(),
        index in any::<u32>(),
        id in any::<u32>(),
        seq in any::<u32>(),
    ) {
        let wide = NixlImmLayout::encode(msg_type, index, id, seq);
        let masked = NixlImmLayout::encode(msg_type & 0xF, index & 0xFF, id & 0xFFFF, seq & 0xF);
        prop_assert_eq!(wide, masked);
    }

    /// 立即数原始值往返。
    #[test]
    fn imm_raw_round_trip(raw in any::<u64>()) {
        prop_assert_eq!(ImmediateData::from_raw(raw).raw(), raw);
    }

    /// `ipv4(to_u32(a)) == a`。
    #[test]
    fn ipv4_u32_round_trip(a in any::<u8>(), b in any::<u8>(), c in any::<u8>(), d in any::<u8>(), port in any::<u16>()) {
        let addr = Ipv4Address::new([a, b, c, d], port);
        prop_assert_eq!(Ipv4Address::from_u32(addr.to_u32(), port), addr);
    }

    /// 地址变体的原始字节往返。
    #[test]
    fn address_raw_bytes_round_trip(
        octets in any::<[u8; 4]>(),
        segments in any::<[u16; 8]>(),
        gid in any::<[u8; 16]>(),
        mac in any::<[u8; 6]>(),
        port in any::<u16>(),
        qpn in 0u32..(1 << 24),
        lid in any::<u16>(),
    ) {
        let cases = [
            Address::Ipv4(Ipv4Address::new(octets, port)),
            Address::Ipv6(Ipv6Address::new(segments, port)),
            Address::Ib(IbAddress::new(gid, qpn, lid)),
            Address::Ethernet(EthernetAddress::new(mac)),
        ];
        for addr in cases {
            let bytes = addr.to_raw_bytes();
            prop_assert_eq!(Address::from_raw(&bytes, addr.format()), addr);
        }
    }

    /// 位集合代数律：吸收、互补、子集判定。
    #[test]
    fn caps_algebra_laws(x in any::<u64>(), y in any::<u64>()) {
        let x = Caps::from_bits(x);
        let y = Caps::from_bits(y);
        prop_assert_eq!((x | y) & y, y);
        prop_assert_eq!(x & !x, Caps::EMPTY);
        prop_assert_eq!(x.contains(y), (x & y) == y);
        prop_assert_eq!(x.intersects(y), !(x & y).is_empty());
    }

    /// 页对齐公式与朴素定义一致。
    #[test]
    fn page_alignment_formula(addr in 0usize..(1 << 40), len in 1usize..(1 << 20)) {
        prop_assert_eq!(align_down(addr), addr / PAGE_SIZE * PAGE_SIZE);
        prop_assert_eq!(align_up(addr), addr.div_ceil(PAGE_SIZE) * PAGE_SIZE);
        let total = aligned_length(addr, len);
        prop_assert!(total >= len);
        prop_assert_eq!(total % PAGE_SIZE, 0);
        prop_assert!(align_down(addr) + total >= addr + len);
    }

    /// 错误码判别值往返（负 errno 空间采样）。
    #[test]
    fn errc_from_raw_is_stable(raw in -1100i32..=0) {
        let errc = Errc::from_raw(raw);
        prop_assert_eq!(Errc::from_raw(errc.as_raw()), errc);
    }
}
