//! # imm 模块说明
//!
//! ## 角色定位（Why）
//! - 立即数是随发送/RMA 写完成一同抵达对端的 64 位不透明字，常被通信层用来
//!   免解包地携带消息类型、通道索引、请求 id 与序号；
//! - 本模块提供按位宽参数化的结构化布局：编码时按位宽截断，解码时移位取掩码，
//!   字段自低位向高位依次为 `seq | id | index | type`。
//!
//! ## 契约（What）
//! - `TYPE_BITS + INDEX_BITS + ID_BITS + SEQ_BITS <= 64`（编译期断言）；
//! - 对任何各字段均落在掩码内的输入，`decode(encode(fields)) == fields`；
//! - 超宽输入被静默截断到字段宽度，这是既定行为而非错误。

/// RDMA 操作随附的 64 位立即数。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ImmediateData {
    raw: u64,
}

impl ImmediateData {
    /// 从原始值构造。
    pub const fn from_raw(raw: u64) -> Self {
        Self { raw }
    }

    /// 返回原始 64 位值。
    pub const fn raw(self) -> u64 {
        self.raw
    }
}

/// 结构化立即数布局，位宽由常量参数给定。
///
/// # 教案式说明
/// - **契约 (What)**：`SEQ` 占最低位，向上依次是 `ID`、`INDEX`、`TYPE`；
///   编码先按各自掩码截断再移位合成；
/// - **风险 (Trade-offs)**：位宽为 0 的字段掩码为 0，编码恒为 0、解码恒返回 0，
///   调用方不必特判。
pub struct ImmLayout<
    const TYPE_BITS: u32,
    const INDEX_BITS: u32,
    const ID_BITS: u32,
    const SEQ_BITS: u32 = 0,
>;

impl<const TYPE_BITS: u32, const INDEX_BITS: u32, const ID_BITS: u32, const SEQ_BITS: u32>
    ImmLayout<TYPE_BITS, INDEX_BITS, ID_BITS, SEQ_BITS>
{
    const TOTAL_OK: () = assert!(
        TYPE_BITS + INDEX_BITS + ID_BITS + SEQ_BITS <= 64,
        "layout exceeds 64 bits"
    );

    pub const SEQ_SHIFT: u32 = 0;
    pub const ID_SHIFT: u32 = SEQ_BITS;
    pub const INDEX_SHIFT: u32 = Self::ID_SHIFT + ID_BITS;
    pub const TYPE_SHIFT: u32 = Self::INDEX_SHIFT + INDEX_BITS;

    pub const SEQ_MASK: u64 = mask(SEQ_BITS);
    pub const ID_MASK: u64 = mask(ID_BITS);
    pub const INDEX_MASK: u64 = mask(INDEX_BITS);
    pub const TYPE_MASK: u64 = mask(TYPE_BITS);

    /// 把四个字段编码为立即数；超宽字段按掩码截断。
    pub const fn encode(msg_type: u32, index: u32, id: u32, seq: u32) -> ImmediateData {
        // 关联常量引用触发位宽断言的求值。
        let () = Self::TOTAL_OK;
        let mut value = 0u64;
        value |= (seq as u64 & Self::SEQ_MASK) << Self::SEQ_SHIFT;
        value |= (id as u64 & Self::ID_MASK) << Self::ID_SHIFT;
        value |= (index as u64 & Self::INDEX_MASK) << Self::INDEX_SHIFT;
        value |= (msg_type as u64 & Self::TYPE_MASK) << Self::TYPE_SHIFT;
        ImmediateData::from_raw(value)
    }

    pub const fn decode_type(data: ImmediateData) -> u32 {
        ((data.raw() >> Self::TYPE_SHIFT) & Self::TYPE_MASK) as u32
    }

    pub const fn decode_index(data: ImmediateData) -> u32 {
        ((data.raw() >> Self::INDEX_SHIFT) & Self::INDEX_MASK) as u32
    }

    pub const fn decode_id(data: ImmediateData) -> u32 {
        ((data.raw() >> Self::ID_SHIFT) & Self::ID_MASK) as u32
    }

    pub const fn decode_seq(data: ImmediateData) -> u32 {
        ((data.raw() >> Self::SEQ_SHIFT) & Self::SEQ_MASK) as u32
    }
}

const fn mask(bits: u32) -> u64 {
    if bits == 0 {
        0
    } else if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// NIXL 风格布局：`(type, index, id, seq) = (4, 8, 16, 4)`。
pub type NixlImmLayout = ImmLayout<4, 8, 16, 4>;

/// NCCL 风格布局：`(type, index, id) = (8, 8, 16)`，无序号字段。
pub type NcclImmLayout = ImmLayout<8, 8, 16, 0>;

/// 把任意不超过 8 字节的 POD 值打包进立即数（低位对齐，高位补零）。
pub fn pack<T: Copy>(value: T) -> ImmediateData {
    const {
        assert!(size_of::<T>() <= size_of::<u64>(), "value exceeds 64 bits");
    }
    let mut raw = 0u64;
    // 仅拷贝 T 自身的字节数；T: Copy 保证逐字节读取合法。
    unsafe {
        core::ptr::copy_nonoverlapping(
            (&raw const value).cast::<u8>(),
            (&raw mut raw).cast::<u8>(),
            size_of::<T>(),
        );
    }
    ImmediateData::from_raw(raw)
}

/// 从立即数还原 POD 值（[`pack`] 的逆操作）。
pub fn unpack<T: Copy>(data: ImmediateData) -> T {
    const {
        assert!(size_of::<T>() <= size_of::<u64>(), "value exceeds 64 bits");
    }
    let raw = data.raw();
    let mut value = core::mem::MaybeUninit::<T>::uninit();
    unsafe {
        core::ptr::copy_nonoverlapping(
            (&raw const raw).cast::<u8>(),
            value.as_mut_ptr().cast::<u8>(),
            size_of::<T>(),
        );
        value.assume_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 场景：布局 (4,8,16,4) 编码 `(0xA, 0x55, 0x1234, 0x3)`，各字段自低位
    /// 向高位按 `seq|id|index|type` 排布，解码还原同样四个值。
    #[test]
    fn nixl_layout_round_trip() {
        let data = NixlImmLayout::encode(0xA, 0x55, 0x1234, 0x3);
        let expected = 0x3u64 | (0x1234 << 4) | (0x55 << 20) | (0xA << 28);
        assert_eq!(data.raw(), expected, "字段排布必须为 seq|id|index|type");
        assert_eq!(NixlImmLayout::decode_type(data), 0xA);
        assert_eq!(NixlImmLayout::decode_index(data), 0x55);
        assert_eq!(NixlImmLayout::decode_id(data), 0x1234);
        assert_eq!(NixlImmLayout::decode_seq(data), 0x3);
    }

    #[test]
    fn zero_width_seq_field_decodes_to_zero() {
        let data = NcclImmLayout::encode(0xFF, 0x12, 0xABCD, 0xdead);
        assert_eq!(NcclImmLayout::decode_seq(data), 0, "0 位字段恒为 0");
        assert_eq!(NcclImmLayout::decode_type(data), 0xFF);
        assert_eq!(NcclImmLayout::decode_id(data), 0xABCD);
    }

    /// 超宽输入被静默截断到掩码宽度。
    #[test]
    fn overwide_fields_truncate_silently() {
        let data = NixlImmLayout::encode(0x1F, 0x1FF, 0x1_FFFF, 0x1F);
        assert_eq!(NixlImmLayout::decode_type(data), 0xF);
        assert_eq!(NixlImmLayout::decode_index(data), 0xFF);
        assert_eq!(NixlImmLayout::decode_id(data), 0xFFFF);
        assert_eq!(NixlImmLayout::decode_seq(data), 0xF);
    }

    #[test]
    fn pack_unpack_round_trips_small_pods() {
        assert_eq!(unpack::<u32>(pack(0xdead_beefu32)), 0xdead_beef);
        assert_eq!(unpack::<u8>(pack(0x7fu8)), 0x7f);
        assert_eq!(unpack::<i64>(pack(-42i64)), -42);
        let raw = pack(0x1122_3344u32).raw();
        assert_eq!(raw, 0x1122_3344, "低位对齐，高位补零");
    }
}
