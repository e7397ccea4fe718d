//! 单边 RMA 操作的描述符路径：带本地内存描述符的读/写、携带立即数的写，
//! 以及 RMA IOV 记录。分段原子的读改写阶段也复用这里的入口。

use weft_sys as sys;

use crate::endpoint::ActiveEndpoint;
use crate::error::{Result, check, empty_object};
use crate::imm::ImmediateData;
use crate::mr::RemoteMemory;
use crate::types::{ContextPtr, MrDescriptor};

/// 远端散布段：地址、长度、键。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RmaIov {
    pub addr: u64,
    pub len: usize,
    pub key: u64,
}

impl RmaIov {
    pub(crate) fn to_fi(self) -> sys::fi_rma_iov {
        sys::fi_rma_iov {
            addr: self.addr,
            len: self.len,
            key: self.key,
        }
    }
}

impl From<RemoteMemory> for RmaIov {
    fn from(remote: RemoteMemory) -> Self {
        RmaIov {
            addr: remote.addr.get(),
            len: remote.len,
            key: remote.key.get(),
        }
    }
}

fn ep_raw(ep: &ActiveEndpoint, context: &'static str) -> Result<*mut sys::fid_ep> {
    ep.raw().ok_or_else(|| empty_object(context))
}

/// 从远端内存读入本地缓冲。
///
/// # Safety
/// `buffer` 与 `ctx` 必须活到完成事件返回；`desc` 必须是覆盖 `buffer` 的
/// 有效注册描述符（provider 要求本地键时不可为空）；`remote` 必须指向
/// 对端仍然有效的注册区域。
pub unsafe fn read(
    ep: &ActiveEndpoint,
    buffer: &mut [u8],
    desc: MrDescriptor,
    remote: RemoteMemory,
    ctx: ContextPtr,
) -> Result<()> {
    let fid_ep = ep_raw(ep, "rma::read")?;
    let ret = unsafe {
        sys::fi_read(
            fid_ep,
            buffer.as_mut_ptr().cast(),
            buffer.len(),
            desc.as_raw(),
            sys::FI_ADDR_UNSPEC,
            remote.addr.get(),
            remote.key.get(),
            ctx.as_ptr(),
        )
    };
    check(ret, "fi_read")
}

/// 把本地缓冲写入远端内存。
///
/// # Safety
/// 同 [`read`]。
pub unsafe fn write(
    ep: &ActiveEndpoint,
    data: &[u8],
    desc: MrDescriptor,
    remote: RemoteMemory,
    ctx: ContextPtr,
) -> Result<()> {
    let fid_ep = ep_raw(ep, "rma::write")?;
    let ret = unsafe {
        sys::fi_write(
            fid_ep,
            data.as_ptr().cast(),
            data.len(),
            desc.as_raw(),
            sys::FI_ADDR_UNSPEC,
            remote.addr.get(),
            remote.key.get(),
            ctx.as_ptr(),
        )
    };
    check(ret, "fi_write")
}

/// RMA 写并向对端 CQ 投递立即数。
///
/// # Safety
/// 同 [`read`]。
pub unsafe fn write_data(
    ep: &ActiveEndpoint,
    data: &[u8],
    desc: MrDescriptor,
    imm: ImmediateData,
    remote: RemoteMemory,
    ctx: ContextPtr,
) -> Result<()> {
    let fid_ep = ep_raw(ep, "rma::write_data")?;
    let ret = unsafe {
        sys::fi_writedata(
            fid_ep,
            data.as_ptr().cast(),
            data.len(),
            desc.as_raw(),
            imm.raw(),
            sys::FI_ADDR_UNSPEC,
            remote.addr.get(),
            remote.key.get(),
            ctx.as_ptr(),
        )
    };
    check(ret, "fi_writedata")
}

/// 散布 RMA 读描述符：远端各段依序读入本地可写 IOV。
#[derive(Debug, Default)]
pub struct RmaReadMessage<'a> {
    pub iov: &'a [std::io::IoSliceMut<'a>],
    pub desc: &'a [MrDescriptor],
    pub dest: crate::types::FabricAddr,
    pub rma_iov: &'a [RmaIov],
    pub context: ContextPtr,
}

/// 散布 RMA 写描述符：本地 IOV 依序写入远端各段，可携带立即数。
#[derive(Debug, Default)]
pub struct RmaWriteMessage<'a> {
    pub iov: &'a [std::io::IoSlice<'a>],
    pub desc: &'a [MrDescriptor],
    pub dest: crate::types::FabricAddr,
    pub rma_iov: &'a [RmaIov],
    pub context: ContextPtr,
    pub data: u64,
}

/// 散布 RMA 读。
///
/// # Safety
/// 同 [`read`]，且对每个本地段与远端段生效。
pub unsafe fn readmsg(ep: &ActiveEndpoint, msg: &RmaReadMessage<'_>, flags: u64) -> Result<()> {
    crate::msg::validate_iov_count(msg.iov.len())?;
    let fid_ep = ep_raw(ep, "rma::readmsg")?;

    let mut raw_desc = [core::ptr::null_mut(); crate::msg::MAX_IOV_COUNT];
    let rma_iov: Vec<sys::fi_rma_iov> = msg.rma_iov.iter().map(|r| r.to_fi()).collect();
    let fi_msg = sys::fi_msg_rma {
        msg_iov: msg.iov.as_ptr().cast::<libc::iovec>(),
        desc: crate::msg::descriptors_to_raw(msg.desc, &mut raw_desc),
        iov_count: msg.iov.len(),
        addr: msg.dest.get(),
        rma_iov: rma_iov.as_ptr(),
        rma_iov_count: rma_iov.len(),
        context: msg.context.as_ptr(),
        data: 0,
    };

    let ret = unsafe { sys::fi_readmsg(fid_ep, &fi_msg, flags) };
    check(ret, "fi_readmsg")
}

/// 散布 RMA 写。
///
/// # Safety
/// 同 [`read`]。
pub unsafe fn writemsg(ep: &ActiveEndpoint, msg: &RmaWriteMessage<'_>, flags: u64) -> Result<()> {
    crate::msg::validate_iov_count(msg.iov.len())?;
    let fid_ep = ep_raw(ep, "rma::writemsg")?;

    let mut raw_desc = [core::ptr::null_mut(); crate::msg::MAX_IOV_COUNT];
    let rma_iov: Vec<sys::fi_rma_iov> = msg.rma_iov.iter().map(|r| r.to_fi()).collect();
    let fi_msg = sys::fi_msg_rma {
        msg_iov: msg.iov.as_ptr().cast::<libc::iovec>(),
        desc: crate::msg::descriptors_to_raw(msg.desc, &mut raw_desc),
        iov_count: msg.iov.len(),
        addr: msg.dest.get(),
        rma_iov: rma_iov.as_ptr(),
        rma_iov_count: rma_iov.len(),
        context: msg.context.as_ptr(),
        data: msg.data,
    };

    let ret = unsafe { sys::fi_writemsg(fid_ep, &fi_msg, flags) };
    check(ret, "fi_writemsg")
}

/// 小负载 RMA 直写：provider 当场拷贝，无完成事件。
pub fn inject_write(ep: &ActiveEndpoint, data: &[u8], remote: RemoteMemory) -> Result<()> {
    let fid_ep = ep_raw(ep, "rma::inject_write")?;
    let ret = unsafe {
        sys::fi_inject_write(
            fid_ep,
            data.as_ptr().cast(),
            data.len(),
            sys::FI_ADDR_UNSPEC,
            remote.addr.get(),
            remote.key.get(),
        )
    };
    check(ret, "fi_inject_write")
}

/// 小负载 RMA 直写并附带立即数。
pub fn inject_write_data(
    ep: &ActiveEndpoint,
    data: &[u8],
    imm: ImmediateData,
    remote: RemoteMemory,
) -> Result<()> {
    let fid_ep = ep_raw(ep, "rma::inject_write_data")?;
    let ret = unsafe {
        sys::fi_inject_writedata(
            fid_ep,
            data.as_ptr().cast(),
            data.len(),
            imm.raw(),
            sys::FI_ADDR_UNSPEC,
            remote.addr.get(),
            remote.key.get(),
        )
    };
    check(ret, "fi_inject_writedata")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Errc;
    use crate::types::{MrKey, RmaAddr};

    #[test]
    fn rma_iov_converts_from_remote_memory() {
        let remote = RemoteMemory::new(RmaAddr::new(0x4000), MrKey::new(9), 128);
        let iov = RmaIov::from(remote);
        assert_eq!(iov.addr, 0x4000);
        assert_eq!(iov.len, 128);
        assert_eq!(iov.key, 9);
    }

    #[test]
    fn empty_endpoint_rejects_rma_posts() {
        let ep = ActiveEndpoint::default();
        let mut buf = [0u8; 8];
        let remote = RemoteMemory::default();
        let err = unsafe {
            read(&ep, &mut buf, MrDescriptor::default(), remote, ContextPtr::null())
        }
        .unwrap_err();
        assert_eq!(err.errc(), Errc::InvalidArgument);
        assert_eq!(
            inject_write(&ep, &buf, remote).unwrap_err().errc(),
            Errc::InvalidArgument
        );
    }
}
