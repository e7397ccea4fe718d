//! # endpoint 模块说明
//!
//! ## 角色定位（Why）
//! - 端点是消息与 RMA 操作的可寻址源/汇，生命周期为
//!   `created → bound* → enabled → {connecting|connected|shutdown}`；
//! - “绑定后才能使能、使能后不得再绑定”这一不变量用类型状态表达：
//!   [`Endpoint`] 只有绑定操作，[`Endpoint::enable`] 按值消耗自身并换出
//!   [`ActiveEndpoint`]，后者才有数据路径——迟绑定在编译期即不可表达。
//!
//! ## 契约（What）
//! - 同方向的 CQ 重复绑定返回 `already`；
//! - 数据路径的缓冲区型提交是 `unsafe`：缓冲区与上下文必须活到完成事件
//!   返回为止（inject 族例外——provider 当场拷贝，返回后缓冲可复用）；
//! - 未使能端点上的提交不存在（类型层面拒绝）；空 [`ActiveEndpoint`] 上的
//!   提交返回 `invalid_argument`。

use std::io::{IoSlice, IoSliceMut};
use std::sync::Arc;

use weft_sys as sys;

use crate::addr::Address;
use crate::av::AddressVector;
use crate::conv;
use crate::counter::Counter;
use crate::cq::CompletionQueue;
use crate::domain::Domain;
use crate::eq::EventQueue;
use crate::error::{Errc, FabricError, Result, check, empty_object};
use crate::imm::ImmediateData;
use crate::info::FabricInfo;
use crate::shared::{SharedRxContext, SharedTxContext};
use crate::types::{
    AddressFormat, ContextPtr, CqBindFlags, EndpointType, FabricAddr, MrKey, RmaAddr, Tag,
};

pub(crate) struct EndpointInner {
    pub(crate) ep: *mut sys::fid_ep,
    pub(crate) ep_type: EndpointType,
    pub(crate) addr_format: AddressFormat,
    // 父资源保活：domain 或可扩展端点。
    pub(crate) _parent: Arc<dyn core::any::Any + Send + Sync>,
}

unsafe impl Send for EndpointInner {}
unsafe impl Sync for EndpointInner {}

impl Drop for EndpointInner {
    fn drop(&mut self) {
        if !self.ep.is_null() {
            let ret = unsafe { sys::fi_close(&raw mut (*self.ep).fid) };
            if ret != 0 {
                tracing::warn!(ret, "fi_close(ep) failed");
            }
            self.ep = core::ptr::null_mut();
        }
    }
}

/// 已创建、尚未使能的传输端点（绑定阶段）。
#[derive(Default)]
pub struct Endpoint {
    inner: Option<Arc<EndpointInner>>,
    tx_cq_bound: bool,
    rx_cq_bound: bool,
}

impl Endpoint {
    /// 在 domain 上按首个候选描述创建端点。
    pub fn create(domain: &Domain, info: &FabricInfo) -> Result<Endpoint> {
        let Some(domain_inner) = domain.inner() else {
            return Err(empty_object("endpoint::create"));
        };
        let info_ptr = info.as_raw();
        if info_ptr.is_null() {
            return Err(empty_object("endpoint::create"));
        }

        let mut ep: *mut sys::fid_ep = core::ptr::null_mut();
        let ret = unsafe {
            sys::fi_endpoint(domain_inner.domain, info_ptr, &mut ep, core::ptr::null_mut())
        };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_endpoint"));
        }

        let (ep_type, addr_format) = unsafe {
            let ep_attr = (*info_ptr).ep_attr;
            (
                if ep_attr.is_null() {
                    EndpointType::Msg
                } else {
                    conv::from_fi_ep_type((*ep_attr).ep_type)
                },
                conv::from_fi_addr_format((*info_ptr).addr_format),
            )
        };
        tracing::debug!(?ep_type, ?addr_format, "endpoint created");

        Ok(Endpoint {
            inner: Some(Arc::new(EndpointInner {
                ep,
                ep_type,
                addr_format,
                _parent: Arc::clone(domain_inner) as Arc<dyn core::any::Any + Send + Sync>,
            })),
            tx_cq_bound: false,
            rx_cq_bound: false,
        })
    }

    pub(crate) fn from_inner(inner: Arc<EndpointInner>) -> Endpoint {
        Endpoint {
            inner: Some(inner),
            tx_cq_bound: false,
            rx_cq_bound: false,
        }
    }

    /// 绑定完成队列（发送、接收或选择性完成方向）。
    ///
    /// 同方向重复绑定返回 `already`。
    pub fn bind_cq(&mut self, cq: &CompletionQueue, flags: CqBindFlags) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("endpoint::bind_cq"));
        };
        let Some(cq_fid) = cq.raw_fid() else {
            return Err(empty_object("endpoint::bind_cq"));
        };

        if flags.contains(CqBindFlags::TRANSMIT) && self.tx_cq_bound {
            return Err(FabricError::new(Errc::Already).with_context("endpoint::bind_cq"));
        }
        if flags.contains(CqBindFlags::RECV) && self.rx_cq_bound {
            return Err(FabricError::new(Errc::Already).with_context("endpoint::bind_cq"));
        }

        let ret = unsafe { sys::fi_ep_bind(inner.ep, cq_fid, conv::to_fi_cq_bind_flags(flags)) };
        check(ret as isize, "fi_ep_bind")?;

        self.tx_cq_bound |= flags.contains(CqBindFlags::TRANSMIT);
        self.rx_cq_bound |= flags.contains(CqBindFlags::RECV);
        Ok(())
    }

    /// 绑定发送方向完成队列。
    pub fn bind_tx_cq(&mut self, cq: &CompletionQueue) -> Result<()> {
        self.bind_cq(cq, CqBindFlags::TRANSMIT)
    }

    /// 绑定接收方向完成队列。
    pub fn bind_rx_cq(&mut self, cq: &CompletionQueue) -> Result<()> {
        self.bind_cq(cq, CqBindFlags::RECV)
    }

    /// 绑定事件队列（连接管理事件经此上报）。
    pub fn bind_eq(&mut self, eq: &EventQueue, flags: u64) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("endpoint::bind_eq"));
        };
        let Some(eq_fid) = eq.raw_fid() else {
            return Err(empty_object("endpoint::bind_eq"));
        };
        check(
            unsafe { sys::fi_ep_bind(inner.ep, eq_fid, flags) } as isize,
            "fi_ep_bind",
        )
    }

    /// 绑定地址向量（无连接端点必需）。
    pub fn bind_av(&mut self, av: &AddressVector, flags: u64) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("endpoint::bind_av"));
        };
        let Some(av_fid) = av.raw_fid() else {
            return Err(empty_object("endpoint::bind_av"));
        };
        check(
            unsafe { sys::fi_ep_bind(inner.ep, av_fid, flags) } as isize,
            "fi_ep_bind",
        )
    }

    /// 绑定完成计数器。
    pub fn bind_counter(&mut self, counter: &Counter, flags: u64) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("endpoint::bind_counter"));
        };
        let Some(cntr_fid) = counter.raw_fid() else {
            return Err(empty_object("endpoint::bind_counter"));
        };
        check(
            unsafe { sys::fi_ep_bind(inner.ep, cntr_fid, flags) } as isize,
            "fi_ep_bind",
        )
    }

    /// 绑定共享发送上下文。
    pub fn bind_stx(&mut self, stx: &SharedTxContext) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("endpoint::bind_stx"));
        };
        let Some(stx_fid) = stx.raw_fid() else {
            return Err(empty_object("endpoint::bind_stx"));
        };
        check(
            unsafe { sys::fi_ep_bind(inner.ep, stx_fid, 0) } as isize,
            "fi_ep_bind",
        )
    }

    /// 绑定共享接收上下文。
    pub fn bind_srx(&mut self, srx: &SharedRxContext) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("endpoint::bind_srx"));
        };
        let Some(srx_fid) = srx.raw_fid() else {
            return Err(empty_object("endpoint::bind_srx"));
        };
        check(
            unsafe { sys::fi_ep_bind(inner.ep, srx_fid, 0) } as isize,
            "fi_ep_bind",
        )
    }

    /// 使能端点，进入数据传输状态。
    ///
    /// 消耗绑定态句柄；必要绑定缺失时 provider 返回错误，端点随之关闭。
    pub fn enable(self) -> Result<ActiveEndpoint> {
        let Some(inner) = self.inner else {
            return Err(empty_object("endpoint::enable"));
        };
        let ret = unsafe { sys::fi_enable(inner.ep) };
        if ret != 0 {
            return Err(FabricError::from_errno(ret as isize).with_context("fi_enable"));
        }
        Ok(ActiveEndpoint { inner: Some(inner) })
    }

    /// 端点类型。
    pub fn endpoint_type(&self) -> EndpointType {
        self.inner
            .as_deref()
            .map(|i| i.ep_type)
            .unwrap_or_default()
    }

    /// 是否持有有效句柄。
    pub fn is_valid(&self) -> bool {
        self.inner.as_deref().is_some_and(|i| !i.ep.is_null())
    }

    pub(crate) fn raw_fid(&self) -> Option<*mut sys::fid> {
        self.inner
            .as_deref()
            .map(|i| unsafe { &raw mut (*i.ep).fid })
    }
}

/// 已使能的传输端点（数据路径）。
#[derive(Default)]
pub struct ActiveEndpoint {
    inner: Option<Arc<EndpointInner>>,
}

impl ActiveEndpoint {
    fn ep(&self, context: &'static str) -> Result<*mut sys::fid_ep> {
        match self.inner.as_deref() {
            Some(inner) if !inner.ep.is_null() => Ok(inner.ep),
            _ => Err(empty_object(context)),
        }
    }

    /// 提交单缓冲发送。
    ///
    /// # Safety
    /// `data` 与 `ctx` 指向的存储必须保持有效且地址稳定，直至本操作的完成
    /// 事件从完成队列返回（或被取消回收）。
    pub unsafe fn send(&self, data: &[u8], ctx: ContextPtr) -> Result<()> {
        let ep = self.ep("endpoint::send")?;
        let ret = unsafe {
            sys::fi_send(
                ep,
                data.as_ptr().cast(),
                data.len(),
                core::ptr::null_mut(),
                sys::FI_ADDR_UNSPEC,
                ctx.as_ptr(),
            )
        };
        check(ret, "fi_send")
    }

    /// 提交单缓冲接收。
    ///
    /// # Safety
    /// 同 [`send`](Self::send)。
    pub unsafe fn recv(&self, buffer: &mut [u8], ctx: ContextPtr) -> Result<()> {
        let ep = self.ep("endpoint::recv")?;
        let ret = unsafe {
            sys::fi_recv(
                ep,
                buffer.as_mut_ptr().cast(),
                buffer.len(),
                core::ptr::null_mut(),
                sys::FI_ADDR_UNSPEC,
                ctx.as_ptr(),
            )
        };
        check(ret, "fi_recv")
    }

    /// 提交散布发送；IOV 数量受 [`crate::msg::MAX_IOV_COUNT`] 限制。
    ///
    /// # Safety
    /// 同 [`send`](Self::send)，且对每个 IOV 段生效。
    pub unsafe fn sendv(&self, iov: &[IoSlice<'_>], ctx: ContextPtr) -> Result<()> {
        crate::msg::validate_iov_count(iov.len())?;
        let ep = self.ep("endpoint::sendv")?;
        let ret = unsafe {
            sys::fi_sendv(
                ep,
                iov.as_ptr().cast::<libc::iovec>(),
                core::ptr::null_mut(),
                iov.len(),
                sys::FI_ADDR_UNSPEC,
                ctx.as_ptr(),
            )
        };
        check(ret, "fi_sendv")
    }

    /// 提交散布接收。
    ///
    /// # Safety
    /// 同 [`send`](Self::send)，且对每个 IOV 段生效。
    pub unsafe fn recvv(&self, iov: &mut [IoSliceMut<'_>], ctx: ContextPtr) -> Result<()> {
        crate::msg::validate_iov_count(iov.len())?;
        let ep = self.ep("endpoint::recvv")?;
        let ret = unsafe {
            sys::fi_recvv(
                ep,
                iov.as_ptr().cast::<libc::iovec>(),
                core::ptr::null_mut(),
                iov.len(),
                sys::FI_ADDR_UNSPEC,
                ctx.as_ptr(),
            )
        };
        check(ret, "fi_recvv")
    }

    /// 提交标签匹配散布发送。
    ///
    /// # Safety
    /// 同 [`send`](Self::send)，且对每个 IOV 段生效。
    pub unsafe fn tagged_sendv(
        &self,
        iov: &[IoSlice<'_>],
        tag: Tag,
        ctx: ContextPtr,
    ) -> Result<()> {
        crate::msg::validate_iov_count(iov.len())?;
        let ep = self.ep("endpoint::tagged_sendv")?;
        let ret = unsafe {
            sys::fi_tsendv(
                ep,
                iov.as_ptr().cast::<libc::iovec>(),
                core::ptr::null_mut(),
                iov.len(),
                sys::FI_ADDR_UNSPEC,
                tag.get(),
                ctx.as_ptr(),
            )
        };
        check(ret, "fi_tsendv")
    }

    /// 提交标签匹配散布接收。
    ///
    /// # Safety
    /// 同 [`send`](Self::send)，且对每个 IOV 段生效。
    pub unsafe fn tagged_recvv(
        &self,
        iov: &mut [IoSliceMut<'_>],
        tag: Tag,
        ignore: u64,
        ctx: ContextPtr,
    ) -> Result<()> {
        crate::msg::validate_iov_count(iov.len())?;
        let ep = self.ep("endpoint::tagged_recvv")?;
        let ret = unsafe {
            sys::fi_trecvv(
                ep,
                iov.as_ptr().cast::<libc::iovec>(),
                core::ptr::null_mut(),
                iov.len(),
                sys::FI_ADDR_UNSPEC,
                tag.get(),
                ignore,
                ctx.as_ptr(),
            )
        };
        check(ret, "fi_trecvv")
    }

    /// 提交标签匹配发送。
    ///
    /// # Safety
    /// 同 [`send`](Self::send)。
    pub unsafe fn tagged_send(&self, data: &[u8], tag: Tag, ctx: ContextPtr) -> Result<()> {
        let ep = self.ep("endpoint::tagged_send")?;
        let ret = unsafe {
            sys::fi_tsend(
                ep,
                data.as_ptr().cast(),
                data.len(),
                core::ptr::null_mut(),
                sys::FI_ADDR_UNSPEC,
                tag.get(),
                ctx.as_ptr(),
            )
        };
        check(ret, "fi_tsend")
    }

    /// 提交标签匹配接收；`ignore` 位上的标签差异不参与匹配。
    ///
    /// # Safety
    /// 同 [`send`](Self::send)。
    pub unsafe fn tagged_recv(
        &self,
        buffer: &mut [u8],
        tag: Tag,
        ignore: u64,
        ctx: ContextPtr,
    ) -> Result<()> {
        let ep = self.ep("endpoint::tagged_recv")?;
        let ret = unsafe {
            sys::fi_trecv(
                ep,
                buffer.as_mut_ptr().cast(),
                buffer.len(),
                core::ptr::null_mut(),
                sys::FI_ADDR_UNSPEC,
                tag.get(),
                ignore,
                ctx.as_ptr(),
            )
        };
        check(ret, "fi_trecv")
    }

    /// 小负载直发：provider 当场拷贝，返回后缓冲即可复用。
    pub fn inject(&self, data: &[u8], dest: FabricAddr) -> Result<()> {
        let ep = self.ep("endpoint::inject")?;
        let ret = unsafe { sys::fi_inject(ep, data.as_ptr().cast(), data.len(), dest.get()) };
        check(ret, "fi_inject")
    }

    /// 小负载直发并附带立即数。
    pub fn inject_data(&self, data: &[u8], imm: ImmediateData, dest: FabricAddr) -> Result<()> {
        let ep = self.ep("endpoint::inject_data")?;
        let ret = unsafe {
            sys::fi_injectdata(ep, data.as_ptr().cast(), data.len(), imm.raw(), dest.get())
        };
        check(ret, "fi_injectdata")
    }

    /// 标签小负载直发。
    pub fn tagged_inject(&self, data: &[u8], tag: Tag, dest: FabricAddr) -> Result<()> {
        let ep = self.ep("endpoint::tagged_inject")?;
        let ret = unsafe {
            sys::fi_tinject(ep, data.as_ptr().cast(), data.len(), dest.get(), tag.get())
        };
        check(ret, "fi_tinject")
    }

    /// 标签小负载直发并附带立即数。
    pub fn tagged_inject_data(
        &self,
        data: &[u8],
        tag: Tag,
        imm: ImmediateData,
        dest: FabricAddr,
    ) -> Result<()> {
        let ep = self.ep("endpoint::tagged_inject_data")?;
        let ret = unsafe {
            sys::fi_tinjectdata(
                ep,
                data.as_ptr().cast(),
                data.len(),
                imm.raw(),
                dest.get(),
                tag.get(),
            )
        };
        check(ret, "fi_tinjectdata")
    }

    /// 单边 RMA 读。
    ///
    /// # Safety
    /// 同 [`send`](Self::send)；此外 `(remote_addr, key)` 必须来自对端仍然
    /// 有效的内存区域。
    pub unsafe fn read(
        &self,
        buffer: &mut [u8],
        remote_addr: RmaAddr,
        key: MrKey,
        ctx: ContextPtr,
    ) -> Result<()> {
        let ep = self.ep("endpoint::read")?;
        let ret = unsafe {
            sys::fi_read(
                ep,
                buffer.as_mut_ptr().cast(),
                buffer.len(),
                core::ptr::null_mut(),
                sys::FI_ADDR_UNSPEC,
                remote_addr.get(),
                key.get(),
                ctx.as_ptr(),
            )
        };
        check(ret, "fi_read")
    }

    /// 单边 RMA 写。
    ///
    /// # Safety
    /// 同 [`read`](Self::read)。
    pub unsafe fn write(
        &self,
        data: &[u8],
        remote_addr: RmaAddr,
        key: MrKey,
        ctx: ContextPtr,
    ) -> Result<()> {
        let ep = self.ep("endpoint::write")?;
        let ret = unsafe {
            sys::fi_write(
                ep,
                data.as_ptr().cast(),
                data.len(),
                core::ptr::null_mut(),
                sys::FI_ADDR_UNSPEC,
                remote_addr.get(),
                key.get(),
                ctx.as_ptr(),
            )
        };
        check(ret, "fi_write")
    }

    /// 请求取消以 `ctx` 标识的在途操作。
    ///
    /// 结局仍经完成队列投递：正常完成或 `canceled` 错误条目，二者必居其一。
    pub fn cancel(&self, ctx: ContextPtr) -> Result<()> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("endpoint::cancel"));
        };
        let ret = unsafe { sys::fi_cancel(&raw mut (*inner.ep).fid, ctx.as_ptr()) };
        check(ret, "fi_cancel")
    }

    /// 发起连接（面向连接端点）。
    pub fn connect(&self, peer: &Address) -> Result<()> {
        let ep = self.ep("endpoint::connect")?;
        let bytes = peer.to_raw_bytes();
        if bytes.is_empty() {
            return Err(FabricError::new(Errc::InvalidArgument).with_context("endpoint::connect"));
        }
        let ret = unsafe { sys::fi_connect(ep, bytes.as_ptr().cast(), core::ptr::null(), 0) };
        check(ret as isize, "fi_connect")
    }

    /// 接受入站连接请求。
    pub fn accept(&self) -> Result<()> {
        let ep = self.ep("endpoint::accept")?;
        let ret = unsafe { sys::fi_accept(ep, core::ptr::null(), 0) };
        check(ret as isize, "fi_accept")
    }

    /// 主动关断连接。
    pub fn shutdown(&self) -> Result<()> {
        let ep = self.ep("endpoint::shutdown")?;
        let ret = unsafe { sys::fi_shutdown(ep, 0) };
        check(ret as isize, "fi_shutdown")
    }

    /// 读取本端地址并解析为地址变体。
    pub fn local_address(&self) -> Result<Address> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("endpoint::local_address"));
        };
        let mut buf = [0u8; 256];
        let mut len = buf.len();
        let ret = unsafe {
            sys::fi_getname(&raw mut (*inner.ep).fid, buf.as_mut_ptr().cast(), &mut len)
        };
        check(ret as isize, "fi_getname")?;
        Ok(Address::from_raw(&buf[..len.min(buf.len())], inner.addr_format))
    }

    /// 读取对端地址并解析为地址变体。
    pub fn peer_address(&self) -> Result<Address> {
        let Some(inner) = self.inner.as_deref() else {
            return Err(empty_object("endpoint::peer_address"));
        };
        let mut buf = [0u8; 256];
        let mut len = buf.len();
        let ret = unsafe { sys::fi_getpeer(inner.ep, buf.as_mut_ptr().cast(), &mut len) };
        check(ret as isize, "fi_getpeer")?;
        Ok(Address::from_raw(&buf[..len.min(buf.len())], inner.addr_format))
    }

    /// 端点类型。
    pub fn endpoint_type(&self) -> EndpointType {
        self.inner
            .as_deref()
            .map(|i| i.ep_type)
            .unwrap_or_default()
    }

    /// 是否持有有效句柄。
    pub fn is_valid(&self) -> bool {
        self.inner.as_deref().is_some_and(|i| !i.ep.is_null())
    }

    pub(crate) fn raw(&self) -> Option<*mut sys::fid_ep> {
        self.inner
            .as_deref()
            .filter(|i| !i.ep.is_null())
            .map(|i| i.ep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 空对象契约：默认构造的端点上每个操作都返回 `invalid_argument`。
    #[test]
    fn empty_endpoints_reject_everything() {
        let mut ep = Endpoint::default();
        assert!(!ep.is_valid());
        assert_eq!(ep.endpoint_type(), EndpointType::Msg);
        let cq = CompletionQueue::default();
        assert_eq!(
            ep.bind_cq(&cq, CqBindFlags::TRANSMIT).unwrap_err().errc(),
            Errc::InvalidArgument
        );
        assert_eq!(ep.enable().unwrap_err().errc(), Errc::InvalidArgument);

        let active = ActiveEndpoint::default();
        assert!(!active.is_valid());
        assert_eq!(
            unsafe { active.send(b"x", ContextPtr::null()) }.unwrap_err().errc(),
            Errc::InvalidArgument
        );
        assert_eq!(
            active.inject(b"x", FabricAddr::UNSPECIFIED).unwrap_err().errc(),
            Errc::InvalidArgument
        );
        assert_eq!(active.cancel(ContextPtr::null()).unwrap_err().errc(), Errc::InvalidArgument);
        assert_eq!(active.accept().unwrap_err().errc(), Errc::InvalidArgument);
        assert_eq!(active.local_address().unwrap_err().errc(), Errc::InvalidArgument);
    }

    /// IOV 超限在进入 fabric 前即被拒绝（校验先于句柄检查）。
    #[test]
    fn sendv_rejects_oversized_iov_before_reaching_fabric() {
        let active = ActiveEndpoint::default();
        let data = [0u8; 4];
        let slices: Vec<IoSlice<'_>> = (0..crate::msg::MAX_IOV_COUNT + 1)
            .map(|_| IoSlice::new(&data))
            .collect();
        let err = unsafe { active.sendv(&slices, ContextPtr::null()) }.unwrap_err();
        assert_eq!(err.errc(), Errc::InvalidArgument);
    }
}
