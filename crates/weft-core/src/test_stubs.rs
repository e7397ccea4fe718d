//! 测试桩命名空间：集中维护不触达 fabric 的官方桩实现，供缓存逻辑
//! 测试与上层集成测试复用。
//!
//! # 设计背景（Why）
//! - 缓存的区间/引用计数/统计协议与真实注册解耦，桩后端让这些协议
//!   在无 NIC、无 provider 的环境下可被完整验证；
//! - 统一维护桩对象，避免各测试文件重复定义。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Errc, FabricError, Result};
use crate::mr::{HmemDevice, MemoryRegion};
use crate::mr_cache::RegisterBackend;
use crate::types::MrAccess;

/// 永远成功、返回空区域的注册后端。
///
/// 计数器共享（`Clone` 后仍指向同一份），测试把克隆体交给缓存、
/// 原件留在手里断言缓存只在未命中时触达后端。
#[derive(Clone, Default)]
pub struct NoopRegistration {
    registrations: Arc<AtomicUsize>,
}

impl NoopRegistration {
    pub fn new() -> Self {
        Self::default()
    }

    /// 后端被触达的次数。
    pub fn registration_count(&self) -> usize {
        self.registrations.load(Ordering::Relaxed)
    }
}

impl RegisterBackend for NoopRegistration {
    unsafe fn register(
        &self,
        _addr: *mut u8,
        _len: usize,
        _access: MrAccess,
    ) -> Result<MemoryRegion> {
        self.registrations.fetch_add(1, Ordering::Relaxed);
        Ok(MemoryRegion::default())
    }

    unsafe fn register_dmabuf(
        &self,
        _addr: *mut u8,
        _len: usize,
        _access: MrAccess,
        _fd: i32,
        _offset: u64,
    ) -> Result<MemoryRegion> {
        self.registrations.fetch_add(1, Ordering::Relaxed);
        Ok(MemoryRegion::default())
    }

    unsafe fn register_hmem(
        &self,
        _addr: *mut u8,
        _len: usize,
        _access: MrAccess,
        _device: HmemDevice,
    ) -> Result<MemoryRegion> {
        self.registrations.fetch_add(1, Ordering::Relaxed);
        Ok(MemoryRegion::default())
    }
}

/// 永远失败的注册后端，用于验证失败路径不落缓存条目。
pub struct FailingRegistration {
    pub errc: Errc,
}

impl Default for FailingRegistration {
    fn default() -> Self {
        Self {
            errc: Errc::NoMemory,
        }
    }
}

impl RegisterBackend for FailingRegistration {
    unsafe fn register(
        &self,
        _addr: *mut u8,
        _len: usize,
        _access: MrAccess,
    ) -> Result<MemoryRegion> {
        Err(FabricError::new(self.errc).with_context("stub registration"))
    }

    unsafe fn register_dmabuf(
        &self,
        _addr: *mut u8,
        _len: usize,
        _access: MrAccess,
        _fd: i32,
        _offset: u64,
    ) -> Result<MemoryRegion> {
        Err(FabricError::new(self.errc).with_context("stub registration"))
    }

    unsafe fn register_hmem(
        &self,
        _addr: *mut u8,
        _len: usize,
        _access: MrAccess,
        _device: HmemDevice,
    ) -> Result<MemoryRegion> {
        Err(FabricError::new(self.errc).with_context("stub registration"))
    }
}
