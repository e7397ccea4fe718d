//! 构建脚本：定位系统 libfabric 并产出链接指令。
//!
//! - 优先尝试 `pkg-config`（发行版与 Spack/模块环境通常都会安装 `.pc` 文件）；
//! - 失败时回退到朴素的 `-lfabric`，并允许通过 `LIBFABRIC_LIB_DIR` 显式补充
//!   搜索路径，方便在自编译 libfabric 的集群节点上构建。

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=LIBFABRIC_LIB_DIR");

    if let Some(dir) = env::var_os("LIBFABRIC_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", dir.to_string_lossy());
        println!("cargo:rustc-link-lib=dylib=fabric");
        return;
    }

    let probe = Command::new("pkg-config")
        .args(["--libs", "libfabric"])
        .output();

    match probe {
        Ok(out) if out.status.success() => {
            let flags = String::from_utf8_lossy(&out.stdout);
            for flag in flags.split_whitespace() {
                if let Some(dir) = flag.strip_prefix("-L") {
                    println!("cargo:rustc-link-search=native={dir}");
                } else if let Some(lib) = flag.strip_prefix("-l") {
                    println!("cargo:rustc-link-lib=dylib={lib}");
                }
            }
        }
        _ => {
            // pkg-config 不可用时假定库位于默认搜索路径。
            println!("cargo:rustc-link-lib=dylib=fabric");
        }
    }
}
