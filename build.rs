use std::env;

fn main() {
    // 告诉 cargo 在 build.rs 变化时重新运行
    println!("cargo:rerun-if-changed=build.rs");

    // 主机构建 (库 + 测试) 不需要任何链接配置
    if env::var_os("CARGO_FEATURE_ESP32S3").is_none() {
        return;
    }

    // esp-hal 1.0 的链接脚本, 只作用于固件二进制
    println!("cargo:rustc-link-arg-bins=-Tlinkall.x");

    // 添加 ld 目录到链接路径（如果有自定义链接脚本）
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    println!("cargo:rustc-link-search={}/ld", manifest_dir);
}
