fn main() {
    // Stamped into `grapefruit --verbose` output
    let built = chrono::Utc::now().format("%Y-%m-%d %H:%M UTC");
    println!("cargo:rustc-env=BUILD_DATE={}", built);
}
