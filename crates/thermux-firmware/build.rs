fn main() {
    // esp-hal's linker script pulls in the memory map and the esp-rtos sections
    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
