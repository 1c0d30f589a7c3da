use fuzzpack_lib::platform::Platform;

pub fn cmd_info() {
  println!("fuzzpack {}", env!("CARGO_PKG_VERSION"));
  match Platform::current() {
    Some(platform) => {
      println!("Platform: {}", platform);
      println!("Target: {}", platform.target_triple());
    }
    _ => println!("Could not detect platform."),
  }
}
