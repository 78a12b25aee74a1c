fn main() {
    if let Err(err) = void_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
