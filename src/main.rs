fn main() {
    if let Err(err) = clipshelf::run() {
        eprintln!("fatal: {err:#}");
        std::process::exit(1);
    }
}
