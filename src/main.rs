fn main() {
    if let Err(code) = trialforge::cli::run() {
        std::process::exit(code.as_i32());
    }
}
