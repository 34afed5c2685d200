fn main() {
    if let Err(err) = ledger_recon::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
