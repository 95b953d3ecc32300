use clap::Parser;
use qpsess_host::{run, Cli};

fn main() {
    let exit_code = run(Cli::parse());
    std::process::exit(exit_code as i32);
}
