mod cli;
mod dispatch;
mod envelope;
mod observability;

use clap::Parser;

fn main() {
    observability::init_tracing();
    let cli = cli::Cli::parse();
    let json_mode = cli.json;

    match dispatch::run(cli) {
        Ok(data) => {
            if json_mode {
                envelope::emit_success(data);
            }
        }
        Err(err) => {
            let code = envelope::emit_failure(json_mode, &err);
            std::process::exit(code);
        }
    }
}
