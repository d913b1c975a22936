mod cli;
mod error_fmt;
mod run;

use clap::Parser;

fn main() {
    let _ = color_eyre::install();
    let args = cli::Cli::parse();
    let _ = cli::JSON_MODE.set(args.json);

    if let Err(err) = run::execute(&args) {
        let json = cli::JSON_MODE.get().copied().unwrap_or(false);
        if json {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}
