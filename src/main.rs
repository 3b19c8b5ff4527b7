extern crate pretty_env_logger;

#[macro_use]
extern crate log;

use clap::Parser;
use straincmp::{compare_main, greedy_main, Cli, Commands, RcError, RcParams};

fn setup_logging(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    pretty_env_logger::formatted_timed_builder()
        .filter_level(level)
        .init();
}

/// Log and check the arguments before running a subcommand
fn check_args<T: RcParams>(args: &T) {
    setup_logging(args.debug());
    info!("starting");
    info!("params: {:#?}", args);
    if !args.validate() {
        error!("please fix arguments");
        std::process::exit(1);
    }
}

fn main() {
    let cli = Cli::parse();
    let result: Result<(), RcError> = match cli.command {
        Commands::Compare(args) => {
            check_args(&args);
            compare_main(args)
        }
        Commands::Greedy(args) => {
            check_args(&args);
            greedy_main(args)
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
