use colored::Colorize;
use philhop::commands::command_argument_builder;
use philhop::handlers::{handle_hop, handle_init, handle_sample, handle_stats, init_logging};
use philhop_core::print_banner;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    init_logging(chosen_command.get_flag("verbose"));

    let result = match chosen_command.subcommand() {
        // No subcommand provided, just show the banner
        None => return,
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("hop", primary_command)) => handle_hop(primary_command).await,
        Some(("sample", primary_command)) => handle_sample(primary_command).await,
        Some(("stats", primary_command)) => handle_stats(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
