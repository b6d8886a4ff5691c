use crate::CLAP_STYLING;
use clap::{Arg, arg, command};
use philhop_core::config::TARGET_SENSE;
use philhop_core::Strategy;
use philhop_wiki::client::DEFAULT_BASE_URL;
use url::Url;

pub const DEFAULT_DB_PATH: &str = "~/.config/philhop/philhop.db";

/// Value parser for `-s/--strategy`.
pub fn parse_strategy(s: &str) -> Result<Strategy, String> {
    Strategy::from_str(s).ok_or_else(|| {
        format!(
            "unknown strategy '{}' (expected random, nth-link[:N], wordnet, word2vec or bert)",
            s
        )
    })
}

fn db_arg() -> Arg {
    arg!(--"db" <PATH>)
        .required(false)
        .help("Path to the philhop database")
        .default_value(DEFAULT_DB_PATH)
}

/// Options shared by every command that runs traversals.
fn traversal_args() -> Vec<Arg> {
    vec![
        db_arg(),
        arg!(--"csv" <PATH>)
            .required(false)
            .help("Append one row per recorded traversal to this CSV file")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
        arg!(--"max-hops" <N>)
            .required(false)
            .help("Hop budget per traversal")
            .value_parser(clap::value_parser!(usize))
            .default_value("100"),
        arg!(--"links" <N>)
            .required(false)
            .help("Number of leading links considered on each page")
            .value_parser(clap::value_parser!(usize))
            .default_value("20"),
        arg!(--"strict-limit")
            .required(false)
            .help("Discard the partial path when the hop budget runs out")
            .action(clap::ArgAction::SetTrue),
        arg!(--"graph" <PATH>)
            .required(false)
            .help("Lexical graph TSV used by the wordnet strategy")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
        arg!(--"vectors" <PATH>)
            .required(false)
            .help("Word vectors in word2vec text format, used by the word2vec strategy")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
        arg!(--"backend" <URL>)
            .required(false)
            .help("Base URL of the similarity service used by the bert strategy")
            .value_parser(clap::value_parser!(Url)),
        arg!(--"target-sense" <SENSE>)
            .required(false)
            .help("Lexical graph sense of the target word")
            .default_value(TARGET_SENSE),
        arg!(--"legacy-oov")
            .required(false)
            .help("Count out-of-vocabulary words as zero instead of skipping them")
            .action(clap::ArgAction::SetTrue),
        arg!(--"seed" <SEED>)
            .required(false)
            .help("Seed for the random strategy")
            .value_parser(clap::value_parser!(u64)),
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Request timeout in seconds")
            .value_parser(clap::value_parser!(u64))
            .default_value("10"),
        arg!(--"deadline" <SECONDS>)
            .required(false)
            .help("Give up on a traversal after this many seconds")
            .value_parser(clap::value_parser!(u64)),
        arg!(--"wiki-url" <URL>)
            .required(false)
            .help("Base URL of the wiki to traverse")
            .value_parser(clap::value_parser!(Url))
            .default_value(DEFAULT_BASE_URL),
    ]
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("philhop")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("philhop")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Log every hop and fetch")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the philhop database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the philhop database")
                        .default_value("~/.config/philhop/"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help(
                            "Forces the overwriting of any existing database at the specified \
                        location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("hop")
                .about("Hop from one article towards Philosophy and print the path")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("Start article, as a URL, a /wiki/ path or a title"),
                )
                .arg(
                    arg!(-s --"strategy" <STRATEGY>)
                        .required(false)
                        .help("Link selection strategy: random, nth-link[:N], wordnet, word2vec, bert")
                        .value_parser(parse_strategy)
                        .default_value("nth-link:1"),
                )
                .args(traversal_args()),
        )
        .subcommand(
            command!("sample")
                .about(
                    "Run every strategy from a batch of random articles and record the \
                outcomes.",
                )
                .arg(
                    arg!(-n --"count" <N>)
                        .required(false)
                        .help("Random start pages per round")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("20"),
                )
                .arg(
                    arg!(-s --"strategy" <STRATEGY>)
                        .required(false)
                        .help("Strategy to run, may be repeated")
                        .value_parser(parse_strategy)
                        .action(clap::ArgAction::Append)
                        .default_value("random"),
                )
                .arg(
                    arg!(--"rounds" <N>)
                        .required(false)
                        .help("Number of sampling rounds")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    arg!(-c --"concurrency" <N>)
                        .required(false)
                        .help("Traversals running at the same time")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("4"),
                )
                .args(traversal_args()),
        )
        .subcommand(
            command!("stats")
                .about("Report convergence statistics per strategy")
                .arg(db_arg())
                .arg(
                    arg!(-s --"strategy" <STRATEGY>)
                        .required(false)
                        .help("Only report this strategy")
                        .value_parser(parse_strategy),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
}
