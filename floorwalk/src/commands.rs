use crate::CLAP_STYLING;
use clap::{arg, command};
use floorwalk_core::config::DEFAULT_EXPORT_FILE;
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("floorwalk")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("floorwalk")
        .about("Crawl a store floor directory into a deduplicated brand table")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Only log warnings and errors")
                .required(false)
                .global(true)
                .conflicts_with("verbose"),
        )
        .arg(
            arg!(-v --"verbose" "Log per-page and per-field detail")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Walk every floor menu of the directory, then export and upsert the \
                collected brands.",
                )
                .arg(
                    arg!(-p --"profile" <PROFILE>)
                        .required(false)
                        .help("Built-in profile (t1, t2) or path to a TOML profile")
                        .default_value("t1"),
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("Start URL (default: the profile's directory page)")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help(format!(
                            "Export file (default: the profile's export file, {})",
                            DEFAULT_EXPORT_FILE
                        ))
                        .conflicts_with("no-export"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Export format (default: from the file extension)")
                        .value_parser(["csv", "json"]),
                )
                .arg(
                    arg!(--"no-export")
                        .required(false)
                        .help("Do not write an export file")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"sqlite" <PATH>)
                        .required(false)
                        .help(
                            "Upsert into a local SQLite database instead of Supabase \
                        (SUPABASE_URL / SUPABASE_KEY)",
                        ),
                )
                .arg(
                    arg!(--"rows" <N>)
                        .required(false)
                        .help("Rows of the brand table to print (default: all)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"headed")
                        .required(false)
                        .help("Show the browser window")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("profile")
                .about("Inspect site profiles")
                .subcommand_required(true)
                .subcommand(
                    command!("show")
                        .about("Print the resolved profile as TOML")
                        .arg(
                            arg!(-p --"profile" <PROFILE>)
                                .required(false)
                                .help("Built-in profile (t1, t2) or path to a TOML profile")
                                .default_value("t1"),
                        ),
                )
                .subcommand(command!("list").about("List the built-in profiles")),
        )
}
