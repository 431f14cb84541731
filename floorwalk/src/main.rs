use colored::Colorize;
use floorwalk::commands::command_argument_builder;
use floorwalk::handlers::{handle_crawl, handle_profile_list, handle_profile_show, init_tracing};

#[tokio::main]
async fn main() {
    // Supabase credentials may live in a .env next to the binary's working dir
    dotenvy::dotenv().ok();

    let chosen_command = command_argument_builder().get_matches();
    init_tracing(
        chosen_command.get_flag("quiet"),
        chosen_command.get_flag("verbose"),
    );

    let outcome = match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        Some(("profile", primary_command)) => match primary_command.subcommand() {
            Some(("show", secondary_command)) => handle_profile_show(secondary_command).map(|_| 0),
            Some(("list", _)) => {
                handle_profile_list();
                Ok(0)
            }
            _ => unreachable!("clap should ensure we don't get here"),
        },
        _ => unreachable!("clap should ensure we don't get here"),
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}
