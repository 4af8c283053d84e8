//! # Command Line Interface
//!
//! The subcommands are defined in `cli.rs`, and run by the `commands` module of the library.

use env_logger;
use log::error;
use cbmdrive::commands;
use cbmdrive::commands::CommandError;

mod cli;

fn main() -> Result<(),Box<dyn std::error::Error>>
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let main_cmd = cli::build_cli();
    let matches = main_cmd.clone().get_matches();

    if let Some(cmd) = matches.subcommand_matches("completions") {
        return commands::completions::generate(main_cmd,cmd);
    }

    match matches.subcommand() {
        Some(("mkdsk",cmd)) => commands::mkdsk::mkdsk(cmd),
        Some(("get",cmd)) => commands::get::get(cmd),
        Some(("put",cmd)) => commands::put::put(cmd),
        Some(("delete",cmd)) => commands::modify::delete(cmd),
        Some(("rename",cmd)) => commands::modify::rename(cmd),
        Some(("validate",cmd)) => commands::modify::validate(cmd),
        Some(("cmd",cmd)) => commands::modify::send(cmd),
        Some(("catalog",cmd)) => commands::stat::catalog(cmd),
        Some(("info",cmd)) => commands::stat::info(cmd),
        Some(("block",cmd)) => commands::get_img::get_block(cmd),
        _ => {
            error!("No subcommand was found, try `cbmdrive --help`");
            Err(Box::new(CommandError::InvalidCommand))
        }
    }
}
