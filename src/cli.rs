// src/cli.rs

use std::env;
use std::io::Write as _;
use std::io::{BufRead, stdin, stdout};
use std::path::PathBuf;

use color_eyre::eyre::{Result, bail, eyre};

use crate::config::options::{EnhanceOptions, parse_genre_votes};
use crate::enhance;
use crate::login::{Credentials, FileCaptchaSolver};
use crate::progress::ConsoleProgress;

struct CliArgs {
    options: EnhanceOptions,
    email: Option<String>,
    password: Option<String>,
}

pub fn run() -> Result<()> {
    env_logger::init();

    let args = parse_cli(env::args().skip(1))?;
    if args.options.csv_path.as_os_str().is_empty() {
        eprintln!("You need to provide the path to the export file!");
        eprintln!();
        eprintln!("{}", include_str!("cli_help.txt"));
        return Ok(());
    }
    let options = args.options.clone();

    let credentials = Credentials {
        email: match args.email {
            Some(email) => email,
            None => prompt("Goodreads e-mail: ")?,
        },
        password: match args.password {
            Some(password) => password,
            None => prompt("Goodreads password: ")?,
        },
    };

    enhance::run(
        &options,
        &credentials,
        &mut FileCaptchaSolver,
        &mut ConsoleProgress,
    )?;
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    stdout().flush()?;
    let mut line = String::new();
    stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn parse_cli(mut args: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut out = CliArgs {
        options: EnhanceOptions::default(),
        email: None,
        password: None,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--csv" => {
                let v = args.next().ok_or_else(|| eyre!("Missing value for --csv"))?;
                out.options.csv_path = PathBuf::from(v);
            }
            "-u" | "--update" => {
                let v = args.next().ok_or_else(|| eyre!("Missing value for --update"))?;
                out.options.update_path = Some(PathBuf::from(v));
            }
            "-f" | "--force" => out.options.force = true,
            "--ignore-errors" => out.options.ignore_errors = true,
            "-g" | "--genre-votes" => {
                let v = args
                    .next()
                    .ok_or_else(|| eyre!("Missing value for --genre-votes"))?;
                let votes = parse_genre_votes(&v).map_err(|msg| eyre!(msg))?;
                out.options.set_genre_votes(votes);
            }
            "-e" | "--email" => {
                out.email = Some(args.next().ok_or_else(|| eyre!("Missing value for --email"))?);
            }
            "-p" | "--password" => {
                out.password =
                    Some(args.next().ok_or_else(|| eyre!("Missing value for --password"))?);
            }
            "-h" | "--help" => {
                eprintln!("{}", include_str!("cli_help.txt"));
                std::process::exit(0);
            }
            other => bail!("Unknown arg: {other}"),
        }
    }

    Ok(out)
}
