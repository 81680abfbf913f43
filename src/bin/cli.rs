//! BasaltKV CLI
//!
//! Interactive read-line prompt over an embedded engine. Unlike the server,
//! the CLI checks key existence before DEL so it can report missing keys.

use std::io::{self, BufRead, Write};

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use basaltkv::protocol::encoder;
use basaltkv::{Config, LsmEngine};

/// BasaltKV interactive CLI
#[derive(Parser, Debug)]
#[command(name = "basaltkv-cli")]
#[command(about = "Interactive prompt for the BasaltKV store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./data")]
    data_dir: String,
}

/// ANSI clear-screen plus cursor home
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[1;1H";

const PROMPT: &str = "User> ";

fn main() {
    // Keep the prompt clean: logs go to stderr, warnings and up by default
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder().data_dir(&args.data_dir).build();
    let engine = match LsmEngine::open(config) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    print!("{}", CLEAR_SCREEN);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{}", PROMPT);
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF (Ctrl + D)
            Ok(_) => {}
            Err(e) => {
                eprintln!("Failed to read input: {}", e);
                break;
            }
        }

        if line.trim().is_empty() {
            continue;
        }

        match run_line(&engine, &line) {
            Outcome::Print(bytes) => {
                let _ = stdout.write_all(&bytes);
                let _ = stdout.flush();
            }
            Outcome::Exit => break,
        }
    }

    // Dropping the engine joins the background workers
}

enum Outcome {
    Print(Vec<u8>),
    Exit,
}

/// Parse and execute one input line
fn run_line(engine: &LsmEngine, line: &str) -> Outcome {
    let tokens = tokenize(line);
    let Some(command) = tokens.first() else {
        return Outcome::Print(Vec::new());
    };

    match command.to_ascii_lowercase().as_str() {
        "set" => Outcome::Print(run_set(engine, &tokens)),
        "get" => Outcome::Print(run_get(engine, &tokens)),
        "del" => Outcome::Print(run_del(engine, &tokens)),
        "help" => Outcome::Print(help().into_bytes()),
        "clear" => Outcome::Print(CLEAR_SCREEN.as_bytes().to_vec()),
        "exit" => Outcome::Exit,
        other => Outcome::Print(encoder::error(&format!("unknown command '{}'", other))),
    }
}

fn run_set(engine: &LsmEngine, tokens: &[String]) -> Vec<u8> {
    if tokens.len() != 3 {
        return encoder::error("wrong number of arguments for 'set' command");
    }
    if tokens[1].is_empty() {
        return encoder::error("invalid key");
    }
    engine.put(tokens[1].clone().into_bytes(), tokens[2].clone().into_bytes());
    encoder::simple_string("OK")
}

fn run_get(engine: &LsmEngine, tokens: &[String]) -> Vec<u8> {
    if tokens.len() != 2 {
        return encoder::error("wrong number of arguments for 'get' command");
    }
    if tokens[1].is_empty() {
        return encoder::error("invalid key");
    }
    match engine.get(tokens[1].as_bytes()) {
        Ok(Some(mut value)) => {
            value.push(b'\n');
            value
        }
        Ok(None) => b"NULL\n".to_vec(),
        Err(e) => encoder::error(&e.to_string()),
    }
}

fn run_del(engine: &LsmEngine, tokens: &[String]) -> Vec<u8> {
    if tokens.len() != 2 {
        return encoder::error("wrong number of arguments for 'del' command");
    }
    if tokens[1].is_empty() {
        return encoder::error("invalid key");
    }
    match engine.get(tokens[1].as_bytes()) {
        Ok(Some(_)) => {
            engine.delete(tokens[1].clone().into_bytes());
            encoder::integer(1)
        }
        Ok(None) => format!("key \"{}\" not found\n", tokens[1]).into_bytes(),
        Err(e) => encoder::error(&e.to_string()),
    }
}

fn help() -> String {
    "Available commands:\n\
     SET <key> <value> - Set key to hold the string value\n\
     GET <key>         - Get the value of key\n\
     DEL <key>         - Delete a key\n\
     help              - Show this help menu\n\
     exit              - Exit the program\n\
     clear             - Clear the screen\n"
        .to_string()
}

/// Split on whitespace, grouping double-quoted runs into single tokens
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut token = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c.is_whitespace() && !in_quotes {
            if !token.is_empty() {
                tokens.push(std::mem::take(&mut token));
            }
        } else {
            token.push(c);
        }
    }
    if !token.is_empty() {
        tokens.push(token);
    }

    tokens
}
