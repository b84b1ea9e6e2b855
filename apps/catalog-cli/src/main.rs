use std::env;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::Instant;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use catalog_backend::HttpBackend;
use catalog_controller::{LocalStore, SearchController};
use catalog_core::config::{Config, Settings};
use catalog_core::ShareableParams;

mod commands;
mod render;

use commands::Command;

type Controller = SearchController<HttpBackend>;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.first().map_or(true, |a| a.starts_with("--")) {
        return ("interactive".to_string(), args);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

/// Splits `--params <query string>` out of the remaining arguments.
fn take_params(args: Vec<String>) -> (Vec<String>, ShareableParams) {
    let mut rest = Vec::new();
    let mut params = ShareableParams::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--params" {
            if let Some(qs) = iter.next() {
                params = ShareableParams::from_query_string(&qs);
            }
        } else {
            rest.push(arg);
        }
    }
    (rest, params)
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()));
    pb.set_message("searching...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn settle(controller: &mut Controller) {
    let pb = spinner();
    controller.settle().await;
    pb.finish_and_clear();
}

fn show(controller: &Controller) {
    render::facets(controller);
    println!();
    render::results(controller);
}

fn build(settings: &Settings, initial: &ShareableParams) -> anyhow::Result<Controller> {
    let backend = Arc::new(HttpBackend::new(&settings.backend)?);
    let store = LocalStore::open(settings.session.state_path());
    Ok(SearchController::new(backend, settings, store, initial))
}

/// Applies one REPL command. Returns false on /quit.
fn apply(controller: &mut Controller, command: Command) -> bool {
    let now = Instant::now();
    match command {
        Command::Help => println!("{}", commands::help()),
        Command::Query(text) => controller.edit_query(text, now),
        Command::Toggle(dimension, code) => {
            controller.toggle_facet(dimension, &code, now);
        }
        Command::Author(author) => {
            controller.set_author(author, now);
        }
        Command::Work(work) => {
            controller.set_work(work, now);
        }
        Command::Status(status) => {
            controller.set_status(status, now);
        }
        Command::Collection(id) => {
            controller.set_collection(id, now);
        }
        Command::Years(start, end) => {
            controller.edit_year_start(start, now);
            controller.edit_year_end(end, now);
        }
        Command::Scope(scope) => {
            controller.set_scope(scope, now);
        }
        Command::Sort(sort) => {
            controller.set_sort(sort, now);
        }
        Command::Page(page) => {
            controller.set_page(page, now);
        }
        Command::Expand(work_id) => {
            if !controller.expand(&work_id) {
                println!("Nothing to expand for {work_id}.");
            }
        }
        Command::Collapse(work_id) => {
            controller.collapse(&work_id, 0);
        }
        Command::Language(language) => {
            controller.set_language(language, now);
        }
        Command::Reset => {
            controller.reset_filters(now);
        }
        Command::Link => println!("?{}", controller.share_query()),
        Command::Open(params) => {
            controller.load_params(&params, now);
        }
        Command::Retry => {
            controller.retry();
        }
        Command::Quit => return false,
    }
    true
}

async fn interactive(settings: &Settings, initial: ShareableParams) -> anyhow::Result<()> {
    println!("Catalogue search. /help lists the commands.");
    let mut controller = build(settings, &initial)?;
    settle(&mut controller).await;
    show(&controller);

    loop {
        print!("\nsearch> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        if input.trim().is_empty() {
            continue;
        }
        let command = match commands::parse(&input) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        debug!(?command, "repl command");
        let quiet = matches!(command, Command::Help | Command::Link);
        if !apply(&mut controller, command) {
            break;
        }
        if quiet {
            continue;
        }
        settle(&mut controller).await;
        if controller.take_scroll() == Some(0) {
            println!("\n---");
        }
        show(&controller);
    }
    controller.detach();
    Ok(())
}

async fn one_shot(settings: &Settings, query: String, mut initial: ShareableParams) -> anyhow::Result<()> {
    if !query.is_empty() {
        initial.insert("q", query);
    }
    let mut controller = build(settings, &initial)?;
    settle(&mut controller).await;
    show(&controller);
    if let Some(failure) = controller.error() {
        warn!(request_id = %failure.request_id, "one-shot search failed");
        anyhow::bail!("search failed: {}", failure.message);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = Settings::from_config(&config)?;

    let (cmd, args) = parse_args();
    let (rest, params) = take_params(args);
    match cmd.as_str() {
        "interactive" | "i" => interactive(&settings, params).await,
        "search" => one_shot(&settings, rest.join(" "), params).await,
        _ => {
            eprintln!("Usage: catalog-cli [interactive|search <query>] [--params <query string>]");
            std::process::exit(1);
        }
    }
}
