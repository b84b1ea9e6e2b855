use catalog_core::types::{Dimension, Language, Scope, SortKey, WorkStatus};
use catalog_core::ShareableParams;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Query(String),
    Toggle(Dimension, String),
    Author(Option<String>),
    Work(Option<String>),
    Status(Option<WorkStatus>),
    Collection(Option<String>),
    Years(Option<i32>, Option<i32>),
    Scope(Scope),
    Sort(SortKey),
    Page(u32),
    Expand(String),
    Collapse(String),
    Language(Language),
    Reset,
    Link,
    Open(ShareableParams),
    Retry,
    Quit,
}

fn rest(parts: &[&str]) -> Option<String> {
    let joined = parts.join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn year(token: Option<&&str>) -> Result<Option<i32>, String> {
    match token.copied() {
        None | Some("-") => Ok(None),
        Some(t) => t.parse().map(Some).map_err(|_| format!("not a year: {t}")),
    }
}

fn required(parts: &[&str], usage: &str) -> Result<String, String> {
    rest(parts).ok_or_else(|| format!("usage: {usage}"))
}

fn facet_code(parts: &[&str], usage: &str) -> Result<String, String> {
    let code = required(parts, usage)?;
    if code.contains(',') {
        return Err(format!("facet codes cannot contain a comma: {code}"));
    }
    Ok(code)
}

/// Parses one line of REPL input. Anything that is not a `/command` is the
/// free-text query.
pub fn parse(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let Some(command) = input.strip_prefix('/') else {
        return Ok(Command::Query(input.to_string()));
    };
    let parts: Vec<&str> = command.split_whitespace().collect();
    let (name, args) = match parts.split_first() {
        Some((name, args)) => (*name, args),
        None => return Err("empty command".into()),
    };
    let command = match name {
        "help" | "h" => Command::Help,
        "genre" => Command::Toggle(Dimension::Genre, facet_code(args, "/genre <code>")?),
        "type" => Command::Toggle(Dimension::Type, facet_code(args, "/type <code>")?),
        "tag" => Command::Toggle(Dimension::Tags, facet_code(args, "/tag <code>")?),
        "author" => Command::Author(rest(args)),
        "work" => Command::Work(rest(args)),
        "status" => match args.first() {
            None => Command::Status(None),
            Some(s) => Command::Status(Some(s.parse().map_err(|_| format!("unknown status: {s}"))?)),
        },
        "collection" => Command::Collection(rest(args)),
        "years" => Command::Years(year(args.first())?, year(args.get(1))?),
        "scope" => {
            let s = required(args, "/scope <all|original|annotation>")?;
            Command::Scope(s.parse().map_err(|_| format!("unknown scope: {s}"))?)
        }
        "sort" => {
            let s = required(args, "/sort <relevance|year_asc|year_desc|alphabetical|recently_modified>")?;
            Command::Sort(s.parse().map_err(|_| format!("unknown sort: {s}"))?)
        }
        "page" => {
            let s = required(args, "/page <n>")?;
            Command::Page(s.parse().map_err(|_| format!("not a page number: {s}"))?)
        }
        "expand" => Command::Expand(required(args, "/expand <work id>")?),
        "collapse" => Command::Collapse(required(args, "/collapse <work id>")?),
        "lang" => {
            let s = required(args, "/lang <et|en>")?;
            Command::Language(s.parse().map_err(|_| format!("unknown language: {s}"))?)
        }
        "reset" => Command::Reset,
        "link" => Command::Link,
        "open" => Command::Open(ShareableParams::from_query_string(&required(args, "/open <query string>")?)),
        "retry" => Command::Retry,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: /{other} (try /help)")),
    };
    Ok(command)
}

pub fn help() -> &'static str {
    "Commands:
  <text>                 search for text
  /genre <code>          toggle a genre (also /type, /tag)
  /author [name]         filter by author, empty clears
  /work [id]             restrict to one work, empty clears
  /status [state]        raw, in_progress or done, empty clears
  /collection [id]       restrict to a collection and its children
  /years <start> <end>   year range, '-' clears a bound
  /scope <scope>         all, original or annotation
  /sort <key>            relevance, year_asc, year_desc, alphabetical, recently_modified
  /page <n>              go to a result page
  /expand <work id>      show more hits of one work
  /collapse <work id>    hide them again
  /lang <et|en>          display language
  /reset                 clear all filters
  /link                  print the shareable link
  /open <query string>   open a shared link
  /retry                 repeat the last failed search
  /quit                  exit"
}
