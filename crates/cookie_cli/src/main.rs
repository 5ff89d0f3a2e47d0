use clap::{CommandFactory, Parser};
use cookie_cli::cli::{CONFIG_OVERRIDE_FLAG, Cli, Command, ResetTarget, collect_overrides};
use cookie_core::app::CookieJarApp;
use cookie_core::config::{Config, load_config_with_fallback, merge_overrides};
use cookie_core::error::AppError;
use cookie_core::model::{CookieOffer, Location, PurchasedCookie, Section, TaskItem, points_label};
use cookie_core::notifier::Topic;
use std::cell::Cell;
use std::io::{self, BufRead};
use std::rc::Rc;
use tabled::{Table, Tabled};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "COOKIEJAR_LOG";

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "#")]
    row: usize,
    title: String,
    points: String,
    id: String,
}

#[derive(Tabled)]
struct OfferRow {
    name: String,
    price: String,
}

#[derive(Tabled)]
struct CookieRow {
    name: String,
    purchased_at: String,
}

fn task_table(items: &[TaskItem]) -> String {
    let rows = items.iter().enumerate().map(|(row, item)| TaskRow {
        row,
        title: item.title.clone(),
        points: points_label(item.points),
        id: item.id.clone(),
    });
    Table::new(rows).to_string()
}

fn print_section(section: Section, items: &[TaskItem]) {
    println!("{}", capitalize(section.label()));
    if items.is_empty() {
        println!("  (none)");
    } else {
        println!("{}", task_table(items));
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn print_ledger_plain(app: &CookieJarApp) {
    print_section(Section::Active, &app.active_items());
    print_section(Section::Completed, &app.completed_items());
    println!("{}", app.balance_label());
}

fn print_offers_plain(offers: &[CookieOffer]) {
    let rows = offers.iter().map(|offer| OfferRow {
        name: offer.name.clone(),
        price: points_label(offer.price),
    });
    println!("{}", Table::new(rows));
}

fn print_cookies_plain(cookies: &[PurchasedCookie]) {
    if cookies.is_empty() {
        println!("You currently have no purchased cookies");
        return;
    }
    let rows = cookies.iter().map(|cookie| CookieRow {
        name: cookie.name.clone(),
        purchased_at: cookie.purchased_at.clone(),
    });
    println!("{}", Table::new(rows));
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let rendered =
        serde_json::to_string(value).map_err(|err| AppError::invalid_data(err.to_string()))?;
    println!("{rendered}");
    Ok(())
}

fn print_task_json(task: &TaskItem, balance: i64) {
    let json = serde_json::json!({
        "id": task.id,
        "title": task.title,
        "points": task.points,
        "completed": task.completed,
        "created_at": task.created_at,
        "balance": balance,
    });
    println!("{}", json);
}

fn row_index(row: i64) -> Result<usize, AppError> {
    usize::try_from(row).map_err(|_| AppError::out_of_range(format!("row {row} is negative")))
}

fn location(section: &str, row: i64) -> Result<Location, AppError> {
    let section = Section::parse(section)?;
    Location::from_index_path(section.index() as i64, row)
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_argument(message)
}

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        if in_quotes && ch == '\\' {
            escape = true;
            continue;
        }

        if ch == '"' {
            in_quotes = !in_quotes;
            continue;
        }

        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                args.push(std::mem::take(&mut current));
            }
            continue;
        }

        current.push(ch);
    }

    if in_quotes {
        return Err(AppError::invalid_argument("unterminated quote in command"));
    }

    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

fn load_config(raw_overrides: &[String]) -> Result<Config, AppError> {
    let loaded = load_config_with_fallback();
    if let Some(err) = loaded.error.as_ref() {
        eprintln!("WARNING: config ignored: {err}");
    }
    let overrides = collect_overrides(raw_overrides).map_err(AppError::invalid_argument)?;
    Ok(merge_overrides(&loaded.config, &overrides))
}

fn run_command(app: &mut CookieJarApp, command: Command, json: bool) -> Result<(), AppError> {
    match command {
        Command::Add { title, points } => {
            let title = match title {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::invalid_argument("title is required")),
            };
            let points = points.ok_or_else(|| AppError::invalid_argument("points are required"))?;

            let task = app.create_task(&title, points)?;
            if json {
                print_task_json(&task, app.balance());
            } else {
                println!("Added task: {} ({})", task.title, points_label(task.points));
            }
        }
        Command::List => {
            if json {
                print_json(&app.snapshot())?;
            } else {
                print_ledger_plain(app);
            }
        }
        Command::Toggle { section, row } => {
            let task = app.toggle_task(location(&section, row)?)?;
            if json {
                print_task_json(&task, app.balance());
            } else if task.completed {
                println!("Completed task: {} (+{})", task.title, points_label(task.points));
            } else {
                println!("Reopened task: {} (-{})", task.title, points_label(task.points));
            }
        }
        Command::Delete { section, row } => {
            let task = app.delete_task(location(&section, row)?)?;
            if json {
                print_task_json(&task, app.balance());
            } else {
                println!("Deleted task: {} ({})", task.title, task.id);
            }
        }
        Command::Move { section, from, to } => {
            let section = Section::parse(&section)?;
            app.reorder_tasks(section, row_index(from)?, row_index(to)?)?;
            if json {
                print_json(&app.snapshot())?;
            } else {
                print_section(section, &app.items(section));
            }
        }
        Command::Points => {
            if json {
                println!("{}", serde_json::json!({ "balance": app.balance() }));
            } else {
                println!("{}", app.balance_label());
            }
        }
        Command::Shop => {
            let offers = app.catalog();
            if json {
                print_json(&offers)?;
            } else {
                print_offers_plain(&offers);
            }
        }
        Command::Buy { name } => {
            let cookie = app.buy_cookie(&name)?;
            if json {
                print_json(&cookie)?;
            } else {
                println!("Bought cookie: {} ({})", cookie.name, app.balance_label());
            }
        }
        Command::Cookies => {
            let cookies = app.cookies();
            if json {
                print_json(&cookies)?;
            } else {
                print_cookies_plain(&cookies);
            }
        }
        Command::Reset { target } => {
            match target {
                ResetTarget::Tasks => app.reset_tasks()?,
                ResetTarget::Points => app.reset_points()?,
                ResetTarget::Cookies => app.reset_cookies()?,
                ResetTarget::All => app.reset_all()?,
            }
            if json {
                print_json(&app.snapshot())?;
            } else {
                println!("Reset {}", reset_label(target));
            }
        }
    }

    Ok(())
}

fn reset_label(target: ResetTarget) -> &'static str {
    match target {
        ResetTarget::Tasks => "to-do list",
        ResetTarget::Points => "points",
        ResetTarget::Cookies => "cookies purchased",
        ResetTarget::All => "all data",
    }
}

/// Flags set by change notifications and drained after each REPL command.
#[derive(Default)]
struct DirtyFlags {
    ledger: Rc<Cell<bool>>,
    points: Rc<Cell<bool>>,
    cookies: Rc<Cell<bool>>,
}

fn run_interactive(raw_overrides: &[String]) -> Result<(), AppError> {
    let config = load_config(raw_overrides)?;
    let mut app = CookieJarApp::open_default(config)?;

    let dirty = DirtyFlags::default();
    let _subscriptions = [
        (Topic::LedgerChanged, Rc::clone(&dirty.ledger)),
        (Topic::PointsChanged, Rc::clone(&dirty.points)),
        (Topic::CookiesChanged, Rc::clone(&dirty.cookies)),
    ]
    .into_iter()
    .map(|(topic, flag)| app.notifier().subscribe_scoped(topic, move || flag.set(true)))
    .collect::<Vec<_>>();

    let mut input = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();

    loop {
        input.clear();
        let bytes = stdin_lock
            .read_line(&mut input)
            .map_err(|err| AppError::persistence(err.to_string()))?;

        if bytes == 0 {
            break;
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let args = match split_command_line(line) {
            Ok(args) => args,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                continue;
            }
        };

        if args.is_empty() {
            continue;
        }

        debug!(command = %args[0], "interactive command");
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("cookie_jar".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };

        if !cli.config_override.is_empty() {
            eprintln!("WARNING: {CONFIG_OVERRIDE_FLAG} only applies at startup");
        }

        if let Err(err) = run_command(&mut app, cli.command, cli.json) {
            eprintln!("ERROR: {}", err);
        }

        report_changes(&app, &dirty, cli.json);
    }

    Ok(())
}

fn report_changes(app: &CookieJarApp, dirty: &DirtyFlags, json: bool) {
    let ledger = dirty.ledger.replace(false);
    let points = dirty.points.replace(false);
    let cookies = dirty.cookies.replace(false);
    if json {
        return;
    }

    if ledger {
        println!(
            "{} active, {} completed",
            app.active_items().len(),
            app.completed_items().len()
        );
    }
    if points {
        println!("{}", app.balance_label());
    }
    if cookies {
        println!("{} cookies in the jar", app.cookies().len());
    }
}

fn run_once(cli: Cli) -> Result<(), AppError> {
    let config = load_config(&cli.config_override)?;
    let mut app = CookieJarApp::open_default(config)?;
    run_command(&mut app, cli.command, cli.json)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        if let Err(err) = run_interactive(&[]) {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) {
                err.exit();
            }
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_once(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
