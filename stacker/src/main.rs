//! # stacker
//!
//! A CLI that rewrites HTML documents so their data tables stack into
//! label/value pairs on narrow viewports.
//!
//! ## Overview
//!
//! stacker is built on top of stackerlib. It reads a document, inserts a
//! stacked rendition after every selected `<table>`, and writes the document
//! back out. Which rendition is visible is left to CSS: either a media query
//! injected with `--with-style`, or the `enabled` classes computed for a
//! given `--viewport-width`.
//!
//! ## Usage
//!
//! ```bash
//! # Stack every table, reading stdin and writing stdout
//! stacker < page.html > page.stacked.html
//!
//! # Only the pricing table, with a custom class and a narrower breakpoint
//! stacker page.html --id prices --custom-class compact --max-width 40em
//!
//! # Global defaults as JSON, and an embedded responsive stylesheet
//! stacker page.html --defaults '{"preserveClasses": true}' --with-style
//!
//! # Resolve visibility for a 375px wide viewport
//! stacker page.html --viewport-width 375
//! ```

use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use console::Style;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use stackerlib::{
    dom, style, Document, Handle, MaxWidth, OptionsOverride, Stacker, StackerOptions, Viewport,
};

/// Build the clap Command structure
fn build_command() -> Command {
    Command::new("stacker")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Arthur Debert")
        .about("Stack HTML data tables into label/value pairs for narrow viewports")
        .arg(
            Arg::new("input")
                .help("HTML file to read (defaults to stdin, or use '-')"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Write the result to this file instead of stdout"),
        )
        .arg(
            Arg::new("id")
                .long("id")
                .action(ArgAction::Append)
                .help("Only stack the table with this id (can be specified multiple times)"),
        )
        .arg(
            Arg::new("custom-class")
                .short('c')
                .long("custom-class")
                .help("Extra class for the stacked tables"),
        )
        .arg(
            Arg::new("preserve-classes")
                .short('p')
                .long("preserve-classes")
                .action(ArgAction::SetTrue)
                .help("Copy table, caption and cell classes onto the stacked markup"),
        )
        .arg(
            Arg::new("max-width")
                .short('w')
                .long("max-width")
                .value_parser(|s: &str| s.parse::<MaxWidth>().map_err(|e| e.to_string()))
                .help("Viewport width at or below which tables stack (e.g. 740px, 40em, none)"),
        )
        .arg(
            Arg::new("defaults")
                .long("defaults")
                .help("Default options as JSON, e.g. '{\"customClass\": \"compact\"}'"),
        )
        .arg(
            Arg::new("viewport-width")
                .long("viewport-width")
                .value_parser(clap::value_parser!(f32))
                .help("Mark the visible table for a viewport this many pixels wide"),
        )
        .arg(
            Arg::new("with-style")
                .long("with-style")
                .action(ArgAction::SetTrue)
                .help("Inject the companion stylesheet into <head>"),
        )
        .arg(
            Arg::new("summary")
                .short('s')
                .long("summary")
                .action(ArgAction::SetTrue)
                .help("Print a summary of stacked tables to stderr"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Increase log verbosity (-v, -vv)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose")
                .help("Disable logging"),
        )
}

/// Set up stderr logging from -v/-q
fn init_logging(matches: &ArgMatches) {
    let level = if matches.get_flag("quiet") {
        LevelFilter::Off
    } else {
        match matches.get_count("verbose") {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let config = ConfigBuilder::new().set_time_level(LevelFilter::Off).build();
    // A logger may already be installed when embedded; keep that one.
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}

/// Options given directly on the command line
fn extract_overrides(matches: &ArgMatches) -> OptionsOverride {
    let mut overrides = OptionsOverride::new();
    if let Some(class) = matches.get_one::<String>("custom-class") {
        overrides = overrides.custom_class(class.clone());
    }
    if matches.get_flag("preserve-classes") {
        overrides = overrides.preserve_classes(true);
    }
    if let Some(max_width) = matches.get_one::<MaxWidth>("max-width") {
        overrides = overrides.max_width(*max_width);
    }
    overrides
}

fn read_document(matches: &ArgMatches) -> Result<Document, anyhow::Error> {
    match matches.get_one::<String>("input").map(|s| s.as_str()) {
        None | Some("-") => {
            Document::read_from(&mut io::stdin().lock()).context("failed to read stdin")
        }
        Some(path) => {
            let mut file =
                fs::File::open(path).with_context(|| format!("failed to open '{}'", path))?;
            Document::read_from(&mut file).with_context(|| format!("failed to read '{}'", path))
        }
    }
}

/// Tables to stack: all of them, or those matching --id
fn select_targets(doc: &Document, matches: &ArgMatches) -> Vec<Handle> {
    let ids: Vec<&String> = matches
        .get_many::<String>("id")
        .map(|v| v.collect())
        .unwrap_or_default();

    let tables = doc.tables();
    if ids.is_empty() {
        return tables;
    }

    for id in &ids {
        if doc.find_by_id(id).filter(dom::is_table).is_none() {
            log::warn!("no table with id '{}'", id);
        }
    }

    tables
        .into_iter()
        .filter(|table| {
            dom::attr(table, "id")
                .map(|id| ids.iter().any(|wanted| **wanted == id))
                .unwrap_or(false)
        })
        .collect()
}

fn print_summary(stacker: &Stacker) {
    let bold = Style::new().bold();
    let dim = Style::new().dim();

    eprintln!(
        "{} {} table(s)",
        bold.apply_to("Stacked"),
        stacker.len()
    );
    for instance in stacker.instances() {
        let name = dom::attr(instance.source(), "id")
            .map(|id| format!("#{}", id))
            .unwrap_or_else(|| "(no id)".to_string());
        let state = if instance.is_enabled() {
            "stacked"
        } else {
            "original"
        };
        eprintln!(
            "  {:<24} {:>4} rows  {}",
            name,
            instance.row_count(),
            dim.apply_to(format!(
                "max-width {}, showing {}",
                instance.options().max_width,
                state
            ))
        );
    }
}

fn run(matches: &ArgMatches) -> Result<(), anyhow::Error> {
    let doc = read_document(matches)?;
    let overrides = extract_overrides(matches);

    let mut stacker = Stacker::with_defaults(StackerOptions::default());
    if let Some(json) = matches.get_one::<String>("defaults") {
        let defaults = OptionsOverride::from_json(json).context("invalid --defaults")?;
        stacker.set_defaults(&defaults);
    }

    let viewport = matches
        .get_one::<f32>("viewport-width")
        .map(|width| Viewport::new(*width));
    if let Some(viewport) = &viewport {
        stacker = stacker.observe(viewport.clone());
    }

    let targets = select_targets(&doc, matches);
    let built = stacker.build(&targets, (!overrides.is_empty()).then_some(&overrides));
    info!("stacked {} of {} table(s)", built.len(), targets.len());

    if matches.get_flag("with-style") {
        let css = if viewport.is_some() {
            style::stylesheet()
        } else {
            let max_width = stacker.defaults().merged(&overrides).max_width;
            style::instance_stylesheet(&stacker, &max_width)
        };
        if !style::inject(&doc, &css) {
            log::warn!("document has no <head>; stylesheet not injected");
        }
    }

    let html = doc.to_html();
    match matches.get_one::<String>("output") {
        Some(path) => {
            fs::write(path, html).with_context(|| format!("failed to write '{}'", path))?
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(html.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    if matches.get_flag("summary") {
        print_summary(&stacker);
    }

    Ok(())
}

fn main() -> ExitCode {
    let matches = build_command().get_matches();
    init_logging(&matches);

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
