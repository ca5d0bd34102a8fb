mod config;
mod liveness;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use log::{info, warn};

use slides::{Template, check_document, render_document};

use crate::config::{FileConfig, RenderConfig, load_config};

const SUBCOMMANDS: &[&str] = &["render", "alive", "help"];

#[derive(Parser)]
#[command(name = "slides", version, about = "Render Markdown into HTML slides")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log what is being rendered
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render the slides document into the page template
    Render(RenderArgs),

    /// Report whether a person is still alive, according to Wikipedia
    Alive(AliveArgs),
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Markdown document [default: slides.md]
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Page template [default: index.template.html]
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Destination page [default: index.html]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Template text replaced by the slides [default: <!-- SLIDES -->]
    #[arg(long)]
    placeholder: Option<String>,

    /// Configuration file [default: slides.toml, if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Check executable blocks for syntax errors, don't render
    #[arg(long)]
    check: bool,

    /// Print the page instead of writing it
    #[arg(long)]
    stdout: bool,
}

#[derive(clap::Args)]
struct AliveArgs {
    /// The name of the person
    name: String,
}

fn main() {
    let cli = Cli::parse_from(with_default_subcommand(std::env::args().collect()));

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let result = match cli.command {
        Command::Render(args) => do_render(args, cli.no_color),
        Command::Alive(args) => do_alive(args),
    };

    if let Err(error) = result {
        eprintln!("error: {:#}", error);
        process::exit(1);
    }
}

/// A bare `slides` (or `slides --input talk.md`) means `slides render ...`.
fn with_default_subcommand(mut args: Vec<String>) -> Vec<String> {
    let asks_for_help = args
        .iter()
        .skip(1)
        .any(|a| matches!(a.as_str(), "-h" | "--help" | "-V" | "--version"));
    let has_subcommand = args
        .iter()
        .skip(1)
        .find(|a| !a.starts_with('-'))
        .is_some_and(|a| SUBCOMMANDS.contains(&a.as_str()));

    if !has_subcommand && !(asks_for_help && args.len() == 2) {
        args.insert(1.min(args.len()), "render".to_string());
    }
    args
}

fn do_render(args: RenderArgs, no_color: bool) -> Result<()> {
    let file = load_config(args.config.as_deref())?;
    let settings = RenderConfig::resolve(
        file,
        FileConfig {
            input: args.input,
            template: args.template,
            output: args.output,
            placeholder: args.placeholder,
        },
    );

    let source = fs::read_to_string(&settings.input)
        .with_context(|| format!("cannot read '{}'", settings.input.display()))?;

    if args.check {
        return do_check(&settings.input, source, no_color);
    }

    let skeleton = fs::read_to_string(&settings.template)
        .with_context(|| format!("cannot read '{}'", settings.template.display()))?;
    let template = Template::new(skeleton).with_placeholder(settings.placeholder.as_str());
    if !template.has_placeholder() {
        warn!(
            "'{}' does not contain '{}', the slides will not appear",
            settings.template.display(),
            template.placeholder()
        );
    }

    let page = format!("{}\n", template.compose(&render_document(&source)));

    if args.stdout {
        print!("{}", page);
    } else {
        fs::write(&settings.output, page)
            .with_context(|| format!("cannot write '{}'", settings.output.display()))?;
        info!(
            "rendered '{}' into '{}'",
            settings.input.display(),
            settings.output.display()
        );
    }
    Ok(())
}

fn do_check(path: &Path, source: String, no_color: bool) -> Result<()> {
    let errors = check_document(&source);
    if errors.is_empty() {
        eprintln!("ok: {} has no syntax errors", path.display());
        return Ok(());
    }

    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(path.display().to_string(), source);

    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    for error in &errors {
        let diagnostic = error.to_diagnostic(file_id, 0);
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
    }

    bail!(
        "{} syntax error{} in '{}'",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" },
        path.display()
    )
}

fn do_alive(args: AliveArgs) -> Result<()> {
    let html = liveness::fetch_article(&args.name)?;
    println!("{}", liveness::report(&args.name, &html));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_renders() {
        assert_eq!(with_default_subcommand(args(&["slides"])), args(&["slides", "render"]));
    }

    #[test]
    fn flags_without_subcommand_render() {
        assert_eq!(
            with_default_subcommand(args(&["slides", "--input", "talk.md", "--stdout"])),
            args(&["slides", "render", "--input", "talk.md", "--stdout"])
        );
    }

    #[test]
    fn explicit_subcommands_are_kept() {
        assert_eq!(
            with_default_subcommand(args(&["slides", "alive", "Ada Lovelace"])),
            args(&["slides", "alive", "Ada Lovelace"])
        );
        assert_eq!(
            with_default_subcommand(args(&["slides", "--help"])),
            args(&["slides", "--help"])
        );
    }

    #[test]
    fn arguments_parse() {
        let cli = Cli::parse_from(with_default_subcommand(args(&[
            "slides", "--check", "-i", "deck.md",
        ])));
        let Command::Render(render) = cli.command else {
            panic!("expected render");
        };
        assert!(render.check);
        assert_eq!(render.input, Some(PathBuf::from("deck.md")));
    }
}
