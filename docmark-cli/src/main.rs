// Command-line interface for docmark
//
// This binary converts annotated Markdown manuscripts to Word documents and back.
// The conversion itself lives in the docmark-babel crate; this crate only deals with files,
// arguments, configuration and logging.
//
// The direction is implied by the source format: markdown converts to docx, docx converts to
// markdown. The source format is auto-detected from the file extension, while being
// overwrittable by an explicit --from flag.
//
// Usage:
//  docmark <input> [-o <output>] [--from <format>]          - Convert (default)
//  docmark convert <input> [-o <output>] [--from <format>]  - Same as above (explicit)
//
// Options shared by both forms:
//  --bibliography <csl.json>  - CSL-JSON bibliography used to resolve citation keys
//  --config <docmark.toml>    - Configuration file layered over the defaults
//  --comment-ids              - Always write comments with identifier markers
//
// Logging goes to stderr and is controlled by DOCMARK_LOG (default: warn), so conversion
// warnings show up without any setup.

use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use docmark_babel::bibliography::Bibliography;
use docmark_babel::{ConvertOptions, Environment, FormatRegistry};
use docmark_config::{DocmarkConfig, Loader};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "DOCMARK_LOG";

fn build_cli() -> Command {
    Command::new("docmark")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Convert annotated Markdown to Word documents and back")
        .long_about(
            "docmark converts Markdown manuscripts carrying review annotations\n\
            ({++ins++}, {--del--}, {==highlight==}{>>comment<<}), citations ([@key])\n\
            and math ($x$) into .docx files, and .docx files back into Markdown.\n\n\
            Examples:\n  \
            docmark paper.md                          # Writes paper.docx\n  \
            docmark review.docx -o paper.md           # Back to Markdown\n  \
            docmark paper.md --bibliography refs.json # Resolve citations",
        )
        .arg_required_else_help(true)
        .subcommand_required(false)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Path to a docmark.toml configuration file")
                .value_hint(ValueHint::FilePath)
                .global(true),
        )
        .arg(
            Arg::new("bibliography")
                .long("bibliography")
                .value_name("PATH")
                .help("CSL-JSON bibliography used to resolve citation keys")
                .value_hint(ValueHint::FilePath)
                .global(true),
        )
        .arg(
            Arg::new("comment-ids")
                .long("comment-ids")
                .help("Always write comments as {#id} markers, even when brackets would do")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert a document (default command)")
                .long_about(
                    "Convert a document to its counterpart format.\n\n\
                    Supported formats:\n  \
                    - markdown: Markdown with review extensions (.md, .markdown)\n  \
                    - docx:     Word document (.docx)\n\n\
                    The source format is auto-detected from the file extension.\n\
                    Output defaults to the input path with the extension swapped.",
                )
                .arg(
                    Arg::new("input")
                        .help("Input file path")
                        .required(true)
                        .index(1)
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("from")
                        .long("from")
                        .help("Source format (auto-detected from file extension if not specified)")
                        .value_parser(["markdown", "docx"])
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .help("Output file path (defaults to the input with its extension swapped)")
                        .value_hint(ValueHint::FilePath),
                ),
        )
}

fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let cli = build_cli();
    let matches = match cli.clone().try_get_matches_from(&args) {
        Ok(m) => m,
        Err(e) => {
            // A bare file argument means the convert subcommand was left implicit
            if args.len() > 1
                && !args[1].starts_with('-')
                && args[1] != "convert"
                && args[1] != "help"
            {
                let mut new_args = vec![args[0].clone(), "convert".to_string()];
                new_args.extend_from_slice(&args[1..]);
                match cli.try_get_matches_from(&new_args) {
                    Ok(m) => m,
                    Err(e2) => e2.exit(),
                }
            } else {
                e.exit();
            }
        }
    };

    match matches.subcommand() {
        Some(("convert", sub_matches)) => {
            let config = load_cli_config(matches.get_one::<String>("config").map(|s| s.as_str()));
            handle_convert_command(&matches, sub_matches, &config);
        }
        _ => {
            eprintln!("Unknown subcommand. Use --help for usage information.");
            std::process::exit(1);
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Handle the convert command
fn handle_convert_command(matches: &ArgMatches, sub_matches: &ArgMatches, config: &DocmarkConfig) {
    let registry = FormatRegistry::default();
    let input = sub_matches
        .get_one::<String>("input")
        .expect("input is required");

    let from = match sub_matches.get_one::<String>("from") {
        Some(f) => f.to_string(),
        None => match registry.detect_format_from_filename(input) {
            Some(detected) => detected,
            None => {
                eprintln!("Error: Could not detect format from filename '{input}'");
                eprintln!("Please specify --from explicitly");
                std::process::exit(1);
            }
        },
    };
    let format = registry.get(&from).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    let output = match sub_matches.get_one::<String>("output") {
        Some(path) => PathBuf::from(path),
        None => default_output_path(input, format.target()),
    };

    let source = fs::read(input).unwrap_or_else(|e| {
        eprintln!("Error reading file '{input}': {e}");
        std::process::exit(1);
    });

    let bibliography = matches
        .get_one::<String>("bibliography")
        .map(|path| load_bibliography(path));

    let mut options = ConvertOptions::from(config);
    if matches.get_flag("comment-ids") {
        options.force_comment_ids = true;
    }
    let mut env = Environment::new(options);
    if let Some(bibliography) = &bibliography {
        env = env.with_bibliography(bibliography);
    }

    let conversion = registry.convert(&source, &from, &mut env).unwrap_or_else(|e| {
        eprintln!("Conversion error: {e}");
        std::process::exit(1);
    });

    fs::write(&output, conversion.output.into_bytes()).unwrap_or_else(|e| {
        eprintln!("Error writing file '{}': {e}", output.display());
        std::process::exit(1);
    });

    tracing::info!(
        output = %output.display(),
        warnings = conversion.warnings.len(),
        "conversion finished"
    );
}

fn default_output_path(input: &str, target: &str) -> PathBuf {
    let extension = match target {
        "docx" => "docx",
        _ => "md",
    };
    Path::new(input).with_extension(extension)
}

fn load_bibliography(path: &str) -> Bibliography {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading bibliography '{path}': {e}");
        std::process::exit(1);
    });
    let bibliography = Bibliography::from_csl_json(&text).unwrap_or_else(|e| {
        eprintln!("Invalid bibliography '{path}': {e}");
        std::process::exit(1);
    });
    tracing::debug!(entries = bibliography.len(), "loaded bibliography");
    bibliography
}

fn load_cli_config(explicit_path: Option<&str>) -> DocmarkConfig {
    let loader = Loader::new().with_optional_file("docmark.toml");
    let loader = if let Some(path) = explicit_path {
        loader.with_file(path)
    } else {
        loader
    };

    loader.build().unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {err}");
        std::process::exit(1);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_swaps_extension() {
        assert_eq!(
            default_output_path("notes/paper.md", "docx"),
            PathBuf::from("notes/paper.docx")
        );
        assert_eq!(
            default_output_path("review.docx", "markdown"),
            PathBuf::from("review.md")
        );
    }

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }
}
