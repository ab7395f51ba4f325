//! Implementations of the CLI subcommands.

use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use crate::cli::{CheckArgs, OutputFormat, RunArgs};
use crate::config::EvalConfig;
use crate::language;
use crate::snippet::{AnnotatedLine, LineClass, Snippet};

#[derive(Serialize)]
struct FileReport {
    file: String,
    lines: Vec<AnnotatedLine>,
}

/// Evaluate each file as one snippet and print the annotated output.
pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = EvalConfig::new();
    if let Some(root) = &args.modules_root {
        config = config.with_modules_root(root);
    }
    if args.shared_page {
        config = config.with_page(EvalConfig::fresh_page());
    }

    let mut reports = Vec::new();
    for path in &args.files {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let snippet = Snippet::new(&source, args.lang.as_str(), Some(path.display().to_string()), 0);
        let lines = snippet
            .annotate(&config)
            .await
            .with_context(|| format!("evaluating {}", path.display()))?;
        info!(file = %path.display(), lines = lines.len(), "snippet evaluated");

        match args.output {
            OutputFormat::Text => print_text(path, &lines, args.files.len() > 1),
            OutputFormat::Json => reports.push(FileReport {
                file: path.display().to_string(),
                lines: lines.to_vec(),
            }),
        }
    }

    if args.output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(())
}

fn print_text(path: &Path, lines: &[AnnotatedLine], with_header: bool) {
    if with_header {
        println!("{}", format!("== {}", path.display()).bold());
    }
    for line in lines {
        match line.class {
            LineClass::Code => println!("{}", line.text),
            LineClass::Comment => println!("{}", line.text.dimmed()),
            LineClass::Result => println!("{}", line.text.green()),
            LineClass::Error => println!("{}", line.text.red()),
            LineClass::Unknown => println!("{}", line.text.yellow()),
        }
    }
}

/// Scan and partition each file, reporting authoring errors without running.
pub fn check(args: CheckArgs) -> anyhow::Result<()> {
    let Some(style) = language::comment_style(&args.lang) else {
        bail!("language `{}` has no comment convention; nothing to check", args.lang);
    };

    let mut failed = false;
    for path in &args.files {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let snippet = Snippet::new(&source, args.lang.as_str(), Some(path.display().to_string()), 0);
        match crate::engine::check(snippet.lines(), snippet.first_line(), style) {
            Ok(clumps) => println!("{}: ok ({clumps} clumps)", path.display()),
            Err(e) => {
                failed = true;
                eprintln!("{}: {e}", path.display());
            }
        }
    }

    if failed {
        bail!("authoring errors found");
    }
    Ok(())
}
