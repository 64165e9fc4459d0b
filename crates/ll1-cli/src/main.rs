mod render;

use anyhow::Context as _;
use clap::Parser;
use ll1::codegen::Codegen;
use ll1::diagnostics::{Diagnostics, Severity};
use std::io::Read as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::{fs, io};
use tracing_subscriber::EnvFilter;

/// Check that a grammar is LL(1) and emit a table-driven C parser.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dump the rule list and the FIRST/FOLLOW sets.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress warnings.
    #[arg(short, long)]
    quiet: bool,

    /// Print the parse table.
    #[arg(short, long)]
    table: bool,

    /// Resolve conflicts in favor of the non-nullable rule.
    #[arg(short, long)]
    partial_book: bool,

    /// Re-flow wide table output into column groups.
    #[arg(short, long)]
    width_limit: bool,

    /// The path of the grammar file; stdin when absent.
    input: Option<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::debug!("parsed CLI args = {:?}", args);

    let source = match &args.input {
        Some(path) => fs::read(path)
            .with_context(|| anyhow::anyhow!("failed to read '{}'", path.display()))?,
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };

    let options = ll1::Options {
        nullable_tiebreak: args.partial_book,
    };
    let mut diags = Diagnostics::new();
    let analysis = ll1::analyze(&source, options, &mut diags);

    for diag in diags.iter() {
        if args.quiet && diag.severity == Severity::Warning {
            continue;
        }
        let label = match diag.severity {
            Severity::Error => "  error",
            Severity::Warning => "warning",
            Severity::Note => "   note",
        };
        println!("{}: {}", label, diag.message);
    }

    let analysis = match analysis {
        Ok(analysis) => analysis,
        Err(err) => {
            println!("  error: {}", err);
            return Ok(ExitCode::FAILURE);
        }
    };

    if args.verbose {
        print!("{}", analysis.grammar.display(&analysis.symbols));
        println!();
        print!("{}", analysis.first.display(&analysis.grammar, &analysis.symbols));
        println!();
        print!("{}", analysis.follow.display(&analysis.grammar, &analysis.symbols));
        println!();
    }
    if args.verbose || args.table {
        print!("{}", render::render_table(&analysis, args.width_limit));
    }

    if !analysis.is_ll1() {
        println!("  error: the grammar is not LL(1)");
        return Ok(ExitCode::FAILURE);
    }

    write_parser(&args, &analysis)?;
    Ok(ExitCode::SUCCESS)
}

/// Write `<stem>_parse.h` / `<stem>_parse.c` next to the input file, or
/// `ll1_parse.*` in the working directory when reading stdin.
fn write_parser(args: &Args, analysis: &ll1::Analysis) -> anyhow::Result<()> {
    let stem = args
        .input
        .as_deref()
        .and_then(|path| path.file_stem())
        .and_then(|stem| stem.to_str())
        .unwrap_or("ll1");
    let header_name = format!("{}_parse.h", stem);
    let source_name = format!("{}_parse.c", stem);
    let dir = args
        .input
        .as_deref()
        .and_then(|path| path.parent())
        .map(|parent| parent.to_owned())
        .unwrap_or_default();

    let codegen = Codegen::new(analysis);
    let header_path = dir.join(&header_name);
    fs::write(&header_path, codegen.header().to_string())
        .with_context(|| anyhow::anyhow!("failed to write '{}'", header_path.display()))?;
    let source_path = dir.join(&source_name);
    fs::write(&source_path, codegen.source(&header_name).to_string())
        .with_context(|| anyhow::anyhow!("failed to write '{}'", source_path.display()))?;
    tracing::info!(
        "wrote {} and {}",
        header_path.display(),
        source_path.display()
    );
    Ok(())
}
