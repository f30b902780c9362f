use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::Parser;
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term::{
    self,
    termcolor::{ColorChoice, StandardStream},
};
use walkdir::WalkDir;

use quarry::scanner::ScanParams;
use quarry::{Compiler, Scanner};

#[derive(Parser, Debug)]
#[clap(version, about)]
struct Args {
    /// Path to a file containing rules, or '-' to read them from stdin.
    rules_file: PathBuf,

    /// Files or directories to scan.
    #[clap(required = true)]
    input: Vec<PathBuf>,

    /// Print the compiled instructions and patterns before scanning.
    #[clap(short = 'd', long)]
    debug: bool,

    /// Print the match offsets of the strings of matching rules.
    #[clap(short = 's', long)]
    show_strings: bool,

    /// Recursively search directories.
    #[clap(short = 'r', long)]
    recursive: bool,

    /// Do not follow symlinks when scanning.
    #[clap(short = 'N', long)]
    no_follow_symlinks: bool,
}

fn emit_diagnostic(path: &Path, contents: &str, diagnostic: &Diagnostic<()>) {
    let writer = StandardStream::stderr(ColorChoice::Auto);
    let config = term::Config::default();

    let path = path.display().to_string();
    let files = SimpleFile::new(&path, contents);
    let mut lock = writer.lock();
    if let Err(e) = term::emit(&mut lock, &config, &files, diagnostic) {
        eprintln!("cannot emit diagnostics: {e}");
    }
}

fn main() -> Result<(), std::io::Error> {
    let args = Args::parse();

    let rules_contents = if args.rules_file == Path::new("-") {
        let mut buffer = String::new();
        let _ = std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(&args.rules_file)?
    };

    let scanner = {
        let mut compiler = Compiler::new();
        if let Err(err) = compiler.add_rules_str(&rules_contents) {
            emit_diagnostic(&args.rules_file, &rules_contents, &err.to_diagnostic());
            exit(2);
        }
        for warning in compiler.warnings() {
            emit_diagnostic(&args.rules_file, &rules_contents, &warning.to_diagnostic());
        }

        let mut scanner = compiler.into_scanner();
        if args.show_strings {
            scanner.set_scan_params(ScanParams::default().string_matches(true));
        }
        scanner
    };

    if args.debug {
        print!("{}", scanner.debug_dump());
    }

    let print_path = args.input.len() > 1 || args.input.iter().any(|path| path.is_dir());
    for input in &args.input {
        let mut walker = WalkDir::new(input).follow_links(!args.no_follow_symlinks);
        if !args.recursive {
            walker = walker.max_depth(1);
        }

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            scan_file(&scanner, entry.path(), print_path, args.show_strings)?;
        }
    }

    Ok(())
}

fn scan_file(
    scanner: &Scanner,
    path: &Path,
    print_path: bool,
    show_strings: bool,
) -> std::io::Result<()> {
    let contents = std::fs::read(path)?;

    let res = match scanner.scan_mem(&contents) {
        Ok(res) => res,
        Err(err) => {
            eprintln!("cannot scan {}: {err}", path.display());
            return Ok(());
        }
    };

    for rule in res.matched_rules {
        if print_path {
            println!("Rule: {} {} in {}", rule.name, rule.tags.join(","), path.display());
        } else {
            println!("Rule: {} {}", rule.name, rule.tags.join(","));
        }
        if show_strings {
            for string in rule.strings {
                let offsets: Vec<String> =
                    string.offsets.iter().map(ToString::to_string).collect();
                println!("    ${}: [{}]", string.name, offsets.join(", "));
            }
        }
    }

    Ok(())
}
