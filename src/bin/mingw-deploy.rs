use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

use mingw_deploy::common::{path_to_string, readable_canonical_path};
use mingw_deploy::{deploy_binary, DeployOptions, DeployReport, ToolchainDir};

/// Stage the MinGW runtime DLLs of an executable next to it
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// MinGW-built .exe or .dll files to stage dependencies for
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// MinGW bin directory holding the redistributable DLLs
    /// (default: the directory this program runs from)
    #[arg(short = 'd', long = "mingw-dir", value_name = "DIR", verbatim_doc_comment)]
    mingw_dir: Option<PathBuf>,

    /// Print the resolved dependencies without copying anything
    #[arg(long)]
    dry_run: bool,

    /// Do not invoke windeployqt even if a Qt core DLL is found
    #[arg(long)]
    no_qt_deploy: bool,

    /// Path for the run report in JSON format
    #[arg(short = 'j', long, value_name = "OUTPUT_JSON_PATH")]
    output_json_path: Option<PathBuf>,

    /// Verbosity
    #[arg(short, long)]
    verbose: bool,
}

fn print_report(report: &DeployReport, dry_run: bool) {
    for failure in &report.scan_failures {
        eprintln!("\t{failure}");
    }
    if report.dependencies.is_empty() {
        println!("No managed DLLs found in {}.", path_to_string(&report.target));
        return;
    }

    if dry_run {
        println!("Would deploy:");
        for name in &report.dependencies {
            println!("\t{name}");
        }
        return;
    }

    println!("Deploying DLLs:");
    for staged in &report.staged {
        match &staged.error {
            None => println!("\t{}", staged.name),
            Some(e) => println!("\t{} failed: {}", staged.name, e),
        }
    }
    if let Some(major) = &report.qt {
        match &report.qt_deploy_error {
            None => println!("{major} application, plugins handled by windeployqt"),
            Some(e) => eprintln!("{major} plugin deployment failed: {e}"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.files.is_empty() {
        println!("No files specified.");
        return Ok(());
    }

    let toolchain = match &cli.mingw_dir {
        Some(dir) => {
            if !dir.is_dir() {
                // not fatal: the closure simply resolves empty
                eprintln!(
                    "{} is not a directory, no DLLs will be found there.",
                    path_to_string(dir)
                );
            }
            ToolchainDir::new(dir)
        }
        None => ToolchainDir::from_current_exe()
            .context("could not deduce the MinGW bin directory, pass --mingw-dir")?,
    };
    println!(
        "Using MinGW bin directory {}",
        readable_canonical_path(toolchain.root())
            .unwrap_or_else(|_| path_to_string(toolchain.root()))
    );

    let options = DeployOptions {
        dry_run: cli.dry_run,
        skip_qt_deploy: cli.no_qt_deploy,
    };

    let mut reports = Vec::new();
    for file in &cli.files {
        if !file.is_file() {
            eprintln!("{} doesn't exist, skipping.", path_to_string(file));
            continue;
        }
        if cli.verbose {
            println!("Resolving dependencies of {}", path_to_string(file));
        }
        let report = deploy_binary(file, &toolchain, options);
        print_report(&report, cli.dry_run);
        reports.push(report);
    }

    if let Some(json_path) = &cli.output_json_path {
        let js = serde_json::to_string(&reports).context("error serializing the run report")?;
        let mut file = fs_err::File::create(json_path)
            .with_context(|| format!("couldn't create {}", path_to_string(json_path)))?;
        file.write_all(js.as_bytes())
            .with_context(|| format!("couldn't write to {}", path_to_string(json_path)))?;
        if cli.verbose {
            println!("Report written to {}", path_to_string(json_path));
        }
    }

    Ok(())
}
