//! Command-line front end.
//!
//! ```bash
//! wadmerge one.wad two.wad three.wad -o combined.wad
//! ```
//!
//! All merge policy lives in the library; this binary only parses
//! arguments, asks before clobbering an existing output, and maps
//! failures to exit codes.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{ArgAction, Parser};
use dialoguer::{Confirm, theme::ColorfulTheme};

use wadmerge::{MergeOptions, Merger};

const LICENSE: &str = "\
MIT License

Permission is hereby granted, free of charge, to any person obtaining a
copy of this software and associated documentation files (the
\"Software\"), to deal in the Software without restriction, including
without limitation the rights to use, copy, modify, merge, publish,
distribute, sublicense, and/or sell copies of the Software, and to
permit persons to whom the Software is furnished to do so, subject to
the following conditions:

The above copyright notice and this permission notice shall be included
in all copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND,
EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY
CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE
SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.";

#[derive(Parser, Debug)]
#[command(
    name = "wadmerge",
    version,
    about = "Merge two or more WAD archives into one"
)]
struct Args {
    /// Input WAD files, merged in the order given
    inputs: Vec<PathBuf>,

    /// Output file
    #[arg(short, long, default_value = "merged.wad")]
    output: PathBuf,

    /// Overwrite the output file without asking
    #[arg(short = 'w', long)]
    overwrite: bool,

    /// Drop patches that no merged texture references
    #[arg(long, default_value_t = true, action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true")]
    filter_patches: bool,

    /// Concatenate known text lumps instead of overwriting them
    #[arg(long, default_value_t = true, action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true")]
    merge_text: bool,

    /// Sort namespaces and their contents by name
    #[arg(long = "sort-ns", default_value_t = true, action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true")]
    sort_namespaces: bool,

    /// Sort maps by name
    #[arg(long, default_value_t = true, action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true")]
    sort_maps: bool,

    /// Sort merged text lumps by name
    #[arg(long, default_value_t = true, action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true")]
    sort_text: bool,

    /// Sort the texture table by name
    #[arg(long)]
    sort_textures: bool,

    /// Sort loose lumps by name
    #[arg(long)]
    sort_loose: bool,

    /// Write a report of every resolved duplicate to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print the license text and exit
    #[arg(short = 'l', long)]
    license: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let args = Args::parse();

    if args.license {
        println!("{LICENSE}");
        return;
    }
    if args.inputs.len() < 2 {
        eprintln!("at least two input files are required");
        process::exit(-1);
    }
    for input in &args.inputs {
        if !input.is_file() {
            eprintln!("input file {} does not exist", input.display());
            process::exit(-2);
        }
    }

    if let Err(err) = run(&args) {
        eprintln!("error: {err:#}");
        process::exit(-3);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    if args.output.exists() && !args.overwrite {
        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "{} already exists, overwrite it?",
                args.output.display()
            ))
            .default(false)
            .interact()
            .context("reading overwrite confirmation")?;
        if !proceed {
            println!("nothing written");
            return Ok(());
        }
    }

    let options = MergeOptions {
        filter_patches: args.filter_patches,
        merge_text: args.merge_text,
        sort_namespaces: args.sort_namespaces,
        sort_maps: args.sort_maps,
        sort_textures: args.sort_textures,
        sort_text: args.sort_text,
        sort_loose: args.sort_loose,
        report_path: args.report.clone(),
    };

    let mut merger = Merger::new(options);
    for input in &args.inputs {
        merger
            .add_file(input)
            .with_context(|| format!("reading {}", input.display()))?;
    }
    anyhow::ensure!(merger.archive_count() > 0, "no readable input archives");

    merger
        .finish(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    Ok(())
}
