use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

#[derive(Debug, Parser)]
#[command(
    name = "jcx",
    version,
    about = "Pack JSON or HIML text into compact binary trees and back"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse a text document and write it in a binary format
    Pack {
        input: PathBuf,
        output: PathBuf,
        /// Wire format to produce
        #[arg(long, value_enum, default_value_t = FormatArg::Pooled)]
        format: FormatArg,
        /// Treat the input as HIML instead of JSON
        #[arg(long)]
        himl: bool,
    },
    /// Decode a binary file of any format and print it as text
    Dump {
        input: PathBuf,
        /// Render HIML instead of JSON
        #[arg(long)]
        himl: bool,
    },
    /// Show a binary file's detected format and basic statistics
    Stat { input: PathBuf },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Pooled,
    Legacy,
    Zerocopy,
}

impl std::fmt::Display for FormatArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FormatArg::Pooled => "pooled",
            FormatArg::Legacy => "legacy",
            FormatArg::Zerocopy => "zerocopy",
        };
        write!(f, "{}", name)
    }
}

impl From<FormatArg> for jcx::Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Pooled => jcx::Format::Pooled,
            FormatArg::Legacy => jcx::Format::Legacy,
            FormatArg::Zerocopy => jcx::Format::ZeroCopy,
        }
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Pack {
                input,
                output,
                format,
                himl,
            } => pack(&input, &output, format.into(), himl),
            Commands::Dump { input, himl } => dump(&input, himl),
            Commands::Stat { input } => stat(&input),
        }
    }
}

fn parse_text(source: &str, himl: bool) -> Result<jcx::Tree> {
    let (tree, err) = if himl {
        jcx::himl::parse(source)
    } else {
        jcx::json::parse(source)
    };
    match err {
        None => Ok(tree),
        Some(err) => Err(miette::Report::new(err.with_source(source.to_string()))),
    }
}

fn pack(input: &Path, output: &Path, format: jcx::Format, himl: bool) -> Result<()> {
    let source = fs::read_to_string(input).into_diagnostic()?;
    let tree = parse_text(&source, himl)?;
    let bytes = jcx::encode(&tree, format).into_diagnostic()?;
    fs::write(output, bytes).into_diagnostic()?;
    Ok(())
}

fn dump(input: &Path, himl: bool) -> Result<()> {
    let bytes = fs::read(input).into_diagnostic()?;
    let tree = jcx::decode(&bytes).into_diagnostic()?;
    let text = if himl {
        jcx::himl::render(&tree)
    } else {
        jcx::json::render(&tree)
    };
    println!("{}", text);
    Ok(())
}

fn stat(input: &Path) -> Result<()> {
    let bytes = fs::read(input).into_diagnostic()?;
    let format = jcx::Format::sniff(&bytes).into_diagnostic()?;
    let tree = jcx::decode(&bytes).into_diagnostic()?;
    let pool = jcx::StringPool::collect(&tree, tree.root()).into_diagnostic()?;
    println!("format: {}", format);
    println!("size: {} bytes", bytes.len());
    println!("nodes: {}", tree.node_count());
    println!("pool: {} unique strings", pool.len());
    Ok(())
}
