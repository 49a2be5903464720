use clap::Parser;

fn main() -> miette::Result<()> {
    jcx_cli::Cli::parse().run()
}
