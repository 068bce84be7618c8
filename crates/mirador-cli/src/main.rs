use clap::Parser;
use mirador_cli::{CliArgs, MiradorCli};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let result = match MiradorCli::from_args("mirador", &args) {
        Ok(cli) => cli.run(args).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
