// DMM6500 - SCPI polling client for bench multimeters
use clap::Parser;
use dmm6500::cli::{execute_command, Args, ConsoleWriter, OutputWriter};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let writer = ConsoleWriter::new(args.output);

    if let Err(e) = execute_command(args).await {
        if writer.write_error(&e.to_string()).is_err() {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}
