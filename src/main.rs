use std::path::PathBuf;

use clap::{CommandFactory, Parser as ClapParser, error::ErrorKind};
use minicc::frontend::{SourceFile, SourceFileOrigin};

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Output mode: -koopa, -riscv, -perf, or -test
    #[arg(allow_hyphen_values = true)]
    mode: String,

    /// Source file to compile
    input: PathBuf,

    /// Where to write the result
    #[arg(short = 'o')]
    output: PathBuf,
}

fn main() {
    let args = Args::parse();

    if !args.input.exists() {
        Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("Source file '{}' does not exist!", args.input.display()),
            )
            .exit()
    }

    if !args.input.is_file() {
        Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("Input path '{}' is not a file!", args.input.display()),
            )
            .exit()
    }

    let contents =
        std::fs::read_to_string(&args.input).expect("Failed to read input file (or invalid UTF-8)");

    let source_file = SourceFile {
        contents,
        origin: SourceFileOrigin::File(args.input),
    };

    let output = match args.mode.as_str() {
        "-test" => {
            let unit = minicc::parse(&source_file);
            format!("{unit:#?}\n")
        }
        "-koopa" => minicc::emit_ir(&source_file),
        "-riscv" | "-perf" => minicc::emit_assembly(&source_file),
        other => {
            eprintln!("Unimplemented mode: {other}");
            "NotImplementedError\n".to_string()
        }
    };

    std::fs::write(&args.output, output).expect("Failed to write output file");
}
