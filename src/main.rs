#![forbid(unsafe_code)]

mod ui;
mod xp3;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "xp3pack", version, about = "KiriKiri XP3 archive packer")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive wizard for packing an archive (terminal).
    Ui,

    /// Pack an input directory into an .xp3 archive.
    Build {
        /// Input directory.
        #[arg(long)]
        input: PathBuf,
        /// Output archive. "-" writes the archive to stdout.
        #[arg(long)]
        output: PathBuf,
        /// zlib level (0..=9) for file payloads and the index.
        #[arg(long, default_value_t = xp3::DEFAULT_LEVEL, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: u32,
        /// Store the index uncompressed.
        #[arg(long, default_value_t = false)]
        raw_index: bool,
        /// Write to a temp file and rename it over the output on success.
        /// Not available with `--output -`.
        #[arg(long, default_value_t = false)]
        atomic: bool,
    },

    /// List entries in an archive.
    List {
        #[arg(long)]
        archive: PathBuf,
        /// Print offsets, sizes and checksums too.
        #[arg(long, default_value_t = false)]
        verbose: bool,
    },

    /// Extract an archive to an output directory.
    Extract {
        #[arg(long)]
        archive: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Only extract entries that contain this substring (repeatable).
        #[arg(long)]
        filter: Vec<String>,
    },

    /// Verify archive integrity (decoy, bounds, sizes, checksums).
    Verify {
        #[arg(long)]
        archive: PathBuf,
    },
}

fn run(cmd: Command) -> xp3::Xp3Result<()> {
    match cmd {
        Command::Ui => ui::run(),
        Command::Build {
            input,
            output,
            level,
            raw_index,
            atomic,
        } => {
            let to_stdout = output.as_os_str() == "-";
            if to_stdout && atomic {
                return Err(xp3::Xp3Error::Invalid(
                    "--atomic needs a file output, not stdout".into(),
                ));
            }
            let opts = xp3::PackOptions {
                level,
                index_encoding: if raw_index {
                    xp3::IndexEncoding::Raw
                } else {
                    xp3::IndexEncoding::Zlib
                },
                atomic,
            };
            if to_stdout {
                xp3::pack_buffered(&input, &mut std::io::stdout().lock(), &opts)?;
            } else {
                let summary = xp3::pack(&input, &output, &opts)?;
                println!(
                    "ok: {} entries, {} data bytes, index at {}, {} bytes -> {}",
                    summary.entries,
                    summary.data_bytes,
                    summary.index_offset,
                    summary.archive_len,
                    output.display()
                );
            }
            Ok(())
        }
        Command::List { archive, verbose } => xp3::list(&archive, verbose),
        Command::Extract {
            archive,
            output,
            filter,
        } => xp3::extract(&archive, &output, &filter),
        Command::Verify { archive } => {
            let report = xp3::verify(&archive)?;
            println!(
                "ok: {} entries, {} bytes",
                report.entries, report.original_bytes
            );
            Ok(())
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.cmd) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn build_defaults() {
        let cli =
            Cli::try_parse_from(["xp3pack", "build", "--input", "game", "--output", "data.xp3"])
                .unwrap();
        match cli.cmd {
            Command::Build {
                level,
                raw_index,
                atomic,
                ..
            } => {
                assert_eq!(level, 9);
                assert!(!raw_index);
                assert!(!atomic);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn level_out_of_range_is_rejected() {
        let res = Cli::try_parse_from([
            "xp3pack", "build", "--input", "game", "--output", "data.xp3", "--level", "12",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn atomic_to_stdout_is_rejected() {
        let cli = Cli::try_parse_from([
            "xp3pack", "build", "--input", "no-such-dir", "--output", "-", "--atomic",
        ])
        .unwrap();
        assert!(matches!(run(cli.cmd), Err(xp3::Xp3Error::Invalid(_))));
    }
}
