use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use gcstatics::dump::dump_object;
use gcstatics::{build_image, read_listing, EmitResult, TargetDetails};

#[derive(Parser, Debug)]
#[command(name = "gcstatics")]
#[command(about = "Emit and inspect static GC descriptor regions.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a type-layout listing into an ELF relocatable object.
    Build {
        /// Type-layout listing.
        layout: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Overrides the listing's `target` directive (x86_64 or x86).
        #[arg(long)]
        target: Option<TargetDetails>,
        /// Print session statistics.
        #[arg(long, default_value_t = false)]
        stats: bool,
    },
    /// Print the descriptor regions of an emitted object.
    Dump {
        object: PathBuf,
        /// Listing the object was built from, used to resolve canonical series.
        #[arg(long)]
        layout: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    run(Cli::parse())?;
    Ok(())
}

fn run(cli: Cli) -> EmitResult<()> {
    match cli.command {
        Command::Build {
            layout,
            output,
            target,
            stats,
        } => {
            let mut listing = read_listing(&layout)?;
            if let Some(target) = target {
                listing.table.set_target(target);
            }
            log::info!(
                "{}: {} type(s), {} root(s), target {}",
                layout.display(),
                listing.table.len(),
                listing.roots.len(),
                listing.table.target()
            );

            let image = build_image(&listing)?;
            fs::write(&output, &image.bytes)?;
            println!("Wrote {} ({} bytes)", output.display(), image.bytes.len());
            if stats {
                print!("{}", image.stats);
            }
        }
        Command::Dump { object, layout } => {
            let bytes = fs::read(&object)?;
            let listing = layout.as_deref().map(read_listing).transpose()?;
            print!("{}", dump_object(&bytes, listing.as_ref().map(|l| &l.table))?);
        }
    }

    Ok(())
}
