mod interactive;

use std::{fs::File, path::PathBuf};

use anyhow::{anyhow, Result};
use cache_sim::{
    pattern::{Pattern, DEFAULT_DIM, DEFAULT_TILE},
    sim::{RunReport, Simulator},
    trace::{self, TraceEntry},
    CacheConfig,
};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[cfg(feature = "stat")]
use terminal_size::terminal_size;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// simulate the access pattern of a matrix kernel
    Pattern(PatternArgs),
    /// simulate an address trace read from a file
    Trace(TraceArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// # of cache blocks (must be a power of 2)
    #[arg(short, long, required_unless_present = "config")]
    blocks: Option<usize>,
    /// Size of each cache block in bytes (must be a power of 2)
    #[arg(short = 's', long, required_unless_present = "config")]
    block_size: Option<usize>,
    /// # of ways of a set-associative cache (direct mapped if omitted)
    #[arg(short, long, conflicts_with = "fully_associative")]
    ways: Option<usize>,
    /// Use a single set holding every block
    #[arg(long)]
    fully_associative: bool,
    /// File path to a JSON cache configuration; flags override its fields
    #[arg(long)]
    config: Option<PathBuf>,
    /// Dump the cache contents after the run
    #[arg(long)]
    dump: bool,
    /// How to print dumps
    #[arg(long, value_enum, default_value_t = DumpFormat::Text)]
    dump_format: DumpFormat,
    /// Enable interactive mode
    #[arg(long)]
    interactive: bool,
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct PatternArgs {
    #[command(flatten)]
    delegate: CommonArgs,
    /// Access pattern to generate
    #[arg(value_enum)]
    pattern: PatternKind,
    /// Matrix dimension
    #[arg(long, default_value_t = DEFAULT_DIM)]
    dim: usize,
    /// Tile size of `tiled-multiply`
    #[arg(long, default_value_t = DEFAULT_TILE)]
    tile: usize,
}

#[derive(Args, Debug)]
struct TraceArgs {
    #[command(flatten)]
    delegate: CommonArgs,
    /// File path to input trace
    #[arg(short, long)]
    input: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PatternKind {
    RowMajor,
    ColumnMajor,
    Transpose,
    MatrixMultiply,
    TiledMultiply,
    CrossSum,
    Increment,
}

impl PatternKind {
    fn with_tile(self, tile: usize) -> Pattern {
        match self {
            PatternKind::RowMajor => Pattern::RowMajor,
            PatternKind::ColumnMajor => Pattern::ColumnMajor,
            PatternKind::Transpose => Pattern::Transpose,
            PatternKind::MatrixMultiply => Pattern::MatrixMultiply,
            PatternKind::TiledMultiply => Pattern::TiledMultiply { tile },
            PatternKind::CrossSum => Pattern::CrossSum,
            PatternKind::Increment => Pattern::Increment,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DumpFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let (common, entries) = match args.command {
        Command::Pattern(PatternArgs {
            delegate,
            pattern,
            dim,
            tile,
        }) => {
            init_logger(delegate.verbose);
            let pattern = pattern.with_tile(tile);
            log::info!("{pattern} configuration, {dim}x{dim} matrices");
            let entries: Vec<_> = pattern
                .accesses(dim)?
                .into_iter()
                .map(TraceEntry::from)
                .collect();
            (delegate, entries)
        }
        Command::Trace(TraceArgs { delegate, input }) => {
            init_logger(delegate.verbose);
            let entries = trace::read_trace(File::open(&input)?)?;
            (delegate, entries)
        }
    };
    let config = read_config(&common)?;
    log::info!("requested cache: {config}");
    let mut sim = Simulator::new(config)?;
    log::info!("cache: {}", sim.cache().geometry());
    let entries = with_final_dump(entries, common.dump);
    if common.interactive {
        interactive::execute_interactive(&mut sim, entries, common.dump_format)
    } else {
        let report = sim.run(entries);
        print_dumps(report, common.dump_format)?;
        println!("{report}");
        output_stat(&sim);
        Ok(())
    }
}

fn init_logger(verbose: bool) {
    if verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::init();
    }
}

fn with_final_dump(mut entries: Vec<TraceEntry>, dump: bool) -> Vec<TraceEntry> {
    if dump {
        entries.push(TraceEntry::dump());
    }
    entries
}

fn read_config(args: &CommonArgs) -> Result<CacheConfig> {
    let base = match &args.config {
        Some(p) => {
            let file = File::open(p)?;
            Some(CacheConfig::deser(file)?)
        }
        None => None,
    };
    let pick = |flag: Option<usize>, from_file: Option<usize>, name: &str| {
        flag.or(from_file)
            .ok_or_else(|| anyhow!("`--{name}` is required without `--config`"))
    };
    let num_blocks = pick(args.blocks, base.map(|c| c.num_blocks), "blocks")?;
    let block_size = pick(args.block_size, base.map(|c| c.block_size), "block-size")?;
    let config = if args.fully_associative {
        CacheConfig::fully_associative(num_blocks, block_size)
    } else {
        let ways = args
            .ways
            .or(base.map(|c| c.associativity))
            .unwrap_or(1);
        CacheConfig::n_way(num_blocks, block_size, ways)
    };
    config.validate()?;
    Ok(config)
}

pub(crate) fn print_dumps(report: &RunReport, format: DumpFormat) -> Result<()> {
    for dump in &report.dumps {
        match format {
            DumpFormat::Text => println!("{dump}"),
            DumpFormat::Json => println!("{}", dump.to_json()?),
        }
    }
    Ok(())
}

#[cfg(not(feature = "stat"))]
fn output_stat(_: &Simulator) {}

#[cfg(feature = "stat")]
fn output_stat(sim: &Simulator) {
    let max_width = get_terminal_width().unwrap_or(120) as usize;
    log::info!("statistics:\n{}", sim.collect_stat().view(max_width));
}

#[cfg(feature = "stat")]
fn get_terminal_width() -> Option<u16> {
    terminal_size().map(|(w, _)| w.0.saturating_sub(20))
}
