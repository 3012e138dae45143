// src/bpe_main.rs

use std::{
    borrow::Cow,
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::PathBuf,
    sync::LazyLock,
};

use anyhow::Context;
use bbpe_sampler::BPE;
use clap::Parser;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use regex::Regex;
use tracing::info;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| {
    // The pattern is static; failing to compile it is a programming error.
    Regex::new(r"\s+").expect("valid whitespace pattern")
});

const SPACE_SYMBOL: &str = "\u{2581}";

/// Encode text with a BPE model, optionally sampling with BPE-dropout.
#[derive(Parser)]
#[command(name = "bpe_main")]
#[command(version)]
struct Args {
    /// Path to the model JSON (`{"pieces": [...]}`)
    #[arg(short, long)]
    model: PathBuf,

    /// Input text file, one sentence per line ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Merge dropout probability in [0, 1]
    #[arg(short, long, default_value_t = 0.0)]
    alpha: f32,

    /// Seed for reproducible sampling
    #[arg(short, long)]
    seed: Option<u64>,

    /// Do not prepend the space symbol to every line
    #[arg(long, default_value_t = false)]
    no_dummy_prefix: bool,

    /// Write ids only instead of [piece, id] pairs
    #[arg(long, default_value_t = false)]
    ids_only: bool,
}

/// Minimal normalization: whitespace runs become a single space symbol.
fn normalize(line: &str, dummy_prefix: bool) -> String {
    let trimmed = line.trim();
    let escaped: Cow<'_, str> = WHITESPACE.replace_all(trimmed, SPACE_SYMBOL);
    if dummy_prefix && !escaped.is_empty() {
        format!("{SPACE_SYMBOL}{escaped}")
    } else {
        escaped.into_owned()
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let bpe = BPE::from_file(&args.model)
        .with_context(|| format!("failed to load model {}", args.model.display()))?;
    info!(pieces = bpe.get_piece_size(), alpha = args.alpha, "model loaded");

    let reader: Box<dyn BufRead> = if args.input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("failed to open input {}", args.input))?;
        Box::new(BufReader::new(file))
    };
    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let mut rng: Box<dyn RngCore> = match args.seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(rand::thread_rng()),
    };

    let mut total_tokens = 0usize;
    let mut lines = 0usize;
    for line in reader.lines() {
        let line = line?;
        let normalized = normalize(&line, !args.no_dummy_prefix);
        let tokens = bpe.sample_encode_with_rng(&normalized, args.alpha, &mut *rng);
        total_tokens += tokens.len();
        lines += 1;

        let json = if args.ids_only {
            let ids: Vec<u32> = tokens.iter().map(|&(_, id)| id).collect();
            serde_json::to_string(&ids)?
        } else {
            serde_json::to_string(&tokens)?
        };
        writeln!(writer, "{json}")?;
    }
    writer.flush()?;

    info!(lines, total_tokens, "done");
    Ok(())
}
