use structopt::StructOpt;

/// Linear cryptanalysis attack against the 6-round Heys cipher.
#[derive(Clone, StructOpt)]
#[structopt(
    name = "heys-attack",
    about = "Recover the last round key of the Heys cipher via Matsui's Algorithm 2."
)]
pub struct AttackOptions {
    #[structopt(short = "c", long = "corpus")]
    /// Path to a known-plaintext corpus file. If omitted, a synthetic corpus
    /// is generated against a random key (useful with --self-test).
    pub corpus: Option<String>,

    #[structopt(short = "n", long = "corpus-size", default_value = "20000")]
    /// Number of known plaintext/ciphertext pairs to generate when --corpus
    /// is not given.
    pub corpus_size: usize,

    #[structopt(short = "a", long = "alphas", use_delimiter = true)]
    /// Input masks to seed the approximation search from, as hex numbers
    /// (e.g. 0x000F,0x00F0,0x0F00,0xF000). Defaults to one mask per nibble.
    pub alphas: Option<Vec<String>>,

    #[structopt(short = "t", long = "threshold", default_value = "0.00001")]
    /// Branch-and-bound probability threshold below which a mask is pruned.
    pub threshold: f64,

    #[structopt(short = "m", long = "max-approx", default_value = "600")]
    /// Stop searching once this many total approximations are found.
    pub max_approximations: usize,

    #[structopt(short = "k", long = "top-keys", default_value = "100")]
    /// Number of top-scoring keys to keep per approximation in M2.
    pub top_keys: usize,

    #[structopt(short = "p", long = "processes")]
    /// Number of worker threads for M2. Defaults to the number of logical CPUs.
    pub processes: Option<usize>,

    #[structopt(short = "o", long = "approximations-out")]
    /// Path to persist (and, if present, reload) the discovered approximation table.
    pub approximations_path: Option<String>,

    #[structopt(long = "self-test")]
    /// Generate a known key and corpus internally and report whether the
    /// attack recovers the last round key, instead of reading a corpus file.
    pub self_test: bool,
}

impl AttackOptions {
    /// Parses `--alphas` into `u16` masks, falling back to the
    /// single-active-nibble default set.
    pub fn parsed_alphas(&self) -> Vec<u16> {
        match &self.alphas {
            Some(values) => values
                .iter()
                .filter_map(|s| {
                    let s = s.trim();
                    let s = s.strip_prefix("0x").unwrap_or(s);
                    u16::from_str_radix(s, 16).ok()
                })
                .collect(),
            None => vec![0x000F, 0x00F0, 0x0F00, 0xF000],
        }
    }
}
