use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pedlod-rs", author, version, about, styles=get_styles())]
pub struct Arguments {
    /// pedigree file: one member per line, tab-delimited
    /// `<family> <person> <father> <mother> <affection> <genotypes>...`
    #[arg(short = 'p', long, required = true)]
    pub ped_file: String,

    /// marker map file: tab-delimited `<name> <position cM> <minor freq>`
    #[arg(short = 'm', long, required = true)]
    pub map_file: String,

    /// disease model file (toml with `frequency` and `penetrance`)
    #[arg(short = 'd', long, required = true)]
    pub disease_file: String,

    /// output file for the LOD table; stdout-adjacent default
    #[arg(short = 'o', long, default_value = "pedlod.out")]
    pub output: String,

    /// MCMC iterations per pedigree
    #[arg(short = 'i', long, default_value = "100000", help_heading = "MCMC")]
    pub iterations: usize,

    /// fraction of iterations discarded as burn-in
    #[arg(long, default_value = "0.1", help_heading = "MCMC")]
    pub burnin: f64,

    /// iterations between scoring samples
    #[arg(long, default_value = "10", help_heading = "MCMC")]
    pub sample_period: usize,

    /// sequential imputation attempts for the starting state
    #[arg(long, default_value = "100", help_heading = "MCMC")]
    pub si_trials: usize,

    /// probability of a locus update per iteration (the rest are meiosis
    /// updates)
    #[arg(long, default_value = "0.5", help_heading = "MCMC")]
    pub lsampler_prob: f64,

    /// flattens recombination fractions toward 0.5; 0 disables
    #[arg(long, default_value = "0.0", help_heading = "MCMC")]
    pub temperature: f64,

    /// base seed; each pedigree derives its own stream from it
    #[arg(long, help_heading = "MCMC")]
    pub seed: Option<u64>,

    /// number of threads for running pedigrees in parallel. 0 means using
    /// all logical cpus
    #[arg(long, default_value = "0", help_heading = "Parallelization")]
    pub num_threads: usize,

    /// print progress lines to stderr
    #[arg(long, default_value = "false")]
    pub print_progress: bool,
}

impl Arguments {
    pub fn new_for_test() -> Self {
        Arguments {
            ped_file: "testdata/trio.ped".into(),
            map_file: "testdata/trio.map".into(),
            disease_file: "testdata/disease.toml".into(),
            output: "tmp_pedlod.out".into(),
            iterations: 1000,
            burnin: 0.1,
            sample_period: 10,
            si_trials: 10,
            lsampler_prob: 0.5,
            temperature: 0.0,
            seed: Some(0),
            num_threads: 1,
            print_progress: false,
        }
    }
}

pub fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .header(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .literal(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .invalid(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .valid(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .placeholder(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Arguments::command().debug_assert();
    }

    #[test]
    fn parses_minimal_invocation() {
        let args = Arguments::parse_from([
            "pedlod-rs",
            "-p",
            "fam.ped",
            "-m",
            "markers.map",
            "-d",
            "disease.toml",
        ]);
        assert_eq!(args.iterations, 100_000);
        assert_eq!(args.sample_period, 10);
        assert!(args.seed.is_none());
    }
}
