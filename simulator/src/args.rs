use anyhow::{bail, Context};
use buffet::params::Parameters;

pub enum Cli {
    Help,
    Run(RunConfig),
}

pub struct RunConfig {
    pub params: Parameters,
    /// Fixed seed for a reproducible run; fresh entropy when absent.
    pub seed: Option<u64>,
}

pub fn usage(prog: &str) -> String {
    let defaults = Parameters::default();
    format!(
        "\nUsage: {prog} [OPTION] ...\n\n\
         Options:\n\n\
         \x20 -h, --help                show this help\n\
         \x20 -n, --num-philosophers    set number of philosophers (default is {})\n\
         \x20 -l, --min-life            set minimum number of iterations of philosophers life cycle (default is {})\n\
         \x20 -L, --max-life            set maximum number of iterations of philosophers life cycle (default is {})\n\
         \x20 -f, --num-forks           set number of forks (default is {})\n\
         \x20 -k, --num-knives          set number of knives (default is {})\n\
         \x20 -p, --pizza               set number of pizza meals in each replenish operation (default is {})\n\
         \x20 -s, --spaghetti           set number of spaghetti meals in each replenish operation (default is {})\n\
         \x20 -t, --think-time          set maximum milliseconds for thinking (default is {})\n\
         \x20 -c, --choose-pizza-prob   set probability to choose a pizza meal against a spaghetti meal (default is {})\n\
         \x20 -e, --eat-time            set maximum milliseconds for eating (default is {})\n\
         \x20 -w, --wash-time           set maximum milliseconds for washing (default is {})\n\
         \x20     --seed                fix the random seed for a reproducible run\n",
        defaults.num_philosophers,
        defaults.min_life,
        defaults.max_life,
        defaults.num_forks,
        defaults.num_knives,
        defaults.pizza_batch,
        defaults.spaghetti_batch,
        defaults.think_time_ms,
        defaults.choose_pizza_prob,
        defaults.eat_time_ms,
        defaults.wash_time_ms,
    )
}

pub fn parse(args: &[String]) -> anyhow::Result<Cli> {
    let mut params = Parameters::default();
    let mut seed = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Cli::Help),
            "-n" | "--num-philosophers" => {
                params.num_philosophers = value(&mut iter, "number of philosophers")?;
            }
            "-l" | "--min-life" => {
                params.min_life = value(&mut iter, "minimum philosophers life")?;
            }
            "-L" | "--max-life" => {
                params.max_life = value(&mut iter, "maximum philosophers life")?;
            }
            "-f" | "--num-forks" => {
                params.num_forks = value(&mut iter, "number of forks")?;
            }
            "-k" | "--num-knives" => {
                params.num_knives = value(&mut iter, "number of knives")?;
            }
            "-p" | "--pizza" => {
                params.pizza_batch = value(&mut iter, "number of pizza meals")?;
            }
            "-s" | "--spaghetti" => {
                params.spaghetti_batch = value(&mut iter, "number of spaghetti meals")?;
            }
            "-t" | "--think-time" => {
                params.think_time_ms = value(&mut iter, "think time")?;
            }
            "-c" | "--choose-pizza-prob" => {
                params.choose_pizza_prob =
                    value(&mut iter, "percentage for choosing pizza against spaghetti meals")?;
            }
            "-e" | "--eat-time" => {
                params.eat_time_ms = value(&mut iter, "eat time")?;
            }
            "-w" | "--wash-time" => {
                params.wash_time_ms = value(&mut iter, "wash time")?;
            }
            "--seed" => {
                seed = Some(value(&mut iter, "seed")?);
            }
            extra => bail!("invalid extra argument \"{extra}\""),
        }
    }

    params.validate()?;
    Ok(Cli::Run(RunConfig { params, seed }))
}

fn value<T>(iter: &mut std::slice::Iter<String>, what: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = iter
        .next()
        .with_context(|| format!("missing {what}"))?;
    raw.parse()
        .with_context(|| format!("invalid {what} \"{raw}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_arguments_runs_with_defaults() {
        let Ok(Cli::Run(config)) = parse(&args(&[])) else {
            panic!("expected a run configuration");
        };
        assert_eq!(config.params.num_philosophers, 3);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn long_and_short_flags_are_equivalent() {
        let Ok(Cli::Run(a)) = parse(&args(&["-n", "7", "-c", "25"])) else {
            panic!("expected a run configuration");
        };
        let Ok(Cli::Run(b)) = parse(&args(&["--num-philosophers", "7", "--choose-pizza-prob", "25"]))
        else {
            panic!("expected a run configuration");
        };
        assert_eq!(a.params.num_philosophers, b.params.num_philosophers);
        assert_eq!(a.params.choose_pizza_prob, b.params.choose_pizza_prob);
    }

    #[test]
    fn help_wins_over_everything_else() {
        assert!(matches!(parse(&args(&["-n", "7", "--help"])), Ok(Cli::Help)));
    }

    #[test]
    fn rejects_unknown_arguments() {
        assert!(parse(&args(&["--frobnicate"])).is_err());
    }

    #[test]
    fn rejects_non_numeric_values() {
        let err = parse(&args(&["-t", "soon"])).err().expect("rejected");
        assert!(err.to_string().contains("think time"));
    }

    #[test]
    fn rejects_out_of_range_forks() {
        assert!(parse(&args(&["-f", "1"])).is_err());
    }

    #[test]
    fn seed_is_picked_up() {
        let Ok(Cli::Run(config)) = parse(&args(&["--seed", "1234"])) else {
            panic!("expected a run configuration");
        };
        assert_eq!(config.seed, Some(1234));
    }
}
