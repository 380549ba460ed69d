use anyhow::bail;

/// Everything the simulation can be configured with. Validated once, before
/// any shared state or participant exists.
#[derive(Debug, Clone)]
pub struct Parameters {
    pub num_philosophers: u32,
    /// Bounds for the number of think-eat-wash cycles a philosopher lives,
    /// drawn once at birth.
    pub min_life: u32,
    pub max_life: u32,
    pub num_forks: u32,
    pub num_knives: u32,
    /// Portions added per replenish operation; the table also starts with
    /// one batch of each food.
    pub pizza_batch: u32,
    pub spaghetti_batch: u32,
    pub think_time_ms: u64,
    /// Probability (0-100) of picking pizza over spaghetti when hungry.
    pub choose_pizza_prob: u32,
    pub eat_time_ms: u64,
    pub wash_time_ms: u64,
}

impl Default for Parameters {
    fn default() -> Parameters {
        Parameters {
            num_philosophers: 3,
            min_life: 10,
            max_life: 100,
            num_forks: 3,
            num_knives: 2,
            pizza_batch: 10,
            spaghetti_batch: 10,
            think_time_ms: 20,
            choose_pizza_prob: 50,
            eat_time_ms: 10,
            wash_time_ms: 15,
        }
    }
}

impl Parameters {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.num_philosophers < 1 {
            bail!("invalid number of philosophers \"{}\"", self.num_philosophers);
        }
        if self.max_life < self.min_life {
            bail!(
                "invalid maximum philosophers life \"{}\" (minimum is {})",
                self.max_life,
                self.min_life
            );
        }
        if self.num_forks < 2 {
            bail!("invalid number of forks \"{}\"", self.num_forks);
        }
        if self.num_knives < 1 {
            bail!("invalid number of knives \"{}\"", self.num_knives);
        }
        if self.pizza_batch < 1 {
            bail!("invalid number of pizza meals \"{}\"", self.pizza_batch);
        }
        if self.spaghetti_batch < 1 {
            bail!("invalid number of spaghetti meals \"{}\"", self.spaghetti_batch);
        }
        if self.choose_pizza_prob > 100 {
            bail!(
                "invalid percentage for choosing pizza against spaghetti meals \"{}\"",
                self.choose_pizza_prob
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Parameters::default().validate().is_ok());
    }

    #[test]
    fn rejects_too_few_forks() {
        let params = Parameters {
            num_forks: 1,
            ..Parameters::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_zero_philosophers() {
        let params = Parameters {
            num_philosophers: 0,
            ..Parameters::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_life_bounds_out_of_order() {
        let params = Parameters {
            min_life: 5,
            max_life: 4,
            ..Parameters::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_probability_above_100() {
        let params = Parameters {
            choose_pizza_prob: 101,
            ..Parameters::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn zero_life_bounds_are_valid() {
        let params = Parameters {
            min_life: 0,
            max_life: 0,
            ..Parameters::default()
        };
        assert!(params.validate().is_ok());
    }
}
