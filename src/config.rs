//! Engine configuration.
//!
//! [`EvolverConfig`] is a single immutable bundle holding sizes, schedule,
//! GA variant, operator parameters, selection and regeneration settings,
//! float-gene ranges, output options and the user callbacks. It is
//! validated once, before any island is built; a rejected configuration
//! never starts evolving.

use crate::bingo::Bingo;
use crate::error::{EvolveError, Result};
use crate::individual::Individual;
use crate::operators::{OpParams, OperatorRegistry};
use crate::population::Population;
use crate::report::Report;
use rand::rngs::StdRng;
use std::fmt;
use std::sync::Arc;

/// Objective/constraint callback.
///
/// Fills `ind.ovas` and `ind.oors` for one individual. Arguments:
/// individual, island id, generation, report sink. Every written `oors`
/// entry must be non-negative; zero means the constraint is satisfied.
pub type ObjFn = Arc<dyn Fn(&mut Individual, usize, usize, &mut Report) + Send + Sync>;

/// Population generator: `(island id, config, rng)` to a full population.
pub type PopGen = Arc<dyn Fn(usize, &EvolverConfig, &mut StdRng) -> Population + Send + Sync>;

/// Post-processing hook called after every generation:
/// `(island id, generation, population)`.
pub type PostProcFn = Arc<dyn Fn(usize, usize, &Population) + Send + Sync>;

/// Which evolutionary update an island runs each generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GaType {
    /// Niching via random crowds, assignment-matched tournaments.
    #[default]
    Crowd,
    /// Fitness-proportional or rank-based selection with roulette/SUS
    /// sampling.
    Standard,
}

/// Configuration for the island-model evolver.
#[derive(Clone)]
pub struct EvolverConfig {
    /// Number of islands.
    pub nisl: usize,
    /// Individuals per island. Must be even and, for the crowding update,
    /// a multiple of `crowd_size`.
    pub ninds: usize,
    /// Number of objective values.
    pub nova: usize,
    /// Number of constraint-violation values.
    pub noor: usize,
    /// Bases per float gene.
    pub nbases: usize,
    /// Individuals exchanged per island pair at migration.
    pub nimig: usize,
    /// Crowd size for the niching tournament.
    pub crowd_size: usize,

    /// Final generation.
    pub tf: usize,
    /// Generations between progress outputs.
    pub dtout: usize,
    /// Generations between migrations.
    pub dtmig: usize,

    /// Update variant.
    pub ga_type: GaType,
    /// Run islands concurrently.
    pub pll: bool,

    /// Operator parameters.
    pub ops: OpParams,
    /// Named-operator registry for float crossovers.
    pub registry: OperatorRegistry,

    /// Elitism: previous best survives if it dominates the new worst.
    pub elite: bool,
    /// Standard update: rank-based fitness instead of scaled demerit.
    pub rnk: bool,
    /// Selective pressure for rank-based fitness, in `[1, 2]`.
    pub rnk_sp: f64,
    /// Standard update: roulette-wheel sampling instead of stochastic
    /// universal sampling.
    pub rws: bool,
    /// Probabilistic tournaments instead of deterministic ones.
    pub comp_prob: bool,
    /// Phi parameter of the probabilistic Pareto comparison.
    pub pareto_phi: f64,
    /// Include objective values in the niching distance.
    pub dist_ovs: bool,

    /// Regeneration tolerance on the diversity statistic rho.
    pub reg_tol: f64,
    /// Fraction of the population regenerated when rho collapses.
    pub reg_pct: f64,
    /// Use standard deviation instead of mean absolute deviation for rho.
    pub use_std_dev: bool,

    /// Grid-based initial placement for the built-in float generator.
    pub grid: bool,
    /// Multiplicative jitter applied to grid nodes.
    pub noise: f64,
    /// Latin-hypercube initial placement (overrides `grid`).
    pub latin: bool,
    /// Base random seed; island `i` derives its stream from `seed + i`.
    pub seed: u64,

    /// Min/max of each logical float gene.
    pub range_flt: Vec<(f64, f64)>,
    /// Optional value pool for generators and pool-backed mutations.
    pub bingo: Option<Bingo>,

    /// Output directory for reports and results.
    pub dir_out: String,
    /// Filename key; empty disables file output.
    pub fn_key: String,
    /// Log progress.
    pub verbose: bool,
    /// Accumulate per-generation report text.
    pub do_report: bool,
    /// Persist results as JSON instead of tables.
    pub json: bool,

    /// Objective/constraint callback (required).
    pub ova_oor: Option<ObjFn>,
    /// Population generators, first configured one wins, probed in gene
    /// kind order.
    pub pop_int_gen: Option<PopGen>,
    pub pop_flt_gen: Option<PopGen>,
    pub pop_str_gen: Option<PopGen>,
    pub pop_key_gen: Option<PopGen>,
    pub pop_byt_gen: Option<PopGen>,
    pub pop_fun_gen: Option<PopGen>,
    /// Optional per-generation hook.
    pub post_proc: Option<PostProcFn>,
}

impl Default for EvolverConfig {
    fn default() -> Self {
        Self {
            nisl: 1,
            ninds: 20,
            nova: 1,
            noor: 0,
            nbases: 1,
            nimig: 2,
            crowd_size: 2,
            tf: 100,
            dtout: 10,
            dtmig: 30,
            ga_type: GaType::default(),
            pll: false,
            ops: OpParams::default(),
            registry: OperatorRegistry::default(),
            elite: true,
            rnk: true,
            rnk_sp: 1.2,
            rws: false,
            comp_prob: false,
            pareto_phi: 0.01,
            dist_ovs: true,
            reg_tol: 1e-3,
            reg_pct: 0.3,
            use_std_dev: false,
            grid: true,
            noise: 0.2,
            latin: false,
            seed: 0,
            range_flt: Vec::new(),
            bingo: None,
            dir_out: "/tmp/archipelago".into(),
            fn_key: String::new(),
            verbose: false,
            do_report: false,
            json: false,
            ova_oor: None,
            pop_int_gen: None,
            pop_flt_gen: None,
            pop_str_gen: None,
            pop_key_gen: None,
            pop_byt_gen: None,
            pop_fun_gen: None,
            post_proc: None,
        }
    }
}

impl EvolverConfig {
    /// Sets the number of islands.
    pub fn with_nisl(mut self, n: usize) -> Self {
        self.nisl = n;
        self
    }

    /// Sets the population size per island.
    pub fn with_ninds(mut self, n: usize) -> Self {
        self.ninds = n;
        self
    }

    /// Sets the number of objectives and constraints.
    pub fn with_objectives(mut self, nova: usize, noor: usize) -> Self {
        self.nova = nova;
        self.noor = noor;
        self
    }

    /// Sets the number of bases per float gene.
    pub fn with_nbases(mut self, n: usize) -> Self {
        self.nbases = n.max(1);
        self
    }

    /// Sets the number of migrants per island pair.
    pub fn with_nimig(mut self, n: usize) -> Self {
        self.nimig = n;
        self
    }

    /// Sets the crowd size.
    pub fn with_crowd_size(mut self, n: usize) -> Self {
        self.crowd_size = n;
        self
    }

    /// Sets the final generation.
    pub fn with_tf(mut self, tf: usize) -> Self {
        self.tf = tf;
        self
    }

    /// Sets the output interval.
    pub fn with_dtout(mut self, dt: usize) -> Self {
        self.dtout = dt.max(1);
        self
    }

    /// Sets the migration interval.
    pub fn with_dtmig(mut self, dt: usize) -> Self {
        self.dtmig = dt.max(1);
        self
    }

    /// Sets the GA variant.
    pub fn with_ga_type(mut self, t: GaType) -> Self {
        self.ga_type = t;
        self
    }

    /// Enables or disables parallel islands.
    pub fn with_pll(mut self, pll: bool) -> Self {
        self.pll = pll;
        self
    }

    /// Sets the operator parameters.
    pub fn with_ops(mut self, ops: OpParams) -> Self {
        self.ops = ops;
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the float gene ranges.
    pub fn with_range_flt(mut self, ranges: Vec<(f64, f64)>) -> Self {
        self.range_flt = ranges;
        self
    }

    /// Enables probabilistic tournaments with the given phi.
    pub fn with_comp_prob(mut self, phi: f64) -> Self {
        self.comp_prob = true;
        self.pareto_phi = phi;
        self
    }

    /// Enables or disables elitism.
    pub fn with_elite(mut self, elite: bool) -> Self {
        self.elite = elite;
        self
    }

    /// Sets the regeneration parameters.
    pub fn with_regeneration(mut self, tol: f64, pct: f64) -> Self {
        self.reg_tol = tol;
        self.reg_pct = pct.clamp(0.0, 1.0);
        self
    }

    /// Sets the grid noise multiplier.
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.max(0.0);
        self
    }

    /// Selects Latin-hypercube initial placement.
    pub fn with_latin(mut self, latin: bool) -> Self {
        self.latin = latin;
        self
    }

    /// Sets the objective/constraint callback.
    pub fn with_ova_oor(
        mut self,
        f: impl Fn(&mut Individual, usize, usize, &mut Report) + Send + Sync + 'static,
    ) -> Self {
        self.ova_oor = Some(Arc::new(f));
        self
    }

    /// Sets the float population generator.
    pub fn with_pop_flt_gen(
        mut self,
        f: impl Fn(usize, &EvolverConfig, &mut StdRng) -> Population + Send + Sync + 'static,
    ) -> Self {
        self.pop_flt_gen = Some(Arc::new(f));
        self
    }

    /// Sets the post-processing hook.
    pub fn with_post_proc(
        mut self,
        f: impl Fn(usize, usize, &Population) + Send + Sync + 'static,
    ) -> Self {
        self.post_proc = Some(Arc::new(f));
        self
    }

    /// Propagates derived operator fields (gene ranges, base count) into
    /// [`OpParams`]. Called by the evolver before validation.
    pub fn prepare(&mut self) {
        self.ops.xrange = self.range_flt.clone();
        self.ops.nbases = self.nbases.max(1);
    }

    /// Returns the first configured population generator, probed in gene
    /// kind order.
    pub fn generator(&self) -> Option<&PopGen> {
        self.pop_int_gen
            .as_ref()
            .or(self.pop_flt_gen.as_ref())
            .or(self.pop_str_gen.as_ref())
            .or(self.pop_key_gen.as_ref())
            .or(self.pop_byt_gen.as_ref())
            .or(self.pop_fun_gen.as_ref())
    }

    /// Validates the configuration.
    ///
    /// Every rejection here is fatal: the evolver refuses to start.
    pub fn validate(&self) -> Result<()> {
        if self.ova_oor.is_none() {
            return Err(EvolveError::Config(
                "objective callback (ova_oor) must be set".into(),
            ));
        }
        if self.generator().is_none() {
            return Err(EvolveError::Config(
                "at least one population generator must be set".into(),
            ));
        }
        if self.nisl < 1 {
            return Err(EvolveError::Config("nisl must be at least 1".into()));
        }
        if self.ninds < 2 || self.ninds % 2 != 0 {
            return Err(EvolveError::Config(format!(
                "population size must be even and at least 2, got {}",
                self.ninds
            )));
        }
        if self.ninds < self.nisl {
            return Err(EvolveError::Config(format!(
                "population size {} must not be smaller than the number of islands {}",
                self.ninds, self.nisl
            )));
        }
        if self.ga_type == GaType::Crowd {
            if self.crowd_size < 2 {
                return Err(EvolveError::Config(
                    "crowd_size must be at least 2".into(),
                ));
            }
            if self.ninds % self.crowd_size != 0 {
                return Err(EvolveError::Config(format!(
                    "population size {} must be a multiple of crowd_size {}",
                    self.ninds, self.crowd_size
                )));
            }
        }
        if self.nisl > 1 && (self.nimig < 1 || self.nimig > self.ninds / 2) {
            return Err(EvolveError::Config(format!(
                "nimig must be in [1, ninds/2], got {}",
                self.nimig
            )));
        }
        if self.nova < 1 {
            return Err(EvolveError::Config("nova must be at least 1".into()));
        }
        if self.tf < 1 {
            return Err(EvolveError::Config("tf must be at least 1".into()));
        }
        if self.dtout < 1 || self.dtmig < 1 {
            return Err(EvolveError::Config(
                "dtout and dtmig must be at least 1".into(),
            ));
        }
        if !self.range_flt.is_empty() {
            for (g, &(lo, hi)) in self.range_flt.iter().enumerate() {
                if hi < lo {
                    return Err(EvolveError::Config(format!(
                        "range_flt[{g}] is inverted: [{lo}, {hi}]"
                    )));
                }
            }
        }
        if !(1.0..=2.0).contains(&self.rnk_sp) {
            return Err(EvolveError::Config(format!(
                "rnk_sp must be in [1, 2], got {}",
                self.rnk_sp
            )));
        }
        for (name, p) in [
            ("pc", self.ops.pc),
            ("pm", self.ops.pm),
            ("de_pc", self.ops.de_pc),
            ("reg_pct", self.reg_pct),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(EvolveError::Config(format!(
                    "{name} must be a probability in [0, 1], got {p}"
                )));
            }
        }
        if self.registry.resolve_flt_cx(&self.ops.flt_cx_name).is_none() {
            return Err(EvolveError::Config(format!(
                "unknown float crossover {:?}",
                self.ops.flt_cx_name
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for EvolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvolverConfig")
            .field("nisl", &self.nisl)
            .field("ninds", &self.ninds)
            .field("nova", &self.nova)
            .field("noor", &self.noor)
            .field("nbases", &self.nbases)
            .field("nimig", &self.nimig)
            .field("crowd_size", &self.crowd_size)
            .field("tf", &self.tf)
            .field("dtout", &self.dtout)
            .field("dtmig", &self.dtmig)
            .field("ga_type", &self.ga_type)
            .field("pll", &self.pll)
            .field("ops", &self.ops)
            .field("elite", &self.elite)
            .field("comp_prob", &self.comp_prob)
            .field("pareto_phi", &self.pareto_phi)
            .field("reg_tol", &self.reg_tol)
            .field("reg_pct", &self.reg_pct)
            .field("seed", &self.seed)
            .field("range_flt", &self.range_flt)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::pop_flt_gen;

    fn valid_config() -> EvolverConfig {
        EvolverConfig::default()
            .with_ninds(12)
            .with_crowd_size(3)
            .with_range_flt(vec![(-1.0, 1.0)])
            .with_ova_oor(|ind, _isl, _t, _rep| {
                ind.ovas[0] = ind.get_float(0).powi(2);
            })
            .with_pop_flt_gen(pop_flt_gen)
    }

    #[test]
    fn test_default_values() {
        let c = EvolverConfig::default();
        assert_eq!(c.nisl, 1);
        assert_eq!(c.ninds, 20);
        assert_eq!(c.tf, 100);
        assert_eq!(c.dtmig, 30);
        assert_eq!(c.ga_type, GaType::Crowd);
        assert!(c.elite);
        assert!(!c.pll);
        assert!((c.reg_tol - 1e-3).abs() < 1e-15);
    }

    #[test]
    fn test_valid_config_passes() {
        let mut c = valid_config();
        c.prepare();
        assert!(c.validate().is_ok());
        assert_eq!(c.ops.xrange, vec![(-1.0, 1.0)]);
    }

    #[test]
    fn test_missing_callback_rejected() {
        let mut c = valid_config();
        c.ova_oor = None;
        assert!(matches!(c.validate(), Err(EvolveError::Config(_))));
    }

    #[test]
    fn test_missing_generator_rejected() {
        let mut c = valid_config();
        c.pop_flt_gen = None;
        assert!(matches!(c.validate(), Err(EvolveError::Config(_))));
    }

    #[test]
    fn test_odd_population_rejected() {
        let c = valid_config().with_ninds(13);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_crowd_size_divisibility() {
        let c = valid_config().with_ninds(10).with_crowd_size(3);
        assert!(c.validate().is_err());
        let c = valid_config().with_ninds(12).with_crowd_size(3);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_ninds_smaller_than_nisl_rejected() {
        let c = valid_config().with_nisl(16).with_ninds(8).with_crowd_size(2);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_nimig_bounds() {
        let c = valid_config().with_nisl(2).with_nimig(7); // > ninds/2
        assert!(c.validate().is_err());
        let c = valid_config().with_nisl(2).with_nimig(6);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let c = valid_config().with_range_flt(vec![(1.0, -1.0)]);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_rnk_sp_bounds() {
        let mut c = valid_config();
        c.rnk_sp = 2.5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_unknown_crossover_rejected() {
        let mut c = valid_config();
        c.ops.flt_cx_name = "does-not-exist".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_custom_crossover_accepted_after_registration() {
        let mut c = valid_config();
        c.ops.flt_cx_name = "mine".into();
        assert!(c.validate().is_err());
        c.registry.register_flt_cx("mine", crate::operators::blend_crossover);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let c = EvolverConfig::default()
            .with_nisl(4)
            .with_ninds(24)
            .with_objectives(2, 3)
            .with_tf(500)
            .with_dtmig(50)
            .with_seed(7)
            .with_comp_prob(0.05)
            .with_pll(true);
        assert_eq!(c.nisl, 4);
        assert_eq!(c.ninds, 24);
        assert_eq!(c.nova, 2);
        assert_eq!(c.noor, 3);
        assert_eq!(c.tf, 500);
        assert_eq!(c.dtmig, 50);
        assert_eq!(c.seed, 7);
        assert!(c.comp_prob);
        assert!((c.pareto_phi - 0.05).abs() < 1e-15);
        assert!(c.pll);
    }
}
