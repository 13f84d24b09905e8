//! The evolver: N islands, a barriered parallel loop, and inter-island
//! migration by optimal assignment.
//!
//! Time advances in integer generations from 1 to `tf`. Between migration
//! points every island evolves independently (concurrently when `pll` is
//! set); the calling thread is the barrier coordinator. At each migration
//! point the best-ranked individuals of every island pair are matched by
//! minimizing their summed objective-space distance, each matched pair
//! fights, and the winner overwrites a worst-ranked slot of the opposite
//! island.
//!
//! # References
//!
//! - Cantu-Paz (2000), "Efficient and Accurate Parallel Genetic
//!   Algorithms"
//! - Whitley, Rana & Heckendorn (1999), "The Island Model Genetic
//!   Algorithm: On Separability, Population Size and Convergence"

use crate::config::EvolverConfig;
use crate::error::Result;
use crate::individual::{compare_det, distance, DistanceSpan, Individual};
use crate::island::{fight, Island};
use crate::munkres::Munkres;
use crate::report::save_results;
use crate::rng::create_rng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::{info, warn};

/// Orchestrates the islands and the migration schedule.
pub struct Evolver {
    /// The validated configuration.
    pub conf: EvolverConfig,
    /// The islands, each fully owning its populations and scratch.
    pub islands: Vec<Island>,
    /// Current global best as an (island index, slot) pair. Slots rebind
    /// on every sort, so no long-lived reference is kept.
    pub best: (usize, usize),

    rng: StdRng,
    ova_min: Vec<f64>,
    ova_max: Vec<f64>,
    mdist: Vec<Vec<f64>>,
    match_mig: Munkres,
}

impl Evolver {
    /// Validates the configuration and builds the islands (in parallel
    /// when `pll` is set).
    pub fn new(mut conf: EvolverConfig) -> Result<Self> {
        conf.prepare();
        conf.validate()?;

        let islands: Vec<Island> = if conf.pll && conf.nisl > 1 {
            (0..conf.nisl)
                .into_par_iter()
                .map(|i| Island::new(i, &conf))
                .collect::<Result<_>>()?
        } else {
            (0..conf.nisl)
                .map(|i| Island::new(i, &conf))
                .collect::<Result<_>>()?
        };

        let nimig = conf.nimig;
        let mut evolver = Self {
            rng: create_rng(conf.seed.wrapping_add(conf.nisl as u64)),
            ova_min: vec![0.0; conf.nova],
            ova_max: vec![0.0; conf.nova],
            mdist: vec![vec![0.0; nimig]; nimig],
            match_mig: Munkres::new(nimig, nimig),
            conf,
            islands,
            best: (0, 0),
        };
        evolver.find_best_from_all();
        Ok(evolver)
    }

    /// Runs the evolution to `tf`, migrating every `dtmig` generations.
    pub fn run(&mut self) -> Result<()> {
        let tf = self.conf.tf;
        let mut t = 0usize;
        let mut tout = self.conf.dtout;
        let mut tmig = self.conf.dtmig;

        info!(
            islands = self.islands.len(),
            ninds = self.conf.ninds,
            tf,
            parallel = self.conf.pll,
            "starting evolution"
        );

        while t < tf {
            // Islands evolve independently up to the next barrier.
            let t_end = tf.min(tout.min(tmig));
            if self.conf.pll && self.islands.len() > 1 {
                self.islands.par_iter_mut().try_for_each(|isl| {
                    for time in (t + 1)..=t_end {
                        isl.run_generation(time)?;
                    }
                    Ok::<(), crate::error::EvolveError>(())
                })?;
            } else {
                for isl in self.islands.iter_mut() {
                    for time in (t + 1)..=t_end {
                        isl.run_generation(time)?;
                    }
                }
            }
            t = t_end;

            if t == tmig {
                if self.islands.len() > 1 {
                    self.migration(t);
                }
                tmig = t + self.conf.dtmig;
            }

            self.find_best_from_all();

            if t == tout {
                tout = t + self.conf.dtout;
                if self.conf.verbose {
                    let best = self.best_individual();
                    info!(time = t, best_ovas = ?best.ovas, feasible = best.feasible(), "progress");
                }
            }
        }

        if !self.conf.fn_key.is_empty() {
            save_results(
                &self.conf.dir_out,
                &self.conf.fn_key,
                "final",
                &self.islands,
                self.conf.json,
            );
            for isl in &self.islands {
                isl.save_report();
            }
        }
        Ok(())
    }

    /// Exchanges genetic material between every unordered island pair.
    ///
    /// For each pair, the `nimig` best of each side are matched by a
    /// minimum-cost assignment over their normalized distance (objective
    /// span taken globally across all islands); each matched pair fights
    /// and the winner overwrites the matched worst-block slot of the
    /// losing island. A degenerate assignment skips that pair only.
    pub fn migration(&mut self, t: usize) {
        let nimig = self.conf.nimig;
        let ninds = self.conf.ninds;
        let nisl = self.islands.len();

        // Global objective spans.
        for j in 0..self.conf.nova {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for isl in &self.islands {
                for ind in isl.pop.iter() {
                    lo = lo.min(ind.ovas[j]);
                    hi = hi.max(ind.ovas[j]);
                }
            }
            self.ova_min[j] = lo;
            self.ova_max[j] = hi;
        }

        // Rank layout: best block first, worst block last.
        for isl in self.islands.iter_mut() {
            isl.pop.compute_scores();
            isl.pop.sort_by_rank();
        }

        for i in 0..nisl {
            for j in (i + 1)..nisl {
                let (head, tail) = self.islands.split_at_mut(j);
                let isl_i = &mut head[i];
                let isl_j = &mut tail[0];

                // Normalization spans over the union of both populations.
                let mut span = DistanceSpan::new(
                    isl_i.pop[0].ints.len(),
                    isl_i.pop[0].floats.len(),
                    self.conf.nova,
                );
                span.reset_from(&isl_i.pop[0]);
                for ind in isl_i.pop.iter().skip(1) {
                    span.absorb(ind);
                }
                for ind in isl_j.pop.iter() {
                    span.absorb(ind);
                }
                span.set_ova_span(&self.ova_min, &self.ova_max);

                for r in 0..nimig {
                    for c in 0..nimig {
                        self.mdist[r][c] = distance(
                            &isl_i.pop[r],
                            &isl_j.pop[c],
                            &span,
                            self.conf.dist_ovs,
                        );
                    }
                }
                self.match_mig.set_cost_matrix(&self.mdist);
                if let Err(e) = self.match_mig.run() {
                    warn!(time = t, left = isl_i.id, right = isl_j.id, error = %e,
                        "skipping migration for this island pair");
                    continue;
                }

                for r in 0..nimig {
                    let Some(c) = self.match_mig.links[r] else {
                        continue;
                    };
                    let left_wins = fight(
                        &isl_i.pop[r],
                        &isl_j.pop[c],
                        self.conf.comp_prob,
                        self.conf.pareto_phi,
                        &mut self.rng,
                    );
                    if left_wins {
                        let (src, dst) = (&isl_i.pop, &mut isl_j.pop);
                        src[r].copy_into(&mut dst[ninds - nimig + c]);
                    } else {
                        let (src, dst) = (&isl_j.pop, &mut isl_i.pop);
                        src[c].copy_into(&mut dst[ninds - nimig + r]);
                    }
                }
            }
        }

        // Restore the demerit ordering the updates expect.
        for isl in self.islands.iter_mut() {
            isl.update_demerits_and_sort();
        }
    }

    /// Scans the island heads and selects the global best under the
    /// deterministic comparison.
    pub fn find_best_from_all(&mut self) {
        if self.islands.is_empty() {
            return;
        }
        let mut bi = 0usize;
        for i in 1..self.islands.len() {
            let (candidate_dominates, _) =
                compare_det(&self.islands[i].pop[0], &self.islands[bi].pop[0]);
            if candidate_dominates {
                bi = i;
            }
        }
        self.best = (bi, 0);
    }

    /// The current globally best individual.
    pub fn best_individual(&self) -> &Individual {
        &self.islands[self.best.0].pop[self.best.1]
    }

    /// All feasible individuals across all islands.
    pub fn feasible(&self) -> Vec<&Individual> {
        self.islands
            .iter()
            .flat_map(|isl| isl.pop.iter())
            .filter(|ind| ind.feasible())
            .collect()
    }

    /// Total number of objective evaluations across all islands.
    pub fn nfeval(&self) -> usize {
        self.islands.iter().map(|isl| isl.nfeval).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::{pop_flt_gen, Population};

    /// Quadratic objective with five linear inequality constraints; the
    /// optimum sits at (2/3, 4/3) with f = -74/9.
    fn quadratic_config() -> EvolverConfig {
        EvolverConfig::default()
            .with_nisl(1)
            .with_ninds(24)
            .with_crowd_size(3)
            .with_objectives(1, 5)
            .with_tf(200)
            .with_range_flt(vec![(-2.0, 2.0), (-2.0, 2.0)])
            .with_seed(42)
            .with_pop_flt_gen(pop_flt_gen)
            .with_ova_oor(|ind, _isl, _t, _rep| {
                let x = ind.get_floats();
                ind.ovas[0] =
                    x[0] * x[0] / 2.0 + x[1] * x[1] - x[0] * x[1] - 2.0 * x[0] - 6.0 * x[1];
                let g = [
                    2.0 - x[0] - x[1],
                    2.0 + x[0] - 2.0 * x[1],
                    3.0 - 2.0 * x[0] - x[1],
                    x[0],
                    x[1],
                ];
                for (j, gj) in g.iter().enumerate() {
                    ind.oors[j] = (-gj).max(0.0);
                }
            })
    }

    #[test]
    fn test_quadratic_with_inequalities_converges() {
        let mut evo = Evolver::new(quadratic_config()).unwrap();
        evo.run().unwrap();
        let best = evo.best_individual();
        assert!(best.feasible(), "best must satisfy all constraints");
        let f = best.ovas[0];
        assert!(
            (f - (-74.0 / 9.0)).abs() < 0.15,
            "expected f near -8.222, got {f}"
        );
        let x = best.get_floats();
        assert!((x[0] - 2.0 / 3.0).abs() < 0.25, "x0 = {}", x[0]);
        assert!((x[1] - 4.0 / 3.0).abs() < 0.25, "x1 = {}", x[1]);
    }

    #[test]
    fn test_circle_with_equality_constraint() {
        // Circle centered at (1, 1); linear equality handled as a banded
        // violation with 1e-3 tolerance. The constrained minimum sits at
        // (ys, ys) with f = -0.4.
        let xe = 1.0f64;
        let le = -0.4f64;
        let ys = xe - (1.0 + le) / std::f64::consts::SQRT_2;
        let y0 = 2.0 * ys + xe;

        let conf = EvolverConfig::default()
            .with_nisl(4)
            .with_ninds(24)
            .with_crowd_size(2)
            .with_objectives(1, 1)
            .with_tf(400)
            .with_dtmig(50)
            .with_range_flt(vec![(-1.0, 3.0), (-1.0, 3.0)])
            .with_seed(42)
            .with_pop_flt_gen(pop_flt_gen)
            .with_ova_oor(move |ind, _isl, _t, _rep| {
                let x = ind.get_floats();
                let r = ((x[0] - xe).powi(2) + (x[1] - xe).powi(2)).sqrt();
                ind.ovas[0] = r - 1.0;
                let h = (x[0] + x[1] + xe - y0).abs();
                ind.oors[0] = if h > 1e-3 { h } else { 0.0 };
            });

        let mut evo = Evolver::new(conf).unwrap();
        evo.run().unwrap();
        let best = evo.best_individual();
        let x = best.get_floats();
        let h = (x[0] + x[1] + xe - y0).abs();
        assert!(h <= 1e-3, "equality residual too large: {h}");
        assert!(
            (best.ovas[0] - le).abs() < 0.15,
            "expected f near {le}, got {}",
            best.ovas[0]
        );
    }

    #[test]
    fn test_multimodal_sin6_finds_a_peak() {
        let conf = EvolverConfig::default()
            .with_nisl(4)
            .with_ninds(24)
            .with_crowd_size(3)
            .with_objectives(1, 0)
            .with_tf(150)
            .with_dtmig(60)
            .with_comp_prob(0.01)
            .with_range_flt(vec![(0.0, 0.9999999999999)])
            .with_seed(42)
            .with_pop_flt_gen(pop_flt_gen)
            .with_ova_oor(|ind, _isl, _t, _rep| {
                let x = ind.get_float(0);
                ind.ovas[0] = -(5.0 * std::f64::consts::PI * x).sin().powi(6);
            });

        let mut evo = Evolver::new(conf).unwrap();
        evo.run().unwrap();
        let best = evo.best_individual();
        assert!(
            best.ovas[0] < -0.85,
            "best should sit near a peak, got {}",
            best.ovas[0]
        );
        let x = best.get_float(0);
        let peaks = [0.1, 0.3, 0.5, 0.7, 0.9];
        let nearest = peaks.iter().map(|p| (x - p).abs()).fold(f64::INFINITY, f64::min);
        assert!(nearest < 0.03, "x = {x} is not close to any peak");
    }

    #[test]
    fn test_multiobjective_run_keeps_tradeoff() {
        // Schaffer problem #1: f0 = x^2, f1 = (x - 2)^2. The Pareto set
        // is x in [0, 2]; no single point dominates the front.
        let conf = EvolverConfig::default()
            .with_nisl(2)
            .with_ninds(20)
            .with_crowd_size(2)
            .with_objectives(2, 0)
            .with_tf(60)
            .with_dtmig(20)
            .with_range_flt(vec![(-4.0, 4.0)])
            .with_seed(42)
            .with_pop_flt_gen(pop_flt_gen)
            .with_ova_oor(|ind, _isl, _t, _rep| {
                let x = ind.get_float(0);
                ind.ovas[0] = x * x;
                ind.ovas[1] = (x - 2.0) * (x - 2.0);
            });

        let mut evo = Evolver::new(conf).unwrap();
        evo.run().unwrap();
        // Most of the final population should be inside the Pareto set.
        let inside = evo
            .feasible()
            .iter()
            .filter(|ind| {
                let x = ind.get_float(0);
                (-0.2..=2.2).contains(&x)
            })
            .count();
        assert!(
            inside >= 20,
            "expected at least half of 40 individuals near the Pareto set, got {inside}"
        );
    }

    #[test]
    fn test_migration_determinism_with_seeded_populations() {
        // Two islands with hand-crafted objective layouts: every best of
        // island 0 dominates every best of island 1, so after one
        // migration step island 1's worst block holds copies of island
        // 0's best and island 0 is untouched.
        let conf = EvolverConfig::default()
            .with_nisl(2)
            .with_ninds(4)
            .with_crowd_size(2)
            .with_nimig(2)
            .with_objectives(1, 0)
            .with_tf(1)
            .with_dtmig(1)
            .with_seed(7)
            .with_range_flt(vec![(0.0, 100.0)])
            .with_pop_flt_gen(|id, conf, rng| {
                let base = if id == 0 { 1.0 } else { 10.0 };
                let genes: Vec<Vec<f64>> = (0..conf.ninds)
                    .map(|i| vec![base * (i + 1) as f64])
                    .collect();
                let mut pop = Population::default();
                for row in &genes {
                    pop.push(Individual::new(conf.nova, conf.noor).with_floats(row, 1, rng));
                }
                pop
            })
            .with_ova_oor(|ind, _isl, _t, _rep| {
                ind.ovas[0] = ind.get_float(0);
            });

        let mut evo = Evolver::new(conf).unwrap();
        // Exercise the migration step in isolation.
        evo.migration(1);

        // Island 0 keeps its original individuals (1, 2, 3, 4).
        let isl0: Vec<f64> = evo.islands[0].pop.iter().map(|i| i.ovas[0]).collect();
        assert_eq!(isl0, vec![1.0, 2.0, 3.0, 4.0]);

        // Island 1 now holds its own best (10, 20) plus the two winners
        // (1, 2) in place of its worst block.
        let mut isl1: Vec<f64> = evo.islands[1].pop.iter().map(|i| i.ovas[0]).collect();
        isl1.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(isl1, vec![1.0, 2.0, 10.0, 20.0]);
    }

    #[test]
    fn test_migration_preserves_population_sizes() {
        let conf = quadratic_config().with_nisl(3).with_dtmig(10).with_tf(40);
        let mut evo = Evolver::new(conf).unwrap();
        evo.run().unwrap();
        for isl in &evo.islands {
            assert_eq!(isl.pop.len(), 24);
            assert_eq!(isl.bkp.len(), 24);
        }
    }

    #[test]
    fn test_parallel_matches_serial() {
        // Islands own their random streams and the coordinator owns the
        // migration stream, so the parallel schedule cannot change the
        // arithmetic: both runs land on the same best.
        let serial_conf = quadratic_config().with_nisl(4).with_tf(50).with_pll(false);
        let parallel_conf = quadratic_config().with_nisl(4).with_tf(50).with_pll(true);

        let mut serial = Evolver::new(serial_conf).unwrap();
        serial.run().unwrap();
        let mut parallel = Evolver::new(parallel_conf).unwrap();
        parallel.run().unwrap();

        assert_eq!(
            serial.best_individual().ovas,
            parallel.best_individual().ovas
        );
        assert_eq!(
            serial.best_individual().get_floats(),
            parallel.best_individual().get_floats()
        );
    }

    #[test]
    fn test_find_best_across_islands() {
        let conf = quadratic_config().with_nisl(3).with_tf(10);
        let mut evo = Evolver::new(conf).unwrap();
        evo.run().unwrap();
        evo.find_best_from_all();
        let best = evo.best_individual().clone();
        for isl in &evo.islands {
            let (head_dominates, _) = compare_det(&isl.pop[0], &best);
            assert!(
                !head_dominates,
                "no island head may dominate the selected best"
            );
        }
    }

    #[test]
    fn test_invalid_config_refuses_to_start() {
        let conf = quadratic_config().with_ninds(13);
        assert!(Evolver::new(conf).is_err());
    }

    #[test]
    fn test_nfeval_counts_initial_evaluations() {
        let conf = quadratic_config().with_tf(1).with_nisl(2);
        let evo = Evolver::new(conf).unwrap();
        // Two islands, 24 individuals each, evaluated once at setup.
        assert_eq!(evo.nfeval(), 48);
    }
}
