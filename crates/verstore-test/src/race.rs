//! Race Fuzzer - Overlapping writes checked against a reference model
//!
//! Scripts interleave immediate writes, deferred writes and the settling of
//! deferred writes in random order. Each script runs against a real store
//! and against [`RaceModel`]; the two must agree on:
//! - the notification sequence
//! - the final state and revision
//! - the outcome of every write's completion

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use verstore_core::{Completion, Snapshot, StoreError, StoreResult};
use verstore_state::{Store, StoreConfig};

use crate::{gate, Gate, HarnessError, HarnessResult, SnapshotRecorder};

/// Value type of fuzzed stores
pub type Value = u64;

/// Error type of fuzzed stores
pub type Failure = String;

/// Initial value of fuzzed stores
pub const INITIAL_VALUE: Value = 0;

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    /// Number of writes to issue
    pub write_count: usize,
    /// Probability that a write is deferred (0.0 - 1.0)
    pub deferred_prob: f64,
    /// Probability that a deferred write fails
    pub reject_prob: f64,
    /// Probability of settling one pending write after each write
    pub settle_prob: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            write_count: 100,
            deferred_prob: 0.6,
            reject_prob: 0.2,
            settle_prob: 0.3,
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            write_count: 10,
            deferred_prob: 0.5,
            reject_prob: 0.2,
            settle_prob: 0.3,
            seed: 42,
        }
    }

    /// Heavy fuzzing with many overlapping writes
    pub fn heavy() -> Self {
        FuzzerConfig {
            write_count: 2000,
            deferred_prob: 0.8,
            reject_prob: 0.25,
            settle_prob: 0.2,
            seed: 42,
        }
    }
}

/// One step of a race script
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Write an immediate value
    Immediate(Value),
    /// Start a deferred write; `fails` decides how it settles
    Deferred { value: Value, fails: bool },
    /// Settle the deferred write issued as write number `write`
    Settle { write: usize },
}

/// Error payload of a failing deferred write
pub fn failure_for(write: usize) -> Failure {
    format!("write {} failed", write)
}

/// Generate a script; every deferred write is settled exactly once
pub fn generate_script(config: &FuzzerConfig) -> Vec<Step> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut steps = Vec::new();
    let mut unsettled: Vec<usize> = Vec::new();

    for write in 0..config.write_count {
        let value = rng.gen_range(1..1_000_000);
        if rng.gen::<f64>() < config.deferred_prob {
            let fails = rng.gen::<f64>() < config.reject_prob;
            steps.push(Step::Deferred { value, fails });
            unsettled.push(write);
        } else {
            steps.push(Step::Immediate(value));
        }

        if !unsettled.is_empty() && rng.gen::<f64>() < config.settle_prob {
            let idx = rng.gen_range(0..unsettled.len());
            steps.push(Step::Settle {
                write: unsettled.swap_remove(idx),
            });
        }
    }

    // Remaining writes settle in random order
    unsettled.shuffle(&mut rng);
    steps.extend(unsettled.into_iter().map(|write| Step::Settle { write }));
    steps
}

/// Reference model of the store's write protocol
#[derive(Debug)]
pub struct RaceModel {
    revision: u64,
    state: Snapshot<Value, Failure>,
    writes: usize,
    pending: HashMap<usize, (u64, Result<Value, Failure>)>,
    notifications: Vec<Snapshot<Value, Failure>>,
    outcomes: HashMap<usize, StoreResult<Value, Failure>>,
}

impl RaceModel {
    pub fn new(initial: Value) -> Self {
        RaceModel {
            revision: 0,
            state: Snapshot::HasValue(initial),
            writes: 0,
            pending: HashMap::new(),
            notifications: Vec::new(),
            outcomes: HashMap::new(),
        }
    }

    /// Apply one step
    pub fn apply(&mut self, step: &Step) -> HarnessResult<()> {
        match step {
            Step::Immediate(value) => {
                let write = self.next_write();
                self.transition(Snapshot::HasValue(*value));
                self.outcomes.insert(write, Ok(*value));
            }
            Step::Deferred { value, fails } => {
                let write = self.next_write();
                self.transition(Snapshot::Loading);
                let outcome = if *fails {
                    Err(failure_for(write))
                } else {
                    Ok(*value)
                };
                self.pending.insert(write, (self.revision, outcome));
            }
            Step::Settle { write } => {
                let (revision, outcome) = self
                    .pending
                    .remove(write)
                    .ok_or(HarnessError::NotPending(*write))?;

                if revision == self.revision {
                    let settled = match &outcome {
                        Ok(value) => Snapshot::HasValue(*value),
                        Err(error) => Snapshot::HasError(error.clone()),
                    };
                    self.state = settled.clone();
                    self.notifications.push(settled);
                    self.outcomes
                        .insert(*write, outcome.map_err(StoreError::Upstream));
                } else {
                    self.outcomes.insert(*write, Err(StoreError::Canceled));
                }
            }
        }
        Ok(())
    }

    fn next_write(&mut self) -> usize {
        self.revision += 1;
        self.writes += 1;
        self.writes - 1
    }

    fn transition(&mut self, state: Snapshot<Value, Failure>) {
        self.state = state.clone();
        self.notifications.push(state);
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn state(&self) -> &Snapshot<Value, Failure> {
        &self.state
    }

    pub fn notifications(&self) -> &[Snapshot<Value, Failure>] {
        &self.notifications
    }

    /// Expected completion outcome of a write, once known
    pub fn outcome(&self, write: usize) -> Option<&StoreResult<Value, Failure>> {
        self.outcomes.get(&write)
    }
}

/// Result of running one script
#[derive(Debug, Default)]
pub struct RaceReport {
    pub writes: usize,
    pub deferred: usize,
    /// Deferred writes that committed (value or error)
    pub committed: usize,
    /// Deferred writes superseded before settling
    pub canceled: usize,
    /// Disagreements between store and model
    pub mismatches: Vec<String>,
}

impl RaceReport {
    pub fn is_valid(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Run a script against a fresh store and the model
///
/// Must be called from within a tokio runtime.
pub async fn run_script(initial: Value, steps: &[Step]) -> HarnessResult<RaceReport> {
    let store: Store<Value, Failure> = Store::new(StoreConfig::new(initial).with_label("race"));
    let recorder = SnapshotRecorder::attach(&store);
    let mut model = RaceModel::new(initial);
    let mut gates: HashMap<usize, (Gate<Value, Failure>, Result<Value, Failure>)> = HashMap::new();
    let mut completions: Vec<Completion<Value, Failure>> = Vec::new();
    let mut report = RaceReport::default();

    for step in steps {
        model.apply(step)?;
        match step {
            Step::Immediate(value) => {
                completions.push(store.set(*value));
            }
            Step::Deferred { value, fails } => {
                let write = completions.len();
                let (gate, contents) = gate();
                completions.push(store.set_contents(contents)?);
                let outcome = if *fails {
                    Err(failure_for(write))
                } else {
                    Ok(*value)
                };
                gates.insert(write, (gate, outcome));
                report.deferred += 1;
            }
            Step::Settle { write } => {
                let (gate, outcome) = gates
                    .remove(write)
                    .ok_or(HarnessError::NotPending(*write))?;
                gate.settle(outcome)?;

                // Let the continuation run before the next step
                match completions[*write].clone().await {
                    Ok(_) | Err(StoreError::Upstream(_)) => report.committed += 1,
                    Err(StoreError::Canceled) => report.canceled += 1,
                    Err(other) => report
                        .mismatches
                        .push(format!("write {}: unexpected outcome {}", write, other)),
                }
            }
        }
    }
    report.writes = completions.len();

    let notifications = recorder.snapshots();
    if notifications.as_slice() != model.notifications() {
        report.mismatches.push(format!(
            "notifications differ: store {:?}, model {:?}",
            notifications,
            model.notifications()
        ));
    }

    let final_state = store.loadable().snapshot();
    if final_state != *model.state() {
        report.mismatches.push(format!(
            "final state differs: store {:?}, model {:?}",
            final_state,
            model.state()
        ));
    }

    if store.revision() != model.revision() {
        report.mismatches.push(format!(
            "revision differs: store {}, model {}",
            store.revision(),
            model.revision()
        ));
    }

    for (write, completion) in completions.iter().enumerate() {
        let actual = completion.try_outcome();
        let expected = model.outcome(write).cloned();
        if actual != expected {
            report.mismatches.push(format!(
                "write {} outcome differs: store {:?}, model {:?}",
                write, actual, expected
            ));
        }
    }

    debug!(
        writes = report.writes,
        deferred = report.deferred,
        committed = report.committed,
        canceled = report.canceled,
        mismatches = report.mismatches.len(),
        "race script finished"
    );
    Ok(report)
}

/// Race fuzzer
pub struct RaceFuzzer {
    config: FuzzerConfig,
}

impl RaceFuzzer {
    pub fn new(config: FuzzerConfig) -> Self {
        RaceFuzzer { config }
    }

    pub fn config(&self) -> &FuzzerConfig {
        &self.config
    }

    /// Script for the configured seed
    pub fn script(&self) -> Vec<Step> {
        generate_script(&self.config)
    }

    /// Generate and run the script
    pub async fn run(&self) -> HarnessResult<RaceReport> {
        run_script(INITIAL_VALUE, &self.script()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use crate::init_test_logging;

    #[test]
    fn test_script_is_deterministic() {
        let config = FuzzerConfig::default();
        assert_eq!(generate_script(&config), generate_script(&config));

        let other = FuzzerConfig {
            seed: 7,
            ..FuzzerConfig::default()
        };
        assert_ne!(generate_script(&config), generate_script(&other));
    }

    #[test]
    fn test_script_settles_each_deferred_once() {
        let steps = generate_script(&FuzzerConfig::heavy());
        let mut writes = 0;
        let mut deferred = Vec::new();
        let mut settled = Vec::new();

        for step in &steps {
            match step {
                Step::Immediate(_) => writes += 1,
                Step::Deferred { .. } => {
                    deferred.push(writes);
                    writes += 1;
                }
                Step::Settle { write } => {
                    assert!(*write < writes, "settle before issue");
                    settled.push(*write);
                }
            }
        }

        settled.sort_unstable();
        assert_eq!(writes, FuzzerConfig::heavy().write_count);
        assert_eq!(deferred, settled);
    }

    #[test]
    fn test_model_last_write_wins() {
        let mut model = RaceModel::new(0);
        let steps = [
            Step::Deferred { value: 10, fails: false },
            Step::Deferred { value: 20, fails: false },
            Step::Settle { write: 1 },
            Step::Settle { write: 0 },
        ];
        for step in &steps {
            model.apply(step).unwrap();
        }

        assert_eq!(*model.state(), Snapshot::HasValue(20));
        assert_eq!(model.revision(), 2);
        assert_eq!(model.outcome(0), Some(&Err(StoreError::Canceled)));
        assert_eq!(model.outcome(1), Some(&Ok(20)));
        assert_eq!(
            model.notifications(),
            &[Snapshot::Loading, Snapshot::Loading, Snapshot::HasValue(20)]
        );
    }

    #[test]
    fn test_model_rejects_unknown_settle() {
        let mut model = RaceModel::new(0);
        model.apply(&Step::Immediate(1)).unwrap();
        assert!(matches!(
            model.apply(&Step::Settle { write: 0 }),
            Err(HarnessError::NotPending(0))
        ));
    }

    #[tokio::test]
    async fn test_fixed_race_script() {
        let steps = [
            Step::Immediate(1),
            Step::Deferred { value: 2, fails: false },
            Step::Deferred { value: 3, fails: true },
            Step::Settle { write: 2 },
            Step::Settle { write: 1 },
            Step::Deferred { value: 4, fails: false },
            Step::Immediate(5),
            Step::Settle { write: 3 },
        ];

        let report = run_script(INITIAL_VALUE, &steps).await.unwrap();

        assert!(report.is_valid(), "{:?}", report.mismatches);
        assert_eq!(report.writes, 5);
        assert_eq!(report.deferred, 3);
        assert_eq!(report.committed, 1);
        assert_eq!(report.canceled, 2);
    }

    #[tokio::test]
    async fn test_fuzzer_light() {
        init_test_logging();
        let report = RaceFuzzer::new(FuzzerConfig::light()).run().await.unwrap();
        assert!(report.is_valid(), "{:?}", report.mismatches);
    }

    #[tokio::test]
    async fn test_fuzzer_default() {
        let report = RaceFuzzer::new(FuzzerConfig::default()).run().await.unwrap();
        assert!(report.is_valid(), "{:?}", report.mismatches);
        assert_eq!(report.committed + report.canceled, report.deferred);
    }

    #[tokio::test]
    async fn test_fuzzer_heavy() {
        let report = RaceFuzzer::new(FuzzerConfig::heavy()).run().await.unwrap();
        assert!(report.is_valid(), "{:?}", report.mismatches);
        assert!(report.canceled > 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn store_matches_model(
            seed in any::<u64>(),
            write_count in 1usize..40,
            deferred_prob in 0.0f64..=1.0,
            reject_prob in 0.0f64..=1.0,
            settle_prob in 0.0f64..=1.0,
        ) {
            let config = FuzzerConfig {
                write_count,
                deferred_prob,
                reject_prob,
                settle_prob,
                seed,
            };
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let report = runtime.block_on(RaceFuzzer::new(config).run()).unwrap();

            prop_assert!(report.is_valid(), "{:?}", report.mismatches);
            prop_assert_eq!(report.writes, write_count);
            prop_assert_eq!(report.committed + report.canceled, report.deferred);
        }
    }
}
