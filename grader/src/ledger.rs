//! # Score Ledger
//!
//! Accumulates points earned versus points possible across one grading
//! run. The ledger has two lifecycle phases: configuration, performed
//! exactly once before any check accrues, and accrual, where each executed
//! check contributes exactly once. Misuse in either phase is a
//! [`GraderError`], not a scoring result.

use serde::Serialize;

use crate::error::GraderError;

/// Aggregation policy, chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoringPolicy {
    /// Equal-weight checks summing to a declared total: every check is
    /// worth `per_check = total / checks`.
    Fixed {
        total: f64,
        checks: u32,
        per_check: f64,
    },
    /// Each check declares its own weight when it accrues; the total
    /// possible is known only once the run completes.
    Variable,
}

/// What one accrual contributed to the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accrual {
    /// Points credited after clamping into `[0, weight]`.
    pub credited: f64,
    /// The weight this check counted against.
    pub weight: f64,
}

/// The earned/possible pair a run reports, rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub earned: f64,
    pub possible: f64,
}

/// Process-wide scoring state for one run.
#[derive(Debug, Default)]
pub struct ScoreLedger {
    policy: Option<ScoringPolicy>,
    earned: f64,
    possible: f64,
    accruals: u32,
}

/// Round a float to two decimal places.
#[inline]
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects fixed scoring: `checks` equal-weight checks summing to
    /// `total`. The per-check weight is derived here, so the sum of all
    /// check weights equals the declared total by construction.
    pub fn configure_fixed(&mut self, total: f64, checks: u32) -> Result<(), GraderError> {
        self.ensure_unconfigured()?;
        if checks == 0 {
            return Err(GraderError::InvalidPointScheme(
                "fixed scoring needs at least one check".to_string(),
            ));
        }
        if !total.is_finite() || total <= 0.0 {
            return Err(GraderError::InvalidPointScheme(format!(
                "fixed scoring needs a positive total, got {total}"
            )));
        }
        self.policy = Some(ScoringPolicy::Fixed {
            total,
            checks,
            per_check: total / f64::from(checks),
        });
        Ok(())
    }

    /// Selects variable scoring: weights arrive per check at accrual time.
    pub fn configure_variable(&mut self) -> Result<(), GraderError> {
        self.ensure_unconfigured()?;
        self.policy = Some(ScoringPolicy::Variable);
        Ok(())
    }

    pub fn policy(&self) -> Option<ScoringPolicy> {
        self.policy
    }

    /// The weight every check carries under fixed scoring, if configured.
    pub fn per_check_weight(&self) -> Option<f64> {
        match self.policy {
            Some(ScoringPolicy::Fixed { per_check, .. }) => Some(per_check),
            _ => None,
        }
    }

    /// How many checks have accrued so far.
    pub fn checks_accrued(&self) -> u32 {
        self.accruals
    }

    /// Records one check's earned points. Under fixed scoring the declared
    /// weight is ignored in favor of the derived per-check weight; under
    /// variable scoring it is required. Earned points are clamped into
    /// `[0, weight]`, and a non-finite earned value credits nothing.
    pub fn accrue(
        &mut self,
        earned: f64,
        declared_weight: Option<f64>,
    ) -> Result<Accrual, GraderError> {
        let weight = match self.policy {
            None => {
                return Err(GraderError::LedgerUnconfigured(
                    "accrue called before a scoring policy was configured".to_string(),
                ));
            }
            Some(ScoringPolicy::Fixed { per_check, .. }) => per_check,
            Some(ScoringPolicy::Variable) => match declared_weight {
                Some(weight) if weight.is_finite() && weight >= 0.0 => weight,
                Some(weight) => {
                    return Err(GraderError::InvalidPointScheme(format!(
                        "unusable check weight: {weight}"
                    )));
                }
                None => {
                    return Err(GraderError::MissingWeight(
                        "variable scoring requires each check to declare its weight".to_string(),
                    ));
                }
            },
        };
        let credited = if earned.is_finite() {
            earned.clamp(0.0, weight)
        } else {
            0.0
        };
        self.earned += credited;
        self.possible += weight;
        self.accruals += 1;
        Ok(Accrual { credited, weight })
    }

    /// The run's earned/possible totals. Only executed checks contribute
    /// to the possible total, under both policies.
    pub fn summary(&self) -> Result<ScoreSummary, GraderError> {
        if self.policy.is_none() {
            return Err(GraderError::LedgerUnconfigured(
                "summary requested before a scoring policy was configured".to_string(),
            ));
        }
        Ok(ScoreSummary {
            earned: round2(self.earned),
            possible: round2(self.possible),
        })
    }

    fn ensure_unconfigured(&self) -> Result<(), GraderError> {
        match self.policy {
            Some(_) => Err(GraderError::LedgerReconfigured(
                "a scoring policy is already configured for this run".to_string(),
            )),
            None => Ok(()),
        }
    }
}
