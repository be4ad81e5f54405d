//! The explorer state: one validated configuration and everything derived from it.
//!
//! Every setter builds a candidate [`ExplorerConfig`], recomputes the derived signals from
//! it and commits both only when that succeeds. A rejected mutation leaves the previous
//! configuration and its signals untouched.

use crate::config::ExplorerConfig;
use crate::error::{Error, Result};
use crate::expr::Expression;
use crate::kernel::{ConfigError, KernelLifecycle};
use crate::signal::{
    convolve_signals, echo_points_for_rate, ConvolutionResult, EchoConfig, EchoDecomposition,
    EchoKernel, SampledSignal, SamplingKernel, SignalId,
};

/// Signals derived from one configuration.
#[derive(Debug, Clone, PartialEq)]
struct Derived {
    x_domain: SamplingKernel,
    h_domain: SamplingKernel,
    x_expression: Expression,
    h_expression: Expression,
    x: SampledSignal,
    h: SampledSignal,
    convolution: ConvolutionResult,
    echo: EchoKernel,
    echo_shifts: Vec<f64>,
}

impl Derived {
    fn compute(config: &ExplorerConfig) -> Result<Self> {
        let x_domain = validate_domain(SignalId::X, config)?;
        let h_domain = validate_domain(SignalId::H, config)?;
        let echo_points = echo_points_for_rate(x_domain.point_count(), config.echo_rate)?;
        let echo = EchoKernel::try_new(EchoConfig { echo_points })?;
        if !config.tau.is_finite() {
            return Err(Error::InvalidParameter {
                arg: "tau",
                reason: format!("tau must be finite, got {}", config.tau),
            });
        }

        let x_expression = Expression::parse(&config.x.expression)?;
        let h_expression = Expression::parse(&config.h.expression)?;
        let x = sample(&x_domain, &x_expression)?;
        let h = sample(&h_domain, &h_expression)?;
        let echo_shifts = echo.shifts(config.tau, &x_domain, &x, &h)?;
        let convolution = convolve_signals(&x_domain, &x, &h)?;

        Ok(Self {
            x_domain,
            h_domain,
            x_expression,
            h_expression,
            x,
            h,
            convolution,
            echo,
            echo_shifts,
        })
    }

    fn domain(&self, signal: SignalId) -> &SamplingKernel {
        match signal {
            SignalId::X => &self.x_domain,
            SignalId::H => &self.h_domain,
        }
    }
}

/// Build one signal's sampling domain, naming the signal in any rejection.
fn validate_domain(signal: SignalId, config: &ExplorerConfig) -> Result<SamplingKernel> {
    SamplingKernel::try_new(config.signal(signal).domain).map_err(|err| match err {
        ConfigError::InvalidDomain { min, max, .. } => Error::InvalidDomain {
            arg: signal.range_arg(),
            min,
            max,
        },
        ConfigError::InvalidArgument { reason, .. } => Error::InvalidParameter {
            arg: signal.point_count_arg(),
            reason: reason.to_string(),
        },
        other => other.into(),
    })
}

fn sample(domain: &SamplingKernel, expression: &Expression) -> Result<SampledSignal> {
    let axis = domain.axis();
    let values = expression.evaluate(axis.view())?;
    Ok(SampledSignal { axis, values })
}

/// Interactive convolution explorer.
///
/// Owns the configuration of x(t), h(t), tau and the echo rate, and keeps the sampled
/// signals and their convolution in step with it.
///
/// ```
/// use echoconv::{ConvolutionExplorer, SignalId};
///
/// let mut explorer = ConvolutionExplorer::new();
/// explorer.set_echo_rate(100.0).unwrap();
/// explorer.set_tau(3.0).unwrap();
/// let decomposition = explorer.decompose();
/// assert_eq!(decomposition.terms.len(), 30);
/// assert!(explorer.set_range(SignalId::H, 1.0, 1.0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConvolutionExplorer {
    config: ExplorerConfig,
    derived: Derived,
}

impl ConvolutionExplorer {
    /// Explorer in the default start state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `config` and derive every signal from it.
    pub fn from_config(config: ExplorerConfig) -> Result<Self> {
        let derived = Derived::compute(&config)?;
        log::debug!(
            "explorer ready: x={} points, h={} points, convolution={} samples",
            derived.x.len(),
            derived.h.len(),
            derived.convolution.len()
        );
        Ok(Self { config, derived })
    }

    /// Replace the whole configuration at once.
    pub fn apply_config(&mut self, config: ExplorerConfig) -> Result<()> {
        self.commit("config", config)
    }

    fn commit(&mut self, what: &str, candidate: ExplorerConfig) -> Result<()> {
        match Derived::compute(&candidate) {
            Ok(derived) => {
                log::debug!(
                    "{what} updated: x={} points, h={} points, convolution={} samples",
                    derived.x.len(),
                    derived.h.len(),
                    derived.convolution.len()
                );
                self.config = candidate;
                self.derived = derived;
                Ok(())
            }
            Err(err) => {
                log::debug!("{what} rejected: {err}");
                Err(err)
            }
        }
    }

    fn with_candidate(
        &mut self,
        what: &str,
        edit: impl FnOnce(&mut ExplorerConfig),
    ) -> Result<()> {
        let mut candidate = self.config.clone();
        edit(&mut candidate);
        self.commit(what, candidate)
    }

    /// Set one signal's sampling range.
    pub fn set_range(&mut self, signal: SignalId, min: f64, max: f64) -> Result<()> {
        self.with_candidate(signal.range_arg(), |config| {
            let domain = &mut config.signal_mut(signal).domain;
            domain.min = min;
            domain.max = max;
        })
    }

    /// Set the lower bound of one signal's range, keeping the upper bound.
    pub fn set_min_range(&mut self, signal: SignalId, min: f64) -> Result<()> {
        let max = self.config.signal(signal).domain.max;
        self.set_range(signal, min, max)
    }

    /// Set the upper bound of one signal's range, keeping the lower bound.
    pub fn set_max_range(&mut self, signal: SignalId, max: f64) -> Result<()> {
        let min = self.config.signal(signal).domain.min;
        self.set_range(signal, min, max)
    }

    /// Set how many samples one signal takes over its range.
    ///
    /// For x this also changes the echo spacing, which must stay at least one sample.
    pub fn set_point_count(&mut self, signal: SignalId, point_count: usize) -> Result<()> {
        self.with_candidate(signal.point_count_arg(), |config| {
            config.signal_mut(signal).domain.point_count = point_count;
        })
    }

    /// Move the evaluation point of the echo decomposition.
    ///
    /// Any finite tau whose echoes fit the convolution length is accepted.
    pub fn set_tau(&mut self, tau: f64) -> Result<()> {
        self.with_candidate("tau", |config| config.tau = tau)
    }

    /// Set the echo rate; `echo_points = floor(x.point_count / rate)`.
    pub fn set_echo_rate(&mut self, rate: f64) -> Result<()> {
        self.with_candidate("echo_rate", |config| config.echo_rate = rate)
    }

    /// Replace one signal's formula.
    pub fn set_expression(&mut self, signal: SignalId, expression: &str) -> Result<()> {
        self.with_candidate(signal.expression_arg(), |config| {
            config.signal_mut(signal).expression = expression.to_string();
        })
    }

    /// Current configuration.
    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// `(min, max)` of one signal's range.
    pub fn range(&self, signal: SignalId) -> (f64, f64) {
        let domain = self.derived.domain(signal);
        (domain.min(), domain.max())
    }

    /// Integration step of one signal, `(max - min) / point_count`.
    pub fn step(&self, signal: SignalId) -> f64 {
        self.derived.domain(signal).step()
    }

    /// Number of samples of one signal.
    pub fn point_count(&self, signal: SignalId) -> usize {
        self.derived.domain(signal).point_count()
    }

    /// Samples of x between neighbouring echoes.
    pub fn echo_points(&self) -> usize {
        self.derived.echo.echo_points()
    }

    /// Current echo rate.
    pub fn echo_rate(&self) -> f64 {
        self.config.echo_rate
    }

    /// Current evaluation point.
    pub fn tau(&self) -> f64 {
        self.config.tau
    }

    /// Formula of one signal, as last accepted.
    pub fn expression(&self, signal: SignalId) -> &str {
        match signal {
            SignalId::X => self.derived.x_expression.source(),
            SignalId::H => self.derived.h_expression.source(),
        }
    }

    /// Sampled axis and values of one signal.
    pub fn signal(&self, signal: SignalId) -> &SampledSignal {
        match signal {
            SignalId::X => &self.derived.x,
            SignalId::H => &self.derived.h,
        }
    }

    /// Step-weighted convolution of x and h.
    pub fn convolution(&self) -> &ConvolutionResult {
        &self.derived.convolution
    }

    /// Convolution sample nearest to tau, if tau lies on the convolution axis.
    pub fn convolution_at_tau(&self) -> Option<f64> {
        self.derived.convolution.value_at(self.config.tau)
    }

    /// Echo positions for the current tau.
    pub fn echo_shifts(&self) -> &[f64] {
        &self.derived.echo_shifts
    }

    /// Decompose the convolution at the current tau into echoes.
    pub fn decompose(&self) -> EchoDecomposition {
        self.derived
            .echo
            .decompose_at(
                self.config.tau,
                &self.derived.echo_shifts,
                &self.derived.x_domain,
                &self.derived.x,
                &self.derived.h,
            )
            .with_convolution_value(self.convolution_at_tau())
    }

    /// Index of the first h sample strictly after `t`.
    pub fn h_index(&self, t: f64) -> Option<usize> {
        self.derived.h.index_after(t)
    }
}

impl Default for ConvolutionExplorer {
    fn default() -> Self {
        let config = ExplorerConfig::default();
        // Constant start state, covered by `starts_from_the_default_state`.
        match Derived::compute(&config) {
            Ok(derived) => Self { config, derived },
            Err(err) => panic!("default explorer config is invalid: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn starts_from_the_default_state() {
        let explorer = ConvolutionExplorer::new();
        assert_eq!(explorer.range(SignalId::X), (0.0, 10.0));
        assert_eq!(explorer.point_count(SignalId::H), 1000);
        assert_abs_diff_eq!(explorer.step(SignalId::X), 0.01);
        assert_eq!(explorer.echo_points(), 1000);
        assert_eq!(explorer.tau(), 1.0);
        assert_eq!(explorer.echo_rate(), 1.0);
        assert_eq!(explorer.expression(SignalId::H), "exp(-t)");
        assert_eq!(explorer.signal(SignalId::X).len(), 1000);
        assert_eq!(explorer.convolution().len(), 1999);
        assert!(explorer.echo_shifts().is_empty());
    }

    #[test]
    fn changing_h_range_leaves_x_alone() {
        let mut explorer = ConvolutionExplorer::new();
        let x_before = explorer.signal(SignalId::X).clone();
        explorer.set_range(SignalId::H, -2.0, 3.0).expect("valid h range");
        assert_eq!(explorer.signal(SignalId::X), &x_before);
        assert_eq!(explorer.range(SignalId::H), (-2.0, 3.0));
        assert_abs_diff_eq!(explorer.signal(SignalId::H).axis[0], -2.0);
    }

    #[test]
    fn invalid_range_is_rejected_without_side_effects() {
        let mut explorer = ConvolutionExplorer::new();
        explorer.set_range(SignalId::H, 0.0, 5.0).expect("valid h range");
        let before = explorer.clone();

        assert_eq!(
            explorer.set_range(SignalId::X, 4.0, 4.0).expect_err("empty range"),
            Error::InvalidDomain {
                arg: "x_range",
                min: 4.0,
                max: 4.0
            }
        );
        assert!(matches!(
            explorer.set_max_range(SignalId::H, -1.0),
            Err(Error::InvalidDomain { arg: "h_range", .. })
        ));
        assert!(explorer.set_min_range(SignalId::H, f64::NAN).is_err());
        assert_eq!(explorer, before);
    }

    #[test]
    fn one_sided_range_updates_keep_the_other_bound() {
        let mut explorer = ConvolutionExplorer::new();
        explorer.set_min_range(SignalId::X, -5.0).expect("min");
        assert_eq!(explorer.range(SignalId::X), (-5.0, 10.0));
        explorer.set_max_range(SignalId::X, 5.0).expect("max");
        assert_eq!(explorer.range(SignalId::X), (-5.0, 5.0));
    }

    #[test]
    fn bad_expression_keeps_the_last_valid_signal() {
        let mut explorer = ConvolutionExplorer::new();
        let before = explorer.clone();
        assert!(matches!(
            explorer.set_expression(SignalId::H, "exp(-t"),
            Err(Error::ExpressionSyntax { .. })
        ));
        assert!(matches!(
            explorer.set_expression(SignalId::X, "os.system('x')"),
            Err(Error::UnknownIdentifier { .. })
        ));
        assert!(matches!(
            explorer.set_expression(SignalId::X, "ones(10)"),
            Err(Error::LengthMismatch {
                arg: "expression",
                ..
            })
        ));
        assert_eq!(explorer, before);

        explorer
            .set_expression(SignalId::H, "sin(t)")
            .expect("valid formula");
        assert_eq!(explorer.expression(SignalId::H), "sin(t)");
        assert_abs_diff_eq!(
            explorer.signal(SignalId::H).values[999],
            10.0f64.sin(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn point_count_and_echo_rate_are_validated() {
        let mut explorer = ConvolutionExplorer::new();
        assert!(matches!(
            explorer.set_point_count(SignalId::H, 1),
            Err(Error::InvalidParameter {
                arg: "h_point_count",
                ..
            })
        ));
        for rate in [0.0, -1.0, f64::NAN, 1001.0] {
            assert!(matches!(
                explorer.set_echo_rate(rate),
                Err(Error::InvalidParameter { arg: "echo_rate", .. })
            ));
        }
        assert!(explorer.set_tau(f64::INFINITY).is_err());

        explorer.set_echo_rate(1000.0).expect("one point per echo");
        assert_eq!(explorer.echo_points(), 1);
        // Fewer x samples would leave no sample per echo.
        assert!(matches!(
            explorer.set_point_count(SignalId::X, 500),
            Err(Error::InvalidParameter { arg: "echo_rate", .. })
        ));
        assert_eq!(explorer.point_count(SignalId::X), 1000);
    }

    #[test]
    fn echo_sum_matches_convolution_at_tau() {
        let mut explorer = ConvolutionExplorer::new();
        explorer.set_echo_rate(1000.0).expect("rate");
        for tau in [1.0, 3.0, 5.5] {
            explorer.set_tau(tau).expect("tau");
            let decomposition = explorer.decompose();
            assert_eq!(decomposition.convolution_value, explorer.convolution_at_tau());
            let error = decomposition.discrepancy().expect("tau on axis").abs();
            assert!(error <= 0.015, "tau {tau}: {error}");
        }
    }

    #[test]
    fn shifts_follow_tau_and_rate() {
        let mut explorer = ConvolutionExplorer::new();
        explorer.set_echo_rate(20.0).expect("rate");
        explorer.set_tau(5.0).expect("tau");
        assert_eq!(explorer.echo_points(), 50);
        let shifts = explorer.echo_shifts();
        assert_eq!(shifts.len(), 10);
        assert_abs_diff_eq!(shifts[0], 5.0);
        assert_abs_diff_eq!(shifts[9], 0.5, epsilon = 1e-12);
        assert_eq!(explorer.decompose().terms.len(), 10);
    }

    #[test]
    fn tau_beyond_the_convolution_is_rejected() {
        let mut explorer = ConvolutionExplorer::new();
        explorer.set_echo_rate(1000.0).expect("rate");
        explorer.set_tau(3.0).expect("tau");
        let before = explorer.clone();
        for tau in [1e300, 1e9, 25.0] {
            assert!(
                matches!(
                    explorer.set_tau(tau),
                    Err(Error::InvalidParameter { arg: "tau", .. })
                ),
                "{tau}"
            );
        }
        assert_eq!(explorer, before);
        assert_eq!(explorer.echo_shifts().len(), 300);

        // Far past x but within the convolution: the late echoes are out of range.
        explorer.set_tau(15.0).expect("tau inside the convolution");
        let decomposition = explorer.decompose();
        assert_eq!(decomposition.terms.len(), 1500);
        assert!(decomposition.terms[1000..]
            .iter()
            .all(|t| !t.intersection.is_in_range()));
        let error = decomposition.discrepancy().expect("tau on axis").abs();
        assert!(error <= 0.015, "{error}");

        // Wide echoes reach far past the convolution before the cap.
        explorer.set_echo_rate(1.0).expect("rate");
        explorer.set_tau(1e4).expect("ten thousand samples per echo");
        assert_eq!(explorer.echo_shifts().len(), 1000);
        assert_eq!(explorer.decompose().running_sum, 0.0);
    }

    #[test]
    fn shorter_h_can_leave_tau_out_of_reach() {
        let mut explorer = ConvolutionExplorer::new();
        explorer.set_echo_rate(1000.0).expect("rate");
        explorer.set_tau(19.5).expect("tau");
        assert_eq!(explorer.echo_shifts().len(), 1950);
        // 1000 + 900 - 1 convolution samples leave no room for 1950 echoes.
        assert!(matches!(
            explorer.set_point_count(SignalId::H, 900),
            Err(Error::InvalidParameter { arg: "tau", .. })
        ));
        assert_eq!(explorer.point_count(SignalId::H), 1000);
        explorer.set_tau(3.0).expect("tau");
        explorer.set_point_count(SignalId::H, 900).expect("fits now");
    }

    #[test]
    fn h_index_is_strictly_greater() {
        let explorer = ConvolutionExplorer::new();
        let h = explorer.signal(SignalId::H);
        assert_eq!(explorer.h_index(h.axis[10]), Some(11));
        assert_eq!(explorer.h_index(-0.5), None);
        assert_eq!(explorer.h_index(10.5), None);
    }

    #[test]
    fn apply_config_is_atomic() {
        let mut explorer = ConvolutionExplorer::new();
        let before = explorer.clone();
        let mut config = explorer.config().clone();
        config.tau = 2.0;
        config.h.expression = "foo(t)".to_string();
        assert!(explorer.apply_config(config.clone()).is_err());
        assert_eq!(explorer, before);

        config.h.expression = "exp(-2 * t)".to_string();
        explorer.apply_config(config.clone()).expect("valid config");
        assert_eq!(explorer.config(), &config);
        assert_eq!(
            ConvolutionExplorer::from_config(config).expect("from_config"),
            explorer
        );
    }
}
