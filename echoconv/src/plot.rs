use crate::explorer::ConvolutionExplorer;
use crate::signal::SignalId;
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::{SystemTime, UNIX_EPOCH};

/// Most echoes drawn in the echo panel; longer decompositions are thinned evenly.
pub const MAX_PLOTTED_ECHOES: usize = 60;

/// Errors raised by plot utilities.
#[derive(Debug)]
pub enum PlotError {
    /// Underlying process or filesystem I/O failure.
    Io(std::io::Error),
    /// Plot data could not be encoded for the script.
    Encode(serde_json::Error),
    /// Python subprocess stdin was unavailable.
    StdinUnavailable,
    /// Python subprocess exited unsuccessfully.
    PythonExitFailure(ExitStatus),
}

impl core::fmt::Display for PlotError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PlotError::Io(err) => write!(f, "plot I/O failure: {err}"),
            PlotError::Encode(err) => write!(f, "failed to encode plot data: {err}"),
            PlotError::StdinUnavailable => {
                write!(f, "failed to open stdin for python plotting process")
            }
            PlotError::PythonExitFailure(status) => {
                write!(f, "python plotting script failed with status: {status}")
            }
        }
    }
}

impl std::error::Error for PlotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlotError::Io(err) => Some(err),
            PlotError::Encode(err) => Some(err),
            PlotError::StdinUnavailable | PlotError::PythonExitFailure(_) => None,
        }
    }
}

impl From<std::io::Error> for PlotError {
    fn from(value: std::io::Error) -> Self {
        PlotError::Io(value)
    }
}

impl From<serde_json::Error> for PlotError {
    fn from(value: serde_json::Error) -> Self {
        PlotError::Encode(value)
    }
}

/// Indices of at most `limit` items out of `len`, evenly spread and always keeping the first.
fn thinned(len: usize, limit: usize) -> Vec<usize> {
    if len <= limit {
        return (0..len).collect();
    }
    let stride = len.div_ceil(limit);
    (0..len).step_by(stride).collect()
}

/// Encode the explorer's current state as the JSON document the plot script reads.
pub fn plot_payload(explorer: &ConvolutionExplorer) -> Result<String, PlotError> {
    let x = explorer.signal(SignalId::X);
    let h = explorer.signal(SignalId::H);
    let conv = explorer.convolution();
    let decomposition = explorer.decompose();
    let echoes: Vec<_> = thinned(decomposition.terms.len(), MAX_PLOTTED_ECHOES)
        .into_iter()
        .map(|k| {
            let term = &decomposition.terms[k];
            json!({
                "axis": term.shifted_axis.to_vec(),
                "values": term.weighted_values.to_vec(),
                "origin": term.origin,
                "intersection": term.intersection.value(),
            })
        })
        .collect();
    let payload = json!({
        "tau": explorer.tau(),
        "x": {"axis": x.axis.to_vec(), "values": x.values.to_vec(), "expression": explorer.expression(SignalId::X)},
        "h": {"axis": h.axis.to_vec(), "values": h.values.to_vec(), "expression": explorer.expression(SignalId::H)},
        "echoes": echoes,
        "conv": {"axis": conv.axis.to_vec(), "values": conv.values.to_vec()},
        "origins": decomposition.terms.iter().map(|t| t.origin).collect::<Vec<_>>(),
        "partial_sums": decomposition.partial_sums(),
        "running_sum": decomposition.running_sum,
        "convolution_value": decomposition.convolution_value,
    });
    Ok(serde_json::to_string(&payload)?)
}

/// Debug utility function that will run a python script to plot the explorer state.
///
/// Renders x, h, the echoes around tau, and the convolution against the echo running sum.
///
/// Note: errors are discarded; the PNG lands in `target/plots`.
pub fn python_plot(explorer: &ConvolutionExplorer) {
    let _ = python_plot_to_path(explorer, None::<&Path>);
}

/// Generate a non-interactive Python plot and save it to disk.
///
/// Returns the output path when plotting succeeds.
pub fn python_plot_to_path<P: AsRef<Path>>(
    explorer: &ConvolutionExplorer,
    output_path: Option<P>,
) -> Result<PathBuf, PlotError> {
    let output_path = match output_path {
        Some(path) => path.as_ref().to_path_buf(),
        None => {
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            PathBuf::from(format!("target/plots/convolution_{ts}.png"))
        }
    };
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let payload = plot_payload(explorer)?;
    let output_path_literal = output_path.to_string_lossy().replace('\\', "\\\\");
    let script = format!(
        r#"
import json
import matplotlib
matplotlib.use("Agg")
import matplotlib.pyplot as plt

d = json.loads(r'''{}''')
fig, axes = plt.subplots(4, 1, figsize=(12, 14))

ax = axes[0]
ax.plot(d["x"]["axis"], d["x"]["values"], label=f"x(t) = {{d['x']['expression']}}")
ax.legend()

ax = axes[1]
ax.plot(d["h"]["axis"], d["h"]["values"], color="tab:orange", label=f"h(t) = {{d['h']['expression']}}")
ax.legend()

ax = axes[2]
for echo in d["echoes"]:
    ax.plot(echo["axis"], echo["values"], linewidth=0.8)
    if echo["intersection"] is not None:
        ax.plot([d["tau"]], [echo["intersection"]], "k.", markersize=3)
ax.axvline(d["tau"], color="red", linestyle="--", label="tau")
ax.set_xlim(d["x"]["axis"][0], d["x"]["axis"][-1])
ax.legend()
ax.set_title(f"{{len(d['origins'])}} echoes")

ax = axes[3]
ax.plot(d["conv"]["axis"], d["conv"]["values"], label="(x * h)(t)")
if d["partial_sums"]:
    ax.step(d["origins"], d["partial_sums"], where="post", label="echo running sum")
ax.plot([d["tau"]], [d["running_sum"]], "ro", label=f"sum = {{d['running_sum']:.4f}}")
if d["convolution_value"] is not None:
    ax.plot([d["tau"]], [d["convolution_value"]], "kx", label=f"conv = {{d['convolution_value']:.4f}}")
ax.axvline(d["tau"], color="red", linestyle="--")
ax.legend()
ax.set_xlabel("t")

fig.tight_layout()
fig.savefig(r"{}", dpi=150)
plt.close(fig)
"#,
        payload, output_path_literal
    );
    // Run the script with python
    let script = script.as_bytes();
    let mut python = std::process::Command::new("python")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::null()) // noisy
        .stderr(std::process::Stdio::null()) // noisy
        .spawn()?;

    if let Some(mut stdin) = python.stdin.take() {
        stdin.write_all(script)?;
    } else {
        return Err(PlotError::StdinUnavailable);
    }

    let status = python.wait()?;
    if !status.success() {
        return Err(PlotError::PythonExitFailure(status));
    }
    log::debug!("plot written to {}", output_path.display());
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thinning_keeps_short_lists_whole() {
        assert_eq!(thinned(3, 10), vec![0, 1, 2]);
        let picked = thinned(1000, MAX_PLOTTED_ECHOES);
        assert!(picked.len() <= MAX_PLOTTED_ECHOES);
        assert_eq!(picked[0], 0);
    }

    #[test]
    fn payload_carries_every_panel() {
        let mut explorer = ConvolutionExplorer::new();
        explorer.set_echo_rate(100.0).expect("rate");
        explorer.set_tau(3.0).expect("tau");
        let payload: serde_json::Value =
            serde_json::from_str(&plot_payload(&explorer).expect("payload")).expect("json");
        assert_eq!(payload["x"]["values"].as_array().map(Vec::len), Some(1000));
        assert_eq!(payload["conv"]["values"].as_array().map(Vec::len), Some(1999));
        assert_eq!(payload["echoes"].as_array().map(Vec::len), Some(30));
        assert_eq!(payload["partial_sums"].as_array().map(Vec::len), Some(30));
        assert_eq!(payload["h"]["expression"], "exp(-t)");
    }
}
