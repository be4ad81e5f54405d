mod color_logger;

use anyhow::{anyhow, bail, Context, Result};
use color_logger::ColorLogger;
use echoconv::expr;
use echoconv::plot::python_plot_to_path;
use echoconv::signal::compute_echo_shifts;
use echoconv::{ConvolutionExplorer, ExplorerConfig, SignalId};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const DEFAULT_PYTHON_BIN: &str = "python";

const PY_REFERENCE_SCRIPT: &str = r#"
import json
import sys
import time
import numpy as np

env = json.loads(sys.stdin.read())
op = env["op"]
iters = int(env["iters"])
p = env["payload"]

NAMESPACE = {
    "abs": np.abs, "sin": np.sin, "cos": np.cos, "tan": np.tan,
    "arcsin": np.arcsin, "arccos": np.arccos, "arctan": np.arctan,
    "exp": np.exp, "log": np.log, "log10": np.log10, "sqrt": np.sqrt,
    "power": np.power, "zeros": np.zeros, "ones": np.ones,
    "concatenate": np.concatenate, "hstack": np.hstack,
    "pi": np.pi, "e": np.e,
}

def _as_array(key):
    return np.asarray(p[key], dtype=float)

def _h_index(axis, t):
    hits = np.nonzero(t < axis)[0]
    if t < axis[0] or hits.size == 0:
        return None
    return int(hits[0])

def _compute():
    if op == "expression":
        t = np.linspace(float(p["min"]), float(p["max"]), int(p["points"]))
        y = eval(p["expression"], {"__builtins__": None}, dict(NAMESPACE, t=t))
        return np.broadcast_to(np.asarray(y, dtype=float), t.shape)
    if op == "convolve_scaled":
        return np.convolve(_as_array("x"), _as_array("h")) * float(p["step"])
    if op == "echo_shifts":
        tau, min_x, step, points = float(p["tau"]), float(p["min_x"]), float(p["step"]), int(p["echo_points"])
        count = max(np.floor((tau - min_x) / (step * points)), 0)
        return np.asarray([tau - k * (step * points) for k in np.arange(0, count)], dtype=float)
    if op == "echo_running_sum":
        x, h, h_axis = _as_array("x"), _as_array("h"), _as_array("h_axis")
        min_x, step, points = float(p["min_x"]), float(p["step"]), int(p["echo_points"])
        sums = []
        for tau in p["taus"]:
            count = int(max(np.floor((tau - min_x) / (step * points)), 0))
            total = 0.0
            for k in range(count):
                if k * points >= x.size:
                    continue
                origin = min_x + k * points * step
                idx = _h_index(h_axis, tau - origin)
                if idx is not None:
                    total += x[k * points] * h[idx] * points * step
            sums.append(total)
        return np.asarray(sums, dtype=float)

    raise RuntimeError(f"unsupported op: {op}")

y = np.asarray(_compute(), dtype=float).reshape(-1)

t0 = time.perf_counter_ns()
for _ in range(iters):
    _compute()
t1 = time.perf_counter_ns()

print(json.dumps({
    "output": y.tolist(),
    "avg_ns": (t1 - t0) / max(iters, 1),
    "python_version": sys.version.split()[0],
    "numpy_version": np.__version__,
    "matplotlib_version": None
}))
"#;

#[derive(Debug, Serialize, Deserialize, Clone)]
struct PythonEval {
    output: Vec<f64>,
    avg_ns: f64,
    python_version: String,
    numpy_version: String,
    matplotlib_version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ContractRow {
    case_id: String,
    passed: bool,
    tolerance: f64,
    pearson_r: f64,
    mae: f64,
    rmse: f64,
    max_abs: f64,
    rust_ns: f64,
    python_ns: f64,
    speedup_vs_python: f64,
    overlay_plot: String,
    residual_plot: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContractBundle {
    generated_epoch_seconds: u64,
    python_executable: String,
    python_version: String,
    numpy_version: String,
    matplotlib_version: String,
    rows: Vec<ContractRow>,
}

/// One Rust output compared against its numpy reference.
struct ContractCase<'a> {
    case_id: &'a str,
    candidate: Vec<f64>,
    reference: PythonEval,
    rust_ns: f64,
    tolerance: f64,
}

fn usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p xtask -- [--verbose | --quiet] contracts");
    eprintln!("  cargo run -p xtask -- [--verbose | --quiet] plot [--config <file.json>] [--out <file.png>]");
}

fn main() -> Result<()> {
    let mut verbose = false;
    let mut quiet = false;
    let mut rest = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--verbose" | "-v" => verbose = true,
            "--quiet" | "-q" => quiet = true,
            _ => rest.push(arg),
        }
    }
    ColorLogger::new(quiet, verbose)
        .init()
        .map_err(|e| anyhow!("installing logger: {e}"))?;

    let mut args = rest.into_iter();
    match args.next().as_deref() {
        Some("contracts") => run_contracts(),
        Some("plot") => run_plot(args),
        _ => {
            usage();
            Ok(())
        }
    }
}

fn run_plot(mut args: impl Iterator<Item = String>) -> Result<()> {
    let mut config_path = None;
    let mut out_path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = Some(args.next().context("--config needs a path")?),
            "--out" => out_path = Some(args.next().context("--out needs a path")?),
            other => bail!("unknown plot argument `{other}`"),
        }
    }

    let config = match config_path {
        Some(path) => {
            let text = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            ExplorerConfig::from_json(&text).with_context(|| format!("parsing {path}"))?
        }
        None => ExplorerConfig::default(),
    };
    let explorer = ConvolutionExplorer::from_config(config).context("building explorer")?;
    let decomposition = explorer.decompose();
    log::info!(
        "tau={} echoes={} running_sum={:.6} convolution={:?}",
        explorer.tau(),
        decomposition.terms.len(),
        decomposition.running_sum,
        decomposition.convolution_value
    );

    let path = python_plot_to_path(&explorer, out_path.as_deref().map(Path::new))
        .context("rendering plot")?;
    log::info!("plot written to {}", path.display());
    Ok(())
}

fn run_contracts() -> Result<()> {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let out_dir = PathBuf::from(format!("target/contracts/{ts}"));
    let plots_dir = out_dir.join("plots");
    fs::create_dir_all(&plots_dir).context("creating contract output directories")?;

    let python_bin = detect_python_bin();

    let mut rows = Vec::new();
    let mut case_plot_payload = Vec::new();

    // Formula evaluation over the default axis.
    for (case_id, formula) in [
        ("expr_exp_decay", "exp(-t)"),
        ("expr_pulse", "hstack((zeros(200), ones(300), zeros(500)))"),
        ("expr_damped_sine", "sin(2 * pi * t) * exp(-t / 3) + sqrt(t) - t**2 / 100"),
        ("expr_power_blocks", "power(t, 2) * concatenate([ones(500), 2 * ones(500)])"),
    ] {
        let axis = Array1::linspace(0.0, 10.0, 1000);
        let candidate = expr::evaluate(formula, axis.view())
            .with_context(|| format!("evaluating `{formula}`"))?
            .to_vec();
        let py = python_reference_eval(
            &python_bin,
            "expression",
            json!({ "expression": formula, "min": 0.0, "max": 10.0, "points": 1000 }),
            100,
        )?;
        let rust_ns = benchmark_avg_ns(100, || {
            expr::evaluate(formula, axis.view())
                .map(|_| ())
                .map_err(|e| anyhow!("evaluating `{formula}`: {e}"))
        })?;
        record_case(
            &mut rows,
            &mut case_plot_payload,
            &plots_dir,
            ContractCase {
                case_id,
                candidate,
                reference: py,
                rust_ns,
                tolerance: 1e-9,
            },
        )?;
    }

    let mut explorer = ConvolutionExplorer::new();
    explorer
        .set_range(SignalId::H, 0.0, 6.0)
        .context("setting h range")?;
    explorer
        .set_point_count(SignalId::H, 700)
        .context("setting h point count")?;
    let x = explorer.signal(SignalId::X).clone();
    let h = explorer.signal(SignalId::H).clone();
    let step_x = explorer.step(SignalId::X);

    // Step-weighted convolution of signals with different lengths.
    {
        let py = python_reference_eval(
            &python_bin,
            "convolve_scaled",
            json!({ "x": x.values.to_vec(), "h": h.values.to_vec(), "step": step_x }),
            50,
        )?;
        let rust_ns = benchmark_avg_ns(50, || {
            let mut scratch = explorer.clone();
            scratch
                .set_tau(2.0)
                .map_err(|e| anyhow!("recomputing convolution: {e}"))
        })?;
        record_case(
            &mut rows,
            &mut case_plot_payload,
            &plots_dir,
            ContractCase {
                case_id: "convolve_scaled_full",
                candidate: explorer.convolution().values.to_vec(),
                reference: py,
                rust_ns,
                tolerance: 1e-9,
            },
        )?;
    }

    // Echo shift formula.
    for (tau, echo_points) in [(5.0, 50usize), (7.25, 13), (0.5, 1)] {
        let case_id = format!("echo_shifts_tau{tau}_p{echo_points}");
        let candidate = compute_echo_shifts(tau, 0.0, step_x, echo_points)
            .with_context(|| format!("echo shifts for tau {tau}"))?;
        let py = python_reference_eval(
            &python_bin,
            "echo_shifts",
            json!({ "tau": tau, "min_x": 0.0, "step": step_x, "echo_points": echo_points }),
            200,
        )?;
        let rust_ns = benchmark_avg_ns(200, || {
            compute_echo_shifts(tau, 0.0, step_x, echo_points)?;
            Ok(())
        })?;
        record_case(
            &mut rows,
            &mut case_plot_payload,
            &plots_dir,
            ContractCase {
                case_id: &case_id,
                candidate,
                reference: py,
                rust_ns,
                tolerance: 1e-12,
            },
        )?;
    }

    // Echo running sum across tau, against the same lookup rule in numpy.
    for rate in [1000.0, 100.0, 20.0] {
        explorer
            .set_echo_rate(rate)
            .with_context(|| format!("setting echo rate {rate}"))?;
        let case_id = format!("echo_running_sum_rate{rate}");
        let taus: Vec<f64> = (0..40).map(|i| -0.5 + 0.25 * i as f64).collect();
        let mut scratch = explorer.clone();
        let mut candidate = Vec::with_capacity(taus.len());
        let start = Instant::now();
        for &tau in &taus {
            scratch
                .set_tau(tau)
                .with_context(|| format!("setting tau {tau}"))?;
            candidate.push(scratch.decompose().running_sum);
        }
        let rust_ns = start.elapsed().as_nanos() as f64;
        let py = python_reference_eval(
            &python_bin,
            "echo_running_sum",
            json!({
                "x": x.values.to_vec(),
                "h": h.values.to_vec(),
                "h_axis": h.axis.to_vec(),
                "taus": taus,
                "min_x": 0.0,
                "step": step_x,
                "echo_points": explorer.echo_points(),
            }),
            1,
        )?;
        record_case(
            &mut rows,
            &mut case_plot_payload,
            &plots_dir,
            ContractCase {
                case_id: &case_id,
                candidate,
                reference: py,
                rust_ns,
                tolerance: 1e-9,
            },
        )?;
    }

    let versions = python_versions(&python_bin)?;
    let report_pdf = out_dir.join("report.pdf");
    generate_plots_and_pdf(&python_bin, &case_plot_payload, &report_pdf)?;

    let bundle = ContractBundle {
        generated_epoch_seconds: ts,
        python_executable: python_bin.to_string_lossy().into_owned(),
        python_version: versions.python_version,
        numpy_version: versions.numpy_version,
        matplotlib_version: versions.matplotlib_version.unwrap_or_default(),
        rows,
    };
    fs::write(
        out_dir.join("summary.json"),
        serde_json::to_vec_pretty(&bundle).context("serializing summary")?,
    )
    .context("writing summary.json")?;
    write_summary_csv(&out_dir.join("summary.csv"), &bundle.rows)?;

    log::info!("contract artifacts:");
    log::info!("  - {}", out_dir.join("summary.csv").display());
    log::info!("  - {}", out_dir.join("summary.json").display());
    log::info!("  - {}", report_pdf.display());
    log::info!("  - {}", plots_dir.display());

    let failed: Vec<_> = bundle
        .rows
        .iter()
        .filter(|row| !row.passed)
        .map(|row| row.case_id.as_str())
        .collect();
    if !failed.is_empty() {
        bail!("{} of {} cases failed: {}", failed.len(), bundle.rows.len(), failed.join(", "));
    }
    log::info!("all {} cases within tolerance", bundle.rows.len());
    Ok(())
}

fn detect_python_bin() -> PathBuf {
    std::env::var_os("PYTHON")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PYTHON_BIN))
}

fn python_versions(python_bin: &Path) -> Result<PythonEval> {
    run_python_eval(
        python_bin,
        r#"
import json, sys
import numpy
import matplotlib
payload = json.loads(sys.stdin.read())
print(json.dumps({
    "output": [],
    "avg_ns": 0.0,
    "python_version": sys.version.split()[0],
    "numpy_version": numpy.__version__,
    "matplotlib_version": matplotlib.__version__
}))
"#,
        json!({}),
    )
}

fn python_reference_eval(
    python_bin: &Path,
    op: &str,
    payload: serde_json::Value,
    iters: usize,
) -> Result<PythonEval> {
    log::debug!("numpy reference `{op}` ({iters} iterations)");
    run_python_eval(
        python_bin,
        PY_REFERENCE_SCRIPT,
        json!({
            "op": op,
            "iters": iters,
            "payload": payload
        }),
    )
}

fn run_python_eval(
    python_bin: &Path,
    script: &str,
    payload: serde_json::Value,
) -> Result<PythonEval> {
    let mut child = Command::new(python_bin)
        .arg("-c")
        .arg(script)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning python interpreter at {}", python_bin.display()))?;

    {
        let stdin = child.stdin.as_mut().context("opening python stdin")?;
        let payload_bytes = serde_json::to_vec(&payload).context("serializing python payload")?;
        stdin
            .write_all(&payload_bytes)
            .context("writing payload to python stdin")?;
    }

    let output = child
        .wait_with_output()
        .context("waiting for python process")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("python execution failed: {stderr}");
    }
    let stdout = String::from_utf8(output.stdout).context("parsing python stdout utf8")?;
    let parsed: PythonEval = serde_json::from_str(stdout.trim()).context("parsing python json")?;
    Ok(parsed)
}

fn record_case(
    rows: &mut Vec<ContractRow>,
    case_plot_payload: &mut Vec<serde_json::Value>,
    plots_dir: &Path,
    case: ContractCase<'_>,
) -> Result<()> {
    let ContractCase {
        case_id,
        candidate,
        reference,
        rust_ns,
        tolerance,
    } = case;
    ensure_same_length(case_id, &candidate, &reference.output)?;

    let overlay = plots_dir.join(format!("{case_id}_overlay.png"));
    let residual = plots_dir.join(format!("{case_id}_residual.png"));

    let max_abs = max_abs_error(&candidate, &reference.output);
    let passed = max_abs <= tolerance;
    if passed {
        log::info!("{case_id}: max_abs={max_abs:.3e}");
    } else {
        log::warn!("{case_id}: max_abs={max_abs:.3e} exceeds {tolerance:.1e}");
    }

    rows.push(ContractRow {
        case_id: case_id.to_string(),
        passed,
        tolerance,
        pearson_r: pearson(&candidate, &reference.output),
        mae: mean_abs_error(&candidate, &reference.output),
        rmse: root_mean_squared_error(&candidate, &reference.output),
        max_abs,
        rust_ns,
        python_ns: reference.avg_ns,
        speedup_vs_python: reference.avg_ns / rust_ns,
        overlay_plot: overlay.to_string_lossy().into_owned(),
        residual_plot: residual.to_string_lossy().into_owned(),
    });

    case_plot_payload.push(json!({
        "case_id": case_id,
        "rust_candidate": candidate,
        "python_reference": reference.output,
        "overlay_plot": overlay.to_string_lossy(),
        "residual_plot": residual.to_string_lossy()
    }));

    Ok(())
}

fn ensure_same_length(case_id: &str, a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        bail!(
            "case {case_id} has mismatched output lengths: left={}, right={}",
            a.len(),
            b.len()
        );
    }
    Ok(())
}

fn benchmark_avg_ns<F>(iters: usize, mut f: F) -> Result<f64>
where
    F: FnMut() -> Result<()>,
{
    let start = Instant::now();
    for _ in 0..iters {
        f()?;
    }
    Ok(start.elapsed().as_nanos() as f64 / iters as f64)
}

fn mean_abs_error(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .sum::<f64>()
        / a.len() as f64
}

fn root_mean_squared_error(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    (a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
        / a.len() as f64)
        .sqrt()
}

fn max_abs_error(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let da = *x - mean_a;
        let db = *y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a == 0.0 || var_b == 0.0 {
        if a == b {
            1.0
        } else {
            0.0
        }
    } else {
        cov / (var_a.sqrt() * var_b.sqrt())
    }
}

fn write_summary_csv(path: &Path, rows: &[ContractRow]) -> Result<()> {
    let mut out = String::new();
    out.push_str("case_id,passed,tolerance,pearson_r,mae,rmse,max_abs,rust_ns,python_ns,speedup_vs_python,overlay_plot,residual_plot\n");
    for row in rows {
        out.push_str(&format!(
            "{},{},{:e},{:.12},{:.12},{:.12},{:.12},{:.3},{:.3},{:.6},{},{}\n",
            row.case_id,
            row.passed,
            row.tolerance,
            row.pearson_r,
            row.mae,
            row.rmse,
            row.max_abs,
            row.rust_ns,
            row.python_ns,
            row.speedup_vs_python,
            row.overlay_plot,
            row.residual_plot
        ));
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))
}

fn generate_plots_and_pdf(
    python_bin: &Path,
    case_payload: &[serde_json::Value],
    report_pdf: &Path,
) -> Result<()> {
    let payload = json!({
        "cases": case_payload,
        "report_pdf": report_pdf.to_string_lossy()
    });
    let script = r#"
import json
import sys
import matplotlib
matplotlib.use("Agg")
import matplotlib.pyplot as plt
from matplotlib.backends.backend_pdf import PdfPages

payload = json.loads(sys.stdin.read())
cases = payload["cases"]
report_pdf = payload["report_pdf"]

with PdfPages(report_pdf) as pdf:
    for case in cases:
        case_id = case["case_id"]
        rust = case["rust_candidate"]
        py = case["python_reference"]
        x = list(range(len(py)))
        residual = [ri - pi for ri, pi in zip(rust, py)]

        fig_overlay = plt.figure(figsize=(10, 4))
        ax_overlay = fig_overlay.add_subplot(1, 1, 1)
        ax_overlay.plot(x, py, label="numpy reference", linewidth=1.6)
        ax_overlay.plot(x, rust, label="echoconv", linewidth=1.2, alpha=0.8)
        ax_overlay.set_title(f"{case_id} :: overlay")
        ax_overlay.set_xlabel("index")
        ax_overlay.set_ylabel("value")
        ax_overlay.legend()
        fig_overlay.tight_layout()
        fig_overlay.savefig(case["overlay_plot"], dpi=150)
        pdf.savefig(fig_overlay)
        plt.close(fig_overlay)

        fig_residual = plt.figure(figsize=(10, 4))
        ax_residual = fig_residual.add_subplot(1, 1, 1)
        ax_residual.plot(x, residual, label="echoconv - numpy", linewidth=1.2, color="tab:red")
        ax_residual.set_title(f"{case_id} :: residual")
        ax_residual.set_xlabel("index")
        ax_residual.set_ylabel("error")
        ax_residual.legend()
        fig_residual.tight_layout()
        fig_residual.savefig(case["residual_plot"], dpi=150)
        pdf.savefig(fig_residual)
        plt.close(fig_residual)
"#;

    let mut child = Command::new(python_bin)
        .arg("-c")
        .arg(script)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning python interpreter at {}", python_bin.display()))?;

    {
        let stdin = child.stdin.as_mut().context("opening python stdin")?;
        let payload_bytes = serde_json::to_vec(&payload).context("serializing plot payload")?;
        stdin
            .write_all(&payload_bytes)
            .context("writing plot payload to python stdin")?;
    }

    let output = child
        .wait_with_output()
        .context("waiting for python plot process")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("plot/pdf generation failed: {stderr}");
    }

    Ok(())
}
