//! Environment report.
//!
//! Collects the information worth attaching to a bug report or an experiment
//! log: platform, CPU parallelism, GPUs, CUDA toolchain, compiler and library
//! versions. External commands that fail are reported as `Not Available`.

use std::path::Path;
use std::process::Command;

const NOT_AVAILABLE: &str = "Not Available";

/// burn version resolved in the workspace lock file.
pub const BURN_VERSION: &str = env!("VIDREC_BURN_VERSION");

/// Collect environment information as ordered `(name, value)` pairs.
///
/// CUDA is reported available when `nvidia-smi` lists at least one GPU.
/// GPUs sharing a model name are grouped into one `GPU <ids>` entry, and
/// `CUDA_HOME` / `NVCC` are only reported alongside them.
///
/// # Example
///
/// ```rust,ignore
/// for (name, value) in vidrec_core::collect_env() {
///     println!("{}: {}", name, value);
/// }
/// ```
pub fn collect_env() -> Vec<(String, String)> {
    let mut info = Vec::new();
    let mut push = |name: &str, value: String| info.push((name.to_string(), value));

    push("sys.platform", std::env::consts::OS.to_string());
    push("Arch", std::env::consts::ARCH.to_string());
    push("vidrec", env!("CARGO_PKG_VERSION").to_string());
    push(
        "CPU threads",
        std::thread::available_parallelism()
            .map(|n| n.get().to_string())
            .unwrap_or_else(|_| NOT_AVAILABLE.to_string()),
    );

    let gpus = nvidia_smi_gpus();
    push("CUDA available", (!gpus.is_empty()).to_string());
    if !gpus.is_empty() {
        for (name, ids) in group_gpus(&gpus) {
            push(&format!("GPU {}", ids.join(",")), name);
        }

        match std::env::var("CUDA_HOME") {
            Ok(cuda_home) if Path::new(&cuda_home).is_dir() => {
                let nvcc_path = Path::new(&cuda_home).join("bin").join("nvcc");
                let nvcc = command_line(nvcc_path.as_os_str(), &["-V"], Line::Last);
                push("CUDA_HOME", cuda_home);
                push("NVCC", nvcc);
            }
            Ok(cuda_home) => push("CUDA_HOME", cuda_home),
            Err(_) => push("CUDA_HOME", "None".to_string()),
        }
    }

    push("GCC", command_line("gcc".as_ref(), &["--version"], Line::First));
    push("burn", BURN_VERSION.to_string());

    #[cfg(feature = "backend-ndarray")]
    {
        use burn::tensor::backend::Backend;
        push("Backend", <crate::backend::NdArray as Backend>::name());
    }

    tracing::debug!("Collected {} environment entries", info.len());
    info
}

/// `(index, name)` of every GPU listed by `nvidia-smi`; empty without one.
fn nvidia_smi_gpus() -> Vec<(String, String)> {
    let output = match Command::new("nvidia-smi")
        .args(["--query-gpu=index,name", "--format=csv,noheader"])
        .output()
    {
        Ok(output) if output.status.success() => output,
        _ => return Vec::new(),
    };
    parse_gpu_list(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `index, name` CSV lines, skipping malformed ones.
fn parse_gpu_list(stdout: &str) -> Vec<(String, String)> {
    stdout
        .lines()
        .filter_map(|line| {
            let (index, name) = line.split_once(',')?;
            let (index, name) = (index.trim(), name.trim());
            (!index.is_empty() && !name.is_empty()).then(|| (index.to_string(), name.to_string()))
        })
        .collect()
}

/// Group GPU indices by model name, in order of first appearance.
fn group_gpus(gpus: &[(String, String)]) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for (index, name) in gpus {
        match groups.iter_mut().find(|(n, _)| n == name) {
            Some((_, ids)) => ids.push(index.clone()),
            None => groups.push((name.clone(), vec![index.clone()])),
        }
    }
    groups
}

enum Line {
    First,
    Last,
}

fn command_line(program: &std::ffi::OsStr, args: &[&str], line: Line) -> String {
    let output = match Command::new(program).args(args).output() {
        Ok(output) if output.status.success() => output,
        _ => return NOT_AVAILABLE.to_string(),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
    let picked = match line {
        Line::First => lines.next(),
        Line::Last => lines.last(),
    };
    picked.map_or_else(|| NOT_AVAILABLE.to_string(), str::to_string)
}
