//! qeeg - command-line quantitative-EEG analysis tools
//!
//! Thin adapters around the analysis crates: each subcommand reads a
//! recording (or edge list), runs the corresponding engine and writes CSV
//! outputs plus a `*_run_meta.json` manifest so tools can be chained.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use qeeg_core::{
    default_eeg_bands, BandDefinition, QeegError, QeegResult, Recording,
    bands_to_spec_string, individualized_bands_from_iaf, median_inplace,
    IndividualizedBandsConfig,
};
use qeeg_dsp::{
    compute_bandpower_matrix, detect_artifacts, estimate_iaf_from_signal, merge_bad_segments,
    ArtifactConfig, BandpowerConfig, IafConfig, ReferenceBuilder, ReferenceConfig, WelchConfig,
};
use qeeg_io::{
    read_recording_csv, reference_option_mismatches, resolve_bands_spec, resolve_input,
    write_reference_csv, write_run_meta_json, BuildInfo, ResolveOptions,
};
use qeeg_map::{
    compute_graph_metrics, make_topomap, ConnectivityEdge, Grid2D, Montage, TopomapConfig,
    TopomapMethod,
};

#[derive(Parser)]
#[command(name = "qeeg", version, about = "Quantitative EEG analysis tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Per-channel bandpower table from a recording
    Bandpower(BandpowerArgs),
    /// Windowed artifact detection and merged bad segments
    Artifacts(ArtifactsArgs),
    /// Individual alpha frequency estimation
    Iaf(IafArgs),
    /// Topographic bandpower grids
    Topomap(TopomapArgs),
    /// Build a bandpower reference across recordings
    Reference(ReferenceArgs),
    /// Connectivity edge-list summaries
    Connectivity(ConnectivityArgs),
}

/// Options shared by every recording-consuming subcommand.
#[derive(Args)]
struct InputArgs {
    /// Input recording: CSV/TSV file, directory or *_run_meta.json
    /// (PATH#SELECTOR supported)
    #[arg(long)]
    input: String,

    /// Sampling rate in Hz of the input recording
    #[arg(long)]
    fs: f64,

    /// Output directory
    #[arg(long, default_value = "out_qeeg")]
    outdir: PathBuf,
}

#[derive(Args)]
struct WelchArgs {
    /// Welch segment length in samples
    #[arg(long, default_value_t = 1024)]
    nperseg: usize,

    /// Welch overlap fraction in [0,1)
    #[arg(long, default_value_t = 0.5)]
    overlap: f64,
}

#[derive(Args)]
struct BandpowerArgs {
    #[command(flatten)]
    input: InputArgs,
    #[command(flatten)]
    welch: WelchArgs,

    /// Band spec: "delta:0.5-4,...", "iaf=10.2" or "iaf:out_iaf"
    #[arg(long)]
    bands: Option<String>,

    /// Output relative power (band / total over the band span)
    #[arg(long)]
    relative: bool,

    /// Apply log10 to output values
    #[arg(long)]
    log10: bool,

    /// Reference CSV for z-scoring
    #[arg(long)]
    reference: Option<PathBuf>,
}

#[derive(Args)]
struct ArtifactsArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Window length in seconds
    #[arg(long, default_value_t = 1.0)]
    window: f64,

    /// Window step in seconds
    #[arg(long, default_value_t = 0.5)]
    step: f64,

    /// Baseline period in seconds (<= 0: whole recording)
    #[arg(long, default_value_t = 10.0)]
    baseline: f64,

    /// Robust z threshold for all features (<= 0 disables)
    #[arg(long, default_value_t = 6.0)]
    z: f64,

    /// Merge segments separated by gaps up to this many seconds
    #[arg(long, default_value_t = 0.0)]
    merge_gap: f64,
}

#[derive(Args)]
struct IafArgs {
    #[command(flatten)]
    input: InputArgs,
    #[command(flatten)]
    welch: WelchArgs,

    /// Alpha search range minimum in Hz
    #[arg(long, default_value_t = 7.0)]
    alpha_min: f64,

    /// Alpha search range maximum in Hz
    #[arg(long, default_value_t = 13.0)]
    alpha_max: f64,
}

#[derive(Args)]
struct TopomapArgs {
    #[command(flatten)]
    input: InputArgs,
    #[command(flatten)]
    welch: WelchArgs,

    /// Band spec (see bandpower)
    #[arg(long)]
    bands: Option<String>,

    /// Montage CSV (name,x,y); defaults to the built-in 10-20 set
    #[arg(long)]
    montage: Option<PathBuf>,

    /// Interpolation: "idw" or "spline"
    #[arg(long, default_value = "idw")]
    interp: String,

    /// Grid edge length in pixels
    #[arg(long, default_value_t = 256)]
    grid: usize,

    /// Output relative power
    #[arg(long)]
    relative: bool,
}

#[derive(Args)]
struct ReferenceArgs {
    /// Input recording (repeatable)
    #[arg(long = "input")]
    inputs: Vec<String>,

    /// Text file with one input path per line ("#" comments allowed)
    #[arg(long)]
    list: Option<PathBuf>,

    /// Sampling rate in Hz of the input recordings
    #[arg(long)]
    fs: f64,

    /// Output directory
    #[arg(long, default_value = "out_reference")]
    outdir: PathBuf,

    #[command(flatten)]
    welch: WelchArgs,

    /// Band spec (see bandpower)
    #[arg(long)]
    bands: Option<String>,

    /// Accumulate relative power
    #[arg(long)]
    relative: bool,

    /// Accumulate log10 power
    #[arg(long)]
    log10: bool,

    /// Robust aggregation (median + MAD scale)
    #[arg(long)]
    robust: bool,

    /// Windowed mode: sliding window seconds (requires --update)
    #[arg(long, default_value_t = 0.0)]
    window: f64,

    /// Windowed mode: update interval seconds
    #[arg(long, default_value_t = 0.0)]
    update: f64,
}

#[derive(Args)]
struct ConnectivityArgs {
    /// Edge list CSV: node_a,node_b,weight ("#" comments allowed)
    #[arg(long)]
    edges: PathBuf,

    /// Output directory
    #[arg(long, default_value = "out_connectivity")]
    outdir: PathBuf,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Bandpower(args) => run_bandpower(args),
        Command::Artifacts(args) => run_artifacts(args),
        Command::Iaf(args) => run_iaf(args),
        Command::Topomap(args) => run_topomap(args),
        Command::Reference(args) => run_reference(args),
        Command::Connectivity(args) => run_connectivity(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn ensure_outdir(outdir: &Path) -> QeegResult<()> {
    std::fs::create_dir_all(outdir)
        .map_err(|e| QeegError::Parse(format!("failed to create {}: {e}", outdir.display())))
}

fn load_input_recording(input: &InputArgs) -> QeegResult<(Recording, String)> {
    let resolved = resolve_input(&input.input, &ResolveOptions::default())?;
    if !resolved.note.is_empty() {
        log::info!("input: {} ({})", resolved.path.display(), resolved.note);
    }
    let rec = read_recording_csv(&resolved.path, input.fs)?;
    log::info!(
        "loaded {} ({} channels, {} samples, {} Hz)",
        resolved.path.display(),
        rec.n_channels(),
        rec.n_samples(),
        rec.fs_hz
    );
    Ok((rec, resolved.path.display().to_string()))
}

fn resolve_bands(arg: &Option<String>) -> QeegResult<Vec<BandDefinition>> {
    match arg {
        Some(spec) => resolve_bands_spec(spec),
        None => Ok(default_eeg_bands()),
    }
}

fn write_text(path: &Path, text: &str) -> QeegResult<()> {
    std::fs::write(path, text)
        .map_err(|e| QeegError::Parse(format!("failed to write {}: {e}", path.display())))
}

fn run_bandpower(args: BandpowerArgs) -> QeegResult<()> {
    let (rec, input_path) = load_input_recording(&args.input)?;
    let bands = resolve_bands(&args.bands)?;
    ensure_outdir(&args.input.outdir)?;

    let cfg = BandpowerConfig {
        welch: WelchConfig { nperseg: args.welch.nperseg, overlap: args.welch.overlap },
        relative_power: args.relative,
        relative_fmin_hz: 0.0,
        relative_fmax_hz: 0.0,
        log10_power: args.log10,
    };
    let matrix = compute_bandpower_matrix(&rec, &bands, &cfg)?;

    let mut csv = String::from("channel,band,power\n");
    for (b, band) in matrix.bands.iter().enumerate() {
        for (c, channel) in matrix.channel_names.iter().enumerate() {
            writeln!(csv, "{channel},{},{}", band.name, matrix.powers[b][c]).unwrap();
        }
    }
    write_text(&args.input.outdir.join("bandpowers.csv"), &csv)?;
    let mut outputs = vec!["bandpowers.csv".to_string()];

    if let Some(reference_path) = &args.reference {
        let reference = qeeg_io::load_reference_csv(reference_path)?;
        for warning in reference_option_mismatches(&reference, args.relative, args.log10) {
            log::warn!("{warning}");
        }

        let mut z_csv = String::from("channel,band,zscore\n");
        for (b, band) in matrix.bands.iter().enumerate() {
            for (c, channel) in matrix.channel_names.iter().enumerate() {
                let z = reference
                    .zscore(channel, &band.name, matrix.powers[b][c])
                    .unwrap_or(f64::NAN);
                writeln!(z_csv, "{channel},{},{z}", band.name).unwrap();
            }
        }
        write_text(&args.input.outdir.join("zscores.csv"), &z_csv)?;
        outputs.push("zscores.csv".to_string());
    }

    write_run_meta_json(
        &args.input.outdir.join("bandpower_run_meta.json"),
        &BuildInfo::new("qeeg bandpower"),
        &args.input.outdir.display().to_string(),
        Some(&input_path),
        &outputs,
    )
}

fn run_artifacts(args: ArtifactsArgs) -> QeegResult<()> {
    let (rec, input_path) = load_input_recording(&args.input)?;
    ensure_outdir(&args.input.outdir)?;

    let cfg = ArtifactConfig {
        window_seconds: args.window,
        step_seconds: args.step,
        baseline_seconds: args.baseline,
        ptp_z: args.z,
        rms_z: args.z,
        kurtosis_z: args.z,
        min_bad_channels: 1,
    };
    let detection = detect_artifacts(&rec, &cfg)?;
    log::info!(
        "artifacts: {} bad of {} windows",
        detection.total_bad_windows,
        detection.windows.len()
    );

    let mut windows_csv = String::from("t_start_sec,t_end_sec,bad,bad_channel_count\n");
    for w in &detection.windows {
        writeln!(
            windows_csv,
            "{},{},{},{}",
            w.t_start_sec, w.t_end_sec, w.bad as u8, w.bad_channel_count
        )
        .unwrap();
    }
    write_text(&args.input.outdir.join("artifact_windows.csv"), &windows_csv)?;

    let segments = merge_bad_segments(&detection, args.merge_gap);
    let mut segments_csv =
        String::from("t_start_sec,t_end_sec,window_count,max_bad_channels\n");
    for s in &segments {
        writeln!(
            segments_csv,
            "{},{},{},{}",
            s.t_start_sec, s.t_end_sec, s.window_count, s.max_bad_channels
        )
        .unwrap();
    }
    write_text(&args.input.outdir.join("artifact_segments.csv"), &segments_csv)?;

    write_run_meta_json(
        &args.input.outdir.join("artifacts_run_meta.json"),
        &BuildInfo::new("qeeg artifacts"),
        &args.input.outdir.display().to_string(),
        Some(&input_path),
        &["artifact_windows.csv".to_string(), "artifact_segments.csv".to_string()],
    )
}

fn run_iaf(args: IafArgs) -> QeegResult<()> {
    let (rec, input_path) = load_input_recording(&args.input)?;
    ensure_outdir(&args.input.outdir)?;

    let welch = WelchConfig { nperseg: args.welch.nperseg, overlap: args.welch.overlap };
    let cfg = IafConfig {
        alpha_min_hz: args.alpha_min,
        alpha_max_hz: args.alpha_max,
        ..Default::default()
    };

    let mut per_channel_csv =
        String::from("channel,found,iaf_hz,cog_hz,peak_value_db,prominence_db\n");
    let mut found_iafs = Vec::new();
    for (ch, samples) in rec.data.iter().enumerate() {
        let est = estimate_iaf_from_signal(samples, rec.fs_hz, &welch, &cfg)?;
        if est.found {
            found_iafs.push(est.iaf_hz);
        }
        writeln!(
            per_channel_csv,
            "{},{},{},{},{},{}",
            rec.channel_names[ch],
            est.found as u8,
            est.iaf_hz,
            est.cog_hz,
            est.peak_value_db,
            est.prominence_db
        )
        .unwrap();
    }
    write_text(&args.input.outdir.join("iaf_by_channel.csv"), &per_channel_csv)?;
    let mut outputs = vec!["iaf_by_channel.csv".to_string()];

    let aggregate = median_inplace(&mut found_iafs);
    let mut summary = String::new();
    writeln!(summary, "n_channels={}", rec.n_channels()).unwrap();
    writeln!(summary, "n_found={}", found_iafs.len()).unwrap();
    writeln!(summary, "alpha_min_hz={}", args.alpha_min).unwrap();
    writeln!(summary, "alpha_max_hz={}", args.alpha_max).unwrap();
    writeln!(
        summary,
        "aggregate_iaf_hz={}",
        if found_iafs.is_empty() { f64::NAN } else { aggregate }
    )
    .unwrap();
    write_text(&args.input.outdir.join("iaf_summary.txt"), &summary)?;
    outputs.push("iaf_summary.txt".to_string());

    if !found_iafs.is_empty() {
        let bands =
            individualized_bands_from_iaf(aggregate, &IndividualizedBandsConfig::default());
        let spec = bands_to_spec_string(&bands);
        write_text(
            &args.input.outdir.join("iaf_band_spec.txt"),
            &format!("{spec}\n"),
        )?;
        outputs.push("iaf_band_spec.txt".to_string());
        log::info!("recommended IAF-relative bands: {spec}");
    } else {
        log::warn!("no channel produced a usable alpha peak");
    }

    write_run_meta_json(
        &args.input.outdir.join("iaf_run_meta.json"),
        &BuildInfo::new("qeeg iaf"),
        &args.input.outdir.display().to_string(),
        Some(&input_path),
        &outputs,
    )
}

fn grid_to_csv(grid: &Grid2D) -> String {
    let mut csv = String::new();
    for j in 0..grid.size {
        for i in 0..grid.size {
            if i > 0 {
                csv.push(',');
            }
            let v = grid.get(i, j);
            if v.is_nan() {
                csv.push_str("nan");
            } else {
                write!(csv, "{v}").unwrap();
            }
        }
        csv.push('\n');
    }
    csv
}

fn run_topomap(args: TopomapArgs) -> QeegResult<()> {
    let (rec, input_path) = load_input_recording(&args.input)?;
    let bands = resolve_bands(&args.bands)?;
    ensure_outdir(&args.input.outdir)?;

    let montage = match &args.montage {
        Some(path) => Montage::load_csv(path)?,
        None => Montage::builtin_standard_1020_19(),
    };

    let method = match args.interp.as_str() {
        "idw" => TopomapMethod::Idw,
        "spline" | "spherical_spline" | "spherical-spline" => TopomapMethod::SphericalSpline,
        other => {
            return Err(QeegError::InvalidConfig(format!(
                "unknown interpolation \"{other}\" (use idw or spline)"
            )))
        }
    };

    let bp_cfg = BandpowerConfig {
        welch: WelchConfig { nperseg: args.welch.nperseg, overlap: args.welch.overlap },
        relative_power: args.relative,
        relative_fmin_hz: 0.0,
        relative_fmax_hz: 0.0,
        log10_power: false,
    };
    let matrix = compute_bandpower_matrix(&rec, &bands, &bp_cfg)?;

    let topo_cfg = TopomapConfig {
        grid_size: args.grid,
        method,
        ..Default::default()
    };

    let mut outputs = Vec::new();
    for (b, band) in matrix.bands.iter().enumerate() {
        let grid = make_topomap(&montage, &matrix.channel_names, &matrix.powers[b], &topo_cfg)?;
        let filename = format!("topomap_{}.csv", band.name);
        write_text(&args.input.outdir.join(&filename), &grid_to_csv(&grid))?;
        outputs.push(filename);
    }

    write_run_meta_json(
        &args.input.outdir.join("topomap_run_meta.json"),
        &BuildInfo::new("qeeg topomap"),
        &args.input.outdir.display().to_string(),
        Some(&input_path),
        &outputs,
    )
}

fn load_list_file(path: &Path) -> QeegResult<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| QeegError::Parse(format!("failed to read {}: {e}", path.display())))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn run_reference(args: ReferenceArgs) -> QeegResult<()> {
    let mut inputs = args.inputs.clone();
    if let Some(list) = &args.list {
        inputs.extend(load_list_file(list)?);
    }
    if inputs.is_empty() {
        return Err(QeegError::InvalidConfig(
            "at least one --input (or --list) is required".into(),
        ));
    }
    ensure_outdir(&args.outdir)?;

    let bands = resolve_bands(&args.bands)?;
    let cfg = ReferenceConfig {
        welch: WelchConfig { nperseg: args.welch.nperseg, overlap: args.welch.overlap },
        relative_power: args.relative,
        log10_power: args.log10,
        robust: args.robust,
        window_seconds: args.window,
        update_seconds: args.update,
        ..Default::default()
    };
    let mut builder = ReferenceBuilder::new(bands, cfg)?;

    for input in &inputs {
        let resolved = resolve_input(input, &ResolveOptions::default())?;
        let rec = read_recording_csv(&resolved.path, args.fs)?;
        builder.add_recording(&rec)?;
    }

    let stats = builder.finish();
    let out_csv = args.outdir.join("reference.csv");
    write_reference_csv(&stats, &out_csv)?;
    log::info!(
        "wrote reference with {} entries from {} inputs",
        stats.entries.len(),
        stats.n_inputs
    );

    write_run_meta_json(
        &args.outdir.join("reference_run_meta.json"),
        &BuildInfo::new("qeeg reference"),
        &args.outdir.display().to_string(),
        inputs.first().map(String::as_str),
        &["reference.csv".to_string()],
    )
}

fn load_edges_csv(path: &Path) -> QeegResult<Vec<ConnectivityEdge>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| QeegError::Parse(format!("failed to read {}: {e}", path.display())))?;
    let mut edges = Vec::new();
    let mut header_allowed = true;
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cols: Vec<&str> = line.split(',').map(str::trim).collect();
        if cols.len() < 3 {
            return Err(QeegError::Parse(format!(
                "{} line {}: expected node_a,node_b,weight",
                path.display(),
                lineno + 1
            )));
        }
        // Header row (first data-like line with a non-numeric weight).
        if header_allowed && cols[2].parse::<f64>().is_err() {
            header_allowed = false;
            continue;
        }
        header_allowed = false;
        let weight: f64 = cols[2].parse().map_err(|_| {
            QeegError::Parse(format!(
                "{} line {}: invalid weight \"{}\"",
                path.display(),
                lineno + 1,
                cols[2]
            ))
        })?;
        edges.push(ConnectivityEdge {
            a: cols[0].to_string(),
            b: cols[1].to_string(),
            weight,
        });
    }
    Ok(edges)
}

fn run_connectivity(args: ConnectivityArgs) -> QeegResult<()> {
    let edges = load_edges_csv(&args.edges)?;
    ensure_outdir(&args.outdir)?;

    let metrics = compute_graph_metrics(&edges);
    log::info!(
        "connectivity: {} nodes, {} region pairs",
        metrics.nodes.len(),
        metrics.region_pairs.len()
    );

    let mut nodes_csv =
        String::from("node,region,degree,strength,mean_weight,max_weight\n");
    for n in &metrics.nodes {
        writeln!(
            nodes_csv,
            "{},{},{},{},{},{}",
            n.node, n.region, n.degree, n.strength, n.mean_weight, n.max_weight
        )
        .unwrap();
    }
    write_text(&args.outdir.join("connectivity_nodes.csv"), &nodes_csv)?;

    let mut regions_csv =
        String::from("region_a,region_b,edge_count,sum_weight,mean_weight\n");
    for r in &metrics.region_pairs {
        writeln!(
            regions_csv,
            "{},{},{},{},{}",
            r.region_a, r.region_b, r.edge_count, r.sum_weight, r.mean_weight
        )
        .unwrap();
    }
    write_text(&args.outdir.join("connectivity_regions.csv"), &regions_csv)?;

    write_run_meta_json(
        &args.outdir.join("connectivity_run_meta.json"),
        &BuildInfo::new("qeeg connectivity"),
        &args.outdir.display().to_string(),
        Some(&args.edges.display().to_string()),
        &[
            "connectivity_nodes.csv".to_string(),
            "connectivity_regions.csv".to_string(),
        ],
    )
}
