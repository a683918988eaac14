//! Connectivity graph summaries
//!
//! Reduces an undirected weighted edge list (channel pairs with a coherence
//! or correlation weight) to per-node metrics and a coarse lobe/hemisphere
//! region table. Region classification uses lightweight 10-20/10-10 label
//! heuristics on normalized channel names.

use std::collections::{HashMap, HashSet};

use qeeg_core::normalize_channel_name;

/// One undirected weighted edge.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConnectivityEdge {
    pub a: String,
    pub b: String,
    pub weight: f64,
}

/// Hemisphere bucket from a 10-20 style label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Hemisphere {
    Left,
    Right,
    Midline,
    Unknown,
}

impl Hemisphere {
    pub fn name(self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Midline => "Midline",
            Self::Unknown => "Unknown",
        }
    }

    fn short(self) -> &'static str {
        match self {
            Self::Left => "L",
            Self::Right => "R",
            Self::Midline => "Z",
            Self::Unknown => "U",
        }
    }
}

/// Coarse lobe bucket from a 10-20 style label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Lobe {
    Frontal,
    Central,
    Parietal,
    Occipital,
    Temporal,
    Other,
}

impl Lobe {
    pub fn name(self) -> &'static str {
        match self {
            Self::Frontal => "Frontal",
            Self::Central => "Central",
            Self::Parietal => "Parietal",
            Self::Occipital => "Occipital",
            Self::Temporal => "Temporal",
            Self::Other => "Other",
        }
    }
}

/// Hemisphere rule: trailing 'z' is midline; otherwise the parity of the
/// trailing integer decides (odd = left, even = right).
pub fn infer_hemisphere(channel: &str) -> Hemisphere {
    let norm = normalize_channel_name(channel);
    if norm.is_empty() {
        return Hemisphere::Unknown;
    }
    if norm.ends_with('z') {
        return Hemisphere::Midline;
    }

    let digits: String = norm
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return Hemisphere::Unknown;
    }
    let value: u32 = digits
        .chars()
        .rev()
        .collect::<String>()
        .parse()
        .unwrap_or(0);
    if value % 2 == 1 {
        Hemisphere::Left
    } else {
        Hemisphere::Right
    }
}

/// Lobe rule: two-letter prefixes first (fp/af frontal, ft/tp temporal,
/// po occipital, fc central, cp parietal), then single-letter buckets.
pub fn infer_lobe(channel: &str) -> Lobe {
    let norm = normalize_channel_name(channel);
    if norm.is_empty() {
        return Lobe::Other;
    }

    const TWO_LETTER: [(&str, Lobe); 7] = [
        ("fp", Lobe::Frontal),
        ("af", Lobe::Frontal),
        ("ft", Lobe::Temporal),
        ("tp", Lobe::Temporal),
        ("po", Lobe::Occipital),
        ("fc", Lobe::Central),
        ("cp", Lobe::Parietal),
    ];
    for (prefix, lobe) in TWO_LETTER {
        if norm.starts_with(prefix) {
            return lobe;
        }
    }

    match norm.as_bytes()[0] {
        b'f' => Lobe::Frontal,
        b'c' => Lobe::Central,
        b'p' => Lobe::Parietal,
        b'o' => Lobe::Occipital,
        b't' => Lobe::Temporal,
        _ => Lobe::Other,
    }
}

/// Combined region label, e.g. "Frontal_L", "Central_Z".
pub fn region_label(channel: &str) -> String {
    format!("{}_{}", infer_lobe(channel).name(), infer_hemisphere(channel).short())
}

/// Per-node graph metrics.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeMetrics {
    pub node: String,
    pub lobe: Lobe,
    pub hemisphere: Hemisphere,
    pub region: String,

    /// Unique neighbor count.
    pub degree: usize,
    /// Sum of incident edge weights.
    pub strength: f64,
    /// strength / degree (NaN for isolated nodes).
    pub mean_weight: f64,
    pub max_weight: f64,
}

/// Aggregated edges between a canonical region pair.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegionPairMetrics {
    pub region_a: String,
    pub region_b: String,
    pub edge_count: usize,
    pub sum_weight: f64,
    pub mean_weight: f64,
}

/// Node and region summaries of an edge list.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct GraphMetrics {
    /// Sorted by node name.
    pub nodes: Vec<NodeMetrics>,
    /// Sorted by (region_a, region_b).
    pub region_pairs: Vec<RegionPairMetrics>,
}

fn canonical_pair(a: &str, b: &str) -> (String, String) {
    if b < a {
        (b.to_string(), a.to_string())
    } else {
        (a.to_string(), b.to_string())
    }
}

/// Compute node degree/strength and region-pair summaries.
///
/// Duplicate unordered pairs keep their first occurrence; self-loops and
/// non-finite weights are dropped.
pub fn compute_graph_metrics(edges: &[ConnectivityEdge]) -> GraphMetrics {
    #[derive(Default)]
    struct NodeAgg {
        neighbors: HashSet<String>,
        strength: f64,
        max_weight: f64,
    }

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut nodes: HashMap<String, NodeAgg> = HashMap::new();
    let mut regions: HashMap<(String, String), (usize, f64)> = HashMap::new();

    for edge in edges {
        if edge.a.is_empty() || edge.b.is_empty() || edge.a == edge.b {
            continue;
        }
        if !edge.weight.is_finite() {
            continue;
        }
        if !seen.insert(canonical_pair(&edge.a, &edge.b)) {
            continue;
        }

        for (node, other) in [(&edge.a, &edge.b), (&edge.b, &edge.a)] {
            let agg = nodes.entry(node.clone()).or_insert_with(|| NodeAgg {
                max_weight: f64::NEG_INFINITY,
                ..Default::default()
            });
            agg.neighbors.insert(other.clone());
            agg.strength += edge.weight;
            agg.max_weight = agg.max_weight.max(edge.weight);
        }

        let rkey = canonical_pair(&region_label(&edge.a), &region_label(&edge.b));
        let r = regions.entry(rkey).or_insert((0, 0.0));
        r.0 += 1;
        r.1 += edge.weight;
    }

    let mut out = GraphMetrics::default();

    let mut names: Vec<String> = nodes.keys().cloned().collect();
    names.sort();
    for name in &names {
        let agg = &nodes[name.as_str()];
        let degree = agg.neighbors.len();
        out.nodes.push(NodeMetrics {
            node: name.clone(),
            lobe: infer_lobe(name),
            hemisphere: infer_hemisphere(name),
            region: region_label(name),
            degree,
            strength: agg.strength,
            mean_weight: if degree > 0 {
                agg.strength / degree as f64
            } else {
                f64::NAN
            },
            max_weight: if agg.max_weight.is_finite() {
                agg.max_weight
            } else {
                f64::NAN
            },
        });
    }

    for ((region_a, region_b), (edge_count, sum_weight)) in regions {
        out.region_pairs.push(RegionPairMetrics {
            region_a,
            region_b,
            edge_count,
            sum_weight,
            mean_weight: if edge_count > 0 {
                sum_weight / edge_count as f64
            } else {
                f64::NAN
            },
        });
    }
    out.region_pairs
        .sort_by(|a, b| (&a.region_a, &a.region_b).cmp(&(&b.region_a, &b.region_b)));

    out
}
