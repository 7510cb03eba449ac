//! HDBSCAN: hierarchical density-based clustering.
//!
//! 1. Core distance of each point: distance to its `min_samples`-th
//!    nearest neighbour, counting the point itself
//! 2. Mutual reachability `max(core_a, core_b, d(a, b))`
//! 3. Minimum spanning tree over mutual reachability (Prim, O(n²))
//! 4. Single-linkage hierarchy from the sorted tree edges
//! 5. Condensed tree: splits smaller than `min_cluster_size` are points
//!    falling out of their parent rather than new clusters
//! 6. Cluster selection by excess of mass or leaves; the root is never
//!    selected, so one undivided population is all noise
//!
//! Points are expected pre-normalised when cosine distance is wanted.

use engram_core::error::ClusterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest distance used when converting to λ = 1/d.
const MIN_DISTANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterSelectionMethod {
    /// Excess of mass: prefer the most persistent clusters
    #[default]
    Eom,
    /// Leaves of the condensed tree: many small, homogeneous clusters
    Leaf,
}

impl fmt::Display for ClusterSelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eom => f.write_str("eom"),
            Self::Leaf => f.write_str("leaf"),
        }
    }
}

impl FromStr for ClusterSelectionMethod {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eom" => Ok(Self::Eom),
            "leaf" => Ok(Self::Leaf),
            other => Err(ClusterError::InvalidParameter(format!(
                "cluster_selection_method must be 'eom' or 'leaf', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdbscanParams {
    pub min_cluster_size: usize,
    pub min_samples: usize,
    pub selection_method: ClusterSelectionMethod,
}

impl Default for HdbscanParams {
    fn default() -> Self {
        Self {
            min_cluster_size: 5,
            min_samples: 3,
            selection_method: ClusterSelectionMethod::Eom,
        }
    }
}

impl HdbscanParams {
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.min_cluster_size < 2 {
            return Err(ClusterError::InvalidParameter(format!(
                "min_cluster_size must be >= 2, got {}",
                self.min_cluster_size
            )));
        }
        if self.min_samples == 0 || self.min_samples > self.min_cluster_size {
            return Err(ClusterError::InvalidParameter(format!(
                "min_samples must be in 1..={}, got {}",
                self.min_cluster_size, self.min_samples
            )));
        }
        Ok(())
    }
}

/// Flat labelling: `-1` is noise, clusters are `0..k`.
#[derive(Debug, Clone, PartialEq)]
pub struct Labelling {
    pub labels: Vec<i64>,
    pub probabilities: Vec<f64>,
}

impl Labelling {
    fn all_noise(n: usize) -> Self {
        Self {
            labels: vec![-1; n],
            probabilities: vec![0.0; n],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Hdbscan {
    params: HdbscanParams,
}

impl Hdbscan {
    pub fn new(params: HdbscanParams) -> Result<Self, ClusterError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &HdbscanParams {
        &self.params
    }

    /// Cluster `points` (rows of equal length) under Euclidean distance.
    pub fn fit(&self, points: &[Vec<f64>]) -> Labelling {
        let n = points.len();
        let mcs = self.params.min_cluster_size;
        if n < mcs || n < 2 {
            return Labelling::all_noise(n);
        }

        let core = core_distances(points, self.params.min_samples);
        let edges = minimum_spanning_tree(points, &core);
        let merges = single_linkage(n, edges);
        let tree = CondensedTree::build(&merges, n, mcs);

        let selected = match self.params.selection_method {
            ClusterSelectionMethod::Eom => tree.select_eom(),
            ClusterSelectionMethod::Leaf => tree.select_leaves(),
        };
        tree.label(&selected)
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

fn core_distances(points: &[Vec<f64>], min_samples: usize) -> Vec<f64> {
    let n = points.len();
    let kth = (min_samples - 1).min(n - 1);
    let mut dists = vec![0.0f64; n];

    points
        .iter()
        .map(|p| {
            for (d, q) in dists.iter_mut().zip(points) {
                *d = euclidean(p, q);
            }
            let (_, value, _) = dists.select_nth_unstable_by(kth, f64::total_cmp);
            *value
        })
        .collect()
}

struct Edge {
    a: usize,
    b: usize,
    weight: f64,
}

/// Prim's algorithm over the implicit complete mutual-reachability graph.
fn minimum_spanning_tree(points: &[Vec<f64>], core: &[f64]) -> Vec<Edge> {
    let n = points.len();
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut from = vec![0usize; n];
    let mut edges = Vec::with_capacity(n - 1);

    let mut current = 0;
    in_tree[0] = true;
    for _ in 1..n {
        let mut next = usize::MAX;
        let mut next_weight = f64::INFINITY;

        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            let reach = euclidean(&points[current], &points[j])
                .max(core[current])
                .max(core[j]);
            if reach < best[j] {
                best[j] = reach;
                from[j] = current;
            }
            if best[j] < next_weight || next == usize::MAX {
                next_weight = best[j];
                next = j;
            }
        }

        in_tree[next] = true;
        edges.push(Edge {
            a: from[next],
            b: next,
            weight: next_weight,
        });
        current = next;
    }
    edges
}

/// One merge of the single-linkage dendrogram. Node ids below `n` are
/// points; merge `i` creates node `n + i`.
struct Merge {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

fn single_linkage(n: usize, mut edges: Vec<Edge>) -> Vec<Merge> {
    edges.sort_by(|x, y| x.weight.total_cmp(&y.weight));

    let total = 2 * n - 1;
    let mut parent: Vec<usize> = (0..total).collect();
    let mut size = vec![1usize; total];
    let mut merges = Vec::with_capacity(n - 1);

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        let mut root = x;
        while parent[root] != root {
            root = parent[root];
        }
        while parent[x] != root {
            let up = parent[x];
            parent[x] = root;
            x = up;
        }
        root
    }

    for (i, edge) in edges.iter().enumerate() {
        let ra = find(&mut parent, edge.a);
        let rb = find(&mut parent, edge.b);
        let node = n + i;
        size[node] = size[ra] + size[rb];
        parent[ra] = node;
        parent[rb] = node;
        merges.push(Merge {
            left: ra,
            right: rb,
            distance: edge.weight,
            size: size[node],
        });
    }
    merges
}

/// A row of the condensed tree: `child` (a point below `n`, or a cluster
/// id at or above `n`) leaves `parent` at density `lambda`.
struct Row {
    parent: usize,
    child: usize,
    lambda: f64,
    size: usize,
}

struct CondensedTree {
    n: usize,
    rows: Vec<Row>,
    /// Cluster ids are `n..n + n_clusters`; `n` is the root
    n_clusters: usize,
}

impl CondensedTree {
    fn build(merges: &[Merge], n: usize, mcs: usize) -> Self {
        let root = 2 * n - 2;
        let node_size = |node: usize| if node < n { 1 } else { merges[node - n].size };
        let children = |node: usize| {
            let m = &merges[node - n];
            (m.left, m.right)
        };

        // Breadth-first order guarantees a node is relabelled before its children
        let mut order = Vec::with_capacity(2 * n - 1);
        order.push(root);
        let mut head = 0;
        while head < order.len() {
            let node = order[head];
            head += 1;
            if node >= n {
                let (l, r) = children(node);
                order.push(l);
                order.push(r);
            }
        }

        let mut relabel = vec![0usize; 2 * n - 1];
        let mut ignore = vec![false; 2 * n - 1];
        relabel[root] = n;
        let mut next_label = n + 1;
        let mut rows = Vec::new();

        for &node in &order {
            if ignore[node] || node < n {
                continue;
            }
            let (left, right) = children(node);
            let lambda = 1.0 / merges[node - n].distance.max(MIN_DISTANCE);
            let (ls, rs) = (node_size(left), node_size(right));
            let label = relabel[node];

            match (ls >= mcs, rs >= mcs) {
                (true, true) => {
                    for (child, size) in [(left, ls), (right, rs)] {
                        relabel[child] = next_label;
                        rows.push(Row {
                            parent: label,
                            child: next_label,
                            lambda,
                            size,
                        });
                        next_label += 1;
                    }
                }
                (false, false) => {
                    for child in [left, right] {
                        fall_out(child, label, lambda, n, merges, &mut ignore, &mut rows);
                    }
                }
                (false, true) => {
                    relabel[right] = label;
                    fall_out(left, label, lambda, n, merges, &mut ignore, &mut rows);
                }
                (true, false) => {
                    relabel[left] = label;
                    fall_out(right, label, lambda, n, merges, &mut ignore, &mut rows);
                }
            }
        }

        Self {
            n,
            rows,
            n_clusters: next_label - n,
        }
    }

    fn index(&self, cluster: usize) -> usize {
        cluster - self.n
    }

    /// Child clusters of each cluster, by index.
    fn child_clusters(&self) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); self.n_clusters];
        for row in self.rows.iter().filter(|r| r.child >= self.n) {
            out[self.index(row.parent)].push(self.index(row.child));
        }
        out
    }

    /// Parent cluster index of each cluster; the root is its own parent.
    fn parents(&self) -> Vec<usize> {
        let mut out: Vec<usize> = (0..self.n_clusters).collect();
        for row in self.rows.iter().filter(|r| r.child >= self.n) {
            out[self.index(row.child)] = self.index(row.parent);
        }
        out
    }

    fn stabilities(&self) -> Vec<f64> {
        let mut birth = vec![0.0f64; self.n_clusters];
        for row in self.rows.iter().filter(|r| r.child >= self.n) {
            birth[self.index(row.child)] = row.lambda;
        }

        let mut stability = vec![0.0f64; self.n_clusters];
        for row in &self.rows {
            let p = self.index(row.parent);
            stability[p] += (row.lambda - birth[p]) * row.size as f64;
        }
        stability
    }

    /// Excess-of-mass selection, bottom-up.
    fn select_eom(&self) -> Vec<bool> {
        let mut stability = self.stabilities();
        let children = self.child_clusters();
        let mut selected = vec![true; self.n_clusters];
        selected[0] = false;

        // Children always carry larger ids than their parent
        for c in (1..self.n_clusters).rev() {
            let subtree: f64 = children[c].iter().map(|&k| stability[k]).sum();
            if subtree > stability[c] {
                selected[c] = false;
                stability[c] = subtree;
            } else {
                let mut stack = children[c].clone();
                while let Some(d) = stack.pop() {
                    selected[d] = false;
                    stack.extend(children[d].iter().copied());
                }
            }
        }
        selected
    }

    fn select_leaves(&self) -> Vec<bool> {
        let children = self.child_clusters();
        (0..self.n_clusters)
            .map(|c| c != 0 && children[c].is_empty())
            .collect()
    }

    fn label(&self, selected: &[bool]) -> Labelling {
        let mut labelling = Labelling::all_noise(self.n);

        // Selected cluster index -> flat label, ascending by id
        let mut flat = vec![-1i64; self.n_clusters];
        let mut next = 0i64;
        for (c, &sel) in selected.iter().enumerate() {
            if sel {
                flat[c] = next;
                next += 1;
            }
        }
        if next == 0 {
            return labelling;
        }

        let parents = self.parents();
        let mut death = vec![0.0f64; self.n_clusters];
        for row in &self.rows {
            let p = self.index(row.parent);
            death[p] = death[p].max(row.lambda);
        }

        for row in self.rows.iter().filter(|r| r.child < self.n) {
            let mut c = self.index(row.parent);
            let owner = loop {
                if selected[c] {
                    break Some(c);
                }
                if c == 0 {
                    break None;
                }
                c = parents[c];
            };
            let Some(owner) = owner else {
                continue;
            };

            let point = row.child;
            labelling.labels[point] = flat[owner];
            let max_lambda = death[owner];
            labelling.probabilities[point] = if max_lambda <= 0.0 || !row.lambda.is_finite() {
                1.0
            } else {
                row.lambda.min(max_lambda) / max_lambda
            };
        }
        labelling
    }
}

/// Every point under `node` leaves cluster `label` at `lambda`.
fn fall_out(
    node: usize,
    label: usize,
    lambda: f64,
    n: usize,
    merges: &[Merge],
    ignore: &mut [bool],
    rows: &mut Vec<Row>,
) {
    let mut stack = vec![node];
    while let Some(x) = stack.pop() {
        ignore[x] = true;
        if x < n {
            rows.push(Row {
                parent: label,
                child: x,
                lambda,
                size: 1,
            });
        } else {
            let m = &merges[x - n];
            stack.push(m.left);
            stack.push(m.right);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mcs: usize, ms: usize) -> HdbscanParams {
        HdbscanParams {
            min_cluster_size: mcs,
            min_samples: ms,
            selection_method: ClusterSelectionMethod::Eom,
        }
    }

    /// Six points around each of two far-apart centres on a line.
    fn two_groups() -> Vec<Vec<f64>> {
        let mut pts = Vec::new();
        for i in 0..6 {
            pts.push(vec![i as f64 * 0.1, 0.0]);
        }
        for i in 0..6 {
            pts.push(vec![100.0 + i as f64 * 0.1, 0.0]);
        }
        pts
    }

    #[test]
    fn params_validated() {
        assert!(params(1, 1).validate().is_err());
        assert!(params(5, 0).validate().is_err());
        assert!(params(5, 6).validate().is_err());
        assert!(params(5, 5).validate().is_ok());
        assert!(HdbscanParams::default().validate().is_ok());
    }

    #[test]
    fn selection_method_parses() {
        assert_eq!("eom".parse::<ClusterSelectionMethod>().unwrap(), ClusterSelectionMethod::Eom);
        assert_eq!("leaf".parse::<ClusterSelectionMethod>().unwrap(), ClusterSelectionMethod::Leaf);
        assert!("kmeans".parse::<ClusterSelectionMethod>().is_err());
    }

    #[test]
    fn too_few_points_all_noise() {
        let h = Hdbscan::new(params(5, 3)).unwrap();
        let out = h.fit(&[vec![0.0], vec![0.1], vec![0.2]]);
        assert_eq!(out.labels, vec![-1, -1, -1]);
        assert_eq!(out.probabilities, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn separates_two_groups() {
        let h = Hdbscan::new(params(5, 3)).unwrap();
        let out = h.fit(&two_groups());

        let first = out.labels[0];
        let second = out.labels[6];
        assert!(first >= 0 && second >= 0);
        assert_ne!(first, second);
        assert!(out.labels[..6].iter().all(|&l| l == first));
        assert!(out.labels[6..].iter().all(|&l| l == second));
        let mut distinct = vec![first, second];
        distinct.sort();
        assert_eq!(distinct, vec![0, 1]);
    }

    #[test]
    fn leaf_selection_separates_two_groups() {
        let mut p = params(5, 3);
        p.selection_method = ClusterSelectionMethod::Leaf;
        let out = Hdbscan::new(p).unwrap().fit(&two_groups());
        assert_ne!(out.labels[0], out.labels[6]);
        assert!(out.labels.iter().all(|&l| l >= 0));
    }

    #[test]
    fn single_population_is_noise() {
        let pts: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64 * 0.01, 0.0]).collect();
        let out = Hdbscan::new(params(5, 3)).unwrap().fit(&pts);
        assert!(out.labels.iter().all(|&l| l == -1));
    }

    #[test]
    fn distant_outlier_is_noise() {
        let mut pts = two_groups();
        pts.push(vec![50.0, 400.0]);
        let out = Hdbscan::new(params(5, 3)).unwrap().fit(&pts);
        assert_eq!(out.labels[12], -1);
        assert_eq!(out.probabilities[12], 0.0);
        assert!(out.labels[..12].iter().all(|&l| l >= 0));
    }

    #[test]
    fn probabilities_in_unit_interval() {
        let mut pts = two_groups();
        pts.push(vec![50.0, 400.0]);
        pts.push(vec![0.05, 0.3]);
        let out = Hdbscan::new(params(5, 2)).unwrap().fit(&pts);
        for (l, p) in out.labels.iter().zip(&out.probabilities) {
            assert!((0.0..=1.0).contains(p));
            if *l == -1 {
                assert_eq!(*p, 0.0);
            }
        }
    }

    #[test]
    fn duplicate_points_do_not_break_lambda() {
        let mut pts = vec![vec![1.0, 1.0]; 6];
        pts.extend(vec![vec![-1.0, -1.0]; 6]);
        let out = Hdbscan::new(params(5, 3)).unwrap().fit(&pts);
        assert!(out.probabilities.iter().all(|p| p.is_finite()));
        assert_ne!(out.labels[0], out.labels[6]);
    }
}
