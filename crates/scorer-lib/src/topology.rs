//! Static description of the cluster hardware
//!
//! Loaded once at process start and shared read-only afterwards. Nodes are
//! looked up by name; hardware classes by the node's hardware identity.

use crate::error::{ScorerError, ScorerResult};
use crate::models::SocketKey;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Core {
    pub id: u32,
}

/// A CPU package and the cores it owns, in topology order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Socket {
    pub id: u32,
    #[serde(default)]
    pub cores: Vec<Core>,
}

impl Socket {
    pub fn core_count(&self) -> usize {
        self.cores.len()
    }

    pub fn core_ids(&self) -> Vec<u32> {
        self.cores.iter().map(|c| c.id).collect()
    }
}

/// A machine that can receive workloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    /// Hardware identity, used both for telemetry lookups and class lookups
    pub uuid: String,
    #[serde(default = "default_threads_per_core")]
    pub threads_per_core: u32,
    #[serde(default)]
    pub max_ghz: f64,
    #[serde(default)]
    pub l1d_cache_kb: u32,
    #[serde(default)]
    pub l1i_cache_kb: u32,
    #[serde(default)]
    pub l2_cache_kb: u32,
    #[serde(default)]
    pub l3_cache_kb: u32,
    pub sockets: Vec<Socket>,
}

fn default_threads_per_core() -> u32 {
    1
}

impl Node {
    pub fn socket(&self, id: u32) -> Option<&Socket> {
        self.sockets.iter().find(|s| s.id == id)
    }

    pub fn core_count(&self) -> usize {
        self.sockets.iter().map(Socket::core_count).sum()
    }
}

/// Interconnect and frequency weighting for a family of machines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareClass {
    pub uuid: String,
    pub interconnect: [f64; 2],
    pub max_frequency_ghz: f64,
}

/// On-disk shape of the topology file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyFile {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub hardware_classes: Vec<HardwareClassEntry>,
}

/// Hardware class as written in the topology file; the interconnect pair is
/// validated on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareClassEntry {
    pub uuid: String,
    pub interconnect: Vec<f64>,
    pub max_frequency_ghz: f64,
}

/// Immutable topology model
#[derive(Debug, Clone, Default)]
pub struct Topology {
    nodes: HashMap<String, Node>,
    classes: HashMap<String, HardwareClass>,
}

impl Topology {
    /// Build a topology, rejecting inconsistent descriptions
    pub fn new(
        nodes: impl IntoIterator<Item = Node>,
        classes: impl IntoIterator<Item = HardwareClass>,
    ) -> ScorerResult<Self> {
        let mut by_name = HashMap::new();
        for node in nodes {
            if node.sockets.is_empty() {
                return Err(ScorerError::ConfigUnreadable(format!(
                    "node {} has no sockets",
                    node.name
                )));
            }
            let mut seen = HashSet::new();
            for socket in &node.sockets {
                if !seen.insert(socket.id) {
                    return Err(ScorerError::ConfigUnreadable(format!(
                        "node {} declares socket {} twice",
                        node.name, socket.id
                    )));
                }
            }
            let name = node.name.clone();
            if by_name.insert(name.clone(), node).is_some() {
                return Err(ScorerError::ConfigUnreadable(format!(
                    "node {name} declared twice"
                )));
            }
        }

        let classes = classes.into_iter().map(|c| (c.uuid.clone(), c)).collect();

        Ok(Self {
            nodes: by_name,
            classes,
        })
    }

    /// Load a topology file (YAML, TOML or JSON, chosen by extension)
    pub fn load(path: impl AsRef<Path>) -> ScorerResult<Self> {
        let path = path.as_ref();
        let file: TopologyFile = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| {
                ScorerError::ConfigUnreadable(format!("{}: {}", path.display(), e))
            })?;

        Self::from_file(file)
    }

    pub fn from_file(file: TopologyFile) -> ScorerResult<Self> {
        let mut classes = Vec::with_capacity(file.hardware_classes.len());
        for entry in file.hardware_classes {
            let interconnect: [f64; 2] = entry.interconnect.as_slice().try_into().map_err(|_| {
                ScorerError::ConfigUnreadable(format!(
                    "hardware class {} needs exactly two interconnect factors, got {}",
                    entry.uuid,
                    entry.interconnect.len()
                ))
            })?;
            classes.push(HardwareClass {
                uuid: entry.uuid,
                interconnect,
                max_frequency_ghz: entry.max_frequency_ghz,
            });
        }

        Self::new(file.nodes, classes)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Lookup that fails with `TopologyNotFound`
    pub fn require_node(&self, name: &str) -> ScorerResult<&Node> {
        self.node(name)
            .ok_or_else(|| ScorerError::TopologyNotFound(name.to_string()))
    }

    pub fn hardware_class(&self, node: &Node) -> Option<&HardwareClass> {
        self.classes.get(&node.uuid)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every (node, socket) pair, sorted for stable output
    pub fn socket_keys(&self) -> Vec<SocketKey> {
        let mut keys: Vec<SocketKey> = self
            .nodes
            .values()
            .flat_map(|n| n.sockets.iter().map(|s| SocketKey::new(&n.name, s.id)))
            .collect();
        keys.sort();
        keys
    }
}
