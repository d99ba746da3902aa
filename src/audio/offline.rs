//! Recording backend with no audio output
//!
//! Keeps every node, connection and trigger in memory. Used by the CLI dry-run
//! and by tests, which can also inject faults.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::backend::{AudioBackend, BackendError, NodeId, NodeSpec, Param};
use super::types::Voice;
use crate::drums::DrumHit;

/// What a trigger was aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTarget {
    Voice(Voice),
    Drum(DrumHit),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRecord {
    pub node: NodeId,
    pub target: TriggerTarget,
    pub notes: Vec<u8>,
    pub velocity: u8,
    pub duration_secs: f64,
}

/// Faults a test can inject
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Loading this drum's sample fails
    SampleLoad(DrumHit),
    /// Every sample load takes this long
    SampleDelay(Duration),
    /// Every dispose call fails
    Dispose,
    /// The context refuses to resume
    Resume,
}

#[derive(Debug, Clone, PartialEq)]
enum OfflineNode {
    Built(NodeSpec),
    Sample(DrumHit),
}

impl OfflineNode {
    fn label(&self) -> String {
        match self {
            OfflineNode::Built(spec) => spec.label(),
            OfflineNode::Sample(hit) => format!("{} (sample)", hit.name()),
        }
    }
}

#[derive(Debug, Default)]
struct OfflineState {
    next_id: u64,
    live: HashMap<NodeId, OfflineNode>,
    disposed: HashSet<NodeId>,
    connections: Vec<(NodeId, NodeId)>,
    params: Vec<(NodeId, Param)>,
    triggers: Vec<TriggerRecord>,
    releases: usize,
    suspended: bool,
    faults: Vec<Fault>,
}

impl OfflineState {
    fn allocate(&mut self, node: OfflineNode) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.live.insert(id, node);
        id
    }

    fn live(&self, node: NodeId) -> Result<&OfflineNode, BackendError> {
        match self.live.get(&node) {
            Some(n) => Ok(n),
            None if self.disposed.contains(&node) => Err(BackendError::AlreadyDisposed(node)),
            None => Err(BackendError::UnknownNode(node)),
        }
    }

    fn has_fault(&self, fault: &Fault) -> bool {
        self.faults.contains(fault)
    }
}

#[derive(Debug, Default)]
pub struct OfflineBackend {
    state: Mutex<OfflineState>,
}

impl OfflineBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&self, fault: Fault) {
        self.state.lock().faults.push(fault);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    pub fn triggers(&self) -> Vec<TriggerRecord> {
        self.state.lock().triggers.clone()
    }

    /// Drop recorded triggers, keeping the graph
    pub fn clear_triggers(&self) {
        self.state.lock().triggers.clear();
    }

    pub fn live_nodes(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn disposed_nodes(&self) -> usize {
        self.state.lock().disposed.len()
    }

    /// Live nodes built from a spec matching `predicate`
    pub fn count_live(&self, predicate: impl Fn(&NodeSpec) -> bool) -> usize {
        self.state
            .lock()
            .live
            .values()
            .filter(|n| matches!(n, OfflineNode::Built(spec) if predicate(spec)))
            .count()
    }

    pub fn live_samples(&self) -> usize {
        self.state
            .lock()
            .live
            .values()
            .filter(|n| matches!(n, OfflineNode::Sample(_)))
            .count()
    }

    /// Connections between live nodes, as `(from, to)` labels
    pub fn connections(&self) -> Vec<(String, String)> {
        let state = self.state.lock();
        state
            .connections
            .iter()
            .filter_map(|(from, to)| Some((state.live.get(from)?.label(), state.live.get(to)?.label())))
            .collect()
    }

    pub fn params(&self) -> Vec<(NodeId, Param)> {
        self.state.lock().params.clone()
    }

    /// Number of `release_all` calls
    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }

    pub fn is_suspended(&self) -> bool {
        self.state.lock().suspended
    }
}

#[async_trait]
impl AudioBackend for OfflineBackend {
    async fn create(&self, spec: NodeSpec) -> Result<NodeId, BackendError> {
        Ok(self.state.lock().allocate(OfflineNode::Built(spec)))
    }

    async fn load_sample(&self, hit: DrumHit, path: PathBuf) -> Result<NodeId, BackendError> {
        let delay = self.state.lock().faults.iter().find_map(|f| match f {
            Fault::SampleDelay(d) => Some(*d),
            _ => None,
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if state.has_fault(&Fault::SampleLoad(hit)) {
            return Err(BackendError::SampleLoad {
                path,
                reason: "injected failure".to_string(),
            });
        }
        Ok(state.allocate(OfflineNode::Sample(hit)))
    }

    fn dispose(&self, node: NodeId) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.live(node)?;
        if state.has_fault(&Fault::Dispose) {
            return Err(BackendError::Context(format!("injected dispose failure on {}", node)));
        }
        state.live.remove(&node);
        state.disposed.insert(node);
        Ok(())
    }

    fn connect(&self, from: NodeId, to: NodeId) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.live(from)?;
        state.live(to)?;
        state.connections.push((from, to));
        Ok(())
    }

    fn set_param(&self, node: NodeId, param: Param) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.live(node)?;
        state.params.push((node, param));
        Ok(())
    }

    fn trigger(
        &self,
        node: NodeId,
        notes: &[u8],
        velocity: u8,
        duration_secs: f64,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let target = match state.live(node)? {
            OfflineNode::Built(NodeSpec::Synth { voice, .. }) => TriggerTarget::Voice(*voice),
            OfflineNode::Built(NodeSpec::SynthDrum { hit }) | OfflineNode::Sample(hit) => {
                TriggerTarget::Drum(*hit)
            }
            OfflineNode::Built(other) => {
                return Err(BackendError::Context(format!("{} cannot play notes", other.label())))
            }
        };
        state.triggers.push(TriggerRecord {
            node,
            target,
            notes: notes.to_vec(),
            velocity,
            duration_secs,
        });
        Ok(())
    }

    fn release_all(&self, node: NodeId) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.live(node)?;
        state.releases += 1;
        Ok(())
    }

    async fn suspend(&self) -> Result<(), BackendError> {
        self.state.lock().suspended = true;
        Ok(())
    }

    async fn resume(&self) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if state.has_fault(&Fault::Resume) {
            return Err(BackendError::Context("injected resume failure".to_string()));
        }
        state.suspended = false;
        Ok(())
    }
}
