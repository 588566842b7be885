#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use s2flow::errors::ErrorKind;
use s2flow::stage::{StageFunction, StageRegistry};
use s2flow::types::{Stage, StageValue};

use crate::builders::fake_output;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeEventKind {
    Start,
    End,
}

/// One start or end of a fake stage call.
#[derive(Debug, Clone)]
pub struct ProbeEvent {
    pub item: String,
    pub stage: Stage,
    pub kind: ProbeEventKind,
    pub at: Instant,
    /// The value the stage was called with (set on `Start`).
    pub input: Option<StageValue>,
}

#[derive(Debug, Default)]
struct ProbeState {
    running: usize,
    peak: usize,
    events: Vec<ProbeEvent>,
}

/// Records every fake stage call and how many ran at once.
#[derive(Debug, Default)]
pub struct Probe {
    state: Mutex<ProbeState>,
}

impl Probe {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(&self, item: &str, stage: Stage, input: &StageValue) {
        let mut st = self.state.lock().unwrap();
        st.running += 1;
        st.peak = st.peak.max(st.running);
        st.events.push(ProbeEvent {
            item: item.to_string(),
            stage,
            kind: ProbeEventKind::Start,
            at: Instant::now(),
            input: Some(input.clone()),
        });
    }

    fn exit(&self, item: &str, stage: Stage) {
        let mut st = self.state.lock().unwrap();
        st.running -= 1;
        st.events.push(ProbeEvent {
            item: item.to_string(),
            stage,
            kind: ProbeEventKind::End,
            at: Instant::now(),
            input: None,
        });
    }

    /// Highest number of fake stages observed running at once.
    pub fn peak(&self) -> usize {
        self.state.lock().unwrap().peak
    }

    pub fn events(&self) -> Vec<ProbeEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// `(item, stage)` of every call, in start order.
    pub fn starts(&self) -> Vec<(String, Stage)> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == ProbeEventKind::Start)
            .map(|e| (e.item, e.stage))
            .collect()
    }

    pub fn ran(&self, item: &str, stage: Stage) -> bool {
        self.starts().iter().any(|(i, s)| i == item && *s == stage)
    }

    pub fn calls(&self, item: &str, stage: Stage) -> usize {
        self.starts()
            .iter()
            .filter(|(i, s)| i == item && *s == stage)
            .count()
    }

    /// Input passed to the first call of `stage` for `item`.
    pub fn input_of(&self, item: &str, stage: Stage) -> Option<StageValue> {
        self.events()
            .into_iter()
            .find(|e| e.kind == ProbeEventKind::Start && e.item == item && e.stage == stage)
            .and_then(|e| e.input)
    }

    pub fn start_of(&self, item: &str, stage: Stage) -> Option<Instant> {
        self.event_at(item, stage, ProbeEventKind::Start)
    }

    pub fn end_of(&self, item: &str, stage: Stage) -> Option<Instant> {
        self.event_at(item, stage, ProbeEventKind::End)
    }

    fn event_at(&self, item: &str, stage: Stage, kind: ProbeEventKind) -> Option<Instant> {
        self.events()
            .into_iter()
            .find(|e| e.kind == kind && e.item == item && e.stage == stage)
            .map(|e| e.at)
    }
}

/// Marks the call as ended even when the stage panics.
struct Running<'a> {
    probe: &'a Probe,
    item: &'a str,
    stage: Stage,
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.probe.exit(self.item, self.stage);
    }
}

/// Stage function whose behaviour per item is scripted up front.
///
/// Succeeds with [`fake_output`] unless told to fail or panic for an item.
#[derive(Debug, Clone)]
pub struct ScriptedStage {
    stage: Stage,
    probe: Arc<Probe>,
    delay: Duration,
    delay_for: HashMap<String, Duration>,
    fail_for: HashMap<String, ErrorKind>,
    panic_for: HashSet<String>,
}

impl ScriptedStage {
    pub fn new(stage: Stage, probe: Arc<Probe>) -> Self {
        Self {
            stage,
            probe,
            delay: Duration::ZERO,
            delay_for: HashMap::new(),
            fail_for: HashMap::new(),
            panic_for: HashSet::new(),
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn delay_for(mut self, item: &str, delay: Duration) -> Self {
        self.delay_for.insert(item.to_string(), delay);
        self
    }

    pub fn fail_for(mut self, item: &str, kind: ErrorKind) -> Self {
        self.fail_for.insert(item.to_string(), kind);
        self
    }

    pub fn panic_for(mut self, item: &str) -> Self {
        self.panic_for.insert(item.to_string());
        self
    }
}

impl StageFunction for ScriptedStage {
    fn stage(&self) -> Stage {
        self.stage
    }

    fn run(&self, item: &str, input: &StageValue) -> Result<PathBuf, ErrorKind> {
        self.probe.enter(item, self.stage, input);
        let _running = Running {
            probe: &self.probe,
            item,
            stage: self.stage,
        };

        let delay = self.delay_for.get(item).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        if self.panic_for.contains(item) {
            panic!("scripted panic in {} for {item}", self.stage);
        }
        if let Some(kind) = self.fail_for.get(item) {
            return Err(kind.clone());
        }
        Ok(fake_output(self.stage, item))
    }
}

/// All four stages scripted against one shared [`Probe`].
#[derive(Debug, Clone)]
pub struct FakeStages {
    probe: Arc<Probe>,
    stages: BTreeMap<Stage, ScriptedStage>,
}

impl FakeStages {
    pub fn new() -> Self {
        let probe = Probe::shared();
        let stages = Stage::ALL
            .into_iter()
            .map(|s| (s, ScriptedStage::new(s, Arc::clone(&probe))))
            .collect();
        Self { probe, stages }
    }

    fn edit(mut self, stage: Stage, f: impl FnOnce(ScriptedStage) -> ScriptedStage) -> Self {
        if let Some(current) = self.stages.remove(&stage) {
            self.stages.insert(stage, f(current));
        }
        self
    }

    /// Same delay for every stage and item.
    pub fn delay_all(mut self, delay: Duration) -> Self {
        for stage in Stage::ALL {
            self = self.edit(stage, |s| s.delay(delay));
        }
        self
    }

    pub fn delay(self, stage: Stage, delay: Duration) -> Self {
        self.edit(stage, |s| s.delay(delay))
    }

    pub fn delay_for(self, stage: Stage, item: &str, delay: Duration) -> Self {
        self.edit(stage, |s| s.delay_for(item, delay))
    }

    pub fn fail(self, stage: Stage, item: &str, kind: ErrorKind) -> Self {
        self.edit(stage, |s| s.fail_for(item, kind))
    }

    pub fn panic(self, stage: Stage, item: &str) -> Self {
        self.edit(stage, |s| s.panic_for(item))
    }

    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }

    pub fn stage(&self, stage: Stage) -> Option<ScriptedStage> {
        self.stages.get(&stage).cloned()
    }

    pub fn registry(&self) -> StageRegistry {
        let mut registry = StageRegistry::new();
        for stage in self.stages.values() {
            registry.register(stage.clone());
        }
        registry
    }
}

impl Default for FakeStages {
    fn default() -> Self {
        Self::new()
    }
}
