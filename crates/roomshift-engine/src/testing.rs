use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use serde_json::{json, Value};

use crate::model::{GenerateRequest, ImageModel};
use crate::retry::Sleeper;

/// Records requested pauses without waiting.
#[derive(Debug, Default)]
pub(crate) struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .map(|delays| delays.clone())
            .unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Step {
    Output(Value),
    Fail(String),
    Hang(Duration),
    Panic,
}

impl Step {
    pub(crate) fn urls(urls: &[&str]) -> Self {
        Self::Output(json!(urls))
    }
}

/// Plays back one step per call; repeats the last step once the script runs out.
pub(crate) struct ScriptedModel {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedModel {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<GenerateRequest> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    fn next_step(&self) -> Option<Step> {
        let next = self.steps.lock().ok()?.pop_front();
        let mut last = self.last.lock().ok()?;
        if let Some(step) = next {
            *last = Some(step.clone());
            return Some(step);
        }
        last.clone()
    }
}

impl ImageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted/interior-test"
    }

    fn generate(&self, request: &GenerateRequest) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }
        match self.next_step() {
            Some(Step::Output(value)) => Ok(value),
            Some(Step::Fail(message)) => bail!("{message}"),
            Some(Step::Hang(duration)) => {
                thread::sleep(duration);
                Ok(json!(["https://replicate.delivery/too-late.jpg"]))
            }
            Some(Step::Panic) => panic!("scripted model panicked"),
            None => bail!("script is empty"),
        }
    }
}
