//! Scripted Page Surface
//!
//! For testing and demo purposes. Plays back queued script results and lets
//! the driver reposition the page URL between navigation events.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::PageSurface;
use crate::error::{PageError, Result};

#[derive(Default)]
struct ScriptedState {
    current_url: Option<String>,
    eval_results: VecDeque<Result<String>>,
    fallback_result: Option<String>,
    evaluated: Vec<String>,
    fail_load: bool,
    observer_installs: usize,
}

/// Page surface with pre-scripted evaluation results
#[derive(Default)]
pub struct ScriptedPage {
    state: Mutex<ScriptedState>,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next script evaluation result
    pub fn push_result(&self, result: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.eval_results.push_back(Ok(result.into()));
    }

    /// Queue a failing script evaluation
    pub fn push_failure(&self, reason: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state
            .eval_results
            .push_back(Err(PageError::Evaluation(reason.into())));
    }

    /// Result returned once the queue runs dry (e.g. `"waiting"` forever)
    pub fn set_fallback_result(&self, result: impl Into<String>) {
        self.state.lock().unwrap().fallback_result = Some(result.into());
    }

    /// Reposition the page, as a real surface would after navigating
    pub fn set_current_url(&self, url: impl Into<String>) {
        self.state.lock().unwrap().current_url = Some(url.into());
    }

    /// Make subsequent `load` calls fail
    pub fn fail_loads(&self) {
        self.state.lock().unwrap().fail_load = true;
    }

    /// Every script text that was evaluated, in order
    pub fn evaluated_scripts(&self) -> Vec<String> {
        self.state.lock().unwrap().evaluated.clone()
    }

    /// How many times the click observer was installed
    pub fn observer_installs(&self) -> usize {
        self.state.lock().unwrap().observer_installs
    }
}

#[async_trait]
impl PageSurface for ScriptedPage {
    async fn load(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_load {
            return Err(PageError::Navigation(format!("cannot reach {url}")));
        }
        state.current_url = Some(url.to_string());
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.evaluated.push(script.to_string());
        if let Some(result) = state.eval_results.pop_front() {
            return result;
        }
        state
            .fallback_result
            .clone()
            .ok_or_else(|| PageError::Evaluation("no scripted result queued".into()))
    }

    async fn install_click_observer(&self) -> Result<()> {
        self.state.lock().unwrap().observer_installs += 1;
        Ok(())
    }

    fn current_url(&self) -> Option<String> {
        self.state.lock().unwrap().current_url.clone()
    }
}
