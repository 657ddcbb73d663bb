//! Scripted oracle for unit tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

use kwintel_oracle::{Oracle, OracleError};

/// Replays queued answers in order. Once the queue is empty every call
/// fails with a 503.
pub struct ScriptedOracle {
    answers: Mutex<VecDeque<Result<String, OracleError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new(answers: Vec<Result<String, OracleError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing() -> Self {
        Self::new(Vec::new())
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Oracle for ScriptedOracle {
    fn model(&self) -> &str {
        "scripted"
    }

    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, OracleError>> + Send {
        self.prompts.lock().unwrap().push(prompt.to_owned());
        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(OracleError::UnexpectedStatus {
                    status: 503,
                    body: "scripted outage".to_owned(),
                })
            });
        std::future::ready(answer)
    }
}
