//! Multi-agent supervision.
//!
//! A [`Supervisor`] composes several agents over a single prompt under a
//! [`Policy`]: either a sequential pipeline where each agent's output feeds
//! the next, or a parallel fan-out that returns the first success.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::context::RunContext;
use crate::error::{AgentError, Result};
use crate::llm::types::Message;
use crate::runtime::Agent;

/// How a supervisor coordinates its agents.
#[async_trait]
pub trait Policy: Send + Sync {
    async fn execute(
        &self,
        ctx: &RunContext,
        prompt: &str,
        agents: &[Arc<dyn Agent>],
    ) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Sequential
// ---------------------------------------------------------------------------

/// Runs agents in order, feeding each agent's output content to the next as
/// its user input.  The final output is the last agent's content; any error
/// terminates the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialPolicy;

#[async_trait]
impl Policy for SequentialPolicy {
    async fn execute(
        &self,
        ctx: &RunContext,
        prompt: &str,
        agents: &[Arc<dyn Agent>],
    ) -> Result<String> {
        let mut input = prompt.to_owned();
        for agent in agents {
            let output = agent.run(ctx, Message::user(input)).await?;
            input = output.content;
        }
        Ok(input)
    }
}

// ---------------------------------------------------------------------------
// Fan-out first-success
// ---------------------------------------------------------------------------

/// Launches all agents concurrently with the same prompt and returns the
/// content of the first one that succeeds.
///
/// The winner is nondeterministic (whichever completes first).  Losing
/// agents run to completion detached; the result channel is buffered to the
/// number of agents so every worker can write its one result without
/// blocking, whether or not the supervisor is still listening.  If every
/// agent fails, the last error by completion order is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOutFirstPolicy;

#[async_trait]
impl Policy for FanOutFirstPolicy {
    async fn execute(
        &self,
        ctx: &RunContext,
        prompt: &str,
        agents: &[Arc<dyn Agent>],
    ) -> Result<String> {
        if agents.is_empty() {
            return Err(AgentError::Internal("fan-out over zero agents".into()));
        }

        let (tx, mut rx) = mpsc::channel::<Result<String>>(agents.len());

        for agent in agents {
            let agent = Arc::clone(agent);
            let ctx = ctx.clone();
            let prompt = prompt.to_owned();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = agent
                    .run(&ctx, Message::user(prompt))
                    .await
                    .map(|message| message.content);
                // Buffered to the worker count; a closed channel just means
                // the supervisor already returned a winner.
                let _ = tx.send(result).await;
            });
        }
        drop(tx);

        let mut last_error: Option<AgentError> = None;
        for _ in 0..agents.len() {
            match rx.recv().await {
                Some(Ok(content)) => return Ok(content),
                Some(Err(error)) => last_error = Some(error),
                None => break,
            }
        }

        Err(last_error
            .unwrap_or_else(|| AgentError::Internal("fan-out produced no results".into())))
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// A composition of agents under a policy.
pub struct Supervisor {
    agents: Vec<Arc<dyn Agent>>,
    policy: Box<dyn Policy>,
}

impl Supervisor {
    /// Create a supervisor with the default sequential policy.
    pub fn new(agents: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            agents,
            policy: Box::new(SequentialPolicy),
        }
    }

    /// Replace the coordination policy.
    pub fn with_policy<P>(mut self, policy: P) -> Self
    where
        P: Policy + 'static,
    {
        self.policy = Box::new(policy);
        self
    }

    /// Run the composed agents over a prompt.
    pub async fn run(&self, ctx: &RunContext, prompt: &str) -> Result<String> {
        self.policy.execute(ctx, prompt, &self.agents).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
