//! Integration tests for the braid-agent crate.
//!
//! These exercise the public API end-to-end with scripted language models:
//! the reason-act loop, guardrails, processors, supervision, and streaming,
//! without requiring a live LM connection.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use braid_agent::{
    Agent, AgentConfig, BudgetTrimmer, ChatAgent, ChatRequest, FanOutFirstPolicy, Guardrails,
    InMemoryStore, LanguageModel, LmResponse, MemoryStore, Message, Result, Role, RunContext,
    SequentialPolicy, Supervisor, Tool, ToolCall, ToolRegistry, ToolResult, CONVERSATION_KEY,
};

// ═══════════════════════════════════════════════════════════════════════
//  Scripted language model
// ═══════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct ScriptedLm {
    responses: Mutex<VecDeque<LmResponse>>,
    calls: Mutex<Vec<ChatRequest>>,
    chunks: Vec<&'static str>,
}

impl ScriptedLm {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn streaming(chunks: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            chunks,
            ..Self::default()
        })
    }

    fn script_text(&self, content: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(LmResponse::text(content));
    }

    fn script_tool_call(&self, content: &str, calls: Vec<ToolCall>) {
        let mut response = LmResponse::text(content);
        response.tool_calls = calls;
        self.responses.lock().unwrap().push_back(response);
    }

    fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLm {
    async fn chat(&self, _ctx: &RunContext, request: &ChatRequest) -> Result<LmResponse> {
        self.calls.lock().unwrap().push(request.clone());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| LmResponse::text("Default scripted response")))
    }

    async fn stream(
        &self,
        _ctx: &RunContext,
        request: &ChatRequest,
        output: mpsc::Sender<LmResponse>,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(request.clone());
        for chunk in &self.chunks {
            if output.send(LmResponse::text(*chunk)).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Echo tool
// ═══════════════════════════════════════════════════════════════════════

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes the input string"
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {"input": {"type": "string"}},
            "required": ["input"]
        })
    }

    async fn execute(&self, _ctx: &RunContext, input: &str) -> ToolResult<String> {
        Ok(format!("ECHO:{input}"))
    }
}

fn echo_registry() -> Arc<ToolRegistry> {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(EchoTool).unwrap();
    registry
}

// ═══════════════════════════════════════════════════════════════════════
//  Basic run
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn basic_run() {
    let model = ScriptedLm::new();
    model.script_text("Hello! How can I help you today?");

    let agent = ChatAgent::new(
        model.clone(),
        AgentConfig {
            system_prompt: "You are a helpful assistant".into(),
            ..AgentConfig::default()
        },
    );

    let ctx = RunContext::background();
    let output = agent.run(&ctx, Message::user("Hello")).await.unwrap();

    assert_eq!(output.role, Role::Assistant);
    assert_eq!(output.content, "Hello! How can I help you today?");

    let calls = model.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].messages[0].role, Role::System);
    assert_eq!(calls[0].messages[0].content, "You are a helpful assistant");
}

// ═══════════════════════════════════════════════════════════════════════
//  Tool invocation
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn tool_invocation_round_trip() {
    let model = ScriptedLm::new();
    model.script_tool_call(
        "Calling tool",
        vec![ToolCall {
            id: "call-1".into(),
            name: "echo".into(),
            arguments: r#"{"input":"hello"}"#.into(),
        }],
    );
    model.script_text("Final answer after tool");

    let agent = ChatAgent::new(
        model.clone(),
        AgentConfig {
            system_prompt: "You are a helpful assistant".into(),
            max_iterations: 2,
            timeout: None,
        },
    )
    .with_tools(echo_registry());

    let ctx = RunContext::background();
    let output = agent.run(&ctx, Message::user("use echo")).await.unwrap();
    assert_eq!(output.content, "Final answer after tool");

    let calls = model.calls();
    assert_eq!(calls.len(), 2);

    // The iteration-2 request carries the echoed tool result.
    let tool_turn = calls[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("tool result should be visible to iteration 2");
    assert!(tool_turn.content.starts_with("ECHO:"));

    // The tool catalog advertised the echo schema.
    assert_eq!(calls[0].tools.len(), 1);
    assert_eq!(calls[0].tools[0].name, "echo");
}

#[tokio::test]
async fn iteration_and_log_growth_invariant() {
    // With max_iterations = N and a model that always requests one tool
    // call, the engine makes exactly N LM calls and the log grows by
    // 1 input + N assistants + N tool results, with no extra final.
    const N: u32 = 3;

    let model = ScriptedLm::new();
    for i in 0..N {
        model.script_tool_call(
            &format!("step {i}"),
            vec![ToolCall {
                id: format!("call-{i}"),
                name: "echo".into(),
                arguments: r#"{"input":"x"}"#.into(),
            }],
        );
    }

    let memory = Arc::new(InMemoryStore::new());
    let agent = ChatAgent::new(
        model.clone(),
        AgentConfig {
            system_prompt: "sys".into(),
            max_iterations: N,
            timeout: None,
        },
    )
    .with_tools(echo_registry())
    .with_memory(memory.clone());

    let ctx = RunContext::background();
    agent.run(&ctx, Message::user("loop")).await.unwrap();

    assert_eq!(model.calls().len(), N as usize);

    let log = memory
        .retrieve(&ctx, CONVERSATION_KEY)
        .await
        .unwrap()
        .into_messages();
    assert_eq!(log.len(), 1 + 2 * N as usize);
    assert_eq!(log[0].role, Role::User);
    let assistants = log.iter().filter(|m| m.role == Role::Assistant).count();
    let tool_results = log.iter().filter(|m| m.role == Role::Tool).count();
    assert_eq!(assistants, N as usize);
    assert_eq!(tool_results, N as usize);
}

// ═══════════════════════════════════════════════════════════════════════
//  Guardrails
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn guardrail_blocks_denied_input() {
    let model = ScriptedLm::new();
    let agent = ChatAgent::new(
        model.clone(),
        AgentConfig {
            system_prompt: "sys".into(),
            ..AgentConfig::default()
        },
    )
    .with_middleware(Arc::new(Guardrails::new().deny(["blocked"])));

    let ctx = RunContext::background();
    let err = agent
        .run(&ctx, Message::user("this is blocked content"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("blocked by guardrails"));
    assert!(model.calls().is_empty(), "no LM call may happen");
}

#[tokio::test]
async fn guardrail_truncates_long_input() {
    let model = ScriptedLm::new();
    model.script_text("ok");

    let agent = ChatAgent::new(
        model.clone(),
        AgentConfig {
            system_prompt: "sys".into(),
            ..AgentConfig::default()
        },
    )
    .with_middleware(Arc::new(Guardrails::new().max_input_chars(5)));

    let ctx = RunContext::background();
    agent.run(&ctx, Message::user("toolong")).await.unwrap();

    let calls = model.calls();
    let last = calls[0].messages.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert_eq!(last.content, "toolo");
}

// ═══════════════════════════════════════════════════════════════════════
//  Processors in the loop
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn budget_trimmer_shrinks_prompt_history() {
    let model = ScriptedLm::new();
    model.script_text("first");
    model.script_text("second");

    let memory = Arc::new(InMemoryStore::new());
    let agent = ChatAgent::new(
        model.clone(),
        AgentConfig {
            system_prompt: "sys".into(),
            ..AgentConfig::default()
        },
    )
    .with_memory(memory)
    .with_processor(Arc::new(BudgetTrimmer::new(5)));

    let ctx = RunContext::background();
    agent
        .run(&ctx, Message::user("a long opening message"))
        .await
        .unwrap();
    agent.run(&ctx, Message::user("next")).await.unwrap();

    // The second request's history (between system prompt and the new
    // input) fits the 5-char budget and stays chronological.
    let second = &model.calls()[1].messages;
    let history = &second[1..second.len() - 1];
    let total: usize = history.iter().map(|m| m.content.chars().count()).sum();
    assert!(total <= 5, "history exceeds budget: {total}");
    assert_eq!(second.last().unwrap().content, "next");
}

// ═══════════════════════════════════════════════════════════════════════
//  Supervision
// ═══════════════════════════════════════════════════════════════════════

fn prefix_agent(label: &'static str) -> Arc<dyn Agent> {
    struct PrefixAgent(&'static str);

    #[async_trait]
    impl Agent for PrefixAgent {
        async fn run(&self, _ctx: &RunContext, input: Message) -> Result<Message> {
            Ok(Message::assistant(format!("{}:{}", self.0, input.content)))
        }

        async fn run_stream(
            &self,
            ctx: &RunContext,
            input: Message,
            output: mpsc::Sender<Message>,
        ) -> Result<()> {
            let message = self.run(ctx, input).await?;
            let _ = output.send(message).await;
            Ok(())
        }
    }

    Arc::new(PrefixAgent(label))
}

fn failing_agent() -> Arc<dyn Agent> {
    struct FailingAgent;

    #[async_trait]
    impl Agent for FailingAgent {
        async fn run(&self, _ctx: &RunContext, _input: Message) -> Result<Message> {
            Err(braid_agent::AgentError::Internal("boom".into()))
        }

        async fn run_stream(
            &self,
            _ctx: &RunContext,
            _input: Message,
            _output: mpsc::Sender<Message>,
        ) -> Result<()> {
            Err(braid_agent::AgentError::Internal("boom".into()))
        }
    }

    Arc::new(FailingAgent)
}

#[tokio::test]
async fn sequential_supervisor_chains_agents() {
    let supervisor = Supervisor::new(vec![prefix_agent("A1"), prefix_agent("A2")])
        .with_policy(SequentialPolicy);

    let ctx = RunContext::background();
    let out = supervisor.run(&ctx, "seed").await.unwrap();

    assert!(out.starts_with("A2:"));
    assert_eq!(out, "A2:A1:seed");
}

#[tokio::test]
async fn fan_out_first_success_wins() {
    let supervisor = Supervisor::new(vec![failing_agent(), prefix_agent("OK")])
        .with_policy(FanOutFirstPolicy);

    let ctx = RunContext::background();
    let out = supervisor.run(&ctx, "q").await.unwrap();
    assert_eq!(out, "OK:q");
}

#[tokio::test]
async fn fan_out_all_failures_is_an_error() {
    let supervisor =
        Supervisor::new(vec![failing_agent(), failing_agent()]).with_policy(FanOutFirstPolicy);

    let ctx = RunContext::background();
    assert!(supervisor.run(&ctx, "q").await.is_err());
}

// ═══════════════════════════════════════════════════════════════════════
//  Streaming
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn streaming_aggregates_deltas() {
    let model = ScriptedLm::streaming(vec!["a", "b", "c"]);
    let agent = ChatAgent::new(
        model,
        AgentConfig {
            system_prompt: "sys".into(),
            ..AgentConfig::default()
        },
    );

    let (tx, mut rx) = mpsc::channel(8);
    let ctx = RunContext::background();
    agent
        .run_stream(&ctx, Message::user("x"), tx)
        .await
        .unwrap();

    let mut received = Vec::new();
    while let Some(message) = rx.recv().await {
        received.push(message);
    }

    // Three streaming deltas followed by one aggregated final, then close.
    assert_eq!(received.len(), 4);
    for (message, expected) in received.iter().take(3).zip(["a", "b", "c"]) {
        assert_eq!(message.content, expected);
        assert_eq!(message.meta.get("streaming").map(String::as_str), Some("true"));
    }
    let last = received.last().unwrap();
    assert_eq!(last.content, "abc");
    assert!(!last.meta.contains_key("streaming"));
}

#[tokio::test]
async fn streaming_sink_closes_exactly_once_on_empty_stream() {
    let model = ScriptedLm::streaming(Vec::new());
    let agent = ChatAgent::new(
        model,
        AgentConfig {
            system_prompt: "sys".into(),
            ..AgentConfig::default()
        },
    );

    let (tx, mut rx) = mpsc::channel(8);
    let ctx = RunContext::background();
    agent
        .run_stream(&ctx, Message::user("x"), tx)
        .await
        .unwrap();

    // No deltas, no final; the channel just closes.
    assert!(rx.recv().await.is_none());
}

// ═══════════════════════════════════════════════════════════════════════
//  Concurrency
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn parallel_runs_share_one_agent() {
    let model = ScriptedLm::new();
    for _ in 0..8 {
        model.script_text("reply");
    }

    let agent = Arc::new(ChatAgent::new(
        model.clone(),
        AgentConfig {
            system_prompt: "sys".into(),
            ..AgentConfig::default()
        },
    ));

    let mut handles = Vec::new();
    for i in 0..8 {
        let agent = Arc::clone(&agent);
        handles.push(tokio::spawn(async move {
            let ctx = RunContext::background();
            agent.run(&ctx, Message::user(format!("m{i}"))).await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.content, "reply");
    }
    assert_eq!(model.calls().len(), 8);
}
