//! End-to-end runs of the four-agent pipeline over a scripted provider.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;

use common::*;
use octorag::checkpoint::{CheckpointStore, FileCheckpointStore};
use octorag::error::OctoragError;
use octorag::provider::ProviderResponse;
use octorag::runner::{
    Orchestrator, RunEvent, RunEventPayload, RunEventSink, RunLifecycle, RunRequest,
    TerminationReason,
};
use octorag::types::{Message, Role, ToolCall};

fn searcher_prompt(prompt: &str) -> bool {
    prompt.starts_with("You are the Repository Searcher")
}

#[tokio::test]
async fn step_limit_allows_exactly_limit_invocations() {
    let provider = Arc::new(ScriptedProvider::with_fallback("still thinking"));
    let orchestrator = orchestrator_with(provider.clone(), settings_with_limit(3));

    let err = orchestrator.query("find a parser").await.unwrap_err();

    assert!(matches!(err, OctoragError::StepLimitExceeded { limit: 3 }));
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn state_is_checkpointed_even_when_the_limit_is_hit() {
    let provider = Arc::new(ScriptedProvider::with_fallback("still thinking"));
    let orchestrator = orchestrator_with(provider, settings_with_limit(2));

    assert!(orchestrator.query("find a parser").await.is_err());

    let saved = orchestrator.checkpoints().load("1").await.unwrap().unwrap();
    let roles: Vec<Role> = saved.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Agent, Role::Agent]);
}

#[tokio::test]
async fn full_pipeline_reaches_the_publisher_and_terminates() {
    let provider = Arc::new(ScriptedProvider::new());
    provider
        .queue_tool_calls(
            "",
            vec![ToolCall::new(
                "c1",
                "query_for_github_repos",
                json!({"keywords": "json parser", "count": 3}),
            )],
        )
        .queue_text("Please send to Repository Curator: found 3 repos")
        .queue_text("Code Generator: reuse serde_json's tokenizer")
        .queue_text("Here is the code, Repository Publisher. fn main() {}")
        .queue_text("All files uploaded. <<END>>");
    let orchestrator = orchestrator(provider.clone());

    let outcome = orchestrator
        .run(RunRequest::new("build me a json parser"))
        .await
        .unwrap();

    assert_eq!(outcome.final_text.as_deref(), Some("All files uploaded. <<END>>"));
    assert_eq!(outcome.reason, TerminationReason::Sentinel);
    assert_eq!(outcome.steps, 5);
    assert_eq!(
        outcome.last_agent.as_ref().map(|a| a.as_str()),
        Some("Repository Publisher")
    );

    let prompts = provider.prompts();
    assert!(searcher_prompt(&prompts[0]));
    assert!(searcher_prompt(&prompts[1]));
    assert!(prompts[2].starts_with("You are the Repository Curator"));
    assert!(prompts[3].starts_with("You are the Code Generator"));
    assert!(prompts[4].starts_with("You are the Repository Publisher"));
}

#[tokio::test]
async fn hand_off_appends_an_instruction_for_the_successor() {
    let provider = Arc::new(ScriptedProvider::new());
    provider
        .queue_text("Please send to Repository Curator: found 3 repos")
        .queue_text("Nothing usable here. <<END>>");
    let orchestrator = orchestrator(provider.clone());

    orchestrator.query("find a raytracer").await.unwrap();

    let curator_request = &provider.requests()[1];
    let handed = curator_request.messages.last().unwrap();
    assert_eq!(handed.role, Role::User);
    assert_eq!(handed.name.as_deref(), Some("Repository Searcher"));
    assert_eq!(handed.text(), "Please send to Repository Curator: found 3 repos");
}

#[tokio::test]
async fn mention_without_a_successor_relationship_stays_put() {
    let provider = Arc::new(ScriptedProvider::new());
    provider
        .queue_text("Code Generator would love this")
        .queue_text("done <<END>>");
    let orchestrator = orchestrator(provider.clone());

    let outcome = orchestrator.run(RunRequest::new("anything")).await.unwrap();

    let prompts = provider.prompts();
    assert!(searcher_prompt(&prompts[0]));
    assert!(searcher_prompt(&prompts[1]));
    assert_eq!(outcome.steps, 2);
}

#[tokio::test]
async fn tool_calls_win_over_hand_off_and_sentinel() {
    let provider = Arc::new(ScriptedProvider::new());
    provider
        .queue_tool_calls(
            "Repository Curator <<END>>",
            vec![ToolCall::new(
                "c1",
                "get_readme",
                json!({"html_url": "https://github.com/a/b"}),
            )],
        )
        .queue_text("done <<END>>");
    let orchestrator = orchestrator(provider.clone());

    let outcome = orchestrator.run(RunRequest::new("anything")).await.unwrap();

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(searcher_prompt(&prompts[1]));
    assert_eq!(outcome.final_text.as_deref(), Some("done <<END>>"));

    let tool_message = &outcome.state.messages()[2];
    assert_eq!(tool_message.role, Role::Tool);
    assert_eq!(tool_message.text(), "get_readme ok");
}

#[tokio::test]
async fn tool_results_follow_call_order() {
    let provider = Arc::new(ScriptedProvider::new());
    provider
        .queue_tool_calls(
            "",
            vec![
                ToolCall::new("first", "get_readme", json!({})),
                ToolCall::new("second", "query_for_github_repos", json!({})),
            ],
        )
        .queue_text("<<END>>");
    let orchestrator = orchestrator(provider.clone());

    let outcome = orchestrator.run(RunRequest::new("anything")).await.unwrap();

    let results: Vec<(&str, String)> = outcome
        .state
        .messages()
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| (m.tool_call_id.as_deref().unwrap_or_default(), m.text()))
        .collect();
    assert_eq!(
        results,
        vec![
            ("first", "get_readme ok".to_string()),
            ("second", "query_for_github_repos ok".to_string()),
        ]
    );

    // The re-invoked agent sees both results.
    let second_request = &provider.requests()[1];
    let tool_ids: Vec<_> = second_request
        .messages
        .iter()
        .filter_map(|m| m.tool_call_id.clone())
        .collect();
    assert_eq!(tool_ids, vec!["first", "second"]);
}

#[tokio::test]
async fn unknown_tool_becomes_an_error_result_and_the_run_continues() {
    let provider = Arc::new(ScriptedProvider::new());
    provider
        .queue_tool_calls("", vec![ToolCall::new("c9", "does_not_exist", json!({}))])
        .queue_text("giving up <<END>>");
    let orchestrator = orchestrator(provider.clone());

    let outcome = orchestrator.run(RunRequest::new("anything")).await.unwrap();

    let result = outcome
        .state
        .messages()
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert!(result.is_error);
    assert!(result.text().contains("does_not_exist"));
    assert!(result.text().contains("c9"));
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn publisher_without_sentinel_keeps_going() {
    let provider = Arc::new(ScriptedProvider::with_fallback("uploading..."));
    provider
        .queue_text("Repository Curator, look at these")
        .queue_text("Code Generator, use repo x")
        .queue_text("Repository Publisher, code attached");
    let orchestrator = orchestrator_with(provider.clone(), settings_with_limit(5));

    let err = orchestrator.query("anything").await.unwrap_err();

    assert!(matches!(err, OctoragError::StepLimitExceeded { limit: 5 }));
    let prompts = provider.prompts();
    assert!(prompts[3].starts_with("You are the Repository Publisher"));
    assert!(prompts[4].starts_with("You are the Repository Publisher"));
}

#[tokio::test]
async fn model_failure_aborts_the_run() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.queue_error(OctoragError::api(500, "upstream exploded"));
    let orchestrator = orchestrator(provider);

    let err = orchestrator.query("anything").await.unwrap_err();

    match err {
        OctoragError::ModelInvocation { agent, .. } => assert_eq!(agent, "Repository Searcher"),
        other => panic!("expected ModelInvocation, got {other:?}"),
    }
}

#[tokio::test]
async fn query_stream_yields_agent_texts_in_order() {
    let provider = Arc::new(ScriptedProvider::new());
    provider
        .queue_text("Repository Curator: two candidates")
        .queue_text("none fit <<END>>");
    let orchestrator = orchestrator(provider);

    let items: Vec<_> = orchestrator.query_stream("anything").collect().await;
    let texts: Vec<String> = items.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(
        texts,
        vec!["Repository Curator: two candidates", "none fit <<END>>"]
    );
}

#[tokio::test]
async fn query_stream_ends_with_the_error() {
    let provider = Arc::new(ScriptedProvider::with_fallback("hmm"));
    let orchestrator = orchestrator_with(provider, settings_with_limit(2));

    let items: Vec<_> = orchestrator.query_stream("anything").collect().await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_deref().unwrap(), "hmm");
    assert_eq!(items[1].as_deref().unwrap(), "hmm");
    assert!(matches!(
        items[2],
        Err(OctoragError::StepLimitExceeded { limit: 2 })
    ));
}

#[tokio::test]
async fn query_stream_does_nothing_until_polled() {
    let provider = Arc::new(ScriptedProvider::with_fallback("still thinking"));
    let orchestrator = orchestrator_with(provider.clone(), settings_with_limit(5));

    let stream = orchestrator.query_stream("anything");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(provider.call_count(), 0);
    drop(stream);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn dropping_query_stream_stops_the_run() {
    let provider = Arc::new(
        ScriptedProvider::with_fallback("still thinking").with_delay(Duration::from_millis(20)),
    );
    let orchestrator = orchestrator_with(provider.clone(), settings_with_limit(20));

    let mut stream = orchestrator.query_stream("anything");
    assert_eq!(stream.next().await.unwrap().unwrap(), "still thinking");
    drop(stream);
    let calls_at_drop = provider.call_count();

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(provider.call_count(), calls_at_drop);
    assert!(calls_at_drop < 20);
}

#[tokio::test]
async fn second_query_resumes_the_thread() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.queue_text("first answer <<END>>").queue_text("second answer <<END>>");
    let orchestrator = orchestrator(provider.clone());

    orchestrator.query("first question").await.unwrap();
    let answer = orchestrator.query("second question").await.unwrap();

    assert_eq!(answer, "second answer <<END>>");
    let history: Vec<String> = provider.requests()[1]
        .messages
        .iter()
        .skip(1)
        .map(Message::text)
        .collect();
    assert_eq!(
        history,
        vec!["first question", "first answer <<END>>", "second question"]
    );
}

#[tokio::test]
async fn file_checkpoints_survive_a_new_orchestrator() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn CheckpointStore> = Arc::new(FileCheckpointStore::new(dir.path()));

    let build = |provider: Arc<ScriptedProvider>| -> Orchestrator {
        Orchestrator::builder()
            .provider(provider)
            .tools(stub_github_tools())
            .checkpoint_store(store.clone())
            .build()
            .unwrap()
    };

    let first = Arc::new(ScriptedProvider::new());
    first.queue_text("noted <<END>>");
    build(first)
        .run(RunRequest::new("remember me").with_thread_id("persisted"))
        .await
        .unwrap();

    let second = Arc::new(ScriptedProvider::new());
    second.queue_text("welcome back <<END>>");
    build(second.clone())
        .run(RunRequest::new("again").with_thread_id("persisted"))
        .await
        .unwrap();

    let seen = &second.requests()[0].messages;
    assert_eq!(seen[1].text(), "remember me");
    assert_eq!(seen.last().unwrap().text(), "again");
}

#[tokio::test]
async fn distinct_threads_run_concurrently_without_sharing_state() {
    let provider = Arc::new(FnProvider(|request: &octorag::provider::ProviderRequest| {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(Message::text)
            .unwrap_or_default();
        ProviderResponse::text(format!("echo {last_user} <<END>>"))
    }));
    let orchestrator = orchestrator(provider);

    let (a, b) = tokio::join!(
        orchestrator.run(RunRequest::new("alpha").with_thread_id("a")),
        orchestrator.run(RunRequest::new("beta").with_thread_id("b")),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.final_text.as_deref(), Some("echo alpha <<END>>"));
    assert_eq!(b.final_text.as_deref(), Some("echo beta <<END>>"));
    assert_eq!(a.state.len(), 2);
    assert_eq!(b.state.len(), 2);
    assert_eq!(
        orchestrator.checkpoints().load("a").await.unwrap().unwrap().messages()[0].text(),
        "alpha"
    );
}

#[tokio::test]
async fn events_trace_the_run() {
    let provider = Arc::new(ScriptedProvider::new());
    provider
        .queue_tool_calls("", vec![ToolCall::new("c1", "get_readme", json!({}))])
        .queue_text("Repository Curator: take a look")
        .queue_text("<<END>>");
    let orchestrator = orchestrator(provider);

    let events: Arc<Mutex<Vec<RunEvent>>> = Arc::default();
    let sink: RunEventSink = {
        let events = events.clone();
        Arc::new(move |event: RunEvent| events.lock().unwrap().push(event))
    };

    orchestrator
        .run(RunRequest::new("anything").with_event_sink(sink))
        .await
        .unwrap();

    let events = events.lock().unwrap();
    let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));

    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match &e.payload {
            RunEventPayload::Lifecycle { state: RunLifecycle::Started } => "started",
            RunEventPayload::Lifecycle { state: RunLifecycle::Completed } => "completed",
            RunEventPayload::Lifecycle { .. } => "failed",
            RunEventPayload::AgentMessage { .. } => "message",
            RunEventPayload::ToolCallStarted { .. } => "tool_started",
            RunEventPayload::ToolResult { .. } => "tool_result",
            RunEventPayload::HandOff { .. } => "hand_off",
            RunEventPayload::Snapshot { .. } => "snapshot",
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "started",
            "tool_started",
            "tool_result",
            "snapshot",
            "message",
            "hand_off",
            "snapshot",
            "message",
            "snapshot",
            "completed",
        ]
    );

    let last_snapshot = events
        .iter()
        .filter_map(|e| match &e.payload {
            RunEventPayload::Snapshot { step, snapshot } => Some((*step, snapshot.len())),
            _ => None,
        })
        .last();
    // user, tool call, tool result, hand-off text, instruction, end
    assert_eq!(last_snapshot, Some((3, 6)));
}

#[cfg(not(feature = "mcp"))]
#[tokio::test]
async fn mcp_url_without_the_mcp_feature_is_a_configuration_error() {
    let settings = octorag::config::SessionSettings {
        mcp_url: Some("http://localhost:8000/mcp".into()),
        ..octorag::config::SessionSettings::default()
    };

    let err = Orchestrator::builder()
        .provider(Arc::new(ScriptedProvider::new()))
        .settings(settings)
        .build_async()
        .await
        .unwrap_err();

    assert!(matches!(err, OctoragError::Configuration(ref m) if m.contains("`mcp` feature")));
}
