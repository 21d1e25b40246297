//! 学习辅导管线集成测试

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use study_crew::composer::{FixedVisualClassifier, TaskComposer};
    use study_crew::config::AppConfig;
    use study_crew::core::{ExecutionPool, GatewayError, RecoveryEngine};
    use study_crew::gateway::{Collection, GatewayOutput, RawResult, ScriptedGateway};
    use study_crew::llm::MockLlmClient;
    use study_crew::result::{
        extract_whiteboard, normalize, scan_text, PayloadOrigin, RenderEngine, WhiteboardKind,
        FORMAT_ERROR, NO_RESPONDER_MESSAGE, REPHRASE_MESSAGE,
    };
    use study_crew::roster::Roster;
    use study_crew::{HelpMode, StudyHelpRequest, StudyHelpService};

    const GRAPH_PAYLOAD: &str = r#"{"type": "graph", "expression": "y = x^2 - 5x + 6", "render_engine": "desmos", "instructions": "Plot the parabola and mark both roots.", "specifications": {"roots": "x = 2 and x = 3"}}"#;

    fn service(gateway: Arc<ScriptedGateway>) -> StudyHelpService {
        StudyHelpService::from_config(&AppConfig::default(), gateway)
    }

    #[tokio::test]
    async fn test_graph_scenario_single_professor() {
        let prose_before = "Let's look at this parabola together.";
        let prose_after = "Notice where it crosses the x-axis. What do those points tell you?";
        let gateway = Arc::new(ScriptedGateway::ok(RawResult::Scalar(format!(
            "{prose_before}\n{GRAPH_PAYLOAD}\n{prose_after}"
        ))));

        let request = StudyHelpRequest::new("Graph y = x^2 - 5x + 6", HelpMode::Single)
            .with_preferred_role("professor");
        let result = service(gateway.clone()).handle(&request).await;

        let tasks = gateway.last_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].role.name, "Socratic Mentor");
        assert!(tasks[0].tools_enabled);

        assert!(result.success);
        let wb = result.whiteboard.expect("whiteboard payload");
        assert_eq!(wb.kind, WhiteboardKind::Graph);
        assert_eq!(wb.render_engine, RenderEngine::Desmos);
        assert_eq!(wb.expression.as_deref(), Some("y = x^2 - 5x + 6"));

        let answer = result.answer.unwrap();
        assert_eq!(answer, format!("{prose_before}\n\n{prose_after}"));
        assert!(!answer.contains('{'));
        assert_eq!(result.agent_responses.len(), 1);
        assert_eq!(result.agent_responses[0].role, "Socratic Mentor");
    }

    #[tokio::test]
    async fn test_discussion_restricted_to_two_roles() {
        let gateway = Arc::new(ScriptedGateway::echo());
        let request = StudyHelpRequest::new("Why do seasons happen?", HelpMode::Discussion)
            .with_preferred_role("student")
            .with_available_roles(vec!["Problem Analyst".into(), "Peer Student".into()]);
        let result = service(gateway.clone()).handle(&request).await;

        let roles: Vec<String> = gateway.last_tasks().into_iter().map(|t| t.role.name).collect();
        assert_eq!(roles, vec!["Peer Student", "Problem Analyst"]);

        assert!(result.success);
        let agents: Vec<&str> = result.agent_responses.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(agents, vec!["Peer Student", "Problem Analyst"]);
        // 主答者优先于第一条发言
        assert_eq!(
            result.answer.as_deref(),
            Some("Problem Analyst says: let's work through this together.")
        );
    }

    #[tokio::test]
    async fn test_empty_available_roles_means_no_responder() {
        let gateway = Arc::new(ScriptedGateway::echo());
        let request = StudyHelpRequest::new("Anyone there?", HelpMode::Discussion)
            .with_available_roles(Vec::new());
        let result = service(gateway.clone()).handle(&request).await;

        assert_eq!(gateway.calls(), 0);
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.answer.as_deref(), Some(NO_RESPONDER_MESSAGE));
        assert!(result.agent_responses.is_empty());
    }

    #[tokio::test]
    async fn test_format_error_with_reasoning_is_salvaged() {
        let fragment = "Factoring x^2 - 5x + 6 gives (x - 2)(x - 3), so the parabola touches the x-axis at 2 and 3.";
        let gateway = Arc::new(ScriptedGateway::err(GatewayError::Format(format!(
            "Invalid Format: I missed the 'Action:' after 'Thought:'.\nThought: {fragment}\n\nAction: None"
        ))));
        let result = service(gateway)
            .handle(&StudyHelpRequest::new("Find the roots", HelpMode::Single))
            .await;

        assert!(result.success);
        assert_eq!(result.answer.as_deref(), Some(fragment));
        assert_eq!(result.agent_responses.len(), 1);
        assert_eq!(result.agent_responses[0].role, "Assistant");
    }

    #[tokio::test]
    async fn test_format_error_without_reasoning_apologizes() {
        let gateway = Arc::new(ScriptedGateway::err(GatewayError::Format(
            "Invalid Format: Missing 'Action:'".into(),
        )));
        let result = service(gateway)
            .handle(&StudyHelpRequest::new("Find the roots", HelpMode::Single))
            .await;

        assert!(!result.success);
        assert_eq!(result.answer.as_deref(), Some(REPHRASE_MESSAGE));
        assert_eq!(result.error.as_deref(), Some(FORMAT_ERROR));
    }

    #[tokio::test]
    async fn test_timeout_takes_recoverable_path() {
        let gateway = Arc::new(ScriptedGateway::echo().with_delay(Duration::from_secs(5)));
        let composer = TaskComposer::new(Arc::new(Roster::builtin()), Arc::new(FixedVisualClassifier(false)));
        let svc = StudyHelpService::new(
            composer,
            gateway.clone(),
            ExecutionPool::new(1, Duration::from_millis(50)),
            RecoveryEngine::default(),
        );
        let result = svc
            .handle(&StudyHelpRequest::new("Slow question", HelpMode::Single))
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(FORMAT_ERROR));
        assert_eq!(result.answer.as_deref(), Some(REPHRASE_MESSAGE));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(gateway.saw_cancel());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_call() {
        let gateway = Arc::new(ScriptedGateway::echo().with_delay(Duration::from_secs(5)));
        let svc = service(gateway.clone());
        let request = StudyHelpRequest::new("A long question", HelpMode::Single);

        let (result, _) = tokio::join!(svc.handle(&request), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            svc.shutdown();
        });

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Execution cancelled"));
        assert!(result.answer.is_none());
        assert!(gateway.saw_cancel());
    }

    #[tokio::test]
    async fn test_transport_error_surfaces_raw_detail() {
        let gateway = Arc::new(ScriptedGateway::err(GatewayError::Transport(
            "dns error: no such host".into(),
        )));
        let result = service(gateway)
            .handle(&StudyHelpRequest::new("Hello?", HelpMode::Single))
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("dns error: no such host"));
        assert!(result.answer.is_none());
    }

    #[tokio::test]
    async fn test_engine_json_adapted_at_boundary() {
        let gateway = Arc::new(ScriptedGateway::json(serde_json::json!({
            "raw": "Analyst: a fraction names a part of a whole.",
            "tasks_output": [
                {"raw": "Mentor: what does the bottom number count?"},
                {"raw": "Analyst: a fraction names a part of a whole."},
                null
            ]
        })));
        let request = StudyHelpRequest::new("What is a fraction?", HelpMode::Discussion)
            .with_available_roles(vec!["mentor".into(), "expert".into()]);
        let result = service(gateway).handle(&request).await;

        assert!(result.success);
        let agents: Vec<(&str, &str)> = result
            .agent_responses
            .iter()
            .map(|m| (m.role.as_str(), m.text.as_str()))
            .collect();
        assert_eq!(
            agents,
            vec![
                ("Socratic Mentor", "Mentor: what does the bottom number count?"),
                ("Problem Analyst", "Analyst: a fraction names a part of a whole."),
            ]
        );
        assert_eq!(
            result.answer.as_deref(),
            Some("Analyst: a fraction names a part of a whole.")
        );
    }

    #[tokio::test]
    async fn test_identical_outputs_collapse_to_one_message() {
        let gateway = Arc::new(ScriptedGateway::from_fn(|tasks| {
            Ok(GatewayOutput::new(RawResult::List(
                tasks.iter().map(|_| "Same words from everyone.".to_string()).collect(),
            )))
        }));
        let request = StudyHelpRequest::new("Echo?", HelpMode::Discussion);
        let result = service(gateway).handle(&request).await;

        assert_eq!(result.agent_responses.len(), 1);
        assert_eq!(result.agent_responses[0].role, "Socratic Mentor");
    }

    #[tokio::test]
    async fn test_all_shapes_give_same_responses() {
        let make = |shape: fn(Vec<(String, String)>) -> RawResult| {
            Arc::new(ScriptedGateway::from_fn(move |tasks| {
                let pairs = tasks
                    .iter()
                    .map(|t| (t.prompt.clone(), format!("{} thinks it is about energy.", t.role.id)))
                    .collect();
                Ok(GatewayOutput::new(shape(pairs)))
            }))
        };
        let shapes: Vec<fn(Vec<(String, String)>) -> RawResult> = vec![
            |pairs| RawResult::List(pairs.into_iter().map(|(_, v)| v).collect()),
            |pairs| RawResult::Map(pairs.into_iter().rev().collect()),
            |pairs| RawResult::ObjectWithCollection {
                items: Collection::List(pairs.into_iter().map(|(_, v)| v).collect()),
                raw: None,
            },
            |pairs| RawResult::ObjectWithCollection {
                items: Collection::Map(pairs),
                raw: Some("ignored".into()),
            },
        ];

        let request = StudyHelpRequest::new("What is photosynthesis?", HelpMode::Discussion)
            .with_available_roles(vec!["mentor".into(), "challenger".into(), "connector".into()]);
        let mut seen = Vec::new();
        for shape in shapes {
            let result = service(make(shape)).handle(&request).await;
            seen.push(result.agent_responses);
        }
        assert_eq!(seen[0].len(), 3);
        assert!(seen.iter().all(|r| *r == seen[0]));
    }

    #[test]
    fn test_extractor_is_deterministic() {
        let plain = "Osmosis moves water across a membrane {toward the saltier side}.";
        assert!(scan_text(plain).is_none());
        assert!(scan_text(plain).is_none());

        let text = format!("Here you go: {GRAPH_PAYLOAD} Try it.");
        let first = scan_text(&text).unwrap();
        let second = scan_text(&text).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.1, GRAPH_PAYLOAD);
    }

    #[test]
    fn test_map_with_fenced_and_plain_keys() {
        let roster = Roster::builtin();
        let composer = TaskComposer::new(Arc::new(roster), Arc::new(FixedVisualClassifier(true)));
        let available = vec!["professor".to_string(), "student".to_string()];
        let tasks = composer.compose(&study_crew::composer::CompositionInput {
            question: "Draw the water cycle",
            subject: "science",
            mode: HelpMode::Discussion,
            preferred_role: None,
            available_roles: Some(available.as_slice()),
            history: &[],
        });
        assert_eq!(tasks.len(), 2);

        let fenced = "Here is a sketch:\n```json\n{\"type\": \"diagram\", \"instructions\": \"Draw evaporation, condensation and precipitation as a loop.\"}\n```";
        let plain = "I think of it as water taking a round trip.";
        let output = GatewayOutput::new(RawResult::Map(vec![
            (tasks[0].prompt.clone(), fenced.to_string()),
            (tasks[1].prompt.clone(), plain.to_string()),
        ]));

        let messages = normalize(&tasks, &output);
        assert_eq!(messages.len(), 2);
        let found = extract_whiteboard(&messages, &[]).unwrap();
        assert_eq!(found.origin, PayloadOrigin::Message(0));
        assert_eq!(found.spec.kind, WhiteboardKind::Diagram);
        assert!(scan_text(plain).is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_end_to_end_with_mock_llm() {
        let mut cfg = AppConfig::default();
        cfg.pipeline.gateway_timeout_secs = 30;
        let svc = StudyHelpService::with_llm(&cfg, Arc::new(MockLlmClient));

        let request = StudyHelpRequest::new("Graph y = x^2 - 5x + 6", HelpMode::Single)
            .with_preferred_role("professor")
            .with_subject("mathematics");
        let result = svc.handle(&request).await;

        assert!(result.success, "{result:?}");
        let wb = result.whiteboard.expect("whiteboard from tool call");
        assert_eq!(wb.kind, WhiteboardKind::Graph);
        assert_eq!(wb.render_engine, RenderEngine::Whiteboard);
        let answer = result.answer.unwrap();
        assert!(answer.starts_with("Socratic Mentor here."));
        assert!(!answer.contains("```"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_discussion_with_mock_llm_runs_all_roles_in_order() {
        let svc = StudyHelpService::with_llm(&AppConfig::default(), Arc::new(MockLlmClient));
        let result = svc
            .handle(&StudyHelpRequest::new("Why is the sky blue?", HelpMode::Discussion))
            .await;

        assert!(result.success);
        let agents: Vec<&str> = result.agent_responses.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(
            agents,
            vec![
                "Socratic Mentor",
                "Problem Analyst",
                "Critical Thinker",
                "Peer Student",
                "Interdisciplinary Connector"
            ]
        );
        assert!(result.whiteboard.is_none());
        assert!(result.answer.unwrap().starts_with("Problem Analyst here."));
    }
}
