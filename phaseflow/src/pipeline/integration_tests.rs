//! End-to-end tests for pipeline execution.

#[cfg(test)]
mod tests {
    use crate::cancellation::CancellationToken;
    use crate::context::SharedContext;
    use crate::core::{codes, Fail, FlowType, Outcome, RunState};
    use crate::errors::ResolveError;
    use crate::events::{CollectingEventSink, EventKind};
    use crate::pipeline::{PhaseOptions, Pipeline, StepOptions};
    use crate::testing::{
        assert_has_fail, assert_outcome_failed, assert_outcome_succeeded, CallCounter,
        FailingOutcomeUnit, FaultUnit, FlakyUnit, SlowUnit, SuccessUnit,
    };
    use crate::units::{MockUnitResolver, UnitKey, UnitRegistry, WorkUnit};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Order {
        quantity: u32,
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Receipt {
        total: u32,
    }

    type Ctx = Arc<SharedContext<Order, Receipt>>;

    fn context() -> Ctx {
        Arc::new(SharedContext::new(Order::default(), Receipt::default()))
    }

    /// Publishes the unit price on the side channel.
    struct PriceLookup {
        ctx: Ctx,
    }

    #[async_trait]
    impl WorkUnit for PriceLookup {
        async fn execute(&self, _cancel: &CancellationToken) -> anyhow::Result<Outcome> {
            self.ctx.side_channel().set("unit_price", 3_u32)?;
            Ok(Outcome::success())
        }
    }

    /// Computes the total from the request and the published price.
    struct Totaler {
        ctx: Ctx,
    }

    #[async_trait]
    impl WorkUnit for Totaler {
        async fn execute(&self, _cancel: &CancellationToken) -> anyhow::Result<Outcome> {
            let price = self
                .ctx
                .side_channel()
                .try_get::<u32>("unit_price")?
                .ok_or_else(|| anyhow::anyhow!("price missing"))?;
            let quantity = self.ctx.request().quantity;
            self.ctx.update_response(|r| r.total = quantity * *price);
            Ok(Outcome::success())
        }
    }

    struct PanicUnit;

    #[async_trait]
    impl WorkUnit for PanicUnit {
        async fn execute(&self, _cancel: &CancellationToken) -> anyhow::Result<Outcome> {
            panic!("index out of bounds");
        }
    }

    fn pipeline(ctx: &Ctx, registry: &Arc<UnitRegistry>) -> Pipeline<Order, Receipt> {
        Pipeline::new(Arc::clone(ctx), registry.clone())
    }

    #[tokio::test]
    async fn test_request_bound_and_response_returned() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        {
            let ctx = Arc::clone(&ctx);
            registry.register(move || PriceLookup { ctx: Arc::clone(&ctx) });
        }
        {
            let ctx = Arc::clone(&ctx);
            registry.register(move || Totaler { ctx: Arc::clone(&ctx) });
        }

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("lookup")
            .unwrap()
            .append_step::<PriceLookup>(StepOptions::new().named("price"))
            .unwrap()
            .append_phase("total")
            .unwrap()
            .append_step::<Totaler>(StepOptions::new())
            .unwrap();

        let outcome = p.execute(Some(Order { quantity: 14 })).await;

        assert_outcome_succeeded(&outcome);
        assert_eq!(outcome.response().map(|r| r.total), Some(42));
        assert_eq!(p.state(), RunState::Completed);
        assert_eq!(p.flow_type(), FlowType::Primary);
    }

    #[tokio::test]
    async fn test_warning_only_run_succeeds_and_reports_warnings() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        registry.register(|| FailingOutcomeUnit::new(Fail::warning(9, "CACHE_COLD", "served from origin")));

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("serve").unwrap();
        p.append_step::<FailingOutcomeUnit>(StepOptions::new()).unwrap();

        let outcome = p.execute(None).await;

        assert_outcome_succeeded(&outcome);
        assert_has_fail(&outcome, "CACHE_COLD");
        assert!(outcome.response.is_some());
        assert_eq!(p.state(), RunState::Completed);
    }

    #[tokio::test]
    async fn test_guard_with_stepless_phases_leaves_context_untouched() {
        let ctx = context();
        ctx.set_request(Order { quantity: 1 });
        let registry = Arc::new(UnitRegistry::new());

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("a").unwrap().append_phase("b").unwrap();

        let outcome = p.execute(Some(Order { quantity: 99 })).await;

        assert_has_fail(&outcome, codes::NO_PHASES_DEFINED);
        assert!(outcome.response.is_none());
        assert_eq!(*ctx.request(), Order { quantity: 1 });
        assert_eq!(*ctx.response(), Receipt::default());
        assert!(ctx.side_channel().is_empty());
        assert_eq!(p.state(), RunState::NotStarted);
    }

    #[tokio::test]
    async fn test_barrier_waits_for_every_sibling() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        let slow_calls = CallCounter::new();
        let fault_calls = CallCounter::new();
        {
            let calls = slow_calls.clone();
            registry.register_keyed(UnitKey::named("slow-a"), move || {
                SlowUnit::with_delay_ms(20).counted(calls.clone())
            });
        }
        {
            let calls = slow_calls.clone();
            registry.register_keyed(UnitKey::named("slow-b"), move || {
                SlowUnit::with_delay_ms(40).counted(calls.clone())
            });
        }
        {
            let calls = fault_calls.clone();
            registry.register_keyed(UnitKey::named("broken"), move || {
                FaultUnit::new("connection reset").counted(calls.clone())
            });
        }

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("fan-out").unwrap();
        p.append_step_keyed(UnitKey::named("slow-a"), StepOptions::new()).unwrap();
        p.append_step_keyed(UnitKey::named("broken"), StepOptions::new()).unwrap();
        p.append_step_keyed(UnitKey::named("slow-b"), StepOptions::new()).unwrap();

        let outcome = p.execute(None).await;
        assert_outcome_failed(&outcome);

        let phase = p.phase("fan-out").unwrap();
        assert_eq!(phase.counters().steps_executed(), 3);
        assert_eq!(slow_calls.get(), 2);
        assert_eq!(fault_calls.get(), 1);
        assert!(phase.steps()[0].counters().exec_time() >= Duration::from_millis(20));
        assert!(phase.steps()[2].counters().exec_time() >= Duration::from_millis(40));
        assert!(phase.counters().exec_time() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_retry_exhaustion() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        let calls = CallCounter::new();
        {
            let calls = calls.clone();
            registry.register(move || FaultUnit::new("timeout").counted(calls.clone()));
        }

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("send").unwrap();
        p.append_step::<FaultUnit>(StepOptions::new().with_retries(3)).unwrap();

        let outcome = p.execute(None).await;

        assert_eq!(calls.get(), 4);
        assert_eq!(outcome.fails.len(), 1);
        assert_has_fail(&outcome, codes::WORK_UNIT_FAILED);
        assert!(outcome.fails[0].info.contains("FaultUnit"));

        let step = &p.phase("send").unwrap().steps()[0];
        assert_eq!(step.counters().retries(), 3);
        assert_eq!(p.phase("send").unwrap().counters().steps_executed(), 1);
    }

    #[tokio::test]
    async fn test_phase_retry_defaults_apply() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        let calls = CallCounter::new();
        {
            let calls = calls.clone();
            registry.register(move || FaultUnit::default().counted(calls.clone()));
        }

        let mut p = pipeline(&ctx, &registry);
        p.append_phase_with("send", PhaseOptions::new().with_retries(2).with_retry_interval_ms(1))
            .unwrap();
        p.append_step::<FaultUnit>(StepOptions::new()).unwrap();

        let outcome = p.execute(None).await;

        assert_outcome_failed(&outcome);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_flaky_unit_recovers() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        let calls = CallCounter::new();
        {
            let calls = calls.clone();
            registry.register(move || FlakyUnit::new(2, calls.clone()));
        }

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("fetch").unwrap();
        p.append_step::<FlakyUnit>(StepOptions::new().with_retries(2).with_retry_interval_ms(1))
            .unwrap();

        let outcome = p.execute(None).await;

        assert_outcome_succeeded(&outcome);
        assert_eq!(calls.get(), 3);
        assert_eq!(p.stats().total_retries, 2);
    }

    #[tokio::test]
    async fn test_failing_outcome_is_not_retried() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        let calls = CallCounter::new();
        {
            let calls = calls.clone();
            registry.register(move || {
                FailingOutcomeUnit::new(Fail::error(4, "INVALID_ORDER", "quantity is zero"))
                    .counted(calls.clone())
            });
        }

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("validate").unwrap();
        p.append_step::<FailingOutcomeUnit>(StepOptions::new().with_retries(5)).unwrap();

        let outcome = p.execute(None).await;

        assert_has_fail(&outcome, "INVALID_ORDER");
        assert_eq!(calls.get(), 1);
        assert_eq!(p.stats().total_retries, 0);
    }

    #[tokio::test]
    async fn test_failing_phase_stops_the_run() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        let first = CallCounter::new();
        let third = CallCounter::new();
        {
            let calls = first.clone();
            registry.register_keyed(UnitKey::named("p1"), move || SuccessUnit::counted(calls.clone()));
        }
        {
            let calls = third.clone();
            registry.register_keyed(UnitKey::named("p3"), move || SuccessUnit::counted(calls.clone()));
        }
        registry.register(|| FailingOutcomeUnit::new(Fail::error(12, "STOCK_OUT", "no stock")));
        registry.register(|| FaultUnit::new("warehouse offline"));

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("P1").unwrap();
        p.append_step_keyed(UnitKey::named("p1"), StepOptions::new()).unwrap();
        p.append_phase("P2").unwrap();
        p.append_step::<FailingOutcomeUnit>(StepOptions::new()).unwrap();
        p.append_step::<FaultUnit>(StepOptions::new()).unwrap();
        p.append_phase("P3").unwrap();
        p.append_step_keyed(UnitKey::named("p3"), StepOptions::new()).unwrap();

        let outcome = p.execute(None).await;

        let mnemonics: Vec<&str> = outcome.fails.iter().map(|f| f.mnemonic.as_str()).collect();
        assert_eq!(mnemonics, vec!["STOCK_OUT", codes::WORK_UNIT_FAILED]);
        assert!(outcome.response.is_none());
        assert_eq!(first.get(), 1);
        assert_eq!(third.get(), 0);
        assert_eq!(p.phase("P3").unwrap().counters().steps_executed(), 0);
        assert_eq!(p.state(), RunState::Aborted);
        assert_eq!(p.flow_type(), FlowType::Rollback);
    }

    #[tokio::test]
    async fn test_performance_ratio_for_concurrent_steps() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        registry.register_keyed(UnitKey::named("a"), || SlowUnit::with_delay_ms(100));
        registry.register_keyed(UnitKey::named("b"), || SlowUnit::with_delay_ms(100));

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("parallel").unwrap();
        p.append_step_keyed(UnitKey::named("a"), StepOptions::new()).unwrap();
        p.append_step_keyed(UnitKey::named("b"), StepOptions::new()).unwrap();

        let outcome = p.execute(None).await;
        assert_outcome_succeeded(&outcome);

        let stats = p.stats();
        assert_eq!(stats.total_steps_executed, 2);
        assert!(stats.total_step_time_ms >= 200.0);
        assert!(
            stats.performance_pct > 150.0 && stats.performance_pct <= 201.0,
            "performance was {}",
            stats.performance_pct
        );
    }

    #[tokio::test]
    async fn test_counters_accumulate_across_runs() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        registry.register(SuccessUnit::default);

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("only").unwrap();
        p.append_step::<SuccessUnit>(StepOptions::new()).unwrap();

        assert_outcome_succeeded(&p.execute(None).await);
        assert_outcome_succeeded(&p.execute(None).await);

        assert_eq!(p.stats().total_steps_executed, 2);
    }

    #[tokio::test]
    async fn test_rollback_flow_after_failure() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        let undo = CallCounter::new();
        registry.register(FaultUnit::default);
        {
            let calls = undo.clone();
            registry.register(move || SuccessUnit::counted(calls.clone()));
        }

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("charge").unwrap();
        p.append_step::<FaultUnit>(StepOptions::new()).unwrap();
        p.append_rollback_step::<SuccessUnit>(StepOptions::new().named("refund"))
            .unwrap();

        let outcome = p.execute(None).await;
        assert_outcome_failed(&outcome);
        assert_eq!(p.flow_type(), FlowType::Rollback);
        assert_eq!(undo.get(), 0);

        let outcome = p.execute(None).await;
        assert_outcome_succeeded(&outcome);
        assert_eq!(undo.get(), 1);
        assert_eq!(p.flow_type(), FlowType::Rollback);
    }

    #[tokio::test]
    async fn test_next_run_without_rollback_steps_is_guarded() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        registry.register(FaultUnit::default);

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("charge").unwrap();
        p.append_step::<FaultUnit>(StepOptions::new()).unwrap();

        assert_outcome_failed(&p.execute(None).await);

        let outcome = p.execute(None).await;
        assert_has_fail(&outcome, codes::NO_PHASES_DEFINED);
        assert!(outcome.is_success());
        assert!(outcome.response.is_none());
    }

    #[tokio::test]
    async fn test_panic_is_treated_as_fault() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        registry.register(|| PanicUnit);

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("risky").unwrap();
        p.append_step::<PanicUnit>(StepOptions::new().with_retries(1)).unwrap();

        let outcome = p.execute(None).await;

        assert_has_fail(&outcome, codes::WORK_UNIT_FAILED);
        assert_eq!(p.stats().total_retries, 1);
    }

    #[tokio::test]
    async fn test_unresolved_unit_fails_without_retry() {
        let mut resolver = MockUnitResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|key| Err(ResolveError::not_registered(key.to_string())));

        let mut p: Pipeline<Order, Receipt> = Pipeline::new(context(), Arc::new(resolver));
        p.append_phase("load").unwrap();
        p.append_step_keyed(UnitKey::named("ghost"), StepOptions::new().with_retries(3))
            .unwrap();

        let outcome = p.execute(None).await;

        assert_has_fail(&outcome, codes::WORK_UNIT_UNRESOLVED);
        assert!(outcome.fails[0].info.contains("ghost"));
        assert_eq!(p.stats().total_retries, 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_run() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        let calls = CallCounter::new();
        {
            let calls = calls.clone();
            registry.register(move || SuccessUnit::counted(calls.clone()));
        }

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("work").unwrap();
        p.append_step::<SuccessUnit>(StepOptions::new()).unwrap();

        let cancel = Arc::new(CancellationToken::new());
        cancel.cancel("shutdown");
        let outcome = p.execute_with(None, cancel).await;

        assert_has_fail(&outcome, codes::CANCELLED);
        assert!(outcome.fails[0].info.contains("shutdown"));
        assert_eq!(calls.get(), 0);
        assert_eq!(p.state(), RunState::Aborted);
        assert_eq!(p.flow_type(), FlowType::Primary);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_retry_delay() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        let calls = CallCounter::new();
        {
            let calls = calls.clone();
            registry.register(move || FaultUnit::default().counted(calls.clone()));
        }

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("work").unwrap();
        p.append_step::<FaultUnit>(StepOptions::new().with_retries(5).with_retry_interval_ms(10_000))
            .unwrap();

        let cancel = Arc::new(CancellationToken::new());
        let trigger = Arc::clone(&cancel);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel("deadline");
        });

        let started = Instant::now();
        let outcome = p.execute_with(None, cancel).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_has_fail(&outcome, codes::CANCELLED);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_dropped_run_aborts_step_tasks() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        let calls = CallCounter::new();
        {
            let calls = calls.clone();
            registry.register(move || SlowUnit::with_delay_ms(200).counted(calls.clone()));
        }

        let mut p = pipeline(&ctx, &registry);
        p.append_phase("work").unwrap();
        p.append_step::<SlowUnit>(StepOptions::new()).unwrap();

        let timed_out = tokio::time::timeout(Duration::from_millis(30), p.execute(None)).await;
        assert!(timed_out.is_err());
        assert_eq!(calls.get(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;

        let phase = p.phase("work").unwrap();
        assert_eq!(phase.counters().steps_executed(), 0);
        assert_eq!(phase.steps()[0].counters().exec_time(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_events_in_order() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        registry.register(SuccessUnit::default);
        let sink = Arc::new(CollectingEventSink::new());

        let mut p = pipeline(&ctx, &registry)
            .with_name("checkout")
            .with_event_sink(sink.clone());
        p.append_phase("only").unwrap();
        p.append_step::<SuccessUnit>(StepOptions::new().named("noop")).unwrap();

        assert_outcome_succeeded(&p.execute(None).await);

        assert_eq!(
            sink.kinds(),
            vec![
                EventKind::PipelineStarted,
                EventKind::PhaseStarted,
                EventKind::StepStarted,
                EventKind::StepCompleted,
                EventKind::PhaseCompleted,
                EventKind::PipelineCompleted,
            ]
        );

        let events = sink.events();
        let run_id = events[0].run_id.unwrap();
        assert!(events.iter().all(|e| e.run_id == Some(run_id)));
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(events[2].get("step"), Some(&serde_json::json!("noop")));
        assert_eq!(events[0].to_json()["pipeline"], "checkout");

        assert_outcome_succeeded(&p.execute(None).await);
        let runs = sink.run_ids();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], run_id);
        assert_eq!(sink.of_run(runs[1]).len(), 6);
    }

    #[tokio::test]
    async fn test_failure_events() {
        let ctx = context();
        let registry = Arc::new(UnitRegistry::new());
        registry.register(FaultUnit::default);
        let sink = Arc::new(CollectingEventSink::new());

        let mut p = pipeline(&ctx, &registry).with_event_sink(sink.clone());
        p.append_phase("only").unwrap();
        p.append_step::<FaultUnit>(StepOptions::new().with_retries(1)).unwrap();

        assert_outcome_failed(&p.execute(None).await);

        assert_eq!(sink.of_kind(EventKind::StepRetrying).len(), 1);
        assert_eq!(sink.of_kind(EventKind::StepFailed).len(), 1);
        assert_eq!(sink.of_kind(EventKind::PhaseFailed).len(), 1);
        assert_eq!(sink.of_kind(EventKind::PipelineFailed).len(), 1);
        assert_eq!(sink.run_ids().len(), 1);

        p.log_stats();
        let stats = sink.of_kind(EventKind::PipelineStats);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].run_id, None);
        assert_eq!(stats[0].get("total_retries"), Some(&serde_json::json!(1)));
    }
}
