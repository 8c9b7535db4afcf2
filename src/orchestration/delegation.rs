//! Delegation strategies: single and parallel sub-expert dispatch.

use async_trait::async_trait;
use futures_util::future::join_all;

use crate::tools::{
    DelegateExecutor, ExecutorError, IndexedCall, SkillManagers, ToolCallExecutor, ToolExecution,
};

/// Dispatches delegate calls and maps each outcome to its call's result
#[async_trait]
pub trait DelegationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns one execution per call, tagged with the call's batch index
    async fn delegate(
        &self,
        calls: &[IndexedCall],
        executor: &DelegateExecutor<'_>,
        skills: &SkillManagers,
    ) -> Result<Vec<(usize, ToolExecution)>, ExecutorError>;
}

/// One delegate call, one sub-run
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleDelegationStrategy;

#[async_trait]
impl DelegationStrategy for SingleDelegationStrategy {
    fn name(&self) -> &'static str {
        "single"
    }

    async fn delegate(
        &self,
        calls: &[IndexedCall],
        executor: &DelegateExecutor<'_>,
        skills: &SkillManagers,
    ) -> Result<Vec<(usize, ToolExecution)>, ExecutorError> {
        let mut executions = Vec::with_capacity(calls.len());
        for entry in calls {
            let execution = executor.execute(&entry.call, skills).await?;
            executions.push((entry.index, execution));
        }
        Ok(executions)
    }
}

/// All sub-runs dispatched together; returns once every one has settled
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelDelegationStrategy;

#[async_trait]
impl DelegationStrategy for ParallelDelegationStrategy {
    fn name(&self) -> &'static str {
        "parallel"
    }

    async fn delegate(
        &self,
        calls: &[IndexedCall],
        executor: &DelegateExecutor<'_>,
        skills: &SkillManagers,
    ) -> Result<Vec<(usize, ToolExecution)>, ExecutorError> {
        let settled = join_all(calls.iter().map(|entry| async move {
            (entry.index, executor.execute(&entry.call, skills).await)
        }))
        .await;

        settled
            .into_iter()
            .map(|(index, result)| result.map(|execution| (index, execution)))
            .collect()
    }
}

/// Strategy for a number of delegate calls
pub fn select_strategy(count: usize) -> Box<dyn DelegationStrategy> {
    if count >= 2 {
        Box::new(ParallelDelegationStrategy)
    } else {
        Box::new(SingleDelegationStrategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{create_initial_checkpoint, CheckpointStatus, DelegationTarget};
    use crate::model::{Expert, Message, ToolCall};
    use crate::tools::{SubRunLauncher, SubRunOutcome};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sub-runs for "slow" finish last; "broken" fails to start
    struct TestLauncher {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl SubRunLauncher for TestLauncher {
        async fn launch(&self, target: &DelegationTarget) -> Result<SubRunOutcome, ExecutorError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if target.expert_key == "slow" {
                tokio::time::sleep(Duration::from_millis(30)).await;
            }
            self.running.fetch_sub(1, Ordering::SeqCst);

            if target.expert_key == "broken" {
                return Ok(SubRunOutcome::Failed("could not start".to_string()));
            }
            let expert = Expert::new(target.expert_key.clone(), "Sub", "sub");
            let checkpoint = create_initial_checkpoint(
                "job",
                "sub",
                &expert,
                vec![Message::expert(format!("{} done", target.expert_key), vec![])],
            )
            .with_status(CheckpointStatus::Completed);
            Ok(SubRunOutcome::Finished(Box::new(checkpoint)))
        }
    }

    fn launcher() -> TestLauncher {
        TestLauncher {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn indexed(index: usize, expert: &str) -> IndexedCall {
        IndexedCall {
            index,
            call: ToolCall::new(format!("c{}", index), expert, expert, json!({"query": "q"})),
        }
    }

    #[test]
    fn test_select_strategy_by_count() {
        assert_eq!(select_strategy(1).name(), "single");
        assert_eq!(select_strategy(2).name(), "parallel");
        assert_eq!(select_strategy(5).name(), "parallel");
    }

    #[tokio::test]
    async fn test_parallel_maps_each_outcome_to_its_call() {
        let launcher = launcher();
        let executor = DelegateExecutor::new(&launcher);
        let calls = vec![indexed(0, "slow"), indexed(2, "broken"), indexed(3, "fast")];

        let executions = ParallelDelegationStrategy
            .delegate(&calls, &executor, &SkillManagers::new())
            .await
            .unwrap();

        assert_eq!(executions.len(), 3);
        let by_index: Vec<(usize, &str, bool)> = executions
            .iter()
            .map(|(i, e)| (*i, e.result.id.as_str(), e.result.is_failure()))
            .collect();
        assert_eq!(
            by_index,
            vec![(0, "c0", false), (2, "c2", true), (3, "c3", false)]
        );
        assert_eq!(executions[0].1.result.joined_text(), "slow done");
        assert!(launcher.peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_single_dispatches_one_sub_run() {
        let launcher = launcher();
        let executor = DelegateExecutor::new(&launcher);
        let executions = SingleDelegationStrategy
            .delegate(&[indexed(1, "fast")], &executor, &SkillManagers::new())
            .await
            .unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].0, 1);
        assert_eq!(executions[0].1.result.joined_text(), "fast done");
    }
}
