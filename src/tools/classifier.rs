//! Tool call classification.

use crate::model::{Expert, SkillKind, ToolCall};

/// How a tool call is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallKind {
    RemoteTool,
    Delegate,
    Interactive,
}

/// Classify one call against the calling expert.
///
/// A skill name matching a delegate key is a delegation; a skill of kind
/// interactive needs the caller; everything else runs on a skill manager.
pub fn classify_tool_call(expert: &Expert, call: &ToolCall) -> ToolCallKind {
    if expert.is_delegate(&call.skill_name) {
        return ToolCallKind::Delegate;
    }
    match expert.skill(&call.skill_name).map(|s| s.kind) {
        Some(SkillKind::Interactive) => ToolCallKind::Interactive,
        _ => ToolCallKind::RemoteTool,
    }
}

/// A call with its position in the original batch
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedCall {
    pub index: usize,
    pub call: ToolCall,
}

/// A batch of calls split into disjoint buckets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedToolCalls {
    pub remote: Vec<IndexedCall>,
    pub delegate: Vec<IndexedCall>,
    pub interactive: Vec<IndexedCall>,
}

impl ClassifiedToolCalls {
    /// Classify every call of a batch, keeping relative order within buckets
    pub fn classify(expert: &Expert, calls: &[ToolCall]) -> Self {
        let mut classified = Self::default();
        for (index, call) in calls.iter().enumerate() {
            let entry = IndexedCall {
                index,
                call: call.clone(),
            };
            match classify_tool_call(expert, call) {
                ToolCallKind::RemoteTool => classified.remote.push(entry),
                ToolCallKind::Delegate => classified.delegate.push(entry),
                ToolCallKind::Interactive => classified.interactive.push(entry),
            }
        }
        classified
    }

    pub fn len(&self) -> usize {
        self.remote.len() + self.delegate.len() + self.interactive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls of the delegate and interactive buckets in batch order
    pub fn halted_calls(&self) -> Vec<ToolCall> {
        let mut halted: Vec<&IndexedCall> =
            self.delegate.iter().chain(self.interactive.iter()).collect();
        halted.sort_by_key(|c| c.index);
        halted.into_iter().map(|c| c.call.clone()).collect()
    }

    /// Reassemble the original batch
    pub fn into_ordered(self) -> Vec<ToolCall> {
        let mut all: Vec<IndexedCall> = self
            .remote
            .into_iter()
            .chain(self.delegate)
            .chain(self.interactive)
            .collect();
        all.sort_by_key(|c| c.index);
        all.into_iter().map(|c| c.call).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Skill, SkillTool};
    use serde_json::json;

    fn expert() -> Expert {
        Expert::new("lead", "Lead", "Lead the work")
            .with_skill(Skill::remote("search", vec![SkillTool::new("web", "Search")]))
            .with_skill(Skill::interactive("ask", vec![SkillTool::new("user", "Ask")]))
            .with_delegate("researcher")
    }

    fn call(id: &str, skill: &str) -> ToolCall {
        ToolCall::new(id, skill, "t", json!({}))
    }

    #[test]
    fn test_classify_single_calls() {
        let expert = expert();
        assert_eq!(
            classify_tool_call(&expert, &call("1", "search")),
            ToolCallKind::RemoteTool
        );
        assert_eq!(
            classify_tool_call(&expert, &call("2", "researcher")),
            ToolCallKind::Delegate
        );
        assert_eq!(
            classify_tool_call(&expert, &call("3", "ask")),
            ToolCallKind::Interactive
        );
        assert_eq!(
            classify_tool_call(&expert, &call("4", "unknown")),
            ToolCallKind::RemoteTool
        );
    }

    #[test]
    fn test_buckets_partition_and_reassemble_batch() {
        let calls = vec![
            call("a", "researcher"),
            call("b", "search"),
            call("c", "ask"),
            call("d", "search"),
            call("e", "researcher"),
        ];
        let classified = ClassifiedToolCalls::classify(&expert(), &calls);

        assert_eq!(classified.len(), calls.len());
        let ids = |bucket: &[IndexedCall]| -> Vec<String> {
            bucket.iter().map(|c| c.call.id.clone()).collect()
        };
        assert_eq!(ids(&classified.remote), vec!["b", "d"]);
        assert_eq!(ids(&classified.delegate), vec!["a", "e"]);
        assert_eq!(ids(&classified.interactive), vec!["c"]);

        let halted: Vec<String> = classified.halted_calls().into_iter().map(|c| c.id).collect();
        assert_eq!(halted, vec!["a", "c", "e"]);

        assert_eq!(classified.into_ordered(), calls);
    }
}
