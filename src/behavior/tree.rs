//! Behavior tree core: node trait, composites, decorators, and the fluent
//! builder trees are assembled with.
//!
//! Execution is synchronous; a node that needs to wait returns `Running` and
//! is re-entered next tick with whatever state it parked on the blackboard.

use crate::behavior::ExecuteContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteResult {
    Success,
    Failure,
    Running,
}

pub trait BehaviorNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult;
}

/// Wrapper applied to a composite's final result before it reaches the
/// parent. `Success` makes a subtree's effects optional without aborting
/// the enclosing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeDecorator {
    #[default]
    None,
    Success,
}

fn decorate(result: ExecuteResult, decorator: CompositeDecorator) -> ExecuteResult {
    match (decorator, result) {
        (CompositeDecorator::Success, ExecuteResult::Failure) => ExecuteResult::Success,
        _ => result,
    }
}

/// First non-Failure child wins; Failure only when every child fails.
pub struct SelectorNode {
    children: Vec<Box<dyn BehaviorNode>>,
    decorator: CompositeDecorator,
}

impl BehaviorNode for SelectorNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        for child in &mut self.children {
            let result = child.execute(ctx);
            if result != ExecuteResult::Failure {
                return decorate(result, self.decorator);
            }
        }
        decorate(ExecuteResult::Failure, self.decorator)
    }
}

/// First non-Success child wins; Success only when every child succeeds.
pub struct SequenceNode {
    children: Vec<Box<dyn BehaviorNode>>,
    decorator: CompositeDecorator,
}

impl BehaviorNode for SequenceNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        for child in &mut self.children {
            let result = child.execute(ctx);
            if result != ExecuteResult::Success {
                return decorate(result, self.decorator);
            }
        }
        decorate(ExecuteResult::Success, self.decorator)
    }
}

/// Executes every child each tick; Success only if all succeed. Tuned for
/// fire-and-act combinations (aim while moving while choosing weapons), so
/// side effects happen regardless of siblings failing.
pub struct ParallelNode {
    children: Vec<Box<dyn BehaviorNode>>,
    decorator: CompositeDecorator,
}

impl BehaviorNode for ParallelNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        let mut all_success = true;
        for child in &mut self.children {
            if child.execute(ctx) != ExecuteResult::Success {
                all_success = false;
            }
        }
        let result = if all_success {
            ExecuteResult::Success
        } else {
            ExecuteResult::Failure
        };
        decorate(result, self.decorator)
    }
}

/// Swaps Success and Failure; Running passes through.
pub struct InvertNode {
    child: Box<dyn BehaviorNode>,
}

impl InvertNode {
    pub fn new(child: impl BehaviorNode + 'static) -> Self {
        Self {
            child: Box::new(child),
        }
    }
}

impl BehaviorNode for InvertNode {
    fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
        match self.child.execute(ctx) {
            ExecuteResult::Success => ExecuteResult::Failure,
            ExecuteResult::Failure => ExecuteResult::Success,
            ExecuteResult::Running => ExecuteResult::Running,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CompositeKind {
    Selector,
    Sequence,
    Parallel,
}

struct Frame {
    kind: CompositeKind,
    decorator: CompositeDecorator,
    children: Vec<Box<dyn BehaviorNode>>,
}

/// Stack-based fluent builder. Each composite call opens a frame, `child`
/// appends to the innermost one, `end` closes it into its parent. `build`
/// closes anything still open.
#[derive(Default)]
pub struct TreeBuilder {
    stack: Vec<Frame>,
    root: Option<Box<dyn BehaviorNode>>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selector(self) -> Self {
        self.selector_with(CompositeDecorator::None)
    }

    pub fn selector_with(mut self, decorator: CompositeDecorator) -> Self {
        self.stack.push(Frame {
            kind: CompositeKind::Selector,
            decorator,
            children: Vec::new(),
        });
        self
    }

    pub fn sequence(self) -> Self {
        self.sequence_with(CompositeDecorator::None)
    }

    pub fn sequence_with(mut self, decorator: CompositeDecorator) -> Self {
        self.stack.push(Frame {
            kind: CompositeKind::Sequence,
            decorator,
            children: Vec::new(),
        });
        self
    }

    pub fn parallel(self) -> Self {
        self.parallel_with(CompositeDecorator::None)
    }

    pub fn parallel_with(mut self, decorator: CompositeDecorator) -> Self {
        self.stack.push(Frame {
            kind: CompositeKind::Parallel,
            decorator,
            children: Vec::new(),
        });
        self
    }

    pub fn child(mut self, node: impl BehaviorNode + 'static) -> Self {
        self.push_node(Box::new(node));
        self
    }

    /// Appends the node wrapped in an inverter.
    pub fn invert(self, node: impl BehaviorNode + 'static) -> Self {
        self.child(InvertNode::new(node))
    }

    pub fn end(mut self) -> Self {
        if let Some(frame) = self.stack.pop() {
            let node: Box<dyn BehaviorNode> = match frame.kind {
                CompositeKind::Selector => Box::new(SelectorNode {
                    children: frame.children,
                    decorator: frame.decorator,
                }),
                CompositeKind::Sequence => Box::new(SequenceNode {
                    children: frame.children,
                    decorator: frame.decorator,
                }),
                CompositeKind::Parallel => Box::new(ParallelNode {
                    children: frame.children,
                    decorator: frame.decorator,
                }),
            };
            self.push_node(node);
        }
        self
    }

    fn push_node(&mut self, node: Box<dyn BehaviorNode>) {
        match self.stack.last_mut() {
            Some(frame) => frame.children.push(node),
            None => self.root = Some(node),
        }
    }

    pub fn build(mut self) -> Box<dyn BehaviorNode> {
        while !self.stack.is_empty() {
            self = self.end();
        }
        // An empty builder yields a tree that always fails, never a panic.
        self.root.unwrap_or_else(|| {
            Box::new(SelectorNode {
                children: Vec::new(),
                decorator: CompositeDecorator::None,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::blackboard::Blackboard;
    use crate::behavior::{LinePathfinder, TargetMemory};
    use crate::game::input::InputState;
    use crate::game::Game;
    use crate::render::DebugRenderer;

    /// Leaf returning a fixed result and counting executions through the
    /// blackboard.
    struct StubNode {
        result: ExecuteResult,
        key: &'static str,
    }

    impl StubNode {
        fn new(result: ExecuteResult, key: &'static str) -> Self {
            Self { result, key }
        }
    }

    impl BehaviorNode for StubNode {
        fn execute(&mut self, ctx: &mut ExecuteContext) -> ExecuteResult {
            let count = ctx.blackboard.value_or::<i32>(self.key, 0);
            ctx.blackboard.set(self.key, count + 1);
            self.result
        }
    }

    fn run(tree: &mut dyn BehaviorNode, bb: &mut Blackboard) -> ExecuteResult {
        let mut game = Game::default();
        let mut input = InputState::default();
        let mut renderer = DebugRenderer::default();
        let mut pathfinder = LinePathfinder;
        let mut targets = TargetMemory::default();
        let mut ctx = ExecuteContext {
            game: &mut game,
            blackboard: bb,
            input: &mut input,
            renderer: &mut renderer,
            pathfinder: &mut pathfinder,
            targets: &mut targets,
            dt: 0.01,
        };
        tree.execute(&mut ctx)
    }

    #[test]
    fn test_selector_stops_at_first_success() {
        let mut bb = Blackboard::new();
        let mut tree = TreeBuilder::new()
            .selector()
            .child(StubNode::new(ExecuteResult::Failure, "a"))
            .child(StubNode::new(ExecuteResult::Success, "b"))
            .child(StubNode::new(ExecuteResult::Success, "c"))
            .end()
            .build();

        assert_eq!(run(tree.as_mut(), &mut bb), ExecuteResult::Success);
        assert_eq!(bb.value::<i32>("a"), Some(1));
        assert_eq!(bb.value::<i32>("b"), Some(1));
        assert_eq!(bb.value::<i32>("c"), None);
    }

    #[test]
    fn test_selector_returns_running() {
        let mut bb = Blackboard::new();
        let mut tree = TreeBuilder::new()
            .selector()
            .child(StubNode::new(ExecuteResult::Failure, "a"))
            .child(StubNode::new(ExecuteResult::Running, "b"))
            .end()
            .build();

        assert_eq!(run(tree.as_mut(), &mut bb), ExecuteResult::Running);
    }

    #[test]
    fn test_sequence_stops_at_first_failure() {
        let mut bb = Blackboard::new();
        let mut tree = TreeBuilder::new()
            .sequence()
            .child(StubNode::new(ExecuteResult::Success, "a"))
            .child(StubNode::new(ExecuteResult::Failure, "b"))
            .child(StubNode::new(ExecuteResult::Success, "c"))
            .end()
            .build();

        assert_eq!(run(tree.as_mut(), &mut bb), ExecuteResult::Failure);
        assert_eq!(bb.value::<i32>("c"), None);
    }

    #[test]
    fn test_sequence_success_decorator() {
        let mut bb = Blackboard::new();
        let mut tree = TreeBuilder::new()
            .sequence_with(CompositeDecorator::Success)
            .child(StubNode::new(ExecuteResult::Failure, "a"))
            .end()
            .build();

        assert_eq!(run(tree.as_mut(), &mut bb), ExecuteResult::Success);
    }

    #[test]
    fn test_decorator_passes_running_through() {
        let mut bb = Blackboard::new();
        let mut tree = TreeBuilder::new()
            .sequence_with(CompositeDecorator::Success)
            .child(StubNode::new(ExecuteResult::Running, "a"))
            .end()
            .build();

        assert_eq!(run(tree.as_mut(), &mut bb), ExecuteResult::Running);
    }

    #[test]
    fn test_parallel_executes_all_children() {
        let mut bb = Blackboard::new();
        let mut tree = TreeBuilder::new()
            .parallel()
            .child(StubNode::new(ExecuteResult::Failure, "a"))
            .child(StubNode::new(ExecuteResult::Success, "b"))
            .child(StubNode::new(ExecuteResult::Success, "c"))
            .end()
            .build();

        // All children ran despite the failure; the composite still fails.
        assert_eq!(run(tree.as_mut(), &mut bb), ExecuteResult::Failure);
        assert_eq!(bb.value::<i32>("a"), Some(1));
        assert_eq!(bb.value::<i32>("b"), Some(1));
        assert_eq!(bb.value::<i32>("c"), Some(1));
    }

    #[test]
    fn test_invert_swaps_success_failure() {
        let mut bb = Blackboard::new();
        let mut tree = TreeBuilder::new()
            .sequence()
            .invert(StubNode::new(ExecuteResult::Failure, "a"))
            .child(StubNode::new(ExecuteResult::Success, "b"))
            .end()
            .build();

        assert_eq!(run(tree.as_mut(), &mut bb), ExecuteResult::Success);
    }

    #[test]
    fn test_nested_composites() {
        let mut bb = Blackboard::new();
        let mut tree = TreeBuilder::new()
            .selector()
            .sequence()
            .child(StubNode::new(ExecuteResult::Success, "a"))
            .child(StubNode::new(ExecuteResult::Failure, "b"))
            .end()
            .sequence()
            .child(StubNode::new(ExecuteResult::Success, "c"))
            .end()
            .end()
            .build();

        // First sequence fails at "b"; the selector falls through to the
        // second sequence which succeeds.
        assert_eq!(run(tree.as_mut(), &mut bb), ExecuteResult::Success);
        assert_eq!(bb.value::<i32>("c"), Some(1));
    }

    #[test]
    fn test_empty_builder_fails_safely() {
        let mut bb = Blackboard::new();
        let mut tree = TreeBuilder::new().build();
        assert_eq!(run(tree.as_mut(), &mut bb), ExecuteResult::Failure);
    }

    #[test]
    fn test_build_closes_open_frames() {
        let mut bb = Blackboard::new();
        let mut tree = TreeBuilder::new()
            .selector()
            .child(StubNode::new(ExecuteResult::Success, "a"))
            .build();

        assert_eq!(run(tree.as_mut(), &mut bb), ExecuteResult::Success);
    }
}
