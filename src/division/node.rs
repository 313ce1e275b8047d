use crate::division::Level;

/// One administrative division and the divisions beneath it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionNode {
    /// Significant code digits for this level (e.g. "6501" for a city)
    pub code: String,

    /// Display name as published
    pub name: String,

    pub level: Level,

    /// Urban/rural classification code, villages only
    pub region_type: Option<String>,

    /// Child divisions in page order
    pub children: Vec<DivisionNode>,
}

/// A child whose code does not extend its parent's code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixViolation {
    pub parent_code: String,
    pub child_code: String,
    pub child_level: Level,
}

impl DivisionNode {
    /// Creates a childless node at any level above village
    pub fn new(level: Level, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            level,
            region_type: None,
            children: Vec::new(),
        }
    }

    /// Creates a village leaf
    pub fn village(
        code: impl Into<String>,
        name: impl Into<String>,
        region_type: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            level: Level::Village,
            region_type: Some(region_type.into()),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Counts the village leaves in this subtree
    pub fn village_count(&self) -> usize {
        if self.level == Level::Village {
            return 1;
        }
        self.children.iter().map(DivisionNode::village_count).sum()
    }

    /// Counts every node in this subtree, including this one
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(DivisionNode::node_count)
            .sum::<usize>()
    }

    /// Number of levels in this subtree (a leaf has height 1)
    pub fn height(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(DivisionNode::height)
            .max()
            .unwrap_or(0)
    }

    /// Collects every parent/child pair that breaks the code-prefix rule
    ///
    /// The walk is iterative; the tree is at most five levels deep but wide.
    pub fn prefix_violations(&self) -> Vec<PrefixViolation> {
        let mut violations = Vec::new();
        let mut stack = vec![self];

        while let Some(node) = stack.pop() {
            for child in &node.children {
                if !child.code.starts_with(&node.code) {
                    violations.push(PrefixViolation {
                        parent_code: node.code.clone(),
                        child_code: child.code.clone(),
                        child_level: child.level,
                    });
                }
                stack.push(child);
            }
        }

        violations
    }
}
