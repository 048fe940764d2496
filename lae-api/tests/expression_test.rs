#[cfg(test)]
mod tests {
    use lae_api::{ComputationNode, ComputationNodeType, Operator};

    fn leaf(data: Vec<Vec<f64>>) -> ComputationNode {
        ComputationNode::matrix(data)
    }

    #[test]
    fn test_composite_tree_resolves_bottom_up() {
        let add = ComputationNode::operation(
            Operator::Add,
            vec![leaf(vec![vec![1.0, 2.0]]), leaf(vec![vec![3.0, 4.0]])],
        );
        let mut root = ComputationNode::operation(Operator::Transpose, vec![add]);
        assert_eq!(root.pending_operations(), 2);

        let next = root.find_resolvable().expect("add node is resolvable");
        assert_eq!(next.node_type(), ComputationNodeType::Add);
        next.resolve(vec![vec![4.0, 6.0]]);
        assert_eq!(root.pending_operations(), 1);

        let next = root.find_resolvable().expect("transpose node is resolvable");
        assert_eq!(next.operator(), Some(Operator::Transpose));
        next.resolve(vec![vec![4.0], vec![6.0]]);

        assert!(root.is_resolved());
        assert!(root.find_resolvable().is_none());
        assert_eq!(root.into_matrix(), Some(vec![vec![4.0], vec![6.0]]));
    }

    #[test]
    fn test_nested_operand_blocks_parent() {
        let negate = ComputationNode::operation(Operator::Negate, vec![leaf(vec![vec![1.0]])]);
        let mut root = ComputationNode::operation(
            Operator::Multiply,
            vec![leaf(vec![vec![2.0]]), negate],
        );

        let next = root.find_resolvable().expect("negate node is resolvable");
        assert_eq!(next.node_type(), ComputationNodeType::Negate);
    }

    #[test]
    fn test_operator_without_children_is_resolvable() {
        let mut root = ComputationNode::operation(Operator::Add, Vec::new());
        let next = root.find_resolvable().expect("vacuously resolvable");
        assert!(next.children().is_empty());
    }

    #[test]
    fn test_nesting_applies_to_inner_nodes() {
        let inner = ComputationNode::operation(
            Operator::Multiply,
            vec![leaf(vec![vec![1.0]]), leaf(vec![vec![2.0]]), leaf(vec![vec![3.0]])],
        );
        let mut root = ComputationNode::operation(Operator::Transpose, vec![inner]);
        root.associative_nesting();

        let multiply = &root.children()[0];
        assert_eq!(multiply.children().len(), 2);
        assert_eq!(multiply.children()[0].node_type(), ComputationNodeType::Multiply);
        assert_eq!(multiply.children()[1], leaf(vec![vec![3.0]]));
    }
}
