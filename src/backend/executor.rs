use crate::backend::{Op, OpResult};
use crate::tree::TreeTransaction;
use crate::types::Code;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Atomicity {
    /// A failure discards every op of the group.
    Multi,
    /// Ops before the first failure are kept.
    Batch,
}

pub(crate) fn execute_op(txn: &mut TreeTransaction<'_>, op: &Op) -> Result<OpResult, Code> {
    match op {
        Op::Create { path, data, acl, mode } => {
            let created = txn.create(path, data.clone(), acl.clone(), *mode)?;
            Ok(OpResult::Created {
                path: created.path,
                stat: created.stat,
            })
        }
        Op::Delete { path, version, mode } => txn.delete(path, *version, *mode).map(|_| OpResult::Deleted),
        Op::SetData { path, data, version } => txn.set_data(path, data.clone(), *version).map(OpResult::DataSet),
        Op::SetAcl { path, acl, version } => txn.set_acl(path, acl.clone(), *version).map(OpResult::AclSet),
        Op::Check { path, version } => txn.check(path, *version).map(OpResult::Checked),
        Op::GetData { path } => txn.get_data(path).map(|(data, stat)| OpResult::Data { data, stat }),
        Op::Move {
            path,
            version,
            destination,
            mode,
        } => txn.move_node(path, *version, destination, *mode).map(OpResult::Moved),
    }
}

/// Runs `ops` in order. On the first failure the failing op reports its code, later ops are
/// `Skipped`, and under [`Atomicity::Multi`] earlier ops are reported `RolledBack`.
pub(crate) fn execute_ops(txn: &mut TreeTransaction<'_>, ops: &[Op], atomicity: Atomicity) -> (Vec<OpResult>, Code) {
    let mut results = Vec::with_capacity(ops.len());
    for (index, op) in ops.iter().enumerate() {
        match execute_op(txn, op) {
            Ok(result) => results.push(result),
            Err(code) => {
                if atomicity == Atomicity::Multi {
                    for result in results.iter_mut() {
                        *result = OpResult::Error(Code::RolledBack);
                    }
                }
                results.push(OpResult::Error(code));
                results.extend((index + 1..ops.len()).map(|_| OpResult::Error(Code::Skipped)));
                return (results, code);
            }
        }
    }

    (results, Code::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::IdAllocator;
    use crate::tree::{NodeTree, TreeLimits};
    use crate::types::{CreateMode, DeleteMode, SessionAuth};

    fn tree_with_root(ids: &IdAllocator) -> NodeTree {
        let mut tree = NodeTree::new(TreeLimits::default());
        let auth = SessionAuth::super_user(0);
        let mut txn = TreeTransaction::new(&tree, ids, &auth, 1, 1);
        txn.ensure_root();
        let create = Op::Create {
            path: "/keep".to_string(),
            data: None,
            acl: None,
            mode: CreateMode::PERSISTENT,
        };
        execute_op(&mut txn, &create).unwrap();
        let outcome = txn.finish();
        tree.publish(outcome.staged, outcome.zxid);
        tree
    }

    fn ops() -> Vec<Op> {
        vec![
            Op::Create {
                path: "/a".to_string(),
                data: None,
                acl: None,
                mode: CreateMode::PERSISTENT,
            },
            Op::Delete {
                path: "/keep".to_string(),
                version: -1,
                mode: DeleteMode::NONE,
            },
            Op::GetData {
                path: "/missing".to_string(),
            },
            Op::Create {
                path: "/b".to_string(),
                data: None,
                acl: None,
                mode: CreateMode::PERSISTENT,
            },
        ]
    }

    #[test]
    fn multi_failure_rolls_back_everything() {
        let ids = IdAllocator::default();
        let tree = tree_with_root(&ids);
        let auth = SessionAuth::new(1, Vec::new());
        let mut txn = TreeTransaction::new(&tree, &ids, &auth, 2, 2);

        let (results, code) = execute_ops(&mut txn, &ops(), Atomicity::Multi);

        assert_eq!(code, Code::NoNode);
        assert_eq!(
            results,
            vec![
                OpResult::Error(Code::RolledBack),
                OpResult::Error(Code::RolledBack),
                OpResult::Error(Code::NoNode),
                OpResult::Error(Code::Skipped),
            ]
        );
    }

    #[test]
    fn batch_failure_keeps_earlier_ops() {
        let ids = IdAllocator::default();
        let tree = tree_with_root(&ids);
        let auth = SessionAuth::new(1, Vec::new());
        let mut txn = TreeTransaction::new(&tree, &ids, &auth, 2, 2);

        let (results, code) = execute_ops(&mut txn, &ops(), Atomicity::Batch);

        assert_eq!(code, Code::NoNode);
        assert!(matches!(results[0], OpResult::Created { ref path, .. } if path == "/a"));
        assert_eq!(results[1], OpResult::Deleted);
        assert_eq!(results[3], OpResult::Error(Code::Skipped));

        let outcome = txn.finish();
        assert_eq!(outcome.changes.len(), 3);
    }
}
