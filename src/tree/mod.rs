mod children;
mod limits;
mod node;
mod node_tree;
mod transaction;
mod view;

pub use children::ChildThresholds;
pub use limits::TreeLimits;
pub use node::Node;
pub use node::NodeId;
pub use node_tree::NodeTree;
pub use node_tree::TreeLoadError;
pub use transaction::Created;
pub use transaction::TransactionOutcome;
pub use transaction::TreeTransaction;
pub use view::check;
pub use view::exists;
pub use view::get_acl;
pub use view::get_children;
pub use view::get_data;
pub use view::NodeLookup;
