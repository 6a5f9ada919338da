use crate::tree::ChildThresholds;
use crate::types::Code;

/// Size limits enforced on non-super sessions. Zero disables a limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeLimits {
    pub max_node_name_length: usize,
    pub max_node_path_length: usize,
    pub max_node_data_size: usize,
    pub max_get_children_enumeration_count: usize,
    pub child_thresholds: ChildThresholds,
}

impl Default for TreeLimits {
    fn default() -> Self {
        TreeLimits {
            max_node_name_length: 1024,
            max_node_path_length: 8192,
            max_node_data_size: 1024 * 1024,
            max_get_children_enumeration_count: 10_000,
            child_thresholds: ChildThresholds::default(),
        }
    }
}

fn within(limit: usize, value: usize) -> Result<(), Code> {
    if limit == 0 || value <= limit {
        Ok(())
    } else {
        Err(Code::BadArguments)
    }
}

impl TreeLimits {
    pub fn unlimited() -> Self {
        TreeLimits {
            max_node_name_length: 0,
            max_node_path_length: 0,
            max_node_data_size: 0,
            max_get_children_enumeration_count: 0,
            child_thresholds: ChildThresholds::default(),
        }
    }

    pub fn check_name(&self, name: &str) -> Result<(), Code> {
        within(self.max_node_name_length, name.len())
    }

    pub fn check_path(&self, path: &str) -> Result<(), Code> {
        within(self.max_node_path_length, path.len())
    }

    pub fn check_data(&self, len: usize) -> Result<(), Code> {
        within(self.max_node_data_size, len)
    }

    /// Number of children returned for a request of `requested` (0 meaning "as many as allowed").
    pub fn enumeration_count(&self, requested: u32) -> usize {
        let requested = if requested == 0 { usize::MAX } else { requested as usize };
        if self.max_get_children_enumeration_count == 0 {
            requested
        } else {
            requested.min(self.max_get_children_enumeration_count)
        }
    }
}
