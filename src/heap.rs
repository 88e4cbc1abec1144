//! Binary min-heap driving the k-way merge.

use crate::record::Record;

/// One heap entry: a record plus the index of the run it came from. The
/// run id only routes "who to pull from next" after the entry is emitted,
/// it has no meaning outside a single merge call.
pub struct HeapNode {
    pub record: Record,
    pub run_id: usize,
}

/// Array-backed binary min-heap over [`HeapNode`]s, ordered by record key.
/// Invariant: every non-root node's key is `>=` its parent's key.
pub struct MergeHeap {
    nodes: Vec<HeapNode>,
}

impl MergeHeap {
    /// Capacity is the number of runs being merged, the heap never grows
    /// past one entry per live run.
    pub fn with_capacity(capacity: usize) -> MergeHeap {
        MergeHeap {
            nodes: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends the node and sifts it up until order is restored.
    pub fn push(&mut self, node: HeapNode) {
        self.nodes.push(node);
        self.sift_up(self.nodes.len() - 1);
    }

    /// Removes and returns the minimum-key node, or [`None`] on an empty
    /// heap. The last node moves to the root and sifts down.
    pub fn pop(&mut self) -> Option<HeapNode> {
        if self.nodes.is_empty() {
            return None;
        }

        let last = self.nodes.len() - 1;
        self.nodes.swap(0, last);
        let min = self.nodes.pop();

        if !self.nodes.is_empty() {
            self.sift_down(0);
        }

        min
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.nodes[i].record.key < self.nodes[parent].record.key {
                self.nodes.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut smallest = i;

            // strict comparison on the right child gives ties to the left
            if left < self.nodes.len() && self.nodes[left].record.key < self.nodes[smallest].record.key {
                smallest = left;
            }
            if right < self.nodes.len() && self.nodes[right].record.key < self.nodes[smallest].record.key {
                smallest = right;
            }

            if smallest == i {
                break;
            }
            self.nodes.swap(i, smallest);
            i = smallest;
        }
    }

    #[cfg(test)]
    fn node_keys(&self) -> Vec<u64> {
        self.nodes.iter().map(|node| node.record.key).collect()
    }
}
