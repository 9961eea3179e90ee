//! Natural-loop detection over a function's control-flow graph.
//!
//! Dominators come from the iterative Cooper/Harvey/Kennedy algorithm on a
//! reverse-postorder numbering. A back edge `u -> h` (where `h` dominates
//! `u`) defines a natural loop whose body is everything that reaches `u`
//! without passing through `h`. Loops sharing a header are merged, and the
//! nesting depth of a block is the number of loop bodies containing it.

use ahash::AHashMap;
use ahash::AHashSet;
use tracing::trace;

use crate::func::{BlockId, Function};

const UNDEF: usize = usize::MAX;

/// Per-block loop nesting depth for one function.
pub struct LoopInfo {
    depth: Vec<u32>,
    loops: usize,
}

impl LoopInfo {
    pub fn compute(func: &Function) -> LoopInfo {
        let n = func.block_count();
        let mut depth = vec![0u32; n];
        if n == 0 {
            return LoopInfo { depth, loops: 0 };
        }

        let mut succs: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (id, block) in func.blocks() {
            for succ in block.term.successors() {
                succs[id.index()].push(succ.index());
                preds[succ.index()].push(id.index());
            }
        }

        // Reverse postorder from the entry. Unreachable blocks never get a
        // number and stay at depth 0.
        let mut post: Vec<usize> = Vec::with_capacity(n);
        let mut visited = vec![false; n];
        let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
        visited[0] = true;
        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            if frame.1 < succs[node].len() {
                let next = succs[node][frame.1];
                frame.1 += 1;
                if !visited[next] {
                    visited[next] = true;
                    stack.push((next, 0));
                }
            } else {
                post.push(node);
                stack.pop();
            }
        }
        let rpo: Vec<usize> = post.into_iter().rev().collect();
        let mut rpo_index = vec![UNDEF; n];
        for (i, &b) in rpo.iter().enumerate() {
            rpo_index[b] = i;
        }

        // Immediate dominators, iterated to a fixed point. The entry is its
        // own idom, which terminates every chain walk.
        let mut idom = vec![UNDEF; n];
        idom[0] = 0;
        let mut changed = true;
        while changed {
            changed = false;
            for &b in rpo.iter().skip(1) {
                let mut new_idom = UNDEF;
                for &p in &preds[b] {
                    if idom[p] == UNDEF {
                        continue;
                    }
                    new_idom = if new_idom == UNDEF {
                        p
                    } else {
                        intersect(p, new_idom, &idom, &rpo_index)
                    };
                }
                if new_idom != UNDEF && idom[b] != new_idom {
                    idom[b] = new_idom;
                    changed = true;
                }
            }
        }

        // Back edges and their natural loop bodies, merged per header.
        let mut bodies: AHashMap<usize, AHashSet<usize>> = AHashMap::new();
        for &u in &rpo {
            for &h in &succs[u] {
                if rpo_index[h] == UNDEF || !dominates(h, u, &idom) {
                    continue;
                }
                let body = bodies.entry(h).or_default();
                body.insert(h);
                let mut work = vec![u];
                while let Some(x) = work.pop() {
                    if body.insert(x) {
                        for &p in &preds[x] {
                            if rpo_index[p] != UNDEF {
                                work.push(p);
                            }
                        }
                    }
                }
            }
        }

        for body in bodies.values() {
            for &b in body {
                depth[b] += 1;
            }
        }

        trace!(
            func = %func.name,
            loops = bodies.len(),
            "computed loop nesting"
        );
        LoopInfo {
            depth,
            loops: bodies.len(),
        }
    }

    #[inline]
    pub fn depth(&self, block: BlockId) -> u32 {
        self.depth[block.index()]
    }

    pub fn loop_count(&self) -> usize {
        self.loops
    }
}

fn intersect(mut a: usize, mut b: usize, idom: &[usize], rpo_index: &[usize]) -> usize {
    while a != b {
        while rpo_index[a] > rpo_index[b] {
            a = idom[a];
        }
        while rpo_index[b] > rpo_index[a] {
            b = idom[b];
        }
    }
    a
}

/// Whether `a` dominates `b`, by walking `b`'s idom chain up to the entry.
fn dominates(a: usize, mut b: usize, idom: &[usize]) -> bool {
    loop {
        if b == a {
            return true;
        }
        let up = idom[b];
        if up == b || up == UNDEF {
            return false;
        }
        b = up;
    }
}
