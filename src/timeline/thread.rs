//! Reply-chain reconstruction.
//!
//! Takes a flat list of posts and rewrites it so that every reply chain whose
//! members are all present in the list becomes one contiguous block, ordered
//! ancestor first and annotated with its chain position. Nothing is fetched: a
//! parent that is not in the list is reported through
//! [`Annotations::has_unloaded_reply_status`](crate::models::Annotations).
//!
//! [`build_threads`] is idempotent. Candidates are visited newest id first rather
//! than in list order, so the chains that come out of a second pass are the same
//! chains in the same places.

use std::collections::{HashMap, HashSet};

use crate::models::{Annotations, Post, PostId, ReplyChainType};

/// Chains this long or longer get their interior elided
const ELIDE_THRESHOLD: usize = 4;

/// Result of walking up the reply links of one post
struct Walk {
    /// Chain members, newest first (the starting post is first)
    links: Vec<PostId>,
    /// Ancestor that already belongs to an earlier chain
    anchor: Option<PostId>,
    /// The oldest member's parent is not in the list
    parent_missing: bool,
}

/// Rebuild the reply chains of a list of posts
pub fn build_threads(posts: Vec<Post>) -> Vec<Post> {
    let mut working: Vec<Post> = posts
        .into_iter()
        .filter(|post| !post.is_anchor_copy())
        .map(|post| {
            let annotations = post.annotations.without_thread();
            post.with_annotations(annotations)
        })
        .collect();

    let mut by_id: HashMap<PostId, Post> = HashMap::with_capacity(working.len());
    for post in &working {
        by_id.entry(post.id.clone()).or_insert_with(|| post.clone());
    }

    let mut candidates: Vec<PostId> = working
        .iter()
        .filter(|post| post.is_in_reply_to())
        .map(|post| post.id.clone())
        .collect();
    candidates.sort_unstable_by(|a, b| b.cmp(a));
    candidates.dedup();

    let mut processed: HashSet<PostId> = HashSet::new();
    let bound = working.len();

    for terminal in candidates {
        if processed.contains(&terminal) {
            continue;
        }

        let walk = walk_ancestors(&by_id, &processed, &terminal, bound);
        processed.extend(walk.links.iter().cloned());

        if walk.links.len() == 1 && walk.anchor.is_none() {
            if walk.parent_missing {
                mark_unloaded_parent(&mut working, &terminal);
            }
            continue;
        }

        let mut block: Vec<Post> = Vec::with_capacity(walk.links.len() + 1);
        if let Some(anchor) = &walk.anchor {
            block.push(by_id[anchor].anchor_copy(&terminal));
        }
        block.extend(walk.links.iter().rev().map(|id| by_id[id].clone()));
        annotate_chain(&mut block);
        if walk.anchor.is_none() && walk.parent_missing {
            block[0].annotations.has_unloaded_reply_status = true;
        }

        splice_chain(&mut working, &terminal, &walk.links, block);
    }

    working
}

/// Follow `in_reply_to_id` links inside the list, newest to oldest
fn walk_ancestors(
    by_id: &HashMap<PostId, Post>,
    processed: &HashSet<PostId>,
    start: &PostId,
    bound: usize,
) -> Walk {
    let mut links = vec![start.clone()];
    let mut visited: HashSet<PostId> = HashSet::from([start.clone()]);
    let mut anchor = None;
    let mut parent_missing = false;
    let mut current = start.clone();

    while links.len() <= bound {
        let Some(parent) = by_id
            .get(&current)
            .and_then(|post| post.in_reply_to_id.clone())
        else {
            break;
        };

        if visited.contains(&parent) {
            tracing::debug!("Reply cycle detected at post {}", parent);
            break;
        }

        if !by_id.contains_key(&parent) {
            parent_missing = true;
            break;
        }

        if processed.contains(&parent) {
            anchor = Some(parent);
            break;
        }

        visited.insert(parent.clone());
        links.push(parent.clone());
        current = parent;
    }

    Walk {
        links,
        anchor,
        parent_missing,
    }
}

/// Set chain positions on an ancestor-first block
fn annotate_chain(block: &mut [Post]) {
    let len = block.len();
    for (index, post) in block.iter_mut().enumerate() {
        let reply_chain_type = if index == 0 {
            ReplyChainType::Start
        } else if index == len - 1 {
            ReplyChainType::End
        } else {
            ReplyChainType::Continue
        };
        let long = len >= ELIDE_THRESHOLD;

        post.annotations = Annotations {
            reply_chain_type,
            should_show: !(long && index > 0 && index < len - 2),
            has_multi_reply_status: long && index == len - 2,
            ..post.annotations
        };
    }
}

/// A lone reply whose parent is not loaded
fn mark_unloaded_parent(working: &mut [Post], id: &PostId) {
    if let Some(post) = working.iter_mut().find(|post| &post.id == id) {
        post.annotations = Annotations {
            reply_chain_type: ReplyChainType::End,
            has_unloaded_reply_status: true,
            ..post.annotations
        };
    }
}

/// Pull the chain members out of the list and put the block where the terminal was
fn splice_chain(working: &mut Vec<Post>, terminal: &PostId, members: &[PostId], block: Vec<Post>) {
    let members: HashSet<&PostId> = members.iter().collect();
    let Some(position) = working.iter().position(|post| &post.id == terminal) else {
        return;
    };
    let removed_before = working[..position]
        .iter()
        .filter(|post| members.contains(&post.id))
        .count();

    working.retain(|post| !members.contains(&post.id));
    let tail = working.split_off(position - removed_before);
    working.extend(block);
    working.extend(tail);
}
